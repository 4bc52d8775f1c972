//! CLI for replaying recorded landmark streams and managing gesture templates.
//!
//! Usage:
//!   gesture-flow replay frames.jsonl                      # Human-readable output
//!   gesture-flow replay frames.jsonl --json               # JSON output
//!   gesture-flow record frames.jsonl --name circle --templates gestures/
//!   gesture-flow match frames.jsonl --templates gestures/ -o match.json
//!   gesture-flow export gestures/ library.bin.bz2
//!   gesture-flow config --init settings.json

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use gesture_flow::source::read_all;
use gesture_flow::template::{load_bundle, save_bundle};
use gesture_flow::{
    Command, CommandMapper, FrameLandmarks, Gesture, GesturePipeline, JsonLinesSource,
    LoggingSink, Mode, PointerAction, RejectionCounts, Settings, TemplateMatch, TemplateStore,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gesture-flow")]
#[command(author, version, about = "Hand gesture recognition over landmark streams", long_about = None)]
struct Cli {
    /// Settings file (JSON); defaults are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline over a recorded landmark stream
    Replay {
        /// JSON-lines landmark stream
        input: PathBuf,

        /// Track the index fingertip as a pointer instead of classifying
        #[arg(long)]
        paint: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Record a stream's first hands as a named template
    Record {
        input: PathBuf,

        /// Template name
        #[arg(short, long)]
        name: String,

        /// Template directory
        #[arg(short, long, default_value = "gestures")]
        templates: PathBuf,
    },

    /// Rank a stream against stored templates
    Match {
        input: PathBuf,

        #[arg(short, long, default_value = "gestures")]
        templates: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List stored templates
    Templates {
        #[arg(default_value = "gestures")]
        dir: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Pack a template directory into one bundle (.bz2 to compress)
    Export { dir: PathBuf, bundle: PathBuf },

    /// Unpack a bundle into a template directory
    Import { bundle: PathBuf, dir: PathBuf },

    /// Print effective settings, or write defaults to a file
    Config {
        #[arg(long)]
        init: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ReplayOutput {
    input: String,
    frames: usize,
    mode: Mode,
    gestures: Vec<GestureEvent>,
    pointer: Vec<PointerEvent>,
    rejections: RejectionCounts,
}

#[derive(Serialize)]
struct GestureEvent {
    /// Frame index (0-based)
    frame: usize,
    gesture: Gesture,
    /// Command dispatched for the gesture, if any is bound
    command: Option<Command>,
}

#[derive(Serialize)]
struct PointerEvent {
    frame: usize,
    #[serde(flatten)]
    action: PointerAction,
}

#[derive(Serialize)]
struct MatchOutput {
    input: String,
    query_frames: usize,
    threshold: f32,
    best: Option<TemplateMatch>,
    ranking: Vec<TemplateMatch>,
}

#[derive(Serialize)]
struct TemplateInfo {
    name: String,
    frames: usize,
    timestamp: NaiveDateTime,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match &cli.config {
        Some(path) => Settings::load_or_default(path)?,
        None => Settings::default(),
    };
    settings.validate()?;

    match &cli.command {
        Commands::Replay {
            input,
            paint,
            output,
        } => {
            let result = replay(&settings, input, *paint)?;
            let text = if output.json {
                serde_json::to_string_pretty(&result)?
            } else {
                format_replay(&result)
            };
            emit(output, &text)
        }
        Commands::Record {
            input,
            name,
            templates,
        } => {
            let frames = read_frames(input)?;
            let mut pipeline = GesturePipeline::new(&settings);
            pipeline.start_recording(name)?;
            let now = Instant::now();
            for hands in &frames {
                pipeline.process(hands, now);
            }
            let template = pipeline
                .stop_recording()
                .ok_or_else(|| format!("no hands found in {:?}", input))?;
            let path = TemplateStore::new(templates).save(&template)?;
            println!(
                "Recorded {:?}: {} frames -> {}",
                template.name,
                template.num_frames(),
                path.display()
            );
            Ok(())
        }
        Commands::Match {
            input,
            templates,
            output,
        } => {
            let result = match_stream(&settings, input, templates)?;
            let text = if output.json {
                serde_json::to_string_pretty(&result)?
            } else {
                format_match(&result)
            };
            emit(output, &text)
        }
        Commands::Templates { dir, output } => {
            let listing: Vec<TemplateInfo> = TemplateStore::new(dir)
                .load_all()
                .into_values()
                .map(|t| TemplateInfo {
                    frames: t.num_frames(),
                    name: t.name,
                    timestamp: t.timestamp,
                })
                .collect();
            let text = if output.json {
                serde_json::to_string_pretty(&listing)?
            } else {
                format_templates(dir, &listing)
            };
            emit(output, &text)
        }
        Commands::Export { dir, bundle } => {
            let templates: Vec<_> = TemplateStore::new(dir).load_all().into_values().collect();
            save_bundle(bundle, &templates)?;
            println!("Exported {} template(s) to {}", templates.len(), bundle.display());
            Ok(())
        }
        Commands::Import { bundle, dir } => {
            let store = TemplateStore::new(dir);
            let templates = load_bundle(bundle)?;
            for template in &templates {
                store.save(template)?;
            }
            println!("Imported {} template(s) into {}", templates.len(), dir.display());
            Ok(())
        }
        Commands::Config { init } => {
            if let Some(path) = init {
                Settings::default().save(path)?;
                println!("Wrote default settings to {}", path.display());
            } else {
                println!("{}", settings.to_json()?);
            }
            Ok(())
        }
    }
}

fn read_frames(path: &Path) -> Result<Vec<FrameLandmarks>, Box<dyn std::error::Error>> {
    debug!("Reading landmark stream {:?}", path);
    let frames = read_all(&mut JsonLinesSource::open(path)?)?;
    info!("Read {} frame(s) from {:?}", frames.len(), path);
    Ok(frames)
}

fn replay(
    settings: &Settings,
    input: &Path,
    paint: bool,
) -> Result<ReplayOutput, Box<dyn std::error::Error>> {
    let frames = read_frames(input)?;
    let mut pipeline = GesturePipeline::new(settings);
    if paint {
        pipeline.set_mode(Mode::Paint);
    }
    let mapper = CommandMapper::new(&settings.commands);
    let mut sink = LoggingSink::default();

    // Replayed frames are spaced at the target rate.
    let period = Duration::from_secs_f32(1.0 / settings.performance.target_fps);
    let start = Instant::now();

    let mut gestures = Vec::new();
    let mut pointer = Vec::new();
    for (i, hands) in frames.iter().enumerate() {
        let out = pipeline.process(hands, start + period * i as u32);
        if let Some(gesture) = out.gesture {
            let command = mapper.dispatch(gesture, out.hands.first(), &mut sink)?;
            gestures.push(GestureEvent {
                frame: i,
                gesture,
                command,
            });
        }
        if let Some(action) = out.pointer {
            pointer.push(PointerEvent { frame: i, action });
        }
    }

    Ok(ReplayOutput {
        input: input.display().to_string(),
        frames: frames.len(),
        mode: pipeline.mode(),
        gestures,
        pointer,
        rejections: pipeline.classifier().rejections(),
    })
}

fn match_stream(
    settings: &Settings,
    input: &Path,
    templates: &Path,
) -> Result<MatchOutput, Box<dyn std::error::Error>> {
    let frames = read_frames(input)?;
    let mut pipeline = GesturePipeline::new(settings);
    pipeline.set_templates(&TemplateStore::new(templates).load_all());

    let now = Instant::now();
    let query: Vec<_> = frames
        .iter()
        .filter_map(|hands| pipeline.process(hands, now).hands.into_iter().next())
        .collect();

    Ok(MatchOutput {
        input: input.display().to_string(),
        query_frames: query.len(),
        threshold: settings.matcher.threshold,
        best: pipeline.match_custom(&query),
        ranking: pipeline.rank_custom(&query),
    })
}

fn emit(output: &OutputArgs, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ref path) = output.output {
        std::fs::write(path, text)?;
        info!("Output written to {:?}", path);
    } else {
        println!("{}", text);
    }
    Ok(())
}

fn format_replay(output: &ReplayOutput) -> String {
    let mut s = String::new();

    s.push_str(&format!("Input: {} ({} frames)\n", output.input, output.frames));

    if output.mode == Mode::Paint {
        s.push_str(&format!("Pointer actions: {}\n", output.pointer.len()));
        for event in &output.pointer {
            let action = match event.action {
                PointerAction::Press { x, y } => format!("press at ({}, {})", x, y),
                PointerAction::MoveTo { x, y } => format!("move to ({}, {})", x, y),
                PointerAction::Release => "release".to_string(),
            };
            s.push_str(&format!("  [{:>5}] {}\n", event.frame, action));
        }
    } else {
        s.push_str(&format!("Gestures: {}\n", output.gestures.len()));
        for event in &output.gestures {
            let command = event.command.map_or("-".to_string(), |c| c.to_string());
            s.push_str(&format!(
                "  [{:>5}] {:<10} -> {}\n",
                event.frame,
                event.gesture.as_str(),
                command
            ));
        }
    }

    let r = &output.rejections;
    if r.total() > 0 {
        s.push_str("\nRejected frames:\n");
        s.push_str(&format!("  Wrong length:    {}\n", r.wrong_length));
        s.push_str(&format!("  Non-finite:      {}\n", r.non_finite));
        s.push_str(&format!("  Missing point:   {}\n", r.missing_landmark));
        s.push_str(&format!("  Degenerate base: {}\n", r.degenerate_base));
    }

    s
}

fn format_match(output: &MatchOutput) -> String {
    let mut s = String::new();

    s.push_str(&format!("Input: {} ({} frames with a hand)\n", output.input, output.query_frames));
    match &output.best {
        Some(m) => s.push_str(&format!("Best match: {} (cost {:.4})\n", m.name, m.cost)),
        None => s.push_str(&format!("No match within threshold {:.2}\n", output.threshold)),
    }

    if !output.ranking.is_empty() {
        s.push_str("\nRanking:\n");
        for m in &output.ranking {
            s.push_str(&format!("  {:<24} {:.4}\n", m.name, m.cost));
        }
    }

    s
}

fn format_templates(dir: &Path, listing: &[TemplateInfo]) -> String {
    let mut s = String::new();

    s.push_str(&format!("Templates in {}: {}\n", dir.display(), listing.len()));
    for t in listing {
        s.push_str(&format!(
            "  {:<24} {:>4} frames  {}\n",
            t.name,
            t.frames,
            t.timestamp.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    s
}
