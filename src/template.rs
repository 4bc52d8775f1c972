//! Recording, persisting and loading custom gesture templates.
//!
//! Each template is stored as `<name>.json` in a template directory:
//!
//! ```json
//! {"name": "circle", "timestamp": "2024-05-01T10:22:31.120512", "landmarks": [[[x, y, z], ...], ...]}
//! ```
//!
//! Whole libraries can also be exported to a single bincode bundle, optionally
//! bzip2-compressed.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::Hand;

/// A named, recorded sequence of hands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureTemplate {
    pub name: String,
    pub timestamp: NaiveDateTime,
    pub landmarks: Vec<Hand>,
}

impl GestureTemplate {
    pub fn new(name: impl Into<String>, landmarks: Vec<Hand>) -> Self {
        Self {
            name: name.into(),
            timestamp: chrono::Local::now().naive_local(),
            landmarks,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.landmarks.len()
    }
}

/// Reject names that are empty or would escape the template directory.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::InvalidTemplateName(name.to_string()));
    }
    Ok(())
}

/// Captures the first hand of each frame while a recording is active.
#[derive(Debug, Default)]
pub struct GestureRecorder {
    active: Option<(String, Vec<Hand>)>,
}

impl GestureRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new recording, discarding any recording in progress.
    pub fn start(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        if let Some((old, _)) = &self.active {
            debug!("Discarding unfinished recording {:?}", old);
        }
        self.active = Some((name.to_string(), Vec::new()));
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Number of frames captured so far.
    pub fn frame_count(&self) -> usize {
        self.active.as_ref().map_or(0, |(_, frames)| frames.len())
    }

    /// Append the frame's first hand. Frames without hands are skipped.
    pub fn add_frame(&mut self, hands: &[Hand]) {
        if let (Some((_, frames)), Some(hand)) = (self.active.as_mut(), hands.first()) {
            frames.push(hand.clone());
        }
    }

    /// Finish the recording. Returns `None` if nothing was captured.
    pub fn stop(&mut self) -> Option<GestureTemplate> {
        let (name, frames) = self.active.take()?;
        if frames.is_empty() {
            debug!("Recording {:?} captured no frames", name);
            return None;
        }
        Some(GestureTemplate::new(name, frames))
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }
}

/// Directory of `<name>.json` template files.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Write a template, replacing any existing one with the same name.
    pub fn save(&self, template: &GestureTemplate) -> Result<PathBuf> {
        validate_name(&template.name)?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&template.name);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, template)?;
        writer.flush()?;
        info!("Saved template {:?} ({} frames)", template.name, template.num_frames());
        Ok(path)
    }

    /// Read a single template file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<GestureTemplate> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load every template in the directory.
    ///
    /// A missing directory yields an empty set. Unreadable or corrupt files are
    /// skipped with a warning. Files are visited in name order and the name
    /// stored inside each file is the key, so later files win on collisions.
    pub fn load_all(&self) -> BTreeMap<String, GestureTemplate> {
        let mut templates = BTreeMap::new();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Cannot read template directory {:?}: {}", self.dir, e);
                }
                return templates;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            match Self::load_file(&path) {
                Ok(template) => {
                    templates.insert(template.name.clone(), template);
                }
                Err(e) => warn!("Skipping template file {:?}: {}", path, e),
            }
        }

        debug!("Loaded {} template(s) from {:?}", templates.len(), self.dir);
        templates
    }

    /// Delete a template. Returns `false` if it did not exist.
    pub fn remove(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        match std::fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Name → landmark sequence view used by the matcher.
pub fn sequences(templates: &BTreeMap<String, GestureTemplate>) -> BTreeMap<String, Vec<Hand>> {
    templates
        .iter()
        .map(|(name, t)| (name.clone(), t.landmarks.clone()))
        .collect()
}

fn is_compressed(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "bz2")
}

/// Write all templates into one bincode bundle (bzip2 if the path ends in `.bz2`).
pub fn save_bundle<P: AsRef<Path>>(path: P, templates: &[GestureTemplate]) -> Result<()> {
    let path = path.as_ref();
    let bytes = bincode::serialize(templates)?;
    let file = BufWriter::new(File::create(path)?);
    if is_compressed(path) {
        let mut encoder = BzEncoder::new(file, Compression::best());
        encoder.write_all(&bytes)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = file;
        writer.write_all(&bytes)?;
        writer.flush()?;
    }
    Ok(())
}

/// Read a bundle written by [`save_bundle`].
pub fn load_bundle<P: AsRef<Path>>(path: P) -> Result<Vec<GestureTemplate>> {
    let path = path.as_ref();
    let file = BufReader::new(File::open(path)?);
    let mut bytes = Vec::new();
    if is_compressed(path) {
        BzDecoder::new(file).read_to_end(&mut bytes)?;
    } else {
        let mut reader = file;
        reader.read_to_end(&mut bytes)?;
    }
    Ok(bincode::deserialize(&bytes)?)
}
