//! Per-frame wiring of smoother, classifier, recorder and paint tracker.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{Gesture, GestureClassifier};
use crate::config::Settings;
use crate::error::Result;
use crate::matcher::{TemplateMatch, TemplateMatcher};
use crate::paint::{PaintTracker, PointerAction};
use crate::smoother::LandmarkSmoother;
use crate::template::{sequences, GestureRecorder, GestureTemplate};
use crate::types::Hand;

/// What the pipeline does with the first hand of each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Gestures,
    Paint,
}

/// Result of one [`GesturePipeline::process`] call.
#[derive(Debug, Clone, Serialize)]
pub struct FrameOutput {
    /// Smoothed hands, for display and direct manipulation.
    pub hands: Vec<Hand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture: Option<Gesture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<PointerAction>,
}

pub struct GesturePipeline {
    smoother: LandmarkSmoother,
    classifier: GestureClassifier,
    recorder: GestureRecorder,
    paint: PaintTracker,
    matcher: TemplateMatcher,
    templates: BTreeMap<String, Vec<Hand>>,
    mode: Mode,
}

impl GesturePipeline {
    /// Build every stage from validated settings.
    pub fn new(settings: &Settings) -> Self {
        Self {
            smoother: LandmarkSmoother::new(&settings.smoothing),
            classifier: GestureClassifier::new(&settings.classifier),
            recorder: GestureRecorder::new(),
            paint: PaintTracker::new(&settings.paint),
            matcher: TemplateMatcher::new(&settings.matcher),
            templates: BTreeMap::new(),
            mode: Mode::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch modes. Leaving paint mode releases a held pointer, which is
    /// returned so the host can forward it.
    pub fn set_mode(&mut self, mode: Mode) -> Option<PointerAction> {
        if mode == self.mode {
            return None;
        }
        info!("Switching to {:?} mode", mode);
        self.mode = mode;
        self.classifier.reset();
        self.paint.stop()
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn process(&mut self, hands: &[Hand], now: Instant) -> FrameOutput {
        let smoothed = self.smoother.smooth(hands);
        self.recorder.add_frame(&smoothed);

        let (gesture, pointer) = match self.mode {
            Mode::Gestures => (self.classifier.update(&smoothed), None),
            Mode::Paint => (None, self.paint.update(smoothed.first(), now)),
        };

        FrameOutput {
            hands: smoothed,
            gesture,
            pointer,
        }
    }

    pub fn start_recording(&mut self, name: &str) -> Result<()> {
        self.recorder.start(name)?;
        info!("Recording gesture {:?}", name);
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Finish recording. The template also joins the in-memory match set.
    pub fn stop_recording(&mut self) -> Option<GestureTemplate> {
        let template = self.recorder.stop()?;
        self.templates
            .insert(template.name.clone(), template.landmarks.clone());
        Some(template)
    }

    pub fn cancel_recording(&mut self) {
        self.recorder.cancel();
    }

    /// Replace the match set.
    pub fn set_templates(&mut self, templates: &BTreeMap<String, GestureTemplate>) {
        self.templates = sequences(templates);
    }

    pub fn templates(&self) -> &BTreeMap<String, Vec<Hand>> {
        &self.templates
    }

    pub fn match_custom(&self, query: &[Hand]) -> Option<TemplateMatch> {
        self.matcher.best_match(query, &self.templates)
    }

    /// Every template's cost against `query`, cheapest first.
    pub fn rank_custom(&self, query: &[Hand]) -> Vec<TemplateMatch> {
        self.matcher.rank(query, &self.templates)
    }

    /// Drop smoothing history and classifier state.
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.classifier.reset();
    }
}
