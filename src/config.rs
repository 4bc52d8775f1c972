//! Pipeline settings.
//!
//! Every tunable knob of the smoother, classifier, matcher, performance
//! controller and paint tracker lives here. Settings are validated once at the
//! boundary; components receive their section by reference at construction.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::commands::Command;
use crate::error::{Error, Result};

/// Top-level settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub smoothing: SmoothingConfig,
    pub classifier: ClassifierConfig,
    pub matcher: MatcherConfig,
    pub performance: PerformanceConfig,
    pub paint: PaintConfig,
    /// Gesture or template name → command overrides.
    pub commands: BTreeMap<String, Command>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Weight given to the previous frame, in [0, 1).
    pub alpha: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { alpha: 0.5 }
    }
}

/// Classifier thresholds.
///
/// Pinch and spread thresholds are dimensionless ratios: thumb-tip–index-tip
/// distance divided by thumb-MCP–index-MCP distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub pinch_ratio: f32,
    pub spread_ratio: f32,
    /// Minimum frame-to-frame change of the ratio required to start a pinch or
    /// emit a spread. Zero disables the gate.
    pub min_distance_change: f32,
    /// Index finger counts as extended when `|PIP→TIP| > |MCP→PIP| * sensitivity`.
    pub pointing_sensitivity: f32,
    pub cooldown_frames: u32,
    pub pinch_hold_frames: u32,
    pub nav_left: f32,
    pub nav_right: f32,
    pub nav_top: f32,
    pub nav_bottom: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            pinch_ratio: 0.5,
            spread_ratio: 1.2,
            min_distance_change: 0.02,
            pointing_sensitivity: 1.0,
            cooldown_frames: 10,
            pinch_hold_frames: 5,
            nav_left: 0.3,
            nav_right: 0.7,
            nav_top: 0.3,
            nav_bottom: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum length-normalized DTW cost accepted as a match.
    pub threshold: f32,
    /// Optional Sakoe-Chiba band half-width, in frames.
    pub band: Option<usize>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            band: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub target_fps: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub max_skip: u32,
    /// Capacity of the interval and processing-time histories.
    pub history: usize,
    /// Re-evaluate the knobs every this many processed frames.
    pub adjust_interval: u32,
    /// Scale step used for severe slowdowns.
    pub coarse_step: f32,
    /// Scale step used for mild slowdowns and for recovery.
    pub fine_step: f32,
    /// Improve quality only while average processing time stays below this
    /// fraction of the target frame period.
    pub headroom: f32,
    pub output_width: u32,
    pub output_height: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            min_scale: 0.4,
            max_scale: 1.0,
            max_skip: 2,
            history: 30,
            adjust_interval: 5,
            coarse_step: 0.15,
            fine_step: 0.1,
            headroom: 0.8,
            output_width: 640,
            output_height: 480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub smoothing: f32,
    /// Thumb-tip–index-tip distance (normalized frame units) below which the
    /// pointer is held down.
    pub drawing_threshold: f32,
    /// Minimum pointer travel in pixels before a move is emitted.
    pub min_movement: f32,
    pub update_interval_ms: u64,
}

impl Default for PaintConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920,
            screen_height: 1080,
            smoothing: 0.7,
            drawing_threshold: 0.15,
            min_movement: 3.0,
            update_interval_ms: 10,
        }
    }
}

impl Settings {
    /// Check every knob is inside its valid range.
    pub fn validate(&self) -> Result<()> {
        let s = &self.smoothing;
        if !(0.0..1.0).contains(&s.alpha) {
            return Err(Error::InvalidConfig(format!(
                "smoothing.alpha must be in [0, 1), got {}",
                s.alpha
            )));
        }

        let c = &self.classifier;
        if !(c.pinch_ratio > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "classifier.pinch_ratio must be > 0, got {}",
                c.pinch_ratio
            )));
        }
        if !(c.spread_ratio > c.pinch_ratio) {
            return Err(Error::InvalidConfig(format!(
                "classifier.spread_ratio ({}) must exceed pinch_ratio ({})",
                c.spread_ratio, c.pinch_ratio
            )));
        }
        if !(c.min_distance_change >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "classifier.min_distance_change must be >= 0, got {}",
                c.min_distance_change
            )));
        }
        if !(c.pointing_sensitivity > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "classifier.pointing_sensitivity must be > 0, got {}",
                c.pointing_sensitivity
            )));
        }
        if c.pinch_hold_frames == 0 {
            return Err(Error::InvalidConfig(
                "classifier.pinch_hold_frames must be > 0".to_string(),
            ));
        }
        for (name, v) in [
            ("nav_left", c.nav_left),
            ("nav_right", c.nav_right),
            ("nav_top", c.nav_top),
            ("nav_bottom", c.nav_bottom),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::InvalidConfig(format!(
                    "classifier.{} must be in [0, 1], got {}",
                    name, v
                )));
            }
        }
        if c.nav_left >= c.nav_right || c.nav_top >= c.nav_bottom {
            return Err(Error::InvalidConfig(
                "classifier navigation bands overlap".to_string(),
            ));
        }

        let m = &self.matcher;
        if !(m.threshold >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "matcher.threshold must be >= 0, got {}",
                m.threshold
            )));
        }

        let p = &self.performance;
        if !(p.target_fps > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "performance.target_fps must be > 0, got {}",
                p.target_fps
            )));
        }
        if !(p.min_scale > 0.0 && p.min_scale <= p.max_scale && p.max_scale <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "performance scale band must satisfy 0 < min <= max <= 1, got [{}, {}]",
                p.min_scale, p.max_scale
            )));
        }
        if p.history == 0 || p.adjust_interval == 0 {
            return Err(Error::InvalidConfig(
                "performance.history and adjust_interval must be > 0".to_string(),
            ));
        }
        if !(p.coarse_step > 0.0 && p.fine_step > 0.0) {
            return Err(Error::InvalidConfig(
                "performance scale steps must be > 0".to_string(),
            ));
        }
        if !(p.headroom > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "performance.headroom must be > 0, got {}",
                p.headroom
            )));
        }
        if p.output_width == 0 || p.output_height == 0 {
            return Err(Error::InvalidConfig(
                "performance output dimensions must be non-zero".to_string(),
            ));
        }

        let pa = &self.paint;
        if pa.screen_width == 0 || pa.screen_height == 0 {
            return Err(Error::InvalidConfig(
                "paint screen dimensions must be non-zero".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&pa.smoothing) {
            return Err(Error::InvalidConfig(format!(
                "paint.smoothing must be in [0, 1), got {}",
                pa.smoothing
            )));
        }

        Ok(())
    }

    /// Load and validate settings from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write settings as pretty JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
