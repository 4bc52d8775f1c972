//! Rule-based gesture classification with cooldown and hold semantics.
//!
//! Each frame runs two stages. The pinch/spread stage tracks the normalized
//! thumb–index distance and owns the cooldown and hold counters; when it
//! produces nothing, the pointing stage maps an extended index finger to a
//! navigation band. Only the first hand of a frame is classified.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::error::Error;
use crate::geometry::{self, GeometryError};
use crate::types::{Hand, HandDefect, INDEX_TIP};

/// Recognized gesture vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Pinch,
    PinchHold,
    Spread,
    NavLeft,
    NavRight,
    NavUp,
    NavDown,
}

impl Gesture {
    pub const ALL: [Gesture; 7] = [
        Gesture::Pinch,
        Gesture::PinchHold,
        Gesture::Spread,
        Gesture::NavLeft,
        Gesture::NavRight,
        Gesture::NavUp,
        Gesture::NavDown,
    ];

    /// Wire label passed to command dispatchers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinch => "pinch",
            Self::PinchHold => "pinch_hold",
            Self::Spread => "spread",
            Self::NavLeft => "nav_left",
            Self::NavRight => "nav_right",
            Self::NavUp => "nav_up",
            Self::NavDown => "nav_down",
        }
    }

    /// Discrete events arm the cooldown; repeatable ones do not.
    pub fn arms_cooldown(&self) -> bool {
        matches!(self, Self::Pinch | Self::Spread)
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gesture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gesture::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| Error::UnknownGesture(s.to_string()))
    }
}

/// Mutable classifier state, reset whenever a frame carries no hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierState {
    pub previous_hand: Option<Hand>,
    pub last_pinch_ratio: Option<f32>,
    pub pinch_held: bool,
    pub pinch_frames: u32,
    pub cooldown: u32,
    pub last_gesture: Option<Gesture>,
}

/// Number of frames rejected, per failure kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub wrong_length: u64,
    pub non_finite: u64,
    pub missing_landmark: u64,
    pub degenerate_base: u64,
}

impl RejectionCounts {
    pub fn total(&self) -> u64 {
        self.wrong_length + self.non_finite + self.missing_landmark + self.degenerate_base
    }
}

/// Stateful gesture classifier. Not meant to be shared between pipelines.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    config: ClassifierConfig,
    state: ClassifierState,
    rejections: RejectionCounts,
}

impl GestureClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            config: config.clone(),
            state: ClassifierState::default(),
            rejections: RejectionCounts::default(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn rejections(&self) -> RejectionCounts {
        self.rejections
    }

    pub fn reset(&mut self) {
        self.state = ClassifierState::default();
    }

    /// Classify one frame's hands. Never fails: malformed input yields `None`.
    pub fn update(&mut self, hands: &[Hand]) -> Option<Gesture> {
        let Some(hand) = hands.first() else {
            self.reset();
            return None;
        };

        if let Err(defect) = hand.validate() {
            match defect {
                HandDefect::WrongLength(n) => {
                    self.rejections.wrong_length += 1;
                    warn!("Ignoring hand with {} landmarks", n);
                }
                HandDefect::NonFinite(idx) => {
                    self.rejections.non_finite += 1;
                    warn!("Ignoring hand with non-finite landmark {}", idx);
                }
            }
            return None;
        }

        if self.state.cooldown > 0 {
            self.state.cooldown -= 1;
            self.state.previous_hand = Some(hand.clone());
            return None;
        }

        let gesture = match self.classify(hand) {
            Ok(g) => g,
            Err(e) => {
                self.record_rejection(e);
                None
            }
        };

        self.state.previous_hand = Some(hand.clone());
        if let Some(g) = gesture {
            if g.arms_cooldown() {
                self.state.cooldown = self.config.cooldown_frames;
            }
            self.state.last_gesture = Some(g);
            debug!("Gesture: {}", g);
        }
        gesture
    }

    fn record_rejection(&mut self, err: GeometryError) {
        match err {
            GeometryError::MissingLandmark(_) => self.rejections.missing_landmark += 1,
            GeometryError::NonFinite(_) => self.rejections.non_finite += 1,
            GeometryError::DegenerateBase(..) => self.rejections.degenerate_base += 1,
        }
        warn!("Skipping frame: {}", err);
    }

    fn classify(&mut self, hand: &Hand) -> Result<Option<Gesture>, GeometryError> {
        if let Some(g) = self.detect_pinch_spread(hand)? {
            return Ok(Some(g));
        }
        self.detect_pointing(hand)
    }

    fn detect_pinch_spread(&mut self, hand: &Hand) -> Result<Option<Gesture>, GeometryError> {
        let ratio = geometry::pinch_ratio(hand)?;

        let Some(last) = self.state.last_pinch_ratio.replace(ratio) else {
            // First observation only establishes the baseline.
            return Ok(None);
        };
        let moved = (ratio - last).abs() > self.config.min_distance_change;

        let st = &mut self.state;
        if ratio < self.config.pinch_ratio {
            if st.pinch_held {
                st.pinch_frames = st.pinch_frames.saturating_add(1);
                if st.pinch_frames >= self.config.pinch_hold_frames {
                    return Ok(Some(Gesture::PinchHold));
                }
                return Ok(None);
            }
            if moved {
                st.pinch_held = true;
                st.pinch_frames = 0;
                return Ok(Some(Gesture::Pinch));
            }
            return Ok(None);
        }

        st.pinch_held = false;
        st.pinch_frames = 0;
        if ratio > self.config.spread_ratio && moved {
            return Ok(Some(Gesture::Spread));
        }
        Ok(None)
    }

    fn detect_pointing(&self, hand: &Hand) -> Result<Option<Gesture>, GeometryError> {
        if !geometry::index_extended(hand, self.config.pointing_sensitivity)? {
            return Ok(None);
        }

        // Horizontal bands win over vertical ones.
        let tip = hand[INDEX_TIP];
        let c = &self.config;
        let gesture = if tip.x < c.nav_left {
            Some(Gesture::NavLeft)
        } else if tip.x > c.nav_right {
            Some(Gesture::NavRight)
        } else if tip.y < c.nav_top {
            Some(Gesture::NavUp)
        } else if tip.y > c.nav_bottom {
            Some(Gesture::NavDown)
        } else {
            None
        };
        Ok(gesture)
    }
}
