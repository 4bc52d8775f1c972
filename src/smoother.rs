//! Exponential low-pass filter over per-frame hand landmarks.

use crate::config::SmoothingConfig;
use crate::types::Hand;

/// Smooth `current` against `previous`, matching hands by position in the list.
///
/// Each coordinate becomes `current * (1 - alpha) + previous * alpha`. A hand
/// with no counterpart in `previous` (or whose counterpart has a different
/// landmark count or non-finite coordinates) passes through unchanged. Hands
/// only present in `previous` are dropped.
pub fn smooth_hands(current: &[Hand], previous: &[Hand], alpha: f32) -> Vec<Hand> {
    current
        .iter()
        .enumerate()
        .map(|(idx, hand)| match previous.get(idx) {
            Some(prev) if usable_baseline(prev, hand) => Hand::new(
                hand.landmarks
                    .iter()
                    .zip(prev.landmarks.iter())
                    .map(|(cur, old)| cur.blend(old, alpha))
                    .collect(),
            ),
            _ => hand.clone(),
        })
        .collect()
}

fn usable_baseline(prev: &Hand, hand: &Hand) -> bool {
    prev.num_landmarks() == hand.num_landmarks() && prev.landmarks.iter().all(|l| l.is_finite())
}

/// Stateful smoother that keeps the previous frame's output as its baseline.
#[derive(Debug, Clone)]
pub struct LandmarkSmoother {
    alpha: f32,
    previous: Vec<Hand>,
}

impl LandmarkSmoother {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            alpha: config.alpha,
            previous: Vec::new(),
        }
    }

    /// Smooth one frame and make the result the baseline for the next one.
    pub fn smooth(&mut self, current: &[Hand]) -> Vec<Hand> {
        let smoothed = smooth_hands(current, &self.previous, self.alpha);
        self.previous = smoothed.clone();
        smoothed
    }

    pub fn previous(&self) -> &[Hand] {
        &self.previous
    }

    pub fn reset(&mut self) {
        self.previous.clear();
    }
}
