//! Direct-manipulation "paint" mode: the index fingertip drives the pointer and
//! pinching thumb and index together holds the button down.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::PaintConfig;
use crate::types::{Hand, INDEX_TIP, THUMB_TIP};

/// Pointer actions in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PointerAction {
    Press { x: i32, y: i32 },
    MoveTo { x: i32, y: i32 },
    Release,
}

#[derive(Debug, Clone)]
pub struct PaintTracker {
    config: PaintConfig,
    painting: bool,
    last_point: Option<(f32, f32)>,
    last_update: Option<Instant>,
}

impl PaintTracker {
    pub fn new(config: &PaintConfig) -> Self {
        Self {
            config: config.clone(),
            painting: false,
            last_point: None,
            last_update: None,
        }
    }

    pub fn is_painting(&self) -> bool {
        self.painting
    }

    /// Feed the current hand (or `None` when tracking is lost). A malformed
    /// hand counts as lost.
    pub fn update(&mut self, hand: Option<&Hand>, now: Instant) -> Option<PointerAction> {
        let Some(hand) = hand.filter(|h| h.validate().is_ok()) else {
            self.last_point = None;
            return self.release();
        };
        let (index, thumb) = (&hand[INDEX_TIP], &hand[THUMB_TIP]);

        let interval = Duration::from_millis(self.config.update_interval_ms);
        if let Some(last) = self.last_update {
            if now.saturating_duration_since(last) < interval {
                return None;
            }
        }
        self.last_update = Some(now);

        let mut x = index.x * self.config.screen_width as f32;
        let mut y = index.y * self.config.screen_height as f32;
        let s = self.config.smoothing;
        let previous = self.last_point;
        if let Some((px, py)) = previous {
            x = x * (1.0 - s) + px * s;
            y = y * (1.0 - s) + py * s;
        }
        self.last_point = Some((x, y));

        let drawing = index.planar_distance(thumb) < self.config.drawing_threshold;
        if !drawing {
            return self.release();
        }

        let (sx, sy) = (x.round() as i32, y.round() as i32);
        if !self.painting {
            self.painting = true;
            return Some(PointerAction::Press { x: sx, y: sy });
        }
        let moved_enough = previous.map_or(true, |(px, py)| {
            ((x - px).powi(2) + (y - py).powi(2)).sqrt() >= self.config.min_movement
        });
        moved_enough.then_some(PointerAction::MoveTo { x: sx, y: sy })
    }

    /// Release the pointer if it is held.
    pub fn release(&mut self) -> Option<PointerAction> {
        if self.painting {
            self.painting = false;
            Some(PointerAction::Release)
        } else {
            None
        }
    }

    pub fn stop(&mut self) -> Option<PointerAction> {
        self.last_point = None;
        self.last_update = None;
        self.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Landmark, LANDMARK_COUNT};

    fn hand(index: (f32, f32), thumb: (f32, f32)) -> Hand {
        let mut h = Hand::new(vec![Landmark::new(0.5, 0.5, 0.0); LANDMARK_COUNT]);
        h[INDEX_TIP] = Landmark::new(index.0, index.1, 0.0);
        h[THUMB_TIP] = Landmark::new(thumb.0, thumb.1, 0.0);
        h
    }

    fn tracker() -> PaintTracker {
        PaintTracker::new(&PaintConfig {
            screen_width: 1000,
            screen_height: 1000,
            smoothing: 0.0,
            ..PaintConfig::default()
        })
    }

    #[test]
    fn pinch_presses_moves_and_releases() {
        let mut t = tracker();
        let t0 = Instant::now();
        let step = Duration::from_millis(20);

        let a = t.update(Some(&hand((0.5, 0.5), (0.52, 0.5))), t0);
        assert_eq!(a, Some(PointerAction::Press { x: 500, y: 500 }));
        assert!(t.is_painting());

        let b = t.update(Some(&hand((0.6, 0.5), (0.62, 0.5))), t0 + step);
        assert_eq!(b, Some(PointerAction::MoveTo { x: 600, y: 500 }));

        let c = t.update(Some(&hand((0.6, 0.5), (0.9, 0.5))), t0 + step * 2);
        assert_eq!(c, Some(PointerAction::Release));
        assert!(!t.is_painting());
    }

    #[test]
    fn small_moves_are_ignored() {
        let mut t = tracker();
        let t0 = Instant::now();
        t.update(Some(&hand((0.5, 0.5), (0.52, 0.5))), t0);
        let a = t.update(
            Some(&hand((0.501, 0.5), (0.521, 0.5))),
            t0 + Duration::from_millis(20),
        );
        assert_eq!(a, None);
    }

    #[test]
    fn updates_are_throttled() {
        let mut t = tracker();
        let t0 = Instant::now();
        t.update(Some(&hand((0.5, 0.5), (0.52, 0.5))), t0);
        let a = t.update(
            Some(&hand((0.9, 0.9), (0.92, 0.9))),
            t0 + Duration::from_millis(2),
        );
        assert_eq!(a, None);
    }

    #[test]
    fn losing_the_hand_releases() {
        let mut t = tracker();
        t.update(Some(&hand((0.5, 0.5), (0.52, 0.5))), Instant::now());
        assert_eq!(t.update(None, Instant::now()), Some(PointerAction::Release));
        assert_eq!(t.update(None, Instant::now()), None);
    }

    #[test]
    fn malformed_hand_releases() {
        let mut t = tracker();
        let t0 = Instant::now();
        t.update(Some(&hand((0.5, 0.5), (0.52, 0.5))), t0);
        assert!(t.is_painting());

        let short = Hand::new(hand((0.5, 0.5), (0.52, 0.5)).landmarks[..9].to_vec());
        assert_eq!(
            t.update(Some(&short), t0 + Duration::from_millis(20)),
            Some(PointerAction::Release)
        );

        let mut nan = hand((0.5, 0.5), (0.52, 0.5));
        nan[THUMB_TIP].y = f32::NAN;
        assert_eq!(t.update(Some(&nan), t0 + Duration::from_millis(40)), None);
        assert!(!t.is_painting());
    }

    #[test]
    fn smoothing_pulls_towards_previous_point() {
        let mut t = PaintTracker::new(&PaintConfig {
            screen_width: 1000,
            screen_height: 1000,
            smoothing: 0.5,
            ..PaintConfig::default()
        });
        let t0 = Instant::now();
        t.update(Some(&hand((0.2, 0.2), (0.21, 0.2))), t0);
        let a = t.update(
            Some(&hand((0.4, 0.2), (0.41, 0.2))),
            t0 + Duration::from_millis(20),
        );
        assert_eq!(a, Some(PointerAction::MoveTo { x: 300, y: 200 }));
    }
}
