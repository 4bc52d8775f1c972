//! Landmark geometry used by the classifier.
//!
//! Every helper reports failure through [`GeometryError`] instead of
//! panicking on short or corrupt hands.

use thiserror::Error;

use crate::types::{Hand, Landmark, INDEX_MCP, INDEX_PIP, INDEX_TIP, THUMB_MCP, THUMB_TIP};

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    #[error("landmark {0} is missing")]
    MissingLandmark(usize),

    #[error("landmark {0} has non-finite coordinates")]
    NonFinite(usize),

    #[error("reference distance between landmarks {0} and {1} is zero")]
    DegenerateBase(usize, usize),
}

fn landmark(hand: &Hand, idx: usize) -> Result<&Landmark, GeometryError> {
    let l = hand.get(idx).ok_or(GeometryError::MissingLandmark(idx))?;
    if !l.is_finite() {
        return Err(GeometryError::NonFinite(idx));
    }
    Ok(l)
}

/// Planar distance between two landmarks of `hand`.
pub fn distance(hand: &Hand, a: usize, b: usize) -> Result<f32, GeometryError> {
    Ok(landmark(hand, a)?.planar_distance(landmark(hand, b)?))
}

/// Thumb-tip–index-tip distance divided by thumb-MCP–index-MCP distance.
///
/// Dividing by the base distance makes the value independent of hand size and
/// distance from the camera.
pub fn pinch_ratio(hand: &Hand) -> Result<f32, GeometryError> {
    let tip = distance(hand, THUMB_TIP, INDEX_TIP)?;
    let base = distance(hand, THUMB_MCP, INDEX_MCP)?;
    if base <= f32::EPSILON {
        return Err(GeometryError::DegenerateBase(THUMB_MCP, INDEX_MCP));
    }
    Ok(tip / base)
}

/// Whether the index finger is extended enough to count as pointing.
pub fn index_extended(hand: &Hand, sensitivity: f32) -> Result<bool, GeometryError> {
    let mcp_pip = distance(hand, INDEX_MCP, INDEX_PIP)?;
    let pip_tip = distance(hand, INDEX_PIP, INDEX_TIP)?;
    Ok(pip_tip > mcp_pip * sensitivity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LANDMARK_COUNT;

    fn blank() -> Hand {
        Hand::new(vec![Landmark::default(); LANDMARK_COUNT])
    }

    #[test]
    fn ratio_is_scale_invariant() {
        let mut small = blank();
        small[THUMB_MCP] = Landmark::new(0.40, 0.5, 0.0);
        small[INDEX_MCP] = Landmark::new(0.45, 0.5, 0.0);
        small[THUMB_TIP] = Landmark::new(0.40, 0.4, 0.0);
        small[INDEX_TIP] = Landmark::new(0.42, 0.4, 0.0);

        let mut large = blank();
        large[THUMB_MCP] = Landmark::new(0.2, 0.8, 0.0);
        large[INDEX_MCP] = Landmark::new(0.4, 0.8, 0.0);
        large[THUMB_TIP] = Landmark::new(0.2, 0.4, 0.0);
        large[INDEX_TIP] = Landmark::new(0.28, 0.4, 0.0);

        let a = pinch_ratio(&small).unwrap();
        let b = pinch_ratio(&large).unwrap();
        assert!((a - 0.4).abs() < 1e-4);
        assert!((a - b).abs() < 1e-4);
    }

    #[test]
    fn coincident_bases_are_degenerate() {
        let hand = blank();
        assert_eq!(
            pinch_ratio(&hand),
            Err(GeometryError::DegenerateBase(THUMB_MCP, INDEX_MCP))
        );
    }

    #[test]
    fn short_hand_reports_missing_landmark() {
        let hand = Hand::new(vec![Landmark::default(); 5]);
        assert_eq!(
            pinch_ratio(&hand),
            Err(GeometryError::MissingLandmark(INDEX_TIP))
        );
    }

    #[test]
    fn nan_reports_non_finite() {
        let mut hand = blank();
        hand[INDEX_PIP].x = f32::INFINITY;
        assert_eq!(
            index_extended(&hand, 1.0),
            Err(GeometryError::NonFinite(INDEX_PIP))
        );
    }

    #[test]
    fn extension_respects_sensitivity() {
        let mut hand = blank();
        hand[INDEX_MCP] = Landmark::new(0.5, 0.60, 0.0);
        hand[INDEX_PIP] = Landmark::new(0.5, 0.55, 0.0);
        hand[INDEX_TIP] = Landmark::new(0.5, 0.47, 0.0);
        assert!(index_extended(&hand, 1.0).unwrap());
        assert!(!index_extended(&hand, 2.0).unwrap());
    }
}
