//! Whole-reading reliability check.

use coinscan_core::{CoinResult, SLOT_COUNT};

/// Required mean confidence across the six slots.
pub const MIN_MEAN_CONFIDENCE: f64 = 0.66;

/// Per-slot confidence below which a slot counts as weak; at most one weak
/// slot is tolerated.
pub const MIN_SLOT_CONFIDENCE: f64 = 0.57;

/// A six-slot result is reliable when every slot is decisive, the mean
/// confidence is high, and at most one slot is individually weak.
pub fn is_reliable_reading(results: &[CoinResult]) -> bool {
    if results.len() != SLOT_COUNT {
        return false;
    }
    if results.iter().any(|r| !r.face.is_decisive()) {
        return false;
    }
    let mean: f64 = results.iter().map(|r| r.confidence).sum::<f64>() / SLOT_COUNT as f64;
    if mean < MIN_MEAN_CONFIDENCE {
        return false;
    }
    let weak = results
        .iter()
        .filter(|r| r.confidence < MIN_SLOT_CONFIDENCE)
        .count();
    weak <= 1
}
