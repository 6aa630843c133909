//! Presence/quality gate.
//!
//! Cheap textural statistics over a small resampled patch decide whether a
//! slot holds a coin at all, and whether the crop is clean enough to be
//! worth descriptor matching. One unified quality contract applies to live
//! and photo flows; slot-specific relaxations are explicit overrides.

use std::collections::BTreeMap;

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use serde::{Deserialize, Serialize};

use coinscan_core::ops::{center_crop, resample_square};

/// Largest possible Sobel magnitude on u8 input, used to normalize energy
/// into [0, 1].
const SOBEL_MAG_MAX: f32 = 1442.5;

/// Annulus (in units of the patch side, measured from the center) where a
/// coin's hole and rim edges are expected.
const RING_R0: f32 = 0.32;
const RING_R1: f32 = 0.50;

/// Textural statistics of one candidate patch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresenceMetrics {
    /// Mean gradient magnitude over the patch, normalized to [0, 1].
    pub energy_mean: f32,
    /// Fraction of total gradient energy inside the expected ring.
    pub ring_ratio: f32,
    /// Offset of the energy centroid from the patch center, as a fraction
    /// of the patch side.
    pub centroid_offset: f32,
}

impl PresenceMetrics {
    /// Scalar quality in [0, 1] used by the live-session stabilizer.
    ///
    /// Saturates at twice the nominal presence minimums, so an obviously
    /// present coin scores near 1 regardless of how strong its texture is.
    pub fn quality_score(&self) -> f32 {
        let energy_term = (self.energy_mean / 0.08).min(1.0);
        let ring_term = (self.ring_ratio / 0.24).min(1.0);
        (energy_term + ring_term) / 2.0
    }
}

/// Minimums one slot must clear.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GateThresholds {
    pub min_energy: f32,
    pub min_ring_ratio: f32,
    /// Bound on the energy-centroid offset for the high-quality class.
    pub max_centroid_offset: f32,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_energy: 0.02,
            min_ring_ratio: 0.12,
            max_centroid_offset: 0.12,
        }
    }
}

/// Gate configuration: base thresholds plus explicit per-slot overrides.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresenceCalibration {
    pub base: GateThresholds,
    /// Slot positions with relaxed or tightened thresholds (lighting and
    /// occlusion patterns differ per position).
    #[serde(default)]
    pub slot_overrides: BTreeMap<u8, GateThresholds>,
    /// Side of the analysis patch.
    pub patch_side: u32,
    /// Center-crop scales tried in order until one passes.
    pub scales: Vec<f32>,
}

impl Default for PresenceCalibration {
    fn default() -> Self {
        Self {
            base: GateThresholds::default(),
            slot_overrides: BTreeMap::new(),
            patch_side: 96,
            scales: vec![1.0, 0.75],
        }
    }
}

impl PresenceCalibration {
    pub fn thresholds_for(&self, position: u8) -> GateThresholds {
        self.slot_overrides
            .get(&position)
            .copied()
            .unwrap_or(self.base)
    }
}

/// Classification of one candidate region.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegionQuality {
    /// No coin-like texture.
    Empty,
    /// A coin is present but the crop is off-center or noisy.
    Present,
    /// Clean, centred crop worth full matching.
    High,
}

/// Compute presence statistics for one patch.
///
/// Returns `None` for degenerate patches (zero size or no measurable
/// gradient at all).
pub fn presence_metrics(image: &GrayImage, patch_side: u32) -> Option<PresenceMetrics> {
    if image.width() == 0 || image.height() == 0 || patch_side < 8 {
        return None;
    }
    let patch = resample_square(image, patch_side);
    let gx = horizontal_sobel(&patch);
    let gy = vertical_sobel(&patch);

    let side = patch_side as f32;
    let center = (side - 1.0) / 2.0;

    let mut total = 0.0f64;
    let mut ring = 0.0f64;
    let mut cx = 0.0f64;
    let mut cy = 0.0f64;
    let mut count = 0usize;

    for y in 1..patch_side - 1 {
        for x in 1..patch_side - 1 {
            let dx = gx.get_pixel(x, y).0[0] as f32;
            let dy = gy.get_pixel(x, y).0[0] as f32;
            let mag = (dx * dx + dy * dy).sqrt() as f64;

            total += mag;
            cx += mag * x as f64;
            cy += mag * y as f64;
            count += 1;

            let rx = x as f32 - center;
            let ry = y as f32 - center;
            let radius = (rx * rx + ry * ry).sqrt() / side;
            if (RING_R0..=RING_R1).contains(&radius) {
                ring += mag;
            }
        }
    }

    if count == 0 {
        return None;
    }

    let energy_mean = (total / count as f64) as f32 / SOBEL_MAG_MAX;
    let (ring_ratio, centroid_offset) = if total > 0.0 {
        let centroid_dx = (cx / total) as f32 - center;
        let centroid_dy = (cy / total) as f32 - center;
        (
            (ring / total) as f32,
            centroid_dx.hypot(centroid_dy) / side,
        )
    } else {
        (0.0, 0.0)
    };

    Some(PresenceMetrics {
        energy_mean,
        ring_ratio,
        centroid_offset,
    })
}

/// Gate one region, trying the configured center-crop scales in order.
///
/// Returns the quality class together with the metrics of the deciding
/// attempt (the first passing scale, or the last attempted one).
pub fn evaluate_region(
    image: &GrayImage,
    position: u8,
    calibration: &PresenceCalibration,
) -> (RegionQuality, Option<PresenceMetrics>) {
    let thresholds = calibration.thresholds_for(position);
    let mut last: Option<PresenceMetrics> = None;

    for &scale in &calibration.scales {
        let candidate = center_crop(image, scale);
        let Some(metrics) = presence_metrics(&candidate, calibration.patch_side) else {
            continue;
        };
        last = Some(metrics);

        let present = metrics.energy_mean >= thresholds.min_energy
            && metrics.ring_ratio >= thresholds.min_ring_ratio;
        if present {
            let quality = if metrics.centroid_offset <= thresholds.max_centroid_offset {
                RegionQuality::High
            } else {
                RegionQuality::Present
            };
            return (quality, Some(metrics));
        }
    }

    (RegionQuality::Empty, last)
}
