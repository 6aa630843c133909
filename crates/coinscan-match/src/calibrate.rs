//! Reference-set calibration.
//!
//! Decision thresholds are derived per template set from its own intra-class
//! (within one face) and inter-class (across faces) similarity statistics.
//! A coin whose two faces look almost alike gets a tighter gap requirement
//! than one with strongly distinct faces.

use std::time::{SystemTime, UNIX_EPOCH};

use image::GrayImage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::descriptor::{
    coin_descriptor, cross_similarities, median, pairwise_similarities,
};
use crate::embed::{Embedder, Embedding};
use crate::error::CalibrationError;
use crate::template::{FaceTemplates, ReferenceTemplateSet};

/// Thresholds for the similarity-score classifier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierCalibration {
    /// Minimum score gap between the two faces for a decisive answer.
    pub min_gap: f32,
    /// Minimum best score below which results degrade toward invalid.
    pub min_score: f32,
}

impl Default for ClassifierCalibration {
    fn default() -> Self {
        Self {
            min_gap: 0.05,
            min_score: 0.55,
        }
    }
}

/// Thresholds for the embedding-distance classifier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceCalibration {
    /// Best match distance beyond which neither face is recognizable.
    pub max_match_distance: f32,
    /// Minimum distance gap; a near-tie carries no face information.
    pub min_distance_gap: f32,
    /// Confidence floor for a decisive answer.
    pub min_confidence: f64,
}

impl Default for DistanceCalibration {
    fn default() -> Self {
        Self {
            max_match_distance: 1.5,
            min_distance_gap: 0.005,
            min_confidence: 0.35,
        }
    }
}

/// A calibrated reference set together with its derived thresholds.
#[derive(Clone, Debug)]
pub struct CalibratedTemplates {
    pub templates: ReferenceTemplateSet,
    pub descriptor_calibration: ClassifierCalibration,
    pub distance_calibration: DistanceCalibration,
}

/// Derive score-classifier thresholds from descriptor collections.
///
/// `min_gap = max(0.03, 0.35 * max(intra - inter, 0.02))` and
/// `min_score = max(0.55, mean(intra, inter))`, with medians as the
/// statistics, so both floors always hold.
pub fn calibrate_descriptors(
    front: &[Vec<f32>],
    back: &[Vec<f32>],
) -> ClassifierCalibration {
    let intra: Vec<f32> = pairwise_similarities(front)
        .into_iter()
        .chain(pairwise_similarities(back))
        .collect();
    let inter = cross_similarities(front, back);

    let (Some(intra_median), Some(inter_median)) = (median(&intra), median(&inter)) else {
        return ClassifierCalibration::default();
    };

    let separation = (intra_median - inter_median).max(0.02);
    let calibration = ClassifierCalibration {
        min_gap: (separation * 0.35).max(0.03),
        min_score: ((intra_median + inter_median) / 2.0).max(0.55),
    };
    debug!(
        "descriptor calibration: intra={intra_median:.3} inter={inter_median:.3} -> gap={:.3} score={:.3}",
        calibration.min_gap, calibration.min_score
    );
    calibration
}

/// Derive distance-classifier thresholds from embedding collections.
///
/// Mirrors the descriptor recipe on distance medians: the acceptance
/// envelope widens with the typical intra-class distance and the required
/// gap scales with the observed class separation, never dropping below the
/// fixed floors.
pub fn calibrate_distances(embedder: &dyn Embedder, front: &[Embedding], back: &[Embedding]) -> DistanceCalibration {
    let mut intra = Vec::new();
    for set in [front, back] {
        for i in 0..set.len().saturating_sub(1) {
            for j in (i + 1)..set.len() {
                intra.push(embedder.distance(&set[i], &set[j]));
            }
        }
    }
    let mut inter = Vec::new();
    for f in front {
        for b in back {
            inter.push(embedder.distance(f, b));
        }
    }

    let (Some(intra_median), Some(inter_median)) = (median(&intra), median(&inter)) else {
        return DistanceCalibration::default();
    };

    let defaults = DistanceCalibration::default();
    let separation = (inter_median - intra_median).max(0.01);
    DistanceCalibration {
        max_match_distance: (intra_median * 2.0).max(defaults.max_match_distance),
        min_distance_gap: (separation * 0.35).max(defaults.min_distance_gap),
        min_confidence: defaults.min_confidence,
    }
}

/// Build a reference template set from sample images of each face.
///
/// Every sample contributes a local descriptor and, through the injected
/// embedder, an embedding; samples that fail either representation are
/// skipped. Fails only when no sample of either face produced anything
/// usable.
pub fn calibrate(
    embedder: &dyn Embedder,
    front_samples: &[GrayImage],
    back_samples: &[GrayImage],
) -> Result<CalibratedTemplates, CalibrationError> {
    let front = face_templates(embedder, front_samples, "front");
    let back = face_templates(embedder, back_samples, "back");

    if front.is_empty() || back.is_empty() {
        return Err(CalibrationError::NoUsableSamples {
            front_samples: front_samples.len(),
            back_samples: back_samples.len(),
        });
    }

    let descriptor_calibration = calibrate_descriptors(&front.descriptors, &back.descriptors);
    let distance_calibration = calibrate_distances(embedder, &front.embeddings, &back.embeddings);

    let created_unix_s = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Ok(CalibratedTemplates {
        templates: ReferenceTemplateSet {
            front,
            back,
            created_unix_s,
        },
        descriptor_calibration,
        distance_calibration,
    })
}

fn face_templates(embedder: &dyn Embedder, samples: &[GrayImage], face: &str) -> FaceTemplates {
    let mut templates = FaceTemplates::default();
    for (index, sample) in samples.iter().enumerate() {
        match coin_descriptor(sample) {
            Some(descriptor) => templates.descriptors.push(descriptor),
            None => warn!("{face} sample {index}: no usable descriptor"),
        }
        match embedder.embed(sample) {
            Some(embedding) => templates.embeddings.push(embedding),
            None => warn!("{face} sample {index}: embedding failed"),
        }
    }
    templates
}
