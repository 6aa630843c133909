//! Per-slot matching pipeline: variants, both representation paths, and
//! candidate consensus.

use image::GrayImage;
use log::debug;
use rayon::prelude::*;

use coinscan_core::ops::{adjust_contrast_brightness, rotated_variants};
use coinscan_core::{CoinFace, CoinResult};

use crate::calibrate::{CalibratedTemplates, ClassifierCalibration, DistanceCalibration};
use crate::classify::{classify_distances, classify_scores, Classification};
use crate::consensus::{merge_paths, prefer, reliability_adjusted, resolve_candidate_evidence};
use crate::descriptor::{best_similarity, coin_descriptor, top_k_average};
use crate::embed::Embedder;
use crate::template::ReferenceTemplateSet;

/// Photometric variants probed on the embedding path; matching against a
/// slightly pushed and a slightly pulled exposure absorbs lighting drift
/// between calibration and capture.
const PHOTOMETRIC_VARIANTS: [(f32, f32); 2] = [(1.25, 0.04), (0.9, -0.04)];

/// Template distances per class are reduced by the mean of this many
/// smallest values rather than the single minimum.
const DISTANCE_TOP_K: usize = 3;

/// Matcher for one reference template set.
///
/// Stateless between calls: classifying the same regions against the same
/// set twice yields identical results.
pub struct CoinMatcher {
    templates: ReferenceTemplateSet,
    descriptor_calibration: ClassifierCalibration,
    distance_calibration: DistanceCalibration,
    embedder: Option<Box<dyn Embedder>>,
}

impl CoinMatcher {
    pub fn new(
        templates: ReferenceTemplateSet,
        descriptor_calibration: ClassifierCalibration,
        distance_calibration: DistanceCalibration,
    ) -> Self {
        Self {
            templates,
            descriptor_calibration,
            distance_calibration,
            embedder: None,
        }
    }

    /// Build a matcher straight from a calibration result.
    pub fn from_calibrated(calibrated: CalibratedTemplates) -> Self {
        Self::new(
            calibrated.templates,
            calibrated.descriptor_calibration,
            calibrated.distance_calibration,
        )
    }

    /// Attach an embedding primitive, enabling the embedding path.
    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn templates(&self) -> &ReferenceTemplateSet {
        &self.templates
    }

    /// The matcher can produce decisive answers at all.
    pub fn has_templates(&self) -> bool {
        self.templates.has_descriptors()
            || (self.embedder.is_some() && self.templates.has_embeddings())
    }

    /// Classify one crop, merging whichever representation paths are
    /// available.
    pub fn match_region(&self, image: &GrayImage) -> Classification {
        let use_descriptors = self.templates.has_descriptors();
        let embedder = self
            .embedder
            .as_deref()
            .filter(|_| self.templates.has_embeddings());

        match (use_descriptors, embedder) {
            (true, Some(embedder)) => merge_paths(
                self.match_by_descriptor(image),
                self.match_by_embedding(embedder, image),
            ),
            (true, None) => self.match_by_descriptor(image),
            (false, Some(embedder)) => self.match_by_embedding(embedder, image),
            (false, None) => Classification::INVALID,
        }
    }

    /// Classify one slot from several candidate crops (jitter, zoom, and
    /// mask variants).
    pub fn match_candidates(&self, candidates: &[GrayImage]) -> Classification {
        let mut best = Classification::INVALID;
        let mut attempts = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let adjusted = reliability_adjusted(self.match_region(candidate));
            best = prefer(best, adjusted);
            attempts.push(adjusted);
        }

        if !attempts.is_empty() {
            let front_evidence: f64 = attempts
                .iter()
                .filter(|a| a.face == CoinFace::Front)
                .map(|a| a.confidence)
                .sum();
            let back_evidence: f64 = attempts
                .iter()
                .filter(|a| a.face == CoinFace::Back)
                .map(|a| a.confidence)
                .sum();
            let front_count = attempts.iter().filter(|a| a.face == CoinFace::Front).count();
            let back_count = attempts.iter().filter(|a| a.face == CoinFace::Back).count();

            let consensus = resolve_candidate_evidence(
                front_evidence,
                back_evidence,
                front_count,
                back_count,
            );
            if consensus.face.is_decisive() {
                return consensus;
            }
        }

        best
    }

    /// Classify all six slots, fanning out across slots in parallel.
    ///
    /// Returns one result per input slot, ordered by position.
    pub fn match_all(&self, slots: &[(u8, Vec<GrayImage>)]) -> Vec<CoinResult> {
        let mut results: Vec<CoinResult> = slots
            .par_iter()
            .map(|(position, candidates)| {
                let c = self.match_candidates(candidates);
                CoinResult::new(*position, c.face, c.confidence)
            })
            .collect();
        results.sort_by_key(|r| r.position);
        debug!(
            "matched {} slots, {} decisive",
            results.len(),
            results.iter().filter(|r| r.face.is_decisive()).count()
        );
        results
    }

    fn match_by_descriptor(&self, image: &GrayImage) -> Classification {
        let mut best = Classification::INVALID;
        for variant in rotated_variants(image) {
            let Some(descriptor) = coin_descriptor(&variant) else {
                continue;
            };
            let (Some(front), Some(back)) = (
                best_similarity(&descriptor, &self.templates.front.descriptors),
                best_similarity(&descriptor, &self.templates.back.descriptors),
            ) else {
                continue;
            };
            let result = classify_scores(front, back, &self.descriptor_calibration);
            best = prefer(best, result);
        }
        best
    }

    fn match_by_embedding(&self, embedder: &dyn Embedder, image: &GrayImage) -> Classification {
        let mut variants = vec![image.clone()];
        variants.extend(
            PHOTOMETRIC_VARIANTS
                .iter()
                .map(|&(contrast, brightness)| {
                    adjust_contrast_brightness(image, contrast, brightness)
                }),
        );

        let mut best = Classification::INVALID;
        for variant in &variants {
            let Some(probe) = embedder.embed(variant) else {
                debug!("embedding failed for a variant, skipping attempt");
                continue;
            };
            let front_distances: Vec<f32> = self
                .templates
                .front
                .embeddings
                .iter()
                .map(|t| embedder.distance(&probe, t))
                .collect();
            let back_distances: Vec<f32> = self
                .templates
                .back
                .embeddings
                .iter()
                .map(|t| embedder.distance(&probe, t))
                .collect();

            let (Some(front), Some(back)) = (
                top_k_average(&front_distances, DISTANCE_TOP_K),
                top_k_average(&back_distances, DISTANCE_TOP_K),
            ) else {
                continue;
            };
            let result = classify_distances(front, back, &self.distance_calibration);
            best = prefer(best, result);
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::calibrate;
    use crate::embed::GradientEmbedder;
    use crate::test_utils::ring_texture;

    fn calibrated_matcher() -> CoinMatcher {
        let embedder = GradientEmbedder;
        let front: Vec<GrayImage> = (0..3).map(|i| ring_texture(96 + 2 * i, 0.20)).collect();
        let back: Vec<GrayImage> = (0..3).map(|i| ring_texture(96 + 2 * i, 0.42)).collect();
        let calibrated = calibrate(&embedder, &front, &back).unwrap();
        CoinMatcher::from_calibrated(calibrated).with_embedder(Box::new(GradientEmbedder))
    }

    #[test]
    fn matches_each_face_of_a_calibrated_set() {
        let matcher = calibrated_matcher();

        let front_result = matcher.match_region(&ring_texture(98, 0.20));
        assert_eq!(front_result.face, CoinFace::Front);
        assert!(front_result.confidence > 0.7);

        let back_result = matcher.match_region(&ring_texture(98, 0.42));
        assert_eq!(back_result.face, CoinFace::Back);
    }

    #[test]
    fn candidate_consensus_resolves_a_unanimous_slot() {
        let matcher = calibrated_matcher();
        let candidates: Vec<GrayImage> =
            (0..4).map(|i| ring_texture(94 + 2 * i, 0.20)).collect();
        let c = matcher.match_candidates(&candidates);
        assert_eq!(c.face, CoinFace::Front);
        assert!(c.confidence > 0.9);
    }

    #[test]
    fn match_all_orders_results_by_position() {
        let matcher = calibrated_matcher();
        let slots: Vec<(u8, Vec<GrayImage>)> = vec![
            (3, vec![ring_texture(96, 0.42), ring_texture(98, 0.42)]),
            (1, vec![ring_texture(96, 0.20), ring_texture(98, 0.20)]),
            (2, vec![ring_texture(96, 0.20), ring_texture(98, 0.20)]),
        ];
        let results = matcher.match_all(&slots);
        let positions: Vec<u8> = results.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(results[0].face, CoinFace::Front);
        assert_eq!(results[2].face, CoinFace::Back);
    }

    #[test]
    fn matcher_without_templates_reports_invalid() {
        let empty = ReferenceTemplateSet {
            front: Default::default(),
            back: Default::default(),
            created_unix_s: 0,
        };
        let matcher = CoinMatcher::new(
            empty,
            ClassifierCalibration::default(),
            DistanceCalibration::default(),
        );
        assert!(!matcher.has_templates());
        let c = matcher.match_region(&ring_texture(96, 0.3));
        assert_eq!(c.face, CoinFace::Invalid);
    }
}
