use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

use coinscan_core::ops::{apply_circular_mask, crop_px};
use coinscan_core::{RectF, SLOT_COUNT};

use crate::candidates::{dedupe_candidates, hole_derived_candidates, Candidate};
use crate::contour::ContourExtractor;
use crate::error::DetectError;
use crate::region::DetectedRegion;
use crate::select::select_best_six;

/// Aspect and area acceptance bounds for a coin candidate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CandidateFilter {
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Fraction of the full image area.
    pub min_area_ratio: f32,
    pub max_area_ratio: f32,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            min_aspect: 0.6,
            max_aspect: 1.4,
            min_area_ratio: 0.002,
            max_area_ratio: 0.2,
        }
    }
}

/// Parameters for contour-based coin detection.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DetectorParams {
    #[serde(default)]
    pub filter: CandidateFilter,
    /// Selected regions grow by this fraction beyond the tight box before
    /// cropping, for matching robustness.
    pub pad_fraction: f32,
    /// Contrast used for the boosted retry pass.
    pub boosted_contrast: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            filter: CandidateFilter::default(),
            pad_fraction: 0.3,
            boosted_contrast: 1.3,
        }
    }
}

/// Contour-based detector for free-form photos without alignment guides.
///
/// Runs the injected extractor up to three times (dark-on-light,
/// light-on-dark, contrast-boosted), derives candidates from coin-center
/// holes, and falls back to standalone small blobs before giving up.
pub struct ContourCoinDetector<E> {
    extractor: E,
    params: DetectorParams,
}

impl<E: ContourExtractor> ContourCoinDetector<E> {
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            params: DetectorParams::default(),
        }
    }

    pub fn with_params(mut self, params: DetectorParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Locate the six coin regions of a vertical column.
    ///
    /// On success the regions carry distinct positions 6..=1 assigned
    /// top-to-bottom.
    pub fn detect(&self, image: &GrayImage) -> Result<Vec<DetectedRegion>, DetectError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(DetectError::EmptyImage);
        }
        let filter = &self.params.filter;

        let first_pass = self.extractor.extract(image, true, 1.0);
        let mut pool = hole_derived_candidates(&first_pass, w, h, false, filter);

        if pool.len() < SLOT_COUNT {
            let second_pass = self.extractor.extract(image, false, 1.0);
            pool.extend(hole_derived_candidates(&second_pass, w, h, false, filter));
        }

        if pool.len() < SLOT_COUNT {
            let boosted = self
                .extractor
                .extract(image, true, self.params.boosted_contrast);
            pool.extend(hole_derived_candidates(&boosted, w, h, false, filter));
        }

        if pool.len() < SLOT_COUNT {
            pool.extend(hole_derived_candidates(&first_pass, w, h, true, filter));
        }

        let unique = dedupe_candidates(pool);
        debug!("hole candidates after dedupe: {}", unique.len());

        if unique.len() < SLOT_COUNT {
            return Err(DetectError::NotEnoughCandidates {
                found: unique.len(),
            });
        }

        let selected = select_best_six(unique);
        if selected.len() < SLOT_COUNT {
            return Err(DetectError::NotEnoughCandidates {
                found: selected.len(),
            });
        }

        Ok(self.regions_from_candidates(image, selected))
    }

    fn regions_from_candidates(
        &self,
        image: &GrayImage,
        candidates: Vec<Candidate>,
    ) -> Vec<DetectedRegion> {
        let (w, h) = image.dimensions();
        let bounds = RectF::new(0.0, 0.0, w as f32, h as f32);

        let mut padded: Vec<RectF> = candidates
            .iter()
            .filter_map(|c| {
                c.rect
                    .padded_square(self.params.pad_fraction)
                    .intersection(&bounds)
            })
            .collect();
        padded.sort_by(|a, b| a.center().y.total_cmp(&b.center().y));

        let regions: Vec<DetectedRegion> = padded
            .into_iter()
            .enumerate()
            .filter_map(|(index, rect)| {
                let crop = crop_px(image, &rect)?;
                let masked = apply_circular_mask(&crop);
                Some(DetectedRegion {
                    image: crop,
                    masked: Some(masked),
                    position: (SLOT_COUNT - index) as u8,
                    rect_px: rect,
                    rect_norm: rect.normalized(w, h),
                })
            })
            .collect();

        debug!("coins detected: {}", regions.len());
        regions
    }
}
