//! High-level pipeline helpers.

use image::GrayImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

use coinscan_core::ops::zoomed_variants;
use coinscan_core::{Reading, ReadingError};
use coinscan_detect::{
    ContourCoinDetector, ContourExtractor, DetectError, DetectedRegion, DetectorParams,
    ThresholdContourExtractor,
};
use coinscan_match::{
    calibrate, calibrate_descriptors, calibrate_distances, CalibratedTemplates, CalibrationError,
    ClassifierCalibration, CoinMatcher, DistanceCalibration, Embedder, GradientEmbedder,
    ReferenceTemplateSet,
};

/// Zoom scales for the one-shot photo flow's candidate crops.
const PHOTO_ZOOMS: [f32; 3] = [1.0, 0.82, 0.68];

/// Errors produced by the high-level helpers.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Reading(#[from] ReadingError),
}

/// Build an `image::GrayImage` from a raw grayscale buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<GrayImage, PipelineError> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .ok_or(PipelineError::InvalidGrayDimensions { width, height })?;
    if pixels.len() != expected {
        return Err(PipelineError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(PipelineError::InvalidGrayDimensions { width, height })
}

/// Detect the six coin regions of a free-form photo using the built-in
/// contour extractor.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(image), fields(width = image.width(), height = image.height()))
)]
pub fn detect_coins(image: &GrayImage) -> Result<Vec<DetectedRegion>, PipelineError> {
    detect_coins_with(
        image,
        ThresholdContourExtractor::default(),
        DetectorParams::default(),
    )
}

/// Detect with an injected contour extractor (e.g. a platform primitive).
pub fn detect_coins_with<E: ContourExtractor>(
    image: &GrayImage,
    extractor: E,
    params: DetectorParams,
) -> Result<Vec<DetectedRegion>, PipelineError> {
    let detector = ContourCoinDetector::new(extractor).with_params(params);
    Ok(detector.detect(image)?)
}

/// Calibrate a reference template set from sample images of each face,
/// using the built-in gradient embedder.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(front_samples, back_samples),
        fields(front = front_samples.len(), back = back_samples.len())
    )
)]
pub fn calibrate_profile(
    front_samples: &[GrayImage],
    back_samples: &[GrayImage],
) -> Result<CalibratedTemplates, PipelineError> {
    Ok(calibrate(&GradientEmbedder, front_samples, back_samples)?)
}

/// Derive both calibrations for a loaded template set.
///
/// Calibration parameters are never persisted; they are recomputed whenever
/// the active template set changes.
pub fn calibrations_for(
    templates: &ReferenceTemplateSet,
    embedder: &dyn Embedder,
) -> (ClassifierCalibration, DistanceCalibration) {
    (
        calibrate_descriptors(&templates.front.descriptors, &templates.back.descriptors),
        calibrate_distances(embedder, &templates.front.embeddings, &templates.back.embeddings),
    )
}

/// Matcher over a calibrated set, with the built-in embedder attached.
pub fn matcher_for(calibrated: CalibratedTemplates) -> CoinMatcher {
    CoinMatcher::from_calibrated(calibrated).with_embedder(Box::new(GradientEmbedder))
}

/// One-shot classification of six detected regions.
///
/// Pure with respect to its inputs: the same regions and matcher always
/// produce the same reading. Every submitted photo is processed exactly
/// once; there is no frame-drop policy here.
pub fn classify_regions(
    regions: &[DetectedRegion],
    matcher: &CoinMatcher,
) -> Result<Reading, PipelineError> {
    let slots: Vec<(u8, Vec<GrayImage>)> = regions
        .iter()
        .map(|region| {
            let mut candidates = zoomed_variants(&region.image, &PHOTO_ZOOMS);
            if let Some(masked) = &region.masked {
                candidates.extend(zoomed_variants(masked, &PHOTO_ZOOMS));
            }
            (region.position, candidates)
        })
        .collect();

    let results = matcher.match_all(&slots);
    Ok(Reading::from_results(results)?)
}

/// One-shot classification straight from a template set.
///
/// Calibration parameters are derived from the set on the spot, the way a
/// freshly loaded profile would be activated.
pub fn classify_with_templates(
    regions: &[DetectedRegion],
    templates: ReferenceTemplateSet,
) -> Result<Reading, PipelineError> {
    let (descriptor_calibration, distance_calibration) =
        calibrations_for(&templates, &GradientEmbedder);
    let matcher = CoinMatcher::new(templates, descriptor_calibration, distance_calibration)
        .with_embedder(Box::new(GradientEmbedder));
    classify_regions(regions, &matcher)
}
