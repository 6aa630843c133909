use image::GrayImage;

use coinscan_core::RectF;

/// One cropped coin region, assigned to a slot position.
///
/// Produced once per detection pass and consumed immediately by the gate and
/// matcher; never persisted.
#[derive(Clone, Debug)]
pub struct DetectedRegion {
    /// Raw crop.
    pub image: GrayImage,
    /// Circularly masked variant of the crop, when available.
    pub masked: Option<GrayImage>,
    /// Line position, 1..=6 bottom-to-top.
    pub position: u8,
    /// Crop rect in source-image pixels.
    pub rect_px: RectF,
    /// Crop rect normalized to the source image.
    pub rect_norm: RectF,
}
