//! Grayscale patch operations shared by the detection and matching stages.
//!
//! All functions take and return owned `image::GrayImage` buffers; crops are
//! integral and clipped to the source bounds.

use image::{imageops, GrayImage, Luma};

use crate::rect::RectF;

/// Crop a pixel-space rect, clipped to the image bounds.
///
/// Returns `None` when nothing of the rect lies inside the image.
pub fn crop_px(img: &GrayImage, rect: &RectF) -> Option<GrayImage> {
    let bounds = RectF::new(0.0, 0.0, img.width() as f32, img.height() as f32);
    let rect = rect.intersection(&bounds)?;
    let x = rect.x.floor().max(0.0) as u32;
    let y = rect.y.floor().max(0.0) as u32;
    let w = (rect.width.round() as u32).min(img.width() - x);
    let h = (rect.height.round() as u32).min(img.height() - y);
    if w == 0 || h == 0 {
        return None;
    }
    Some(imageops::crop_imm(img, x, y, w, h).to_image())
}

/// Crop a rect given in normalized image coordinates.
pub fn crop_norm(img: &GrayImage, rect: &RectF) -> Option<GrayImage> {
    crop_px(img, &rect.to_pixels(img.width(), img.height()))
}

/// Central crop keeping `scale` of each dimension.
pub fn center_crop(img: &GrayImage, scale: f32) -> GrayImage {
    if scale >= 0.999 {
        return img.clone();
    }
    let scale = scale.max(0.05);
    let w = img.width() as f32;
    let h = img.height() as f32;
    let rect = RectF::new(
        w * (1.0 - scale) / 2.0,
        h * (1.0 - scale) / 2.0,
        w * scale,
        h * scale,
    );
    crop_px(img, &rect).unwrap_or_else(|| img.clone())
}

/// Centered zoom crops, one per scale. Scale 1.0 yields the input itself.
pub fn zoomed_variants(img: &GrayImage, scales: &[f32]) -> Vec<GrayImage> {
    scales.iter().map(|&s| center_crop(img, s)).collect()
}

/// Bilinear resample to a fixed square.
pub fn resample_square(img: &GrayImage, side: u32) -> GrayImage {
    imageops::resize(img, side, side, imageops::FilterType::Triangle)
}

/// Zero every pixel outside the inscribed circle.
pub fn apply_circular_mask(img: &GrayImage) -> GrayImage {
    let mut out = img.clone();
    let w = out.width() as f32;
    let h = out.height() as f32;
    let cx = (w - 1.0) / 2.0;
    let cy = (h - 1.0) / 2.0;
    let radius = w.min(h) / 2.0;
    let r2 = radius * radius;
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        if dx * dx + dy * dy > r2 {
            *pixel = Luma([0]);
        }
    }
    out
}

/// Linear photometric adjustment around mid-gray.
///
/// `contrast` is multiplicative (1.0 = unchanged), `brightness` is an
/// additive offset in [-1, 1] of full scale.
pub fn adjust_contrast_brightness(img: &GrayImage, contrast: f32, brightness: f32) -> GrayImage {
    let mut out = img.clone();
    let offset = brightness * 255.0;
    for pixel in out.pixels_mut() {
        let v = pixel.0[0] as f32;
        let adjusted = (v - 128.0) * contrast + 128.0 + offset;
        pixel.0[0] = adjusted.clamp(0.0, 255.0) as u8;
    }
    out
}

/// The four 90-degree rotations of a patch, unrotated first.
pub fn rotated_variants(img: &GrayImage) -> [GrayImage; 4] {
    [
        img.clone(),
        imageops::rotate90(img),
        imageops::rotate180(img),
        imageops::rotate270(img),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_patch(side: u32) -> GrayImage {
        GrayImage::from_fn(side, side, |x, _| Luma([(x * 255 / side.max(1)) as u8]))
    }

    #[test]
    fn crop_px_clips_to_bounds() {
        let img = gradient_patch(32);
        let cropped = crop_px(&img, &RectF::new(24.0, 24.0, 16.0, 16.0)).unwrap();
        assert_eq!(cropped.dimensions(), (8, 8));
        assert!(crop_px(&img, &RectF::new(40.0, 0.0, 8.0, 8.0)).is_none());
    }

    #[test]
    fn center_crop_keeps_requested_fraction() {
        let img = gradient_patch(40);
        let cropped = center_crop(&img, 0.5);
        assert_eq!(cropped.dimensions(), (20, 20));
        assert_eq!(center_crop(&img, 1.0).dimensions(), (40, 40));
    }

    #[test]
    fn circular_mask_zeroes_corners_and_keeps_center() {
        let img = GrayImage::from_pixel(32, 32, Luma([200]));
        let masked = apply_circular_mask(&img);
        assert_eq!(masked.get_pixel(0, 0).0[0], 0);
        assert_eq!(masked.get_pixel(31, 31).0[0], 0);
        assert_eq!(masked.get_pixel(16, 16).0[0], 200);
    }

    #[test]
    fn contrast_adjustment_is_clamped() {
        let img = GrayImage::from_pixel(4, 4, Luma([250]));
        let boosted = adjust_contrast_brightness(&img, 1.6, 0.05);
        assert_eq!(boosted.get_pixel(0, 0).0[0], 255);
        let darkened = adjust_contrast_brightness(&img, 0.9, -0.04);
        assert!(darkened.get_pixel(0, 0).0[0] < 250);
    }

    #[test]
    fn rotated_variants_cover_all_quarter_turns() {
        let img = gradient_patch(16);
        let variants = rotated_variants(&img);
        assert_eq!(variants.len(), 4);
        // 90-degree rotation moves the bright right column to a row.
        assert_ne!(variants[0].get_pixel(0, 0), variants[1].get_pixel(0, 0));
    }
}
