//! Deterministic slot-based region extraction.
//!
//! Used by guided flows where the user aligns the coin column against
//! on-screen markers: the six crop rects come straight from the layout, with
//! an optional view-to-image mapping for aspect-fill previews.

use image::GrayImage;

use coinscan_core::ops::{apply_circular_mask, crop_px, zoomed_variants};
use coinscan_core::{RectF, SlotLayout};

use crate::region::DetectedRegion;

/// Fraction of the slot side trimmed off each side before cropping.
const SLOT_INSET_RATIO: f32 = 0.08;

/// Zoom scales used when generating match-time candidates per slot.
const CANDIDATE_ZOOMS: [f32; 3] = [1.0, 0.82, 0.68];

/// Map a rect from view coordinates to image coordinates under aspect-fill
/// scaling (the image is scaled to cover the view and centred, overflow
/// cropped).
pub fn map_view_rect_to_image(
    view_rect: &RectF,
    view_width: f32,
    view_height: f32,
    img_width: u32,
    img_height: u32,
) -> Option<RectF> {
    if view_width <= 0.0 || view_height <= 0.0 {
        return None;
    }
    let iw = img_width as f32;
    let ih = img_height as f32;
    let scale = (view_width / iw).max(view_height / ih);
    if scale <= 0.0 {
        return None;
    }
    let offset_x = (iw * scale - view_width) / 2.0;
    let offset_y = (ih * scale - view_height) / 2.0;

    let mapped = RectF::new(
        (view_rect.x + offset_x) / scale,
        (view_rect.y + offset_y) / scale,
        view_rect.width / scale,
        view_rect.height / scale,
    );
    mapped.intersection(&RectF::new(0.0, 0.0, iw, ih))
}

fn region_from_rect(image: &GrayImage, rect: &RectF, position: u8) -> Option<DetectedRegion> {
    let crop = crop_px(image, rect)?;
    let masked = apply_circular_mask(&crop);
    Some(DetectedRegion {
        image: crop,
        masked: Some(masked),
        position,
        rect_px: *rect,
        rect_norm: rect.normalized(image.width(), image.height()),
    })
}

/// Crop the six slot regions directly from image-sized slots.
pub fn slot_regions(image: &GrayImage, layout: &SlotLayout) -> Vec<DetectedRegion> {
    let (w, h) = image.dimensions();
    layout
        .slots(w as f32, h as f32)
        .iter()
        .filter_map(|slot| {
            let inset = slot.rect.min_side() * SLOT_INSET_RATIO;
            let rect = slot.rect.inset(inset);
            region_from_rect(image, &rect, slot.position)
        })
        .collect()
}

/// Crop the six slot regions through a view-to-image mapping.
///
/// Falls back to [`slot_regions`] when no view size is known.
pub fn slot_regions_in_view(
    image: &GrayImage,
    layout: &SlotLayout,
    view_width: f32,
    view_height: f32,
) -> Vec<DetectedRegion> {
    if view_width <= 0.0 || view_height <= 0.0 {
        return slot_regions(image, layout);
    }
    layout
        .slots(view_width, view_height)
        .iter()
        .filter_map(|slot| {
            let inset = slot.rect.min_side() * SLOT_INSET_RATIO;
            let view_rect = slot.rect.inset(inset);
            let rect = map_view_rect_to_image(
                &view_rect,
                view_width,
                view_height,
                image.width(),
                image.height(),
            )?;
            region_from_rect(image, &rect, slot.position)
        })
        .collect()
}

/// Match-time candidate crops per slot: zoom variants of the raw and masked
/// region, plus small geometric jitter of the slot rect.
///
/// The jitter offsets are expressed in container units of the layout.
pub fn jittered_slot_candidates(
    image: &GrayImage,
    regions: &[DetectedRegion],
    jitter: f32,
) -> Vec<(u8, Vec<GrayImage>)> {
    let bounds = RectF::new(0.0, 0.0, image.width() as f32, image.height() as f32);

    regions
        .iter()
        .map(|region| {
            let mut candidates = zoomed_variants(&region.image, &CANDIDATE_ZOOMS);
            if let Some(masked) = &region.masked {
                candidates.extend(zoomed_variants(masked, &CANDIDATE_ZOOMS));
            }
            if jitter > 0.0 {
                for (dx, dy) in [(-jitter, 0.0), (jitter, 0.0), (0.0, -jitter), (0.0, jitter)] {
                    let shifted = region.rect_px.offset(dx, dy);
                    if !bounds.contains(&shifted) {
                        continue;
                    }
                    if let Some(crop) = crop_px(image, &shifted) {
                        candidates.push(crop);
                    }
                }
            }
            (region.position, candidates)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;

    #[test]
    fn aspect_fill_mapping_round_trips_the_view_center() {
        // 400x800 view over a 480x640 image: scale = max(0.833, 1.25).
        let center = RectF::new(195.0, 395.0, 10.0, 10.0);
        let mapped = map_view_rect_to_image(&center, 400.0, 800.0, 480, 640).unwrap();
        // View center maps to image center.
        assert_relative_eq!(mapped.center().x, 240.0, epsilon = 0.5);
        assert_relative_eq!(mapped.center().y, 320.0, epsilon = 0.5);
        // 1.25x view scale shrinks sizes going back to image space.
        assert_relative_eq!(mapped.width, 8.0, epsilon = 1e-3);
    }

    #[test]
    fn slot_regions_cover_all_six_positions() {
        let img = GrayImage::from_pixel(480, 800, Luma([128]));
        let regions = slot_regions(&img, &SlotLayout::default());
        let mut positions: Vec<u8> = regions.iter().map(|r| r.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn jittered_candidates_include_zoom_and_mask_variants() {
        let img = GrayImage::from_pixel(480, 800, Luma([128]));
        let regions = slot_regions(&img, &SlotLayout::default());
        let candidates = jittered_slot_candidates(&img, &regions, 16.0);
        assert_eq!(candidates.len(), 6);
        for (_, images) in &candidates {
            // 3 zooms raw + 3 zooms masked, plus any in-bounds jitters.
            assert!(images.len() >= 6);
        }
    }
}
