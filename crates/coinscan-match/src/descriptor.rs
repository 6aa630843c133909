//! Local coin descriptor: the gradient-magnitude map of a normalized,
//! circularly masked crop, flattened and L2-normalized.
//!
//! Deliberately simple and fully reproducible, so the engine can be
//! calibrated analytically and is never wholly dependent on an opaque
//! platform embedding.

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use coinscan_core::ops::resample_square;

/// Side of the canonical descriptor patch.
pub const DESCRIPTOR_SIDE: u32 = 64;

/// The circular mask is applied in the gradient domain at this radius
/// (fraction of the patch side), so the mask boundary itself never
/// contributes edge energy.
const MASK_RADIUS_FRAC: f32 = 0.47;

/// Compute the descriptor for one crop.
///
/// Returns `None` for degenerate input (zero size or a patch with no
/// gradient energy at all, which cannot be normalized).
pub fn coin_descriptor(image: &GrayImage) -> Option<Vec<f32>> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }
    let patch = resample_square(image, DESCRIPTOR_SIDE);
    let gx = horizontal_sobel(&patch);
    let gy = vertical_sobel(&patch);

    let side = DESCRIPTOR_SIDE as f32;
    let center = (side - 1.0) / 2.0;
    let mask_r = MASK_RADIUS_FRAC * side;

    let mut out = Vec::with_capacity((DESCRIPTOR_SIDE * DESCRIPTOR_SIDE) as usize);
    for y in 0..DESCRIPTOR_SIDE {
        for x in 0..DESCRIPTOR_SIDE {
            let radius = (x as f32 - center).hypot(y as f32 - center);
            if radius > mask_r {
                out.push(0.0);
                continue;
            }
            let dx = gx.get_pixel(x, y).0[0] as f32;
            let dy = gy.get_pixel(x, y).0[0] as f32;
            out.push((dx * dx + dy * dy).sqrt());
        }
    }

    let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return None;
    }
    for v in &mut out {
        *v /= norm;
    }
    Some(out)
}

/// Dot product of two descriptors. Both are unit-length, so this is the
/// cosine similarity.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Best similarity of a descriptor against a template collection.
pub fn best_similarity(descriptor: &[f32], templates: &[Vec<f32>]) -> Option<f32> {
    let mut best = f32::NEG_INFINITY;
    for template in templates {
        if template.len() != descriptor.len() {
            continue;
        }
        best = best.max(cosine_similarity(descriptor, template));
    }
    best.is_finite().then_some(best)
}

/// All unordered pairwise similarities within one collection.
pub(crate) fn pairwise_similarities(templates: &[Vec<f32>]) -> Vec<f32> {
    let mut out = Vec::new();
    for i in 0..templates.len().saturating_sub(1) {
        for j in (i + 1)..templates.len() {
            if templates[i].len() == templates[j].len() {
                out.push(cosine_similarity(&templates[i], &templates[j]));
            }
        }
    }
    out
}

/// All cross-collection similarities.
pub(crate) fn cross_similarities(front: &[Vec<f32>], back: &[Vec<f32>]) -> Vec<f32> {
    let mut out = Vec::new();
    for f in front {
        for b in back {
            if f.len() == b.len() {
                out.push(cosine_similarity(f, b));
            }
        }
    }
    out
}

pub(crate) fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Mean of the `k` smallest values; a top-k average is less sensitive to a
/// single lucky or unlucky template than the plain minimum.
pub(crate) fn top_k_average(values: &[f32], k: usize) -> Option<f32> {
    if values.is_empty() || k == 0 {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let count = k.min(sorted.len());
    Some(sorted[..count].iter().sum::<f32>() / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ring_texture;
    use image::Luma;

    #[test]
    fn descriptor_is_unit_length() {
        let d = coin_descriptor(&ring_texture(96, 0.3)).unwrap();
        let norm: f32 = d.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn flat_patch_has_no_descriptor() {
        let flat = GrayImage::from_pixel(64, 64, Luma([128]));
        assert!(coin_descriptor(&flat).is_none());
    }

    #[test]
    fn same_texture_beats_different_texture() {
        let small = coin_descriptor(&ring_texture(96, 0.20)).unwrap();
        let small2 = coin_descriptor(&ring_texture(100, 0.20)).unwrap();
        let large = coin_descriptor(&ring_texture(96, 0.42)).unwrap();

        let same = cosine_similarity(&small, &small2);
        let cross = cosine_similarity(&small, &large);
        assert!(same > 0.9, "same {same}");
        assert!(cross < 0.5, "cross {cross}");
    }

    #[test]
    fn top_k_average_smooths_the_minimum() {
        let values = [0.9, 0.1, 0.5, 0.4];
        let avg = top_k_average(&values, 3).unwrap();
        assert!((avg - (0.1 + 0.4 + 0.5) / 3.0).abs() < 1e-6);
        assert_eq!(top_k_average(&[], 3), None);
    }
}
