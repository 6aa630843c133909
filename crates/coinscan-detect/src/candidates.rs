//! Hole-derived coin candidates and their validity filters.
//!
//! The square hole at a coin's center is the detection anchor: it is more
//! scale-invariant than the outer boundary and survives partial occlusion of
//! the rim. A candidate region is reconstructed around a validated hole.

use coinscan_core::RectF;

use crate::contour::ContourNode;
use crate::detector::CandidateFilter;

/// Coin region proposal in image-pixel coordinates.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Candidate {
    pub rect: RectF,
    pub area: f32,
}

/// Scale factor from hole size to coin size, derived from the observed
/// parent/hole area ratio and clamped to the physically plausible band.
pub(crate) fn scale_from_outer(outer: &RectF, hole: &RectF) -> f32 {
    let outer_area = outer.area();
    let hole_area = hole.area();
    if outer_area <= 0.0 || hole_area <= 0.0 {
        return 3.4;
    }
    (outer_area / hole_area).sqrt().clamp(2.6, 4.8)
}

/// A hole is plausible when it is a small, near-square, centred child of its
/// parent contour.
pub(crate) fn is_valid_hole(hole: &RectF, outer: &RectF) -> bool {
    if outer.width <= 0.0 || outer.height <= 0.0 {
        return false;
    }
    let area_ratio = hole.area() / outer.area();
    if !(0.04..0.35).contains(&area_ratio) {
        return false;
    }
    let aspect = hole.aspect();
    if !(0.5..1.5).contains(&aspect) {
        return false;
    }
    let max_offset = 0.2 * outer.min_side();
    let d = hole.center() - outer.center();
    d.x.abs() <= max_offset && d.y.abs() <= max_offset
}

/// Fallback acceptance test for a top-level blob treated as a bare hole.
pub(crate) fn is_standalone_hole(hole: &RectF) -> bool {
    let area = hole.area();
    if area <= 0.0 {
        return false;
    }
    let aspect = hole.aspect();
    (0.7..1.3).contains(&aspect) && area > 0.000_05 && area < 0.005
}

/// Square region grown from a hole by `scale`, clamped to the unit rect.
pub(crate) fn derived_rect(hole: &RectF, scale: f32) -> Option<RectF> {
    if scale <= 0.0 {
        return None;
    }
    let side = hole.max_side() * scale;
    RectF::square_at(hole.center(), side).clamp_unit()
}

/// Apply the aspect/area filters and convert to pixel coordinates.
pub(crate) fn candidate_from_norm_rect(
    norm_rect: &RectF,
    img_width: u32,
    img_height: u32,
    filter: &CandidateFilter,
) -> Option<Candidate> {
    let rect = norm_rect.to_pixels(img_width, img_height);
    let image_area = (img_width as f32) * (img_height as f32);
    if image_area <= 0.0 {
        return None;
    }
    let area = rect.area();
    let area_ratio = area / image_area;
    let aspect = rect.aspect();

    if aspect <= filter.min_aspect || aspect >= filter.max_aspect {
        return None;
    }
    if area_ratio <= filter.min_area_ratio || area_ratio >= filter.max_area_ratio {
        return None;
    }
    Some(Candidate { rect, area })
}

/// Candidates derived from every validated hole in a contour tree.
///
/// With `allow_standalone` set, small near-square top-level blobs are also
/// treated as holes with a fixed scale factor; this is the last-resort pass
/// when nested holes were not found anywhere.
pub(crate) fn hole_derived_candidates(
    nodes: &[ContourNode],
    img_width: u32,
    img_height: u32,
    allow_standalone: bool,
    filter: &CandidateFilter,
) -> Vec<Candidate> {
    let mut out = Vec::new();

    for node in nodes {
        for child in &node.children {
            if !is_valid_hole(&child.rect, &node.rect) {
                continue;
            }
            let scale = scale_from_outer(&node.rect, &child.rect);
            if let Some(derived) = derived_rect(&child.rect, scale) {
                if let Some(candidate) =
                    candidate_from_norm_rect(&derived, img_width, img_height, filter)
                {
                    out.push(candidate);
                }
            }
        }

        if allow_standalone && is_standalone_hole(&node.rect) {
            if let Some(derived) = derived_rect(&node.rect, 3.4) {
                if let Some(candidate) =
                    candidate_from_norm_rect(&derived, img_width, img_height, filter)
                {
                    out.push(candidate);
                }
            }
        }
    }

    out
}

fn is_duplicate(candidate: &Candidate, kept: &Candidate) -> bool {
    let d = candidate.rect.center() - kept.rect.center();
    let distance = d.x.hypot(d.y);
    let threshold = candidate.rect.min_side().min(kept.rect.min_side()) * 0.3;
    distance < threshold || candidate.rect.iou(&kept.rect) > 0.4
}

/// Drop near-coincident candidates, preferring the larger region.
pub(crate) fn dedupe_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.area.total_cmp(&a.area));
    let mut unique: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if unique.iter().any(|kept| is_duplicate(&candidate, kept)) {
            continue;
        }
        unique.push(candidate);
    }
    unique
}
