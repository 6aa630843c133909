use image::{GrayImage, Luma};

/// Dark disk with an edge at the given radius fraction, on a light
/// background. Rotation-invariant, so rotated descriptor variants cannot
/// confuse two textures that differ only in radius.
pub(crate) fn ring_texture(side: u32, radius_frac: f32) -> GrayImage {
    let c = (side as f32 - 1.0) / 2.0;
    GrayImage::from_fn(side, side, |x, y| {
        let r = (x as f32 - c).hypot(y as f32 - c) / side as f32;
        if r < radius_frac {
            Luma([60])
        } else {
            Luma([210])
        }
    })
}
