//! Contour extraction contract and the built-in threshold-based extractor.

use image::{imageops, GrayImage};
use imageproc::contours::{find_contours_with_threshold, BorderType, Contour};
use imageproc::contrast::otsu_level;

use coinscan_core::ops::adjust_contrast_brightness;
use coinscan_core::RectF;

/// One node of a contour hierarchy.
///
/// `rect` is the bounding box of the contour in normalized image
/// coordinates; `children` are the contours nested directly inside it
/// (holes, for a coin-shaped blob).
#[derive(Clone, Debug)]
pub struct ContourNode {
    pub rect: RectF,
    pub is_hole: bool,
    pub children: Vec<ContourNode>,
}

/// Provider of hierarchical contours for a grayscale image.
///
/// Platform-native extraction primitives implement this trait; a failed
/// extraction pass returns an empty vector rather than an error, so one bad
/// pass never aborts the multi-pass retry strategy.
pub trait ContourExtractor {
    /// Extract top-level contours with their nested children.
    ///
    /// `dark_on_light` selects which polarity counts as foreground;
    /// `contrast` > 1 asks for a contrast-boosted pass.
    fn extract(&self, image: &GrayImage, dark_on_light: bool, contrast: f32) -> Vec<ContourNode>;
}

/// Built-in extractor: Otsu binarization plus border following.
///
/// Keeps the engine self-contained when no platform primitive is injected.
/// Images larger than `max_dimension` are downscaled before tracing; all
/// output rects are normalized, so callers never see the working size.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdContourExtractor {
    pub max_dimension: u32,
    /// Contours with a bounding box smaller than this (working pixels) are
    /// discarded as noise.
    pub min_bbox_side: u32,
}

impl Default for ThresholdContourExtractor {
    fn default() -> Self {
        Self {
            max_dimension: 640,
            min_bbox_side: 2,
        }
    }
}

impl ContourExtractor for ThresholdContourExtractor {
    fn extract(&self, image: &GrayImage, dark_on_light: bool, contrast: f32) -> Vec<ContourNode> {
        let mut working = self.downscale(image);
        if (contrast - 1.0).abs() > 1e-3 {
            working = adjust_contrast_brightness(&working, contrast, 0.0);
        }
        if dark_on_light {
            // Border following treats bright pixels as foreground.
            imageops::invert(&mut working);
        }

        let threshold = otsu_level(&working);
        let contours: Vec<Contour<u32>> = find_contours_with_threshold(&working, threshold);
        self.build_tree(&contours, working.width(), working.height())
    }
}

impl ThresholdContourExtractor {
    fn downscale(&self, image: &GrayImage) -> GrayImage {
        let longest = image.width().max(image.height());
        if longest <= self.max_dimension || longest == 0 {
            return image.clone();
        }
        let scale = self.max_dimension as f32 / longest as f32;
        let w = ((image.width() as f32 * scale).round() as u32).max(1);
        let h = ((image.height() as f32 * scale).round() as u32).max(1);
        imageops::resize(image, w, h, imageops::FilterType::Triangle)
    }

    fn build_tree(&self, contours: &[Contour<u32>], width: u32, height: u32) -> Vec<ContourNode> {
        let rects: Vec<Option<RectF>> = contours
            .iter()
            .map(|c| self.bbox_normalized(c, width, height))
            .collect();

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); contours.len()];
        let mut roots: Vec<usize> = Vec::new();
        for (idx, contour) in contours.iter().enumerate() {
            if rects[idx].is_none() {
                continue;
            }
            match contour.parent {
                Some(parent) if parent < contours.len() && rects[parent].is_some() => {
                    children[parent].push(idx);
                }
                _ => roots.push(idx),
            }
        }

        roots
            .into_iter()
            .map(|idx| self.node_at(idx, contours, &rects, &children))
            .collect()
    }

    fn node_at(
        &self,
        idx: usize,
        contours: &[Contour<u32>],
        rects: &[Option<RectF>],
        children: &[Vec<usize>],
    ) -> ContourNode {
        ContourNode {
            rect: rects[idx].expect("filtered in build_tree"),
            is_hole: contours[idx].border_type == BorderType::Hole,
            children: children[idx]
                .iter()
                .map(|&child| self.node_at(child, contours, rects, children))
                .collect(),
        }
    }

    fn bbox_normalized(&self, contour: &Contour<u32>, width: u32, height: u32) -> Option<RectF> {
        if contour.points.is_empty() || width == 0 || height == 0 {
            return None;
        }
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        for p in &contour.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let side_x = max_x - min_x + 1;
        let side_y = max_y - min_y + 1;
        if side_x < self.min_bbox_side || side_y < self.min_bbox_side {
            return None;
        }
        Some(
            RectF::new(
                min_x as f32,
                min_y as f32,
                side_x as f32,
                side_y as f32,
            )
            .normalized(width, height),
        )
    }
}
