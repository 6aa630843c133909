use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in `f32` coordinates.
///
/// The same type is used in pixel space and in normalized (unit-square)
/// space; conversion helpers map between the two given an image size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub const UNIT: RectF = RectF {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Square rect of the given side centred on `center`.
    pub fn square_at(center: Point2<f32>, side: f32) -> Self {
        Self {
            x: center.x - side / 2.0,
            y: center.y - side / 2.0,
            width: side,
            height: side,
        }
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Width over height, guarded against degenerate heights.
    #[inline]
    pub fn aspect(&self) -> f32 {
        self.width / self.height.max(1e-6)
    }

    #[inline]
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    #[inline]
    pub fn max_side(&self) -> f32 {
        self.width.max(self.height)
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Shrink the rect by `d` on every side.
    pub fn inset(&self, d: f32) -> Self {
        Self {
            x: self.x + d,
            y: self.y + d,
            width: self.width - 2.0 * d,
            height: self.height - 2.0 * d,
        }
    }

    pub fn contains(&self, other: &RectF) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    pub fn intersection(&self, other: &RectF) -> Option<RectF> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(RectF::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn iou(&self, other: &RectF) -> f32 {
        let Some(inter) = self.intersection(other) else {
            return 0.0;
        };
        let union = self.area() + other.area() - inter.area();
        if union <= 0.0 {
            return 0.0;
        }
        inter.area() / union
    }

    /// Square rect around the same center, sides grown to
    /// `max_side * (1 + padding)`.
    pub fn padded_square(&self, padding: f32) -> Self {
        Self::square_at(self.center(), self.max_side() * (1.0 + padding))
    }

    /// Clamp a normalized rect into the unit square. Returns `None` if
    /// nothing remains.
    pub fn clamp_unit(&self) -> Option<RectF> {
        let x = self.x.max(0.0);
        let y = self.y.max(0.0);
        let width = (self.width - (x - self.x)).min(1.0 - x);
        let height = (self.height - (y - self.y)).min(1.0 - y);
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(RectF::new(x, y, width, height))
    }

    /// Normalized -> pixel coordinates.
    pub fn to_pixels(&self, img_width: u32, img_height: u32) -> RectF {
        let (w, h) = (img_width as f32, img_height as f32);
        RectF::new(self.x * w, self.y * h, self.width * w, self.height * h)
    }

    /// Pixel -> normalized coordinates.
    pub fn normalized(&self, img_width: u32, img_height: u32) -> RectF {
        let (w, h) = (img_width.max(1) as f32, img_height.max(1) as f32);
        RectF::new(self.x / w, self.y / h, self.width / w, self.height / h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn iou_of_identical_rects_is_one() {
        let r = RectF::new(1.0, 2.0, 3.0, 4.0);
        assert_relative_eq!(r.iou(&r), 1.0);
    }

    #[test]
    fn iou_of_disjoint_rects_is_zero() {
        let a = RectF::new(0.0, 0.0, 1.0, 1.0);
        let b = RectF::new(5.0, 5.0, 1.0, 1.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn padded_square_grows_around_center() {
        let r = RectF::new(10.0, 10.0, 10.0, 20.0);
        let p = r.padded_square(0.3);
        assert_relative_eq!(p.width, 26.0);
        assert_relative_eq!(p.height, 26.0);
        assert_relative_eq!(p.center().x, r.center().x);
        assert_relative_eq!(p.center().y, r.center().y);
    }

    #[test]
    fn clamp_unit_drops_fully_outside_rects() {
        assert!(RectF::new(1.2, 0.0, 0.5, 0.5).clamp_unit().is_none());
        let clamped = RectF::new(-0.1, 0.9, 0.3, 0.3).clamp_unit().unwrap();
        assert_relative_eq!(clamped.x, 0.0);
        assert_relative_eq!(clamped.width, 0.2, epsilon = 1e-6);
        assert_relative_eq!(clamped.height, 0.1, epsilon = 1e-6);
    }
}
