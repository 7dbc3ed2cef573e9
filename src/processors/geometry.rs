//! Geometric primitives for answer-sheet processing.
//!
//! Everything here works in integer pixel space: contour envelopes, band
//! offsets and token boxes are all axis-aligned rectangles on a raster.

use imageproc::contours::Contour;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns this point shifted by `(dx, dy)`.
    #[inline]
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// An axis-aligned rectangle in pixel coordinates.
///
/// `x`/`y` is the top-left corner; `width`/`height` are inclusive pixel counts,
/// so a contour touching columns 3..=7 has `x = 3, width = 5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Creates a new rectangle.
    #[inline]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the bounding envelope of a contour, or `None` for an empty contour.
    pub fn from_contour(contour: &Contour<u32>) -> Option<Self> {
        let (x0, x1) = contour.points.iter().map(|p| p.x).minmax().into_option()?;
        let (y0, y1) = contour.points.iter().map(|p| p.y).minmax().into_option()?;
        Some(Self::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }

    /// Exclusive right edge.
    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Center of the rectangle.
    #[inline]
    pub fn center(&self) -> Point {
        Point::new(
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Number of pixels covered.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width divided by height; zero-height rectangles report `f32::INFINITY`.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            f32::INFINITY
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &PixelRect) -> PixelRect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Whether the vertical extents of the two rectangles intersect.
    pub fn overlaps_vertically(&self, other: &PixelRect) -> bool {
        self.y < other.bottom() && other.y < self.bottom()
    }

    /// Grows the rectangle by `margin` on each side, clipped to `[0, max_w) x [0, max_h)`.
    pub fn pad_and_clip(&self, margin: u32, max_w: u32, max_h: u32) -> PixelRect {
        let x0 = self.x.saturating_sub(margin);
        let y0 = self.y.saturating_sub(margin);
        let x1 = self.right().saturating_add(margin).min(max_w);
        let y1 = self.bottom().saturating_add(margin).min(max_h);
        PixelRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    /// Clips the rectangle to `[0, max_w) x [0, max_h)`.
    pub fn clip(&self, max_w: u32, max_h: u32) -> PixelRect {
        self.pad_and_clip(0, max_w, max_h)
    }

    /// Whether the rectangle covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::contours::BorderType;
    use imageproc::point::Point as ImageProcPoint;

    #[test]
    fn test_from_contour_is_inclusive() {
        let contour = Contour {
            points: vec![
                ImageProcPoint::new(3, 2),
                ImageProcPoint::new(7, 2),
                ImageProcPoint::new(7, 9),
                ImageProcPoint::new(3, 9),
            ],
            border_type: BorderType::Outer,
            parent: None,
        };
        let rect = PixelRect::from_contour(&contour).unwrap();
        assert_eq!(rect, PixelRect::new(3, 2, 5, 8));
    }

    #[test]
    fn test_union_and_vertical_overlap() {
        let a = PixelRect::new(0, 10, 10, 10);
        let b = PixelRect::new(30, 15, 5, 20);
        let c = PixelRect::new(30, 20, 5, 5);
        assert!(a.overlaps_vertically(&b));
        assert!(!a.overlaps_vertically(&c));
        assert_eq!(a.union(&b), PixelRect::new(0, 10, 35, 25));
    }

    #[test]
    fn test_pad_and_clip_stays_in_bounds() {
        let rect = PixelRect::new(2, 3, 10, 10);
        let padded = rect.pad_and_clip(5, 14, 100);
        assert_eq!(padded, PixelRect::new(0, 0, 14, 18));
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < f32::EPSILON);
    }
}
