//! Rectangle and oriented box types used by the detection pipeline.

use std::fmt;

use nalgebra::Point2;

/// An axis-aligned rectangle with `f32` coordinates.
///
/// Rectangles are allowed to have zero height and/or width. Negative dimensions are
/// not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x_center: f32,
    y_center: f32,
    width: f32,
    height: f32,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y_center
    }

    /// Returns the X coordinate of the left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.x_center - self.width * 0.5
    }

    /// Returns the Y coordinate of the top edge.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y_center - self.height * 0.5
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Computes the intersection of `self` and `other`, returning [`None`] when the
    /// rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x().max(other.x());
        let y_min = self.y().max(other.y());
        let x_max = (self.x() + self.width).min(other.x() + other.width);
        let y_max = (self.y() + self.height).min(other.y() + other.height);
        if x_min >= x_max || y_min >= y_max {
            return None;
        }

        Some(Rect::from_top_left(
            x_min,
            y_min,
            x_max - x_min,
            y_max - y_min,
        ))
    }

    /// Returns the area shared by `self` and `other`.
    pub fn intersection_area(&self, other: &Rect) -> f32 {
        self.intersection(other).map_or(0.0, |rect| rect.area())
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// A rotated, scaled quadrilateral in original image coordinates.
///
/// This is the caller-facing output of palm detection: four corner points describing
/// the enlarged, rotation-corrected hand region. Corners are stored in the order the
/// canonical crop expects them (top-left, top-right, bottom-right, bottom-left of
/// the *rectified* region).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    corners: [Point2<f32>; 4],
}

impl OrientedBox {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    #[inline]
    pub fn corners(&self) -> &[Point2<f32>; 4] {
        &self.corners
    }

    /// Returns the centroid of the four corners.
    pub fn center(&self) -> Point2<f32> {
        let sum = self
            .corners
            .iter()
            .fold(Point2::origin(), |acc: Point2<f32>, c| acc + c.coords);
        sum / 4.0
    }
}
