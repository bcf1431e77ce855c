use serde::{Deserialize, Serialize};

use crate::core::geo::Point;

/// Axis-aligned rectangle in projected space.
///
/// The midpoint is computed once at construction; fields are read through
/// accessors so a `Bounds` never changes after it is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    mid_x: f64,
    mid_y: f64,
}

impl Bounds {
    /// Creates bounds from individual coordinates
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            mid_x: (min_x + max_x) / 2.0,
            mid_y: (min_y + max_y) / 2.0,
        }
    }

    /// The `[0,1]×[0,1]` square every projected cluster point falls into
    pub fn unit() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }

    /// Creates a square of side `span` centred on `center`
    pub fn from_center_and_span(center: Point, span: f64) -> Self {
        let half_span = span / 2.0;
        Self::new(
            center.x - half_span,
            center.x + half_span,
            center.y - half_span,
            center.y + half_span,
        )
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn mid_x(&self) -> f64 {
        self.mid_x
    }

    pub fn mid_y(&self) -> f64 {
        self.mid_y
    }

    /// Gets the width of the bounds
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Gets the height of the bounds
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> Point {
        Point::new(self.mid_x, self.mid_y)
    }

    /// Checks if the bounds contain a point (edges inclusive)
    pub fn contains(&self, point: &Point) -> bool {
        self.min_x <= point.x
            && point.x <= self.max_x
            && self.min_y <= point.y
            && point.y <= self.max_y
    }

    /// Checks if `other` lies entirely within these bounds
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Checks if the bounds overlap another bounds.
    ///
    /// Edges touching without overlap do not count.
    pub fn intersects(&self, other: &Bounds) -> bool {
        other.min_x < self.max_x
            && self.min_x < other.max_x
            && other.min_y < self.max_y
            && self.min_y < other.max_y
    }

    /// Splits the bounds at the midpoint into
    /// `[top-left, top-right, bottom-left, bottom-right]`
    pub fn quadrants(&self) -> [Bounds; 4] {
        [
            Bounds::new(self.min_x, self.mid_x, self.min_y, self.mid_y),
            Bounds::new(self.mid_x, self.max_x, self.min_y, self.mid_y),
            Bounds::new(self.min_x, self.mid_x, self.mid_y, self.max_y),
            Bounds::new(self.mid_x, self.max_x, self.mid_y, self.max_y),
        ]
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unit()
    }
}
