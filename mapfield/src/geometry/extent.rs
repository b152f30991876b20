//! Bounding extent type.

use super::Position;

/// Axis-aligned bounding box over map coordinates.
///
/// An empty extent starts inverted (`+inf` minimums, `-inf` maximums) so
/// that including the first position always produces a valid box. Empty or
/// degenerate-input extents are therefore non-finite, which is the signal
/// the engine uses to skip view fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Extent {
    /// Creates an empty (inverted) extent.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Creates an extent from explicit bounds.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
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

    /// Grows the extent to include a position.
    pub fn include(&mut self, position: Position) {
        let (x, y) = position;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Grows the extent to include another extent.
    pub fn include_extent(&mut self, other: &Extent) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Returns the center of the extent.
    pub fn center(&self) -> Position {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when all bounds are finite numbers and the box is not inverted.
    ///
    /// View fitting must only be attempted on finite extents.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    /// True if the position lies inside or on the boundary of the extent.
    pub fn contains(&self, position: Position) -> bool {
        let (x, y) = position;
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}
