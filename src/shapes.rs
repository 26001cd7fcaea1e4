use nalgebra as na;

use crate::P2;

/// Represents an axis-aligned rectangle defined by two points: the start (low
/// corner) and the end (high corner). It bounds the kd-tree, and its splits are
/// the cells used to prune nearest-neighbor searches.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    start: P2,
    center: P2,
    end: P2,
}

impl Rect {
    /// Create a new rect with a start and end point
    pub fn new(start: P2, end: P2) -> Self {
        Self {
            start,
            center: na::center(&start, &end),
            end,
        }
    }

    /// Get the start point of the rect
    pub fn start(&self) -> P2 {
        self.start
    }

    /// Get the end point of the rect
    pub fn end(&self) -> P2 {
        self.end
    }

    /// Get the center point of the rect
    pub fn center(&self) -> P2 {
        self.center
    }

    /// Check that the start point is nowhere above the end point
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Check if a point exists within the rect. The boundary counts as inside.
    pub fn contains(&self, point: &P2) -> bool {
        *point >= self.start && *point <= self.end
    }

    /// Squared distance from `point` to the nearest point of the rect, zero if
    /// the point is inside
    pub fn distance_sq(&self, point: &P2) -> f64 {
        let dx = (self.start.x - point.x).max(0.).max(point.x - self.end.x);
        let dy = (self.start.y - point.y).max(0.).max(point.y - self.end.y);
        dx * dx + dy * dy
    }

    /// Split the rect along dimension `dim` at coordinate `value`.
    ///
    /// **Returns** the low part (upper bound clamped to `value`) and the high
    /// part (lower bound clamped to `value`). Both keep the shared boundary.
    pub fn split(&self, dim: usize, value: f64) -> (Self, Self) {
        let mut low_end = self.end;
        low_end[dim] = value;
        let mut high_start = self.start;
        high_start[dim] = value;
        (Rect::new(self.start, low_end), Rect::new(high_start, self.end))
    }
}
