//! Euclidean minimum spanning trees over labeled 2D points.
//!
//! The tree is grown Prim-style from a start vertex. A [`KdTree`] holds the
//! vertices not yet absorbed and answers nearest-neighbor queries, and a
//! [`QuakeHeap`] keyed by squared distance picks the next edge.
//!
//! ```
//! use emstree::{Airport, EmsTree, Rect};
//! use nalgebra::point;
//!
//! let mut emst = EmsTree::new(Rect::new(point![0.0, 0.0], point![100.0, 100.0]));
//! let a = Airport::new("A", "Alpha", 10.0, 10.0);
//! emst.add_point(a.clone()).unwrap();
//! emst.add_point(Airport::new("B", "Bravo", 20.0, 20.0)).unwrap();
//! emst.add_point(Airport::new("C", "Charlie", 40.0, 10.0)).unwrap();
//!
//! let trace = emst.build_emst(&a).unwrap();
//! assert_eq!(trace[0], "new-nn: (A->B)");
//! assert_eq!(emst.list_emst(), vec!["(A,B)", "(B,C)"]);
//! ```

use std::fmt;

use nalgebra::Point2;

pub mod emst;
pub mod error;
pub mod kdtree;
pub mod quake_heap;
pub mod shapes;
mod util;

pub use emst::{EmsTree, EmstConfig};
pub use error::{Error, Result};
pub use kdtree::KdTree;
pub use quake_heap::{Locator, QuakeHeap};
pub use shapes::Rect;

/// Point type used for all geometry in the crate.
pub type P2 = Point2<f64>;

/// Trait for data stored in the [`KdTree`] and spanned by the [`EmsTree`]:
/// a 2d position plus a label.
///
/// Two labeled points are the same point for the kd-tree when their
/// coordinates are exactly equal; labels are never compared there.
pub trait LabeledPoint {
    /// Get 2d point position
    fn point(&self) -> P2;

    /// Get the label used in traces and edge listings
    fn label(&self) -> &str;

    /// Get coordinate `dim` (0 for x, 1 for y)
    fn coordinate(&self, dim: usize) -> f64 {
        self.point()[dim]
    }
}

/// An airport with a code, a city name and a position. The code is its label.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Airport {
    code: String,
    city: String,
    x: f64,
    y: f64,
}

impl Airport {
    /// Create a new airport
    pub fn new(code: impl Into<String>, city: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            code: code.into(),
            city: city.into(),
            x,
            y,
        }
    }

    /// Get the airport code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the city the airport serves
    pub fn city(&self) -> &str {
        &self.city
    }
}

impl LabeledPoint for Airport {
    fn point(&self) -> P2 {
        P2::new(self.x, self.y)
    }

    fn label(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for Airport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.code, self.city, self.x, self.y)
    }
}
