//! Error types for emstree.

use thiserror::Error;

/// Errors reported by the kd-tree, the quake heap and the EMST builder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A point lies outside the bounding box.
    #[error("point ({x}, {y}) lies outside the bounding box")]
    OutOfBounds {
        /// X coordinate of the rejected point.
        x: f64,
        /// Y coordinate of the rejected point.
        y: f64,
    },

    /// A point with exactly these coordinates is already stored.
    #[error("duplicate point ({x}, {y})")]
    DuplicatePoint {
        /// X coordinate of the duplicate.
        x: f64,
        /// Y coordinate of the duplicate.
        y: f64,
    },

    /// No stored point has these coordinates.
    #[error("no point at ({x}, {y})")]
    NotFound {
        /// X coordinate that was looked up.
        x: f64,
        /// Y coordinate that was looked up.
        y: f64,
    },

    /// Extract-min on an empty heap.
    #[error("empty heap")]
    EmptyHeap,

    /// A tuning parameter or key update was rejected.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The start vertex was never added to the point set.
    #[error("unknown start point: {0}")]
    UnknownStart(String),

    /// A point with this label was already added.
    #[error("duplicate label: {0}")]
    DuplicateLabel(String),

    /// The locator's leaf has been extracted or the heap was cleared.
    #[error("locator no longer refers to a heap entry")]
    StaleLocator,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
