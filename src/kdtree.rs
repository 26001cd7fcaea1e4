use std::mem;

use crate::{
    error::{Error, Result},
    shapes::Rect,
    util::{dist_sq, dist_sq_or_inf},
    LabeledPoint, P2,
};

/// A dynamic 2-d tree over labeled points, bounded by a fixed rect.
///
/// Each node splits its cell along its cutting dimension, alternating between
/// x and y from the root down. Points strictly below the node's coordinate go
/// left, everything else goes right. Exactly equal coordinates are rejected.
#[derive(Debug)]
pub struct KdTree<T> {
    root: Option<Box<Node<T>>>,
    size: usize,
    bbox: Rect,
}

impl<T: LabeledPoint + Clone> KdTree<T> {
    /// Create a new empty kd-tree
    ///
    /// ## Arguments
    /// - `bbox`: The bounding box every inserted point must lie in
    pub fn new(bbox: Rect) -> Self {
        Self {
            root: None,
            size: 0,
            bbox,
        }
    }

    /// Number of points in the tree
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if the tree holds no points
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Get the bounding box of the tree
    pub fn bbox(&self) -> &Rect {
        &self.bbox
    }

    /// Remove all points
    pub fn clear(&mut self) {
        self.root = None;
        self.size = 0;
    }

    /// Find the stored point with exactly these coordinates
    pub fn find(&self, point: &P2) -> Option<&T> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            if n.point.point() == *point {
                return Some(&n.point);
            }
            node = if n.is_left_of(point) {
                n.left.as_deref()
            } else {
                n.right.as_deref()
            };
        }
        None
    }

    /// Insert a point into the kd-tree
    ///
    /// **Errors** with [`Error::OutOfBounds`] if the point is outside the bounding
    /// box and [`Error::DuplicatePoint`] if its coordinates are already stored.
    pub fn insert(&mut self, item: T) -> Result<()> {
        self.check_bounds(&item)?;
        Node::insert(&mut self.root, item, 0)?;
        self.size += 1;
        Ok(())
    }

    /// Insert a point, silently skipping it if its coordinates are already stored
    ///
    /// **Returns** whether the point was inserted
    pub fn insert_ignoring_duplicates(&mut self, item: T) -> Result<bool> {
        self.check_bounds(&item)?;
        match Node::insert(&mut self.root, item, 0) {
            Ok(()) => {
                self.size += 1;
                Ok(true)
            }
            Err(Error::DuplicatePoint { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete the point with exactly these coordinates
    ///
    /// **Returns** the removed point, or [`Error::NotFound`]
    pub fn delete(&mut self, point: &P2) -> Result<T> {
        let removed = Node::delete(&mut self.root, point)?;
        self.size -= 1;
        Ok(removed)
    }

    /// Find the stored point closest to `query`, or `None` if the tree is empty
    ///
    /// Among equally close points the first one reached by the search wins.
    pub fn nearest_neighbor(&self, query: &P2) -> Option<&T> {
        let mut best = None;
        if let Some(root) = self.root.as_deref() {
            root.nearest(query, self.bbox, &mut best);
        }
        best
    }

    fn check_bounds(&self, item: &T) -> Result<()> {
        let point = item.point();
        if self.bbox.contains(&point) {
            Ok(())
        } else {
            Err(Error::OutOfBounds {
                x: point.x,
                y: point.y,
            })
        }
    }
}

/// kd-tree node
///
/// Points in `left` have `coordinate(cut_dim)` strictly below this node's,
/// points in `right` are at or above it.
#[derive(Debug)]
struct Node<T> {
    point: T,
    cut_dim: usize,
    left: Option<Box<Self>>,
    right: Option<Box<Self>>,
}

impl<T: LabeledPoint + Clone> Node<T> {
    fn new(point: T, cut_dim: usize) -> Self {
        Self {
            point,
            cut_dim,
            left: None,
            right: None,
        }
    }

    fn is_left_of(&self, point: &P2) -> bool {
        point[self.cut_dim] < self.point.coordinate(self.cut_dim)
    }

    fn insert(slot: &mut Option<Box<Self>>, item: T, cut_dim: usize) -> Result<()> {
        match slot {
            None => {
                *slot = Some(Box::new(Self::new(item, cut_dim)));
                Ok(())
            }
            Some(node) => {
                let point = item.point();
                if node.point.point() == point {
                    return Err(Error::DuplicatePoint {
                        x: point.x,
                        y: point.y,
                    });
                }
                let next_dim = 1 - node.cut_dim;
                if node.is_left_of(&point) {
                    Self::insert(&mut node.left, item, next_dim)
                } else {
                    Self::insert(&mut node.right, item, next_dim)
                }
            }
        }
    }

    /// Delete from the subtree in `slot`, returning the removed point
    fn delete(slot: &mut Option<Box<Self>>, target: &P2) -> Result<T> {
        let node = match slot {
            Some(node) => node,
            None => {
                return Err(Error::NotFound {
                    x: target.x,
                    y: target.y,
                })
            }
        };

        if node.point.point() != *target {
            return if node.is_left_of(target) {
                Self::delete(&mut node.left, target)
            } else {
                Self::delete(&mut node.right, target)
            };
        }

        let cut_dim = node.cut_dim;
        if let Some(right) = node.right.as_deref() {
            let replacement = right.find_min(cut_dim).clone();
            let key = replacement.point();
            let removed = mem::replace(&mut node.point, replacement);
            Self::delete(&mut node.right, &key)?;
            Ok(removed)
        } else if let Some(left) = node.left.as_deref() {
            let replacement = left.find_min(cut_dim).clone();
            let key = replacement.point();
            let removed = mem::replace(&mut node.point, replacement);
            Self::delete(&mut node.left, &key)?;
            // The new point is the minimum of what remains, so the rest belongs on the right
            node.right = node.left.take();
            Ok(removed)
        } else {
            slot.take().map(|leaf| leaf.point).ok_or(Error::NotFound {
                x: target.x,
                y: target.y,
            })
        }
    }

    /// Point of the subtree with the smallest coordinate along `dim`
    fn find_min(&self, dim: usize) -> &T {
        if self.cut_dim == dim {
            return match self.left.as_deref() {
                Some(left) => left.find_min(dim),
                None => &self.point,
            };
        }

        let mut min = &self.point;
        for child in [self.left.as_deref(), self.right.as_deref()]
            .into_iter()
            .flatten()
        {
            let candidate = child.find_min(dim);
            if candidate.coordinate(dim) < min.coordinate(dim) {
                min = candidate;
            }
        }
        min
    }

    fn nearest<'a>(&'a self, query: &P2, cell: Rect, best: &mut Option<&'a T>) {
        if dist_sq(query, &self.point) < dist_sq_or_inf(query, *best) {
            *best = Some(&self.point);
        }

        let (low_cell, high_cell) = cell.split(self.cut_dim, self.point.coordinate(self.cut_dim));
        let (near, near_cell, far, far_cell) = if self.is_left_of(query) {
            (&self.left, low_cell, &self.right, high_cell)
        } else {
            (&self.right, high_cell, &self.left, low_cell)
        };

        if let Some(near) = near.as_deref() {
            near.nearest(query, near_cell, best);
        }
        if let Some(far) = far.as_deref() {
            if far_cell.distance_sq(query) < dist_sq_or_inf(query, *best) {
                far.nearest(query, far_cell, best);
            }
        }
    }
}
