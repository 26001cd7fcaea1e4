use std::collections::{HashMap, HashSet};

use log::{debug, trace};
use nalgebra as na;

use crate::{
    error::{Error, Result},
    kdtree::KdTree,
    quake_heap::QuakeHeap,
    shapes::Rect,
    LabeledPoint,
};

/// Tuning for the builder's candidate heap
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmstConfig {
    /// Number of levels of the quake heap
    pub heap_levels: usize,
    /// Quake ratio of the quake heap, in `[0.5, 1.0]`
    pub quake_ratio: f64,
}

impl Default for EmstConfig {
    fn default() -> Self {
        Self {
            heap_levels: 10,
            quake_ratio: 0.75,
        }
    }
}

/// Candidate edge from a tree vertex to a vertex outside the tree, by index
/// into the point list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Edge {
    from: usize,
    to: usize,
}

/// Euclidean minimum spanning tree over a set of labeled points.
///
/// Points are collected with [`add_point`](Self::add_point) and the tree is
/// grown from a start vertex by [`build_emst`](Self::build_emst), Prim-style.
/// Every tree vertex keeps one candidate edge in the heap, to its nearest
/// vertex still outside the tree. When a vertex joins the tree, the tree
/// vertices whose candidate pointed at it look for a new nearest neighbor.
/// Candidates that went stale some other way are skipped when popped.
#[derive(Debug)]
pub struct EmsTree<T> {
    bbox: Rect,
    points: Vec<T>,
    index_of: HashMap<String, usize>,
    in_tree: Vec<bool>,
    edges: Vec<Edge>,
    kd_tree: KdTree<T>,
    heap: QuakeHeap<f64, Edge>,
    // dependents[p]: tree vertices whose candidate currently targets p
    dependents: Vec<Vec<usize>>,
}

impl<T: LabeledPoint + Clone> EmsTree<T> {
    /// Create an empty EMST over points within `bbox`
    pub fn new(bbox: Rect) -> Self {
        Self::with_heap(bbox, QuakeHeap::default())
    }

    /// Create an empty EMST with custom heap settings
    pub fn with_config(bbox: Rect, config: EmstConfig) -> Result<Self> {
        let mut heap = QuakeHeap::new(config.heap_levels)?;
        heap.set_quake_ratio(config.quake_ratio)?;
        Ok(Self::with_heap(bbox, heap))
    }

    fn with_heap(bbox: Rect, heap: QuakeHeap<f64, Edge>) -> Self {
        Self {
            bbox,
            points: Vec::new(),
            index_of: HashMap::new(),
            in_tree: Vec::new(),
            edges: Vec::new(),
            kd_tree: KdTree::new(bbox),
            heap,
            dependents: Vec::new(),
        }
    }

    /// Number of points added
    pub fn size(&self) -> usize {
        self.points.len()
    }

    /// Same as [`size`](Self::size)
    pub fn len(&self) -> usize {
        self.size()
    }

    /// Check if no points have been added
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get the bounding box
    pub fn bbox(&self) -> &Rect {
        &self.bbox
    }

    /// Remove all points and the last built tree
    pub fn clear(&mut self) {
        self.points.clear();
        self.index_of.clear();
        self.in_tree.clear();
        self.edges.clear();
        self.kd_tree.clear();
        self.heap.clear();
        self.dependents.clear();
    }

    /// Add a point to the vertex set
    ///
    /// **Errors** with [`Error::OutOfBounds`] for points outside the bounding
    /// box and [`Error::DuplicateLabel`] if the label is taken. A point whose
    /// coordinates match an earlier point is kept in the vertex set but not
    /// in the kd-tree; building the tree will then fail.
    pub fn add_point(&mut self, item: T) -> Result<()> {
        if self.index_of.contains_key(item.label()) {
            return Err(Error::DuplicateLabel(item.label().to_owned()));
        }
        self.kd_tree.insert_ignoring_duplicates(item.clone())?;

        self.index_of
            .insert(item.label().to_owned(), self.points.len());
        self.points.push(item);
        self.dependents.push(Vec::new());
        Ok(())
    }

    /// Build the spanning tree starting from `start`
    ///
    /// **Returns** the build trace: `new-nn: (S->N)` for the start vertex and its
    /// nearest neighbor, then one `add: (U--V) new-nn:` line per absorbed
    /// vertex, followed by the sorted ` (P->Q)` nearest-neighbor pairs of tree
    /// vertices not reported on an earlier line.
    ///
    /// **Errors** with [`Error::OutOfBounds`] if `start` lies outside the
    /// bounding box and [`Error::UnknownStart`] if it was never added.
    pub fn build_emst(&mut self, start: &T) -> Result<Vec<String>> {
        let start_point = start.point();
        if !self.bbox.contains(&start_point) {
            return Err(Error::OutOfBounds {
                x: start_point.x,
                y: start_point.y,
            });
        }
        let start = match self.index_of.get(start.label()) {
            Some(&index) if self.points[index].point() == start_point => index,
            _ => return Err(Error::UnknownStart(start.label().to_owned())),
        };
        debug!(
            "building EMST over {} points from {}",
            self.points.len(),
            self.label(start)
        );

        self.initialize(start)?;

        let mut trace = Vec::new();
        let Some(nn) = self.nearest_outside(start) else {
            return Ok(trace);
        };
        let mut reported = HashSet::new();
        reported.insert(self.nn_pair(start, nn));
        trace.push(format!("new-nn: {}", self.nn_pair(start, nn).trim_start()));
        self.add_near_neighbor(start, nn);

        while !self.kd_tree.is_empty() {
            let edge = self.heap.extract_min()?;
            if self.in_tree[edge.to] {
                continue;
            }
            self.add_edge(edge)?;

            let mut line = format!(
                "add: ({}--{}) new-nn:",
                self.label(edge.from),
                self.label(edge.to)
            );
            let mut fresh: Vec<String> = (0..self.points.len())
                .filter(|&p| self.in_tree[p])
                .filter_map(|p| self.nearest_outside(p).map(|nn| self.nn_pair(p, nn)))
                .filter(|pair| !reported.contains(pair))
                .collect();
            fresh.sort();
            for pair in fresh {
                line.push_str(&pair);
                reported.insert(pair);
            }
            trace.push(line);
        }

        debug!("EMST built with {} edges", self.edges.len());
        Ok(trace)
    }

    /// List the edges of the last built tree as `(U,V)`, in the order they
    /// were added
    pub fn list_emst(&self) -> Vec<String> {
        self.edges
            .iter()
            .map(|e| format!("({},{})", self.label(e.from), self.label(e.to)))
            .collect()
    }

    /// Iterate over the edges of the last built tree, in the order they were added
    pub fn edges(&self) -> impl Iterator<Item = (&T, &T)> + '_ {
        self.edges
            .iter()
            .map(|e| (&self.points[e.from], &self.points[e.to]))
    }

    /// Sum of the Euclidean lengths of the tree's edges
    pub fn total_length(&self) -> f64 {
        self.edges()
            .map(|(u, v)| na::distance(&u.point(), &v.point()))
            .sum()
    }

    fn initialize(&mut self, start: usize) -> Result<()> {
        self.edges.clear();
        self.in_tree.clear();
        self.in_tree.resize(self.points.len(), false);
        self.heap.clear();
        for deps in &mut self.dependents {
            deps.clear();
        }

        self.kd_tree.clear();
        for (index, item) in self.points.iter().enumerate() {
            if index != start {
                self.kd_tree.insert(item.clone())?;
            }
        }
        self.in_tree[start] = true;
        Ok(())
    }

    /// Absorb `edge.to` into the tree and refresh the candidates that pointed at it
    fn add_edge(&mut self, edge: Edge) -> Result<()> {
        trace!("adding edge {}--{}", self.label(edge.from), self.label(edge.to));
        self.edges.push(edge);
        self.in_tree[edge.to] = true;
        self.kd_tree.delete(&self.points[edge.to].point())?;

        let mut stale = std::mem::take(&mut self.dependents[edge.to]);
        stale.push(edge.to);
        for vertex in stale {
            let Some(nn) = self.nearest_outside(vertex) else {
                break;
            };
            self.add_near_neighbor(vertex, nn);
        }
        Ok(())
    }

    fn add_near_neighbor(&mut self, from: usize, to: usize) {
        let dist = na::distance_squared(&self.points[from].point(), &self.points[to].point());
        trace!(
            "candidate {}->{} at {dist}",
            self.label(from),
            self.label(to)
        );
        self.heap.insert(dist, Edge { from, to });
        self.dependents[to].push(from);
    }

    /// Index of the nearest vertex still outside the tree
    fn nearest_outside(&self, vertex: usize) -> Option<usize> {
        self.kd_tree
            .nearest_neighbor(&self.points[vertex].point())
            .and_then(|nn| self.index_of.get(nn.label()).copied())
    }

    fn nn_pair(&self, from: usize, to: usize) -> String {
        format!(" ({}->{})", self.label(from), self.label(to))
    }

    fn label(&self, index: usize) -> &str {
        self.points[index].label()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        util::tests::{make_airport, make_rect},
        Airport,
    };

    use super::*;

    fn make_emst(points: &[(&str, f64, f64)]) -> EmsTree<Airport> {
        let mut emst = EmsTree::new(make_rect(0.0, 0.0, 100.0, 100.0));
        for &(code, x, y) in points {
            emst.add_point(make_airport(code, x, y))
                .expect("Test points should be accepted");
        }
        emst
    }

    fn squared_weight(emst: &EmsTree<Airport>) -> f64 {
        emst.edges()
            .map(|(u, v)| na::distance_squared(&u.point(), &v.point()))
            .sum()
    }

    #[test]
    fn three_points() {
        let mut emst = make_emst(&[("A", 10.0, 10.0), ("B", 20.0, 20.0), ("C", 40.0, 10.0)]);
        let trace = emst
            .build_emst(&make_airport("A", 10.0, 10.0))
            .expect("Build should succeed");

        assert_eq!(
            trace,
            vec![
                "new-nn: (A->B)",
                "add: (A--B) new-nn: (A->C) (B->C)",
                "add: (B--C) new-nn:",
            ]
        );
        assert_eq!(emst.list_emst(), vec!["(A,B)", "(B,C)"]);
        assert_eq!(squared_weight(&emst), 700.0, "Edge weights are 200 and 500");
    }

    #[test]
    fn unit_square() {
        let mut emst = make_emst(&[
            ("P00", 0.0, 0.0),
            ("P10", 10.0, 0.0),
            ("P01", 0.0, 10.0),
            ("P11", 10.0, 10.0),
        ]);
        let start = make_airport("P00", 0.0, 0.0);
        let trace = emst.build_emst(&start).expect("Build should succeed");
        let edges = emst.list_emst();

        assert_eq!(edges.len(), 3, "Four points need three edges");
        assert_eq!(squared_weight(&emst), 300.0, "Three sides of the square");
        assert_eq!(trace.len(), 4, "One new-nn line and one line per edge");

        let again = emst.build_emst(&start).expect("Rebuild should succeed");
        assert_eq!(again, trace, "Rebuilding gives the same trace");
        assert_eq!(emst.list_emst(), edges, "Rebuilding gives the same edges");
    }

    #[test]
    fn single_point() {
        let mut emst = make_emst(&[("A", 50.0, 50.0)]);
        let trace = emst
            .build_emst(&make_airport("A", 50.0, 50.0))
            .expect("Build should succeed");
        assert!(trace.is_empty(), "A single point has nothing to trace");
        assert!(emst.list_emst().is_empty(), "A single point has no edges");
    }

    #[test]
    fn add_point_out_of_bounds() {
        let mut emst = make_emst(&[]);
        assert_eq!(
            emst.add_point(make_airport("X", 101.0, 5.0)),
            Err(Error::OutOfBounds { x: 101.0, y: 5.0 })
        );
        assert_eq!(emst.size(), 0, "A rejected point is not added");
    }

    #[test]
    fn add_point_duplicate_label() {
        let mut emst = make_emst(&[("A", 1.0, 1.0)]);
        assert_eq!(
            emst.add_point(make_airport("A", 2.0, 2.0)),
            Err(Error::DuplicateLabel("A".to_owned()))
        );
        assert_eq!(emst.size(), 1);
    }

    #[test]
    fn duplicate_coordinates_fail_the_build() {
        let mut emst = make_emst(&[("A", 1.0, 1.0), ("B", 5.0, 5.0), ("C", 5.0, 5.0)]);
        assert_eq!(emst.size(), 3, "The copy is still part of the vertex set");
        assert_eq!(
            emst.build_emst(&make_airport("A", 1.0, 1.0)),
            Err(Error::DuplicatePoint { x: 5.0, y: 5.0 })
        );
    }

    #[test]
    fn build_from_bad_start() {
        let mut emst = make_emst(&[("A", 10.0, 10.0), ("B", 20.0, 20.0)]);
        assert_eq!(
            emst.build_emst(&make_airport("Z", 120.0, 10.0)),
            Err(Error::OutOfBounds { x: 120.0, y: 10.0 })
        );
        assert_eq!(
            emst.build_emst(&make_airport("Z", 30.0, 30.0)),
            Err(Error::UnknownStart("Z".to_owned()))
        );
        assert_eq!(
            emst.build_emst(&make_airport("A", 11.0, 10.0)),
            Err(Error::UnknownStart("A".to_owned())),
            "The start must match a stored point"
        );
    }

    #[test]
    fn clear_resets_everything() {
        let mut emst = make_emst(&[("A", 10.0, 10.0), ("B", 20.0, 20.0)]);
        emst.build_emst(&make_airport("A", 10.0, 10.0))
            .expect("Build should succeed");
        emst.clear();
        assert!(emst.is_empty());
        assert!(emst.list_emst().is_empty());

        emst.add_point(make_airport("A", 30.0, 30.0))
            .expect("Labels are free again after clear");
        assert_eq!(emst.len(), 1);
    }

    #[test]
    fn points_added_after_a_build() {
        let mut emst = make_emst(&[("A", 10.0, 10.0), ("B", 20.0, 20.0)]);
        let a = make_airport("A", 10.0, 10.0);
        emst.build_emst(&a).expect("Build should succeed");
        emst.add_point(make_airport("C", 12.0, 10.0))
            .expect("Point should be accepted");

        emst.build_emst(&a).expect("Rebuild should succeed");
        assert_eq!(emst.list_emst(), vec!["(A,C)", "(C,B)"]);
    }

    #[test]
    fn custom_config() {
        let bbox = make_rect(0.0, 0.0, 100.0, 100.0);
        let config = EmstConfig {
            heap_levels: 2,
            quake_ratio: 0.5,
        };
        let mut emst = EmsTree::with_config(bbox, config).expect("Valid config");
        for (i, (x, y)) in [(1.0, 1.0), (3.0, 1.0), (6.0, 1.0), (10.0, 1.0), (15.0, 1.0)]
            .into_iter()
            .enumerate()
        {
            emst.add_point(make_airport(&format!("P{i}"), x, y))
                .expect("Point should be accepted");
        }
        emst.build_emst(&make_airport("P4", 15.0, 1.0))
            .expect("Build should succeed");
        assert_eq!(
            emst.list_emst(),
            vec!["(P4,P3)", "(P3,P2)", "(P2,P1)", "(P1,P0)"]
        );
        assert_eq!(emst.total_length(), 14.0);

        let bad = EmstConfig {
            quake_ratio: 0.3,
            ..EmstConfig::default()
        };
        assert!(EmsTree::<Airport>::with_config(bbox, bad).is_err());
    }
}
