//! Quake heap: an addressable min-priority queue built from a forest of
//! tournament trees.
//!
//! Leaves (level 0) carry the entries. An internal node at level `k` joins two
//! level `k - 1` trees and copies the smaller child key; the smaller child is
//! always on the left, so following left links from any node leads to the leaf
//! holding its key. A right child may be cut away, leaving a node with a left
//! child only.
//!
//! Extract-min deletes the left path below the minimum root, links trees of
//! equal level pairwise, then "quakes": if some level holds more than
//! `quake_ratio` times as many nodes as the level below it, every node above
//! that level is discarded and the trees are rebuilt on later merges.
//!
//! Nodes live in an arena and refer to each other by index. A [`Locator`]
//! carries the generation of its leaf's slot, so it stops resolving once the
//! leaf is extracted or the heap is cleared.

use std::{cmp::Ordering, fmt, mem};

use log::debug;

use crate::error::{Error, Result};

const DEFAULT_LEVELS: usize = 10;
const DEFAULT_QUAKE_RATIO: f64 = 0.75;

/// Handle to an inserted entry, used for [`QuakeHeap::decrease_key`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Locator {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    // Only leaves carry a value
    value: Option<V>,
    level: usize,
    left: Option<usize>,
    right: Option<usize>,
    parent: Option<usize>,
    generation: u64,
    live: bool,
}

/// Addressable min-priority queue with O(1) insert and decrease-key and
/// O(log n) amortised extract-min.
#[derive(Debug)]
pub struct QuakeHeap<K, V> {
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    roots: Vec<Vec<usize>>,
    node_count: Vec<usize>,
    quake_ratio: f64,
}

impl<K, V> Default for QuakeHeap<K, V> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            roots: vec![Vec::new(); DEFAULT_LEVELS],
            node_count: vec![0; DEFAULT_LEVELS],
            quake_ratio: DEFAULT_QUAKE_RATIO,
        }
    }
}

impl<K: PartialOrd + Clone, V> QuakeHeap<K, V> {
    /// Create an empty heap whose trees have at most `n_levels` levels
    pub fn new(n_levels: usize) -> Result<Self> {
        check_n_levels(n_levels)?;
        Ok(Self {
            roots: (0..n_levels).map(|_| Vec::new()).collect(),
            node_count: vec![0; n_levels],
            ..Self::default()
        })
    }

    /// Number of entries in the heap
    pub fn len(&self) -> usize {
        self.node_count[0]
    }

    /// Check if the heap holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels available to the trees
    pub fn n_levels(&self) -> usize {
        self.roots.len()
    }

    /// The current quake ratio
    pub fn quake_ratio(&self) -> f64 {
        self.quake_ratio
    }

    /// Number of tree nodes at each level, leaves first
    pub fn node_counts(&self) -> &[usize] {
        &self.node_count
    }

    /// Remove every entry. All outstanding locators become stale.
    pub fn clear(&mut self) {
        for index in 0..self.nodes.len() {
            if self.nodes[index].live {
                self.release(index);
            }
        }
        for roots in &mut self.roots {
            roots.clear();
        }
        self.node_count.fill(0);
    }

    /// Insert a key-value pair as a single-leaf tree
    pub fn insert(&mut self, key: K, value: V) -> Locator {
        let index = self.alloc(key, Some(value), 0);
        self.node_count[0] += 1;
        self.make_root(index);
        Locator {
            index,
            generation: self.nodes[index].generation,
        }
    }

    /// Peek at the smallest key without restructuring the forest
    pub fn min_key(&self) -> Option<&K> {
        self.min_root().map(|root| &self.nodes[root].key)
    }

    /// Remove the entry with the smallest key and return its value
    ///
    /// **Errors** with [`Error::EmptyHeap`] if there is nothing to extract.
    pub fn extract_min(&mut self) -> Result<V> {
        if self.node_count[0] == 0 {
            return Err(Error::EmptyHeap);
        }
        let root = self.min_root().ok_or(Error::EmptyHeap)?;
        let level = self.nodes[root].level;
        self.roots[level].retain(|&r| r != root);

        let value = self.delete_left_path(root);
        self.merge_trees();
        self.quake();
        value.ok_or(Error::EmptyHeap)
    }

    /// Lower the key of the entry behind `locator` to `new_key`
    ///
    /// The new key is copied up the chain of left links. If that chain stops at
    /// a right child, the right child is cut loose as a new root.
    ///
    /// **Errors** with [`Error::StaleLocator`] if the entry is gone and
    /// [`Error::InvalidParameter`] if `new_key` is larger than the current key.
    pub fn decrease_key(&mut self, locator: Locator, new_key: K) -> Result<()> {
        let leaf = self.resolve(locator)?;
        if new_key > self.nodes[leaf].key {
            return Err(Error::InvalidParameter(
                "decrease-key with a larger key".to_owned(),
            ));
        }

        let mut child = leaf;
        loop {
            self.nodes[child].key = new_key.clone();
            match self.nodes[child].parent {
                Some(parent) if self.nodes[parent].left == Some(child) => child = parent,
                Some(parent) => {
                    self.cut(parent);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    /// Level of the highest node whose key comes from the entry behind `locator`
    pub fn max_level(&self, locator: Locator) -> Result<usize> {
        let mut node = self.resolve(locator)?;
        while let Some(parent) = self.nodes[node].parent {
            if self.nodes[parent].left != Some(node) {
                break;
            }
            node = parent;
        }
        Ok(self.nodes[node].level)
    }

    /// Set the quake ratio, which must lie in `[0.5, 1.0]`
    pub fn set_quake_ratio(&mut self, ratio: f64) -> Result<()> {
        if !(0.5..=1.0).contains(&ratio) {
            return Err(Error::InvalidParameter(format!(
                "quake ratio {ratio} is outside [0.5, 1.0]"
            )));
        }
        self.quake_ratio = ratio;
        Ok(())
    }

    /// Change the number of levels. Shrinking dismantles every node at the
    /// removed levels, top-down, promoting its children to roots.
    pub fn set_n_levels(&mut self, n_levels: usize) -> Result<()> {
        check_n_levels(n_levels)?;
        let current = self.n_levels();
        if n_levels >= current {
            self.roots.resize_with(n_levels, Vec::new);
            self.node_count.resize(n_levels, 0);
            return Ok(());
        }

        debug!("shrinking quake heap from {current} to {n_levels} levels");
        for level in (n_levels..current).rev() {
            for root in mem::take(&mut self.roots[level]) {
                let (left, right) = (self.nodes[root].left, self.nodes[root].right);
                if let Some(left) = left {
                    self.make_root(left);
                }
                if let Some(right) = right {
                    self.make_root(right);
                }
                self.release(root);
                self.node_count[level] -= 1;
            }
        }
        self.roots.truncate(n_levels);
        self.node_count.truncate(n_levels);
        Ok(())
    }

    fn alloc(&mut self, key: K, value: Option<V>, level: usize) -> usize {
        match self.free.pop() {
            Some(index) => {
                let node = &mut self.nodes[index];
                node.key = key;
                node.value = value;
                node.level = level;
                node.live = true;
                index
            }
            None => {
                self.nodes.push(Node {
                    key,
                    value,
                    level,
                    left: None,
                    right: None,
                    parent: None,
                    generation: 0,
                    live: true,
                });
                self.nodes.len() - 1
            }
        }
    }

    /// Return a slot to the free list, handing back its value if it was a leaf
    fn release(&mut self, index: usize) -> Option<V> {
        let node = &mut self.nodes[index];
        node.live = false;
        node.generation += 1;
        node.left = None;
        node.right = None;
        node.parent = None;
        self.free.push(index);
        node.value.take()
    }

    fn resolve(&self, locator: Locator) -> Result<usize> {
        match self.nodes.get(locator.index) {
            Some(node) if node.live && node.generation == locator.generation && node.level == 0 => {
                Ok(locator.index)
            }
            _ => Err(Error::StaleLocator),
        }
    }

    fn cmp_keys(&self, a: usize, b: usize) -> Ordering {
        self.nodes[a]
            .key
            .partial_cmp(&self.nodes[b].key)
            .unwrap_or(Ordering::Equal)
    }

    fn make_root(&mut self, index: usize) {
        self.nodes[index].parent = None;
        let level = self.nodes[index].level;
        self.roots[level].push(index);
    }

    /// Detach the right subtree of `index` and make it a root
    fn cut(&mut self, index: usize) {
        if let Some(right) = self.nodes[index].right.take() {
            self.make_root(right);
        }
    }

    /// Join two trees of the same level under a new root. The smaller key
    /// goes left.
    fn link(&mut self, u: usize, v: usize) -> usize {
        let (small, large) = if self.nodes[u].key <= self.nodes[v].key {
            (u, v)
        } else {
            (v, u)
        };
        let level = self.nodes[small].level + 1;
        let key = self.nodes[small].key.clone();
        let w = self.alloc(key, None, level);
        self.nodes[w].left = Some(small);
        self.nodes[w].right = Some(large);
        self.nodes[small].parent = Some(w);
        self.nodes[large].parent = Some(w);
        self.node_count[level] += 1;
        w
    }

    fn min_root(&self) -> Option<usize> {
        let mut min: Option<usize> = None;
        for &root in self.roots.iter().flatten() {
            if min.map_or(true, |m| self.nodes[root].key < self.nodes[m].key) {
                min = Some(root);
            }
        }
        min
    }

    /// Delete every node on the left path below `root`, which has already been
    /// taken off its root list. Right subtrees along the way become roots.
    fn delete_left_path(&mut self, root: usize) -> Option<V> {
        let mut current = Some(root);
        let mut value = None;
        while let Some(node) = current {
            self.cut(node);
            self.node_count[self.nodes[node].level] -= 1;
            current = self.nodes[node].left;
            value = self.release(node);
        }
        value
    }

    /// Link roots pairwise, bottom-up. Roots are sorted by key first so the
    /// resulting shape does not depend on insertion history.
    fn merge_trees(&mut self) {
        for level in 0..self.n_levels() - 1 {
            let mut level_roots = mem::take(&mut self.roots[level]);
            level_roots.sort_by(|&a, &b| self.cmp_keys(a, b));

            let mut pairs = level_roots.chunks_exact(2);
            for pair in &mut pairs {
                let w = self.link(pair[0], pair[1]);
                self.make_root(w);
            }
            self.roots[level] = pairs.remainder().to_vec();
        }
    }

    fn quake(&mut self) {
        for level in 0..self.n_levels() - 1 {
            let (below, above) = (self.node_count[level], self.node_count[level + 1]);
            if above as f64 > self.quake_ratio * below as f64 {
                debug!("quake at level {level}: {above} nodes above {below}");
                self.clear_above(level);
                break;
            }
        }
    }

    /// Discard every node above `level`, promoting the level `level` nodes to roots
    fn clear_above(&mut self, level: usize) {
        for upper in level + 1..self.n_levels() {
            for root in mem::take(&mut self.roots[upper]) {
                self.shatter(root, level);
            }
            self.node_count[upper] = 0;
        }
    }

    fn shatter(&mut self, index: usize, level: usize) {
        if self.nodes[index].level == level {
            self.make_root(index);
            return;
        }
        let (left, right) = (self.nodes[index].left, self.nodes[index].right);
        if let Some(left) = left {
            self.shatter(left, level);
        }
        self.release(index);
        if let Some(right) = right {
            self.shatter(right, level);
        }
    }
}

impl<K: PartialOrd + Clone + fmt::Display, V: fmt::Display> QuakeHeap<K, V> {
    /// List the forest level by level.
    ///
    /// Each non-empty level starts with `{lev: k nodeCt: c}`, followed by the
    /// preorder of every root at that level, smallest key first. Internal nodes
    /// print as `(key)`, leaves as `[key value]` and a cut right child as `[null]`.
    pub fn list_heap(&self) -> Vec<String> {
        let mut list = Vec::new();
        for (level, roots) in self.roots.iter().enumerate() {
            if self.node_count[level] > 0 {
                list.push(format!(
                    "{{lev: {level} nodeCt: {}}}",
                    self.node_count[level]
                ));
            }
            let mut sorted = roots.clone();
            sorted.sort_by(|&a, &b| self.cmp_keys(a, b));
            for root in sorted {
                self.preorder(Some(root), &mut list);
            }
        }
        list
    }

    fn preorder(&self, index: Option<usize>, list: &mut Vec<String>) {
        let Some(index) = index else {
            list.push("[null]".to_owned());
            return;
        };
        let node = &self.nodes[index];
        match &node.value {
            Some(value) if node.level == 0 => list.push(format!("[{} {}]", node.key, value)),
            _ => {
                list.push(format!("({})", node.key));
                self.preorder(node.left, list);
                self.preorder(node.right, list);
            }
        }
    }
}

fn check_n_levels(n_levels: usize) -> Result<()> {
    if n_levels < 1 {
        return Err(Error::InvalidParameter(format!(
            "number of levels must be at least 1, got {n_levels}"
        )));
    }
    Ok(())
}
