use tracing::trace;

use crate::entry::Entry;
use crate::geom::{point_in_cube, points_equal};
use crate::{EPS_MUL, MAX_DEPTH};

/// One child position of an interior node: either unoccupied, holding a
/// lone entry directly (no sub-node allocated yet), or holding a full
/// sub-node.
pub(crate) enum Slot<V> {
    Empty,
    Direct(Entry<V>),
    Child(Box<Node<V>>),
}

enum Kind<V> {
    Leaf(Vec<Entry<V>>),
    Interior(Vec<Slot<V>>),
}

/// A node of the tree: a leaf holding entries directly, or an interior
/// node holding `2^dim` tagged child slots. Never both at once.
pub(crate) struct Node<V> {
    center: Vec<f64>,
    radius: f64,
    /// Leaf: number of live entries. Interior: number of slots holding a
    /// *direct* entry; children holding sub-nodes are not counted here,
    /// their own `n_values` accounts for their contents.
    n_values: usize,
    kind: Kind<V>,
}

/// Outcome of a single step of the relocation walk driven by [`Node::update`].
pub(crate) enum UpdateStep<V> {
    NotFound,
    Done,
    /// The entry no longer fits the cube of the node that held it (even with
    /// `EPS_MUL` slack) and must be reinserted by an ancestor, or by the
    /// caller after growing the root.
    NeedsReinsert(Entry<V>),
}

/// Computes the orthant index of `point` relative to `center`: bit `d`
/// (counting from the most significant of `point.len()` bits) is set iff
/// `point[d] >= center[d]`.
pub(crate) fn orthant(point: &[f64], center: &[f64]) -> usize {
    let mut pos = 0usize;
    for d in 0..point.len() {
        pos <<= 1;
        if point[d] >= center[d] {
            pos |= 1;
        }
    }
    pos
}

/// Derives the center of the child occupying slot `slot` of a node with the
/// given `center`/`radius`, per the bit convention used by [`orthant`].
fn child_center(center: &[f64], radius: f64, slot: usize, dim: usize) -> Vec<f64> {
    (0..dim)
        .map(|d| {
            let bit = (slot >> (dim - 1 - d)) & 1;
            if bit == 1 { center[d] + radius / 2.0 } else { center[d] - radius / 2.0 }
        })
        .collect()
}

impl<V> Node<V> {
    pub(crate) fn new_leaf(center: Vec<f64>, radius: f64) -> Self {
        Node { center, radius, n_values: 0, kind: Kind::Leaf(Vec::with_capacity(2)) }
    }

    /// Builds an interior node whose only occupied slot is `slot_index`,
    /// holding `child`. Used exclusively by root growth.
    pub(crate) fn new_interior_wrapping(
        center: Vec<f64>,
        radius: f64,
        child: Node<V>,
        slot_index: usize,
        dim: usize,
    ) -> Self {
        let mut subs = Vec::with_capacity(1 << dim);
        subs.resize_with(1 << dim, || Slot::Empty);
        subs[slot_index] = Slot::Child(Box::new(child));
        Node { center, radius, n_values: 0, kind: Kind::Interior(subs) }
    }

    pub(crate) fn center(&self) -> &[f64] {
        &self.center
    }

    pub(crate) fn radius(&self) -> f64 {
        self.radius
    }

    pub(crate) fn n_values(&self) -> usize {
        self.n_values
    }

    fn dim(&self) -> usize {
        self.center.len()
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.kind, Kind::Leaf(_))
    }

    /// Slot array of an interior node. Panics if called on a leaf; callers
    /// must check [`Node::is_leaf`] first.
    pub(crate) fn slots(&self) -> &[Slot<V>] {
        match &self.kind {
            Kind::Interior(subs) => subs,
            Kind::Leaf(_) => panic!("slots() called on a leaf node"),
        }
    }

    /// Entry sequence of a leaf. Panics if called on an interior node.
    pub(crate) fn leaf_entries(&self) -> &[Entry<V>] {
        match &self.kind {
            Kind::Leaf(entries) => entries,
            Kind::Interior(_) => panic!("leaf_entries() called on an interior node"),
        }
    }

    // ---- insertion ----------------------------------------------------

    pub(crate) fn insert(&mut self, entry: Entry<V>, max_node_size: usize, depth: u32) {
        if self.is_leaf() {
            self.insert_leaf(entry, max_node_size, depth);
        } else {
            self.insert_interior(entry, max_node_size, depth);
        }
    }

    fn insert_leaf(&mut self, entry: Entry<V>, max_node_size: usize, depth: u32) {
        let enforce_leaf = depth > MAX_DEPTH;
        let all_identical = match &self.kind {
            Kind::Leaf(entries) => entries.iter().all(|e| points_equal(e.point(), entry.point())),
            Kind::Interior(_) => unreachable!(),
        };

        if self.n_values < max_node_size || enforce_leaf || all_identical {
            match &mut self.kind {
                Kind::Leaf(entries) => Self::append_entry(entries, entry, self.n_values, max_node_size),
                Kind::Interior(_) => unreachable!(),
            }
            self.n_values += 1;
            return;
        }

        let dim = self.dim();
        let old_entries = match &mut self.kind {
            Kind::Leaf(entries) => std::mem::take(entries),
            Kind::Interior(_) => unreachable!(),
        };
        trace!(depth, n_values = old_entries.len(), "splitting leaf into interior node");

        let mut subs = Vec::with_capacity(1 << dim);
        subs.resize_with(1 << dim, || Slot::Empty);
        self.kind = Kind::Interior(subs);
        self.n_values = 0;

        for old in old_entries {
            self.insert_interior(old, max_node_size, depth);
        }
        self.insert_interior(entry, max_node_size, depth);
    }

    fn insert_interior(&mut self, entry: Entry<V>, max_node_size: usize, depth: u32) {
        let pos = orthant(entry.point(), &self.center);
        let dim = self.dim();
        let radius = self.radius;
        let center = self.center.clone();

        let subs = match &mut self.kind {
            Kind::Interior(subs) => subs,
            Kind::Leaf(_) => unreachable!(),
        };

        match std::mem::replace(&mut subs[pos], Slot::Empty) {
            Slot::Child(mut child) => {
                child.insert(entry, max_node_size, depth + 1);
                subs[pos] = Slot::Child(child);
            }
            Slot::Empty => {
                subs[pos] = Slot::Direct(entry);
                self.n_values += 1;
            }
            Slot::Direct(existing) => {
                let child_c = child_center(&center, radius, pos, dim);
                let mut sub = Node::new_leaf(child_c, radius / 2.0);
                sub.insert(existing, max_node_size, depth + 1);
                sub.insert(entry, max_node_size, depth + 1);
                subs[pos] = Slot::Child(Box::new(sub));
                // nValues tracks direct-entry slots only; this slot is no
                // longer direct, it now holds a sub-node.
            }
        }
    }

    fn append_entry(entries: &mut Vec<Entry<V>>, entry: Entry<V>, n_values: usize, max_node_size: usize) {
        if entries.len() == entries.capacity() {
            let target = if n_values >= max_node_size { n_values * 2 } else { max_node_size };
            let new_cap = (n_values * 3).min(target).max(entries.len() + 1);
            entries.reserve_exact(new_cap - entries.len());
        }
        entries.push(entry);
    }

    // ---- lookup ---------------------------------------------------------

    pub(crate) fn get_exact(&self, key: &[f64]) -> Option<&Entry<V>> {
        match &self.kind {
            Kind::Leaf(entries) => entries.iter().find(|e| e.equals(key)),
            Kind::Interior(subs) => match &subs[orthant(key, &self.center)] {
                Slot::Empty => None,
                Slot::Direct(e) => {
                    if e.equals(key) {
                        Some(e)
                    } else {
                        None
                    }
                }
                Slot::Child(child) => child.get_exact(key),
            },
        }
    }

    // ---- removal ----------------------------------------------------------

    pub(crate) fn remove(&mut self, key: &[f64], max_node_size: usize) -> Option<Entry<V>> {
        match &mut self.kind {
            Kind::Leaf(entries) => {
                let idx = entries.iter().position(|e| e.equals(key))?;
                self.n_values -= 1;
                Some(entries.remove(idx))
            }
            Kind::Interior(_) => self.remove_interior(key, max_node_size),
        }
    }

    fn remove_interior(&mut self, key: &[f64], max_node_size: usize) -> Option<Entry<V>> {
        let pos = orthant(key, &self.center);

        enum Outcome<V> {
            NotFound,
            RemovedDirect,
            // Child slot held a leaf: this node is that leaf's parent and is
            // the one that gets to merge if the removal succeeded.
            FromLeafChild(Option<Entry<V>>),
            // Child slot held an interior node: any merging happens at
            // whatever level is the actual parent of the affected leaf, not
            // here. Merge recursion upward is not performed.
            FromInteriorChild(Option<Entry<V>>),
        }

        let outcome = match &mut self.slots_mut()[pos] {
            Slot::Empty => Outcome::NotFound,
            Slot::Direct(e) => {
                if e.equals(key) {
                    Outcome::RemovedDirect
                } else {
                    Outcome::NotFound
                }
            }
            Slot::Child(child) if child.is_leaf() => {
                Outcome::FromLeafChild(child.remove(key, max_node_size))
            }
            Slot::Child(child) => Outcome::FromInteriorChild(child.remove(key, max_node_size)),
        };

        match outcome {
            Outcome::NotFound => None,
            Outcome::RemovedDirect => {
                let entry = match std::mem::replace(&mut self.slots_mut()[pos], Slot::Empty) {
                    Slot::Direct(e) => e,
                    _ => unreachable!(),
                };
                self.n_values -= 1;
                Some(entry)
            }
            Outcome::FromLeafChild(removed) => {
                if removed.is_some() {
                    self.check_and_merge_leaf_nodes(max_node_size);
                }
                removed
            }
            Outcome::FromInteriorChild(removed) => removed,
        }
    }

    fn slots_mut(&mut self) -> &mut [Slot<V>] {
        match &mut self.kind {
            Kind::Interior(subs) => subs,
            Kind::Leaf(_) => panic!("slots_mut() called on a leaf node"),
        }
    }

    /// Collapses this interior node back to a leaf if every live child is
    /// itself a leaf and the combined entry count fits `max_node_size`.
    /// Only ever collapses one level; never recurses into grandchildren.
    fn check_and_merge_leaf_nodes(&mut self, max_node_size: usize) {
        let subs = match &self.kind {
            Kind::Interior(subs) => subs,
            Kind::Leaf(_) => return,
        };

        let mut total = self.n_values;
        for slot in subs {
            if let Slot::Child(child) = slot {
                if !child.is_leaf() {
                    return;
                }
                total += child.n_values();
            }
        }
        if total > max_node_size {
            return;
        }

        let mut merged = Vec::with_capacity(total);
        if let Kind::Interior(subs) = &mut self.kind {
            for slot in subs.iter_mut() {
                match std::mem::replace(slot, Slot::Empty) {
                    Slot::Empty => {}
                    Slot::Direct(e) => merged.push(e),
                    Slot::Child(child) => {
                        let child = *child;
                        if let Kind::Leaf(entries) = child.kind {
                            merged.extend(entries);
                        }
                    }
                }
            }
        }
        trace!(merged = merged.len(), "collapsing interior node into a leaf");
        self.n_values = merged.len();
        self.kind = Kind::Leaf(merged);
    }

    // ---- update -------------------------------------------------------------

    pub(crate) fn update(
        &mut self,
        old_key: &[f64],
        new_point: &[f64],
        max_node_size: usize,
        depth: u32,
    ) -> UpdateStep<V> {
        match &mut self.kind {
            Kind::Leaf(entries) => {
                let idx = match entries.iter().position(|e| e.equals(old_key)) {
                    Some(i) => i,
                    None => return UpdateStep::NotFound,
                };
                let mut entry = entries.remove(idx);
                self.n_values -= 1;
                entry.set_point(new_point.to_vec());
                self.relocate(entry, max_node_size, depth)
            }
            Kind::Interior(_) => self.update_interior(old_key, new_point, max_node_size, depth),
        }
    }

    fn relocate(&mut self, entry: Entry<V>, max_node_size: usize, depth: u32) -> UpdateStep<V> {
        if point_in_cube(entry.point(), &self.center, self.radius * EPS_MUL) {
            self.insert(entry, max_node_size, depth);
            UpdateStep::Done
        } else {
            trace!(depth, "update bubbling past node cube, will try an ancestor");
            UpdateStep::NeedsReinsert(entry)
        }
    }

    fn update_interior(
        &mut self,
        old_key: &[f64],
        new_point: &[f64],
        max_node_size: usize,
        depth: u32,
    ) -> UpdateStep<V> {
        let pos = orthant(old_key, &self.center);

        enum Outcome<V> {
            NotFound,
            RemovedDirect(Entry<V>),
            FromChild(UpdateStep<V>),
        }

        let outcome = match &mut self.slots_mut()[pos] {
            Slot::Empty => Outcome::NotFound,
            Slot::Direct(e) => {
                if e.equals(old_key) {
                    let entry = match std::mem::replace(&mut self.slots_mut()[pos], Slot::Empty) {
                        Slot::Direct(e) => e,
                        _ => unreachable!(),
                    };
                    Outcome::RemovedDirect(entry)
                } else {
                    Outcome::NotFound
                }
            }
            Slot::Child(child) => {
                Outcome::FromChild(child.update(old_key, new_point, max_node_size, depth + 1))
            }
        };

        match outcome {
            Outcome::NotFound => UpdateStep::NotFound,
            Outcome::RemovedDirect(mut entry) => {
                self.n_values -= 1;
                entry.set_point(new_point.to_vec());
                self.relocate(entry, max_node_size, depth)
            }
            Outcome::FromChild(UpdateStep::NotFound) => UpdateStep::NotFound,
            Outcome::FromChild(UpdateStep::Done) => {
                self.check_and_merge_leaf_nodes(max_node_size);
                UpdateStep::Done
            }
            Outcome::FromChild(UpdateStep::NeedsReinsert(entry)) => {
                self.check_and_merge_leaf_nodes(max_node_size);
                self.relocate(entry, max_node_size, depth)
            }
        }
    }
}
