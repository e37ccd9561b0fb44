use tracing::debug;

use crate::entry::{Entry, Neighbor};
use crate::error::Error;
use crate::geom::point_in_cube;
use crate::iter::{EntryIter, QueryIterator};
use crate::knn;
use crate::node::{Node, UpdateStep};

/// An in-memory spatial index mapping k-dimensional points to payloads.
///
/// `dim` is fixed for the life of the tree; every key, query bound, and
/// query center passed to its methods must have exactly that many
/// coordinates or a [`Error::DimensionMismatch`] is returned.
pub struct QuadTree<V> {
    dim: usize,
    max_node_size: usize,
    size: usize,
    root: Option<Node<V>>,
}

impl<V> QuadTree<V> {
    /// Builds a tree of the given dimensionality with the default leaf-split
    /// threshold `max(10, 2*dim)`.
    pub fn new(dim: usize) -> Result<Self, Error> {
        Self::with_max_node_size(dim, (2 * dim).max(10))
    }

    /// Builds a tree with an explicit leaf-split threshold.
    pub fn with_max_node_size(dim: usize, max_node_size: usize) -> Result<Self, Error> {
        if dim == 0 {
            return Err(Error::ZeroDimension);
        }
        Ok(QuadTree { dim, max_node_size, size: 0, root: None })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn max_node_size(&self) -> usize {
        self.max_node_size
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn check_dim(&self, point: &[f64]) -> Result<(), Error> {
        if point.len() != self.dim {
            Err(Error::DimensionMismatch { expected: self.dim, actual: point.len() })
        } else {
            Ok(())
        }
    }

    /// Derives the first root's center and radius from the magnitude of the
    /// first inserted point, so that point lands exactly on the root cube's
    /// boundary.
    fn initialize_root(&mut self, key: &[f64]) {
        let lo = key.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = key.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut m = lo.abs().max(hi.abs());
        if m == 0.0 {
            m = 1.0;
        }
        let center: Vec<f64> = key.iter().map(|&k| if k > 0.0 { m } else { -m }).collect();
        self.root = Some(Node::new_leaf(center, m));
    }

    /// Grows the root, doubling its radius and wrapping the old root as one
    /// child of a new larger interior node, until `point` lies inside it.
    fn ensure_coverage(&mut self, point: &[f64]) {
        loop {
            let root = self.root.as_ref().expect("ensure_coverage called before a root exists");
            if point_in_cube(point, root.center(), root.radius()) {
                return;
            }

            let old = self.root.take().unwrap();
            let old_center = old.center().to_vec();
            let old_radius = old.radius();
            let new_radius = old_radius * 2.0;

            let mut new_center = Vec::with_capacity(self.dim);
            let mut slot_index = 0usize;
            for d in 0..self.dim {
                slot_index <<= 1;
                if point[d] < old_center[d] - old_radius {
                    new_center.push(old_center[d] - old_radius);
                    slot_index |= 1;
                } else {
                    new_center.push(old_center[d] + old_radius);
                }
            }
            debug!(old_radius, new_radius, "growing root to cover out-of-bounds point");
            self.root =
                Some(Node::new_interior_wrapping(new_center, new_radius, old, slot_index, self.dim));
        }
    }

    /// Inserts `key` mapped to `value`. Duplicate keys are both retained;
    /// no special indexing of duplicates is performed beyond the
    /// forced-leaf overflow rule (see [`Self::with_max_node_size`]).
    pub fn insert(&mut self, key: Vec<f64>, value: V) -> Result<(), Error> {
        self.check_dim(&key)?;
        self.size += 1;
        if self.root.is_none() {
            self.initialize_root(&key);
        }
        self.ensure_coverage(&key);
        let entry = Entry::new(key, value);
        self.root.as_mut().unwrap().insert(entry, self.max_node_size, 0);
        Ok(())
    }

    pub fn contains(&self, key: &[f64]) -> Result<bool, Error> {
        self.check_dim(key)?;
        Ok(self.root.as_ref().and_then(|r| r.get_exact(key)).is_some())
    }

    pub fn get(&self, key: &[f64]) -> Result<Option<&V>, Error> {
        self.check_dim(key)?;
        Ok(self.root.as_ref().and_then(|r| r.get_exact(key)).map(Entry::value))
    }

    /// Removes the entry at `key` by exact coordinate match, returning its
    /// payload. May collapse a now-mergeable interior node back into a leaf.
    pub fn remove(&mut self, key: &[f64]) -> Result<Option<V>, Error> {
        self.check_dim(key)?;
        let removed = self.root.as_mut().and_then(|r| r.remove(key, self.max_node_size));
        if removed.is_some() {
            self.size -= 1;
        }
        Ok(removed.map(Entry::into_value))
    }

    /// Relocates the entry at `old_key` to `new_key`, preserving its
    /// payload. Returns a reference to that payload, now stored at the new
    /// coordinates, or `None` if `old_key` was not present. `size` is
    /// unchanged.
    pub fn update(&mut self, old_key: &[f64], new_key: &[f64]) -> Result<Option<&V>, Error> {
        self.check_dim(old_key)?;
        self.check_dim(new_key)?;

        let root = match self.root.as_mut() {
            Some(root) => root,
            None => return Ok(None),
        };

        match root.update(old_key, new_key, self.max_node_size, 0) {
            UpdateStep::NotFound => return Ok(None),
            UpdateStep::Done => {}
            UpdateStep::NeedsReinsert(entry) => {
                self.ensure_coverage(new_key);
                self.root.as_mut().unwrap().insert(entry, self.max_node_size, 0);
            }
        }
        Ok(self.root.as_ref().and_then(|r| r.get_exact(new_key)).map(Entry::value))
    }

    /// Empties the tree.
    pub fn clear(&mut self) {
        self.root = None;
        self.size = 0;
    }

    /// Returns a reusable, restartable iterator over every entry whose
    /// point lies in the closed box `[min, max]`.
    pub fn search_intersect<'a>(
        &'a self,
        min: &[f64],
        max: &[f64],
    ) -> Result<QueryIterator<'a, V>, Error> {
        self.check_dim(min)?;
        self.check_dim(max)?;
        Ok(QueryIterator::new(self.root.as_ref(), min.to_vec(), max.to_vec()))
    }

    /// Same query as [`Self::search_intersect`], adapted to a standard
    /// [`Iterator`] of `(point, value)` pairs for callers who don't need the
    /// resettable capability.
    pub fn search_intersect_iter<'a>(
        &'a self,
        min: &[f64],
        max: &[f64],
    ) -> Result<EntryIter<'a, V>, Error> {
        Ok(EntryIter { inner: self.search_intersect(min, max)? })
    }

    /// Returns up to `k` entries nearest to `center`, sorted ascending by
    /// distance. Ties are broken arbitrarily but deterministically.
    pub fn nearest_neighbor(&self, center: &[f64], k: usize) -> Result<Vec<Neighbor<'_, V>>, Error> {
        self.check_dim(center)?;
        let candidates = knn::nearest_neighbor(self.root.as_ref(), center, k);
        Ok(candidates
            .into_iter()
            .map(|c| Neighbor::new(c.entry.point(), c.entry.value(), c.dist))
            .collect())
    }
}
