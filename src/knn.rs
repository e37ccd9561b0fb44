use crate::entry::Entry;
use crate::geom::{distance_to_cube, euclidean_distance};
use crate::node::{orthant, Node, Slot};

/// An entry paired with its distance from a kNN query center. Borrows into
/// the tree rather than cloning; entries never move during a read-only
/// query.
pub(crate) struct Candidate<'a, V> {
    pub(crate) entry: &'a Entry<V>,
    pub(crate) dist: f64,
}

/// Best-first recursive kNN traversal. Visits the orthant geometrically
/// closest to `center` first, then buffers the remaining children by a
/// pessimistic distance bound, sorts the buffer, and walks it while
/// `max_range` shrinks as candidates accumulate. Returns the (possibly
/// shrunk) `max_range` so callers higher in the recursion reuse the bound.
fn range_search_knn<'a, V>(
    node: &'a Node<V>,
    center: &[f64],
    candidates: &mut Vec<Candidate<'a, V>>,
    k: usize,
    max_range: f64,
) -> f64 {
    if node.is_leaf() {
        let mut max_range = max_range;
        for entry in node.leaf_entries() {
            let dist = euclidean_distance(center, entry.point());
            if dist < max_range {
                candidates.push(Candidate { entry, dist });
                max_range = adjust_region_knn(candidates, k, max_range);
            }
        }
        return max_range;
    }

    let mut max_range = max_range;
    let slots = node.slots();
    let pos_hc = orthant(center, node.center());

    if let Slot::Child(child) = &slots[pos_hc] {
        max_range = range_search_knn(child, center, candidates, k, max_range);
    }

    let mut buffer: Vec<(usize, f64)> = Vec::with_capacity(slots.len());
    for (i, slot) in slots.iter().enumerate() {
        if i == pos_hc && matches!(slot, Slot::Child(_)) {
            continue;
        }
        let dist = match slot {
            Slot::Empty => continue,
            Slot::Direct(e) => euclidean_distance(center, e.point()),
            Slot::Child(child) => distance_to_cube(center, child.center(), child.radius()),
        };
        if dist < max_range {
            buffer.push((i, dist));
        }
    }
    buffer.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    for (i, dist) in buffer {
        if dist > max_range {
            continue;
        }
        match &slots[i] {
            Slot::Child(child) => {
                max_range = range_search_knn(child, center, candidates, k, max_range);
            }
            Slot::Direct(entry) => {
                candidates.push(Candidate { entry, dist });
                max_range = adjust_region_knn(candidates, k, max_range);
            }
            Slot::Empty => unreachable!(),
        }
    }

    max_range
}

/// If fewer than `k` candidates have been found so far, `max_range` is
/// unchanged. Otherwise the candidate list is sorted ascending and truncated
/// to `k`, and the distance of the last retained candidate becomes the new
/// (tighter) `max_range`.
fn adjust_region_knn<V>(candidates: &mut Vec<Candidate<'_, V>>, k: usize, max_range: f64) -> f64 {
    if candidates.len() < k {
        return max_range;
    }
    candidates.sort_by(|a, b| a.dist.partial_cmp(&b.dist).unwrap());
    candidates.truncate(k);
    candidates.last().map_or(max_range, |c| c.dist)
}

pub(crate) fn nearest_neighbor<'a, V>(
    root: Option<&'a Node<V>>,
    center: &[f64],
    k: usize,
) -> Vec<Candidate<'a, V>> {
    let mut candidates = Vec::new();
    if k == 0 {
        return candidates;
    }
    if let Some(root) = root {
        range_search_knn(root, center, &mut candidates, k, f64::INFINITY);
    }
    candidates.sort_by(|a, b| a.dist.partial_cmp(&b.dist).unwrap());
    candidates.truncate(k);
    candidates
}
