//! Point/cube predicates and distance helpers used throughout the tree.
//!
//! Every function here treats its slice arguments as coordinates of a single
//! k-dimensional point; `k` is never stored anywhere, it is simply the slice
//! length, and callers are responsible for only ever comparing same-length
//! slices.

/// True iff `p` lies inside or on the boundary of the axis-aligned box
/// `[lo, hi]`.
pub(crate) fn point_in_box(p: &[f64], lo: &[f64], hi: &[f64]) -> bool {
    debug_assert_eq!(p.len(), lo.len());
    debug_assert_eq!(p.len(), hi.len());
    p.iter().zip(lo).zip(hi).all(|((&pd, &lod), &hid)| pd >= lod && pd <= hid)
}

/// True iff `p` lies inside or on the boundary of the cube centered at
/// `center` with half-side length `radius`.
pub(crate) fn point_in_cube(p: &[f64], center: &[f64], radius: f64) -> bool {
    debug_assert_eq!(p.len(), center.len());
    p.iter().zip(center).all(|(&pd, &cd)| pd >= cd - radius && pd <= cd + radius)
}

/// Coordinatewise bit equality. No epsilon: two points are the same entry key
/// iff every coordinate compares exactly equal.
pub(crate) fn points_equal(p: &[f64], q: &[f64]) -> bool {
    debug_assert_eq!(p.len(), q.len());
    p.iter().zip(q).all(|(&a, &b)| a == b)
}

/// True iff the boxes `[lo1, hi1]` and `[lo2, hi2]` intersect in every
/// dimension (touching at a boundary counts as intersecting).
#[allow(dead_code)]
pub(crate) fn boxes_overlap(lo1: &[f64], hi1: &[f64], lo2: &[f64], hi2: &[f64]) -> bool {
    debug_assert_eq!(lo1.len(), hi1.len());
    debug_assert_eq!(lo1.len(), lo2.len());
    debug_assert_eq!(lo1.len(), hi2.len());
    (0..lo1.len()).all(|d| lo1[d] <= hi2[d] && lo2[d] <= hi1[d])
}

/// True iff the cube `(outerC, outerR)` fully contains the cube
/// `(innerC, innerR)`. Used only as a debug-time sanity check on root growth;
/// never required for correctness of a release build.
#[allow(dead_code)]
pub(crate) fn cube_contains_cube(
    inner_c: &[f64],
    inner_r: f64,
    outer_c: &[f64],
    outer_r: f64,
) -> bool {
    debug_assert_eq!(inner_c.len(), outer_c.len());
    inner_c.iter().zip(outer_c).all(|(&ic, &oc)| {
        (ic - inner_r) >= (oc - outer_r) && (ic + inner_r) <= (oc + outer_r)
    })
}

/// Euclidean distance between two points.
pub(crate) fn euclidean_distance(p: &[f64], q: &[f64]) -> f64 {
    debug_assert_eq!(p.len(), q.len());
    p.iter().zip(q).map(|(&a, &b)| (a - b) * (a - b)).sum::<f64>().sqrt()
}

/// Minimum Euclidean distance from `p` to the closed cube `(center, radius)`.
/// Zero if `p` is already inside the cube along that axis; otherwise the
/// signed overshoot past the nearer face.
pub(crate) fn distance_to_cube(p: &[f64], center: &[f64], radius: f64) -> f64 {
    debug_assert_eq!(p.len(), center.len());
    p.iter()
        .zip(center)
        .map(|(&pd, &cd)| {
            let overshoot = (pd - cd).abs() - radius;
            if overshoot > 0.0 {
                overshoot * overshoot
            } else {
                0.0
            }
        })
        .sum::<f64>()
        .sqrt()
}
