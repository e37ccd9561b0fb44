use approx::assert_abs_diff_eq;
use hypercube_quadtree::QuadTree;

/// A tiny deterministic PRNG (xorshift64*) so the larger scenarios are
/// reproducible without pulling in an external RNG crate.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Rng(seed | 1)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn next_f64_in(&mut self, lo: f64, hi: f64) -> f64 {
        let frac = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        lo + frac * (hi - lo)
    }
}

fn drain_sorted<V: Clone>(qt: &QuadTree<V>, min: &[f64], max: &[f64]) -> Vec<(Vec<f64>, V)> {
    let mut it = qt.search_intersect(min, max).unwrap();
    let mut out = Vec::new();
    while it.has_next() {
        let e = it.next().unwrap();
        out.push((e.0.to_vec(), e.1.clone()));
    }
    out
}

#[test]
fn basic_range_query_returns_exact_point_set() {
    let mut qt = QuadTree::new(2).unwrap();
    let points = [
        (0.0, 0.0),
        (3.0, 1.0),
        (1.0, 2.0),
        (8.0, 6.0),
        (10.0, 3.0),
        (11.0, 7.0),
        (2.0, 6.0),
        (3.0, 6.0),
        (2.0, 8.0),
        (3.0, 8.0),
    ];
    for (x, y) in points {
        qt.insert(vec![x, y], ()).unwrap();
    }

    let mut it = qt.search_intersect(&[2.0, 1.0], &[12.0, 7.0]).unwrap();
    let mut found = Vec::new();
    while it.has_next() {
        let e = it.next().unwrap();
        found.push((e.0[0], e.0[1]));
    }
    found.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut expected =
        vec![(3.0, 1.0), (10.0, 3.0), (8.0, 6.0), (11.0, 7.0), (2.0, 6.0), (3.0, 6.0)];
    expected.sort_by(|a, b| a.partial_cmp(b).unwrap());

    assert_eq!(found, expected);
}

#[test]
fn forced_root_growth_still_covers_both_points() {
    let mut qt = QuadTree::new(2).unwrap();
    qt.insert(vec![1.0, 1.0], "first").unwrap();
    qt.insert(vec![-5.0, 10.0], "second").unwrap();

    assert_eq!(qt.get(&[-5.0, 10.0]).unwrap(), Some(&"second"));
    assert_eq!(qt.get(&[1.0, 1.0]).unwrap(), Some(&"first"));
    assert_eq!(qt.size(), 2);

    let both = drain_sorted(&qt, &[-100.0, -100.0], &[100.0, 100.0]);
    assert_eq!(both.len(), 2);
}

#[test]
fn all_identical_points_overflow_a_single_leaf() {
    let mut qt = QuadTree::with_max_node_size(2, 3).unwrap();
    for i in 0..5 {
        qt.insert(vec![0.0, 0.0], i).unwrap();
    }
    assert_eq!(qt.size(), 5);

    let hits = drain_sorted(&qt, &[-1.0, -1.0], &[1.0, 1.0]);
    assert_eq!(hits.len(), 5);
}

#[test]
fn update_relocates_locally_and_then_globally() {
    let mut qt = QuadTree::new(2).unwrap();
    let mut rng = Rng::new(42);
    let mut points = Vec::new();
    for i in 0..200 {
        let p = vec![rng.next_f64_in(0.0, 10.0), rng.next_f64_in(0.0, 10.0)];
        qt.insert(p.clone(), i).unwrap();
        points.push(p);
    }

    for (i, p) in points.iter().enumerate() {
        let moved = vec![p[0] + 0.001, p[1] + 0.001];
        let got = *qt.update(p, &moved).unwrap().unwrap();
        assert_eq!(got, i);
        assert_eq!(qt.get(&moved).unwrap(), Some(&i));

        let far = vec![1e9, 1e9];
        let got_far = *qt.update(&moved, &far).unwrap().unwrap();
        assert_eq!(got_far, i);
        assert_eq!(qt.get(&far).unwrap(), Some(&i));
        assert_eq!(qt.remove(&far).unwrap(), Some(i));
    }

    assert_eq!(qt.size(), 200);
}

#[test]
fn remove_triggers_merge_back_to_a_leaf() {
    let mut qt = QuadTree::with_max_node_size(2, 4).unwrap();
    let pts = [
        [1.0, 1.0],
        [-1.0, 1.0],
        [1.0, -1.0],
        [-1.0, -1.0],
        [5.0, 5.0],
        [5.0, -5.0],
        [-5.0, 5.0],
        [-5.0, -5.0],
    ];
    for (i, p) in pts.iter().enumerate() {
        qt.insert(p.to_vec(), i).unwrap();
    }
    assert_eq!(qt.size(), 8);

    // Remove enough points that the split node's descendants fit back
    // within max_node_size and the merge becomes legal.
    for p in &pts[4..8] {
        qt.remove(p).unwrap();
    }
    assert_eq!(qt.size(), 4);

    for p in &pts[0..4] {
        assert!(qt.contains(p).unwrap());
    }
    let remaining = drain_sorted(&qt, &[-10.0, -10.0], &[10.0, 10.0]);
    assert_eq!(remaining.len(), 4);
}

#[test]
fn knn_matches_brute_force_distance_order() {
    let mut qt = QuadTree::new(3).unwrap();
    let mut rng = Rng::new(7);
    let mut points = Vec::new();
    for i in 0..1000 {
        let p = vec![
            rng.next_f64_in(-100.0, 100.0),
            rng.next_f64_in(-100.0, 100.0),
            rng.next_f64_in(-100.0, 100.0),
        ];
        qt.insert(p.clone(), i).unwrap();
        points.push(p);
    }

    for _ in 0..50 {
        let q = vec![
            rng.next_f64_in(-100.0, 100.0),
            rng.next_f64_in(-100.0, 100.0),
            rng.next_f64_in(-100.0, 100.0),
        ];

        let mut brute: Vec<f64> = points
            .iter()
            .map(|p| {
                p.iter().zip(&q).map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt()
            })
            .collect();
        brute.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let got = qt.nearest_neighbor(&q, 10).unwrap();
        assert_eq!(got.len(), 10);
        for (n, expected_dist) in got.iter().zip(brute.iter().take(10)) {
            assert_abs_diff_eq!(n.distance(), *expected_dist, epsilon = 1e-9);
        }
        for w in got.windows(2) {
            assert!(w[0].distance() <= w[1].distance());
        }
    }
}

#[test]
fn iterator_reset_matches_fresh_iterator() {
    let mut qt = QuadTree::new(2).unwrap();
    for i in 0..50 {
        qt.insert(vec![i as f64, (i * 2) as f64], i).unwrap();
    }

    let mut it = qt.search_intersect(&[0.0, 0.0], &[10.0, 10.0]).unwrap();
    let mut drained = Vec::new();
    while it.has_next() {
        drained.push(it.next().unwrap().1.clone());
    }
    drained.sort();

    it.reset(vec![0.0, 0.0], vec![10.0, 10.0]);
    let mut second_pass = Vec::new();
    while it.has_next() {
        second_pass.push(it.next().unwrap().1.clone());
    }
    second_pass.sort();

    assert_eq!(drained, second_pass);

    let mut fresh = qt.search_intersect(&[0.0, 0.0], &[10.0, 10.0]).unwrap();
    let mut fresh_out = Vec::new();
    while fresh.has_next() {
        fresh_out.push(fresh.next().unwrap().1.clone());
    }
    fresh_out.sort();

    assert_eq!(drained, fresh_out);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let mut qt = QuadTree::new(3).unwrap();
    let err = qt.insert(vec![1.0, 2.0], ()).unwrap_err();
    assert_eq!(err, hypercube_quadtree::Error::DimensionMismatch { expected: 3, actual: 2 });
}

#[test]
fn remove_is_idempotent() {
    let mut qt = QuadTree::new(2).unwrap();
    qt.insert(vec![1.0, 1.0], "a").unwrap();

    assert_eq!(qt.remove(&[1.0, 1.0]).unwrap(), Some("a"));
    assert_eq!(qt.remove(&[1.0, 1.0]).unwrap(), None);
}
