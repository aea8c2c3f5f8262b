use std::collections::HashSet;

use covtree::{CoverTree, CoverTreeBuilder, Point};
use ndarray::Array1;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_points(n: usize, dim: usize, seed: u64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|id| {
            let data = Array1::from_shape_fn(dim, |_| rng.gen_range(-10.0..10.0));
            Point::new(id, data)
        })
        .collect()
}

#[test]
fn test_parallel_serial_equivalence() {
    let dim = 8;
    let points = random_points(4000, dim, 71);

    let mut sequential = CoverTree::from_batch(points.clone(), 1.3).unwrap();
    let mut parallel = CoverTreeBuilder::new()
        .threshold(500)
        .build(points)
        .unwrap();

    assert_eq!(sequential.size(), 4000);
    assert_eq!(parallel.size(), 4000);

    let mut rng = StdRng::seed_from_u64(73);
    for _ in 0..100 {
        let query = Array1::from_shape_fn(dim, |_| rng.gen_range(-10.0..10.0));

        let one: HashSet<usize> = sequential
            .near(query.view(), 5)
            .unwrap()
            .iter()
            .map(|n| n.id())
            .collect();
        let two: HashSet<usize> = parallel
            .near(query.view(), 5)
            .unwrap()
            .iter()
            .map(|n| n.id())
            .collect();
        assert_eq!(one, two);
    }
}

#[test]
fn test_parallel_invariants() {
    let points = random_points(3000, 4, 79);

    let parallel = CoverTreeBuilder::new()
        .base(2.)
        .threshold(400)
        .build(points)
        .unwrap();

    assert_eq!(parallel.size(), 3000);
    parallel.verify();

    let ids: HashSet<usize> = parallel.iter().map(|p| p.id()).collect();
    assert_eq!(ids.len(), 3000);
}
