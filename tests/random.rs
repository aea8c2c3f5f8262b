use std::collections::HashSet;

use covtree::{CoverTree, Point};
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_points(n: usize, dim: usize, seed: u64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|id| {
            let data = Array1::from_shape_fn(dim, |_| rng.gen::<f64>());
            Point::new(id, data)
        })
        .collect()
}

fn brute_force(points: &[Point], query: &Array1<f64>) -> Vec<(f64, usize)> {
    let mut dists: Vec<(f64, usize)> = points
        .iter()
        .map(|p| {
            let d = (p.data() - query).mapv(|x| x * x).sum().sqrt();
            (d, p.id())
        })
        .collect();
    dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    dists
}

#[test]
fn test_random() {
    let dim = 128;
    let points = random_points(1000, dim, 42);
    let mut ct = CoverTree::from_batch(points.clone(), 1.3).unwrap();
    assert_eq!(ct.size(), 1000);

    let mut rng = StdRng::seed_from_u64(43);
    for _ in 0..50 {
        let query = Array1::from_shape_fn(dim, |_| rng.gen::<f64>());
        let truth = brute_force(&points, &query);

        // Single nearest neighbour matches the argmin of the linear scan.
        assert_eq!(ct.nearest(query.view()).id(), truth[0].1);

        // Top 10 matches the sorted truncation of the linear scan.
        let expected: HashSet<usize> = truth[..10].iter().map(|t| t.1).collect();
        let found = ct.near(query.view(), 10).unwrap();
        assert_eq!(found.len(), 10);
        let actual: HashSet<usize> = found.iter().map(|n| n.id()).collect();
        assert_eq!(expected, actual);
        for pair in found.windows(2) {
            assert!(pair[0].dist() <= pair[1].dist());
        }

        // Range query with a radius strictly between two consecutive
        // brute-force distances returns exactly the closer side.
        let radius = (truth[29].0 + truth[30].0) / 2.;
        let expected: HashSet<usize> = truth[..30].iter().map(|t| t.1).collect();
        let actual: HashSet<usize> =
            ct.range(query.view(), radius).unwrap().iter().map(|n| n.id()).collect();
        assert_eq!(expected, actual);
    }
}

#[test]
fn test_batch_queries() {
    let dim = 32;
    let points = random_points(400, dim, 47);
    let ct = CoverTree::from_batch(points, 1.3).unwrap();

    let mut rng = StdRng::seed_from_u64(53);
    let queries = Array2::from_shape_fn((20, dim), |_| rng.gen::<f64>());

    let batched = ct.near_batch(queries.view(), 5).unwrap();
    assert_eq!(batched.len(), 20);

    for (row, found) in queries.outer_iter().zip(&batched) {
        let single = ct.near_multi(row, 5).unwrap();
        let expected: Vec<usize> = single.iter().map(|n| n.id()).collect();
        let actual: Vec<usize> = found.iter().map(|n| n.id()).collect();
        assert_eq!(expected, actual);
    }
}
