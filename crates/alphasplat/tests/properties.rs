use std::collections::HashSet;

use alphasplat::{
    aggregate, AggregatedPoint, AlphaLookupTable, GridSize, LookupCache, LookupConfig, RawPoint,
    SplatError,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_cloud(seed: u64, n: usize) -> Vec<RawPoint> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..n)
        .map(|_| {
            // Mostly a tight cluster, plus some spread and the odd broken sample.
            let x = if rng.gen_bool(0.8) {
                rng.gen_range(-1.0..1.0)
            } else {
                rng.gen_range(-500.0..500.0)
            };
            let y = rng.gen_range(0.0..1e6);

            match rng.gen_range(0..50) {
                0 => RawPoint::new(f64::NAN, y),
                1 => RawPoint::new(x, f64::INFINITY),
                _ => RawPoint::new(x, y),
            }
        })
        .collect()
}

#[test]
fn counts_are_conserved() {
    for seed in 0..8 {
        let points = random_cloud(seed, 5_000);
        let valid = points.iter().filter(|p| p.is_finite()).count();

        let agg = aggregate(&points, GridSize::new(64, 48).unwrap()).unwrap();

        assert_eq!(agg.total_count(), valid as u64, "seed {seed}");
        assert_eq!(agg.skipped, points.len() - valid, "seed {seed}");
    }
}

#[test]
fn buckets_are_unique_and_inside_the_grid() {
    let points = random_cloud(42, 20_000);
    let grid = GridSize::new(100, 37).unwrap();
    let agg = aggregate(&points, grid).unwrap();

    let unique: HashSet<_> = agg.keys().iter().collect();
    assert_eq!(unique.len(), agg.len());
    assert!(agg.len() <= (grid.width * grid.height) as usize);

    for (key, _) in agg.iter_keyed() {
        assert!(key.row < grid.height && key.col < grid.width, "{key:?}");
    }
}

#[test]
fn axis_extremes_reach_both_ends_of_the_range() {
    let mut points = random_cloud(7, 2_000);
    points.push(RawPoint::new(-1e4, -1.0));
    points.push(RawPoint::new(1e4, 2e6));

    let agg = aggregate(&points, GridSize::square(1024).unwrap()).unwrap();

    // u16 already bounds x and y; the extremes must actually be hit.
    assert!(agg.points.iter().any(|p| p.x == 0 && p.y == 0));
    assert!(agg.points.iter().any(|p| p.x == 65535 && p.y == 65535));
}

#[test]
fn buckets_follow_normalized_position() {
    // Range 0..4 on a 4x4 grid: 0..=4 normalize to 0, 0.25, 0.5, 0.75 and 1.
    let points: Vec<RawPoint> = (0..5).map(|i| RawPoint::new(i as f64, i as f64)).collect();
    let agg = aggregate(&points, GridSize::square(4).unwrap()).unwrap();

    let diagonal: Vec<(u32, u32)> = agg.keys().iter().map(|k| (k.row, k.col)).collect();
    assert_eq!(diagonal, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    assert_eq!(agg.points[1], AggregatedPoint { x: 16384, y: 16384, count: 1 });
    assert_eq!(agg.points[3].count, 2);
}

#[test]
fn aggregation_is_deterministic() {
    let points = random_cloud(3, 10_000);
    let grid = GridSize::square(128).unwrap();

    let a = aggregate(&points, grid).unwrap();
    let b = aggregate(&points, grid).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.as_vertex_bytes(), b.as_vertex_bytes());
}

#[test]
fn lookup_rows_are_monotone_and_stay_saturated() {
    let table = AlphaLookupTable::build(LookupConfig::new(257, 4096).unwrap()).unwrap();

    for r in 0..table.height() {
        let row = table.row(r);
        assert!(row.windows(2).all(|w| w[0] <= w[1]), "row {r} not monotone");

        if let Some(first) = row.iter().position(|&v| v == 255) {
            assert!(row[first..].iter().all(|&v| v == 255), "row {r} drops after saturating");
        }
    }
}

#[test]
fn lookup_boundaries_are_transparent() {
    let table = AlphaLookupTable::build(LookupConfig::new(1000, 8192).unwrap()).unwrap();

    assert!(table.row(0).iter().all(|&v| v == 0));
    assert!((0..table.height()).all(|r| table.get(r, 0) == 0));
    assert_eq!(table.get(table.height() - 1, 1), 255);
}

#[test]
fn scenario_two_corner_buckets() {
    let points = [
        RawPoint::new(0.0, 0.0),
        RawPoint::new(0.0, 0.0),
        RawPoint::new(10.0, 10.0),
    ];
    let agg = aggregate(&points, GridSize::square(2).unwrap()).unwrap();

    assert_eq!(
        agg.points,
        vec![
            AggregatedPoint { x: 0, y: 0, count: 2 },
            AggregatedPoint { x: 65535, y: 65535, count: 1 },
        ]
    );
}

#[test]
fn scenario_tiny_table() {
    let table = AlphaLookupTable::build(LookupConfig::new(2, 4).unwrap()).unwrap();

    assert_eq!(table.height(), 2);
    assert_eq!(table.row(0), &[0, 0, 0, 0]);
    assert_eq!(table.row(1), &[0, 255, 255, 255]);
}

#[test]
fn scenario_all_nan_input() {
    let points = vec![RawPoint::new(f64::NAN, f64::NAN); 16];

    assert_eq!(
        aggregate(&points, GridSize::square(4).unwrap()),
        Err(SplatError::InvalidInput)
    );
}

#[test]
fn scenario_identical_points() {
    let points = vec![RawPoint::new(3.0, -7.0); 16];

    assert!(matches!(
        aggregate(&points, GridSize::square(4).unwrap()),
        Err(SplatError::DegenerateRange { .. })
    ));
}

#[test]
fn cached_table_equals_fresh_build() {
    let cache = LookupCache::new();
    let config = LookupConfig::for_device(2048, 100).unwrap();

    let cached = cache.get_or_build(config).unwrap();
    let fresh = AlphaLookupTable::build(config).unwrap();

    assert_eq!(*cached, fresh);
}
