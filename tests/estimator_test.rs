use overlap::accumulator::OverlapAccumulator;
use overlap::chain::{Chain, ChainRole, OverlapSample};
use overlap::config::{AlphaSelection, GridShape};
use overlap::estimator::{lowest_minimum, OverlapEstimator};
use overlap::grid::TrialGrid;
use overlap::synthetic::GaussianPair;
use overlap::OverlapError;

/// Feed `steps` samples of each chain of `pair` into fresh accumulators.
fn filled(pair: GaussianPair, grid: &TrialGrid, steps: usize, seed: u64) -> (OverlapAccumulator, OverlapAccumulator) {
    let mut out = Vec::new();
    for role in ChainRole::ALL {
        let mut chain = pair.iid_chain(role, seed);
        let mut acc = OverlapAccumulator::new(role, grid.clone(), 100);
        for _ in 0..steps {
            chain.step();
            acc.add_sample(&chain.sample());
        }
        out.push(acc);
    }
    let target = out.pop().unwrap();
    let reference = out.pop().unwrap();
    (reference, target)
}

#[test]
fn test_search_is_deterministic_for_fixed_draws() {
    let pair = GaussianPair::new(2, 1.0, 1.5);
    let grid = TrialGrid::new(1.0e4, GridShape::new(21, 15.0)).unwrap();

    let (r1, t1) = filled(pair, &grid, 5_000, 77);
    let (r2, t2) = filled(pair, &grid, 5_000, 77);
    let e1 = OverlapEstimator::new(&r1, &t1).unwrap();
    let e2 = OverlapEstimator::new(&r2, &t2).unwrap();

    let loc = e1.minimum_difference_location().unwrap();
    assert_eq!(loc, e2.minimum_difference_location().unwrap());
    assert_eq!(e1.alpha_at(loc).unwrap(), e2.alpha_at(loc).unwrap());
    assert_eq!(e1.discrepancies().unwrap(), e2.discrepancies().unwrap());
}

#[test]
fn test_ties_go_to_lowest_index() {
    assert_eq!(lowest_minimum(&[3.0, 1.0, 1.0, 2.0]), 1);
    assert_eq!(lowest_minimum(&[0.5, 0.5]), 0);
    assert_eq!(lowest_minimum(&[f64::INFINITY, f64::INFINITY, f64::INFINITY]), 0);
    assert_eq!(lowest_minimum(&[f64::INFINITY, 4.0, f64::INFINITY, 4.0]), 1);
}

#[test]
fn test_location_brackets_true_ratio() {
    let pair = GaussianPair::new(2, 1.0, 1.5);
    let grid = TrialGrid::new(1.0e4, GridShape::new(21, 15.0)).unwrap();
    let (r, t) = filled(pair, &grid, 5_000, 3);
    let est = OverlapEstimator::new(&r, &t).unwrap();

    let loc = est.minimum_difference_location().unwrap();
    let ln_gap = (grid.alpha(loc).ln() - pair.exact_ratio().ln()).abs();
    assert!(ln_gap <= grid.log_step(), "location {loc} is {ln_gap} away in ln alpha");

    let alpha = est.alpha_at(loc).unwrap();
    assert!((alpha / pair.exact_ratio() - 1.0).abs() < 0.1, "alpha {alpha}");

    let interpolated = est.interpolated_alpha().unwrap();
    assert!((interpolated / pair.exact_ratio() - 1.0).abs() < 0.1, "interpolated {interpolated}");
    let (_, resolved) = est.resolve_alpha(AlphaSelection::Interpolated).unwrap();
    assert_eq!(resolved, interpolated);
}

#[test]
fn test_empty_accumulator_is_fatal() {
    let grid = TrialGrid::new(1.0, GridShape::new(5, 2.0)).unwrap();
    let reference = OverlapAccumulator::new(ChainRole::Reference, grid.clone(), 10);
    let mut target = OverlapAccumulator::new(ChainRole::Target, grid, 10);
    target.add_sample(&OverlapSample { value: 1.0, weight_ratio: 1.0 });

    let est = OverlapEstimator::new(&reference, &target).unwrap();
    let err = est.minimum_difference_location().unwrap_err();
    assert!(matches!(err, OverlapError::EmptyAccumulator { chain: ChainRole::Reference }));
    assert!(err.is_fatal());
    assert!(est.ratio_and_error(1.0).is_err());
}

#[test]
fn test_zero_overlap_gives_degenerate_alpha() {
    let grid = TrialGrid::new(1.0, GridShape::new(5, 2.0)).unwrap();
    let mut reference = OverlapAccumulator::new(ChainRole::Reference, grid.clone(), 10);
    let mut target = OverlapAccumulator::new(ChainRole::Target, grid, 10);
    for _ in 0..100 {
        // the reference chain never sees any target weight
        reference.add_sample(&OverlapSample { value: 1.0, weight_ratio: 0.0 });
        target.add_sample(&OverlapSample { value: 1.0, weight_ratio: 2.0 });
    }
    let est = OverlapEstimator::new(&reference, &target).unwrap();
    let loc = est.minimum_difference_location().unwrap();
    match est.alpha_at(loc) {
        Err(OverlapError::DegenerateAlpha { chain, alpha }) => {
            assert_eq!(chain, ChainRole::Reference);
            assert_eq!(alpha, 0.0);
        }
        other => panic!("expected a degenerate alpha, got {other:?}"),
    }
}

#[test]
fn test_mismatched_grids_are_rejected() {
    let a = OverlapAccumulator::new(ChainRole::Reference, TrialGrid::single(1.0).unwrap(), 10);
    let b = OverlapAccumulator::new(ChainRole::Target, TrialGrid::single(2.0).unwrap(), 10);
    assert!(matches!(OverlapEstimator::new(&a, &b), Err(OverlapError::InvalidConfig(_))));
}

#[test]
fn test_ratio_and_error_at_and_between_grid_points() {
    let pair = GaussianPair::new(1, 1.0, 1.2);
    let grid = TrialGrid::new(pair.exact_ratio(), GridShape::new(3, 0.5)).unwrap();
    let (r, t) = filled(pair, &grid, 100_000, 19);
    let est = OverlapEstimator::new(&r, &t).unwrap();

    let (ratio, err) = est.ratio_and_error(grid.alpha(1)).unwrap();
    assert!(err > 0.0);
    assert!((ratio - pair.exact_ratio()).abs() < 4.0 * err, "{ratio} ± {err}");

    let between = (grid.alpha(0) * grid.alpha(1)).sqrt();
    let (mid, _) = est.ratio_and_error(between).unwrap();
    let (lo, _) = est.ratio_at(0).unwrap();
    let (hi, _) = est.ratio_at(1).unwrap();
    assert!(mid >= lo.min(hi) - 1e-12 && mid <= lo.max(hi) + 1e-12);

    // outside the grid clamps to the end points
    assert_eq!(est.ratio_and_error(1e-9).unwrap(), est.ratio_at(0).unwrap());
    assert_eq!(est.ratio_and_error(1e9).unwrap(), est.ratio_at(2).unwrap());
}

#[test]
fn test_ideal_fraction_waits_for_two_blocks() {
    let grid = TrialGrid::single(1.0).unwrap();
    let mut reference = OverlapAccumulator::new(ChainRole::Reference, grid.clone(), 1000);
    let mut target = OverlapAccumulator::new(ChainRole::Target, grid, 1000);
    for _ in 0..1500 {
        reference.add_sample(&OverlapSample { value: 1.0, weight_ratio: 1.0 });
        target.add_sample(&OverlapSample { value: 1.0, weight_ratio: 1.0 });
    }
    let est = OverlapEstimator::new(&reference, &target).unwrap();
    assert_eq!(est.ideal_reference_fraction(1.0, 0.3), 0.5);
}
