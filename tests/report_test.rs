use std::fs;

use overlap::config::GridShape;
use overlap::estimator::GridRow;
use overlap::grid::TrialGrid;
use overlap::report::write_grid_csv;
use overlap::synthetic::GaussianPair;
use overlap::{BiasParameter, OverlapSampler, RunReport, SamplerConfig};

#[test]
fn test_grid_csv_has_one_row_per_trial() {
    let pair = GaussianPair::default();
    let (reference, target) = pair.iid_chains(17);
    let (_writer, reader) = BiasParameter::with_value(pair.exact_ratio());
    let mut sampler = OverlapSampler::new(reference, target, reader, SamplerConfig::default()).unwrap();
    let grid = TrialGrid::new(pair.exact_ratio(), GridShape::new(7, 1.0)).unwrap();
    sampler.configure(&grid, 100);
    sampler.run(20_000);

    let rows: Vec<GridRow> = sampler.estimator().unwrap().grid_scan().unwrap();
    assert_eq!(rows.len(), 7);
    assert!(rows.iter().all(|r| r.discrepancy >= -1e-12));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.csv");
    write_grid_csv(&path, &rows).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 8);
    assert!(lines[0].starts_with("index,alpha,implied_ratio,discrepancy"));
    assert!(lines[4].starts_with("3,"));
}

#[test]
fn test_report_without_reference_integral() {
    let pair = GaussianPair::new(1, 1.0, 2.0);
    let (reference, target) = pair.iid_chains(23);
    let (_writer, reader) = BiasParameter::with_value(pair.exact_ratio());
    let mut sampler = OverlapSampler::new(reference, target, reader, SamplerConfig::default()).unwrap();
    sampler.run(50_000);

    let report = RunReport::collect(&sampler, pair.exact_ratio(), None).unwrap();
    assert!(report.target_integral().is_none());
    assert_eq!(report.block_size, 1000);
    let steps: u64 = report.chains.iter().map(|(_, c)| c.steps).sum();
    assert_eq!(steps, 50_000);
    let table = report.format_table();
    assert!(table.contains("reference") && table.contains("target"));
    assert!(!table.contains("target integral"));
}
