use overlap::bias::BiasParameter;
use overlap::chain::ChainRole;
use overlap::config::{BlockSizing, CalibrationConfig, FractionPolicy, GridShape, SamplerConfig};
use overlap::grid::TrialGrid;
use overlap::orchestrator::Phase;
use overlap::synthetic::GaussianPair;
use overlap::{Calibrator, OverlapSampler};

fn gaussian_sampler(policy: FractionPolicy, seed: u64) -> OverlapSampler {
    let pair = GaussianPair::new(2, 1.0, 1.5);
    let (reference, target) = pair.iid_chains(seed);
    let (_writer, reader) = BiasParameter::unset();
    let config = SamplerConfig { policy, ..SamplerConfig::default() };
    OverlapSampler::new(reference, target, reader, config).unwrap()
}

#[test]
fn test_block_size_floor_gives_forty_blocks() {
    let steps = 40_000;
    let block_size = BlockSizing::default().block_size_for(steps);
    assert_eq!(block_size, 1000);

    let mut sampler = gaussian_sampler(FractionPolicy::default(), 1);
    let grid = TrialGrid::new(1.0e4, GridShape::new(21, 15.0)).unwrap();
    sampler.configure(&grid, block_size);
    sampler.fraction_mut().pin(0.5);
    sampler.run(steps);

    assert_eq!(sampler.block_size(), 1000);
    assert_eq!(sampler.steps(), [20_000, 20_000]);
    assert_eq!(sampler.completed_blocks(), 40);
    assert_eq!(sampler.accumulator(ChainRole::Reference).completed_blocks(), 20);
}

#[test]
fn test_search_stage_reports_forty_blocks() {
    let pair = GaussianPair::new(2, 1.0, 1.5);
    let (reference, target) = pair.iid_chains(4);
    let config = CalibrationConfig { search_steps: 40_000, ..CalibrationConfig::default() };
    let mut cal = Calibrator::with_chains(config, SamplerConfig::default(), reference, target).unwrap();
    cal.search().unwrap();

    let stage = &cal.history()[0];
    assert_eq!(stage.phase, Phase::Searching);
    assert_eq!(stage.block_size, 1000);
    assert_eq!(stage.blocks, 40);
    assert_eq!(stage.steps, 40_000);
}

#[test]
fn test_reconfigure_clears_statistics() {
    let mut sampler = gaussian_sampler(FractionPolicy::default(), 2);
    let grid = TrialGrid::new(2.0, GridShape::new(5, 1.0)).unwrap();
    sampler.configure(&grid, 10);
    sampler.run(500);
    assert!(sampler.accumulator(ChainRole::Target).statistics(2).has_data());

    let narrow = TrialGrid::new(2.0, GridShape::new(3, 0.1)).unwrap();
    sampler.configure(&narrow, 10);
    for role in ChainRole::ALL {
        for i in 0..narrow.len() {
            assert!(!sampler.accumulator(role).statistics(i).has_data());
        }
    }
    assert_eq!(sampler.steps(), [0, 0]);

    sampler.run(100);
    sampler.set_block_size(20);
    assert_eq!(sampler.completed_blocks(), 0);
    assert!(!sampler.accumulator(ChainRole::Reference).statistics(0).has_data());
    assert_eq!(sampler.total_steps(), 600);
}

#[test]
fn test_aggressive_mode_gives_whole_macro_steps() {
    let mut sampler = gaussian_sampler(FractionPolicy::Aggressive, 3);
    let grid = TrialGrid::single(2.25).unwrap();
    sampler.configure(&grid, 100);
    let mut macro_steps = 0;
    sampler.run_with(20_000, |n| {
        assert_eq!(n, 1000);
        macro_steps += 1;
    });
    assert_eq!(macro_steps, 20);

    let [r, t] = sampler.steps();
    assert_eq!(r % 1000, 0);
    assert_eq!(t % 1000, 0);
    assert!(r > 0 && t > 0);
    let f = sampler.fraction().value();
    assert!(f >= 0.01 && f <= 0.99);
}

#[test]
fn test_invalid_sampler_config_is_rejected() {
    let pair = GaussianPair::default();
    let (reference, target) = pair.iid_chains(0);
    let (_writer, reader) = BiasParameter::unset();
    let config = SamplerConfig { macro_steps: 0, ..SamplerConfig::default() };
    assert!(OverlapSampler::new(reference, target, reader, config).is_err());
}
