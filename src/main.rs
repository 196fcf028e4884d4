//! Overlap-sampling estimate of a Gaussian integral ratio: calibrate the
//! reference preference, then run production and print the result table.

use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use overlap::bias::BiasParameter;
use overlap::chain::{Chain, ChainRole};
use overlap::config::{AlphaSelection, CalibrationConfig, FractionPolicy, GridShape, SamplerConfig};
use overlap::logging::init_tracing;
use overlap::report::{write_grid_csv, RunReport};
use overlap::synthetic::GaussianPair;
use overlap::{Calibrator, OverlapSampler};

#[derive(Parser)]
struct Cli {
    /// Dimension of both Gaussians
    #[arg(long, default_value_t = 2)]
    dim: usize,

    #[arg(long, default_value_t = 1.0)]
    sigma_ref: f64,

    #[arg(long, default_value_t = 1.5)]
    sigma_target: f64,

    /// Random-walk Metropolis chains instead of independent draws
    #[arg(long)]
    metropolis: bool,

    #[arg(long, default_value_t = 0.5)]
    step_size: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 10_000)]
    search_steps: u64,

    #[arg(long, default_value_t = 10_000)]
    refine_steps: u64,

    #[arg(long, default_value_t = 10_000)]
    equilibration_steps: u64,

    /// Production steps, both chains together
    #[arg(long, default_value_t = 1_000_000)]
    steps: u64,

    #[arg(long, default_value_t = 1000)]
    block_size: u64,

    /// Persisted reference preference (read if present, written after refining)
    #[arg(long)]
    alpha_file: Option<PathBuf>,

    /// Skip the search with this reference preference
    #[arg(long)]
    alpha: Option<f64>,

    /// Re-search on this many points around a known alpha while equilibrating
    #[arg(long)]
    research_points: Option<usize>,

    /// Give each macro-step entirely to the chain that is behind
    #[arg(long)]
    aggressive: bool,

    /// Interpolate the crossover instead of taking the minimum-difference point
    #[arg(long)]
    interpolate: bool,

    /// Write the production grid scan here
    #[arg(long)]
    grid_csv: Option<PathBuf>,
}

fn main() -> overlap::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let pair = GaussianPair::new(cli.dim, cli.sigma_ref, cli.sigma_target);
    let config = CalibrationConfig {
        search_steps:         cli.search_steps,
        refine_steps:         cli.refine_steps,
        equilibration_steps:  cli.equilibration_steps,
        equilibrate_research: cli.research_points.map(|n| GridShape::new(n, 0.2)),
        selection:            if cli.interpolate { AlphaSelection::Interpolated } else { AlphaSelection::MinimumDifference },
        alpha_file:           cli.alpha_file.clone(),
        ..CalibrationConfig::default()
    };
    let sampler_config = SamplerConfig {
        block_size: cli.block_size,
        policy:     if cli.aggressive { FractionPolicy::Aggressive } else { FractionPolicy::default() },
        ..SamplerConfig::default()
    };

    let chain = |role: ChainRole| -> Box<dyn Chain> {
        if cli.metropolis {
            Box::new(pair.metropolis_chain(role, cli.step_size, cli.seed))
        } else {
            Box::new(pair.iid_chain(role, cli.seed))
        }
    };
    let (writer, reader) = BiasParameter::unset();
    let sampler = OverlapSampler::from_boxed(
        chain(ChainRole::Reference),
        chain(ChainRole::Target),
        reader,
        sampler_config,
    )?;
    let mut calibrator = Calibrator::new(config, sampler, writer)?;
    if let Some(alpha) = cli.alpha {
        calibrator.supply_alpha(alpha)?;
    }
    let alpha = calibrator.calibrate()?;
    for stage in calibrator.history() {
        println!(
            "{:<14} round {:>2}  points {:>3}  span {:>6.3}  blocks {:>5}  alpha {:.6e}",
            stage.phase.to_string(),
            stage.round,
            stage.points,
            stage.span,
            stage.blocks,
            stage.alpha.unwrap_or(f64::NAN),
        );
    }

    // ------------------------------------------------------------
    let mut sampler = calibrator.into_sampler()?;
    let bar = ProgressBar::new(cli.steps);
    bar.set_style(
        ProgressStyle::with_template(" {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    sampler.run_with(cli.steps, |n| bar.inc(n));
    bar.finish();

    let report = RunReport::collect(&sampler, alpha, Some(pair.reference_integral()))?;
    report.print();
    let exact = pair.exact_ratio();
    println!(
        "exact ratio = {:.8e}   deviation = {:.2} σ",
        exact,
        (report.ratio - exact) / report.ratio_error
    );

    if let Some(path) = &cli.grid_csv {
        write_grid_csv(path, &sampler.estimator()?.grid_scan()?)?;
        println!("Grid scan → {}", path.display());
    }
    Ok(())
}
