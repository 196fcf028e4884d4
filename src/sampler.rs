// sampler.rs - Cooperative two-chain coordinator

use tracing::debug;

use crate::accumulator::OverlapAccumulator;
use crate::bias::BiasReader;
use crate::chain::{Chain, ChainRole, PerChain};
use crate::config::{FractionPolicy, SamplerConfig};
use crate::error::Result;
use crate::estimator::OverlapEstimator;
use crate::grid::TrialGrid;
use crate::step_fraction::StepFraction;

/// Drives the reference and target chains from one thread of control.
///
/// Work is done in macro-steps of `macro_steps` chain steps. Inside a
/// macro-step the chain that is behind its share advances next, so a 0.5
/// fraction alternates exactly; in aggressive mode the whole macro-step goes
/// to the chain that is behind. Each step's sample is recorded immediately
/// in that chain's accumulator, so block boundaries follow each chain's own
/// step sequence.
pub struct OverlapSampler {
    chains:       PerChain<Box<dyn Chain>>,
    accumulators: PerChain<OverlapAccumulator>,
    fraction:     StepFraction,
    config:       SamplerConfig,
    bias:         BiasReader,
    steps:        [u64; 2],
    total_steps:  u64,
}

impl OverlapSampler {
    pub fn new(
        reference: impl Chain + 'static,
        target: impl Chain + 'static,
        bias: BiasReader,
        config: SamplerConfig,
    ) -> Result<Self> {
        Self::from_boxed(Box::new(reference), Box::new(target), bias, config)
    }

    pub fn from_boxed(
        reference: Box<dyn Chain>,
        target: Box<dyn Chain>,
        bias: BiasReader,
        config: SamplerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let grid = TrialGrid::single(bias.get().unwrap_or(1.0))?;
        let mut chains = PerChain::new(reference, target);
        for (_, chain) in chains.iter_mut() {
            chain.bind_bias(bias.clone());
        }
        let accumulators =
            PerChain::from_fn(|role| OverlapAccumulator::new(role, grid.clone(), config.block_size));
        let fraction = StepFraction::new(config.initial_fraction, config.min_fraction, config.policy);
        Ok(Self {
            chains,
            accumulators,
            fraction,
            config,
            bias,
            steps: [0, 0],
            total_steps: 0,
        })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn bias(&self) -> &BiasReader {
        &self.bias
    }

    pub fn grid(&self) -> &TrialGrid {
        self.accumulators.reference().grid()
    }

    pub fn block_size(&self) -> u64 {
        self.accumulators.reference().block_size()
    }

    /// Block size used outside calibration.
    pub fn production_block_size(&self) -> u64 {
        self.config.block_size
    }

    /// Install `grid` and `block_size` on both accumulators; all statistics
    /// and step counters restart from zero.
    pub fn configure(&mut self, grid: &TrialGrid, block_size: u64) {
        for (_, acc) in self.accumulators.iter_mut() {
            acc.configure(grid.clone(), block_size);
        }
        self.steps = [0, 0];
        debug!(points = grid.len(), center = grid.center(), span = grid.span(), block_size, "accumulators configured");
    }

    pub fn set_block_size(&mut self, block_size: u64) {
        for (_, acc) in self.accumulators.iter_mut() {
            acc.set_block_size(block_size);
        }
        self.steps = [0, 0];
        debug!(block_size, "block size changed");
    }

    pub fn reset_statistics(&mut self) {
        for (_, acc) in self.accumulators.iter_mut() {
            acc.reset();
        }
        self.steps = [0, 0];
    }

    pub fn set_equilibrating(&mut self, equilibrating: bool) {
        for (_, chain) in self.chains.iter_mut() {
            chain.set_equilibrating(equilibrating);
        }
    }

    /// Clear proposal bookkeeping of both chains, keeping configurations.
    pub fn reset_chains(&mut self) {
        for (_, chain) in self.chains.iter_mut() {
            chain.reset_transient_state();
        }
    }

    pub fn fraction(&self) -> &StepFraction {
        &self.fraction
    }

    pub fn fraction_mut(&mut self) -> &mut StepFraction {
        &mut self.fraction
    }

    pub fn accumulator(&self, role: ChainRole) -> &OverlapAccumulator {
        &self.accumulators[role]
    }

    pub fn estimator(&self) -> Result<OverlapEstimator<'_>> {
        OverlapEstimator::new(self.accumulators.reference(), self.accumulators.target())
    }

    /// Steps per chain since the last reset of the statistics.
    pub fn steps(&self) -> [u64; 2] {
        self.steps
    }

    /// Steps of both chains over the sampler's lifetime.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Blocks completed by both accumulators together.
    pub fn completed_blocks(&self) -> u64 {
        self.accumulators.iter().map(|(_, acc)| acc.completed_blocks()).sum()
    }

    pub fn move_step_sizes(&self) -> PerChain<Vec<f64>> {
        PerChain::from_fn(|role| self.chains[role].move_step_sizes())
    }

    fn step_chain(&mut self, role: ChainRole) {
        let chain = &mut self.chains[role];
        chain.step();
        let sample = chain.sample();
        self.accumulators[role].add_sample(&sample);
        self.steps[role.index()] += 1;
        self.total_steps += 1;
    }

    fn adapt_fraction(&mut self) {
        if self.fraction.is_pinned() || self.fraction.policy() == FractionPolicy::Fixed {
            return;
        }
        let alpha = self.bias.get().unwrap_or_else(|| self.grid().center());
        let ideal = match self.estimator() {
            Ok(est) => est.ideal_reference_fraction(alpha, self.fraction.value()),
            Err(_) => return,
        };
        self.fraction.update(ideal);
    }

    /// Advance `steps` chain steps in total.
    pub fn run(&mut self, steps: u64) {
        self.run_with(steps, |_| {});
    }

    /// As [`OverlapSampler::run`], calling `on_macro_step` after every
    /// macro-step with the number of steps taken in it.
    pub fn run_with(&mut self, steps: u64, mut on_macro_step: impl FnMut(u64)) {
        let mut remaining = steps;
        while remaining > 0 {
            let n = remaining.min(self.config.macro_steps);
            if self.fraction.is_aggressive() {
                let role = self.fraction.behind(self.steps);
                for _ in 0..n {
                    self.step_chain(role);
                }
            } else {
                for _ in 0..n {
                    let role = self.fraction.behind(self.steps);
                    self.step_chain(role);
                }
            }
            remaining -= n;
            self.adapt_fraction();
            on_macro_step(n);
        }
    }
}
