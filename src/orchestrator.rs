// orchestrator.rs - Staged calibration of the reference preference
//
// SEARCHING -> REFINING -> EQUILIBRATING -> LOCKED, with a shortcut to
// EQUILIBRATING when α is already known (persisted file or caller supplied).

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::bias::{BiasParameter, BiasWriter};
use crate::chain::{Chain, ChainRole};
use crate::config::{CalibrationConfig, FractionPolicy, GridShape, SamplerConfig};
use crate::error::{OverlapError, Result};
use crate::grid::TrialGrid;
use crate::persist::AlphaStore;
use crate::sampler::OverlapSampler;

/// Calibration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Searching,
    Refining,
    Equilibrating,
    Locked,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Searching => "SEARCHING",
            Phase::Refining => "REFINING",
            Phase::Equilibrating => "EQUILIBRATING",
            Phase::Locked => "LOCKED",
        };
        f.write_str(name)
    }
}

/// One grid pass of the calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    pub phase:      Phase,
    pub round:      usize,
    pub points:     usize,
    pub center:     f64,
    pub span:       f64,
    pub block_size: u64,
    pub steps:      u64,
    pub blocks:     u64,
    /// Minimum-difference location, when α was resolved from this pass.
    pub location:   Option<usize>,
    /// α after the pass.
    pub alpha:      Option<f64>,
}

/// Owner of the α writer and of the sampler during calibration.
pub struct Calibrator {
    config:   CalibrationConfig,
    sampler:  OverlapSampler,
    bias:     BiasWriter,
    store:    Option<AlphaStore>,
    phase:    Phase,
    begun:    bool,
    poisoned: Option<Phase>,
    history:  Vec<StageRecord>,
}

impl Calibrator {
    /// `sampler` must read the cell that `bias` writes.
    pub fn new(config: CalibrationConfig, sampler: OverlapSampler, bias: BiasWriter) -> Result<Self> {
        config.validate()?;
        if !sampler.bias().is_fed_by(&bias) {
            return Err(OverlapError::InvalidConfig(
                "sampler does not read the calibrator's reference preference".into(),
            ));
        }
        let store = config.alpha_file.clone().map(AlphaStore::new);
        Ok(Self {
            config,
            sampler,
            bias,
            store,
            phase: Phase::Searching,
            begun: false,
            poisoned: None,
            history: Vec::new(),
        })
    }

    /// Build the α cell and the sampler around two chains.
    pub fn with_chains(
        config: CalibrationConfig,
        sampler_config: SamplerConfig,
        reference: impl Chain + 'static,
        target: impl Chain + 'static,
    ) -> Result<Self> {
        let (writer, reader) = BiasParameter::unset();
        let sampler = OverlapSampler::new(reference, target, reader, sampler_config)?;
        Self::new(config, sampler, writer)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        self.phase == Phase::Locked
    }

    pub fn alpha(&self) -> Option<f64> {
        self.bias.get()
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn history(&self) -> &[StageRecord] {
        &self.history
    }

    pub fn sampler(&self) -> &OverlapSampler {
        &self.sampler
    }

    /// Mutable access for production, only once calibration is locked.
    pub fn sampler_mut(&mut self) -> Result<&mut OverlapSampler> {
        self.require_locked()?;
        Ok(&mut self.sampler)
    }

    /// Hand the locked sampler to the production driver.
    pub fn into_sampler(self) -> Result<OverlapSampler> {
        self.require_locked()?;
        Ok(self.sampler)
    }

    fn require_locked(&self) -> Result<()> {
        if let Some(phase) = self.poisoned {
            return Err(OverlapError::Poisoned { phase });
        }
        if self.phase != Phase::Locked {
            return Err(OverlapError::InvalidTransition { from: self.phase, requested: Phase::Locked });
        }
        Ok(())
    }

    fn check(&self, requested: Phase, allowed: &[Phase]) -> Result<()> {
        if let Some(phase) = self.poisoned {
            return Err(OverlapError::Poisoned { phase });
        }
        if !allowed.contains(&self.phase) {
            return Err(OverlapError::InvalidTransition { from: self.phase, requested });
        }
        Ok(())
    }

    /// Discard everything sampled so far and refuse further work.
    fn fail(&mut self, phase: Phase, err: OverlapError) -> OverlapError {
        self.sampler.reset_statistics();
        self.sampler.set_equilibrating(false);
        self.poisoned = Some(phase);
        error!(%phase, chain = ?err.chain(), error = %err, "calibration aborted");
        OverlapError::Calibration { phase, source: Box::new(err) }
    }

    /// Decide the entry phase: EQUILIBRATING if α is already known (cell
    /// pre-set, or a valid persisted file), SEARCHING otherwise.
    pub fn begin(&mut self) -> Result<Phase> {
        if self.begun {
            return Ok(self.phase);
        }
        self.check(Phase::Searching, &[Phase::Searching])?;
        self.begun = true;
        let known = self.bias.get().or_else(|| self.store.as_ref().and_then(AlphaStore::load));
        match known {
            Some(alpha) => self.enter_trusted(alpha)?,
            None => {
                self.bias.clear();
                info!(phase = %Phase::Searching, "no reference preference available, searching");
            }
        }
        Ok(self.phase)
    }

    /// Skip the search with a caller-provided α.
    pub fn supply_alpha(&mut self, alpha: f64) -> Result<()> {
        self.check(Phase::Equilibrating, &[Phase::Searching, Phase::Equilibrating])?;
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(OverlapError::InvalidConfig(format!(
                "supplied reference preference must be positive and finite, got {alpha}"
            )));
        }
        self.begun = true;
        self.enter_trusted(alpha)
    }

    fn enter_trusted(&mut self, alpha: f64) -> Result<()> {
        self.bias.set(alpha);
        let grid = TrialGrid::single(alpha)?;
        self.sampler.configure(&grid, self.sampler.production_block_size());
        self.phase = Phase::Equilibrating;
        info!(phase = %self.phase, alpha, "reference preference supplied, skipping search");
        Ok(())
    }

    /// Run the remaining phases to LOCKED and return the locked α.
    pub fn calibrate(&mut self) -> Result<f64> {
        if self.begin()? == Phase::Searching {
            self.search()?;
        }
        if self.phase == Phase::Refining {
            self.refine()?;
        }
        self.equilibrate()
    }

    fn resolve(&self) -> Result<(usize, f64)> {
        let est = self.sampler.estimator()?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            for row in est.grid_scan()? {
                debug!(
                    index = row.index,
                    alpha = row.alpha,
                    ratio = row.implied_ratio,
                    discrepancy = row.discrepancy,
                    "grid point"
                );
            }
        }
        est.resolve_alpha(self.config.selection)
    }

    fn record(&mut self, phase: Phase, round: usize, grid: &TrialGrid, steps: u64, location: Option<usize>) {
        self.history.push(StageRecord {
            phase,
            round,
            points: grid.len(),
            center: grid.center(),
            span: grid.span(),
            block_size: self.sampler.block_size(),
            steps,
            blocks: self.sampler.completed_blocks(),
            location,
            alpha: self.bias.get(),
        });
    }

    /// Pin an adjustable fraction at 0.5 for a calibration stage. A fixed
    /// fraction keeps its configured value throughout.
    fn pin_fraction(&mut self) {
        let fraction = self.sampler.fraction_mut();
        if fraction.policy() != FractionPolicy::Fixed {
            fraction.pin(0.5);
        }
    }

    /// Wide-grid search with the step fraction pinned at 0.5. An edge
    /// result re-centres the grid and searches again, up to
    /// `max_search_restarts` times.
    pub fn search(&mut self) -> Result<f64> {
        self.begin()?;
        self.check(Phase::Searching, &[Phase::Searching])?;
        self.search_inner().map_err(|e| self.fail(Phase::Searching, e))
    }

    fn search_inner(&mut self) -> Result<f64> {
        let steps = self.config.search_steps;
        let block_size = self.config.block_sizing.block_size_for(steps);
        let mut center = self.config.search_center;
        self.pin_fraction();

        let mut attempt = 0;
        let alpha = loop {
            let grid = TrialGrid::new(center, self.config.search)?;
            info!(
                phase = %Phase::Searching,
                attempt,
                points = grid.len(),
                center,
                span = grid.span(),
                block_size,
                "searching reference preference"
            );
            self.sampler.configure(&grid, block_size);
            self.sampler.run(steps);
            let (location, alpha) = self.resolve()?;
            self.bias.set(alpha);
            self.record(Phase::Searching, attempt, &grid, steps, Some(location));

            if !grid.is_edge(location) {
                break alpha;
            }
            if attempt >= self.config.max_search_restarts {
                warn!(location, alpha, "search ended on the grid edge, accepting it");
                break alpha;
            }
            warn!(location, alpha, "search ended on the grid edge, re-centring");
            center = alpha;
            attempt += 1;
        };

        info!(phase = %Phase::Searching, alpha, "reference preference set");
        self.sampler.reset_chains();
        self.sampler.fraction_mut().unpin();
        self.phase = Phase::Refining;
        Ok(alpha)
    }

    /// Fixed sequence of narrowing grids around the current α, with move
    /// step sizes adapting. The result is persisted.
    pub fn refine(&mut self) -> Result<f64> {
        self.check(Phase::Refining, &[Phase::Refining])?;
        self.refine_inner().map_err(|e| self.fail(Phase::Refining, e))
    }

    fn refine_inner(&mut self) -> Result<f64> {
        let steps = self.config.refine_steps;
        let block_size = self.config.block_sizing.block_size_for(steps);
        let mut alpha = self.bias.get().ok_or(OverlapError::InvalidTransition {
            from: Phase::Searching,
            requested: Phase::Refining,
        })?;

        self.pin_fraction();
        self.sampler.set_equilibrating(true);
        let rounds = self.config.refine_rounds.clone();
        for (round, shape) in rounds.iter().enumerate() {
            let grid = TrialGrid::new(alpha, *shape)?;
            info!(
                phase = %Phase::Refining,
                round,
                points = grid.len(),
                span = grid.span(),
                center = alpha,
                block_size,
                "refining reference preference"
            );
            self.sampler.configure(&grid, block_size);
            self.sampler.run(steps);
            let (location, resolved) = self.resolve()?;
            alpha = resolved;
            self.bias.set(alpha);
            self.record(Phase::Refining, round, &grid, steps, Some(location));
            info!(phase = %Phase::Refining, round, location, alpha, "reference preference set");
        }
        self.sampler.set_equilibrating(false);
        self.sampler.fraction_mut().unpin();

        self.persist(alpha)?;
        let grid = TrialGrid::single(alpha)?;
        self.sampler.configure(&grid, self.sampler.production_block_size());
        self.phase = Phase::Equilibrating;
        Ok(alpha)
    }

    fn persist(&self, alpha: f64) -> Result<()> {
        match &self.store {
            Some(store) => store.save(alpha),
            None => Ok(()),
        }
    }

    /// Tune step sizes at fixed α with the fraction pinned at 0.5, then
    /// restore the production block size and lock. Called with α still
    /// unset, this runs on the search grid and resolves α at the end.
    pub fn equilibrate(&mut self) -> Result<f64> {
        self.begin()?;
        self.check(Phase::Equilibrating, &[Phase::Searching, Phase::Equilibrating])?;
        self.equilibrate_inner().map_err(|e| self.fail(Phase::Equilibrating, e))
    }

    fn equilibrate_inner(&mut self) -> Result<f64> {
        let steps = self.config.equilibration_steps;
        let block_size = self.config.block_sizing.block_size_for(steps);
        let known = self.bias.get();
        let (grid, research) = match (known, self.config.equilibrate_research) {
            (None, _) => (TrialGrid::new(self.config.search_center, self.config.search)?, true),
            (Some(alpha), Some(shape)) => (TrialGrid::new(alpha, shape)?, true),
            (Some(alpha), None) => (TrialGrid::new(alpha, GridShape::single())?, false),
        };

        self.phase = Phase::Equilibrating;
        self.sampler.set_equilibrating(true);
        self.pin_fraction();
        info!(
            phase = %Phase::Equilibrating,
            points = grid.len(),
            center = grid.center(),
            block_size,
            steps,
            "equilibrating"
        );
        self.sampler.configure(&grid, block_size);
        self.sampler.run(steps);

        let location = if research {
            let (location, alpha) = self.resolve()?;
            self.bias.set(alpha);
            info!(phase = %Phase::Equilibrating, location, alpha, "reference preference set");
            if known.is_none() {
                self.persist(alpha)?;
            }
            Some(location)
        } else {
            None
        };
        self.record(Phase::Equilibrating, 0, &grid, steps, location);
        if location.is_none() {
            self.sampler.reset_statistics();
        }

        self.sampler.fraction_mut().unpin();
        self.sampler.set_equilibrating(false);
        let alpha = self.bias.get().ok_or(OverlapError::DegenerateAlpha {
            chain: ChainRole::Reference,
            alpha: self.bias.reader().raw(),
        })?;
        let production = TrialGrid::single(alpha)?;
        self.sampler.configure(&production, self.sampler.production_block_size());
        self.phase = Phase::Locked;
        info!(
            phase = %Phase::Locked,
            alpha,
            step_sizes = ?self.sampler.move_step_sizes(),
            "calibration locked"
        );
        Ok(alpha)
    }
}
