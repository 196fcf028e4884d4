// config.rs - Run-time configuration for calibration and sampling

use std::path::PathBuf;

use crate::error::{OverlapError, Result};

/// Number of trial values and their ln-α half-width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridShape {
    pub points: usize,
    pub span:   f64,
}

impl GridShape {
    pub const fn new(points: usize, span: f64) -> Self {
        Self { points, span }
    }

    /// One value, used for production and for trusted α.
    pub const fn single() -> Self {
        Self { points: 1, span: 0.0 }
    }

    pub fn validate(&self) -> Result<()> {
        if self.points == 0 || self.points % 2 == 0 {
            return Err(OverlapError::InvalidConfig(format!(
                "grid point count must be odd, got {}",
                self.points
            )));
        }
        if self.points > 1 && !(self.span.is_finite() && self.span > 0.0) {
            return Err(OverlapError::InvalidConfig(format!(
                "grid span must be positive and finite, got {}",
                self.span
            )));
        }
        Ok(())
    }
}

/// Block size derived from a phase's step budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSizing {
    pub target_blocks: u64,
    pub min:           u64,
    pub max:           u64,
}

impl Default for BlockSizing {
    fn default() -> Self {
        Self {
            target_blocks: 1000,
            min:           1000,
            max:           1_000_000,
        }
    }
}

impl BlockSizing {
    /// `steps / target_blocks`, clamped to `[min, max]`.
    pub fn block_size_for(&self, steps: u64) -> u64 {
        (steps / self.target_blocks.max(1)).clamp(self.min, self.max)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_blocks == 0 {
            return Err(OverlapError::InvalidConfig("target block count must be positive".into()));
        }
        if self.min == 0 || self.min > self.max {
            return Err(OverlapError::InvalidConfig(format!(
                "block size bounds [{}, {}] are not a valid range",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// How the reference step fraction responds to accumulated statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FractionPolicy {
    /// Never adjusted.
    Fixed,
    /// Every `interval` macro-steps, move `rate` of the way to the ideal fraction.
    Smoothed { interval: u64, rate: f64 },
    /// Recompute every macro-step and give the whole macro-step to the chain
    /// that is behind its ideal share.
    Aggressive,
}

impl Default for FractionPolicy {
    fn default() -> Self {
        FractionPolicy::Smoothed { interval: 10, rate: 0.5 }
    }
}

/// Scheduling parameters of the two-chain coordinator.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Chain steps per macro-step.
    pub macro_steps:      u64,
    pub initial_fraction: f64,
    /// Floor (and `1 - min_fraction` ceiling) on the adaptive fraction.
    pub min_fraction:     f64,
    pub policy:           FractionPolicy,
    pub block_size:       u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            macro_steps:      1000,
            initial_fraction: 0.5,
            min_fraction:     0.01,
            policy:           FractionPolicy::default(),
            block_size:       1000,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.macro_steps == 0 {
            return Err(OverlapError::InvalidConfig("macro-step length must be positive".into()));
        }
        if self.block_size == 0 {
            return Err(OverlapError::InvalidConfig("block size must be positive".into()));
        }
        if !(self.min_fraction > 0.0 && self.min_fraction < 0.5) {
            return Err(OverlapError::InvalidConfig(format!(
                "minimum step fraction must lie in (0, 0.5), got {}",
                self.min_fraction
            )));
        }
        if !(self.initial_fraction >= self.min_fraction
            && self.initial_fraction <= 1.0 - self.min_fraction)
        {
            return Err(OverlapError::InvalidConfig(format!(
                "initial step fraction {} outside [{}, {}]",
                self.initial_fraction,
                self.min_fraction,
                1.0 - self.min_fraction
            )));
        }
        if let FractionPolicy::Smoothed { interval, rate } = self.policy {
            if interval == 0 || !(rate > 0.0 && rate <= 1.0) {
                return Err(OverlapError::InvalidConfig(format!(
                    "smoothed fraction needs interval > 0 and rate in (0, 1], got {interval} / {rate}"
                )));
            }
        }
        Ok(())
    }
}

/// How α is read off a grid once a stage has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaSelection {
    /// Implied ratio at the minimum-difference location.
    #[default]
    MinimumDifference,
    /// Zero crossing of ln r - ln α, linearly interpolated in ln α.
    Interpolated,
}

/// Staged calibration schedule. Defaults follow the long-standing drivers;
/// none of the widths or counts is derived from anything.
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub search:               GridShape,
    pub search_center:        f64,
    pub search_steps:         u64,
    pub max_search_restarts:  usize,
    pub refine_rounds:        Vec<GridShape>,
    pub refine_steps:         u64,
    pub equilibration_steps:  u64,
    pub equilibrate_research: Option<GridShape>,
    pub block_sizing:         BlockSizing,
    pub selection:            AlphaSelection,
    pub alpha_file:           Option<PathBuf>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            search:               GridShape::new(21, 15.0),
            search_center:        1.0e4,
            search_steps:         10_000,
            max_search_restarts:  4,
            refine_rounds:        vec![GridShape::new(15, 1.5), GridShape::new(11, 0.2)],
            refine_steps:         10_000,
            equilibration_steps:  10_000,
            equilibrate_research: None,
            block_sizing:         BlockSizing::default(),
            selection:            AlphaSelection::default(),
            alpha_file:           None,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        if self.search.points < 3 {
            return Err(OverlapError::InvalidConfig("search grid needs at least 3 points".into()));
        }
        if !(self.search_center.is_finite() && self.search_center > 0.0) {
            return Err(OverlapError::InvalidConfig(format!(
                "search center must be positive and finite, got {}",
                self.search_center
            )));
        }
        if self.search_steps == 0 || self.equilibration_steps == 0 {
            return Err(OverlapError::InvalidConfig("step budgets must be positive".into()));
        }
        if !self.refine_rounds.is_empty() && self.refine_steps == 0 {
            return Err(OverlapError::InvalidConfig("refine rounds need a positive step budget".into()));
        }
        for round in &self.refine_rounds {
            round.validate()?;
        }
        if let Some(shape) = &self.equilibrate_research {
            shape.validate()?;
        }
        self.block_sizing.validate()
    }
}
