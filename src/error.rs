// error.rs - Typed failures for overlap calibration and reporting

use std::path::PathBuf;

use thiserror::Error;

use crate::chain::ChainRole;
use crate::orchestrator::Phase;

/// Everything that can stop a calibration or a report.
///
/// The degenerate-statistics variants are fatal: the sampler never produced
/// usable data, and retrying from the same starting configuration reproduces
/// the failure.
#[derive(Debug, Error)]
pub enum OverlapError {
    #[error("{chain} accumulator has no recorded samples")]
    EmptyAccumulator { chain: ChainRole },

    #[error("reference preference resolved to {alpha} (degenerate {chain} overlap average)")]
    DegenerateAlpha { chain: ChainRole, alpha: f64 },

    #[error("{phase} failed: {source}")]
    Calibration {
        phase: Phase,
        #[source]
        source: Box<OverlapError>,
    },

    #[error("cannot run {requested} while calibration is {from}")]
    InvalidTransition { from: Phase, requested: Phase },

    #[error("calibration aborted during {phase}; statistics were discarded")]
    Poisoned { phase: Phase },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not persist reference preference to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OverlapError {
    /// Chain responsible for a degenerate statistic, looking through phase wrappers.
    pub fn chain(&self) -> Option<ChainRole> {
        match self {
            Self::EmptyAccumulator { chain } | Self::DegenerateAlpha { chain, .. } => Some(*chain),
            Self::Calibration { source, .. } => source.chain(),
            _ => None,
        }
    }

    /// Phase in which a calibration failure happened.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Calibration { phase, .. } | Self::Poisoned { phase } => Some(*phase),
            _ => None,
        }
    }

    /// True for failures that must stop the run before `Locked`.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::EmptyAccumulator { .. } | Self::DegenerateAlpha { .. } | Self::Poisoned { .. } => true,
            Self::Calibration { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OverlapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_error_names_phase_and_chain() {
        let err = OverlapError::Calibration {
            phase: Phase::Searching,
            source: Box::new(OverlapError::DegenerateAlpha {
                chain: ChainRole::Target,
                alpha: f64::INFINITY,
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("SEARCHING"), "{msg}");
        assert!(msg.contains("target"), "{msg}");
        assert_eq!(err.chain(), Some(ChainRole::Target));
        assert_eq!(err.phase(), Some(Phase::Searching));
        assert!(err.is_fatal());
    }

    #[test]
    fn config_errors_are_not_fatal() {
        let err = OverlapError::InvalidConfig("points must be odd".into());
        assert!(!err.is_fatal());
        assert!(err.chain().is_none());
    }
}
