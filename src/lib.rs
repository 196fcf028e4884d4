pub mod error;
pub mod config;
pub mod bias;
pub mod grid;
pub mod chain;
pub mod block_stats;
pub mod accumulator;
pub mod metropolis;
pub mod synthetic;
pub mod estimator;
pub mod step_fraction;
pub mod sampler;
pub mod persist;
pub mod orchestrator;
pub mod report;
pub mod logging;

pub mod utils {
    pub mod rng;
}

pub use bias::{BiasParameter, BiasReader, BiasWriter};
pub use chain::{Chain, ChainRole, OverlapSample, PerChain};
pub use config::{AlphaSelection, BlockSizing, CalibrationConfig, FractionPolicy, GridShape, SamplerConfig};
pub use error::{OverlapError, Result};
pub use estimator::OverlapEstimator;
pub use orchestrator::{Calibrator, Phase};
pub use report::RunReport;
pub use sampler::OverlapSampler;
