// accumulator.rs - Per-chain block statistics at every trial alpha

use crate::block_stats::{BlockAverage, ChannelStats};
use crate::chain::{ChainRole, OverlapSample};
use crate::grid::TrialGrid;

/// Statistics of one chain at one trial α.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialStatistics {
    pub alpha:       f64,
    pub samples:     u64,
    pub blocks:      u64,
    /// Overlap average ⟨γ/π_own⟩ at this α.
    pub overlap:     ChannelStats,
    /// ⟨value⟩ / ⟨overlap⟩ for this chain.
    pub ratio:       f64,
    pub ratio_error: f64,
}

impl TrialStatistics {
    /// False until a sample has been recorded since the last reset.
    pub fn has_data(&self) -> bool {
        self.samples > 0
    }

    pub fn relative_error(&self) -> f64 {
        self.ratio_error / self.ratio.abs()
    }
}

/// Multi-α accumulator attached to one chain.
///
/// Channel 0 holds the chain's own value, channel `1 + i` the overlap
/// function at trial α_i. Every sample updates all channels at once, so the
/// same stream of configurations is scored against every trial value.
#[derive(Debug, Clone)]
pub struct OverlapAccumulator {
    role:   ChainRole,
    grid:   TrialGrid,
    blocks: BlockAverage,
    row:    Vec<f64>,
}

impl OverlapAccumulator {
    pub fn new(role: ChainRole, grid: TrialGrid, block_size: u64) -> Self {
        let channels = grid.len() + 1;
        Self {
            role,
            grid,
            blocks: BlockAverage::new(channels, block_size),
            row: vec![0.0; channels],
        }
    }

    pub fn role(&self) -> ChainRole {
        self.role
    }

    pub fn grid(&self) -> &TrialGrid {
        &self.grid
    }

    pub fn block_size(&self) -> u64 {
        self.blocks.block_size()
    }

    /// Install a new grid and block size. All statistics are discarded.
    pub fn configure(&mut self, grid: TrialGrid, block_size: u64) {
        let channels = grid.len() + 1;
        self.grid = grid;
        self.blocks = BlockAverage::new(channels, block_size);
        self.row = vec![0.0; channels];
    }

    /// Change only the block size; statistics are discarded.
    pub fn set_block_size(&mut self, block_size: u64) {
        self.blocks.set_block_size(block_size);
    }

    pub fn reset(&mut self) {
        self.blocks.reset();
    }

    pub fn add_sample(&mut self, sample: &OverlapSample) {
        self.row[0] = sample.value;
        for (slot, &alpha) in self.row[1..].iter_mut().zip(self.grid.alphas()) {
            *slot = sample.overlap(self.role, alpha);
        }
        self.blocks.add(&self.row);
    }

    pub fn sample_count(&self) -> u64 {
        self.blocks.sample_count()
    }

    pub fn completed_blocks(&self) -> u64 {
        self.blocks.block_count()
    }

    /// Statistics of the chain's own value channel.
    pub fn value_statistics(&self) -> ChannelStats {
        self.blocks.stats(0)
    }

    /// Statistics of trial `index`.
    ///
    /// # Panics
    /// If `index` is not a point of the current grid.
    pub fn statistics(&self, index: usize) -> TrialStatistics {
        let ch = index + 1;
        let (ratio, ratio_error) = self.blocks.ratio(ch);
        TrialStatistics {
            alpha: self.grid.alpha(index),
            samples: self.blocks.sample_count(),
            blocks: self.blocks.block_count(),
            overlap: self.blocks.stats(ch),
            ratio,
            ratio_error,
        }
    }

    /// Mean overlap average at every trial, in grid order.
    pub fn overlap_means(&self) -> Vec<f64> {
        (0..self.grid.len()).map(|i| self.blocks.mean(i + 1)).collect()
    }
}
