// block_stats.rs - Block averaging over vector-valued sample streams

/// Snapshot of one channel of a [`BlockAverage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub samples:           u64,
    pub blocks:            u64,
    /// Mean over every recorded sample (NaN before the first one).
    pub mean:              f64,
    /// Standard deviation of the block means.
    pub block_std_dev:     f64,
    /// Standard error of the mean, inflated when blocks are correlated.
    pub error:             f64,
    /// Lag-1 correlation between consecutive block means.
    pub block_correlation: f64,
}

impl ChannelStats {
    pub fn has_data(&self) -> bool {
        self.samples > 0
    }

    /// Error relative to |mean|.
    pub fn relative_error(&self) -> f64 {
        self.error / self.mean.abs()
    }
}

/// Fixed-size block accumulator for several channels sampled together.
///
/// Channel 0 is special only in that block covariances are kept between it
/// and every other channel; that is all a ratio `channel_j / channel_0` or
/// `channel_0 / channel_j` needs.
#[derive(Debug, Clone)]
pub struct BlockAverage {
    channels:   usize,
    block_size: u64,
    block_left: u64,
    samples:    u64,
    blocks:     u64,
    total:      Vec<f64>,
    block_sum:  Vec<f64>,
    sum:        Vec<f64>,
    sum_sq:     Vec<f64>,
    lag_sum:    Vec<f64>,
    first:      Vec<f64>,
    last:       Vec<f64>,
    cross:      Vec<f64>,
}

impl BlockAverage {
    pub fn new(channels: usize, block_size: u64) -> Self {
        let block_size = block_size.max(1);
        Self {
            channels,
            block_size,
            block_left: block_size,
            samples: 0,
            blocks: 0,
            total: vec![0.0; channels],
            block_sum: vec![0.0; channels],
            sum: vec![0.0; channels],
            sum_sq: vec![0.0; channels],
            lag_sum: vec![0.0; channels],
            first: vec![0.0; channels],
            last: vec![0.0; channels],
            cross: vec![0.0; channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    pub fn block_count(&self) -> u64 {
        self.blocks
    }

    /// Discard every sample, keeping channel count and block size.
    pub fn reset(&mut self) {
        self.block_left = self.block_size;
        self.samples = 0;
        self.blocks = 0;
        for v in [
            &mut self.total,
            &mut self.block_sum,
            &mut self.sum,
            &mut self.sum_sq,
            &mut self.lag_sum,
            &mut self.first,
            &mut self.last,
            &mut self.cross,
        ] {
            v.iter_mut().for_each(|x| *x = 0.0);
        }
    }

    /// Change the block size. Old blocks are not comparable, so this resets.
    pub fn set_block_size(&mut self, block_size: u64) {
        self.block_size = block_size.max(1);
        self.reset();
    }

    /// Record one vector sample (`values.len() == channels`).
    pub fn add(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.channels);
        for (i, &x) in values.iter().enumerate() {
            self.total[i] += x;
            self.block_sum[i] += x;
        }
        self.samples += 1;
        self.block_left -= 1;
        if self.block_left == 0 {
            self.close_block();
        }
    }

    fn close_block(&mut self) {
        let inv = 1.0 / self.block_size as f64;
        let head = self.block_sum[0] * inv;
        for i in 0..self.channels {
            let b = self.block_sum[i] * inv;
            self.sum[i] += b;
            self.sum_sq[i] += b * b;
            self.cross[i] += head * b;
            if self.blocks == 0 {
                self.first[i] = b;
            } else {
                self.lag_sum[i] += self.last[i] * b;
            }
            self.last[i] = b;
            self.block_sum[i] = 0.0;
        }
        self.blocks += 1;
        self.block_left = self.block_size;
    }

    pub fn mean(&self, ch: usize) -> f64 {
        if self.samples == 0 {
            f64::NAN
        } else {
            self.total[ch] / self.samples as f64
        }
    }

    fn block_mean(&self, ch: usize) -> f64 {
        self.sum[ch] / self.blocks as f64
    }

    fn block_variance(&self, ch: usize) -> f64 {
        let m = self.block_mean(ch);
        (self.sum_sq[ch] / self.blocks as f64 - m * m).max(0.0)
    }

    /// Lag-1 correlation of block means; NaN with fewer than two blocks.
    pub fn block_correlation(&self, ch: usize) -> f64 {
        if self.blocks < 2 {
            return f64::NAN;
        }
        let n = self.blocks as f64;
        let var = self.block_variance(ch);
        if var == 0.0 {
            return 0.0;
        }
        let m = self.block_mean(ch);
        let lagged = (self.lag_sum[ch] - m * (2.0 * self.sum[ch] - self.first[ch] - self.last[ch]))
            / (n - 1.0)
            + m * m;
        (lagged / var).clamp(-1.0, 1.0)
    }

    /// Factor applied to naive block errors when consecutive blocks are
    /// significantly positively correlated.
    pub fn inflation(&self, ch: usize) -> f64 {
        if self.blocks < 3 {
            return 1.0;
        }
        let c = self.block_correlation(ch);
        if c.is_nan() || c <= 1.0 / (self.blocks as f64).sqrt() {
            return 1.0;
        }
        let c = c.min(0.9);
        ((1.0 + c) / (1.0 - c)).sqrt()
    }

    /// Naive standard error of the mean from block means.
    pub fn raw_error(&self, ch: usize) -> f64 {
        if self.blocks < 2 {
            return f64::NAN;
        }
        (self.block_variance(ch) / (self.blocks - 1) as f64).sqrt()
    }

    pub fn error(&self, ch: usize) -> f64 {
        self.raw_error(ch) * self.inflation(ch)
    }

    /// Covariance between the estimated means of channel 0 and channel `ch`.
    pub fn mean_covariance(&self, ch: usize) -> f64 {
        if self.blocks < 2 {
            return f64::NAN;
        }
        let n = self.blocks as f64;
        (self.cross[ch] / n - self.block_mean(0) * self.block_mean(ch)) / (n - 1.0)
    }

    pub fn stats(&self, ch: usize) -> ChannelStats {
        ChannelStats {
            samples: self.samples,
            blocks: self.blocks,
            mean: self.mean(ch),
            block_std_dev: if self.blocks == 0 { f64::NAN } else { self.block_variance(ch).sqrt() },
            error: self.error(ch),
            block_correlation: self.block_correlation(ch),
        }
    }

    /// Ratio of means `channel 0 / channel ch` and its error, propagated with
    /// the block covariance between numerator and denominator.
    pub fn ratio(&self, ch: usize) -> (f64, f64) {
        let num = self.mean(0);
        let den = self.mean(ch);
        let r = num / den;
        if self.blocks < 2 {
            return (r, f64::NAN);
        }
        let e_num = self.raw_error(0);
        let e_den = self.raw_error(ch);
        let cov = self.mean_covariance(ch);
        let var = (e_num * e_num - 2.0 * r * cov + r * r * e_den * e_den).max(0.0);
        let inflate = self.inflation(0).max(self.inflation(ch));
        (r, var.sqrt() / den.abs() * inflate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_complete_blocks_only() {
        let mut acc = BlockAverage::new(1, 10);
        for i in 0..35 {
            acc.add(&[i as f64]);
        }
        assert_eq!(acc.sample_count(), 35);
        assert_eq!(acc.block_count(), 3);
        assert!((acc.mean(0) - 17.0).abs() < 1e-12);
    }

    #[test]
    fn alternating_blocks_are_anticorrelated() {
        let mut acc = BlockAverage::new(1, 1);
        for i in 0..100 {
            acc.add(&[if i % 2 == 0 { 1.0 } else { -1.0 }]);
        }
        assert!(acc.block_correlation(0) < -0.9);
        assert_eq!(acc.inflation(0), 1.0);
    }

    #[test]
    fn trending_blocks_inflate_error() {
        let mut acc = BlockAverage::new(1, 1);
        for i in 0..100 {
            acc.add(&[i as f64]);
        }
        assert!(acc.block_correlation(0) > 0.9);
        assert!(acc.error(0) > acc.raw_error(0));
    }

    #[test]
    fn constant_ratio_has_zero_error() {
        let mut acc = BlockAverage::new(2, 5);
        for i in 0..50 {
            let x = 1.0 + (i % 7) as f64;
            acc.add(&[2.0 * x, x]);
        }
        let (r, err) = acc.ratio(1);
        assert!((r - 2.0).abs() < 1e-12);
        assert!(err.abs() < 1e-9, "error {err}");
    }

    #[test]
    fn reset_keeps_shape() {
        let mut acc = BlockAverage::new(3, 4);
        for _ in 0..9 {
            acc.add(&[1.0, 2.0, 3.0]);
        }
        acc.reset();
        assert_eq!(acc.sample_count(), 0);
        assert_eq!(acc.block_count(), 0);
        assert_eq!(acc.channels(), 3);
        assert_eq!(acc.block_size(), 4);
        assert!(acc.mean(1).is_nan());
    }
}
