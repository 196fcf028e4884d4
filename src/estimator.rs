// estimator.rs - Overlap (Bennett) combination of the two chains' statistics

use tracing::debug;

use crate::accumulator::OverlapAccumulator;
use crate::chain::ChainRole;
use crate::config::AlphaSelection;
use crate::error::{OverlapError, Result};

/// Relative tolerance for matching a requested α to a grid point.
const ALPHA_MATCH_TOL: f64 = 1e-9;

/// Index of the first smallest value; 0 for an empty or all-NaN slice.
pub fn lowest_minimum(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < values[best] || values[best].is_nan() {
            best = i;
        }
    }
    best
}

/// One line of a grid scan.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub index:             usize,
    pub alpha:             f64,
    pub implied_ratio:     f64,
    pub discrepancy:       f64,
    pub reference_overlap: f64,
    pub reference_error:   f64,
    pub target_overlap:    f64,
    pub target_error:      f64,
}

/// Read-only view over both chains' accumulators.
///
/// At trial α_i the reference chain's overlap average divided by the target
/// chain's estimates Z_target/Z_reference. Where this implied ratio agrees
/// with α_i itself the two chains' statistics are balanced; that agreement
/// is what calibration searches for.
#[derive(Debug, Clone, Copy)]
pub struct OverlapEstimator<'a> {
    reference: &'a OverlapAccumulator,
    target:    &'a OverlapAccumulator,
}

impl<'a> OverlapEstimator<'a> {
    pub fn new(reference: &'a OverlapAccumulator, target: &'a OverlapAccumulator) -> Result<Self> {
        if reference.grid().alphas() != target.grid().alphas() {
            return Err(OverlapError::InvalidConfig(
                "reference and target accumulators track different trial grids".into(),
            ));
        }
        Ok(Self { reference, target })
    }

    pub fn len(&self) -> usize {
        self.reference.grid().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn accumulator(&self, role: ChainRole) -> &'a OverlapAccumulator {
        match role {
            ChainRole::Reference => self.reference,
            ChainRole::Target => self.target,
        }
    }

    /// Fails on the first chain with nothing recorded.
    fn require_data(&self) -> Result<()> {
        for role in ChainRole::ALL {
            if self.accumulator(role).sample_count() == 0 {
                return Err(OverlapError::EmptyAccumulator { chain: role });
            }
        }
        Ok(())
    }

    /// ⟨o_i⟩_reference / ⟨o_i⟩_target.
    pub fn overlap_ratio(&self, index: usize) -> f64 {
        let r = self.reference.statistics(index).overlap.mean;
        let t = self.target.statistics(index).overlap.mean;
        r / t
    }

    pub fn implied_ratios(&self) -> Result<Vec<f64>> {
        self.require_data()?;
        Ok((0..self.len()).map(|i| self.overlap_ratio(i)).collect())
    }

    /// d_i = r_i/α_i + α_i/r_i - 2, with non-finite values mapped to +∞.
    pub fn discrepancies(&self) -> Result<Vec<f64>> {
        let grid = self.reference.grid();
        Ok(self
            .implied_ratios()?
            .into_iter()
            .zip(grid.alphas())
            .map(|(r, &a)| {
                let d = r / a + a / r - 2.0;
                if d.is_finite() { d } else { f64::INFINITY }
            })
            .collect())
    }

    /// Lowest index attaining the smallest discrepancy.
    pub fn minimum_difference_location(&self) -> Result<usize> {
        Ok(lowest_minimum(&self.discrepancies()?))
    }

    /// Chain whose overlap average makes the implied ratio at `index` unusable.
    fn degenerate_chain(&self, index: usize) -> ChainRole {
        let r = self.reference.statistics(index).overlap.mean;
        if !(r.is_finite() && r > 0.0) {
            ChainRole::Reference
        } else {
            ChainRole::Target
        }
    }

    /// α implied at `index`; fatal unless finite and positive.
    pub fn alpha_at(&self, index: usize) -> Result<f64> {
        self.require_data()?;
        let alpha = self.overlap_ratio(index);
        if alpha.is_finite() && alpha > 0.0 {
            Ok(alpha)
        } else {
            Err(OverlapError::DegenerateAlpha { chain: self.degenerate_chain(index), alpha })
        }
    }

    /// Zero of ln r - ln α, linear in ln α between the bracketing trials.
    /// Clamped to the grid ends when the difference never changes sign.
    pub fn interpolated_alpha(&self) -> Result<f64> {
        let ratios = self.implied_ratios()?;
        let grid = self.reference.grid();
        if grid.is_single() {
            return self.alpha_at(0);
        }
        let points: Vec<(f64, f64)> = ratios
            .iter()
            .zip(grid.alphas())
            .filter(|(r, _)| r.is_finite() && **r > 0.0)
            .map(|(r, a)| (a.ln(), r.ln() - a.ln()))
            .collect();
        if points.is_empty() {
            return self.alpha_at(self.minimum_difference_location()?);
        }
        for w in points.windows(2) {
            let ((x0, y0), (x1, y1)) = (w[0], w[1]);
            if y0 == 0.0 {
                return Ok(x0.exp());
            }
            if (y0 > 0.0) != (y1 > 0.0) || y1 == 0.0 {
                return Ok((x0 + y0 * (x1 - x0) / (y0 - y1)).exp());
            }
        }
        let (first, last) = (points[0], points[points.len() - 1]);
        // one sign everywhere: ratio above every trial means α must grow
        Ok(if last.1 > 0.0 { last.0.exp() } else { first.0.exp() })
    }

    /// Grid index and α chosen by `selection`.
    pub fn resolve_alpha(&self, selection: AlphaSelection) -> Result<(usize, f64)> {
        let location = self.minimum_difference_location()?;
        let alpha = match selection {
            AlphaSelection::MinimumDifference => self.alpha_at(location)?,
            AlphaSelection::Interpolated => {
                // validates the location as well
                self.alpha_at(location)?;
                self.interpolated_alpha()?
            }
        };
        debug!(location, alpha, ?selection, "resolved reference preference");
        Ok((location, alpha))
    }

    /// I_target / I_reference and its error at grid point `index`.
    pub fn ratio_at(&self, index: usize) -> Result<(f64, f64)> {
        self.require_data()?;
        let r = self.reference.statistics(index);
        let t = self.target.statistics(index);
        let ratio = t.ratio / r.ratio;
        let rel = (r.relative_error().powi(2) + t.relative_error().powi(2)).sqrt();
        Ok((ratio, rel * ratio.abs()))
    }

    /// Production ratio and error at `alpha`, using the exact trial when α is
    /// a grid point and log-linear interpolation otherwise.
    pub fn ratio_and_error(&self, alpha: f64) -> Result<(f64, f64)> {
        self.require_data()?;
        let alphas = self.reference.grid().alphas();
        if let Some(i) = alphas
            .iter()
            .position(|&a| ((a - alpha) / a).abs() <= ALPHA_MATCH_TOL)
        {
            return self.ratio_at(i);
        }
        let n = alphas.len();
        if n == 1 || alpha <= alphas[0] {
            return self.ratio_at(0);
        }
        if alpha >= alphas[n - 1] {
            return self.ratio_at(n - 1);
        }
        let hi = alphas.iter().position(|&a| a > alpha).unwrap_or(n - 1);
        let lo = hi - 1;
        let w = (alpha.ln() - alphas[lo].ln()) / (alphas[hi].ln() - alphas[lo].ln());
        let (r0, e0) = self.ratio_at(lo)?;
        let (r1, e1) = self.ratio_at(hi)?;
        Ok((r0 + w * (r1 - r0), e0 + w * (e1 - e0)))
    }

    /// Reference share of steps that would balance the two chains'
    /// contributions to the ratio error, given the share `current` that
    /// produced the present statistics. 0.5 until both chains have two blocks.
    pub fn ideal_reference_fraction(&self, alpha: f64, current: f64) -> f64 {
        if self.reference.completed_blocks() < 2 || self.target.completed_blocks() < 2 {
            return 0.5;
        }
        let i = self.reference.grid().nearest(alpha);
        let rel = |role: ChainRole| {
            let e = self.accumulator(role).statistics(i).relative_error();
            if e.is_nan() || e > 1.0 { 1.0 } else { e }
        };
        let (e_ref, e_tgt) = (rel(ChainRole::Reference), rel(ChainRole::Target));
        let f = 1.0 / (1.0 + (e_tgt / e_ref) * ((1.0 - current) / current).sqrt());
        if f.is_finite() { f } else { 0.5 }
    }

    /// Per-trial table of the current statistics.
    pub fn grid_scan(&self) -> Result<Vec<GridRow>> {
        let d = self.discrepancies()?;
        Ok((0..self.len())
            .map(|i| {
                let r = self.reference.statistics(i);
                let t = self.target.statistics(i);
                GridRow {
                    index: i,
                    alpha: r.alpha,
                    implied_ratio: r.overlap.mean / t.overlap.mean,
                    discrepancy: d[i],
                    reference_overlap: r.overlap.mean,
                    reference_error: r.overlap.error,
                    target_overlap: t.overlap.mean,
                    target_error: t.overlap.error,
                }
            })
            .collect())
    }
}
