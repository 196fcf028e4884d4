// report.rs - Result tables and grid-scan export

use std::path::Path;

use csv::WriterBuilder;

use crate::block_stats::ChannelStats;
use crate::chain::{ChainRole, PerChain};
use crate::error::Result;
use crate::estimator::GridRow;
use crate::sampler::OverlapSampler;

/// Statistics of one chain at the locked α.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSummary {
    pub steps:       u64,
    pub value:       ChannelStats,
    pub overlap:     ChannelStats,
    pub ratio:       f64,
    pub ratio_error: f64,
}

/// Final result of a production run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub alpha:              f64,
    pub ratio:              f64,
    pub ratio_error:        f64,
    /// Known reference integral, when the ratio should be scaled to an
    /// absolute target integral.
    pub reference_integral: Option<f64>,
    pub block_size:         u64,
    pub fraction:           f64,
    pub chains:             PerChain<ChainSummary>,
}

impl RunReport {
    /// Collect the report at the sampler's current α.
    pub fn collect(sampler: &OverlapSampler, alpha: f64, reference_integral: Option<f64>) -> Result<Self> {
        let est = sampler.estimator()?;
        let (ratio, ratio_error) = est.ratio_and_error(alpha)?;
        let index = sampler.grid().nearest(alpha);
        let steps = sampler.steps();
        let chains = PerChain::from_fn(|role| {
            let acc = sampler.accumulator(role);
            let trial = acc.statistics(index);
            ChainSummary {
                steps: steps[role.index()],
                value: acc.value_statistics(),
                overlap: trial.overlap,
                ratio: trial.ratio,
                ratio_error: trial.ratio_error,
            }
        });
        Ok(Self {
            alpha,
            ratio,
            ratio_error,
            reference_integral,
            block_size: sampler.block_size(),
            fraction: sampler.fraction().value(),
            chains,
        })
    }

    /// Target integral and error, if the reference integral is known.
    pub fn target_integral(&self) -> Option<(f64, f64)> {
        self.reference_integral
            .map(|z| (self.ratio * z, self.ratio_error * z.abs()))
    }

    fn format_row(name: &str, s: &ChainSummary) -> String {
        format!(
            "{:<10} {:>12} {:>12.6} ± {:>10.6} {:>12.6} ± {:>10.6} {:>8.3} {:>12.6} ± {:>10.6}",
            name,
            s.steps,
            s.value.mean,
            s.value.error,
            s.overlap.mean,
            s.overlap.error,
            s.overlap.block_correlation,
            s.ratio,
            s.ratio_error,
        )
    }

    /// Printable table.
    pub fn format_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{:=<110}\n", ""));
        out.push_str("OVERLAP SAMPLING RESULT\n");
        out.push_str(&format!("{:=<110}\n", ""));
        out.push_str(&format!(
            "{:<10} {:>12} {:>25} {:>25} {:>8} {:>25}\n",
            "Chain", "Steps", "Value", "Overlap", "Corr", "Value/Overlap"
        ));
        out.push_str(&format!("{:-<110}\n", ""));
        for role in ChainRole::ALL {
            out.push_str(&Self::format_row(&role.to_string(), &self.chains[role]));
            out.push('\n');
        }
        out.push_str(&format!("{:-<110}\n", ""));
        out.push_str(&format!(
            "alpha = {:.6e}   block size = {}   reference fraction = {:.4}\n",
            self.alpha, self.block_size, self.fraction
        ));
        out.push_str(&format!("ratio = {:.8e} ± {:.3e}\n", self.ratio, self.ratio_error));
        if let Some((value, err)) = self.target_integral() {
            out.push_str(&format!("target integral = {value:.8e} ± {err:.3e}\n"));
        }
        out.push_str(&format!("{:=<110}", ""));
        out
    }

    pub fn print(&self) {
        println!("\n{}", self.format_table());
    }
}

/// Write the per-trial table of a grid scan.
pub fn write_grid_csv(path: impl AsRef<Path>, rows: &[GridRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record([
        "index", "alpha", "implied_ratio", "discrepancy",
        "reference_overlap", "reference_error", "target_overlap", "target_error",
    ])?;
    for r in rows {
        wtr.write_record(&[
            r.index.to_string(), r.alpha.to_string(),
            r.implied_ratio.to_string(), r.discrepancy.to_string(),
            r.reference_overlap.to_string(), r.reference_error.to_string(),
            r.target_overlap.to_string(), r.target_error.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
