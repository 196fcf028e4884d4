// grid.rs - Trial grids of reference-preference values

use crate::config::GridShape;
use crate::error::{OverlapError, Result};

/// Set of α values tracked simultaneously by an accumulator.
///
/// Points are spaced evenly in ln α over `[center·e^-span, center·e^span]`.
/// The point count is odd so that `center` is always one of the points.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialGrid {
    center: f64,
    span: f64,
    alphas: Vec<f64>,
}

impl TrialGrid {
    pub fn new(center: f64, shape: GridShape) -> Result<Self> {
        shape.validate()?;
        if !(center.is_finite() && center > 0.0) {
            return Err(OverlapError::InvalidConfig(format!(
                "grid center must be positive and finite, got {center}"
            )));
        }
        let n = shape.points;
        let alphas = if n == 1 {
            vec![center]
        } else {
            let half = (n - 1) as f64;
            (0..n)
                .map(|i| center * (shape.span * (2.0 * i as f64 / half - 1.0)).exp())
                .collect()
        };
        Ok(Self { center, span: if n == 1 { 0.0 } else { shape.span }, alphas })
    }

    /// Production grid: exactly one value.
    pub fn single(alpha: f64) -> Result<Self> {
        Self::new(alpha, GridShape::single())
    }

    pub fn len(&self) -> usize {
        self.alphas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alphas.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.alphas.len() == 1
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn span(&self) -> f64 {
        self.span
    }

    /// # Panics
    /// If `index >= self.len()`.
    pub fn alpha(&self, index: usize) -> f64 {
        self.alphas[index]
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    /// Spacing between neighbouring points in ln α (0 for a single point).
    pub fn log_step(&self) -> f64 {
        if self.alphas.len() < 2 {
            0.0
        } else {
            2.0 * self.span / (self.alphas.len() - 1) as f64
        }
    }

    /// True for the first and last point of a multi-point grid.
    pub fn is_edge(&self, index: usize) -> bool {
        self.alphas.len() > 1 && (index == 0 || index + 1 == self.alphas.len())
    }

    /// Index whose α is nearest to `alpha` in ln α.
    pub fn nearest(&self, alpha: f64) -> usize {
        let target = alpha.ln();
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, a) in self.alphas.iter().enumerate() {
            let d = (a.ln() - target).abs();
            if d < best_dist {
                best = i;
                best_dist = d;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_log_symmetric_about_center() {
        let grid = TrialGrid::new(4.0, GridShape::new(5, 2.0)).unwrap();
        assert_eq!(grid.len(), 5);
        assert!((grid.alpha(2) - 4.0).abs() < 1e-12);
        assert!((grid.alpha(0) - 4.0 * (-2.0f64).exp()).abs() < 1e-12);
        assert!((grid.alpha(4) - 4.0 * 2.0f64.exp()).abs() < 1e-9);
        assert!((grid.log_step() - 1.0).abs() < 1e-12);
        assert!(grid.is_edge(0) && grid.is_edge(4) && !grid.is_edge(2));
    }

    #[test]
    fn single_point_grid() {
        let grid = TrialGrid::single(2.5).unwrap();
        assert!(grid.is_single());
        assert_eq!(grid.alpha(0), 2.5);
        assert!(!grid.is_edge(0));
        assert_eq!(grid.nearest(100.0), 0);
    }

    #[test]
    #[should_panic]
    fn alpha_past_last_point_panics() {
        let grid = TrialGrid::new(1.0, GridShape::new(3, 1.0)).unwrap();
        grid.alpha(3);
    }

    #[test]
    fn rejects_even_grids_and_bad_centers() {
        assert!(TrialGrid::new(1.0, GridShape::new(4, 1.0)).is_err());
        assert!(TrialGrid::new(0.0, GridShape::new(3, 1.0)).is_err());
        assert!(TrialGrid::new(f64::NAN, GridShape::new(3, 1.0)).is_err());
    }
}
