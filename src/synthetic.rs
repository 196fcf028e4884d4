// synthetic.rs - Gaussian test systems with a closed-form integral ratio

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

use crate::chain::{Chain, ChainRole, OverlapSample};
use crate::metropolis::{Density, MetropolisChain};
use crate::utils::rng::mix_seed;

/// Two isotropic Gaussians `exp(-|x|²/2σ²)` in `dim` dimensions.
///
/// The reference is the σ_ref Gaussian, the target the σ_target one, so
/// Z_target / Z_reference = (σ_target / σ_ref)^dim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianPair {
    pub dim:          usize,
    pub sigma_ref:    f64,
    pub sigma_target: f64,
}

impl Default for GaussianPair {
    fn default() -> Self {
        Self { dim: 2, sigma_ref: 1.0, sigma_target: 1.5 }
    }
}

impl GaussianPair {
    pub fn new(dim: usize, sigma_ref: f64, sigma_target: f64) -> Self {
        Self { dim, sigma_ref, sigma_target }
    }

    pub fn sigma(&self, role: ChainRole) -> f64 {
        match role {
            ChainRole::Reference => self.sigma_ref,
            ChainRole::Target => self.sigma_target,
        }
    }

    /// Exact Z_target / Z_reference.
    pub fn exact_ratio(&self) -> f64 {
        (self.sigma_target / self.sigma_ref).powi(self.dim as i32)
    }

    /// Closed-form reference integral (2πσ_ref²)^(dim/2).
    pub fn reference_integral(&self) -> f64 {
        (2.0 * std::f64::consts::PI * self.sigma_ref * self.sigma_ref).powf(self.dim as f64 / 2.0)
    }

    pub fn density(&self, role: ChainRole) -> Density {
        let inv = 0.5 / (self.sigma(role) * self.sigma(role));
        Box::new(move |x: &[f64]| (-inv * x.iter().map(|v| v * v).sum::<f64>()).exp())
    }

    /// Perfect-sampling chain for `role`, seeded from `(seed, role)`.
    pub fn iid_chain(&self, role: ChainRole, seed: u64) -> GaussianChain {
        GaussianChain::new(*self, role, mix_seed(seed, role.index() as u64))
    }

    pub fn iid_chains(&self, seed: u64) -> (GaussianChain, GaussianChain) {
        (self.iid_chain(ChainRole::Reference, seed), self.iid_chain(ChainRole::Target, seed))
    }

    /// Random-walk Metropolis chain for `role`, started at the origin.
    pub fn metropolis_chain(&self, role: ChainRole, step_size: f64, seed: u64) -> MetropolisChain {
        MetropolisChain::new(
            vec![0.0; self.dim],
            step_size,
            self.density(role),
            self.density(role.other()),
            mix_seed(seed, role.index() as u64),
        )
    }
}

/// Chain drawing an independent Gaussian configuration every step.
pub struct GaussianChain {
    role:     ChainRole,
    pair:     GaussianPair,
    sigma:    f64,
    x:        Vec<f64>,
    r2:       f64,
    rng:      Pcg64,
}

impl GaussianChain {
    pub fn new(pair: GaussianPair, role: ChainRole, seed: u64) -> Self {
        Self {
            role,
            pair,
            sigma: pair.sigma(role),
            x: vec![0.0; pair.dim],
            r2: 0.0,
            rng: Pcg64::seed_from_u64(seed),
        }
    }
}

impl Chain for GaussianChain {
    fn step(&mut self) {
        let mut r2 = 0.0;
        for v in self.x.iter_mut() {
            *v = self.sigma * self.rng.sample::<f64, _>(StandardNormal);
            r2 += *v * *v;
        }
        self.r2 = r2;
    }

    fn sample(&self) -> OverlapSample {
        let s_own = self.pair.sigma(self.role);
        let s_other = self.pair.sigma(self.role.other());
        let log_ratio = 0.5 * self.r2 * (1.0 / (s_own * s_own) - 1.0 / (s_other * s_other));
        OverlapSample { value: 1.0, weight_ratio: log_ratio.exp() }
    }

    fn set_equilibrating(&mut self, _equilibrating: bool) {}

    fn move_step_sizes(&self) -> Vec<f64> {
        Vec::new()
    }

    fn reset_transient_state(&mut self) {}
}
