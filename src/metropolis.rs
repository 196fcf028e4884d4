// metropolis.rs - Random-walk Metropolis chain over a real vector configuration

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::chain::{Chain, OverlapSample};

/// Unnormalised density or integrand over a configuration.
pub type Density = Box<dyn Fn(&[f64]) -> f64 + Send>;

/// Acceptance-window step-size adapter.
///
/// After every `window` attempts the step grows by 10 % if the acceptance
/// rate is above `target + band` and shrinks by 10 % if below `target - band`.
#[derive(Debug, Clone)]
pub struct Tuner {
    delta:    f64,
    attempts: usize,
    accepted: usize,
    window:   usize,
    target:   f64,
    band:     f64,
}

impl Tuner {
    pub fn new(delta: f64, window: usize, target: f64, band: f64) -> Self {
        Self { delta, attempts: 0, accepted: 0, window: window.max(1), target, band }
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn update(&mut self, accepted: bool) {
        self.attempts += 1;
        if accepted { self.accepted += 1; }
        if self.attempts == self.window {
            let r = self.accepted as f64 / self.window as f64;
            if r > self.target + self.band { self.delta *= 1.1; }
            else if r < self.target - self.band { self.delta *= 0.9; }
            self.attempts = 0;
            self.accepted = 0;
        }
    }

    /// Drop the partial window, keep the step size.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.accepted = 0;
    }
}

/// Metropolis chain sampling `own`, scoring against `other`.
///
/// Every step displaces all coordinates by independent uniform offsets in
/// `[-δ, δ]`. The reported value is `integrand / own`; with the default
/// integrand (`own` itself) that is 1 everywhere and the ratio estimate is a
/// plain ratio of normalisations.
pub struct MetropolisChain {
    x:             Vec<f64>,
    trial:         Vec<f64>,
    own:           Density,
    other:         Density,
    integrand:     Option<Density>,
    pi_own:        f64,
    pi_other:      f64,
    f_own:         f64,
    tuner:         Tuner,
    equilibrating: bool,
    attempts:      u64,
    accepted:      u64,
    rng:           Pcg64,
}

impl MetropolisChain {
    pub fn new(start: Vec<f64>, step_size: f64, own: Density, other: Density, seed: u64) -> Self {
        let pi_own = own(&start);
        let pi_other = other(&start);
        let trial = start.clone();
        Self {
            x: start,
            trial,
            own,
            other,
            integrand: None,
            pi_own,
            pi_other,
            f_own: pi_own,
            tuner: Tuner::new(step_size, 100, 0.5, 0.05),
            equilibrating: false,
            attempts: 0,
            accepted: 0,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Use a separate integrand instead of the sampling density.
    pub fn with_integrand(mut self, integrand: Density) -> Self {
        self.f_own = integrand(&self.x);
        self.integrand = Some(integrand);
        self
    }

    pub fn with_tuner(mut self, window: usize, target: f64, band: f64) -> Self {
        self.tuner = Tuner::new(self.tuner.delta(), window, target, band);
        self
    }

    pub fn configuration(&self) -> &[f64] {
        &self.x
    }

    pub fn step_size(&self) -> f64 {
        self.tuner.delta()
    }

    pub fn is_equilibrating(&self) -> bool {
        self.equilibrating
    }

    /// Acceptance rate since the last transient reset.
    pub fn acceptance(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempts as f64
        }
    }
}

impl Chain for MetropolisChain {
    fn step(&mut self) {
        let delta = self.tuner.delta();
        for (t, &x) in self.trial.iter_mut().zip(&self.x) {
            *t = x + self.rng.gen_range(-delta..delta);
        }
        let pi_new = (self.own)(&self.trial);
        let accept = pi_new > 0.0
            && (pi_new >= self.pi_own || self.rng.gen::<f64>() * self.pi_own < pi_new);

        self.attempts += 1;
        if accept {
            self.accepted += 1;
            std::mem::swap(&mut self.x, &mut self.trial);
            self.pi_own = pi_new;
            self.pi_other = (self.other)(&self.x);
            self.f_own = match &self.integrand {
                Some(f) => f(&self.x),
                None => pi_new,
            };
        }
        if self.equilibrating {
            self.tuner.update(accept);
        }
    }

    fn sample(&self) -> OverlapSample {
        let weight_ratio = if self.pi_other == 0.0 {
            0.0
        } else if self.pi_own == 0.0 {
            f64::INFINITY
        } else {
            self.pi_other / self.pi_own
        };
        OverlapSample { value: self.f_own / self.pi_own, weight_ratio }
    }

    fn set_equilibrating(&mut self, equilibrating: bool) {
        self.equilibrating = equilibrating;
        self.tuner.reset();
    }

    fn move_step_sizes(&self) -> Vec<f64> {
        vec![self.tuner.delta()]
    }

    fn reset_transient_state(&mut self) {
        self.tuner.reset();
        self.attempts = 0;
        self.accepted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuner_grows_when_accepting_everything() {
        let mut t = Tuner::new(1.0, 10, 0.5, 0.05);
        for _ in 0..10 {
            t.update(true);
        }
        assert!((t.delta() - 1.1).abs() < 1e-12);
        for _ in 0..10 {
            t.update(false);
        }
        assert!((t.delta() - 0.99).abs() < 1e-12);
    }

    #[test]
    fn step_size_frozen_outside_equilibration() {
        let own: Density = Box::new(|x| (-0.5 * x[0] * x[0]).exp());
        let other: Density = Box::new(|x| (-0.125 * x[0] * x[0]).exp());
        let mut chain = MetropolisChain::new(vec![0.0], 50.0, own, other, 7);
        assert!(!chain.is_equilibrating());
        assert_eq!(chain.acceptance(), 0.0);
        for _ in 0..1000 {
            chain.step();
        }
        assert_eq!(chain.move_step_sizes(), vec![50.0]);
        let frozen = chain.acceptance();
        assert!(frozen > 0.0 && frozen < 0.2, "acceptance {frozen}");

        chain.set_equilibrating(true);
        assert!(chain.is_equilibrating());
        for _ in 0..1000 {
            chain.step();
        }
        assert!(chain.step_size() < 50.0);

        chain.reset_transient_state();
        assert_eq!(chain.acceptance(), 0.0);
        for _ in 0..2000 {
            chain.step();
        }
        assert!(chain.acceptance() > frozen, "acceptance {}", chain.acceptance());
    }

    #[test]
    fn integrand_sets_reported_value() {
        let own: Density = Box::new(|x| (-0.5 * x[0] * x[0]).exp());
        let other: Density = Box::new(|x| (-0.125 * x[0] * x[0]).exp());
        let integrand: Density = Box::new(|x| (1.0 - x[0] * x[0]) * (-0.5 * x[0] * x[0]).exp());
        let mut chain = MetropolisChain::new(vec![0.0], 1.0, own, other, 11).with_integrand(integrand);
        for _ in 0..100 {
            chain.step();
            let x = chain.configuration()[0];
            assert!((chain.sample().value - (1.0 - x * x)).abs() < 1e-9);
        }
    }
}
