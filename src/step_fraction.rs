// step_fraction.rs - Share of steps given to the reference chain

use tracing::debug;

use crate::chain::ChainRole;
use crate::config::FractionPolicy;

/// Reference-chain step fraction with an adaptive policy and a pin.
///
/// While pinned the value is frozen and [`StepFraction::update`] is a no-op;
/// pinning sets value and flag in one call, so there is no moment at which
/// a pinned fraction can still move.
#[derive(Debug, Clone)]
pub struct StepFraction {
    value:   f64,
    min:     f64,
    policy:  FractionPolicy,
    pinned:  bool,
    updates: u64,
}

impl StepFraction {
    /// `min` bounds the adaptive value to `[min, 1 - min]`.
    pub fn new(initial: f64, min: f64, policy: FractionPolicy) -> Self {
        let mut sf = Self { value: 0.5, min, policy, pinned: false, updates: 0 };
        sf.value = sf.clamp(initial);
        sf
    }

    fn clamp(&self, f: f64) -> f64 {
        f.clamp(self.min, 1.0 - self.min)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn policy(&self) -> FractionPolicy {
        self.policy
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Freeze at `value` (clamped to [0, 1]) until [`StepFraction::unpin`].
    pub fn pin(&mut self, value: f64) {
        self.value = value.clamp(0.0, 1.0);
        self.pinned = true;
        self.updates = 0;
    }

    /// Re-enable adaptation, starting from the pinned value.
    pub fn unpin(&mut self) {
        self.pinned = false;
        self.updates = 0;
        self.value = self.clamp(self.value);
    }

    /// True when the whole macro-step goes to a single chain.
    pub fn is_aggressive(&self) -> bool {
        !self.pinned && self.policy == FractionPolicy::Aggressive
    }

    /// Feed the ideal fraction once per macro-step. Returns whether the
    /// value changed.
    pub fn update(&mut self, ideal: f64) -> bool {
        if self.pinned || !ideal.is_finite() {
            return false;
        }
        let ideal = self.clamp(ideal);
        let old = self.value;
        match self.policy {
            FractionPolicy::Fixed => return false,
            FractionPolicy::Aggressive => self.value = ideal,
            FractionPolicy::Smoothed { interval, rate } => {
                self.updates += 1;
                if self.updates % interval.max(1) != 0 {
                    return false;
                }
                self.value = self.clamp(old + rate * (ideal - old));
            }
        }
        if self.value != old {
            debug!(from = old, to = self.value, "step fraction updated");
        }
        self.value != old
    }

    /// Chain that is behind its share after `steps` steps per chain.
    pub fn behind(&self, steps: [u64; 2]) -> ChainRole {
        let [r, t] = steps;
        if (r as f64) < self.value * (r + t + 1) as f64 {
            ChainRole::Reference
        } else {
            ChainRole::Target
        }
    }
}

impl Default for StepFraction {
    fn default() -> Self {
        Self::new(0.5, 0.01, FractionPolicy::default())
    }
}
