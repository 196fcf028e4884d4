// chain.rs - Chain identity, per-chain storage and the stepping contract

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::bias::BiasReader;

/// Which of the two coupled Markov chains a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainRole {
    /// Samples the reference integrand (closed-form integral known).
    Reference,
    /// Samples the target integrand (integral sought).
    Target,
}

impl ChainRole {
    pub const ALL: [ChainRole; 2] = [ChainRole::Reference, ChainRole::Target];

    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            ChainRole::Reference => 0,
            ChainRole::Target => 1,
        }
    }

    pub fn other(self) -> ChainRole {
        match self {
            ChainRole::Reference => ChainRole::Target,
            ChainRole::Target => ChainRole::Reference,
        }
    }
}

impl fmt::Display for ChainRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainRole::Reference => write!(f, "reference"),
            ChainRole::Target => write!(f, "target"),
        }
    }
}

/// Two-element storage indexed by [`ChainRole`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerChain<T>([T; 2]);

impl<T> PerChain<T> {
    pub fn new(reference: T, target: T) -> Self {
        Self([reference, target])
    }

    pub fn from_fn(mut f: impl FnMut(ChainRole) -> T) -> Self {
        Self([f(ChainRole::Reference), f(ChainRole::Target)])
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChainRole, &T)> {
        ChainRole::ALL.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ChainRole, &mut T)> {
        ChainRole::ALL.into_iter().zip(self.0.iter_mut())
    }

    pub fn reference(&self) -> &T {
        &self.0[0]
    }

    pub fn target(&self) -> &T {
        &self.0[1]
    }
}

impl<T> Index<ChainRole> for PerChain<T> {
    type Output = T;

    fn index(&self, role: ChainRole) -> &T {
        &self.0[role.index()]
    }
}

impl<T> IndexMut<ChainRole> for PerChain<T> {
    fn index_mut(&mut self, role: ChainRole) -> &mut T {
        &mut self.0[role.index()]
    }
}

/// What a chain reports about its current configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapSample {
    /// Own integrand over own sampling weight, f/π (the sign for |f| sampling).
    pub value: f64,
    /// Unnormalised weight of the opposite system over this system's, π_other/π_own.
    /// Non-negative; may be +∞ when this chain's weight underflows.
    pub weight_ratio: f64,
}

impl OverlapSample {
    /// Overlap function γ/π_own for trial preference `alpha`,
    /// with γ = π_ref π_tgt / (α π_ref + π_tgt).
    #[inline]
    pub fn overlap(&self, role: ChainRole, alpha: f64) -> f64 {
        let rho = self.weight_ratio;
        if rho == 0.0 {
            return 0.0;
        }
        match role {
            ChainRole::Reference => {
                if rho.is_infinite() { 1.0 } else { rho / (alpha + rho) }
            }
            ChainRole::Target => {
                if rho.is_infinite() { 1.0 / alpha } else { rho / (alpha * rho + 1.0) }
            }
        }
    }
}

/// A Markov chain driven by the overlap coordinator.
///
/// The chain owns its configuration, its proposal moves and its random
/// stream. One call to [`Chain::step`] is one Monte Carlo step; the sample
/// is read right after it.
pub trait Chain: Send {
    /// Advance one Monte Carlo step.
    fn step(&mut self);

    /// Sample for the current configuration.
    fn sample(&self) -> OverlapSample;

    /// Hand the chain a read handle on the reference preference. Chains whose
    /// sampling weight is independent of α ignore it.
    fn bind_bias(&mut self, _bias: BiasReader) {}

    /// Permit (or forbid) step-size adaptation in the proposal moves.
    fn set_equilibrating(&mut self, equilibrating: bool);

    /// Current step size of every move, in move order.
    fn move_step_sizes(&self) -> Vec<f64>;

    /// Clear acceptance counters and other proposal bookkeeping. The
    /// configuration is kept.
    fn reset_transient_state(&mut self);
}

impl<C: Chain + ?Sized> Chain for Box<C> {
    fn step(&mut self) {
        (**self).step()
    }

    fn sample(&self) -> OverlapSample {
        (**self).sample()
    }

    fn bind_bias(&mut self, bias: BiasReader) {
        (**self).bind_bias(bias)
    }

    fn set_equilibrating(&mut self, equilibrating: bool) {
        (**self).set_equilibrating(equilibrating)
    }

    fn move_step_sizes(&self) -> Vec<f64> {
        (**self).move_step_sizes()
    }

    fn reset_transient_state(&mut self) {
        (**self).reset_transient_state()
    }
}
