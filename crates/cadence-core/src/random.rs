//! Injectable randomness.
//!
//! Every probabilistic decision in an engagement run draws from a
//! [`RandomSource`], so tests can pin outcomes with [`FixedRandom`] while
//! production runs use [`SeededRandom`].

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Source of uniform draws used by gating and pacing.
pub trait RandomSource: Send {
    /// Uniform draw from `[low, high)`. Returns `low` when the range is empty.
    fn uniform(&mut self, low: f64, high: f64) -> f64;

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool;

    /// A random ordering of `0..len`.
    fn permutation(&mut self, len: usize) -> Vec<usize>;
}

/// `StdRng`-backed source.
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Seed from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high > low {
            self.rng.random_range(low..high)
        } else {
            low
        }
    }

    fn chance(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }

    fn permutation(&mut self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut self.rng);
        order
    }
}

/// Deterministic source that answers every draw from one fixed unit value.
///
/// `chance(p)` is `unit < p` and `uniform(a, b)` is `a + unit * (b - a)`;
/// permutations keep the original order. A unit close to 1 makes every gate
/// proceed, a unit of 0 makes every positive-probability skip fire.
#[derive(Debug, Clone)]
pub struct FixedRandom {
    unit: f64,
    draws: usize,
}

impl FixedRandom {
    pub fn new(unit: f64) -> Self {
        Self {
            unit: unit.clamp(0.0, 1.0),
            draws: 0,
        }
    }

    /// Never skips, never takes a long break.
    pub fn always_proceed() -> Self {
        Self::new(0.999)
    }

    /// Number of `uniform` and `chance` calls answered so far.
    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl RandomSource for FixedRandom {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.draws += 1;
        if high > low {
            low + self.unit * (high - low)
        } else {
            low
        }
    }

    fn chance(&mut self, p: f64) -> bool {
        self.draws += 1;
        self.unit < p
    }

    fn permutation(&mut self, len: usize) -> Vec<usize> {
        (0..len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_uniform_within_bounds() {
        let mut rng = SeededRandom::from_seed(7);
        for _ in 0..1000 {
            let v = rng.uniform(0.7, 1.3);
            assert!((0.7..1.3).contains(&v));
        }
        assert_eq!(rng.uniform(5.0, 5.0), 5.0);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = SeededRandom::from_seed(99);
        let mut b = SeededRandom::from_seed(99);
        for _ in 0..20 {
            assert_eq!(a.uniform(0.0, 10.0), b.uniform(0.0, 10.0));
        }
        assert_eq!(a.permutation(8), b.permutation(8));
    }

    #[test]
    fn test_seeded_chance_extremes() {
        let mut rng = SeededRandom::from_seed(1);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn test_seeded_permutation_is_complete() {
        let mut rng = SeededRandom::from_seed(3);
        let mut order = rng.permutation(10);
        order.sort_unstable();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_fixed_random_answers() {
        let mut rng = FixedRandom::new(0.5);
        assert_eq!(rng.uniform(2.0, 8.0), 5.0);
        assert!(rng.chance(0.9));
        assert!(!rng.chance(0.1));
        assert_eq!(rng.permutation(3), vec![0, 1, 2]);
        assert_eq!(rng.draws(), 3);
    }

    #[test]
    fn test_fixed_random_always_proceed_skips_nothing() {
        let mut rng = FixedRandom::always_proceed();
        for p in [0.08, 0.10, 0.12, 0.15, 0.18] {
            assert!(!rng.chance(p));
        }
    }
}
