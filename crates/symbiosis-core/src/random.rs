//! Random draws shared by every organism kind.
//!
//! All helpers take the world's single RNG explicitly so a seed fully determines a run.

use rand::{Rng, RngCore, seq::SliceRandom};

/// Normal deviate via Box-Muller.
pub fn normal(rng: &mut dyn RngCore, mean: f64, std_dev: f64) -> f64 {
    const TWO_PI: f64 = std::f64::consts::TAU;
    let u1 = rng.random::<f64>().clamp(f64::MIN_POSITIVE, 1.0);
    let u2 = rng.random::<f64>();
    mean + std_dev * (-2.0 * u1.ln()).sqrt() * (TWO_PI * u2).cos()
}

/// Bernoulli trial: true with probability `p` (`p <= 0` never, `p >= 1` always).
pub fn chance(rng: &mut dyn RngCore, p: f64) -> bool {
    rng.random::<f64>() < p
}

/// Uniform draw from `[low, high)`.
pub fn uniform(rng: &mut dyn RngCore, low: f64, high: f64) -> f64 {
    low + (high - low) * rng.random::<f64>()
}

/// Uniformly random ordering of `0..len`.
pub fn permutation(rng: &mut dyn RngCore, len: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(rng);
    order
}

/// Add a normal perturbation to `value` and clamp into `[low, high]`.
pub fn perturb(rng: &mut dyn RngCore, value: f64, size: f64, low: f64, high: f64) -> f64 {
    (value + normal(rng, 0.0, size)).clamp(low, high)
}
