//! Common types and helpers for the simulated grid members.

use rand::{Rng, rngs::StdRng};

use crate::grid::Amount;

/// Contextual information passed to devices each tick.
#[derive(Debug, Clone, Copy)]
pub struct DeviceContext {
    pub tick: u64,
}

impl DeviceContext {
    pub fn new(tick: u64) -> Self {
        Self { tick }
    }
}

/// A time-varying profile driven by the simulation clock.
///
/// Machines report their idle draw through it, generators their output.
pub trait Device {
    /// Returns the device's value at the given tick. Never negative.
    fn power(&mut self, context: &DeviceContext) -> Amount;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Gaussian noise via the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and the given
/// standard deviation; 0 when `std_dev` is not positive.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Half-sine daylight shape in `[0, 1]`.
///
/// Zero outside `[sunrise, sunset)` within each period of `period` ticks.
pub fn daylight_frac(tick: u64, period: u64, sunrise: u64, sunset: u64) -> f64 {
    let period = period.max(1);
    let t = tick % period;
    if t < sunrise || t >= sunset || sunrise >= sunset {
        return 0.0;
    }
    let x = (t - sunrise) as f64 / (sunset - sunrise) as f64;
    (std::f64::consts::PI * x).sin().max(0.0)
}
