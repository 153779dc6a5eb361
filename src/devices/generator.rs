use rand::{SeedableRng, rngs::StdRng};

use crate::devices::types::{Device, DeviceContext, daylight_frac, gaussian_noise};
use crate::grid::Amount;

/// A daylight-driven generator that injects into the pool.
///
/// Output follows a half-sine between sunrise and sunset within each period,
/// scaled by `peak` and perturbed by multiplicative noise.
#[derive(Debug, Clone)]
pub struct Generator {
    /// Output at solar noon under ideal conditions.
    pub peak: Amount,
    /// Ticks per simulated day.
    period_ticks: u64,
    /// Tick within the period when output starts (inclusive).
    pub sunrise_tick: u64,
    /// Tick within the period when output stops (exclusive).
    pub sunset_tick: u64,
    /// Standard deviation of the noise as a fraction of output.
    pub noise_std: f64,
    rng: StdRng,
}

impl Generator {
    /// Creates a new generator.
    ///
    /// # Panics
    ///
    /// Panics if `sunrise_tick >= sunset_tick` or `sunset_tick > period_ticks`.
    pub fn new(
        peak: Amount,
        period_ticks: u64,
        sunrise_tick: u64,
        sunset_tick: u64,
        noise_std: f64,
        seed: u64,
    ) -> Self {
        assert!(sunrise_tick < sunset_tick && sunset_tick <= period_ticks);
        Self {
            peak: peak.max(0.0),
            period_ticks,
            sunrise_tick,
            sunset_tick,
            noise_std: noise_std.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn output(&mut self, tick: u64) -> Amount {
        let frac = daylight_frac(tick, self.period_ticks, self.sunrise_tick, self.sunset_tick);
        if frac <= 0.0 {
            return 0.0;
        }
        let noise_mult = 1.0 + gaussian_noise(&mut self.rng, self.noise_std);
        (self.peak * frac * noise_mult).max(0.0)
    }
}

impl Device for Generator {
    fn power(&mut self, context: &DeviceContext) -> Amount {
        self.output(context.tick)
    }

    fn device_type(&self) -> &'static str {
        "Generator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_outside_daylight() {
        let mut g = Generator::new(10.0, 24, 6, 18, 0.1, 1);
        for t in (0..6).chain(18..24) {
            assert_eq!(g.output(t), 0.0);
        }
    }

    #[test]
    fn peaks_at_noon_without_noise() {
        let mut g = Generator::new(10.0, 24, 6, 18, 0.0, 1);
        assert!((g.output(12) - 10.0).abs() < 1e-9);
        assert!(g.output(9) < g.output(12));
    }

    #[test]
    #[should_panic]
    fn sunrise_after_sunset_panics() {
        Generator::new(1.0, 24, 18, 6, 0.0, 0);
    }
}
