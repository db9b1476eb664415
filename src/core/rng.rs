use std::f64::consts::PI;
use std::time::{SystemTime, UNIX_EPOCH};

const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Linear-congruential generator with a 32-bit state.
///
/// Every draw reads and mutates the state, so an instance must be owned by a
/// single run (or a single worker) at a time. The same seed followed by the
/// same sequence of calls always yields the same stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rng {
    state: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Seeds from the wall clock. Runs built on this are not reproducible.
    pub fn from_time() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self::new(millis as u32)
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    /// Uniform draw in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state as f64 / TWO_POW_32
    }

    /// Box-Muller normal draw. Consumes exactly two uniforms.
    pub fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + z * std_dev
    }

    /// Uniform integer in the inclusive range [min, max]. Consumes one uniform.
    pub fn int_inclusive(&mut self, min: u32, max: u32) -> u32 {
        debug_assert!(min <= max);
        let span = (max - min) as f64 + 1.0;
        min + (self.next_f64() * span).floor() as u32
    }

    /// Uniform draw in [low, high). Consumes one uniform.
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{any, prop_assert, proptest};

    #[test]
    fn first_draw_matches_recurrence() {
        let mut rng = Rng::new(42);
        let expected_state = 42_u64 * 1_664_525 + 1_013_904_223;
        let expected = (expected_state % (1_u64 << 32)) as f64 / TWO_POW_32;
        assert_eq!(rng.next_f64(), expected);
        assert_eq!(rng.state() as u64, expected_state % (1_u64 << 32));
    }

    #[test]
    fn state_wraps_modulo_two_pow_32() {
        let mut rng = Rng::new(u32::MAX);
        let expected = (u32::MAX as u64 * 1_664_525 + 1_013_904_223) % (1_u64 << 32);
        rng.next_f64();
        assert_eq!(rng.state() as u64, expected);
    }

    #[test]
    fn same_seed_reproduces_stream() {
        let mut a = Rng::new(7);
        let mut b = Rng::new(7);
        for _ in 0..1_000 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
        assert_eq!(a.gaussian(1.0, 2.0).to_bits(), b.gaussian(1.0, 2.0).to_bits());
        assert_eq!(a.int_inclusive(4, 10), b.int_inclusive(4, 10));
    }

    #[test]
    fn gaussian_consumes_two_uniforms() {
        let mut a = Rng::new(99);
        let mut b = Rng::new(99);
        a.gaussian(0.0, 1.0);
        b.next_f64();
        b.next_f64();
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn gaussian_sample_moments_are_close_to_parameters() {
        let mut rng = Rng::new(2024);
        let n = 20_000;
        let draws = (0..n).map(|_| rng.gaussian(3.0, 2.0)).collect::<Vec<_>>();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 3.0).abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "std {}", var.sqrt());
    }

    #[test]
    fn int_inclusive_hits_both_ends() {
        let mut rng = Rng::new(5);
        let mut seen = [false; 7];
        for _ in 0..2_000 {
            let v = rng.int_inclusive(4, 10);
            seen[(v - 4) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_uniform_draws_stay_in_unit_interval(seed in any::<u32>()) {
            let mut rng = Rng::new(seed);
            for _ in 0..256 {
                let u = rng.next_f64();
                prop_assert!((0.0..1.0).contains(&u));
            }
        }

        #[test]
        fn prop_int_inclusive_stays_in_range(seed in any::<u32>(), min in 0u32..20, width in 0u32..20) {
            let mut rng = Rng::new(seed);
            let max = min + width;
            for _ in 0..64 {
                let v = rng.int_inclusive(min, max);
                prop_assert!(v >= min && v <= max);
            }
        }
    }
}
