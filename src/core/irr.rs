//! Internal rate of return over a year-indexed cash-flow series.

const MAX_ITERATIONS: u32 = 100;
const TOLERANCE: f64 = 1e-6;
const INITIAL_GUESS: f64 = 0.10;

pub const RATE_FLOOR: f64 = -0.99;
const NEWTON_RATE_CEILING: f64 = 10.0;
const BISECTION_CEILING: f64 = 5.0;

/// Net present value with flow `t` discounted by `(1 + rate)^t`.
pub fn npv(cash_flows: &[f64], rate: f64) -> f64 {
    let base = 1.0 + rate;
    cash_flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / base.powi(t as i32))
        .sum()
}

fn npv_derivative(cash_flows: &[f64], rate: f64) -> f64 {
    let base = 1.0 + rate;
    cash_flows
        .iter()
        .enumerate()
        .skip(1)
        .map(|(t, cf)| -(t as f64) * cf / base.powi(t as i32 + 1))
        .sum()
}

/// Solves NPV(rate) = 0.
///
/// Newton-Raphson first, with each step clamped to [-0.99, 10]. If the
/// derivative vanishes or the iterations run out, bisection over
/// [-0.99, 5.0] takes over. `None` means the bracket has no sign change, so
/// there is no rate in range (e.g. all flows share a sign).
pub fn solve_irr(cash_flows: &[f64]) -> Option<f64> {
    newton_raphson(cash_flows).or_else(|| bisection(cash_flows))
}

fn newton_raphson(cash_flows: &[f64]) -> Option<f64> {
    let mut rate = INITIAL_GUESS;
    for _ in 0..MAX_ITERATIONS {
        let value = npv(cash_flows, rate);
        if value.abs() < TOLERANCE {
            return Some(rate);
        }

        let slope = npv_derivative(cash_flows, rate);
        if slope.abs() < TOLERANCE || !slope.is_finite() {
            return None;
        }

        rate = (rate - value / slope).clamp(RATE_FLOOR, NEWTON_RATE_CEILING);
    }
    None
}

fn bisection(cash_flows: &[f64]) -> Option<f64> {
    let mut lo = RATE_FLOOR;
    let mut hi = BISECTION_CEILING;
    let mut npv_lo = npv(cash_flows, lo);
    let npv_hi = npv(cash_flows, hi);

    if npv_lo * npv_hi > 0.0 || !(npv_lo.is_finite() && npv_hi.is_finite()) {
        return None;
    }

    let mut mid = (lo + hi) * 0.5;
    for _ in 0..MAX_ITERATIONS {
        mid = (lo + hi) * 0.5;
        let npv_mid = npv(cash_flows, mid);
        if npv_mid.abs() < TOLERANCE {
            return Some(mid);
        }

        if npv_lo * npv_mid < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            npv_lo = npv_mid;
        }
    }
    Some(mid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    #[test]
    fn recovers_ten_percent_on_four_year_compounding() {
        let rate = solve_irr(&[-100.0, 0.0, 0.0, 0.0, 146.41]).expect("has a root");
        assert!((rate - 0.10).abs() < 1e-4, "rate {rate}");
    }

    #[test]
    fn leading_zero_year_does_not_change_the_rate() {
        let rate = solve_irr(&[0.0, -100.0, 0.0, 0.0, 0.0, 146.41]).expect("has a root");
        assert!((rate - 0.10).abs() < 1e-4, "rate {rate}");
    }

    #[test]
    fn total_loss_of_capital_has_no_solution() {
        assert_eq!(solve_irr(&[0.0, -100.0, -50.0, 0.0, 0.0]), None);
    }

    #[test]
    fn all_positive_flows_have_no_solution() {
        assert_eq!(solve_irr(&[0.0, 10.0, 20.0, 30.0]), None);
    }

    #[test]
    fn all_zero_flows_converge_immediately() {
        assert_eq!(solve_irr(&[0.0; 6]), Some(INITIAL_GUESS));
    }

    #[test]
    fn heavy_loss_stays_above_rate_floor() {
        let rate = solve_irr(&[0.0, -1_000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0])
            .expect("tiny recovery still has a root");
        assert!(rate >= RATE_FLOOR);
        assert!(rate < -0.4);
        assert!(npv(&[0.0, -1_000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0], rate).abs() < 1e-3);
    }

    #[test]
    fn bisection_finds_root_when_called_directly() {
        let flows = [-100.0, 0.0, 0.0, 0.0, 146.41];
        let rate = bisection(&flows).expect("bracketed");
        assert!((rate - 0.10).abs() < 1e-4);
    }

    #[test]
    fn bisection_reports_same_sign_bracket() {
        assert_eq!(bisection(&[-1.0, -1.0]), None);
    }

    #[test]
    fn fund_scale_flows_solve_to_npv_zero() {
        let flows = [
            0.0,
            -14_300_000.0,
            -3_000_000.0,
            -3_000_000.0,
            1_000_000.0,
            2_000_000.0,
            4_000_000.0,
            8_000_000.0,
            12_000_000.0,
            9_000_000.0,
            6_000_000.0,
        ];
        let rate = solve_irr(&flows).expect("mixed signs");
        assert!(rate > 0.0 && rate < 1.0, "rate {rate}");
        assert!(npv(&flows, rate).abs() < 1.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_single_exit_recovers_compound_rate(
            rate_bp in -5_000i32..20_000,
            years in 1usize..12
        ) {
            let rate = rate_bp as f64 / 10_000.0;
            let mut flows = vec![0.0; years + 1];
            flows[0] = -100.0;
            flows[years] = 100.0 * (1.0 + rate).powi(years as i32);

            let solved = solve_irr(&flows).expect("single sign change");
            prop_assert!((solved - rate).abs() < 1e-4, "expected {}, got {}", rate, solved);
        }
    }
}
