use super::error::Result;
use super::types::{FundParameters, OutcomeParameters};

const REFERENCE_GRADUATION_RATE: f64 = 0.25;
const REFERENCE_RESERVE_PERCENT: f64 = 0.20;
const REFERENCE_FUND_SIZE: f64 = 25_000_000.0;

const DISCOVERY_SHARES: [f64; 3] = [0.50, 0.25, 0.15];
const CONVICTION_SHARES: [f64; 5] = [0.45, 0.22, 0.15, 0.10, 0.05];

/// Second-order adjustments derived from fund shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bonuses {
    pub selectivity: f64,
    pub follow_on: f64,
    pub scale: f64,
    pub quality: f64,
}

pub fn bonuses(params: &FundParameters) -> Bonuses {
    let selectivity =
        (REFERENCE_GRADUATION_RATE - params.graduation_rate) / REFERENCE_GRADUATION_RATE;
    let follow_on = (params.follow_on_reserve_percent - REFERENCE_RESERVE_PERCENT)
        / REFERENCE_RESERVE_PERCENT
        * 0.5;
    let scale = (params.fund_size / REFERENCE_FUND_SIZE).ln() * 0.1;
    let quality = (selectivity + follow_on * 0.3 + scale * 0.2).clamp(-0.3, 0.5);

    Bonuses {
        selectivity,
        follow_on,
        scale,
        quality,
    }
}

/// Maps fund parameters to branch probabilities and multiplier bases.
///
/// Fails fast on invalid parameters so NaN never reaches the samplers.
pub fn calibrate(params: &FundParameters) -> Result<OutcomeParameters> {
    params.validate()?;
    Ok(calibrate_unchecked(params))
}

fn calibrate_unchecked(params: &FundParameters) -> OutcomeParameters {
    let b = bonuses(params);

    let discovery_fail =
        ((1.0 - params.discovery_success_rate) + b.selectivity * 0.05).clamp(0.50, 0.85);
    let [discovery_small, discovery_medium, discovery_large, discovery_outlier] =
        split_remainder(1.0 - discovery_fail, DISCOVERY_SHARES);

    let conviction_fail =
        ((1.0 - params.conviction_success_rate) - b.quality * 0.10).clamp(0.30, 0.65);
    let [
        conviction_modest,
        conviction_solid,
        conviction_strong,
        conviction_tier_a,
        conviction_tier_b,
        conviction_outlier,
    ] = split_remainder(1.0 - conviction_fail, CONVICTION_SHARES);

    OutcomeParameters {
        quality_bonus: b.quality,
        discovery_fail,
        discovery_small,
        discovery_medium,
        discovery_large,
        discovery_outlier,
        conviction_fail,
        conviction_modest,
        conviction_solid,
        conviction_strong,
        conviction_tier_a,
        conviction_tier_b,
        conviction_outlier,
        tier_a_base: (15.0 + b.quality * 10.0).clamp(10.0, 20.0),
        tier_b_base: (30.0 + b.quality * 20.0).clamp(20.0, 40.0),
        tier_c_base: (75.0 + b.quality * 50.0).clamp(50.0, 100.0),
    }
}

/// Splits `mass` by `shares`; the final slot takes whatever is left so the
/// branch family sums to the full mass.
fn split_remainder<const N: usize, const M: usize>(mass: f64, shares: [f64; N]) -> [f64; M] {
    debug_assert_eq!(M, N + 1);
    let mut out = [0.0; M];
    let mut remaining = mass;
    for (slot, share) in out.iter_mut().zip(shares) {
        *slot = mass * share;
        remaining -= *slot;
    }
    out[M - 1] = remaining.max(0.0);
    out
}
