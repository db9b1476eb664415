//! Categorical-then-continuous outcome draws.
//!
//! One uniform picks the branch by walking cumulative probability; the last
//! branch is taken by exhaustion. Every non-failing branch then spends one
//! more uniform on the multiple, and the discovery outlier branch spends a
//! third to pick its sub-range.

use super::rng::Rng;
use super::types::OutcomeParameters;

/// Returns the realized multiple on a discovery check.
pub fn sample_discovery_outcome(outcome: &OutcomeParameters, rng: &mut Rng) -> f64 {
    let roll = rng.next_f64();

    let mut cumulative = outcome.discovery_fail;
    if roll < cumulative {
        return 0.0;
    }
    cumulative += outcome.discovery_small;
    if roll < cumulative {
        return rng.uniform(0.5, 2.0);
    }
    cumulative += outcome.discovery_medium;
    if roll < cumulative {
        return rng.uniform(2.0, 5.0);
    }
    cumulative += outcome.discovery_large;
    if roll < cumulative {
        return rng.uniform(5.0, 10.0);
    }

    if rng.next_f64() < 0.7 {
        rng.uniform(10.0, 20.0)
    } else {
        rng.uniform(20.0, 50.0)
    }
}

/// Returns the realized multiple on a conviction position.
pub fn sample_conviction_outcome(outcome: &OutcomeParameters, rng: &mut Rng) -> f64 {
    let roll = rng.next_f64();

    let mut cumulative = outcome.conviction_fail;
    if roll < cumulative {
        return 0.0;
    }
    cumulative += outcome.conviction_modest;
    if roll < cumulative {
        return rng.uniform(0.8, 1.2);
    }
    cumulative += outcome.conviction_solid;
    if roll < cumulative {
        return rng.uniform(2.5, 4.0);
    }
    cumulative += outcome.conviction_strong;
    if roll < cumulative {
        return rng.uniform(5.0, 10.0);
    }
    cumulative += outcome.conviction_tier_a;
    if roll < cumulative {
        return outcome.tier_a_base + rng.next_f64() * 10.0;
    }
    cumulative += outcome.conviction_tier_b;
    if roll < cumulative {
        return outcome.tier_b_base + rng.next_f64() * 20.0;
    }

    outcome.tier_c_base + rng.next_f64() * 75.0
}
