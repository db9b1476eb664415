use serde::{Deserialize, Serialize};

use super::error::{ConfigError, Result};
use super::lenient;

/// Fund configuration supplied by the caller. Rates are fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundParameters {
    #[serde(deserialize_with = "lenient::f64")]
    pub fund_size: f64,
    #[serde(deserialize_with = "lenient::u32")]
    pub fund_life: u32,
    #[serde(deserialize_with = "lenient::f64")]
    pub mgmt_fee_rate: f64,
    #[serde(deserialize_with = "lenient::u32")]
    pub mgmt_fee_full_years: u32,
    #[serde(deserialize_with = "lenient::f64")]
    pub mgmt_fee_step_down: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub carry_rate: f64,
    #[serde(deserialize_with = "lenient::u32")]
    pub target_conviction_count: u32,
    #[serde(deserialize_with = "lenient::f64")]
    pub graduation_rate: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub discovery_check_size: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub conviction_check_size: f64,
    /// Informational only; the engine never enforces the conviction bounds.
    #[serde(deserialize_with = "lenient::f64")]
    pub conviction_check_min: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub conviction_check_max: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub follow_on_reserve_percent: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub discovery_success_rate: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub conviction_success_rate: f64,
}

/// Exits land no earlier than year 4, after the two follow-on years.
pub const MIN_FUND_LIFE: u32 = 4;

/// Upper bound on `round(target_conviction_count / graduation_rate)`.
pub const MAX_DISCOVERY_COMPANIES: u32 = 1_000_000;

impl Default for FundParameters {
    fn default() -> Self {
        Self {
            fund_size: 25_000_000.0,
            fund_life: 10,
            mgmt_fee_rate: 0.02,
            mgmt_fee_full_years: 5,
            mgmt_fee_step_down: 0.75,
            carry_rate: 0.20,
            target_conviction_count: 22,
            graduation_rate: 0.25,
            discovery_check_size: 100_000.0,
            conviction_check_size: 250_000.0,
            conviction_check_min: 250_000.0,
            conviction_check_max: 750_000.0,
            follow_on_reserve_percent: 0.30,
            discovery_success_rate: 0.30,
            conviction_success_rate: 0.55,
        }
    }
}

impl FundParameters {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("fundSize", self.fund_size),
            ("mgmtFeeRate", self.mgmt_fee_rate),
            ("mgmtFeeStepDown", self.mgmt_fee_step_down),
            ("carryRate", self.carry_rate),
            ("graduationRate", self.graduation_rate),
            ("discoveryCheckSize", self.discovery_check_size),
            ("convictionCheckSize", self.conviction_check_size),
            ("convictionCheckMin", self.conviction_check_min),
            ("convictionCheckMax", self.conviction_check_max),
            ("followOnReservePercent", self.follow_on_reserve_percent),
            ("discoverySuccessRate", self.discovery_success_rate),
            ("convictionSuccessRate", self.conviction_success_rate),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }

        for (field, value) in [
            ("fundSize", self.fund_size),
            ("graduationRate", self.graduation_rate),
            ("discoveryCheckSize", self.discovery_check_size),
            ("convictionCheckSize", self.conviction_check_size),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        for (field, value) in [
            ("graduationRate", self.graduation_rate),
            ("mgmtFeeRate", self.mgmt_fee_rate),
            ("mgmtFeeStepDown", self.mgmt_fee_step_down),
            ("carryRate", self.carry_rate),
            ("followOnReservePercent", self.follow_on_reserve_percent),
            ("discoverySuccessRate", self.discovery_success_rate),
            ("convictionSuccessRate", self.conviction_success_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }

        if self.fund_life < MIN_FUND_LIFE {
            return Err(ConfigError::FundLifeTooShort {
                value: self.fund_life,
                min: MIN_FUND_LIFE,
            });
        }

        if self.target_conviction_count == 0 {
            return Err(ConfigError::NoConvictionTarget);
        }

        let discovery = (self.target_conviction_count as f64 / self.graduation_rate).round();
        if discovery > MAX_DISCOVERY_COMPANIES as f64 {
            return Err(ConfigError::TooManyCompanies {
                value: discovery,
                max: MAX_DISCOVERY_COMPANIES,
            });
        }

        let fees = total_management_fees(self);
        if fees >= self.fund_size {
            return Err(ConfigError::FeesExceedFund {
                fees,
                fund_size: self.fund_size,
            });
        }

        Ok(())
    }

    pub fn num_discovery(&self) -> u32 {
        (self.target_conviction_count as f64 / self.graduation_rate).round() as u32
    }
}

/// Full fee for the first `mgmt_fee_full_years`, stepped down after that.
pub fn total_management_fees(params: &FundParameters) -> f64 {
    let full = params.fund_size * params.mgmt_fee_rate;
    let stepped = full * params.mgmt_fee_step_down;
    (1..=params.fund_life)
        .map(|year| {
            if year <= params.mgmt_fee_full_years {
                full
            } else {
                stepped
            }
        })
        .sum()
}

/// Calibrated outcome distributions for one parameter set.
///
/// Discovery: `fail` then four bands (0.5-2x, 2-5x, 5-10x, 10-50x outlier).
/// Conviction: `fail` then six bands, the top three anchored at the
/// `tier_*_base` multiples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeParameters {
    pub quality_bonus: f64,

    pub discovery_fail: f64,
    pub discovery_small: f64,
    pub discovery_medium: f64,
    pub discovery_large: f64,
    pub discovery_outlier: f64,

    pub conviction_fail: f64,
    pub conviction_modest: f64,
    pub conviction_solid: f64,
    pub conviction_strong: f64,
    pub conviction_tier_a: f64,
    pub conviction_tier_b: f64,
    pub conviction_outlier: f64,

    pub tier_a_base: f64,
    pub tier_b_base: f64,
    pub tier_c_base: f64,
}

impl OutcomeParameters {
    pub fn discovery_branches(&self) -> [f64; 5] {
        [
            self.discovery_fail,
            self.discovery_small,
            self.discovery_medium,
            self.discovery_large,
            self.discovery_outlier,
        ]
    }

    pub fn conviction_branches(&self) -> [f64; 7] {
        [
            self.conviction_fail,
            self.conviction_modest,
            self.conviction_solid,
            self.conviction_strong,
            self.conviction_tier_a,
            self.conviction_tier_b,
            self.conviction_outlier,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapitalSchedule {
    pub total_fees: f64,
    pub investable_capital: f64,
    pub follow_on_reserve: f64,
    pub deployable_capital: f64,
    pub follow_on_check_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyBreakdown {
    pub discovery_only: u32,
    pub conviction: u32,
    pub follow_on: u32,
}

/// Outcome of one simulated fund life.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub total_called: f64,
    pub gross_distributions: f64,
    pub net_distributions: f64,
    pub gross_tvpi: f64,
    pub net_tvpi: f64,
    pub gross_dpi: f64,
    pub net_dpi: f64,
    pub net_irr: f64,
    /// False when the IRR solver found no root and `net_irr` was set to 0.
    pub irr_solved: bool,
    pub carry_paid: f64,
    pub companies: CompanyBreakdown,
    pub capital: CapitalSchedule,
    /// Year-indexed net flows; index 0 is always 0. Carry is not included.
    pub cash_flows: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileSummary {
    pub mean: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResults {
    pub params: FundParameters,
    pub num_simulations: u32,
    pub seed: u32,
    pub outcome_params: OutcomeParameters,
    pub simulations: Vec<SimulationResult>,
    pub gross_tvpi: PercentileSummary,
    pub net_tvpi: PercentileSummary,
    pub net_dpi: PercentileSummary,
    pub net_irr: PercentileSummary,
    pub prob_return_fund: f64,
    pub prob_2x: f64,
    pub prob_3x: f64,
    /// Runs whose net IRR had no root and was reported as 0.
    pub irr_fallback_count: u32,
}
