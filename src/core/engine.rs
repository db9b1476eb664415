use rayon::prelude::*;
use tracing::{debug, trace};

use super::calibration::calibrate;
use super::error::{ConfigError, Result};
use super::irr::solve_irr;
use super::rng::Rng;
use super::sampler::{sample_conviction_outcome, sample_discovery_outcome};
use super::types::{
    CapitalSchedule, CompanyBreakdown, FundParameters, MonteCarloResults, OutcomeParameters,
    PercentileSummary, SimulationResult, total_management_fees,
};

const FIRST_EXIT_YEAR: u32 = 4;
const FOLLOW_ON_YEARS: [usize; 2] = [2, 3];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum CompanyPath {
    DiscoveryOnly,
    Conviction,
}

#[derive(Debug, Clone, Copy)]
struct Company {
    path: CompanyPath,
    multiple: f64,
    follow_on: bool,
}

/// Runs `num_simulations` fund lives on one generator stream.
///
/// With `seed: None` the generator is seeded from the clock and the seed
/// actually used is echoed in the result.
pub fn run_monte_carlo(
    params: &FundParameters,
    num_simulations: u32,
    seed: Option<u32>,
) -> Result<MonteCarloResults> {
    let outcome = calibrate(params)?;
    if num_simulations == 0 {
        return Err(ConfigError::NoSimulations);
    }

    let mut rng = seed.map(Rng::new).unwrap_or_else(Rng::from_time);
    let used_seed = rng.state();
    let simulations = run_batch(params, &outcome, num_simulations, &mut rng);

    Ok(build_results(
        params,
        num_simulations,
        used_seed,
        outcome,
        simulations,
    ))
}

/// Parallel variant: run `i` owns a generator seeded `seed + i` and results
/// are kept in run-index order.
///
/// The streams differ from [`run_monte_carlo`], so the two modes do not
/// produce the same numbers for the same seed.
pub fn run_monte_carlo_parallel(
    params: &FundParameters,
    num_simulations: u32,
    seed: Option<u32>,
) -> Result<MonteCarloResults> {
    let outcome = calibrate(params)?;
    if num_simulations == 0 {
        return Err(ConfigError::NoSimulations);
    }

    let base_seed = seed.unwrap_or_else(|| Rng::from_time().state());
    let simulations = (0..num_simulations)
        .into_par_iter()
        .map(|run| {
            let mut rng = Rng::new(run_seed(base_seed, run));
            simulate_fund(params, &outcome, &mut rng)
        })
        .collect::<Vec<_>>();

    Ok(build_results(
        params,
        num_simulations,
        base_seed,
        outcome,
        simulations,
    ))
}

pub fn run_seed(base_seed: u32, run: u32) -> u32 {
    base_seed.wrapping_add(run)
}

fn run_batch(
    params: &FundParameters,
    outcome: &OutcomeParameters,
    num_simulations: u32,
    rng: &mut Rng,
) -> Vec<SimulationResult> {
    (0..num_simulations)
        .map(|_| simulate_fund(params, outcome, rng))
        .collect()
}

pub fn capital_schedule(params: &FundParameters) -> CapitalSchedule {
    let total_fees = total_management_fees(params);
    let investable_capital = params.fund_size - total_fees;
    let follow_on_reserve = investable_capital * params.follow_on_reserve_percent;

    CapitalSchedule {
        total_fees,
        investable_capital,
        follow_on_reserve,
        deployable_capital: investable_capital - follow_on_reserve,
        follow_on_check_size: 0.0,
    }
}

/// More selective funds read traction slightly more clearly.
fn signal_noise(graduation_rate: f64) -> f64 {
    (1.0 - (0.25 - graduation_rate) * 0.5).max(0.5)
}

fn follow_on_count(params: &FundParameters, reserve: f64, num_conviction: u32) -> u32 {
    let by_budget = (reserve / (params.conviction_check_size * 0.5)).floor().max(0.0) as u32;
    let by_policy = (num_conviction as f64 * (0.3 + params.follow_on_reserve_percent)).round() as u32;
    by_budget.min(by_policy)
}

/// Marks the `count` conviction companies with the best realized multiples.
/// A count above the conviction cohort flags the whole cohort.
fn select_follow_on(companies: &mut [Company], conviction: &[usize], count: u32) {
    let mut by_multiple = conviction.to_vec();
    by_multiple.sort_by(|&a, &b| companies[b].multiple.total_cmp(&companies[a].multiple));
    for &idx in by_multiple.iter().take(count as usize) {
        companies[idx].follow_on = true;
    }
}

/// Follow-on money goes in at a higher price, so it earns the company's
/// multiple divided by the valuation step-up since the first check.
fn follow_on_multiple(multiple: f64) -> f64 {
    let step_up = 2.5 + multiple * 0.1;
    (multiple / step_up).max(0.0)
}

/// Simulates one fund life.
///
/// Ranking into conviction uses a noisy signal built from the discovery draw;
/// the conviction outcome itself is a fresh, independent draw.
pub fn simulate_fund(
    params: &FundParameters,
    outcome: &OutcomeParameters,
    rng: &mut Rng,
) -> SimulationResult {
    let mut capital = capital_schedule(params);
    let num_discovery = params.num_discovery();
    let num_conviction = params.target_conviction_count.min(num_discovery);
    let noise = signal_noise(params.graduation_rate);

    let mut companies = Vec::with_capacity(num_discovery as usize);
    let mut signals = Vec::with_capacity(num_discovery as usize);
    for _ in 0..num_discovery {
        let multiple = sample_discovery_outcome(outcome, rng);
        signals.push((multiple + 0.1).ln() + rng.gaussian(0.0, noise));
        companies.push(Company {
            path: CompanyPath::DiscoveryOnly,
            multiple,
            follow_on: false,
        });
    }

    let mut ranked = (0..companies.len()).collect::<Vec<_>>();
    ranked.sort_by(|&a, &b| signals[b].total_cmp(&signals[a]));
    ranked.truncate(num_conviction as usize);
    for &idx in &ranked {
        companies[idx].path = CompanyPath::Conviction;
        companies[idx].multiple = sample_conviction_outcome(outcome, rng);
    }

    let num_follow_on = follow_on_count(params, capital.follow_on_reserve, num_conviction);
    select_follow_on(&mut companies, &ranked, num_follow_on);
    if num_follow_on > 0 {
        capital.follow_on_check_size = capital.follow_on_reserve / num_follow_on as f64;
    }

    let fund_life = params.fund_life as usize;
    let mut cash_flows = vec![0.0; fund_life + 1];
    cash_flows[1] -= num_discovery as f64 * params.discovery_check_size
        + num_conviction as f64 * params.conviction_check_size;
    if num_follow_on > 0 {
        for year in FOLLOW_ON_YEARS {
            cash_flows[year] -= capital.follow_on_reserve * 0.5;
        }
    }

    for company in &companies {
        let exit_year = rng.int_inclusive(FIRST_EXIT_YEAR, params.fund_life) as usize;
        let distribution = match company.path {
            CompanyPath::DiscoveryOnly => params.discovery_check_size * company.multiple,
            CompanyPath::Conviction => {
                let core = (params.discovery_check_size + params.conviction_check_size)
                    * company.multiple;
                if company.follow_on {
                    core + capital.follow_on_check_size * follow_on_multiple(company.multiple)
                } else {
                    core
                }
            }
        };
        cash_flows[exit_year] += distribution;
    }

    let total_called = -cash_flows.iter().filter(|cf| **cf < 0.0).sum::<f64>();
    let gross_distributions = cash_flows.iter().filter(|cf| **cf > 0.0).sum::<f64>();
    let gross_tvpi = gross_distributions / total_called;

    let profit = gross_distributions - total_called;
    let carry_paid = profit.max(0.0) * params.carry_rate;
    let net_distributions = gross_distributions - carry_paid;
    let net_tvpi = net_distributions / total_called;

    let mut net_flows = cash_flows.clone();
    net_flows[fund_life] -= carry_paid;
    let solved = solve_irr(&net_flows);
    if solved.is_none() {
        trace!(total_called, gross_distributions, "net IRR has no root, reporting 0");
    }

    SimulationResult {
        total_called,
        gross_distributions,
        net_distributions,
        gross_tvpi,
        net_tvpi,
        gross_dpi: gross_tvpi,
        net_dpi: net_tvpi,
        net_irr: solved.unwrap_or(0.0),
        irr_solved: solved.is_some(),
        carry_paid,
        companies: CompanyBreakdown {
            discovery_only: num_discovery - num_conviction,
            conviction: num_conviction,
            follow_on: num_follow_on,
        },
        capital,
        cash_flows,
    }
}

fn build_results(
    params: &FundParameters,
    num_simulations: u32,
    seed: u32,
    outcome_params: OutcomeParameters,
    simulations: Vec<SimulationResult>,
) -> MonteCarloResults {
    let n = simulations.len();
    let mut gross_tvpi = Vec::with_capacity(n);
    let mut net_tvpi = Vec::with_capacity(n);
    let mut net_dpi = Vec::with_capacity(n);
    let mut net_irr = Vec::with_capacity(n);
    let mut irr_fallback_count = 0_u32;

    for sim in &simulations {
        gross_tvpi.push(sim.gross_tvpi);
        net_tvpi.push(sim.net_tvpi);
        net_dpi.push(sim.net_dpi);
        net_irr.push(sim.net_irr);
        if !sim.irr_solved {
            irr_fallback_count += 1;
        }
    }

    let share_at_least = |threshold: f64| {
        if n == 0 {
            return 0.0;
        }
        net_tvpi.iter().filter(|v| **v >= threshold).count() as f64 / n as f64
    };
    let prob_return_fund = share_at_least(1.0);
    let prob_2x = share_at_least(2.0);
    let prob_3x = share_at_least(3.0);

    let results = MonteCarloResults {
        params: params.clone(),
        num_simulations,
        seed,
        outcome_params,
        simulations,
        gross_tvpi: summarize(&mut gross_tvpi),
        net_tvpi: summarize(&mut net_tvpi),
        net_dpi: summarize(&mut net_dpi),
        net_irr: summarize(&mut net_irr),
        prob_return_fund,
        prob_2x,
        prob_3x,
        irr_fallback_count,
    };

    debug!(
        num_simulations,
        seed,
        median_net_tvpi = results.net_tvpi.p50,
        median_net_irr = results.net_irr.p50,
        prob_return_fund,
        irr_fallback_count,
        "monte carlo batch complete"
    );
    if irr_fallback_count > 0 {
        debug!(
            irr_fallback_count,
            "net IRR reported as 0 for runs without a root; loss-tail IRR percentiles are approximate"
        );
    }

    results
}

fn summarize(values: &mut [f64]) -> PercentileSummary {
    let mean = if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };
    PercentileSummary {
        mean,
        p10: percentile(values, 10.0),
        p25: percentile(values, 25.0),
        p50: percentile(values, 50.0),
        p75: percentile(values, 75.0),
        p90: percentile(values, 90.0),
    }
}

/// Linear interpolation between order statistics at rank `p/100 * (n-1)`.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
