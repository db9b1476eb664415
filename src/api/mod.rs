use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::core::{
    FundParameters, MonteCarloResults, OutcomeParameters, PercentileSummary, SimulationResult,
    lenient, run_monte_carlo, run_monte_carlo_parallel,
};

const MAX_API_SIMULATIONS: u32 = 100_000;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    #[serde(deserialize_with = "lenient::option_f64")]
    fund_size: Option<f64>,
    #[serde(deserialize_with = "lenient::option_u32")]
    fund_life: Option<u32>,
    #[serde(deserialize_with = "lenient::option_f64")]
    mgmt_fee_rate: Option<f64>,
    #[serde(deserialize_with = "lenient::option_u32")]
    mgmt_fee_full_years: Option<u32>,
    #[serde(deserialize_with = "lenient::option_f64")]
    mgmt_fee_step_down: Option<f64>,
    #[serde(deserialize_with = "lenient::option_f64")]
    carry_rate: Option<f64>,

    #[serde(deserialize_with = "lenient::option_u32")]
    target_conviction_count: Option<u32>,
    #[serde(deserialize_with = "lenient::option_f64")]
    graduation_rate: Option<f64>,
    #[serde(deserialize_with = "lenient::option_f64")]
    discovery_check_size: Option<f64>,
    #[serde(deserialize_with = "lenient::option_f64")]
    conviction_check_size: Option<f64>,
    #[serde(deserialize_with = "lenient::option_f64")]
    conviction_check_min: Option<f64>,
    #[serde(deserialize_with = "lenient::option_f64")]
    conviction_check_max: Option<f64>,
    #[serde(deserialize_with = "lenient::option_f64")]
    follow_on_reserve_percent: Option<f64>,
    #[serde(deserialize_with = "lenient::option_f64")]
    discovery_success_rate: Option<f64>,
    #[serde(deserialize_with = "lenient::option_f64")]
    conviction_success_rate: Option<f64>,

    #[serde(deserialize_with = "lenient::option_u32")]
    simulations: Option<u32>,
    #[serde(deserialize_with = "lenient::option_u32")]
    seed: Option<u32>,
    parallel: Option<bool>,
    include_runs: Option<bool>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "vcsim",
    about = "Monte Carlo model of a two-stage (discovery + conviction) venture fund"
)]
pub struct Cli {
    #[arg(long, default_value_t = 25_000_000.0, help = "Committed fund size")]
    fund_size: f64,
    #[arg(long, default_value_t = 10, help = "Fund life in years (>= 4)")]
    fund_life: u32,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Annual management fee in percent of fund size"
    )]
    mgmt_fee_rate: f64,
    #[arg(long, default_value_t = 5, help = "Years charged at the full fee")]
    mgmt_fee_full_years: u32,
    #[arg(
        long,
        default_value_t = 0.75,
        help = "Multiplier applied to the fee after the full-fee years"
    )]
    mgmt_fee_step_down: f64,
    #[arg(long, default_value_t = 20.0, help = "Carried interest in percent of profit")]
    carry_rate: f64,
    #[arg(long, default_value_t = 22, help = "Number of conviction positions")]
    target_conviction_count: u32,
    #[arg(
        long,
        default_value_t = 25.0,
        help = "Share of discovery companies promoted to conviction, in percent"
    )]
    graduation_rate: f64,
    #[arg(long, default_value_t = 100_000.0)]
    discovery_check_size: f64,
    #[arg(long, default_value_t = 250_000.0)]
    conviction_check_size: f64,
    #[arg(long, default_value_t = 250_000.0, help = "Informational lower bound")]
    conviction_check_min: f64,
    #[arg(long, default_value_t = 750_000.0, help = "Informational upper bound")]
    conviction_check_max: f64,
    #[arg(
        long,
        default_value_t = 30.0,
        help = "Follow-on reserve in percent of investable capital"
    )]
    follow_on_reserve_percent: f64,
    #[arg(
        long,
        default_value_t = 30.0,
        help = "Base share of discovery checks returning more than 1x, in percent"
    )]
    discovery_success_rate: f64,
    #[arg(
        long,
        default_value_t = 55.0,
        help = "Base share of conviction positions returning more than 1x, in percent"
    )]
    conviction_success_rate: f64,
    #[arg(long, default_value_t = 5_000)]
    simulations: u32,
    #[arg(long, help = "Generator seed; omitted means seeded from the clock")]
    seed: Option<u32>,
    #[arg(long, default_value_t = false, help = "Run simulations on all cores")]
    parallel: bool,
    #[arg(long, default_value_t = false, help = "Include every run in the output")]
    include_runs: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct RunOptions {
    simulations: u32,
    seed: Option<u32>,
    parallel: bool,
    include_runs: bool,
}

#[derive(Debug)]
struct ApiRequest {
    params: FundParameters,
    options: RunOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    params: FundParameters,
    num_simulations: u32,
    seed: u32,
    parallel: bool,
    outcome_params: OutcomeParameters,
    gross_tvpi: PercentileSummary,
    net_tvpi: PercentileSummary,
    net_dpi: PercentileSummary,
    net_irr: PercentileSummary,
    prob_return_fund: f64,
    prob_2x: f64,
    prob_3x: f64,
    irr_fallback_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    runs: Option<Vec<SimulationResult>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(cli: Cli) -> Result<ApiRequest, String> {
    if cli.simulations == 0 {
        return Err("--simulations must be > 0".to_string());
    }

    if !cli.graduation_rate.is_finite() || cli.graduation_rate <= 0.0 || cli.graduation_rate > 100.0
    {
        return Err("--graduation-rate must be > 0 and <= 100".to_string());
    }

    for (name, rate) in [
        ("--mgmt-fee-rate", cli.mgmt_fee_rate),
        ("--carry-rate", cli.carry_rate),
        ("--follow-on-reserve-percent", cli.follow_on_reserve_percent),
        ("--discovery-success-rate", cli.discovery_success_rate),
        ("--conviction-success-rate", cli.conviction_success_rate),
    ] {
        if !(0.0..=100.0).contains(&rate) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    if !(0.0..=1.0).contains(&cli.mgmt_fee_step_down) {
        return Err("--mgmt-fee-step-down must be between 0 and 1".to_string());
    }

    let params = FundParameters {
        fund_size: cli.fund_size,
        fund_life: cli.fund_life,
        mgmt_fee_rate: cli.mgmt_fee_rate / 100.0,
        mgmt_fee_full_years: cli.mgmt_fee_full_years,
        mgmt_fee_step_down: cli.mgmt_fee_step_down,
        carry_rate: cli.carry_rate / 100.0,
        target_conviction_count: cli.target_conviction_count,
        graduation_rate: cli.graduation_rate / 100.0,
        discovery_check_size: cli.discovery_check_size,
        conviction_check_size: cli.conviction_check_size,
        conviction_check_min: cli.conviction_check_min,
        conviction_check_max: cli.conviction_check_max,
        follow_on_reserve_percent: cli.follow_on_reserve_percent / 100.0,
        discovery_success_rate: cli.discovery_success_rate / 100.0,
        conviction_success_rate: cli.conviction_success_rate / 100.0,
    };
    params.validate().map_err(|e| e.to_string())?;

    Ok(ApiRequest {
        params,
        options: RunOptions {
            simulations: cli.simulations,
            seed: cli.seed,
            parallel: cli.parallel,
            include_runs: cli.include_runs,
        },
    })
}

fn execute(request: &ApiRequest) -> Result<MonteCarloResults, String> {
    let run = if request.options.parallel {
        run_monte_carlo_parallel
    } else {
        run_monte_carlo
    };
    run(
        &request.params,
        request.options.simulations,
        request.options.seed,
    )
    .map_err(|e| e.to_string())
}

/// Runs one batch from parsed command-line flags and renders it as JSON.
pub fn run_cli(cli: Cli) -> Result<String, String> {
    let request = build_request(cli)?;
    let results = execute(&request)?;
    let response = build_simulate_response(results, request.options);
    serde_json::to_string_pretty(&response).map_err(|e| format!("failed to encode results: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/defaults", get(defaults_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "vcsim HTTP API listening");

    axum::serve(listener, app).await
}

async fn defaults_handler() -> Response {
    json_response(StatusCode::OK, FundParameters::default())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!(%msg, "rejected simulate request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    // The batch is CPU-bound; keep it off the async workers.
    let outcome = tokio::task::spawn_blocking(move || {
        let results = execute(&request)?;
        Ok::<_, String>(build_simulate_response(results, request.options))
    })
    .await;

    match outcome {
        Ok(Ok(response)) => {
            info!(
                simulations = response.num_simulations,
                seed = response.seed,
                median_net_tvpi = response.net_tvpi.p50,
                "simulate request served"
            );
            json_response(StatusCode::OK, response)
        }
        Ok(Err(msg)) => error_response(StatusCode::BAD_REQUEST, &msg),
        Err(e) => {
            error!("simulation task failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation failed")
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

/// Payload rates are fractions, matching the stored fund record; they are
/// converted to the CLI's percent units before shared validation.
fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.fund_size {
        cli.fund_size = v;
    }
    if let Some(v) = payload.fund_life {
        cli.fund_life = v;
    }
    if let Some(v) = payload.mgmt_fee_rate {
        cli.mgmt_fee_rate = v * 100.0;
    }
    if let Some(v) = payload.mgmt_fee_full_years {
        cli.mgmt_fee_full_years = v;
    }
    if let Some(v) = payload.mgmt_fee_step_down {
        cli.mgmt_fee_step_down = v;
    }
    if let Some(v) = payload.carry_rate {
        cli.carry_rate = v * 100.0;
    }

    if let Some(v) = payload.target_conviction_count {
        cli.target_conviction_count = v;
    }
    if let Some(v) = payload.graduation_rate {
        cli.graduation_rate = v * 100.0;
    }
    if let Some(v) = payload.discovery_check_size {
        cli.discovery_check_size = v;
    }
    if let Some(v) = payload.conviction_check_size {
        cli.conviction_check_size = v;
    }
    if let Some(v) = payload.conviction_check_min {
        cli.conviction_check_min = v;
    }
    if let Some(v) = payload.conviction_check_max {
        cli.conviction_check_max = v;
    }
    if let Some(v) = payload.follow_on_reserve_percent {
        cli.follow_on_reserve_percent = v * 100.0;
    }
    if let Some(v) = payload.discovery_success_rate {
        cli.discovery_success_rate = v * 100.0;
    }
    if let Some(v) = payload.conviction_success_rate {
        cli.conviction_success_rate = v * 100.0;
    }

    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if payload.seed.is_some() {
        cli.seed = payload.seed;
    }
    if let Some(v) = payload.parallel {
        cli.parallel = v;
    }
    if let Some(v) = payload.include_runs {
        cli.include_runs = v;
    }

    if cli.simulations > MAX_API_SIMULATIONS {
        return Err(format!("simulations must be <= {MAX_API_SIMULATIONS}"));
    }

    build_request(cli)
}

fn default_cli_for_api() -> Cli {
    let defaults = FundParameters::default();
    Cli {
        fund_size: defaults.fund_size,
        fund_life: defaults.fund_life,
        mgmt_fee_rate: 2.0,
        mgmt_fee_full_years: defaults.mgmt_fee_full_years,
        mgmt_fee_step_down: defaults.mgmt_fee_step_down,
        carry_rate: 20.0,
        target_conviction_count: defaults.target_conviction_count,
        graduation_rate: 25.0,
        discovery_check_size: defaults.discovery_check_size,
        conviction_check_size: defaults.conviction_check_size,
        conviction_check_min: defaults.conviction_check_min,
        conviction_check_max: defaults.conviction_check_max,
        follow_on_reserve_percent: 30.0,
        discovery_success_rate: 30.0,
        conviction_success_rate: 55.0,
        simulations: 5_000,
        seed: None,
        parallel: false,
        include_runs: false,
    }
}

fn build_simulate_response(results: MonteCarloResults, options: RunOptions) -> SimulateResponse {
    SimulateResponse {
        params: results.params,
        num_simulations: results.num_simulations,
        seed: results.seed,
        parallel: options.parallel,
        outcome_params: results.outcome_params,
        gross_tvpi: results.gross_tvpi,
        net_tvpi: results.net_tvpi,
        net_dpi: results.net_dpi,
        net_irr: results.net_irr,
        prob_return_fund: results.prob_return_fund,
        prob_2x: results.prob_2x,
        prob_3x: results.prob_3x,
        irr_fallback_count: results.irr_fallback_count,
        runs: options.include_runs.then_some(results.simulations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn default_cli_builds_default_fund() {
        let request = build_request(sample_cli()).expect("valid defaults");
        let expected = FundParameters::default();
        let p = &request.params;

        assert_approx(p.fund_size, expected.fund_size);
        assert_eq!(p.fund_life, expected.fund_life);
        assert_approx(p.mgmt_fee_rate, expected.mgmt_fee_rate);
        assert_approx(p.carry_rate, expected.carry_rate);
        assert_approx(p.graduation_rate, expected.graduation_rate);
        assert_approx(p.follow_on_reserve_percent, expected.follow_on_reserve_percent);
        assert_approx(p.discovery_success_rate, expected.discovery_success_rate);
        assert_approx(p.conviction_success_rate, expected.conviction_success_rate);
        assert_eq!(p.num_discovery(), 88);
        assert_eq!(request.options.simulations, 5_000);
        assert_eq!(request.options.seed, None);
    }

    #[test]
    fn clap_parses_flags_in_percent_units() {
        let cli = Cli::try_parse_from([
            "vcsim",
            "--graduation-rate",
            "20",
            "--carry-rate",
            "25",
            "--simulations",
            "10",
            "--seed",
            "7",
            "--parallel",
        ])
        .expect("flags parse");
        let request = build_request(cli).expect("valid flags");

        assert_approx(request.params.graduation_rate, 0.20);
        assert_approx(request.params.carry_rate, 0.25);
        assert_eq!(request.params.num_discovery(), 110);
        assert_eq!(
            request.options,
            RunOptions {
                simulations: 10,
                seed: Some(7),
                parallel: true,
                include_runs: false,
            }
        );
    }

    #[test]
    fn build_request_rejects_zero_graduation_rate() {
        let mut cli = sample_cli();
        cli.graduation_rate = 0.0;
        let err = build_request(cli).expect_err("must reject zero graduation");
        assert!(err.contains("--graduation-rate"));
    }

    #[test]
    fn build_request_rejects_zero_simulations() {
        let mut cli = sample_cli();
        cli.simulations = 0;
        let err = build_request(cli).expect_err("must reject zero simulations");
        assert!(err.contains("--simulations"));
    }

    #[test]
    fn conviction_check_bounds_are_passed_through_unchecked() {
        let mut cli = sample_cli();
        cli.conviction_check_min = 900_000.0;
        let request = build_request(cli).expect("bounds are informational");
        assert_approx(request.params.conviction_check_min, 900_000.0);
        assert_approx(request.params.conviction_check_max, 750_000.0);
    }

    #[test]
    fn api_request_rejects_oversized_discovery_cohort() {
        let err = api_request_from_json(
            r#"{"targetConvictionCount": 4294967295, "graduationRate": 0.5}"#,
        )
        .expect_err("must reject cohort above the limit");
        assert!(err.contains("discovery cohort"));
    }

    #[test]
    fn build_request_surfaces_engine_validation() {
        let mut cli = sample_cli();
        cli.fund_life = 3;
        let err = build_request(cli).expect_err("must reject short fund life");
        assert!(err.contains("fund life"));
    }

    #[test]
    fn api_request_from_json_accepts_numbers_and_decimal_strings() {
        let json = r#"{
          "fundSize": "50000000.00",
          "fundLife": 12,
          "mgmtFeeRate": "0.025",
          "carryRate": 0.25,
          "targetConvictionCount": "20",
          "graduationRate": "0.2000",
          "followOnReservePercent": 0.4,
          "simulations": "250",
          "seed": 99,
          "includeRuns": true
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let p = &request.params;

        assert_approx(p.fund_size, 50_000_000.0);
        assert_eq!(p.fund_life, 12);
        assert_approx(p.mgmt_fee_rate, 0.025);
        assert_approx(p.carry_rate, 0.25);
        assert_eq!(p.target_conviction_count, 20);
        assert_approx(p.graduation_rate, 0.20);
        assert_approx(p.follow_on_reserve_percent, 0.40);
        assert_eq!(p.num_discovery(), 100);
        assert_eq!(request.options.simulations, 250);
        assert_eq!(request.options.seed, Some(99));
        assert!(request.options.include_runs);
        assert!(!request.options.parallel);
    }

    #[test]
    fn api_request_rejects_oversized_batches() {
        let err = api_request_from_json(r#"{"simulations": 1000000}"#)
            .expect_err("must cap simulations");
        assert!(err.contains("simulations"));
    }

    #[test]
    fn api_request_rejects_malformed_numbers() {
        let err = api_request_from_json(r#"{"fundSize": "twenty million"}"#)
            .expect_err("must reject garbage");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let mut cli = sample_cli();
        cli.simulations = 20;
        cli.seed = Some(3);
        let request = build_request(cli).expect("valid inputs");
        let results = execute(&request).expect("valid run");
        let response = build_simulate_response(results, request.options);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"netTvpi\""));
        assert!(json.contains("\"grossTvpi\""));
        assert!(json.contains("\"netIrr\""));
        assert!(json.contains("\"probReturnFund\""));
        assert!(json.contains("\"prob2x\""));
        assert!(json.contains("\"irrFallbackCount\""));
        assert!(json.contains("\"outcomeParams\""));
        assert!(json.contains("\"seed\":3"));
        assert!(!json.contains("\"runs\""));
    }

    #[test]
    fn include_runs_returns_every_simulation() {
        let mut cli = sample_cli();
        cli.simulations = 12;
        cli.seed = Some(8);
        cli.include_runs = true;
        let request = build_request(cli).expect("valid inputs");
        let results = execute(&request).expect("valid run");
        let response = build_simulate_response(results, request.options);

        let runs = response.runs.as_ref().expect("runs requested");
        assert_eq!(runs.len(), 12);
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"cashFlows\""));
        assert!(json.contains("\"companies\""));
    }

    #[test]
    fn run_cli_output_matches_direct_engine_call() {
        let mut cli = sample_cli();
        cli.simulations = 40;
        cli.seed = Some(21);
        let json = run_cli(cli).expect("cli run");

        let direct = run_monte_carlo(&FundParameters::default(), 40, Some(21)).expect("valid");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        let p50 = value["netTvpi"]["p50"].as_f64().expect("p50 present");
        assert_approx(p50, direct.net_tvpi.p50);
        assert_eq!(value["numSimulations"], 40);
    }

    #[test]
    fn parallel_option_routes_to_per_run_seeding() {
        let mut cli = sample_cli();
        cli.simulations = 30;
        cli.seed = Some(1);
        cli.parallel = true;
        let request = build_request(cli).expect("valid inputs");
        let results = execute(&request).expect("valid run");

        let direct = run_monte_carlo_parallel(&FundParameters::default(), 30, Some(1))
            .expect("valid run");
        assert_eq!(results, direct);
    }
}
