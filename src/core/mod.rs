pub mod calibration;
mod engine;
mod error;
pub mod irr;
pub mod lenient;
pub mod rng;
pub mod sampler;
mod types;

pub use calibration::calibrate;
pub use engine::{
    capital_schedule, percentile, run_monte_carlo, run_monte_carlo_parallel, run_seed,
    simulate_fund,
};
pub use error::{ConfigError, Result};
pub use irr::solve_irr;
pub use rng::Rng;
pub use types::{
    CapitalSchedule, CompanyBreakdown, FundParameters, MAX_DISCOVERY_COMPANIES, MIN_FUND_LIFE,
    MonteCarloResults, OutcomeParameters, PercentileSummary, SimulationResult,
    total_management_fees,
};
