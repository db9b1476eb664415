use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Invalid fund parameters, rejected before any simulation runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} must be > 0, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("fund life must be at least {min} years, got {value}")]
    FundLifeTooShort { value: u32, min: u32 },

    #[error("target conviction count must be >= 1")]
    NoConvictionTarget,

    #[error("discovery cohort of {value} companies exceeds the limit of {max}")]
    TooManyCompanies { value: f64, max: u32 },

    #[error("management fees ({fees}) consume the whole fund ({fund_size})")]
    FeesExceedFund { fees: f64, fund_size: f64 },

    #[error("number of simulations must be >= 1")]
    NoSimulations,
}
