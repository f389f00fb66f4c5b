use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rate feed parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("Invalid decimal '{value}'")]
    InvalidDecimal { value: String },

    #[error("Malformed rate table for plan '{plan}' starting {start}: {reason}")]
    MalformedRateTable {
        plan:   String,
        start:  String,
        reason: String,
    },

    #[error("Unknown tariff plan '{id}'")]
    UnknownPlan { id: String },

    #[error("Invalid meter contract: {reason}")]
    InvalidMeterContract { reason: String },

    #[error("Provider error: {0}")]
    Provider(#[from] crate::providers::ProviderError),

    #[error("Meter contract not loaded")]
    MeterContractMissing,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
