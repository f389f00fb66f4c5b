//! Contracts for the remote data sources.
//!
//! HTTP clients live outside this crate; the sync and ingestion code only
//! sees these traits. Every call is one round-trip and may fail with a
//! `ProviderError`, which the pipelines treat as "stop here, resume later".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by provider (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected payload: {0}")]
    Payload(String),
}

/// One load-curve point. `timestamp` is ISO-8601 local time and marks the
/// *end* of the 30-minute interval; `value` is in Wh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: String,
    pub value:     i64,
}

/// One Tempo answer. Code 0 means the color is not published yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoReading {
    pub date: NaiveDate,
    pub code: u8,
}

/// Contract data as the meter provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterContract {
    /// e.g. `"6 kVA"`
    pub subscribed_power:     String,
    /// ISO date or datetime; only the first 10 characters matter.
    pub last_activation_date: String,
}

pub trait ConsumptionProvider: Send + Sync {
    /// Readings for the half-open window `[start, end)`.
    fn load_curve(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Reading>, ProviderError>;
}

pub trait TempoProvider: Send + Sync {
    fn days(&self, dates: &[NaiveDate]) -> Result<Vec<TempoReading>, ProviderError>;
}

pub trait RateFeedProvider: Send + Sync {
    /// Raw semicolon-delimited rate sheet.
    fn resource_content(&self, resource_id: &str) -> Result<String, ProviderError>;
}

pub trait MeterContractProvider: Send + Sync {
    fn contract(&self) -> Result<MeterContract, ProviderError>;
}

/// The sources a full refresh pulls from.
#[derive(Clone, Copy)]
pub struct Providers<'a> {
    pub consumption: &'a dyn ConsumptionProvider,
    pub tempo:       &'a dyn TempoProvider,
    pub rate_feed:   &'a dyn RateFeedProvider,
}
