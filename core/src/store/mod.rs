//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Sync, ingestion and pricing call store methods; they never execute SQL
//! directly. Dates cross this boundary as `NaiveDate` and are kept as ISO
//! `YYYY-MM-DD` text (or y/m/d integers) in the tables.

use crate::{
    error::{LedgerError, LedgerResult},
    plan::TariffPlan,
    types::{SliceIndex, WattHours},
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

mod consumption;
mod rate_schedule;
mod settings;
mod tempo;

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

/// One 30-minute consumption reading, keyed by (date, slice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionSlice {
    pub date:  NaiveDate,
    pub slice: SliceIndex,
    pub value: WattHours,
}

impl ConsumptionSlice {
    /// Hour of day (0..=23) the slice starts in.
    pub fn hour(&self) -> u32 {
        u32::from(self.slice) / 2
    }
}

/// One versioned rate. Prices are 4-digit fixed point (€/kWh × 10⁴), the
/// subscription is the annual fee in cents. `end` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateScheduleRow {
    pub plan:          TariffPlan,
    pub start:         NaiveDate,
    pub power:         u32,
    pub subscription:  i64,
    pub day_kind:      u8,
    pub peak_price:    i64,
    pub offpeak_price: i64,
    pub end:           NaiveDate,
}

impl RateScheduleRow {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn price(&self, peak: bool) -> i64 {
        if peak { self.peak_price } else { self.offpeak_price }
    }
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based databases, this opens the same file.
    pub fn reopen(&self) -> LedgerResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }
}

// ── Row conversion helpers ─────────────────────────────────────────

pub(crate) fn date_from_ymd(year: i32, month: u32, day: u32) -> LedgerResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| LedgerError::InvalidDate {
        value:  format!("{year:04}-{month:02}-{day:02}"),
        reason: "not a calendar date".into(),
    })
}

pub(crate) fn parse_iso_date(value: &str) -> LedgerResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| LedgerError::InvalidDate {
        value:  value.to_string(),
        reason: e.to_string(),
    })
}
