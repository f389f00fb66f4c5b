//! Incremental sync of consumption slices and Tempo colors.
//!
//! Both pipelines follow the same loop:
//!   1. cursor = newest stored day, or a day derived from the meter
//!      activation date when the table is empty, clamped to a backfill floor;
//!   2. request a window starting the day after the cursor;
//!   3. upsert what came back in one transaction and move the cursor.
//!
//! The loop ends when the next start reaches today, when the cursor stops
//! moving, or at the first provider error. Committed windows are never
//! rolled back, so a later call simply resumes.

use crate::{
    clock::SyncClock,
    config::AppConfig,
    error::LedgerResult,
    meter::ContractInfo,
    plan::TempoColor,
    providers::{ConsumptionProvider, ProviderError, Reading, TempoProvider, TempoReading},
    store::{ConsumptionSlice, LedgerStore},
    types::SliceIndex,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Readings are stamped with the end of their interval.
const READING_OFFSET_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Consumption,
    Tempo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub pipeline:     Pipeline,
    /// Windows fetched and committed.
    pub windows:      u32,
    pub rows_written: usize,
    /// Last day known to be stored after the run.
    pub cursor:       NaiveDate,
    /// Set when the run stopped on a provider failure.
    pub error:        Option<ProviderError>,
}

impl SyncReport {
    fn new(pipeline: Pipeline, cursor: NaiveDate) -> Self {
        Self { pipeline, windows: 0, rows_written: 0, cursor, error: None }
    }

    pub fn completed(&self) -> bool {
        self.error.is_none()
    }
}

pub struct SyncEngine<'s> {
    store:                   &'s LedgerStore,
    clock:                   SyncClock,
    activation_date:         NaiveDate,
    consumption_window_days: i64,
    tempo_window_days:       i64,
}

impl<'s> SyncEngine<'s> {
    pub fn new(store: &'s LedgerStore, clock: SyncClock, contract: &ContractInfo) -> Self {
        Self {
            store,
            clock,
            activation_date: contract.activation_date,
            consumption_window_days: 7,
            tempo_window_days: 100,
        }
    }

    /// Take window sizes from the configuration.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.consumption_window_days = config.consumption_window_days.max(1);
        self.tempo_window_days = config.tempo_window_days.max(1);
        self
    }

    // ── Consumption ───────────────────────────────────────────────

    pub fn sync_consumption(
        &self,
        provider: &dyn ConsumptionProvider,
        hard_limit_days: i64,
    ) -> LedgerResult<SyncReport> {
        let today = self.clock.today();
        let stored = self.store.latest_consumption_date()?;
        let mut cursor = initial_cursor(stored, self.activation_date, 1, today, hard_limit_days);
        let mut report = SyncReport::new(Pipeline::Consumption, cursor);
        let mut previous_start = None;

        loop {
            let Some(start) = next_window_start(cursor, previous_start, today) else {
                break;
            };
            previous_start = Some(start);
            let end = start + Duration::days(self.consumption_window_days);

            log::info!("sync: fetching consumption {start} to {end}");
            let readings = match provider.load_curve(start, end) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("sync: consumption window {start} failed: {e}");
                    report.error = Some(e);
                    break;
                }
            };

            let batch = match slices_from_readings(&readings) {
                Ok(b) => b,
                Err(e) => {
                    log::warn!("sync: consumption window {start} rejected: {e}");
                    report.error = Some(e);
                    break;
                }
            };

            if let Some(last) = batch.iter().map(|s| s.date).max() {
                cursor = cursor.max(last);
            }
            let written = self.store.upsert_consumption_batch(&batch)?;
            log::info!("sync: saved {written} consumption rows");

            report.windows += 1;
            report.rows_written += written;
            report.cursor = cursor;
        }

        Ok(report)
    }

    // ── Tempo ─────────────────────────────────────────────────────

    pub fn sync_tempo(
        &self,
        provider: &dyn TempoProvider,
        hard_limit_days: i64,
    ) -> LedgerResult<SyncReport> {
        let today = self.clock.today();
        let stored = self.store.latest_tempo_date()?;
        let mut cursor = initial_cursor(stored, self.activation_date, 2, today, hard_limit_days);
        let mut report = SyncReport::new(Pipeline::Tempo, cursor);
        let mut previous_start = None;

        loop {
            let Some(start) = next_window_start(cursor, previous_start, today) else {
                break;
            };
            previous_start = Some(start);
            let dates: Vec<NaiveDate> = (0..self.tempo_window_days)
                .map(|i| start + Duration::days(i))
                .collect();

            log::info!("sync: fetching {} tempo days from {start}", dates.len());
            let answers = match provider.days(&dates) {
                Ok(a) => a,
                Err(e) => {
                    log::warn!("sync: tempo window {start} failed: {e}");
                    report.error = Some(e);
                    break;
                }
            };

            let batch = known_prefix(start, answers);
            if let Some((last, _)) = batch.last() {
                cursor = cursor.max(*last);
            }

            let written = self.store.upsert_tempo_batch(&batch)?;
            log::info!("sync: saved {written} tempo rows");

            report.windows += 1;
            report.rows_written += written;
            report.cursor = cursor;
        }

        Ok(report)
    }
}

/// Stored cursor, or activation date minus `lead_days`, never older than
/// `today - hard_limit_days`.
fn initial_cursor(
    stored: Option<NaiveDate>,
    activation: NaiveDate,
    lead_days: i64,
    today: NaiveDate,
    hard_limit_days: i64,
) -> NaiveDate {
    let cursor = stored.unwrap_or(activation - Duration::days(lead_days));
    cursor.max(today - Duration::days(hard_limit_days))
}

/// Start of the next window, or `None` when the loop must stop.
fn next_window_start(
    cursor: NaiveDate,
    previous_start: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let start = cursor.succ_opt()?;
    if previous_start == Some(start) || start >= today {
        None
    } else {
        Some(start)
    }
}

/// Colors of the consecutive days from `start` up to the first day that is
/// undecided or missing. Later days are left for a run that starts at the
/// gap, since the stored maximum date is the next cursor.
fn known_prefix(start: NaiveDate, mut answers: Vec<TempoReading>) -> Vec<(NaiveDate, TempoColor)> {
    answers.sort_by_key(|a| a.date);
    let mut batch = Vec::with_capacity(answers.len());
    let mut expected = Some(start);
    for answer in answers.iter().filter(|a| a.date >= start) {
        if Some(answer.date) != expected {
            break;
        }
        let Some(color) = TempoColor::from_code(answer.code) else {
            if answer.code != 0 {
                log::warn!("sync: unexpected tempo code {} for {}", answer.code, answer.date);
            }
            break;
        };
        batch.push((answer.date, color));
        expected = answer.date.succ_opt();
    }
    batch
}

fn slices_from_readings(readings: &[Reading]) -> Result<Vec<ConsumptionSlice>, ProviderError> {
    let mut batch = Vec::with_capacity(readings.len());
    for reading in readings {
        let reported = parse_reading_timestamp(&reading.timestamp).ok_or_else(|| {
            ProviderError::Payload(format!("bad reading timestamp '{}'", reading.timestamp))
        })?;
        if reading.value < 0 {
            log::warn!("sync: skipping negative reading at {}", reading.timestamp);
            continue;
        }
        let local = reported - Duration::minutes(READING_OFFSET_MINUTES);
        batch.push(ConsumptionSlice {
            date:  local.date(),
            slice: slice_index(local),
            value: reading.value,
        });
    }
    Ok(batch)
}

/// Slice containing a local time: two per hour.
pub fn slice_index(at: NaiveDateTime) -> SliceIndex {
    let index = at.hour() * 2 + u32::from(at.minute() >= 30);
    index as SliceIndex
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, the `T`-separated form, and RFC 3339
/// with an offset (the local wall time is kept).
pub fn parse_reading_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_local()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reading_at_midnight_lands_in_last_slice_of_previous_day() {
        let batch = slices_from_readings(&[Reading {
            timestamp: "2024-03-10 00:00:00".into(),
            value:     420,
        }])
        .unwrap();
        assert_eq!(batch[0].date, ymd(2024, 3, 9));
        assert_eq!(batch[0].slice, 47);
    }

    #[test]
    fn half_past_reading_is_first_slice() {
        let ts = parse_reading_timestamp("2024-03-10T00:30:00+01:00").unwrap();
        let local = ts - Duration::minutes(READING_OFFSET_MINUTES);
        assert_eq!(local.date(), ymd(2024, 3, 10));
        assert_eq!(slice_index(local), 0);
    }

    #[test]
    fn known_prefix_stops_at_first_missing_or_undecided_day() {
        let answer = |d, code| TempoReading { date: ymd(2023, 1, d), code };
        let batch = known_prefix(ymd(2023, 1, 1), vec![answer(2, 2), answer(1, 1), answer(4, 3)]);
        assert_eq!(batch, vec![(ymd(2023, 1, 1), TempoColor::Blue), (ymd(2023, 1, 2), TempoColor::White)]);

        let batch = known_prefix(ymd(2023, 1, 1), vec![answer(1, 0), answer(2, 1)]);
        assert!(batch.is_empty());
    }

    #[test]
    fn cursor_is_clamped_to_backfill_floor() {
        let today = ymd(2024, 6, 1);
        let cursor = initial_cursor(None, ymd(2010, 1, 1), 1, today, 730);
        assert_eq!(cursor, today - Duration::days(730));
    }

    #[test]
    fn window_stops_when_start_reaches_today_or_repeats() {
        let today = ymd(2024, 6, 1);
        assert_eq!(next_window_start(ymd(2024, 5, 31), None, today), None);
        assert_eq!(
            next_window_start(ymd(2024, 5, 1), Some(ymd(2024, 5, 2)), today),
            None
        );
        assert_eq!(
            next_window_start(ymd(2024, 5, 1), None, today),
            Some(ymd(2024, 5, 2))
        );
    }
}
