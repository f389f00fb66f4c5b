//! Consumption sync: windowing, cursor resumption and failure handling.

mod common;

use chrono::{Duration, NaiveDate};
use common::{init_logs, store, ymd, ScriptedCurve};
use wattwise_core::{
    clock::SyncClock,
    meter::ContractInfo,
    providers::ProviderError,
    sync::{Pipeline, SyncEngine},
};

fn flat(_: NaiveDate, _: u8) -> i64 {
    250
}

fn contract(activation: NaiveDate) -> ContractInfo {
    ContractInfo { power_kva: 6, activation_date: activation }
}

/// A fresh database is backfilled from the activation date in 7-day
/// windows, none of which starts on or after today.
#[test]
fn empty_store_backfills_from_activation() {
    init_logs();
    let store = store();
    let activation = ymd(2023, 1, 1);
    let today = ymd(2023, 1, 15);
    let curve = ScriptedCurve::new(today, flat);

    let engine = SyncEngine::new(&store, SyncClock::fixed_on(today), &contract(activation));
    let report = engine.sync_consumption(&curve, 730).unwrap();

    assert_eq!(report.pipeline, Pipeline::Consumption);
    assert!(report.completed());
    assert_eq!(report.cursor, ymd(2023, 1, 14));
    assert_eq!(store.consumption_count().unwrap(), 14 * 48);
    assert_eq!(store.latest_consumption_date().unwrap(), Some(ymd(2023, 1, 14)));

    let calls = curve.calls();
    assert_eq!(calls[0], (ymd(2023, 1, 1), ymd(2023, 1, 8)));
    for (start, end) in &calls {
        assert!(*start < today, "window started on {start}");
        assert_eq!(*end - *start, Duration::days(7));
    }
    // ceil((today - activation) / 7)
    let bound = ((today - activation).num_days() + 6) / 7;
    assert!(calls.len() as i64 <= bound, "{} windows for bound {bound}", calls.len());
}

/// The midnight reading is the last slice of the previous day.
#[test]
fn readings_are_shifted_into_their_slice() {
    let store = store();
    let today = ymd(2023, 1, 3);
    let curve = ScriptedCurve::new(today, |_, slice| i64::from(slice) * 10);

    SyncEngine::new(&store, SyncClock::fixed_on(today), &contract(ymd(2023, 1, 1)))
        .sync_consumption(&curve, 730)
        .unwrap();

    // Reading stamped 00:30 holds slice 0 (value 0), the one stamped
    // 2023-01-02 00:00 holds slice 47 of 2023-01-01.
    assert_eq!(store.consumption_value(ymd(2023, 1, 1), 0).unwrap(), Some(0));
    assert_eq!(store.consumption_value(ymd(2023, 1, 1), 47).unwrap(), Some(470));
    assert_eq!(store.consumption_value(ymd(2023, 1, 2), 13).unwrap(), Some(130));
}

/// A second run against an up-to-date store fetches nothing and changes
/// nothing.
#[test]
fn rerun_is_idempotent() {
    let store = store();
    let today = ymd(2023, 1, 15);
    let curve = ScriptedCurve::new(today, flat);
    let engine = SyncEngine::new(&store, SyncClock::fixed_on(today), &contract(ymd(2023, 1, 1)));

    engine.sync_consumption(&curve, 730).unwrap();
    let before = store.consumption_slices(None).unwrap();
    let calls_before = curve.calls().len();

    let report = engine.sync_consumption(&curve, 730).unwrap();
    assert_eq!(report.windows, 0);
    assert_eq!(report.rows_written, 0);
    assert_eq!(curve.calls().len(), calls_before);
    assert_eq!(store.consumption_slices(None).unwrap(), before);
}

/// Upserting the same window twice leaves a single row per key.
#[test]
fn overlapping_batches_replace_rows() {
    let store = store();
    let today = ymd(2023, 1, 10);
    let curve = ScriptedCurve::new(today, flat);
    SyncEngine::new(&store, SyncClock::fixed_on(today), &contract(ymd(2023, 1, 1)))
        .sync_consumption(&curve, 730)
        .unwrap();

    let mut replay = store.consumption_slices(Some((ymd(2023, 1, 2), ymd(2023, 1, 2)))).unwrap();
    for slice in &mut replay {
        slice.value = 999;
    }
    store.upsert_consumption_batch(&replay).unwrap();

    assert_eq!(store.consumption_count().unwrap(), 9 * 48);
    assert_eq!(store.consumption_value(ymd(2023, 1, 2), 5).unwrap(), Some(999));
}

/// A provider failure stops the loop, keeps earlier windows, and the next
/// run resumes at the failed window.
#[test]
fn provider_error_stops_and_resumes() {
    init_logs();
    let store = store();
    let today = ymd(2023, 1, 15);
    let curve = ScriptedCurve::new(today, flat).failing_at(ymd(2023, 1, 8));
    let engine = SyncEngine::new(&store, SyncClock::fixed_on(today), &contract(ymd(2023, 1, 1)));

    let report = engine.sync_consumption(&curve, 730).unwrap();
    assert_eq!(report.windows, 1);
    assert_eq!(report.cursor, ymd(2023, 1, 7));
    assert!(matches!(report.error, Some(ProviderError::Rejected { status: 429, .. })));
    assert_eq!(store.consumption_count().unwrap(), 7 * 48);

    curve.recover();
    let report = engine.sync_consumption(&curve, 730).unwrap();
    assert!(report.completed());
    assert_eq!(report.windows, 1);
    assert_eq!(store.consumption_count().unwrap(), 14 * 48);

    let starts: Vec<NaiveDate> = curve.calls().iter().map(|(s, _)| *s).collect();
    assert_eq!(starts, vec![ymd(2023, 1, 1), ymd(2023, 1, 8), ymd(2023, 1, 8)]);
}

/// An old activation date is clamped to the backfill floor.
#[test]
fn backfill_is_limited_by_hard_limit() {
    let store = store();
    let today = ymd(2023, 1, 15);
    let curve = ScriptedCurve::new(today, flat);

    SyncEngine::new(&store, SyncClock::fixed_on(today), &contract(ymd(2010, 6, 1)))
        .sync_consumption(&curve, 10)
        .unwrap();

    assert_eq!(curve.calls()[0].0, ymd(2023, 1, 6));
    assert_eq!(store.consumption_count().unwrap(), 9 * 48);
}

/// An empty window does not move the cursor, so the loop stops instead of
/// asking for it again.
#[test]
fn empty_window_ends_the_run() {
    let store = store();
    let today = ymd(2023, 2, 1);
    // Data lags ten days behind today.
    let curve = ScriptedCurve::new(ymd(2023, 1, 22), flat);

    let report = SyncEngine::new(&store, SyncClock::fixed_on(today), &contract(ymd(2023, 1, 1)))
        .sync_consumption(&curve, 730)
        .unwrap();

    assert!(report.completed());
    assert_eq!(report.cursor, ymd(2023, 1, 21));
    let starts: Vec<NaiveDate> = curve.calls().iter().map(|(s, _)| *s).collect();
    assert_eq!(starts, vec![ymd(2023, 1, 1), ymd(2023, 1, 8), ymd(2023, 1, 15), ymd(2023, 1, 22)]);
}
