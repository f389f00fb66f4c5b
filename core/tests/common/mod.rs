//! Scripted providers shared by the integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use wattwise_core::{
    providers::{
        ConsumptionProvider, MeterContract, MeterContractProvider, ProviderError,
        RateFeedProvider, Reading, TempoProvider, TempoReading,
    },
    store::LedgerStore,
};

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn store() -> LedgerStore {
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serves a full 48-reading day for every date in the requested window
/// before `available_until`. Readings are stamped with the end of their
/// interval, like the real API.
pub struct ScriptedCurve {
    pub available_until: NaiveDate,
    pub value:           fn(NaiveDate, u8) -> i64,
    pub fail_at:         Mutex<Option<NaiveDate>>,
    pub calls:           Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl ScriptedCurve {
    pub fn new(available_until: NaiveDate, value: fn(NaiveDate, u8) -> i64) -> Self {
        Self {
            available_until,
            value,
            fail_at: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(self, start: NaiveDate) -> Self {
        *self.fail_at.lock().unwrap() = Some(start);
        self
    }

    pub fn recover(&self) {
        *self.fail_at.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ConsumptionProvider for ScriptedCurve {
    fn load_curve(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Reading>, ProviderError> {
        self.calls.lock().unwrap().push((start, end));
        if *self.fail_at.lock().unwrap() == Some(start) {
            return Err(ProviderError::Rejected { status: 429, message: "quota".into() });
        }

        let mut readings = Vec::new();
        let mut day = start;
        while day < end && day < self.available_until {
            let midnight = day.and_hms_opt(0, 0, 0).unwrap();
            for slice in 0..48u8 {
                let stamp = midnight + Duration::minutes(30 * (i64::from(slice) + 1));
                readings.push(Reading {
                    timestamp: stamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    value:     (self.value)(day, slice),
                });
            }
            day = day.succ_opt().unwrap();
        }
        Ok(readings)
    }
}

/// Answers from a fixed code table; unknown dates get code 0.
pub struct ScriptedTempo {
    pub codes:   HashMap<NaiveDate, u8>,
    pub fail:    Mutex<bool>,
    pub calls:   Mutex<Vec<Vec<NaiveDate>>>,
}

impl ScriptedTempo {
    pub fn new(codes: HashMap<NaiveDate, u8>) -> Self {
        Self { codes, fail: Mutex::new(false), calls: Mutex::new(Vec::new()) }
    }

    /// Same code for every day of `from..=to`.
    pub fn uniform(from: NaiveDate, to: NaiveDate, code: u8) -> Self {
        let codes = from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|d| (d, code))
            .collect();
        Self::new(codes)
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }
}

impl TempoProvider for ScriptedTempo {
    fn days(&self, dates: &[NaiveDate]) -> Result<Vec<TempoReading>, ProviderError> {
        self.calls.lock().unwrap().push(dates.to_vec());
        if *self.fail.lock().unwrap() {
            return Err(ProviderError::Transport("connection reset".into()));
        }
        Ok(dates
            .iter()
            .map(|d| TempoReading { date: *d, code: self.codes.get(d).copied().unwrap_or(0) })
            .collect())
    }
}

/// Rate sheets by resource id; unknown ids are rejected with a 404.
pub struct StaticFeeds {
    pub sheets: HashMap<String, String>,
    pub calls:  AtomicUsize,
}

impl StaticFeeds {
    pub fn new(sheets: &[(&str, &str)]) -> Self {
        Self {
            sheets: sheets.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            calls:  AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RateFeedProvider for StaticFeeds {
    fn resource_content(&self, resource_id: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sheets.get(resource_id).cloned().ok_or_else(|| ProviderError::Rejected {
            status:  404,
            message: format!("no resource {resource_id}"),
        })
    }
}

pub struct StaticContract {
    pub contract: Result<MeterContract, ProviderError>,
    pub calls:    AtomicUsize,
}

impl StaticContract {
    pub fn new(power: &str, activation: &str) -> Self {
        Self {
            contract: Ok(MeterContract {
                subscribed_power:     power.into(),
                last_activation_date: activation.into(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self { contract: Err(error), calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MeterContractProvider for StaticContract {
    fn contract(&self) -> Result<MeterContract, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contract.clone()
    }
}

pub const BASE_SHEET: &str = "\
DATE_DEBUT;DATE_FIN;P_SOUSCRITE;PART_FIXE_HT;PART_FIXE_TTC;PART_VARIABLE_HT;PART_VARIABLE_TTC
01/08/2022;;6;105,84;151,20;0,1350;0,1740
01/08/2022;;9;130,56;189,12;0,1350;0,1740
";

pub const HPHC_SHEET: &str = "\
DATE_DEBUT;DATE_FIN;P_SOUSCRITE;PART_FIXE_TTC;PART_VARIABLE_HC_TTC;PART_VARIABLE_HP_TTC
01/08/2022;;6;155,40;0,1470;0,1841
";
