//! Tariff plan registry.
//!
//! Every plan is a row in `PLANS`: an identifier, a display name and two
//! optional classifier functions. A missing peak rule means the plan prices
//! every hour the same; a missing day-kind rule means a single schedule
//! (day-kind 0).

use crate::error::{LedgerError, LedgerResult};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Hour at which a Tempo tariff day starts.
pub const TARIFF_DAY_START_HOUR: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TariffPlan {
    Base,
    Hphc,
    Tempo,
    ZenFlex,
    ZenWeekend,
    ZenWeekendHc,
    TotalStdFixe,
    TotalStdFixeHc,
}

/// Tempo day color as published by the grid operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TempoColor {
    Blue  = 1,
    White = 2,
    Red   = 3,
}

impl TempoColor {
    /// Provider code to color. Code 0 ("not decided yet") and anything
    /// outside 1..=3 map to `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TempoColor::Blue),
            2 => Some(TempoColor::White),
            3 => Some(TempoColor::Red),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Read access to stored Tempo colors, keyed by calendar date.
pub trait TempoCalendar {
    fn color(&self, date: NaiveDate) -> Option<TempoColor>;
}

impl TempoCalendar for HashMap<NaiveDate, TempoColor> {
    fn color(&self, date: NaiveDate) -> Option<TempoColor> {
        self.get(&date).copied()
    }
}

impl TempoCalendar for BTreeMap<NaiveDate, TempoColor> {
    fn color(&self, date: NaiveDate) -> Option<TempoColor> {
        self.get(&date).copied()
    }
}

pub type PeakRule = fn(u32) -> bool;

/// Returns `None` when the day cannot be classified yet (missing Tempo color).
pub type DayKindRule = fn(NaiveDate, u32, &dyn TempoCalendar) -> Option<u8>;

pub struct PlanDescriptor {
    pub plan:          TariffPlan,
    pub id:            &'static str,
    pub display_name:  &'static str,
    pub peak_rule:     Option<PeakRule>,
    pub day_kind_rule: Option<DayKindRule>,
}

impl PlanDescriptor {
    /// `None` if the plan has no peak/off-peak split.
    pub fn is_peak(&self, hour: u32) -> Option<bool> {
        self.peak_rule.map(|rule| rule(hour))
    }

    /// Day-kind code for a slice at `hour` on `date`; 0 for plans with a
    /// single schedule.
    pub fn day_kind(&self, date: NaiveDate, hour: u32, tempo: &dyn TempoCalendar) -> Option<u8> {
        match self.day_kind_rule {
            Some(rule) => rule(date, hour, tempo),
            None       => Some(0),
        }
    }

    pub fn has_peak_rule(&self) -> bool {
        self.peak_rule.is_some()
    }

    pub fn has_day_kind_rule(&self) -> bool {
        self.day_kind_rule.is_some()
    }

    /// First day-kind code used by this plan's rate rows.
    pub fn first_day_kind(&self) -> u8 {
        if self.has_day_kind_rule() { 1 } else { 0 }
    }
}

// ── Peak rules ─────────────────────────────────────────────────────

fn daytime_peak(hour: u32) -> bool {
    (6..22).contains(&hour)
}

fn flex_peak(hour: u32) -> bool {
    (8..13).contains(&hour) || (18..20).contains(&hour)
}

// ── Day-kind rules ─────────────────────────────────────────────────

/// The tariff day a slice belongs to: hours before 06:00 count towards the
/// previous calendar date.
pub fn tariff_day(date: NaiveDate, hour: u32) -> Option<NaiveDate> {
    if hour < TARIFF_DAY_START_HOUR {
        date.pred_opt()
    } else {
        Some(date)
    }
}

fn tempo_day_kind(date: NaiveDate, hour: u32, tempo: &dyn TempoCalendar) -> Option<u8> {
    let day = tariff_day(date, hour)?;
    tempo.color(day).map(TempoColor::code)
}

fn flex_day_kind(date: NaiveDate, _hour: u32, tempo: &dyn TempoCalendar) -> Option<u8> {
    match tempo.color(date) {
        Some(TempoColor::Red) => Some(2),
        _                     => Some(1),
    }
}

fn weekend_day_kind(date: NaiveDate, _hour: u32, _tempo: &dyn TempoCalendar) -> Option<u8> {
    match date.weekday() {
        Weekday::Sat | Weekday::Sun => Some(2),
        _                           => Some(1),
    }
}

pub static PLANS: [PlanDescriptor; 8] = [
    PlanDescriptor {
        plan: TariffPlan::Base,
        id: "base",
        display_name: "Bleu Base",
        peak_rule: None,
        day_kind_rule: None,
    },
    PlanDescriptor {
        plan: TariffPlan::Hphc,
        id: "hphc",
        display_name: "Bleu Heures Creuses",
        peak_rule: Some(daytime_peak),
        day_kind_rule: None,
    },
    PlanDescriptor {
        plan: TariffPlan::Tempo,
        id: "tempo",
        display_name: "Bleu Tempo",
        peak_rule: Some(daytime_peak),
        day_kind_rule: Some(tempo_day_kind),
    },
    PlanDescriptor {
        plan: TariffPlan::ZenFlex,
        id: "zenflex",
        display_name: "Zen Flex",
        peak_rule: Some(flex_peak),
        day_kind_rule: Some(flex_day_kind),
    },
    PlanDescriptor {
        plan: TariffPlan::ZenWeekend,
        id: "zenweekend",
        display_name: "Zen Week-End",
        peak_rule: None,
        day_kind_rule: Some(weekend_day_kind),
    },
    PlanDescriptor {
        plan: TariffPlan::ZenWeekendHc,
        id: "zenweekendhc",
        display_name: "Zen Week-End + Heures Creuses",
        peak_rule: Some(daytime_peak),
        day_kind_rule: Some(weekend_day_kind),
    },
    PlanDescriptor {
        plan: TariffPlan::TotalStdFixe,
        id: "totalstdfixe",
        display_name: "Total Standard Fixe",
        peak_rule: None,
        day_kind_rule: None,
    },
    PlanDescriptor {
        plan: TariffPlan::TotalStdFixeHc,
        id: "totalstdfixehc",
        display_name: "Total Standard Fixe Heures Creuses",
        peak_rule: Some(daytime_peak),
        day_kind_rule: None,
    },
];

impl TariffPlan {
    pub const ALL: [TariffPlan; 8] = [
        TariffPlan::Base,
        TariffPlan::Hphc,
        TariffPlan::Tempo,
        TariffPlan::ZenFlex,
        TariffPlan::ZenWeekend,
        TariffPlan::ZenWeekendHc,
        TariffPlan::TotalStdFixe,
        TariffPlan::TotalStdFixeHc,
    ];

    pub fn descriptor(self) -> &'static PlanDescriptor {
        // PLANS is declared in enum order.
        &PLANS[self as usize]
    }

    pub fn id(self) -> &'static str {
        self.descriptor().id
    }

    pub fn display_name(self) -> &'static str {
        self.descriptor().display_name
    }
}

impl fmt::Display for TariffPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TariffPlan {
    type Err = LedgerError;

    fn from_str(s: &str) -> LedgerResult<Self> {
        PLANS
            .iter()
            .find(|d| d.id == s)
            .map(|d| d.plan)
            .ok_or_else(|| LedgerError::UnknownPlan { id: s.to_string() })
    }
}
