//! Pricing aggregation: every stored slice, under every requested plan.
//!
//! For each slice and plan:
//!   1. peak flag from the plan's hour rule (no rule = single price);
//!   2. day-kind from the plan's day rule (0 when the plan has none);
//!   3. the rate row of (plan, contracted power, day-kind) whose validity
//!      interval contains the slice date; none means `Cost::Unknown`;
//!   4. price × Wh plus the annual subscription spread evenly over the
//!      48 slices of every day of the calendar month.
//!
//! Amounts are integers in 1e-7 €. Unknown costs are never replaced by a
//! neighbouring rate and absorb every sum they enter.

use crate::{
    error::LedgerResult,
    plan::{PlanDescriptor, TariffPlan, TempoCalendar},
    store::{ConsumptionSlice, LedgerStore, RateScheduleRow},
    types::{Cost, MicroCost, SLICES_PER_DAY},
};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Subscription fees are 2-digit fixed point; prices × Wh are 1e-7 €.
const SUBSCRIPTION_TO_MICRO: i64 = 100_000;

#[derive(Clone, Copy)]
pub enum Granularity {
    Slice,
    Day,
    Month,
    /// Caller-supplied grouping key per slice.
    Custom(fn(&ConsumptionSlice) -> String),
}

impl std::fmt::Debug for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Slice     => f.write_str("Slice"),
            Granularity::Day       => f.write_str("Day"),
            Granularity::Month     => f.write_str("Month"),
            Granularity::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl Granularity {
    fn key(&self, slice: &ConsumptionSlice) -> String {
        match self {
            Granularity::Slice => {
                let minutes = u32::from(slice.slice) * 30;
                format!("{} {:02}:{:02}", slice.date.format("%Y-%m-%d"), minutes / 60, minutes % 60)
            }
            Granularity::Day => slice.date.format("%Y-%m-%d").to_string(),
            Granularity::Month => slice.date.format("%Y-%m").to_string(),
            Granularity::Custom(f) => f(slice),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CostQuery {
    pub plans:       Vec<TariffPlan>,
    pub granularity: Granularity,
    /// Inclusive date filter.
    pub range:       Option<(NaiveDate, NaiveDate)>,
    pub with_total:  bool,
}

impl CostQuery {
    pub fn new(plans: &[TariffPlan], granularity: Granularity) -> Self {
        Self { plans: plans.to_vec(), granularity, range: None, with_total: false }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.range = Some((from, to));
        self
    }

    pub fn with_total(mut self) -> Self {
        self.with_total = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostRow {
    pub key:       String,
    pub energy_wh: i64,
    pub costs:     BTreeMap<TariffPlan, Cost>,
}

impl CostRow {
    fn empty(key: String, plans: &[TariffPlan]) -> Self {
        Self {
            key,
            energy_wh: 0,
            costs: plans.iter().map(|p| (*p, Cost::ZERO)).collect(),
        }
    }

    pub fn cost(&self, plan: TariffPlan) -> Cost {
        self.costs.get(&plan).copied().unwrap_or(Cost::Unknown)
    }

    /// Relative difference of each plan against `reference`
    /// (`-0.1` = 10 % cheaper). `None` when either side is unknown or the
    /// reference is zero.
    pub fn relative_to(&self, reference: TariffPlan) -> BTreeMap<TariffPlan, Option<f64>> {
        let base = self.cost(reference).known();
        self.costs
            .iter()
            .map(|(plan, cost)| {
                let diff = match (cost.known(), base) {
                    (Some(c), Some(b)) if b != 0 => Some((c - b) as f64 / b as f64),
                    _ => None,
                };
                (*plan, diff)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostTable {
    pub plans: Vec<TariffPlan>,
    pub rows:  Vec<CostRow>,
    pub total: Option<CostRow>,
}

impl CostTable {
    pub fn row(&self, key: &str) -> Option<&CostRow> {
        self.rows.iter().find(|r| r.key == key)
    }
}

/// Rate rows of one power tier, indexed by (plan, day_kind).
pub struct RateBook {
    schedules: HashMap<(TariffPlan, u8), Vec<RateScheduleRow>>,
}

impl RateBook {
    pub fn new(rows: Vec<RateScheduleRow>) -> Self {
        let mut schedules: HashMap<(TariffPlan, u8), Vec<RateScheduleRow>> = HashMap::new();
        for row in rows {
            schedules.entry((row.plan, row.day_kind)).or_default().push(row);
        }
        for schedule in schedules.values_mut() {
            schedule.sort_by_key(|r| r.start);
        }
        Self { schedules }
    }

    /// Row in force on `date`. If a malformed schedule overlaps, the most
    /// recently started row wins.
    pub fn resolve(&self, plan: TariffPlan, day_kind: u8, date: NaiveDate) -> Option<&RateScheduleRow> {
        self.schedules
            .get(&(plan, day_kind))?
            .iter()
            .rev()
            .find(|r| r.covers(date))
    }
}

pub fn days_in_month(date: NaiveDate) -> i64 {
    let first = date.with_day(1).unwrap_or(date);
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next.map(|n| (n - first).num_days()).unwrap_or(31)
}

/// Cost of `value` Wh under `rate`, including the slice's share of the
/// subscription. Integer division at each step.
pub fn slice_cost(rate: &RateScheduleRow, peak: bool, value: i64, days_in_month: i64) -> MicroCost {
    let energy = rate.price(peak) * value;
    let subscription = rate.subscription * SUBSCRIPTION_TO_MICRO
        / 12
        / days_in_month
        / i64::from(SLICES_PER_DAY);
    energy + subscription
}

/// Price one slice under one plan.
pub fn price_slice(
    descriptor: &PlanDescriptor,
    slice: &ConsumptionSlice,
    rates: &RateBook,
    tempo: &dyn TempoCalendar,
) -> Cost {
    let hour = slice.hour();
    let peak = descriptor.is_peak(hour).unwrap_or(false);
    let Some(day_kind) = descriptor.day_kind(slice.date, hour, tempo) else {
        return Cost::Unknown;
    };
    match rates.resolve(descriptor.plan, day_kind, slice.date) {
        Some(rate) => Cost::Known(slice_cost(rate, peak, slice.value, days_in_month(slice.date))),
        None => Cost::Unknown,
    }
}

pub struct PricingEngine<'s> {
    store:     &'s LedgerStore,
    power_kva: u32,
}

impl<'s> PricingEngine<'s> {
    pub fn new(store: &'s LedgerStore, power_kva: u32) -> Self {
        Self { store, power_kva }
    }

    pub fn compute(&self, query: &CostQuery) -> LedgerResult<CostTable> {
        let slices = self.store.consumption_slices(query.range)?;
        // Night slices of the first day are priced on the previous tariff day.
        let tempo_range = query.range.map(|(from, to)| (from - Duration::days(1), to));
        let tempo = self.store.tempo_colors(tempo_range)?;
        let rates = RateBook::new(self.store.rate_rows_for_power(self.power_kva)?);

        let mut groups: BTreeMap<String, CostRow> = BTreeMap::new();
        for slice in &slices {
            let key = query.granularity.key(slice);
            let row = groups
                .entry(key.clone())
                .or_insert_with(|| CostRow::empty(key, &query.plans));
            row.energy_wh += slice.value;
            for plan in &query.plans {
                let cost = price_slice(plan.descriptor(), slice, &rates, &tempo);
                *row.costs.entry(*plan).or_default() += cost;
            }
        }

        let rows: Vec<CostRow> = groups.into_values().collect();
        let total = query.with_total.then(|| {
            let mut total = CostRow::empty("total".into(), &query.plans);
            for row in &rows {
                total.energy_wh += row.energy_wh;
                for (plan, cost) in &row.costs {
                    *total.costs.entry(*plan).or_default() += *cost;
                }
            }
            total
        });

        let unknown = rows
            .iter()
            .flat_map(|r| r.costs.iter())
            .filter(|(_, c)| c.is_unknown())
            .count();
        log::debug!(
            "pricing: {} slices into {} rows, {unknown} unknown cells",
            slices.len(),
            rows.len()
        );

        Ok(CostTable { plans: query.plans.clone(), rows, total })
    }

    pub fn monthly(&self, plans: &[TariffPlan]) -> LedgerResult<CostTable> {
        self.compute(&CostQuery::new(plans, Granularity::Month).with_total())
    }

    pub fn daily(&self, plans: &[TariffPlan], from: NaiveDate, to: NaiveDate) -> LedgerResult<CostTable> {
        self.compute(&CostQuery::new(plans, Granularity::Day).between(from, to))
    }
}
