//! Tariff rate ingestion into the rate schedule store.
//!
//! Two sources: machine-readable sheets pulled through a `RateFeedProvider`
//! (refreshed when older than the configured interval) and the literal
//! historical tables in `historical`. Both upsert by
//! (plan, power, day_kind, start) and can be re-run freely.

pub mod feed;
pub mod historical;

use crate::{
    clock::SyncClock,
    config::RateFeedConfig,
    error::LedgerResult,
    plan::TariffPlan,
    providers::{ProviderError, RateFeedProvider},
    store::{LedgerStore, RateScheduleRow},
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// The later interval starts on or before the earlier one ends.
    Overlap,
    /// Days between the two intervals have no rate.
    Gap,
}

/// A discontinuity between two consecutive rows of one
/// (plan, power, day_kind) schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleIssue {
    pub plan:         TariffPlan,
    pub power:        u32,
    pub day_kind:     u8,
    pub kind:         IssueKind,
    pub earlier_end:  NaiveDate,
    pub later_start:  NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub refreshed:    Vec<TariffPlan>,
    pub still_fresh:  Vec<TariffPlan>,
    pub failed:       Vec<(TariffPlan, ProviderError)>,
    /// Feeds for plans with day-kind dependent rates, never fetched.
    pub rejected:     Vec<TariffPlan>,
    pub rows_written: usize,
    pub issues:       Vec<ScheduleIssue>,
}

pub struct RateIngestor<'s> {
    store: &'s LedgerStore,
    clock: SyncClock,
}

impl<'s> RateIngestor<'s> {
    pub fn new(store: &'s LedgerStore, clock: SyncClock) -> Self {
        Self { store, clock }
    }

    /// Settings key holding the last refresh time of a plan's feed.
    pub fn stamp_key(plan: TariffPlan) -> String {
        format!("tarif_{}", plan.id())
    }

    /// Pull every configured feed whose last refresh is older than
    /// `refresh_hours`. A failing feed is logged and left for next time.
    pub fn refresh_feeds(
        &self,
        provider: &dyn RateFeedProvider,
        feeds: &[RateFeedConfig],
        refresh_hours: i64,
    ) -> LedgerResult<IngestReport> {
        let mut report = IngestReport::default();
        let now = self.clock.now();

        for feed in feeds {
            if feed.plan.descriptor().has_day_kind_rule() {
                log::warn!(
                    "rates: ignoring feed {} for {}, its rates depend on the day kind",
                    feed.resource_id,
                    feed.plan
                );
                report.rejected.push(feed.plan);
                continue;
            }
            if !self.is_stale(feed.plan, now, refresh_hours)? {
                log::debug!("rates: {} feed is fresh, skipping", feed.plan);
                report.still_fresh.push(feed.plan);
                continue;
            }

            let content = match provider.resource_content(&feed.resource_id) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("rates: {} feed {} failed: {e}", feed.plan, feed.resource_id);
                    report.failed.push((feed.plan, e));
                    continue;
                }
            };

            let rows = feed::parse_rate_feed(feed.plan, &content)?;
            report.rows_written += self.store.upsert_rate_rows(&rows)?;
            self.store
                .put_setting(&Self::stamp_key(feed.plan), &now.format(STAMP_FORMAT).to_string())?;
            log::info!("rates: updated tariff {} ({} rows)", feed.plan, rows.len());
            report.refreshed.push(feed.plan);
        }

        report.issues = self.validate_schedule()?;
        Ok(report)
    }

    fn is_stale(&self, plan: TariffPlan, now: NaiveDateTime, refresh_hours: i64) -> LedgerResult<bool> {
        let Some(stamp) = self.store.setting(&Self::stamp_key(plan))? else {
            return Ok(true);
        };
        // Older databases stored a bare date.
        let last = NaiveDateTime::parse_from_str(&stamp, STAMP_FORMAT)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(&stamp, "%Y-%m-%d")
                    .ok()
                    .map(|d| d.and_time(chrono::NaiveTime::MIN))
            });
        Ok(match last {
            Some(last) => now - last >= Duration::hours(refresh_hours),
            None => true,
        })
    }

    /// Upsert every literal historical table.
    pub fn seed_historical(&self) -> LedgerResult<usize> {
        let mut written = 0;
        for table in historical::HISTORICAL_TABLES {
            let rows = historical::parse_historical_table(table.plan, table.entries)?;
            written += self.store.upsert_rate_rows(&rows)?;
        }
        log::info!("rates: seeded {written} historical rate rows");
        self.validate_schedule()?;
        Ok(written)
    }

    /// Check that each (plan, power, day_kind) schedule is contiguous.
    /// Overlaps are logged as warnings, gaps at info level.
    pub fn validate_schedule(&self) -> LedgerResult<Vec<ScheduleIssue>> {
        let issues = schedule_issues(&self.store.rate_rows(None)?);
        for issue in &issues {
            match issue.kind {
                IssueKind::Overlap => log::warn!(
                    "rates: overlapping {} rates for {} kVA day-kind {}: {} ends after {} starts",
                    issue.plan, issue.power, issue.day_kind, issue.earlier_end, issue.later_start
                ),
                IssueKind::Gap => log::info!(
                    "rates: no {} rate for {} kVA day-kind {} between {} and {}",
                    issue.plan, issue.power, issue.day_kind, issue.earlier_end, issue.later_start
                ),
            }
        }
        Ok(issues)
    }
}

/// Contiguity check over an arbitrary set of rows.
pub fn schedule_issues(rows: &[RateScheduleRow]) -> Vec<ScheduleIssue> {
    let mut schedules: BTreeMap<(TariffPlan, u32, u8), Vec<&RateScheduleRow>> = BTreeMap::new();
    for row in rows {
        schedules.entry((row.plan, row.power, row.day_kind)).or_default().push(row);
    }

    let mut issues = Vec::new();
    for ((plan, power, day_kind), mut schedule) in schedules {
        schedule.sort_by_key(|r| r.start);
        for pair in schedule.windows(2) {
            let (earlier, later) = (pair[0], pair[1]);
            let expected_start = earlier.end.succ_opt();
            let kind = if later.start <= earlier.end {
                IssueKind::Overlap
            } else if Some(later.start) != expected_start {
                IssueKind::Gap
            } else {
                continue;
            };
            issues.push(ScheduleIssue {
                plan,
                power,
                day_kind,
                kind,
                earlier_end: earlier.end,
                later_start: later.start,
            });
        }
    }
    issues
}
