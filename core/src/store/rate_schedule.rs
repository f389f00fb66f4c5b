use super::{parse_iso_date, LedgerStore, RateScheduleRow};
use crate::{
    error::LedgerResult,
    plan::TariffPlan,
    types::iso_date,
};
use rusqlite::params;

// `end` is an SQL keyword and stays quoted.
const SELECT_RATE: &str = r#"SELECT plan_id, start, power, subscription, day_kind, kwh_hp, kwh_hc, "end"
    FROM rate_schedule"#;

type RawRateRow = (String, String, u32, i64, u8, i64, i64, String);

fn raw_to_row(raw: RawRateRow) -> LedgerResult<RateScheduleRow> {
    let (plan, start, power, subscription, day_kind, peak_price, offpeak_price, end) = raw;
    Ok(RateScheduleRow {
        plan: plan.parse()?,
        start: parse_iso_date(&start)?,
        power,
        subscription,
        day_kind,
        peak_price,
        offpeak_price,
        end: parse_iso_date(&end)?,
    })
}

impl LedgerStore {
    // ── Rate schedule ─────────────────────────────────────────────

    /// Replace-on-conflict upsert keyed by (plan, power, day_kind, start).
    pub fn upsert_rate_rows(&self, rows: &[RateScheduleRow]) -> LedgerResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT OR REPLACE INTO rate_schedule
                    (plan_id, start, power, subscription, day_kind, kwh_hp, kwh_hc, "end")
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )?;
            for r in rows {
                stmt.execute(params![
                    r.plan.id(),
                    iso_date(r.start),
                    r.power,
                    r.subscription,
                    r.day_kind,
                    r.peak_price,
                    r.offpeak_price,
                    iso_date(r.end),
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Every row, optionally for one plan, ordered by
    /// (plan, power, day_kind, start).
    pub fn rate_rows(&self, plan: Option<TariffPlan>) -> LedgerResult<Vec<RateScheduleRow>> {
        let sql = format!(
            "{SELECT_RATE} WHERE (?1 IS NULL OR plan_id = ?1)
             ORDER BY plan_id, power, day_kind, start"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![plan.map(TariffPlan::id)], read_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(raw_to_row).collect()
    }

    /// All rows for one contracted power tier, across plans.
    pub fn rate_rows_for_power(&self, power: u32) -> LedgerResult<Vec<RateScheduleRow>> {
        let sql = format!("{SELECT_RATE} WHERE power = ?1 ORDER BY plan_id, day_kind, start");
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![power], read_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(raw_to_row).collect()
    }

    pub fn rate_row_count(&self) -> LedgerResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM rate_schedule", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRateRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}
