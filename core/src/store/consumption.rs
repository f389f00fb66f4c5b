use super::{date_from_ymd, ConsumptionSlice, LedgerStore};
use crate::{error::LedgerResult, types::iso_date};
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, OptionalExtension};

impl LedgerStore {
    // ── Consumption ───────────────────────────────────────────────

    /// Upsert a window of slices in one transaction. Existing keys are
    /// overwritten. Returns the number of rows written.
    pub fn upsert_consumption_batch(&self, slices: &[ConsumptionSlice]) -> LedgerResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO consumption (year, month, day, slice, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for s in slices {
                stmt.execute(params![
                    s.date.year(),
                    s.date.month(),
                    s.date.day(),
                    s.slice,
                    s.value,
                ])?;
            }
        }
        tx.commit()?;
        Ok(slices.len())
    }

    /// Most recent day that has at least one slice.
    pub fn latest_consumption_date(&self) -> LedgerResult<Option<NaiveDate>> {
        let ymd: Option<(i32, u32, u32)> = self
            .conn
            .query_row(
                "SELECT year, month, day FROM consumption
                 ORDER BY year DESC, month DESC, day DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        ymd.map(|(y, m, d)| date_from_ymd(y, m, d)).transpose()
    }

    /// All slices, optionally restricted to an inclusive date range,
    /// in chronological order.
    pub fn consumption_slices(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> LedgerResult<Vec<ConsumptionSlice>> {
        let (from, to) = match range {
            Some((from, to)) => (iso_date(from), iso_date(to)),
            None => ("0000-01-01".to_string(), "9999-12-31".to_string()),
        };
        let mut stmt = self.conn.prepare(
            "SELECT year, month, day, slice, value FROM consumption
             WHERE date BETWEEN ?1 AND ?2
             ORDER BY year, month, day, slice",
        )?;
        let raw = stmt
            .query_map(params![from, to], |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u8>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(y, m, d, slice, value)| -> LedgerResult<ConsumptionSlice> {
                Ok(ConsumptionSlice { date: date_from_ymd(y, m, d)?, slice, value })
            })
            .collect()
    }

    pub fn consumption_value(&self, date: NaiveDate, slice: u8) -> LedgerResult<Option<i64>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM consumption
                 WHERE year = ?1 AND month = ?2 AND day = ?3 AND slice = ?4",
                params![date.year(), date.month(), date.day(), slice],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Number of stored slices (for tests and summaries).
    pub fn consumption_count(&self) -> LedgerResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM consumption", [], |row| row.get(0))?;
        Ok(count)
    }
}
