use super::{date_from_ymd, LedgerStore};
use crate::{error::LedgerResult, plan::TempoColor, types::iso_date};
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;

impl LedgerStore {
    // ── Tempo ─────────────────────────────────────────────────────

    /// Upsert known Tempo colors in one transaction.
    pub fn upsert_tempo_batch(&self, days: &[(NaiveDate, TempoColor)]) -> LedgerResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO tempo (year, month, day, tempo) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (date, color) in days {
                stmt.execute(params![date.year(), date.month(), date.day(), color.code()])?;
            }
        }
        tx.commit()?;
        Ok(days.len())
    }

    pub fn latest_tempo_date(&self) -> LedgerResult<Option<NaiveDate>> {
        let ymd: Option<(i32, u32, u32)> = self
            .conn
            .query_row(
                "SELECT year, month, day FROM tempo
                 ORDER BY year DESC, month DESC, day DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        ymd.map(|(y, m, d)| date_from_ymd(y, m, d)).transpose()
    }

    pub fn tempo_color(&self, date: NaiveDate) -> LedgerResult<Option<TempoColor>> {
        let code: Option<u8> = self
            .conn
            .query_row(
                "SELECT tempo FROM tempo WHERE date = ?1",
                params![iso_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(code.and_then(TempoColor::from_code))
    }

    /// Colors within an inclusive date range (or all of them).
    pub fn tempo_colors(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> LedgerResult<BTreeMap<NaiveDate, TempoColor>> {
        let (from, to) = match range {
            Some((from, to)) => (iso_date(from), iso_date(to)),
            None => ("0000-01-01".to_string(), "9999-12-31".to_string()),
        };
        let mut stmt = self.conn.prepare(
            "SELECT year, month, day, tempo FROM tempo WHERE date BETWEEN ?1 AND ?2",
        )?;
        let raw = stmt
            .query_map(params![from, to], |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u8>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut colors = BTreeMap::new();
        for (y, m, d, code) in raw {
            if let Some(color) = TempoColor::from_code(code) {
                colors.insert(date_from_ymd(y, m, d)?, color);
            }
        }
        Ok(colors)
    }

    pub fn tempo_count(&self) -> LedgerResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tempo", [], |row| row.get(0))?;
        Ok(count)
    }
}
