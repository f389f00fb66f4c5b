//! Key/value settings: meter contract cache, rate feed refresh stamps.

use super::LedgerStore;
use crate::error::LedgerResult;
use rusqlite::{params, OptionalExtension};

impl LedgerStore {
    pub fn setting(&self, key: &str) -> LedgerResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put_setting(&self, key: &str, value: &str) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
