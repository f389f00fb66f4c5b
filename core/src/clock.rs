//! Time source for the sync pipelines and rate refresh.
//!
//! Everything that needs "today" asks the clock. Tests pin it to a fixed
//! instant so window arithmetic is reproducible.

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", content = "at", rename_all = "snake_case")]
pub enum SyncClock {
    System,
    Fixed(NaiveDateTime),
}

impl SyncClock {
    /// A clock frozen at midnight of `date`.
    pub fn fixed_on(date: NaiveDate) -> Self {
        SyncClock::Fixed(date.and_time(chrono::NaiveTime::MIN))
    }

    pub fn now(&self) -> NaiveDateTime {
        match self {
            SyncClock::System   => Local::now().naive_local(),
            SyncClock::Fixed(t) => *t,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

impl Default for SyncClock {
    fn default() -> Self {
        SyncClock::System
    }
}
