//! Calendar-day grouping key for usage records.
//!
//! Daily totals are grouped by the local calendar day of a session's start
//! time, formatted `YYYY-MM-DD`. Every "today" in the crate goes through this
//! type so the grouping stays consistent across the engine and statistics.

use std::fmt;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest stretch of wall-clock time a clock change can skip.
const MAX_GAP_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(String);

impl DateKey {
    /// Local calendar day containing the given epoch-millisecond timestamp.
    pub fn from_millis(millis: i64) -> Self {
        let utc: DateTime<Utc> = DateTime::from_timestamp_millis(millis).unwrap_or_default();
        Self::from_date(utc.with_timezone(&Local).date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(DATE_FORMAT).to_string())
    }

    pub fn parse(value: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(value, DATE_FORMAT)
            .with_context(|| format!("invalid date key '{value}'"))?;
        Ok(Self::from_date(date))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&self.0, DATE_FORMAT)
            .with_context(|| format!("invalid date key '{}'", self.0))
    }

    pub fn days_before(&self, days: u64) -> Result<Self> {
        let date = self
            .date()?
            .checked_sub_days(Days::new(days))
            .ok_or_else(|| anyhow!("date key {} minus {days} days is out of range", self.0))?;
        Ok(Self::from_date(date))
    }

    /// Epoch milliseconds of local midnight at the start of this day.
    pub fn start_of_day_millis(&self) -> Result<i64> {
        let midnight = self
            .date()?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("no midnight for date key {}", self.0))?;
        let start = first_instant_from(&Local, midnight)
            .ok_or_else(|| anyhow!("no local start of day for date key {}", self.0))?;
        Ok(start.timestamp_millis())
    }
}

/// First instant at or after the wall-clock time `naive` in `tz`. A time
/// skipped by a forward clock change resolves to the end of the gap.
fn first_instant_from<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    (0..=MAX_GAP_MINUTES).find_map(|minutes| {
        let candidate = naive.checked_add_signed(TimeDelta::try_minutes(minutes)?)?;
        tz.from_local_datetime(&candidate).earliest()
    })
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
