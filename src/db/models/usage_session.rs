//! Usage history records: per-app foreground sessions and scroll sessions.

use serde::{Deserialize, Serialize};

use super::DateKey;

/// One closed foreground session of an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSession {
    pub id: Option<i64>,
    pub package_name: String,
    pub app_name: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_millis: i64,
    pub date: DateKey,
}

impl UsageSession {
    /// Builds a session for `[start_time, end_time)`, or `None` when the
    /// duration is not positive. Such sessions are never persisted.
    pub fn from_bounds(
        package_name: impl Into<String>,
        app_name: impl Into<String>,
        start_time: i64,
        end_time: i64,
    ) -> Option<Self> {
        let duration_millis = end_time.checked_sub(start_time)?;
        if duration_millis <= 0 {
            return None;
        }

        Some(Self {
            id: None,
            package_name: package_name.into(),
            app_name: app_name.into(),
            start_time,
            end_time,
            duration_millis,
            date: DateKey::from_millis(start_time),
        })
    }
}

/// Time spent in a monitored app between gaining and losing foreground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollSession {
    pub id: Option<i64>,
    pub package_name: String,
    pub start_time: i64,
    pub end_time: i64,
    pub scroll_count: u32,
}

impl ScrollSession {
    pub fn duration_millis(&self) -> i64 {
        self.end_time.saturating_sub(self.start_time).max(0)
    }
}

/// Aggregated time per package, sorted by the query that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageUsage {
    pub package_name: String,
    pub total_duration_millis: i64,
}
