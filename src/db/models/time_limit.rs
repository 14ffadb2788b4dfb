//! Per-app daily time limits.
//!
//! Limits are created and edited by the management surface; the monitoring
//! engine only reads them. An app without a row is unrestricted.

use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLimit {
    pub package_name: String,
    pub app_name: String,
    pub daily_limit_minutes: i64,
    pub cooldown_minutes: i64,
    pub is_enabled: bool,
    pub created_at: String, // ISO 8601 datetime
    pub updated_at: String, // ISO 8601 datetime
}

impl TimeLimit {
    pub fn new(
        package_name: impl Into<String>,
        app_name: impl Into<String>,
        daily_limit_minutes: i64,
        cooldown_minutes: i64,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            package_name: package_name.into(),
            app_name: app_name.into(),
            daily_limit_minutes,
            cooldown_minutes,
            is_enabled: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

pub mod validation {
    use super::TimeLimit;
    use anyhow::{bail, Result};

    const MAX_DAILY_LIMIT_MINUTES: i64 = 24 * 60;

    pub fn validate_time_limit(limit: &TimeLimit) -> Result<()> {
        if limit.package_name.trim().is_empty() {
            bail!("package_name is required");
        }

        if limit.daily_limit_minutes <= 0 || limit.daily_limit_minutes > MAX_DAILY_LIMIT_MINUTES {
            bail!("Invalid daily limit. Must be between 1 and {MAX_DAILY_LIMIT_MINUTES} minutes");
        }

        if limit.cooldown_minutes < 0 {
            bail!("Invalid cooldown. Must not be negative");
        }

        Ok(())
    }
}
