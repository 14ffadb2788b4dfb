//! Time-Limit Evaluator.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::db::{Database, DateKey, TimeLimit};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Where an app stands against its daily limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum BlockStatus {
    NotLimited,
    Active {
        used_minutes: i64,
        remaining_minutes: i64,
    },
    Blocked {
        used_minutes: i64,
        remaining_cooldown_minutes: i64,
    },
}

/// Classifies today's usage against an optional limit.
pub fn classify(limit: Option<&TimeLimit>, used_millis: i64) -> BlockStatus {
    let Some(limit) = limit.filter(|limit| limit.is_enabled) else {
        return BlockStatus::NotLimited;
    };

    let used_minutes = used_millis.max(0) / MILLIS_PER_MINUTE;
    if used_minutes >= limit.daily_limit_minutes {
        BlockStatus::Blocked {
            used_minutes,
            remaining_cooldown_minutes: limit.cooldown_minutes,
        }
    } else {
        BlockStatus::Active {
            used_minutes,
            remaining_minutes: limit.daily_limit_minutes - used_minutes,
        }
    }
}

#[derive(Clone)]
pub struct TimeLimitEvaluator {
    db: Database,
}

impl TimeLimitEvaluator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Never fails: a store error is logged and the app is treated as
    /// `NotLimited` for this cycle.
    pub async fn evaluate(&self, package_name: &str, today: &DateKey) -> BlockStatus {
        match self.try_evaluate(package_name, today).await {
            Ok(status) => {
                log_debug!("Block status for {package_name} on {today}: {status:?}");
                status
            }
            Err(err) => {
                log_warn!("Failed to check time limit for {package_name}, allowing: {err:?}");
                BlockStatus::NotLimited
            }
        }
    }

    async fn try_evaluate(&self, package_name: &str, today: &DateKey) -> Result<BlockStatus> {
        let limit = self
            .db
            .time_limit_for(package_name)
            .await
            .context("failed to load time limit")?;

        let Some(limit) = limit.filter(|limit| limit.is_enabled) else {
            return Ok(BlockStatus::NotLimited);
        };

        let used_millis = self
            .db
            .total_usage_on_date(package_name, today)
            .await
            .context("failed to load today's usage")?
            .unwrap_or(0);

        Ok(classify(Some(&limit), used_millis))
    }
}
