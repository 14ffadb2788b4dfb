use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    models::{time_limit::validation, TimeLimit},
};

const LIMIT_COLUMNS: &str = "package_name, app_name, daily_limit_minutes, cooldown_minutes, is_enabled, created_at, updated_at";

fn row_to_time_limit(row: &Row) -> Result<TimeLimit, rusqlite::Error> {
    Ok(TimeLimit {
        package_name: row.get("package_name")?,
        app_name: row.get("app_name")?,
        daily_limit_minutes: row.get("daily_limit_minutes")?,
        cooldown_minutes: row.get("cooldown_minutes")?,
        is_enabled: row.get("is_enabled")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Database {
    /// Get the time limit configured for a package, if any
    pub async fn time_limit_for(&self, package_name: &str) -> Result<Option<TimeLimit>> {
        let package_name = package_name.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LIMIT_COLUMNS} FROM app_time_limits WHERE package_name = ?1"
            ))?;

            let result = stmt
                .query_row(params![package_name], row_to_time_limit)
                .optional()?;

            Ok(result)
        })
        .await
    }

    pub async fn all_time_limits(&self) -> Result<Vec<TimeLimit>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LIMIT_COLUMNS} FROM app_time_limits ORDER BY app_name COLLATE NOCASE"
            ))?;

            let limits = stmt
                .query_map([], row_to_time_limit)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(limits)
        })
        .await
    }

    pub async fn enabled_time_limits(&self) -> Result<Vec<TimeLimit>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LIMIT_COLUMNS} FROM app_time_limits
                 WHERE is_enabled = 1
                 ORDER BY app_name COLLATE NOCASE"
            ))?;

            let limits = stmt
                .query_map([], row_to_time_limit)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(limits)
        })
        .await
    }

    /// Insert or replace the limit for a package. `created_at` survives updates.
    pub async fn upsert_time_limit(&self, mut limit: TimeLimit) -> Result<TimeLimit> {
        validation::validate_time_limit(&limit)?;

        let now = Utc::now().to_rfc3339();
        limit.updated_at = now.clone();
        if limit.created_at.is_empty() {
            limit.created_at = now;
        }

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO app_time_limits (package_name, app_name, daily_limit_minutes, cooldown_minutes, is_enabled, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(package_name) DO UPDATE SET
                     app_name = excluded.app_name,
                     daily_limit_minutes = excluded.daily_limit_minutes,
                     cooldown_minutes = excluded.cooldown_minutes,
                     is_enabled = excluded.is_enabled,
                     updated_at = excluded.updated_at",
                params![
                    limit.package_name,
                    limit.app_name,
                    limit.daily_limit_minutes,
                    limit.cooldown_minutes,
                    limit.is_enabled,
                    limit.created_at,
                    limit.updated_at,
                ],
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {LIMIT_COLUMNS} FROM app_time_limits WHERE package_name = ?1"
            ))?;
            let stored = stmt.query_row(params![limit.package_name], row_to_time_limit)?;

            Ok(stored)
        })
        .await
    }

    pub async fn set_time_limit_enabled(&self, package_name: &str, enabled: bool) -> Result<()> {
        let package_name = package_name.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE app_time_limits
                 SET is_enabled = ?1,
                     updated_at = ?2
                 WHERE package_name = ?3",
                params![enabled, Utc::now().to_rfc3339(), package_name],
            )?;

            if rows_affected == 0 {
                bail!("No time limit configured for {package_name}");
            }

            Ok(())
        })
        .await
    }

    pub async fn delete_time_limit(&self, package_name: &str) -> Result<()> {
        let package_name = package_name.to_string();
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM app_time_limits WHERE package_name = ?1",
                params![package_name],
            )?;
            Ok(())
        })
        .await
    }
}
