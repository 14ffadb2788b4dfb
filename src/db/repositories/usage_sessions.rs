use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::conversion_error,
    models::{DateKey, UsageSession},
};

const SESSION_COLUMNS: &str =
    "id, package_name, app_name, start_time, end_time, duration_millis, date";

fn row_to_usage_session(row: &Row) -> Result<UsageSession, rusqlite::Error> {
    let date: String = row.get("date")?;

    Ok(UsageSession {
        id: Some(row.get("id")?),
        package_name: row.get("package_name")?,
        app_name: row.get("app_name")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        duration_millis: row.get("duration_millis")?,
        date: DateKey::parse(&date).map_err(conversion_error)?,
    })
}

impl Database {
    pub async fn insert_usage_session(&self, session: &UsageSession) -> Result<i64> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO app_usage_sessions (package_name, app_name, start_time, end_time, duration_millis, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.package_name,
                    record.app_name,
                    record.start_time,
                    record.end_time,
                    record.duration_millis,
                    record.date.as_str(),
                ],
            )
            .with_context(|| "failed to insert usage session")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Sum of session durations for `package_name` on `date`, `None` when
    /// there are no sessions that day.
    pub async fn total_usage_on_date(
        &self,
        package_name: &str,
        date: &DateKey,
    ) -> Result<Option<i64>> {
        let package_name = package_name.to_string();
        let date = date.clone();
        self.execute(move |conn| {
            let total: Option<i64> = conn.query_row(
                "SELECT SUM(duration_millis) FROM app_usage_sessions
                 WHERE package_name = ?1 AND date = ?2",
                params![package_name, date.as_str()],
                |row| row.get(0),
            )?;
            Ok(total)
        })
        .await
    }

    pub async fn opens_on_date(&self, package_name: &str, date: &DateKey) -> Result<u32> {
        let package_name = package_name.to_string();
        let date = date.clone();
        self.execute(move |conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM app_usage_sessions
                 WHERE package_name = ?1 AND date = ?2",
                params![package_name, date.as_str()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    pub async fn average_session_millis(
        &self,
        package_name: &str,
        date: &DateKey,
    ) -> Result<Option<i64>> {
        let package_name = package_name.to_string();
        let date = date.clone();
        self.execute(move |conn| {
            let average: Option<f64> = conn.query_row(
                "SELECT AVG(duration_millis) FROM app_usage_sessions
                 WHERE package_name = ?1 AND date = ?2",
                params![package_name, date.as_str()],
                |row| row.get(0),
            )?;
            Ok(average.map(|value| value as i64))
        })
        .await
    }

    pub async fn sessions_for_app(&self, package_name: &str) -> Result<Vec<UsageSession>> {
        let package_name = package_name.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM app_usage_sessions
                 WHERE package_name = ?1
                 ORDER BY start_time DESC"
            ))?;

            let sessions = stmt
                .query_map(params![package_name], row_to_usage_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
    }

    pub async fn sessions_on_date(&self, date: &DateKey) -> Result<Vec<UsageSession>> {
        let date = date.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM app_usage_sessions
                 WHERE date = ?1
                 ORDER BY start_time DESC"
            ))?;

            let sessions = stmt
                .query_map(params![date.as_str()], row_to_usage_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
    }

    pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<UsageSession>> {
        let limit = limit as i64;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM app_usage_sessions
                 ORDER BY start_time DESC
                 LIMIT ?1"
            ))?;

            let sessions = stmt
                .query_map(params![limit], row_to_usage_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
    }

    /// Removes every session dated strictly before `cutoff`. Returns the number
    /// of rows deleted.
    pub async fn delete_sessions_before(&self, cutoff: &DateKey) -> Result<usize> {
        let cutoff = cutoff.clone();
        self.execute(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM app_usage_sessions WHERE date < ?1",
                    params![cutoff.as_str()],
                )
                .with_context(|| "failed to delete old usage sessions")?;
            Ok(deleted)
        })
        .await
    }
}
