use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{conversion_error, to_i64, to_u32},
    models::{DateKey, PackageUsage, ScrollSession},
};

fn row_to_scroll_session(row: &Row) -> Result<ScrollSession, rusqlite::Error> {
    let scroll_count: i64 = row.get("scroll_count")?;

    Ok(ScrollSession {
        id: Some(row.get("id")?),
        package_name: row.get("package_name")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        scroll_count: to_u32(scroll_count, "scroll_count").map_err(conversion_error)?,
    })
}

fn day_bounds(date: &DateKey) -> Result<(i64, i64)> {
    let start = date.start_of_day_millis()?;
    let next = DateKey::from_date(
        date.date()?
            .succ_opt()
            .ok_or_else(|| anyhow::anyhow!("no day after {date}"))?,
    );
    Ok((start, next.start_of_day_millis()?))
}

impl Database {
    pub async fn insert_scroll_session(&self, session: &ScrollSession) -> Result<i64> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO scroll_sessions (package_name, start_time, end_time, scroll_count)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.package_name,
                    record.start_time,
                    record.end_time,
                    to_i64(record.scroll_count),
                ],
            )
            .with_context(|| "failed to insert scroll session")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn scroll_sessions_since(&self, since_millis: i64) -> Result<Vec<ScrollSession>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, package_name, start_time, end_time, scroll_count
                 FROM scroll_sessions
                 WHERE start_time >= ?1
                 ORDER BY start_time DESC",
            )?;

            let sessions = stmt
                .query_map(params![since_millis], row_to_scroll_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
    }

    /// Scroll sessions started during the seven calendar days ending `today`.
    pub async fn weekly_scroll_sessions(&self, today: &DateKey) -> Result<Vec<ScrollSession>> {
        let since = today.days_before(6)?.start_of_day_millis()?;
        self.scroll_sessions_since(since).await
    }

    pub async fn total_scroll_millis_on_date(&self, date: &DateKey) -> Result<i64> {
        let (start, end) = day_bounds(date)?;
        self.execute(move |conn| {
            let total: Option<i64> = conn.query_row(
                "SELECT SUM(end_time - start_time) FROM scroll_sessions
                 WHERE start_time >= ?1 AND start_time < ?2",
                params![start, end],
                |row| row.get(0),
            )?;
            Ok(total.unwrap_or(0))
        })
        .await
    }

    pub async fn scroll_usage_by_package(&self, date: &DateKey) -> Result<Vec<PackageUsage>> {
        let (start, end) = day_bounds(date)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT package_name, SUM(end_time - start_time) AS total_duration
                 FROM scroll_sessions
                 WHERE start_time >= ?1 AND start_time < ?2
                 GROUP BY package_name
                 ORDER BY total_duration DESC",
            )?;

            let usage = stmt
                .query_map(params![start, end], |row| {
                    Ok(PackageUsage {
                        package_name: row.get("package_name")?,
                        total_duration_millis: row.get("total_duration")?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(usage)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scroll(package: &str, start: i64, duration: i64) -> ScrollSession {
        ScrollSession {
            id: None,
            package_name: package.into(),
            start_time: start,
            end_time: start + duration,
            scroll_count: 3,
        }
    }

    #[tokio::test]
    async fn test_usage_by_package_uses_calendar_day() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("scroll.sqlite3")).unwrap();

        let day = DateKey::parse("2024-05-02").unwrap();
        let midnight = day.start_of_day_millis().unwrap();

        db.insert_scroll_session(&scroll("com.a", midnight + 1_000, 30_000))
            .await
            .unwrap();
        db.insert_scroll_session(&scroll("com.b", midnight + 5_000, 90_000))
            .await
            .unwrap();
        // Late on the previous day: excluded despite being within 24h.
        db.insert_scroll_session(&scroll("com.a", midnight - 60_000, 10_000))
            .await
            .unwrap();

        let usage = db.scroll_usage_by_package(&day).await.unwrap();
        assert_eq!(
            usage,
            vec![
                PackageUsage {
                    package_name: "com.b".into(),
                    total_duration_millis: 90_000,
                },
                PackageUsage {
                    package_name: "com.a".into(),
                    total_duration_millis: 30_000,
                },
            ]
        );
        assert_eq!(db.total_scroll_millis_on_date(&day).await.unwrap(), 120_000);

        let weekly = db.weekly_scroll_sessions(&day).await.unwrap();
        assert_eq!(weekly.len(), 3);
        assert_eq!(weekly[0].package_name, "com.b");
    }

    #[tokio::test]
    async fn test_empty_day_totals_zero() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("scroll.sqlite3")).unwrap();
        let day = DateKey::parse("2024-05-02").unwrap();
        assert_eq!(db.total_scroll_millis_on_date(&day).await.unwrap(), 0);
        assert!(db.scroll_usage_by_package(&day).await.unwrap().is_empty());
    }
}
