use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{conversion_error, parse_reason, to_i64, to_u32},
    models::{DoomscrollEvent, LifetimeCounters},
};

fn row_to_doomscroll_event(row: &Row) -> Result<DoomscrollEvent, rusqlite::Error> {
    let scroll_count: i64 = row.get("scroll_count")?;
    let reason: String = row.get("detected_reason")?;

    Ok(DoomscrollEvent {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        package_name: row.get("package_name")?,
        scroll_duration_millis: row.get("scroll_duration_millis")?,
        scroll_count: to_u32(scroll_count, "scroll_count").map_err(conversion_error)?,
        detected_reason: parse_reason(&reason).map_err(conversion_error)?,
    })
}

impl Database {
    pub async fn lifetime_counters(&self) -> Result<LifetimeCounters> {
        self.execute(|conn| {
            let counters = conn.query_row(
                "SELECT total_interventions, total_time_saved_minutes
                 FROM lifetime_counters WHERE id = 1",
                [],
                |row| {
                    Ok(LifetimeCounters {
                        total_interventions: row.get(0)?,
                        total_time_saved_minutes: row.get(1)?,
                    })
                },
            )?;
            Ok(counters)
        })
        .await
    }

    pub async fn increment_interventions(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute(
                "UPDATE lifetime_counters
                 SET total_interventions = total_interventions + 1
                 WHERE id = 1",
                [],
            )
            .with_context(|| "failed to increment interventions")?;
            Ok(())
        })
        .await
    }

    pub async fn add_time_saved(&self, minutes: i64) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE lifetime_counters
                 SET total_time_saved_minutes = total_time_saved_minutes + ?1
                 WHERE id = 1",
                params![minutes],
            )
            .with_context(|| "failed to add time saved")?;
            Ok(())
        })
        .await
    }

    /// Bumps both lifetime counters and logs the event in one transaction.
    pub async fn record_intervention(
        &self,
        time_saved_minutes: i64,
        event: &DoomscrollEvent,
    ) -> Result<()> {
        let record = event.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "UPDATE lifetime_counters
                 SET total_interventions = total_interventions + 1,
                     total_time_saved_minutes = total_time_saved_minutes + ?1
                 WHERE id = 1",
                params![time_saved_minutes],
            )?;

            tx.execute(
                "INSERT INTO doomscroll_events (id, timestamp, package_name, scroll_duration_millis, scroll_count, detected_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.timestamp,
                    record.package_name,
                    record.scroll_duration_millis,
                    to_i64(record.scroll_count),
                    record.detected_reason.as_str(),
                ],
            )?;

            tx.commit().context("failed to commit intervention")?;
            Ok(())
        })
        .await
    }

    pub async fn doomscroll_events_since(&self, since_millis: i64) -> Result<Vec<DoomscrollEvent>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, package_name, scroll_duration_millis, scroll_count, detected_reason
                 FROM doomscroll_events
                 WHERE timestamp >= ?1
                 ORDER BY timestamp DESC",
            )?;

            let events = stmt
                .query_map(params![since_millis], row_to_doomscroll_event)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(events)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DetectionReason;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_counters_start_at_zero_and_accumulate() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("counters.sqlite3")).unwrap();

        assert_eq!(db.lifetime_counters().await.unwrap(), LifetimeCounters::default());

        db.increment_interventions().await.unwrap();
        db.add_time_saved(5).await.unwrap();

        let event = DoomscrollEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: 10_000,
            package_name: "com.instagram.android".into(),
            scroll_duration_millis: 9_000,
            scroll_count: 21,
            detected_reason: DetectionReason::RapidScroll,
        };
        db.record_intervention(5, &event).await.unwrap();

        let counters = db.lifetime_counters().await.unwrap();
        assert_eq!(counters.total_interventions, 2);
        assert_eq!(counters.total_time_saved_minutes, 10);

        let events = db.doomscroll_events_since(0).await.unwrap();
        assert_eq!(events, vec![event]);
        assert!(db.doomscroll_events_since(10_001).await.unwrap().is_empty());
    }
}
