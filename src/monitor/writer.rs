//! Usage Log Writer: persists closed sessions from a dedicated task so the
//! event path only ever enqueues.

use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Context, Result};
use tokio::{
    runtime::Handle,
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, DateKey, ScrollSession, UsageSession};

use super::session::{ScrollSessionClosed, SessionClosed};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Maps a package identifier to the label shown to the user.
pub trait AppNameResolver: Send + Sync {
    fn display_name(&self, package_name: &str) -> Result<String>;
}

/// Resolver backed by a fixed table, typically `MonitorConfig::app_names`.
#[derive(Debug, Clone, Default)]
pub struct KnownAppNames(HashMap<String, String>);

impl KnownAppNames {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self(names)
    }
}

impl AppNameResolver for KnownAppNames {
    fn display_name(&self, package_name: &str) -> Result<String> {
        self.0
            .get(package_name)
            .cloned()
            .ok_or_else(|| anyhow!("no display name known for {package_name}"))
    }
}

enum WriteTask {
    Session(SessionClosed),
    ScrollSession(ScrollSessionClosed),
}

pub struct UsageLogWriter {
    sender: mpsc::Sender<WriteTask>,
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
    db: Database,
}

impl UsageLogWriter {
    pub fn spawn(
        db: Database,
        resolver: Arc<dyn AppNameResolver>,
        capacity: usize,
        runtime: &Handle,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let cancel_token = CancellationToken::new();
        let handle = runtime.spawn(writer_loop(
            db.clone(),
            resolver,
            receiver,
            cancel_token.clone(),
        ));

        Self {
            sender,
            handle,
            cancel_token,
            db,
        }
    }

    /// Enqueues a closed session. Non-positive durations are dropped here.
    pub fn log_session(&self, fact: SessionClosed) {
        if fact.end_time.saturating_sub(fact.start_time) <= 0 {
            log_debug!("Dropping empty session for {}", fact.package_name);
            return;
        }
        self.enqueue(WriteTask::Session(fact));
    }

    pub fn log_scroll_session(&self, fact: ScrollSessionClosed) {
        self.enqueue(WriteTask::ScrollSession(fact));
    }

    /// Removes usage sessions dated strictly before `cutoff`. Scheduling is
    /// left to the caller.
    pub async fn delete_old_sessions(&self, cutoff: &DateKey) -> Result<usize> {
        let deleted = self.db.delete_sessions_before(cutoff).await?;
        log_info!("Deleted {deleted} usage sessions before {cutoff}");
        Ok(deleted)
    }

    /// Stops accepting records and waits for the queued ones to be written.
    pub async fn shutdown(self) {
        let Self { sender, handle, .. } = self;
        drop(sender);
        if let Err(err) = handle.await {
            log_error!("Usage log writer task failed to join: {err:?}");
        }
    }

    /// Stops the writer immediately; queued records are lost.
    pub async fn abort(self) {
        self.cancel_token.cancel();
        if let Err(err) = self.handle.await {
            log_error!("Usage log writer task failed to join: {err:?}");
        }
    }

    fn enqueue(&self, task: WriteTask) {
        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                log_error!("Usage log queue full, dropping record for {}", task.package_name());
            }
            Err(TrySendError::Closed(task)) => {
                log_warn!("Usage log writer stopped, dropping record for {}", task.package_name());
            }
        }
    }
}

impl WriteTask {
    fn package_name(&self) -> &str {
        match self {
            WriteTask::Session(fact) => &fact.package_name,
            WriteTask::ScrollSession(fact) => &fact.package_name,
        }
    }
}

async fn writer_loop(
    db: Database,
    resolver: Arc<dyn AppNameResolver>,
    mut receiver: mpsc::Receiver<WriteTask>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("Usage log writer cancelled");
                break;
            }
            task = receiver.recv() => {
                let Some(task) = task else {
                    log_info!("Usage log writer drained");
                    break;
                };
                let package_name = task.package_name().to_string();
                if let Err(err) = write(&db, resolver.as_ref(), task).await {
                    log_error!("Failed to persist usage record for {package_name}: {err:?}");
                }
            }
        }
    }
}

async fn write(db: &Database, resolver: &dyn AppNameResolver, task: WriteTask) -> Result<()> {
    match task {
        WriteTask::Session(fact) => {
            let app_name = resolver.display_name(&fact.package_name).unwrap_or_else(|err| {
                log_debug!("Falling back to package name: {err}");
                fact.package_name.clone()
            });
            let Some(session) =
                UsageSession::from_bounds(&fact.package_name, app_name, fact.start_time, fact.end_time)
            else {
                return Ok(());
            };
            db.insert_usage_session(&session)
                .await
                .context("failed to insert usage session")?;
        }
        WriteTask::ScrollSession(fact) => {
            let session = ScrollSession {
                id: None,
                package_name: fact.package_name,
                start_time: fact.start_time,
                end_time: fact.end_time,
                scroll_count: fact.scroll_count,
            };
            db.insert_scroll_session(&session)
                .await
                .context("failed to insert scroll session")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names() -> Arc<dyn AppNameResolver> {
        Arc::new(KnownAppNames::new(HashMap::from([(
            "com.a".to_string(),
            "Alpha".to_string(),
        )])))
    }

    #[tokio::test]
    async fn test_sessions_are_written_with_resolved_names() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("writer.sqlite3")).unwrap();
        let writer = UsageLogWriter::spawn(db.clone(), names(), 8, &Handle::current());

        writer.log_session(SessionClosed {
            package_name: "com.a".into(),
            start_time: 1_000,
            end_time: 5_000,
        });
        writer.log_session(SessionClosed {
            package_name: "com.unknown".into(),
            start_time: 1_000,
            end_time: 2_000,
        });
        writer.log_session(SessionClosed {
            package_name: "com.a".into(),
            start_time: 7_000,
            end_time: 7_000,
        });
        writer.log_scroll_session(ScrollSessionClosed {
            package_name: "com.a".into(),
            start_time: 1_000,
            end_time: 5_000,
            scroll_count: 3,
        });
        writer.shutdown().await;

        let alpha = db.sessions_for_app("com.a").await.unwrap();
        assert_eq!(alpha.len(), 1);
        assert_eq!(alpha[0].app_name, "Alpha");
        assert_eq!(alpha[0].duration_millis, 4_000);

        let unknown = db.sessions_for_app("com.unknown").await.unwrap();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].app_name, "com.unknown");

        let scrolls = db.scroll_sessions_since(0).await.unwrap();
        assert_eq!(scrolls.len(), 1);
        assert_eq!(scrolls[0].scroll_count, 3);
    }

    #[tokio::test]
    async fn test_delete_old_sessions_passes_through() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("writer.sqlite3")).unwrap();
        let writer = UsageLogWriter::spawn(db.clone(), names(), 8, &Handle::current());

        let old_day = DateKey::parse("2024-04-01").unwrap();
        let start = old_day.start_of_day_millis().unwrap() + 3_600_000;
        writer.log_session(SessionClosed {
            package_name: "com.a".into(),
            start_time: start,
            end_time: start + 60_000,
        });
        writer.shutdown().await;

        let writer = UsageLogWriter::spawn(db.clone(), names(), 8, &Handle::current());
        let deleted = writer
            .delete_old_sessions(&DateKey::parse("2024-05-01").unwrap())
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        writer.shutdown().await;
    }

    fn session(package_name: &str, start_time: i64) -> SessionClosed {
        SessionClosed {
            package_name: package_name.into(),
            start_time,
            end_time: start_time + 1_000,
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_extra_records() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("writer.sqlite3")).unwrap();
        let writer = UsageLogWriter::spawn(db.clone(), names(), 1, &Handle::current());

        // The worker cannot run until this task yields, so the single slot
        // stays occupied and both later records are rejected without waiting.
        writer.log_session(session("com.a", 1_000));
        writer.log_session(session("com.a", 10_000));
        writer.log_scroll_session(ScrollSessionClosed {
            package_name: "com.a".into(),
            start_time: 1_000,
            end_time: 2_000,
            scroll_count: 4,
        });
        writer.shutdown().await;

        let sessions = db.sessions_for_app("com.a").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].start_time, 1_000);
        assert!(db.scroll_sessions_since(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_writer() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("writer.sqlite3")).unwrap();
        db.execute(|conn| {
            conn.execute_batch("DROP TABLE app_usage_sessions;")?;
            Ok(())
        })
        .await
        .unwrap();

        let writer = UsageLogWriter::spawn(db.clone(), names(), 8, &Handle::current());
        writer.log_session(session("com.a", 1_000));
        writer.log_scroll_session(ScrollSessionClosed {
            package_name: "com.a".into(),
            start_time: 1_000,
            end_time: 2_000,
            scroll_count: 4,
        });
        writer.shutdown().await;

        let scrolls = db.scroll_sessions_since(0).await.unwrap();
        assert_eq!(scrolls.len(), 1);
        assert_eq!(scrolls[0].scroll_count, 4);
    }

    #[tokio::test]
    async fn test_abort_discards_queued_records() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("writer.sqlite3")).unwrap();
        let writer = UsageLogWriter::spawn(db.clone(), names(), 8, &Handle::current());

        writer.log_session(session("com.a", 1_000));
        writer.abort().await;

        assert!(db.sessions_for_app("com.a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_bounds_are_not_persisted() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("writer.sqlite3")).unwrap();
        let writer = UsageLogWriter::spawn(db.clone(), names(), 8, &Handle::current());

        writer.log_session(SessionClosed {
            package_name: "com.a".into(),
            start_time: i64::MIN,
            end_time: i64::MAX,
        });
        writer.log_session(SessionClosed {
            package_name: "com.a".into(),
            start_time: i64::MAX,
            end_time: i64::MIN,
        });
        writer.shutdown().await;

        assert!(db.sessions_for_app("com.a").await.unwrap().is_empty());
    }
}
