//! Intervention Dispatcher: records interventions and asks the host to show
//! an overlay.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::{runtime::Handle, sync::broadcast};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::db::{Database, DetectionReason, DoomscrollEvent};

use super::{events::ShieldEvent, scroll::DoomscrollDetected};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    DoomscrollOverlay,
    TimeLimitBlock,
}

/// What the host needs to render an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayPayload {
    Doomscroll {
        package_name: String,
        reason: DetectionReason,
    },
    TimeLimit {
        package_name: String,
        used_minutes: i64,
        cooldown_minutes: i64,
    },
}

impl OverlayPayload {
    pub fn kind(&self) -> InterventionKind {
        match self {
            OverlayPayload::Doomscroll { .. } => InterventionKind::DoomscrollOverlay,
            OverlayPayload::TimeLimit { .. } => InterventionKind::TimeLimitBlock,
        }
    }

    pub fn package_name(&self) -> &str {
        match self {
            OverlayPayload::Doomscroll { package_name, .. }
            | OverlayPayload::TimeLimit { package_name, .. } => package_name,
        }
    }
}

/// Host-side overlay surface. Implementations must return quickly; the call
/// is made from the event path.
pub trait OverlayPresenter: Send + Sync {
    fn show_overlay(&self, kind: InterventionKind, payload: &OverlayPayload) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intervention {
    Doomscroll(DoomscrollDetected),
    TimeLimit {
        package_name: String,
        used_minutes: i64,
        cooldown_minutes: i64,
    },
}

#[derive(Clone)]
pub struct InterventionDispatcher {
    db: Database,
    presenter: Arc<dyn OverlayPresenter>,
    events: broadcast::Sender<ShieldEvent>,
    tasks: TaskTracker,
    runtime: Handle,
    time_saved_minutes: i64,
}

impl InterventionDispatcher {
    pub fn new(
        db: Database,
        presenter: Arc<dyn OverlayPresenter>,
        events: broadcast::Sender<ShieldEvent>,
        tasks: TaskTracker,
        runtime: Handle,
        time_saved_minutes: i64,
    ) -> Self {
        Self {
            db,
            presenter,
            events,
            tasks,
            runtime,
            time_saved_minutes,
        }
    }

    /// Issues one intervention. Every call produces an overlay request; there
    /// is no suppression of repeats.
    ///
    /// Doomscroll interventions also bump the lifetime counters. That write
    /// runs on the tracked task set, so callers wait on the tracker before
    /// reading the counters back.
    pub fn dispatch(&self, intervention: Intervention) {
        let payload = match intervention {
            Intervention::Doomscroll(detected) => {
                self.spawn_record(&detected);
                OverlayPayload::Doomscroll {
                    package_name: detected.package_name,
                    reason: detected.reason,
                }
            }
            Intervention::TimeLimit {
                package_name,
                used_minutes,
                cooldown_minutes,
            } => OverlayPayload::TimeLimit {
                package_name,
                used_minutes,
                cooldown_minutes,
            },
        };

        let kind = payload.kind();
        log_info!("Issuing {kind:?} for {}", payload.package_name());

        if let Err(err) = self.presenter.show_overlay(kind, &payload) {
            log_error!(
                "Failed to show {kind:?} overlay for {}: {err:?}",
                payload.package_name()
            );
        }

        // No subscribers is fine.
        let _ = self.events.send(ShieldEvent::InterventionIssued {
            kind,
            package_name: payload.package_name().to_string(),
        });
    }

    fn spawn_record(&self, detected: &DoomscrollDetected) {
        let event = DoomscrollEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: detected.detected_at,
            package_name: detected.package_name.clone(),
            scroll_duration_millis: detected.session_millis,
            scroll_count: detected.scroll_count,
            detected_reason: detected.reason,
        };
        let db = self.db.clone();
        let minutes = self.time_saved_minutes;

        self.tasks.spawn_on(
            async move {
                if let Err(err) = db.record_intervention(minutes, &event).await {
                    log_error!(
                        "Failed to record intervention for {}: {err:?}",
                        event.package_name
                    );
                }
            },
            &self.runtime,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LifetimeCounters;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingPresenter {
        shown: Mutex<Vec<(InterventionKind, OverlayPayload)>>,
    }

    impl OverlayPresenter for RecordingPresenter {
        fn show_overlay(&self, kind: InterventionKind, payload: &OverlayPayload) -> Result<()> {
            self.shown.lock().unwrap().push((kind, payload.clone()));
            Ok(())
        }
    }

    struct FailingPresenter;

    impl OverlayPresenter for FailingPresenter {
        fn show_overlay(&self, _kind: InterventionKind, _payload: &OverlayPayload) -> Result<()> {
            anyhow::bail!("overlay permission revoked")
        }
    }

    fn detected(package_name: &str, at: i64) -> DoomscrollDetected {
        DoomscrollDetected {
            package_name: package_name.into(),
            reason: DetectionReason::RapidScroll,
            detected_at: at,
            scroll_count: 21,
            session_millis: 30_000,
        }
    }

    fn dispatcher(
        db: &Database,
        presenter: Arc<dyn OverlayPresenter>,
        tasks: &TaskTracker,
    ) -> (InterventionDispatcher, broadcast::Receiver<ShieldEvent>) {
        let (events, receiver) = broadcast::channel(64);
        let dispatcher = InterventionDispatcher::new(
            db.clone(),
            presenter,
            events,
            tasks.clone(),
            Handle::current(),
            5,
        );
        (dispatcher, receiver)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatches_are_all_counted() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("dispatch.sqlite3")).unwrap();
        db.increment_interventions().await.unwrap();
        db.add_time_saved(7).await.unwrap();
        let initial = db.lifetime_counters().await.unwrap();

        let presenter = Arc::new(RecordingPresenter::default());
        let tasks = TaskTracker::new();
        let (dispatcher, _events) = dispatcher(&db, presenter.clone(), &tasks);

        let threads: Vec<_> = (0..20)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                std::thread::spawn(move || {
                    dispatcher.dispatch(Intervention::Doomscroll(detected("com.a", 1_000 + i)));
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        tasks.close();
        tasks.wait().await;

        let counters = db.lifetime_counters().await.unwrap();
        assert_eq!(counters.total_interventions, initial.total_interventions + 20);
        assert_eq!(
            counters.total_time_saved_minutes,
            initial.total_time_saved_minutes + 100
        );
        assert_eq!(presenter.shown.lock().unwrap().len(), 20);
        assert_eq!(db.doomscroll_events_since(0).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_time_limit_block_leaves_counters_alone() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("dispatch.sqlite3")).unwrap();
        let presenter = Arc::new(RecordingPresenter::default());
        let tasks = TaskTracker::new();
        let (dispatcher, mut events) = dispatcher(&db, presenter.clone(), &tasks);

        dispatcher.dispatch(Intervention::TimeLimit {
            package_name: "com.a".into(),
            used_minutes: 61,
            cooldown_minutes: 15,
        });
        tasks.close();
        tasks.wait().await;

        let shown = presenter.shown.lock().unwrap().clone();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, InterventionKind::TimeLimitBlock);
        assert_eq!(
            events.try_recv().unwrap(),
            ShieldEvent::InterventionIssued {
                kind: InterventionKind::TimeLimitBlock,
                package_name: "com.a".into(),
            }
        );
        assert_eq!(
            db.lifetime_counters().await.unwrap(),
            LifetimeCounters::default()
        );
    }

    #[tokio::test]
    async fn test_presenter_failure_still_records() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("dispatch.sqlite3")).unwrap();
        let tasks = TaskTracker::new();
        let (dispatcher, mut events) = dispatcher(&db, Arc::new(FailingPresenter), &tasks);

        dispatcher.dispatch(Intervention::Doomscroll(detected("com.a", 1_000)));
        tasks.close();
        tasks.wait().await;

        assert_eq!(db.lifetime_counters().await.unwrap().total_interventions, 1);
        assert!(matches!(
            events.try_recv().unwrap(),
            ShieldEvent::InterventionIssued {
                kind: InterventionKind::DoomscrollOverlay,
                ..
            }
        ));
    }
}
