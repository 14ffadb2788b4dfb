//! The monitoring engine: the two inbound event calls and the wiring between
//! the session tracker, scroll heuristics, time-limit checks and the writer.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::{runtime::Handle, sync::broadcast};
use tokio_util::task::TaskTracker;

use crate::db::{Database, DateKey};

use super::{
    config::MonitorConfig,
    dispatcher::{Intervention, InterventionDispatcher, OverlayPresenter},
    events::ShieldEvent,
    limits::{BlockStatus, TimeLimitEvaluator},
    scroll::record_scroll,
    session::{switch_foreground, ForegroundTransition},
    state::{lock_live, SharedLiveState},
    writer::{AppNameResolver, UsageLogWriter},
    ShieldPreference,
};

// Set to true to enable per-event logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Host-provided collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub preferences: Arc<dyn ShieldPreference>,
    pub presenter: Arc<dyn OverlayPresenter>,
    pub names: Arc<dyn AppNameResolver>,
}

pub struct MonitorEngine {
    config: Arc<MonitorConfig>,
    live: SharedLiveState,
    preferences: Arc<dyn ShieldPreference>,
    evaluator: TimeLimitEvaluator,
    dispatcher: InterventionDispatcher,
    writer: UsageLogWriter,
    events: broadcast::Sender<ShieldEvent>,
    tasks: TaskTracker,
    runtime: Handle,
}

impl MonitorEngine {
    /// Must be called from within a tokio runtime; background work is spawned
    /// onto it.
    pub fn new(
        config: MonitorConfig,
        db: Database,
        live: SharedLiveState,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .context("monitor engine must be created inside a tokio runtime")?;
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let tasks = TaskTracker::new();

        let writer = UsageLogWriter::spawn(
            db.clone(),
            collaborators.names,
            config.write_queue_capacity,
            &runtime,
        );
        let dispatcher = InterventionDispatcher::new(
            db.clone(),
            collaborators.presenter,
            events.clone(),
            tasks.clone(),
            runtime.clone(),
            config.time_saved_per_intervention_min,
        );

        log_info!(
            "Monitor engine started, {} monitored apps",
            config.monitored_packages.len()
        );

        Ok(Self {
            config: Arc::new(config),
            live,
            preferences: collaborators.preferences,
            evaluator: TimeLimitEvaluator::new(db),
            dispatcher,
            writer,
            events,
            tasks,
            runtime,
        })
    }

    pub fn foreground_changed(&self, package_name: &str) {
        self.on_foreground_change(package_name, now_millis());
    }

    pub fn scroll_detected(&self, package_name: &str) {
        self.on_scroll_event(package_name, now_millis());
    }

    /// Handles a foreground change at `now`. Returns immediately; writes and
    /// the time-limit check run in the background.
    pub fn on_foreground_change(&self, package_name: &str, now: i64) {
        let transition = {
            let mut live = lock_live(&self.live);
            switch_foreground(&mut live, package_name, now, &self.config)
        };

        if let Some(transition) = transition {
            self.after_switch(package_name, now, transition);
        }
    }

    /// Handles one scroll event at `now`.
    pub fn on_scroll_event(&self, package_name: &str, now: i64) {
        if !self.preferences.is_shield_enabled() || !self.config.is_monitored(package_name) {
            return;
        }

        let (transition, detected) = {
            let mut live = lock_live(&self.live);
            let transition = if live.current_foreground() == Some(package_name) {
                None
            } else {
                log_debug!("Scroll in {package_name} before its foreground change");
                switch_foreground(&mut live, package_name, now, &self.config)
            };
            let detected = record_scroll(&mut live, package_name, now, &self.config);
            (transition, detected)
        };

        if let Some(transition) = transition {
            self.after_switch(package_name, now, transition);
        }

        if let Some(detected) = detected {
            self.publish(ShieldEvent::DoomscrollDetected {
                package_name: detected.package_name.clone(),
                reason: detected.reason,
                at: detected.detected_at,
            });
            self.dispatcher.dispatch(Intervention::Doomscroll(detected));
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShieldEvent> {
        self.events.subscribe()
    }

    pub fn live_state(&self) -> SharedLiveState {
        self.live.clone()
    }

    pub async fn delete_old_sessions(&self, cutoff: &DateKey) -> Result<usize> {
        self.writer.delete_old_sessions(cutoff).await
    }

    /// Waits for in-flight checks and interventions, then drains the writer.
    pub async fn shutdown(self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.writer.shutdown().await;
        log_info!("Monitor engine stopped");
    }

    /// Tears the engine down without waiting: queued usage records and
    /// in-flight checks are dropped.
    pub async fn abort(self) {
        self.tasks.close();
        self.writer.abort().await;
        log_info!("Monitor engine aborted");
    }

    fn after_switch(&self, package_name: &str, now: i64, transition: ForegroundTransition) {
        self.publish(ShieldEvent::ForegroundChanged {
            package_name: package_name.to_string(),
            at: now,
        });

        if let Some(closed) = transition.session_closed {
            self.publish(ShieldEvent::SessionClosed {
                package_name: closed.package_name.clone(),
                start_time: closed.start_time,
                end_time: closed.end_time,
            });
            self.writer.log_session(closed);
        }
        if let Some(scroll_closed) = transition.scroll_session_closed {
            self.writer.log_scroll_session(scroll_closed);
        }

        self.spawn_block_check(package_name.to_string(), now);
    }

    fn spawn_block_check(&self, package_name: String, now: i64) {
        let evaluator = self.evaluator.clone();
        let dispatcher = self.dispatcher.clone();
        let events = self.events.clone();
        let today = DateKey::from_millis(now);

        self.tasks.spawn_on(
            async move {
                let status = evaluator.evaluate(&package_name, &today).await;
                let _ = events.send(ShieldEvent::BlockStatusEvaluated {
                    package_name: package_name.clone(),
                    status,
                });

                match status {
                    BlockStatus::Blocked {
                        used_minutes,
                        remaining_cooldown_minutes,
                    } => dispatcher.dispatch(Intervention::TimeLimit {
                        package_name,
                        used_minutes,
                        cooldown_minutes: remaining_cooldown_minutes,
                    }),
                    BlockStatus::Active { .. } | BlockStatus::NotLimited => {}
                }
            },
            &self.runtime,
        );
    }

    fn publish(&self, event: ShieldEvent) {
        // Sending fails only when nobody is subscribed.
        let _ = self.events.send(event);
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
