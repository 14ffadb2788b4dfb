use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::utils::locks::recover;

/// Open session of the most recent foreground app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    /// When the app became foreground
    pub start_time: i64,
    /// Baseline for the long-session heuristic; moves forward each time it fires
    pub last_reset_time: i64,
}

impl SessionState {
    pub fn opened_at(now: i64) -> Self {
        Self {
            start_time: now,
            last_reset_time: now,
        }
    }
}

/// Scroll timestamps seen for one app within the trailing window.
#[derive(Debug, Clone, Default)]
pub struct ScrollEventWindow {
    timestamps: VecDeque<i64>,
}

impl ScrollEventWindow {
    /// Appends `now` and evicts every timestamp older than `now - window_ms`.
    pub fn record(&mut self, now: i64, window_ms: i64) {
        self.timestamps.push_back(now);
        let cutoff = now.saturating_sub(window_ms);
        self.timestamps.retain(|&timestamp| timestamp >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
    }

    pub fn oldest(&self) -> Option<i64> {
        self.timestamps.iter().copied().min()
    }
}

/// Live per-app state owned by one engine instance. Never persisted.
#[derive(Debug, Default)]
pub struct LiveState {
    pub(crate) current_foreground: Option<String>,
    pub(crate) sessions: HashMap<String, SessionState>,
    pub(crate) windows: HashMap<String, ScrollEventWindow>,
}

pub type SharedLiveState = Arc<Mutex<LiveState>>;

impl LiveState {
    pub fn shared() -> SharedLiveState {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn current_foreground(&self) -> Option<&str> {
        self.current_foreground.as_deref()
    }

    pub fn session(&self, package_name: &str) -> Option<SessionState> {
        self.sessions.get(package_name).copied()
    }

    pub fn window(&self, package_name: &str) -> Option<&ScrollEventWindow> {
        self.windows.get(package_name)
    }

    pub fn scroll_count(&self, package_name: &str) -> usize {
        self.windows.get(package_name).map_or(0, ScrollEventWindow::len)
    }
}

/// Locks the shared state, recovering the data if a holder panicked.
pub fn lock_live(live: &SharedLiveState) -> MutexGuard<'_, LiveState> {
    recover(live.lock())
}
