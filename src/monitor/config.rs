use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Apps subject to the scroll heuristics unless the config overrides the set.
pub const DEFAULT_MONITORED_PACKAGES: [&str; 8] = [
    "com.instagram.android",
    "com.zhiliaoapp.musically",
    "com.ss.android.ugc.trill", // TikTok (Global)
    "com.google.android.youtube",
    "com.facebook.katana",
    "com.twitter.android",
    "com.reddit.frontpage",
    "com.snapchat.android",
];

/// Tunable thresholds for the monitoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Width of the sliding scroll-event window
    pub scroll_window_ms: i64,

    /// Rapid scrolling fires when the window holds more events than this
    pub rapid_scroll_threshold: usize,

    /// Long session fires once a monitored app has been foreground longer than this
    pub long_session_ms: i64,

    /// Credited to the lifetime counters per doomscroll intervention
    pub time_saved_per_intervention_min: i64,

    /// Pending usage writes beyond this are dropped
    pub write_queue_capacity: usize,

    /// Buffered facts per subscriber before the slowest one starts lagging
    pub event_channel_capacity: usize,

    pub monitored_packages: HashSet<String>,

    /// Display names used when logging usage sessions
    pub app_names: HashMap<String, String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scroll_window_ms: 60_000,
            rapid_scroll_threshold: 20,
            long_session_ms: 30 * 60_000,
            time_saved_per_intervention_min: 5,
            write_queue_capacity: 256,
            event_channel_capacity: 256,
            monitored_packages: DEFAULT_MONITORED_PACKAGES
                .iter()
                .map(|pkg| pkg.to_string())
                .collect(),
            app_names: HashMap::new(),
        }
    }
}

impl MonitorConfig {
    /// Reads a JSON config, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read monitor config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse monitor config at {}", path.display()))
    }

    pub fn is_monitored(&self, package_name: &str) -> bool {
        self.monitored_packages.contains(package_name)
    }
}
