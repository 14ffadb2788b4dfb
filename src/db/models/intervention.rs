use serde::{Deserialize, Serialize};

/// Monotonic totals shown on the home and statistics screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeCounters {
    pub total_interventions: i64,
    pub total_time_saved_minutes: i64,
}

/// Which heuristic flagged a doomscroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionReason {
    RapidScroll,
    LongSession,
}

impl DetectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionReason::RapidScroll => "rapid_scroll",
            DetectionReason::LongSession => "long_session",
        }
    }
}

/// Persisted record of a single doomscroll intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoomscrollEvent {
    pub id: String,
    pub timestamp: i64,
    pub package_name: String,
    pub scroll_duration_millis: i64,
    pub scroll_count: u32,
    pub detected_reason: DetectionReason,
}
