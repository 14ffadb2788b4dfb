//! Scroll Heuristic Detector.
//!
//! Two heuristics run on every scroll event of a monitored app, in order, and
//! the first match wins:
//!
//! 1. rapid scrolling: more than `rapid_scroll_threshold` events inside the
//!    sliding window. The window is cleared so one burst fires once.
//! 2. long session: the app has been foreground for longer than
//!    `long_session_ms` since the last baseline. The baseline moves to `now`
//!    so the next trigger needs another full span.

use serde::Serialize;

use crate::db::DetectionReason;

use super::{config::MonitorConfig, state::LiveState};

// Set to true to enable per-event logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoomscrollDetected {
    pub package_name: String,
    pub reason: DetectionReason,
    pub detected_at: i64,
    /// Events in the window when the heuristic fired
    pub scroll_count: u32,
    /// Time since the app became foreground
    pub session_millis: i64,
}

/// Records one scroll event for `package_name` and evaluates the heuristics.
///
/// The caller is responsible for the shield toggle, the monitored-set check
/// and for making `package_name` the foreground app first.
pub fn record_scroll(
    live: &mut LiveState,
    package_name: &str,
    now: i64,
    config: &MonitorConfig,
) -> Option<DoomscrollDetected> {
    let window = live.windows.entry(package_name.to_string()).or_default();
    window.record(now, config.scroll_window_ms);
    let scroll_count = window.len();

    log_debug!("Scroll count for {package_name}: {scroll_count}");

    let session_start = live
        .sessions
        .get(package_name)
        .map_or(now, |session| session.start_time);
    let detected = |reason| DoomscrollDetected {
        package_name: package_name.to_string(),
        reason,
        detected_at: now,
        scroll_count: u32::try_from(scroll_count).unwrap_or(u32::MAX),
        session_millis: now.saturating_sub(session_start),
    };

    if scroll_count > config.rapid_scroll_threshold {
        log_warn!("Doomscrolling detected! Rapid scrolling in {package_name}");
        window.clear();
        return Some(detected(DetectionReason::RapidScroll));
    }

    let session = live.sessions.get_mut(package_name)?;
    if now.saturating_sub(session.last_reset_time) > config.long_session_ms {
        log_warn!("Doomscrolling detected! Long session in {package_name}");
        session.last_reset_time = now;
        return Some(detected(DetectionReason::LongSession));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::session::switch_foreground;

    const INSTAGRAM: &str = "com.instagram.android";

    fn foreground_at(now: i64, config: &MonitorConfig) -> LiveState {
        let mut live = LiveState::default();
        switch_foreground(&mut live, INSTAGRAM, now, config);
        live
    }

    #[test]
    fn test_twenty_one_events_fire_once_and_clear_window() {
        let config = MonitorConfig::default();
        let mut live = foreground_at(1_000, &config);

        let detections: Vec<_> = (1..=21)
            .filter_map(|i| record_scroll(&mut live, INSTAGRAM, 1_000 + i * 100, &config))
            .collect();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].reason, DetectionReason::RapidScroll);
        assert_eq!(detections[0].scroll_count, 21);
        assert_eq!(live.scroll_count(INSTAGRAM), 0);
    }

    #[test]
    fn test_twenty_events_do_not_fire() {
        let config = MonitorConfig::default();
        let mut live = foreground_at(1_000, &config);

        for i in 1..=20 {
            assert!(record_scroll(&mut live, INSTAGRAM, 1_000 + i * 100, &config).is_none());
        }
        assert_eq!(live.scroll_count(INSTAGRAM), 20);
    }

    #[test]
    fn test_slow_scrolling_never_accumulates() {
        let config = MonitorConfig::default();
        let mut live = foreground_at(1_000, &config);

        // One event every 3.5s keeps at most 18 events in a 60s window.
        for i in 1..=200 {
            let now = 1_000 + i * 3_500;
            assert!(record_scroll(&mut live, INSTAGRAM, now, &config).is_none());
            assert!(live.window(INSTAGRAM).unwrap().oldest().unwrap() >= now - 60_000);
        }
    }

    #[test]
    fn test_long_session_fires_and_resets_baseline() {
        let config = MonitorConfig::default();
        let mut live = foreground_at(1_000, &config);

        let fired_at = 1_000 + 1_800_001;
        let detection = record_scroll(&mut live, INSTAGRAM, fired_at, &config).unwrap();
        assert_eq!(detection.reason, DetectionReason::LongSession);
        assert_eq!(detection.session_millis, 1_800_001);
        assert_eq!(live.session(INSTAGRAM).unwrap().last_reset_time, fired_at);
        assert_eq!(live.session(INSTAGRAM).unwrap().start_time, 1_000);

        // Exactly 30 minutes after the reset is not enough.
        assert!(record_scroll(&mut live, INSTAGRAM, fired_at + 1_800_000, &config).is_none());
        let again = record_scroll(&mut live, INSTAGRAM, fired_at + 1_800_001, &config).unwrap();
        assert_eq!(again.reason, DetectionReason::LongSession);
    }

    #[test]
    fn test_rapid_scroll_wins_over_long_session() {
        let config = MonitorConfig::default();
        let mut live = foreground_at(1_000, &config);
        let late = 1_000 + 1_800_001;

        for i in 0..20 {
            assert!(record_scroll(&mut live, INSTAGRAM, late - 59_000 + i, &config).is_none());
        }
        assert_eq!(live.session(INSTAGRAM).unwrap().last_reset_time, 1_000);

        // Both heuristics match on this event; only the first one fires.
        let detection = record_scroll(&mut live, INSTAGRAM, late, &config).unwrap();
        assert_eq!(detection.reason, DetectionReason::RapidScroll);
        assert_eq!(live.session(INSTAGRAM).unwrap().last_reset_time, 1_000);
    }

    #[test]
    fn test_extreme_timestamps_are_tolerated() {
        let config = MonitorConfig::default();
        let mut live = foreground_at(1_000, &config);

        assert!(record_scroll(&mut live, INSTAGRAM, i64::MIN, &config).is_none());
        assert_eq!(live.session(INSTAGRAM).unwrap().last_reset_time, 1_000);

        let detection = record_scroll(&mut live, INSTAGRAM, i64::MAX, &config).unwrap();
        assert_eq!(detection.reason, DetectionReason::LongSession);
        assert_eq!(detection.session_millis, i64::MAX - 1_000);
        assert_eq!(live.scroll_count(INSTAGRAM), 1);
    }
}
