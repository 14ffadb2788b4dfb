//! Session Tracker: turns foreground-change events into closed sessions.

use serde::Serialize;

use super::{
    config::MonitorConfig,
    state::{LiveState, SessionState},
};

/// A foreground session ended. Consumed by the usage log writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClosed {
    pub package_name: String,
    pub start_time: i64,
    pub end_time: i64,
}

/// A monitored app lost foreground while it had an open scroll session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollSessionClosed {
    pub package_name: String,
    pub start_time: i64,
    pub end_time: i64,
    pub scroll_count: u32,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ForegroundTransition {
    pub session_closed: Option<SessionClosed>,
    pub scroll_session_closed: Option<ScrollSessionClosed>,
}

/// Makes `package_name` the foreground app at `now`.
///
/// Returns `None` when it already is (duplicate events are no-ops). Otherwise
/// closes the previous app's session and opens a fresh one for the new app.
pub fn switch_foreground(
    live: &mut LiveState,
    package_name: &str,
    now: i64,
    config: &MonitorConfig,
) -> Option<ForegroundTransition> {
    if live.current_foreground.as_deref() == Some(package_name) {
        return None;
    }

    let mut transition = ForegroundTransition::default();

    if let Some(previous) = live.current_foreground.take() {
        if let Some(session) = live.sessions.remove(&previous) {
            transition.session_closed = close_session(&previous, &session, now);

            if config.is_monitored(&previous) && session.start_time > 0 {
                let scroll_count = live
                    .windows
                    .get(&previous)
                    .map_or(0, |window| window.len());
                transition.scroll_session_closed = Some(ScrollSessionClosed {
                    package_name: previous.clone(),
                    start_time: session.start_time,
                    end_time: now,
                    scroll_count: u32::try_from(scroll_count).unwrap_or(u32::MAX),
                });
            }
        }
    }

    // Opened for every app so a later heuristic check has a baseline, even
    // though only monitored apps are ever evaluated.
    live.current_foreground = Some(package_name.to_string());
    live.sessions
        .insert(package_name.to_string(), SessionState::opened_at(now));

    Some(transition)
}

fn close_session(package_name: &str, session: &SessionState, now: i64) -> Option<SessionClosed> {
    if session.start_time <= 0 || now.saturating_sub(session.start_time) <= 0 {
        return None;
    }

    Some(SessionClosed {
        package_name: package_name.to_string(),
        start_time: session.start_time,
        end_time: now,
    })
}
