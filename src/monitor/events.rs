use serde::Serialize;

use crate::db::DetectionReason;

use super::{dispatcher::InterventionKind, limits::BlockStatus};

/// Facts published by the engine to any subscriber.
///
/// Delivery is best effort: a lagging subscriber misses events and nothing
/// in the engine depends on them being received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShieldEvent {
    ForegroundChanged {
        package_name: String,
        at: i64,
    },
    SessionClosed {
        package_name: String,
        start_time: i64,
        end_time: i64,
    },
    DoomscrollDetected {
        package_name: String,
        reason: DetectionReason,
        at: i64,
    },
    BlockStatusEvaluated {
        package_name: String,
        status: BlockStatus,
    },
    InterventionIssued {
        kind: InterventionKind,
        package_name: String,
    },
}
