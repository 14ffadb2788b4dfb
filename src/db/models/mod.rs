pub mod date_key;
pub mod intervention;
pub mod time_limit;
pub mod usage_session;

pub use date_key::DateKey;
pub use intervention::{DetectionReason, DoomscrollEvent, LifetimeCounters};
pub use time_limit::TimeLimit;
pub use usage_session::{PackageUsage, ScrollSession, UsageSession};
