mod counters;
mod scroll_sessions;
mod time_limits;
mod usage_sessions;
