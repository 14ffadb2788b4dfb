pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod events;
pub mod limits;
pub mod scroll;
pub mod session;
pub mod state;
pub mod writer;

pub use config::MonitorConfig;
pub use dispatcher::{InterventionKind, OverlayPayload, OverlayPresenter};
pub use engine::{Collaborators, MonitorEngine};
pub use events::ShieldEvent;
pub use limits::{BlockStatus, TimeLimitEvaluator};
pub use state::{LiveState, SharedLiveState};
pub use writer::{AppNameResolver, KnownAppNames};

/// Source of the global shield toggle. Read on every scroll event, so
/// implementations should serve a cached value.
pub trait ShieldPreference: Send + Sync {
    fn is_shield_enabled(&self) -> bool;
}
