//! DoomShield: doomscroll detection and per-app daily time limits.
//!
//! The host feeds foreground-change and scroll events into a
//! [`MonitorEngine`]; the engine tracks sessions, evaluates the scroll
//! heuristics and time limits, persists usage history to SQLite and asks the
//! host to show overlays through [`OverlayPresenter`].

pub mod db;
pub mod monitor;
pub mod settings;
mod utils;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::Deserialize;
use tokio::io::{self, AsyncBufReadExt, BufReader};

pub use db::Database;
pub use monitor::{
    AppNameResolver, BlockStatus, Collaborators, InterventionKind, KnownAppNames, LiveState,
    MonitorConfig, MonitorEngine, OverlayPayload, OverlayPresenter, ShieldEvent,
    ShieldPreference,
};
pub use settings::SettingsStore;

/// One line of host input.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum HostEvent {
    Foreground {
        package: String,
        at: Option<i64>,
    },
    Scroll {
        package: String,
        at: Option<i64>,
    },
}

/// Overlay surface for the headless host: overlays are only logged.
struct LoggingPresenter;

impl OverlayPresenter for LoggingPresenter {
    fn show_overlay(&self, kind: InterventionKind, payload: &OverlayPayload) -> Result<()> {
        let payload = serde_json::to_string(payload)?;
        info!("Overlay {kind:?}: {payload}");
        Ok(())
    }
}

fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("DOOMSHIELD_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("doomshield"))
        .ok_or_else(|| anyhow!("could not determine a local data directory"))
}

fn debug_requested() -> bool {
    env::var("DOOMSHIELD_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Runs the headless host: one JSON event per stdin line until EOF.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let default_level = if debug_requested() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    info!("DoomShield starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(serve())
}

fn handle_line(engine: &MonitorEngine, line: &str) {
    if line.is_empty() {
        return;
    }

    match serde_json::from_str::<HostEvent>(line) {
        Ok(HostEvent::Foreground { package, at: Some(at) }) => {
            engine.on_foreground_change(&package, at)
        }
        Ok(HostEvent::Foreground { package, at: None }) => engine.foreground_changed(&package),
        Ok(HostEvent::Scroll { package, at: Some(at) }) => engine.on_scroll_event(&package, at),
        Ok(HostEvent::Scroll { package, at: None }) => engine.scroll_detected(&package),
        Err(err) => warn!("Skipping malformed event {line:?}: {err}"),
    }
}

async fn serve() -> Result<()> {
    let data_dir = data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let config = MonitorConfig::load(&data_dir.join("config.json"))?;
    let database = Database::new(data_dir.join("doomshield.sqlite3"))?;
    let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);

    let collaborators = Collaborators {
        preferences: settings,
        presenter: Arc::new(LoggingPresenter),
        names: Arc::new(KnownAppNames::new(config.app_names.clone())),
    };
    let engine = MonitorEngine::new(config, database.clone(), LiveState::shared(), collaborators)?;

    let mut lines = BufReader::new(io::stdin()).lines();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => handle_line(&engine, line.trim()),
                    None => break,
                }
            }
            _ = &mut interrupt => {
                warn!("Interrupted, discarding pending usage writes");
                engine.abort().await;
                return Ok(());
            }
        }
    }

    engine.shutdown().await;

    let counters = database.lifetime_counters().await?;
    println!("{}", serde_json::to_string_pretty(&counters)?);
    Ok(())
}
