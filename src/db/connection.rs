use std::{
    fs,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;
use crate::utils::locks::recover;

type StoreJob = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Run(StoreJob),
    Stop,
}

/// Owns the store thread. Stopping and joining happens when the last
/// [`Database`] clone goes away.
struct StoreThread {
    commands: mpsc::Sender<StoreCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreThread {
    fn drop(&mut self) {
        let Some(handle) = recover(self.handle.lock()).take() else {
            return;
        };

        if let Err(err) = self.commands.send(StoreCommand::Stop) {
            error!("Failed to stop usage store thread: {err}");
        }
        if let Err(join_err) = handle.join() {
            error!("Usage store thread panicked: {join_err:?}");
        }
    }
}

/// Handle to the usage store.
///
/// All statements run on one dedicated SQLite thread, so every closure passed
/// to [`Database::execute`] observes the effects of the ones queued before it.
/// Read-modify-write statements (counter increments) are atomic without
/// further locking.
#[derive(Clone)]
pub struct Database {
    thread: Arc<StoreThread>,
}

impl Database {
    /// Opens (creating if needed) the store at `path` and runs migrations
    /// before returning.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_path = path.clone();

        let handle = thread::Builder::new()
            .name("doomshield-db".into())
            .spawn(move || {
                let conn = match open_store(&thread_path) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }
                serve_commands(conn, command_rx);
            })
            .context("failed to spawn usage store thread")?;

        ready_rx
            .recv()
            .context("usage store thread exited during startup")??;
        info!("Usage store ready at {}", path.display());

        Ok(Self {
            thread: Arc::new(StoreThread {
                commands,
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Runs `job` on the store thread and waits for its result.
    pub async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = StoreCommand::Run(Box::new(move |conn| {
            // The caller may have given up waiting.
            let _ = reply_tx.send(job(conn));
        }));

        self.thread
            .commands
            .send(command)
            .map_err(|_| anyhow!("usage store thread has stopped"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("usage store thread dropped the request"))?
    }
}

fn open_store(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database at {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("WAL journal mode unavailable, using the default: {err}");
    }

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn serve_commands(mut conn: Connection, commands: mpsc::Receiver<StoreCommand>) {
    for command in commands {
        match command {
            StoreCommand::Run(job) => job(&mut conn),
            StoreCommand::Stop => break,
        }
    }
    info!("Usage store thread stopped");
}
