//! Embedded relational sink: a single writer connection on a dedicated
//! worker thread.
//!
//! SQLite work is serialized through a job channel so the rest of the
//! daemon never touches the connection directly. The worker applies the
//! durability pragmas once at open and then runs closures shipped from
//! async callers, replying over oneshot channels. The watcher is strictly
//! INSERT-only: the schema comes from an external initializer (see
//! `db/schema.sql`), and a file it has not prepared is refused at startup.
//! Downstream readers come from a separate process with their own
//! connection; this one is the only writer.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread,
};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod repositories;

pub use repositories::EventTableCounts;

type WriterJob = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Joins the writer thread once the last [`Database`] handle is gone. By
/// that point every job sender has been dropped, so the worker's receive
/// loop has already drained and returned.
struct WriterGuard {
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Writer thread panicked before shutdown");
            }
        }
    }
}

/// Handle to the writer thread. Cheap to clone; all clones share the one
/// underlying connection.
#[derive(Clone)]
pub struct Database {
    // Field order is load-bearing: the job sender must drop before the
    // guard, so the channel closes and the worker exits before the join.
    jobs: mpsc::Sender<WriterJob>,
    _guard: Arc<WriterGuard>,
    db_path: Arc<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl Database {
    /// Opens the database file, applies the write-path pragmas, and fails
    /// fast unless the external initializer has already installed the
    /// schema.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create data directory {}", parent.display())
                })?;
            }
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<WriterJob>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_worker = db_path.clone();

        let thread = thread::Builder::new()
            .name("mnemosyne-db".into())
            .spawn(move || writer_loop(path_for_worker, jobs_rx, ready_tx))
            .context("could not start the database writer thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => bail!("database writer died during startup"),
        }

        info!("Database opened: {}", db_path.display());

        Ok(Self {
            jobs: jobs_tx,
            _guard: Arc::new(WriterGuard {
                thread: Some(thread),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Runs a closure on the writer thread and awaits its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();

        self.jobs
            .send(Box::new(move |conn| {
                // A caller that stopped waiting just discards the result.
                let _ = done_tx.send(task(conn));
            }))
            .map_err(|_| anyhow!("database writer is no longer running"))?;

        done_rx
            .await
            .map_err(|_| anyhow!("database writer went away mid-query"))?
    }
}

/// Owns the connection for the life of the process. Reports the outcome of
/// opening it through `ready`, then serves jobs until every sender is gone.
fn writer_loop(path: PathBuf, jobs: mpsc::Receiver<WriterJob>, ready: mpsc::Sender<Result<()>>) {
    let mut conn = match open_writer(&path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Ok(job) = jobs.recv() {
        job(&mut conn);
    }
}

fn open_writer(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
    configure_connection(&conn)?;
    verify_schema(&conn)?;
    Ok(conn)
}

/// Write-path pragmas.
///
/// The rollback journal (DELETE) is deliberate: the data directory may sit
/// on a Docker bind mount where WAL's shared-memory file misbehaves, and the
/// single-writer design gains nothing from WAL here. Readers come from a
/// separate process with their own pragmas.
fn configure_connection(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "DELETE")
        .context("failed to set journal_mode")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous")?;
    conn.pragma_update(None, "temp_store", "MEMORY")
        .context("failed to set temp_store")?;
    conn.pragma_update(None, "mmap_size", 268_435_456i64)
        .context("failed to set mmap_size")?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .context("failed to set busy_timeout")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to set foreign_keys")?;
    Ok(())
}

/// The writer never creates, migrates, or vacuums the schema; it only
/// checks that the initializer has run.
fn verify_schema(conn: &Connection) -> Result<()> {
    let present: bool = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'raw_events'
             )",
            [],
            |row| row.get(0),
        )
        .context("failed to inspect database schema")?;

    if !present {
        bail!(
            "raw_events table is missing from {}; apply db/schema.sql with the schema \
             initializer before starting the watcher",
            conn.path().unwrap_or("<unknown>")
        );
    }
    Ok(())
}
