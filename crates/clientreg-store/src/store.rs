//! SQLite connection wrapper with an async, parameterized query surface.
//!
//! The [`Store`] struct owns at most one `rusqlite::Connection` behind an
//! `Arc<Mutex<Option<_>>>`. Every operation runs on the blocking thread
//! pool via `tokio::task::spawn_blocking` and resolves exactly once.
//! Operations issued concurrently on clones of the same store execute in
//! the order they acquire the connection lock. Whether a connection is held
//! is mirrored in an atomic flag so it can be read without that lock.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema;

/// Owned positional parameters for a statement.
///
/// Values are bound by SQLite, never spliced into the SQL text.
pub type Params = Vec<Value>;

/// Maps a result row onto a caller-defined record shape.
pub trait FromRow: Sized + Send + 'static {
    /// Build `Self` from the current row.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Handle to a single SQLite connection.
///
/// Construction does no I/O; call [`Store::open`] (or use
/// [`Store::scope`]) before issuing queries. Clones share the connection.
#[derive(Clone)]
pub struct Store {
    config: Arc<StoreConfig>,
    conn: Arc<Mutex<Option<Connection>>>,
    open: Arc<AtomicBool>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Store {
    /// Create an unopened store from `config`.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
            conn: Arc::new(Mutex::new(None)),
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create an unopened store backed by the file at `path`.
    pub fn file(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(StoreConfig::file(path))
    }

    /// Create an unopened in-memory store, useful for tests.
    pub fn in_memory() -> Self {
        Self::new(StoreConfig::in_memory())
    }

    /// The settings this store opens with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether a connection is currently held.
    ///
    /// Does not wait for in-flight queries.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    // ── lifecycle ────────────────────────────────────────────────────

    /// Open the connection and apply pragmas.
    ///
    /// Opening an already open store is a no-op.
    pub async fn open(&self) -> StoreResult<()> {
        self.open_if_closed().await.map(|_| ())
    }

    /// Open the connection unless one is held. Returns `true` if this call
    /// opened it.
    async fn open_if_closed(&self) -> StoreResult<bool> {
        let conn = Arc::clone(&self.conn);
        let open = Arc::clone(&self.open);
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            if guard.is_some() {
                debug!("store already open");
                return Ok(false);
            }
            *guard = Some(connect(&config)?);
            open.store(true, Ordering::Release);
            Ok(true)
        })
        .await?
    }

    /// Release the connection.
    ///
    /// Closing a store that is not open is a no-op. If SQLite refuses to
    /// close, the connection stays in place and
    /// [`StoreError::Connection`] is returned.
    pub async fn close(&self) -> StoreResult<()> {
        let conn = Arc::clone(&self.conn);
        let flag = Arc::clone(&self.open);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            let Some(open) = guard.take() else {
                debug!("store already closed");
                return Ok(());
            };
            match open.close() {
                Ok(()) => {
                    flag.store(false, Ordering::Release);
                    info!("store closed");
                    Ok(())
                }
                Err((open, e)) => {
                    warn!(error = %e, "failed to close store");
                    *guard = Some(open);
                    Err(StoreError::Connection(format!("close failed: {e}")))
                }
            }
        })
        .await?
    }

    /// Open the store, run `f`, then close the store on every exit path.
    ///
    /// If the store was already open when `scope` was called, it is left
    /// open: only a connection opened here is closed here. When both `f`
    /// and the close fail, the error from `f` is returned.
    pub async fn scope<F, Fut, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(Store) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let opened = self.open_if_closed().await?;
        let result = f(self.clone()).await;
        if !opened {
            return result;
        }
        finish_scope(result, self.close().await)
    }

    /// Create the `users` table and its unique index if they are missing.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        self.with_conn(schema::ensure).await
    }

    // ── queries ──────────────────────────────────────────────────────

    /// Run a mutating statement (insert, update, delete).
    pub async fn execute(&self, statement: &str, params: Params) -> StoreResult<()> {
        let statement = statement.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(&statement, rusqlite::params_from_iter(params.iter()))?;
            debug!(changed, "statement executed");
            Ok(())
        })
        .await
    }

    /// Return the first row matching `query`, or `None` when nothing
    /// matches.
    pub async fn fetch_one<T: FromRow>(&self, query: &str, params: Params) -> StoreResult<Option<T>> {
        let query = query.to_string();
        self.with_conn(move |conn| {
            let result = conn.query_row(
                &query,
                rusqlite::params_from_iter(params.iter()),
                T::from_row,
            );
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(StoreError::Query(e)),
            }
        })
        .await
    }

    /// Return every row matching `query` in the order SQLite yields them.
    pub async fn fetch_all<T: FromRow>(&self, query: &str, params: Params) -> StoreResult<Vec<T>> {
        let query = query.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), T::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            debug!(rows = rows.len(), "rows fetched");
            Ok(rows)
        })
        .await
    }

    /// Run `f` against the open connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }
}

// ── internals ────────────────────────────────────────────────────────

/// Combine the outcome of a scoped body with the outcome of its close.
fn finish_scope<T>(result: StoreResult<T>, closed: StoreResult<()>) -> StoreResult<T> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "close failed after scoped error");
            Err(e)
        }
    }
}

fn lock(conn: &Mutex<Option<Connection>>) -> StoreResult<MutexGuard<'_, Option<Connection>>> {
    conn.lock()
        .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))
}

/// Open a fresh connection for `config` and apply pragmas.
fn connect(config: &StoreConfig) -> StoreResult<Connection> {
    let conn = match &config.path {
        Some(path) => {
            info!(path = %path.display(), "opening store");
            Connection::open(path)
        }
        None => {
            debug!("opening in-memory store");
            Connection::open_in_memory()
        }
    }
    .map_err(|e| StoreError::Connection(format!("open failed: {e}")))?;

    apply_pragmas(&conn, config)
        .map_err(|e| StoreError::Connection(format!("failed to apply pragmas: {e}")))?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection, config: &StoreConfig) -> rusqlite::Result<()> {
    if !config.is_in_memory() {
        // WAL lets readers proceed while a write is in flight.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "journal mode set");
        conn.pragma_update(None, "synchronous", "NORMAL")?;
    }
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(u64::from(config.busy_timeout_ms)))?;
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────
