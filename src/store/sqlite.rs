//! SQLite-backed record store.
//!
//! Schema (`user_version` 1):
//!
//! ```sql
//! CREATE TABLE hosts (
//!     hostname     TEXT PRIMARY KEY NOT NULL,
//!     canister_id  TEXT,
//!     gateway_hint TEXT,
//!     resolved_at  INTEGER NOT NULL
//! )
//! ```
//!
//! `rusqlite` is synchronous, so every statement runs on the blocking pool.

use super::{HostRecord, HostStore, OpenHostStore, StoreFuture};
use crate::base::error::ResolveError;
use crate::canister::CanisterId;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SCHEMA_VERSION: i32 = 1;

/// Record store over a single SQLite connection.
#[derive(Clone)]
pub struct SqliteHostStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHostStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, ResolveError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, ResolveError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, ResolveError> {
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(ResolveError::store(format!(
                "unsupported schema version {}",
                version
            )));
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS hosts (
                hostname     TEXT PRIMARY KEY NOT NULL,
                canister_id  TEXT,
                gateway_hint TEXT,
                resolved_at  INTEGER NOT NULL
            );",
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn get_blocking(conn: &Mutex<Connection>, hostname: &str) -> Result<Option<HostRecord>, ResolveError> {
        let conn = conn
            .lock()
            .map_err(|_| ResolveError::store("connection mutex poisoned"))?;

        let row = conn
            .query_row(
                "SELECT canister_id, gateway_hint, resolved_at FROM hosts WHERE hostname = ?1",
                params![hostname],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((canister_text, gateway_hint, resolved_at)) = row else {
            return Ok(None);
        };

        let canister_id = match canister_text {
            Some(text) => match CanisterId::from_text(&text) {
                Ok(id) => Some(id),
                Err(e) => {
                    // A row we cannot trust is as good as no row.
                    tracing::warn!(hostname = %hostname, value = %text, error = %e, "discarding corrupt host record");
                    return Ok(None);
                }
            },
            None => None,
        };

        Ok(Some(HostRecord::new(
            hostname,
            canister_id,
            gateway_hint,
            resolved_at,
        )))
    }

    fn put_blocking(conn: &Mutex<Connection>, record: &HostRecord) -> Result<(), ResolveError> {
        let conn = conn
            .lock()
            .map_err(|_| ResolveError::store("connection mutex poisoned"))?;

        conn.execute(
            "INSERT INTO hosts (hostname, canister_id, gateway_hint, resolved_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(hostname) DO UPDATE SET
                canister_id = excluded.canister_id,
                gateway_hint = excluded.gateway_hint,
                resolved_at = excluded.resolved_at",
            params![
                record.hostname,
                record.canister_id.as_ref().map(CanisterId::to_text),
                record.gateway_hint,
                record.resolved_at_epoch_millis,
            ],
        )?;
        Ok(())
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<usize, ResolveError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ResolveError::store("connection mutex poisoned"))?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM hosts", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl HostStore for SqliteHostStore {
    fn get(&self, hostname: &str) -> StoreFuture<Option<HostRecord>> {
        let conn = Arc::clone(&self.conn);
        let hostname = hostname.to_string();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || Self::get_blocking(&conn, &hostname))
                .await
                .map_err(|e| ResolveError::store(format!("store task failed: {}", e)))?
        })
    }

    fn put(&self, record: HostRecord) -> StoreFuture<()> {
        let conn = Arc::clone(&self.conn);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || Self::put_blocking(&conn, &record))
                .await
                .map_err(|e| ResolveError::store(format!("store task failed: {}", e)))?
        })
    }
}

impl std::fmt::Debug for SqliteHostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHostStore").finish_non_exhaustive()
    }
}

/// Opens a [`SqliteHostStore`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SqliteStoreOpener {
    path: PathBuf,
}

impl SqliteStoreOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OpenHostStore for SqliteStoreOpener {
    fn open(&self) -> StoreFuture<Arc<dyn HostStore>> {
        let path = self.path.clone();
        Box::pin(async move {
            let store = tokio::task::spawn_blocking(move || SqliteHostStore::open(&path))
                .await
                .map_err(|e| ResolveError::store(format!("store task failed: {}", e)))??;
            Ok(Arc::new(store) as Arc<dyn HostStore>)
        })
    }
}
