/*!
 * SQLite handle for the session store.
 *
 * One connection per store, shared behind a mutex. Reads get the plain
 * connection; writes run inside a transaction that commits only when the
 * closure succeeds.
 */

use anyhow::{Context, Result};
use log::info;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::schema;

/// Shared SQLite connection with its schema initialised
#[derive(Clone)]
pub struct DatabaseConnection {
    // @field: Backing file, or `:memory:`
    location: PathBuf,

    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DatabaseConnection({})", self.location.display())
    }
}

impl DatabaseConnection {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        info!("Opening session database at {:?}", path);
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        Self::initialised(conn, path.to_path_buf())
    }

    /// Open the database under the user's config directory
    pub fn open_default() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Self::open(base_dir.join("capfetch").join("session.db"))
    }

    /// Database that lives only as long as this handle
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        Self::initialised(conn, PathBuf::from(":memory:"))
    }

    fn initialised(conn: Connection, location: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        Ok(Self {
            location,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Where the database lives
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Run a read against the connection
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        f(&self.conn.lock())
    }

    /// Run `f` in a transaction, committing only when it succeeds
    pub fn write<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
