/*!
 * Session persistence.
 *
 * `SessionStore` owns the device session record and delegates storage to a
 * `KeyValueStore` backend: a JSON file, an SQLite database or memory.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use super::model::Session;
use crate::database::DatabaseConnection;
use crate::errors::CatalogError;

/// Record key for the device identifier
pub const DEVICE_ID_KEY: &str = "device_id";

/// Record key for the device token
pub const DEVICE_TOKEN_KEY: &str = "device_token";

/// Default session file name under the config directory
const DEFAULT_SESSION_FILENAME: &str = "session.json";

/// Directory name under the user's config directory
const DEFAULT_SESSION_DIRNAME: &str = "capfetch";

/// Flat record of string keys and values
pub type Record = BTreeMap<String, String>;

/// Storage backend for the session record
///
/// `save` replaces the whole record at once, so readers never observe a
/// device id from one login paired with a token from another.
pub trait KeyValueStore: Send + Sync + Debug {
    /// Load the stored record; an empty record when nothing was saved yet
    fn load(&self) -> Result<Record>;

    /// Replace the stored record
    fn save(&self, record: &Record) -> Result<()>;
}

/// Session record kept in a small JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location under the user's config directory
    pub fn new_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// Default session file path
    pub fn default_path() -> Result<PathBuf> {
        let base_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(base_dir.join(DEFAULT_SESSION_DIRNAME).join(DEFAULT_SESSION_FILENAME))
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self) -> Result<Record> {
        if !self.path.exists() {
            return Ok(Record::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(Record::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {:?}", self.path))
    }

    fn save(&self, record: &Record) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(record)
            .context("Failed to serialize session record")?;

        // Replace the record by renaming a fully written sibling file
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write session file: {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace session file: {:?}", self.path))?;

        debug!("Session record written to {:?}", self.path);
        Ok(())
    }
}

/// Session record kept in the SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    /// Store backed by an open database
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Store backed by an in-memory database
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::open_in_memory()?))
    }
}

impl KeyValueStore for SqliteStore {
    fn load(&self) -> Result<Record> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM session_entries")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut record = Record::new();
            for row in rows {
                let (key, value) = row?;
                record.insert(key, value);
            }
            Ok(record)
        })
    }

    fn save(&self, record: &Record) -> Result<()> {
        self.db.write(|tx| {
            tx.execute("DELETE FROM session_entries", [])?;
            for (key, value) in record {
                tx.execute(
                    "INSERT INTO session_entries (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
                    rusqlite::params![key, value],
                )?;
            }
            Ok(())
        })
    }
}

/// Session record kept in memory only
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    record: Arc<Mutex<Record>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with a record
    pub fn with_record(record: Record) -> Self {
        Self {
            record: Arc::new(Mutex::new(record)),
            saves: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of times `save` was called
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self) -> Result<Record> {
        Ok(self.record.lock().clone())
    }

    fn save(&self, record: &Record) -> Result<()> {
        *self.record.lock() = record.clone();
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// Which backend to persist the session with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// JSON file
    #[default]
    Json,
    /// SQLite database
    Sqlite,
    /// Not persisted across runs
    Memory,
}

/// Owner of the persisted device session
#[derive(Debug, Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    /// Wrap a storage backend
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Open the configured backend, at `path` or its default location
    pub fn open(backend: SessionBackend, path: Option<&Path>) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match backend {
            SessionBackend::Json => match path {
                Some(path) => Arc::new(JsonFileStore::new(path)),
                None => Arc::new(JsonFileStore::new_default()?),
            },
            SessionBackend::Sqlite => {
                let db = match path {
                    Some(path) => DatabaseConnection::open(path)?,
                    None => DatabaseConnection::open_default()?,
                };
                Arc::new(SqliteStore::new(db))
            }
            SessionBackend::Memory => Arc::new(MemoryStore::new()),
        };

        debug!("Using {:?} session store", backend);
        Ok(Self::new(store))
    }

    /// Load a complete session, if one was saved
    pub fn load(&self) -> Result<Option<Session>, CatalogError> {
        let record = self.read()?;
        let device_id = record.get(DEVICE_ID_KEY).filter(|v| !v.is_empty());
        let device_token = record.get(DEVICE_TOKEN_KEY).filter(|v| !v.is_empty());

        Ok(match (device_id, device_token) {
            (Some(id), Some(token)) => Some(Session::new(id.clone(), token.clone())),
            _ => None,
        })
    }

    /// Persist a session, replacing the previous one
    pub fn save(&self, session: &Session) -> Result<(), CatalogError> {
        let mut record = self.read()?;
        record.insert(DEVICE_ID_KEY.to_string(), session.device_id.clone());
        record.insert(DEVICE_TOKEN_KEY.to_string(), session.device_token.clone());
        self.write(&record)
    }

    /// The installation's device identifier, generated and persisted on first use
    pub fn device_id(&self) -> Result<String, CatalogError> {
        let mut record = self.read()?;
        if let Some(id) = record.get(DEVICE_ID_KEY).filter(|v| !v.is_empty()) {
            return Ok(id.clone());
        }

        let id = Uuid::new_v4().to_string();
        info!("Generated new device id {}", id);
        record.insert(DEVICE_ID_KEY.to_string(), id.clone());
        record.remove(DEVICE_TOKEN_KEY);
        self.write(&record)?;
        Ok(id)
    }

    /// `save` on the blocking pool, for callers on the async runtime
    pub async fn save_blocking(&self, session: Session) -> Result<(), CatalogError> {
        let store = self.clone();
        join_blocking(tokio::task::spawn_blocking(move || store.save(&session))).await
    }

    /// `device_id` on the blocking pool, for callers on the async runtime
    pub async fn device_id_blocking(&self) -> Result<String, CatalogError> {
        let store = self.clone();
        join_blocking(tokio::task::spawn_blocking(move || store.device_id())).await
    }

    fn read(&self) -> Result<Record, CatalogError> {
        self.backend
            .load()
            .map_err(|e| CatalogError::Storage(format!("{:#}", e)))
    }

    fn write(&self, record: &Record) -> Result<(), CatalogError> {
        self.backend
            .save(record)
            .map_err(|e| CatalogError::Storage(format!("{:#}", e)))
    }
}

async fn join_blocking<T>(
    task: tokio::task::JoinHandle<Result<T, CatalogError>>,
) -> Result<T, CatalogError> {
    task.await
        .map_err(|e| CatalogError::Storage(format!("Session store task failed: {}", e)))?
}
