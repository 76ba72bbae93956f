//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

/// Handle shared between the sync engine and the inbox read path.
///
/// Every store call locks for its own duration only, which makes each
/// operation atomic with respect to the other holders.
#[derive(Clone)]
pub struct SharedDatabase(Arc<Mutex<Database>>);

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/postbox/inbox.db`
    /// - macOS:   `~/Library/Application Support/com.postbox.postbox/inbox.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\postbox\postbox\data\inbox.db`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "postbox", "postbox").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("inbox.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    pub fn into_shared(self) -> SharedDatabase {
        SharedDatabase(Arc::new(Mutex::new(self)))
    }
}

impl SharedDatabase {
    /// Lock the database for one operation.
    pub fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.0.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Run `f` with the lock held and return its result.
    pub fn with<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.lock()?;
        f(&guard)
    }
}
