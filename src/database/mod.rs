//! SQLite token index store.
//!
//! Holds the persisted form of the [`TokenIndex`](crate::index::TokenIndex):
//! `alias_index(token, table_name)` and `column_index(token, table_name,
//! column_name)`, plus a `registry_meta` table carrying the registry version.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;

mod schema;
mod tokens;

pub use tokens::escape_like;

/// Name of the version counter row in `registry_meta`
pub const REGISTRY_VERSION_KEY: &str = "registry_version";

/// The token index database connection and operations
pub struct IndexDatabase {
    pub(crate) conn: Connection,
    pub(crate) file_path: PathBuf,
}

impl IndexDatabase {
    /// Open (or create) the database and initialize its schema
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let file_path = db_path.as_ref().to_path_buf();

        info!("Opening token index database at: {}", file_path.display());

        let conn = Connection::open(&file_path)?;

        // Readers wait for an in-flight merge transaction instead of failing
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;

        let mut db = Self { conn, file_path };
        db.initialize_schema()?;

        debug!("Token index database ready");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self {
            conn,
            file_path: PathBuf::from(":memory:"),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}
