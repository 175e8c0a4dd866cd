//! Person database bootstrap.
//!
//! # Responsibility
//! - Open the SQLite file (or an in-memory database) behind the database
//!   backend and bring its `persons` table up to date.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Person rows must not be read or written before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the person database.
#[derive(Debug)]
pub enum DbError {
    /// The database could not be opened; `path` is `None` for in-memory.
    Open {
        path: Option<PathBuf>,
        source: rusqlite::Error,
    },
    /// Applying migration `version` failed and was rolled back.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file was written by a newer build with a schema we cannot read.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    Sqlite(rusqlite::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open {
                path: Some(path),
                source,
            } => write!(f, "cannot open person database `{}`: {source}", path.display()),
            Self::Open { path: None, source } => {
                write!(f, "cannot open in-memory person database: {source}")
            }
            Self::Migration { version, source } => {
                write!(f, "person database migration {version} failed: {source}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "person database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Sqlite(err) => write!(f, "person database error: {err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Migration { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
