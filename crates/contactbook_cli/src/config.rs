//! Command-line and environment configuration.
//!
//! # Responsibility
//! - Parse startup flags with environment-variable fallbacks.
//! - Resolve defaults (store path, log directory, log level).

use clap::{Parser, ValueEnum};
use contactbook_core::{default_log_level, RecordSchema};
use std::path::PathBuf;

const DEFAULT_CSV_FILE: &str = "persons.csv";
const DEFAULT_SQLITE_FILE: &str = "persons.sqlite3";
const DEFAULT_LOG_SUBDIR: &str = "contactbook/logs";

/// Backing store medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Flat CSV file with a header row.
    Csv,
    /// SQLite database file.
    Sqlite,
}

/// Record payload, mirrored from `RecordSchema` for argument parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaArg {
    /// First/last name and an optional date of birth.
    Birthday,
    /// First/last name, a required email and an optional phone.
    Contact,
}

impl From<SchemaArg> for RecordSchema {
    fn from(value: SchemaArg) -> Self {
        match value {
            SchemaArg::Birthday => Self::Birthday,
            SchemaArg::Contact => Self::Contact,
        }
    }
}

/// Contact book - list, add, delete, search and sort persons.
#[derive(Debug, Parser)]
#[command(name = "contactbook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Storage backend.
    #[arg(long, value_enum, env = "CONTACTBOOK_BACKEND", default_value = "csv")]
    pub backend: Backend,

    /// Path of the CSV file or SQLite database.
    #[arg(long, env = "CONTACTBOOK_PATH")]
    pub path: Option<PathBuf>,

    /// Record payload carried by every person.
    #[arg(long, value_enum, env = "CONTACTBOOK_SCHEMA", default_value = "birthday")]
    pub schema: SchemaArg,

    /// Log level: trace|debug|info|warn|error.
    #[arg(long, env = "CONTACTBOOK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files.
    #[arg(long, env = "CONTACTBOOK_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend: Backend,
    pub path: PathBuf,
    pub schema: RecordSchema,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Cli {
    pub fn into_settings(self) -> Settings {
        let path = self.path.unwrap_or_else(|| {
            PathBuf::from(match self.backend {
                Backend::Csv => DEFAULT_CSV_FILE,
                Backend::Sqlite => DEFAULT_SQLITE_FILE,
            })
        });

        Settings {
            backend: self.backend,
            path,
            schema: self.schema.into(),
            log_level: self
                .log_level
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: self
                .log_dir
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOG_SUBDIR)),
        }
    }
}
