//! Core domain logic for the contact book.
//! This crate is the single source of truth for record and store invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::person::{
    normalize_name, Person, PersonDetails, PersonDraft, PersonRow, PersonValidationError,
    RecordSchema,
};
pub use repo::csv_repo::CsvPersonRepository;
pub use repo::sqlite_repo::SqlitePersonRepository;
pub use repo::{ChangeSet, PersonRepository, RepoError, RepoResult};
pub use service::person_store::{
    PendingChanges, PersonAge, PersonStore, SaveReport, SortColumn, StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
