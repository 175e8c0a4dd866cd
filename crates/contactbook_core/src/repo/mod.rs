//! Backing store contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the record-level contract every backing store honors.
//! - Isolate SQL and flat-file details from the Person Store.
//!
//! # Invariants
//! - Repositories speak only in validated `Person` values.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `apply_changes` is all-or-nothing from the caller's point of view.

use crate::db::DbError;
use crate::model::person::{Person, PersonValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod csv_repo;
pub mod sqlite_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error raised by backing store reads and writes.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Io(std::io::Error),
    Csv(csv::Error),
    /// A persisted row or header does not describe a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Csv(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted person data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for RepoError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl RepoError {
    pub(crate) fn invalid_row(index: usize, err: PersonValidationError) -> Self {
        Self::InvalidData(format!("row {index}: {err}"))
    }
}

/// Minimal set of inserts/deletes that turns stored rows into a target set.
///
/// Each entry in `deletes` removes exactly one stored row equal to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub inserts: Vec<Person>,
    pub deletes: Vec<Person>,
}

impl ChangeSet {
    /// Computes the diff that makes `stored` equal to `target`.
    ///
    /// Rows are compared by full-record equality and matched one-to-one, so
    /// duplicate rows in either side are accounted for individually.
    pub fn between(stored: &[Person], target: &[Person]) -> Self {
        let mut unmatched: Vec<&Person> = stored.iter().collect();
        let mut inserts = Vec::new();

        for person in target {
            match unmatched.iter().position(|candidate| *candidate == person) {
                Some(index) => {
                    unmatched.swap_remove(index);
                }
                None => inserts.push(person.clone()),
            }
        }

        Self {
            inserts,
            deletes: unmatched.into_iter().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }
}

/// Record-level contract of a backing store.
///
/// Implementations may be a database table or a flat file; callers never see
/// paths or connection details through this trait.
pub trait PersonRepository {
    /// Reads every stored record in storage order.
    fn list_all(&self) -> RepoResult<Vec<Person>>;
    /// Applies `changes` to the stored rows.
    fn apply_changes(&self, changes: &ChangeSet) -> RepoResult<()>;
}

impl<R: PersonRepository + ?Sized> PersonRepository for &R {
    fn list_all(&self) -> RepoResult<Vec<Person>> {
        (**self).list_all()
    }

    fn apply_changes(&self, changes: &ChangeSet) -> RepoResult<()> {
        (**self).apply_changes(changes)
    }
}
