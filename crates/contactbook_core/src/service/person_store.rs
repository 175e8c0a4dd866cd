//! Person Store: session working set reconciled against a backing store.
//!
//! # Responsibility
//! - Load every stored record once per session into an ordered working set.
//! - Serve add/delete/find/sort/age queries against the working set only.
//! - Track pending changes and persist them on explicit request.
//!
//! # Invariants
//! - The working set equals the backing store as of the last load/save,
//!   plus uncommitted in-session mutations.
//! - No two records in the working set share a `(first_name, last_name)` key
//!   that was added during the session.
//! - Name arguments are normalized exactly like stored names.
//! - `save` on a clean store never touches the backing store.

use crate::model::person::{normalize_name, Person, PersonValidationError, RecordSchema};
use crate::repo::{ChangeSet, PersonRepository, RepoError};
use chrono::{Local, NaiveDate};
use log::{debug, error, info};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by Person Store operations.
///
/// Everything except a `StoreUnavailable` at load time is recoverable by
/// the command loop.
#[derive(Debug)]
pub enum StoreError {
    Validation(PersonValidationError),
    DuplicateKey {
        first_name: String,
        last_name: String,
    },
    NotFound {
        first_name: String,
        last_name: String,
    },
    UnknownColumn(String),
    NoRecords,
    StoreUnavailable(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateKey {
                first_name,
                last_name,
            } => write!(f, "Person: {first_name} {last_name} already exists"),
            Self::NotFound {
                first_name,
                last_name,
            } => write!(f, "Person: {first_name} {last_name} does not exist"),
            Self::UnknownColumn(column) => write!(f, "unknown column `{column}`"),
            Self::NoRecords => write!(f, "no persons with a date of birth"),
            Self::StoreUnavailable(err) => write!(f, "backing store unavailable: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PersonValidationError> for StoreError {
    fn from(value: PersonValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::StoreUnavailable(value)
    }
}

/// Record field a listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    FirstName,
    LastName,
    DateOfBirth,
    Email,
    Phone,
}

impl SortColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::DateOfBirth => "date_of_birth",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }

    /// Whether records of `schema` carry this column.
    pub fn applies_to(self, schema: RecordSchema) -> bool {
        schema.columns().contains(&self.as_str())
    }

    fn compare(self, left: &Person, right: &Person) -> Ordering {
        match self {
            Self::FirstName => left.first_name().cmp(right.first_name()),
            Self::LastName => left.last_name().cmp(right.last_name()),
            Self::DateOfBirth => left.date_of_birth().cmp(&right.date_of_birth()),
            Self::Email => left.email().cmp(&right.email()),
            Self::Phone => left.phone().cmp(&right.phone()),
        }
    }
}

impl FromStr for SortColumn {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "first_name" => Ok(Self::FirstName),
            "last_name" => Ok(Self::LastName),
            "date_of_birth" => Ok(Self::DateOfBirth),
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            other => Err(StoreError::UnknownColumn(other.to_string())),
        }
    }
}

/// Mutation counters since the last load or save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingChanges {
    pub added: usize,
    pub deleted: usize,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.deleted == 0
    }
}

/// Rows written to the backing store by one `save`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub inserted: usize,
    pub deleted: usize,
}

/// Age of one matched record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonAge {
    pub person: Person,
    /// `None` when the record has no date of birth.
    pub years: Option<u32>,
}

/// Session-scoped working set over a backing store.
pub struct PersonStore<R: PersonRepository> {
    repo: R,
    schema: RecordSchema,
    persons: Vec<Person>,
    pending: PendingChanges,
}

impl<R: PersonRepository> PersonStore<R> {
    /// Loads the full backing store into a fresh, clean working set.
    ///
    /// # Errors
    /// - `StoreUnavailable` when the backing store cannot be read or holds
    ///   rows that fail validation.
    pub fn load(repo: R, schema: RecordSchema) -> StoreResult<Self> {
        let started_at = Instant::now();
        let persons = repo.list_all().map_err(|err| {
            error!(
                "event=store_load module=store status=error error_code=store_unavailable error={err}"
            );
            StoreError::StoreUnavailable(err)
        })?;

        info!(
            "event=store_load module=store status=ok schema={} count={} duration_ms={}",
            schema,
            persons.len(),
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            repo,
            schema,
            persons,
            pending: PendingChanges::default(),
        })
    }

    pub fn schema(&self) -> RecordSchema {
        self.schema
    }

    /// Working set in insertion order.
    pub fn list(&self) -> &[Person] {
        &self.persons
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_changes(&self) -> PendingChanges {
        self.pending
    }

    /// Records satisfying `matcher`, in working-set order.
    pub fn find_by<F>(&self, matcher: F) -> Vec<&Person>
    where
        F: Fn(&Person) -> bool,
    {
        self.persons.iter().filter(|person| matcher(*person)).collect()
    }

    /// True iff some record carries exactly this (normalized) key.
    pub fn exists(&self, first_name: &str, last_name: &str) -> bool {
        let (first_name, last_name) = (normalize_name(first_name), normalize_name(last_name));
        !self
            .find_by(|person| person.has_name(&first_name, &last_name))
            .is_empty()
    }

    /// Records whose first or last name contains the normalized `term`.
    ///
    /// No match yields an empty sequence, not an error.
    pub fn find(&self, term: &str) -> Vec<&Person> {
        let term = normalize_name(term);
        self.find_by(|person| {
            person.first_name().contains(term.as_str()) || person.last_name().contains(term.as_str())
        })
    }

    /// Stable ordering of the working set by `column`; the stored order is
    /// left untouched.
    ///
    /// Descending is the exact reverse of ascending, ties included.
    pub fn sort(&self, ascending: bool, column: &str) -> StoreResult<Vec<&Person>> {
        let column: SortColumn = column.parse()?;
        if !column.applies_to(self.schema) {
            return Err(StoreError::UnknownColumn(column.as_str().to_string()));
        }

        let mut sorted: Vec<&Person> = self.persons.iter().collect();
        sorted.sort_by(|left, right| column.compare(left, right));
        if !ascending {
            sorted.reverse();
        }
        Ok(sorted)
    }

    /// Ages of every record matching both name substrings.
    pub fn age_of(&self, first_name: &str, last_name: &str) -> StoreResult<Vec<PersonAge>> {
        self.age_of_on(first_name, last_name, today())
    }

    pub fn age_of_on(
        &self,
        first_name: &str,
        last_name: &str,
        today: NaiveDate,
    ) -> StoreResult<Vec<PersonAge>> {
        let (first_name, last_name) = (normalize_name(first_name), normalize_name(last_name));
        let ages: Vec<PersonAge> = self
            .find_by(substring_key_matcher(&first_name, &last_name))
            .into_iter()
            .map(|person| PersonAge {
                person: person.clone(),
                years: person.age_on(today),
            })
            .collect();

        if ages.is_empty() {
            return Err(StoreError::NotFound {
                first_name,
                last_name,
            });
        }
        Ok(ages)
    }

    /// Mean age over records that carry a date of birth.
    pub fn average_age(&self) -> StoreResult<f64> {
        self.average_age_on(today())
    }

    pub fn average_age_on(&self, today: NaiveDate) -> StoreResult<f64> {
        let ages: Vec<u32> = self
            .persons
            .iter()
            .filter_map(|person| person.age_on(today))
            .collect();

        if ages.is_empty() {
            return Err(StoreError::NoRecords);
        }
        let total: u64 = ages.iter().map(|age| u64::from(*age)).sum();
        Ok(total as f64 / ages.len() as f64)
    }

    /// Appends `person` unless its key is already in the working set.
    pub fn add(&mut self, person: Person) -> StoreResult<&Person> {
        if person.schema() != self.schema {
            return Err(StoreError::Validation(PersonValidationError::SchemaMismatch {
                expected: self.schema,
                found: person.schema(),
            }));
        }
        if self.exists(person.first_name(), person.last_name()) {
            debug!("event=person_add module=store status=rejected error_code=duplicate_key");
            return Err(StoreError::DuplicateKey {
                first_name: person.first_name().to_string(),
                last_name: person.last_name().to_string(),
            });
        }

        self.persons.push(person);
        self.pending.added += 1;
        debug!(
            "event=person_add module=store status=ok count={}",
            self.persons.len()
        );

        let index = self.persons.len() - 1;
        Ok(&self.persons[index])
    }

    /// Removes every record whose names contain both normalized substrings.
    ///
    /// Returns the number of removed records.
    pub fn delete(&mut self, first_name: &str, last_name: &str) -> StoreResult<usize> {
        let (first_name, last_name) = (normalize_name(first_name), normalize_name(last_name));
        let before = self.persons.len();
        {
            let matcher = substring_key_matcher(&first_name, &last_name);
            self.persons.retain(|person| !matcher(person));
        }

        let removed = before - self.persons.len();
        if removed == 0 {
            return Err(StoreError::NotFound {
                first_name,
                last_name,
            });
        }

        self.pending.deleted += removed;
        debug!("event=person_delete module=store status=ok removed={removed}");
        Ok(removed)
    }

    /// Reconciles the backing store with the working set.
    ///
    /// Clean stores return an empty report without any backing-store access.
    /// Otherwise the current stored rows are re-read, diffed against the
    /// working set, and only the difference is applied.
    pub fn save(&mut self) -> StoreResult<SaveReport> {
        if !self.is_dirty() {
            return Ok(SaveReport::default());
        }

        let started_at = Instant::now();
        let result = self
            .repo
            .list_all()
            .and_then(|stored| {
                let changes = ChangeSet::between(&stored, &self.persons);
                if !changes.is_empty() {
                    self.repo.apply_changes(&changes)?;
                }
                Ok(changes)
            });

        let changes = match result {
            Ok(changes) => changes,
            Err(err) => {
                error!(
                    "event=store_save module=store status=error error_code=store_unavailable error={err}"
                );
                return Err(StoreError::StoreUnavailable(err));
            }
        };

        self.pending = PendingChanges::default();
        let report = SaveReport {
            inserted: changes.inserts.len(),
            deleted: changes.deletes.len(),
        };
        info!(
            "event=store_save module=store status=ok inserted={} deleted={} duration_ms={}",
            report.inserted,
            report.deleted,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Ends the session, handing back the backing store.
    ///
    /// Pending changes that were not saved are discarded.
    pub fn into_repository(self) -> R {
        if self.is_dirty() {
            info!(
                "event=store_close module=store status=discarded added={} deleted={}",
                self.pending.added, self.pending.deleted
            );
        }
        self.repo
    }
}

fn substring_key_matcher<'a>(
    first_name: &'a str,
    last_name: &'a str,
) -> impl Fn(&Person) -> bool + 'a {
    move |person| person.first_name().contains(first_name) && person.last_name().contains(last_name)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
