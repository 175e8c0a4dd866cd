//! Flat-file (CSV) person repository.
//!
//! # Responsibility
//! - Store one record per line under a header row.
//! - Rewrite the whole file when a change set is applied.
//!
//! # Invariants
//! - The header always lists `RecordSchema::columns()` for the active schema.
//! - Rewrites go through a sibling temp file and a rename, so readers never
//!   observe a partially written file.

use crate::model::person::{Person, PersonRow, RecordSchema};
use crate::repo::{ChangeSet, PersonRepository, RepoError, RepoResult};
use log::{info, warn};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const TEMP_SUFFIX: &str = "tmp";

/// Flat-file backing store bound to one path.
#[derive(Debug, Clone)]
pub struct CsvPersonRepository {
    path: PathBuf,
    schema: RecordSchema,
}

impl CsvPersonRepository {
    /// Binds the repository to `path`, creating a header-only file when the
    /// file does not exist yet.
    ///
    /// # Errors
    /// - Returns `Io`/`Csv` when the file cannot be created.
    /// - Returns `InvalidData` when an existing header lacks a schema column.
    pub fn open(path: impl AsRef<Path>, schema: RecordSchema) -> RepoResult<Self> {
        let repo = Self {
            path: path.as_ref().to_path_buf(),
            schema,
        };

        if repo.path.exists() {
            // Fail at startup rather than at the first save.
            repo.list_all()?;
        } else {
            if let Some(parent) = repo.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            repo.write_rows(&[])?;
            info!(
                "event=store_create module=repo backend=csv status=ok schema={}",
                schema
            );
        }

        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> RecordSchema {
        self.schema
    }

    fn write_rows(&self, persons: &[Person]) -> RepoResult<()> {
        self.replace_via_temp(|writer| {
            writer.write_record(self.schema.columns())?;
            for person in persons {
                let row = PersonRow::from_person(person);
                writer.write_record(row.values(self.schema))?;
            }
            Ok(())
        })
    }

    /// Writes through a sibling temp file, then renames it over the store.
    /// The temp file is removed when writing fails.
    fn replace_via_temp<F>(&self, write: F) -> RepoResult<()>
    where
        F: FnOnce(&mut csv::Writer<File>) -> RepoResult<()>,
    {
        let temp_path = self.temp_path();
        let mut writer = csv::Writer::from_writer(File::create(&temp_path)?);
        let written = write(&mut writer).and_then(|()| writer.flush().map_err(RepoError::from));
        drop(writer);

        if let Err(err) = written {
            if let Err(cleanup_err) = fs::remove_file(&temp_path) {
                warn!(
                    "event=store_apply module=repo backend=csv status=error error_code=temp_cleanup error={cleanup_err}"
                );
            }
            return Err(err);
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(TEMP_SUFFIX);
        self.path.with_file_name(name)
    }
}

impl PersonRepository for CsvPersonRepository {
    fn list_all(&self) -> RepoResult<Vec<Person>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        for column in self.schema.columns() {
            if !headers.iter().any(|header| header == *column) {
                return Err(RepoError::InvalidData(format!(
                    "header of `{}` is missing column `{column}`",
                    self.path.display()
                )));
            }
        }

        let mut persons = Vec::new();
        for (index, row) in reader.deserialize::<PersonRow>().enumerate() {
            let person = row?
                .into_person(self.schema)
                .map_err(|err| RepoError::invalid_row(index, err))?;
            persons.push(person);
        }
        Ok(persons)
    }

    fn apply_changes(&self, changes: &ChangeSet) -> RepoResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut persons = self.list_all()?;
        for deleted in &changes.deletes {
            let Some(index) = persons.iter().position(|person| person == deleted) else {
                return Err(RepoError::InvalidData(format!(
                    "row scheduled for deletion is no longer stored in `{}`",
                    self.path.display()
                )));
            };
            persons.remove(index);
        }
        persons.extend(changes.inserts.iter().cloned());
        self.write_rows(&persons)?;

        info!(
            "event=store_apply module=repo backend=csv status=ok inserted={} deleted={} rows={}",
            changes.inserts.len(),
            changes.deletes.len(),
            persons.len()
        );
        Ok(())
    }
}
