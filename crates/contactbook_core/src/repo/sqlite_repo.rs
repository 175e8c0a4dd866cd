//! SQLite-backed person repository.
//!
//! # Responsibility
//! - Store one record per `persons` row, in insertion order.
//! - Apply reconciliation diffs as row-level deletes and inserts.
//!
//! # Invariants
//! - Rows are validated against the configured schema on every read.
//! - A change set is applied inside one immediate transaction.

use crate::model::person::{Person, PersonRow, RecordSchema};
use crate::repo::{ChangeSet, PersonRepository, RepoError, RepoResult};
use log::{info, warn};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

const PERSON_SELECT_SQL: &str = "SELECT
    first_name,
    last_name,
    date_of_birth,
    email,
    phone
FROM persons
ORDER BY id ASC;";

/// Database backing store over a borrowed, already-migrated connection.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
    schema: RecordSchema,
}

impl<'conn> SqlitePersonRepository<'conn> {
    pub fn new(conn: &'conn Connection, schema: RecordSchema) -> Self {
        Self { conn, schema }
    }

    pub fn schema(&self) -> RecordSchema {
        self.schema
    }
}

impl PersonRepository for SqlitePersonRepository<'_> {
    fn list_all(&self) -> RepoResult<Vec<Person>> {
        let mut stmt = self.conn.prepare(PERSON_SELECT_SQL)?;
        let rows = stmt.query_map([], |row| {
            Ok(PersonRow {
                first_name: row.get("first_name")?,
                last_name: row.get("last_name")?,
                date_of_birth: row.get("date_of_birth")?,
                email: row.get("email")?,
                phone: row.get("phone")?,
            })
        })?;

        let mut persons = Vec::new();
        for (index, row) in rows.enumerate() {
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

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for person in &changes.deletes {
            delete_one_in_tx(&tx, &PersonRow::from_person(person))?;
        }
        for person in &changes.inserts {
            insert_in_tx(&tx, &PersonRow::from_person(person))?;
        }
        tx.commit()?;

        info!(
            "event=store_apply module=repo backend=sqlite status=ok inserted={} deleted={}",
            changes.inserts.len(),
            changes.deletes.len()
        );
        Ok(())
    }
}

fn insert_in_tx(tx: &Transaction<'_>, row: &PersonRow) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO persons (
            first_name,
            last_name,
            date_of_birth,
            email,
            phone
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            row.first_name.as_str(),
            row.last_name.as_str(),
            row.date_of_birth.as_deref(),
            row.email.as_deref(),
            row.phone.as_deref(),
        ],
    )?;
    Ok(())
}

/// Removes the oldest row equal to `row`.
///
/// A change set is only valid against the rows it was computed from, so a
/// delete that matches nothing fails and the whole transaction rolls back.
fn delete_one_in_tx(tx: &Transaction<'_>, row: &PersonRow) -> RepoResult<()> {
    let affected = tx.execute(
        "DELETE FROM persons
         WHERE id = (
            SELECT id FROM persons
            WHERE first_name = ?1
              AND last_name = ?2
              AND date_of_birth IS ?3
              AND email IS ?4
              AND phone IS ?5
            ORDER BY id ASC
            LIMIT 1
         );",
        params![
            row.first_name.as_str(),
            row.last_name.as_str(),
            row.date_of_birth.as_deref(),
            row.email.as_deref(),
            row.phone.as_deref(),
        ],
    )?;
    if affected != 1 {
        warn!("event=store_apply module=repo backend=sqlite status=error error_code=stale_delete");
        return Err(RepoError::InvalidData(
            "row scheduled for deletion is no longer stored".to_string(),
        ));
    }
    Ok(())
}
