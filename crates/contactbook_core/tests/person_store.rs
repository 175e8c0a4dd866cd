use chrono::NaiveDate;
use contactbook_core::{
    ChangeSet, PendingChanges, Person, PersonRepository, PersonStore, RecordSchema, RepoError,
    RepoResult, SaveReport, StoreError,
};
use std::cell::{Cell, RefCell};

/// In-memory backing store that records every write it receives.
#[derive(Default)]
struct RecordingRepository {
    rows: RefCell<Vec<Person>>,
    applied: RefCell<Vec<ChangeSet>>,
    reads: Cell<usize>,
    unavailable: Cell<bool>,
}

impl RecordingRepository {
    fn with_rows(rows: Vec<Person>) -> Self {
        Self {
            rows: RefCell::new(rows),
            ..Self::default()
        }
    }

    fn write_count(&self) -> usize {
        self.applied.borrow().len()
    }
}

impl PersonRepository for RecordingRepository {
    fn list_all(&self) -> RepoResult<Vec<Person>> {
        if self.unavailable.get() {
            return Err(RepoError::InvalidData("connection refused".to_string()));
        }
        self.reads.set(self.reads.get() + 1);
        Ok(self.rows.borrow().clone())
    }

    fn apply_changes(&self, changes: &ChangeSet) -> RepoResult<()> {
        if self.unavailable.get() {
            return Err(RepoError::InvalidData("connection refused".to_string()));
        }
        let mut rows = self.rows.borrow_mut();
        for deleted in &changes.deletes {
            if let Some(index) = rows.iter().position(|row| row == deleted) {
                rows.remove(index);
            }
        }
        rows.extend(changes.inserts.iter().cloned());
        self.applied.borrow_mut().push(changes.clone());
        Ok(())
    }
}

fn birthday(first: &str, last: &str, dob: Option<(i32, u32, u32)>) -> Person {
    let dob = dob.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
    Person::birthday(first, last, dob).unwrap()
}

fn contact(first: &str, last: &str, email: &str) -> Person {
    Person::contact(first, last, email, None).unwrap()
}

fn names(persons: &[&Person]) -> Vec<String> {
    persons
        .iter()
        .map(|person| format!("{} {}", person.first_name(), person.last_name()))
        .collect()
}

#[test]
fn load_reads_backing_store_into_clean_working_set() {
    let repo = RecordingRepository::with_rows(vec![
        birthday("ana", "lopez", None),
        birthday("bo", "diaz", None),
    ]);

    let store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.list()[0].first_name(), "Ana");
    assert!(!store.is_dirty());
}

#[test]
fn load_fails_when_backing_store_is_unavailable() {
    let repo = RecordingRepository::default();
    repo.unavailable.set(true);

    let err = PersonStore::load(&repo, RecordSchema::Birthday).err().unwrap();
    assert!(matches!(err, StoreError::StoreUnavailable(_)));
}

#[test]
fn add_find_delete_walkthrough() {
    let repo = RecordingRepository::default();
    let mut store = PersonStore::load(&repo, RecordSchema::Contact).unwrap();

    let added = store.add(contact("ana", "lopez", "a@x.com")).unwrap().clone();
    assert!(store.exists("ana", "lopez"));

    let found = store.find("lopez");
    assert_eq!(found, vec![&added]);

    assert_eq!(store.delete("ana", "lopez").unwrap(), 1);
    assert!(store.find("lopez").is_empty());
}

#[test]
fn duplicate_add_is_rejected_and_leaves_working_set_unchanged() {
    let repo = RecordingRepository::default();
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    store.add(birthday("ana", "lopez", None)).unwrap();
    let err = store
        .add(birthday("ANA", "lopez", Some((1990, 1, 1))))
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::DuplicateKey { ref first_name, ref last_name }
            if first_name == "Ana" && last_name == "Lopez"
    ));
    assert_eq!(store.len(), 1);
    assert_eq!(store.pending_changes().added, 1);
}

#[test]
fn duplicate_check_runs_against_loaded_records() {
    let repo = RecordingRepository::with_rows(vec![birthday("ana", "lopez", None)]);
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    let err = store.add(birthday("ana", "lopez", None)).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert!(!store.is_dirty());
}

#[test]
fn add_rejects_record_of_another_schema() {
    let repo = RecordingRepository::default();
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    let err = store.add(contact("ana", "lopez", "a@x.com")).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.is_empty());
}

#[test]
fn delete_removes_every_substring_match() {
    let repo = RecordingRepository::with_rows(vec![
        birthday("ana", "lopez", None),
        birthday("anabel", "lopezz", None),
        birthday("bo", "lopez", None),
        birthday("ana", "diaz", None),
    ]);
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    let removed = store.delete("ana", "lopez").unwrap();

    assert_eq!(removed, 2);
    assert_eq!(
        names(&store.find_by(|_| true)),
        vec!["Bo Lopez".to_string(), "Ana Diaz".to_string()]
    );
    assert_eq!(
        store.pending_changes(),
        PendingChanges {
            added: 0,
            deleted: 2
        }
    );
}

#[test]
fn delete_without_match_is_not_found_and_keeps_working_set() {
    let repo = RecordingRepository::with_rows(vec![birthday("ana", "lopez", None)]);
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    let err = store.delete(" zoe", "LOPEZ").unwrap_err();

    assert!(matches!(
        err,
        StoreError::NotFound { ref first_name, ref last_name }
            if first_name == "Zoe" && last_name == "Lopez"
    ));
    assert_eq!(store.len(), 1);
    assert!(!store.is_dirty());
}

#[test]
fn find_matches_first_or_last_name_and_returns_empty_on_miss() {
    let repo = RecordingRepository::with_rows(vec![
        birthday("ana", "lopez", None),
        birthday("lopez", "garcia", None),
        birthday("bo", "diaz", None),
    ]);
    let store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    assert_eq!(
        names(&store.find("lopez")),
        vec!["Ana Lopez".to_string(), "Lopez Garcia".to_string()]
    );
    assert!(store.find("nobody").is_empty());
}

#[test]
fn sort_directions_are_exact_reverses_and_do_not_mutate_order() {
    let repo = RecordingRepository::with_rows(vec![
        birthday("cy", "lopez", None),
        birthday("ana", "diaz", None),
        birthday("bo", "lopez", None),
        birthday("dee", "abad", None),
    ]);
    let store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    let ascending = store.sort(true, "last_name").unwrap();
    let mut descending = store.sort(false, "last_name").unwrap();
    assert_eq!(
        names(&ascending),
        vec!["Dee Abad", "Ana Diaz", "Cy Lopez", "Bo Lopez"]
    );
    descending.reverse();
    assert_eq!(ascending, descending);

    assert_eq!(store.list()[0].first_name(), "Cy");
}

#[test]
fn sort_by_date_of_birth_puts_unknown_dates_first() {
    let repo = RecordingRepository::with_rows(vec![
        birthday("ana", "lopez", Some((1990, 1, 1))),
        birthday("bo", "diaz", None),
        birthday("cy", "ng", Some((1980, 1, 1))),
    ]);
    let store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    let sorted = store.sort(true, "date_of_birth").unwrap();
    assert_eq!(names(&sorted), vec!["Bo Diaz", "Cy Ng", "Ana Lopez"]);
}

#[test]
fn sort_rejects_unknown_and_foreign_columns() {
    let repo = RecordingRepository::default();
    let store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    assert!(matches!(
        store.sort(true, "age").unwrap_err(),
        StoreError::UnknownColumn(column) if column == "age"
    ));
    assert!(matches!(
        store.sort(true, "email").unwrap_err(),
        StoreError::UnknownColumn(column) if column == "email"
    ));
    assert!(store.sort(true, "first_name").unwrap().is_empty());
}

#[test]
fn average_age_uses_records_with_birth_dates() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let repo = RecordingRepository::with_rows(vec![
        birthday("ana", "lopez", Some((1990, 1, 1))),
        birthday("bo", "diaz", Some((2000, 12, 31))),
        birthday("cy", "ng", None),
    ]);
    let store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    // 34 and 23; the record without a date is skipped.
    let average = store.average_age_on(today).unwrap();
    assert!((average - 28.5).abs() < f64::EPSILON);
}

#[test]
fn average_age_without_birth_dates_is_no_records() {
    let repo = RecordingRepository::default();
    let store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();
    assert!(matches!(store.average_age().unwrap_err(), StoreError::NoRecords));

    let contacts = RecordingRepository::with_rows(vec![contact("ana", "lopez", "a@x.com")]);
    let store = PersonStore::load(&contacts, RecordSchema::Contact).unwrap();
    assert!(matches!(store.average_age().unwrap_err(), StoreError::NoRecords));
}

#[test]
fn age_of_reports_every_match_or_not_found() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let repo = RecordingRepository::with_rows(vec![
        birthday("ana", "lopez", Some((1990, 7, 1))),
        birthday("bo", "diaz", None),
    ]);
    let store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();

    let ages = store.age_of_on("ana", "lopez", today).unwrap();
    assert_eq!(ages.len(), 1);
    assert_eq!(ages[0].years, Some(33));

    let ages = store.age_of_on("bo", "diaz", today).unwrap();
    assert_eq!(ages[0].years, None);

    assert!(matches!(
        store.age_of_on("zoe", "x", today).unwrap_err(),
        StoreError::NotFound { .. }
    ));
}

#[test]
fn save_on_clean_store_does_not_touch_backing_store() {
    let repo = RecordingRepository::with_rows(vec![birthday("ana", "lopez", None)]);
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();
    let reads_after_load = repo.reads.get();

    assert_eq!(store.save().unwrap(), SaveReport::default());
    assert_eq!(repo.reads.get(), reads_after_load);
    assert_eq!(repo.write_count(), 0);
}

#[test]
fn save_applies_diff_and_second_save_is_a_no_op() {
    let repo = RecordingRepository::with_rows(vec![
        birthday("ana", "lopez", None),
        birthday("bo", "diaz", None),
    ]);
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();
    store.delete("bo", "diaz").unwrap();
    store.add(birthday("cy", "ng", Some((1985, 2, 3)))).unwrap();

    let report = store.save().unwrap();
    assert_eq!(
        report,
        SaveReport {
            inserted: 1,
            deleted: 1
        }
    );
    assert!(!store.is_dirty());
    assert_eq!(repo.write_count(), 1);
    assert_eq!(repo.applied.borrow()[0].inserts, vec![birthday("cy", "ng", Some((1985, 2, 3)))]);
    assert_eq!(repo.applied.borrow()[0].deletes, vec![birthday("bo", "diaz", None)]);

    assert_eq!(store.save().unwrap(), SaveReport::default());
    assert_eq!(repo.write_count(), 1);
}

#[test]
fn save_with_empty_diff_skips_writes() {
    let repo = RecordingRepository::default();
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();
    store.add(birthday("ana", "lopez", None)).unwrap();
    store.delete("ana", "lopez").unwrap();
    assert!(store.is_dirty());

    assert_eq!(store.save().unwrap(), SaveReport::default());
    assert_eq!(repo.write_count(), 0);
    assert!(!store.is_dirty());
}

#[test]
fn save_failure_keeps_store_dirty() {
    let repo = RecordingRepository::default();
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();
    store.add(birthday("ana", "lopez", None)).unwrap();

    repo.unavailable.set(true);
    let err = store.save().unwrap_err();
    assert!(matches!(err, StoreError::StoreUnavailable(_)));
    assert!(store.is_dirty());

    repo.unavailable.set(false);
    store.save().unwrap();
    assert_eq!(repo.rows.borrow().len(), 1);
}

#[test]
fn saved_records_survive_a_fresh_load() {
    let repo = RecordingRepository::default();
    let person = birthday("ana", "lopez", Some((1990, 3, 5)));

    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();
    store.add(person.clone()).unwrap();
    store.save().unwrap();
    drop(store);

    let reloaded = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();
    assert_eq!(reloaded.list(), &[person]);
}

#[test]
fn unsaved_changes_are_discarded_at_session_end() {
    let repo = RecordingRepository::default();
    let mut store = PersonStore::load(&repo, RecordSchema::Birthday).unwrap();
    store.add(birthday("ana", "lopez", None)).unwrap();

    let repo = store.into_repository();
    assert_eq!(repo.write_count(), 0);
    assert!(repo.rows.borrow().is_empty());
}
