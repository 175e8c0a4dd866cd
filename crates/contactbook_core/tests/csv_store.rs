use chrono::NaiveDate;
use contactbook_core::{
    ChangeSet, CsvPersonRepository, Person, PersonRepository, PersonStore, RecordSchema,
    RepoError, StoreError,
};
use std::fs;

fn birthday(first: &str, last: &str, dob: Option<(i32, u32, u32)>) -> Person {
    let dob = dob.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
    Person::birthday(first, last, dob).unwrap()
}

#[test]
fn add_save_and_reload_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persons.csv");
    let person = birthday("ana", "lopez", Some((1990, 3, 5)));

    let repo = CsvPersonRepository::open(&path, RecordSchema::Birthday).unwrap();
    let mut store = PersonStore::load(repo, RecordSchema::Birthday).unwrap();
    store.add(person.clone()).unwrap();
    store.add(birthday("bo", "diaz", None)).unwrap();
    store.save().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(
        content.lines().collect::<Vec<_>>(),
        vec![
            "first_name,last_name,date_of_birth",
            "Ana,Lopez,1990-03-05",
            "Bo,Diaz,",
        ]
    );

    let repo = CsvPersonRepository::open(&path, RecordSchema::Birthday).unwrap();
    let reloaded = PersonStore::load(repo, RecordSchema::Birthday).unwrap();
    assert_eq!(reloaded.list()[0], person);
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn contact_rows_roundtrip_with_optional_phone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.csv");
    let with_phone = Person::contact("ana", "lopez", "a@x.com", Some("600 123 456")).unwrap();
    let without_phone = Person::contact("bo", "diaz", "b@x.com", None).unwrap();

    let repo = CsvPersonRepository::open(&path, RecordSchema::Contact).unwrap();
    repo.apply_changes(&ChangeSet {
        inserts: vec![with_phone.clone(), without_phone.clone()],
        deletes: Vec::new(),
    })
    .unwrap();

    assert_eq!(repo.list_all().unwrap(), vec![with_phone, without_phone]);
}

#[test]
fn delete_then_save_rewrites_file_without_removed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persons.csv");
    fs::write(
        &path,
        "first_name,last_name,date_of_birth\nAna,Lopez,1990-03-05\nBo,Diaz,\nCy,Ng,1980-01-01\n",
    )
    .unwrap();

    let repo = CsvPersonRepository::open(&path, RecordSchema::Birthday).unwrap();
    let mut store = PersonStore::load(repo, RecordSchema::Birthday).unwrap();
    assert_eq!(store.delete("bo", "diaz").unwrap(), 1);
    store.save().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(!content.contains("Diaz"));
    assert!(content.contains("Ana,Lopez,1990-03-05"));
    assert!(content.contains("Cy,Ng,1980-01-01"));
}

#[test]
fn open_rejects_header_without_schema_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persons.csv");
    fs::write(&path, "first_name,last_name,date_of_birth\nAna,Lopez,\n").unwrap();

    let err = CsvPersonRepository::open(&path, RecordSchema::Contact).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("email")));
}

#[test]
fn load_rejects_invalid_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persons.csv");
    fs::write(
        &path,
        "first_name,last_name,date_of_birth\nAna,Lopez,05/03/1990\n",
    )
    .unwrap();

    let err = CsvPersonRepository::open(&path, RecordSchema::Birthday).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn save_reports_unavailable_store_when_file_disappears() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persons.csv");

    let repo = CsvPersonRepository::open(&path, RecordSchema::Birthday).unwrap();
    let mut store = PersonStore::load(repo, RecordSchema::Birthday).unwrap();
    store.add(birthday("ana", "lopez", None)).unwrap();
    fs::remove_file(&path).unwrap();

    let err = store.save().unwrap_err();
    assert!(matches!(err, StoreError::StoreUnavailable(_)));
    assert!(store.is_dirty());
}

#[test]
fn stale_delete_fails_without_rewriting_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persons.csv");
    fs::write(&path, "first_name,last_name,date_of_birth\nBo,Diaz,\n").unwrap();
    let repo = CsvPersonRepository::open(&path, RecordSchema::Birthday).unwrap();

    let err = repo
        .apply_changes(&ChangeSet {
            inserts: vec![birthday("cy", "ng", None)],
            deletes: vec![birthday("ana", "lopez", None)],
        })
        .unwrap_err();

    assert!(matches!(err, RepoError::InvalidData(_)));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "first_name,last_name,date_of_birth\nBo,Diaz,\n"
    );
}

#[test]
fn load_rejects_row_with_fields_of_another_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persons.csv");
    fs::write(
        &path,
        "first_name,last_name,date_of_birth,email\nAna,Lopez,,a@x.com\n",
    )
    .unwrap();

    let err = CsvPersonRepository::open(&path, RecordSchema::Birthday).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("email")));
}
