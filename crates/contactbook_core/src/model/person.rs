//! Person domain model.
//!
//! # Responsibility
//! - Define the validated contact-book record shared by every backend.
//! - Own name normalization so key comparisons are consistent everywhere.
//!
//! # Invariants
//! - A `Person` can only be obtained through a validating constructor.
//! - `first_name`/`last_name` are stored trimmed and capitalized.
//! - The payload shape always matches exactly one `RecordSchema`.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Date format accepted from interactive input.
pub const DATE_INPUT_FORMAT: &str = "%d/%m/%Y";
/// Date format used by persisted rows.
pub const DATE_STORAGE_FORMAT: &str = "%Y-%m-%d";

const MIN_PHONE_DIGITS: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9+\-() ]+$").expect("valid phone regex"));

/// Payload layout carried by every record of one contact book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSchema {
    /// Names plus an optional date of birth.
    Birthday,
    /// Names plus a required email and an optional phone.
    Contact,
}

impl RecordSchema {
    /// Persisted column names, in row order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Birthday => &["first_name", "last_name", "date_of_birth"],
            Self::Contact => &["first_name", "last_name", "email", "phone"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Birthday => "birthday",
            Self::Contact => "contact",
        }
    }
}

impl Display for RecordSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordSchema {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "birthday" => Ok(Self::Birthday),
            "contact" => Ok(Self::Contact),
            other => Err(format!(
                "unsupported record schema `{other}`; expected birthday|contact"
            )),
        }
    }
}

/// Validation failures raised while constructing a `Person`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonValidationError {
    EmptyFirstName,
    EmptyLastName,
    InvalidDate { value: String, format: &'static str },
    MissingEmail,
    InvalidEmail(String),
    InvalidPhone(String),
    /// A field was supplied that the active schema does not carry.
    FieldNotInSchema {
        field: &'static str,
        schema: RecordSchema,
    },
    /// The record was built for a different schema than the store uses.
    SchemaMismatch {
        expected: RecordSchema,
        found: RecordSchema,
    },
    /// A stored value is valid but not in the form this crate writes.
    NotCanonical { field: &'static str, value: String },
}

impl Display for PersonValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFirstName => write!(f, "first_name cannot be empty"),
            Self::EmptyLastName => write!(f, "last_name cannot be empty"),
            Self::InvalidDate { value, format } => {
                write!(f, "date `{value}` does not match format `{format}`")
            }
            Self::MissingEmail => write!(f, "email is required"),
            Self::InvalidEmail(value) => write!(f, "invalid email `{value}`"),
            Self::InvalidPhone(value) => write!(f, "invalid phone `{value}`"),
            Self::FieldNotInSchema { field, schema } => {
                write!(f, "field `{field}` is not part of the `{schema}` schema")
            }
            Self::SchemaMismatch { expected, found } => {
                write!(f, "expected a `{expected}` record, got `{found}`")
            }
            Self::NotCanonical { field, value } => {
                write!(f, "stored {field} `{value}` is not in canonical form")
            }
        }
    }
}

impl Error for PersonValidationError {}

/// Schema-specific payload of a person record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PersonDetails {
    Birthday {
        date_of_birth: Option<NaiveDate>,
    },
    Contact {
        email: String,
        phone: Option<String>,
    },
}

/// One validated contact-book record.
///
/// The `(first_name, last_name)` pair is the natural key. Equality covers
/// every field, which is what reconciliation diffs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Person {
    first_name: String,
    last_name: String,
    details: PersonDetails,
}

impl Person {
    /// Creates a birthday-schema record.
    pub fn birthday(
        first_name: &str,
        last_name: &str,
        date_of_birth: Option<NaiveDate>,
    ) -> Result<Self, PersonValidationError> {
        let (first_name, last_name) = validated_names(first_name, last_name)?;
        Ok(Self {
            first_name,
            last_name,
            details: PersonDetails::Birthday { date_of_birth },
        })
    }

    /// Creates a contact-schema record.
    ///
    /// Empty `phone` input is treated as absent.
    pub fn contact(
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<Self, PersonValidationError> {
        let (first_name, last_name) = validated_names(first_name, last_name)?;

        let email = email.trim();
        if email.is_empty() {
            return Err(PersonValidationError::MissingEmail);
        }
        if !EMAIL_RE.is_match(email) {
            return Err(PersonValidationError::InvalidEmail(email.to_string()));
        }

        let phone = match phone.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => {
                let digits = value.chars().filter(char::is_ascii_digit).count();
                if !PHONE_RE.is_match(value) || digits < MIN_PHONE_DIGITS {
                    return Err(PersonValidationError::InvalidPhone(value.to_string()));
                }
                Some(value.to_string())
            }
            None => None,
        };

        Ok(Self {
            first_name,
            last_name,
            details: PersonDetails::Contact {
                email: email.to_string(),
                phone,
            },
        })
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn details(&self) -> &PersonDetails {
        &self.details
    }

    pub fn schema(&self) -> RecordSchema {
        match self.details {
            PersonDetails::Birthday { .. } => RecordSchema::Birthday,
            PersonDetails::Contact { .. } => RecordSchema::Contact,
        }
    }

    pub fn date_of_birth(&self) -> Option<NaiveDate> {
        match self.details {
            PersonDetails::Birthday { date_of_birth } => date_of_birth,
            PersonDetails::Contact { .. } => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match &self.details {
            PersonDetails::Contact { email, .. } => Some(email.as_str()),
            PersonDetails::Birthday { .. } => None,
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match &self.details {
            PersonDetails::Contact { phone, .. } => phone.as_deref(),
            PersonDetails::Birthday { .. } => None,
        }
    }

    /// Returns true when this record carries exactly the given key.
    pub fn has_name(&self, first_name: &str, last_name: &str) -> bool {
        self.first_name == first_name && self.last_name == last_name
    }

    /// Completed years of age at `today`.
    ///
    /// Returns `None` when no date of birth is known. A birthday later in
    /// the year than `today` counts as one year younger.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let born = self.date_of_birth()?;
        let mut years = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            years -= 1;
        }
        Some(u32::try_from(years).unwrap_or(0))
    }
}

impl Display for Person {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)?;
        match &self.details {
            PersonDetails::Birthday {
                date_of_birth: Some(date),
            } => write!(f, ", born {}", date.format(DATE_INPUT_FORMAT)),
            PersonDetails::Birthday {
                date_of_birth: None,
            } => Ok(()),
            PersonDetails::Contact { email, phone } => {
                write!(f, " <{email}>")?;
                if let Some(phone) = phone {
                    write!(f, ", phone {phone}")?;
                }
                Ok(())
            }
        }
    }
}

/// Raw field buffer filled by one interactive "add" command.
///
/// Lives only for the duration of that command and is consumed by `build`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonDraft {
    pub first_name: String,
    pub last_name: String,
    /// Expected in `DATE_INPUT_FORMAT`; empty means unknown.
    pub date_of_birth: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl PersonDraft {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    pub fn with_date_of_birth(mut self, value: impl Into<String>) -> Self {
        self.date_of_birth = Some(value.into());
        self
    }

    pub fn with_email(mut self, value: impl Into<String>) -> Self {
        self.email = Some(value.into());
        self
    }

    pub fn with_phone(mut self, value: impl Into<String>) -> Self {
        self.phone = Some(value.into());
        self
    }

    /// Validates the collected fields against `schema`.
    pub fn build(self, schema: RecordSchema) -> Result<Person, PersonValidationError> {
        match schema {
            RecordSchema::Birthday => {
                reject_present(self.email.as_deref(), "email", schema)?;
                reject_present(self.phone.as_deref(), "phone", schema)?;
                let date_of_birth =
                    parse_optional_date(self.date_of_birth.as_deref(), DATE_INPUT_FORMAT)?;
                Person::birthday(&self.first_name, &self.last_name, date_of_birth)
            }
            RecordSchema::Contact => {
                reject_present(self.date_of_birth.as_deref(), "date_of_birth", schema)?;
                Person::contact(
                    &self.first_name,
                    &self.last_name,
                    self.email.as_deref().unwrap_or_default(),
                    self.phone.as_deref(),
                )
            }
        }
    }
}

/// Flat persisted row shared by every backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PersonRow {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl PersonRow {
    pub fn from_person(person: &Person) -> Self {
        Self {
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            date_of_birth: person
                .date_of_birth()
                .map(|date| date.format(DATE_STORAGE_FORMAT).to_string()),
            email: person.email().map(str::to_string),
            phone: person.phone().map(str::to_string),
        }
    }

    /// Re-validates a stored row into a `Person` of the given schema.
    ///
    /// The row must be exactly what `from_person` would write for the
    /// result. Fields of another schema and values that would be rewritten
    /// (unnormalized names, padded or empty values) are rejected, so every
    /// loaded `Person` maps back to its stored row.
    pub fn into_person(self, schema: RecordSchema) -> Result<Person, PersonValidationError> {
        let person = match schema {
            RecordSchema::Birthday => {
                reject_present(self.email.as_deref(), "email", schema)?;
                reject_present(self.phone.as_deref(), "phone", schema)?;
                let date_of_birth =
                    parse_optional_date(self.date_of_birth.as_deref(), DATE_STORAGE_FORMAT)?;
                Person::birthday(&self.first_name, &self.last_name, date_of_birth)?
            }
            RecordSchema::Contact => {
                reject_present(self.date_of_birth.as_deref(), "date_of_birth", schema)?;
                Person::contact(
                    &self.first_name,
                    &self.last_name,
                    self.email.as_deref().unwrap_or_default(),
                    self.phone.as_deref(),
                )?
            }
        };

        let canonical = Self::from_person(&person);
        let stored = [
            ("first_name", Some(self.first_name)),
            ("last_name", Some(self.last_name)),
            ("date_of_birth", self.date_of_birth),
            ("email", self.email),
            ("phone", self.phone),
        ];
        let written = [
            Some(canonical.first_name),
            Some(canonical.last_name),
            canonical.date_of_birth,
            canonical.email,
            canonical.phone,
        ];
        for ((field, stored), written) in stored.into_iter().zip(written) {
            if stored != written {
                return Err(PersonValidationError::NotCanonical {
                    field,
                    value: stored.unwrap_or_default(),
                });
            }
        }
        Ok(person)
    }

    /// Field values in `schema.columns()` order; absent values are empty.
    pub fn values(&self, schema: RecordSchema) -> Vec<&str> {
        fn optional(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or_default()
        }
        match schema {
            RecordSchema::Birthday => vec![
                self.first_name.as_str(),
                self.last_name.as_str(),
                optional(&self.date_of_birth),
            ],
            RecordSchema::Contact => vec![
                self.first_name.as_str(),
                self.last_name.as_str(),
                optional(&self.email),
                optional(&self.phone),
            ],
        }
    }
}

/// Trims and capitalizes a name: first character upper, the rest lower.
pub fn normalize_name(value: &str) -> String {
    let mut chars = value.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn validated_names(
    first_name: &str,
    last_name: &str,
) -> Result<(String, String), PersonValidationError> {
    let first_name = normalize_name(first_name);
    if first_name.is_empty() {
        return Err(PersonValidationError::EmptyFirstName);
    }
    let last_name = normalize_name(last_name);
    if last_name.is_empty() {
        return Err(PersonValidationError::EmptyLastName);
    }
    Ok((first_name, last_name))
}

fn parse_optional_date(
    value: Option<&str>,
    format: &'static str,
) -> Result<Option<NaiveDate>, PersonValidationError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(text) => NaiveDate::parse_from_str(text, format)
            .map(Some)
            .map_err(|_| PersonValidationError::InvalidDate {
                value: text.to_string(),
                format,
            }),
        None => Ok(None),
    }
}

fn reject_present(
    value: Option<&str>,
    field: &'static str,
    schema: RecordSchema,
) -> Result<(), PersonValidationError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => {
            Err(PersonValidationError::FieldNotInSchema { field, schema })
        }
        _ => Ok(()),
    }
}
