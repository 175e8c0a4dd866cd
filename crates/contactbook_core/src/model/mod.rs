//! Contact-book domain model.
//!
//! # Responsibility
//! - Define the validated person record and its persisted row shape.
//!
//! # Invariants
//! - Records are validated before they exist; there is no invalid `Person`.
//! - Mutations are modeled as delete + add, never in-place edits.

pub mod person;
