//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into session-level operations.
//! - Keep the CLI decoupled from storage details.

pub mod person_store;
