//! Repository layer: document-store contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the narrow store, audit and notifier contracts core depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

pub mod audit_repo;
pub mod correspondence_repo;
pub mod notification_repo;
