//! Correspondence-tracking domain model.
//!
//! # Responsibility
//! - Define canonical records used by core business logic.
//! - Keep storage and UI concerns out of the record shapes.
//!
//! # Invariants
//! - Every correspondence is identified by a stable `CorrespondenceId`.
//! - Audit entries and notifications are created, never edited in place.

pub mod audit;
pub mod correspondence;
pub mod notification;
pub mod user;
