//! Correspondence state-transition engine.
//!
//! # Responsibility
//! - Diff proposed edits against the current record.
//! - Gate each changed field through role policy.
//!
//! # Invariants
//! - The engine is pure: it never touches storage, audit or notification sinks.

pub mod transition;
