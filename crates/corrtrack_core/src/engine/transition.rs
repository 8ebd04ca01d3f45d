//! Field-level diff and role gate for correspondence edits.
//!
//! # Invariants
//! - Only fields whose value actually changes are considered.
//! - Disallowed fields are dropped into `rejected_fields`, never raised.
//! - `change_log` mirrors `accepted` exactly.
//! - Only a status change to `Sent to AO` requests a notification.

use crate::model::audit::{ChangeLog, FieldChange};
use crate::model::correspondence::{
    Correspondence, CorrespondenceStatus, Field, FieldPatch, FieldValue,
};
use crate::model::user::{Role, User};
use crate::policy::role_policy::can_write;
use std::collections::BTreeSet;

/// Status that triggers an assignment notification when entered.
pub const NOTIFY_ON_STATUS: CorrespondenceStatus = CorrespondenceStatus::SentToAo;

/// Engine tuning switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Reject every non-admin edit on `Closed/Archived` records.
    pub freeze_closed_records: bool,
}

/// Result of diffing one edit set against a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proposal {
    pub accepted: FieldPatch,
    pub rejected_fields: BTreeSet<Field>,
    pub change_log: ChangeLog,
}

impl Proposal {
    /// No field survived the diff and role gate; nothing should be written.
    pub fn is_noop(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Whether applying this proposal must notify the action officer.
    pub fn triggers_notification(&self) -> bool {
        matches!(
            self.accepted.get(&Field::Status),
            Some(FieldValue::Status(status)) if *status == NOTIFY_ON_STATUS
        )
    }
}

/// Stateless transition engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionEngine {
    options: EngineOptions,
}

impl TransitionEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Computes the permitted patch of `edits` against `current` for `actor`.
    pub fn propose(&self, current: &Correspondence, edits: &FieldPatch, actor: &User) -> Proposal {
        let frozen = self.options.freeze_closed_records
            && current.status() == CorrespondenceStatus::ClosedArchived
            && actor.role != Role::Admin;

        let mut proposal = Proposal::default();
        for (field, proposed) in edits {
            let proposed = proposed.clone().normalized_for(*field);
            let before = current.value_of(*field);
            if before == proposed {
                continue;
            }

            if frozen || !can_write(actor.role, *field) {
                proposal.rejected_fields.insert(*field);
                continue;
            }

            proposal.change_log.insert(
                *field,
                FieldChange {
                    from: before,
                    to: proposed.clone(),
                },
            );
            proposal.accepted.insert(*field, proposed);
        }
        proposal
    }
}

/// Proposes with default engine options.
pub fn propose(current: &Correspondence, edits: &FieldPatch, actor: &User) -> Proposal {
    TransitionEngine::default().propose(current, edits, actor)
}
