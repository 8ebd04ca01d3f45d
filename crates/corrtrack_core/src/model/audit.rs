//! Audit trail model.
//!
//! # Invariants
//! - Entries are immutable once built; the trail is append-only.
//! - `changes` holds accepted changes only, never rejected edits.

use crate::model::correspondence::{CorrespondenceId, Field, FieldValue};
use crate::model::user::UserId;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

pub type AuditEntryId = Uuid;

/// Field name -> before/after pair for one accepted mutation batch.
pub type ChangeLog = BTreeMap<Field, FieldChange>;

/// Before/after values of one accepted field change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub from: FieldValue,
    pub to: FieldValue,
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub actor_id: UserId,
    pub correspondence_id: CorrespondenceId,
    pub changes: ChangeLog,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl AuditEntry {
    pub fn new(
        actor_id: impl Into<UserId>,
        correspondence_id: CorrespondenceId,
        changes: ChangeLog,
        timestamp: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: actor_id.into(),
            correspondence_id,
            changes,
            timestamp,
        }
    }
}

/// Encodes a change log as `{"field": {"from": .., "to": ..}}` JSON.
pub fn encode_change_log(changes: &ChangeLog) -> serde_json::Result<String> {
    let keyed: BTreeMap<&'static str, &FieldChange> = changes
        .iter()
        .map(|(field, change)| (field.as_str(), change))
        .collect();
    serde_json::to_string(&keyed)
}

/// Decodes a change log produced by [`encode_change_log`].
///
/// Returns a message describing the first malformed entry on failure.
pub fn decode_change_log(raw: &str) -> Result<ChangeLog, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|err| format!("change log is not JSON: {err}"))?;
    let object = value
        .as_object()
        .ok_or_else(|| "change log must be a JSON object".to_string())?;

    let mut changes = ChangeLog::new();
    for (name, pair) in object {
        let field = Field::parse(name).ok_or_else(|| format!("unknown field `{name}`"))?;
        let decode = |key: &str| {
            pair.get(key)
                .and_then(|raw| FieldValue::from_json(field, raw))
                .ok_or_else(|| format!("invalid `{key}` value for `{name}`"))
        };
        changes.insert(
            field,
            FieldChange {
                from: decode("from")?,
                to: decode("to")?,
            },
        );
    }
    Ok(changes)
}
