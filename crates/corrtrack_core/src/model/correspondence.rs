//! Correspondence domain model.
//!
//! # Responsibility
//! - Define the canonical correspondence record independent of storage.
//! - Define the editable field set and typed field values used by patches.
//! - Enforce construction and post-patch validation rules.
//!
//! # Invariants
//! - `status` is always one of the five workflow states.
//! - `created_at` is set once and is not an editable `Field`.
//! - `date_action_finalized` is set only in `Processing` or `Closed/Archived`.
//! - `subject`, `recipient` and `content` are never blank.
//! - Records are changed only through `with_patch`, which is crate-private.

use crate::clock::now_epoch_ms;
use crate::model::user::{is_valid_user_id, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier assigned to a correspondence at creation.
pub type CorrespondenceId = Uuid;

/// Field-level patch: editable field -> proposed new value.
pub type FieldPatch = BTreeMap<Field, FieldValue>;

/// Workflow state of a correspondence.
///
/// Wire strings are case-sensitive and shared with stored rows and audit logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CorrespondenceStatus {
    #[serde(rename = "Registered")]
    Registered,
    #[serde(rename = "Pending Instructions")]
    PendingInstructions,
    #[serde(rename = "Sent to AO")]
    SentToAo,
    #[serde(rename = "Processing")]
    Processing,
    #[serde(rename = "Closed/Archived")]
    ClosedArchived,
}

impl CorrespondenceStatus {
    pub const ALL: [Self; 5] = [
        Self::Registered,
        Self::PendingInstructions,
        Self::SentToAo,
        Self::Processing,
        Self::ClosedArchived,
    ];

    /// Stable wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "Registered",
            Self::PendingInstructions => "Pending Instructions",
            Self::SentToAo => "Sent to AO",
            Self::Processing => "Processing",
            Self::ClosedArchived => "Closed/Archived",
        }
    }

    /// Parses an exact wire string. No trimming, no case folding.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    /// States in which `date_action_finalized` may be set.
    pub fn allows_finalized_date(self) -> bool {
        matches!(self, Self::Processing | Self::ClosedArchived)
    }
}

impl Display for CorrespondenceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editable correspondence fields.
///
/// `id`, `created_at`, `created_by` and `version` are not listed:
/// they cannot be proposed by any actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "subject")]
    Subject,
    #[serde(rename = "recipient")]
    Recipient,
    #[serde(rename = "content")]
    Content,
    #[serde(rename = "status")]
    Status,
    #[serde(rename = "attachmentRef")]
    AttachmentRef,
    #[serde(rename = "actionOfficer")]
    ActionOfficer,
    #[serde(rename = "aoComments")]
    AoComments,
    #[serde(rename = "dateActionFinalized")]
    DateActionFinalized,
    #[serde(rename = "deadlineDate")]
    DeadlineDate,
    #[serde(rename = "dateToAO")]
    DateToAo,
}

impl Field {
    pub const ALL: [Self; 10] = [
        Self::Subject,
        Self::Recipient,
        Self::Content,
        Self::Status,
        Self::AttachmentRef,
        Self::ActionOfficer,
        Self::AoComments,
        Self::DateActionFinalized,
        Self::DeadlineDate,
        Self::DateToAo,
    ];

    /// Stable wire name used in audit change logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Recipient => "recipient",
            Self::Content => "content",
            Self::Status => "status",
            Self::AttachmentRef => "attachmentRef",
            Self::ActionOfficer => "actionOfficer",
            Self::AoComments => "aoComments",
            Self::DateActionFinalized => "dateActionFinalized",
            Self::DeadlineDate => "deadlineDate",
            Self::DateToAo => "dateToAO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == value)
    }

    /// Checks that `value` has the shape this field stores.
    pub fn check(self, value: &FieldValue) -> Result<(), CorrespondenceValidationError> {
        let ok = matches!(
            (self.kind(), value),
            (FieldKind::RequiredText, FieldValue::Text(_))
                | (FieldKind::OptionalText, FieldValue::Text(_) | FieldValue::Null)
                | (FieldKind::Status, FieldValue::Status(_))
                | (
                    FieldKind::OptionalTimestamp,
                    FieldValue::Timestamp(_) | FieldValue::Null
                )
        );
        if ok {
            Ok(())
        } else {
            Err(CorrespondenceValidationError::TypeMismatch {
                field: self,
                expected: self.kind().expected(),
            })
        }
    }

    fn kind(self) -> FieldKind {
        match self {
            Self::Subject | Self::Recipient | Self::Content | Self::AoComments => {
                FieldKind::RequiredText
            }
            Self::AttachmentRef | Self::ActionOfficer => FieldKind::OptionalText,
            Self::Status => FieldKind::Status,
            Self::DateActionFinalized | Self::DeadlineDate | Self::DateToAo => {
                FieldKind::OptionalTimestamp
            }
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    RequiredText,
    OptionalText,
    Status,
    OptionalTimestamp,
}

impl FieldKind {
    fn expected(self) -> &'static str {
        match self {
            Self::RequiredText => "text",
            Self::OptionalText => "text or null",
            Self::Status => "status",
            Self::OptionalTimestamp => "timestamp or null",
        }
    }
}

/// Typed value of one editable field.
///
/// Timestamps are Unix epoch milliseconds, so equality is by instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Status(CorrespondenceStatus),
    Timestamp(i64),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Canonical form for `field`.
    ///
    /// Blank text on optional text fields becomes `Null`; `Null` on
    /// `aoComments` becomes empty text. Other values are returned unchanged.
    pub fn normalized_for(self, field: Field) -> Self {
        match (field.kind(), self) {
            (FieldKind::OptionalText, Self::Text(text)) if text.trim().is_empty() => Self::Null,
            (FieldKind::RequiredText, Self::Null) if field == Field::AoComments => {
                Self::Text(String::new())
            }
            (_, value) => value,
        }
    }

    /// Decodes a JSON value stored for `field` in an audit change log.
    pub fn from_json(field: Field, value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::String(text) if field.kind() == FieldKind::Status => {
                CorrespondenceStatus::parse(text).map(Self::Status)
            }
            serde_json::Value::String(text) => Some(Self::Text(text.clone())),
            serde_json::Value::Number(number) if field.kind() == FieldKind::OptionalTimestamp => {
                number.as_i64().map(Self::Timestamp)
            }
            _ => None,
        }
    }
}

impl From<CorrespondenceStatus> for FieldValue {
    fn from(value: CorrespondenceStatus) -> Self {
        Self::Status(value)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Timestamp)
    }
}

impl From<Option<&str>> for FieldValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Null, |text| Self::Text(text.to_string()))
    }
}

/// Validation failures for correspondence construction and patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrespondenceValidationError {
    /// Required text field is empty after trimming.
    EmptyField(Field),
    /// Status string is not one of the workflow wire values.
    UnknownStatus(String),
    /// `dateActionFinalized` set while status does not allow it.
    FinalizedDateNotAllowed(CorrespondenceStatus),
    /// Patch value does not match the field type.
    TypeMismatch {
        field: Field,
        expected: &'static str,
    },
    /// Action officer reference is not a valid user id.
    InvalidUserId(String),
}

impl Display for CorrespondenceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::UnknownStatus(value) => write!(f, "unknown correspondence status `{value}`"),
            Self::FinalizedDateNotAllowed(status) => write!(
                f,
                "dateActionFinalized must be null while status is `{status}`"
            ),
            Self::TypeMismatch { field, expected } => {
                write!(f, "{field} expects {expected}")
            }
            Self::InvalidUserId(value) => write!(f, "invalid user id `{value}`"),
        }
    }
}

impl Error for CorrespondenceValidationError {}

/// Canonical correspondence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Correspondence {
    pub(crate) id: CorrespondenceId,
    pub(crate) subject: String,
    pub(crate) recipient: String,
    pub(crate) content: String,
    pub(crate) status: CorrespondenceStatus,
    pub(crate) attachment_ref: Option<String>,
    pub(crate) created_at: i64,
    pub(crate) created_by: Option<UserId>,
    pub(crate) action_officer: Option<UserId>,
    pub(crate) ao_comments: String,
    pub(crate) date_action_finalized: Option<i64>,
    pub(crate) deadline_date: Option<i64>,
    #[serde(rename = "dateToAO")]
    pub(crate) date_to_ao: Option<i64>,
    pub(crate) version: u64,
}

impl Correspondence {
    /// Creates a new record stamped with the current wall-clock time.
    ///
    /// `initial_status` defaults to `Registered` when `None`.
    ///
    /// # Errors
    /// - `EmptyField` when subject, recipient or content is blank.
    /// - `UnknownStatus` when `initial_status` is not a wire value.
    pub fn create(
        subject: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
        initial_status: Option<&str>,
        attachment_ref: Option<String>,
    ) -> Result<Self, CorrespondenceValidationError> {
        Self::create_at(
            now_epoch_ms(),
            subject,
            recipient,
            content,
            initial_status,
            attachment_ref,
        )
    }

    /// Same as [`Correspondence::create`] with a caller-provided timestamp.
    pub fn create_at(
        created_at: i64,
        subject: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
        initial_status: Option<&str>,
        attachment_ref: Option<String>,
    ) -> Result<Self, CorrespondenceValidationError> {
        let status = match initial_status {
            None => CorrespondenceStatus::Registered,
            Some(value) => CorrespondenceStatus::parse(value)
                .ok_or_else(|| CorrespondenceValidationError::UnknownStatus(value.to_string()))?,
        };

        let record = Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            recipient: recipient.into(),
            content: content.into(),
            status,
            attachment_ref: attachment_ref.filter(|value| !value.trim().is_empty()),
            created_at,
            created_by: None,
            action_officer: None,
            ao_comments: String::new(),
            date_action_finalized: None,
            deadline_date: None,
            date_to_ao: None,
            version: 1,
        };
        record.validate()?;
        Ok(record)
    }

    /// Checks record-level invariants.
    pub fn validate(&self) -> Result<(), CorrespondenceValidationError> {
        for (field, value) in [
            (Field::Subject, &self.subject),
            (Field::Recipient, &self.recipient),
            (Field::Content, &self.content),
        ] {
            if value.trim().is_empty() {
                return Err(CorrespondenceValidationError::EmptyField(field));
            }
        }

        if self.date_action_finalized.is_some() && !self.status.allows_finalized_date() {
            return Err(CorrespondenceValidationError::FinalizedDateNotAllowed(
                self.status,
            ));
        }

        if let Some(officer) = self.action_officer.as_deref() {
            if !is_valid_user_id(officer) {
                return Err(CorrespondenceValidationError::InvalidUserId(
                    officer.to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn id(&self) -> CorrespondenceId {
        self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn status(&self) -> CorrespondenceStatus {
        self.status
    }

    pub fn attachment_ref(&self) -> Option<&str> {
        self.attachment_ref.as_deref()
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    pub fn action_officer(&self) -> Option<&str> {
        self.action_officer.as_deref()
    }

    pub fn ao_comments(&self) -> &str {
        &self.ao_comments
    }

    pub fn date_action_finalized(&self) -> Option<i64> {
        self.date_action_finalized
    }

    pub fn deadline_date(&self) -> Option<i64> {
        self.deadline_date
    }

    pub fn date_to_ao(&self) -> Option<i64> {
        self.date_to_ao
    }

    /// Store version; incremented by every persisted patch.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the current value of one editable field.
    pub fn value_of(&self, field: Field) -> FieldValue {
        match field {
            Field::Subject => FieldValue::Text(self.subject.clone()),
            Field::Recipient => FieldValue::Text(self.recipient.clone()),
            Field::Content => FieldValue::Text(self.content.clone()),
            Field::Status => FieldValue::Status(self.status),
            Field::AttachmentRef => self.attachment_ref.as_deref().into(),
            Field::ActionOfficer => self.action_officer.as_deref().into(),
            Field::AoComments => FieldValue::Text(self.ao_comments.clone()),
            Field::DateActionFinalized => self.date_action_finalized.into(),
            Field::DeadlineDate => self.deadline_date.into(),
            Field::DateToAo => self.date_to_ao.into(),
        }
    }

    /// Returns a copy with `patch` applied and validated.
    ///
    /// `version` is left unchanged; the store owns version increments.
    pub(crate) fn with_patch(&self, patch: &FieldPatch) -> Result<Self, CorrespondenceValidationError> {
        let mut next = self.clone();
        for (field, value) in patch {
            next.set(*field, value.clone())?;
        }
        next.validate()?;
        Ok(next)
    }

    pub(crate) fn set_created_by(&mut self, user_id: UserId) {
        self.created_by = Some(user_id);
    }

    fn set(&mut self, field: Field, value: FieldValue) -> Result<(), CorrespondenceValidationError> {
        let mismatch = || CorrespondenceValidationError::TypeMismatch {
            field,
            expected: field.kind().expected(),
        };

        match (field, value.normalized_for(field)) {
            (Field::Subject, FieldValue::Text(text)) => self.subject = text,
            (Field::Recipient, FieldValue::Text(text)) => self.recipient = text,
            (Field::Content, FieldValue::Text(text)) => self.content = text,
            (Field::AoComments, FieldValue::Text(text)) => self.ao_comments = text,
            (Field::Status, FieldValue::Status(status)) => self.status = status,
            (Field::AttachmentRef, value) => self.attachment_ref = optional_text(value).ok_or_else(mismatch)?,
            (Field::ActionOfficer, value) => self.action_officer = optional_text(value).ok_or_else(mismatch)?,
            (Field::DateActionFinalized, value) => {
                self.date_action_finalized = optional_timestamp(value).ok_or_else(mismatch)?
            }
            (Field::DeadlineDate, value) => {
                self.deadline_date = optional_timestamp(value).ok_or_else(mismatch)?
            }
            (Field::DateToAo, value) => {
                self.date_to_ao = optional_timestamp(value).ok_or_else(mismatch)?
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }
}

fn optional_text(value: FieldValue) -> Option<Option<String>> {
    match value {
        FieldValue::Null => Some(None),
        FieldValue::Text(text) => Some(Some(text)),
        _ => None,
    }
}

fn optional_timestamp(value: FieldValue) -> Option<Option<i64>> {
    match value {
        FieldValue::Null => Some(None),
        FieldValue::Timestamp(ms) => Some(Some(ms)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Correspondence, CorrespondenceStatus, CorrespondenceValidationError, Field, FieldPatch,
        FieldValue,
    };

    fn sample() -> Correspondence {
        Correspondence::create_at(1_000, "Budget", "Treasury", "Please review.", None, None)
            .expect("valid record")
    }

    #[test]
    fn create_defaults_to_registered() {
        let record = sample();
        assert_eq!(record.status(), CorrespondenceStatus::Registered);
        assert_eq!(record.created_at(), 1_000);
        assert_eq!(record.version(), 1);
        assert_eq!(record.ao_comments(), "");
        assert!(record.action_officer().is_none());
    }

    #[test]
    fn create_rejects_blank_required_fields() {
        let err = Correspondence::create_at(0, "  ", "r", "c", None, None).unwrap_err();
        assert_eq!(err, CorrespondenceValidationError::EmptyField(Field::Subject));
        let err = Correspondence::create_at(0, "s", "", "c", None, None).unwrap_err();
        assert_eq!(err, CorrespondenceValidationError::EmptyField(Field::Recipient));
        let err = Correspondence::create_at(0, "s", "r", "", None, None).unwrap_err();
        assert_eq!(err, CorrespondenceValidationError::EmptyField(Field::Content));
    }

    #[test]
    fn create_rejects_unknown_and_miscased_status() {
        for value in ["pending", "sent to ao", "Closed", ""] {
            let err = Correspondence::create_at(0, "s", "r", "c", Some(value), None).unwrap_err();
            assert_eq!(
                err,
                CorrespondenceValidationError::UnknownStatus(value.to_string())
            );
        }
    }

    #[test]
    fn create_accepts_every_wire_status() {
        for status in CorrespondenceStatus::ALL {
            let record =
                Correspondence::create_at(0, "s", "r", "c", Some(status.as_str()), None).unwrap();
            assert_eq!(record.status(), status);
        }
    }

    #[test]
    fn blank_attachment_ref_is_dropped() {
        let record =
            Correspondence::create_at(0, "s", "r", "c", None, Some("  ".to_string())).unwrap();
        assert!(record.attachment_ref().is_none());
    }

    #[test]
    fn status_and_field_wire_strings_roundtrip() {
        for status in CorrespondenceStatus::ALL {
            assert_eq!(CorrespondenceStatus::parse(status.as_str()), Some(status));
        }
        for field in Field::ALL {
            assert_eq!(Field::parse(field.as_str()), Some(field));
        }
        assert_eq!(
            serde_json::to_string(&CorrespondenceStatus::SentToAo).unwrap(),
            "\"Sent to AO\""
        );
    }

    #[test]
    fn with_patch_rejects_finalized_date_outside_final_states() {
        let record = sample();
        let mut patch = FieldPatch::new();
        patch.insert(Field::DateActionFinalized, FieldValue::Timestamp(5));
        let err = record.with_patch(&patch).unwrap_err();
        assert_eq!(
            err,
            CorrespondenceValidationError::FinalizedDateNotAllowed(CorrespondenceStatus::Registered)
        );

        patch.insert(Field::Status, CorrespondenceStatus::Processing.into());
        let next = record.with_patch(&patch).unwrap();
        assert_eq!(next.date_action_finalized(), Some(5));
        assert_eq!(next.version(), record.version());
    }

    #[test]
    fn with_patch_rejects_type_mismatch() {
        let mut patch = FieldPatch::new();
        patch.insert(Field::Status, FieldValue::text("Processing"));
        let err = sample().with_patch(&patch).unwrap_err();
        assert!(matches!(
            err,
            CorrespondenceValidationError::TypeMismatch {
                field: Field::Status,
                ..
            }
        ));
    }

    #[test]
    fn normalization_maps_blank_optional_text_to_null() {
        assert_eq!(
            FieldValue::text(" ").normalized_for(Field::ActionOfficer),
            FieldValue::Null
        );
        assert_eq!(
            FieldValue::Null.normalized_for(Field::AoComments),
            FieldValue::text("")
        );
        assert_eq!(
            FieldValue::text("").normalized_for(Field::Subject),
            FieldValue::text("")
        );
    }

    #[test]
    fn from_json_decodes_by_field_type() {
        let status = serde_json::json!("Sent to AO");
        assert_eq!(
            FieldValue::from_json(Field::Status, &status),
            Some(FieldValue::Status(CorrespondenceStatus::SentToAo))
        );
        assert_eq!(
            FieldValue::from_json(Field::Subject, &status),
            Some(FieldValue::text("Sent to AO"))
        );
        assert_eq!(
            FieldValue::from_json(Field::DeadlineDate, &serde_json::json!(42)),
            Some(FieldValue::Timestamp(42))
        );
        assert_eq!(FieldValue::from_json(Field::Subject, &serde_json::json!(42)), None);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["status"], "Registered");
        assert_eq!(value["createdAt"], 1_000);
        assert!(value.get("dateToAO").is_some());
        assert!(value.get("dateToAo").is_none());
    }
}
