//! Correspondence repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the document-store contract (`get`, `list`, `insert`,
//!   `apply_patch`) over the `correspondences` table.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `insert` validates the full record before writing.
//! - `apply_patch` validates the patch against the stored row and writes it
//!   in one immediate transaction, bumping `version` exactly once.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::correspondence::{
    Correspondence, CorrespondenceId, CorrespondenceStatus, CorrespondenceValidationError, Field,
    FieldPatch, FieldValue,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const CORRESPONDENCE_SELECT_SQL: &str = "SELECT
    id,
    subject,
    recipient,
    content,
    status,
    attachment_ref,
    created_at,
    created_by,
    action_officer,
    ao_comments,
    date_action_finalized,
    deadline_date,
    date_to_ao,
    version
FROM correspondences";

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for correspondence, audit and notification persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(CorrespondenceValidationError),
    Db(DbError),
    NotFound(CorrespondenceId),
    /// Stored version moved past the version the caller read.
    Conflict {
        id: CorrespondenceId,
        expected: u64,
        actual: u64,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "correspondence not found: {id}"),
            Self::Conflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "correspondence {id} changed concurrently: expected version {expected}, found {actual}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::Conflict { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<CorrespondenceValidationError> for RepoError {
    fn from(value: CorrespondenceValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Write precondition for `apply_patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteGuard {
    /// Fail with `Conflict` unless the stored version equals this one.
    ExpectVersion(u64),
    /// Last writer wins at the field level.
    Unconditional,
}

/// Filter and pagination options for listing correspondences.
///
/// Results are ordered by `created_at DESC, id ASC`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrespondenceListQuery {
    pub status: Option<CorrespondenceStatus>,
    /// Only rows with a non-null `date_to_ao <= value`.
    pub date_to_ao_at_or_before: Option<i64>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Document-store contract for correspondences.
pub trait CorrespondenceRepository {
    fn insert(&self, record: &Correspondence) -> RepoResult<CorrespondenceId>;
    fn get(&self, id: CorrespondenceId) -> RepoResult<Option<Correspondence>>;
    fn list(&self, query: &CorrespondenceListQuery) -> RepoResult<Vec<Correspondence>>;
    /// Applies every field of `patch` to the stored record as one write.
    ///
    /// The post-patch record is validated against the stored state, not a
    /// caller snapshot; on `Validation` nothing is written. Returns the record
    /// as written, including its new version.
    fn apply_patch(
        &self,
        id: CorrespondenceId,
        guard: WriteGuard,
        patch: &FieldPatch,
    ) -> RepoResult<Correspondence>;
}

impl<T: CorrespondenceRepository + ?Sized> CorrespondenceRepository for &T {
    fn insert(&self, record: &Correspondence) -> RepoResult<CorrespondenceId> {
        (**self).insert(record)
    }

    fn get(&self, id: CorrespondenceId) -> RepoResult<Option<Correspondence>> {
        (**self).get(id)
    }

    fn list(&self, query: &CorrespondenceListQuery) -> RepoResult<Vec<Correspondence>> {
        (**self).list(query)
    }

    fn apply_patch(
        &self,
        id: CorrespondenceId,
        guard: WriteGuard,
        patch: &FieldPatch,
    ) -> RepoResult<Correspondence> {
        (**self).apply_patch(id, guard, patch)
    }
}

/// SQLite-backed correspondence repository.
pub struct SqliteCorrespondenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCorrespondenceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CorrespondenceRepository for SqliteCorrespondenceRepository<'_> {
    fn insert(&self, record: &Correspondence) -> RepoResult<CorrespondenceId> {
        record.validate()?;

        self.conn.execute(
            "INSERT INTO correspondences (
                id,
                subject,
                recipient,
                content,
                status,
                attachment_ref,
                created_at,
                created_by,
                action_officer,
                ao_comments,
                date_action_finalized,
                deadline_date,
                date_to_ao,
                version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                record.id.to_string(),
                record.subject.as_str(),
                record.recipient.as_str(),
                record.content.as_str(),
                record.status.as_str(),
                record.attachment_ref.as_deref(),
                record.created_at,
                record.created_by.as_deref(),
                record.action_officer.as_deref(),
                record.ao_comments.as_str(),
                record.date_action_finalized,
                record.deadline_date,
                record.date_to_ao,
                version_to_db(record.version)?,
            ],
        )?;

        Ok(record.id)
    }

    fn get(&self, id: CorrespondenceId) -> RepoResult<Option<Correspondence>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CORRESPONDENCE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_correspondence_row(row)?));
        }
        Ok(None)
    }

    fn list(&self, query: &CorrespondenceListQuery) -> RepoResult<Vec<Correspondence>> {
        let mut sql = format!("{CORRESPONDENCE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        if let Some(cutoff) = query.date_to_ao_at_or_before {
            sql.push_str(" AND date_to_ao IS NOT NULL AND date_to_ao <= ?");
            bind_values.push(Value::Integer(cutoff));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_correspondence_row(row)?);
        }
        Ok(records)
    }

    fn apply_patch(
        &self,
        id: CorrespondenceId,
        guard: WriteGuard,
        patch: &FieldPatch,
    ) -> RepoResult<Correspondence> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let stored = self.get(id)?.ok_or(RepoError::NotFound(id))?;
        if let WriteGuard::ExpectVersion(expected) = guard {
            if stored.version != expected {
                return Err(RepoError::Conflict {
                    id,
                    expected,
                    actual: stored.version,
                });
            }
        }
        if patch.is_empty() {
            return Ok(stored);
        }

        let mut next = stored.with_patch(patch)?;

        let mut assignments = Vec::with_capacity(patch.len());
        let mut bind_values: Vec<Value> = Vec::with_capacity(patch.len() + 2);
        for (field, value) in patch {
            assignments.push(format!("{} = ?", field_column(*field)));
            bind_values.push(field_value_to_db(&value.clone().normalized_for(*field)));
        }
        let sql = format!(
            "UPDATE correspondences
             SET {}, version = version + 1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ? AND version = ?
             RETURNING version;",
            assignments.join(", ")
        );
        bind_values.push(Value::Text(id.to_string()));
        bind_values.push(Value::Integer(version_to_db(stored.version)?));

        let new_version = tx.query_row(&sql, params_from_iter(bind_values), |row| {
            row.get::<_, i64>(0)
        })?;
        next.version = version_from_db(new_version)?;
        tx.commit()?;
        Ok(next)
    }
}

fn field_column(field: Field) -> &'static str {
    match field {
        Field::Subject => "subject",
        Field::Recipient => "recipient",
        Field::Content => "content",
        Field::Status => "status",
        Field::AttachmentRef => "attachment_ref",
        Field::ActionOfficer => "action_officer",
        Field::AoComments => "ao_comments",
        Field::DateActionFinalized => "date_action_finalized",
        Field::DeadlineDate => "deadline_date",
        Field::DateToAo => "date_to_ao",
    }
}

fn field_value_to_db(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(text) => Value::Text(text.clone()),
        FieldValue::Status(status) => Value::Text(status.as_str().to_string()),
        FieldValue::Timestamp(ms) => Value::Integer(*ms),
    }
}

fn version_to_db(version: u64) -> RepoResult<i64> {
    i64::try_from(version)
        .map_err(|_| RepoError::InvalidData(format!("version {version} exceeds storage range")))
}

fn version_from_db(version: i64) -> RepoResult<u64> {
    u64::try_from(version).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid version `{version}` in correspondences.version"
        ))
    })
}

fn parse_correspondence_row(row: &Row<'_>) -> RepoResult<Correspondence> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid `{id_text}` in correspondences.id"))
    })?;

    let status_text: String = row.get("status")?;
    let status = CorrespondenceStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in correspondences.status"
        ))
    })?;

    let record = Correspondence {
        id,
        subject: row.get("subject")?,
        recipient: row.get("recipient")?,
        content: row.get("content")?,
        status,
        attachment_ref: row.get("attachment_ref")?,
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        action_officer: row.get("action_officer")?,
        ao_comments: row.get("ao_comments")?,
        date_action_finalized: row.get("date_action_finalized")?,
        deadline_date: row.get("deadline_date")?,
        date_to_ao: row.get("date_to_ao")?,
        version: version_from_db(row.get("version")?)?,
    };
    record.validate()?;
    Ok(record)
}
