//! Append-only audit trail sink and SQLite implementation.
//!
//! # Invariants
//! - Entries are inserted, never updated or deleted (enforced by triggers).
//! - Change logs are stored as JSON keyed by field wire names.

use crate::model::audit::{decode_change_log, encode_change_log, AuditEntry, AuditEntryId};
use crate::model::correspondence::CorrespondenceId;
use crate::repo::correspondence_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

/// Audit logger contract.
pub trait AuditSink {
    fn append(&self, entry: &AuditEntry) -> RepoResult<AuditEntryId>;
}

impl<T: AuditSink + ?Sized> AuditSink for &T {
    fn append(&self, entry: &AuditEntry) -> RepoResult<AuditEntryId> {
        (**self).append(entry)
    }
}

/// SQLite-backed audit trail.
pub struct SqliteAuditRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Returns the trail of one correspondence, oldest first.
    pub fn entries_for(&self, correspondence_id: CorrespondenceId) -> RepoResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, actor_id, correspondence_id, changes, timestamp
             FROM audit_trail
             WHERE correspondence_id = ?1
             ORDER BY timestamp ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([correspondence_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_audit_row(row)?);
        }
        Ok(entries)
    }

    /// Total number of entries in the trail.
    pub fn count(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_trail;", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl AuditSink for SqliteAuditRepository<'_> {
    fn append(&self, entry: &AuditEntry) -> RepoResult<AuditEntryId> {
        let changes = encode_change_log(&entry.changes)
            .map_err(|err| RepoError::InvalidData(format!("unencodable change log: {err}")))?;

        self.conn.execute(
            "INSERT INTO audit_trail (id, actor_id, correspondence_id, changes, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                entry.id.to_string(),
                entry.actor_id.as_str(),
                entry.correspondence_id.to_string(),
                changes,
                entry.timestamp,
            ],
        )?;
        Ok(entry.id)
    }
}

fn parse_audit_row(row: &Row<'_>) -> RepoResult<AuditEntry> {
    let parse_uuid = |column: &str| -> RepoResult<Uuid> {
        let text: String = row.get(column)?;
        Uuid::parse_str(&text).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid `{text}` in audit_trail.{column}"))
        })
    };

    let raw_changes: String = row.get("changes")?;
    let changes = decode_change_log(&raw_changes)
        .map_err(|message| RepoError::InvalidData(format!("audit_trail.changes: {message}")))?;

    Ok(AuditEntry {
        id: parse_uuid("id")?,
        actor_id: row.get("actor_id")?,
        correspondence_id: parse_uuid("correspondence_id")?,
        changes,
        timestamp: row.get("timestamp")?,
    })
}
