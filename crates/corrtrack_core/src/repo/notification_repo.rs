//! Notification sink and SQLite-backed inbox.
//!
//! # Invariants
//! - Notifications are created unread.
//! - Sending is fire-and-forget for callers; failures surface only as errors
//!   for the caller to log.

use crate::clock::{Clock, SystemClock};
use crate::model::notification::Notification;
use crate::repo::correspondence_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

/// Notifier contract: deliver `message` to `recipient_id`.
pub trait Notifier {
    fn send(&self, recipient_id: &str, message: &str) -> RepoResult<()>;
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn send(&self, recipient_id: &str, message: &str) -> RepoResult<()> {
        (**self).send(recipient_id, message)
    }
}

/// Notifier writing into the `notifications` table.
pub struct SqliteNotificationRepository<'conn, C: Clock = SystemClock> {
    conn: &'conn Connection,
    clock: C,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_clock(conn, SystemClock)
    }
}

impl<'conn, C: Clock> SqliteNotificationRepository<'conn, C> {
    pub fn with_clock(conn: &'conn Connection, clock: C) -> Self {
        Self { conn, clock }
    }

    /// Lists notifications for one recipient, newest first.
    pub fn list_for_recipient(&self, recipient_id: &str) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recipient_id, message, created_at, read
             FROM notifications
             WHERE recipient_id = ?1
             ORDER BY created_at DESC, rowid DESC;",
        )?;
        let mut rows = stmt.query([recipient_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_notification_row(row)?);
        }
        Ok(items)
    }
}

impl<C: Clock> Notifier for SqliteNotificationRepository<'_, C> {
    fn send(&self, recipient_id: &str, message: &str) -> RepoResult<()> {
        let notification = Notification::new(recipient_id, message, self.clock.now_ms());
        self.conn.execute(
            "INSERT INTO notifications (id, recipient_id, message, created_at, read)
             VALUES (?1, ?2, ?3, ?4, 0);",
            params![
                notification.id.to_string(),
                notification.recipient_id.as_str(),
                notification.message.as_str(),
                notification.created_at,
            ],
        )?;
        Ok(())
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid `{id_text}` in notifications.id"))
    })?;

    let read = match row.get::<_, i64>("read")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid read value `{other}` in notifications.read"
            )));
        }
    };

    Ok(Notification {
        id,
        recipient_id: row.get("recipient_id")?,
        message: row.get("message")?,
        created_at: row.get("created_at")?,
        read,
    })
}
