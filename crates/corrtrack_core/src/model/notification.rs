//! Notification model.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

/// In-app notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub message: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub read: bool,
}

impl Notification {
    /// Creates an unread notification.
    pub fn new(recipient_id: impl Into<UserId>, message: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: recipient_id.into(),
            message: message.into(),
            created_at,
            read: false,
        }
    }
}
