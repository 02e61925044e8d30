//! Notification types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic notification id
///
/// Allocated from the creation time in milliseconds, bumped when two
/// notifications land in the same millisecond.
pub type NotificationId = u64;

/// Severity / purpose of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Operation succeeded
    Success,
    /// Operation failed
    Error,
    /// Neutral information
    Info,
    /// Something needs attention
    Warning,
    /// Work in progress
    Loading,
}

/// A transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A notification with its stacking position (0 = oldest)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionedNotification {
    pub position: usize,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Change published by the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Posted(NotificationId),
    Dismissed(NotificationId),
    Expired(Vec<NotificationId>),
    Cleared,
}
