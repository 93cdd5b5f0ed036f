use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>, // Ids the UI links to
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum NotificationKind {
    // Messaging
    NewMessage,

    // Calendar
    LessonScheduled,
    LessonReminder,

    // Assignments
    ProgramAssigned,
    ProgramCompleted,
    RoutineAssigned,
    VideoAssigned,

    // Time swaps
    SwapRequested,
    SwapApproved,
    SwapDeclined,
    SwapExpired,

    // Onboarding
    ClientInvited,
}

impl NotificationKind {
    /// Which user setting gates this kind, if any
    pub fn preference(&self) -> NotificationPreference {
        match self {
            NotificationKind::NewMessage => NotificationPreference::Messages,
            NotificationKind::LessonReminder | NotificationKind::LessonScheduled => {
                NotificationPreference::LessonReminders
            }
            _ => NotificationPreference::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPreference {
    Messages,
    LessonReminders,
    Always,
}

/// Input to the internal notify operation
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>,
}

impl NewNotification {
    pub fn new(user_id: Uuid, kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_preferences() {
        assert_eq!(NotificationKind::NewMessage.preference(), NotificationPreference::Messages);
        assert_eq!(
            NotificationKind::LessonReminder.preference(),
            NotificationPreference::LessonReminders
        );
        assert_eq!(NotificationKind::SwapApproved.preference(), NotificationPreference::Always);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationKind::ProgramAssigned).unwrap();
        assert_eq!(json, "\"program_assigned\"");
    }
}
