use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    EventCreated,
    EventUpdated,
    EventDeleted,
    EventCancelled,
    BookingConfirmed,
    BookingCancelled,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "notification_type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub event_id: Option<Uuid>,
    pub event_title: Option<String>,
    pub is_read: bool,
    pub priority: Priority,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Notification content before it is addressed to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub event_id: Option<Uuid>,
    pub event_title: Option<String>,
    pub priority: Priority,
    pub action_url: Option<String>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            event_id: None,
            event_title: None,
            priority: Priority::Medium,
            action_url: None,
        }
    }

    pub fn for_event(mut self, event_id: Uuid, event_title: &str) -> Self {
        self.event_id = Some(event_id);
        self.event_title = Some(event_title.to_string());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub fn address(&self, user_id: Uuid, now: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: self.kind,
            title: self.title.clone(),
            message: self.message.clone(),
            event_id: self.event_id,
            event_title: self.event_title.clone(),
            is_read: false,
            priority: self.priority,
            action_url: self.action_url.clone(),
            created_at: now,
        }
    }
}
