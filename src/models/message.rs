use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::validation::validate_message_body;
use crate::models::UserSummary;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub client_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.coach_id == user_id || self.client_user_id == user_id
    }

    /// The other side of the conversation from `user_id`'s point of view
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.coach_id == user_id {
            self.client_user_id
        } else {
            self.coach_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    pub attachment_type: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Short text used in notifications and conversation previews
    pub fn preview(&self) -> String {
        match self.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                let mut preview: String = text.chars().take(80).collect();
                if text.chars().count() > 80 {
                    preview.push('…');
                }
                preview
            }
            _ => "Sent an attachment".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub counterpart: Option<UserSummary>,
    pub last_message: Option<Message>,
    pub unread_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    /// Client user id when a coach starts, coach id when a client starts
    pub participant_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_send_message"))]
pub struct SendMessageRequest {
    #[validate(length(max = 5000))]
    pub content: Option<String>,
    #[validate(url)]
    pub attachment_url: Option<String>,
    #[validate(length(max = 100))]
    pub attachment_type: Option<String>,
}

fn validate_send_message(request: &SendMessageRequest) -> Result<(), ValidationError> {
    validate_message_body(request.content.as_deref(), request.attachment_url.as_deref())
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl MessageQuery {
    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: Option<&str>) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: content.map(str::to_string),
            attachment_url: None,
            attachment_type: None,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let request = SendMessageRequest {
            content: Some("   ".to_string()),
            attachment_url: None,
            attachment_type: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_attachment_only_message_is_accepted() {
        let request = SendMessageRequest {
            content: None,
            attachment_url: Some("https://files.example.com/swing.mp4".to_string()),
            attachment_type: Some("video/mp4".to_string()),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(MessageQuery { before: None, limit: None }.page_size(), 50);
        assert_eq!(MessageQuery { before: None, limit: Some(500) }.page_size(), 100);
        assert_eq!(MessageQuery { before: None, limit: Some(0) }.page_size(), 1);
    }

    #[test]
    fn test_preview() {
        assert_eq!(message(Some("See you Tuesday")).preview(), "See you Tuesday");
        assert_eq!(message(None).preview(), "Sent an attachment");
        let long = "a".repeat(120);
        assert_eq!(message(Some(&long)).preview().chars().count(), 81);
    }

    #[test]
    fn test_counterpart() {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            coach_id: Uuid::new_v4(),
            client_user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            last_message_at: None,
        };
        assert_eq!(conversation.counterpart(conversation.coach_id), conversation.client_user_id);
        assert_eq!(conversation.counterpart(conversation.client_user_id), conversation.coach_id);
        assert!(!conversation.is_participant(Uuid::new_v4()));
    }
}
