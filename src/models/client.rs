use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

use crate::models::validation::validate_not_blank;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Archived,
}

/// A coach's roster entry; `user_id` links it to a client login when one exists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub status: ClientStatus,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Active
    }
}

#[derive(Debug, Serialize)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: Client,
    pub active_programs: i64,
    pub upcoming_lessons: i64,
    pub assigned_routines: i64,
    pub assigned_videos: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ClientQuery {
    pub status: Option<ClientStatus>,
    pub search: Option<String>,
}

/// Rows removed when a client is archived
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub events_deleted: u64,
    pub program_assignments_deleted: u64,
    pub routine_assignments_deleted: u64,
    pub video_assignments_deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_validation() {
        let valid = CreateClientRequest {
            name: "Jordan Smith".to_string(),
            email: Some("jordan@example.com".to_string()),
            phone: None,
            notes: None,
            user_id: None,
        };
        assert!(valid.validate().is_ok());

        let blank_name = CreateClientRequest {
            name: "   ".to_string(),
            email: None,
            phone: None,
            notes: None,
            user_id: None,
        };
        assert!(blank_name.validate().is_err());

        let bad_email = CreateClientRequest {
            name: "Sam".to_string(),
            email: Some("not-an-email".to_string()),
            phone: None,
            notes: None,
            user_id: None,
        };
        assert!(bad_email.validate().is_err());
    }
}
