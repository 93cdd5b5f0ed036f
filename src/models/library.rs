use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum LibraryItemKind {
    Video,
    File,
    Link,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LibraryItem {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub kind: LibraryItemKind,
    pub url: String,
    pub storage_key: Option<String>,
    pub provider: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLibraryItemRequest {
    /// Falls back to the fetched video title when omitted
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    pub kind: LibraryItemKind,
    #[validate(url)]
    pub url: String,
    #[validate(length(min = 1, max = 500))]
    pub storage_key: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateLibraryItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryQuery {
    pub category: Option<String>,
    pub kind: Option<LibraryItemKind>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignLibraryItemRequest {
    #[validate(length(min = 1, max = 100))]
    pub client_ids: Vec<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VideoAssignment {
    pub id: Uuid,
    pub library_item_id: Uuid,
    pub client_id: Uuid,
    pub notes: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
}

/// A library item as seen by the client it was assigned to
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignedVideo {
    pub assignment_id: Uuid,
    pub client_id: Uuid,
    pub notes: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub library_item_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub kind: LibraryItemKind,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct AssignResult {
    pub assigned: Vec<Uuid>,
    pub already_assigned: Vec<Uuid>,
}
