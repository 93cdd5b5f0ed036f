use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Routine {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoutineExercise {
    pub id: Uuid,
    pub routine_id: Uuid,
    pub position: i32,
    pub name: String,
    pub description: Option<String>,
    pub sets: Option<i32>,
    pub reps: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub library_item_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutineDetail {
    #[serde(flatten)]
    pub routine: Routine,
    pub exercises: Vec<RoutineExercise>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExerciseInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub sets: Option<i32>,
    #[validate(range(min = 1, max = 1000))]
    pub reps: Option<i32>,
    #[validate(range(min = 1, max = 86400))]
    pub duration_seconds: Option<i32>,
    pub library_item_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoutineRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200), nested)]
    pub exercises: Vec<ExerciseInput>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateRoutineRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Replaces the whole exercise list when present
    #[validate(length(max = 200), nested)]
    pub exercises: Option<Vec<ExerciseInput>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignRoutineRequest {
    #[validate(length(min = 1, max = 100))]
    pub client_ids: Vec<Uuid>,
    pub start_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoutineAssignment {
    pub id: Uuid,
    pub routine_id: Uuid,
    pub client_id: Uuid,
    pub start_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignedRoutine {
    pub assignment: RoutineAssignment,
    pub routine: RoutineDetail,
}
