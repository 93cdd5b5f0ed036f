use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::borrow::Cow;
use std::collections::HashSet;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ProgramStatus {
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Program {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub level: Option<String>,
    pub status: ProgramStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramWeek {
    pub id: Uuid,
    pub program_id: Uuid,
    pub week_number: i32,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramDay {
    pub id: Uuid,
    pub week_id: Uuid,
    pub day_number: i32,
    pub title: Option<String>,
    pub is_rest_day: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramDrill {
    pub id: Uuid,
    pub day_id: Uuid,
    pub position: i32,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub library_item_id: Option<Uuid>,
    pub routine_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayDetail {
    #[serde(flatten)]
    pub day: ProgramDay,
    pub drills: Vec<ProgramDrill>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekDetail {
    #[serde(flatten)]
    pub week: ProgramWeek,
    pub days: Vec<DayDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramDetail {
    #[serde(flatten)]
    pub program: Program,
    pub weeks: Vec<WeekDetail>,
}

impl ProgramDetail {
    pub fn drill_count(&self) -> usize {
        self.weeks
            .iter()
            .flat_map(|w| w.days.iter())
            .map(|d| d.drills.len())
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProgramSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub level: Option<String>,
    pub status: ProgramStatus,
    pub week_count: i64,
    pub assignment_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DrillInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: Option<i32>,
    pub library_item_id: Option<Uuid>,
    pub routine_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DayInput {
    #[validate(range(min = 1, max = 7))]
    pub day_number: i32,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[serde(default)]
    pub is_rest_day: bool,
    #[serde(default)]
    #[validate(nested)]
    pub drills: Vec<DrillInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WeekInput {
    #[validate(range(min = 1, max = 104))]
    pub week_number: i32,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub days: Vec<DayInput>,
}

impl WeekInput {
    pub fn drill_refs(&self) -> impl Iterator<Item = &DrillInput> {
        self.days.iter().flat_map(|d| d.drills.iter())
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_create_program"))]
pub struct CreateProgramRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub level: Option<String>,
    pub status: Option<ProgramStatus>,
    #[serde(default)]
    #[validate(nested)]
    pub weeks: Vec<WeekInput>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProgramRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub level: Option<String>,
    pub status: Option<ProgramStatus>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_replace_structure"))]
pub struct ReplaceStructureRequest {
    #[validate(nested)]
    pub weeks: Vec<WeekInput>,
}

#[derive(Debug, Deserialize)]
pub struct AssignProgramRequest {
    pub client_id: Uuid,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramAssignment {
    pub id: Uuid,
    pub program_id: Uuid,
    pub client_id: Uuid,
    pub start_date: NaiveDate,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignmentWithClient {
    pub id: Uuid,
    pub program_id: Uuid,
    pub client_id: Uuid,
    pub client_name: String,
    pub start_date: NaiveDate,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn validate_create_program(request: &CreateProgramRequest) -> Result<(), ValidationError> {
    check_structure(&request.weeks)
}

fn validate_replace_structure(request: &ReplaceStructureRequest) -> Result<(), ValidationError> {
    check_structure(&request.weeks)
}

/// Week numbers unique per program, day numbers unique per week
pub fn check_structure(weeks: &[WeekInput]) -> Result<(), ValidationError> {
    let mut seen_weeks = HashSet::new();
    for week in weeks {
        if !seen_weeks.insert(week.week_number) {
            let mut error = ValidationError::new("duplicate_week");
            error.message = Some(Cow::Owned(format!("Week {} appears more than once", week.week_number)));
            return Err(error);
        }

        let mut seen_days = HashSet::new();
        for day in &week.days {
            if !seen_days.insert(day.day_number) {
                let mut error = ValidationError::new("duplicate_day");
                error.message = Some(Cow::Owned(format!(
                    "Day {} appears more than once in week {}",
                    day.day_number, week.week_number
                )));
                return Err(error);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(day_number: i32) -> DayInput {
        DayInput {
            day_number,
            title: None,
            is_rest_day: false,
            drills: vec![DrillInput {
                title: "Footwork ladder".to_string(),
                description: None,
                duration_minutes: Some(15),
                library_item_id: None,
                routine_id: None,
            }],
        }
    }

    fn week(week_number: i32, days: Vec<DayInput>) -> WeekInput {
        WeekInput { week_number, title: None, days }
    }

    #[test]
    fn test_structure_accepts_distinct_weeks_and_days() {
        let weeks = vec![week(1, vec![day(1), day(3)]), week(2, vec![day(1)])];
        assert!(check_structure(&weeks).is_ok());
    }

    #[test]
    fn test_structure_rejects_duplicate_week() {
        let weeks = vec![week(1, vec![day(1)]), week(1, vec![day(2)])];
        assert_eq!(check_structure(&weeks).unwrap_err().code, "duplicate_week");
    }

    #[test]
    fn test_structure_rejects_duplicate_day() {
        let weeks = vec![week(1, vec![day(2), day(2)])];
        assert_eq!(check_structure(&weeks).unwrap_err().code, "duplicate_day");
    }

    #[test]
    fn test_nested_day_range_is_validated() {
        let request = CreateProgramRequest {
            title: "Serve fundamentals".to_string(),
            description: None,
            level: None,
            status: None,
            weeks: vec![week(1, vec![day(8)])],
        };
        assert!(request.validate().is_err());
    }
}
