use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;
use validator::Validate;

use crate::models::analytics::percentage;
use crate::models::schedule::ScheduledDrillRow;
use crate::models::AssignmentStatus;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeekProgress {
    pub week_number: i32,
    pub completed_drills: i64,
    pub total_drills: i64,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentProgress {
    pub assignment_id: Uuid,
    pub program_id: Uuid,
    pub program_title: String,
    pub client_id: Uuid,
    pub start_date: NaiveDate,
    pub status: AssignmentStatus,
    pub completed_drills: i64,
    pub total_drills: i64,
    pub completion_percentage: f64,
    pub current_week: Option<i32>,
    pub current_day: Option<i32>,
    pub weeks: Vec<WeekProgress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientProgress {
    pub client_id: Uuid,
    pub assignments: Vec<AssignmentProgress>,
    pub completions_last_7_days: i64,
    pub completions_last_30_days: i64,
}

/// Assignment row joined with its program title
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentContext {
    pub id: Uuid,
    pub program_id: Uuid,
    pub program_title: String,
    pub coach_id: Uuid,
    pub client_id: Uuid,
    pub client_user_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub status: AssignmentStatus,
}

/// Per-week completed/total counts, ordered by week number. Drills on
/// replaced days are left out of both counts.
pub fn week_breakdown(
    rows: &[ScheduledDrillRow],
    replaced_days: &HashSet<Uuid>,
    completed: &HashSet<Uuid>,
) -> Vec<WeekProgress> {
    let mut weeks: BTreeMap<i32, (i64, i64)> = BTreeMap::new();
    for row in rows.iter().filter(|r| !replaced_days.contains(&r.day_id)) {
        let entry = weeks.entry(row.week_number).or_insert((0, 0));
        entry.1 += 1;
        if completed.contains(&row.drill_id) {
            entry.0 += 1;
        }
    }

    weeks
        .into_iter()
        .map(|(week_number, (done, total))| WeekProgress {
            week_number,
            completed_drills: done,
            total_drills: total,
            completion_percentage: percentage(done, total),
        })
        .collect()
}

// Workouts

#[derive(Debug, Clone, Serialize)]
pub struct TodayWorkout {
    pub assignment_id: Uuid,
    pub program_id: Uuid,
    pub program_title: String,
    pub date: NaiveDate,
    pub drills: Vec<crate::models::schedule::CalendarDrill>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteDrillRequest {
    pub assignment_id: Uuid,
    pub drill_id: Uuid,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UncompleteDrillRequest {
    pub assignment_id: Uuid,
    pub drill_id: Uuid,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DrillCompletionResult {
    pub assignment_id: Uuid,
    pub drill_id: Uuid,
    pub completed: bool,
    pub already_completed: bool,
    pub assignment_status: AssignmentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(week_number: i32) -> ScheduledDrillRow {
        ScheduledDrillRow {
            day_id: Uuid::new_v4(),
            week_number,
            day_number: 1,
            drill_id: Uuid::new_v4(),
            position: 1,
            title: "Drill".to_string(),
            description: None,
            duration_minutes: None,
            library_item_id: None,
            routine_id: None,
        }
    }

    #[test]
    fn test_week_breakdown() {
        let rows = vec![row(1), row(1), row(2), row(3)];
        let completed: HashSet<Uuid> = [rows[0].drill_id, rows[2].drill_id].into_iter().collect();

        let weeks = week_breakdown(&rows, &HashSet::new(), &completed);

        assert_eq!(weeks.len(), 3);
        assert_eq!(weeks[0].completion_percentage, 50.0);
        assert_eq!(weeks[1].completion_percentage, 100.0);
        assert_eq!(weeks[2].completed_drills, 0);
    }

    #[test]
    fn test_week_breakdown_skips_replaced_days() {
        let rows = vec![row(1), row(1), row(2)];
        let replaced: HashSet<Uuid> = [rows[1].day_id, rows[2].day_id].into_iter().collect();
        let completed: HashSet<Uuid> = [rows[0].drill_id].into_iter().collect();

        let weeks = week_breakdown(&rows, &replaced, &completed);

        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].total_drills, 1);
        assert_eq!(weeks[0].completion_percentage, 100.0);
    }
}
