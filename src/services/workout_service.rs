use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{
    project_calendar, AssignmentContext, AssignmentStatus, CompleteDrillRequest, DrillCompletionResult,
    NewNotification, NotificationKind, TodayWorkout, UncompleteDrillRequest, CALENDAR_DATE_FORMAT,
};
use crate::services::program_service::{assignment_context, completed_drills, replaced_days, scheduled_drills};
use crate::services::NotificationService;

#[derive(Clone)]
pub struct WorkoutService {
    db: PgPool,
    notifications: NotificationService,
}

impl WorkoutService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    /// Drills due on `date` across the caller's active assignments
    pub async fn today(&self, user_id: Uuid, date: Option<NaiveDate>) -> AppResult<Vec<TodayWorkout>> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let key = date.format(CALENDAR_DATE_FORMAT).to_string();

        let assignments = sqlx::query_as::<_, AssignmentContext>(
            r#"
            SELECT a.id, a.program_id, p.title AS program_title, p.coach_id,
                   a.client_id, c.user_id AS client_user_id, a.start_date, a.status
            FROM program_assignments a
            JOIN programs p ON p.id = a.program_id
            JOIN clients c ON c.id = a.client_id
            WHERE c.user_id = $1 AND c.status = 'active' AND a.status = 'active'
              AND a.start_date <= $2
            ORDER BY a.assigned_at
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.db)
        .await?;

        let mut workouts = Vec::new();
        for assignment in assignments {
            let rows = scheduled_drills(&self.db, assignment.program_id).await?;
            let replaced = replaced_days(&self.db, assignment.id).await?;
            let completed = completed_drills(&self.db, assignment.id).await?;

            let mut calendar = project_calendar(assignment.start_date, &rows, &replaced, &completed, Some((date, date)));
            if let Some(drills) = calendar.remove(&key) {
                workouts.push(TodayWorkout {
                    assignment_id: assignment.id,
                    program_id: assignment.program_id,
                    program_title: assignment.program_title,
                    date,
                    drills,
                });
            }
        }

        Ok(workouts)
    }

    async fn own_assignment(&self, user_id: Uuid, assignment_id: Uuid) -> AppResult<AssignmentContext> {
        assignment_context(&self.db, assignment_id)
            .await?
            .filter(|a| a.client_user_id == Some(user_id))
            .ok_or(AppError::NotFound("Program assignment"))
    }

    async fn ensure_drill_in_program(&self, program_id: Uuid, drill_id: Uuid) -> AppResult<()> {
        let belongs: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM program_drills dr
                JOIN program_days d ON d.id = dr.day_id
                JOIN program_weeks w ON w.id = d.week_id
                WHERE dr.id = $1 AND w.program_id = $2
            )
            "#,
        )
        .bind(drill_id)
        .bind(program_id)
        .fetch_one(&self.db)
        .await?;

        if belongs {
            Ok(())
        } else {
            Err(AppError::NotFound("Drill"))
        }
    }

    /// Completing twice keeps one row and reports `already_completed`
    pub async fn complete_drill(&self, user_id: Uuid, request: CompleteDrillRequest) -> AppResult<DrillCompletionResult> {
        let assignment = self.own_assignment(user_id, request.assignment_id).await?;
        self.ensure_drill_in_program(assignment.program_id, request.drill_id).await?;

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO drill_completions (id, assignment_id, drill_id, notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (assignment_id, drill_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assignment.id)
        .bind(request.drill_id)
        .bind(request.notes)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Drills on days replaced by a lesson count toward neither side
        let (completed, total): (i64, i64) = sqlx::query_as(
            r#"
            WITH visible AS (
                SELECT dr.id FROM program_drills dr
                JOIN program_days d ON d.id = dr.day_id
                JOIN program_weeks w ON w.id = d.week_id
                WHERE w.program_id = $2
                  AND NOT EXISTS (
                      SELECT 1 FROM day_replacements r
                      WHERE r.assignment_id = $1 AND r.day_id = d.id
                  )
            )
            SELECT
                (SELECT COUNT(*) FROM drill_completions dc
                    JOIN visible v ON v.id = dc.drill_id
                    WHERE dc.assignment_id = $1),
                (SELECT COUNT(*) FROM visible)
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.program_id)
        .fetch_one(&mut *tx)
        .await?;

        let newly_finished = total > 0 && completed >= total && assignment.status != AssignmentStatus::Completed;
        let assignment_status = if newly_finished {
            sqlx::query(
                "UPDATE program_assignments SET status = 'completed', completed_at = NOW() WHERE id = $1",
            )
            .bind(assignment.id)
            .execute(&mut *tx)
            .await?;
            AssignmentStatus::Completed
        } else {
            assignment.status
        };

        tx.commit().await?;

        if newly_finished {
            info!(assignment_id = %assignment.id, "Program assignment completed");
            self.notifications.dispatch(
                NewNotification::new(
                    assignment.coach_id,
                    NotificationKind::ProgramCompleted,
                    "Program completed",
                    format!("A client finished \"{}\"", assignment.program_title),
                )
                .with_data(serde_json::json!({
                    "assignment_id": assignment.id,
                    "client_id": assignment.client_id,
                })),
            );
        }

        Ok(DrillCompletionResult {
            assignment_id: assignment.id,
            drill_id: request.drill_id,
            completed: true,
            already_completed: inserted == 0,
            assignment_status,
        })
    }

    /// Removes the completion and reopens a finished assignment
    pub async fn uncomplete_drill(&self, user_id: Uuid, request: UncompleteDrillRequest) -> AppResult<DrillCompletionResult> {
        let assignment = self.own_assignment(user_id, request.assignment_id).await?;

        let mut tx = self.db.begin().await?;

        let removed = sqlx::query("DELETE FROM drill_completions WHERE assignment_id = $1 AND drill_id = $2")
            .bind(assignment.id)
            .bind(request.drill_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let assignment_status = if removed > 0 && assignment.status == AssignmentStatus::Completed {
            sqlx::query("UPDATE program_assignments SET status = 'active', completed_at = NULL WHERE id = $1")
                .bind(assignment.id)
                .execute(&mut *tx)
                .await?;
            AssignmentStatus::Active
        } else {
            assignment.status
        };

        tx.commit().await?;

        Ok(DrillCompletionResult {
            assignment_id: assignment.id,
            drill_id: request.drill_id,
            completed: false,
            already_completed: false,
            assignment_status,
        })
    }
}
