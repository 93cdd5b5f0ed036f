use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::UserSession;
use crate::errors::AppResult;
use crate::models::{
    current_position, percentage, week_breakdown, AssignmentContext, AssignmentProgress, ClientProgress,
};
use crate::services::access::owned_client;
use crate::services::program_service::{completed_drills, replaced_days, scheduled_drills, visible_assignment};

#[derive(Clone)]
pub struct ProgressService {
    db: PgPool,
}

impl ProgressService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn assignment_progress(&self, session: &UserSession, assignment_id: Uuid) -> AppResult<AssignmentProgress> {
        let assignment = visible_assignment(&self.db, session, assignment_id).await?;
        self.progress_for(assignment, Utc::now().date_naive()).await
    }

    async fn progress_for(&self, assignment: AssignmentContext, today: NaiveDate) -> AppResult<AssignmentProgress> {
        let rows = scheduled_drills(&self.db, assignment.program_id).await?;
        let replaced = replaced_days(&self.db, assignment.id).await?;
        let completed = completed_drills(&self.db, assignment.id).await?;

        let weeks = week_breakdown(&rows, &replaced, &completed);
        let total_drills = weeks.iter().map(|w| w.total_drills).sum();
        let completed_drills = weeks.iter().map(|w| w.completed_drills).sum();
        let total_weeks = rows.iter().map(|r| r.week_number).max().unwrap_or(0);
        let position = current_position(assignment.start_date, today, total_weeks);

        Ok(AssignmentProgress {
            assignment_id: assignment.id,
            program_id: assignment.program_id,
            program_title: assignment.program_title,
            client_id: assignment.client_id,
            start_date: assignment.start_date,
            status: assignment.status,
            completed_drills,
            total_drills,
            completion_percentage: percentage(completed_drills, total_drills),
            current_week: position.map(|(week, _)| week),
            current_day: position.map(|(_, day)| day),
            weeks,
        })
    }

    async fn assignments_where(&self, filter: AssignmentFilter) -> AppResult<Vec<AssignmentContext>> {
        let (condition, id) = match filter {
            AssignmentFilter::Client(client_id) => ("a.client_id = $1", client_id),
            AssignmentFilter::ClientUser(user_id) => ("c.user_id = $1 AND c.status = 'active'", user_id),
        };

        let sql = format!(
            r#"
            SELECT a.id, a.program_id, p.title AS program_title, p.coach_id,
                   a.client_id, c.user_id AS client_user_id, a.start_date, a.status
            FROM program_assignments a
            JOIN programs p ON p.id = a.program_id
            JOIN clients c ON c.id = a.client_id
            WHERE {}
            ORDER BY a.start_date DESC
            "#,
            condition
        );

        let assignments = sqlx::query_as::<_, AssignmentContext>(&sql)
            .bind(id)
            .fetch_all(&self.db)
            .await?;
        Ok(assignments)
    }

    pub async fn client_progress(&self, coach_id: Uuid, client_id: Uuid) -> AppResult<ClientProgress> {
        owned_client(&self.db, coach_id, client_id).await?;

        let today = Utc::now().date_naive();
        let mut assignments = Vec::new();
        for assignment in self.assignments_where(AssignmentFilter::Client(client_id)).await? {
            assignments.push(self.progress_for(assignment, today).await?);
        }

        let now = Utc::now();
        let (completions_last_7_days, completions_last_30_days): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE dc.completed_at >= $2),
                COUNT(*) FILTER (WHERE dc.completed_at >= $3)
            FROM drill_completions dc
            JOIN program_assignments a ON a.id = dc.assignment_id
            WHERE a.client_id = $1
            "#,
        )
        .bind(client_id)
        .bind(now - Duration::days(7))
        .bind(now - Duration::days(30))
        .fetch_one(&self.db)
        .await?;

        Ok(ClientProgress {
            client_id,
            assignments,
            completions_last_7_days,
            completions_last_30_days,
        })
    }

    pub async fn my_progress(&self, user_id: Uuid) -> AppResult<Vec<AssignmentProgress>> {
        let today = Utc::now().date_naive();
        let mut progress = Vec::new();
        for assignment in self.assignments_where(AssignmentFilter::ClientUser(user_id)).await? {
            progress.push(self.progress_for(assignment, today).await?);
        }
        Ok(progress)
    }
}

enum AssignmentFilter {
    Client(Uuid),
    ClientUser(Uuid),
}
