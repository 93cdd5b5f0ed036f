use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{
    percentage, round1, AnalyticsOverview, AnalyticsPeriod, ClientAnalytics, DateRange, MetricTrends,
    PeriodCounts, PeriodMetrics, ProgramAnalytics,
};
use crate::services::access::{ensure_owned, owned_client, OwnedTable};

type CountsRow = (i64, i64, i64, i64, i64, i64, i64, i64, i64);

#[derive(Clone)]
pub struct AnalyticsService {
    db: PgPool,
}

impl AnalyticsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn overview(&self, coach_id: Uuid, period: AnalyticsPeriod) -> AppResult<AnalyticsOverview> {
        let (current, previous, trends) = self.compare(coach_id, None, period).await?;
        Ok(AnalyticsOverview {
            period,
            current,
            previous,
            trends,
        })
    }

    pub async fn client(&self, coach_id: Uuid, client_id: Uuid, period: AnalyticsPeriod) -> AppResult<ClientAnalytics> {
        owned_client(&self.db, coach_id, client_id).await?;
        let (current, previous, trends) = self.compare(coach_id, Some(client_id), period).await?;
        Ok(ClientAnalytics {
            client_id,
            period,
            current,
            previous,
            trends,
        })
    }

    async fn compare(
        &self,
        coach_id: Uuid,
        client_id: Option<Uuid>,
        period: AnalyticsPeriod,
    ) -> AppResult<(PeriodMetrics, PeriodMetrics, MetricTrends)> {
        let (current_range, previous_range) = period.windows(Utc::now());

        let current = PeriodMetrics::from_counts(current_range, self.counts(coach_id, client_id, current_range).await?);
        let previous = PeriodMetrics::from_counts(previous_range, self.counts(coach_id, client_id, previous_range).await?);
        let trends = MetricTrends::between(&current, &previous);

        Ok((current, previous, trends))
    }

    async fn counts(&self, coach_id: Uuid, client_id: Option<Uuid>, range: DateRange) -> AppResult<PeriodCounts> {
        let (first_day, last_day) = range.schedule_days();
        let row: CountsRow = sqlx::query_as(
            r#"
            WITH scoped AS (
                SELECT * FROM clients
                WHERE coach_id = $1 AND ($2::UUID IS NULL OR id = $2)
            ),
            period_completions AS (
                SELECT a.client_id, dc.completed_at
                FROM drill_completions dc
                JOIN program_assignments a ON a.id = dc.assignment_id
                JOIN scoped s ON s.id = a.client_id
                WHERE dc.completed_at >= $3 AND dc.completed_at < $4
            ),
            period_messages AS (
                SELECT s.id AS client_id, m.created_at
                FROM messages m
                JOIN conversations cv ON cv.id = m.conversation_id
                JOIN scoped s ON s.user_id = cv.client_user_id AND s.coach_id = cv.coach_id
                WHERE m.created_at >= $3 AND m.created_at < $4
            ),
            period_lessons AS (
                SELECT e.client_id, e.start_time
                FROM events e
                JOIN scoped s ON s.id = e.client_id
                WHERE e.event_type = 'lesson' AND e.status <> 'cancelled'
                  AND e.start_time >= $3 AND e.start_time < $4 AND e.end_time <= NOW()
            ),
            scheduled AS (
                SELECT COUNT(*) AS n
                FROM program_assignments a
                JOIN scoped s ON s.id = a.client_id
                JOIN program_weeks w ON w.program_id = a.program_id
                JOIN program_days d ON d.week_id = w.id
                JOIN program_drills dr ON dr.day_id = d.id
                WHERE NOT EXISTS (
                    SELECT 1 FROM day_replacements r WHERE r.assignment_id = a.id AND r.day_id = d.id
                )
                AND (a.start_date + ((w.week_number - 1) * 7 + (d.day_number - 1))) BETWEEN $5 AND $6
            )
            SELECT
                (SELECT COUNT(*) FROM scoped
                    WHERE created_at < $4 AND (archived_at IS NULL OR archived_at >= $4)),
                (SELECT COUNT(DISTINCT client_id) FROM (
                    SELECT client_id FROM period_completions
                    UNION SELECT client_id FROM period_messages
                    UNION SELECT client_id FROM period_lessons
                ) active),
                (SELECT COUNT(*) FROM scoped WHERE created_at >= $3 AND created_at < $4),
                (SELECT COUNT(*) FROM period_lessons),
                (SELECT COUNT(*) FROM period_messages),
                (SELECT COUNT(*) FROM period_completions),
                (SELECT n FROM scheduled),
                (SELECT COUNT(*) FROM scoped
                    WHERE created_at < $3 AND (archived_at IS NULL OR archived_at >= $3)),
                (SELECT COUNT(*) FROM scoped
                    WHERE created_at < $3 AND (archived_at IS NULL OR archived_at >= $4))
            "#,
        )
        .bind(coach_id)
        .bind(client_id)
        .bind(range.start)
        .bind(range.end)
        .bind(first_day)
        .bind(last_day)
        .fetch_one(&self.db)
        .await?;

        Ok(PeriodCounts {
            total_clients: row.0,
            active_clients: row.1,
            new_clients: row.2,
            lessons_held: row.3,
            messages_sent: row.4,
            drill_completions: row.5,
            drills_scheduled: row.6,
            clients_at_start: row.7,
            clients_retained: row.8,
        })
    }

    pub async fn program(&self, coach_id: Uuid, program_id: Uuid) -> AppResult<ProgramAnalytics> {
        ensure_owned(&self.db, OwnedTable::Programs, coach_id, program_id).await?;

        let per_assignment: Vec<(bool, i64, i64)> = sqlx::query_as(
            r#"
            WITH visible AS (
                SELECT a.id AS assignment_id, dr.id AS drill_id
                FROM program_assignments a
                JOIN program_weeks w ON w.program_id = a.program_id
                JOIN program_days d ON d.week_id = w.id
                JOIN program_drills dr ON dr.day_id = d.id
                WHERE a.program_id = $1
                  AND NOT EXISTS (
                      SELECT 1 FROM day_replacements r
                      WHERE r.assignment_id = a.id AND r.day_id = d.id
                  )
            )
            SELECT a.status = 'completed',
                   (SELECT COUNT(*) FROM drill_completions dc
                       JOIN visible v ON v.assignment_id = dc.assignment_id AND v.drill_id = dc.drill_id
                       WHERE dc.assignment_id = a.id),
                   (SELECT COUNT(*) FROM visible v WHERE v.assignment_id = a.id)
            FROM program_assignments a
            WHERE a.program_id = $1
            "#,
        )
        .bind(program_id)
        .fetch_all(&self.db)
        .await?;

        Ok(summarize_program(program_id, &per_assignment))
    }
}

/// `per_assignment` holds (is completed, completed drills, scheduled drills)
pub fn summarize_program(program_id: Uuid, per_assignment: &[(bool, i64, i64)]) -> ProgramAnalytics {
    let assignment_count = per_assignment.len() as i64;
    let completed_assignments = per_assignment.iter().filter(|(done, _, _)| *done).count() as i64;
    let average_completion = if per_assignment.is_empty() {
        0.0
    } else {
        let sum: f64 = per_assignment
            .iter()
            .map(|(_, completed, total)| percentage(*completed, *total))
            .sum();
        round1(sum / per_assignment.len() as f64)
    };

    ProgramAnalytics {
        program_id,
        assignment_count,
        completed_assignments,
        average_completion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summarize_program() {
        let id = Uuid::new_v4();
        let summary = summarize_program(id, &[(true, 10, 10), (false, 5, 10), (false, 0, 10)]);
        assert_eq!(
            summary,
            ProgramAnalytics {
                program_id: id,
                assignment_count: 3,
                completed_assignments: 1,
                average_completion: 50.0,
            }
        );
    }

    #[test]
    fn test_summarize_program_without_assignments_or_drills() {
        let summary = summarize_program(Uuid::new_v4(), &[]);
        assert_eq!(summary.average_completion, 0.0);

        let no_drills = summarize_program(Uuid::new_v4(), &[(false, 0, 0)]);
        assert_eq!(no_drills.average_completion, 0.0);
    }

    #[test]
    fn test_summarize_program_uses_each_assignments_own_total() {
        // Second assignment had a day replaced, leaving 4 drills
        let summary = summarize_program(Uuid::new_v4(), &[(false, 3, 6), (true, 4, 4)]);
        assert_eq!(summary.average_completion, 75.0);
    }
}
