use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    validate_time_range, CreateEventRequest, DayReplacement, Event, EventQuery, EventStatus, EventType,
    NewNotification, NotificationKind, ReplaceDayRequest, UpdateEventRequest,
};
use crate::services::access::active_owned_client;
use crate::services::program_service::assignment_context;
use crate::services::NotificationService;

#[derive(Clone)]
pub struct EventService {
    db: PgPool,
    notifications: NotificationService,
}

impl EventService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    /// Coaches see their own calendar; clients see lessons of their linked records
    pub async fn list(&self, session: &UserSession, query: &EventQuery) -> AppResult<Vec<Event>> {
        query.check_range()?;

        let events = match session.role {
            UserRole::Coach | UserRole::Admin => {
                sqlx::query_as::<_, Event>(
                    r#"
                    SELECT * FROM events
                    WHERE coach_id = $1 AND start_time < $3 AND end_time > $2
                      AND ($4::UUID IS NULL OR client_id = $4)
                    ORDER BY start_time
                    "#,
                )
                .bind(session.user_id)
                .bind(query.from)
                .bind(query.to)
                .bind(query.client_id)
                .fetch_all(&self.db)
                .await?
            }
            UserRole::Client => {
                sqlx::query_as::<_, Event>(
                    r#"
                    SELECT e.* FROM events e
                    JOIN clients c ON c.id = e.client_id
                    WHERE c.user_id = $1 AND c.status = 'active' AND e.event_type = 'lesson'
                      AND e.start_time < $3 AND e.end_time > $2
                      AND ($4::UUID IS NULL OR e.client_id = $4)
                    ORDER BY e.start_time
                    "#,
                )
                .bind(session.user_id)
                .bind(query.from)
                .bind(query.to)
                .bind(query.client_id)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(events)
    }

    pub async fn get_owned(&self, coach_id: Uuid, event_id: Uuid) -> AppResult<Event> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 AND coach_id = $2")
            .bind(event_id)
            .bind(coach_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound("Event"))
    }

    /// 409 when the window overlaps another live event of the same coach
    async fn ensure_free(
        &self,
        coach_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ignore: Option<Uuid>,
    ) -> AppResult<()> {
        let overlapping: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM events
            WHERE coach_id = $1 AND status <> 'cancelled'
              AND start_time < $3 AND end_time > $2
              AND ($4::UUID IS NULL OR id <> $4)
            LIMIT 1
            "#,
        )
        .bind(coach_id)
        .bind(start)
        .bind(end)
        .bind(ignore)
        .fetch_optional(&self.db)
        .await?;

        match overlapping {
            Some(other) => Err(AppError::conflict(format!("Overlaps event {}", other))),
            None => Ok(()),
        }
    }

    pub async fn create(&self, coach_id: Uuid, request: CreateEventRequest) -> AppResult<Event> {
        let client = match request.client_id {
            Some(client_id) => Some(active_owned_client(&self.db, coach_id, client_id).await?),
            None => None,
        };

        self.ensure_free(coach_id, request.start_time, request.end_time, None).await?;

        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (id, coach_id, client_id, title, description, event_type, start_time, end_time, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(coach_id)
        .bind(request.client_id)
        .bind(request.title.trim())
        .bind(request.description)
        .bind(request.event_type)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(request.location)
        .fetch_one(&self.db)
        .await?;

        if event.event_type == EventType::Lesson {
            if let Some(user_id) = client.and_then(|c| c.user_id) {
                self.notify_lesson(user_id, &event);
            }
        }

        info!(%coach_id, event_id = %event.id, "Created event");
        Ok(event)
    }

    fn notify_lesson(&self, user_id: Uuid, event: &Event) {
        self.notifications.dispatch(
            NewNotification::new(
                user_id,
                NotificationKind::LessonScheduled,
                "Lesson scheduled",
                format!("{} on {}", event.title, event.start_time.format("%Y-%m-%d %H:%M UTC")),
            )
            .with_data(serde_json::json!({ "event_id": event.id })),
        );
    }

    pub async fn update(&self, coach_id: Uuid, event_id: Uuid, request: UpdateEventRequest) -> AppResult<Event> {
        let current = self.get_owned(coach_id, event_id).await?;

        let start = request.start_time.unwrap_or(current.start_time);
        let end = request.end_time.unwrap_or(current.end_time);
        validate_time_range(start, end).map_err(|_| AppError::bad_request("start_time must be before end_time"))?;

        if let Some(client_id) = request.client_id {
            if current.client_id != Some(client_id) {
                active_owned_client(&self.db, coach_id, client_id).await?;
            }
        }

        let status = request.status.unwrap_or(current.status);
        let moved = start != current.start_time || end != current.end_time;
        let revived = current.status == EventStatus::Cancelled && status != EventStatus::Cancelled;
        if status != EventStatus::Cancelled && (moved || revived) {
            self.ensure_free(coach_id, start, end, Some(event_id)).await?;
        }

        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                status = $5,
                start_time = $6,
                end_time = $7,
                location = COALESCE($8, location),
                client_id = COALESCE($9, client_id),
                reminder_sent_at = CASE WHEN $10 THEN NULL ELSE reminder_sent_at END,
                updated_at = NOW()
            WHERE id = $1 AND coach_id = $2
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(coach_id)
        .bind(request.title)
        .bind(request.description)
        .bind(status)
        .bind(start)
        .bind(end)
        .bind(request.location)
        .bind(request.client_id)
        .bind(moved)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Event"))?;

        Ok(event)
    }

    pub async fn delete(&self, coach_id: Uuid, event_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1 AND coach_id = $2")
            .bind(event_id)
            .bind(coach_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Event"));
        }
        Ok(())
    }

    /// Let a lesson stand in for one program day of the same client
    pub async fn replace_program_day(&self, coach_id: Uuid, event_id: Uuid, request: ReplaceDayRequest) -> AppResult<DayReplacement> {
        let event = self.get_owned(coach_id, event_id).await?;
        if event.event_type != EventType::Lesson {
            return Err(AppError::bad_request("Only lessons can replace a program day"));
        }

        let assignment = assignment_context(&self.db, request.assignment_id)
            .await?
            .filter(|a| a.coach_id == coach_id)
            .ok_or(AppError::NotFound("Program assignment"))?;

        if event.client_id != Some(assignment.client_id) {
            return Err(AppError::bad_request("Lesson and assignment belong to different clients"));
        }

        let day_in_program: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM program_days d
                JOIN program_weeks w ON w.id = d.week_id
                WHERE d.id = $1 AND w.program_id = $2
            )
            "#,
        )
        .bind(request.day_id)
        .bind(assignment.program_id)
        .fetch_one(&self.db)
        .await?;

        if !day_in_program {
            return Err(AppError::NotFound("Program day"));
        }

        let replacement = sqlx::query_as::<_, DayReplacement>(
            r#"
            INSERT INTO day_replacements (assignment_id, day_id, event_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (assignment_id, day_id) DO UPDATE SET event_id = EXCLUDED.event_id
            RETURNING *
            "#,
        )
        .bind(assignment.id)
        .bind(request.day_id)
        .bind(event.id)
        .fetch_one(&self.db)
        .await?;

        info!(assignment_id = %assignment.id, day_id = %request.day_id, %event_id, "Program day replaced by lesson");
        Ok(replacement)
    }
}

/// A lesson due for a reminder together with the client login to remind
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DueReminder {
    #[sqlx(flatten)]
    pub event: Event,
    pub client_user_id: Uuid,
}

impl EventService {
    /// Stamp `reminder_sent_at` on lessons starting within `window` and
    /// return them; each lesson is claimed once.
    pub async fn claim_due_reminders(&self, window: chrono::Duration) -> AppResult<Vec<DueReminder>> {
        let now = Utc::now();
        let due = sqlx::query_as::<_, DueReminder>(
            r#"
            UPDATE events e SET reminder_sent_at = $1
            FROM clients c
            WHERE c.id = e.client_id
              AND c.user_id IS NOT NULL
              AND c.status = 'active'
              AND e.event_type = 'lesson'
              AND e.status = 'scheduled'
              AND e.reminder_sent_at IS NULL
              AND e.start_time > $1
              AND e.start_time <= $2
            RETURNING e.*, c.user_id AS client_user_id
            "#,
        )
        .bind(now)
        .bind(now + window)
        .fetch_all(&self.db)
        .await?;

        Ok(due)
    }

    pub fn send_reminder(&self, reminder: &DueReminder) {
        let event = &reminder.event;
        self.notifications.dispatch(
            NewNotification::new(
                reminder.client_user_id,
                NotificationKind::LessonReminder,
                "Upcoming lesson",
                format!("{} starts at {}", event.title, event.start_time.format("%Y-%m-%d %H:%M UTC")),
            )
            .with_data(serde_json::json!({ "event_id": event.id })),
        );
    }
}
