use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{
    NewNotification, Notification, NotificationKind, NotificationPreference, NotificationQuery, UserSettings,
};
use crate::services::{BackgroundTasks, EmailService, RealtimeEventKind, RealtimeService, SettingsService};
use crate::services::email_service::EmailContent;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// Whether the recipient's settings allow this kind at all
pub fn allowed_by_settings(kind: NotificationKind, settings: &UserSettings) -> bool {
    match kind.preference() {
        NotificationPreference::Messages => settings.message_notifications,
        NotificationPreference::LessonReminders => settings.lesson_reminders,
        NotificationPreference::Always => true,
    }
}

/// Kinds that are also worth an email when the user opted in
pub fn sends_email(kind: NotificationKind) -> bool {
    matches!(
        kind,
        NotificationKind::LessonReminder
            | NotificationKind::ProgramAssigned
            | NotificationKind::SwapRequested
            | NotificationKind::SwapApproved
    )
}

#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    settings: SettingsService,
    realtime: RealtimeService,
    email: Option<EmailService>,
    tasks: BackgroundTasks,
}

impl NotificationService {
    pub fn new(
        db: PgPool,
        realtime: RealtimeService,
        email: Option<EmailService>,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            settings: SettingsService::new(db.clone()),
            db,
            realtime,
            email,
            tasks,
        }
    }

    /// Store a notification and push it to live connections.
    /// `Ok(None)` when the recipient's settings suppress it.
    pub async fn notify(&self, notification: NewNotification) -> AppResult<Option<Notification>> {
        let settings = self.settings.get(notification.user_id).await?;
        if !allowed_by_settings(notification.kind, &settings) {
            debug!(user_id = %notification.user_id, kind = ?notification.kind, "Notification suppressed by settings");
            return Ok(None);
        }

        let stored = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, body, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.data)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        if let Err(err) = self
            .realtime
            .publish(stored.user_id, RealtimeEventKind::Notification, &stored)
        {
            warn!(notification_id = %stored.id, error = %err, "Failed to publish notification");
        }

        if settings.email_notifications && sends_email(stored.kind) {
            if let Some(email) = &self.email {
                self.email_copy(email.clone(), &stored);
            }
        }

        Ok(Some(stored))
    }

    /// Fire-and-forget `notify`; failures are logged by the task runner
    pub fn dispatch(&self, notification: NewNotification) {
        let service = self.clone();
        self.tasks.spawn("notify", async move {
            service.notify(notification).await.map(|_| ())
        });
    }

    fn email_copy(&self, email: EmailService, notification: &Notification) {
        let db = self.db.clone();
        let user_id = notification.user_id;
        let content = EmailContent {
            subject: notification.title.clone(),
            body: notification.body.clone(),
        };

        self.tasks
            .spawn("notification_email", send_email_copy(db, email, user_id, content));
    }

    pub async fn list(&self, user_id: Uuid, query: &NotificationQuery) -> AppResult<Vec<Notification>> {
        let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(query.unread_only)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Notification"))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("UPDATE notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        info!(%user_id, updated = result.rows_affected(), "Marked notifications read");
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification"));
        }
        Ok(())
    }
}

async fn send_email_copy(
    db: PgPool,
    email: EmailService,
    user_id: Uuid,
    content: EmailContent,
) -> anyhow::Result<()> {
    let address: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&db)
        .await?;

    match address {
        Some(address) => email.send(&address, content).await,
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_gate_messages_and_reminders_only() {
        let mut settings = UserSettings::defaults_for(Uuid::new_v4());
        settings.message_notifications = false;
        settings.lesson_reminders = false;

        assert!(!allowed_by_settings(NotificationKind::NewMessage, &settings));
        assert!(!allowed_by_settings(NotificationKind::LessonReminder, &settings));
        assert!(!allowed_by_settings(NotificationKind::LessonScheduled, &settings));
        assert!(allowed_by_settings(NotificationKind::SwapRequested, &settings));
        assert!(allowed_by_settings(NotificationKind::ProgramAssigned, &settings));
    }

    #[test]
    fn test_message_notifications_do_not_email() {
        assert!(!sends_email(NotificationKind::NewMessage));
        assert!(sends_email(NotificationKind::LessonReminder));
    }
}
