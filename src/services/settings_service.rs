use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{UpdateSettingsRequest, UserSettings};

#[derive(Clone)]
pub struct SettingsService {
    db: PgPool,
}

impl SettingsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Stored settings, or the defaults when the user never saved any
    pub async fn get(&self, user_id: Uuid) -> AppResult<UserSettings> {
        let settings = sqlx::query_as::<_, UserSettings>(
            "SELECT * FROM user_settings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(settings.unwrap_or_else(|| UserSettings::defaults_for(user_id)))
    }

    pub async fn ensure_defaults(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("INSERT INTO user_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn update(&self, user_id: Uuid, request: UpdateSettingsRequest) -> AppResult<UserSettings> {
        let settings = sqlx::query_as::<_, UserSettings>(
            r#"
            INSERT INTO user_settings (
                user_id, timezone, email_notifications, push_notifications,
                message_notifications, lesson_reminders, default_lesson_minutes, updated_at
            )
            VALUES (
                $1,
                COALESCE($2, 'UTC'),
                COALESCE($3, TRUE),
                COALESCE($4, TRUE),
                COALESCE($5, TRUE),
                COALESCE($6, TRUE),
                COALESCE($7, 60),
                NOW()
            )
            ON CONFLICT (user_id) DO UPDATE SET
                timezone = COALESCE($2, user_settings.timezone),
                email_notifications = COALESCE($3, user_settings.email_notifications),
                push_notifications = COALESCE($4, user_settings.push_notifications),
                message_notifications = COALESCE($5, user_settings.message_notifications),
                lesson_reminders = COALESCE($6, user_settings.lesson_reminders),
                default_lesson_minutes = COALESCE($7, user_settings.default_lesson_minutes),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.timezone)
        .bind(request.email_notifications)
        .bind(request.push_notifications)
        .bind(request.message_notifications)
        .bind(request.lesson_reminders)
        .bind(request.default_lesson_minutes)
        .fetch_one(&self.db)
        .await?;

        Ok(settings)
    }
}
