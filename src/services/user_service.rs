use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::UserSession;
use crate::errors::{AppError, AppResult};
use crate::models::{SyncUserRequest, UpdateProfileRequest, User};
use crate::services::SettingsService;

#[derive(Clone)]
pub struct UserService {
    db: PgPool,
    settings: SettingsService,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self {
            settings: SettingsService::new(db.clone()),
            db,
        }
    }

    /// Upsert the caller from their token. Email follows the token; the role
    /// is taken from it only on first sync and is owned by the admin API after.
    pub async fn sync(&self, session: &UserSession, request: SyncUserRequest) -> AppResult<User> {
        let existed: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(session.user_id)
            .fetch_one(&self.db)
            .await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, avatar_url, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                name = COALESCE(EXCLUDED.name, users.name),
                avatar_url = COALESCE(EXCLUDED.avatar_url, users.avatar_url),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(session.user_id)
        .bind(&session.email)
        .bind(request.name)
        .bind(request.avatar_url)
        .bind(session.role)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "Email is already used by another account"))?;

        if !existed {
            self.settings.ensure_defaults(user.id).await?;
            info!(user_id = %user.id, role = user.role.as_str(), "Synced new user");
        }

        Ok(user)
    }

    pub async fn me(&self, user_id: Uuid) -> AppResult<User> {
        self.find(user_id).await?.ok_or(AppError::NotFound("User"))
    }

    pub async fn update_profile(&self, user_id: Uuid, request: UpdateProfileRequest) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                avatar_url = COALESCE($3, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.name)
        .bind(request.avatar_url)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("User"))
    }

    /// Self, admins, and coach/client pairs linked by a client record
    pub async fn get_visible(&self, viewer: &UserSession, user_id: Uuid) -> AppResult<User> {
        let visible = viewer.user_id == user_id || viewer.is_admin() || self.linked(viewer.user_id, user_id).await?;
        if !visible {
            return Err(AppError::NotFound("User"));
        }
        self.me(user_id).await
    }

    async fn linked(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let linked = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM clients
                WHERE (coach_id = $1 AND user_id = $2) OR (coach_id = $2 AND user_id = $1)
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.db)
        .await?;
        Ok(linked)
    }

    async fn find(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}
