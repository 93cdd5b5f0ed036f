use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::UserRole;
use crate::errors::{AppError, AppResult};
use crate::models::{AdminUserQuery, PlatformStats, User};

#[derive(Clone)]
pub struct AdminService {
    db: PgPool,
}

impl AdminService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_users(&self, query: &AdminUserQuery) -> AppResult<Vec<User>> {
        let (limit, offset) = query.page();

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::TEXT IS NULL OR role = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(query.role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    pub async fn set_role(&self, admin_id: Uuid, user_id: Uuid, role: UserRole) -> AppResult<User> {
        if admin_id == user_id && role != UserRole::Admin {
            return Err(AppError::bad_request("Admins cannot remove their own admin role"));
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(role)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("User"))?;

        info!(%admin_id, %user_id, role = role.as_str(), "Changed user role");
        Ok(user)
    }

    pub async fn stats(&self) -> AppResult<PlatformStats> {
        let stats = sqlx::query_as::<_, PlatformStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE role = 'coach') AS coaches,
                (SELECT COUNT(*) FROM users WHERE role = 'client') AS clients,
                (SELECT COUNT(*) FROM users WHERE role = 'admin') AS admins,
                (SELECT COUNT(*) FROM clients) AS client_records,
                (SELECT COUNT(*) FROM programs) AS programs,
                (SELECT COUNT(*) FROM events) AS events,
                (SELECT COUNT(*) FROM messages) AS messages
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(stats)
    }
}
