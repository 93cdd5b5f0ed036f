use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{
    ArchiveSummary, Client, ClientDetail, ClientQuery, ClientStatus, CreateClientRequest, UpdateClientRequest,
    User,
};
use crate::models::search_pattern;
use crate::services::access::{ensure_client_login, owned_client};
use crate::services::{BackgroundTasks, EmailService};

const DUPLICATE_EMAIL: &str = "A client with this email already exists";

#[derive(Clone)]
pub struct ClientService {
    db: PgPool,
    email: Option<EmailService>,
    tasks: BackgroundTasks,
}

impl ClientService {
    pub fn new(db: PgPool, email: Option<EmailService>, tasks: BackgroundTasks) -> Self {
        Self { db, email, tasks }
    }

    pub async fn list(&self, coach_id: Uuid, query: &ClientQuery) -> AppResult<Vec<Client>> {
        let status = query.status.unwrap_or(ClientStatus::Active);
        let search = search_pattern(query.search.as_deref());

        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE coach_id = $1
              AND status = $2
              AND ($3::TEXT IS NULL OR name ILIKE $3 OR email ILIKE $3)
            ORDER BY LOWER(name)
            "#,
        )
        .bind(coach_id)
        .bind(status)
        .bind(search)
        .fetch_all(&self.db)
        .await?;

        Ok(clients)
    }

    pub async fn get(&self, coach_id: Uuid, client_id: Uuid) -> AppResult<ClientDetail> {
        let client = owned_client(&self.db, coach_id, client_id).await?;

        let (active_programs, upcoming_lessons, assigned_routines, assigned_videos): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM program_assignments WHERE client_id = $1 AND status = 'active'),
                    (SELECT COUNT(*) FROM events
                        WHERE client_id = $1 AND event_type = 'lesson'
                          AND status = 'scheduled' AND start_time > NOW()),
                    (SELECT COUNT(*) FROM routine_assignments WHERE client_id = $1),
                    (SELECT COUNT(*) FROM video_assignments WHERE client_id = $1)
                "#,
            )
            .bind(client_id)
            .fetch_one(&self.db)
            .await?;

        Ok(ClientDetail {
            client,
            active_programs,
            upcoming_lessons,
            assigned_routines,
            assigned_videos,
        })
    }

    pub async fn create(&self, coach_id: Uuid, request: CreateClientRequest) -> AppResult<Client> {
        if let Some(user_id) = request.user_id {
            ensure_client_login(&self.db, user_id).await?;
        }

        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, coach_id, user_id, name, email, phone, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(coach_id)
        .bind(request.user_id)
        .bind(request.name.trim())
        .bind(request.email.map(|e| e.trim().to_lowercase()))
        .bind(request.phone)
        .bind(request.notes)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_EMAIL))?;

        info!(%coach_id, client_id = %client.id, "Created client");
        Ok(client)
    }

    pub async fn update(&self, coach_id: Uuid, client_id: Uuid, request: UpdateClientRequest) -> AppResult<Client> {
        if let Some(user_id) = request.user_id {
            ensure_client_login(&self.db, user_id).await?;
        }

        sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                notes = COALESCE($6, notes),
                user_id = COALESCE($7, user_id),
                updated_at = NOW()
            WHERE id = $1 AND coach_id = $2
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(coach_id)
        .bind(request.name.map(|n| n.trim().to_string()))
        .bind(request.email.map(|e| e.trim().to_lowercase()))
        .bind(request.phone)
        .bind(request.notes)
        .bind(request.user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_EMAIL))?
        .ok_or(AppError::NotFound("Client"))
    }

    /// Remove everything scheduled or assigned to the client, then mark it
    /// archived. One transaction; archiving twice changes nothing.
    pub async fn archive(&self, coach_id: Uuid, client_id: Uuid) -> AppResult<(Client, ArchiveSummary)> {
        let mut tx = self.db.begin().await?;

        let client = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE id = $1 AND coach_id = $2 FOR UPDATE",
        )
        .bind(client_id)
        .bind(coach_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Client"))?;

        if !client.is_active() {
            tx.rollback().await?;
            return Ok((client, ArchiveSummary::default()));
        }

        let events_deleted = sqlx::query("DELETE FROM events WHERE client_id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        // Completions and day replacements cascade with the assignment
        let program_assignments_deleted = sqlx::query("DELETE FROM program_assignments WHERE client_id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let routine_assignments_deleted = sqlx::query("DELETE FROM routine_assignments WHERE client_id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let video_assignments_deleted = sqlx::query("DELETE FROM video_assignments WHERE client_id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let archived = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET status = 'archived', archived_at = $2, updated_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let summary = ArchiveSummary {
            events_deleted,
            program_assignments_deleted,
            routine_assignments_deleted,
            video_assignments_deleted,
        };
        info!(%coach_id, %client_id, ?summary, "Archived client");

        Ok((archived, summary))
    }

    pub async fn unarchive(&self, coach_id: Uuid, client_id: Uuid) -> AppResult<Client> {
        sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET status = 'active', archived_at = NULL, updated_at = NOW()
            WHERE id = $1 AND coach_id = $2
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(coach_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Client"))
    }

    /// Queue an invitation email. Returns false when mail is not configured.
    pub async fn invite(&self, coach_id: Uuid, client_id: Uuid) -> AppResult<bool> {
        let client = owned_client(&self.db, coach_id, client_id).await?;
        let address = client
            .email
            .clone()
            .ok_or_else(|| AppError::bad_request("Client has no email address"))?;

        let Some(email) = self.email.clone() else {
            warn!(%client_id, "Email is not configured; invitation not sent");
            return Ok(false);
        };

        let coach_name: Option<String> = sqlx::query_scalar("SELECT name FROM users WHERE id = $1")
            .bind(coach_id)
            .fetch_optional(&self.db)
            .await?
            .flatten();

        let content = email.invitation(&client.name, coach_name.as_deref().unwrap_or("Your coach"));
        self.tasks
            .spawn("client_invitation", async move { email.send(&address, content).await });

        Ok(true)
    }

    /// Coaches of the caller's active client records
    pub async fn my_coaches(&self, user_id: Uuid) -> AppResult<Vec<User>> {
        let coaches = sqlx::query_as::<_, User>(
            r#"
            SELECT DISTINCT u.* FROM users u
            JOIN clients c ON c.coach_id = u.id
            WHERE c.user_id = $1 AND c.status = 'active'
            ORDER BY u.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(coaches)
    }
}
