use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{
    AssignLibraryItemRequest, AssignResult, AssignedVideo, CreateLibraryItemRequest, LibraryItem, LibraryItemKind,
    LibraryQuery, NewNotification, NotificationKind, UpdateLibraryItemRequest, VideoAssignment, search_pattern,
};
use crate::services::access::{active_owned_client, owned_client};
use crate::services::{BackgroundTasks, BlobStorageService, NotificationService, VideoMetadata, VideoMetadataService};

#[derive(Clone)]
pub struct LibraryService {
    db: PgPool,
    metadata: VideoMetadataService,
    storage: Option<BlobStorageService>,
    notifications: NotificationService,
    tasks: BackgroundTasks,
}

impl LibraryService {
    pub fn new(
        db: PgPool,
        metadata: VideoMetadataService,
        storage: Option<BlobStorageService>,
        notifications: NotificationService,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            db,
            metadata,
            storage,
            notifications,
            tasks,
        }
    }

    pub async fn list(&self, coach_id: Uuid, query: &LibraryQuery) -> AppResult<Vec<LibraryItem>> {
        let search = search_pattern(query.search.as_deref());

        let items = sqlx::query_as::<_, LibraryItem>(
            r#"
            SELECT * FROM library_items
            WHERE coach_id = $1
              AND ($2::TEXT IS NULL OR category = $2)
              AND ($3::TEXT IS NULL OR kind = $3)
              AND ($4::TEXT IS NULL OR title ILIKE $4 OR description ILIKE $4)
            ORDER BY created_at DESC
            "#,
        )
        .bind(coach_id)
        .bind(query.category.as_deref())
        .bind(query.kind)
        .bind(search)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    pub async fn get(&self, coach_id: Uuid, item_id: Uuid) -> AppResult<LibraryItem> {
        sqlx::query_as::<_, LibraryItem>("SELECT * FROM library_items WHERE id = $1 AND coach_id = $2")
            .bind(item_id)
            .bind(coach_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound("Library item"))
    }

    pub async fn create(&self, coach_id: Uuid, request: CreateLibraryItemRequest) -> AppResult<LibraryItem> {
        if request.kind == LibraryItemKind::File && request.storage_key.is_none() {
            return Err(AppError::bad_request("File items require a storage_key"));
        }

        let metadata = if request.kind == LibraryItemKind::Video {
            self.lookup_metadata(&request.url).await
        } else {
            None
        };

        let title = request
            .title
            .clone()
            .or_else(|| metadata.as_ref().and_then(|m| m.title.clone()))
            .ok_or_else(|| AppError::bad_request("A title is required when it cannot be fetched"))?;

        let item = sqlx::query_as::<_, LibraryItem>(
            r#"
            INSERT INTO library_items (
                id, coach_id, title, description, category, kind, url, storage_key,
                provider, thumbnail_url, duration_seconds
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(coach_id)
        .bind(title)
        .bind(request.description)
        .bind(request.category)
        .bind(request.kind)
        .bind(request.url)
        .bind(request.storage_key)
        .bind(metadata.as_ref().map(|m| m.provider.as_str()))
        .bind(metadata.as_ref().and_then(|m| m.thumbnail_url.clone()))
        .bind(metadata.as_ref().and_then(|m| m.duration_seconds))
        .fetch_one(&self.db)
        .await?;

        info!(%coach_id, item_id = %item.id, "Created library item");
        Ok(item)
    }

    /// Metadata is optional; a failed lookup never blocks creation
    async fn lookup_metadata(&self, url: &str) -> Option<VideoMetadata> {
        match self.metadata.fetch(url).await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(url, error = %err, "Video metadata lookup failed");
                None
            }
        }
    }

    pub async fn update(&self, coach_id: Uuid, item_id: Uuid, request: UpdateLibraryItemRequest) -> AppResult<LibraryItem> {
        sqlx::query_as::<_, LibraryItem>(
            r#"
            UPDATE library_items SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                category = COALESCE($5, category),
                updated_at = NOW()
            WHERE id = $1 AND coach_id = $2
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(coach_id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.category)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Library item"))
    }

    pub async fn delete(&self, coach_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let storage_key: Option<Option<String>> = sqlx::query_scalar(
            "DELETE FROM library_items WHERE id = $1 AND coach_id = $2 RETURNING storage_key",
        )
        .bind(item_id)
        .bind(coach_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(storage_key) = storage_key else {
            return Err(AppError::NotFound("Library item"));
        };

        if let (Some(key), Some(storage)) = (storage_key, self.storage.clone()) {
            self.tasks
                .spawn("library_blob_delete", async move { storage.delete_object(&key).await });
        }

        info!(%coach_id, %item_id, "Deleted library item");
        Ok(())
    }

    pub async fn assign(
        &self,
        coach_id: Uuid,
        item_id: Uuid,
        request: AssignLibraryItemRequest,
    ) -> AppResult<AssignResult> {
        let item = self.get(coach_id, item_id).await?;

        let mut clients = Vec::with_capacity(request.client_ids.len());
        for client_id in &request.client_ids {
            clients.push(active_owned_client(&self.db, coach_id, *client_id).await?);
        }

        let mut result = AssignResult {
            assigned: Vec::new(),
            already_assigned: Vec::new(),
        };

        for client in clients {
            let inserted = sqlx::query(
                r#"
                INSERT INTO video_assignments (id, library_item_id, client_id, notes)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (library_item_id, client_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(item.id)
            .bind(client.id)
            .bind(request.notes.as_deref())
            .execute(&self.db)
            .await?
            .rows_affected();

            if inserted == 0 {
                result.already_assigned.push(client.id);
                continue;
            }

            result.assigned.push(client.id);
            if let Some(user_id) = client.user_id {
                self.notifications.dispatch(
                    NewNotification::new(
                        user_id,
                        NotificationKind::VideoAssigned,
                        "New video assigned",
                        format!("Your coach shared \"{}\" with you", item.title),
                    )
                    .with_data(serde_json::json!({ "library_item_id": item.id })),
                );
            }
        }

        Ok(result)
    }

    pub async fn unassign(&self, coach_id: Uuid, item_id: Uuid, client_id: Uuid) -> AppResult<()> {
        self.get(coach_id, item_id).await?;
        owned_client(&self.db, coach_id, client_id).await?;

        let result = sqlx::query("DELETE FROM video_assignments WHERE library_item_id = $1 AND client_id = $2")
            .bind(item_id)
            .bind(client_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Video assignment"));
        }
        Ok(())
    }

    /// Items assigned to any of the caller's linked client records
    pub async fn client_videos(&self, user_id: Uuid) -> AppResult<Vec<AssignedVideo>> {
        let videos = sqlx::query_as::<_, AssignedVideo>(
            r#"
            SELECT
                va.id AS assignment_id, va.client_id, va.notes, va.assigned_at, va.viewed_at,
                li.id AS library_item_id, li.title, li.description, li.category, li.kind,
                li.url, li.thumbnail_url, li.duration_seconds
            FROM video_assignments va
            JOIN library_items li ON li.id = va.library_item_id
            JOIN clients c ON c.id = va.client_id
            WHERE c.user_id = $1 AND c.status = 'active'
            ORDER BY va.assigned_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(videos)
    }

    /// First view wins; later calls return the same row
    pub async fn mark_viewed(&self, user_id: Uuid, assignment_id: Uuid) -> AppResult<VideoAssignment> {
        sqlx::query_as::<_, VideoAssignment>(
            r#"
            UPDATE video_assignments va SET viewed_at = COALESCE(va.viewed_at, NOW())
            FROM clients c
            WHERE va.id = $1 AND c.id = va.client_id AND c.user_id = $2
            RETURNING va.*
            "#,
        )
        .bind(assignment_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Video assignment"))
    }
}
