use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{JwtService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{Notification, NotificationQuery};
use crate::services::NotificationService;

#[derive(Clone, FromRef)]
pub struct NotificationsAppState {
    pub jwt: JwtService,
    pub notifications: NotificationService,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub fn notification_routes(state: NotificationsAppState) -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/:notification_id", delete(delete_notification))
        .route("/:notification_id/read", post(mark_read))
        .with_state(state)
}

/// Newest first
async fn list_notifications(
    session: UserSession,
    State(notifications): State<NotificationService>,
    WithRejection(Query(query), _): WithRejection<Query<NotificationQuery>, AppError>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(notifications.list(session.user_id, &query).await?))
}

async fn unread_count(
    session: UserSession,
    State(notifications): State<NotificationService>,
) -> AppResult<Json<UnreadCountResponse>> {
    let unread_count = notifications.unread_count(session.user_id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

async fn mark_read(
    session: UserSession,
    State(notifications): State<NotificationService>,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    Ok(Json(notifications.mark_read(session.user_id, notification_id).await?))
}

async fn mark_all_read(
    session: UserSession,
    State(notifications): State<NotificationService>,
) -> AppResult<Json<MarkAllReadResponse>> {
    let updated = notifications.mark_all_read(session.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

async fn delete_notification(
    session: UserSession,
    State(notifications): State<NotificationService>,
    Path(notification_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    notifications.delete(session.user_id, notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
