use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{JwtService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AssignLibraryItemRequest, AssignResult, AssignedVideo, CreateLibraryItemRequest, LibraryItem, LibraryQuery,
    UpdateLibraryItemRequest, VideoAssignment,
};
use crate::services::LibraryService;

#[derive(Clone, FromRef)]
pub struct LibraryAppState {
    pub jwt: JwtService,
    pub library: LibraryService,
}

pub fn library_routes(state: LibraryAppState) -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/assigned", get(client_videos))
        .route("/assigned/:assignment_id/viewed", post(mark_viewed))
        .route("/:item_id", get(get_item).put(update_item).delete(delete_item))
        .route("/:item_id/assign", post(assign_item))
        .route("/:item_id/assign/:client_id", delete(unassign_item))
        .with_state(state)
}

async fn list_items(
    session: UserSession,
    State(library): State<LibraryService>,
    WithRejection(Query(query), _): WithRejection<Query<LibraryQuery>, AppError>,
) -> AppResult<Json<Vec<LibraryItem>>> {
    let coach_id = session.require_coach()?;
    Ok(Json(library.list(coach_id, &query).await?))
}

async fn get_item(
    session: UserSession,
    State(library): State<LibraryService>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<LibraryItem>> {
    let coach_id = session.require_coach()?;
    Ok(Json(library.get(coach_id, item_id).await?))
}

#[tracing::instrument(skip(library, request), fields(coach_id = %session.user_id))]
async fn create_item(
    session: UserSession,
    State(library): State<LibraryService>,
    WithRejection(Json(request), _): WithRejection<Json<CreateLibraryItemRequest>, AppError>,
) -> AppResult<Json<LibraryItem>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(library.create(coach_id, request).await?))
}

async fn update_item(
    session: UserSession,
    State(library): State<LibraryService>,
    Path(item_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateLibraryItemRequest>, AppError>,
) -> AppResult<Json<LibraryItem>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(library.update(coach_id, item_id, request).await?))
}

async fn delete_item(
    session: UserSession,
    State(library): State<LibraryService>,
    Path(item_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let coach_id = session.require_coach()?;
    library.delete(coach_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(library, request), fields(coach_id = %session.user_id))]
async fn assign_item(
    session: UserSession,
    State(library): State<LibraryService>,
    Path(item_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<AssignLibraryItemRequest>, AppError>,
) -> AppResult<Json<AssignResult>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(library.assign(coach_id, item_id, request).await?))
}

async fn unassign_item(
    session: UserSession,
    State(library): State<LibraryService>,
    Path((item_id, client_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let coach_id = session.require_coach()?;
    library.unassign(coach_id, item_id, client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn client_videos(
    session: UserSession,
    State(library): State<LibraryService>,
) -> AppResult<Json<Vec<AssignedVideo>>> {
    let user_id = session.require_client()?;
    Ok(Json(library.client_videos(user_id).await?))
}

async fn mark_viewed(
    session: UserSession,
    State(library): State<LibraryService>,
    Path(assignment_id): Path<Uuid>,
) -> AppResult<Json<VideoAssignment>> {
    let user_id = session.require_client()?;
    Ok(Json(library.mark_viewed(user_id, assignment_id).await?))
}
