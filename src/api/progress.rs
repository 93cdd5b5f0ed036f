use axum::{
    extract::{FromRef, Path, State},
    response::Json,
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::auth::{JwtService, UserSession};
use crate::errors::AppResult;
use crate::models::{AssignmentProgress, ClientProgress};
use crate::services::ProgressService;

#[derive(Clone, FromRef)]
pub struct ProgressAppState {
    pub jwt: JwtService,
    pub progress: ProgressService,
}

pub fn progress_routes(state: ProgressAppState) -> Router {
    Router::new()
        .route("/assignments/:assignment_id", get(assignment_progress))
        .route("/clients/:client_id", get(client_progress))
        .route("/me", get(my_progress))
        .with_state(state)
}

async fn assignment_progress(
    session: UserSession,
    State(progress): State<ProgressService>,
    Path(assignment_id): Path<Uuid>,
) -> AppResult<Json<AssignmentProgress>> {
    Ok(Json(progress.assignment_progress(&session, assignment_id).await?))
}

async fn client_progress(
    session: UserSession,
    State(progress): State<ProgressService>,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<ClientProgress>> {
    let coach_id = session.require_coach()?;
    Ok(Json(progress.client_progress(coach_id, client_id).await?))
}

async fn my_progress(
    session: UserSession,
    State(progress): State<ProgressService>,
) -> AppResult<Json<Vec<AssignmentProgress>>> {
    let user_id = session.require_client()?;
    Ok(Json(progress.my_progress(user_id).await?))
}
