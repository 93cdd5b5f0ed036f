use axum::{
    extract::{FromRef, Path, State},
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
    AssignResult, AssignRoutineRequest, AssignedRoutine, CreateRoutineRequest, RoutineDetail, UpdateRoutineRequest,
};
use crate::services::RoutineService;

#[derive(Clone, FromRef)]
pub struct RoutinesAppState {
    pub jwt: JwtService,
    pub routines: RoutineService,
}

pub fn routine_routes(state: RoutinesAppState) -> Router {
    Router::new()
        .route("/", get(list_routines).post(create_routine))
        .route("/assigned", get(my_routines))
        .route("/:routine_id", get(get_routine).put(update_routine).delete(delete_routine))
        .route("/:routine_id/assign", post(assign_routine))
        .route("/:routine_id/assign/:client_id", delete(unassign_routine))
        .with_state(state)
}

async fn list_routines(
    session: UserSession,
    State(routines): State<RoutineService>,
) -> AppResult<Json<Vec<RoutineDetail>>> {
    let coach_id = session.require_coach()?;
    Ok(Json(routines.list(coach_id).await?))
}

async fn get_routine(
    session: UserSession,
    State(routines): State<RoutineService>,
    Path(routine_id): Path<Uuid>,
) -> AppResult<Json<RoutineDetail>> {
    let coach_id = session.require_coach()?;
    Ok(Json(routines.get(coach_id, routine_id).await?))
}

async fn create_routine(
    session: UserSession,
    State(routines): State<RoutineService>,
    WithRejection(Json(request), _): WithRejection<Json<CreateRoutineRequest>, AppError>,
) -> AppResult<Json<RoutineDetail>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(routines.create(coach_id, request).await?))
}

async fn update_routine(
    session: UserSession,
    State(routines): State<RoutineService>,
    Path(routine_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateRoutineRequest>, AppError>,
) -> AppResult<Json<RoutineDetail>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(routines.update(coach_id, routine_id, request).await?))
}

async fn delete_routine(
    session: UserSession,
    State(routines): State<RoutineService>,
    Path(routine_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let coach_id = session.require_coach()?;
    routines.delete(coach_id, routine_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(routines, request), fields(coach_id = %session.user_id))]
async fn assign_routine(
    session: UserSession,
    State(routines): State<RoutineService>,
    Path(routine_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<AssignRoutineRequest>, AppError>,
) -> AppResult<Json<AssignResult>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(routines.assign(coach_id, routine_id, request).await?))
}

async fn unassign_routine(
    session: UserSession,
    State(routines): State<RoutineService>,
    Path((routine_id, client_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let coach_id = session.require_coach()?;
    routines.unassign(coach_id, routine_id, client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn my_routines(
    session: UserSession,
    State(routines): State<RoutineService>,
) -> AppResult<Json<Vec<AssignedRoutine>>> {
    let user_id = session.require_client()?;
    Ok(Json(routines.my_routines(user_id).await?))
}
