use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use axum_extra::extract::WithRejection;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{JwtService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AssignProgramRequest, AssignmentWithClient, CalendarDrill, CalendarQuery, CreateProgramRequest, Program,
    ProgramAssignment, ProgramDetail, ProgramSummary, ReplaceStructureRequest, UpdateProgramRequest,
};
use crate::services::ProgramService;

#[derive(Clone, FromRef)]
pub struct ProgramsAppState {
    pub jwt: JwtService,
    pub programs: ProgramService,
}

pub fn program_routes(state: ProgramsAppState) -> Router {
    Router::new()
        .route("/", get(list_programs).post(create_program))
        .route("/assignments/:assignment_id/calendar", get(assignment_calendar))
        .route("/:program_id", get(get_program).put(update_program).delete(delete_program))
        .route("/:program_id/structure", put(replace_structure))
        .route("/:program_id/duplicate", post(duplicate_program))
        .route("/:program_id/assign", post(assign_program))
        .route("/:program_id/assign/:client_id", delete(unassign_program))
        .route("/:program_id/assignments", get(list_assignments))
        .with_state(state)
}

async fn list_programs(
    session: UserSession,
    State(programs): State<ProgramService>,
) -> AppResult<Json<Vec<ProgramSummary>>> {
    let coach_id = session.require_coach()?;
    Ok(Json(programs.list(coach_id).await?))
}

async fn get_program(
    session: UserSession,
    State(programs): State<ProgramService>,
    Path(program_id): Path<Uuid>,
) -> AppResult<Json<ProgramDetail>> {
    let coach_id = session.require_coach()?;
    Ok(Json(programs.get(coach_id, program_id).await?))
}

#[tracing::instrument(skip(programs, request), fields(coach_id = %session.user_id))]
async fn create_program(
    session: UserSession,
    State(programs): State<ProgramService>,
    WithRejection(Json(request), _): WithRejection<Json<CreateProgramRequest>, AppError>,
) -> AppResult<Json<ProgramDetail>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(programs.create(coach_id, request).await?))
}

async fn update_program(
    session: UserSession,
    State(programs): State<ProgramService>,
    Path(program_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateProgramRequest>, AppError>,
) -> AppResult<Json<Program>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(programs.update(coach_id, program_id, request).await?))
}

async fn replace_structure(
    session: UserSession,
    State(programs): State<ProgramService>,
    Path(program_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<ReplaceStructureRequest>, AppError>,
) -> AppResult<Json<ProgramDetail>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(programs.replace_structure(coach_id, program_id, request.weeks).await?))
}

async fn duplicate_program(
    session: UserSession,
    State(programs): State<ProgramService>,
    Path(program_id): Path<Uuid>,
) -> AppResult<Json<ProgramDetail>> {
    let coach_id = session.require_coach()?;
    Ok(Json(programs.duplicate(coach_id, program_id).await?))
}

async fn delete_program(
    session: UserSession,
    State(programs): State<ProgramService>,
    Path(program_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let coach_id = session.require_coach()?;
    programs.delete(coach_id, program_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(programs, request), fields(coach_id = %session.user_id))]
async fn assign_program(
    session: UserSession,
    State(programs): State<ProgramService>,
    Path(program_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<AssignProgramRequest>, AppError>,
) -> AppResult<Json<ProgramAssignment>> {
    let coach_id = session.require_coach()?;
    Ok(Json(programs.assign(coach_id, program_id, request).await?))
}

async fn unassign_program(
    session: UserSession,
    State(programs): State<ProgramService>,
    Path((program_id, client_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let coach_id = session.require_coach()?;
    programs.unassign(coach_id, program_id, client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_assignments(
    session: UserSession,
    State(programs): State<ProgramService>,
    Path(program_id): Path<Uuid>,
) -> AppResult<Json<Vec<AssignmentWithClient>>> {
    let coach_id = session.require_coach()?;
    Ok(Json(programs.assignments(coach_id, program_id).await?))
}

/// Drills keyed by `YYYY-MM-DD`; open to the owning coach and the linked client
async fn assignment_calendar(
    session: UserSession,
    State(programs): State<ProgramService>,
    Path(assignment_id): Path<Uuid>,
    WithRejection(Query(query), _): WithRejection<Query<CalendarQuery>, AppError>,
) -> AppResult<Json<BTreeMap<String, Vec<CalendarDrill>>>> {
    Ok(Json(programs.calendar(&session, assignment_id, &query).await?))
}
