use axum::{
    extract::{FromRef, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::auth::{JwtService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{CompleteDrillRequest, DateQuery, DrillCompletionResult, TodayWorkout, UncompleteDrillRequest};
use crate::services::WorkoutService;

#[derive(Clone, FromRef)]
pub struct WorkoutsAppState {
    pub jwt: JwtService,
    pub workouts: WorkoutService,
}

pub fn workout_routes(state: WorkoutsAppState) -> Router {
    Router::new()
        .route("/today", get(today))
        .route("/drills/complete", post(complete_drill).delete(uncomplete_drill))
        .with_state(state)
}

async fn today(
    session: UserSession,
    State(workouts): State<WorkoutService>,
    WithRejection(Query(query), _): WithRejection<Query<DateQuery>, AppError>,
) -> AppResult<Json<Vec<TodayWorkout>>> {
    let user_id = session.require_client()?;
    Ok(Json(workouts.today(user_id, query.date).await?))
}

#[tracing::instrument(skip(workouts, request), fields(user_id = %session.user_id))]
async fn complete_drill(
    session: UserSession,
    State(workouts): State<WorkoutService>,
    WithRejection(Json(request), _): WithRejection<Json<CompleteDrillRequest>, AppError>,
) -> AppResult<Json<DrillCompletionResult>> {
    let user_id = session.require_client()?;
    request.validate()?;
    Ok(Json(workouts.complete_drill(user_id, request).await?))
}

async fn uncomplete_drill(
    session: UserSession,
    State(workouts): State<WorkoutService>,
    WithRejection(Json(request), _): WithRejection<Json<UncompleteDrillRequest>, AppError>,
) -> AppResult<Json<DrillCompletionResult>> {
    let user_id = session.require_client()?;
    Ok(Json(workouts.uncomplete_drill(user_id, request).await?))
}
