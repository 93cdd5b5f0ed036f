use axum::{
    extract::{FromRef, Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::auth::{JwtService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{AnalyticsOverview, AnalyticsQuery, ClientAnalytics, ProgramAnalytics};
use crate::services::AnalyticsService;

#[derive(Clone, FromRef)]
pub struct AnalyticsAppState {
    pub jwt: JwtService,
    pub analytics: AnalyticsService,
}

pub fn analytics_routes(state: AnalyticsAppState) -> Router {
    Router::new()
        .route("/overview", get(overview))
        .route("/clients/:client_id", get(client_analytics))
        .route("/programs/:program_id", get(program_analytics))
        .with_state(state)
}

/// Current vs previous period for the whole practice
async fn overview(
    session: UserSession,
    State(analytics): State<AnalyticsService>,
    WithRejection(Query(query), _): WithRejection<Query<AnalyticsQuery>, AppError>,
) -> AppResult<Json<AnalyticsOverview>> {
    let coach_id = session.require_coach()?;
    Ok(Json(analytics.overview(coach_id, query.period).await?))
}

async fn client_analytics(
    session: UserSession,
    State(analytics): State<AnalyticsService>,
    Path(client_id): Path<Uuid>,
    WithRejection(Query(query), _): WithRejection<Query<AnalyticsQuery>, AppError>,
) -> AppResult<Json<ClientAnalytics>> {
    let coach_id = session.require_coach()?;
    Ok(Json(analytics.client(coach_id, client_id, query.period).await?))
}

async fn program_analytics(
    session: UserSession,
    State(analytics): State<AnalyticsService>,
    Path(program_id): Path<Uuid>,
) -> AppResult<Json<ProgramAnalytics>> {
    let coach_id = session.require_coach()?;
    Ok(Json(analytics.program(coach_id, program_id).await?))
}
