use axum::{
    extract::{FromRef, State},
    response::Json,
    routing::get,
    Router,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::auth::{JwtService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{UpdateSettingsRequest, UserSettings};
use crate::services::SettingsService;

#[derive(Clone, FromRef)]
pub struct SettingsAppState {
    pub jwt: JwtService,
    pub settings: SettingsService,
}

pub fn settings_routes(state: SettingsAppState) -> Router {
    Router::new()
        .route("/", get(get_settings).put(update_settings))
        .with_state(state)
}

async fn get_settings(session: UserSession, State(settings): State<SettingsService>) -> AppResult<Json<UserSettings>> {
    Ok(Json(settings.get(session.user_id).await?))
}

async fn update_settings(
    session: UserSession,
    State(settings): State<SettingsService>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateSettingsRequest>, AppError>,
) -> AppResult<Json<UserSettings>> {
    request.validate()?;
    Ok(Json(settings.update(session.user_id, request).await?))
}
