use axum::{
    extract::{FromRef, Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{JwtService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{SyncUserRequest, UpdateProfileRequest, User};
use crate::services::UserService;

#[derive(Clone, FromRef)]
pub struct UsersAppState {
    pub jwt: JwtService,
    pub users: UserService,
}

pub fn user_routes(state: UsersAppState) -> Router {
    Router::new()
        .route("/sync", post(sync_user))
        .route("/me", get(get_me).put(update_me))
        .route("/:user_id", get(get_user))
        .with_state(state)
}

/// Upsert the caller's row from their token; called on every sign-in
#[tracing::instrument(skip(users, request), fields(user_id = %session.user_id))]
async fn sync_user(
    session: UserSession,
    State(users): State<UserService>,
    WithRejection(Json(request), _): WithRejection<Json<SyncUserRequest>, AppError>,
) -> AppResult<Json<User>> {
    request.validate()?;
    Ok(Json(users.sync(&session, request).await?))
}

async fn get_me(session: UserSession, State(users): State<UserService>) -> AppResult<Json<User>> {
    Ok(Json(users.me(session.user_id).await?))
}

async fn update_me(
    session: UserSession,
    State(users): State<UserService>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateProfileRequest>, AppError>,
) -> AppResult<Json<User>> {
    request.validate()?;
    Ok(Json(users.update_profile(session.user_id, request).await?))
}

async fn get_user(
    session: UserSession,
    State(users): State<UserService>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    Ok(Json(users.get_visible(&session, user_id).await?))
}
