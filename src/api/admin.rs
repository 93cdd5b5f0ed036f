use axum::{
    extract::{FromRef, Path, Query, State},
    response::Json,
    routing::{get, put},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::auth::{JwtService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{AdminUserQuery, PlatformStats, SetRoleRequest, User};
use crate::services::AdminService;

#[derive(Clone, FromRef)]
pub struct AdminAppState {
    pub jwt: JwtService,
    pub admin: AdminService,
}

pub fn admin_routes(state: AdminAppState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:user_id/role", put(set_role))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn list_users(
    session: UserSession,
    State(admin): State<AdminService>,
    WithRejection(Query(query), _): WithRejection<Query<AdminUserQuery>, AppError>,
) -> AppResult<Json<Vec<User>>> {
    session.require_admin()?;
    Ok(Json(admin.list_users(&query).await?))
}

#[tracing::instrument(skip(admin, request), fields(admin_id = %session.user_id))]
async fn set_role(
    session: UserSession,
    State(admin): State<AdminService>,
    Path(user_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<SetRoleRequest>, AppError>,
) -> AppResult<Json<User>> {
    let admin_id = session.require_admin()?;
    Ok(Json(admin.set_role(admin_id, user_id, request.role).await?))
}

async fn stats(session: UserSession, State(admin): State<AdminService>) -> AppResult<Json<PlatformStats>> {
    session.require_admin()?;
    Ok(Json(admin.stats().await?))
}
