use axum::{
    extract::{FromRef, Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{JwtService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{ArchiveSummary, Client, ClientDetail, ClientQuery, CreateClientRequest, UpdateClientRequest, User};
use crate::services::ClientService;

#[derive(Clone, FromRef)]
pub struct ClientsAppState {
    pub jwt: JwtService,
    pub clients: ClientService,
}

#[derive(Debug, Serialize)]
pub struct ArchiveResponse {
    pub client: Client,
    pub removed: ArchiveSummary,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub sent: bool,
}

pub fn client_routes(state: ClientsAppState) -> Router {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route("/me/coach", get(my_coach))
        .route("/:client_id", get(get_client).put(update_client))
        .route("/:client_id/archive", post(archive_client))
        .route("/:client_id/unarchive", post(unarchive_client))
        .route("/:client_id/invite", post(invite_client))
        .with_state(state)
}

async fn list_clients(
    session: UserSession,
    State(clients): State<ClientService>,
    WithRejection(Query(query), _): WithRejection<Query<ClientQuery>, AppError>,
) -> AppResult<Json<Vec<Client>>> {
    let coach_id = session.require_coach()?;
    Ok(Json(clients.list(coach_id, &query).await?))
}

async fn get_client(
    session: UserSession,
    State(clients): State<ClientService>,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<ClientDetail>> {
    let coach_id = session.require_coach()?;
    Ok(Json(clients.get(coach_id, client_id).await?))
}

#[tracing::instrument(skip(clients, request), fields(coach_id = %session.user_id))]
async fn create_client(
    session: UserSession,
    State(clients): State<ClientService>,
    WithRejection(Json(request), _): WithRejection<Json<CreateClientRequest>, AppError>,
) -> AppResult<Json<Client>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(clients.create(coach_id, request).await?))
}

async fn update_client(
    session: UserSession,
    State(clients): State<ClientService>,
    Path(client_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateClientRequest>, AppError>,
) -> AppResult<Json<Client>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(clients.update(coach_id, client_id, request).await?))
}

#[tracing::instrument(skip(clients), fields(coach_id = %session.user_id))]
async fn archive_client(
    session: UserSession,
    State(clients): State<ClientService>,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<ArchiveResponse>> {
    let coach_id = session.require_coach()?;
    let (client, removed) = clients.archive(coach_id, client_id).await?;
    Ok(Json(ArchiveResponse { client, removed }))
}

async fn unarchive_client(
    session: UserSession,
    State(clients): State<ClientService>,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    let coach_id = session.require_coach()?;
    Ok(Json(clients.unarchive(coach_id, client_id).await?))
}

async fn invite_client(
    session: UserSession,
    State(clients): State<ClientService>,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<InviteResponse>> {
    let coach_id = session.require_coach()?;
    let sent = clients.invite(coach_id, client_id).await?;
    Ok(Json(InviteResponse { sent }))
}

async fn my_coach(session: UserSession, State(clients): State<ClientService>) -> AppResult<Json<Vec<User>>> {
    let user_id = session.require_client()?;
    Ok(Json(clients.my_coaches(user_id).await?))
}
