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
    CreateEventRequest, CreateSwapRequest, DayReplacement, Event, EventQuery, ReplaceDayRequest,
    RespondSwapRequest, SwapQuery, TimeSwapRequest, UpdateEventRequest,
};
use crate::services::{EventService, TimeSwapService};

#[derive(Clone, FromRef)]
pub struct EventsAppState {
    pub jwt: JwtService,
    pub events: EventService,
    pub swaps: TimeSwapService,
}

pub fn event_routes(state: EventsAppState) -> Router {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/swaps", get(list_swaps).post(request_swap))
        .route("/swaps/:swap_id", delete(cancel_swap))
        .route("/swaps/:swap_id/respond", post(respond_swap))
        .route("/:event_id", get(get_event).put(update_event).delete(delete_event))
        .route("/:event_id/replace-day", post(replace_program_day))
        .with_state(state)
}

async fn list_events(
    session: UserSession,
    State(events): State<EventService>,
    WithRejection(Query(query), _): WithRejection<Query<EventQuery>, AppError>,
) -> AppResult<Json<Vec<Event>>> {
    Ok(Json(events.list(&session, &query).await?))
}

async fn get_event(
    session: UserSession,
    State(events): State<EventService>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Event>> {
    let coach_id = session.require_coach()?;
    Ok(Json(events.get_owned(coach_id, event_id).await?))
}

#[tracing::instrument(skip(events, request), fields(coach_id = %session.user_id))]
async fn create_event(
    session: UserSession,
    State(events): State<EventService>,
    WithRejection(Json(request), _): WithRejection<Json<CreateEventRequest>, AppError>,
) -> AppResult<Json<Event>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(events.create(coach_id, request).await?))
}

async fn update_event(
    session: UserSession,
    State(events): State<EventService>,
    Path(event_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateEventRequest>, AppError>,
) -> AppResult<Json<Event>> {
    let coach_id = session.require_coach()?;
    request.validate()?;
    Ok(Json(events.update(coach_id, event_id, request).await?))
}

async fn delete_event(
    session: UserSession,
    State(events): State<EventService>,
    Path(event_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let coach_id = session.require_coach()?;
    events.delete(coach_id, event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn replace_program_day(
    session: UserSession,
    State(events): State<EventService>,
    Path(event_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<ReplaceDayRequest>, AppError>,
) -> AppResult<Json<DayReplacement>> {
    let coach_id = session.require_coach()?;
    Ok(Json(events.replace_program_day(coach_id, event_id, request).await?))
}

#[tracing::instrument(skip(swaps, request), fields(user_id = %session.user_id))]
async fn request_swap(
    session: UserSession,
    State(swaps): State<TimeSwapService>,
    WithRejection(Json(request), _): WithRejection<Json<CreateSwapRequest>, AppError>,
) -> AppResult<Json<TimeSwapRequest>> {
    let user_id = session.require_client()?;
    request.validate()?;
    Ok(Json(swaps.request_swap(user_id, request).await?))
}

async fn list_swaps(
    session: UserSession,
    State(swaps): State<TimeSwapService>,
    WithRejection(Query(query), _): WithRejection<Query<SwapQuery>, AppError>,
) -> AppResult<Json<Vec<TimeSwapRequest>>> {
    Ok(Json(swaps.list(&session, &query).await?))
}

#[tracing::instrument(skip(swaps, request), fields(user_id = %session.user_id))]
async fn respond_swap(
    session: UserSession,
    State(swaps): State<TimeSwapService>,
    Path(swap_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<RespondSwapRequest>, AppError>,
) -> AppResult<Json<TimeSwapRequest>> {
    Ok(Json(swaps.respond(&session, swap_id, request.approve).await?))
}

async fn cancel_swap(
    session: UserSession,
    State(swaps): State<TimeSwapService>,
    Path(swap_id): Path<Uuid>,
) -> AppResult<Json<TimeSwapRequest>> {
    let user_id = session.require_client()?;
    Ok(Json(swaps.cancel(user_id, swap_id).await?))
}
