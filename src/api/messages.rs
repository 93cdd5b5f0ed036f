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
use crate::models::{
    Conversation, ConversationSummary, Message, MessageQuery, SendMessageRequest, StartConversationRequest,
};
use crate::services::MessagingService;

#[derive(Clone, FromRef)]
pub struct MessagesAppState {
    pub jwt: JwtService,
    pub messaging: MessagingService,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

pub fn message_routes(state: MessagesAppState) -> Router {
    Router::new()
        .route("/conversations", get(list_conversations).post(start_conversation))
        .route("/conversations/:conversation_id", get(list_messages).post(send_message))
        .route("/conversations/:conversation_id/read", post(mark_read))
        .route("/unread", get(unread_count))
        .with_state(state)
}

async fn list_conversations(
    session: UserSession,
    State(messaging): State<MessagingService>,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(messaging.conversations(session.user_id).await?))
}

async fn start_conversation(
    session: UserSession,
    State(messaging): State<MessagingService>,
    WithRejection(Json(request), _): WithRejection<Json<StartConversationRequest>, AppError>,
) -> AppResult<Json<Conversation>> {
    Ok(Json(messaging.start(&session, request.participant_id).await?))
}

async fn list_messages(
    session: UserSession,
    State(messaging): State<MessagingService>,
    Path(conversation_id): Path<Uuid>,
    WithRejection(Query(query), _): WithRejection<Query<MessageQuery>, AppError>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(messaging.messages(session.user_id, conversation_id, &query).await?))
}

#[tracing::instrument(skip(messaging, request), fields(user_id = %session.user_id))]
async fn send_message(
    session: UserSession,
    State(messaging): State<MessagingService>,
    Path(conversation_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<SendMessageRequest>, AppError>,
) -> AppResult<Json<Message>> {
    request.validate()?;
    Ok(Json(messaging.send(session.user_id, conversation_id, request).await?))
}

async fn mark_read(
    session: UserSession,
    State(messaging): State<MessagingService>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<MarkReadResponse>> {
    let updated = messaging.mark_read(session.user_id, conversation_id).await?;
    Ok(Json(MarkReadResponse { updated }))
}

async fn unread_count(
    session: UserSession,
    State(messaging): State<MessagingService>,
) -> AppResult<Json<UnreadCountResponse>> {
    let unread_count = messaging.unread_count(session.user_id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}
