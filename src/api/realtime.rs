use axum::{
    extract::{FromRef, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{JwtService, UserSession};
use crate::services::{RealtimeEvent, RealtimeService};

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone, FromRef)]
pub struct RealtimeAppState {
    pub jwt: JwtService,
    pub realtime: RealtimeService,
}

pub fn realtime_routes(state: RealtimeAppState) -> Router {
    Router::new().route("/stream", get(stream_events)).with_state(state)
}

/// Server-sent events addressed to the caller
async fn stream_events(
    session: UserSession,
    State(realtime): State<RealtimeService>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    info!(user_id = %session.user_id, "Realtime stream opened");

    let user_id = session.user_id;
    let events = stream::unfold(realtime.subscribe(), move |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Some(sse) = to_sse(&event, user_id) {
                        return Some((Ok(sse), receiver));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%user_id, skipped, "Realtime stream lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
}

/// `None` for events addressed to someone else
fn to_sse(event: &RealtimeEvent, user_id: Uuid) -> Option<SseEvent> {
    if event.user_id != user_id {
        return None;
    }
    match SseEvent::default().event(event.kind.as_str()).json_data(&event.payload) {
        Ok(sse) => Some(sse),
        Err(err) => {
            warn!(user_id = %event.user_id, error = %err, "Failed to encode realtime event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RealtimeEventKind;
    use serde_json::json;

    #[test]
    fn test_events_for_other_users_are_skipped() {
        let recipient = Uuid::new_v4();
        let event = RealtimeEvent {
            user_id: recipient,
            kind: RealtimeEventKind::Message,
            payload: json!({ "content": "See you at 5" }),
        };

        assert!(to_sse(&event, recipient).is_some());
        assert!(to_sse(&event, Uuid::new_v4()).is_none());
    }
}
