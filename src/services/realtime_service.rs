use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeEventKind {
    Message,
    Notification,
    SwapRequest,
}

impl RealtimeEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeEventKind::Message => "message",
            RealtimeEventKind::Notification => "notification",
            RealtimeEventKind::SwapRequest => "swap_request",
        }
    }
}

/// One push addressed to a single user
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    pub user_id: Uuid,
    pub kind: RealtimeEventKind,
    pub payload: serde_json::Value,
}

/// In-process fan-out of realtime events. Each SSE connection holds a
/// receiver and filters on its own user id.
#[derive(Debug, Clone)]
pub struct RealtimeService {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl Default for RealtimeService {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeService {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }

    /// Returns how many live connections saw the event; zero is not an error
    pub fn publish<T: Serialize>(
        &self,
        user_id: Uuid,
        kind: RealtimeEventKind,
        payload: &T,
    ) -> Result<usize, serde_json::Error> {
        let event = RealtimeEvent {
            user_id,
            kind,
            payload: serde_json::to_value(payload)?,
        };

        let receivers = self.sender.send(event).unwrap_or(0);
        debug!(%user_id, kind = kind.as_str(), receivers, "Published realtime event");
        Ok(receivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let realtime = RealtimeService::new();
        let mut receiver = realtime.subscribe();
        let user_id = Uuid::new_v4();

        let delivered = realtime
            .publish(user_id, RealtimeEventKind::Message, &json!({"text": "hi"}))
            .unwrap();
        assert_eq!(delivered, 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.user_id, user_id);
        assert_eq!(event.kind, RealtimeEventKind::Message);
        assert_eq!(event.payload["text"], "hi");
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let realtime = RealtimeService::new();
        let delivered = realtime
            .publish(Uuid::new_v4(), RealtimeEventKind::Notification, &json!({}))
            .unwrap();
        assert_eq!(delivered, 0);
    }
}
