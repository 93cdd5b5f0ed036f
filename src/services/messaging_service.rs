use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Conversation, ConversationSummary, Message, MessageQuery, NewNotification, NotificationKind,
    SendMessageRequest, UserSummary,
};
use crate::services::{BackgroundTasks, NotificationService, RealtimeEventKind, RealtimeService};

#[derive(Clone)]
pub struct MessagingService {
    db: PgPool,
    realtime: RealtimeService,
    notifications: NotificationService,
    tasks: BackgroundTasks,
}

impl MessagingService {
    pub fn new(
        db: PgPool,
        realtime: RealtimeService,
        notifications: NotificationService,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            db,
            realtime,
            notifications,
            tasks,
        }
    }

    pub async fn conversations(&self, user_id: Uuid) -> AppResult<Vec<ConversationSummary>> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT * FROM conversations
            WHERE coach_id = $1 OR client_user_id = $1
            ORDER BY COALESCE(last_message_at, created_at) DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let counterpart = sqlx::query_as::<_, UserSummary>(
                "SELECT id, name, avatar_url, role FROM users WHERE id = $1",
            )
            .bind(conversation.counterpart(user_id))
            .fetch_optional(&self.db)
            .await?;

            let last_message = sqlx::query_as::<_, Message>(
                "SELECT * FROM messages WHERE conversation_id = $1 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(conversation.id)
            .fetch_optional(&self.db)
            .await?;

            let unread_count: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM messages
                WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL
                "#,
            )
            .bind(conversation.id)
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

            summaries.push(ConversationSummary {
                conversation,
                counterpart,
                last_message,
                unread_count,
            });
        }

        Ok(summaries)
    }

    /// Get or create the conversation between a coach and one of their client users
    pub async fn start(&self, session: &UserSession, participant_id: Uuid) -> AppResult<Conversation> {
        let (coach_id, client_user_id) = match session.role {
            UserRole::Client => (participant_id, session.user_id),
            UserRole::Coach | UserRole::Admin => (session.user_id, participant_id),
        };

        let linked: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM clients
                WHERE coach_id = $1 AND user_id = $2 AND status = 'active'
            )
            "#,
        )
        .bind(coach_id)
        .bind(client_user_id)
        .fetch_one(&self.db)
        .await?;

        if !linked {
            return Err(AppError::Forbidden);
        }

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (id, coach_id, client_user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (coach_id, client_user_id)
                DO UPDATE SET coach_id = EXCLUDED.coach_id
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(coach_id)
        .bind(client_user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(conversation)
    }

    async fn participant_conversation(&self, user_id: Uuid, conversation_id: Uuid) -> AppResult<Conversation> {
        let conversation = sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(&self.db)
            .await?
            .filter(|c| c.is_participant(user_id));

        conversation.ok_or(AppError::NotFound("Conversation"))
    }

    /// Newest first, paged backwards with `before`
    pub async fn messages(&self, user_id: Uuid, conversation_id: Uuid, query: &MessageQuery) -> AppResult<Vec<Message>> {
        self.participant_conversation(user_id, conversation_id).await?;

        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1 AND ($2::TIMESTAMPTZ IS NULL OR created_at < $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(conversation_id)
        .bind(query.before)
        .bind(query.page_size())
        .fetch_all(&self.db)
        .await?;

        Ok(messages)
    }

    /// Persist first; the realtime push and the notification are best-effort
    pub async fn send(&self, sender_id: Uuid, conversation_id: Uuid, request: SendMessageRequest) -> AppResult<Message> {
        let conversation = self.participant_conversation(sender_id, conversation_id).await?;
        let now = Utc::now();

        let content = request
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let mut tx = self.db.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, content, attachment_url, attachment_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .bind(request.attachment_url)
        .bind(request.attachment_type)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET last_message_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let recipient = conversation.counterpart(sender_id);

        let realtime = self.realtime.clone();
        let pushed = message.clone();
        self.tasks.spawn("message_broadcast", async move {
            realtime
                .publish(recipient, RealtimeEventKind::Message, &pushed)
                .map(|_| ())
        });

        self.notifications.dispatch(
            NewNotification::new(recipient, NotificationKind::NewMessage, "New message", message.preview())
                .with_data(serde_json::json!({
                    "conversation_id": conversation_id,
                    "message_id": message.id,
                })),
        );

        info!(%conversation_id, message_id = %message.id, "Message sent");
        Ok(message)
    }

    /// Stamp `read_at` on everything the counterpart sent
    pub async fn mark_read(&self, user_id: Uuid, conversation_id: Uuid) -> AppResult<u64> {
        self.participant_conversation(user_id, conversation_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE messages SET read_at = NOW()
            WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE (c.coach_id = $1 OR c.client_user_id = $1)
              AND m.sender_id <> $1
              AND m.read_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }
}
