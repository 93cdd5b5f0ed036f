use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    swap_expiry, Client, CreateSwapRequest, Event, NewNotification, NotificationKind, SwapAction, SwapQuery,
    SwapStatus, TimeSwapRequest,
};
use crate::services::access::linked_client_ids;
use crate::services::{NotificationService, RealtimeEventKind, RealtimeService};

const PENDING_EXISTS: &str = "A pending swap request already exists for this lesson";

#[derive(Clone)]
pub struct TimeSwapService {
    db: PgPool,
    notifications: NotificationService,
    realtime: RealtimeService,
    request_ttl: Duration,
}

impl TimeSwapService {
    pub fn new(db: PgPool, notifications: NotificationService, realtime: RealtimeService, ttl_hours: i64) -> Self {
        Self {
            db,
            notifications,
            realtime,
            request_ttl: Duration::hours(ttl_hours),
        }
    }

    async fn lesson_with_client(&self, event_id: Uuid) -> AppResult<(Event, Client)> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound("Event"))?;

        let client_id = event.client_id.ok_or(AppError::NotFound("Event"))?;
        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(client_id)
            .fetch_one(&self.db)
            .await?;

        Ok((event, client))
    }

    pub async fn request_swap(&self, user_id: Uuid, request: CreateSwapRequest) -> AppResult<TimeSwapRequest> {
        if request.requester_event_id == request.target_event_id {
            return Err(AppError::bad_request("Cannot swap a lesson with itself"));
        }

        let now = Utc::now();
        let linked = linked_client_ids(&self.db, user_id).await?;

        let (requester_event, requester) = self.lesson_with_client(request.requester_event_id).await?;
        if !linked.contains(&requester.id) {
            return Err(AppError::NotFound("Event"));
        }
        if !requester_event.is_swappable_lesson(now) {
            return Err(AppError::bad_request("Only upcoming scheduled lessons can be swapped"));
        }

        let (target_event, target) = self.lesson_with_client(request.target_event_id).await?;
        if target_event.coach_id != requester_event.coach_id || !target.is_active() {
            return Err(AppError::NotFound("Event"));
        }
        if target.id == requester.id {
            return Err(AppError::bad_request("Both lessons belong to the same client"));
        }
        if !target_event.is_swappable_lesson(now) {
            return Err(AppError::bad_request("Only upcoming scheduled lessons can be swapped"));
        }

        let expires_at = swap_expiry(now, self.request_ttl, requester_event.start_time, target_event.start_time);

        let swap = sqlx::query_as::<_, TimeSwapRequest>(
            r#"
            INSERT INTO time_swap_requests (
                id, requester_client_id, target_client_id, requester_event_id, target_event_id,
                message, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(requester.id)
        .bind(target.id)
        .bind(requester_event.id)
        .bind(target_event.id)
        .bind(request.message)
        .bind(expires_at)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, PENDING_EXISTS))?;

        let data = serde_json::json!({ "swap_request_id": swap.id });
        for recipient in [target.user_id, Some(requester_event.coach_id)].into_iter().flatten() {
            self.notifications.dispatch(
                NewNotification::new(
                    recipient,
                    NotificationKind::SwapRequested,
                    "Lesson swap requested",
                    format!("{} would like to swap lesson times", requester.name),
                )
                .with_data(data.clone()),
            );
        }
        if let Some(target_user) = target.user_id {
            if let Err(err) = self.realtime.publish(target_user, RealtimeEventKind::SwapRequest, &swap) {
                warn!(swap_id = %swap.id, error = %err, "Failed to publish swap request");
            }
        }

        info!(swap_id = %swap.id, %expires_at, "Swap requested");
        Ok(swap)
    }

    pub async fn list(&self, session: &UserSession, query: &SwapQuery) -> AppResult<Vec<TimeSwapRequest>> {
        let swaps = match session.role {
            UserRole::Client => {
                let linked = linked_client_ids(&self.db, session.user_id).await?;
                sqlx::query_as::<_, TimeSwapRequest>(
                    r#"
                    SELECT * FROM time_swap_requests
                    WHERE (requester_client_id = ANY($1) OR target_client_id = ANY($1))
                      AND ($2::TEXT IS NULL OR status = $2)
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(&linked)
                .bind(query.status)
                .fetch_all(&self.db)
                .await?
            }
            UserRole::Coach | UserRole::Admin => {
                sqlx::query_as::<_, TimeSwapRequest>(
                    r#"
                    SELECT s.* FROM time_swap_requests s
                    JOIN events e ON e.id = s.requester_event_id
                    WHERE e.coach_id = $1 AND ($2::TEXT IS NULL OR s.status = $2)
                    ORDER BY s.created_at DESC
                    "#,
                )
                .bind(session.user_id)
                .bind(query.status)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(swaps)
    }

    /// Approve or decline. The request row is locked for the whole decision so
    /// a request is approved at most once.
    pub async fn respond(&self, session: &UserSession, swap_id: Uuid, approve: bool) -> AppResult<TimeSwapRequest> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let swap = sqlx::query_as::<_, TimeSwapRequest>(
            "SELECT * FROM time_swap_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(swap_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Swap request"))?;

        let (target_user, coach_id): (Option<Uuid>, Uuid) = sqlx::query_as(
            r#"
            SELECT c.user_id, e.coach_id
            FROM clients c, events e
            WHERE c.id = $1 AND e.id = $2
            "#,
        )
        .bind(swap.target_client_id)
        .bind(swap.target_event_id)
        .fetch_one(&mut *tx)
        .await?;

        let may_respond = target_user == Some(session.user_id) || coach_id == session.user_id || session.is_admin();
        if !may_respond {
            return Err(AppError::NotFound("Swap request"));
        }

        if swap.is_expired_at(now) {
            let expired = set_status(&mut tx, swap.id, swap.status.apply(SwapAction::Expire)?, now).await?;
            tx.commit().await?;
            self.notify_requester(&expired, NotificationKind::SwapExpired).await;
            return Err(AppError::conflict("Swap request has expired"));
        }

        let action = if approve { SwapAction::Approve } else { SwapAction::Decline };
        let next = swap.status.apply(action)?;

        if next == SwapStatus::Approved {
            let events = sqlx::query_as::<_, Event>(
                "SELECT * FROM events WHERE id = ANY($1) FOR UPDATE",
            )
            .bind(vec![swap.requester_event_id, swap.target_event_id])
            .fetch_all(&mut *tx)
            .await?;

            let still_valid = |event_id: Uuid, client_id: Uuid| {
                events
                    .iter()
                    .any(|e| e.id == event_id && e.client_id == Some(client_id) && e.is_swappable_lesson(now))
            };
            if !still_valid(swap.requester_event_id, swap.requester_client_id)
                || !still_valid(swap.target_event_id, swap.target_client_id)
            {
                return Err(AppError::conflict("Lessons changed since the swap was requested"));
            }

            for (event_id, client_id) in [
                (swap.requester_event_id, swap.target_client_id),
                (swap.target_event_id, swap.requester_client_id),
            ] {
                sqlx::query(
                    r#"
                    UPDATE events SET client_id = $2, reminder_sent_at = NULL, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(event_id)
                .bind(client_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        let updated = set_status(&mut tx, swap.id, next, now).await?;
        tx.commit().await?;

        let kind = if next == SwapStatus::Approved {
            NotificationKind::SwapApproved
        } else {
            NotificationKind::SwapDeclined
        };
        self.notify_requester(&updated, kind).await;

        info!(%swap_id, status = next.as_str(), "Swap request answered");
        Ok(updated)
    }

    /// The requester withdraws a pending request
    pub async fn cancel(&self, user_id: Uuid, swap_id: Uuid) -> AppResult<TimeSwapRequest> {
        let linked = linked_client_ids(&self.db, user_id).await?;
        let mut tx = self.db.begin().await?;

        let swap = sqlx::query_as::<_, TimeSwapRequest>(
            "SELECT * FROM time_swap_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(swap_id)
        .fetch_optional(&mut *tx)
        .await?
        .filter(|s| linked.contains(&s.requester_client_id))
        .ok_or(AppError::NotFound("Swap request"))?;

        let next = swap.status.apply(SwapAction::Decline)?;
        let updated = set_status(&mut tx, swap.id, next, Utc::now()).await?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Move overdue pending requests to expired; run by the scheduler
    pub async fn expire_due(&self) -> AppResult<Vec<TimeSwapRequest>> {
        let expired = sqlx::query_as::<_, TimeSwapRequest>(
            r#"
            UPDATE time_swap_requests
            SET status = 'expired', responded_at = NOW()
            WHERE status = 'pending' AND expires_at <= NOW()
            RETURNING *
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        for swap in &expired {
            self.notify_requester(swap, NotificationKind::SwapExpired).await;
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired swap requests");
        }
        Ok(expired)
    }

    /// Best-effort; a lookup failure is logged and swallowed
    async fn notify_requester(&self, swap: &TimeSwapRequest, kind: NotificationKind) {
        let lookup = sqlx::query_scalar::<_, Option<Uuid>>("SELECT user_id FROM clients WHERE id = $1")
            .bind(swap.requester_client_id)
            .fetch_optional(&self.db)
            .await;
        let user_id = match lookup {
            Ok(user_id) => user_id.flatten(),
            Err(err) => {
                warn!(swap_id = %swap.id, error = %err, "Failed to look up swap requester");
                return;
            }
        };

        if let Some(user_id) = user_id {
            let (title, body) = match swap.status {
                SwapStatus::Approved => ("Lesson swap approved", "Your lessons have been swapped"),
                SwapStatus::Declined => ("Lesson swap declined", "Your swap request was declined"),
                _ => ("Lesson swap expired", "Your swap request expired before anyone answered"),
            };
            self.notifications.dispatch(
                NewNotification::new(user_id, kind, title, body)
                    .with_data(serde_json::json!({ "swap_request_id": swap.id })),
            );
        }
    }
}

async fn set_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    swap_id: Uuid,
    status: SwapStatus,
    at: chrono::DateTime<Utc>,
) -> AppResult<TimeSwapRequest> {
    let swap = sqlx::query_as::<_, TimeSwapRequest>(
        "UPDATE time_swap_requests SET status = $2, responded_at = $3 WHERE id = $1 RETURNING *",
    )
    .bind(swap_id)
    .bind(status)
    .bind(at)
    .fetch_one(&mut **tx)
    .await?;
    Ok(swap)
}
