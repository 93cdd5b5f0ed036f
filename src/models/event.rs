use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::AppError;
use crate::models::validation::validate_time_range;

/// Longest window the calendar can be queried for in one request
pub const MAX_CALENDAR_RANGE_DAYS: i64 = 366;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum EventType {
    Lesson,
    Reminder,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub client_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub event_type: EventType,
    pub status: EventStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_swappable_lesson(&self, now: DateTime<Utc>) -> bool {
        self.event_type == EventType::Lesson
            && self.status == EventStatus::Scheduled
            && self.start_time > now
            && self.client_id.is_some()
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_create_event"))]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub event_type: EventType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub client_id: Option<Uuid>,
}

fn validate_create_event(request: &CreateEventRequest) -> Result<(), ValidationError> {
    validate_time_range(request.start_time, request.end_time)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub status: Option<EventStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub client_id: Option<Uuid>,
}

impl EventQuery {
    pub fn check_range(&self) -> Result<(), AppError> {
        if self.from >= self.to {
            return Err(AppError::bad_request("`from` must be before `to`"));
        }
        if self.to - self.from > Duration::days(MAX_CALENDAR_RANGE_DAYS) {
            return Err(AppError::bad_request(format!(
                "Calendar range cannot exceed {} days",
                MAX_CALENDAR_RANGE_DAYS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplaceDayRequest {
    pub assignment_id: Uuid,
    pub day_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DayReplacement {
    pub assignment_id: Uuid,
    pub day_id: Uuid,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// Time-swap requests

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SwapStatus {
    Pending,
    Approved,
    Declined,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapAction {
    Approve,
    Decline,
    Expire,
}

impl SwapStatus {
    /// Only a pending request moves, and only once
    pub fn apply(self, action: SwapAction) -> Result<SwapStatus, AppError> {
        match (self, action) {
            (SwapStatus::Pending, SwapAction::Approve) => Ok(SwapStatus::Approved),
            (SwapStatus::Pending, SwapAction::Decline) => Ok(SwapStatus::Declined),
            (SwapStatus::Pending, SwapAction::Expire) => Ok(SwapStatus::Expired),
            (status, _) => Err(AppError::conflict(format!(
                "Swap request is already {}",
                status.as_str()
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Approved => "approved",
            SwapStatus::Declined => "declined",
            SwapStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimeSwapRequest {
    pub id: Uuid,
    pub requester_client_id: Uuid,
    pub target_client_id: Uuid,
    pub requester_event_id: Uuid,
    pub target_event_id: Uuid,
    pub status: SwapStatus,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TimeSwapRequest {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SwapStatus::Pending && self.expires_at <= now
    }
}

/// A request lives for `ttl` but never past the earlier of the two lessons
pub fn swap_expiry(
    now: DateTime<Utc>,
    ttl: Duration,
    requester_start: DateTime<Utc>,
    target_start: DateTime<Utc>,
) -> DateTime<Utc> {
    (now + ttl).min(requester_start).min(target_start)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSwapRequest {
    pub requester_event_id: Uuid,
    pub target_event_id: Uuid,
    #[validate(length(max = 500))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondSwapRequest {
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct SwapQuery {
    pub status: Option<SwapStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_pending_transitions() {
        assert_eq!(SwapStatus::Pending.apply(SwapAction::Approve).unwrap(), SwapStatus::Approved);
        assert_eq!(SwapStatus::Pending.apply(SwapAction::Decline).unwrap(), SwapStatus::Declined);
        assert_eq!(SwapStatus::Pending.apply(SwapAction::Expire).unwrap(), SwapStatus::Expired);
    }

    #[test]
    fn test_terminal_states_reject_every_action() {
        for status in [SwapStatus::Approved, SwapStatus::Declined, SwapStatus::Expired] {
            for action in [SwapAction::Approve, SwapAction::Decline, SwapAction::Expire] {
                assert_matches!(status.apply(action), Err(AppError::Conflict(_)));
            }
        }
    }

    #[test]
    fn test_swap_expiry_is_capped_by_lesson_start() {
        let now = Utc::now();
        let ttl = Duration::hours(48);

        let far = now + Duration::days(10);
        assert_eq!(swap_expiry(now, ttl, far, far), now + ttl);

        let soon = now + Duration::hours(5);
        assert_eq!(swap_expiry(now, ttl, far, soon), soon);
        assert_eq!(swap_expiry(now, ttl, soon, far), soon);
    }

    #[test]
    fn test_event_query_range_checks() {
        let now = Utc::now();
        let ok = EventQuery { from: now, to: now + Duration::days(7), client_id: None };
        assert!(ok.check_range().is_ok());

        let inverted = EventQuery { from: now, to: now - Duration::days(1), client_id: None };
        assert_matches!(inverted.check_range(), Err(AppError::BadRequest(_)));

        let too_wide = EventQuery { from: now, to: now + Duration::days(400), client_id: None };
        assert_matches!(too_wide.check_range(), Err(AppError::BadRequest(_)));
    }

    #[test]
    fn test_invalid_time_range_fails_validation() {
        let now = Utc::now();
        let request = CreateEventRequest {
            title: "Lesson".to_string(),
            description: None,
            event_type: EventType::Lesson,
            start_time: now,
            end_time: now - Duration::minutes(30),
            location: None,
            client_id: None,
        };
        assert!(request.validate().is_err());
    }
}
