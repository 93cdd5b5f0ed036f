use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::validation::validate_timezone;

pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_LESSON_MINUTES: i32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct UserSettings {
    pub user_id: Uuid,
    pub timezone: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub message_notifications: bool,
    pub lesson_reminders: bool,
    pub default_lesson_minutes: i32,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    /// Settings used when a user has never saved any
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            timezone: DEFAULT_TIMEZONE.to_string(),
            email_notifications: true,
            push_notifications: true,
            message_notifications: true,
            lesson_reminders: true,
            default_lesson_minutes: DEFAULT_LESSON_MINUTES,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    #[validate(custom(function = "validate_timezone"))]
    pub timezone: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub message_notifications: Option<bool>,
    pub lesson_reminders: Option<bool>,
    #[validate(range(min = 15, max = 240))]
    pub default_lesson_minutes: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = UserSettings::defaults_for(Uuid::new_v4());
        assert_eq!(settings.timezone, "UTC");
        assert!(settings.message_notifications);
        assert_eq!(settings.default_lesson_minutes, 60);
    }

    #[test]
    fn test_update_validation() {
        let ok = UpdateSettingsRequest {
            timezone: Some("Europe/Berlin".to_string()),
            default_lesson_minutes: Some(45),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let too_long = UpdateSettingsRequest {
            default_lesson_minutes: Some(600),
            ..Default::default()
        };
        assert!(too_long.validate().is_err());

        let bad_zone = UpdateSettingsRequest {
            timezone: Some("not a zone".to_string()),
            ..Default::default()
        };
        assert!(bad_zone.validate().is_err());
    }
}
