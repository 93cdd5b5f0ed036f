use std::borrow::Cow;
use validator::ValidationError;

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// `UTC` or an `Area/City` zone known to the tz database
pub fn validate_timezone(timezone: &str) -> Result<(), ValidationError> {
    let recognised = timezone == "UTC" || (timezone.contains('/') && timezone.parse::<chrono_tz::Tz>().is_ok());
    if recognised {
        Ok(())
    } else {
        Err(validation_error("timezone", "Timezone must be UTC or a known Area/City name"))
    }
}

/// `ILIKE` pattern matching `search` anywhere, with wildcards in the input
/// taken literally. `None` for a missing or blank term.
pub fn search_pattern(search: Option<&str>) -> Option<String> {
    search.map(str::trim).filter(|s| !s.is_empty()).map(|s| {
        let escaped = s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        format!("%{}%", escaped)
    })
}

/// Rejects strings that are empty once trimmed
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(validation_error("blank", "Value cannot be blank"))
    } else {
        Ok(())
    }
}

/// A message needs non-blank text or an attachment
pub fn validate_message_body(
    content: Option<&str>,
    attachment_url: Option<&str>,
) -> Result<(), ValidationError> {
    let has_text = content.map(|c| !c.trim().is_empty()).unwrap_or(false);
    let has_attachment = attachment_url.map(|a| !a.trim().is_empty()).unwrap_or(false);

    if has_text || has_attachment {
        Ok(())
    } else {
        Err(validation_error(
            "empty_message",
            "Message must have text content or an attachment",
        ))
    }
}

pub fn validate_time_range(
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
) -> Result<(), ValidationError> {
    if start < end {
        Ok(())
    } else {
        Err(validation_error("time_range", "Start time must be before end time"))
    }
}
