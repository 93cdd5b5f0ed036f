use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reporting window for analytics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AnalyticsPeriod {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl AnalyticsPeriod {
    pub fn days(&self) -> i64 {
        match self {
            AnalyticsPeriod::Week => 7,
            AnalyticsPeriod::Month => 30,
            AnalyticsPeriod::Quarter => 90,
        }
    }

    /// (current, previous) windows ending at `now`, equally long and adjacent
    pub fn windows(&self, now: DateTime<Utc>) -> (DateRange, DateRange) {
        let length = Duration::days(self.days());
        let current = DateRange { start: now - length, end: now };
        let previous = DateRange { start: current.start - length, end: current.start };
        (current, previous)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Inclusive calendar days whose scheduled drills belong to this window:
    /// the day after `start` through the day of `end` (UTC). Adjacent windows
    /// never share a day.
    pub fn schedule_days(&self) -> (NaiveDate, NaiveDate) {
        (self.start.date_naive() + Duration::days(1), self.end.date_naive())
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub period: AnalyticsPeriod,
}

/// Raw counts gathered for one window
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PeriodCounts {
    pub total_clients: i64,
    pub active_clients: i64,
    pub new_clients: i64,
    pub lessons_held: i64,
    pub messages_sent: i64,
    pub drill_completions: i64,
    pub drills_scheduled: i64,
    pub clients_at_start: i64,
    pub clients_retained: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodMetrics {
    pub range: DateRange,
    #[serde(flatten)]
    pub counts: PeriodCounts,
    pub completion_rate: f64,
    pub retention_rate: f64,
}

impl PeriodMetrics {
    pub fn from_counts(range: DateRange, counts: PeriodCounts) -> Self {
        let completion_rate = percentage(counts.drill_completions, counts.drills_scheduled);
        let retention_rate = percentage(counts.clients_retained, counts.clients_at_start);
        Self { range, counts, completion_rate, retention_rate }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricTrends {
    pub active_clients: f64,
    pub new_clients: f64,
    pub lessons_held: f64,
    pub messages_sent: f64,
    pub drill_completions: f64,
    pub completion_rate: f64,
    pub retention_rate: f64,
}

impl MetricTrends {
    pub fn between(current: &PeriodMetrics, previous: &PeriodMetrics) -> Self {
        Self {
            active_clients: trend_delta(current.counts.active_clients as f64, previous.counts.active_clients as f64),
            new_clients: trend_delta(current.counts.new_clients as f64, previous.counts.new_clients as f64),
            lessons_held: trend_delta(current.counts.lessons_held as f64, previous.counts.lessons_held as f64),
            messages_sent: trend_delta(current.counts.messages_sent as f64, previous.counts.messages_sent as f64),
            drill_completions: trend_delta(
                current.counts.drill_completions as f64,
                previous.counts.drill_completions as f64,
            ),
            completion_rate: trend_delta(current.completion_rate, previous.completion_rate),
            retention_rate: trend_delta(current.retention_rate, previous.retention_rate),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsOverview {
    pub period: AnalyticsPeriod,
    pub current: PeriodMetrics,
    pub previous: PeriodMetrics,
    pub trends: MetricTrends,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientAnalytics {
    pub client_id: Uuid,
    pub period: AnalyticsPeriod,
    pub current: PeriodMetrics,
    pub previous: PeriodMetrics,
    pub trends: MetricTrends,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgramAnalytics {
    pub program_id: Uuid,
    pub assignment_count: i64,
    pub completed_assignments: i64,
    pub average_completion: f64,
}

/// `part / whole * 100`, rounded to one decimal; 0 when there is no whole
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

/// Relative change in percent; 100 when growing from zero, 0 when both are zero
pub fn trend_delta(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    round1((current - previous) / previous * 100.0)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 10), 50.0);
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(10, 10), 100.0);
    }

    #[test]
    fn test_trend_delta() {
        assert_eq!(trend_delta(0.0, 0.0), 0.0);
        assert_eq!(trend_delta(4.0, 0.0), 100.0);
        assert_eq!(trend_delta(15.0, 10.0), 50.0);
        assert_eq!(trend_delta(5.0, 10.0), -50.0);
        assert_eq!(trend_delta(0.0, 8.0), -100.0);
    }

    #[test]
    fn test_period_windows_are_adjacent() {
        let now = Utc::now();
        let (current, previous) = AnalyticsPeriod::Week.windows(now);
        assert_eq!(current.end, now);
        assert_eq!(previous.end, current.start);
        assert_eq!(current.end - current.start, previous.end - previous.start);
        assert_eq!((current.end - current.start).num_days(), 7);
    }

    #[test]
    fn test_schedule_days_do_not_overlap() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 3, 15, 10, 30, 0).unwrap();
        let (current, previous) = AnalyticsPeriod::Week.windows(now);

        let (current_first, current_last) = current.schedule_days();
        let (previous_first, previous_last) = previous.schedule_days();

        assert_eq!(current_last, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(current_first, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(previous_last, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        assert_eq!(previous_first, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!((current_last - current_first).num_days() + 1, 7);
    }

    #[test]
    fn test_period_metrics_rates() {
        let now = Utc::now();
        let counts = PeriodCounts {
            drill_completions: 12,
            drills_scheduled: 16,
            clients_at_start: 8,
            clients_retained: 6,
            ..Default::default()
        };
        let metrics = PeriodMetrics::from_counts(DateRange { start: now, end: now }, counts);
        assert_eq!(metrics.completion_rate, 75.0);
        assert_eq!(metrics.retention_rate, 75.0);
    }

    #[test]
    fn test_period_deserializes_from_short_form() {
        let query: AnalyticsQuery = serde_json::from_str(r#"{"period":"90d"}"#).unwrap();
        assert_eq!(query.period, AnalyticsPeriod::Quarter);
        let query: AnalyticsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.period, AnalyticsPeriod::Month);
    }
}
