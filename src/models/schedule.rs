use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::FromRow;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

pub const CALENDAR_DATE_FORMAT: &str = "%Y-%m-%d";

/// One drill of a program flattened with its week/day position
#[derive(Debug, Clone, FromRow)]
pub struct ScheduledDrillRow {
    pub day_id: Uuid,
    pub week_number: i32,
    pub day_number: i32,
    pub drill_id: Uuid,
    pub position: i32,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub library_item_id: Option<Uuid>,
    pub routine_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalendarDrill {
    pub drill_id: Uuid,
    pub day_id: Uuid,
    pub week_number: i32,
    pub day_number: i32,
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub library_item_id: Option<Uuid>,
    pub routine_id: Option<Uuid>,
    pub completed: bool,
}

/// Calendar date of a program day: `start + (week-1)*7 + (day-1)` days
pub fn program_day_date(start_date: NaiveDate, week_number: i32, day_number: i32) -> NaiveDate {
    let offset = i64::from(week_number - 1) * 7 + i64::from(day_number - 1);
    start_date + Duration::days(offset)
}

/// Where `today` falls in a program that started on `start_date`.
/// `None` before the start or after the last week.
pub fn current_position(start_date: NaiveDate, today: NaiveDate, total_weeks: i32) -> Option<(i32, i32)> {
    let offset = (today - start_date).num_days();
    if offset < 0 {
        return None;
    }
    let week = (offset / 7) as i32 + 1;
    let day = (offset % 7) as i32 + 1;
    if week > total_weeks {
        None
    } else {
        Some((week, day))
    }
}

/// Bucket drills by projected date string.
///
/// Rows are expected in stored order (week, day, position); that order is kept
/// inside each bucket. Days replaced by a lesson are skipped, and `range`
/// (inclusive) filters the output.
pub fn project_calendar(
    start_date: NaiveDate,
    rows: &[ScheduledDrillRow],
    replaced_days: &HashSet<Uuid>,
    completed_drills: &HashSet<Uuid>,
    range: Option<(NaiveDate, NaiveDate)>,
) -> BTreeMap<String, Vec<CalendarDrill>> {
    let mut calendar: BTreeMap<String, Vec<CalendarDrill>> = BTreeMap::new();

    for row in rows {
        if replaced_days.contains(&row.day_id) {
            continue;
        }

        let date = program_day_date(start_date, row.week_number, row.day_number);
        if let Some((from, to)) = range {
            if date < from || date > to {
                continue;
            }
        }

        calendar
            .entry(date.format(CALENDAR_DATE_FORMAT).to_string())
            .or_default()
            .push(CalendarDrill {
                drill_id: row.drill_id,
                day_id: row.day_id,
                week_number: row.week_number,
                day_number: row.day_number,
                date,
                title: row.title.clone(),
                description: row.description.clone(),
                duration_minutes: row.duration_minutes,
                library_item_id: row.library_item_id,
                routine_id: row.routine_id,
                completed: completed_drills.contains(&row.drill_id),
            });
    }

    calendar
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn row(week_number: i32, day_number: i32, position: i32, title: &str) -> ScheduledDrillRow {
        ScheduledDrillRow {
            day_id: Uuid::new_v4(),
            week_number,
            day_number,
            drill_id: Uuid::new_v4(),
            position,
            title: title.to_string(),
            description: None,
            duration_minutes: Some(10),
            library_item_id: None,
            routine_id: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_program_day_date() {
        let start = date(2024, 3, 4);
        assert_eq!(program_day_date(start, 1, 1), start);
        assert_eq!(program_day_date(start, 1, 7), date(2024, 3, 10));
        assert_eq!(program_day_date(start, 2, 1), date(2024, 3, 11));
    }

    #[test]
    fn test_program_day_date_crosses_year_and_leap_day() {
        assert_eq!(program_day_date(date(2023, 12, 28), 1, 5), date(2024, 1, 1));
        assert_eq!(program_day_date(date(2024, 2, 26), 1, 4), date(2024, 2, 29));
        assert_eq!(program_day_date(date(2024, 2, 26), 1, 5), date(2024, 3, 1));
    }

    #[test]
    fn test_calendar_buckets_in_stored_order() {
        let start = date(2024, 1, 29);
        let rows = vec![
            row(1, 1, 1, "Warm-up"),
            row(1, 1, 2, "Serve drill"),
            row(1, 3, 1, "Footwork"),
            row(2, 1, 1, "Match play"),
        ];

        let calendar = project_calendar(start, &rows, &HashSet::new(), &HashSet::new(), None);

        let keys: Vec<&String> = calendar.keys().collect();
        assert_eq!(keys, vec!["2024-01-29", "2024-01-31", "2024-02-05"]);
        let first_day: Vec<&str> = calendar["2024-01-29"].iter().map(|d| d.title.as_str()).collect();
        assert_eq!(first_day, vec!["Warm-up", "Serve drill"]);
    }

    #[test]
    fn test_calendar_skips_replaced_days_and_marks_completed() {
        let start = date(2024, 5, 6);
        let rows = vec![row(1, 1, 1, "A"), row(1, 2, 1, "B")];
        let replaced: HashSet<Uuid> = [rows[0].day_id].into_iter().collect();
        let completed: HashSet<Uuid> = [rows[1].drill_id].into_iter().collect();

        let calendar = project_calendar(start, &rows, &replaced, &completed, None);

        assert_eq!(calendar.len(), 1);
        let drills = &calendar["2024-05-07"];
        assert_eq!(drills[0].title, "B");
        assert!(drills[0].completed);
    }

    #[test]
    fn test_calendar_range_is_inclusive() {
        let start = date(2024, 5, 6);
        let rows = vec![row(1, 1, 1, "A"), row(1, 2, 1, "B"), row(1, 3, 1, "C")];

        let calendar = project_calendar(
            start,
            &rows,
            &HashSet::new(),
            &HashSet::new(),
            Some((date(2024, 5, 7), date(2024, 5, 8))),
        );

        assert_eq!(calendar.keys().cloned().collect::<Vec<_>>(), vec!["2024-05-07", "2024-05-08"]);
    }

    #[test]
    fn test_current_position() {
        let start = date(2024, 1, 1);
        assert_eq!(current_position(start, date(2023, 12, 31), 4), None);
        assert_eq!(current_position(start, start, 4), Some((1, 1)));
        assert_eq!(current_position(start, date(2024, 1, 9), 4), Some((2, 2)));
        assert_eq!(current_position(start, date(2024, 1, 29), 4), None);
    }

    proptest! {
        #[test]
        fn prop_program_day_offset_is_exact(
            days_since_epoch in 0i64..40_000,
            week in 1i32..=104,
            day in 1i32..=7,
        ) {
            let start = date(1970, 1, 1) + Duration::days(days_since_epoch);
            let projected = program_day_date(start, week, day);
            let expected = i64::from(week - 1) * 7 + i64::from(day - 1);
            prop_assert_eq!((projected - start).num_days(), expected);
        }
    }
}
