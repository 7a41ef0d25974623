use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::exercise::ExerciseEntry;

/// Canonical key format for calendar records.
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Everything logged for a single calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRecord {
    #[serde(default)]
    pub exercises: Vec<ExerciseEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DateRecord {
    /// An empty record stamped with the current time.
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            exercises: Vec::new(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_exercises(mut self, exercises: Vec<ExerciseEntry>) -> Self {
        self.exercises = exercises;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Number of exercises marked completed.
    pub fn completed_count(&self) -> usize {
        self.exercises.iter().filter(|e| e.completed).count()
    }
}

impl fmt::Display for DateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exercises.is_empty() {
            writeln!(f, "No exercises logged.")?;
        } else {
            for (index, exercise) in self.exercises.iter().enumerate() {
                writeln!(f, "{:>3}. {}", index, exercise)?;
            }
        }

        if let Some(notes) = self.notes.as_deref().filter(|n| !n.is_empty()) {
            writeln!(f, "\nNotes: {}", notes)?;
        }

        Ok(())
    }
}

/// Renders the canonical `YYYY-MM-DD` key for a date.
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Parses a key, accepting only the canonical zero-padded form.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()?;
    (date_key(date) == key).then_some(date)
}

/// Builds a date from a year, a zero-based month, and a day of month.
///
/// Out-of-range parts roll over the way a calendar does: month 12 is January
/// of the next year, day 0 is the last day of the previous month. Returns
/// `None` only when the result falls outside the representable range.
pub fn normalize_date(year: i32, month0: i32, day: i32) -> Option<NaiveDate> {
    let total_months = i64::from(year) * 12 + i64::from(month0);
    let year = i32::try_from(total_months.div_euclid(12)).ok()?;
    let month = total_months.rem_euclid(12) as u32 + 1;

    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_signed(Duration::days(i64::from(day) - 1))
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(first);
    next.signed_duration_since(first).num_days().max(28) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_key_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(date_key(date), "2025-03-07");
    }

    #[test]
    fn test_normalize_zero_based_month() {
        let date = normalize_date(2025, 0, 15).unwrap();
        assert_eq!(date_key(date), "2025-01-15");

        let date = normalize_date(2025, 11, 31).unwrap();
        assert_eq!(date_key(date), "2025-12-31");
    }

    #[test]
    fn test_normalize_rolls_over() {
        assert_eq!(date_key(normalize_date(2024, 12, 1).unwrap()), "2025-01-01");
        assert_eq!(date_key(normalize_date(2025, -1, 1).unwrap()), "2024-12-01");
        assert_eq!(date_key(normalize_date(2025, 2, 0).unwrap()), "2025-02-28");
        assert_eq!(date_key(normalize_date(2024, 1, 30).unwrap()), "2024-03-01");
    }

    #[test]
    fn test_keys_sort_in_calendar_order() {
        let mut keys = vec![
            date_key(normalize_date(2025, 9, 2).unwrap()),
            date_key(normalize_date(2025, 0, 20).unwrap()),
            date_key(normalize_date(2024, 11, 31).unwrap()),
        ];
        keys.sort();
        assert_eq!(keys, vec!["2024-12-31", "2025-01-20", "2025-10-02"]);
    }

    #[test]
    fn test_parse_date_key_rejects_non_canonical() {
        assert!(parse_date_key("2025-03-07").is_some());
        assert!(parse_date_key("2025-3-7").is_none());
        assert!(parse_date_key("2025-02-30").is_none());
        assert!(parse_date_key("not a date").is_none());
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()), 29);
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()), 28);
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()), 31);
    }

    #[test]
    fn test_date_record_display() {
        let record = DateRecord::empty()
            .with_exercises(vec![ExerciseEntry::new("Squat").with_sets("5")])
            .with_notes("Felt strong");

        let output = format!("{}", record);
        assert!(output.contains("0. [ ] Squat"));
        assert!(output.contains("Notes: Felt strong"));
    }

    #[test]
    fn test_date_record_json_uses_camel_case() {
        let record = DateRecord::empty();
        let value = serde_json::to_value(&record).unwrap();

        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("notes").is_none());
    }
}
