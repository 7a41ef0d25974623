use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One row of an exercise log.
///
/// All measurement fields are free-form text ("3x10", "45 kg", "20 min").
/// The `id` is stable across edits so rows can be addressed without relying
/// on their position in the day's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(alias = "exercise")]
    pub name: String,
    #[serde(default)]
    pub reps: String,
    #[serde(default)]
    pub sets: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default, alias = "time")]
    pub duration: String,
    #[serde(default)]
    pub completed: bool,
}

impl ExerciseEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            reps: String::new(),
            sets: String::new(),
            weight: String::new(),
            duration: String::new(),
            completed: false,
        }
    }

    pub fn with_reps(mut self, reps: impl Into<String>) -> Self {
        self.reps = reps.into();
        self
    }

    pub fn with_sets(mut self, sets: impl Into<String>) -> Self {
        self.sets = sets.into();
        self
    }

    pub fn with_weight(mut self, weight: impl Into<String>) -> Self {
        self.weight = weight.into();
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = duration.into();
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }
}

impl fmt::Display for ExerciseEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.completed { "x" } else { " " };
        write!(f, "[{}] {}", mark, self.name)?;

        let details: Vec<String> = [
            ("sets", &self.sets),
            ("reps", &self.reps),
            ("weight", &self.weight),
            ("time", &self.duration),
        ]
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect();

        if !details.is_empty() {
            write!(f, " ({})", details.join(", "))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_new() {
        let entry = ExerciseEntry::new("Squat");

        assert_eq!(entry.name, "Squat");
        assert!(entry.reps.is_empty());
        assert!(!entry.completed);
    }

    #[test]
    fn test_exercise_ids_are_unique() {
        let a = ExerciseEntry::new("Squat");
        let b = ExerciseEntry::new("Squat");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_exercise_display() {
        let entry = ExerciseEntry::new("Bench Press")
            .with_sets("3")
            .with_reps("8")
            .with_weight("60kg")
            .with_completed(true);

        let output = format!("{}", entry);
        assert!(output.starts_with("[x] Bench Press"));
        assert!(output.contains("sets: 3"));
        assert!(output.contains("weight: 60kg"));
        assert!(!output.contains("time"));
    }

    #[test]
    fn test_exercise_accepts_legacy_field_names() {
        let json = r#"{"exercise":"Plank","reps":"","sets":"3","weight":"","time":"60s","completed":false}"#;
        let entry: ExerciseEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.name, "Plank");
        assert_eq!(entry.duration, "60s");
        assert_eq!(entry.sets, "3");
    }

    #[test]
    fn test_exercise_serializes_camel_case() {
        let entry = ExerciseEntry::new("Row").with_duration("10 min");
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["name"], "Row");
        assert_eq!(value["duration"], "10 min");
        assert!(value.get("id").is_some());
    }
}
