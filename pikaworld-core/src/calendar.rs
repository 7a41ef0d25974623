//! Date-keyed exercise log.
//!
//! The whole calendar is one JSON object mapping `YYYY-MM-DD` keys to
//! [`DateRecord`]s. Every successful save also rewrites a single backup
//! copy, so the backup always mirrors the last good save.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{date_key, days_in_month, normalize_date, parse_date_key};
use crate::models::{DateRecord, ExerciseEntry};
use crate::storage::{KeyValueStore, StorageError, StorageInfo, DEFAULT_CAPACITY_BYTES};

/// Storage key for the calendar aggregate.
pub const CALENDAR_DATA_KEY: &str = "pikaworld_calendar_data";
/// Storage key for the shadow backup of the aggregate.
pub const CALENDAR_BACKUP_KEY: &str = "pikaworld_calendar_backup";

/// Date key -> record, ordered by date.
pub type CalendarData = BTreeMap<String, DateRecord>;

/// Errors from calendar operations.
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid calendar data format: {0}")]
    Format(String),

    #[error("No calendar backup found")]
    BackupNotFound,

    #[error("Date out of range: {year}-{month0}-{day} (zero-based month)")]
    InvalidDate { year: i32, month0: i32, day: i32 },
}

/// Local store of exercise records keyed by date.
pub struct CalendarStore<S> {
    storage: S,
    capacity: u64,
}

impl<S: KeyValueStore> CalendarStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            capacity: DEFAULT_CAPACITY_BYTES,
        }
    }

    /// Overrides the capacity used by [`CalendarStore::get_storage_info`].
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Loads the aggregate for reading.
    ///
    /// Unreadable data reads as an empty calendar.
    fn load(&self) -> CalendarData {
        match self.load_strict() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to read calendar data: {}", e);
                CalendarData::new()
            }
        }
    }

    /// Loads the aggregate for a read-modify-write cycle.
    ///
    /// Unlike [`Self::load`], an unreadable blob is an error so a save never
    /// replaces data it could not parse.
    fn load_strict(&self) -> Result<CalendarData, CalendarError> {
        match self.storage.get(CALENDAR_DATA_KEY)? {
            Some(blob) => parse_calendar(&blob),
            None => Ok(CalendarData::new()),
        }
    }

    /// Writes the aggregate and refreshes the backup.
    ///
    /// If the backup write fails, the previous primary blob is put back.
    fn persist(&self, data: &CalendarData) -> Result<(), CalendarError> {
        let serialized = serde_json::to_string(data)
            .map_err(|e| StorageError::Serialize(CALENDAR_DATA_KEY.to_string(), e))?;

        let previous = self.storage.get(CALENDAR_DATA_KEY)?;
        self.storage.set(CALENDAR_DATA_KEY, &serialized)?;

        if let Err(e) = self.storage.set(CALENDAR_BACKUP_KEY, &serialized) {
            let rollback = match previous {
                Some(blob) => self.storage.set(CALENDAR_DATA_KEY, &blob),
                None => self.storage.remove(CALENDAR_DATA_KEY),
            };
            if let Err(rollback_err) = rollback {
                tracing::error!("Failed to roll back calendar data: {}", rollback_err);
            }
            return Err(e.into());
        }

        Ok(())
    }

    /// Returns the record for `date`, or a fresh empty record if none exists.
    ///
    /// The synthesized record is not persisted.
    pub fn get_date_data(&self, date: NaiveDate) -> DateRecord {
        self.load()
            .remove(&date_key(date))
            .unwrap_or_else(DateRecord::empty)
    }

    /// Upserts the record for `date`.
    ///
    /// Keeps the original `created_at` if the date already had a record and
    /// stamps `updated_at` with the current time.
    pub fn save_date_data(
        &self,
        date: NaiveDate,
        record: DateRecord,
    ) -> Result<DateRecord, CalendarError> {
        let key = date_key(date);
        let mut data = self.load_strict()?;

        let now = Utc::now();
        let created_at = data.get(&key).map(|r| r.created_at).unwrap_or(now);
        let record = DateRecord {
            created_at,
            updated_at: now,
            ..record
        };

        data.insert(key.clone(), record.clone());
        self.persist(&data)?;

        tracing::debug!("Saved calendar record {}", key);
        Ok(record)
    }

    /// [`CalendarStore::get_date_data`] addressed by year, zero-based month
    /// and day. Out-of-range parts roll over; an unrepresentable date reads
    /// as an empty record.
    pub fn get_day_data(&self, year: i32, month0: i32, day: i32) -> DateRecord {
        match normalize_date(year, month0, day) {
            Some(date) => self.get_date_data(date),
            None => DateRecord::empty(),
        }
    }

    /// [`CalendarStore::save_date_data`] addressed by year, zero-based month
    /// and day.
    pub fn save_day_data(
        &self,
        year: i32,
        month0: i32,
        day: i32,
        record: DateRecord,
    ) -> Result<DateRecord, CalendarError> {
        let date = normalize_date(year, month0, day).ok_or(CalendarError::InvalidDate {
            year,
            month0,
            day,
        })?;
        self.save_date_data(date, record)
    }

    /// Applies `edit` to the exercises of `date` and saves the result.
    fn edit_exercises<F>(&self, date: NaiveDate, edit: F) -> Result<DateRecord, CalendarError>
    where
        F: FnOnce(&mut Vec<ExerciseEntry>),
    {
        let mut record = self.get_date_data(date);
        edit(&mut record.exercises);
        self.save_date_data(date, record)
    }

    /// Appends an exercise to `date`.
    pub fn add_exercise(
        &self,
        date: NaiveDate,
        entry: ExerciseEntry,
    ) -> Result<DateRecord, CalendarError> {
        self.edit_exercises(date, |exercises| exercises.push(entry))
    }

    /// Replaces the exercise at `index`. An out-of-range index saves the
    /// list unchanged.
    pub fn update_exercise(
        &self,
        date: NaiveDate,
        index: usize,
        entry: ExerciseEntry,
    ) -> Result<DateRecord, CalendarError> {
        self.edit_exercises(date, |exercises| {
            if let Some(slot) = exercises.get_mut(index) {
                *slot = entry;
            }
        })
    }

    /// Removes the exercise at `index`. An out-of-range index saves the
    /// list unchanged.
    pub fn remove_exercise(&self, date: NaiveDate, index: usize) -> Result<DateRecord, CalendarError> {
        self.edit_exercises(date, |exercises| {
            if index < exercises.len() {
                exercises.remove(index);
            }
        })
    }

    /// Replaces the exercise with the given id, keeping that id.
    pub fn update_exercise_by_id(
        &self,
        date: NaiveDate,
        id: Uuid,
        entry: ExerciseEntry,
    ) -> Result<DateRecord, CalendarError> {
        self.edit_exercises(date, |exercises| {
            if let Some(slot) = exercises.iter_mut().find(|e| e.id == id) {
                *slot = ExerciseEntry { id, ..entry };
            }
        })
    }

    /// Removes the exercise with the given id.
    pub fn remove_exercise_by_id(&self, date: NaiveDate, id: Uuid) -> Result<DateRecord, CalendarError> {
        self.edit_exercises(date, |exercises| exercises.retain(|e| e.id != id))
    }

    /// Marks the exercise at `index` as completed or not.
    pub fn set_exercise_completed(
        &self,
        date: NaiveDate,
        index: usize,
        completed: bool,
    ) -> Result<DateRecord, CalendarError> {
        self.edit_exercises(date, |exercises| {
            if let Some(entry) = exercises.get_mut(index) {
                entry.completed = completed;
            }
        })
    }

    /// Sets or clears the free-form notes for `date`.
    pub fn set_notes(
        &self,
        date: NaiveDate,
        notes: Option<String>,
    ) -> Result<DateRecord, CalendarError> {
        let mut record = self.get_date_data(date);
        record.notes = notes;
        self.save_date_data(date, record)
    }

    /// Returns the records of one month keyed by day of month.
    ///
    /// `month0` is zero-based. Days without a record are omitted.
    pub fn get_month_data(&self, year: i32, month0: i32) -> BTreeMap<u32, DateRecord> {
        let Some(first) = normalize_date(year, month0, 1) else {
            return BTreeMap::new();
        };

        let mut data = self.load();
        (1..=days_in_month(first))
            .filter_map(|day| {
                let date = first.with_day(day)?;
                data.remove(&date_key(date)).map(|record| (day, record))
            })
            .collect()
    }

    /// Returns the whole aggregate.
    pub fn get_all_data(&self) -> CalendarData {
        self.load()
    }

    /// Serializes the whole aggregate as pretty-printed JSON.
    pub fn export_data(&self) -> Result<String, CalendarError> {
        let data = self.load();
        serde_json::to_string_pretty(&data)
            .map_err(|e| CalendarError::from(StorageError::Serialize(CALENDAR_DATA_KEY.to_string(), e)))
    }

    /// Replaces the whole aggregate with `serialized`.
    ///
    /// Nothing is written unless the payload parses and every key is a
    /// canonical date.
    pub fn import_data(&self, serialized: &str) -> Result<usize, CalendarError> {
        let data = parse_calendar(serialized)?;
        self.persist(&data)?;

        tracing::info!("Imported {} calendar record(s)", data.len());
        Ok(data.len())
    }

    /// Reports the serialized size of the aggregate against the capacity.
    pub fn get_storage_info(&self) -> StorageInfo {
        let used = serde_json::to_string(&self.load())
            .map(|s| s.len() as u64)
            .unwrap_or(0);
        StorageInfo::measure(used, self.capacity)
    }

    /// Removes both the aggregate and its backup.
    pub fn clear_all_data(&self) -> Result<(), CalendarError> {
        self.storage.remove(CALENDAR_DATA_KEY)?;
        self.storage.remove(CALENDAR_BACKUP_KEY)?;
        Ok(())
    }

    /// Copies the backup over the aggregate.
    pub fn restore_from_backup(&self) -> Result<usize, CalendarError> {
        let blob = self
            .storage
            .get(CALENDAR_BACKUP_KEY)?
            .ok_or(CalendarError::BackupNotFound)?;
        let data = parse_calendar(&blob)?;
        self.persist(&data)?;

        tracing::info!("Restored {} calendar record(s) from backup", data.len());
        Ok(data.len())
    }
}

/// Parses and validates a serialized aggregate.
fn parse_calendar(serialized: &str) -> Result<CalendarData, CalendarError> {
    let data: CalendarData =
        serde_json::from_str(serialized).map_err(|e| CalendarError::Format(e.to_string()))?;

    if let Some(bad) = data.keys().find(|key| parse_date_key(key).is_none()) {
        return Err(CalendarError::Format(format!(
            "'{}' is not a YYYY-MM-DD date key",
            bad
        )));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn setup() -> CalendarStore<MemoryStore> {
        CalendarStore::new(MemoryStore::new())
    }

    fn day(y: i32, m0: i32, d: i32) -> NaiveDate {
        normalize_date(y, m0, d).unwrap()
    }

    #[test]
    fn test_get_missing_date_is_empty_and_not_persisted() {
        let store = setup();
        let before = store.export_data().unwrap();

        let record = store.get_date_data(day(2025, 0, 1));

        assert!(record.exercises.is_empty());
        assert_eq!(store.export_data().unwrap(), before);
        assert!(store.storage.get(CALENDAR_DATA_KEY).unwrap().is_none());
    }

    #[test]
    fn test_save_then_read_returns_exercises() {
        let store = setup();
        let date = day(2025, 4, 12);
        let before = Utc::now();

        let record = DateRecord::empty().with_exercises(vec![
            ExerciseEntry::new("Squat").with_sets("5").with_reps("5"),
            ExerciseEntry::new("Run").with_duration("20 min"),
        ]);
        store.save_date_data(date, record.clone()).unwrap();

        let read = store.get_date_data(date);
        assert_eq!(read.exercises, record.exercises);
        assert!(read.updated_at >= before);
    }

    #[test]
    fn test_created_at_preserved_across_saves() {
        let store = setup();
        let date = day(2025, 4, 12);

        let first = store.save_date_data(date, DateRecord::empty()).unwrap();
        let second = store
            .save_date_data(date, DateRecord::empty().with_notes("again"))
            .unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.get_date_data(date).created_at, first.created_at);
    }

    #[test]
    fn test_save_refreshes_backup() {
        let store = setup();
        store
            .add_exercise(day(2025, 1, 3), ExerciseEntry::new("Deadlift"))
            .unwrap();

        let primary = store.storage.get(CALENDAR_DATA_KEY).unwrap();
        let backup = store.storage.get(CALENDAR_BACKUP_KEY).unwrap();
        assert!(primary.is_some());
        assert_eq!(primary, backup);
    }

    #[test]
    fn test_quota_exceeded_leaves_data_unchanged() {
        let store = CalendarStore::new(MemoryStore::with_capacity(2_000));
        let date = day(2025, 0, 1);
        store.add_exercise(date, ExerciseEntry::new("Squat")).unwrap();
        let before = store.export_data().unwrap();

        let huge = ExerciseEntry::new("x".repeat(5_000));
        let err = store.add_exercise(date, huge).unwrap_err();

        assert!(matches!(
            err,
            CalendarError::Storage(StorageError::QuotaExceeded { .. })
        ));
        assert_eq!(store.export_data().unwrap(), before);
    }

    #[test]
    fn test_failed_backup_write_rolls_back_primary() {
        // Room for one copy of the blob but not two
        let store = CalendarStore::new(MemoryStore::with_capacity(600));
        let date = day(2025, 0, 1);

        let err = store
            .add_exercise(date, ExerciseEntry::new("x".repeat(200)))
            .unwrap_err();

        assert!(matches!(err, CalendarError::Storage(_)));
        assert!(store.storage.get(CALENDAR_DATA_KEY).unwrap().is_none());
        assert!(store.get_date_data(date).exercises.is_empty());
    }

    #[test]
    fn test_day_data_uses_zero_based_month() {
        let store = setup();
        let mut record = DateRecord::empty();
        record.exercises.push(ExerciseEntry::new("Run"));

        store.save_day_data(2024, 0, 15, record).unwrap();

        let stored = store.get_date_data(day(2024, 0, 15));
        assert_eq!(stored.exercises[0].name, "Run");
        assert_eq!(store.get_day_data(2024, 0, 15), stored);
        assert!(store.get_day_data(2024, 1, 15).exercises.is_empty());
        assert!(store.load().contains_key("2024-01-15"));
    }

    #[test]
    fn test_day_data_rolls_over_out_of_range_parts() {
        let store = setup();
        let mut record = DateRecord::empty();
        record.notes = Some("new year".to_string());

        // Month 12 of 2023 is January 2024; day 0 of February is January 31.
        store.save_day_data(2023, 12, 1, record.clone()).unwrap();
        store.save_day_data(2024, 1, 0, record).unwrap();

        assert_eq!(
            store.get_day_data(2024, 0, 1).notes.as_deref(),
            Some("new year")
        );
        assert_eq!(
            store.get_date_data(day(2024, 0, 31)).notes.as_deref(),
            Some("new year")
        );
    }

    #[test]
    fn test_day_data_rejects_unrepresentable_date() {
        let store = setup();

        let err = store
            .save_day_data(i32::MAX, 0, 1, DateRecord::empty())
            .unwrap_err();

        assert!(matches!(err, CalendarError::InvalidDate { .. }));
        assert!(store.get_day_data(i32::MAX, 0, 1).exercises.is_empty());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_update_and_remove_by_index() {
        let store = setup();
        let date = day(2025, 6, 4);
        store.add_exercise(date, ExerciseEntry::new("A")).unwrap();
        store.add_exercise(date, ExerciseEntry::new("B")).unwrap();
        store.add_exercise(date, ExerciseEntry::new("C")).unwrap();

        store
            .update_exercise(date, 1, ExerciseEntry::new("B2").with_completed(true))
            .unwrap();
        let record = store.remove_exercise(date, 0).unwrap();

        let names: Vec<&str> = record.exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["B2", "C"]);
        assert!(record.exercises[0].completed);
    }

    #[test]
    fn test_out_of_range_index_is_noop_write() {
        let store = setup();
        let date = day(2025, 6, 4);
        let first = store.add_exercise(date, ExerciseEntry::new("A")).unwrap();

        let updated = store
            .update_exercise(date, 5, ExerciseEntry::new("Z"))
            .unwrap();
        let removed = store.remove_exercise(date, 9).unwrap();

        assert_eq!(updated.exercises, first.exercises);
        assert_eq!(removed.exercises, first.exercises);
        assert!(removed.updated_at >= first.updated_at);
    }

    #[test]
    fn test_update_and_remove_by_id() {
        let store = setup();
        let date = day(2025, 6, 4);
        let squat = ExerciseEntry::new("Squat");
        let squat_id = squat.id;
        store.add_exercise(date, ExerciseEntry::new("Warmup")).unwrap();
        store.add_exercise(date, squat).unwrap();

        let record = store
            .update_exercise_by_id(date, squat_id, ExerciseEntry::new("Front Squat"))
            .unwrap();
        assert_eq!(record.exercises[1].name, "Front Squat");
        assert_eq!(record.exercises[1].id, squat_id);

        // Removing the first row does not disturb the id-addressed one
        store.remove_exercise(date, 0).unwrap();
        let record = store.remove_exercise_by_id(date, squat_id).unwrap();
        assert!(record.exercises.is_empty());
    }

    #[test]
    fn test_set_completed_and_notes() {
        let store = setup();
        let date = day(2025, 2, 9);
        store.add_exercise(date, ExerciseEntry::new("Plank")).unwrap();

        store.set_exercise_completed(date, 0, true).unwrap();
        let record = store
            .set_notes(date, Some("Core day".to_string()))
            .unwrap();

        assert_eq!(record.completed_count(), 1);
        assert_eq!(record.notes.as_deref(), Some("Core day"));
    }

    #[test]
    fn test_month_data_only_includes_that_month() {
        let store = setup();
        store.add_exercise(day(2025, 1, 1), ExerciseEntry::new("Feb 1")).unwrap();
        store.add_exercise(day(2025, 1, 28), ExerciseEntry::new("Feb 28")).unwrap();
        store.add_exercise(day(2025, 2, 1), ExerciseEntry::new("Mar 1")).unwrap();

        let february = store.get_month_data(2025, 1);

        assert_eq!(february.keys().copied().collect::<Vec<_>>(), vec![1, 28]);
        assert_eq!(february[&28].exercises[0].name, "Feb 28");
    }

    #[test]
    fn test_export_import_roundtrip() {
        let store = setup();
        store.add_exercise(day(2025, 0, 5), ExerciseEntry::new("Row")).unwrap();
        store
            .set_notes(day(2025, 0, 6), Some("Rest".to_string()))
            .unwrap();
        let before = store.get_all_data();
        let exported = store.export_data().unwrap();

        let other = setup();
        assert_eq!(other.import_data(&exported).unwrap(), 2);

        assert_eq!(other.get_all_data(), before);
    }

    #[test]
    fn test_import_malformed_leaves_data_unchanged() {
        let store = setup();
        store.add_exercise(day(2025, 0, 5), ExerciseEntry::new("Row")).unwrap();
        let before = store.export_data().unwrap();

        let err = store.import_data("not json").unwrap_err();
        assert!(matches!(err, CalendarError::Format(_)));
        assert_eq!(store.export_data().unwrap(), before);
    }

    #[test]
    fn test_import_rejects_non_date_keys() {
        let store = setup();
        let payload = r#"{"someday":{"exercises":[],"createdAt":"2025-01-01T00:00:00Z","updatedAt":"2025-01-01T00:00:00Z"}}"#;

        let err = store.import_data(payload).unwrap_err();
        assert!(matches!(err, CalendarError::Format(_)));
        assert!(store.get_all_data().is_empty());
    }

    #[test]
    fn test_import_is_full_overwrite() {
        let store = setup();
        store.add_exercise(day(2025, 0, 5), ExerciseEntry::new("Old")).unwrap();

        let payload = r#"{"2025-03-01":{"exercises":[{"exercise":"New","reps":"","sets":"","weight":"","time":"","completed":true}],"createdAt":"2025-03-01T08:00:00Z","updatedAt":"2025-03-01T08:00:00Z"}}"#;
        store.import_data(payload).unwrap();

        let all = store.get_all_data();
        assert_eq!(all.len(), 1);
        assert_eq!(all["2025-03-01"].exercises[0].name, "New");
    }

    #[test]
    fn test_restore_without_backup_fails() {
        let store = setup();
        let err = store.restore_from_backup().unwrap_err();
        assert!(matches!(err, CalendarError::BackupNotFound));
    }

    #[test]
    fn test_restore_from_backup() {
        let store = setup();
        let date = day(2025, 7, 20);
        store.add_exercise(date, ExerciseEntry::new("Swim")).unwrap();

        // Corrupt the primary copy behind the store's back
        store.storage.set(CALENDAR_DATA_KEY, "{garbage").unwrap();
        assert!(store.get_date_data(date).exercises.is_empty());

        assert_eq!(store.restore_from_backup().unwrap(), 1);
        assert_eq!(store.get_date_data(date).exercises[0].name, "Swim");
    }

    #[test]
    fn test_save_refuses_to_overwrite_unreadable_data() {
        let store = setup();
        store.storage.set(CALENDAR_DATA_KEY, "{garbage").unwrap();

        let err = store
            .add_exercise(day(2025, 0, 1), ExerciseEntry::new("Squat"))
            .unwrap_err();

        assert!(matches!(err, CalendarError::Format(_)));
        assert_eq!(
            store.storage.get(CALENDAR_DATA_KEY).unwrap().as_deref(),
            Some("{garbage")
        );
    }

    #[test]
    fn test_clear_all_data_removes_backup() {
        let store = setup();
        store.add_exercise(day(2025, 0, 1), ExerciseEntry::new("Squat")).unwrap();

        store.clear_all_data().unwrap();

        assert!(store.get_all_data().is_empty());
        assert!(matches!(
            store.restore_from_backup().unwrap_err(),
            CalendarError::BackupNotFound
        ));
    }

    #[test]
    fn test_storage_info() {
        let store = setup().with_capacity(1_000);
        assert_eq!(store.get_storage_info().used, 2); // "{}"

        store.add_exercise(day(2025, 0, 1), ExerciseEntry::new("Squat")).unwrap();
        let info = store.get_storage_info();
        assert!(info.used > 2);
        assert_eq!(info.used + info.available, 1_000);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        let date = day(2025, 9, 31);

        {
            let store = CalendarStore::new(FileStore::new(temp_dir.path().to_path_buf()));
            store.add_exercise(date, ExerciseEntry::new("Hike")).unwrap();
        }

        let store = CalendarStore::new(FileStore::new(temp_dir.path().to_path_buf()));
        assert_eq!(store.get_date_data(date).exercises[0].name, "Hike");
        assert!(temp_dir.path().join("pikaworld_calendar_backup.json").exists());
    }
}
