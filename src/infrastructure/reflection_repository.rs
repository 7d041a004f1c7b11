use crate::domain::models::WeeklyReflection;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotReservation {
    Reserved,
    AlreadyTaken,
}

/// Storage boundary for weekly reflections. `reserve` claims the (user, date)
/// slot atomically so two concurrent gate runs cannot both generate; `release`
/// gives the slot back when the run fails before a reflection is persisted.
pub trait ReflectionRepository: Send + Sync {
    fn reserve(&self, user_id: &str, date: &str) -> Result<SlotReservation, InfraError>;
    fn release(&self, user_id: &str, date: &str) -> Result<(), InfraError>;
    fn save(&self, reflection: &WeeklyReflection) -> Result<(), InfraError>;
    fn find_for_date(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<WeeklyReflection>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteReflectionRepository {
    db_path: PathBuf,
}

impl SqliteReflectionRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl ReflectionRepository for SqliteReflectionRepository {
    fn reserve(&self, user_id: &str, date: &str) -> Result<SlotReservation, InfraError> {
        let connection = self.connect()?;
        let inserted = connection.execute(
            "INSERT INTO reflection_slots (user_id, date, reserved_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, date) DO NOTHING",
            params![user_id, date, Utc::now().to_rfc3339()],
        )?;
        if inserted == 0 {
            Ok(SlotReservation::AlreadyTaken)
        } else {
            Ok(SlotReservation::Reserved)
        }
    }

    fn release(&self, user_id: &str, date: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "DELETE FROM reflection_slots WHERE user_id = ?1 AND date = ?2",
            params![user_id, date],
        )?;
        Ok(())
    }

    fn save(&self, reflection: &WeeklyReflection) -> Result<(), InfraError> {
        let highlights = serde_json::to_string(&reflection.highlights)?;
        let suggestions = serde_json::to_string(&reflection.suggestions)?;

        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO reflections (id, user_id, date, summary, highlights, suggestions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id, date) DO UPDATE SET
               summary = excluded.summary,
               highlights = excluded.highlights,
               suggestions = excluded.suggestions,
               created_at = excluded.created_at",
            params![
                reflection.id,
                reflection.user_id,
                reflection.date,
                reflection.summary,
                highlights,
                suggestions,
                reflection.created_at.to_rfc3339()
            ],
        )?;
        // A saved reflection also occupies its slot so later reservations fail.
        connection.execute(
            "INSERT INTO reflection_slots (user_id, date, reserved_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, date) DO NOTHING",
            params![
                reflection.user_id,
                reflection.date,
                reflection.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn find_for_date(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<WeeklyReflection>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(String, String, String, String, String)> = connection
            .query_row(
                "SELECT id, summary, highlights, suggestions, created_at
                 FROM reflections WHERE user_id = ?1 AND date = ?2",
                params![user_id, date],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, summary, highlights_raw, suggestions_raw, created_at_raw)) = row else {
            return Ok(None);
        };

        let created_at = parse_rfc3339(&created_at_raw, "reflections.created_at")?;
        Ok(Some(WeeklyReflection {
            id,
            user_id: user_id.to_string(),
            date: date.to_string(),
            summary,
            highlights: serde_json::from_str(&highlights_raw)?,
            suggestions: serde_json::from_str(&suggestions_raw)?,
            created_at,
        }))
    }
}

fn parse_rfc3339(raw: &str, column: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| InfraError::InvalidConfig(format!("invalid {column} '{raw}': {error}")))
}

#[derive(Debug, Default)]
pub struct InMemoryReflectionRepository {
    slots: Mutex<HashSet<(String, String)>>,
    saved: Mutex<HashMap<(String, String), WeeklyReflection>>,
}

impl ReflectionRepository for InMemoryReflectionRepository {
    fn reserve(&self, user_id: &str, date: &str) -> Result<SlotReservation, InfraError> {
        let mut slots = self.slots.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("reflection slots lock poisoned: {error}"))
        })?;
        if slots.insert((user_id.to_string(), date.to_string())) {
            Ok(SlotReservation::Reserved)
        } else {
            Ok(SlotReservation::AlreadyTaken)
        }
    }

    fn release(&self, user_id: &str, date: &str) -> Result<(), InfraError> {
        let mut slots = self.slots.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("reflection slots lock poisoned: {error}"))
        })?;
        slots.remove(&(user_id.to_string(), date.to_string()));
        Ok(())
    }

    fn save(&self, reflection: &WeeklyReflection) -> Result<(), InfraError> {
        let key = (reflection.user_id.clone(), reflection.date.clone());
        {
            let mut slots = self.slots.lock().map_err(|error| {
                InfraError::InvalidConfig(format!("reflection slots lock poisoned: {error}"))
            })?;
            slots.insert(key.clone());
        }
        let mut saved = self.saved.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("reflection store lock poisoned: {error}"))
        })?;
        saved.insert(key, reflection.clone());
        Ok(())
    }

    fn find_for_date(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<WeeklyReflection>, InfraError> {
        let saved = self.saved.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("reflection store lock poisoned: {error}"))
        })?;
        Ok(saved
            .get(&(user_id.to_string(), date.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DB: AtomicUsize = AtomicUsize::new(0);

    struct TempDatabase {
        path: PathBuf,
    }

    impl TempDatabase {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DB.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "flowtrack-reflection-repo-{}-{}.sqlite",
                std::process::id(),
                sequence
            ));
            let _ = fs::remove_file(&path);
            initialize_database(&path).expect("initialize database");
            Self { path }
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }

    fn sample_reflection() -> WeeklyReflection {
        WeeklyReflection {
            id: "ref-1".to_string(),
            user_id: "usr-1".to_string(),
            date: "2026-03-01".to_string(),
            summary: "Consistent mornings, noisy afternoons".to_string(),
            highlights: vec!["9 focus sessions".to_string(), "streak kept".to_string()],
            suggestions: vec!["Batch the admin work".to_string()],
            created_at: DateTime::parse_from_rfc3339("2026-03-01T23:30:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn sqlite_reserve_claims_slot_exactly_once() {
        let database = TempDatabase::new();
        let repository = SqliteReflectionRepository::new(&database.path);

        assert_eq!(
            repository.reserve("usr-1", "2026-03-01").expect("reserve"),
            SlotReservation::Reserved
        );
        assert_eq!(
            repository.reserve("usr-1", "2026-03-01").expect("reserve"),
            SlotReservation::AlreadyTaken
        );
        // Other users and dates are unaffected.
        assert_eq!(
            repository.reserve("usr-2", "2026-03-01").expect("reserve"),
            SlotReservation::Reserved
        );
        assert_eq!(
            repository.reserve("usr-1", "2026-03-08").expect("reserve"),
            SlotReservation::Reserved
        );
    }

    #[test]
    fn sqlite_release_reopens_the_slot() {
        let database = TempDatabase::new();
        let repository = SqliteReflectionRepository::new(&database.path);

        assert_eq!(
            repository.reserve("usr-1", "2026-03-01").expect("reserve"),
            SlotReservation::Reserved
        );
        repository.release("usr-1", "2026-03-01").expect("release");
        assert_eq!(
            repository.reserve("usr-1", "2026-03-01").expect("re-reserve"),
            SlotReservation::Reserved
        );

        // Releasing a slot that was never claimed is a no-op.
        repository.release("usr-2", "2026-03-01").expect("release");
    }

    #[test]
    fn sqlite_save_and_find_roundtrip() {
        let database = TempDatabase::new();
        let repository = SqliteReflectionRepository::new(&database.path);
        let reflection = sample_reflection();

        repository.save(&reflection).expect("save reflection");
        let loaded = repository
            .find_for_date("usr-1", "2026-03-01")
            .expect("find reflection")
            .expect("reflection exists");
        assert_eq!(loaded, reflection);

        assert!(
            repository
                .find_for_date("usr-1", "2026-03-08")
                .expect("find missing")
                .is_none()
        );
    }

    #[test]
    fn sqlite_save_occupies_the_slot() {
        let database = TempDatabase::new();
        let repository = SqliteReflectionRepository::new(&database.path);

        repository.save(&sample_reflection()).expect("save");
        assert_eq!(
            repository.reserve("usr-1", "2026-03-01").expect("reserve"),
            SlotReservation::AlreadyTaken
        );
    }

    #[test]
    fn in_memory_repository_matches_sqlite_semantics() {
        let repository = InMemoryReflectionRepository::default();
        assert_eq!(
            repository.reserve("usr-1", "2026-03-01").expect("reserve"),
            SlotReservation::Reserved
        );
        assert_eq!(
            repository.reserve("usr-1", "2026-03-01").expect("reserve"),
            SlotReservation::AlreadyTaken
        );
        repository.release("usr-1", "2026-03-01").expect("release");
        assert_eq!(
            repository.reserve("usr-1", "2026-03-01").expect("re-reserve"),
            SlotReservation::Reserved
        );

        let reflection = sample_reflection();
        repository.save(&reflection).expect("save");
        assert_eq!(
            repository
                .find_for_date("usr-1", "2026-03-01")
                .expect("find"),
            Some(reflection)
        );
    }
}
