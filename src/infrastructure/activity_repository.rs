use crate::domain::models::{Goal, GoalStatus, SessionLog};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage boundary for session logs and goals.
pub trait ActivityRepository: Send + Sync {
    fn insert_log(&self, log: &SessionLog) -> Result<(), InfraError>;
    fn list_logs_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SessionLog>, InfraError>;
    fn upsert_goal(&self, goal: &Goal) -> Result<(), InfraError>;
    fn find_goal(&self, goal_id: &str) -> Result<Option<Goal>, InfraError>;
    fn list_goals(&self, user_id: &str) -> Result<Vec<Goal>, InfraError>;
    fn delete_goal(&self, goal_id: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteActivityRepository {
    db_path: PathBuf,
}

impl SqliteActivityRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl ActivityRepository for SqliteActivityRepository {
    fn insert_log(&self, log: &SessionLog) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO session_logs (id, user_id, content, started_at, ended_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log.id,
                log.user_id,
                log.content,
                log.started_at.to_rfc3339(),
                log.ended_at.map(|value| value.to_rfc3339()),
                log.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn list_logs_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SessionLog>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, content, started_at, ended_at, created_at
             FROM session_logs
             WHERE user_id = ?1 AND started_at >= ?2 AND started_at <= ?3
             ORDER BY started_at",
        )?;
        let rows = statement.query_map(
            params![user_id, start.to_rfc3339(), end.to_rfc3339()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;

        let mut logs = Vec::new();
        for row in rows {
            let (id, content, started_at_raw, ended_at_raw, created_at_raw) = row?;
            logs.push(SessionLog {
                id,
                user_id: user_id.to_string(),
                content,
                started_at: parse_rfc3339(&started_at_raw, "session_logs.started_at")?,
                ended_at: ended_at_raw
                    .map(|raw| parse_rfc3339(&raw, "session_logs.ended_at"))
                    .transpose()?,
                created_at: parse_rfc3339(&created_at_raw, "session_logs.created_at")?,
            });
        }
        Ok(logs)
    }

    fn upsert_goal(&self, goal: &Goal) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO goals (id, user_id, title, target_sessions, completed_sessions, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
               title = excluded.title,
               target_sessions = excluded.target_sessions,
               completed_sessions = excluded.completed_sessions,
               status = excluded.status",
            params![
                goal.id,
                goal.user_id,
                goal.title,
                goal.target_sessions,
                goal.completed_sessions,
                goal.status.as_str(),
                goal.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn find_goal(&self, goal_id: &str) -> Result<Option<Goal>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(String, String, u32, u32, String, String)> = connection
            .query_row(
                "SELECT user_id, title, target_sessions, completed_sessions, status, created_at
                 FROM goals WHERE id = ?1",
                params![goal_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, title, target_sessions, completed_sessions, status_raw, created_at_raw)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(Goal {
            id: goal_id.to_string(),
            user_id,
            title,
            target_sessions,
            completed_sessions,
            status: parse_goal_status(&status_raw)?,
            created_at: parse_rfc3339(&created_at_raw, "goals.created_at")?,
        }))
    }

    fn list_goals(&self, user_id: &str) -> Result<Vec<Goal>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, title, target_sessions, completed_sessions, status, created_at
             FROM goals WHERE user_id = ?1 ORDER BY created_at",
        )?;
        let rows = statement.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut goals = Vec::new();
        for row in rows {
            let (id, title, target_sessions, completed_sessions, status_raw, created_at_raw) = row?;
            goals.push(Goal {
                id,
                user_id: user_id.to_string(),
                title,
                target_sessions,
                completed_sessions,
                status: parse_goal_status(&status_raw)?,
                created_at: parse_rfc3339(&created_at_raw, "goals.created_at")?,
            });
        }
        Ok(goals)
    }

    fn delete_goal(&self, goal_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let deleted = connection.execute("DELETE FROM goals WHERE id = ?1", params![goal_id])?;
        Ok(deleted > 0)
    }
}

fn parse_goal_status(value: &str) -> Result<GoalStatus, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "active" => Ok(GoalStatus::Active),
        "completed" => Ok(GoalStatus::Completed),
        "archived" => Ok(GoalStatus::Archived),
        other => Err(InfraError::InvalidConfig(format!(
            "unsupported goal status: {other}"
        ))),
    }
}

fn parse_rfc3339(raw: &str, column: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| InfraError::InvalidConfig(format!("invalid {column} '{raw}': {error}")))
}

#[derive(Debug, Default)]
pub struct InMemoryActivityRepository {
    logs: Mutex<Vec<SessionLog>>,
    goals: Mutex<HashMap<String, Goal>>,
}

impl ActivityRepository for InMemoryActivityRepository {
    fn insert_log(&self, log: &SessionLog) -> Result<(), InfraError> {
        let mut logs = self.logs.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("activity logs lock poisoned: {error}"))
        })?;
        logs.push(log.clone());
        Ok(())
    }

    fn list_logs_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SessionLog>, InfraError> {
        let logs = self.logs.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("activity logs lock poisoned: {error}"))
        })?;
        let mut selected = logs
            .iter()
            .filter(|log| {
                log.user_id == user_id && log.started_at >= start && log.started_at <= end
            })
            .cloned()
            .collect::<Vec<_>>();
        selected.sort_by_key(|log| log.started_at);
        Ok(selected)
    }

    fn upsert_goal(&self, goal: &Goal) -> Result<(), InfraError> {
        let mut goals = self.goals.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("activity goals lock poisoned: {error}"))
        })?;
        goals.insert(goal.id.clone(), goal.clone());
        Ok(())
    }

    fn find_goal(&self, goal_id: &str) -> Result<Option<Goal>, InfraError> {
        let goals = self.goals.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("activity goals lock poisoned: {error}"))
        })?;
        Ok(goals.get(goal_id).cloned())
    }

    fn list_goals(&self, user_id: &str) -> Result<Vec<Goal>, InfraError> {
        let goals = self.goals.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("activity goals lock poisoned: {error}"))
        })?;
        let mut selected = goals
            .values()
            .filter(|goal| goal.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        selected.sort_by_key(|goal| goal.created_at);
        Ok(selected)
    }

    fn delete_goal(&self, goal_id: &str) -> Result<bool, InfraError> {
        let mut goals = self.goals.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("activity goals lock poisoned: {error}"))
        })?;
        Ok(goals.remove(goal_id).is_some())
    }
}
