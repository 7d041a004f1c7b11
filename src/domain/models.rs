use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Archived,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionLog {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SessionLog {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "log.id")?;
        validate_non_empty(&self.user_id, "log.user_id")?;
        validate_non_empty(&self.content, "log.content")?;
        if let Some(ended_at) = self.ended_at {
            if ended_at < self.started_at {
                return Err("log.ended_at must be >= log.started_at".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub target_sessions: u32,
    pub completed_sessions: u32,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "goal.id")?;
        validate_non_empty(&self.user_id, "goal.user_id")?;
        validate_non_empty(&self.title, "goal.title")?;
        if self.target_sessions == 0 {
            return Err("goal.target_sessions must be > 0".to_string());
        }
        if self.completed_sessions > self.target_sessions {
            return Err("goal.completed_sessions must be <= goal.target_sessions".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakData {
    pub current_days: u32,
    pub longest_days: u32,
    pub total_sessions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyReflection {
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub summary: String,
    pub highlights: Vec<String>,
    pub suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl WeeklyReflection {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "reflection.id")?;
        validate_non_empty(&self.user_id, "reflection.user_id")?;
        validate_non_empty(&self.summary, "reflection.summary")?;
        validate_date(&self.date, "reflection.date")?;
        Ok(())
    }
}

/// Policy for a reservation lookup that fails with a communication error:
/// fail-open proceeds with generation anyway, fail-closed skips the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExistencePolicy {
    FailOpen,
    FailClosed,
}

impl ExistencePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExistencePolicy::FailOpen => "fail_open",
            ExistencePolicy::FailClosed => "fail_closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionSchedule {
    pub boundary_day: Weekday,
    pub window_open_hour: u32,
    pub window_close_hour: u32,
    pub timezone: Tz,
}

impl Default for ReflectionSchedule {
    fn default() -> Self {
        Self {
            boundary_day: Weekday::Sun,
            window_open_hour: 23,
            window_close_hour: 1,
            timezone: chrono_tz::UTC,
        }
    }
}

impl ReflectionSchedule {
    pub fn validate(&self) -> Result<(), String> {
        if self.window_open_hour > 23 {
            return Err("schedule.window_open_hour must be <= 23".to_string());
        }
        if self.window_close_hour > 23 {
            return Err("schedule.window_close_hour must be <= 23".to_string());
        }
        Ok(())
    }

    /// The window straddles midnight: late hours on the boundary day and the
    /// first hours of the same local weekday both count as open.
    pub fn window_contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        if local.weekday() != self.boundary_day {
            return false;
        }
        local.hour() >= self.window_open_hour || local.hour() <= self.window_close_hour
    }

    pub fn local_date_string(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone)
            .format("%Y-%m-%d")
            .to_string()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_log() -> SessionLog {
        SessionLog {
            id: "log-1".to_string(),
            user_id: "usr-1".to_string(),
            content: "Finished the draft of the quarterly report".to_string(),
            started_at: fixed_time("2026-02-16T09:00:00Z"),
            ended_at: Some(fixed_time("2026-02-16T09:25:00Z")),
            created_at: fixed_time("2026-02-16T09:25:00Z"),
        }
    }

    fn sample_goal() -> Goal {
        Goal {
            id: "gol-1".to_string(),
            user_id: "usr-1".to_string(),
            title: "Deep work every morning".to_string(),
            target_sessions: 20,
            completed_sessions: 8,
            status: GoalStatus::Active,
            created_at: fixed_time("2026-02-01T08:00:00Z"),
        }
    }

    fn sample_reflection() -> WeeklyReflection {
        WeeklyReflection {
            id: "ref-1".to_string(),
            user_id: "usr-1".to_string(),
            date: "2026-02-22".to_string(),
            summary: "Strong focus early in the week, tapering off by Friday".to_string(),
            highlights: vec!["12 focus sessions".to_string()],
            suggestions: vec!["Guard the afternoon slot".to_string()],
            created_at: fixed_time("2026-02-22T23:10:00Z"),
        }
    }

    #[test]
    fn session_log_validate_accepts_valid_log() {
        assert!(sample_log().validate().is_ok());
    }

    #[test]
    fn session_log_validate_rejects_reverse_time() {
        let mut log = sample_log();
        log.ended_at = Some(fixed_time("2026-02-16T08:59:00Z"));
        assert!(log.validate().is_err());
    }

    #[test]
    fn goal_validate_rejects_overshoot() {
        let mut goal = sample_goal();
        goal.completed_sessions = goal.target_sessions + 1;
        assert!(goal.validate().is_err());
    }

    #[test]
    fn reflection_validate_rejects_bad_date() {
        let mut reflection = sample_reflection();
        reflection.date = "22-02-2026".to_string();
        assert!(reflection.validate().is_err());
    }

    #[test]
    fn schedule_window_requires_boundary_day() {
        let schedule = ReflectionSchedule::default();
        // 2026-02-16 is a Monday, 2026-03-01 a Sunday.
        assert!(!schedule.window_contains(fixed_time("2026-02-16T23:30:00Z")));
        assert!(schedule.window_contains(fixed_time("2026-03-01T23:30:00Z")));
        assert!(schedule.window_contains(fixed_time("2026-03-01T00:30:00Z")));
        assert!(!schedule.window_contains(fixed_time("2026-03-01T12:00:00Z")));
    }

    #[test]
    fn schedule_window_respects_timezone() {
        let schedule = ReflectionSchedule {
            timezone: chrono_tz::Asia::Tokyo,
            ..ReflectionSchedule::default()
        };
        // 14:30 UTC on Sunday is 23:30 the same Sunday in Tokyo.
        assert!(schedule.window_contains(fixed_time("2026-03-01T14:30:00Z")));
        // 23:30 UTC on Sunday is already Monday morning in Tokyo.
        assert!(!schedule.window_contains(fixed_time("2026-03-01T23:30:00Z")));
    }

    // Feature: reflection, Property 6: on the boundary day the window is open
    // exactly for the late/early hours, closed for every mid-day hour.
    proptest! {
        #[test]
        fn property6_window_open_only_around_midnight(hour in 0u32..24u32) {
            let schedule = ReflectionSchedule::default();
            let moment = fixed_time(&format!("2026-03-01T{hour:02}:15:00Z"));
            let expected = hour >= 23 || hour <= 1;
            prop_assert_eq!(schedule.window_contains(moment), expected);
        }
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let log = sample_log();
        let goal = sample_goal();
        let reflection = sample_reflection();

        let log_roundtrip: SessionLog =
            serde_json::from_str(&serde_json::to_string(&log).expect("serialize log"))
                .expect("deserialize log");
        let goal_roundtrip: Goal =
            serde_json::from_str(&serde_json::to_string(&goal).expect("serialize goal"))
                .expect("deserialize goal");
        let reflection_roundtrip: WeeklyReflection = serde_json::from_str(
            &serde_json::to_string(&reflection).expect("serialize reflection"),
        )
        .expect("deserialize reflection");

        assert_eq!(log_roundtrip, log);
        assert_eq!(goal_roundtrip, goal);
        assert_eq!(reflection_roundtrip, reflection);
    }
}
