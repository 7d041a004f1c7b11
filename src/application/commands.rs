use crate::application::bootstrap::bootstrap_workspace;
use crate::application::insights::{InsightsService, LogAnalysis};
use crate::application::reflection_gate::WeeklyReflectionGate;
use crate::domain::models::{Goal, GoalStatus, SessionLog, StreakData, WeeklyReflection};
use crate::domain::streak::compute_streak;
use crate::infrastructure::activity_repository::{ActivityRepository, SqliteActivityRepository};
use crate::infrastructure::backend_client::ReqwestInsightsBackendClient;
use crate::infrastructure::config::{
    read_backend_url, read_existence_policy, read_reflection_schedule,
};
use crate::infrastructure::credential_store::{BackendCredentialStore, KeyringCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_log::JsonlEventSink;
use crate::infrastructure::reflection_repository::{
    ReflectionRepository, SqliteReflectionRepository,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const STREAK_LOOKBACK_DAYS: i64 = 365;
const REFLECTION_LOOKBACK_DAYS: i64 = 7;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    activity: Arc<SqliteActivityRepository>,
    reflections: Arc<SqliteReflectionRepository>,
    events: Arc<JsonlEventSink>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let events = Arc::new(JsonlEventSink::new(
            bootstrap.logs_dir.join("reflection-events.jsonl"),
        ));

        Ok(Self {
            activity: Arc::new(SqliteActivityRepository::new(&bootstrap.database_path)),
            reflections: Arc::new(SqliteReflectionRepository::new(&bootstrap.database_path)),
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            events,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

pub fn record_session_log_impl(
    state: &AppState,
    user_id: String,
    content: String,
    started_at: String,
    ended_at: Option<String>,
) -> Result<SessionLog, InfraError> {
    let user_id = required_field(&user_id, "user_id")?;
    let content = required_field(&content, "content")?;
    let started_at = parse_datetime_input(&started_at, "started_at")?;
    let ended_at = ended_at
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|raw| parse_datetime_input(raw, "ended_at"))
        .transpose()?;

    let log = SessionLog {
        id: next_id("log"),
        user_id,
        content,
        started_at,
        ended_at,
        created_at: Utc::now(),
    };
    log.validate().map_err(InfraError::InvalidConfig)?;
    state.activity.insert_log(&log)?;

    state.log_info(
        "record_session_log",
        &format!("recorded log_id={} user_id={}", log.id, log.user_id),
    );
    Ok(log)
}

pub fn list_session_logs_impl(
    state: &AppState,
    user_id: String,
    start: Option<String>,
    end: Option<String>,
) -> Result<Vec<SessionLog>, InfraError> {
    let user_id = required_field(&user_id, "user_id")?;
    let end = match end {
        Some(raw) => parse_datetime_input(&raw, "end")?,
        None => Utc::now(),
    };
    let start = match start {
        Some(raw) => parse_datetime_input(&raw, "start")?,
        None => end - Duration::days(REFLECTION_LOOKBACK_DAYS),
    };
    if end <= start {
        return Err(InfraError::InvalidConfig(
            "end must be greater than start".to_string(),
        ));
    }

    state.activity.list_logs_between(&user_id, start, end)
}

pub fn create_goal_impl(
    state: &AppState,
    user_id: String,
    title: String,
    target_sessions: u32,
) -> Result<Goal, InfraError> {
    let user_id = required_field(&user_id, "user_id")?;
    let title = required_field(&title, "title")?;

    let goal = Goal {
        id: next_id("gol"),
        user_id,
        title,
        target_sessions,
        completed_sessions: 0,
        status: GoalStatus::Active,
        created_at: Utc::now(),
    };
    goal.validate().map_err(InfraError::InvalidConfig)?;
    state.activity.upsert_goal(&goal)?;

    state.log_info("create_goal", &format!("created goal_id={}", goal.id));
    Ok(goal)
}

pub fn update_goal_progress_impl(
    state: &AppState,
    goal_id: String,
    completed_sessions: Option<u32>,
    status: Option<String>,
) -> Result<Goal, InfraError> {
    let goal_id = required_field(&goal_id, "goal_id")?;
    let mut goal = state
        .activity
        .find_goal(&goal_id)?
        .ok_or_else(|| InfraError::InvalidConfig(format!("goal not found: {goal_id}")))?;

    if let Some(completed) = completed_sessions {
        goal.completed_sessions = completed;
    }
    if let Some(status) = status {
        goal.status = parse_goal_status_input(&status)?;
    }
    if goal.completed_sessions >= goal.target_sessions && goal.status == GoalStatus::Active {
        goal.status = GoalStatus::Completed;
    }

    goal.validate().map_err(InfraError::InvalidConfig)?;
    state.activity.upsert_goal(&goal)?;

    state.log_info(
        "update_goal_progress",
        &format!(
            "updated goal_id={goal_id} completed={} status={}",
            goal.completed_sessions,
            goal.status.as_str()
        ),
    );
    Ok(goal)
}

pub fn list_goals_impl(state: &AppState, user_id: String) -> Result<Vec<Goal>, InfraError> {
    let user_id = required_field(&user_id, "user_id")?;
    state.activity.list_goals(&user_id)
}

pub fn delete_goal_impl(state: &AppState, goal_id: String) -> Result<bool, InfraError> {
    let goal_id = required_field(&goal_id, "goal_id")?;
    let deleted = state.activity.delete_goal(&goal_id)?;
    if deleted {
        state.log_info("delete_goal", &format!("deleted goal_id={goal_id}"));
    }
    Ok(deleted)
}

pub fn get_streak_impl(state: &AppState, user_id: String) -> Result<StreakData, InfraError> {
    let user_id = required_field(&user_id, "user_id")?;
    let schedule = read_reflection_schedule(state.config_dir())?;

    let now = Utc::now();
    let logs = state.activity.list_logs_between(
        &user_id,
        now - Duration::days(STREAK_LOOKBACK_DAYS),
        now,
    )?;

    let session_days = logs
        .iter()
        .map(|log| log.started_at.with_timezone(&schedule.timezone).date_naive())
        .collect::<Vec<_>>();
    let today = now.with_timezone(&schedule.timezone).date_naive();
    Ok(compute_streak(&session_days, today))
}

pub fn get_reflection_impl(
    state: &AppState,
    user_id: String,
    date: String,
) -> Result<Option<WeeklyReflection>, InfraError> {
    let user_id = required_field(&user_id, "user_id")?;
    let date = required_field(&date, "date")?;
    NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| InfraError::InvalidConfig("date must be YYYY-MM-DD".to_string()))?;

    state.reflections.find_for_date(&user_id, &date)
}

pub async fn analyze_log_impl(
    state: &AppState,
    access_token: String,
    log_content: String,
) -> Result<LogAnalysis, InfraError> {
    let access_token = required_field(&access_token, "access_token")?;
    let log_content = required_field(&log_content, "log_content")?;

    let backend = Arc::new(backend_client(state.config_dir())?);
    let service = InsightsService::new(backend);
    let analysis = service.analyze_log(&access_token, &log_content).await?;

    state.log_info(
        "analyze_log",
        &format!("analyzed log into {} sections", analysis.sections.len()),
    );
    Ok(analysis)
}

pub async fn check_weekly_reflection_impl(
    state: &AppState,
    user_id: String,
    access_token: String,
) -> Result<Option<WeeklyReflection>, InfraError> {
    let user_id = required_field(&user_id, "user_id")?;
    let access_token = required_field(&access_token, "access_token")?;

    let schedule = read_reflection_schedule(state.config_dir())?;
    let existence_policy = read_existence_policy(state.config_dir())?;
    let backend = Arc::new(backend_client(state.config_dir())?);

    let now = Utc::now();
    let logs = state.activity.list_logs_between(
        &user_id,
        now - Duration::days(REFLECTION_LOOKBACK_DAYS),
        now,
    )?;
    let goals = state.activity.list_goals(&user_id)?;
    let streak = {
        let session_days = logs
            .iter()
            .map(|log| log.started_at.with_timezone(&schedule.timezone).date_naive())
            .collect::<Vec<_>>();
        let today = now.with_timezone(&schedule.timezone).date_naive();
        compute_streak(&session_days, today)
    };

    let gate = WeeklyReflectionGate::new(
        backend,
        Arc::clone(&state.reflections),
        Arc::clone(&state.events),
    )
    .with_schedule(schedule)
    .with_existence_policy(existence_policy);

    let reflection = gate
        .check_and_generate(&access_token, &user_id, &logs, &goals, &streak)
        .await;

    match &reflection {
        Some(generated) => state.log_info(
            "check_weekly_reflection",
            &format!("generated reflection for user_id={user_id} date={}", generated.date),
        ),
        None => state.log_info(
            "check_weekly_reflection",
            &format!("no reflection generated for user_id={user_id}"),
        ),
    }
    Ok(reflection)
}

pub fn save_access_token_impl(state: &AppState, access_token: String) -> Result<(), InfraError> {
    let store = KeyringCredentialStore::default();
    store.save_access_token(&access_token)?;
    state.log_info("save_access_token", "stored backend access token");
    Ok(())
}

pub fn clear_access_token_impl(state: &AppState) -> Result<(), InfraError> {
    let store = KeyringCredentialStore::default();
    store.delete_access_token()?;
    state.log_info("clear_access_token", "removed backend access token");
    Ok(())
}

fn backend_client(config_dir: &Path) -> Result<ReqwestInsightsBackendClient, InfraError> {
    let base_url = read_backend_url(config_dir)?.ok_or_else(|| {
        InfraError::InvalidConfig("backendUrl is not configured in app.json".to_string())
    })?;
    ReqwestInsightsBackendClient::new(&base_url)
}

fn required_field(value: &str, field_name: &str) -> Result<String, InfraError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InfraError::InvalidConfig(format!(
            "{field_name} must not be empty"
        )));
    }
    Ok(value.to_string())
}

fn parse_goal_status_input(value: &str) -> Result<GoalStatus, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "active" => Ok(GoalStatus::Active),
        "completed" => Ok(GoalStatus::Completed),
        "archived" => Ok(GoalStatus::Archived),
        other => Err(InfraError::InvalidConfig(format!(
            "unsupported goal status: {other}"
        ))),
    }
}

fn parse_datetime_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(InfraError::InvalidConfig(format!(
        "{field_name} must be RFC3339 or YYYY-MM-DD"
    )))
}
