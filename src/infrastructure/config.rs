use crate::domain::models::{ExistencePolicy, ReflectionSchedule};
use crate::infrastructure::error::InfraError;
use chrono::Weekday;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const REFLECTION_JSON: &str = "reflection.json";

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "FlowTrack",
                "timezone": "UTC",
                "backendUrl": "https://flowtrack.example.com"
            }),
        ),
        (
            REFLECTION_JSON,
            serde_json::json!({
                "schema": 1,
                "boundaryDay": "Sunday",
                "windowOpenHour": 23,
                "windowCloseHour": 1,
                "existencePolicy": "fail_open"
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_timezone(config_dir: &Path) -> Result<Option<String>, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

pub fn read_backend_url(config_dir: &Path) -> Result<Option<String>, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("backendUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

/// Builds the gate schedule from reflection.json plus the app timezone.
/// Unknown or missing fields fall back to the defaults.
pub fn read_reflection_schedule(config_dir: &Path) -> Result<ReflectionSchedule, InfraError> {
    let reflection = read_config(&config_dir.join(REFLECTION_JSON))?;
    let mut schedule = ReflectionSchedule::default();

    if let Some(day) = reflection
        .get("boundaryDay")
        .and_then(serde_json::Value::as_str)
        .and_then(parse_weekday)
    {
        schedule.boundary_day = day;
    }
    if let Some(hour) = reflection
        .get("windowOpenHour")
        .and_then(serde_json::Value::as_u64)
        .filter(|hour| *hour <= 23)
    {
        schedule.window_open_hour = hour as u32;
    }
    if let Some(hour) = reflection
        .get("windowCloseHour")
        .and_then(serde_json::Value::as_u64)
        .filter(|hour| *hour <= 23)
    {
        schedule.window_close_hour = hour as u32;
    }
    if let Some(timezone) = read_timezone(config_dir)? {
        schedule.timezone = timezone.parse().map_err(|_| {
            InfraError::InvalidConfig(format!("unknown timezone '{timezone}' in {APP_JSON}"))
        })?;
    }

    Ok(schedule)
}

pub fn read_existence_policy(config_dir: &Path) -> Result<ExistencePolicy, InfraError> {
    let reflection = read_config(&config_dir.join(REFLECTION_JSON))?;
    let policy = reflection
        .get("existencePolicy")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .map(str::to_ascii_lowercase);
    match policy.as_deref() {
        None | Some("fail_open") | Some("fail-open") => Ok(ExistencePolicy::FailOpen),
        Some("fail_closed") | Some("fail-closed") => Ok(ExistencePolicy::FailClosed),
        Some(other) => Err(InfraError::InvalidConfig(format!(
            "unsupported existence policy: {other}"
        ))),
    }
}

fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_CONFIG: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_CONFIG.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "flowtrack-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn ensure_default_configs_creates_readable_defaults() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let schedule = read_reflection_schedule(&dir.path).expect("read schedule");
        assert_eq!(schedule, ReflectionSchedule::default());
        assert_eq!(
            read_existence_policy(&dir.path).expect("read policy"),
            ExistencePolicy::FailOpen
        );
        assert_eq!(
            read_timezone(&dir.path).expect("read timezone"),
            Some("UTC".to_string())
        );
        assert!(read_backend_url(&dir.path).expect("read url").is_some());
    }

    #[test]
    fn read_reflection_schedule_applies_overrides() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            serde_json::to_string_pretty(&serde_json::json!({
                "schema": 1,
                "timezone": "Asia/Tokyo"
            }))
            .expect("serialize app config"),
        )
        .expect("write app config");
        fs::write(
            dir.path.join(REFLECTION_JSON),
            serde_json::to_string_pretty(&serde_json::json!({
                "schema": 1,
                "boundaryDay": "Friday",
                "windowOpenHour": 22,
                "windowCloseHour": 2,
                "existencePolicy": "fail_closed"
            }))
            .expect("serialize reflection config"),
        )
        .expect("write reflection config");

        let schedule = read_reflection_schedule(&dir.path).expect("read schedule");
        assert_eq!(schedule.boundary_day, Weekday::Fri);
        assert_eq!(schedule.window_open_hour, 22);
        assert_eq!(schedule.window_close_hour, 2);
        assert_eq!(schedule.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(
            read_existence_policy(&dir.path).expect("read policy"),
            ExistencePolicy::FailClosed
        );
    }

    #[test]
    fn read_config_rejects_unsupported_schema() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(REFLECTION_JSON),
            serde_json::json!({ "schema": 2 }).to_string(),
        )
        .expect("write reflection config");

        let result = read_existence_policy(&dir.path);
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }
}
