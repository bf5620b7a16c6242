use crate::domain::schedule::SyncStrategy;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const CALENDARS_JSON: &str = "calendars.json";
const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";
const DEFAULT_CALENDAR_ID: &str = "primary";
const DEFAULT_OWNER_TAG: &str = "ops_agent";
const DEFAULT_MAX_CONTEXT_TASKS: u64 = 40;
const DEFAULT_Q1_OVERLOAD_THRESHOLD: u64 = 5;
const DEFAULT_SYNC_TIMEOUT_SECONDS: u64 = 60;
const ACCESS_TOKEN_KEYS: [&str; 2] = ["DAYOPS_GOOGLE_ACCESS_TOKEN", "GOOGLE_ACCESS_TOKEN"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSettings {
    pub calendar_id: String,
    pub strategy: SyncStrategy,
    pub owner_tag: String,
    pub sync_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningSettings {
    pub max_context_tasks: usize,
    pub q1_overload_threshold: usize,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "DayOps",
                "timezone": DEFAULT_TIMEZONE,
                "maxContextTasks": DEFAULT_MAX_CONTEXT_TASKS,
                "q1OverloadThreshold": DEFAULT_Q1_OVERLOAD_THRESHOLD
            }),
        ),
        (
            CALENDARS_JSON,
            serde_json::json!({
                "schema": 1,
                "calendarId": DEFAULT_CALENDAR_ID,
                "syncStrategy": "clean_slate",
                "pruneMissing": false,
                "ownerTag": DEFAULT_OWNER_TAG,
                "syncTimeoutSeconds": DEFAULT_SYNC_TIMEOUT_SECONDS
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

/// Reads every setting once so a broken config fails at startup rather than
/// mid-command.
pub fn validate_configs(config_dir: &Path) -> Result<(), InfraError> {
    read_timezone(config_dir)?;
    read_planning_settings(config_dir)?;
    read_calendar_settings(config_dir)?;
    Ok(())
}

fn non_empty_str<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn parse_timezone(name: &str) -> Result<Tz, InfraError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid timezone '{name}': {error}")))
}

pub fn read_timezone(config_dir: &Path) -> Result<Tz, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    parse_timezone(non_empty_str(&app, "timezone").unwrap_or(DEFAULT_TIMEZONE))
}

pub fn read_planning_settings(config_dir: &Path) -> Result<PlanningSettings, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let max_context_tasks = app
        .get("maxContextTasks")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(DEFAULT_MAX_CONTEXT_TASKS)
        .max(1);
    let q1_overload_threshold = app
        .get("q1OverloadThreshold")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(DEFAULT_Q1_OVERLOAD_THRESHOLD);
    Ok(PlanningSettings {
        max_context_tasks: max_context_tasks as usize,
        q1_overload_threshold: q1_overload_threshold as usize,
    })
}

pub fn read_calendar_settings(config_dir: &Path) -> Result<CalendarSettings, InfraError> {
    let path = config_dir.join(CALENDARS_JSON);
    let calendars = read_config(&path)?;
    let prune = calendars
        .get("pruneMissing")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    let strategy = SyncStrategy::parse(
        non_empty_str(&calendars, "syncStrategy").unwrap_or("clean_slate"),
        prune,
    )
    .map_err(|message| InfraError::InvalidConfig(format!("{message} in {}", path.display())))?;

    Ok(CalendarSettings {
        calendar_id: non_empty_str(&calendars, "calendarId")
            .unwrap_or(DEFAULT_CALENDAR_ID)
            .to_string(),
        strategy,
        owner_tag: non_empty_str(&calendars, "ownerTag")
            .unwrap_or(DEFAULT_OWNER_TAG)
            .to_string(),
        sync_timeout_seconds: calendars
            .get("syncTimeoutSeconds")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(DEFAULT_SYNC_TIMEOUT_SECONDS)
            .max(1),
    })
}

pub fn load_access_token_from_env() -> Result<String, InfraError> {
    load_access_token_from_lookup(|key| std::env::var(key).ok())
}

pub fn load_access_token_from_lookup<F>(lookup: F) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    for key in ACCESS_TOKEN_KEYS {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Ok(normalized.to_string());
            }
        }
    }
    Err(InfraError::InvalidConfig(format!(
        "missing google access token (set one of: {})",
        ACCESS_TOKEN_KEYS.join(", ")
    )))
}
