use crate::application::bootstrap::bootstrap_workspace;
use crate::application::calendar_reconcile::{sync_items_from_plan, sync_items_from_tasks, CalendarReconciler};
use crate::application::plan_parser::parse_plan;
use crate::application::planning_context::{build_context, check_identity_overload};
use crate::application::rollover::{new_task_id, RolloverEngine, RolloverOutcome};
use crate::domain::models::{normalize_distraction, Distraction, Period, Quadrant, Task, TaskStatus};
use crate::domain::schedule::{ScheduledItem, SyncItem, SyncStrategy, SyncSummary};
use crate::infrastructure::calendar_gateway::{CalendarGateway, GoogleCalendarGateway};
use crate::infrastructure::config::{
    load_access_token_from_env, read_calendar_settings, read_planning_settings, read_timezone,
};
use crate::infrastructure::distraction_repository::{DistractionRepository, SqliteDistractionRepository};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::Ownership;
use crate::infrastructure::task_repository::{SqliteTaskRepository, TaskRepository};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
type DayLock = Arc<tokio::sync::Mutex<()>>;

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    sync_locks: Mutex<HashMap<NaiveDate, DayLock>>,
    now_provider: NowProvider,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Ok(Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            sync_locks: Mutex::new(HashMap::new()),
            now_provider: Arc::new(Utc::now),
        })
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        error!(command, %error, "command failed");
        error.to_string()
    }

    fn repository(&self) -> Arc<SqliteTaskRepository> {
        Arc::new(SqliteTaskRepository::new(&self.database_path))
    }

    fn distractions(&self) -> SqliteDistractionRepository {
        SqliteDistractionRepository::new(&self.database_path)
    }

    fn rollover_engine(&self) -> RolloverEngine<SqliteTaskRepository> {
        RolloverEngine::new(self.repository()).with_now_provider(Arc::clone(&self.now_provider))
    }

    /// One async mutex per day; a second sync for the same day waits for the
    /// first to finish instead of interleaving with it.
    fn day_lock(&self, day: NaiveDate) -> Result<DayLock, InfraError> {
        let mut locks = self
            .sync_locks
            .lock()
            .map_err(|error| InfraError::Lock(format!("sync lock table poisoned: {error}")))?;
        Ok(Arc::clone(locks.entry(day).or_default()))
    }

    fn resolve_day(&self, date: Option<&str>) -> Result<NaiveDate, InfraError> {
        match date.map(str::trim).filter(|value| !value.is_empty()) {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|error| {
                InfraError::InvalidInput(format!("date must be YYYY-MM-DD, got '{raw}': {error}"))
            }),
            None => {
                let timezone = read_timezone(&self.config_dir)?;
                Ok((self.now_provider)().with_timezone(&timezone).date_naive())
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub notes: Option<String>,
    pub quadrant: Option<String>,
    pub period: Option<String>,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub quadrant: Option<String>,
    pub period: Option<String>,
    pub status: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListResponse {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carried_from: Option<NaiveDate>,
    pub dropped: usize,
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub overload_warning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanningContextResponse {
    pub date: NaiveDate,
    pub context: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub overload_warning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistractionInboxResponse {
    pub pending: usize,
    pub distractions: Vec<Distraction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearDistractionsResponse {
    pub processed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncPlanResponse {
    pub items: Vec<ScheduledItem>,
    pub summary: SyncSummary,
}

pub fn list_tasks_impl(state: &AppState, date: Option<String>) -> Result<TaskListResponse, InfraError> {
    let day = state.resolve_day(date.as_deref())?;
    let planning = read_planning_settings(state.config_dir())?;
    let outcome = state.rollover_engine().tasks_for_date(day)?;

    let (carried_from, dropped) = match &outcome {
        RolloverOutcome::CarriedForward {
            source_day, dropped, ..
        } => (Some(*source_day), *dropped),
        _ => (None, 0),
    };
    let tasks = outcome.into_tasks();
    Ok(TaskListResponse {
        date: day,
        carried_from,
        dropped,
        overload_warning: check_identity_overload(&tasks, planning.q1_overload_threshold),
        tasks,
    })
}

pub fn create_task_impl(
    state: &AppState,
    date: Option<String>,
    draft: TaskDraft,
) -> Result<Task, InfraError> {
    let day = state.resolve_day(date.as_deref())?;
    let mut task = Task::new(new_task_id(), &draft.title, (state.now_provider)())
        .map_err(InfraError::InvalidInput)?;
    if let Some(notes) = draft.notes {
        task.notes = notes.trim().to_string();
    }
    if let Some(quadrant) = draft.quadrant {
        task.quadrant = parse_field::<Quadrant>(&quadrant)?;
    }
    if let Some(period) = draft.period {
        task.period = parse_field::<Period>(&period)?;
    }
    task.is_recurring = draft.is_recurring;

    // Roll over first so the new task does not mask an unseeded day.
    let mut tasks = state.rollover_engine().tasks_for_date(day)?.into_tasks();
    tasks.push(task.clone());
    save_day(state, day, &tasks)?;

    info!(%day, task_id = %task.id, "created task");
    Ok(task)
}

pub fn update_task_impl(
    state: &AppState,
    date: Option<String>,
    task_id: String,
    patch: TaskPatch,
) -> Result<Task, InfraError> {
    let day = state.resolve_day(date.as_deref())?;
    let task_id = required_task_id(&task_id)?;
    let mut tasks = state.rollover_engine().tasks_for_date(day)?.into_tasks();
    let Some(task) = tasks.iter_mut().find(|task| task.id == task_id) else {
        return Err(InfraError::InvalidInput(format!("task not found on {day}: {task_id}")));
    };

    if let Some(title) = patch.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(InfraError::InvalidInput("title must not be empty".to_string()));
        }
        task.title = title.to_string();
    }
    if let Some(notes) = patch.notes {
        task.notes = notes.trim().to_string();
    }
    if let Some(quadrant) = patch.quadrant {
        task.quadrant = parse_field::<Quadrant>(&quadrant)?;
    }
    if let Some(period) = patch.period {
        task.period = parse_field::<Period>(&period)?;
    }
    if let Some(active) = patch.active {
        task.active = active;
    }
    if let Some(status) = patch.status {
        task.set_status(parse_field::<TaskStatus>(&status)?);
    }

    let updated = task.clone();
    save_day(state, day, &tasks)?;
    info!(%day, %task_id, status = %updated.status, "updated task");
    Ok(updated)
}

pub fn delete_task_impl(state: &AppState, date: Option<String>, task_id: String) -> Result<bool, InfraError> {
    let day = state.resolve_day(date.as_deref())?;
    let task_id = required_task_id(&task_id)?;
    let mut tasks = state.rollover_engine().tasks_for_date(day)?.into_tasks();
    let before = tasks.len();
    tasks.retain(|task| task.id != task_id);
    if tasks.len() == before {
        return Ok(false);
    }
    save_day(state, day, &tasks)?;
    info!(%day, %task_id, "deleted task");
    Ok(true)
}

pub fn capture_distraction_impl(
    state: &AppState,
    date: Option<String>,
    content: String,
) -> Result<Distraction, InfraError> {
    let day = state.resolve_day(date.as_deref())?;
    let content = normalize_distraction(&content).map_err(InfraError::InvalidInput)?;
    let distraction = state.distractions().add(day, &content, (state.now_provider)())?;
    info!(%day, id = distraction.id, "captured distraction");
    Ok(distraction)
}

pub fn list_distractions_impl(state: &AppState) -> Result<DistractionInboxResponse, InfraError> {
    let distractions = state.distractions().list_unprocessed()?;
    Ok(DistractionInboxResponse {
        pending: distractions.len(),
        distractions,
    })
}

/// End-of-day review: everything pending is marked processed.
pub fn clear_distractions_impl(state: &AppState) -> Result<ClearDistractionsResponse, InfraError> {
    let processed = state.distractions().mark_all_processed()?;
    info!(processed, "cleared distraction inbox");
    Ok(ClearDistractionsResponse { processed })
}

pub fn parse_plan_impl(text: &str) -> Vec<ScheduledItem> {
    parse_plan(text)
}

pub fn planning_context_impl(
    state: &AppState,
    date: Option<String>,
    last_plan: Option<String>,
) -> Result<PlanningContextResponse, InfraError> {
    let day = state.resolve_day(date.as_deref())?;
    let timezone = read_timezone(state.config_dir())?;
    let planning = read_planning_settings(state.config_dir())?;
    let tasks = state.rollover_engine().tasks_for_date(day)?.into_tasks();
    let now = (state.now_provider)().with_timezone(&timezone);

    Ok(PlanningContextResponse {
        date: day,
        context: build_context(&tasks, last_plan.as_deref(), now, planning.max_context_tasks),
        overload_warning: check_identity_overload(&tasks, planning.q1_overload_threshold),
    })
}

pub async fn sync_plan_impl<G>(
    state: &AppState,
    gateway: Arc<G>,
    plan_text: &str,
    date: Option<String>,
    strategy: Option<SyncStrategy>,
) -> Result<SyncPlanResponse, InfraError>
where
    G: CalendarGateway,
{
    let day = state.resolve_day(date.as_deref())?;
    let items = parse_plan(plan_text);
    let sync_items = sync_items_from_plan(day, &items);
    let summary = run_sync(state, gateway, day, &sync_items, strategy).await?;
    Ok(SyncPlanResponse { items, summary })
}

pub async fn sync_tasks_impl<G>(
    state: &AppState,
    gateway: Arc<G>,
    date: Option<String>,
    strategy: Option<SyncStrategy>,
) -> Result<SyncSummary, InfraError>
where
    G: CalendarGateway,
{
    let day = state.resolve_day(date.as_deref())?;
    let tasks = state.rollover_engine().tasks_for_date(day)?.into_tasks();
    let sync_items = sync_items_from_tasks(&tasks);
    run_sync(state, gateway, day, &sync_items, strategy).await
}

pub fn google_gateway(state: &AppState) -> Result<GoogleCalendarGateway, InfraError> {
    let settings = read_calendar_settings(state.config_dir())?;
    GoogleCalendarGateway::new(load_access_token_from_env()?, settings.calendar_id)
}

async fn run_sync<G>(
    state: &AppState,
    gateway: Arc<G>,
    day: NaiveDate,
    items: &[SyncItem],
    strategy: Option<SyncStrategy>,
) -> Result<SyncSummary, InfraError>
where
    G: CalendarGateway,
{
    let settings = read_calendar_settings(state.config_dir())?;
    let timezone = read_timezone(state.config_dir())?;
    let strategy = strategy.unwrap_or(settings.strategy);
    let seconds = settings.sync_timeout_seconds;

    let lock = state.day_lock(day)?;
    let _guard = lock.lock().await;

    let reconciler = CalendarReconciler::new(gateway, Ownership::new(settings.owner_tag));
    tokio::time::timeout(
        Duration::from_secs(seconds),
        reconciler.reconcile(day, timezone, items, strategy),
    )
    .await
    .map_err(|_| InfraError::Timeout {
        operation: format!("calendar sync for {day}"),
        seconds,
    })?
}

fn save_day(state: &AppState, day: NaiveDate, tasks: &[Task]) -> Result<(), InfraError> {
    state
        .repository()
        .save_tasks_for_date(day, tasks)
        .map_err(|error| InfraError::dependency("save_tasks_for_date", day, error))
}

fn required_task_id(task_id: &str) -> Result<&str, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidInput("task_id must not be empty".to_string()));
    }
    Ok(task_id)
}

fn parse_field<T>(value: &str) -> Result<T, InfraError>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse::<T>().map_err(InfraError::InvalidInput)
}
