pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    capture_distraction_impl, clear_distractions_impl, create_task_impl, delete_task_impl,
    google_gateway, list_distractions_impl, list_tasks_impl, parse_plan_impl, planning_context_impl,
    sync_plan_impl, sync_tasks_impl, update_task_impl, AppState, TaskDraft, TaskPatch,
};
use cli::{Cli, Commands, DistractCommands, SyncTarget};
use domain::schedule::SyncStrategy;
use infrastructure::calendar_gateway::InMemoryCalendarGateway;
use infrastructure::config::read_calendar_settings;
use infrastructure::error::InfraError;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs one CLI command and returns its JSON output. Errors are logged and
/// returned as display text.
pub async fn run(cli: Cli) -> Result<serde_json::Value, String> {
    let workspace_root = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };
    let state = AppState::new(workspace_root).map_err(|error| error.to_string())?;

    match cli.command {
        Commands::Tasks { date } => {
            to_json(list_tasks_impl(&state, date)).map_err(|error| state.command_error("tasks", &error))
        }
        Commands::Add {
            title,
            notes,
            quadrant,
            period,
            recurring,
            date,
        } => {
            let draft = TaskDraft {
                title,
                notes,
                quadrant,
                period,
                is_recurring: recurring,
            };
            to_json(create_task_impl(&state, date, draft)).map_err(|error| state.command_error("add", &error))
        }
        Commands::Update {
            id,
            title,
            notes,
            quadrant,
            period,
            status,
            active,
            date,
        } => {
            let patch = TaskPatch {
                title,
                notes,
                quadrant,
                period,
                status,
                active,
            };
            to_json(update_task_impl(&state, date, id, patch))
                .map_err(|error| state.command_error("update", &error))
        }
        Commands::Remove { id, date } => to_json(
            delete_task_impl(&state, date, id).map(|removed| serde_json::json!({ "removed": removed })),
        )
        .map_err(|error| state.command_error("remove", &error)),
        Commands::Parse { file } => to_json(read_input(file.as_deref()).map(|text| parse_plan_impl(&text)))
            .map_err(|error| state.command_error("parse", &error)),
        Commands::Context { plan_file, date } => {
            let result = match plan_file.as_deref().map(|path| read_input(Some(path))).transpose() {
                Ok(plan) => planning_context_impl(&state, date, plan),
                Err(error) => Err(error),
            };
            to_json(result).map_err(|error| state.command_error("context", &error))
        }
        Commands::Distract { command } => {
            let result = match command {
                DistractCommands::Add { text, date } => to_json(capture_distraction_impl(&state, date, text)),
                DistractCommands::List => to_json(list_distractions_impl(&state)),
                DistractCommands::Clear => to_json(clear_distractions_impl(&state)),
            };
            result.map_err(|error| state.command_error("distract", &error))
        }
        Commands::Sync { file, target } => sync_plan(&state, file, target)
            .await
            .map_err(|error| state.command_error("sync", &error)),
        Commands::SyncTasks { target } => sync_tasks(&state, target)
            .await
            .map_err(|error| state.command_error("sync-tasks", &error)),
    }
}

async fn sync_plan(state: &AppState, file: Option<PathBuf>, target: SyncTarget) -> Result<serde_json::Value, InfraError> {
    let text = read_input(file.as_deref())?;
    let strategy = resolve_strategy(state, &target)?;
    if target.dry_run {
        let gateway = Arc::new(InMemoryCalendarGateway::default());
        to_json(sync_plan_impl(state, gateway, &text, target.date, strategy).await)
    } else {
        let gateway = Arc::new(google_gateway(state)?);
        to_json(sync_plan_impl(state, gateway, &text, target.date, strategy).await)
    }
}

async fn sync_tasks(state: &AppState, target: SyncTarget) -> Result<serde_json::Value, InfraError> {
    let strategy = resolve_strategy(state, &target)?;
    if target.dry_run {
        let gateway = Arc::new(InMemoryCalendarGateway::default());
        to_json(sync_tasks_impl(state, gateway, target.date, strategy).await)
    } else {
        let gateway = Arc::new(google_gateway(state)?);
        to_json(sync_tasks_impl(state, gateway, target.date, strategy).await)
    }
}

/// `--strategy` wins over the configured one; `--prune` alone turns pruning on
/// for a configured incremental strategy.
fn resolve_strategy(state: &AppState, target: &SyncTarget) -> Result<Option<SyncStrategy>, InfraError> {
    if let Some(raw) = target.strategy.as_deref() {
        return SyncStrategy::parse(raw, target.prune)
            .map(Some)
            .map_err(InfraError::InvalidInput);
    }
    if !target.prune {
        return Ok(None);
    }
    let configured = read_calendar_settings(state.config_dir())?.strategy;
    Ok(Some(match configured {
        SyncStrategy::Incremental { .. } => SyncStrategy::Incremental { prune: true },
        other => other,
    }))
}

fn read_input(path: Option<&Path>) -> Result<String, InfraError> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn to_json<T>(result: Result<T, InfraError>) -> Result<serde_json::Value, InfraError>
where
    T: Serialize,
{
    Ok(serde_json::to_value(result?)?)
}
