//! Text handed to the conversational planning layer: the current time, the
//! plan currently in force and the state of the day's active tasks.

use crate::application::plan_parser::latest_plan_excerpt;
use crate::domain::models::{Period, Quadrant, Task};
use chrono::DateTime;
use chrono_tz::Tz;

pub const NO_ACTIVE_TASKS_NOTICE: &str = "No task has been marked as active for today yet.";

pub fn build_context(
    tasks: &[Task],
    last_plan: Option<&str>,
    now: DateTime<Tz>,
    max_tasks: usize,
) -> String {
    let mut active = tasks.iter().filter(|task| task.active).collect::<Vec<_>>();
    if active.is_empty() {
        return NO_ACTIVE_TASKS_NOTICE.to_string();
    }
    active.sort_by_key(|task| (task.is_done(), task.quadrant, task.created_at));
    active.truncate(max_tasks);

    let mut lines = vec![format!("CURRENT TIME: {}", now.format("%H:%M"))];

    if let Some(plan) = last_plan.map(str::trim).filter(|plan| !plan.is_empty()) {
        let excerpt = latest_plan_excerpt(plan).unwrap_or(plan);
        lines.push(String::new());
        lines.push("=== PLAN IN FORCE (latest version) ===".to_string());
        lines.push(excerpt.trim_end().to_string());
        lines.push("======================================".to_string());
        lines.push(String::new());
    }

    lines.push("CURRENT TASK STATE:".to_string());
    lines.extend(active.into_iter().map(render_task));
    lines.join("\n")
}

fn render_task(task: &Task) -> String {
    let marker = if task.is_done() { "✅" } else { "•" };
    let period = match task.period {
        Period::Unscheduled => "ANY TIME (FLEXIBLE)".to_string(),
        other => other.as_str().to_ascii_uppercase(),
    };
    let notes = task.notes.trim();
    let notes = if notes.is_empty() {
        String::new()
    } else {
        format!(" (Notes: {notes})")
    };
    format!(
        "  {marker} [{}] ({period}) {}{notes}",
        task.quadrant.as_str(),
        task.title
    )
}

/// Warns when more than `threshold` open tasks sit in Q1. Empty otherwise.
pub fn check_identity_overload(tasks: &[Task], threshold: usize) -> String {
    let open_q1 = tasks
        .iter()
        .filter(|task| task.quadrant == Quadrant::Q1 && !task.is_done())
        .count();
    if open_q1 > threshold {
        format!(
            "Warning: {open_q1} open tasks in quadrant Q1 (limit {threshold}). \
             Pick the fire that, once put out, removes or shrinks several others."
        )
    } else {
        String::new()
    }
}
