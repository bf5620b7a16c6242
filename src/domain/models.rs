use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quadrant {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quadrant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

impl FromStr for Quadrant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "Q1" => Ok(Self::Q1),
            "Q2" => Ok(Self::Q2),
            "Q3" => Ok(Self::Q3),
            "Q4" => Ok(Self::Q4),
            other => Err(format!("unsupported quadrant: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    Unscheduled,
    Morning,
    Afternoon,
    Evening,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unscheduled => "unscheduled",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unscheduled" | "flexible" | "any" => Ok(Self::Unscheduled),
            "morning" => Ok(Self::Morning),
            "afternoon" => Ok(Self::Afternoon),
            "evening" | "night" => Ok(Self::Evening),
            other => Err(format!("unsupported period: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::Doing => "DOING",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TODO" => Ok(Self::Todo),
            "DOING" | "IN_PROGRESS" => Ok(Self::Doing),
            "DONE" => Ok(Self::Done),
            other => Err(format!("unsupported task status: {other}")),
        }
    }
}

/// A unit of work that belongs to exactly one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub notes: String,
    pub quadrant: Quadrant,
    pub period: Period,
    pub status: TaskStatus,
    pub active: bool,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        title: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, String> {
        let task = Self {
            id: id.into(),
            title: title.trim().to_string(),
            notes: String::new(),
            quadrant: Quadrant::Q2,
            period: Period::Unscheduled,
            status: TaskStatus::Todo,
            active: true,
            is_recurring: false,
            created_at,
        };
        task.validate()?;
        Ok(task)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.title, "task.title")?;
        if self.title.trim() != self.title {
            return Err("task.title must be trimmed".to_string());
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Moves the task to `status`. Completing a task also drops it from the
    /// planning context.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        if status == TaskStatus::Done {
            self.active = false;
        }
    }
}

/// A thought captured mid-focus to be dealt with at the end of the day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Distraction {
    pub id: i64,
    pub content: String,
    pub day: NaiveDate,
    pub processed: bool,
    pub captured_at: DateTime<Utc>,
}

/// Trims captured text; blank captures are rejected.
pub fn normalize_distraction(content: &str) -> Result<String, String> {
    validate_non_empty(content, "distraction")?;
    Ok(content.trim().to_string())
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_task() -> Task {
        Task {
            id: "tsk-1".to_string(),
            title: "Write report".to_string(),
            notes: "quarterly numbers".to_string(),
            quadrant: Quadrant::Q1,
            period: Period::Morning,
            status: TaskStatus::Doing,
            active: true,
            is_recurring: false,
            created_at: fixed_time("2026-02-16T08:00:00Z"),
        }
    }

    #[test]
    fn task_new_trims_title_and_applies_defaults() {
        let task = Task::new("tsk-1", "  Review PR  ", fixed_time("2026-02-16T08:00:00Z"))
            .expect("valid task");
        assert_eq!(task.title, "Review PR");
        assert_eq!(task.quadrant, Quadrant::Q2);
        assert_eq!(task.period, Period::Unscheduled);
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.active);
        assert!(!task.is_recurring);
    }

    #[test]
    fn task_validate_rejects_empty_title() {
        let mut task = sample_task();
        task.title = "   ".to_string();
        assert!(task.validate().is_err());
        assert!(Task::new("tsk-2", "  ", Utc::now()).is_err());
    }

    #[test]
    fn completing_a_task_deactivates_it() {
        let mut task = sample_task();
        task.set_status(TaskStatus::Done);
        assert!(task.is_done());
        assert!(!task.active);

        task.active = true;
        task.set_status(TaskStatus::Todo);
        assert!(task.active);
    }

    #[test]
    fn enums_parse_loosely() {
        assert_eq!("q3".parse::<Quadrant>(), Ok(Quadrant::Q3));
        assert_eq!(" Evening ".parse::<Period>(), Ok(Period::Evening));
        assert_eq!("flexible".parse::<Period>(), Ok(Period::Unscheduled));
        assert_eq!("done".parse::<TaskStatus>(), Ok(TaskStatus::Done));
        assert!("Q5".parse::<Quadrant>().is_err());
        assert!("later".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn task_supports_serde_roundtrip() {
        let task = sample_task();
        let raw = serde_json::to_string(&task).expect("serialize task");
        assert!(raw.contains("\"status\":\"DOING\""));
        assert!(raw.contains("\"period\":\"morning\""));
        let roundtrip: Task = serde_json::from_str(&raw).expect("deserialize task");
        assert_eq!(roundtrip, task);
    }

    #[test]
    fn distraction_text_is_trimmed_and_required() {
        assert_eq!(
            normalize_distraction("  call the bank \n"),
            Ok("call the bank".to_string())
        );
        assert!(normalize_distraction(" \t ").is_err());
    }
}
