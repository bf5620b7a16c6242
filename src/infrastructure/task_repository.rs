use crate::domain::models::{Period, Quadrant, Task, TaskStatus};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub trait TaskRepository: Send + Sync {
    fn load_tasks_for_date(&self, date: NaiveDate) -> Result<Vec<Task>, InfraError>;
    fn save_tasks_for_date(&self, date: NaiveDate, tasks: &[Task]) -> Result<(), InfraError>;
    fn load_most_recent_date_before(&self, date: NaiveDate) -> Result<Option<NaiveDate>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTaskRepository {
    db_path: PathBuf,
}

impl SqliteTaskRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

type TaskRow = (String, String, String, String, String, String, bool, bool, String);

fn row_to_task(row: TaskRow) -> Result<Task, InfraError> {
    let (id, title, notes, quadrant, period, status, active, is_recurring, created_at_raw) = row;
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::CorruptData(format!(
                "invalid tasks.created_at '{created_at_raw}' for task {id}: {error}"
            ))
        })?;

    Ok(Task {
        quadrant: quadrant.parse::<Quadrant>().map_err(|error| corrupt_column(&id, error))?,
        period: period.parse::<Period>().map_err(|error| corrupt_column(&id, error))?,
        status: status.parse::<TaskStatus>().map_err(|error| corrupt_column(&id, error))?,
        id,
        title,
        notes,
        active,
        is_recurring,
        created_at,
    })
}

fn corrupt_column(id: &str, error: String) -> InfraError {
    InfraError::CorruptData(format!("task {id}: {error}"))
}

impl TaskRepository for SqliteTaskRepository {
    fn load_tasks_for_date(&self, date: NaiveDate) -> Result<Vec<Task>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, title, notes, quadrant, period, status, active, is_recurring, created_at
             FROM tasks WHERE day_date = ?1 ORDER BY position ASC",
        )?;
        let rows = statement
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            })?
            .collect::<Result<Vec<TaskRow>, _>>()?;

        rows.into_iter().map(row_to_task).collect()
    }

    fn save_tasks_for_date(&self, date: NaiveDate, tasks: &[Task]) -> Result<(), InfraError> {
        let mut connection = self.connect()?;
        let day = date.format(DATE_FORMAT).to_string();
        let transaction = connection.transaction()?;
        transaction.execute("DELETE FROM tasks WHERE day_date = ?1", params![day])?;
        for (position, task) in tasks.iter().enumerate() {
            transaction.execute(
                "INSERT INTO tasks
                   (day_date, id, position, title, notes, quadrant, period, status, active, is_recurring, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    day,
                    task.id,
                    position as i64,
                    task.title,
                    task.notes,
                    task.quadrant.as_str(),
                    task.period.as_str(),
                    task.status.as_str(),
                    task.active,
                    task.is_recurring,
                    task.created_at.to_rfc3339(),
                ],
            )?;
        }
        transaction.commit()?;
        Ok(())
    }

    fn load_most_recent_date_before(&self, date: NaiveDate) -> Result<Option<NaiveDate>, InfraError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT MAX(day_date) FROM tasks WHERE day_date < ?1",
                params![date.format(DATE_FORMAT).to_string()],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        raw.map(|value| {
            NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|error| {
                InfraError::CorruptData(format!("invalid tasks.day_date '{value}': {error}"))
            })
        })
        .transpose()
    }
}

/// Test double. `set_unavailable(true)` makes every call fail the way an
/// unreachable database would.
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    days: Mutex<BTreeMap<NaiveDate, Vec<Task>>>,
    unavailable: AtomicBool,
}

impl InMemoryTaskRepository {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn days(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<NaiveDate, Vec<Task>>>, InfraError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(InfraError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "task repository unavailable",
            )));
        }
        self.days
            .lock()
            .map_err(|error| InfraError::Lock(format!("task repository lock poisoned: {error}")))
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn load_tasks_for_date(&self, date: NaiveDate) -> Result<Vec<Task>, InfraError> {
        Ok(self.days()?.get(&date).cloned().unwrap_or_default())
    }

    fn save_tasks_for_date(&self, date: NaiveDate, tasks: &[Task]) -> Result<(), InfraError> {
        let mut days = self.days()?;
        if tasks.is_empty() {
            days.remove(&date);
        } else {
            days.insert(date, tasks.to_vec());
        }
        Ok(())
    }

    fn load_most_recent_date_before(&self, date: NaiveDate) -> Result<Option<NaiveDate>, InfraError> {
        Ok(self
            .days()?
            .range(..date)
            .rev()
            .find(|(_, tasks)| !tasks.is_empty())
            .map(|(day, _)| *day))
    }
}
