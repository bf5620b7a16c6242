use crate::domain::models::Distraction;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inbox of captured distractions. Unprocessed entries stay visible across
/// days until they are cleared.
pub trait DistractionRepository: Send + Sync {
    fn add(&self, day: NaiveDate, content: &str, captured_at: DateTime<Utc>) -> Result<Distraction, InfraError>;
    fn list_unprocessed(&self) -> Result<Vec<Distraction>, InfraError>;
    /// Marks every unprocessed entry as processed and returns how many changed.
    fn mark_all_processed(&self) -> Result<usize, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteDistractionRepository {
    db_path: PathBuf,
}

impl SqliteDistractionRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

type DistractionRow = (i64, String, String, bool, String);

fn row_to_distraction(row: DistractionRow) -> Result<Distraction, InfraError> {
    let (id, content, day_raw, processed, captured_raw) = row;
    let day = NaiveDate::parse_from_str(&day_raw, DATE_FORMAT).map_err(|error| {
        InfraError::CorruptData(format!("invalid distractions.day_date '{day_raw}' for {id}: {error}"))
    })?;
    let captured_at = DateTime::parse_from_rfc3339(&captured_raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::CorruptData(format!(
                "invalid distractions.captured_at '{captured_raw}' for {id}: {error}"
            ))
        })?;
    Ok(Distraction {
        id,
        content,
        day,
        processed,
        captured_at,
    })
}

impl DistractionRepository for SqliteDistractionRepository {
    fn add(&self, day: NaiveDate, content: &str, captured_at: DateTime<Utc>) -> Result<Distraction, InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO distractions (content, day_date, processed, captured_at) VALUES (?1, ?2, 0, ?3)",
            params![content, day.format(DATE_FORMAT).to_string(), captured_at.to_rfc3339()],
        )?;
        Ok(Distraction {
            id: connection.last_insert_rowid(),
            content: content.to_string(),
            day,
            processed: false,
            captured_at,
        })
    }

    fn list_unprocessed(&self) -> Result<Vec<Distraction>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, content, day_date, processed, captured_at
             FROM distractions WHERE processed = 0 ORDER BY id ASC",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<Result<Vec<DistractionRow>, _>>()?;

        rows.into_iter().map(row_to_distraction).collect()
    }

    fn mark_all_processed(&self) -> Result<usize, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute("UPDATE distractions SET processed = 1 WHERE processed = 0", [])?;
        Ok(changed)
    }
}
