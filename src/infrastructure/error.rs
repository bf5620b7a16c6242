use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Corrupt stored data: {0}")]
    CorruptData(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Calendar error: {0}")]
    Calendar(String),
    #[error("Refusing to touch calendar event without ownership tag: {0}")]
    OwnershipViolation(String),
    #[error("Deadline of {seconds}s expired during {operation}")]
    Timeout { operation: String, seconds: u64 },
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("{operation} failed for {day}: {source}")]
    Dependency {
        operation: &'static str,
        day: NaiveDate,
        #[source]
        source: Box<InfraError>,
    },
}

impl InfraError {
    pub fn dependency(operation: &'static str, day: NaiveDate, source: InfraError) -> Self {
        Self::Dependency {
            operation,
            day,
            source: Box::new(source),
        }
    }
}
