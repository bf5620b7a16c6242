use crate::domain::models::TaskStatus;
use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    P1,
    #[default]
    P2,
    P3,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "P1" => Ok(Self::P1),
            "P2" => Ok(Self::P2),
            "P3" => Ok(Self::P3),
            other => Err(format!("unsupported priority: {other}")),
        }
    }
}

/// Wall-clock range without a date. `end <= start` is allowed and means the
/// range crosses midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end <= self.start
    }

    /// Anchors the slot on `day` in `tz`, rolling the end onto the next day
    /// when it does not come after the start.
    pub fn resolve(&self, day: NaiveDate, tz: Tz) -> Result<(DateTime<Tz>, DateTime<Tz>), String> {
        let start = resolve_local(tz, day.and_time(self.start))?;
        let mut end = resolve_local(tz, day.and_time(self.end))?;
        if end <= start {
            let next_day = next_day(day)?;
            end = resolve_local(tz, next_day.and_time(self.end))?;
        }
        Ok((start, end))
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}–{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// One line of an extracted plan. Transient: recomputed on every parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledItem {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub label: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ScheduledItem {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot::new(self.start, self.end)
    }
}

/// Input unit of the calendar reconciler. `slot == None` marks an entry
/// without a usable time range; such entries are counted as skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncItem {
    pub key: String,
    pub label: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub notes: String,
    pub slot: Option<TimeSlot>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncStrategy {
    Incremental { prune: bool },
    CleanSlate,
}

impl SyncStrategy {
    pub fn parse(value: &str, prune: bool) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "clean_slate" | "clean" => Ok(Self::CleanSlate),
            "incremental" | "upsert" => Ok(Self::Incremental { prune }),
            other => Err(format!("unsupported sync strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SyncSummary {
    Incremental {
        day: NaiveDate,
        created: usize,
        updated: usize,
        deleted: usize,
        skipped: usize,
    },
    CleanSlate {
        day: NaiveDate,
        cleaned: usize,
        created: usize,
        skipped: usize,
    },
}

impl SyncSummary {
    pub fn day(&self) -> NaiveDate {
        match self {
            Self::Incremental { day, .. } | Self::CleanSlate { day, .. } => *day,
        }
    }

    pub fn created(&self) -> usize {
        match self {
            Self::Incremental { created, .. } | Self::CleanSlate { created, .. } => *created,
        }
    }

    pub fn skipped(&self) -> usize {
        match self {
            Self::Incremental { skipped, .. } | Self::CleanSlate { skipped, .. } => *skipped,
        }
    }
}

/// `[start, end)` bounds of one calendar day in a timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub timezone: Tz,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl DayWindow {
    pub fn new(day: NaiveDate, timezone: Tz) -> Result<Self, String> {
        let start = resolve_local(timezone, day.and_time(NaiveTime::MIN))?;
        let end = resolve_local(timezone, next_day(day)?.and_time(NaiveTime::MIN))?;
        Ok(Self {
            day,
            timezone,
            start,
            end,
        })
    }
}

fn next_day(day: NaiveDate) -> Result<NaiveDate, String> {
    day.checked_add_days(Days::new(1))
        .ok_or_else(|| format!("date out of range after {day}"))
}

// Ambiguous local times take the earlier instant; times inside a DST gap
// move forward by one hour.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Result<DateTime<Tz>, String> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(value) => Ok(value),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(local + TimeDelta::hours(1)))
            .earliest()
            .ok_or_else(|| format!("local time {local} does not exist in {tz}")),
    }
}

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("expected HH:MM, got '{raw}'")))
    }
}
