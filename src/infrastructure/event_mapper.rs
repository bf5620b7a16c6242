use crate::domain::schedule::{DayWindow, SyncItem};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fmt;

pub const KEY_OWNER: &str = "ops_owner";
pub const KEY_TASK_ID: &str = "ops_task_id";

/// Start or end of an event. Timed events carry `dateTime`; all-day events
/// carry only `date`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventDateTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl CalendarEventDateTime {
    pub fn timed(date_time: impl Into<String>, time_zone: Option<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone,
        }
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        let raw = self.date_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|value| value.with_timezone(&Utc))
    }

    pub fn all_day(&self) -> Option<NaiveDate> {
        let raw = self.date.as_deref()?;
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventExtendedProperties {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub private: HashMap<String, String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub start: CalendarEventDateTime,
    pub end: CalendarEventDateTime,
    #[serde(rename = "extendedProperties", skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<CalendarEventExtendedProperties>,
}

impl CalendarEvent {
    pub fn private_property(&self, key: &str) -> Option<&str> {
        self.extended_properties
            .as_ref()
            .and_then(|properties| properties.private.get(key))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn event_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn is_timed(&self) -> bool {
        self.start.instant().is_some()
    }

    /// True when the event begins inside `window`: a timed start in
    /// `[window.start, window.end)`, or an all-day start on `window.day`.
    /// An overnight event belongs to the day it starts on.
    pub fn starts_within(&self, window: &DayWindow) -> bool {
        if let Some(start) = self.start.instant() {
            return start >= window.start.with_timezone(&Utc) && start < window.end.with_timezone(&Utc);
        }
        self.start.all_day() == Some(window.day)
    }
}

/// Exact-match filter on one private extended property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    pub key: String,
    pub value: String,
}

impl PropertyFilter {
    pub fn matches(&self, event: &CalendarEvent) -> bool {
        event.private_property(&self.key) == Some(self.value.as_str())
    }
}

impl fmt::Display for PropertyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Marks the events this system creates and is allowed to modify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    owner: String,
}

impl Ownership {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn owner_filter(&self) -> PropertyFilter {
        PropertyFilter {
            key: KEY_OWNER.to_string(),
            value: self.owner.clone(),
        }
    }

    pub fn key_filter(&self, key: &str) -> PropertyFilter {
        PropertyFilter {
            key: KEY_TASK_ID.to_string(),
            value: key.to_string(),
        }
    }

    pub fn is_owned(&self, event: &CalendarEvent) -> bool {
        self.owner_filter().matches(event)
    }

    pub fn item_key<'a>(&self, event: &'a CalendarEvent) -> Option<&'a str> {
        event.private_property(KEY_TASK_ID)
    }
}

impl Default for Ownership {
    fn default() -> Self {
        Self::new("ops_agent")
    }
}

pub fn encode_item_event(
    item: &SyncItem,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    ownership: &Ownership,
) -> CalendarEvent {
    let mut private = HashMap::new();
    private.insert(KEY_OWNER.to_string(), ownership.owner().to_string());
    private.insert(KEY_TASK_ID.to_string(), item.key.clone());

    let description = format!(
        "OPS_AGENT task_id={}\nstatus={}\n\n{}",
        item.key, item.status, item.notes
    )
    .trim()
    .to_string();
    let time_zone = Some(start.timezone().name().to_string());

    CalendarEvent {
        id: None,
        summary: Some(format!("[{}] {}", item.priority, item.label)),
        description: Some(description),
        status: None,
        start: CalendarEventDateTime::timed(start.to_rfc3339(), time_zone.clone()),
        end: CalendarEventDateTime::timed(end.to_rfc3339(), time_zone),
        extended_properties: Some(CalendarEventExtendedProperties { private }),
    }
}
