use crate::domain::schedule::DayWindow;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{CalendarEvent, PropertyFilter};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use url::Url;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

/// The external calendar store. Callers scope every call to one day and
/// timezone before invoking it.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    async fn list_events_for_day(
        &self,
        window: &DayWindow,
        filter: &PropertyFilter,
    ) -> Result<Vec<CalendarEvent>, InfraError>;

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, InfraError>;

    async fn patch_event(&self, event_id: &str, event: &CalendarEvent) -> Result<(), InfraError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct GoogleCalendarGateway {
    client: Client,
    access_token: String,
    calendar_id: String,
}

impl GoogleCalendarGateway {
    pub fn new(access_token: impl Into<String>, calendar_id: impl Into<String>) -> Result<Self, InfraError> {
        let access_token = access_token.into();
        let calendar_id = calendar_id.into();
        Self::ensure_non_empty(&access_token, "access token")?;
        Self::ensure_non_empty(&calendar_id, "calendar id")?;
        Ok(Self {
            client: Client::new(),
            access_token,
            calendar_id,
        })
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Calendar(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("google calendar api error: http {}", status.as_u16())
        } else {
            format!("google calendar api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Calendar(message)
    }

    fn events_endpoint(&self) -> Result<Url, InfraError> {
        let mut url = Url::parse(CALENDAR_API_BASE)
            .map_err(|error| InfraError::Calendar(format!("invalid calendar api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Calendar("calendar api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("calendars");
            segments.push(&self.calendar_id);
            segments.push("events");
        }
        Ok(url)
    }

    fn event_endpoint(&self, event_id: &str) -> Result<Url, InfraError> {
        let mut url = self.events_endpoint()?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Calendar("calendar events URL cannot be a base".to_string())
            })?;
            segments.push(event_id);
        }
        Ok(url)
    }

    async fn read_body(response: reqwest::Response, action: &str) -> Result<(reqwest::StatusCode, String), InfraError> {
        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Calendar(format!("failed reading event {action} response: {error}"))
        })?;
        Ok((status, body))
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<CalendarEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    async fn list_events_for_day(
        &self,
        window: &DayWindow,
        filter: &PropertyFilter,
    ) -> Result<Vec<CalendarEvent>, InfraError> {
        let endpoint = self.events_endpoint()?;
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();
        let filter = filter.to_string();

        loop {
            let mut req = self
                .client
                .get(endpoint.clone())
                .bearer_auth(&self.access_token)
                .query(&[
                    ("timeMin", window.start.to_rfc3339()),
                    ("timeMax", window.end.to_rfc3339()),
                    ("singleEvents", "true".to_string()),
                    ("maxResults", "2500".to_string()),
                    ("privateExtendedProperty", filter.clone()),
                ]);
            if let Some(page_token) = page_token.as_deref() {
                req = req.query(&[("pageToken", page_token)]);
            }

            let response = req.send().await.map_err(|error| {
                InfraError::Calendar(format!("network error while listing calendar events: {error}"))
            })?;
            let (status, body) = Self::read_body(response, "list").await?;
            if !status.is_success() {
                return Err(Self::http_error(status, &body));
            }

            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                InfraError::Calendar(format!("invalid events list payload: {error}; body={body}"))
            })?;
            events.extend(parsed.items.take().unwrap_or_default());

            if let Some(next_page_token) = parsed.next_page_token.take() {
                page_token = Some(next_page_token);
                continue;
            }
            break;
        }

        Ok(events)
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, InfraError> {
        let endpoint = self.events_endpoint()?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.access_token)
            .json(event)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while creating event: {error}")))?;

        let (status, body) = Self::read_body(response, "create").await?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        let parsed: CalendarEvent = serde_json::from_str(&body).map_err(|error| {
            InfraError::Calendar(format!("invalid event create payload: {error}; body={body}"))
        })?;
        parsed
            .event_id()
            .map(ToOwned::to_owned)
            .ok_or_else(|| InfraError::Calendar("event create response did not include id".to_string()))
    }

    async fn patch_event(&self, event_id: &str, event: &CalendarEvent) -> Result<(), InfraError> {
        Self::ensure_non_empty(event_id, "event id")?;

        let endpoint = self.event_endpoint(event_id)?;
        let response = self
            .client
            .patch(endpoint)
            .bearer_auth(&self.access_token)
            .json(event)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while patching event: {error}")))?;

        let (status, body) = Self::read_body(response, "patch").await?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError> {
        Self::ensure_non_empty(event_id, "event id")?;

        let endpoint = self.event_endpoint(event_id)?;
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while deleting event: {error}")))?;

        let (status, body) = Self::read_body(response, "delete").await?;
        // Already gone.
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(());
        }
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }
}

/// In-process calendar with the same window and filter semantics as the
/// Google API. Failures can be injected per operation.
#[derive(Debug, Default)]
pub struct InMemoryCalendarGateway {
    events: Mutex<BTreeMap<String, CalendarEvent>>,
    next_id: AtomicU64,
    fail_list: AtomicBool,
    fail_create: AtomicBool,
    fail_delete_ids: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl InMemoryCalendarGateway {
    /// Stores an event as if it had been created outside this system.
    pub fn seed(&self, mut event: CalendarEvent) -> Result<String, InfraError> {
        let id = event
            .event_id()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| self.mint_id());
        event.id = Some(id.clone());
        self.events_lock()?.insert(id.clone(), event);
        Ok(id)
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete_for(&self, event_id: &str) -> Result<(), InfraError> {
        self.fail_delete_ids
            .lock()
            .map_err(|error| InfraError::Lock(format!("calendar fault lock poisoned: {error}")))?
            .insert(event_id.to_string());
        Ok(())
    }

    pub fn all_events(&self) -> Result<Vec<CalendarEvent>, InfraError> {
        Ok(self.events_lock()?.values().cloned().collect())
    }

    pub fn get(&self, event_id: &str) -> Result<Option<CalendarEvent>, InfraError> {
        Ok(self.events_lock()?.get(event_id).cloned())
    }

    /// Mutating calls in the order they were received, e.g. `delete:evt-1`.
    pub fn calls(&self) -> Result<Vec<String>, InfraError> {
        Ok(self.calls_lock()?.clone())
    }

    fn mint_id(&self) -> String {
        format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn events_lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, CalendarEvent>>, InfraError> {
        self.events
            .lock()
            .map_err(|error| InfraError::Lock(format!("calendar store lock poisoned: {error}")))
    }

    fn calls_lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<String>>, InfraError> {
        self.calls
            .lock()
            .map_err(|error| InfraError::Lock(format!("calendar call log lock poisoned: {error}")))
    }

    fn record(&self, call: String) -> Result<(), InfraError> {
        self.calls_lock()?.push(call);
        Ok(())
    }
}

fn overlaps_window(event: &CalendarEvent, window: &DayWindow) -> bool {
    if let (Some(start), Some(end)) = (event.start.instant(), event.end.instant()) {
        return start < window.end.with_timezone(&Utc) && end > window.start.with_timezone(&Utc);
    }
    // All-day events end on an exclusive date.
    let Some(first) = event.start.all_day() else {
        return false;
    };
    let last = event.end.all_day().unwrap_or(first);
    first <= window.day && (window.day < last || (first == last && first == window.day))
}

#[async_trait]
impl CalendarGateway for InMemoryCalendarGateway {
    async fn list_events_for_day(
        &self,
        window: &DayWindow,
        filter: &PropertyFilter,
    ) -> Result<Vec<CalendarEvent>, InfraError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(InfraError::Calendar("injected list failure".to_string()));
        }
        Ok(self
            .events_lock()?
            .values()
            .filter(|event| filter.matches(event) && overlaps_window(event, window))
            .cloned()
            .collect())
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, InfraError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(InfraError::Calendar("injected create failure".to_string()));
        }
        let id = self.mint_id();
        let mut stored = event.clone();
        stored.id = Some(id.clone());
        self.events_lock()?.insert(id.clone(), stored);
        self.record(format!("create:{id}"))?;
        Ok(id)
    }

    async fn patch_event(&self, event_id: &str, event: &CalendarEvent) -> Result<(), InfraError> {
        let mut events = self.events_lock()?;
        let Some(existing) = events.get_mut(event_id) else {
            return Err(InfraError::Calendar(format!(
                "google calendar api error: http 404; event {event_id} not found"
            )));
        };
        let mut patched = event.clone();
        patched.id = Some(event_id.to_string());
        *existing = patched;
        drop(events);
        self.record(format!("patch:{event_id}"))
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError> {
        let injected = self
            .fail_delete_ids
            .lock()
            .map_err(|error| InfraError::Lock(format!("calendar fault lock poisoned: {error}")))?
            .contains(event_id);
        if injected {
            return Err(InfraError::Calendar(format!("injected delete failure for {event_id}")));
        }
        self.events_lock()?.remove(event_id);
        self.record(format!("delete:{event_id}"))
    }
}
