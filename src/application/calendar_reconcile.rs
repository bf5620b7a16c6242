use crate::application::plan_parser::{extract_time_range, strip_time_prefix};
use crate::domain::models::{Quadrant, Task, TaskStatus};
use crate::domain::schedule::{DayWindow, Priority, ScheduledItem, SyncItem, SyncStrategy, SyncSummary, TimeSlot};
use crate::infrastructure::calendar_gateway::CalendarGateway;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{encode_item_event, CalendarEvent, Ownership, PropertyFilter};
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds reconciler input from parsed plan lines. Keys are positional, so a
/// plan edited between syncs maps onto the same keys line by line.
pub fn sync_items_from_plan(day: NaiveDate, items: &[ScheduledItem]) -> Vec<SyncItem> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| SyncItem {
            key: format!("ops_{day}_{index}"),
            label: item.label.clone(),
            priority: item.priority,
            status: TaskStatus::Todo,
            notes: item.category.clone().unwrap_or_default(),
            slot: Some(item.slot()),
        })
        .collect()
}

/// Builds reconciler input from the active tasks of a day. Only tasks whose
/// title starts with a time range (`06:00–06:20 — Title`) get a slot.
pub fn sync_items_from_tasks(tasks: &[Task]) -> Vec<SyncItem> {
    tasks
        .iter()
        .filter(|task| task.active)
        .map(|task| {
            let slot = extract_time_range(&task.title).map(|(start, end)| TimeSlot::new(start, end));
            let stripped = strip_time_prefix(&task.title);
            let label = if stripped.is_empty() {
                task.title.trim().to_string()
            } else {
                stripped
            };
            SyncItem {
                key: task.id.clone(),
                label,
                priority: quadrant_priority(task.quadrant),
                status: task.status,
                notes: task.notes.clone(),
                slot,
            }
        })
        .collect()
}

fn quadrant_priority(quadrant: Quadrant) -> Priority {
    match quadrant {
        Quadrant::Q1 => Priority::P1,
        Quadrant::Q2 => Priority::P2,
        Quadrant::Q3 | Quadrant::Q4 => Priority::P3,
    }
}

struct PreparedItem<'a> {
    item: &'a SyncItem,
    event: CalendarEvent,
}

pub struct CalendarReconciler<G>
where
    G: CalendarGateway,
{
    gateway: Arc<G>,
    ownership: Ownership,
}

impl<G> CalendarReconciler<G>
where
    G: CalendarGateway,
{
    pub fn new(gateway: Arc<G>, ownership: Ownership) -> Self {
        Self { gateway, ownership }
    }

    /// Makes the owned events of `day` match `items`. Events without the
    /// ownership tag are never patched or deleted.
    ///
    /// Callers must serialize runs for the same day.
    pub async fn reconcile(
        &self,
        day: NaiveDate,
        timezone: Tz,
        items: &[SyncItem],
        strategy: SyncStrategy,
    ) -> Result<SyncSummary, InfraError> {
        let window = DayWindow::new(day, timezone).map_err(InfraError::InvalidInput)?;
        let (prepared, skipped) = self.prepare(&window, items);

        let summary = match strategy {
            SyncStrategy::CleanSlate => self.clean_slate(&window, &prepared, skipped).await?,
            SyncStrategy::Incremental { prune } => {
                self.incremental(&window, &prepared, skipped, prune).await?
            }
        };
        info!(%day, ?summary, "calendar reconciled");
        Ok(summary)
    }

    fn prepare<'a>(&self, window: &DayWindow, items: &'a [SyncItem]) -> (Vec<PreparedItem<'a>>, usize) {
        let mut prepared = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in items {
            let Some(slot) = item.slot else {
                debug!(key = %item.key, "item has no time range; skipped");
                skipped += 1;
                continue;
            };
            match slot.resolve(window.day, window.timezone) {
                Ok((start, end)) => prepared.push(PreparedItem {
                    item,
                    event: encode_item_event(item, start, end, &self.ownership),
                }),
                Err(error) => {
                    warn!(key = %item.key, %error, "item time could not be resolved; skipped");
                    skipped += 1;
                }
            }
        }
        (prepared, skipped)
    }

    async fn clean_slate(
        &self,
        window: &DayWindow,
        prepared: &[PreparedItem<'_>],
        skipped: usize,
    ) -> Result<SyncSummary, InfraError> {
        let owned = self.owned_on_day(window).await?;
        debug!(day = %window.day, count = owned.len(), "listed owned events");

        let mut cleaned = 0;
        for event in &owned {
            if self.delete_tolerated(window.day, event).await {
                cleaned += 1;
            }
        }

        let mut created = 0;
        for entry in prepared {
            self.insert(window.day, entry).await?;
            created += 1;
        }

        Ok(SyncSummary::CleanSlate {
            day: window.day,
            cleaned,
            created,
            skipped,
        })
    }

    async fn incremental(
        &self,
        window: &DayWindow,
        prepared: &[PreparedItem<'_>],
        skipped: usize,
        prune: bool,
    ) -> Result<SyncSummary, InfraError> {
        let mut created = 0;
        let mut updated = 0;

        for entry in prepared {
            let filter = self.ownership.key_filter(&entry.item.key);
            let existing = self
                .list_owned(window, &filter)
                .await?
                .into_iter()
                .filter(|event| event.starts_within(window))
                .collect::<Vec<_>>();
            let timed = existing
                .iter()
                .filter(|event| event.is_timed())
                .find_map(CalendarEvent::event_id);
            match timed {
                Some(event_id) => {
                    debug!(key = %entry.item.key, %event_id, "patching event");
                    self.gateway
                        .patch_event(event_id, &entry.event)
                        .await
                        .map_err(|error| InfraError::dependency("patch_event", window.day, error))?;
                    updated += 1;
                }
                None => {
                    // An all-day copy cannot be patched back into a timed event.
                    for stale in existing.iter().filter(|event| !event.is_timed()) {
                        self.delete_tolerated(window.day, stale).await;
                    }
                    self.insert(window.day, entry).await?;
                    created += 1;
                }
            }
        }

        let mut deleted = 0;
        if prune {
            let keep = prepared
                .iter()
                .map(|entry| entry.item.key.as_str())
                .collect::<HashSet<_>>();
            let owned = self.owned_on_day(window).await?;
            for event in &owned {
                // Owned events without a key predate keyed sync and are left alone.
                let Some(key) = self.ownership.item_key(event) else {
                    continue;
                };
                if keep.contains(key) {
                    continue;
                }
                debug!(%key, "pruning event no longer in plan");
                if self.delete_tolerated(window.day, event).await {
                    deleted += 1;
                }
            }
        }

        Ok(SyncSummary::Incremental {
            day: window.day,
            created,
            updated,
            deleted,
            skipped,
        })
    }

    /// Owned events that start on the window's day. Overnight events of the
    /// previous day overlap the window but belong to that day.
    async fn owned_on_day(&self, window: &DayWindow) -> Result<Vec<CalendarEvent>, InfraError> {
        let listed = self.list_owned(window, &self.ownership.owner_filter()).await?;
        let total = listed.len();
        let owned = listed
            .into_iter()
            .filter(|event| event.starts_within(window))
            .collect::<Vec<_>>();
        if owned.len() < total {
            debug!(day = %window.day, spill = total - owned.len(), "ignoring owned events of adjacent days");
        }
        Ok(owned)
    }

    /// Lists events matching `filter` and refuses to go on if any of them
    /// lacks the ownership tag.
    async fn list_owned(
        &self,
        window: &DayWindow,
        filter: &PropertyFilter,
    ) -> Result<Vec<CalendarEvent>, InfraError> {
        let events = self
            .gateway
            .list_events_for_day(window, filter)
            .await
            .map_err(|error| InfraError::dependency("list_events_for_day", window.day, error))?;

        if let Some(foreign) = events.iter().find(|event| !self.ownership.is_owned(event)) {
            return Err(InfraError::OwnershipViolation(format!(
                "event {} on {} matched {filter} but is not owned by {}",
                foreign.event_id().unwrap_or("<no id>"),
                window.day,
                self.ownership.owner()
            )));
        }
        Ok(events)
    }

    async fn insert(&self, day: NaiveDate, entry: &PreparedItem<'_>) -> Result<String, InfraError> {
        let event_id = self
            .gateway
            .create_event(&entry.event)
            .await
            .map_err(|error| InfraError::dependency("create_event", day, error))?;
        debug!(key = %entry.item.key, %event_id, "created event");
        Ok(event_id)
    }

    async fn delete_tolerated(&self, day: NaiveDate, event: &CalendarEvent) -> bool {
        let Some(event_id) = event.event_id() else {
            warn!(%day, "owned event without id; cannot delete");
            return false;
        };
        match self.gateway.delete_event(event_id).await {
            Ok(()) => {
                debug!(%day, %event_id, "deleted event");
                true
            }
            Err(error) => {
                warn!(%day, %event_id, %error, "delete failed; continuing");
                false
            }
        }
    }
}
