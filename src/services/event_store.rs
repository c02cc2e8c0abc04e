use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::event::{Event, EventDraft, EventId};
use crate::services::conflict_detector::ConflictSet;
use crate::services::schedule_utils;

/// Canonical, insertion-ordered collection of events.
///
/// The store performs no side effects of its own; the conflict, reminder and
/// suggestion pipeline is driven by [`crate::services::calendar_engine::CalendarEngine`].
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, draft: EventDraft, now: DateTime<Utc>) -> EngineResult<EventId> {
        let start = draft.start.ok_or_else(|| {
            EngineError::validation_with_details(
                "event start is required",
                json!({ "title": draft.title }),
            )
        })?;

        let event = Event::from_draft(draft, start, now)?;
        let id = event.id();
        self.events.push(event);
        info!(target: "engine::store", event_id = %id, "event created");
        Ok(id)
    }

    /// Replaces the stored event with the same identity. The caller-supplied
    /// conflict flag and creation time are ignored.
    pub fn update(&mut self, mut event: Event, now: DateTime<Utc>) -> EngineResult<&Event> {
        let slot = self
            .events
            .iter_mut()
            .find(|existing| existing.id == event.id)
            .ok_or_else(|| EngineError::not_found(event.id))?;

        event.conflicted = slot.conflicted;
        event.created_at = slot.created_at;
        event.modified_at = now;
        if event.correct_end()? {
            debug!(target: "engine::store", event_id = %event.id, "corrected non-positive duration");
        }
        event.ensure_alerts_in_range()?;

        *slot = event;
        info!(target: "engine::store", event_id = %slot.id, "event updated");
        Ok(slot)
    }

    /// Removes an event. Deleting an unknown identifier is not an error.
    pub fn delete(&mut self, id: EventId) -> Option<Event> {
        let position = self.events.iter().position(|event| event.id == id)?;
        let removed = self.events.remove(position);
        info!(target: "engine::store", event_id = %id, "event deleted");
        Some(removed)
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn all(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events starting on `date` in `tz`, all-day events included, by start
    /// time with insertion order breaking ties.
    pub fn events_on(&self, tz: Tz, date: NaiveDate) -> EngineResult<Vec<Event>> {
        let (day_start, day_end) = schedule_utils::day_bounds(tz, date)?;
        Ok(sorted(
            self.events
                .iter()
                .filter(|event| event.start >= day_start && event.start < day_end),
        ))
    }

    /// Timed events intersecting `[hour:00, hour+1:00)` on `date` in `tz`.
    pub fn events_in_hour(&self, tz: Tz, date: NaiveDate, hour: u32) -> EngineResult<Vec<Event>> {
        if hour > 23 {
            return Err(EngineError::validation_with_details(
                "hour must be between 0 and 23",
                json!({ "hour": hour }),
            ));
        }
        let minute = (hour * 60) as u16;
        let slot_start = schedule_utils::local_minute(tz, date, minute)?;
        let slot_end = schedule_utils::local_minute(tz, date, minute + 60)?;

        Ok(sorted(self.events.iter().filter(|event| {
            event.is_timed()
                && schedule_utils::overlaps(event.start, event.end, slot_start, slot_end)
        })))
    }

    /// Events starting in `[now, now + within_days)`.
    pub fn upcoming(&self, now: DateTime<Utc>, within_days: u16) -> Vec<Event> {
        let horizon = now
            .checked_add_signed(Duration::days(i64::from(within_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        sorted(
            self.events
                .iter()
                .filter(|event| event.start >= now && event.start < horizon),
        )
    }

    pub fn current(&self, now: DateTime<Utc>) -> Vec<Event> {
        sorted(self.events.iter().filter(|event| event.contains_instant(now)))
    }

    pub fn conflicted(&self) -> Vec<Event> {
        sorted(self.events.iter().filter(|event| event.conflicted))
    }

    /// Sets every event's flag to its membership in `conflicts`. Returns how
    /// many flags changed.
    pub(crate) fn apply_conflicts(&mut self, conflicts: &ConflictSet) -> usize {
        let mut changed = 0;
        for event in &mut self.events {
            let flagged = conflicts.contains(event.id);
            if event.conflicted != flagged {
                event.conflicted = flagged;
                changed += 1;
            }
        }
        changed
    }
}

fn sorted<'a>(events: impl Iterator<Item = &'a Event>) -> Vec<Event> {
    let mut events: Vec<Event> = events.cloned().collect();
    events.sort_by_key(|event| event.start);
    events
}
