use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::event::{Event, EventDraft, EventId, Location};
use crate::models::settings::{EngineSettings, WorkingHours};
use crate::models::suggestion::{Suggestion, TimeSlotRecommendation};
use crate::models::reminder::TriggerKey;
use crate::services::availability_finder::AvailabilityFinder;
use crate::services::conflict_detector::{ConflictDetector, ConflictSet};
use crate::services::event_store::EventStore;
use crate::services::location_service::LocationProvider;
use crate::services::reminder_scheduler::ReminderScheduler;
use crate::services::schedule_utils;
use crate::services::settings_service::SettingsService;
use crate::services::suggestion_engine::SuggestionEngine;
use crate::services::trigger_service::TriggerService;
use crate::utils::clock::{Clock, SystemClock};

const CHANGE_CHANNEL_CAPACITY: usize = 64;
const CURRENT_LOCATION_NAME: &str = "Current Location";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Published after every mutation, once conflicts, reminders and
/// suggestions reflect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineChange {
    pub kind: ChangeKind,
    pub event_id: EventId,
    pub conflicted_count: usize,
}

#[derive(Default)]
struct EngineState {
    store: EventStore,
    conflicts: ConflictSet,
    suggestions: Vec<Suggestion>,
}

/// Owns the event store and runs the conflict, reminder and suggestion
/// pipeline after every mutation.
///
/// A single read/write lock covers the store together with its derived state,
/// so readers never see an event whose conflict flag is out of date.
pub struct CalendarEngine {
    state: RwLock<EngineState>,
    settings: Arc<SettingsService>,
    reminders: ReminderScheduler,
    clock: Arc<dyn Clock>,
    location: Option<Arc<dyn LocationProvider>>,
    changes: broadcast::Sender<EngineChange>,
}

impl CalendarEngine {
    /// Must be called from within a tokio runtime.
    pub fn new(
        settings: Arc<SettingsService>,
        trigger_service: Arc<dyn TriggerService>,
    ) -> EngineResult<Self> {
        let reminders = ReminderScheduler::new(trigger_service)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let engine = Self {
            state: RwLock::new(EngineState::default()),
            settings,
            reminders,
            clock: Arc::new(SystemClock),
            location: None,
            changes,
        };
        engine.refresh_derived()?;
        Ok(engine)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> EngineResult<Self> {
        self.clock = clock;
        self.refresh_derived()?;
        Ok(self)
    }

    pub fn with_location_provider(mut self, provider: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(provider);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineChange> {
        self.changes.subscribe()
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings.get()
    }

    pub fn create_event(&self, draft: EventDraft) -> EngineResult<EventId> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        let id = state.store.create(draft, now)?;
        self.run_pipeline(&mut state, now, Some(id));
        let conflicted_count = state.conflicts.len();
        drop(state);

        self.publish(ChangeKind::Created, id, conflicted_count);
        Ok(id)
    }

    /// Creates the event tagged with the device position when the location
    /// provider has one; otherwise the draft is stored unchanged.
    pub fn create_event_at_current_location(&self, mut draft: EventDraft) -> EngineResult<EventId> {
        let coordinate = self
            .location
            .as_ref()
            .and_then(|provider| provider.current_coordinate());

        match coordinate {
            Some(coordinate) => {
                let location = draft
                    .location
                    .get_or_insert_with(|| Location::named(CURRENT_LOCATION_NAME));
                location.coordinate = Some(coordinate);
            }
            None => {
                debug!(target: "engine::store", "no current coordinate available");
            }
        }
        self.create_event(draft)
    }

    pub fn update_event(&self, event: Event) -> EngineResult<Event> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        let id = state.store.update(event, now)?.id();
        self.run_pipeline(&mut state, now, Some(id));
        let updated = state
            .store
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(id))?;
        let conflicted_count = state.conflicts.len();
        drop(state);

        self.publish(ChangeKind::Updated, id, conflicted_count);
        Ok(updated)
    }

    /// Deletes the event and cancels its reminders. Unknown ids are a no-op.
    pub fn delete_event(&self, id: EventId) -> EngineResult<()> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        let Some(removed) = state.store.delete(id) else {
            debug!(target: "engine::store", event_id = %id, "delete of unknown event ignored");
            return Ok(());
        };
        self.reminders.cancel(&removed);
        self.run_pipeline(&mut state, now, None);
        let conflicted_count = state.conflicts.len();
        drop(state);

        self.publish(ChangeKind::Deleted, id, conflicted_count);
        Ok(())
    }

    pub fn get_event(&self, id: EventId) -> EngineResult<Event> {
        self.read_state()?
            .store
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(id))
    }

    pub fn all_events(&self) -> EngineResult<Vec<Event>> {
        Ok(self.read_state()?.store.all().to_vec())
    }

    pub fn events_on(&self, date: NaiveDate) -> EngineResult<Vec<Event>> {
        let tz = self.settings.get().time_zone;
        self.read_state()?.store.events_on(tz, date)
    }

    pub fn events_in_hour(&self, date: NaiveDate, hour: u32) -> EngineResult<Vec<Event>> {
        let tz = self.settings.get().time_zone;
        self.read_state()?.store.events_in_hour(tz, date, hour)
    }

    pub fn todays_events(&self) -> EngineResult<Vec<Event>> {
        let tz = self.settings.get().time_zone;
        let today = schedule_utils::local_date(tz, self.clock.now());
        self.read_state()?.store.events_on(tz, today)
    }

    pub fn upcoming_events(&self) -> EngineResult<Vec<Event>> {
        let days = self.settings.get().upcoming_days;
        Ok(self.read_state()?.store.upcoming(self.clock.now(), days))
    }

    pub fn current_events(&self) -> EngineResult<Vec<Event>> {
        Ok(self.read_state()?.store.current(self.clock.now()))
    }

    pub fn conflicting_events(&self) -> EngineResult<Vec<Event>> {
        Ok(self.read_state()?.store.conflicted())
    }

    pub fn conflict_pairs(&self) -> EngineResult<Vec<(EventId, EventId)>> {
        Ok(self.read_state()?.conflicts.pairs().collect())
    }

    pub fn suggestions(&self) -> EngineResult<Vec<Suggestion>> {
        Ok(self.read_state()?.suggestions.clone())
    }

    pub fn find_slot(
        &self,
        duration: Duration,
        reference_date: NaiveDate,
    ) -> EngineResult<Option<TimeSlotRecommendation>> {
        let finder = AvailabilityFinder::from_settings(&self.settings.get());
        finder.find_slot(self.read_state()?.store.all(), duration, reference_date)
    }

    pub fn find_slot_within(
        &self,
        duration: Duration,
        reference_date: NaiveDate,
        working_hours: WorkingHours,
    ) -> EngineResult<Option<TimeSlotRecommendation>> {
        let finder =
            AvailabilityFinder::from_settings(&self.settings.get()).with_working_hours(working_hours);
        finder.find_slot(self.read_state()?.store.all(), duration, reference_date)
    }

    pub fn evaluate_slot(
        &self,
        start: DateTime<Utc>,
        duration: Duration,
    ) -> EngineResult<TimeSlotRecommendation> {
        let finder = AvailabilityFinder::from_settings(&self.settings.get());
        finder.evaluate_slot(self.read_state()?.store.all(), start, duration)
    }

    pub fn registered_reminders(&self, id: EventId) -> Vec<TriggerKey> {
        self.reminders.registered_keys(id)
    }

    pub fn failed_reminder_registrations(&self) -> usize {
        self.reminders.failed_registrations()
    }

    /// Waits until the trigger service has seen every reminder change made so far.
    pub async fn flush_reminders(&self) -> EngineResult<()> {
        self.reminders.flush().await
    }

    /// Recomputes conflicts and suggestions without a mutation, for example
    /// after the clock or settings changed.
    pub fn refresh_derived(&self) -> EngineResult<()> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        self.run_pipeline(&mut state, now, None);
        Ok(())
    }

    fn run_pipeline(&self, state: &mut EngineState, now: DateTime<Utc>, touched: Option<EventId>) {
        let settings = self.settings.get();

        let conflicts = ConflictDetector::new(settings.sweep_threshold).recompute(state.store.all());
        let changed = state.store.apply_conflicts(&conflicts);
        state.conflicts = conflicts;

        if let Some(id) = touched {
            if let Some(event) = state.store.get(id) {
                self.reminders.reschedule(event, now);
            }
        }

        let today = schedule_utils::local_date(settings.time_zone, now);
        state.suggestions =
            SuggestionEngine::from_settings(&settings).generate(&state.store, &state.conflicts, today);

        info!(
            target: "engine::store",
            events = state.store.len(),
            conflicted = state.conflicts.len(),
            flags_changed = changed,
            suggestions = state.suggestions.len(),
            "pipeline complete"
        );
    }

    fn publish(&self, kind: ChangeKind, event_id: EventId, conflicted_count: usize) {
        let change = EngineChange {
            kind,
            event_id,
            conflicted_count,
        };
        if self.changes.send(change).is_err() {
            debug!(target: "engine::store", "no change subscribers");
        }
    }

    fn read_state(&self) -> EngineResult<RwLockReadGuard<'_, EngineState>> {
        self.state.read().map_err(|_| {
            warn!(target: "engine::store", "engine state lock poisoned");
            EngineError::other("engine state lock poisoned")
        })
    }

    fn write_state(&self) -> EngineResult<RwLockWriteGuard<'_, EngineState>> {
        self.state.write().map_err(|_| {
            warn!(target: "engine::store", "engine state lock poisoned");
            EngineError::other("engine state lock poisoned")
        })
    }
}
