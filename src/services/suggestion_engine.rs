use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::models::settings::EngineSettings;
use crate::models::suggestion::{Suggestion, SuggestionKind};
use crate::services::availability_finder::AvailabilityFinder;
use crate::services::conflict_detector::ConflictSet;
use crate::services::event_store::EventStore;

const FREE_TIME_CONFIDENCE: f32 = 0.9;
const CONFLICT_CONFIDENCE: f32 = 0.9;
const LIGHT_SCHEDULE_CONFIDENCE: f32 = 0.8;

/// Stateless heuristics over the current store and conflict set.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionEngine {
    finder: AvailabilityFinder,
    time_zone: Tz,
    free_time: Duration,
    light_schedule_threshold: usize,
}

impl SuggestionEngine {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            finder: AvailabilityFinder::from_settings(settings),
            time_zone: settings.time_zone,
            free_time: settings.free_time_duration(),
            light_schedule_threshold: settings.light_schedule_threshold,
        }
    }

    /// Rules are applied in a fixed order: free time today, detected
    /// conflicts, then a light schedule tomorrow.
    pub fn generate(
        &self,
        store: &EventStore,
        conflicts: &ConflictSet,
        today: NaiveDate,
    ) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        if let Some(suggestion) = self.free_time_today(store, today) {
            suggestions.push(suggestion);
        }
        if let Some(suggestion) = self.conflict_summary(store, conflicts) {
            suggestions.push(suggestion);
        }
        if let Some(suggestion) = self.light_schedule_tomorrow(store, today) {
            suggestions.push(suggestion);
        }

        debug!(target: "engine::suggestion", count = suggestions.len(), "suggestions generated");
        suggestions
    }

    fn free_time_today(&self, store: &EventStore, today: NaiveDate) -> Option<Suggestion> {
        let slot = match self.finder.find_slot(store.all(), self.free_time, today) {
            Ok(slot) => slot?,
            Err(err) => {
                warn!(target: "engine::suggestion", error = %err, "free-time search failed");
                return None;
            }
        };

        let minutes = self.free_time.num_minutes();
        let mut params = BTreeMap::new();
        params.insert("start".to_string(), slot.start.to_rfc3339());
        params.insert("end".to_string(), slot.end.to_rfc3339());
        params.insert("durationMinutes".to_string(), minutes.to_string());

        Some(Suggestion {
            kind: SuggestionKind::FindTime,
            title: "Free time available".to_string(),
            description: format!("{} ({} minutes)", slot.reason, minutes),
            confidence: FREE_TIME_CONFIDENCE,
            action_params: params,
            related_events: Vec::new(),
        })
    }

    fn conflict_summary(&self, store: &EventStore, conflicts: &ConflictSet) -> Option<Suggestion> {
        if conflicts.is_empty() {
            return None;
        }

        let mut related: Vec<_> = store
            .all()
            .iter()
            .filter(|event| conflicts.contains(event.id()))
            .cloned()
            .collect();
        related.sort_by_key(|event| event.start);

        let mut params = BTreeMap::new();
        params.insert("count".to_string(), related.len().to_string());
        params.insert("pairs".to_string(), conflicts.pairs().count().to_string());

        Some(Suggestion {
            kind: SuggestionKind::ConflictResolution,
            title: "Schedule conflicts detected".to_string(),
            description: format!(
                "{} events overlap with another event. Consider moving one of them.",
                related.len()
            ),
            confidence: CONFLICT_CONFIDENCE,
            action_params: params,
            related_events: related,
        })
    }

    fn light_schedule_tomorrow(&self, store: &EventStore, today: NaiveDate) -> Option<Suggestion> {
        let tomorrow = today.succ_opt()?;
        let events = match store.events_on(self.time_zone, tomorrow) {
            Ok(events) => events,
            Err(err) => {
                warn!(target: "engine::suggestion", error = %err, "could not read tomorrow's events");
                return None;
            }
        };
        if events.len() >= self.light_schedule_threshold {
            return None;
        }

        let mut params = BTreeMap::new();
        params.insert("date".to_string(), tomorrow.format("%Y-%m-%d").to_string());
        params.insert("eventCount".to_string(), events.len().to_string());

        Some(Suggestion {
            kind: SuggestionKind::SmartSchedule,
            title: "Light schedule tomorrow".to_string(),
            description: format!(
                "Only {} event{} planned for tomorrow. A good day for focused work.",
                events.len(),
                if events.len() == 1 { "" } else { "s" }
            ),
            confidence: LIGHT_SCHEDULE_CONFIDENCE,
            action_params: params,
            related_events: events,
        })
    }
}
