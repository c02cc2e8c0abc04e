use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::event::Event;
use crate::models::settings::{EngineSettings, WorkingHours};
use crate::models::suggestion::TimeSlotRecommendation;
use crate::services::schedule_utils;

pub const FREE_SLOT_CONFIDENCE: f32 = 0.9;
const CONFLICT_PENALTY: f32 = 0.25;
const MIN_CONFIDENCE: f32 = 0.1;

/// First-fit search for a free window inside working hours on one day.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityFinder {
    time_zone: Tz,
    working_hours: WorkingHours,
    step: Duration,
}

impl AvailabilityFinder {
    pub fn new(time_zone: Tz, working_hours: WorkingHours, step: Duration) -> Self {
        Self {
            time_zone,
            working_hours,
            step,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(
            settings.time_zone,
            settings.working_hours(),
            settings.slot_step(),
        )
    }

    pub fn with_working_hours(mut self, working_hours: WorkingHours) -> Self {
        self.working_hours = working_hours;
        self
    }

    /// Returns the earliest `[cursor, cursor + duration)` that no timed event
    /// overlaps, stepping the cursor from the start of working hours. Returns
    /// `None` once a candidate would run past the end of working hours.
    pub fn find_slot(
        &self,
        events: &[Event],
        duration: Duration,
        reference_date: NaiveDate,
    ) -> EngineResult<Option<TimeSlotRecommendation>> {
        schedule_utils::ensure_positive(duration, "slot duration")?;
        schedule_utils::ensure_positive(self.step, "search step")?;

        let (work_start, work_end) = self.bounds(reference_date)?;
        schedule_utils::ensure_window(work_start, work_end)?;

        let timed: Vec<&Event> = events.iter().filter(|event| event.is_timed()).collect();
        let mut cursor = work_start;
        let mut probes = 0usize;

        while let Some(candidate_end) = cursor
            .checked_add_signed(duration)
            .filter(|end| *end <= work_end)
        {
            probes += 1;
            let blocked = timed.iter().any(|event| {
                schedule_utils::overlaps(cursor, candidate_end, event.start, event.end)
            });

            if !blocked {
                debug!(
                    target: "engine::availability",
                    date = %reference_date,
                    start = %cursor,
                    probes,
                    "free slot found"
                );
                return Ok(Some(TimeSlotRecommendation {
                    start: cursor,
                    end: candidate_end,
                    confidence: FREE_SLOT_CONFIDENCE,
                    reason: self.describe_free(cursor, candidate_end, reference_date),
                    conflicting_events: Vec::new(),
                }));
            }

            cursor = match cursor.checked_add_signed(self.step) {
                Some(next) => next,
                None => break,
            };
        }

        debug!(
            target: "engine::availability",
            date = %reference_date,
            probes,
            "no free slot within working hours"
        );
        Ok(None)
    }

    /// Scores an arbitrary window against the timed events it would overlap.
    pub fn evaluate_slot(
        &self,
        events: &[Event],
        start: DateTime<Utc>,
        duration: Duration,
    ) -> EngineResult<TimeSlotRecommendation> {
        schedule_utils::ensure_positive(duration, "slot duration")?;
        let end = start.checked_add_signed(duration).ok_or_else(|| {
            EngineError::validation_with_details(
                "slot end is out of range",
                json!({ "start": start.to_rfc3339(), "seconds": duration.num_seconds() }),
            )
        })?;

        let conflicting_events: Vec<Event> = events
            .iter()
            .filter(|event| {
                event.is_timed() && schedule_utils::overlaps(start, end, event.start, event.end)
            })
            .cloned()
            .collect();

        let (confidence, reason) = if conflicting_events.is_empty() {
            let date = schedule_utils::local_date(self.time_zone, start);
            (FREE_SLOT_CONFIDENCE, self.describe_free(start, end, date))
        } else {
            let penalty = CONFLICT_PENALTY * conflicting_events.len() as f32;
            (
                (FREE_SLOT_CONFIDENCE - penalty).max(MIN_CONFIDENCE),
                format!(
                    "Overlaps {} existing event{}",
                    conflicting_events.len(),
                    if conflicting_events.len() == 1 { "" } else { "s" }
                ),
            )
        };

        Ok(TimeSlotRecommendation {
            start,
            end,
            confidence,
            reason,
            conflicting_events,
        })
    }

    fn bounds(&self, date: NaiveDate) -> EngineResult<(DateTime<Utc>, DateTime<Utc>)> {
        let start = schedule_utils::local_minute(self.time_zone, date, self.working_hours.start_minute)?;
        let end = schedule_utils::local_minute(self.time_zone, date, self.working_hours.end_minute)?;
        Ok((start, end))
    }

    fn describe_free(&self, start: DateTime<Utc>, end: DateTime<Utc>, date: NaiveDate) -> String {
        format!(
            "Free from {} to {} on {}",
            schedule_utils::format_clock(self.time_zone, start),
            schedule_utils::format_clock(self.time_zone, end),
            date.format("%Y-%m-%d")
        )
    }
}
