use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{EngineError, EngineResult};
use crate::services::schedule_utils;

pub const DEFAULT_WORKDAY_START: u16 = 9 * 60;
pub const DEFAULT_WORKDAY_END: u16 = 17 * 60;
pub const DEFAULT_SLOT_STEP_MINUTES: u16 = 30;
pub const DEFAULT_UPCOMING_DAYS: u16 = 7;
pub const DEFAULT_FREE_TIME_MINUTES: u16 = 120;
pub const DEFAULT_LIGHT_SCHEDULE_THRESHOLD: usize = 3;
pub const DEFAULT_SWEEP_THRESHOLD: usize = 64;
pub const DEFAULT_LOG_DIRECTIVES: &str = "info,engine=debug";

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub workday_start_minute: u16,
    pub workday_end_minute: u16,
    pub slot_step_minutes: u16,
    pub time_zone: Tz,
    pub upcoming_days: u16,
    pub free_time_suggestion_minutes: u16,
    pub light_schedule_threshold: usize,
    /// Timed-event count at which conflict detection switches to the sweep.
    pub sweep_threshold: usize,
    pub log_directives: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            workday_start_minute: DEFAULT_WORKDAY_START,
            workday_end_minute: DEFAULT_WORKDAY_END,
            slot_step_minutes: DEFAULT_SLOT_STEP_MINUTES,
            time_zone: Tz::UTC,
            upcoming_days: DEFAULT_UPCOMING_DAYS,
            free_time_suggestion_minutes: DEFAULT_FREE_TIME_MINUTES,
            light_schedule_threshold: DEFAULT_LIGHT_SCHEDULE_THRESHOLD,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            log_directives: DEFAULT_LOG_DIRECTIVES.to_string(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> EngineResult<()> {
        for (field, value) in [
            ("workdayStartMinute", self.workday_start_minute),
            ("workdayEndMinute", self.workday_end_minute),
        ] {
            if value > MINUTES_PER_DAY {
                return Err(EngineError::validation_with_details(
                    "working-hour minute must fall within a day",
                    json!({ "field": field, "value": value }),
                ));
            }
        }

        if self.workday_start_minute >= self.workday_end_minute {
            return Err(EngineError::validation_with_details(
                "working hours must start before they end",
                json!({
                    "workdayStartMinute": self.workday_start_minute,
                    "workdayEndMinute": self.workday_end_minute,
                }),
            ));
        }

        if self.slot_step_minutes == 0 {
            return Err(EngineError::validation("slot step must be at least one minute"));
        }
        if self.upcoming_days == 0 {
            return Err(EngineError::validation("upcoming window must cover at least one day"));
        }
        if self.free_time_suggestion_minutes == 0 {
            return Err(EngineError::validation(
                "free-time suggestion duration must be positive",
            ));
        }

        Ok(())
    }

    pub fn working_hours(&self) -> WorkingHours {
        WorkingHours {
            start_minute: self.workday_start_minute,
            end_minute: self.workday_end_minute,
        }
    }

    pub fn slot_step(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_step_minutes))
    }

    pub fn free_time_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.free_time_suggestion_minutes))
    }
}

/// A daily window expressed as minutes since local midnight. An end of 1440
/// means midnight at the close of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHours {
    pub start_minute: u16,
    pub end_minute: u16,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start_minute: DEFAULT_WORKDAY_START,
            end_minute: DEFAULT_WORKDAY_END,
        }
    }
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start_minute: schedule_utils::minutes_from_midnight(start),
            end_minute: schedule_utils::minutes_from_midnight(end),
        }
    }

    pub fn length(&self) -> Duration {
        Duration::minutes(i64::from(self.end_minute) - i64::from(self.start_minute))
    }
}
