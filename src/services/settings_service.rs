use std::path::Path;
use std::sync::RwLock;

use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::settings::EngineSettings;

#[derive(Debug, Default, Clone)]
pub struct SettingsUpdateInput {
    pub workday_start_minute: Option<u16>,
    pub workday_end_minute: Option<u16>,
    pub slot_step_minutes: Option<u16>,
    pub time_zone: Option<String>,
    pub upcoming_days: Option<u16>,
    pub free_time_suggestion_minutes: Option<u16>,
    pub light_schedule_threshold: Option<usize>,
    pub sweep_threshold: Option<usize>,
}

pub struct SettingsService {
    cache: RwLock<EngineSettings>,
}

impl Default for SettingsService {
    fn default() -> Self {
        Self {
            cache: RwLock::new(EngineSettings::default()),
        }
    }
}

impl SettingsService {
    pub fn new(settings: EngineSettings) -> EngineResult<Self> {
        settings.validate()?;
        Ok(Self {
            cache: RwLock::new(settings),
        })
    }

    pub fn from_yaml_str(raw: &str) -> EngineResult<Self> {
        let settings: EngineSettings = if raw.trim().is_empty() {
            EngineSettings::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        Self::new(settings)
    }

    /// Loads settings from a YAML file. A missing file yields the defaults.
    pub fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                target: "engine::settings",
                path = %path.display(),
                "settings file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let service = Self::from_yaml_str(&raw)?;
        debug!(target: "engine::settings", path = %path.display(), "settings loaded");
        Ok(service)
    }

    pub fn get(&self) -> EngineSettings {
        match self.cache.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn!(target: "engine::settings", "settings lock poisoned, reading last value");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn update(&self, input: SettingsUpdateInput) -> EngineResult<EngineSettings> {
        let mut next = self.get();

        if let Some(start) = input.workday_start_minute {
            next.workday_start_minute = start;
        }
        if let Some(end) = input.workday_end_minute {
            next.workday_end_minute = end;
        }
        if let Some(step) = input.slot_step_minutes {
            next.slot_step_minutes = step;
        }
        if let Some(zone) = input.time_zone.as_ref() {
            next.time_zone = parse_time_zone(zone)?;
        }
        if let Some(days) = input.upcoming_days {
            next.upcoming_days = days;
        }
        if let Some(minutes) = input.free_time_suggestion_minutes {
            next.free_time_suggestion_minutes = minutes;
        }
        if let Some(threshold) = input.light_schedule_threshold {
            next.light_schedule_threshold = threshold;
        }
        if let Some(threshold) = input.sweep_threshold {
            next.sweep_threshold = threshold;
        }

        next.validate()?;

        let mut guard = self
            .cache
            .write()
            .map_err(|_| EngineError::other("settings lock poisoned"))?;
        *guard = next.clone();
        info!(target: "engine::settings", "settings updated");
        Ok(next)
    }

    pub fn to_yaml(&self) -> EngineResult<String> {
        Ok(serde_yaml::to_string(&self.get())?)
    }
}

fn parse_time_zone(raw: &str) -> EngineResult<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|err| EngineError::config(format!("unknown time zone {raw:?}: {err}")))
}
