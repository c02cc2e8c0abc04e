use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::event::Event;

/// A candidate window produced by the availability search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotRecommendation {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub confidence: f32,
    pub reason: String,
    #[serde(default)]
    pub conflicting_events: Vec<Event>,
}

impl TimeSlotRecommendation {
    pub fn is_free(&self) -> bool {
        self.conflicting_events.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionKind {
    FindTime,
    ConflictResolution,
    SmartSchedule,
}

impl SuggestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionKind::FindTime => "find-time",
            SuggestionKind::ConflictResolution => "conflict-resolution",
            SuggestionKind::SmartSchedule => "smart-schedule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub title: String,
    pub description: String,
    pub confidence: f32,
    #[serde(default)]
    pub action_params: BTreeMap<String, String>,
    #[serde(default)]
    pub related_events: Vec<Event>,
}
