use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::event::{Alert, AlertId, Event, EventId};

/// Composite key `eventId:alertId` under which a reminder is registered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerKey(String);

impl TriggerKey {
    pub fn new(event_id: EventId, alert_id: AlertId) -> Self {
        Self(format!("{event_id}:{alert_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPayload {
    pub event_id: EventId,
    pub alert_id: AlertId,
    pub title: String,
    pub subtitle: String,
}

impl TriggerPayload {
    pub fn for_alert(event: &Event, alert: &Alert) -> Self {
        Self {
            event_id: event.id(),
            alert_id: alert.id,
            title: event.title.clone(),
            subtitle: alert.display_text(),
        }
    }
}

/// A reminder whose trigger time has elapsed in the local trigger service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiredReminder {
    pub key: TriggerKey,
    pub trigger_at: DateTime<Utc>,
    pub payload: TriggerPayload,
}
