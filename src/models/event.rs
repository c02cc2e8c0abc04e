use std::fmt;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Recurrence is stored as a label only. Series are never expanded, so a
/// recurring event occupies a single interval for conflicts and availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekdays,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn label(self) -> &'static str {
        match self {
            Recurrence::None => "Never",
            Recurrence::Daily => "Every Day",
            Recurrence::Weekdays => "Every Weekday",
            Recurrence::Weekly => "Every Week",
            Recurrence::Biweekly => "Every 2 Weeks",
            Recurrence::Monthly => "Every Month",
            Recurrence::Yearly => "Every Year",
        }
    }

    pub fn is_recurring(self) -> bool {
        !matches!(self, Recurrence::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventColor {
    #[default]
    Blue,
    Green,
    Orange,
    Red,
    Purple,
    Pink,
    Teal,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

impl Location {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            coordinate: None,
        }
    }
}

/// Named reminder offsets, applied relative to the event start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertOffset {
    AtStart,
    FiveMinutes,
    TenMinutes,
    #[default]
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    OneDay,
    TwoDays,
    OneWeek,
}

impl AlertOffset {
    pub fn offset(self) -> Duration {
        match self {
            AlertOffset::AtStart => Duration::zero(),
            AlertOffset::FiveMinutes => Duration::minutes(-5),
            AlertOffset::TenMinutes => Duration::minutes(-10),
            AlertOffset::FifteenMinutes => Duration::minutes(-15),
            AlertOffset::ThirtyMinutes => Duration::minutes(-30),
            AlertOffset::OneHour => Duration::hours(-1),
            AlertOffset::TwoHours => Duration::hours(-2),
            AlertOffset::OneDay => Duration::days(-1),
            AlertOffset::TwoDays => Duration::days(-2),
            AlertOffset::OneWeek => Duration::weeks(-1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AlertOffset::AtStart => "At time of event",
            AlertOffset::FiveMinutes => "5 minutes before",
            AlertOffset::TenMinutes => "10 minutes before",
            AlertOffset::FifteenMinutes => "15 minutes before",
            AlertOffset::ThirtyMinutes => "30 minutes before",
            AlertOffset::OneHour => "1 hour before",
            AlertOffset::TwoHours => "2 hours before",
            AlertOffset::OneDay => "1 day before",
            AlertOffset::TwoDays => "2 days before",
            AlertOffset::OneWeek => "1 week before",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub offset: AlertOffset,
    /// Overrides `offset` when present. Negative values fire before the start.
    #[serde(default)]
    pub custom_offset_seconds: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Alert {
    pub fn new(offset: AlertOffset) -> Self {
        Self {
            id: AlertId::new(),
            offset,
            custom_offset_seconds: None,
            message: None,
        }
    }

    pub fn custom(offset_seconds: i64) -> Self {
        Self {
            custom_offset_seconds: Some(offset_seconds),
            ..Self::new(AlertOffset::AtStart)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// `None` when the custom offset does not fit a chrono duration.
    pub fn effective_offset(&self) -> Option<Duration> {
        match self.custom_offset_seconds {
            Some(seconds) => Duration::try_seconds(seconds),
            None => Some(self.offset.offset()),
        }
    }

    /// `None` when the offset or the resulting instant is out of range.
    pub fn trigger_at(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        start.checked_add_signed(self.effective_offset()?)
    }

    pub fn display_text(&self) -> String {
        if let Some(message) = self.message.as_ref().filter(|m| !m.trim().is_empty()) {
            return message.clone();
        }
        match self.custom_offset_seconds {
            Some(seconds) => describe_offset(seconds),
            None => self.offset.label().to_string(),
        }
    }
}

fn describe_offset(seconds: i64) -> String {
    let minutes = seconds.abs() / 60;
    match seconds.signum() {
        0 => "At time of event".to_string(),
        -1 => format!("{minutes} minutes before"),
        _ => format!("{minutes} minutes after"),
    }
}

/// Construction input for a new event. `start` is optional here so that a
/// missing start is reported as a validation failure rather than defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub color: EventColor,
    #[serde(default = "default_time_zone")]
    pub time_zone: Tz,
}

fn default_time_zone() -> Tz {
    Tz::UTC
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            start: Some(start),
            ..Self::untimed(String::new())
        }
    }

    pub fn untimed(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            start: None,
            end: None,
            is_all_day: false,
            notes: None,
            location: None,
            url: None,
            recurrence: Recurrence::None,
            alerts: Vec::new(),
            priority: Priority::Normal,
            color: EventColor::Blue,
            time_zone: Tz::UTC,
        }
    }

    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn all_day(mut self) -> Self {
        self.is_all_day = true;
        self
    }

    pub fn with_alert(mut self, alert: Alert) -> Self {
        self.alerts.push(alert);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub(crate) id: EventId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    pub notes: Option<String>,
    pub location: Option<Location>,
    pub url: Option<String>,
    pub recurrence: Recurrence,
    pub alerts: Vec<Alert>,
    pub priority: Priority,
    pub color: EventColor,
    pub time_zone: Tz,
    pub(crate) conflicted: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) modified_at: DateTime<Utc>,
}

impl Event {
    /// Builds a record from a draft whose start has already been checked.
    pub(crate) fn from_draft(
        draft: EventDraft,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<Self> {
        let end = match draft.end {
            Some(end) => end,
            None => default_end(start, draft.is_all_day)?,
        };
        let mut event = Self {
            id: EventId::new(),
            title: draft.title,
            start,
            end,
            is_all_day: draft.is_all_day,
            notes: draft.notes,
            location: draft.location,
            url: draft.url,
            recurrence: draft.recurrence,
            alerts: draft.alerts,
            priority: draft.priority,
            color: draft.color,
            time_zone: draft.time_zone,
            conflicted: false,
            created_at: now,
            modified_at: now,
        };
        event.correct_end()?;
        event.ensure_alerts_in_range()?;
        Ok(event)
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn is_conflicted(&self) -> bool {
        self.conflicted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Moves the start. When the new start lands on or after the current end,
    /// the end is pushed to one hour (one day for all-day events) later.
    pub fn set_start(&mut self, start: DateTime<Utc>) -> EngineResult<()> {
        let end = if self.end <= start {
            default_end(start, self.is_all_day)?
        } else {
            self.end
        };
        self.start = start;
        self.end = end;
        Ok(())
    }

    /// Returns whether the end had to be moved.
    pub(crate) fn correct_end(&mut self) -> EngineResult<bool> {
        if self.end <= self.start {
            self.end = default_end(self.start, self.is_all_day)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Rejects alerts whose trigger time cannot be represented.
    pub(crate) fn ensure_alerts_in_range(&self) -> EngineResult<()> {
        match self
            .alerts
            .iter()
            .find(|alert| alert.trigger_at(self.start).is_none())
        {
            Some(alert) => Err(EngineError::validation_with_details(
                "alert offset is out of range",
                json!({
                    "alertId": alert.id.to_string(),
                    "customOffsetSeconds": alert.custom_offset_seconds,
                }),
            )),
            None => Ok(()),
        }
    }

    pub fn is_timed(&self) -> bool {
        !self.is_all_day
    }

    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

fn default_length(is_all_day: bool) -> Duration {
    if is_all_day {
        Duration::days(1)
    } else {
        Duration::hours(1)
    }
}

fn default_end(start: DateTime<Utc>, is_all_day: bool) -> EngineResult<DateTime<Utc>> {
    start
        .checked_add_signed(default_length(is_all_day))
        .ok_or_else(|| {
            EngineError::validation_with_details(
                "event start is too late to derive an end",
                json!({ "start": start.to_rfc3339() }),
            )
        })
}
