use chrono::{offset::LocalResult, DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde_json::json;

use crate::error::{EngineError, EngineResult};

/// Resolves a wall-clock time on `date` in `tz`. Ambiguous times (clocks going
/// back) take the earlier instant; times skipped by a DST jump are rejected.
pub fn local_datetime(tz: Tz, date: NaiveDate, time: NaiveTime) -> EngineResult<DateTime<Utc>> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, _) => Ok(first.with_timezone(&Utc)),
        LocalResult::None => Err(EngineError::validation_with_details(
            "local time does not exist in time zone",
            json!({ "date": date.to_string(), "time": time.to_string(), "timeZone": tz.name() }),
        )),
    }
}

/// Same as [`local_datetime`] but takes minutes since midnight, where 1440
/// denotes the following midnight.
pub fn local_minute(tz: Tz, date: NaiveDate, minute: u16) -> EngineResult<DateTime<Utc>> {
    if minute >= 24 * 60 {
        let next = date
            .succ_opt()
            .ok_or_else(|| EngineError::validation("date is out of range"))?;
        return local_datetime(tz, next, NaiveTime::MIN);
    }
    local_datetime(tz, date, minutes_to_time(minute)?)
}

/// Half-open `[start, end)` bounds of a calendar day in `tz`.
pub fn day_bounds(tz: Tz, date: NaiveDate) -> EngineResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_datetime(tz, date, NaiveTime::MIN)?;
    let next = date
        .succ_opt()
        .ok_or_else(|| EngineError::validation("date is out of range"))?;
    let end = local_datetime(tz, next, NaiveTime::MIN)?;
    Ok((start, end))
}

pub fn local_date(tz: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Strict overlap: intervals that only touch at an endpoint do not overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

pub fn ensure_positive(duration: Duration, what: &str) -> EngineResult<()> {
    if duration <= Duration::zero() {
        Err(EngineError::validation_with_details(
            format!("{what} must be positive"),
            json!({ "seconds": duration.num_seconds() }),
        ))
    } else {
        Ok(())
    }
}

pub fn ensure_window(start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<()> {
    if end <= start {
        Err(EngineError::validation_with_details(
            "window must end after it starts",
            json!({ "start": start.to_rfc3339(), "end": end.to_rfc3339() }),
        ))
    } else {
        Ok(())
    }
}

pub fn minutes_from_midnight(time: NaiveTime) -> u16 {
    (time.hour() * 60 + time.minute()) as u16
}

pub fn minutes_to_time(total_minutes: u16) -> EngineResult<NaiveTime> {
    let hours = u32::from(total_minutes / 60);
    let minutes = u32::from(total_minutes % 60);
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(|| {
        EngineError::validation_with_details(
            "minute of day is out of range",
            json!({ "minute": total_minutes }),
        )
    })
}

pub fn format_clock(tz: Tz, instant: DateTime<Utc>) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}
