//! Date and time helpers for the calendar tools

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use call_agent_core::ToolError;

/// Longest bookable appointment
pub const MAX_DURATION_MINUTES: i64 = 8 * 60;

/// A requested slot, resolved in the business timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Resolve `date` (YYYY-MM-DD) and `time` (HH:MM) in `tz`
pub fn parse_slot(tz: Tz, date: &str, time: &str, duration_minutes: i64) -> Result<Slot, ToolError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| ToolError::invalid_params("date must be in format YYYY-MM-DD"))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| ToolError::invalid_params("time must be in format HH:MM"))?;

    if !(1..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(ToolError::invalid_params(format!(
            "duration_minutes must be between 1 and {}",
            MAX_DURATION_MINUTES
        )));
    }

    // Ambiguous local times (DST fold) take the earlier instant
    let start = tz
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or_else(|| ToolError::invalid_params(format!("{} {} does not exist in {}", date, time, tz)))?
        .with_timezone(&Utc);

    Ok(Slot {
        start,
        end: start + Duration::minutes(duration_minutes),
    })
}

/// RFC 3339 in the business timezone
pub fn local_rfc3339(tz: Tz, instant: DateTime<Utc>) -> String {
    instant.with_timezone(&tz).to_rfc3339()
}
