//! Time utilities: calendar days in the user's timezone.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ParseError;

pub fn parse_timezone(name: &str) -> Result<Tz, ParseError> {
    name.parse()
        .map_err(|_| ParseError::InvalidTimezone(name.to_string()))
}

/// The calendar day `dt` falls on for someone living in `tz`.
pub fn local_day(dt: DateTime<Utc>, tz: Tz) -> NaiveDate {
    dt.with_timezone(&tz).date_naive()
}

/// Parse a due date like "2025-03-10 17:00" or "2025-03-10" in `tz`, returning
/// UTC. A bare date means end of that local day.
pub fn parse_local_due_to_utc(local: &str, tz: Tz) -> Result<DateTime<Utc>, ParseError> {
    let invalid = |reason: String| ParseError::InvalidDateTime {
        input: local.to_string(),
        reason,
    };

    let ndt = match NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M") {
        Ok(ndt) => ndt,
        Err(_) => {
            let day = NaiveDate::parse_from_str(local, "%Y-%m-%d")
                .map_err(|e| invalid(e.to_string()))?;
            let eod = NaiveTime::from_hms_opt(23, 59, 0)
                .ok_or_else(|| invalid("bad end-of-day time".to_string()))?;
            day.and_time(eod)
        }
    };

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| invalid(format!("ambiguous or invalid local time (DST?) in {tz}")))?;

    Ok(local_dt.with_timezone(&Utc))
}
