//! RRULE expansion -- converts recurrence rule strings into concrete event instances.
//!
//! A string-in, UTC-out convenience layer over [`Recurrence`] for hosts that
//! store events as local datetime strings plus an IANA zone name.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::dst::{resolve_local, DstPolicy};
use crate::error::{ParseError, RecurError, Result};
use crate::recurrence::Recurrence;

/// Upper bound on instances returned when the caller gives no `count`.
pub const MAX_EXPANDED_INSTANCES: usize = 500;

const LOCAL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single expanded event instance with start and end times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandedEvent {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Parse an IANA zone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| RecurError::InvalidTimezone(name.to_string()))
}

/// Parse a local datetime string (e.g. "2026-02-17T14:00:00") in `tz`.
///
/// A time inside a DST gap is moved forward by the gap length; an ambiguous
/// time resolves to the earlier instant.
pub fn parse_local_datetime(text: &str, tz: &Tz) -> Result<DateTime<Tz>> {
    let local = NaiveDateTime::parse_from_str(text, LOCAL_DATETIME_FORMAT)
        .map_err(|_| RecurError::InvalidDatetime(text.to_string()))?;
    resolve_local(tz, local, DstPolicy::WallClock)
        .ok_or_else(|| RecurError::InvalidDatetime(text.to_string()))
}

/// Expand an RRULE string into concrete datetime instances.
///
/// # Arguments
/// - `rrule` -- RFC 5545 RRULE string (e.g., "FREQ=WEEKLY;BYDAY=TU,TH")
/// - `dtstart` -- Local datetime string (e.g., "2026-02-17T14:00:00")
/// - `duration_minutes` -- Duration of each instance in minutes
/// - `timezone` -- IANA timezone (e.g., "America/Los_Angeles")
/// - `until` -- Optional inclusive end boundary (local datetime string)
/// - `count` -- Optional maximum number of instances returned
///
/// # Errors
/// Returns `RecurError::Parse` if the RRULE string is empty or unparseable.
/// Returns `RecurError::InvalidTimezone` if the timezone is not a valid IANA identifier.
/// Returns `RecurError::InvalidDatetime` if `dtstart` or `until` is malformed.
///
/// # Example
///
/// ```
/// use recur_engine::expand_rrule;
///
/// let events = expand_rrule(
///     "FREQ=DAILY;COUNT=3",
///     "2026-03-01T09:00:00",
///     30,
///     "UTC",
///     None,
///     None,
/// )
/// .unwrap();
/// assert_eq!(events.len(), 3);
/// ```
pub fn expand_rrule(
    rrule: &str,
    dtstart: &str,
    duration_minutes: u32,
    timezone: &str,
    until: Option<&str>,
    count: Option<u32>,
) -> Result<Vec<ExpandedEvent>> {
    expand_rrule_with_exdates(
        rrule,
        dtstart,
        duration_minutes,
        timezone,
        until,
        count,
        &[],
    )
}

/// Expand an RRULE string into concrete datetime instances, with EXDATE exclusions.
///
/// Identical to [`expand_rrule`] but skips the given exception dates
/// (RFC 5545 Section 3.8.5.1). Excluded instances still count toward the
/// rule's own COUNT; the `count` argument caps what is returned after
/// exclusion.
///
/// # Errors
/// As [`expand_rrule`], plus `RecurError::InvalidDatetime` for a malformed exdate.
pub fn expand_rrule_with_exdates(
    rrule: &str,
    dtstart: &str,
    duration_minutes: u32,
    timezone: &str,
    until: Option<&str>,
    count: Option<u32>,
    exdates: &[&str],
) -> Result<Vec<ExpandedEvent>> {
    if rrule.trim().is_empty() {
        return Err(RecurError::parse(rrule, ParseError::MissingFrequency));
    }

    // Caller explicitly wants zero instances.
    if count == Some(0) {
        return Ok(Vec::new());
    }

    let tz = parse_timezone(timezone)?;
    let start = parse_local_datetime(dtstart, &tz)?;
    let until = until
        .map(|text| parse_local_datetime(text, &tz))
        .transpose()?;
    let exclusions = exdates
        .iter()
        .map(|text| parse_local_datetime(text, &tz))
        .collect::<Result<Vec<_>>>()?;

    let mut recurrence = Recurrence::parse(rrule, start)?.with_exclusions(exclusions);
    let limit = count.map_or(MAX_EXPANDED_INSTANCES, |count| count as usize);
    let duration = Duration::minutes(i64::from(duration_minutes));
    let cursor = start
        .checked_sub_signed(Duration::seconds(1))
        .ok_or_else(|| RecurError::InvalidDatetime(dtstart.to_string()))?;

    let events: Vec<ExpandedEvent> = recurrence
        .iter_after(&cursor)
        .take_while(|at| until.map_or(true, |until| *at <= until))
        .take(limit)
        .map(|at| {
            let start = at.with_timezone(&Utc);
            ExpandedEvent {
                start,
                end: start + duration,
            }
        })
        .collect();

    debug!(
        rrule,
        timezone,
        instances = events.len(),
        "expanded recurrence"
    );
    Ok(events)
}

// ── Tests ───────────────────────────────────────────────────────────────────
