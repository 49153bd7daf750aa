//! DST transition policies for recurring events.
//!
//! Candidates are generated as wall-clock times and resolved to instants in
//! the rule's zone only at the end. A wall-clock time can be missing (spring
//! forward gap) or repeated (fall back overlap); this module decides what
//! happens in each case.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Policy for handling events that fall during DST transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Skip instances that fall in the DST gap (e.g., 2:30 AM during spring forward)
    Skip,
    /// Shift to the next valid time after the gap
    ShiftForward,
    /// Use wall clock time (keep the pre-transition UTC offset, so 2:30 AM becomes 3:30 AM)
    #[default]
    WallClock,
}

/// Longest gap scanned by [`DstPolicy::ShiftForward`], in minutes.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Resolve a wall-clock time to an instant in `tz`.
///
/// Ambiguous times resolve to the earlier instant under every policy.
pub fn resolve_local(tz: &Tz, local: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => match policy {
            DstPolicy::Skip => None,
            DstPolicy::ShiftForward => shift_past_gap(tz, local),
            DstPolicy::WallClock => keep_prior_offset(tz, local),
        },
    }
}

fn shift_past_gap(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    (1..=MAX_GAP_MINUTES).find_map(|minutes| {
        let probe = local.checked_add_signed(Duration::minutes(minutes))?;
        let probe = probe.with_second(0)?.with_nanosecond(0)?;
        tz.from_local_datetime(&probe).earliest()
    })
}

fn keep_prior_offset(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    let before = local.checked_sub_signed(Duration::days(1))?;
    let offset = tz.offset_from_local_datetime(&before).earliest()?.fix();
    let utc = local.checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))?;
    Some(tz.from_utc_datetime(&utc))
}

// ── Tests ───────────────────────────────────────────────────────────────────
