//! # recur-engine
//!
//! Deterministic RFC 5545 recurrence rule evaluation.
//!
//! The engine parses an `RRULE` value (FREQ, INTERVAL, COUNT/UNTIL and the
//! nine BYxxx parts), validates how the parts combine, and lazily
//! materializes the occurrence sequence on demand: next after, previous
//! before, final, or membership of any instant.
//!
//! ```
//! use chrono::TimeZone;
//! use recur_engine::Recurrence;
//!
//! let start = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let mut recurrence = Recurrence::parse("FREQ=MONTHLY;BYDAY=-1FR", start).unwrap();
//! let first = recurrence.next_after(&start).unwrap();
//! assert_eq!(first.to_string(), "2024-01-26 00:00:00 UTC");
//! ```
//!
//! ## Modules
//!
//! - [`types`] -- Frequency, weekday, BYDAY and bounded rule-part values
//! - [`rule`] -- The immutable [`RecurrenceRule`] and its validating mutators
//! - [`parse`] -- RRULE text → [`RecurrenceRule`]
//! - [`validate`] -- Cross-part legality checks
//! - [`generator`] -- One FREQ/INTERVAL step → a batch of candidate instants
//! - [`recurrence`] -- Memoized occurrence search over a rule
//! - [`calendar`] -- Day, week and month arithmetic
//! - [`dst`] -- DST transition policies (skip, shift, etc.)
//! - [`expander`] -- RRULE string → list of concrete event instances
//! - [`error`] -- Error types

pub mod calendar;
pub mod dst;
pub mod error;
pub mod expander;
pub mod generator;
pub mod parse;
pub mod recurrence;
pub mod rule;
pub mod types;
pub mod validate;

pub use dst::DstPolicy;
pub use error::{InvalidRuleError, ParseError, RecurError, Result};
pub use expander::{
    expand_rrule, expand_rrule_with_exdates, parse_local_datetime, parse_timezone,
    ExpandedEvent,
};
pub use recurrence::{OccurrenceSearchState, Occurrences, Recurrence, SearchOptions};
pub use rule::{RecurrenceBound, RecurrenceRule};
pub use types::{BoundedList, ByDayRule, Frequency, RulePart, WeekDay};
