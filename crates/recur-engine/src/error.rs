//! Error types for recurrence rule parsing, validation, and evaluation.

use thiserror::Error;

use crate::types::{Frequency, RulePart};

/// A syntactically valid rule whose parts violate an RFC 5545 constraint.
///
/// Raised by the parser after a rule is assembled, and by every
/// `RecurrenceRule::with_*` mutator before the new rule is committed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRuleError {
    #[error("{part} value {value} is out of range [{min}, {max}]")]
    ValueOutOfRange {
        part: RulePart,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("BYDAY ordinal {0} is out of range [1, 53]")]
    OrdinalOutOfRange(i32),

    #[error("INTERVAL must be at least 1")]
    ZeroInterval,

    #[error("COUNT must be at least 1")]
    ZeroCount,

    #[error("COUNT and UNTIL must not both be set")]
    CountWithUntil,

    #[error("BYMONTHDAY is not allowed with FREQ=WEEKLY")]
    ByMonthDayWithWeekly,

    #[error("BYYEARDAY is not allowed with FREQ={0}")]
    ByYearDayWithFrequency(Frequency),

    #[error("BYWEEKNO is only allowed with FREQ=YEARLY, not FREQ={0}")]
    ByWeekNoRequiresYearly(Frequency),

    #[error("BYSETPOS requires at least one other BYxxx rule part")]
    BySetPosWithoutOtherPart,

    #[error("numeric BYDAY ordinals are only allowed with FREQ=MONTHLY or FREQ=YEARLY, not FREQ={0}")]
    ByDayOrdinalWithFrequency(Frequency),

    #[error("numeric BYDAY ordinals are not allowed with FREQ=YEARLY and BYWEEKNO")]
    ByDayOrdinalWithByWeekNo,
}

/// Syntax failures found while reading an RRULE string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing FREQ rule part")]
    MissingFrequency,

    #[error("unknown frequency '{0}'")]
    UnknownFrequency(String),

    #[error("malformed rule part '{0}'")]
    MalformedPart(String),

    #[error("rule part {0} given more than once")]
    DuplicatePart(String),

    #[error("invalid integer '{value}' in {part}")]
    InvalidInteger { part: String, value: String },

    #[error("invalid weekday '{0}'")]
    InvalidWeekday(String),

    #[error("invalid UNTIL value '{0}'")]
    InvalidUntil(String),

    #[error(transparent)]
    Rule(#[from] InvalidRuleError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecurError {
    #[error("Invalid RRULE '{rule}': {source}")]
    Parse {
        rule: String,
        #[source]
        source: ParseError,
    },

    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] InvalidRuleError),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),
}

impl RecurError {
    pub(crate) fn parse(rule: &str, source: impl Into<ParseError>) -> Self {
        RecurError::Parse {
            rule: rule.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecurError>;
