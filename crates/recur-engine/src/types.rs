//! Value types shared by the parser, the validator, and the generator.
//!
//! - [`Frequency`] -- the seven FREQ tokens, ordered from finest to coarsest
//! - [`WeekDay`] -- the two-letter weekday codes used by BYDAY and WKST
//! - [`ByDayRule`] -- one BYDAY entry (weekday plus optional signed ordinal)
//! - [`RulePart`] -- the numeric BYxxx parts and their RFC 5545 bound table
//! - [`BoundedList`] -- a validated list of values for one numeric part

use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::Serialize;

use crate::error::{InvalidRuleError, ParseError};

// ── Frequency ───────────────────────────────────────────────────────────────

/// The FREQ rule part. Variants are declared finest first, so `Ord` compares
/// granularity (`Secondly < Daily < Yearly`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 7] = [
        Frequency::Secondly,
        Frequency::Minutely,
        Frequency::Hourly,
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Secondly => "SECONDLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    /// Length of one step in seconds, for frequencies with a fixed-length unit.
    ///
    /// Months and years vary in length and return `None`.
    pub fn fixed_step_seconds(self) -> Option<i64> {
        match self {
            Frequency::Secondly => Some(1),
            Frequency::Minutely => Some(60),
            Frequency::Hourly => Some(3_600),
            Frequency::Daily => Some(86_400),
            Frequency::Weekly => Some(604_800),
            Frequency::Monthly | Frequency::Yearly => None,
        }
    }

    /// True for SECONDLY, MINUTELY and HOURLY.
    pub fn is_sub_daily(self) -> bool {
        self < Frequency::Daily
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ParseError;

    /// Tokens are case-sensitive: only the uppercase RFC spelling is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::ALL
            .into_iter()
            .find(|freq| freq.as_str() == s)
            .ok_or_else(|| ParseError::UnknownFrequency(s.to_string()))
    }
}

// ── WeekDay ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum WeekDay {
    #[default]
    #[serde(rename = "MO")]
    Monday,
    #[serde(rename = "TU")]
    Tuesday,
    #[serde(rename = "WE")]
    Wednesday,
    #[serde(rename = "TH")]
    Thursday,
    #[serde(rename = "FR")]
    Friday,
    #[serde(rename = "SA")]
    Saturday,
    #[serde(rename = "SU")]
    Sunday,
}

impl WeekDay {
    pub const ALL: [WeekDay; 7] = [
        WeekDay::Monday,
        WeekDay::Tuesday,
        WeekDay::Wednesday,
        WeekDay::Thursday,
        WeekDay::Friday,
        WeekDay::Saturday,
        WeekDay::Sunday,
    ];

    /// The two-letter RFC 5545 code (`MO`, `TU`, ...).
    pub fn code(self) -> &'static str {
        match self {
            WeekDay::Monday => "MO",
            WeekDay::Tuesday => "TU",
            WeekDay::Wednesday => "WE",
            WeekDay::Thursday => "TH",
            WeekDay::Friday => "FR",
            WeekDay::Saturday => "SA",
            WeekDay::Sunday => "SU",
        }
    }

    pub fn to_chrono(self) -> Weekday {
        match self {
            WeekDay::Monday => Weekday::Mon,
            WeekDay::Tuesday => Weekday::Tue,
            WeekDay::Wednesday => Weekday::Wed,
            WeekDay::Thursday => Weekday::Thu,
            WeekDay::Friday => Weekday::Fri,
            WeekDay::Saturday => Weekday::Sat,
            WeekDay::Sunday => Weekday::Sun,
        }
    }
}

impl From<Weekday> for WeekDay {
    fn from(day: Weekday) -> Self {
        WeekDay::ALL[day.num_days_from_monday() as usize]
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for WeekDay {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WeekDay::ALL
            .into_iter()
            .find(|day| day.code() == s)
            .ok_or_else(|| ParseError::InvalidWeekday(s.to_string()))
    }
}

// ── ByDayRule ───────────────────────────────────────────────────────────────

/// One BYDAY entry. An `ordinal` of 0 means every such weekday in the period;
/// a nonzero ordinal selects the nth (negative: nth from the end) one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ByDayRule {
    pub weekday: WeekDay,
    pub ordinal: i32,
}

impl ByDayRule {
    pub const MAX_ORDINAL: i32 = 53;

    pub fn every(weekday: WeekDay) -> Self {
        Self {
            weekday,
            ordinal: 0,
        }
    }

    pub fn nth(ordinal: i32, weekday: WeekDay) -> Result<Self, InvalidRuleError> {
        if ordinal == 0 || ordinal.unsigned_abs() > Self::MAX_ORDINAL.unsigned_abs() {
            return Err(InvalidRuleError::OrdinalOutOfRange(ordinal));
        }
        Ok(Self { weekday, ordinal })
    }

    pub fn has_ordinal(&self) -> bool {
        self.ordinal != 0
    }
}

impl fmt::Display for ByDayRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_ordinal() {
            write!(f, "{}{}", self.ordinal, self.weekday)
        } else {
            write!(f, "{}", self.weekday)
        }
    }
}

impl FromStr for ByDayRule {
    type Err = ParseError;

    /// Parses `[[+|-]ordinal]weekday`, e.g. `MO`, `2TU`, `-1FR`, `+3SU`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .len()
            .checked_sub(2)
            .filter(|at| s.is_char_boundary(*at))
            .ok_or_else(|| ParseError::InvalidWeekday(s.to_string()))?;
        let (prefix, code) = s.split_at(split);
        let weekday: WeekDay = code.parse()?;

        if prefix.is_empty() {
            return Ok(ByDayRule::every(weekday));
        }

        let digits = prefix.strip_prefix(['+', '-']).unwrap_or(prefix);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidWeekday(s.to_string()));
        }
        let ordinal: i32 = prefix
            .parse()
            .map_err(|_| ParseError::InvalidWeekday(s.to_string()))?;
        Ok(ByDayRule::nth(ordinal, weekday)?)
    }
}

// ── RulePart & BoundedList ──────────────────────────────────────────────────

/// The numeric BYxxx rule parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RulePart {
    BySecond,
    ByMinute,
    ByHour,
    ByMonthDay,
    ByYearDay,
    ByWeekNo,
    ByMonth,
    BySetPos,
}

impl RulePart {
    pub fn name(self) -> &'static str {
        match self {
            RulePart::BySecond => "BYSECOND",
            RulePart::ByMinute => "BYMINUTE",
            RulePart::ByHour => "BYHOUR",
            RulePart::ByMonthDay => "BYMONTHDAY",
            RulePart::ByYearDay => "BYYEARDAY",
            RulePart::ByWeekNo => "BYWEEKNO",
            RulePart::ByMonth => "BYMONTH",
            RulePart::BySetPos => "BYSETPOS",
        }
    }

    /// Inclusive bounds on a value's magnitude.
    pub fn bounds(self) -> (i32, i32) {
        match self {
            RulePart::BySecond | RulePart::ByMinute => (0, 59),
            RulePart::ByHour => (0, 23),
            RulePart::ByMonthDay => (1, 31),
            RulePart::ByYearDay | RulePart::BySetPos => (1, 366),
            RulePart::ByWeekNo => (1, 53),
            RulePart::ByMonth => (1, 12),
        }
    }

    /// Whether negative values (counting back from the end of the period) are legal.
    pub fn is_signed(self) -> bool {
        !matches!(
            self,
            RulePart::BySecond | RulePart::ByMinute | RulePart::ByHour
        )
    }

    pub fn check(self, value: i32) -> Result<i32, InvalidRuleError> {
        let (min, max) = self.bounds();
        let in_range = if self.is_signed() {
            (min.unsigned_abs()..=max.unsigned_abs()).contains(&value.unsigned_abs())
        } else {
            (min..=max).contains(&value)
        };
        if !in_range {
            let min = if self.is_signed() { -max } else { min };
            return Err(InvalidRuleError::ValueOutOfRange {
                part: self,
                value,
                min,
                max,
            });
        }
        Ok(value)
    }
}

impl fmt::Display for RulePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered, duplicate-free list of values for one numeric rule part.
///
/// Every value is checked against [`RulePart::bounds`] on insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedList {
    part: RulePart,
    values: Vec<i32>,
}

impl BoundedList {
    pub fn new(part: RulePart) -> Self {
        Self {
            part,
            values: Vec::new(),
        }
    }

    pub fn from_values(
        part: RulePart,
        values: impl IntoIterator<Item = i32>,
    ) -> Result<Self, InvalidRuleError> {
        let mut list = Self::new(part);
        for value in values {
            list.push(value)?;
        }
        Ok(list)
    }

    pub fn push(&mut self, value: i32) -> Result<(), InvalidRuleError> {
        self.part.check(value)?;
        if !self.values.contains(&value) {
            self.values.push(value);
        }
        Ok(())
    }

    pub fn part(&self) -> RulePart {
        self.part
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether `actual` (1-based position within a period of `len` units) is
    /// selected. Negative values count from the end; a magnitude larger than
    /// the period selects nothing.
    pub fn selects(&self, actual: u32, len: u32) -> bool {
        self.values
            .iter()
            .any(|&value| resolve_signed(value, len) == Some(actual))
    }

    /// Membership test for the unsigned time-of-day parts.
    pub fn contains(&self, value: u32) -> bool {
        self.values.iter().any(|&v| v as u32 == value)
    }

    /// Values as sorted `u32`s, for the unsigned time-of-day parts.
    pub(crate) fn sorted_unsigned(&self) -> Vec<u32> {
        let mut out: Vec<u32> = self.values.iter().map(|&v| v as u32).collect();
        out.sort_unstable();
        out
    }
}

impl fmt::Display for BoundedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// Resolve a signed 1-based position against a period of `len` units.
pub(crate) fn resolve_signed(value: i32, len: u32) -> Option<u32> {
    let len = len as i64;
    let value = value as i64;
    let resolved = if value > 0 { value } else { len + 1 + value };
    (1..=len).contains(&resolved).then_some(resolved as u32)
}

// ── Tests ───────────────────────────────────────────────────────────────────
