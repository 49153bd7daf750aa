//! The immutable [`RecurrenceRule`] value.
//!
//! A rule is built by [`RecurrenceRule::parse`] or [`RecurrenceRule::new`]
//! and changed only through the `with_*` mutators. Each mutator validates the
//! modified copy before returning it, so a failed mutation leaves the
//! original untouched and no rule ever holds an illegal combination of parts.

use std::fmt;

use chrono::{DateTime, Datelike, SubsecRound, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::Result;
use crate::types::{BoundedList, ByDayRule, Frequency, RulePart, WeekDay};
use crate::validate::validate;

/// How the occurrence sequence ends. COUNT and UNTIL are mutually exclusive,
/// so a rule carries at most one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecurrenceBound {
    #[default]
    Unbounded,
    Count(u32),
    Until(DateTime<Tz>),
}

/// One RFC 5545 `RRULE`, anchored at a start instant in a timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceRule {
    pub(crate) frequency: Frequency,
    pub(crate) interval: u32,
    pub(crate) bound: RecurrenceBound,
    pub(crate) by_second: BoundedList,
    pub(crate) by_minute: BoundedList,
    pub(crate) by_hour: BoundedList,
    pub(crate) by_day: Vec<ByDayRule>,
    pub(crate) by_month_day: BoundedList,
    pub(crate) by_year_day: BoundedList,
    pub(crate) by_week_no: BoundedList,
    pub(crate) by_month: BoundedList,
    pub(crate) by_set_pos: BoundedList,
    pub(crate) week_start: WeekDay,
    pub(crate) start: DateTime<Tz>,
}

impl RecurrenceRule {
    /// A rule with no BYxxx parts, interval 1, and no end.
    ///
    /// Occurrences have whole-second resolution, so any fraction of a second
    /// in `start` is truncated.
    pub fn new(frequency: Frequency, start: DateTime<Tz>) -> Self {
        let start = start.trunc_subsecs(0);
        Self {
            frequency,
            interval: 1,
            bound: RecurrenceBound::Unbounded,
            by_second: BoundedList::new(RulePart::BySecond),
            by_minute: BoundedList::new(RulePart::ByMinute),
            by_hour: BoundedList::new(RulePart::ByHour),
            by_day: Vec::new(),
            by_month_day: BoundedList::new(RulePart::ByMonthDay),
            by_year_day: BoundedList::new(RulePart::ByYearDay),
            by_week_no: BoundedList::new(RulePart::ByWeekNo),
            by_month: BoundedList::new(RulePart::ByMonth),
            by_set_pos: BoundedList::new(RulePart::BySetPos),
            week_start: WeekDay::Monday,
            start,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn bound(&self) -> RecurrenceBound {
        self.bound
    }

    pub fn count(&self) -> Option<u32> {
        match self.bound {
            RecurrenceBound::Count(count) => Some(count),
            _ => None,
        }
    }

    pub fn until(&self) -> Option<DateTime<Tz>> {
        match self.bound {
            RecurrenceBound::Until(until) => Some(until),
            _ => None,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.bound != RecurrenceBound::Unbounded
    }

    pub fn by_second(&self) -> &BoundedList {
        &self.by_second
    }

    pub fn by_minute(&self) -> &BoundedList {
        &self.by_minute
    }

    pub fn by_hour(&self) -> &BoundedList {
        &self.by_hour
    }

    pub fn by_day(&self) -> &[ByDayRule] {
        &self.by_day
    }

    pub fn by_month_day(&self) -> &BoundedList {
        &self.by_month_day
    }

    pub fn by_year_day(&self) -> &BoundedList {
        &self.by_year_day
    }

    pub fn by_week_no(&self) -> &BoundedList {
        &self.by_week_no
    }

    pub fn by_month(&self) -> &BoundedList {
        &self.by_month
    }

    pub fn by_set_pos(&self) -> &BoundedList {
        &self.by_set_pos
    }

    pub fn week_start(&self) -> WeekDay {
        self.week_start
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn time_zone(&self) -> Tz {
        self.start.timezone()
    }

    /// True when any BYxxx part other than BYSETPOS is present.
    pub fn has_by_parts(&self) -> bool {
        !(self.by_second.is_empty()
            && self.by_minute.is_empty()
            && self.by_hour.is_empty()
            && self.by_day.is_empty()
            && self.by_month_day.is_empty()
            && self.by_year_day.is_empty()
            && self.by_week_no.is_empty()
            && self.by_month.is_empty())
    }

    // ── Mutators ────────────────────────────────────────────────────────

    pub fn with_frequency(mut self, frequency: Frequency) -> Result<Self> {
        self.frequency = frequency;
        self.commit()
    }

    pub fn with_interval(mut self, interval: u32) -> Result<Self> {
        self.interval = interval;
        self.commit()
    }

    /// Bound the rule to `count` occurrences, clearing any UNTIL.
    pub fn with_count(mut self, count: u32) -> Result<Self> {
        self.bound = RecurrenceBound::Count(count);
        self.commit()
    }

    /// Bound the rule at `until` (inclusive), clearing any COUNT.
    pub fn with_until<T: chrono::TimeZone>(mut self, until: DateTime<T>) -> Result<Self> {
        self.bound = RecurrenceBound::Until(until.with_timezone(&self.time_zone()));
        self.commit()
    }

    pub fn with_unbounded(mut self) -> Result<Self> {
        self.bound = RecurrenceBound::Unbounded;
        self.commit()
    }

    pub fn with_by_second(mut self, values: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.by_second = BoundedList::from_values(RulePart::BySecond, values)?;
        self.commit()
    }

    pub fn with_by_minute(mut self, values: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.by_minute = BoundedList::from_values(RulePart::ByMinute, values)?;
        self.commit()
    }

    pub fn with_by_hour(mut self, values: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.by_hour = BoundedList::from_values(RulePart::ByHour, values)?;
        self.commit()
    }

    pub fn with_by_day(mut self, rules: impl IntoIterator<Item = ByDayRule>) -> Result<Self> {
        self.by_day.clear();
        for rule in rules {
            if !self.by_day.contains(&rule) {
                self.by_day.push(rule);
            }
        }
        self.commit()
    }

    pub fn with_by_month_day(mut self, values: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.by_month_day = BoundedList::from_values(RulePart::ByMonthDay, values)?;
        self.commit()
    }

    pub fn with_by_year_day(mut self, values: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.by_year_day = BoundedList::from_values(RulePart::ByYearDay, values)?;
        self.commit()
    }

    pub fn with_by_week_no(mut self, values: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.by_week_no = BoundedList::from_values(RulePart::ByWeekNo, values)?;
        self.commit()
    }

    pub fn with_by_month(mut self, values: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.by_month = BoundedList::from_values(RulePart::ByMonth, values)?;
        self.commit()
    }

    pub fn with_by_set_pos(mut self, values: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.by_set_pos = BoundedList::from_values(RulePart::BySetPos, values)?;
        self.commit()
    }

    pub fn with_week_start(mut self, week_start: WeekDay) -> Result<Self> {
        self.week_start = week_start;
        self.commit()
    }

    /// Re-anchor the rule. An UNTIL bound is carried over into the new zone.
    pub fn with_start(mut self, start: DateTime<Tz>) -> Result<Self> {
        let tz = start.timezone();
        if let RecurrenceBound::Until(until) = self.bound {
            self.bound = RecurrenceBound::Until(until.with_timezone(&tz));
        }
        self.start = start.trunc_subsecs(0);
        self.commit()
    }

    fn commit(self) -> Result<Self> {
        validate(&self)?;
        Ok(self)
    }
}

impl fmt::Display for RecurrenceRule {
    /// Canonical RRULE text: FREQ, UNTIL (UTC), COUNT, INTERVAL, BYSECOND,
    /// BYMINUTE, BYHOUR, BYDAY, BYMONTHDAY, BYYEARDAY, BYWEEKNO, BYMONTH,
    /// BYSETPOS, WKST. Defaults (INTERVAL=1, WKST=MO) are omitted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency)?;
        match self.bound {
            RecurrenceBound::Unbounded => {}
            RecurrenceBound::Count(count) => write!(f, ";COUNT={count}")?,
            RecurrenceBound::Until(until) => {
                let utc = until.with_timezone(&Utc);
                write!(
                    f,
                    ";UNTIL={:04}{:02}{:02}T{:02}{:02}{:02}Z",
                    utc.year(),
                    utc.month(),
                    utc.day(),
                    utc.hour(),
                    utc.minute(),
                    utc.second()
                )?;
            }
        }
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        for list in [&self.by_second, &self.by_minute, &self.by_hour] {
            write_list(f, list)?;
        }
        if !self.by_day.is_empty() {
            f.write_str(";BYDAY=")?;
            for (i, rule) in self.by_day.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{rule}")?;
            }
        }
        for list in [
            &self.by_month_day,
            &self.by_year_day,
            &self.by_week_no,
            &self.by_month,
            &self.by_set_pos,
        ] {
            write_list(f, list)?;
        }
        if self.week_start != WeekDay::Monday {
            write!(f, ";WKST={}", self.week_start)?;
        }
        Ok(())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, list: &BoundedList) -> fmt::Result {
    if list.is_empty() {
        return Ok(());
    }
    write!(f, ";{}={}", list.part(), list)
}

// ── Tests ───────────────────────────────────────────────────────────────────
