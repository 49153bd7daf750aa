//! Candidate generation: one FREQ/INTERVAL step → a sorted batch of instants.
//!
//! Each step picks a *period* (a year, month, week or day, or a single
//! instant for sub-daily frequencies) by offsetting the rule's anchor by
//! `interval × step` units. Offsets are always taken from the anchor rather
//! than the previous period, so month-end anchors do not drift.
//!
//! The BYxxx parts are then applied in RFC 5545 order (BYMONTH, BYWEEKNO,
//! BYYEARDAY, BYMONTHDAY, BYDAY, BYHOUR, BYMINUTE, BYSECOND, BYSETPOS).
//! Date-level parts expand when their unit is at least as coarse as the
//! period and limit otherwise. Expanding over a period is done by walking
//! the period's days and keeping those the part selects; limiting applies the
//! same predicate to the single seed day. Time-level parts expand into a
//! cartesian product of hours, minutes and seconds, or limit the seed's own
//! time fields for the sub-daily frequencies.
//!
//! When a date-level part is absent, the anchor supplies it: YEARLY uses the
//! anchor's month and day, MONTHLY its day of month, WEEKLY its weekday.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;

use crate::calendar::{
    add_months, dates_in, days_in_month, days_in_year, month_bounds, nth_weekday_in,
    week_of_year, week_start_of, weeks_in_year, year_bounds,
};
use crate::dst::{resolve_local, DstPolicy};
use crate::rule::RecurrenceRule;
use crate::types::{resolve_signed, BoundedList, ByDayRule, Frequency, RulePart};

/// How far ahead (in days) the step optimizer looks for a matching day.
const DAY_SEARCH_HORIZON: i64 = 366 * 8;

/// Whether a BYxxx part multiplies the seed or filters it, for one FREQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartAction {
    Expand,
    Limit,
    NotApplicable,
}

/// The RFC 5545 §3.3.10 expand/limit table.
///
/// BYDAY under MONTHLY and YEARLY depends on which other parts are present
/// and is resolved by [`Generator`]; it is reported here as `Expand`.
pub fn part_action(part: RulePart, frequency: Frequency) -> PartAction {
    use Frequency::*;
    use PartAction::*;
    match part {
        RulePart::ByMonth => match frequency {
            Yearly => Expand,
            _ => Limit,
        },
        RulePart::ByWeekNo => match frequency {
            Yearly => Expand,
            _ => NotApplicable,
        },
        RulePart::ByYearDay => match frequency {
            Yearly => Expand,
            Daily | Weekly | Monthly => NotApplicable,
            _ => Limit,
        },
        RulePart::ByMonthDay => match frequency {
            Yearly | Monthly => Expand,
            Weekly => NotApplicable,
            _ => Limit,
        },
        RulePart::ByHour => {
            if frequency >= Daily {
                Expand
            } else {
                Limit
            }
        }
        RulePart::ByMinute => {
            if frequency >= Hourly {
                Expand
            } else {
                Limit
            }
        }
        RulePart::BySecond => {
            if frequency >= Minutely {
                Expand
            } else {
                Limit
            }
        }
        RulePart::BySetPos => Limit,
    }
}

/// The calendar span one FREQ/INTERVAL step covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Year(i32),
    Month(i32, u32),
    Week(NaiveDate),
    Day(NaiveDate),
    Instant(NaiveDateTime),
}

impl Period {
    fn days(self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            Period::Year(year) => year_bounds(year),
            Period::Month(year, month) => month_bounds(year, month),
            Period::Week(first) => Some((first, first.checked_add_signed(Duration::days(6))?)),
            Period::Day(day) => Some((day, day)),
            Period::Instant(at) => Some((at.date(), at.date())),
        }
    }
}

/// Which span a nonzero BYDAY ordinal counts within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrdinalScope {
    Month,
    Year,
}

/// The result of one generator step.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Wall-clock seed of this step (the anchor offset by `interval × step`).
    pub reference: NaiveDateTime,
    /// Earliest wall-clock time the period covers. Every later step's
    /// candidates fall after it.
    pub period_start: NaiveDateTime,
    /// Occurrences in this period at or after the anchor, ascending.
    pub candidates: Vec<DateTime<Tz>>,
    /// The step to run next. Always greater than the step just run.
    pub next_step: u64,
}

/// A rule prepared for repeated stepping, with the anchor's implicit
/// defaults folded into the BYxxx lists.
#[derive(Debug, Clone)]
pub struct Generator {
    rule: RecurrenceRule,
    policy: DstPolicy,
    anchor: NaiveDateTime,
    by_month: BoundedList,
    by_month_day: BoundedList,
    by_day: Vec<ByDayRule>,
    hours: Vec<u32>,
    minutes: Vec<u32>,
    seconds: Vec<u32>,
    ordinal_scope: OrdinalScope,
}

impl Generator {
    pub fn new(rule: RecurrenceRule, policy: DstPolicy) -> Self {
        let anchor = rule.start().naive_local();
        let frequency = rule.frequency();

        let mut by_month = rule.by_month().clone();
        let mut by_month_day = rule.by_month_day().clone();
        let mut by_day = rule.by_day().to_vec();

        let no_day_parts = rule.by_week_no().is_empty()
            && rule.by_year_day().is_empty()
            && rule.by_month_day().is_empty()
            && rule.by_day().is_empty();
        match frequency {
            Frequency::Yearly if no_day_parts => {
                if by_month.is_empty() {
                    by_month = implicit(RulePart::ByMonth, anchor.month());
                }
                by_month_day = implicit(RulePart::ByMonthDay, anchor.day());
            }
            Frequency::Monthly if no_day_parts => {
                by_month_day = implicit(RulePart::ByMonthDay, anchor.day());
            }
            Frequency::Weekly if by_day.is_empty() => {
                by_day = vec![ByDayRule::every(anchor.weekday().into())];
            }
            _ => {}
        }

        let time_values = |list: &BoundedList, default: u32| {
            if list.is_empty() {
                vec![default]
            } else {
                list.sorted_unsigned()
            }
        };
        let hours = time_values(rule.by_hour(), anchor.hour());
        let minutes = time_values(rule.by_minute(), anchor.minute());
        let seconds = time_values(rule.by_second(), anchor.second());

        let ordinal_scope = if frequency == Frequency::Monthly || !rule.by_month().is_empty() {
            OrdinalScope::Month
        } else {
            OrdinalScope::Year
        };

        Self {
            rule,
            policy,
            anchor,
            by_month,
            by_month_day,
            by_day,
            hours,
            minutes,
            seconds,
            ordinal_scope,
        }
    }

    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    /// Run step `step`: locate its period, expand and limit it through every
    /// BYxxx part, and pick the step to run next.
    ///
    /// Returns `None` once the period falls outside the representable
    /// calendar range. An empty `candidates` list is not an error; it means
    /// nothing in this period satisfies the rule.
    pub fn advance_and_expand(&self, step: u64) -> Option<Batch> {
        let (period, reference) = self.period_for(step)?;
        let (first, last) = period.days()?;
        let period_start = match period {
            Period::Instant(at) => at,
            _ => first.and_time(NaiveTime::MIN),
        };

        let days: Vec<NaiveDate> = dates_in(first, last)
            .filter(|day| self.day_matches(*day))
            .collect();

        let mut local: Vec<NaiveDateTime> = Vec::new();
        for day in days {
            for time in self.times_for(reference.time()) {
                local.push(day.and_time(time));
            }
        }
        local.sort_unstable();
        local.dedup();

        if !self.rule.by_set_pos().is_empty() {
            local = select_positions(&local, self.rule.by_set_pos());
        }

        let tz = self.rule.time_zone();
        let start = self.rule.start();
        let mut candidates: Vec<DateTime<Tz>> = local
            .into_iter()
            .filter_map(|at| resolve_local(&tz, at, self.policy))
            .filter(|at| *at >= start)
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        Some(Batch {
            reference,
            period_start,
            candidates,
            next_step: self.next_step(step, reference),
        })
    }

    // ── Stepping ────────────────────────────────────────────────────────

    fn period_for(&self, step: u64) -> Option<(Period, NaiveDateTime)> {
        let offset = i64::try_from(step)
            .ok()?
            .checked_mul(i64::from(self.rule.interval()))?;
        let anchor = self.anchor;
        match self.rule.frequency() {
            Frequency::Yearly => {
                let year = i32::try_from(i64::from(anchor.year()).checked_add(offset)?).ok()?;
                let reference = clamp_to_month(year, anchor.month(), anchor)?;
                Some((Period::Year(year), reference))
            }
            Frequency::Monthly => {
                let (year, month) = add_months(anchor.year(), anchor.month(), offset)?;
                let reference = clamp_to_month(year, month, anchor)?;
                Some((Period::Month(year, month), reference))
            }
            Frequency::Weekly => {
                let reference =
                    anchor.checked_add_signed(Duration::try_weeks(offset)?)?;
                let first = week_start_of(reference.date(), self.rule.week_start())?;
                Some((Period::Week(first), reference))
            }
            Frequency::Daily => {
                let reference = anchor.checked_add_signed(Duration::try_days(offset)?)?;
                Some((Period::Day(reference.date()), reference))
            }
            sub_daily => {
                let unit = sub_daily.fixed_step_seconds()?;
                let reference = anchor
                    .checked_add_signed(Duration::try_seconds(offset.checked_mul(unit)?)?)?;
                Some((Period::Instant(reference), reference))
            }
        }
    }

    /// Pick the next step. YEARLY, MONTHLY and WEEKLY always advance by one.
    /// DAILY and finer jump straight to the first step that can land on a
    /// day (and, for sub-daily rules, an hour/minute/second) the limiting
    /// parts accept, so sparse rules such as `FREQ=SECONDLY;BYYEARDAY=364`
    /// do not walk every unit in between.
    fn next_step(&self, step: u64, reference: NaiveDateTime) -> u64 {
        let fallback = step.saturating_add(1);
        if self.rule.frequency() > Frequency::Daily {
            return fallback;
        }
        self.next_possible_after(reference)
            .and_then(|target| self.steps_to_reach(target))
            .map_or(fallback, |jump| jump.max(fallback))
    }

    /// Earliest wall-clock time after `reference`, at the frequency's own
    /// granularity, whose coarser fields all pass the limiting parts.
    fn next_possible_after(&self, reference: NaiveDateTime) -> Option<NaiveDateTime> {
        let frequency = self.rule.frequency();
        if frequency == Frequency::Daily {
            let mut day = reference.date();
            for _ in 0..DAY_SEARCH_HORIZON {
                day = day.succ_opt()?;
                if self.day_matches(day) {
                    return Some(day.and_time(NaiveTime::MIN));
                }
            }
            return Some(day.and_time(NaiveTime::MIN));
        }

        let mut day = reference.date();
        let mut after = Some(reference.time());
        for _ in 0..DAY_SEARCH_HORIZON {
            if self.day_matches(day) {
                if let Some(time) = self.first_time_after(after) {
                    return Some(day.and_time(time));
                }
            }
            day = day.succ_opt()?;
            after = None;
        }
        Some(day.and_time(NaiveTime::MIN))
    }

    /// First time of day (strictly after `after` at the frequency's
    /// granularity, if given) whose limited fields are all accepted.
    fn first_time_after(&self, after: Option<NaiveTime>) -> Option<NaiveTime> {
        let frequency = self.rule.frequency();
        let after = after.map(|t| (t.hour(), t.minute(), t.second()));
        let is_later = |candidate: (u32, u32, u32)| after.map_or(true, |a| candidate > a);

        let allowed = |list: &BoundedList, range: u32| -> Vec<u32> {
            if list.is_empty() {
                (0..range).collect()
            } else {
                list.sorted_unsigned()
            }
        };
        let hours = allowed(self.rule.by_hour(), 24);
        let minutes = allowed(self.rule.by_minute(), 60);
        let seconds = allowed(self.rule.by_second(), 60);

        for &hour in &hours {
            if frequency == Frequency::Hourly {
                if after.map_or(true, |a| hour > a.0) {
                    return NaiveTime::from_hms_opt(hour, 0, 0);
                }
                continue;
            }
            for &minute in &minutes {
                if frequency == Frequency::Minutely {
                    if after.map_or(true, |a| (hour, minute) > (a.0, a.1)) {
                        return NaiveTime::from_hms_opt(hour, minute, 0);
                    }
                    continue;
                }
                for &second in &seconds {
                    if is_later((hour, minute, second)) {
                        return NaiveTime::from_hms_opt(hour, minute, second);
                    }
                }
            }
        }
        None
    }

    /// Smallest step whose seed is at or after `target`.
    fn steps_to_reach(&self, target: NaiveDateTime) -> Option<u64> {
        let unit = self
            .rule
            .frequency()
            .fixed_step_seconds()?
            .checked_mul(i64::from(self.rule.interval()))?;
        let delta = target.signed_duration_since(self.anchor).num_seconds();
        if delta <= 0 {
            return Some(0);
        }
        u64::try_from((delta + unit - 1) / unit).ok()
    }

    // ── Date-level parts ────────────────────────────────────────────────

    fn day_matches(&self, day: NaiveDate) -> bool {
        self.month_matches(day)
            && self.week_no_matches(day)
            && self.year_day_matches(day)
            && self.month_day_matches(day)
            && self.weekday_matches(day)
    }

    fn month_matches(&self, day: NaiveDate) -> bool {
        self.by_month.is_empty() || self.by_month.selects(day.month(), 12)
    }

    fn week_no_matches(&self, day: NaiveDate) -> bool {
        let by_week_no = self.rule.by_week_no();
        if by_week_no.is_empty() {
            return true;
        }
        let week_start = self.rule.week_start();
        let Some((week_year, week)) = week_of_year(day, week_start) else {
            return false;
        };
        weeks_in_year(week_year, week_start).is_some_and(|weeks| by_week_no.selects(week, weeks))
    }

    fn year_day_matches(&self, day: NaiveDate) -> bool {
        let by_year_day = self.rule.by_year_day();
        by_year_day.is_empty() || by_year_day.selects(day.ordinal(), days_in_year(day.year()))
    }

    fn month_day_matches(&self, day: NaiveDate) -> bool {
        self.by_month_day.is_empty()
            || self
                .by_month_day
                .selects(day.day(), days_in_month(day.year(), day.month()))
    }

    /// BYDAY with an ordinal selects the nth such weekday of the enclosing
    /// month or year, found by listing them all and indexing.
    fn weekday_matches(&self, day: NaiveDate) -> bool {
        if self.by_day.is_empty() {
            return true;
        }
        let weekday = day.weekday();
        self.by_day.iter().any(|rule| {
            if rule.weekday.to_chrono() != weekday {
                return false;
            }
            if !rule.has_ordinal() {
                return true;
            }
            let bounds = match self.ordinal_scope {
                OrdinalScope::Month => month_bounds(day.year(), day.month()),
                OrdinalScope::Year => year_bounds(day.year()),
            };
            bounds.and_then(|(first, last)| nth_weekday_in(first, last, weekday, rule.ordinal))
                == Some(day)
        })
    }

    // ── Time-level parts ────────────────────────────────────────────────

    fn times_for(&self, seed: NaiveTime) -> Vec<NaiveTime> {
        let frequency = self.rule.frequency();
        let pick = |part: RulePart, expanded: &[u32], list: &BoundedList, seed_value: u32| {
            match part_action(part, frequency) {
                PartAction::Expand => expanded.to_vec(),
                _ if list.is_empty() || list.contains(seed_value) => vec![seed_value],
                _ => Vec::new(),
            }
        };
        let hours = pick(
            RulePart::ByHour,
            self.hours.as_slice(),
            self.rule.by_hour(),
            seed.hour(),
        );
        let minutes = pick(
            RulePart::ByMinute,
            self.minutes.as_slice(),
            self.rule.by_minute(),
            seed.minute(),
        );
        let seconds = pick(
            RulePart::BySecond,
            self.seconds.as_slice(),
            self.rule.by_second(),
            seed.second(),
        );

        let mut times = Vec::with_capacity(hours.len() * minutes.len() * seconds.len());
        for &hour in &hours {
            for &minute in &minutes {
                for &second in &seconds {
                    if let Some(time) = NaiveTime::from_hms_opt(hour, minute, second) {
                        times.push(time);
                    }
                }
            }
        }
        times
    }
}

fn implicit(part: RulePart, value: u32) -> BoundedList {
    // Anchor fields are always within the part's bounds.
    BoundedList::from_values(part, [value as i32]).unwrap_or_else(|_| BoundedList::new(part))
}

/// The anchor's day and time moved into `year`/`month`, clamped to the
/// month's last day. Only used for the informational step reference.
fn clamp_to_month(year: i32, month: u32, anchor: NaiveDateTime) -> Option<NaiveDateTime> {
    let day = anchor.day().min(days_in_month(year, month));
    Some(NaiveDate::from_ymd_opt(year, month, day)?.and_time(anchor.time()))
}

/// BYSETPOS: pick the nth (negative: nth from the end) entries of a sorted set.
fn select_positions(sorted: &[NaiveDateTime], positions: &BoundedList) -> Vec<NaiveDateTime> {
    let len = u32::try_from(sorted.len()).unwrap_or(u32::MAX);
    let mut selected: Vec<NaiveDateTime> = positions
        .values()
        .iter()
        .filter_map(|&pos| resolve_signed(pos, len))
        .filter_map(|index| sorted.get(index as usize - 1).copied())
        .collect();
    selected.sort_unstable();
    selected.dedup();
    selected
}

// ── Tests ───────────────────────────────────────────────────────────────────
