//! Calendar-field arithmetic used throughout candidate generation.
//!
//! All functions work on naive (wall-clock) dates; timezone resolution
//! happens only once a candidate is complete (see [`crate::dst`]).

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::types::WeekDay;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ if is_leap_year(year) => 29,
        _ => 28,
    }
}

/// First and last day of a month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))?;
    Some((first, last))
}

/// First and last day of a year.
pub fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

/// Shift a (year, month) pair by a signed number of months.
pub fn add_months(year: i32, month: u32, months: i64) -> Option<(i32, u32)> {
    let index = i64::from(year) * 12 + i64::from(month) - 1 + months;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = (index.rem_euclid(12) + 1) as u32;
    Some((year, month))
}

/// How many days `weekday` is from the configured week-start day.
pub fn days_from_week_start(weekday: Weekday, week_start: WeekDay) -> u32 {
    let start = week_start.to_chrono().num_days_from_monday();
    (weekday.num_days_from_monday() + 7 - start) % 7
}

/// The first day of the week containing `date`, with weeks beginning on `week_start`.
pub fn week_start_of(date: NaiveDate, week_start: WeekDay) -> Option<NaiveDate> {
    date.checked_sub_signed(Duration::days(i64::from(days_from_week_start(
        date.weekday(),
        week_start,
    ))))
}

/// Week-numbering year and week number of `date`.
///
/// Follows the ISO 8601 rule generalized to any week start: week 1 is the
/// first week with at least four days in the year, so a few days near
/// January 1st may belong to the last week of the previous year, and a few
/// days near December 31st to week 1 of the next.
pub fn week_of_year(date: NaiveDate, week_start: WeekDay) -> Option<(i32, u32)> {
    let thursday_like = week_start_of(date, week_start)?.checked_add_signed(Duration::days(3))?;
    Some((thursday_like.year(), thursday_like.ordinal0() / 7 + 1))
}

/// Number of weeks (52 or 53) in the week-numbering year `year`.
pub fn weeks_in_year(year: i32, week_start: WeekDay) -> Option<u32> {
    let dec_31 = NaiveDate::from_ymd_opt(year, 12, 31)?;
    let (week_year, week) = week_of_year(dec_31, week_start)?;
    if week_year == year {
        return Some(week);
    }
    let (_, week) = week_of_year(dec_31.checked_sub_signed(Duration::days(7))?, week_start)?;
    Some(week)
}

/// All dates in `[first, last]` falling on `weekday`, ascending.
pub fn weekdays_in(first: NaiveDate, last: NaiveDate, weekday: Weekday) -> Vec<NaiveDate> {
    let offset = (weekday.num_days_from_monday() + 7 - first.weekday().num_days_from_monday()) % 7;
    let mut out = Vec::new();
    let mut day = first.checked_add_signed(Duration::days(i64::from(offset)));
    while let Some(date) = day.filter(|d| *d <= last) {
        out.push(date);
        day = date.checked_add_signed(Duration::days(7));
    }
    out
}

/// Find the nth `weekday` in `[first, last]`. A negative ordinal counts from
/// the end (-1 is the last one). Returns `None` when the period holds fewer
/// than `|ordinal|` such weekdays.
pub fn nth_weekday_in(
    first: NaiveDate,
    last: NaiveDate,
    weekday: Weekday,
    ordinal: i32,
) -> Option<NaiveDate> {
    let all = weekdays_in(first, last, weekday);
    let index = if ordinal > 0 {
        usize::try_from(ordinal - 1).ok()?
    } else {
        all.len().checked_sub(usize::try_from(-ordinal).ok()?)?
    };
    all.get(index).copied()
}

/// Every date in `[first, last]`, ascending.
pub fn dates_in(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    first.iter_days().take_while(move |d| *d <= last)
}

// ── Tests ───────────────────────────────────────────────────────────────────
