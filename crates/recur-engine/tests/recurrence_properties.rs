//! End-to-end behaviour of the occurrence search through the public API.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use recur_engine::{InvalidRuleError, ParseError, RecurError, Recurrence, RecurrenceRule};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Tz> {
    chrono_tz::UTC.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// The first `n` occurrences, starting from the rule's own start.
fn first_n(recurrence: &mut Recurrence, n: usize) -> Vec<DateTime<Tz>> {
    let before_start = recurrence.rule().start() - Duration::seconds(1);
    recurrence.iter_after(&before_start).take(n).collect()
}

// ---------------------------------------------------------------------------
// COUNT and UNTIL
// ---------------------------------------------------------------------------

#[test]
fn daily_count_five_is_bounded() {
    let mut r = Recurrence::parse("FREQ=DAILY;COUNT=5", utc(2024, 1, 1, 0, 0, 0)).unwrap();

    let all = first_n(&mut r, 10);
    assert_eq!(
        all,
        (1..=5).map(|d| utc(2024, 1, d, 0, 0, 0)).collect::<Vec<_>>()
    );
    assert_eq!(r.final_occurrence(), Some(utc(2024, 1, 5, 0, 0, 0)));
    assert_eq!(r.next_after(&utc(2024, 1, 5, 0, 0, 0)), None);
    assert!(r.is_exhausted(), "COUNT reached means the search is exhausted");
}

#[test]
fn start_with_fraction_of_second_keeps_first_occurrence() {
    let now = utc(2024, 1, 1, 9, 0, 0) + Duration::milliseconds(500);
    let mut r = Recurrence::parse("FREQ=DAILY;COUNT=3", now).unwrap();

    let before_now = now - Duration::seconds(1);
    assert_eq!(r.next_after(&before_now), Some(utc(2024, 1, 1, 9, 0, 0)));
    assert_eq!(
        first_n(&mut r, 5),
        (1..=3).map(|d| utc(2024, 1, d, 9, 0, 0)).collect::<Vec<_>>()
    );
}

#[test]
fn until_is_inclusive() {
    let mut r = Recurrence::parse(
        "FREQ=DAILY;UNTIL=20240103T000000Z",
        utc(2024, 1, 1, 0, 0, 0),
    )
    .unwrap();

    assert!(r.contains(&utc(2024, 1, 3, 0, 0, 0), false));
    assert_eq!(r.next_after(&utc(2024, 1, 3, 0, 0, 0)), None);
    assert_eq!(r.final_occurrence(), Some(utc(2024, 1, 3, 0, 0, 0)));
    assert_eq!(first_n(&mut r, 10).len(), 3);
}

#[test]
fn date_only_until_is_local_midnight() {
    let tz: Tz = "Europe/Paris".parse().unwrap();
    let start = tz.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut r = Recurrence::parse("FREQ=DAILY;UNTIL=20240103", start).unwrap();
    assert_eq!(
        r.final_occurrence(),
        Some(tz.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap())
    );
}

// ---------------------------------------------------------------------------
// BYxxx resolution
// ---------------------------------------------------------------------------

#[test]
fn last_friday_of_each_month() {
    // Starting on a Friday in January 2024.
    let mut r = Recurrence::parse("FREQ=MONTHLY;BYDAY=-1FR", utc(2024, 1, 5, 0, 0, 0)).unwrap();
    assert_eq!(
        first_n(&mut r, 3),
        vec![
            utc(2024, 1, 26, 0, 0, 0),
            utc(2024, 2, 23, 0, 0, 0),
            utc(2024, 3, 29, 0, 0, 0),
        ]
    );
}

#[test]
fn negative_month_day_handles_leap_february() {
    let mut leap =
        Recurrence::parse("FREQ=MONTHLY;BYMONTHDAY=-1", utc(2024, 1, 1, 0, 0, 0)).unwrap();
    assert_eq!(
        first_n(&mut leap, 3),
        vec![
            utc(2024, 1, 31, 0, 0, 0),
            utc(2024, 2, 29, 0, 0, 0),
            utc(2024, 3, 31, 0, 0, 0),
        ]
    );

    let mut common =
        Recurrence::parse("FREQ=MONTHLY;BYMONTHDAY=-1", utc(2023, 2, 1, 0, 0, 0)).unwrap();
    assert_eq!(
        common.next_after(&utc(2023, 2, 1, 0, 0, 0)),
        Some(utc(2023, 2, 28, 0, 0, 0))
    );
}

#[test]
fn month_day_beyond_month_length_skips_month() {
    let mut r = Recurrence::parse("FREQ=MONTHLY;BYMONTHDAY=30", utc(2024, 1, 1, 0, 0, 0)).unwrap();
    let months: Vec<u32> = first_n(&mut r, 3)
        .iter()
        .map(|at| chrono::Datelike::month(at))
        .collect();
    assert_eq!(months, vec![1, 3, 4], "February has no 30th");
}

#[test]
fn set_position_selects_from_whole_period_before_start_filter() {
    // January's first weekday (Jan 1) precedes the start, so January only
    // contributes its last weekday. Position 1 is not re-picked from the
    // days left after the start.
    let mut r = Recurrence::parse(
        "FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=1,-1;COUNT=3",
        utc(2024, 1, 10, 0, 0, 0),
    )
    .unwrap();

    assert_eq!(
        first_n(&mut r, 5),
        vec![
            utc(2024, 1, 31, 0, 0, 0),
            utc(2024, 2, 1, 0, 0, 0),
            utc(2024, 2, 29, 0, 0, 0),
        ]
    );
}

#[test]
fn biweekly_mondays() {
    let mut r = Recurrence::parse(
        "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO",
        utc(2024, 1, 1, 10, 0, 0),
    )
    .unwrap();
    let dates = first_n(&mut r, 4);
    for pair in dates.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::weeks(2));
    }
    assert_eq!(dates[0], utc(2024, 1, 1, 10, 0, 0));
}

#[test]
fn sparse_sub_daily_rule_is_found_quickly() {
    let mut r = Recurrence::parse(
        "FREQ=SECONDLY;BYYEARDAY=364;BYHOUR=12;BYMINUTE=0;BYSECOND=0",
        utc(2023, 1, 1, 0, 0, 0),
    )
    .unwrap();
    assert_eq!(
        r.next_after(&utc(2023, 1, 1, 0, 0, 0)),
        Some(utc(2023, 12, 30, 12, 0, 0))
    );
    assert!(
        r.state().memoized_occurrences().len() == 1,
        "only the matching second is memoized"
    );
}

// ---------------------------------------------------------------------------
// Timezones
// ---------------------------------------------------------------------------

#[test]
fn weekly_keeps_wall_clock_across_dst() {
    let tz: Tz = "America/New_York".parse().unwrap();
    let start = tz.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let mut r = Recurrence::parse("FREQ=WEEKLY;COUNT=3", start).unwrap();

    let utc_starts: Vec<DateTime<Utc>> = first_n(&mut r, 3)
        .iter()
        .map(|at| at.with_timezone(&Utc))
        .collect();
    assert_eq!(
        utc_starts,
        vec![
            Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 8, 13, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 15, 13, 0, 0).unwrap(),
        ]
    );
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn weekly_with_month_day_is_rejected() {
    let err = RecurrenceRule::parse("FREQ=WEEKLY;BYMONTHDAY=15", utc(2024, 1, 1, 0, 0, 0))
        .unwrap_err();
    match err {
        RecurError::Parse { rule, source } => {
            assert_eq!(rule, "FREQ=WEEKLY;BYMONTHDAY=15");
            assert_eq!(
                source,
                ParseError::Rule(InvalidRuleError::ByMonthDayWithWeekly)
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn mutation_that_breaks_a_rule_is_rejected() {
    let rule =
        RecurrenceRule::parse("FREQ=YEARLY;BYWEEKNO=20", utc(2024, 1, 1, 0, 0, 0)).unwrap();
    let err = rule
        .clone()
        .with_frequency(recur_engine::Frequency::Monthly)
        .unwrap_err();
    assert_eq!(
        err,
        RecurError::InvalidRule(InvalidRuleError::ByWeekNoRequiresYearly(
            recur_engine::Frequency::Monthly
        ))
    );
    assert_eq!(rule.to_string(), "FREQ=YEARLY;BYWEEKNO=20");
}

#[test]
fn serialized_rule_reparses_to_same_sequence() {
    let start = utc(2024, 1, 1, 9, 0, 0);
    let original = RecurrenceRule::parse(
        "RRULE:BYSETPOS=-1;BYDAY=MO,TU,WE,TH,FR;FREQ=MONTHLY;COUNT=6",
        start,
    )
    .unwrap();
    let text = original.to_string();
    assert_eq!(text, "FREQ=MONTHLY;COUNT=6;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1");

    let reparsed = RecurrenceRule::parse(&text, start).unwrap();
    assert_eq!(reparsed, original);
    assert_eq!(
        first_n(&mut Recurrence::new(original), 10),
        first_n(&mut Recurrence::new(reparsed), 10)
    );
}
