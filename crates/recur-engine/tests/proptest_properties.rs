//! Property tests over randomly assembled rules.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use proptest::prelude::*;
use recur_engine::{Recurrence, RecurrenceRule};

const ZONES: [&str; 4] = ["UTC", "America/New_York", "Europe/Berlin", "Asia/Kolkata"];
const WEEKDAYS: [&str; 7] = ["MO", "TU", "WE", "TH", "FR", "SA", "SU"];

fn signed_month_day() -> impl Strategy<Value = i32> {
    (1i32..=28, any::<bool>()).prop_map(|(day, negative)| if negative { -day } else { day })
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// RRULE text plus the anchor it is evaluated from. Some combinations are
/// illegal (e.g. WEEKLY with BYMONTHDAY); tests discard those.
fn rule_and_start() -> impl Strategy<Value = (String, DateTime<Tz>)> {
    let frequency = prop_oneof![
        Just("HOURLY"),
        Just("DAILY"),
        Just("WEEKLY"),
        Just("MONTHLY"),
        Just("YEARLY"),
    ];
    let bound = prop_oneof![
        Just(None),
        (1u32..15).prop_map(|count| Some(format!("COUNT={count}"))),
        (1i64..400).prop_map(|days| Some(format!("UNTIL=+{days}"))),
    ];
    let by_day = proptest::option::of(proptest::sample::subsequence(WEEKDAYS.to_vec(), 1..4));
    let by_month_day = proptest::option::of(proptest::collection::vec(signed_month_day(), 1..3));
    let by_month = proptest::option::of(proptest::collection::vec(1i32..=12, 1..3));
    let by_hour = proptest::option::of(proptest::collection::vec(0i32..24, 1..3));
    let start = (
        proptest::sample::select(ZONES.to_vec()),
        2020i32..2030,
        1u32..=12,
        1u32..=28,
        0u32..24,
        prop_oneof![Just(0u32), Just(15), Just(30)],
    );

    (
        frequency,
        1u32..4,
        bound,
        by_day,
        by_month_day,
        by_month,
        by_hour,
        start,
    )
        .prop_filter_map(
            "anchor falls in a DST gap",
            |(frequency, interval, bound, by_day, by_month_day, by_month, by_hour, start)| {
                let (zone, y, m, d, h, min) = start;
                let tz: Tz = zone.parse().ok()?;
                let start = tz.with_ymd_and_hms(y, m, d, h, min, 0).single()?;

                let mut parts = vec![format!("FREQ={frequency}")];
                if interval > 1 {
                    parts.push(format!("INTERVAL={interval}"));
                }
                match bound {
                    Some(until) if until.starts_with("UNTIL=+") => {
                        let days: i64 = until.trim_start_matches("UNTIL=+").parse().ok()?;
                        let until = (start + Duration::days(days)).with_timezone(&Utc);
                        parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
                    }
                    Some(count) => parts.push(count),
                    None => {}
                }
                if let Some(days) = by_day {
                    parts.push(format!("BYDAY={}", days.join(",")));
                }
                if let Some(days) = by_month_day {
                    parts.push(format!("BYMONTHDAY={}", join(&days)));
                }
                if let Some(months) = by_month {
                    parts.push(format!("BYMONTH={}", join(&months)));
                }
                if let Some(hours) = by_hour {
                    parts.push(format!("BYHOUR={}", join(&hours)));
                }
                Some((parts.join(";"), start))
            },
        )
}

fn first_n(recurrence: &mut Recurrence, n: usize) -> Vec<DateTime<Tz>> {
    let before_start = recurrence.rule().start() - Duration::seconds(1);
    recurrence.iter_after(&before_start).take(n).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn serialized_rule_round_trips((text, start) in rule_and_start()) {
        let parsed = RecurrenceRule::parse(&text, start);
        prop_assume!(parsed.is_ok());
        let rule = parsed.unwrap();

        let serialized = rule.to_string();
        let reparsed = RecurrenceRule::parse(&serialized, start).unwrap();
        prop_assert_eq!(&reparsed, &rule);

        let original = first_n(&mut Recurrence::new(rule), 12);
        let round_tripped = first_n(&mut Recurrence::new(reparsed), 12);
        prop_assert_eq!(original, round_tripped);
    }

    #[test]
    fn next_after_is_monotonic(
        (text, start) in rule_and_start(),
        first_hours in 0i64..24 * 400,
        gap_hours in 0i64..24 * 60,
    ) {
        let parsed = Recurrence::parse(&text, start);
        prop_assume!(parsed.is_ok());
        let mut recurrence = parsed.unwrap();

        let t1 = start + Duration::hours(first_hours);
        let t2 = t1 + Duration::hours(gap_hours);
        if let (Some(a), Some(b)) = (recurrence.next_after(&t1), recurrence.next_after(&t2)) {
            prop_assert!(a <= b, "next_after({t1}) = {a} > next_after({t2}) = {b}");
            prop_assert!(a > t1);
            prop_assert!(b > t2);
        }
    }

    #[test]
    fn nothing_precedes_start((text, start) in rule_and_start(), probe_hours in 0i64..24 * 30) {
        let parsed = Recurrence::parse(&text, start);
        prop_assume!(parsed.is_ok());
        let mut recurrence = parsed.unwrap();

        prop_assert_eq!(recurrence.previous_before(&start), None);
        let earlier = start - Duration::hours(probe_hours);
        prop_assert_eq!(recurrence.previous_before(&earlier), None);
        if let Some(first) = recurrence.next_after(&earlier) {
            prop_assert!(first >= start);
        }
    }

    #[test]
    fn occurrences_are_strictly_ascending((text, start) in rule_and_start()) {
        let parsed = Recurrence::parse(&text, start);
        prop_assume!(parsed.is_ok());
        let mut recurrence = parsed.unwrap();

        let all = first_n(&mut recurrence, 30);
        for pair in all.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        if let Some(count) = recurrence.rule().count() {
            prop_assert!(all.len() <= count as usize);
        }
        if let Some(until) = recurrence.rule().until() {
            prop_assert!(all.iter().all(|at| *at <= until));
        }
    }
}
