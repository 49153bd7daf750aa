//! RRULE text → [`RecurrenceRule`].
//!
//! The rule string is split on `;` and each part on its first `=`. Unknown
//! keys are ignored so newer RFC extensions do not break older readers;
//! known keys may appear at most once. Every numeric value is range-checked
//! as it is read, and the assembled rule goes through [`validate`] before it
//! is returned.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, trace};

use crate::dst::{resolve_local, DstPolicy};
use crate::error::{InvalidRuleError, ParseError, RecurError, Result};
use crate::rule::{RecurrenceBound, RecurrenceRule};
use crate::types::{BoundedList, ByDayRule, Frequency, RulePart};
use crate::validate::validate;

const KNOWN_PARTS: [&str; 14] = [
    "FREQ",
    "UNTIL",
    "COUNT",
    "INTERVAL",
    "BYSECOND",
    "BYMINUTE",
    "BYHOUR",
    "BYDAY",
    "BYMONTHDAY",
    "BYYEARDAY",
    "BYWEEKNO",
    "BYMONTH",
    "BYSETPOS",
    "WKST",
];

impl RecurrenceRule {
    /// Parse an RRULE value such as `FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=10`.
    ///
    /// `start` anchors the rule; its timezone is the zone all candidate
    /// arithmetic (and date-only or floating UNTIL values) is relative to.
    /// A leading `RRULE:` property name is accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RecurError::Parse`] carrying the rule text when the syntax is
    /// malformed or the parts form an illegal combination.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::TimeZone;
    /// use recur_engine::RecurrenceRule;
    ///
    /// let start = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    /// let rule = RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=10", start).unwrap();
    /// assert_eq!(rule.count(), Some(10));
    /// assert_eq!(rule.to_string(), "FREQ=WEEKLY;COUNT=10;BYDAY=MO,WE,FR");
    /// ```
    pub fn parse(text: &str, start: DateTime<Tz>) -> Result<Self> {
        let rule = parse_parts(text, start).map_err(|source| RecurError::parse(text, source))?;
        debug!(rule = %rule, "parsed recurrence rule");
        Ok(rule)
    }
}

fn parse_parts(text: &str, start: DateTime<Tz>) -> std::result::Result<RecurrenceRule, ParseError> {
    let tz = start.timezone();
    let body = text.trim();
    let body = body.strip_prefix("RRULE:").unwrap_or(body);

    let mut rule = RecurrenceRule::new(Frequency::Yearly, start);
    let mut frequency = None;
    let mut count = None;
    let mut until = None;
    let mut seen: Vec<&str> = Vec::new();

    for part in body.split(';').filter(|part| !part.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| ParseError::MalformedPart(part.to_string()))?;

        if KNOWN_PARTS.contains(&key) {
            if seen.contains(&key) {
                return Err(ParseError::DuplicatePart(key.to_string()));
            }
            seen.push(key);
        }

        match key {
            "FREQ" => frequency = Some(value.parse::<Frequency>()?),
            "UNTIL" => until = Some(parse_until(value, &tz)?),
            "COUNT" => count = Some(parse_unsigned(key, value)?),
            "INTERVAL" => rule.interval = parse_unsigned(key, value)?,
            "BYSECOND" => rule.by_second = parse_list(RulePart::BySecond, value)?,
            "BYMINUTE" => rule.by_minute = parse_list(RulePart::ByMinute, value)?,
            "BYHOUR" => rule.by_hour = parse_list(RulePart::ByHour, value)?,
            "BYDAY" => rule.by_day = parse_by_day(value)?,
            "BYMONTHDAY" => rule.by_month_day = parse_list(RulePart::ByMonthDay, value)?,
            "BYYEARDAY" => rule.by_year_day = parse_list(RulePart::ByYearDay, value)?,
            "BYWEEKNO" => rule.by_week_no = parse_list(RulePart::ByWeekNo, value)?,
            "BYMONTH" => rule.by_month = parse_list(RulePart::ByMonth, value)?,
            "BYSETPOS" => rule.by_set_pos = parse_list(RulePart::BySetPos, value)?,
            "WKST" => rule.week_start = value.parse()?,
            _ => trace!(part, "ignoring unknown rule part"),
        }
    }

    rule.frequency = frequency.ok_or(ParseError::MissingFrequency)?;
    rule.bound = match (count, until) {
        (Some(_), Some(_)) => return Err(InvalidRuleError::CountWithUntil.into()),
        (Some(count), None) => RecurrenceBound::Count(count),
        (None, Some(until)) => RecurrenceBound::Until(until),
        (None, None) => RecurrenceBound::Unbounded,
    };

    validate(&rule)?;
    Ok(rule)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn invalid_integer(part: &str, value: &str) -> ParseError {
    ParseError::InvalidInteger {
        part: part.to_string(),
        value: value.to_string(),
    }
}

/// Base-10, no sign.
fn parse_unsigned(part: &str, value: &str) -> std::result::Result<u32, ParseError> {
    if !is_digits(value) {
        return Err(invalid_integer(part, value));
    }
    value.parse().map_err(|_| invalid_integer(part, value))
}

/// Base-10 with an optional `+` or `-` sign.
fn parse_signed(part: &str, value: &str) -> std::result::Result<i32, ParseError> {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    if !is_digits(digits) {
        return Err(invalid_integer(part, value));
    }
    value.parse().map_err(|_| invalid_integer(part, value))
}

fn parse_list(part: RulePart, value: &str) -> std::result::Result<BoundedList, ParseError> {
    let mut list = BoundedList::new(part);
    for item in value.split(',') {
        list.push(parse_signed(part.name(), item)?)?;
    }
    Ok(list)
}

fn parse_by_day(value: &str) -> std::result::Result<Vec<ByDayRule>, ParseError> {
    let mut rules: Vec<ByDayRule> = Vec::new();
    for item in value.split(',') {
        let rule: ByDayRule = item.parse()?;
        if !rules.contains(&rule) {
            rules.push(rule);
        }
    }
    Ok(rules)
}

/// UNTIL accepts `yyyyMMddTHHmmssZ` (UTC), `yyyyMMddTHHmmss` (local to the
/// rule's zone) and `yyyyMMdd` (midnight local to the rule's zone).
fn parse_until(value: &str, tz: &Tz) -> std::result::Result<DateTime<Tz>, ParseError> {
    let invalid = || ParseError::InvalidUntil(value.to_string());

    let local_datetime = |s: &str| -> Option<NaiveDateTime> {
        let (date, time) = s.split_once('T')?;
        if date.len() != 8 || time.len() != 6 || !is_digits(date) || !is_digits(time) {
            return None;
        }
        NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()
    };

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = local_datetime(utc).ok_or_else(invalid)?;
        return Ok(Utc.from_utc_datetime(&naive).with_timezone(tz));
    }

    let naive = if value.contains('T') {
        local_datetime(value).ok_or_else(invalid)?
    } else if value.len() == 8 && is_digits(value) {
        NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(invalid)?
    } else {
        return Err(invalid());
    };
    resolve_local(tz, naive, DstPolicy::default()).ok_or_else(invalid)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WeekDay;

    fn utc_start() -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn parse(text: &str) -> Result<RecurrenceRule> {
        RecurrenceRule::parse(text, utc_start())
    }

    fn parse_error(text: &str) -> ParseError {
        match parse(text) {
            Err(RecurError::Parse { rule, source }) => {
                assert_eq!(rule, text);
                source
            }
            other => panic!("expected parse error for {text}, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_all_parts() {
        let rule = parse(
            "FREQ=YEARLY;INTERVAL=2;COUNT=10;BYSECOND=0,30;BYMINUTE=15;BYHOUR=9,17;\
             BYDAY=MO,-1FR;BYMONTHDAY=1,-1;BYYEARDAY=100;BYMONTH=1,6;BYSETPOS=1,-1;WKST=SU",
        )
        .unwrap();
        assert_eq!(rule.frequency(), Frequency::Yearly);
        assert_eq!(rule.interval(), 2);
        assert_eq!(rule.count(), Some(10));
        assert_eq!(rule.by_second().values(), &[0, 30]);
        assert_eq!(rule.by_minute().values(), &[15]);
        assert_eq!(rule.by_hour().values(), &[9, 17]);
        assert_eq!(
            rule.by_day(),
            &[
                ByDayRule::every(WeekDay::Monday),
                ByDayRule::nth(-1, WeekDay::Friday).unwrap()
            ]
        );
        assert_eq!(rule.by_month_day().values(), &[1, -1]);
        assert_eq!(rule.by_year_day().values(), &[100]);
        assert_eq!(rule.by_month().values(), &[1, 6]);
        assert_eq!(rule.by_set_pos().values(), &[1, -1]);
        assert_eq!(rule.week_start(), WeekDay::Sunday);
    }

    #[test]
    fn test_unknown_parts_are_ignored() {
        let rule = parse("FREQ=DAILY;X-NAME=foo;RSCALE=GREGORIAN").unwrap();
        assert_eq!(rule.frequency(), Frequency::Daily);
    }

    #[test]
    fn test_rrule_prefix_and_trailing_separator() {
        let rule = parse("RRULE:FREQ=DAILY;COUNT=3;").unwrap();
        assert_eq!(rule.count(), Some(3));
    }

    #[test]
    fn test_frequency_is_required_and_case_sensitive() {
        assert_eq!(parse_error("COUNT=3"), ParseError::MissingFrequency);
        assert_eq!(
            parse_error("FREQ=daily"),
            ParseError::UnknownFrequency("daily".to_string())
        );
    }

    #[test]
    fn test_malformed_and_duplicate_parts() {
        assert_eq!(
            parse_error("FREQ=DAILY;COUNT"),
            ParseError::MalformedPart("COUNT".to_string())
        );
        assert_eq!(
            parse_error("FREQ=DAILY;FREQ=WEEKLY"),
            ParseError::DuplicatePart("FREQ".to_string())
        );
    }

    #[test]
    fn test_integers_must_be_plain_decimal() {
        assert!(matches!(
            parse_error("FREQ=DAILY;COUNT=+3"),
            ParseError::InvalidInteger { .. }
        ));
        assert!(matches!(
            parse_error("FREQ=DAILY;INTERVAL=two"),
            ParseError::InvalidInteger { .. }
        ));
        assert!(matches!(
            parse_error("FREQ=MONTHLY;BYMONTHDAY=1,,2"),
            ParseError::InvalidInteger { .. }
        ));
        assert_eq!(
            parse_error("FREQ=DAILY;COUNT=0"),
            ParseError::Rule(InvalidRuleError::ZeroCount)
        );
        assert_eq!(
            parse_error("FREQ=DAILY;INTERVAL=0"),
            ParseError::Rule(InvalidRuleError::ZeroInterval)
        );
    }

    #[test]
    fn test_single_out_of_range_value_fails_whole_parse() {
        assert!(matches!(
            parse_error("FREQ=DAILY;BYHOUR=9,24"),
            ParseError::Rule(InvalidRuleError::ValueOutOfRange {
                part: RulePart::ByHour,
                value: 24,
                ..
            })
        ));
        assert!(matches!(
            parse_error("FREQ=YEARLY;BYMONTH=13"),
            ParseError::Rule(InvalidRuleError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_extreme_integers_are_out_of_range() {
        assert!(matches!(
            parse_error("FREQ=MONTHLY;BYMONTHDAY=-2147483648"),
            ParseError::Rule(InvalidRuleError::ValueOutOfRange {
                part: RulePart::ByMonthDay,
                value: i32::MIN,
                ..
            })
        ));
        assert!(matches!(
            parse_error("FREQ=YEARLY;BYSETPOS=2147483647;BYMONTH=1"),
            ParseError::Rule(InvalidRuleError::ValueOutOfRange { .. })
        ));
        assert_eq!(
            parse_error("FREQ=MONTHLY;BYDAY=-2147483648MO"),
            ParseError::Rule(InvalidRuleError::OrdinalOutOfRange(i32::MIN))
        );
    }

    #[test]
    fn test_until_encodings() {
        let utc = parse("FREQ=DAILY;UNTIL=20240103T000000Z").unwrap();
        assert_eq!(
            utc.until().unwrap().with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()
        );

        let paris: Tz = "Europe/Paris".parse().unwrap();
        let start = paris.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let local = RecurrenceRule::parse("FREQ=DAILY;UNTIL=20240103T090000", start).unwrap();
        assert_eq!(
            local.until().unwrap().with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 1, 3, 8, 0, 0).unwrap()
        );

        let date_only = RecurrenceRule::parse("FREQ=DAILY;UNTIL=20240103", start).unwrap();
        assert_eq!(
            date_only.until().unwrap().with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 1, 2, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_until_rejects_other_forms() {
        for value in [
            "TZID=Europe/Paris:20240103T090000",
            "20240103T0900Z",
            "2024-01-03",
            "20241303",
            "20240103T250000Z",
        ] {
            let text = format!("FREQ=DAILY;UNTIL={value}");
            assert!(
                matches!(parse_error(&text), ParseError::InvalidUntil(_)),
                "{value}"
            );
        }
    }

    #[test]
    fn test_count_with_until_is_rejected() {
        assert_eq!(
            parse_error("FREQ=DAILY;COUNT=3;UNTIL=20240103T000000Z"),
            ParseError::Rule(InvalidRuleError::CountWithUntil)
        );
    }

    #[test]
    fn test_validator_runs_after_parse() {
        assert_eq!(
            parse_error("FREQ=WEEKLY;BYMONTHDAY=15"),
            ParseError::Rule(InvalidRuleError::ByMonthDayWithWeekly)
        );
        assert_eq!(
            parse_error("FREQ=DAILY;BYDAY=1MO"),
            ParseError::Rule(InvalidRuleError::ByDayOrdinalWithFrequency(
                Frequency::Daily
            ))
        );
    }

    #[test]
    fn test_bad_weekdays() {
        assert_eq!(
            parse_error("FREQ=WEEKLY;BYDAY=MO,XX"),
            ParseError::InvalidWeekday("XX".to_string())
        );
        assert_eq!(
            parse_error("FREQ=WEEKLY;WKST=mo"),
            ParseError::InvalidWeekday("mo".to_string())
        );
    }
}
