//! Cross-part legality checks from RFC 5545 §3.3.10.
//!
//! Per-value range checks happen earlier, when a [`crate::types::BoundedList`]
//! is filled. This module checks how the parts combine with FREQ and with
//! each other.

use crate::error::InvalidRuleError;
use crate::rule::{RecurrenceBound, RecurrenceRule};
use crate::types::Frequency;

/// Check an assembled rule, naming the first violated constraint.
pub fn validate(rule: &RecurrenceRule) -> Result<(), InvalidRuleError> {
    let frequency = rule.frequency();

    if rule.interval() == 0 {
        return Err(InvalidRuleError::ZeroInterval);
    }
    if rule.bound() == RecurrenceBound::Count(0) {
        return Err(InvalidRuleError::ZeroCount);
    }

    if !rule.by_month_day().is_empty() && frequency == Frequency::Weekly {
        return Err(InvalidRuleError::ByMonthDayWithWeekly);
    }

    if !rule.by_year_day().is_empty()
        && matches!(
            frequency,
            Frequency::Daily | Frequency::Weekly | Frequency::Monthly
        )
    {
        return Err(InvalidRuleError::ByYearDayWithFrequency(frequency));
    }

    if !rule.by_week_no().is_empty() && frequency != Frequency::Yearly {
        return Err(InvalidRuleError::ByWeekNoRequiresYearly(frequency));
    }

    if !rule.by_set_pos().is_empty() && !rule.has_by_parts() {
        return Err(InvalidRuleError::BySetPosWithoutOtherPart);
    }

    if rule.by_day().iter().any(|day| day.has_ordinal()) {
        match frequency {
            Frequency::Monthly => {}
            Frequency::Yearly if rule.by_week_no().is_empty() => {}
            Frequency::Yearly => return Err(InvalidRuleError::ByDayOrdinalWithByWeekNo),
            other => return Err(InvalidRuleError::ByDayOrdinalWithFrequency(other)),
        }
    }

    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────
