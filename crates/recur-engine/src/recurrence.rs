//! Occurrence search: a memoized, lazily grown occurrence list.
//!
//! A [`Recurrence`] owns one rule and the mutable search state for it. Every
//! query first grows the memoized list far enough to answer, by calling the
//! candidate generator one FREQ/INTERVAL step at a time, then answers from
//! the list. Growth stops when COUNT occurrences are memoized, when a
//! candidate passes UNTIL, or when too many consecutive steps come back
//! empty (the failed-attempt budget in [`SearchOptions`]).
//!
//! The budget is a soft cutoff. A `None` from [`Recurrence::next_after`] with
//! [`Recurrence::is_exhausted`] still `false` means "nothing found within the
//! budget", not "the rule has ended". Rules with long gaps between
//! occurrences, such as `FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=29`, may need a
//! larger budget than the default.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dst::DstPolicy;
use crate::error::Result;
use crate::generator::Generator;
use crate::rule::RecurrenceRule;

/// Default number of consecutive empty generator steps before a search gives up.
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 100;

/// Tunables for one evaluation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Consecutive generator steps that may add nothing before a query gives up.
    pub max_failed_attempts: u32,
    /// How candidates that fall into a DST gap are resolved.
    pub dst_policy: DstPolicy,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            dst_policy: DstPolicy::default(),
        }
    }
}

/// Everything a session has computed so far. Grows monotonically and is
/// thrown away whenever the rule changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OccurrenceSearchState {
    memoized: Vec<DateTime<Tz>>,
    iteration_count: u64,
    reference_instant: Option<NaiveDateTime>,
    exhausted: bool,
}

impl OccurrenceSearchState {
    /// Occurrences found so far, ascending and deduplicated. Includes
    /// excluded instants, since they still count toward COUNT.
    pub fn memoized_occurrences(&self) -> &[DateTime<Tz>] {
        &self.memoized
    }

    /// The next FREQ/INTERVAL step the generator will run.
    pub fn iteration_count(&self) -> u64 {
        self.iteration_count
    }

    /// Wall-clock seed of the most recent generator step.
    pub fn reference_instant(&self) -> Option<NaiveDateTime> {
        self.reference_instant
    }

    /// True once COUNT is reached, UNTIL is passed, or the calendar runs out.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// One rule plus its search state.
///
/// Queries take `&mut self` because they extend the memoized list. A session
/// is meant to be owned by a single caller; share it behind your own lock.
#[derive(Debug, Clone)]
pub struct Recurrence {
    generator: Generator,
    options: SearchOptions,
    exclusions: BTreeSet<DateTime<Tz>>,
    state: OccurrenceSearchState,
}

impl Recurrence {
    pub fn new(rule: RecurrenceRule) -> Self {
        Self::with_options(rule, SearchOptions::default())
    }

    pub fn with_options(rule: RecurrenceRule, options: SearchOptions) -> Self {
        Self {
            generator: Generator::new(rule, options.dst_policy),
            options,
            exclusions: BTreeSet::new(),
            state: OccurrenceSearchState::default(),
        }
    }

    /// Parse `text` anchored at `start` and open a session with default options.
    pub fn parse(text: &str, start: DateTime<Tz>) -> Result<Self> {
        Ok(Self::new(RecurrenceRule::parse(text, start)?))
    }

    /// Skip these instants in every query (EXDATE). They still count
    /// toward COUNT.
    pub fn with_exclusions<T, I>(mut self, exclusions: I) -> Self
    where
        T: TimeZone,
        I: IntoIterator<Item = DateTime<T>>,
    {
        let tz = self.time_zone();
        self.exclusions
            .extend(exclusions.into_iter().map(|at| at.with_timezone(&tz)));
        self
    }

    /// Apply a rule mutator and return a session over the new rule with
    /// fresh search state. `self` is left untouched, so a failed mutation
    /// keeps the previous session usable.
    pub fn reconfigure<F>(&self, mutate: F) -> Result<Self>
    where
        F: FnOnce(RecurrenceRule) -> Result<RecurrenceRule>,
    {
        let rule = mutate(self.rule().clone())?;
        let exclusions = self.exclusions.iter().copied().collect::<Vec<_>>();
        Ok(Self::with_options(rule, self.options).with_exclusions(exclusions))
    }

    pub fn rule(&self) -> &RecurrenceRule {
        self.generator.rule()
    }

    pub fn options(&self) -> SearchOptions {
        self.options
    }

    pub fn state(&self) -> &OccurrenceSearchState {
        &self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.exhausted
    }

    pub fn time_zone(&self) -> Tz {
        self.rule().time_zone()
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// The first occurrence strictly after `instant`.
    pub fn next_after<T: TimeZone>(&mut self, instant: &DateTime<T>) -> Option<DateTime<Tz>> {
        let instant = instant.with_timezone(&self.time_zone());
        self.extend_while(|r| r.first_memoized_after(&instant).is_none());
        self.first_memoized_after(&instant)
    }

    /// The last occurrence strictly before `instant`. Always `None` at or
    /// before the rule's start.
    pub fn previous_before<T: TimeZone>(
        &mut self,
        instant: &DateTime<T>,
    ) -> Option<DateTime<Tz>> {
        let instant = instant.with_timezone(&self.time_zone());
        if instant <= self.rule().start() {
            return None;
        }
        self.extend_while(|r| r.last_memoized().map_or(true, |last| *last < instant));

        let end = self.state.memoized.partition_point(|at| *at < instant);
        self.state.memoized[..end]
            .iter()
            .rev()
            .find(|at| !self.exclusions.contains(*at))
            .copied()
    }

    /// The last occurrence of a COUNT- or UNTIL-bounded rule. `None` for an
    /// unbounded rule, or when the budget runs out before the bound is hit.
    pub fn final_occurrence(&mut self) -> Option<DateTime<Tz>> {
        if !self.rule().is_bounded() {
            return None;
        }
        self.extend_while(|_| true);
        if !self.state.exhausted {
            return None;
        }
        self.state
            .memoized
            .iter()
            .rev()
            .find(|at| !self.exclusions.contains(*at))
            .copied()
    }

    /// Whether `instant` is an occurrence. With `day_only`, whether any
    /// occurrence falls on the same local calendar day in the rule's zone.
    pub fn contains<T: TimeZone>(&mut self, instant: &DateTime<T>, day_only: bool) -> bool {
        let instant = instant.with_timezone(&self.time_zone());
        if day_only {
            let day = instant.date_naive();
            self.extend_while(|r| r.last_memoized().map_or(true, |last| last.date_naive() <= day));
            for at in self.state.memoized.iter().rev() {
                let at_day = at.date_naive();
                if at_day < day {
                    break;
                }
                if at_day == day && !self.exclusions.contains(at) {
                    return true;
                }
            }
            false
        } else {
            self.extend_while(|r| r.last_memoized().map_or(true, |last| *last < instant));
            for at in self.state.memoized.iter().rev() {
                if *at < instant {
                    break;
                }
                if *at == instant {
                    return !self.exclusions.contains(at);
                }
            }
            false
        }
    }

    /// Occurrences strictly after `instant`, in order.
    pub fn iter_after<T: TimeZone>(&mut self, instant: &DateTime<T>) -> Occurrences<'_> {
        let cursor = instant.with_timezone(&self.time_zone());
        Occurrences {
            recurrence: self,
            cursor,
        }
    }

    /// Occurrences in `[from, to)`, in order.
    pub fn between<A: TimeZone, B: TimeZone>(
        &mut self,
        from: &DateTime<A>,
        to: &DateTime<B>,
    ) -> Vec<DateTime<Tz>> {
        let tz = self.time_zone();
        let from = from.with_timezone(&tz);
        let to = to.with_timezone(&tz);
        if from >= to {
            return Vec::new();
        }
        self.extend_while(|r| r.last_memoized().map_or(true, |last| *last < to));
        self.state
            .memoized
            .iter()
            .filter(|at| **at >= from && **at < to && !self.exclusions.contains(*at))
            .copied()
            .collect()
    }

    // ── Growth ──────────────────────────────────────────────────────────

    fn last_memoized(&self) -> Option<&DateTime<Tz>> {
        self.state.memoized.last()
    }

    fn first_memoized_after(&self, instant: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let from = self.state.memoized.partition_point(|at| at <= instant);
        self.state.memoized[from..]
            .iter()
            .find(|at| !self.exclusions.contains(*at))
            .copied()
    }

    /// Run generator steps while `wants_more` holds, until the search is
    /// exhausted or the failed-attempt budget runs out.
    fn extend_while(&mut self, mut wants_more: impl FnMut(&Self) -> bool) {
        let mut failures: u32 = 0;
        while !self.state.exhausted && wants_more(self) {
            if self.grow() {
                failures = 0;
                continue;
            }
            failures += 1;
            if failures > self.options.max_failed_attempts {
                debug!(
                    step = self.state.iteration_count,
                    max_failed_attempts = self.options.max_failed_attempts,
                    "search budget exhausted"
                );
                return;
            }
        }
    }

    /// One generator step. True when it memoized at least one occurrence.
    fn grow(&mut self) -> bool {
        let step = self.state.iteration_count;
        let Some(batch) = self.generator.advance_and_expand(step) else {
            debug!(step, "calendar range exhausted");
            self.state.exhausted = true;
            return false;
        };
        trace!(
            step,
            seed = %batch.reference,
            candidates = batch.candidates.len(),
            "generator step"
        );
        self.state.iteration_count = batch.next_step;
        self.state.reference_instant = Some(batch.reference);

        let count = self.rule().count().map(|count| count as usize);
        let until = self.rule().until();
        let before = self.state.memoized.len();

        for candidate in batch.candidates {
            if self
                .state
                .memoized
                .last()
                .is_some_and(|last| candidate <= *last)
            {
                continue;
            }
            if until.is_some_and(|until| candidate > until) {
                self.state.exhausted = true;
                break;
            }
            self.state.memoized.push(candidate);
            if count.is_some_and(|count| self.state.memoized.len() >= count) {
                self.state.exhausted = true;
                break;
            }
        }

        // Later periods start after this one, so an empty period wholly past
        // UNTIL ends the search too.
        if let Some(until) = until {
            let limit = until.naive_local().checked_add_signed(Duration::days(1));
            if limit.map_or(true, |limit| batch.period_start > limit) {
                self.state.exhausted = true;
            }
        }

        let added = self.state.memoized.len() - before;
        if added > 0 {
            debug!(
                step,
                added,
                total = self.state.memoized.len(),
                exhausted = self.state.exhausted,
                "memoized occurrences"
            );
        }
        added > 0
    }
}

/// Iterator returned by [`Recurrence::iter_after`].
pub struct Occurrences<'a> {
    recurrence: &'a mut Recurrence,
    cursor: DateTime<Tz>,
}

impl Iterator for Occurrences<'_> {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.recurrence.next_after(&self.cursor)?;
        self.cursor = next;
        Some(next)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
