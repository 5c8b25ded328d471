use std::fmt;

use chrono::{DateTime, Datelike, Utc};

use crate::calendar::Calendar;
use crate::model::{Tracker, TrackerId, TrackerKind};
use crate::weekday::WeekDay;

/// Optional completion-status dimension of the tracker list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    Completed,
    Incomplete,
}

/// What the user is currently looking at. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub selected_date: DateTime<Utc>,
    pub search_text: String,
    pub completion: Option<CompletionState>,
    pub pinned_partition: bool,
}

impl FilterState {
    pub fn new(selected_date: DateTime<Utc>) -> Self {
        Self {
            selected_date,
            search_text: String::new(),
            completion: None,
            pinned_partition: false,
        }
    }

    pub fn for_partition(&self, pinned: bool) -> Self {
        Self {
            pinned_partition: pinned,
            ..self.clone()
        }
    }

    /// Search text trimmed and case-folded, or `None` when nothing is left.
    pub fn search_needle(&self) -> Option<String> {
        let trimmed = self.search_text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountComparison {
    Equal,
    GreaterThan,
}

impl CountComparison {
    fn holds(self, count: usize, value: usize) -> bool {
        match self {
            CountComparison::Equal => count == value,
            CountComparison::GreaterThan => count > value,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CountComparison::Equal => "==",
            CountComparison::GreaterThan => ">",
        }
    }
}

/// Completion counts a predicate needs while being evaluated.
pub trait CompletionLookup {
    /// Number of completion records of `tracker` on the UTC-midnight `day`.
    fn completions_on(&self, tracker: TrackerId, day: DateTime<Utc>) -> usize;
}

/// A filter over trackers, independent of any storage engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    PinnedEquals(bool),
    /// Irregular trackers, or regular trackers scheduled on the weekday.
    ScheduleMatches(WeekDay),
    /// Case-insensitive substring match; the needle is already folded.
    NameContains(String),
    CompletionCountCompare {
        day: DateTime<Utc>,
        comparison: CountComparison,
        value: usize,
    },
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, tracker: &Tracker, completions: &dyn CompletionLookup) -> bool {
        match self {
            Predicate::PinnedEquals(pinned) => tracker.pinned == *pinned,
            Predicate::ScheduleMatches(weekday) => tracker.is_scheduled_on(*weekday),
            Predicate::NameContains(needle) => tracker.name.to_lowercase().contains(needle.as_str()),
            Predicate::CompletionCountCompare {
                day,
                comparison,
                value,
            } => comparison.holds(completions.completions_on(tracker.id, *day), *value),
            Predicate::And(fragments) => fragments
                .iter()
                .all(|fragment| fragment.matches(tracker, completions)),
        }
    }

    /// The conjoined fragments, in evaluation order.
    pub fn fragments(&self) -> &[Predicate] {
        match self {
            Predicate::And(fragments) => fragments,
            other => std::slice::from_ref(other),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::PinnedEquals(pinned) => write!(f, "pinned == {pinned}"),
            Predicate::ScheduleMatches(weekday) => write!(
                f,
                "(kind == {:?} OR schedule CONTAINS {:?})",
                TrackerKind::Irregular,
                weekday.short_label()
            ),
            Predicate::NameContains(needle) => write!(f, "name CONTAINS[c] {needle:?}"),
            Predicate::CompletionCountCompare {
                day,
                comparison,
                value,
            } => write!(
                f,
                "SUBQUERY(completions, day == {}).@count {} {value}",
                day.format("%Y-%m-%d"),
                comparison.symbol()
            ),
            Predicate::And(fragments) if fragments.is_empty() => f.write_str("TRUEPREDICATE"),
            Predicate::And(fragments) => {
                for (idx, fragment) in fragments.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" AND ")?;
                    }
                    write!(f, "{fragment}")?;
                }
                Ok(())
            }
        }
    }
}

/// Turns a [`FilterState`] into one conjunction of the fragments that apply.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    calendar: Calendar,
}

impl QueryBuilder {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }

    pub fn pinned_fragment(&self, is_pinned: bool) -> Predicate {
        Predicate::PinnedEquals(is_pinned)
    }

    /// Omitted when the date cannot be mapped to a weekday, which matches all.
    pub fn schedule_fragment(&self, date: DateTime<Utc>) -> Option<Predicate> {
        let number = self.calendar.day_of(date).weekday().number_from_sunday();
        match WeekDay::from_number(number) {
            Some(weekday) => Some(Predicate::ScheduleMatches(weekday)),
            None => {
                tracing::warn!(number, "weekday out of range, schedule filter skipped");
                None
            }
        }
    }

    pub fn text_fragment(&self, search_text: &str) -> Option<Predicate> {
        let trimmed = search_text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Predicate::NameContains(trimmed.to_lowercase()))
    }

    pub fn completion_fragment(
        &self,
        date: DateTime<Utc>,
        state: Option<CompletionState>,
    ) -> Option<Predicate> {
        let day = self.calendar.truncate_to_utc_day(date);
        let comparison = match state? {
            CompletionState::Completed => CountComparison::GreaterThan,
            CompletionState::Incomplete => CountComparison::Equal,
        };
        Some(Predicate::CompletionCountCompare {
            day,
            comparison,
            value: 0,
        })
    }

    /// pinned → schedule → text → completion, skipping absent fragments.
    pub fn build(&self, filter: &FilterState) -> Predicate {
        let mut fragments = vec![self.pinned_fragment(filter.pinned_partition)];
        fragments.extend(self.schedule_fragment(filter.selected_date));
        fragments.extend(self.text_fragment(&filter.search_text));
        fragments.extend(self.completion_fragment(filter.selected_date, filter.completion));
        let predicate = Predicate::And(fragments);
        tracing::debug!(%predicate, "built tracker query");
        predicate
    }
}
