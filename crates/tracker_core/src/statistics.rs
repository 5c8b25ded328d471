use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};

use crate::model::{CompletionRecord, Tracker, TrackerId};
use crate::weekday::WeekDay;

/// Aggregates shown on the statistics screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Longest run of consecutive days with at least one completion.
    pub best_streak: usize,
    /// Days on which every tracker expected that weekday was completed.
    pub perfect_days: usize,
    pub completed_total: usize,
    /// Completions per active day, rounded down.
    pub average_per_day: usize,
}

impl Statistics {
    pub fn compute(trackers: &[Tracker], completions: &[CompletionRecord]) -> Self {
        let mut by_day: BTreeMap<NaiveDate, HashSet<TrackerId>> = BTreeMap::new();
        for record in completions {
            by_day
                .entry(record.day.date_naive())
                .or_default()
                .insert(record.tracker_id);
        }
        if by_day.is_empty() {
            return Self::default();
        }

        let perfect_days = by_day
            .iter()
            .filter(|(date, done)| {
                let weekday = WeekDay::from_chrono(date.weekday());
                let mut expected = trackers
                    .iter()
                    .filter(|tracker| tracker.is_expected_on(weekday))
                    .peekable();
                expected.peek().is_some() && expected.all(|tracker| done.contains(&tracker.id))
            })
            .count();

        let mut best_streak = 0;
        let mut run = 0;
        let mut previous: Option<NaiveDate> = None;
        for date in by_day.keys() {
            run = match previous {
                Some(prev) if prev.succ_opt() == Some(*date) => run + 1,
                _ => 1,
            };
            best_streak = best_streak.max(run);
            previous = Some(*date);
        }

        let completed_total = by_day.values().map(HashSet::len).sum::<usize>();
        Self {
            best_streak,
            perfect_days,
            completed_total,
            average_per_day: completed_total / by_day.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.completed_total == 0
    }
}
