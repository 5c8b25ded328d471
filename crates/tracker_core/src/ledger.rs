use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::calendar::Calendar;
use crate::error::StoreError;
use crate::model::TrackerId;
use crate::store::TrackerStore;

/// Per-tracker, per-day completion bookkeeping on top of a store.
///
/// Every date is truncated with [`Calendar::truncate_to_utc_day`] before it
/// reaches the store, so a tracker holds at most one record per day.
#[derive(Clone)]
pub struct CompletionLedger {
    store: Arc<dyn TrackerStore>,
    calendar: Calendar,
}

impl CompletionLedger {
    pub fn new(store: Arc<dyn TrackerStore>, calendar: Calendar) -> Self {
        Self { store, calendar }
    }

    /// Brings the record for `date` in line with `completed`.
    ///
    /// Returns whether anything changed; repeating a call is a no-op.
    pub fn toggle(
        &self,
        tracker: TrackerId,
        date: DateTime<Utc>,
        completed: bool,
    ) -> Result<bool, StoreError> {
        let day = self.calendar.truncate_to_utc_day(date);
        let exists = self.has_record(tracker, day)?;
        match (completed, exists) {
            (true, false) => self.store.insert_completion(tracker, day)?,
            (false, true) => self.store.delete_completion(tracker, day)?,
            _ => return Ok(false),
        }
        tracing::debug!(%tracker, %day, completed, "completion toggled");
        Ok(true)
    }

    pub fn is_completed(&self, tracker: TrackerId, date: DateTime<Utc>) -> Result<bool, StoreError> {
        self.has_record(tracker, self.calendar.truncate_to_utc_day(date))
    }

    /// Completions of `tracker` on or before the day of `through`.
    pub fn count(&self, tracker: TrackerId, through: DateTime<Utc>) -> Result<usize, StoreError> {
        let last_day = self.calendar.truncate_to_utc_day(through);
        Ok(self
            .store
            .completions(tracker)?
            .iter()
            .filter(|record| record.day <= last_day)
            .count())
    }

    fn has_record(&self, tracker: TrackerId, day: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self
            .store
            .completions(tracker)?
            .iter()
            .any(|record| record.day == day))
    }
}
