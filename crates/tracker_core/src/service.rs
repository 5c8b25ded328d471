use std::collections::HashSet;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::calendar::Calendar;
use crate::changes::{ChangeBatcher, ChangeSink};
use crate::draft::{validate_name, TrackerDraft};
use crate::error::{StoreError, TrackerError};
use crate::ledger::CompletionLedger;
use crate::model::{Category, CategoryId, Tracker, TrackerId};
use crate::predicate::{CompletionState, FilterState};
use crate::sections::{compare_names, TrackerSections};
use crate::statistics::Statistics;
use crate::store::{MemoryStore, StoreEvent, TrackerStore};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Facade used by the presentation layer. All mutation flows through here.
pub struct TrackerService {
    store: Arc<dyn TrackerStore>,
    events: Receiver<StoreEvent>,
    calendar: Calendar,
    ledger: CompletionLedger,
    sections: TrackerSections,
    batcher: ChangeBatcher,
    changed_trackers: HashSet<TrackerId>,
    changed_categories: HashSet<CategoryId>,
    /// Set when a refresh failed; the next pump rebuilds the layout.
    stale: bool,
    sinks: Vec<Box<dyn ChangeSink>>,
    clock: Clock,
}

pub struct TrackerServiceBuilder {
    store: Option<Arc<dyn TrackerStore>>,
    calendar: Calendar,
    sinks: Vec<Box<dyn ChangeSink>>,
    clock: Clock,
    selected_date: Option<DateTime<Utc>>,
}

impl TrackerServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            calendar: Calendar::default(),
            sinks: Vec::new(),
            clock: Box::new(Utc::now),
            selected_date: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn TrackerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_change_sink(mut self, sink: Box<dyn ChangeSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Overrides what "today" means; defaults to the system clock.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Initially selected date; defaults to today.
    pub fn selected_date(mut self, date: DateTime<Utc>) -> Self {
        self.selected_date = Some(date);
        self
    }

    pub fn build(self) -> Result<TrackerService, TrackerError> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn TrackerStore>);
        let events = store.subscribe();
        let selected_date = self.selected_date.unwrap_or_else(|| (self.clock)());
        let filter = FilterState::new(selected_date);
        let ledger = CompletionLedger::new(store.clone(), self.calendar);
        let mut sections = TrackerSections::new(self.calendar, filter.clone());
        sections.reload(store.as_ref(), &ledger, filter)?;
        Ok(TrackerService {
            store,
            events,
            calendar: self.calendar,
            ledger,
            sections,
            batcher: ChangeBatcher::new(),
            changed_trackers: HashSet::new(),
            changed_categories: HashSet::new(),
            stale: false,
            sinks: self.sinks,
            clock: self.clock,
        })
    }
}

impl Default for TrackerServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerService {
    pub fn builder() -> TrackerServiceBuilder {
        TrackerServiceBuilder::new()
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn sections(&self) -> &TrackerSections {
        &self.sections
    }

    pub fn filter(&self) -> &FilterState {
        self.sections.filter()
    }

    pub fn today(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    // -- filter ------------------------------------------------------------

    pub fn set_selected_date(&mut self, date: DateTime<Utc>) -> Result<(), TrackerError> {
        let mut filter = self.filter().clone();
        filter.selected_date = date;
        self.apply_filter(filter)
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) -> Result<(), TrackerError> {
        let mut filter = self.filter().clone();
        filter.search_text = text.into();
        self.apply_filter(filter)
    }

    pub fn set_completion_filter(
        &mut self,
        completion: Option<CompletionState>,
    ) -> Result<(), TrackerError> {
        let mut filter = self.filter().clone();
        filter.completion = completion;
        self.apply_filter(filter)
    }

    fn apply_filter(&mut self, filter: FilterState) -> Result<(), TrackerError> {
        // settle pending store transactions against the current layout first
        self.pump()?;
        if *self.filter() == filter {
            return Ok(());
        }
        self.sections
            .reload(self.store.as_ref(), &self.ledger, filter)?;
        for sink in &self.sinks {
            sink.reload();
        }
        Ok(())
    }

    // -- categories --------------------------------------------------------

    /// Categories ordered by name.
    pub fn categories(&self) -> Result<Vec<Category>, TrackerError> {
        let mut categories = self.store.categories()?;
        categories.sort_by(|a, b| compare_names(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(categories)
    }

    #[instrument(skip(self))]
    pub fn create_category(&mut self, name: &str) -> Result<Category, TrackerError> {
        let category = Category::new(validate_name(name)?);
        self.store.upsert_category(category.clone())?;
        self.pump()?;
        tracing::info!(category = %category.id, "category created");
        Ok(category)
    }

    #[instrument(skip(self))]
    pub fn rename_category(&mut self, id: CategoryId, name: &str) -> Result<Category, TrackerError> {
        let name = validate_name(name)?;
        let mut category = self
            .store
            .categories()?
            .into_iter()
            .find(|category| category.id == id)
            .ok_or(StoreError::CategoryNotFound(id))?;
        category.name = name;
        self.store.upsert_category(category.clone())?;
        self.pump()?;
        Ok(category)
    }

    pub fn trackers_in_category(&self, id: CategoryId) -> Result<Vec<Tracker>, TrackerError> {
        Ok(self
            .store
            .trackers()?
            .into_iter()
            .filter(|tracker| tracker.category == id)
            .collect())
    }

    // -- trackers ----------------------------------------------------------

    pub fn tracker(&self, id: TrackerId) -> Result<Option<Tracker>, TrackerError> {
        Ok(self.store.tracker(id)?)
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub fn create_tracker(&mut self, draft: TrackerDraft) -> Result<Tracker, TrackerError> {
        let tracker = draft.validate()?;
        self.store.insert_tracker(tracker.clone())?;
        self.pump()?;
        tracing::info!(tracker = %tracker.id, "tracker created");
        Ok(tracker)
    }

    /// Saves an edited draft over the tracker it was created from.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub fn update_tracker(&mut self, draft: TrackerDraft) -> Result<Tracker, TrackerError> {
        let tracker = draft.validate()?;
        self.store.update_tracker(tracker.clone())?;
        self.pump()?;
        Ok(tracker)
    }

    #[instrument(skip(self))]
    pub fn set_pinned(&mut self, id: TrackerId, pinned: bool) -> Result<(), TrackerError> {
        let mut tracker = self
            .store
            .tracker(id)?
            .ok_or(StoreError::TrackerNotFound(id))?;
        if tracker.pinned == pinned {
            return Ok(());
        }
        tracker.pinned = pinned;
        self.store.update_tracker(tracker)?;
        self.pump()?;
        Ok(())
    }

    /// Deletes the tracker and, with it, all of its completion records.
    #[instrument(skip(self))]
    pub fn delete_tracker(&mut self, id: TrackerId) -> Result<(), TrackerError> {
        self.store.delete_tracker(id)?;
        self.pump()?;
        tracing::info!(tracker = %id, "tracker deleted");
        Ok(())
    }

    // -- completions -------------------------------------------------------

    /// Marks `id` done (or not) on the day of `date`.
    ///
    /// A store failure after the in-memory change still refreshes the view
    /// so it shows the optimistic state, and the failure is returned.
    #[instrument(skip(self))]
    pub fn toggle_completion(
        &mut self,
        id: TrackerId,
        date: DateTime<Utc>,
        completed: bool,
    ) -> Result<(), TrackerError> {
        let today = self.today();
        if self.calendar.is_after_day(Some(date), Some(today)) {
            return Err(TrackerError::FutureDate {
                date: self.calendar.day_of(date),
            });
        }
        let outcome = self.ledger.toggle(id, date, completed);
        let refreshed = self.pump();
        if let Err(err) = &outcome {
            tracing::warn!(%err, tracker = %id, "completion was not persisted");
        }
        outcome?;
        refreshed
    }

    pub fn is_completed(&self, id: TrackerId, date: DateTime<Utc>) -> Result<bool, TrackerError> {
        Ok(self.ledger.is_completed(id, date)?)
    }

    pub fn completed_days(&self, id: TrackerId, through: DateTime<Utc>) -> Result<usize, TrackerError> {
        Ok(self.ledger.count(id, through)?)
    }

    pub fn statistics(&self) -> Result<Statistics, TrackerError> {
        let trackers = self.store.trackers()?;
        let completions = self.store.all_completions()?;
        Ok(Statistics::compute(&trackers, &completions))
    }

    // -- change propagation ------------------------------------------------

    /// Drains the store's change stream, turning every finished transaction
    /// into one batched notification for the sinks.
    ///
    /// A failed refresh drops the open batch; the next pump reloads the
    /// whole layout and asks the sinks to reload instead of diffing.
    fn pump(&mut self) -> Result<(), TrackerError> {
        let events: Vec<StoreEvent> = self.events.try_iter().collect();
        if self.stale {
            let filter = self.filter().clone();
            self.sections.reload(self.store.as_ref(), &self.ledger, filter)?;
            self.stale = false;
            for sink in &self.sinks {
                sink.reload();
            }
            return Ok(());
        }
        for event in events {
            match event {
                StoreEvent::Begin => {
                    if !self.batcher.is_open() {
                        self.changed_trackers.clear();
                        self.changed_categories.clear();
                    }
                    self.batcher.begin();
                }
                StoreEvent::Tracker { id, .. } => {
                    self.changed_trackers.insert(id);
                }
                StoreEvent::Category { id, .. } => {
                    self.changed_categories.insert(id);
                }
                StoreEvent::End => {
                    let refreshed = self.sections.refresh(
                        self.store.as_ref(),
                        &self.ledger,
                        &self.changed_trackers,
                        &self.changed_categories,
                    );
                    let deltas = match refreshed {
                        Ok(deltas) => deltas,
                        Err(err) => {
                            tracing::warn!(%err, "tracker sections could not be refreshed");
                            self.batcher.reset();
                            self.changed_trackers.clear();
                            self.changed_categories.clear();
                            self.stale = true;
                            return Err(err.into());
                        }
                    };
                    for delta in deltas {
                        self.batcher.record(delta);
                    }
                    if let Some(changes) = self.batcher.end() {
                        if changes.is_empty() {
                            continue;
                        }
                        for sink in &self.sinks {
                            sink.apply(&changes);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
