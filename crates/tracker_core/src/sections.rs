use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::calendar::Calendar;
use crate::changes::{ChangeEvent, IndexPath, Partition, RowChange, SectionChange};
use crate::error::StoreError;
use crate::ledger::CompletionLedger;
use crate::model::{Category, CategoryId, Tracker, TrackerId};
use crate::predicate::{FilterState, QueryBuilder};
use crate::store::TrackerStore;

pub const PINNED_SECTION_TITLE: &str = "Закреплённые";

/// A visible tracker together with its completion state for the selected date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerRow {
    pub tracker: Tracker,
    pub is_completed: bool,
    /// Completions up to and including the selected date.
    pub completed_days: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySection {
    pub category: Category,
    pub rows: Vec<TrackerRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Layout {
    pinned: Vec<TrackerRow>,
    categories: Vec<CategorySection>,
}

impl Layout {
    /// Position of `id` in the coordinates of `partition`.
    fn local_path(&self, partition: Partition, id: TrackerId) -> Option<IndexPath> {
        match partition {
            Partition::Pinned => self
                .pinned
                .iter()
                .position(|row| row.tracker.id == id)
                .map(|row| IndexPath::new(0, row)),
            Partition::Unpinned => self.categories.iter().enumerate().find_map(|(section, s)| {
                s.rows
                    .iter()
                    .position(|row| row.tracker.id == id)
                    .map(|row| IndexPath::new(section, row))
            }),
        }
    }

    fn category_keys(&self) -> Vec<CategoryId> {
        self.categories.iter().map(|s| s.category.id).collect()
    }

    fn trackers_in<'a>(
        &'a self,
        categories: &'a HashSet<CategoryId>,
    ) -> impl Iterator<Item = TrackerId> + 'a {
        self.categories
            .iter()
            .filter(move |s| categories.contains(&s.category.id))
            .flat_map(|s| s.rows.iter().map(|row| row.tracker.id))
    }

    fn visible_count(&self) -> usize {
        self.pinned.len() + self.categories.iter().map(|s| s.rows.len()).sum::<usize>()
    }
}

/// Sectioned view of the trackers visible under the current filter.
///
/// Section 0 always holds the pinned trackers (possibly none); sections
/// `1..=N` hold one category each, ordered by category name.
pub struct TrackerSections {
    queries: QueryBuilder,
    filter: FilterState,
    layout: Layout,
}

impl TrackerSections {
    pub fn new(calendar: Calendar, filter: FilterState) -> Self {
        Self {
            queries: QueryBuilder::new(calendar),
            filter,
            layout: Layout::default(),
        }
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    /// Replaces the filter and re-evaluates every tracker.
    pub fn reload(
        &mut self,
        store: &dyn TrackerStore,
        ledger: &CompletionLedger,
        filter: FilterState,
    ) -> Result<(), StoreError> {
        self.filter = filter;
        self.layout = self.compute(store, ledger)?;
        tracing::debug!(
            visible = self.layout.visible_count(),
            sections = self.section_count(),
            "tracker sections reloaded"
        );
        Ok(())
    }

    /// Re-evaluates after a store transaction and reports the row and
    /// section deltas of both partitions in partition-local coordinates.
    pub fn refresh(
        &mut self,
        store: &dyn TrackerStore,
        ledger: &CompletionLedger,
        changed_trackers: &HashSet<TrackerId>,
        changed_categories: &HashSet<CategoryId>,
    ) -> Result<Vec<ChangeEvent>, StoreError> {
        let next = self.compute(store, ledger)?;
        let mut events = Vec::new();

        let old_keys = self.layout.category_keys();
        let new_keys = next.category_keys();
        // Sections that survive but changed relative order (e.g. after a
        // rename) are reported as deleted and re-inserted.
        let kept_old: Vec<CategoryId> = old_keys.iter().copied().filter(|key| new_keys.contains(key)).collect();
        let kept_new: Vec<CategoryId> = new_keys.iter().copied().filter(|key| old_keys.contains(key)).collect();
        let reordered: HashSet<CategoryId> = kept_old
            .iter()
            .zip(&kept_new)
            .filter(|(before, after)| before != after)
            .flat_map(|(before, after)| [*before, *after])
            .collect();
        let deleted_sections: HashSet<usize> = old_keys
            .iter()
            .enumerate()
            .filter(|(_, key)| !new_keys.contains(key) || reordered.contains(key))
            .map(|(idx, _)| idx)
            .collect();
        let inserted_sections: HashSet<usize> = new_keys
            .iter()
            .enumerate()
            .filter(|(_, key)| !old_keys.contains(key) || reordered.contains(key))
            .map(|(idx, _)| idx)
            .collect();
        for idx in sorted(&deleted_sections) {
            events.push(ChangeEvent::Section {
                partition: Partition::Unpinned,
                change: SectionChange::Delete(idx),
            });
        }
        for idx in sorted(&inserted_sections) {
            events.push(ChangeEvent::Section {
                partition: Partition::Unpinned,
                change: SectionChange::Insert(idx),
            });
        }

        for partition in [Partition::Pinned, Partition::Unpinned] {
            let mut candidates: BTreeSet<TrackerId> = changed_trackers.iter().copied().collect();
            if partition == Partition::Unpinned {
                candidates.extend(self.layout.trackers_in(changed_categories));
                candidates.extend(next.trackers_in(changed_categories));
            }
            let unpinned = partition == Partition::Unpinned;
            for id in candidates {
                // rows inside inserted or deleted sections travel with them
                let before = self
                    .layout
                    .local_path(partition, id)
                    .filter(|path| !(unpinned && deleted_sections.contains(&path.section)));
                let after = next
                    .local_path(partition, id)
                    .filter(|path| !(unpinned && inserted_sections.contains(&path.section)));
                let change = match (before, after) {
                    (Some(from), Some(to)) if from == to => RowChange::Update { at: from },
                    (Some(from), Some(to)) => RowChange::Move { from, to },
                    (Some(at), None) => RowChange::Delete { at },
                    (None, Some(at)) => RowChange::Insert { at },
                    (None, None) => continue,
                };
                events.push(ChangeEvent::Row { partition, change });
            }
        }

        self.layout = next;
        tracing::debug!(events = events.len(), "tracker sections refreshed");
        Ok(events)
    }

    pub fn section_count(&self) -> usize {
        1 + self.layout.categories.len()
    }

    /// Zero for sections that do not exist.
    pub fn row_count(&self, section: usize) -> usize {
        match section {
            0 => self.layout.pinned.len(),
            _ => self
                .layout
                .categories
                .get(section - 1)
                .map_or(0, |s| s.rows.len()),
        }
    }

    pub fn section_title(&self, section: usize) -> Option<&str> {
        match section {
            0 => Some(PINNED_SECTION_TITLE),
            _ => self
                .layout
                .categories
                .get(section - 1)
                .map(|s| s.category.name.as_str()),
        }
    }

    pub fn tracker_at(&self, path: IndexPath) -> Option<&TrackerRow> {
        match path.section {
            0 => self.layout.pinned.get(path.row),
            section => self
                .layout
                .categories
                .get(section - 1)?
                .rows
                .get(path.row),
        }
    }

    /// Where `id` is shown right now. Pinned rows are looked up first.
    pub fn locate(&self, id: TrackerId) -> Option<IndexPath> {
        if let Some(path) = self.layout.local_path(Partition::Pinned, id) {
            return Some(path);
        }
        self.layout
            .local_path(Partition::Unpinned, id)
            .map(|path| IndexPath::new(Partition::Unpinned.global_section(path.section), path.row))
    }

    pub fn pinned_rows(&self) -> &[TrackerRow] {
        &self.layout.pinned
    }

    pub fn category_sections(&self) -> &[CategorySection] {
        &self.layout.categories
    }

    /// Nothing matches the current filter.
    pub fn is_empty(&self) -> bool {
        self.layout.visible_count() == 0
    }

    fn compute(&self, store: &dyn TrackerStore, ledger: &CompletionLedger) -> Result<Layout, StoreError> {
        let pinned_query = self.queries.build(&self.filter.for_partition(true));
        let mut pinned = store.fetch_trackers(&pinned_query)?;
        pinned.sort_by(|a, b| compare_names(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
        let pinned = pinned
            .into_iter()
            .map(|tracker| self.row(ledger, tracker))
            .collect::<Result<Vec<_>, _>>()?;

        let categories: HashMap<CategoryId, Category> = store
            .categories()?
            .into_iter()
            .map(|category| (category.id, category))
            .collect();
        let unpinned_query = self.queries.build(&self.filter.for_partition(false));
        let mut unpinned: Vec<(&Category, Tracker)> = store
            .fetch_trackers(&unpinned_query)?
            .into_iter()
            .filter_map(|tracker| match categories.get(&tracker.category) {
                Some(category) => Some((category, tracker)),
                None => {
                    tracing::warn!(tracker = %tracker.id, "tracker references a missing category");
                    None
                }
            })
            .collect();
        unpinned.sort_by(|(ca, a), (cb, b)| {
            compare_names(&ca.name, &cb.name)
                .then_with(|| ca.id.cmp(&cb.id))
                .then_with(|| compare_names(&a.name, &b.name))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut sections: Vec<CategorySection> = Vec::new();
        for (category, tracker) in unpinned {
            let row = self.row(ledger, tracker)?;
            match sections.last_mut() {
                Some(section) if section.category.id == category.id => section.rows.push(row),
                _ => sections.push(CategorySection {
                    category: category.clone(),
                    rows: vec![row],
                }),
            }
        }

        Ok(Layout {
            pinned,
            categories: sections,
        })
    }

    fn row(&self, ledger: &CompletionLedger, tracker: Tracker) -> Result<TrackerRow, StoreError> {
        let date = self.filter.selected_date;
        Ok(TrackerRow {
            is_completed: ledger.is_completed(tracker.id, date)?,
            completed_days: ledger.count(tracker.id, date)?,
            tracker,
        })
    }
}

/// Display order of names: case-insensitive, with "ё" sorted as "е".
/// Names that fold to the same key fall back to code point order.
pub(crate) fn compare_names(a: &str, b: &str) -> Ordering {
    fn folded(name: &str) -> impl Iterator<Item = char> + '_ {
        name.chars()
            .flat_map(char::to_lowercase)
            .map(|c| if c == 'ё' { 'е' } else { c })
    }
    folded(a).cmp(folded(b)).then_with(|| a.cmp(b))
}

fn sorted(set: &HashSet<usize>) -> Vec<usize> {
    let mut values: Vec<usize> = set.iter().copied().collect();
    values.sort_unstable();
    values
}
