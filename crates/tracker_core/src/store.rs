use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Category, CategoryId, CompletionRecord, Tracker, TrackerId};
use crate::predicate::{CompletionLookup, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// Change stream emitted by a store. Every mutating call produces one
/// `Begin`, the affected objects, then one `End`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Begin,
    Tracker { id: TrackerId, change: ChangeKind },
    Category { id: CategoryId, change: ChangeKind },
    End,
}

/// Persistence collaborator for trackers, categories and completions.
pub trait TrackerStore: Send + Sync {
    /// Trackers matching `filter`, in insertion order.
    fn fetch_trackers(&self, filter: &Predicate) -> Result<Vec<Tracker>, StoreError>;
    fn tracker(&self, id: TrackerId) -> Result<Option<Tracker>, StoreError>;
    fn insert_tracker(&self, tracker: Tracker) -> Result<(), StoreError>;
    fn update_tracker(&self, tracker: Tracker) -> Result<(), StoreError>;
    /// Removes the tracker together with all of its completion records.
    fn delete_tracker(&self, id: TrackerId) -> Result<(), StoreError>;

    fn categories(&self) -> Result<Vec<Category>, StoreError>;
    fn upsert_category(&self, category: Category) -> Result<(), StoreError>;

    fn completions(&self, id: TrackerId) -> Result<Vec<CompletionRecord>, StoreError>;
    fn all_completions(&self) -> Result<Vec<CompletionRecord>, StoreError>;
    fn insert_completion(&self, id: TrackerId, day: DateTime<Utc>) -> Result<(), StoreError>;
    fn delete_completion(&self, id: TrackerId, day: DateTime<Utc>) -> Result<(), StoreError>;

    fn subscribe(&self) -> Receiver<StoreEvent>;

    fn trackers(&self) -> Result<Vec<Tracker>, StoreError> {
        self.fetch_trackers(&Predicate::And(Vec::new()))
    }
}

/// Everything a store holds; also the on-disk format of [`FileStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub trackers: Vec<Tracker>,
    #[serde(default)]
    pub completions: BTreeSet<CompletionRecord>,
}

impl CompletionLookup for StoreSnapshot {
    fn completions_on(&self, tracker: TrackerId, day: DateTime<Utc>) -> usize {
        let record = CompletionRecord {
            tracker_id: tracker,
            day,
        };
        usize::from(self.completions.contains(&record))
    }
}

impl StoreSnapshot {
    fn has_category(&self, id: CategoryId) -> bool {
        self.categories.iter().any(|category| category.id == id)
    }

    fn tracker_index(&self, id: TrackerId) -> Option<usize> {
        self.trackers.iter().position(|tracker| tracker.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<StoreSnapshot>,
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            data: RwLock::new(snapshot),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.data.read().clone()
    }

    fn publish(&self, changes: Vec<StoreEvent>) {
        if changes.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sender| {
            std::iter::once(StoreEvent::Begin)
                .chain(changes.iter().cloned())
                .chain(std::iter::once(StoreEvent::End))
                .all(|event| sender.send(event).is_ok())
        });
    }
}

impl TrackerStore for MemoryStore {
    fn fetch_trackers(&self, filter: &Predicate) -> Result<Vec<Tracker>, StoreError> {
        let data = self.data.read();
        Ok(data
            .trackers
            .iter()
            .filter(|tracker| filter.matches(tracker, &*data))
            .cloned()
            .collect())
    }

    fn tracker(&self, id: TrackerId) -> Result<Option<Tracker>, StoreError> {
        let data = self.data.read();
        Ok(data.tracker_index(id).map(|idx| data.trackers[idx].clone()))
    }

    fn insert_tracker(&self, tracker: Tracker) -> Result<(), StoreError> {
        let id = tracker.id;
        {
            let mut data = self.data.write();
            if data.tracker_index(id).is_some() {
                return Err(StoreError::DuplicateTracker(id));
            }
            if !data.has_category(tracker.category) {
                return Err(StoreError::CategoryNotFound(tracker.category));
            }
            data.trackers.push(tracker);
        }
        self.publish(vec![StoreEvent::Tracker {
            id,
            change: ChangeKind::Inserted,
        }]);
        Ok(())
    }

    fn update_tracker(&self, tracker: Tracker) -> Result<(), StoreError> {
        let id = tracker.id;
        {
            let mut data = self.data.write();
            if !data.has_category(tracker.category) {
                return Err(StoreError::CategoryNotFound(tracker.category));
            }
            let idx = data
                .tracker_index(id)
                .ok_or(StoreError::TrackerNotFound(id))?;
            data.trackers[idx] = tracker;
        }
        self.publish(vec![StoreEvent::Tracker {
            id,
            change: ChangeKind::Updated,
        }]);
        Ok(())
    }

    fn delete_tracker(&self, id: TrackerId) -> Result<(), StoreError> {
        {
            let mut data = self.data.write();
            let idx = data
                .tracker_index(id)
                .ok_or(StoreError::TrackerNotFound(id))?;
            data.trackers.remove(idx);
            data.completions.retain(|record| record.tracker_id != id);
        }
        self.publish(vec![StoreEvent::Tracker {
            id,
            change: ChangeKind::Deleted,
        }]);
        Ok(())
    }

    fn categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.data.read().categories.clone())
    }

    fn upsert_category(&self, category: Category) -> Result<(), StoreError> {
        let id = category.id;
        let change = {
            let mut data = self.data.write();
            match data.categories.iter_mut().find(|existing| existing.id == id) {
                Some(existing) => {
                    *existing = category;
                    ChangeKind::Updated
                }
                None => {
                    data.categories.push(category);
                    ChangeKind::Inserted
                }
            }
        };
        self.publish(vec![StoreEvent::Category { id, change }]);
        Ok(())
    }

    fn completions(&self, id: TrackerId) -> Result<Vec<CompletionRecord>, StoreError> {
        Ok(self
            .data
            .read()
            .completions
            .iter()
            .filter(|record| record.tracker_id == id)
            .copied()
            .collect())
    }

    fn all_completions(&self) -> Result<Vec<CompletionRecord>, StoreError> {
        Ok(self.data.read().completions.iter().copied().collect())
    }

    fn insert_completion(&self, id: TrackerId, day: DateTime<Utc>) -> Result<(), StoreError> {
        let inserted = {
            let mut data = self.data.write();
            if data.tracker_index(id).is_none() {
                return Err(StoreError::TrackerNotFound(id));
            }
            data.completions.insert(CompletionRecord { tracker_id: id, day })
        };
        if inserted {
            self.publish(vec![StoreEvent::Tracker {
                id,
                change: ChangeKind::Updated,
            }]);
        }
        Ok(())
    }

    fn delete_completion(&self, id: TrackerId, day: DateTime<Utc>) -> Result<(), StoreError> {
        let removed = {
            let mut data = self.data.write();
            if data.tracker_index(id).is_none() {
                return Err(StoreError::TrackerNotFound(id));
            }
            data.completions.remove(&CompletionRecord { tracker_id: id, day })
        };
        if removed {
            self.publish(vec![StoreEvent::Tracker {
                id,
                change: ChangeKind::Updated,
            }]);
        }
        Ok(())
    }

    fn subscribe(&self) -> Receiver<StoreEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.lock().push(sender);
        receiver
    }
}

/// A [`MemoryStore`] mirrored to a pretty-printed JSON file.
///
/// The file is rewritten after every successful mutation. When the write
/// fails the in-memory state keeps the change and the error is returned.
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw)?
        } else {
            StoreSnapshot::default()
        };
        tracing::debug!(
            path = %path.display(),
            trackers = snapshot.trackers.len(),
            "opened tracker store"
        );
        Ok(Self {
            path,
            inner: MemoryStore::from_snapshot(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }
        let payload = serde_json::to_string_pretty(&self.inner.snapshot())?;
        fs::write(&self.path, payload).map_err(io_error)?;
        Ok(())
    }

    fn write_through(&self, result: Result<(), StoreError>) -> Result<(), StoreError> {
        result?;
        self.persist()
    }
}

impl TrackerStore for FileStore {
    fn fetch_trackers(&self, filter: &Predicate) -> Result<Vec<Tracker>, StoreError> {
        self.inner.fetch_trackers(filter)
    }

    fn tracker(&self, id: TrackerId) -> Result<Option<Tracker>, StoreError> {
        self.inner.tracker(id)
    }

    fn insert_tracker(&self, tracker: Tracker) -> Result<(), StoreError> {
        self.write_through(self.inner.insert_tracker(tracker))
    }

    fn update_tracker(&self, tracker: Tracker) -> Result<(), StoreError> {
        self.write_through(self.inner.update_tracker(tracker))
    }

    fn delete_tracker(&self, id: TrackerId) -> Result<(), StoreError> {
        self.write_through(self.inner.delete_tracker(id))
    }

    fn categories(&self) -> Result<Vec<Category>, StoreError> {
        self.inner.categories()
    }

    fn upsert_category(&self, category: Category) -> Result<(), StoreError> {
        self.write_through(self.inner.upsert_category(category))
    }

    fn completions(&self, id: TrackerId) -> Result<Vec<CompletionRecord>, StoreError> {
        self.inner.completions(id)
    }

    fn all_completions(&self) -> Result<Vec<CompletionRecord>, StoreError> {
        self.inner.all_completions()
    }

    fn insert_completion(&self, id: TrackerId, day: DateTime<Utc>) -> Result<(), StoreError> {
        self.write_through(self.inner.insert_completion(id, day))
    }

    fn delete_completion(&self, id: TrackerId, day: DateTime<Utc>) -> Result<(), StoreError> {
        self.write_through(self.inner.delete_completion(id, day))
    }

    fn subscribe(&self) -> Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{TrackerColor, TrackerKind};

    fn seeded() -> (MemoryStore, Category, Tracker) {
        let store = MemoryStore::new();
        let category = Category::new("Здоровье");
        store.upsert_category(category.clone()).unwrap();
        let tracker = Tracker {
            id: TrackerId::new(),
            name: "Вода".into(),
            kind: TrackerKind::Irregular,
            emoji: "💧".into(),
            color: TrackerColor::new(2).unwrap(),
            schedule: None,
            pinned: false,
            category: category.id,
        };
        store.insert_tracker(tracker.clone()).unwrap();
        (store, category, tracker)
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn rejects_tracker_with_unknown_category() {
        let store = MemoryStore::new();
        let (_, _, tracker) = seeded();
        assert!(matches!(
            store.insert_tracker(tracker),
            Err(StoreError::CategoryNotFound(_))
        ));
    }

    #[test]
    fn rejects_duplicate_and_missing_trackers() {
        let (store, _, tracker) = seeded();
        assert!(matches!(
            store.insert_tracker(tracker.clone()),
            Err(StoreError::DuplicateTracker(id)) if id == tracker.id
        ));
        assert!(matches!(
            store.delete_tracker(TrackerId::new()),
            Err(StoreError::TrackerNotFound(_))
        ));
    }

    #[test]
    fn completions_are_unique_per_day() {
        let (store, _, tracker) = seeded();
        store.insert_completion(tracker.id, day(20)).unwrap();
        store.insert_completion(tracker.id, day(20)).unwrap();
        store.insert_completion(tracker.id, day(21)).unwrap();
        assert_eq!(store.completions(tracker.id).unwrap().len(), 2);
        store.delete_completion(tracker.id, day(20)).unwrap();
        store.delete_completion(tracker.id, day(20)).unwrap();
        assert_eq!(store.completions(tracker.id).unwrap().len(), 1);
    }

    #[test]
    fn delete_cascades_to_completions() {
        let (store, _, tracker) = seeded();
        store.insert_completion(tracker.id, day(20)).unwrap();
        store.delete_tracker(tracker.id).unwrap();
        assert!(store.all_completions().unwrap().is_empty());
        assert!(store.tracker(tracker.id).unwrap().is_none());
    }

    #[test]
    fn mutations_are_wrapped_in_begin_and_end() {
        let (store, _, tracker) = seeded();
        let events = store.subscribe();
        store.insert_completion(tracker.id, day(20)).unwrap();
        // no-op: the record already exists
        store.insert_completion(tracker.id, day(20)).unwrap();
        let received: Vec<StoreEvent> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                StoreEvent::Begin,
                StoreEvent::Tracker {
                    id: tracker.id,
                    change: ChangeKind::Updated
                },
                StoreEvent::End,
            ]
        );
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let (store, _, tracker) = seeded();
        drop(store.subscribe());
        store.delete_tracker(tracker.id).unwrap();
        assert!(store.subscribers.lock().is_empty());
    }
}
