use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

/// The two parallel result lists of the tracker screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Pinned,
    Unpinned,
}

impl Partition {
    /// Maps a section index local to the partition onto the combined layout.
    pub fn global_section(self, local: usize) -> usize {
        match self {
            Partition::Pinned => 0,
            Partition::Unpinned => local + 1,
        }
    }
}

/// Row change expressed in the coordinates of a single partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Insert { at: IndexPath },
    Delete { at: IndexPath },
    Update { at: IndexPath },
    Move { from: IndexPath, to: IndexPath },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionChange {
    Insert(usize),
    Delete(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Row {
        partition: Partition,
        change: RowChange,
    },
    Section {
        partition: Partition,
        change: SectionChange,
    },
}

/// One batched notification for the presentation layer.
///
/// Deleted positions refer to the layout before the batch, inserted
/// positions to the layout after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionChanges {
    pub inserted_sections: BTreeSet<usize>,
    pub deleted_sections: BTreeSet<usize>,
    pub inserted_rows: Vec<IndexPath>,
    pub deleted_rows: Vec<IndexPath>,
}

impl SectionChanges {
    pub fn is_empty(&self) -> bool {
        self.inserted_sections.is_empty()
            && self.deleted_sections.is_empty()
            && self.inserted_rows.is_empty()
            && self.deleted_rows.is_empty()
    }
}

/// Receives the batched changes; implemented by the presentation adapter.
pub trait ChangeSink: Send + Sync {
    fn apply(&self, changes: &SectionChanges);
    /// The whole layout changed, e.g. after a filter change.
    fn reload(&self);
}

/// Buffers partition-local changes between `begin` and `end`.
///
/// Nested `begin` calls join the outer batch; only the outermost `end`
/// flushes.
#[derive(Debug, Default)]
pub struct ChangeBatcher {
    depth: usize,
    pending: SectionChanges,
}

impl ChangeBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        if self.depth == 0 {
            self.pending = SectionChanges::default();
        }
        self.depth += 1;
    }

    /// Drops the open batch, however deeply nested.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.pending = SectionChanges::default();
    }

    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    pub fn record(&mut self, event: ChangeEvent) {
        if !self.is_open() {
            tracing::warn!(?event, "change recorded outside of a batch");
        }
        match event {
            ChangeEvent::Row { partition, change } => self.record_row(partition, change),
            ChangeEvent::Section { partition, change } => {
                if partition == Partition::Pinned {
                    // the pinned partition always occupies section 0
                    return;
                }
                match change {
                    SectionChange::Insert(local) => {
                        self.pending
                            .inserted_sections
                            .insert(partition.global_section(local));
                    }
                    SectionChange::Delete(local) => {
                        self.pending
                            .deleted_sections
                            .insert(partition.global_section(local));
                    }
                }
            }
        }
    }

    /// Closes the current batch. Returns the changes once the outermost
    /// batch ends.
    pub fn end(&mut self) -> Option<SectionChanges> {
        match self.depth {
            0 => {
                tracing::warn!("end of batch without a matching begin");
                Some(std::mem::take(&mut self.pending))
            }
            1 => {
                self.depth = 0;
                Some(std::mem::take(&mut self.pending))
            }
            _ => {
                self.depth -= 1;
                None
            }
        }
    }

    fn record_row(&mut self, partition: Partition, change: RowChange) {
        let map = |path: IndexPath| IndexPath::new(partition.global_section(path.section), path.row);
        match change {
            RowChange::Insert { at } => self.pending.inserted_rows.push(map(at)),
            RowChange::Delete { at } => self.pending.deleted_rows.push(map(at)),
            RowChange::Update { at } => {
                self.pending.deleted_rows.push(map(at));
                self.pending.inserted_rows.push(map(at));
            }
            RowChange::Move { from, to } => {
                self.pending.deleted_rows.push(map(from));
                self.pending.inserted_rows.push(map(to));
            }
        }
    }
}
