//! Collection view - the ordered, duplicate-free set of records a
//! reconciler maintains.
//!
//! Every mutation re-sorts the whole view, which is O(n log n) per change.
//! Dashboard collections are small; a resource with tens of thousands of
//! rows would want an ordered index instead.

use crate::{ChangeEvent, Record, RecordKey, SortSpec};

/// A record plus the sequence number it was first seen with.
#[derive(Debug, Clone, PartialEq)]
struct Entry {
    record: Record,
    seq: u64,
}

/// What a single mutation did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A new key was added
    Inserted,
    /// An existing key got a different payload
    Replaced,
    /// A key was removed
    Removed,
    /// Nothing changed (identical upsert, or delete of an absent key)
    Unchanged,
}

impl Change {
    /// Whether the view's contents changed.
    pub fn is_change(&self) -> bool {
        !matches!(self, Change::Unchanged)
    }
}

/// Ordered sequence of records, unique by key.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionView {
    order: SortSpec,
    entries: Vec<Entry>,
    next_seq: u64,
}

impl CollectionView {
    /// Create an empty view with the given order.
    pub fn new(order: SortSpec) -> Self {
        Self {
            order,
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Replace the contents with a snapshot.
    ///
    /// Snapshot position seeds the tie-break order. A key repeated within a
    /// snapshot keeps its first position and its last payload.
    pub fn load(&mut self, records: impl IntoIterator<Item = Record>) {
        self.entries.clear();
        self.next_seq = 0;
        for record in records {
            self.upsert_unsorted(record);
        }
        self.resort();
    }

    /// Apply a change event.
    ///
    /// Inserts and updates are both upserts, so a duplicated insert or an
    /// update for a key the view has not seen yet never loses data.
    pub fn apply(&mut self, event: ChangeEvent) -> Change {
        match event {
            ChangeEvent::Insert { record } | ChangeEvent::Update { record } => self.upsert(record),
            ChangeEvent::Delete { key } => self.remove(&key),
        }
    }

    /// Insert or replace a record, then re-sort.
    pub fn upsert(&mut self, record: Record) -> Change {
        let change = self.upsert_unsorted(record);
        if change.is_change() {
            self.resort();
        }
        change
    }

    /// Remove a record by key. Absent keys are a no-op.
    pub fn remove(&mut self, key: &str) -> Change {
        match self.position(key) {
            Some(idx) => {
                // `Vec::remove` keeps the remaining entries in order
                self.entries.remove(idx);
                Change::Removed
            }
            None => Change::Unchanged,
        }
    }

    fn upsert_unsorted(&mut self, record: Record) -> Change {
        match self.position(&record.id) {
            Some(idx) => {
                let entry = &mut self.entries[idx];
                if entry.record == record {
                    Change::Unchanged
                } else {
                    entry.record = record;
                    Change::Replaced
                }
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.push(Entry { record, seq });
                Change::Inserted
            }
        }
    }

    fn resort(&mut self) {
        let order = &self.order;
        self.entries.sort_by(|a, b| {
            order
                .compare(&a.record, &b.record)
                .then_with(|| a.seq.cmp(&b.seq))
        });
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.record.id == key)
    }

    /// Get a record by key.
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.entries
            .iter()
            .find(|e| e.record.id == key)
            .map(|e| &e.record)
    }

    /// Check if a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Iterate records in view order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().map(|e| &e.record)
    }

    /// Keys in view order.
    pub fn keys(&self) -> Vec<RecordKey> {
        self.iter().map(|r| r.id.clone()).collect()
    }

    /// Clone the records in view order.
    pub fn items(&self) -> Vec<Record> {
        self.iter().cloned().collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the view is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all records and reset the tie-break sequence.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }

    /// Get the order this view is kept in.
    pub fn order(&self) -> &SortSpec {
        &self.order
    }
}
