//! Fixed-capacity FIFO history for session records.
//!
//! Each session keeps three instances: user inputs (cap 100), agent
//! outputs (cap 100), and error records (cap 50). Appends evict the
//! oldest record once the capacity is reached, so the buffer never
//! grows beyond its configured size.

use std::collections::VecDeque;

/// An insertion-ordered ring buffer with a fixed capacity.
///
/// Append-only: when full, the oldest record is evicted before the new
/// one is pushed. The relative order of surviving records always matches
/// insertion order, and `len()` never exceeds the capacity.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    records: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// Create a history that retains at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest one if the history is full.
    pub fn push(&mut self, record: T) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The most recent `n` records in insertion order (all if fewer than `n`).
    pub fn recent(&self, n: usize) -> Vec<&T> {
        let start = self.records.len().saturating_sub(n);
        self.records.range(start..).collect()
    }

    /// The most recently appended record, if any.
    pub fn last(&self) -> Option<&T> {
        self.records.back()
    }

    /// Iterate over all retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    /// Number of records currently retained.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the history holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The configured maximum number of records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Clone the retained records into a `Vec`, oldest first.
    ///
    /// Used by the background drift loop, which must not hold the session
    /// lock across a backend call.
    pub fn snapshot(&self) -> Vec<T> {
        self.records.iter().cloned().collect()
    }
}
