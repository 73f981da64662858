//! Types related to Raft log storage.
//!
//! Raft requires a backing storage for entries of its distributed log as they are being replicated to and from other
//! nodes. The [`Log`] trait is implemented for that purpose, and the implementation is supplied to
//! [`State`](crate::core::State).

use std::fmt;

use ::log::debug;

use crate::message::{LogEntry, LogIndex, TermId};

pub use self::memory::{InMemoryLog, InMemoryLogError};

pub mod memory;

/// An interface for storage of the Raft log of a [`State`](crate::core::State).
///
/// # Initial state
///
/// A Raft log is initialized as empty, with [`last_index`] returning
/// [`LogIndex::default()`](crate::message::LogIndex::default). The index of the first appended log entry is `1` and all
/// indices are contiguous.
///
/// # Log truncation
///
/// Entries are only ever removed from the end of the log, via [`cancel_from`], when a leader replaces entries that
/// were never committed.
///
/// [`cancel_from`]: Self::cancel_from
/// [`last_index`]: Self::last_index
pub trait Log {
    /// The type of error returned by fallable operations.
    type Error: fmt::Display;

    /// Appends an entry to the end of the log. The entry's index must be exactly one past [`last_index`].
    ///
    /// # Errors
    ///
    /// If there was any error modifying the log, or if the entry's index is not contiguous, an error is returned.
    ///
    /// [`last_index`]: Self::last_index
    fn append(&mut self, entry: LogEntry) -> Result<(), Self::Error>;

    /// Cancels all entries including and after the entry at index `from_index`, removing them from the log. Returns the
    /// number of entries removed.
    ///
    /// # Errors
    ///
    /// If there was any error modifying the log, or if the entries did not exist, an error is returned.
    fn cancel_from(&mut self, from_index: LogIndex) -> Result<usize, Self::Error>;

    /// Returns the entry at a given index, or `None` if the index is `0` or greater than the length of the log.
    fn get(&self, index: LogIndex) -> Option<LogEntry>;

    /// Returns the term of the entry at a given index, or `None` if the index is `0` or greater than the length of the
    /// log.
    fn get_term(&self, index: LogIndex) -> Option<TermId> {
        self.get(index).map(|entry| entry.term)
    }

    /// Returns the entries with indices from `from_index` through `to_index` inclusive, stopping early at the end of
    /// the log.
    fn entries(&self, from_index: LogIndex, to_index: LogIndex) -> Vec<LogEntry> {
        (from_index.id..=to_index.id)
            .map_while(|id| self.get(LogIndex { id }))
            .collect()
    }

    /// Returns the index of the last entry in the log, or [`LogIndex::default()`](crate::message::LogIndex::default) if
    /// empty.
    fn last_index(&self) -> LogIndex;

    /// Returns the term of the last entry in the log, or [`TermId::default()`](crate::message::TermId::default) if
    /// empty.
    fn last_term(&self) -> TermId;
}

/// A [`Log`] together with the commit and apply positions of a Raft node.
pub(crate) struct LogState<L> {
    log: L,
    pub commit_idx: LogIndex,
    pub applied_idx: LogIndex,
}

//
// LogState impls
//

impl<L: Log> LogState<L> {
    pub fn new(log: L) -> Self {
        Self {
            log,
            commit_idx: LogIndex::default(),
            applied_idx: LogIndex::default(),
        }
    }

    pub fn append(&mut self, entry: LogEntry) -> Result<(), L::Error> {
        self.log.append(entry)
    }

    pub fn cancel_from(&mut self, from_index: LogIndex) -> Result<usize, L::Error> {
        self.log.cancel_from(from_index)
    }

    /// Returns the term at `index`, where the position before the first entry has the default term.
    pub fn get_term(&self, index: LogIndex) -> Option<TermId> {
        if index == LogIndex::default() {
            Some(TermId::default())
        } else {
            self.log.get_term(index)
        }
    }

    pub fn entries_from(&self, from_index: LogIndex) -> Vec<LogEntry> {
        let last_index = self.last_index();
        if from_index > last_index {
            Vec::new()
        } else {
            self.log.entries(from_index.max(LogIndex { id: 1 }), last_index)
        }
    }

    pub fn last_index(&self) -> LogIndex {
        self.log.last_index()
    }

    pub fn last_term(&self) -> TermId {
        self.log.last_term()
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Returns the committed entries not yet applied, without marking them applied.
    pub fn next_entries(&self) -> Vec<LogEntry> {
        if self.applied_idx >= self.commit_idx {
            Vec::new()
        } else {
            self.log.entries(self.applied_idx + 1, self.commit_idx)
        }
    }

    pub fn commit_to(&mut self, index: LogIndex) {
        if index > self.commit_idx {
            debug!("committed entries from {} to {}", &self.commit_idx, &index);
            self.commit_idx = index;
        }
    }

    pub fn applied_to(&mut self, index: LogIndex) {
        if index > self.commit_idx || index < self.applied_idx {
            panic!(
                "applied {} is out of range [{}, {}]",
                &index, &self.applied_idx, &self.commit_idx
            );
        }
        self.applied_idx = index;
    }
}
