//! A naive in-memory implementation of [`Log`](super::Log).

use std::fmt;

use crate::message::{LogEntry, LogIndex, TermId};

use super::Log;

/// A naive in-memory implementation of [`Log`](super::Log), holding every entry in a `Vec`.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLog {
    entries: Vec<LogEntry>,
}

/// An error returned by [`InMemoryLog`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InMemoryLogError {
    // An appended entry did not directly follow the last entry
    NonContiguous { expected: LogIndex, got: LogIndex },
    // No entry exists at the index
    OutOfRange(LogIndex),
}

impl InMemoryLog {
    /// Constructs an empty Raft log.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_index(&self, log_idx: LogIndex) -> Option<usize> {
        let index = usize::try_from(log_idx.id.checked_sub(1)?).ok()?;
        if index < self.entries.len() {
            Some(index)
        } else {
            None
        }
    }
}

impl Log for InMemoryLog {
    type Error = InMemoryLogError;

    fn append(&mut self, log_entry: LogEntry) -> Result<(), Self::Error> {
        let expected = self.last_index() + 1;
        if log_entry.index != expected {
            return Err(InMemoryLogError::NonContiguous {
                expected,
                got: log_entry.index,
            });
        }
        self.entries.push(log_entry);
        Ok(())
    }

    fn cancel_from(&mut self, from_log_idx: LogIndex) -> Result<usize, Self::Error> {
        let from_index = self
            .entry_index(from_log_idx)
            .ok_or(InMemoryLogError::OutOfRange(from_log_idx))?;
        let cancelled_len = self.entries.len() - from_index;
        self.entries.truncate(from_index);
        Ok(cancelled_len)
    }

    fn get(&self, log_idx: LogIndex) -> Option<LogEntry> {
        let index = self.entry_index(log_idx)?;
        self.entries.get(index).cloned()
    }

    fn get_term(&self, log_idx: LogIndex) -> Option<TermId> {
        let index = self.entry_index(log_idx)?;
        self.entries.get(index).map(|log_entry| log_entry.term)
    }

    fn entries(&self, from_log_idx: LogIndex, to_log_idx: LogIndex) -> Vec<LogEntry> {
        match (self.entry_index(from_log_idx), to_log_idx.id.checked_sub(1)) {
            (Some(from_index), Some(to_index)) => {
                let to_index = usize::try_from(to_index)
                    .unwrap_or(usize::MAX)
                    .min(self.entries.len() - 1);
                if from_index > to_index {
                    Vec::new()
                } else {
                    self.entries[from_index..=to_index].to_vec()
                }
            }
            _ => Vec::new(),
        }
    }

    fn last_index(&self) -> LogIndex {
        let entries_len = u64::try_from(self.entries.len())
            .unwrap_or_else(|_| panic!("more than 2^64 log entries"));
        LogIndex { id: entries_len }
    }

    fn last_term(&self) -> TermId {
        self.entries
            .last()
            .map(|log_entry| log_entry.term)
            .unwrap_or_default()
    }
}

impl fmt::Display for InMemoryLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonContiguous { expected, got } => {
                write!(f, "appended entry at {}, expected {}", got, expected)
            }
            Self::OutOfRange(index) => write!(f, "no log entry at {}", index),
        }
    }
}
