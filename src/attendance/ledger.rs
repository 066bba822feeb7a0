//! Date → prompt-message ledger shared by the scheduler and query handlers.
//!
//! Volatile: lives for the process lifetime and is never persisted.

use crate::attendance::types::{DateRange, MessageId};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Cloneable handle to the process-wide attendance ledger.
///
/// At most one entry per calendar day. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct AttendanceLedger {
    entries: Arc<RwLock<HashMap<NaiveDate, MessageId>>>,
}

impl AttendanceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the prompt message for `date`.
    ///
    /// Returns the previous entry when one was overwritten.
    pub fn record_prompt(&self, date: NaiveDate, message: MessageId) -> Option<MessageId> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(date, message)
    }

    #[must_use]
    pub fn lookup(&self, date: NaiveDate) -> Option<MessageId> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&date)
            .copied()
    }

    /// Snapshot of every entry, in no particular order.
    #[must_use]
    pub fn all_entries(&self) -> Vec<(NaiveDate, MessageId)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(date, message)| (*date, *message))
            .collect()
    }

    /// Entries whose date falls inside `range`, oldest first.
    #[must_use]
    pub fn entries_in(&self, range: DateRange) -> Vec<(NaiveDate, MessageId)> {
        let mut entries: Vec<_> = self
            .all_entries()
            .into_iter()
            .filter(|(date, _)| range.contains(*date))
            .collect();
        entries.sort_by_key(|(date, _)| *date);
        entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
