//! Scan ledger: the ordered, countable list of scanned codes
//!
//! **Ordering:** newest first. A new entry is inserted at index 0, and index 0
//! is the "latest" slot used both for repeat merging and for UI emphasis.
//!
//! **Merging:** only the latest slot is compared. Scanning `A, A` yields
//! `[A x 2]`; scanning `A, B, A` yields three entries `[A, B, A]`.

use serde::Serialize;
use tally_common::{Error, Result, ScanEntry};

/// Separator used by [`ScanLedger::serialize`]
const EXPORT_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanLedger {
    entries: Vec<ScanEntry>,
}

impl ScanLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one scan of `value`
    ///
    /// Increments the latest entry if it holds the same value, otherwise
    /// inserts a new entry at the front. Returns true when a new entry was
    /// created.
    pub fn record(&mut self, value: &str) -> bool {
        if let Some(latest) = self.entries.first_mut() {
            if latest.value == value {
                latest.count += 1;
                return false;
            }
        }

        self.entries.insert(0, ScanEntry::new(value));
        true
    }

    /// Decrease the count at `index` by one
    ///
    /// A count of 1 is left unchanged; removal is always explicit.
    pub fn decrement(&mut self, index: usize) -> Result<()> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(Error::Index { index, len })?;

        if entry.count > 1 {
            entry.count -= 1;
        }
        Ok(())
    }

    /// Delete the entry at `index` unconditionally
    pub fn remove(&mut self, index: usize) -> Result<ScanEntry> {
        if index >= self.entries.len() {
            return Err(Error::Index {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Sum of all counts (running tally shown to the operator)
    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.count)).sum()
    }

    /// Export text: `value` or `value x count`, comma-space joined, in ledger order
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(ScanEntry::render)
            .collect::<Vec<_>>()
            .join(EXPORT_SEPARATOR)
    }

    /// Index of the latest entry, if any
    pub fn latest_index(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
