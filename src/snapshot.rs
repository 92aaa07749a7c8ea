//! Immutable snapshot of the final dataset for presentation-side reads.
//!
//! The presentation layer used to hold one global mutable table loaded at
//! process start. Here the dataset is an explicitly-owned, immutable
//! snapshot: handlers receive a clone (cheap, the rows sit behind an `Arc`),
//! and reloading is a distinct, explicit [`DatasetSnapshot::load`] call that
//! produces a new snapshot. Nothing reloads implicitly.
//!
//! Rows are indexed positionally for pagination.

use crate::models::FinalRecord;
use crate::store::{self, StoreError};
use std::sync::Arc;
use tracing::{info, instrument};

/// An immutable, shareable view of the final merged dataset.
#[derive(Debug, Clone)]
pub struct DatasetSnapshot {
    records: Arc<[FinalRecord]>,
}

impl DatasetSnapshot {
    /// Load a snapshot from the final dataset file.
    ///
    /// Call again for a fresh snapshot; existing snapshots are unaffected.
    #[instrument(level = "info", fields(%path))]
    pub fn load(path: &str) -> Result<Self, StoreError> {
        let records = store::read_final(path)?;
        info!(count = records.len(), "Loaded dataset snapshot");
        Ok(Self { records: records.into() })
    }

    /// Build a snapshot from in-memory records (tests, pre-merged data).
    pub fn from_records(records: Vec<FinalRecord>) -> Self {
        Self { records: records.into() }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One record by position.
    pub fn get(&self, index: usize) -> Option<&FinalRecord> {
        self.records.get(index)
    }

    /// One positional page of records. Out-of-range pages are empty, the
    /// last page may be short.
    pub fn page(&self, page: usize, per_page: usize) -> &[FinalRecord] {
        if per_page == 0 {
            return &[];
        }
        let start = page.saturating_mul(per_page);
        if start >= self.records.len() {
            return &[];
        }
        let end = (start + per_page).min(self.records.len());
        &self.records[start..end]
    }

    /// Number of pages at the given page size.
    pub fn page_count(&self, per_page: usize) -> usize {
        if per_page == 0 {
            0
        } else {
            self.records.len().div_ceil(per_page)
        }
    }
}
