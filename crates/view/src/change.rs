//! Change batches and their application outcome.
//!
//! A `ChangeBatch` carries one provider's additions and removals, tagged
//! with the provider's origin id. Batches are applied atomically: a
//! navigator never observes a partially-applied batch.

use canopy_core::RowSummary;

/// Reserved item name carrying a row's reader list.
///
/// Providers that restrict a row place a string list under this item;
/// its absence means the row is world-readable.
pub const READERS_ITEM: &str = "$Readers";

/// One row-level addition or update reported by a provider.
#[derive(Clone, Debug)]
pub struct RowChange {
    /// Row id, unique within the batch's origin.
    pub row_id: u64,
    /// Provider-stable external identifier (e.g. a UNID), used for
    /// diffing.
    pub external_key: String,
    /// The row's field map. None means the row vanished between
    /// enumeration and fetch, and is treated as a removal.
    pub summary: Option<RowSummary>,
}

impl RowChange {
    /// Creates an addition carrying a field map.
    pub fn new(row_id: u64, external_key: impl Into<String>, summary: RowSummary) -> Self {
        Self {
            row_id,
            external_key: external_key.into(),
            summary: Some(summary),
        }
    }

    /// Creates an addition without a field map (treated as a removal).
    pub fn vanished(row_id: u64, external_key: impl Into<String>) -> Self {
        Self {
            row_id,
            external_key: external_key.into(),
            summary: None,
        }
    }
}

/// A batch of changes from one origin.
#[derive(Clone, Debug)]
pub struct ChangeBatch {
    origin: String,
    additions: Vec<RowChange>,
    removals: Vec<u64>,
}

impl ChangeBatch {
    /// Creates an empty batch for the given origin.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            additions: Vec::new(),
            removals: Vec::new(),
        }
    }

    /// Returns the origin id this batch belongs to.
    #[inline]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Adds an addition/update.
    pub fn add(&mut self, change: RowChange) {
        self.additions.push(change);
    }

    /// Adds a removal by row id.
    pub fn remove(&mut self, row_id: u64) {
        self.removals.push(row_id);
    }

    /// Adds an addition, builder style.
    pub fn with_addition(mut self, change: RowChange) -> Self {
        self.add(change);
        self
    }

    /// Adds a removal, builder style.
    pub fn with_removal(mut self, row_id: u64) -> Self {
        self.remove(row_id);
        self
    }

    /// Returns the additions.
    #[inline]
    pub fn additions(&self) -> &[RowChange] {
        &self.additions
    }

    /// Returns the removals.
    #[inline]
    pub fn removals(&self) -> &[u64] {
        &self.removals
    }

    /// Returns true if the batch carries no changes.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Returns the total number of changes.
    pub fn len(&self) -> usize {
        self.additions.len() + self.removals.len()
    }
}

/// A skipped row and the reason it was skipped.
#[derive(Clone, Debug)]
pub struct RowSkip {
    pub row_id: u64,
    pub reason: String,
}

/// The result of applying one change batch.
///
/// Row-level problems never abort a batch; they are reported here (and
/// logged) instead.
#[derive(Clone, Debug, Default)]
pub struct ApplyOutcome {
    /// Rows inserted or updated.
    pub applied: usize,
    /// Rows removed.
    pub removed: usize,
    /// Removals that targeted no known row (a normal outcome with
    /// providers that re-report deletions).
    pub stale_removals: usize,
    /// Rows skipped because of row-level data errors.
    pub skipped: Vec<RowSkip>,
}

impl ApplyOutcome {
    /// Returns true if every row was applied without a skip.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Merges another outcome into this one.
    pub fn merge(&mut self, other: ApplyOutcome) {
        self.applied += other.applied;
        self.removed += other.removed;
        self.stale_removals += other.stale_removals;
        self.skipped.extend(other.skipped);
    }
}
