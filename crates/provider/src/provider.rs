//! Data provider adapters.
//!
//! A provider pulls rows from its record source and feeds one view
//! origin. Each adapter owns its own incremental checkpoint (a sequence
//! number or an explicit id set); the view never tracks per-origin
//! cursors.

use crate::source::RecordSource;
use canopy_core::{Result, RowSummary};
use canopy_view::{ApplyOutcome, ChangeBatch, RowChange, VirtualView};
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeSet;

/// A pluggable source adapter feeding one origin of a view.
pub trait DataProvider {
    /// Returns the stable origin id partitioning this provider's rows.
    fn origin(&self) -> &str;

    /// Registers the provider with a view. Claiming an origin another
    /// provider holds is a fatal configuration error.
    fn init(&mut self, view: &VirtualView) -> Result<()> {
        view.register_origin(self.origin())
    }

    /// Pulls changes since the adapter's own checkpoint and applies
    /// them to the view as one batch.
    fn update(&mut self, view: &VirtualView) -> Result<ApplyOutcome>;
}

/// A provider driven by a `RecordSource` with a sequence checkpoint
/// (the usual database-query adapter).
pub struct RecordSourceProvider<S> {
    origin: String,
    source: S,
    checkpoint: Option<u64>,
}

impl<S: RecordSource> RecordSourceProvider<S> {
    /// Creates a provider over a source.
    pub fn new(origin: impl Into<String>, source: S) -> Self {
        Self {
            origin: origin.into(),
            source,
            checkpoint: None,
        }
    }

    /// Returns the adapter's current checkpoint.
    pub fn checkpoint(&self) -> Option<u64> {
        self.checkpoint
    }

    /// Returns a reference to the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns a mutable reference to the underlying source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: RecordSource> DataProvider for RecordSourceProvider<S> {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn update(&mut self, view: &VirtualView) -> Result<ApplyOutcome> {
        let changes = self.source.changes_since(self.checkpoint);
        // Candidates are re-verified against the current still-live
        // set: a row can disappear between enumeration and fetch.
        let live = self.source.validate(&changes.candidates);
        let live_set: HashSet<u64> = live.iter().copied().collect();
        let records = self.source.fetch(&live);
        let fetched: HashSet<u64> = records.iter().map(|r| r.row_id).collect();

        let mut batch = ChangeBatch::new(self.origin.clone());
        for record in records {
            batch.add(RowChange::new(
                record.row_id,
                record.external_key,
                record.summary,
            ));
        }
        for &id in &changes.candidates {
            if !live_set.contains(&id) {
                // Enumerated but no longer valid
                batch.remove(id);
            } else if !fetched.contains(&id) {
                // Validated but gone by fetch time
                batch.add(RowChange::vanished(id, String::new()));
            }
        }
        for &id in &changes.removals {
            batch.remove(id);
        }

        log::debug!(
            "provider {} applying {} changes (checkpoint {:?} -> {})",
            self.origin,
            batch.len(),
            self.checkpoint,
            changes.checkpoint
        );
        let outcome = view.apply_changes(&batch);
        self.checkpoint = Some(changes.checkpoint);
        Ok(outcome)
    }
}

/// A provider feeding a fixed, explicit row id set.
///
/// Every update re-verifies and re-fetches the configured ids; ids that
/// left the set (or the source) since the last update are removed from
/// the view. Re-applying unchanged rows is harmless because change
/// application is idempotent per row id.
pub struct KeysetProvider<S> {
    origin: String,
    source: S,
    keys: BTreeSet<u64>,
    emitted: BTreeSet<u64>,
}

impl<S: RecordSource> KeysetProvider<S> {
    /// Creates a provider for a fixed id set.
    pub fn new(origin: impl Into<String>, source: S, keys: impl IntoIterator<Item = u64>) -> Self {
        Self {
            origin: origin.into(),
            source,
            keys: keys.into_iter().collect(),
            emitted: BTreeSet::new(),
        }
    }

    /// Replaces the configured id set.
    pub fn set_keys(&mut self, keys: impl IntoIterator<Item = u64>) {
        self.keys = keys.into_iter().collect();
    }

    /// Returns a mutable reference to the underlying source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: RecordSource> DataProvider for KeysetProvider<S> {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn update(&mut self, view: &VirtualView) -> Result<ApplyOutcome> {
        let ids: Vec<u64> = self.keys.iter().copied().collect();
        let live = self.source.validate(&ids);
        let records = self.source.fetch(&live);
        let current: BTreeSet<u64> = records.iter().map(|r| r.row_id).collect();

        let mut batch = ChangeBatch::new(self.origin.clone());
        for record in records {
            batch.add(RowChange::new(
                record.row_id,
                record.external_key,
                record.summary,
            ));
        }
        for &gone in self.emitted.difference(&current) {
            batch.remove(gone);
        }

        let outcome = view.apply_changes(&batch);
        self.emitted = current;
        Ok(outcome)
    }
}

/// A provider for derived profile records.
///
/// Profiles are keyed by name and synthesized into rows with stable,
/// provider-assigned row ids; only profiles touched since the last
/// update are re-emitted.
pub struct ProfileProvider {
    origin: String,
    profiles: HashMap<String, RowSummary>,
    row_ids: HashMap<String, u64>,
    next_row_id: u64,
    dirty: BTreeSet<String>,
    removed: Vec<u64>,
}

impl ProfileProvider {
    /// Creates an empty profile provider.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            profiles: HashMap::new(),
            row_ids: HashMap::new(),
            next_row_id: 1,
            dirty: BTreeSet::new(),
            removed: Vec::new(),
        }
    }

    /// Sets a profile; it is (re-)emitted on the next update.
    pub fn set_profile(&mut self, key: impl Into<String>, summary: RowSummary) {
        let key = key.into();
        if !self.row_ids.contains_key(&key) {
            self.row_ids.insert(key.clone(), self.next_row_id);
            self.next_row_id += 1;
        }
        self.profiles.insert(key.clone(), summary);
        self.dirty.insert(key);
    }

    /// Removes a profile; its row is removed on the next update.
    pub fn remove_profile(&mut self, key: &str) {
        if self.profiles.remove(key).is_some() {
            self.dirty.remove(key);
            if let Some(row_id) = self.row_ids.remove(key) {
                self.removed.push(row_id);
            }
        }
    }

    /// Returns the row id assigned to a profile key.
    pub fn row_id(&self, key: &str) -> Option<u64> {
        self.row_ids.get(key).copied()
    }
}

impl DataProvider for ProfileProvider {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn update(&mut self, view: &VirtualView) -> Result<ApplyOutcome> {
        let mut batch = ChangeBatch::new(self.origin.clone());
        for key in &self.dirty {
            let (Some(summary), Some(&row_id)) =
                (self.profiles.get(key), self.row_ids.get(key))
            else {
                continue;
            };
            batch.add(RowChange::new(row_id, key.clone(), summary.clone()));
        }
        for &row_id in &self.removed {
            batch.remove(row_id);
        }

        let outcome = view.apply_changes(&batch);
        self.dirty.clear();
        self.removed.clear();
        Ok(outcome)
    }
}

/// Convenience: registers providers with a view, then runs one update
/// round over all of them, merging the outcomes.
pub fn update_all(
    view: &VirtualView,
    providers: &mut [&mut dyn DataProvider],
) -> Result<ApplyOutcome> {
    let mut merged = ApplyOutcome::default();
    for provider in providers {
        merged.merge(provider.update(view)?);
    }
    Ok(merged)
}
