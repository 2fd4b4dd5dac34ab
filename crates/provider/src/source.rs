//! The record source contract.
//!
//! A record source is the external collaborator that actually owns row
//! data (a database query, a folder, a search). Providers drive it
//! through a narrow pull interface: enumerate changed candidates since
//! a checkpoint, re-verify them against a current still-live set, then
//! fetch details. The re-verification step guards against rows
//! disappearing between enumeration and fetch.

use canopy_core::RowSummary;
use hashbrown::HashMap;

/// One row fetched from a source.
#[derive(Clone, Debug)]
pub struct SourceRecord {
    /// Row id, unique within the source.
    pub row_id: u64,
    /// Provider-stable external identifier.
    pub external_key: String,
    /// The row's field map, with formula columns pre-evaluated.
    pub summary: RowSummary,
}

/// The result of enumerating changes since a checkpoint.
#[derive(Clone, Debug, Default)]
pub struct SourceChanges {
    /// Row ids added or modified since the checkpoint.
    pub candidates: Vec<u64>,
    /// Row ids deleted since the checkpoint.
    pub removals: Vec<u64>,
    /// The checkpoint to resume from next time.
    pub checkpoint: u64,
}

/// A pull-based source of rows.
pub trait RecordSource {
    /// Enumerates rows changed since `checkpoint` (None = everything).
    fn changes_since(&mut self, checkpoint: Option<u64>) -> SourceChanges;

    /// Returns the subset of `ids` that still exist right now.
    fn validate(&self, ids: &[u64]) -> Vec<u64>;

    /// Fetches full records for `ids`; ids that vanished are simply
    /// absent from the result.
    fn fetch(&self, ids: &[u64]) -> Vec<SourceRecord>;
}

#[derive(Clone, Debug)]
struct StoredRow {
    external_key: String,
    summary: RowSummary,
    seq: u64,
}

/// An in-memory record source with a monotonic sequence checkpoint.
///
/// Used by adapter tests and as the reference implementation of the
/// contract: every mutation bumps the sequence, and `changes_since`
/// reports rows whose sequence is newer than the checkpoint.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    rows: HashMap<u64, StoredRow>,
    /// (sequence, row id) pairs for deletions.
    deletions: Vec<(u64, u64)>,
    seq: u64,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a row.
    pub fn upsert(&mut self, row_id: u64, external_key: impl Into<String>, summary: RowSummary) {
        self.seq += 1;
        self.rows.insert(
            row_id,
            StoredRow {
                external_key: external_key.into(),
                summary,
                seq: self.seq,
            },
        );
    }

    /// Deletes a row.
    pub fn delete(&mut self, row_id: u64) {
        if self.rows.remove(&row_id).is_some() {
            self.seq += 1;
            self.deletions.push((self.seq, row_id));
        }
    }

    /// Returns the number of live rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the source holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

impl RecordSource for MemorySource {
    fn changes_since(&mut self, checkpoint: Option<u64>) -> SourceChanges {
        let since = checkpoint.unwrap_or(0);
        let mut candidates: Vec<u64> = self
            .rows
            .iter()
            .filter(|(_, row)| row.seq > since)
            .map(|(&id, _)| id)
            .collect();
        candidates.sort_unstable();
        let removals: Vec<u64> = self
            .deletions
            .iter()
            .filter(|(seq, _)| *seq > since)
            .map(|&(_, id)| id)
            .collect();
        SourceChanges {
            candidates,
            removals,
            checkpoint: self.seq,
        }
    }

    fn validate(&self, ids: &[u64]) -> Vec<u64> {
        ids.iter()
            .copied()
            .filter(|id| self.rows.contains_key(id))
            .collect()
    }

    fn fetch(&self, ids: &[u64]) -> Vec<SourceRecord> {
        ids.iter()
            .filter_map(|id| {
                self.rows.get(id).map(|row| SourceRecord {
                    row_id: *id,
                    external_key: row.external_key.clone(),
                    summary: row.summary.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(last: &str) -> RowSummary {
        RowSummary::new().with("Lastname", last)
    }

    #[test]
    fn test_changes_since_start() {
        let mut source = MemorySource::new();
        source.upsert(1, "u1", row("Abbott"));
        source.upsert(2, "u2", row("Zeller"));

        let changes = source.changes_since(None);
        assert_eq!(changes.candidates, vec![1, 2]);
        assert!(changes.removals.is_empty());
        assert_eq!(changes.checkpoint, 2);
    }

    #[test]
    fn test_incremental_changes() {
        let mut source = MemorySource::new();
        source.upsert(1, "u1", row("Abbott"));
        let checkpoint = source.changes_since(None).checkpoint;

        source.upsert(2, "u2", row("Zeller"));
        source.delete(1);

        let changes = source.changes_since(Some(checkpoint));
        assert_eq!(changes.candidates, vec![2]);
        assert_eq!(changes.removals, vec![1]);
    }

    #[test]
    fn test_validate_drops_vanished_rows() {
        let mut source = MemorySource::new();
        source.upsert(1, "u1", row("Abbott"));
        source.upsert(2, "u2", row("Zeller"));
        source.delete(2);

        assert_eq!(source.validate(&[1, 2, 3]), vec![1]);
    }

    #[test]
    fn test_fetch_skips_missing() {
        let mut source = MemorySource::new();
        source.upsert(1, "u1", row("Abbott"));

        let records = source.fetch(&[1, 9]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_key, "u1");
    }

    #[test]
    fn test_delete_unknown_row_is_noop() {
        let mut source = MemorySource::new();
        source.delete(42);
        assert_eq!(source.sequence(), 0);
        assert!(source.changes_since(None).removals.is_empty());
    }
}
