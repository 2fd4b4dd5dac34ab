//! Immutable entry snapshots.
//!
//! Navigators never hand out live tree nodes; every traversal step
//! produces a value copy of the fields a renderer needs, taken while the
//! shared lock is held. Snapshots stay valid after the tree moves on.

use crate::position::Position;
use canopy_core::{Value, ViewColumn};
use std::sync::Arc;

/// Aggregated facts for one column of a category snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnAggregate {
    /// The column's item name.
    pub item: String,
    /// Running sum over descendant documents.
    pub sum: f64,
    /// Number of contributing documents.
    pub count: u64,
}

impl ColumnAggregate {
    /// Returns the average, or None with no contributions.
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Reader accumulation for one origin, copied out of a category.
#[derive(Clone, Debug, PartialEq)]
pub struct OriginReadersSnapshot {
    /// Origin name.
    pub origin: String,
    /// World-readable documents from this origin in the subtree.
    pub world_count: usize,
    /// Principals named by restricted documents from this origin.
    pub principals: Vec<String>,
}

/// Category payload of a snapshot.
#[derive(Clone, Debug)]
pub struct CategorySnapshot {
    /// The grouping key.
    pub value: Value,
    /// Category depth (root is 0).
    pub level: usize,
    /// Direct children.
    pub child_count: usize,
    /// Documents anywhere below.
    pub descendant_docs: usize,
    /// Per-column aggregates.
    pub aggregates: Vec<ColumnAggregate>,
    /// Per-origin reader accumulation.
    pub readers_by_origin: Vec<OriginReadersSnapshot>,
}

impl CategorySnapshot {
    /// Returns the aggregate for a column by item name.
    pub fn aggregate(&self, item: &str) -> Option<&ColumnAggregate> {
        self.aggregates.iter().find(|a| a.item == item)
    }

    /// Returns the running sum for a column by item name.
    pub fn sum(&self, item: &str) -> Option<f64> {
        self.aggregate(item).map(|a| a.sum)
    }

    /// Returns the average for a column by item name.
    pub fn average(&self, item: &str) -> Option<f64> {
        self.aggregate(item).and_then(|a| a.average())
    }

    /// Returns true if any of `principals` can see at least one
    /// document below this category, from any origin.
    pub fn visible_to(&self, principals: &[String]) -> bool {
        self.readers_by_origin.iter().any(|slot| {
            slot.world_count > 0
                || principals.iter().any(|p| slot.principals.contains(p))
        })
    }
}

/// Document payload of a snapshot.
#[derive(Clone, Debug)]
pub struct DocumentSnapshot {
    /// Origin name.
    pub origin: String,
    /// Row id, unique within the origin.
    pub row_id: u64,
    /// Provider-stable external key.
    pub external_key: String,
    /// Computed column values in declaration order.
    pub values: Vec<Value>,
    /// Reader restriction; None means world-readable.
    pub readers: Option<Vec<String>>,
}

/// Variant payload of a snapshot.
#[derive(Clone, Debug)]
pub enum SnapshotKind {
    Category(CategorySnapshot),
    Document(DocumentSnapshot),
}

/// An immutable value copy of one tree entry.
#[derive(Clone, Debug)]
pub struct EntrySnapshot {
    pub(crate) position: Position,
    pub(crate) sibling_index: usize,
    pub(crate) sibling_count: usize,
    pub(crate) columns: Arc<Vec<ViewColumn>>,
    pub(crate) kind: SnapshotKind,
}

impl EntrySnapshot {
    /// Returns the entry's tumbler position.
    #[inline]
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Returns the entry's 1-based index among its siblings.
    #[inline]
    pub fn sibling_index(&self) -> usize {
        self.sibling_index
    }

    /// Returns the number of siblings (including this entry).
    #[inline]
    pub fn sibling_count(&self) -> usize {
        self.sibling_count
    }

    /// Returns the variant payload.
    #[inline]
    pub fn kind(&self) -> &SnapshotKind {
        &self.kind
    }

    /// Returns true if this is a category snapshot.
    #[inline]
    pub fn is_category(&self) -> bool {
        matches!(self.kind, SnapshotKind::Category(_))
    }

    /// Returns true if this is a document snapshot.
    #[inline]
    pub fn is_document(&self) -> bool {
        matches!(self.kind, SnapshotKind::Document(_))
    }

    /// Returns the category payload, if this is a category.
    pub fn as_category(&self) -> Option<&CategorySnapshot> {
        match &self.kind {
            SnapshotKind::Category(data) => Some(data),
            SnapshotKind::Document(_) => None,
        }
    }

    /// Returns the document payload, if this is a document.
    pub fn as_document(&self) -> Option<&DocumentSnapshot> {
        match &self.kind {
            SnapshotKind::Category(_) => None,
            SnapshotKind::Document(data) => Some(data),
        }
    }

    /// Returns the view's column definitions.
    pub fn columns(&self) -> &[ViewColumn] {
        &self.columns
    }

    /// Returns a document's computed value for the column with the
    /// given item name. None for categories and unknown items.
    pub fn column_value(&self, item: &str) -> Option<&Value> {
        let doc = self.as_document()?;
        let index = self.columns.iter().position(|c| c.item_name() == item)?;
        doc.values.get(index)
    }
}
