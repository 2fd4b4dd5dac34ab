//! Tree entries.
//!
//! Every entry lives in a slot table owned by the view tree; parent and
//! child relations are indices into that table, never owning references.
//! An entry is either a category (a grouping node with accumulated
//! facts) or a document (one source row).

use crate::aggregate::Aggregates;
use crate::readers::ReaderAccumulator;
use canopy_core::Value;
use std::collections::BTreeSet;

/// Index of an entry in the view tree's slot table.
pub type EntryId = usize;

/// Interned id of an origin (data provider partition).
pub type OriginId = u32;

/// The slot index of the synthetic root category.
pub const ROOT: EntryId = 0;

/// Category payload: the grouping key plus incrementally maintained
/// facts about the subtree.
#[derive(Clone, Debug)]
pub struct CategoryData {
    /// The grouping key for this level.
    pub(crate) value: Value,
    /// Depth of this category (root is 0).
    pub(crate) level: usize,
    /// Documents anywhere below this category.
    pub(crate) descendant_docs: usize,
    /// Running per-column aggregates over descendant documents.
    pub(crate) aggregates: Aggregates,
    /// Per-origin reader accumulation over descendant documents.
    pub(crate) readers: ReaderAccumulator,
}

impl CategoryData {
    /// Returns the grouping key.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the category depth (root is 0).
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Returns the number of documents in the subtree.
    #[inline]
    pub fn descendant_docs(&self) -> usize {
        self.descendant_docs
    }

    /// Returns the running aggregates.
    #[inline]
    pub fn aggregates(&self) -> &Aggregates {
        &self.aggregates
    }

    /// Returns the per-origin reader accumulation.
    #[inline]
    pub fn readers(&self) -> &ReaderAccumulator {
        &self.readers
    }
}

/// Document payload: one source row with its computed column values.
#[derive(Clone, Debug)]
pub struct DocumentData {
    pub(crate) origin: OriginId,
    pub(crate) row_id: u64,
    pub(crate) external_key: String,
    /// One computed value per configured column, in declaration order.
    pub(crate) values: Vec<Value>,
    /// Cached document sort key (sortable non-category column values).
    pub(crate) sort_key: Vec<Value>,
    /// Reader restriction; None means world-readable.
    pub(crate) readers: Option<BTreeSet<String>>,
}

impl DocumentData {
    /// Returns the interned origin id.
    #[inline]
    pub fn origin(&self) -> OriginId {
        self.origin
    }

    /// Returns the row id (unique within the origin).
    #[inline]
    pub fn row_id(&self) -> u64 {
        self.row_id
    }

    /// Returns the provider-stable external key.
    #[inline]
    pub fn external_key(&self) -> &str {
        &self.external_key
    }

    /// Returns the computed column values in declaration order.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the cached document sort key.
    #[inline]
    pub fn sort_key(&self) -> &[Value] {
        &self.sort_key
    }

    /// Returns the reader restriction; None means world-readable.
    #[inline]
    pub fn readers(&self) -> Option<&BTreeSet<String>> {
        self.readers.as_ref()
    }

    /// Returns true if the given principals may read this document.
    pub fn visible_to(&self, principals: &BTreeSet<String>) -> bool {
        match &self.readers {
            None => true,
            Some(allowed) => principals.iter().any(|p| allowed.contains(p)),
        }
    }
}

/// Variant payload of an entry.
#[derive(Clone, Debug)]
pub enum EntryKind {
    Category(CategoryData),
    Document(DocumentData),
}

/// A node in the view tree.
#[derive(Clone, Debug)]
pub struct Entry {
    pub(crate) parent: Option<EntryId>,
    pub(crate) children: Vec<EntryId>,
    pub(crate) kind: EntryKind,
}

impl Entry {
    /// Creates a category entry.
    pub(crate) fn category(
        parent: Option<EntryId>,
        value: Value,
        level: usize,
        agg_slots: usize,
    ) -> Self {
        Self {
            parent,
            children: Vec::new(),
            kind: EntryKind::Category(CategoryData {
                value,
                level,
                descendant_docs: 0,
                aggregates: Aggregates::new(agg_slots),
                readers: ReaderAccumulator::new(),
            }),
        }
    }

    /// Creates a document entry.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn document(
        parent: EntryId,
        origin: OriginId,
        row_id: u64,
        external_key: String,
        values: Vec<Value>,
        sort_key: Vec<Value>,
        readers: Option<BTreeSet<String>>,
    ) -> Self {
        Self {
            parent: Some(parent),
            children: Vec::new(),
            kind: EntryKind::Document(DocumentData {
                origin,
                row_id,
                external_key,
                values,
                sort_key,
                readers,
            }),
        }
    }

    /// Returns the parent entry id, or None for the root.
    #[inline]
    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    /// Returns the ordered children.
    #[inline]
    pub fn children(&self) -> &[EntryId] {
        &self.children
    }

    /// Returns the variant payload.
    #[inline]
    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Returns true if this is a category entry.
    #[inline]
    pub fn is_category(&self) -> bool {
        matches!(self.kind, EntryKind::Category(_))
    }

    /// Returns true if this is a document entry.
    #[inline]
    pub fn is_document(&self) -> bool {
        matches!(self.kind, EntryKind::Document(_))
    }

    /// Returns the category payload, if this is a category.
    pub fn as_category(&self) -> Option<&CategoryData> {
        match &self.kind {
            EntryKind::Category(data) => Some(data),
            EntryKind::Document(_) => None,
        }
    }

    /// Returns the document payload, if this is a document.
    pub fn as_document(&self) -> Option<&DocumentData> {
        match &self.kind {
            EntryKind::Category(_) => None,
            EntryKind::Document(data) => Some(data),
        }
    }

    pub(crate) fn as_category_mut(&mut self) -> Option<&mut CategoryData> {
        match &mut self.kind {
            EntryKind::Category(data) => Some(data),
            EntryKind::Document(_) => None,
        }
    }

    pub(crate) fn as_document_mut(&mut self) -> Option<&mut DocumentData> {
        match &mut self.kind {
            EntryKind::Category(_) => None,
            EntryKind::Document(data) => Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_entry() {
        let entry = Entry::category(None, Value::Null, 0, 1);
        assert!(entry.is_category());
        assert!(!entry.is_document());
        assert!(entry.parent().is_none());
        let data = entry.as_category().unwrap();
        assert_eq!(data.level(), 0);
        assert_eq!(data.descendant_docs(), 0);
    }

    #[test]
    fn test_document_entry() {
        let entry = Entry::document(
            ROOT,
            0,
            42,
            "unid-42".into(),
            vec![Value::String("Abbott".into())],
            vec![Value::String("Abbott".into())],
            None,
        );
        assert!(entry.is_document());
        let data = entry.as_document().unwrap();
        assert_eq!(data.row_id(), 42);
        assert_eq!(data.external_key(), "unid-42");
        assert!(data.readers().is_none());
    }

    #[test]
    fn test_document_visibility() {
        let readers: BTreeSet<String> = ["Bob".to_string()].into();
        let entry = Entry::document(
            ROOT,
            0,
            1,
            "u1".into(),
            vec![],
            vec![],
            Some(readers),
        );
        let doc = entry.as_document().unwrap();
        assert!(doc.visible_to(&["Bob".to_string()].into()));
        assert!(!doc.visible_to(&["Alice".to_string()].into()));

        let open = Entry::document(ROOT, 0, 2, "u2".into(), vec![], vec![], None);
        assert!(open.as_document().unwrap().visible_to(&BTreeSet::new()));
    }
}
