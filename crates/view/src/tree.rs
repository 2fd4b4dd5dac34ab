//! The categorized view tree and change application.
//!
//! All entries live in one growable slot table; freed slots are recycled
//! through a free list. Structural mutation happens only through
//! `apply_changes`, which the owning `VirtualView` serializes behind its
//! write lock.

use crate::change::{ApplyOutcome, ChangeBatch, RowSkip, READERS_ITEM};
use crate::entry::{Entry, EntryId, EntryKind, OriginId, ROOT};
use crate::position::Position;
use crate::snapshot::{
    CategorySnapshot, ColumnAggregate, DocumentSnapshot, EntrySnapshot, OriginReadersSnapshot,
    SnapshotKind,
};
use canopy_core::{KeyComparator, Order, Result, RowSummary, Value, ViewColumn};
use core::cmp::Ordering;
use hashbrown::HashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Immutable per-view configuration derived from the column set.
#[derive(Clone, Debug)]
pub(crate) struct TreeConfig {
    /// All columns in declaration order.
    pub columns: Arc<Vec<ViewColumn>>,
    /// Indices of category columns, in declaration order.
    pub category_cols: Vec<usize>,
    /// Indices of sortable non-category columns, in declaration order.
    pub doc_sort_cols: Vec<usize>,
    /// Comparator over the document sort key.
    pub doc_cmp: KeyComparator,
    /// Sort order per category level.
    pub level_orders: Vec<Order>,
    /// Indices of aggregated columns, in declaration order.
    pub agg_cols: Vec<usize>,
    /// Whether empty categories are kept with zeroed counts.
    pub retain_empty: bool,
}

impl TreeConfig {
    pub(crate) fn new(columns: Arc<Vec<ViewColumn>>, retain_empty: bool) -> Self {
        let category_cols: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_category())
            .map(|(i, _)| i)
            .collect();
        let doc_sort_cols: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_category() && c.sort_order().is_some())
            .map(|(i, _)| i)
            .collect();
        let doc_orders: Vec<Order> = doc_sort_cols
            .iter()
            .filter_map(|&i| columns[i].sort_order())
            .collect();
        let level_orders: Vec<Order> = category_cols
            .iter()
            .map(|&i| columns[i].sort_order().unwrap_or(Order::Asc))
            .collect();
        let agg_cols: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.aggregation_kind() != canopy_core::Aggregation::None)
            .map(|(i, _)| i)
            .collect();
        Self {
            columns,
            category_cols,
            doc_sort_cols,
            doc_cmp: KeyComparator::new(doc_orders),
            level_orders,
            agg_cols,
            retain_empty,
        }
    }
}

/// The categorized, sorted tree over all applied documents.
pub struct ViewTree {
    config: TreeConfig,
    slots: Vec<Option<Entry>>,
    free: Vec<EntryId>,
    origins: Vec<String>,
    origin_ids: HashMap<String, OriginId>,
    /// `(origin, row_id)` → document entry.
    docs: HashMap<(OriginId, u64), EntryId>,
    /// Live categories, excluding the root.
    categories: usize,
}

impl ViewTree {
    pub(crate) fn new(config: TreeConfig) -> Self {
        let agg_slots = config.agg_cols.len();
        Self {
            config,
            slots: vec![Some(Entry::category(None, Value::Null, 0, agg_slots))],
            free: Vec::new(),
            origins: Vec::new(),
            origin_ids: HashMap::new(),
            docs: HashMap::new(),
            categories: 0,
        }
    }

    // -- read API ----------------------------------------------------------

    /// Returns the root entry id.
    #[inline]
    pub fn root_id(&self) -> EntryId {
        ROOT
    }

    /// Returns the entry stored at `id`, if the slot is live.
    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// Returns an entry's ordered children (empty for vacant slots).
    pub fn children_of(&self, id: EntryId) -> &[EntryId] {
        self.entry(id).map(Entry::children).unwrap_or(&[])
    }

    /// Returns an entry's parent id.
    pub fn parent_of(&self, id: EntryId) -> Option<EntryId> {
        self.entry(id).and_then(Entry::parent)
    }

    /// Returns the tumbler position of an entry.
    pub fn position_of(&self, id: EntryId) -> Option<Position> {
        if id == ROOT {
            return Some(Position::root());
        }
        let mut components = Vec::new();
        let mut cursor = id;
        while cursor != ROOT {
            let entry = self.entry(cursor)?;
            let parent = entry.parent()?;
            let index = self
                .entry(parent)?
                .children()
                .iter()
                .position(|&c| c == cursor)?;
            components.push((index + 1) as u32);
            cursor = parent;
        }
        components.reverse();
        Position::new(components)
    }

    /// Resolves a tumbler position to an entry id.
    pub fn entry_at(&self, position: &Position) -> Option<EntryId> {
        let mut cursor = ROOT;
        for &component in position.components() {
            let children = self.children_of(cursor);
            cursor = *children.get(component as usize - 1)?;
        }
        Some(cursor)
    }

    /// Returns the document entry for `(origin, row_id)`, if present.
    pub fn document_id(&self, origin: &str, row_id: u64) -> Option<EntryId> {
        let origin = *self.origin_ids.get(origin)?;
        self.docs.get(&(origin, row_id)).copied()
    }

    /// Resolves a category by its value path from the root.
    pub fn find_category(&self, path: &[Value]) -> Option<EntryId> {
        let mut cursor = ROOT;
        for (level, value) in path.iter().enumerate() {
            let order = self.config.level_orders.get(level).copied()?;
            cursor = self.category_child(cursor, value, order).ok()?;
        }
        Some(cursor)
    }

    /// Returns the total number of documents.
    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    /// Returns the number of live categories, excluding the root.
    pub fn category_count(&self) -> usize {
        self.categories
    }

    /// Returns the name of an interned origin.
    pub fn origin_name(&self, origin: OriginId) -> Option<&str> {
        self.origins.get(origin as usize).map(String::as_str)
    }

    /// Returns the interned id for an origin name.
    pub fn origin_id(&self, origin: &str) -> Option<OriginId> {
        self.origin_ids.get(origin).copied()
    }

    /// Returns the comparator over document sort keys.
    pub fn doc_comparator(&self) -> &KeyComparator {
        &self.config.doc_cmp
    }

    /// Returns an entry's category value path from the root: for a
    /// category its own value is included; for a document the path is
    /// its ancestor chain. The root's path is empty.
    pub fn category_path(&self, id: EntryId) -> Vec<Value> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            if cur == ROOT {
                break;
            }
            let Some(entry) = self.entry(cur) else {
                break;
            };
            if let Some(cat) = entry.as_category() {
                path.push(cat.value().clone());
            }
            cursor = entry.parent();
        }
        path.reverse();
        path
    }

    /// Returns the view's columns.
    pub fn columns(&self) -> &Arc<Vec<ViewColumn>> {
        &self.config.columns
    }

    /// Builds an immutable snapshot of an entry.
    pub fn snapshot(&self, id: EntryId) -> Option<EntrySnapshot> {
        let entry = self.entry(id)?;
        let position = self.position_of(id)?;
        let (sibling_index, sibling_count) = match entry.parent() {
            Some(parent) => {
                let siblings = self.entry(parent)?.children();
                let index = siblings.iter().position(|&c| c == id)?;
                (index + 1, siblings.len())
            }
            None => (1, 1),
        };
        let kind = match entry.kind() {
            EntryKind::Category(cat) => {
                let aggregates = self
                    .config
                    .agg_cols
                    .iter()
                    .enumerate()
                    .map(|(slot, &col)| ColumnAggregate {
                        item: self.config.columns[col].item_name().to_string(),
                        sum: cat.aggregates().sum(slot),
                        count: cat.aggregates().count(slot),
                    })
                    .collect();
                let mut readers_by_origin: Vec<OriginReadersSnapshot> = cat
                    .readers()
                    .origins()
                    .map(|(oid, slot)| OriginReadersSnapshot {
                        origin: self.origin_name(oid).unwrap_or_default().to_string(),
                        world_count: slot.world_count(),
                        principals: slot.principals().map(str::to_string).collect(),
                    })
                    .collect();
                readers_by_origin.sort_by(|a, b| a.origin.cmp(&b.origin));
                SnapshotKind::Category(CategorySnapshot {
                    value: cat.value().clone(),
                    level: cat.level(),
                    child_count: entry.children().len(),
                    descendant_docs: cat.descendant_docs(),
                    aggregates,
                    readers_by_origin,
                })
            }
            EntryKind::Document(doc) => SnapshotKind::Document(DocumentSnapshot {
                origin: self.origin_name(doc.origin()).unwrap_or_default().to_string(),
                row_id: doc.row_id(),
                external_key: doc.external_key().to_string(),
                values: doc.values().to_vec(),
                readers: doc.readers().map(|r| r.iter().cloned().collect()),
            }),
        };
        Some(EntrySnapshot {
            position,
            sibling_index,
            sibling_count,
            columns: self.config.columns.clone(),
            kind,
        })
    }

    // -- mutation ----------------------------------------------------------

    /// Applies one origin's change batch.
    ///
    /// Row-level errors skip the row and continue; removals of unknown
    /// rows are silent no-ops. Idempotent per row id.
    pub(crate) fn apply_changes(&mut self, batch: &ChangeBatch) -> ApplyOutcome {
        let origin = self.intern_origin(batch.origin());
        let mut outcome = ApplyOutcome::default();

        for change in batch.additions() {
            match &change.summary {
                Some(summary) => {
                    match self.upsert(origin, change.row_id, &change.external_key, summary) {
                        Ok(()) => outcome.applied += 1,
                        Err(err) => {
                            log::warn!(
                                "row skipped: origin={} row_id={}: {}",
                                batch.origin(),
                                change.row_id,
                                err
                            );
                            outcome.skipped.push(RowSkip {
                                row_id: change.row_id,
                                reason: err.to_string(),
                            });
                        }
                    }
                }
                // The provider saw the row disappear between enumeration
                // and fetch.
                None => {
                    if self.remove_document(origin, change.row_id) {
                        outcome.removed += 1;
                    } else {
                        outcome.stale_removals += 1;
                    }
                }
            }
        }

        for &row_id in batch.removals() {
            if self.remove_document(origin, row_id) {
                outcome.removed += 1;
            } else {
                log::debug!(
                    "stale removal ignored: origin={} row_id={}",
                    batch.origin(),
                    row_id
                );
                outcome.stale_removals += 1;
            }
        }

        outcome
    }

    fn intern_origin(&mut self, name: &str) -> OriginId {
        if let Some(&id) = self.origin_ids.get(name) {
            return id;
        }
        let id = self.origins.len() as OriginId;
        self.origins.push(name.to_string());
        self.origin_ids.insert(name.to_string(), id);
        id
    }

    fn upsert(
        &mut self,
        origin: OriginId,
        row_id: u64,
        external_key: &str,
        summary: &RowSummary,
    ) -> Result<()> {
        let origin_name = self.origins[origin as usize].clone();
        let columns = self.config.columns.clone();
        let values: Vec<Value> = columns
            .iter()
            .map(|c| c.evaluate(&origin_name, summary))
            .collect();
        let readers = read_readers(summary)?;
        let category_path: Vec<Value> = self
            .config
            .category_cols
            .iter()
            .map(|&i| values[i].clone())
            .collect();
        let sort_key: Vec<Value> = self
            .config
            .doc_sort_cols
            .iter()
            .map(|&i| values[i].clone())
            .collect();

        if let Some(&existing) = self.docs.get(&(origin, row_id)) {
            let same_place = self.category_path(existing) == category_path
                && self
                    .entry(existing)
                    .and_then(Entry::as_document)
                    .map(|d| d.sort_key() == sort_key.as_slice())
                    .unwrap_or(false);
            if same_place {
                // Pure value replace: the entry keeps its slot and its
                // position among equal-keyed siblings.
                self.replace_in_place(existing, origin, external_key, values, readers);
                return Ok(());
            }
            self.remove_document(origin, row_id);
        }

        let parent = self.ensure_category_path(&category_path);
        let agg_values = self.agg_values(&values);
        let entry = Entry::document(
            parent,
            origin,
            row_id,
            external_key.to_string(),
            values,
            sort_key,
            readers.clone(),
        );
        let id = self.alloc(entry);
        let index = self.document_insert_index(parent, id);
        if let Some(parent_entry) = self.slots.get_mut(parent).and_then(Option::as_mut) {
            parent_entry.children.insert(index, id);
        }
        self.docs.insert((origin, row_id), id);
        self.propagate_add(parent, &agg_values, origin, readers.as_ref(), true);
        Ok(())
    }

    fn replace_in_place(
        &mut self,
        id: EntryId,
        origin: OriginId,
        external_key: &str,
        values: Vec<Value>,
        readers: Option<BTreeSet<String>>,
    ) {
        let Some((parent, old_agg, old_readers)) = self.entry(id).and_then(|entry| {
            let parent = entry.parent()?;
            let doc = entry.as_document()?;
            Some((parent, self.agg_values(doc.values()), doc.readers().cloned()))
        }) else {
            return;
        };
        self.propagate_subtract(parent, &old_agg, origin, old_readers.as_ref(), false);
        let new_agg = self.agg_values(&values);
        if let Some(doc) = self
            .slots
            .get_mut(id)
            .and_then(Option::as_mut)
            .and_then(Entry::as_document_mut)
        {
            if doc.external_key != external_key {
                log::debug!(
                    "external key changed for row_id={}: {} -> {}",
                    doc.row_id,
                    doc.external_key,
                    external_key
                );
                doc.external_key = external_key.to_string();
            }
            doc.values = values;
            doc.readers = readers.clone();
        }
        self.propagate_add(parent, &new_agg, origin, readers.as_ref(), false);
    }

    fn remove_document(&mut self, origin: OriginId, row_id: u64) -> bool {
        let Some(&id) = self.docs.get(&(origin, row_id)) else {
            return false;
        };
        let Some((parent, agg_values, readers)) = self.entry(id).and_then(|entry| {
            let parent = entry.parent()?;
            let doc = entry.as_document()?;
            Some((parent, self.agg_values(doc.values()), doc.readers().cloned()))
        }) else {
            return false;
        };

        self.docs.remove(&(origin, row_id));
        self.detach_child(parent, id);
        self.propagate_subtract(parent, &agg_values, origin, readers.as_ref(), true);
        self.release(id);
        self.prune_upward(parent);
        true
    }

    /// Walks or creates the category chain for a path and returns the
    /// parent the document belongs under.
    fn ensure_category_path(&mut self, path: &[Value]) -> EntryId {
        let mut parent = ROOT;
        for (level, value) in path.iter().enumerate() {
            let order = self.config.level_orders[level];
            parent = match self.category_child(parent, value, order) {
                Ok(found) => found,
                Err(index) => {
                    let agg_slots = self.config.agg_cols.len();
                    let id = self.alloc(Entry::category(
                        Some(parent),
                        value.clone(),
                        level + 1,
                        agg_slots,
                    ));
                    if let Some(parent_entry) =
                        self.slots.get_mut(parent).and_then(Option::as_mut)
                    {
                        parent_entry.children.insert(index, id);
                    }
                    self.categories += 1;
                    id
                }
            };
        }
        parent
    }

    /// Binary-searches a category's children for a child category with
    /// the given value. Returns the insertion index when absent.
    fn category_child(
        &self,
        parent: EntryId,
        value: &Value,
        order: Order,
    ) -> core::result::Result<EntryId, usize> {
        let children = self.children_of(parent);
        let index = children.partition_point(|&cid| {
            match self.entry(cid).and_then(Entry::as_category) {
                Some(cat) => order.apply(cat.value().cmp(value)) == Ordering::Less,
                None => false,
            }
        });
        if let Some(&cid) = children.get(index) {
            if let Some(cat) = self.entry(cid).and_then(Entry::as_category) {
                if cat.value() == value {
                    return Ok(cid);
                }
            }
        }
        Err(index)
    }

    /// Upper-bound insertion index for a document among its siblings;
    /// equal keys keep insertion order.
    fn document_insert_index(&self, parent: EntryId, id: EntryId) -> usize {
        let Some(sort_key) = self
            .entry(id)
            .and_then(Entry::as_document)
            .map(|d| d.sort_key().to_vec())
        else {
            return self.children_of(parent).len();
        };
        let cmp = &self.config.doc_cmp;
        self.children_of(parent).partition_point(|&cid| {
            match self.entry(cid).and_then(Entry::as_document) {
                Some(doc) => cmp.compare(doc.sort_key(), &sort_key) != Ordering::Greater,
                None => true,
            }
        })
    }

    /// Returns the aggregated-column values of a document, in slot order.
    fn agg_values(&self, values: &[Value]) -> Vec<Value> {
        self.config
            .agg_cols
            .iter()
            .map(|&i| values.get(i).cloned().unwrap_or(Value::Null))
            .collect()
    }

    fn propagate_add(
        &mut self,
        from: EntryId,
        agg_values: &[Value],
        origin: OriginId,
        readers: Option<&BTreeSet<String>>,
        count_doc: bool,
    ) {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let Some(entry) = self.slots.get_mut(id).and_then(Option::as_mut) else {
                return;
            };
            let parent = entry.parent();
            if let Some(cat) = entry.as_category_mut() {
                if count_doc {
                    cat.descendant_docs += 1;
                }
                cat.aggregates.add(agg_values);
                cat.readers.add(origin, readers);
            }
            cursor = parent;
        }
    }

    fn propagate_subtract(
        &mut self,
        from: EntryId,
        agg_values: &[Value],
        origin: OriginId,
        readers: Option<&BTreeSet<String>>,
        count_doc: bool,
    ) {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let Some(entry) = self.slots.get_mut(id).and_then(Option::as_mut) else {
                return;
            };
            let parent = entry.parent();
            if let Some(cat) = entry.as_category_mut() {
                if count_doc {
                    cat.descendant_docs = cat.descendant_docs.saturating_sub(1);
                }
                cat.aggregates.subtract(agg_values);
                cat.readers.subtract(origin, readers);
            }
            cursor = parent;
        }
    }

    /// Removes now-empty categories bottom-up, unless retention is on.
    fn prune_upward(&mut self, mut id: EntryId) {
        if self.config.retain_empty {
            return;
        }
        while id != ROOT {
            let Some(entry) = self.entry(id) else {
                return;
            };
            if !entry.children().is_empty() {
                return;
            }
            let Some(parent) = entry.parent() else {
                return;
            };
            self.detach_child(parent, id);
            self.release(id);
            self.categories -= 1;
            id = parent;
        }
    }

    fn detach_child(&mut self, parent: EntryId, child: EntryId) {
        if let Some(parent_entry) = self.slots.get_mut(parent).and_then(Option::as_mut) {
            if let Some(index) = parent_entry.children.iter().position(|&c| c == child) {
                parent_entry.children.remove(index);
            }
        }
    }

    fn alloc(&mut self, entry: Entry) -> EntryId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(entry);
                id
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, id: EntryId) {
        self.slots[id] = None;
        self.free.push(id);
    }
}

/// Extracts a row's reader restriction from its summary.
///
/// An absent or empty `$Readers` item means world-readable; a present
/// item of the wrong type is a row-level error.
fn read_readers(summary: &RowSummary) -> Result<Option<BTreeSet<String>>> {
    let names = summary.get_as_string_list(READERS_ITEM, Vec::new())?;
    if names.is_empty() {
        Ok(None)
    } else {
        Ok(Some(names.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::RowChange;

    fn people_config() -> TreeConfig {
        let columns = Arc::new(vec![
            ViewColumn::new("Lastname").category(),
            ViewColumn::new("Firstname").ascending(),
            ViewColumn::new("Amount").total(),
        ]);
        TreeConfig::new(columns, false)
    }

    fn person(last: &str, first: &str, amount: f64) -> RowSummary {
        RowSummary::new()
            .with("Lastname", last)
            .with("Firstname", first)
            .with("Amount", amount)
    }

    fn batch(origin: &str, rows: &[(u64, &str, &str, f64)]) -> ChangeBatch {
        let mut batch = ChangeBatch::new(origin);
        for &(row_id, last, first, amount) in rows {
            batch.add(RowChange::new(
                row_id,
                format!("unid-{row_id}"),
                person(last, first, amount),
            ));
        }
        batch
    }

    fn category_values(tree: &ViewTree) -> Vec<Value> {
        tree.children_of(ROOT)
            .iter()
            .filter_map(|&id| tree.entry(id).and_then(Entry::as_category))
            .map(|c| c.value().clone())
            .collect()
    }

    fn doc_firstnames(tree: &ViewTree, category: EntryId) -> Vec<String> {
        tree.children_of(category)
            .iter()
            .filter_map(|&id| tree.entry(id).and_then(Entry::as_document))
            .filter_map(|d| d.values()[1].as_str().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_categorized_sorted_insert() {
        let mut tree = ViewTree::new(people_config());
        tree.apply_changes(&batch(
            "o1",
            &[
                (1, "Abbott", "Ed", 10.0),
                (2, "Abbott", "Al", 20.0),
                (3, "Zeller", "Jo", 5.0),
            ],
        ));

        assert_eq!(
            category_values(&tree),
            vec![Value::String("Abbott".into()), Value::String("Zeller".into())]
        );
        let abbott = tree.find_category(&[Value::String("Abbott".into())]).unwrap();
        assert_eq!(doc_firstnames(&tree, abbott), vec!["Al", "Ed"]);
        assert_eq!(tree.document_count(), 3);
        assert_eq!(tree.category_count(), 2);
    }

    #[test]
    fn test_positions_and_lookup() {
        let mut tree = ViewTree::new(people_config());
        tree.apply_changes(&batch(
            "o1",
            &[(1, "Abbott", "Ed", 0.0), (2, "Abbott", "Al", 0.0)],
        ));

        let abbott = tree.find_category(&[Value::String("Abbott".into())]).unwrap();
        assert_eq!(tree.position_of(abbott).unwrap().to_string(), "1");

        let al = tree.document_id("o1", 2).unwrap();
        assert_eq!(tree.position_of(al).unwrap().to_string(), "1.1");
        assert_eq!(tree.entry_at(&Position::parse("1.1").unwrap()), Some(al));
        assert_eq!(tree.entry_at(&Position::parse("1.9").unwrap()), None);
    }

    #[test]
    fn test_reapplication_is_idempotent() {
        let rows = [(1, "Abbott", "Ed", 10.0), (2, "Abbott", "Al", 20.0)];
        let mut tree = ViewTree::new(people_config());
        tree.apply_changes(&batch("o1", &rows));
        let outcome = tree.apply_changes(&batch("o1", &rows));

        assert_eq!(outcome.applied, 2);
        assert_eq!(tree.document_count(), 2);
        assert_eq!(tree.category_count(), 1);
        let abbott = tree.find_category(&[Value::String("Abbott".into())]).unwrap();
        assert_eq!(doc_firstnames(&tree, abbott), vec!["Al", "Ed"]);
        let root_cat = tree.entry(ROOT).unwrap().as_category().unwrap();
        assert_eq!(root_cat.descendant_docs(), 2);
        assert_eq!(root_cat.aggregates().sum(0), 30.0);
    }

    #[test]
    fn test_update_moves_between_categories() {
        let mut tree = ViewTree::new(people_config());
        tree.apply_changes(&batch("o1", &[(1, "Abbott", "Ed", 10.0)]));
        // Same row id, new category
        tree.apply_changes(&batch("o1", &[(1, "Zeller", "Ed", 10.0)]));

        assert_eq!(category_values(&tree), vec![Value::String("Zeller".into())]);
        assert_eq!(tree.document_count(), 1);
        assert_eq!(tree.category_count(), 1);
    }

    #[test]
    fn test_remove_and_prune() {
        let mut tree = ViewTree::new(people_config());
        tree.apply_changes(&batch(
            "o1",
            &[
                (1, "Abbott", "Ed", 10.0),
                (2, "Abbott", "Al", 20.0),
                (3, "Zeller", "Jo", 5.0),
            ],
        ));

        let outcome = tree.apply_changes(&ChangeBatch::new("o1").with_removal(1));
        assert_eq!(outcome.removed, 1);
        let abbott = tree.find_category(&[Value::String("Abbott".into())]).unwrap();
        assert_eq!(doc_firstnames(&tree, abbott), vec!["Al"]);
        let cat = tree.entry(abbott).unwrap().as_category().unwrap();
        assert_eq!(cat.descendant_docs(), 1);
        assert_eq!(cat.aggregates().sum(0), 20.0);

        tree.apply_changes(&ChangeBatch::new("o1").with_removal(2));
        assert!(tree.find_category(&[Value::String("Abbott".into())]).is_none());
        assert_eq!(tree.category_count(), 1);

        let root_cat = tree.entry(ROOT).unwrap().as_category().unwrap();
        assert_eq!(root_cat.descendant_docs(), 1);
        assert_eq!(root_cat.aggregates().sum(0), 5.0);
    }

    #[test]
    fn test_retain_empty_categories() {
        let columns = Arc::new(vec![
            ViewColumn::new("Lastname").category(),
            ViewColumn::new("Firstname").ascending(),
            ViewColumn::new("Amount").total(),
        ]);
        let mut tree = ViewTree::new(TreeConfig::new(columns, true));
        tree.apply_changes(&batch("o1", &[(1, "Abbott", "Ed", 10.0)]));
        tree.apply_changes(&ChangeBatch::new("o1").with_removal(1));

        let abbott = tree.find_category(&[Value::String("Abbott".into())]).unwrap();
        let cat = tree.entry(abbott).unwrap().as_category().unwrap();
        assert_eq!(cat.descendant_docs(), 0);
        assert_eq!(cat.aggregates().sum(0), 0.0);
        assert_eq!(cat.aggregates().count(0), 0);
    }

    #[test]
    fn test_stale_removal_is_noop() {
        let mut tree = ViewTree::new(people_config());
        let outcome = tree.apply_changes(&ChangeBatch::new("o1").with_removal(99));
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.stale_removals, 1);
    }

    #[test]
    fn test_vanished_addition_is_removal() {
        let mut tree = ViewTree::new(people_config());
        tree.apply_changes(&batch("o1", &[(1, "Abbott", "Ed", 10.0)]));
        let outcome = tree.apply_changes(
            &ChangeBatch::new("o1").with_addition(RowChange::vanished(1, "unid-1")),
        );
        assert_eq!(outcome.removed, 1);
        assert_eq!(tree.document_count(), 0);
    }

    #[test]
    fn test_bad_readers_skips_row_only() {
        let mut tree = ViewTree::new(people_config());
        let mut batch = batch("o1", &[(1, "Abbott", "Ed", 10.0)]);
        batch.add(RowChange::new(
            2,
            "unid-2",
            person("Abbott", "Al", 0.0).with(READERS_ITEM, Value::Number(5.0)),
        ));
        let outcome = tree.apply_changes(&batch);

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].row_id, 2);
        assert_eq!(tree.document_count(), 1);
    }

    #[test]
    fn test_readers_accumulate_per_origin() {
        let mut tree = ViewTree::new(people_config());
        tree.apply_changes(&batch("o1", &[(1, "X", "Ed", 0.0)]));
        let mut restricted = ChangeBatch::new("o2");
        restricted.add(RowChange::new(
            1,
            "unid-b1",
            person("X", "Jo", 0.0).with(READERS_ITEM, Value::List(vec!["Bob".into()])),
        ));
        tree.apply_changes(&restricted);

        let x = tree.find_category(&[Value::String("X".into())]).unwrap();
        let readers = tree.entry(x).unwrap().as_category().unwrap().readers();
        assert!(readers.is_world_visible());
        let o2 = tree.origin_id("o2").unwrap();
        assert!(!readers.origin(o2).unwrap().is_world_visible());
        assert!(readers
            .origin(o2)
            .unwrap()
            .visible_to(&["Bob".to_string()].into()));
    }

    #[test]
    fn test_row_ids_are_scoped_per_origin() {
        let mut tree = ViewTree::new(people_config());
        tree.apply_changes(&batch("o1", &[(1, "Abbott", "Ed", 0.0)]));
        tree.apply_changes(&batch("o2", &[(1, "Abbott", "Al", 0.0)]));
        assert_eq!(tree.document_count(), 2);

        // Removing o2's row 1 leaves o1's row 1 alone
        tree.apply_changes(&ChangeBatch::new("o2").with_removal(1));
        assert_eq!(tree.document_count(), 1);
        assert!(tree.document_id("o1", 1).is_some());
        assert!(tree.document_id("o2", 1).is_none());
    }

    #[test]
    fn test_descending_category_order() {
        let columns = Arc::new(vec![
            ViewColumn::new("Lastname").descending().category(),
            ViewColumn::new("Firstname").ascending(),
        ]);
        let mut tree = ViewTree::new(TreeConfig::new(columns, false));
        let mut batch = ChangeBatch::new("o1");
        for (id, last) in [(1, "Abbott"), (2, "Zeller"), (3, "Meyer")] {
            batch.add(RowChange::new(
                id,
                format!("u{id}"),
                RowSummary::new().with("Lastname", last).with("Firstname", "X"),
            ));
        }
        tree.apply_changes(&batch);

        assert_eq!(
            category_values(&tree),
            vec![
                Value::String("Zeller".into()),
                Value::String("Meyer".into()),
                Value::String("Abbott".into())
            ]
        );
    }

    #[test]
    fn test_snapshot_contents() {
        let mut tree = ViewTree::new(people_config());
        tree.apply_changes(&batch(
            "o1",
            &[(1, "Abbott", "Ed", 10.0), (2, "Abbott", "Al", 20.0)],
        ));

        let abbott = tree.find_category(&[Value::String("Abbott".into())]).unwrap();
        let snap = tree.snapshot(abbott).unwrap();
        let cat = snap.as_category().unwrap();
        assert_eq!(cat.value, Value::String("Abbott".into()));
        assert_eq!(cat.child_count, 2);
        assert_eq!(cat.descendant_docs, 2);
        assert_eq!(cat.sum("Amount"), Some(30.0));
        assert_eq!(cat.average("Amount"), Some(15.0));

        let ed = tree.document_id("o1", 1).unwrap();
        let snap = tree.snapshot(ed).unwrap();
        assert_eq!(snap.position().to_string(), "1.2");
        assert_eq!(snap.sibling_index(), 2);
        assert_eq!(snap.sibling_count(), 2);
        let doc = snap.as_document().unwrap();
        assert_eq!(doc.origin, "o1");
        assert_eq!(doc.external_key, "unid-1");
        assert_eq!(
            snap.column_value("Firstname"),
            Some(&Value::String("Ed".into()))
        );
    }

    #[test]
    fn test_multi_level_categories() {
        let columns = Arc::new(vec![
            ViewColumn::new("Country").category(),
            ViewColumn::new("City").category(),
            ViewColumn::new("Name").ascending(),
        ]);
        let mut tree = ViewTree::new(TreeConfig::new(columns, false));
        let mut batch = ChangeBatch::new("o1");
        for (id, country, city, name) in [
            (1, "DE", "Berlin", "Ada"),
            (2, "DE", "Munich", "Bea"),
            (3, "US", "Boston", "Cal"),
        ] {
            batch.add(RowChange::new(
                id,
                format!("u{id}"),
                RowSummary::new()
                    .with("Country", country)
                    .with("City", city)
                    .with("Name", name),
            ));
        }
        tree.apply_changes(&batch);

        assert_eq!(tree.category_count(), 5);
        let munich = tree
            .find_category(&[Value::String("DE".into()), Value::String("Munich".into())])
            .unwrap();
        assert_eq!(tree.position_of(munich).unwrap().to_string(), "1.2");
        assert_eq!(
            tree.entry(munich)
                .unwrap()
                .as_category()
                .unwrap()
                .descendant_docs(),
            1
        );
    }
}
