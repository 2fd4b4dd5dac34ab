//! The virtual view: a locked tree index plus its configuration.
//!
//! A `VirtualView` owns the category/document tree behind one
//! read-write lock. `apply_changes` takes the lock exclusively for the
//! whole batch, so readers observe each batch all-or-nothing; navigator
//! cursors take shared access per produced entry.

use crate::change::{ApplyOutcome, ChangeBatch};
use crate::position::Position;
use crate::snapshot::EntrySnapshot;
use crate::tree::{TreeConfig, ViewTree};
use canopy_core::{Aggregation, Error, Result, ViewColumn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::collections::HashSet;
use std::sync::Arc;

/// An in-memory, categorized, sorted index over provider documents.
pub struct VirtualView {
    name: String,
    columns: Arc<Vec<ViewColumn>>,
    tree: RwLock<ViewTree>,
    /// Origins claimed through `register_origin`, for collision checks.
    registered: Mutex<HashSet<String>>,
}

impl VirtualView {
    /// Starts building a view with the given name.
    pub fn builder(name: impl Into<String>) -> VirtualViewBuilder {
        VirtualViewBuilder {
            name: name.into(),
            columns: Vec::new(),
            retain_empty_categories: false,
        }
    }

    /// Returns the view name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ordered column definitions.
    pub fn columns(&self) -> &[ViewColumn] {
        &self.columns
    }

    /// Claims an origin id for a provider.
    ///
    /// Two distinct providers claiming the same origin is a
    /// configuration error and fails fast.
    pub fn register_origin(&self, origin: &str) -> Result<()> {
        let mut registered = self.registered.lock();
        if !registered.insert(origin.to_string()) {
            return Err(Error::origin_collision(origin));
        }
        Ok(())
    }

    /// Applies one origin's change batch atomically.
    pub fn apply_changes(&self, batch: &ChangeBatch) -> ApplyOutcome {
        self.tree.write().apply_changes(batch)
    }

    /// Returns a snapshot of the synthetic root category, including the
    /// whole-view per-origin reader accumulation.
    pub fn root(&self) -> Option<EntrySnapshot> {
        let tree = self.tree.read();
        tree.snapshot(tree.root_id())
    }

    /// Resolves a tumbler position to an entry snapshot.
    pub fn entry_at(&self, position: &Position) -> Option<EntrySnapshot> {
        let tree = self.tree.read();
        let id = tree.entry_at(position)?;
        tree.snapshot(id)
    }

    /// Looks up a document entry by origin and row id.
    pub fn document_entry(&self, origin: &str, row_id: u64) -> Option<EntrySnapshot> {
        let tree = self.tree.read();
        let id = tree.document_id(origin, row_id)?;
        tree.snapshot(id)
    }

    /// Returns the total number of documents.
    pub fn document_count(&self) -> usize {
        self.tree.read().document_count()
    }

    /// Returns the number of categories, excluding the root.
    pub fn category_count(&self) -> usize {
        self.tree.read().category_count()
    }

    /// Takes shared access to the tree for one navigation step.
    ///
    /// Hold the guard only while producing a single entry; writers are
    /// blocked for the guard's lifetime.
    pub fn read(&self) -> RwLockReadGuard<'_, ViewTree> {
        self.tree.read()
    }
}

/// Builder for `VirtualView`; configuration errors fail at `build`.
pub struct VirtualViewBuilder {
    name: String,
    columns: Vec<ViewColumn>,
    retain_empty_categories: bool,
}

impl VirtualViewBuilder {
    /// Adds a column.
    pub fn column(mut self, column: ViewColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds several columns.
    pub fn columns(mut self, columns: impl IntoIterator<Item = ViewColumn>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Keeps categories whose last document was removed, with zeroed
    /// counts and aggregates.
    pub fn retain_empty_categories(mut self, retain: bool) -> Self {
        self.retain_empty_categories = retain;
        self
    }

    /// Validates the configuration and builds the view.
    pub fn build(self) -> Result<VirtualView> {
        if self.columns.is_empty() {
            return Err(Error::invalid_config("view has no columns"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.item_name().to_string()) {
                return Err(Error::invalid_config(format!(
                    "duplicate column item name: {}",
                    column.item_name()
                )));
            }
            if column.is_category() && column.aggregation_kind() != Aggregation::None {
                return Err(Error::invalid_config(format!(
                    "category column cannot aggregate: {}",
                    column.item_name()
                )));
            }
        }

        let columns = Arc::new(self.columns);
        let config = TreeConfig::new(columns.clone(), self.retain_empty_categories);
        Ok(VirtualView {
            name: self.name,
            columns,
            tree: RwLock::new(ViewTree::new(config)),
            registered: Mutex::new(HashSet::new()),
        })
    }
}
