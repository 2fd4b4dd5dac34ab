//! Canopy - an in-memory virtual view engine.
//!
//! Canopy builds a categorized, multi-column-sorted, tree-shaped index
//! ("virtual view") over documents pulled from independent data sources
//! ("origins"), and lets callers navigate, filter and incrementally
//! refresh that index without re-reading all source data on every
//! change.
//!
//! The pieces, leaf first:
//!
//! - [`ViewColumn`] describes one output field: its source, whether it
//!   is a category level, its sort direction and aggregation kind
//! - [`VirtualView`] owns the category/document tree and applies
//!   per-origin [`ChangeBatch`]es atomically, keeping per-category
//!   counts, sums and reader lists consistent
//! - [`Navigator`] is a configuration-fixed read cursor factory:
//!   ordered forward/backward traversal, expand/collapse, selection,
//!   key and range lookups, and reader-list access filtering
//! - [`DataProvider`] adapters pull rows from external record sources
//!   since their own checkpoints and feed one origin each
//! - [`ViewRegistry`] caches views by `(name, version)` with build-once
//!   semantics and idle-based eviction
//!
//! # Example
//!
//! ```rust
//! use canopy::{
//!     DataProvider, MemorySource, Navigator, RecordSourceProvider, RowSummary, ViewColumn,
//!     VirtualView,
//! };
//! use std::sync::Arc;
//!
//! let view = Arc::new(
//!     VirtualView::builder("people")
//!         .column(ViewColumn::new("Lastname").category())
//!         .column(ViewColumn::new("Firstname").ascending())
//!         .build()
//!         .unwrap(),
//! );
//!
//! let mut source = MemorySource::new();
//! source.upsert(1, "unid-1", RowSummary::new()
//!     .with("Lastname", "Abbott")
//!     .with("Firstname", "Al"));
//!
//! let mut provider = RecordSourceProvider::new("crm", source);
//! provider.init(&view).unwrap();
//! provider.update(&view).unwrap();
//!
//! let mut nav = Navigator::builder(view).build().unwrap();
//! nav.expand_all();
//! let entries: Vec<_> = nav.entries_forward(false).collect();
//! assert_eq!(entries.len(), 2);
//! ```

pub use canopy_core::{
    Aggregation, ColumnFn, Error, KeyComparator, Order, Result, RowSummary, Value, ValueKind,
    ValueSource, ViewColumn,
};
pub use canopy_nav::{AccessCheck, ChildDocuments, Entries, Navigator, NavigatorBuilder};
pub use canopy_provider::{
    update_all, DataProvider, KeysetProvider, MemorySource, ProfileProvider, RecordSource,
    RecordSourceProvider, SourceChanges, SourceRecord,
};
pub use canopy_registry::ViewRegistry;
pub use canopy_view::{
    ApplyOutcome, CategorySnapshot, ChangeBatch, ColumnAggregate, DocumentSnapshot, EntrySnapshot,
    OriginReadersSnapshot, Position, RowChange, RowSkip, SnapshotKind, VirtualView,
    VirtualViewBuilder, READERS_ITEM,
};
