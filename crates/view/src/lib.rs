//! Canopy View - Categorized tree index for the Canopy view engine.
//!
//! This crate owns the view tree: a categorized, multi-column-sorted,
//! in-memory index over documents pulled from independent origins. It
//! provides:
//!
//! - `VirtualView`: the locked tree plus column configuration
//! - `ChangeBatch` / `ApplyOutcome`: per-origin change application
//! - `Position`: dotted-tumbler positions ("1.2.3")
//! - `EntrySnapshot`: immutable value copies handed to readers
//! - per-category aggregates and per-origin reader accumulation,
//!   maintained incrementally as batches are applied
//!
//! # Example
//!
//! ```rust
//! use canopy_core::{RowSummary, ViewColumn};
//! use canopy_view::{ChangeBatch, RowChange, VirtualView};
//!
//! let view = VirtualView::builder("people")
//!     .column(ViewColumn::new("Lastname").category())
//!     .column(ViewColumn::new("Firstname").ascending())
//!     .build()
//!     .unwrap();
//!
//! let mut batch = ChangeBatch::new("crm");
//! batch.add(RowChange::new(
//!     1,
//!     "unid-1",
//!     RowSummary::new()
//!         .with("Lastname", "Abbott")
//!         .with("Firstname", "Al"),
//! ));
//! let outcome = view.apply_changes(&batch);
//!
//! assert_eq!(outcome.applied, 1);
//! assert_eq!(view.document_count(), 1);
//! assert_eq!(view.category_count(), 1);
//! ```

mod aggregate;
mod change;
mod entry;
mod position;
mod readers;
mod snapshot;
mod tree;
mod view;

pub use aggregate::Aggregates;
pub use change::{ApplyOutcome, ChangeBatch, RowChange, RowSkip, READERS_ITEM};
pub use entry::{CategoryData, DocumentData, Entry, EntryId, EntryKind, OriginId, ROOT};
pub use position::Position;
pub use readers::{OriginReaders, ReaderAccumulator};
pub use snapshot::{
    CategorySnapshot, ColumnAggregate, DocumentSnapshot, EntrySnapshot, OriginReadersSnapshot,
    SnapshotKind,
};
pub use tree::ViewTree;
pub use view::{VirtualView, VirtualViewBuilder};
