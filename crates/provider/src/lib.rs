//! Canopy Provider - Source adapters feeding Canopy virtual views.
//!
//! A `DataProvider` pulls new, changed and deleted rows from an
//! external record source since its own last-seen checkpoint, and
//! applies them to a view as one origin-tagged batch. Three adapters
//! are provided:
//!
//! - `RecordSourceProvider`: the usual incremental query adapter over a
//!   `RecordSource`, with a sequence checkpoint
//! - `KeysetProvider`: a fixed, explicit row id set, diffed per update
//! - `ProfileProvider`: derived profile records with synthesized rows
//!
//! `MemorySource` is the in-memory reference implementation of the
//! `RecordSource` contract.
//!
//! # Example
//!
//! ```rust
//! use canopy_core::{RowSummary, ViewColumn};
//! use canopy_provider::{DataProvider, MemorySource, RecordSourceProvider};
//! use canopy_view::VirtualView;
//!
//! let view = VirtualView::builder("people")
//!     .column(ViewColumn::new("Lastname").category())
//!     .column(ViewColumn::new("Firstname").ascending())
//!     .build()
//!     .unwrap();
//!
//! let mut source = MemorySource::new();
//! source.upsert(1, "unid-1", RowSummary::new()
//!     .with("Lastname", "Abbott")
//!     .with("Firstname", "Al"));
//!
//! let mut provider = RecordSourceProvider::new("crm", source);
//! provider.init(&view).unwrap();
//! let outcome = provider.update(&view).unwrap();
//!
//! assert_eq!(outcome.applied, 1);
//! assert_eq!(view.document_count(), 1);
//! ```

mod provider;
mod source;

pub use provider::{
    update_all, DataProvider, KeysetProvider, ProfileProvider, RecordSourceProvider,
};
pub use source::{MemorySource, RecordSource, SourceChanges, SourceRecord};
