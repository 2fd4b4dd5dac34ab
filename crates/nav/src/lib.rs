//! Canopy Nav - Read-only navigation over Canopy virtual views.
//!
//! A `Navigator` is a configuration-fixed cursor factory bound to one
//! `VirtualView`. Construction fixes which entry kinds are produced,
//! the effective reader principals (or a custom access predicate),
//! empty-category suppression and an optional category scope; expand/
//! collapse state and the selection set remain adjustable. Traversal is
//! synchronous and pull-based: every step takes the view's shared lock
//! for just that step, so writers interleave with long-lived cursors.
//!
//! # Example
//!
//! ```rust
//! use canopy_core::{RowSummary, ViewColumn};
//! use canopy_nav::Navigator;
//! use canopy_view::{ChangeBatch, RowChange, VirtualView};
//! use std::sync::Arc;
//!
//! let view = Arc::new(
//!     VirtualView::builder("people")
//!         .column(ViewColumn::new("Lastname").category())
//!         .column(ViewColumn::new("Firstname").ascending())
//!         .build()
//!         .unwrap(),
//! );
//! view.apply_changes(&ChangeBatch::new("crm").with_addition(RowChange::new(
//!     1,
//!     "unid-1",
//!     RowSummary::new()
//!         .with("Lastname", "Abbott")
//!         .with("Firstname", "Al"),
//! )));
//!
//! let mut nav = Navigator::builder(view).build().unwrap();
//! nav.expand_all();
//!
//! let entries: Vec<_> = nav.entries_forward(false).collect();
//! assert_eq!(entries.len(), 2); // the category and its document
//! assert!(entries[0].is_category());
//! assert_eq!(entries[1].position().to_string(), "1.1");
//! ```

mod cursor;
mod navigator;

pub use cursor::{ChildDocuments, Entries};
pub use navigator::{AccessCheck, Navigator, NavigatorBuilder};
