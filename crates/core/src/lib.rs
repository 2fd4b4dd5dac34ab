//! Canopy Core - Core types for the Canopy virtual view engine.
//!
//! This crate provides the foundational types shared by the view, navigator
//! and provider crates:
//!
//! - `Value`: runtime values a document field can hold
//! - `RowSummary`: a row's field map with typed, default-taking accessors
//! - `ViewColumn`: one output column (category level, sort, aggregation)
//! - `Order` / `KeyComparator`: multi-column collation
//! - `Error`: error types for view configuration and data access
//!
//! # Example
//!
//! ```rust
//! use canopy_core::{Order, RowSummary, Value, ViewColumn};
//!
//! // Define a category column and a sorted document column
//! let by_lastname = ViewColumn::new("Lastname").category();
//! let by_firstname = ViewColumn::new("Firstname").ascending();
//!
//! assert!(by_lastname.is_category());
//! assert_eq!(by_firstname.sort_order(), Some(Order::Asc));
//!
//! // Build a row summary and read it back with defaults
//! let row = RowSummary::new()
//!     .with("Lastname", "Abbott")
//!     .with("Firstname", "Al");
//!
//! assert_eq!(row.get_as_string("Lastname", "").unwrap(), "Abbott");
//! assert_eq!(row.get_as_string("Middlename", "n/a").unwrap(), "n/a");
//! assert_eq!(row.get("Firstname"), Some(&Value::String("Al".into())));
//! ```

mod collate;
mod column;
mod error;
mod summary;
mod value;

pub use collate::{KeyComparator, Order};
pub use column::{Aggregation, ColumnFn, ValueSource, ViewColumn};
pub use error::{Error, Result};
pub use summary::RowSummary;
pub use value::{Value, ValueKind};
