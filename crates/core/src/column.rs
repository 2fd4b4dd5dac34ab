//! Column definitions for the Canopy view engine.

use crate::collate::Order;
use crate::summary::RowSummary;
use crate::value::Value;
use core::fmt;
use std::sync::Arc;

/// A named pure function computing a column value from a row.
///
/// Arguments are `(origin, item_name, row)`. The function must be a pure,
/// side-effect-free function of its inputs.
pub type ColumnFn = Arc<dyn Fn(&str, &str, &RowSummary) -> Value + Send + Sync>;

/// Where a column's value comes from.
#[derive(Clone)]
pub enum ValueSource {
    /// A static field looked up in the row summary by name.
    Field(String),
    /// A formula, pre-evaluated by the provider into the row summary
    /// under the column's item name. The expression itself is opaque to
    /// the engine.
    Formula(String),
    /// A custom function invoked with `(origin, item_name, row)`.
    Function(ColumnFn),
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Field(name) => f.debug_tuple("Field").field(name).finish(),
            ValueSource::Formula(expr) => f.debug_tuple("Formula").field(expr).finish(),
            ValueSource::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// How a column aggregates over a category's descendant documents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Aggregation {
    /// No aggregation.
    #[default]
    None,
    /// Running sum of numeric values.
    Sum,
    /// Average derived from the running sum and contribution count.
    Average,
}

/// A column definition in a view.
///
/// Exactly the columns marked as categories, in declaration order,
/// determine the category path (and therefore the tree depth).
#[derive(Clone, Debug)]
pub struct ViewColumn {
    /// Display title.
    title: String,
    /// Item name the column value is stored under.
    item_name: String,
    /// Whether this column is a category level.
    is_category: bool,
    /// Whether this column is hidden from rendering.
    is_hidden: bool,
    /// Sort direction, if this column participates in sibling ordering.
    sort: Option<Order>,
    /// Aggregation kind.
    aggregation: Aggregation,
    /// Value source.
    source: ValueSource,
}

impl ViewColumn {
    /// Creates a new column reading the static field named `item_name`.
    pub fn new(item_name: impl Into<String>) -> Self {
        let item_name = item_name.into();
        Self {
            title: item_name.clone(),
            source: ValueSource::Field(item_name.clone()),
            item_name,
            is_category: false,
            is_hidden: false,
            sort: None,
            aggregation: Aggregation::None,
        }
    }

    /// Sets the display title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Marks this column as a category level. Category columns default to
    /// ascending order when no sort was set.
    pub fn category(mut self) -> Self {
        self.is_category = true;
        if self.sort.is_none() {
            self.sort = Some(Order::Asc);
        }
        self
    }

    /// Sets whether this column is hidden.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.is_hidden = hidden;
        self
    }

    /// Sets the sort direction.
    pub fn sort(mut self, order: Order) -> Self {
        self.sort = Some(order);
        self
    }

    /// Sorts this column ascending.
    pub fn ascending(self) -> Self {
        self.sort(Order::Asc)
    }

    /// Sorts this column descending.
    pub fn descending(self) -> Self {
        self.sort(Order::Desc)
    }

    /// Sets the aggregation kind.
    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Aggregates this column as a running sum.
    pub fn total(self) -> Self {
        self.aggregation(Aggregation::Sum)
    }

    /// Aggregates this column as an average.
    pub fn average(self) -> Self {
        self.aggregation(Aggregation::Average)
    }

    /// Reads the value from a different static field.
    pub fn from_field(mut self, field: impl Into<String>) -> Self {
        self.source = ValueSource::Field(field.into());
        self
    }

    /// Marks the value as produced by a provider-evaluated formula.
    pub fn from_formula(mut self, expr: impl Into<String>) -> Self {
        self.source = ValueSource::Formula(expr.into());
        self
    }

    /// Computes the value with a custom function.
    pub fn computed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, &RowSummary) -> Value + Send + Sync + 'static,
    {
        self.source = ValueSource::Function(Arc::new(f));
        self
    }

    /// Returns the display title.
    #[inline]
    pub fn column_title(&self) -> &str {
        &self.title
    }

    /// Returns the item name.
    #[inline]
    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    /// Returns whether this column is a category level.
    #[inline]
    pub fn is_category(&self) -> bool {
        self.is_category
    }

    /// Returns whether this column is hidden.
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    /// Returns the sort direction, if any.
    #[inline]
    pub fn sort_order(&self) -> Option<Order> {
        self.sort
    }

    /// Returns the aggregation kind.
    #[inline]
    pub fn aggregation_kind(&self) -> Aggregation {
        self.aggregation
    }

    /// Returns the value source.
    #[inline]
    pub fn source(&self) -> &ValueSource {
        &self.source
    }

    /// Evaluates this column against a row.
    ///
    /// Static fields are looked up directly; formula values are assumed to
    /// have been pre-evaluated by the provider into the summary under the
    /// column's item name; custom functions are invoked.
    pub fn evaluate(&self, origin: &str, row: &RowSummary) -> Value {
        match &self.source {
            ValueSource::Field(field) => row.get_as_value(field, Value::Null),
            ValueSource::Formula(_) => row.get_as_value(&self.item_name, Value::Null),
            ValueSource::Function(f) => f(origin, &self.item_name, row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_new() {
        let col = ViewColumn::new("Lastname");
        assert_eq!(col.item_name(), "Lastname");
        assert_eq!(col.column_title(), "Lastname");
        assert!(!col.is_category());
        assert!(!col.is_hidden());
        assert_eq!(col.sort_order(), None);
        assert_eq!(col.aggregation_kind(), Aggregation::None);
    }

    #[test]
    fn test_column_builder() {
        let col = ViewColumn::new("Amount")
            .title("Total amount")
            .descending()
            .total()
            .hidden(true);

        assert_eq!(col.column_title(), "Total amount");
        assert_eq!(col.sort_order(), Some(Order::Desc));
        assert_eq!(col.aggregation_kind(), Aggregation::Sum);
        assert!(col.is_hidden());
    }

    #[test]
    fn test_category_defaults_to_ascending() {
        let col = ViewColumn::new("Lastname").category();
        assert!(col.is_category());
        assert_eq!(col.sort_order(), Some(Order::Asc));

        let col = ViewColumn::new("Lastname").descending().category();
        assert_eq!(col.sort_order(), Some(Order::Desc));
    }

    #[test]
    fn test_evaluate_field() {
        let row = RowSummary::new().with("Lastname", "Abbott");
        let col = ViewColumn::new("Lastname");
        assert_eq!(col.evaluate("o1", &row), Value::String("Abbott".into()));

        let aliased = ViewColumn::new("Name").from_field("Lastname");
        assert_eq!(aliased.evaluate("o1", &row), Value::String("Abbott".into()));
    }

    #[test]
    fn test_evaluate_formula_reads_item_name() {
        // The provider pre-evaluates the formula into the summary under
        // the column's item name.
        let row = RowSummary::new().with("FullName", "Al Abbott");
        let col = ViewColumn::new("FullName").from_formula("Firstname + \" \" + Lastname");
        assert_eq!(col.evaluate("o1", &row), Value::String("Al Abbott".into()));
    }

    #[test]
    fn test_evaluate_function() {
        let row = RowSummary::new().with("Lastname", "abbott");
        let col = ViewColumn::new("Initial").computed(|_origin, _item, row| {
            let name = row.get_as_string("Lastname", "").unwrap_or_default();
            Value::String(name.chars().take(1).collect::<String>().to_uppercase())
        });
        assert_eq!(col.evaluate("o1", &row), Value::String("A".into()));
    }

    #[test]
    fn test_evaluate_missing_field_is_null() {
        let row = RowSummary::new();
        let col = ViewColumn::new("Lastname");
        assert!(col.evaluate("o1", &row).is_null());
    }
}
