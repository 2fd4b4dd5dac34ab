//! Collation for view sort keys.
//!
//! This module provides the sort order type and the multi-column key
//! comparator used to keep siblings in a view tree ordered.

use crate::value::Value;
use core::cmp::Ordering;

/// Sort order for a view column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// Ascending order (smallest first)
    Asc,
    /// Descending order (largest first)
    Desc,
}

impl Order {
    /// Applies this order to a comparison result.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        }
    }
}

/// A comparator for multi-column sort keys (composite keys).
#[derive(Clone, Debug, Default)]
pub struct KeyComparator {
    orders: Vec<Order>,
}

impl KeyComparator {
    /// Creates a new comparator with the given per-column orders.
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }

    /// Returns the orders of this comparator.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Returns the number of key columns.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Returns true if this comparator has no key columns.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Compares two composite keys column by column.
    ///
    /// A missing component sorts before a present one under ascending
    /// order (and after it under descending order).
    pub fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (i, order) in self.orders.iter().enumerate() {
            let cmp = match (a.get(i), b.get(i)) {
                (Some(av), Some(bv)) => av.cmp(bv),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if cmp != Ordering::Equal {
                return order.apply(cmp);
            }
        }
        Ordering::Equal
    }

    /// Compares a full key against a shorter probe key, only over the
    /// probe's components. Used for partial-key lookups.
    pub fn compare_prefix(&self, key: &[Value], probe: &[Value]) -> Ordering {
        for (i, order) in self.orders.iter().enumerate().take(probe.len()) {
            let cmp = match (key.get(i), probe.get(i)) {
                (Some(kv), Some(pv)) => kv.cmp(pv),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if cmp != Ordering::Equal {
                return order.apply(cmp);
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[&str]) -> Vec<Value> {
        parts.iter().map(|s| Value::String((*s).into())).collect()
    }

    #[test]
    fn test_order_apply() {
        assert_eq!(Order::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(Order::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Order::Desc.apply(Ordering::Equal), Ordering::Equal);
    }

    #[test]
    fn test_compare_single_column() {
        let cmp = KeyComparator::new(vec![Order::Asc]);
        assert_eq!(cmp.compare(&key(&["a"]), &key(&["b"])), Ordering::Less);

        let cmp = KeyComparator::new(vec![Order::Desc]);
        assert_eq!(cmp.compare(&key(&["a"]), &key(&["b"])), Ordering::Greater);
    }

    #[test]
    fn test_compare_multi_column() {
        let cmp = KeyComparator::new(vec![Order::Asc, Order::Desc]);
        // First column ties, second column decides in reverse
        assert_eq!(
            cmp.compare(&key(&["a", "x"]), &key(&["a", "y"])),
            Ordering::Greater
        );
        // First column decides
        assert_eq!(
            cmp.compare(&key(&["a", "x"]), &key(&["b", "x"])),
            Ordering::Less
        );
    }

    #[test]
    fn test_compare_missing_component() {
        let cmp = KeyComparator::new(vec![Order::Asc, Order::Asc]);
        assert_eq!(cmp.compare(&key(&["a"]), &key(&["a", "x"])), Ordering::Less);
        assert_eq!(cmp.compare(&key(&["a", "x"]), &key(&["a"])), Ordering::Greater);
    }

    #[test]
    fn test_compare_prefix() {
        let cmp = KeyComparator::new(vec![Order::Asc, Order::Asc]);
        // Probe shorter than the key: only the probe's columns count
        assert_eq!(
            cmp.compare_prefix(&key(&["a", "x"]), &key(&["a"])),
            Ordering::Equal
        );
        assert_eq!(
            cmp.compare_prefix(&key(&["b", "x"]), &key(&["a"])),
            Ordering::Greater
        );
    }
}
