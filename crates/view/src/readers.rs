//! Reader-list accumulation per category.
//!
//! Each category accumulates, per origin, who can see at least one
//! descendant document from that origin. The accumulator is counted (a
//! multiset of principal names plus a world-readable document count) so
//! removals subtract exactly; applying a batch from one origin never
//! touches, let alone rebuilds, another origin's slice.

use crate::entry::OriginId;
use hashbrown::HashMap;
use std::collections::{BTreeMap, BTreeSet};

/// Counted reader accumulation for one origin's documents in a subtree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OriginReaders {
    /// Documents from this origin with no reader restriction.
    world_count: usize,
    /// Principal name → number of restricted documents naming it.
    principals: BTreeMap<String, usize>,
}

impl OriginReaders {
    /// Returns true if at least one document is world-readable.
    #[inline]
    pub fn is_world_visible(&self) -> bool {
        self.world_count > 0
    }

    /// Returns the world-readable document count.
    #[inline]
    pub fn world_count(&self) -> usize {
        self.world_count
    }

    /// Returns the accumulated principal names.
    pub fn principals(&self) -> impl Iterator<Item = &str> {
        self.principals.keys().map(|s| s.as_str())
    }

    /// Returns true if any of `principals` can see a document from this
    /// origin in the subtree.
    pub fn visible_to(&self, principals: &BTreeSet<String>) -> bool {
        self.world_count > 0 || principals.iter().any(|p| self.principals.contains_key(p))
    }

    fn is_empty(&self) -> bool {
        self.world_count == 0 && self.principals.is_empty()
    }
}

/// Per-origin reader accumulation for one category subtree.
#[derive(Clone, Debug, Default)]
pub struct ReaderAccumulator {
    by_origin: HashMap<OriginId, OriginReaders>,
    /// Unrestricted documents across all origins; lets "is anything
    /// world-readable here" be answered without scanning origins.
    world_docs: usize,
}

impl ReaderAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates one document's reader list for its origin.
    /// `readers: None` means the document is world-readable.
    pub fn add(&mut self, origin: OriginId, readers: Option<&BTreeSet<String>>) {
        let slot = self.by_origin.entry(origin).or_default();
        match readers {
            None => {
                slot.world_count += 1;
                self.world_docs += 1;
            }
            Some(names) => {
                for name in names {
                    *slot.principals.entry(name.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    /// Subtracts one document's reader list from its origin slice.
    pub fn subtract(&mut self, origin: OriginId, readers: Option<&BTreeSet<String>>) {
        let Some(slot) = self.by_origin.get_mut(&origin) else {
            return;
        };
        match readers {
            None => {
                slot.world_count = slot.world_count.saturating_sub(1);
                self.world_docs = self.world_docs.saturating_sub(1);
            }
            Some(names) => {
                for name in names {
                    if let Some(count) = slot.principals.get_mut(name) {
                        *count -= 1;
                        if *count == 0 {
                            slot.principals.remove(name);
                        }
                    }
                }
            }
        }
        if slot.is_empty() {
            self.by_origin.remove(&origin);
        }
    }

    /// Returns true if at least one document in the subtree is
    /// world-readable.
    #[inline]
    pub fn is_world_visible(&self) -> bool {
        self.world_docs > 0
    }

    /// Returns true if any of `principals` can see at least one
    /// document in the subtree, from any origin.
    pub fn visible_to(&self, principals: &BTreeSet<String>) -> bool {
        self.world_docs > 0
            || self
                .by_origin
                .values()
                .any(|slot| slot.visible_to(principals))
    }

    /// Returns the accumulation for one origin, if any document from it
    /// is present in the subtree.
    pub fn origin(&self, origin: OriginId) -> Option<&OriginReaders> {
        self.by_origin.get(&origin)
    }

    /// Iterates over (origin, accumulation) pairs.
    pub fn origins(&self) -> impl Iterator<Item = (OriginId, &OriginReaders)> {
        self.by_origin.iter().map(|(&id, slot)| (id, slot))
    }

    /// Returns true if nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.by_origin.is_empty()
    }

    /// Resets the accumulator.
    pub fn clear(&mut self) {
        self.by_origin.clear();
        self.world_docs = 0;
    }
}
