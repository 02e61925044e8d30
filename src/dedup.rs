//! Deduplicating collection
//!
//! A [`Collection`] is the insertion-ordered set of items gathered across
//! pages. No two elements share an `id`, and the first occurrence of an id
//! wins: later duplicates are dropped even if their payload differs.

use crate::types::Item;
use serde::{Serialize, Serializer};
use std::collections::HashSet;

/// Insertion-ordered, id-unique sequence of items
#[derive(Debug, Clone, Default)]
pub struct Collection {
    items: Vec<Item>,
    ids: HashSet<String>,
}

/// Result of merging a page into a collection
#[derive(Debug, Clone)]
pub struct Merge {
    /// The merged collection
    pub collection: Collection,
    /// How many incoming items were new
    pub admitted: usize,
}

impl Collection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from items, dropping duplicates
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut collection = Self::new();
        collection.extend_unique(items);
        collection
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether an id is present
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Items in order of first arrival
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Ids in order of first arrival
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.id.as_str())
    }

    /// Consume into the ordered items
    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Append every item whose id is not yet present, in incoming order
    ///
    /// Returns the number of admitted items.
    pub fn extend_unique(&mut self, incoming: impl IntoIterator<Item = Item>) -> usize {
        let before = self.items.len();
        for item in incoming {
            if self.ids.insert(item.id.clone()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    /// Owned variant of [`merge`]
    pub fn merge_in_place(&mut self, incoming: &[Item]) -> usize {
        let before = self.items.len();
        for item in incoming {
            if !self.ids.contains(&item.id) {
                self.ids.insert(item.id.clone());
                self.items.push(item.clone());
            }
        }
        self.items.len() - before
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

/// Merge a page into an existing collection without mutating it
///
/// The result is `existing` followed by every incoming item whose id is not
/// already present, keeping the incoming relative order.
pub fn merge(existing: &Collection, incoming: &[Item]) -> Merge {
    let mut collection = existing.clone();
    let admitted = collection.merge_in_place(incoming);
    Merge {
        collection,
        admitted,
    }
}
