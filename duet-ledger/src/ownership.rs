use duet_core::ItemId;
use serde::{Deserialize, Serialize};

/// One account's owned items in acquisition order.
///
/// The same sequence serves two access patterns: the back is the burn stack
/// (the most recently acquired item is evicted first), and enumeration
/// queries sort a copy on demand because acquisition order and identifier
/// order are unrelated. Removal by identifier shifts the remainder instead of
/// swapping the last element in, so the relative acquisition order of the
/// remaining items survives direct transfers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedStack {
    ids: Vec<ItemId>,
}

impl OwnedStack {
    pub fn new() -> Self {
        Self { ids: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Record a newly acquired item
    pub fn push(&mut self, id: ItemId) {
        self.ids.push(id);
    }

    /// Evict the most recently acquired item
    pub fn pop(&mut self) -> Option<ItemId> {
        self.ids.pop()
    }

    /// The next burn candidate, without removing it
    pub fn top(&self) -> Option<ItemId> {
        self.ids.last().copied()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    /// Position of an item in acquisition order
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.ids.iter().position(|owned| *owned == id)
    }

    /// Remove an item by identifier, preserving the order of the rest.
    /// Returns the index it occupied.
    pub fn remove(&mut self, id: ItemId) -> Option<usize> {
        let index = self.position(id)?;
        self.ids.remove(index);
        Some(index)
    }

    /// Reinsert an item at a given index (rollback path)
    pub(crate) fn insert(&mut self, index: usize, id: ItemId) {
        self.ids.insert(index, id);
    }

    /// The items in acquisition order
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    /// The items in ascending identifier order, for enumeration
    pub fn sorted_ids(&self) -> Vec<ItemId> {
        let mut sorted = self.ids.clone();
        sorted.sort();
        sorted
    }
}
