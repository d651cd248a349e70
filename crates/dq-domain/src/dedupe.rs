//! Entity deduplication
//!
//! Overlapping refetches and merged pages can yield the same entity twice.
//! [`dedupe`] restores the one-entity-per-id guarantee: the last value seen
//! for an id wins, ids keep the position of their first occurrence.

use indexmap::IndexMap;
use std::hash::Hash;

/// Entity with a stable identity
pub trait Identified {
    /// Identity key type
    type Id: Eq + Hash + Clone;

    /// Identity of this entity
    fn id(&self) -> &Self::Id;
}

/// Deduplicate by identity
#[must_use]
pub fn dedupe<T, I>(items: I) -> Vec<T>
where
    T: Identified,
    I: IntoIterator<Item = T>,
{
    let mut by_id: IndexMap<T::Id, T> = IndexMap::new();
    for item in items {
        // insert keeps the original slot and overwrites the value
        by_id.insert(item.id().clone(), item);
    }
    by_id.into_values().collect()
}
