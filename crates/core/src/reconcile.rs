//! Set reconciliation for tags and source-product links.
//!
//! An update never replaces the whole relation: it computes which entries
//! must be created and which must be deleted and applies only that delta.
//! Applying the same target list twice therefore changes nothing the
//! second time.

use std::collections::HashSet;
use std::hash::Hash;

/// Entries to create and to delete to turn `existing` into `incoming`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<T> {
    pub create: Vec<T>,
    pub delete: Vec<T>,
}

impl<T> Delta<T> {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }
}

impl<T> Default for Delta<T> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            delete: Vec::new(),
        }
    }
}

/// Full reconciliation: the result is exactly the symmetric difference of
/// the two sets, split by side.
///
/// Order follows the inputs; duplicates in `incoming` are created once.
pub fn reconcile<T>(existing: &[T], incoming: &[T]) -> Delta<T>
where
    T: Eq + Hash + Clone,
{
    let incoming_set: HashSet<&T> = incoming.iter().collect();
    let delete = existing
        .iter()
        .filter(|item| !incoming_set.contains(item))
        .cloned()
        .collect();

    Delta {
        create: additions(existing, incoming),
        delete,
    }
}

/// Entries of `incoming` missing from `existing`, de-duplicated.
pub fn additions<T>(existing: &[T], incoming: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen: HashSet<&T> = existing.iter().collect();
    incoming
        .iter()
        .filter(|item| seen.insert(*item))
        .cloned()
        .collect()
}

/// Entries of `existing` that `incoming` asks to remove.
pub fn removals<T>(existing: &[T], incoming: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let incoming_set: HashSet<&T> = incoming.iter().collect();
    existing
        .iter()
        .filter(|item| incoming_set.contains(item))
        .cloned()
        .collect()
}
