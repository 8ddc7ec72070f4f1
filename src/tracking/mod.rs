//! Novelty detection across polling cycles.
//!
//! One [`KnownIds`] tracker exists per entity kind (zones, SOS signals). Each
//! successful cycle replaces the remembered set wholesale with the ids of the
//! current snapshot, so an id that disappears and later comes back is reported
//! as new again.

use crate::model::Identified;
use std::collections::HashSet;


/// Result of comparing one snapshot against the remembered ids
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Newly observed ids, in snapshot order. Always empty on the initial load.
    pub new_ids: Vec<String>,

    /// Ids remembered from the previous cycle that are no longer present
    pub removed_ids: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.new_ids.is_empty() && self.removed_ids.is_empty()
    }
}

/// Pure set difference: `(new ids in snapshot order, exactly the current ids)`.
pub fn detect<'a, I>(previous: &HashSet<String>, current: I) -> (Vec<String>, HashSet<String>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut new_ids = Vec::new();
    let mut updated = HashSet::new();

    for id in current {
        // Duplicate ids inside one snapshot are reported once
        if updated.insert(id.to_string()) && !previous.contains(id) {
            new_ids.push(id.to_string());
        }
    }

    (new_ids, updated)
}

/// Remembered ids for one entity kind, plus the initial-load flag.
#[derive(Debug)]
pub struct KnownIds {
    kind: &'static str,
    ids: HashSet<String>,
    initial_load: bool,
}

impl KnownIds {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            ids: HashSet::new(),
            initial_load: true,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// True until the first successful [`observe`](Self::observe)
    pub fn is_initial_load(&self) -> bool {
        self.initial_load
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Diff a successfully fetched snapshot and replace the remembered set.
    ///
    /// Must only be called with a complete snapshot; a failed fetch should
    /// skip the call entirely so the previous set carries over.
    pub fn observe<T: Identified>(&mut self, entities: &[T]) -> ChangeSet {
        let (new_ids, updated) = detect(&self.ids, entities.iter().map(|e| e.id()));

        let mut removed_ids: Vec<String> = self
            .ids
            .iter()
            .filter(|id| !updated.contains(*id))
            .cloned()
            .collect();
        removed_ids.sort();

        self.ids = updated;

        if self.initial_load {
            self.initial_load = false;
            return ChangeSet {
                new_ids: Vec::new(),
                removed_ids,
            };
        }

        ChangeSet {
            new_ids,
            removed_ids,
        }
    }

    /// Forget everything, including the initial-load flag (used on logout)
    pub fn reset(&mut self) {
        self.ids.clear();
        self.initial_load = true;
    }
}
