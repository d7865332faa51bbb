//! No-good cache.
//!
//! Records (session, placement) choices whose subtree was exhausted, so
//! the search does not re-derive the same dead end after dynamic
//! reordering brings the session back. Entries are only valid while the
//! prefix of decisions they were derived under is still in place, so the
//! cache is depth-tagged and invalidated on backtracking.

use std::collections::HashMap;

use crate::model::Placement;

#[derive(Debug, Default)]
pub(crate) struct NoGoodCache {
    entries: HashMap<(usize, Placement), usize>,
}

impl NoGoodCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records that assigning `session` to `placement` under the decision
    /// prefix of length `depth` leads to failure.
    pub(crate) fn insert(&mut self, session: usize, placement: Placement, depth: usize) {
        self.entries.insert((session, placement), depth);
    }

    pub(crate) fn contains(&self, session: usize, placement: Placement) -> bool {
        self.entries.contains_key(&(session, placement))
    }

    /// Drops entries derived under a prefix longer than `depth`. Called
    /// when the decision at `depth` changes, which invalidates everything
    /// learned below it.
    pub(crate) fn invalidate_deeper_than(&mut self, depth: usize) {
        self.entries.retain(|_, d| *d <= depth);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
