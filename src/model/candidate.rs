//! Candidate timetables.
//!
//! A [`Candidate`] is one complete trial assignment of every session to a
//! (slot, room) placement. Candidates are owned exclusively by whichever
//! search created them; crossover and mutation produce new candidates
//! rather than aliasing parents.

/// One (slot, room) placement.
///
/// Both fields are indices into the owning
/// [`Problem`](crate::problem::Problem)'s slot catalog and room list, not
/// entity ids. `slot` is the starting slot; a session of duration `d`
/// occupies slots `slot..slot + d`, which a valid placement keeps within
/// one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    pub slot: usize,
    pub room: usize,
}

impl Placement {
    pub fn new(slot: usize, room: usize) -> Self {
        Self { slot, room }
    }
}

/// A complete assignment of every session to a placement, with its cost
/// cached once evaluated.
///
/// The cache is invalidated by any write access to a placement, so a
/// stored cost always describes the current assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    placements: Vec<Placement>,
    cost: Option<f64>,
}

impl Candidate {
    /// Builds a candidate from one placement per session, in session
    /// order.
    pub fn new(placements: Vec<Placement>) -> Self {
        Self {
            placements,
            cost: None,
        }
    }

    /// Number of sessions in the assignment.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// The placement of session `idx`.
    pub fn placement(&self, idx: usize) -> Placement {
        self.placements[idx]
    }

    /// All placements in session order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Reassigns session `idx`, invalidating the cached cost.
    pub fn set_placement(&mut self, idx: usize, placement: Placement) {
        self.placements[idx] = placement;
        self.cost = None;
    }

    /// The cached cost, if this candidate has been evaluated since its
    /// last modification.
    pub fn cached_cost(&self) -> Option<f64> {
        self.cost
    }

    /// Records an evaluation result.
    pub fn set_cost(&mut self, cost: f64) {
        self.cost = Some(cost);
    }

    /// The cached cost, treating never-evaluated candidates as worst
    /// possible so they lose every comparison.
    pub fn cost_or_worst(&self) -> f64 {
        self.cost.unwrap_or(f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_placement_invalidates_cached_cost() {
        let mut c = Candidate::new(vec![Placement::new(0, 0), Placement::new(1, 0)]);
        c.set_cost(12.5);
        assert_eq!(c.cached_cost(), Some(12.5));

        c.set_placement(1, Placement::new(2, 0));
        assert_eq!(c.cached_cost(), None);
        assert_eq!(c.cost_or_worst(), f64::INFINITY);
    }

    #[test]
    fn placements_keep_session_order() {
        let c = Candidate::new(vec![Placement::new(3, 1), Placement::new(0, 2)]);
        assert_eq!(c.placement(0), Placement::new(3, 1));
        assert_eq!(c.placement(1), Placement::new(0, 2));
        assert_eq!(c.len(), 2);
    }
}
