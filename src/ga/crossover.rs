//! Recombination.
//!
//! Children are produced by partitioning the session set along an axis
//! that does not depend on placements (per batch or per faculty) and
//! inheriting each partition wholesale from one parent or the other.
//! Clashes can only arise between sessions inherited from different
//! parents; the caller resolves them with the solver's repair pass.

use crate::model::{Candidate, Placement};
use crate::problem::Problem;
use crate::rng::SearchRng;

/// The session partitioning used for one mating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionAxis {
    /// All sessions of one batch come from the same parent.
    Batch,
    /// All sessions of one faculty member come from the same parent.
    Faculty,
}

impl PartitionAxis {
    /// Picks an axis uniformly at random.
    pub fn random(rng: &mut SearchRng) -> Self {
        if rng.gen_bool(0.5) {
            PartitionAxis::Batch
        } else {
            PartitionAxis::Faculty
        }
    }
}

/// Builds a child by inheriting each partition from parent `a` or parent
/// `b` with equal probability.
///
/// Fixed sessions carry the same placement in every feasible candidate,
/// so they are unchanged regardless of which parent a partition comes
/// from. The child may contain hard clashes between partitions taken
/// from different parents and is not evaluated here.
pub fn partition_crossover(
    problem: &Problem,
    a: &Candidate,
    b: &Candidate,
    axis: PartitionAxis,
    rng: &mut SearchRng,
) -> Candidate {
    let mut placements: Vec<Placement> = a.placements().to_vec();

    match axis {
        PartitionAxis::Batch => {
            let mut batches: Vec<_> = problem.active_batches().collect();
            batches.sort();
            for batch in batches {
                if rng.gen_bool(0.5) {
                    for &sidx in problem.sessions_of_batch(batch) {
                        placements[sidx] = b.placement(sidx);
                    }
                }
            }
        }
        PartitionAxis::Faculty => {
            let mut faculty: Vec<_> = problem.active_faculty().collect();
            faculty.sort();
            for member in faculty {
                if rng.gen_bool(0.5) {
                    for &sidx in problem.sessions_of_faculty(member) {
                        placements[sidx] = b.placement(sidx);
                    }
                }
            }
        }
    }

    Candidate::new(placements)
}
