//! Mutation.
//!
//! A mutation re-places one non-fixed session somewhere else in its
//! static domain, keeping the candidate hard-feasible: a sampled
//! placement that clashes with the rest of the assignment is rejected and
//! resampled, up to a bounded number of tries. Fixed sessions are never
//! touched.

use crate::domain::DomainSet;
use crate::model::Candidate;
use crate::problem::Problem;
use crate::rng::SearchRng;

/// Attempts one feasibility-preserving reassignment. Returns whether the
/// candidate changed.
pub fn mutate(
    problem: &Problem,
    domains: &DomainSet,
    candidate: &mut Candidate,
    rng: &mut SearchRng,
    max_tries: usize,
) -> bool {
    let free = problem.free_sessions();
    if free.is_empty() {
        return false;
    }
    let sidx = free[rng.gen_range(0..free.len())];
    let current = candidate.placement(sidx);
    let domain = domains.candidates(sidx);
    if domain.len() < 2 {
        return false;
    }

    for _ in 0..max_tries {
        let replacement = domain[rng.gen_range(0..domain.len())];
        if replacement == current {
            continue;
        }
        if !problem.placement_conflicts(candidate, sidx, replacement) {
            candidate.set_placement(sidx, replacement);
            return true;
        }
    }
    false
}
