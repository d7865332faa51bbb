//! # Fitness Evaluator
//!
//! Computes the scalar cost of a candidate timetable as a weighted sum of
//! soft-constraint penalties, plus an itemized violation list for
//! explainability. Lower cost is better.
//!
//! Every penalty function is a pure count over the candidate, so a whole
//! population can be evaluated in parallel. Hard-constraint clashes,
//! which can appear transiently on unrepaired offspring, are charged
//! [`HARD_VIOLATION_COST`] each; the constant is chosen to dominate any
//! realistic soft-penalty sum, so feasible candidates always outrank
//! infeasible ones in selection.
//!
//! The exact shape of each penalty (the gap penalty is linear in idle
//! slots, workload imbalance is a per-day variance) is a documented
//! default; the weights are per-request configuration, never process
//! state.

use rayon::prelude::*;

use crate::model::{
    BatchId, Candidate, ConstraintKind, ConstraintViolation, FacultyId, Severity,
};
use crate::problem::Problem;

/// Cost charged per hard violation. Dominates any soft-constraint sum a
/// real instance can produce.
pub const HARD_VIOLATION_COST: f64 = 1_000_000.0;

/// Populations below this size are evaluated sequentially.
const PARALLEL_THRESHOLD: usize = 32;

/// Per-request weights of the soft constraints.
///
/// Passed in at submission time and never stored globally. A weight of
/// zero disables its penalty.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SoftWeights {
    /// Per idle slot between a batch's first and last session of a day.
    pub idle_gap: f64,
    /// Per unit of per-day workload variance of a faculty member.
    pub workload_balance: f64,
    /// Per session placed outside its faculty's preferred windows.
    pub preference: f64,
    /// Per consecutive same-batch session pair that switches rooms.
    pub room_change: f64,
}

impl Default for SoftWeights {
    fn default() -> Self {
        Self {
            idle_gap: 1.0,
            workload_balance: 1.0,
            preference: 2.0,
            room_change: 0.5,
        }
    }
}

/// The result of evaluating one candidate.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub cost: f64,
    pub violations: Vec<ConstraintViolation>,
}

impl Evaluation {
    pub fn hard_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Hard)
            .count()
    }

    pub fn soft_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Soft)
            .count()
    }

    pub fn is_feasible(&self) -> bool {
        self.hard_count() == 0
    }
}

/// Evaluates candidates against a problem instance under configured
/// weights.
///
/// Evaluation is deterministic and side-effect-free: the same candidate
/// under the same weights always yields the same cost.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator<'p> {
    problem: &'p Problem,
    weights: SoftWeights,
}

impl<'p> FitnessEvaluator<'p> {
    pub fn new(problem: &'p Problem, weights: SoftWeights) -> Self {
        Self { problem, weights }
    }

    pub fn weights(&self) -> &SoftWeights {
        &self.weights
    }

    /// Full evaluation with itemized violations.
    pub fn evaluate(&self, candidate: &Candidate) -> Evaluation {
        let mut violations = self.hard_violations(candidate);
        let mut cost = violations.len() as f64 * HARD_VIOLATION_COST;

        cost += self.idle_gap_penalty(candidate, &mut violations);
        cost += self.workload_penalty(candidate, &mut violations);
        cost += self.preference_penalty(candidate, &mut violations);
        cost += self.room_change_penalty(candidate, &mut violations);

        Evaluation { cost, violations }
    }

    /// Scalar cost only.
    pub fn cost(&self, candidate: &Candidate) -> f64 {
        self.evaluate(candidate).cost
    }

    /// Fills the cached cost of every candidate that does not have one.
    /// Parallel above a small threshold, sequential below it.
    pub fn evaluate_population(&self, population: &mut [Candidate]) {
        let fill = |candidate: &mut Candidate| {
            if candidate.cached_cost().is_none() {
                let cost = self.cost(candidate);
                candidate.set_cost(cost);
            }
        };
        if population.len() >= PARALLEL_THRESHOLD {
            population.par_iter_mut().for_each(fill);
        } else {
            population.iter_mut().for_each(fill);
        }
    }

    /// Pairwise hard clashes in the candidate. Unary requirements (room
    /// kind, capacity, availability) hold by construction because every
    /// placement comes from the session's static domain.
    pub fn hard_violations(&self, candidate: &Candidate) -> Vec<ConstraintViolation> {
        let problem = self.problem;
        let mut violations = Vec::new();
        for a in 0..candidate.len() {
            for b in (a + 1)..candidate.len() {
                if let Some(kind) =
                    problem.clash(a, candidate.placement(a), b, candidate.placement(b))
                {
                    violations.push(ConstraintViolation::new(
                        kind,
                        vec![problem.session(a).id, problem.session(b).id],
                        format!(
                            "{} overlaps {}",
                            problem.describe_session(a),
                            problem.describe_session(b)
                        ),
                    ));
                }
            }
        }
        violations
    }

    /// Session indices involved in at least one hard clash. The repair
    /// pass re-places exactly these.
    pub fn conflicting_sessions(&self, candidate: &Candidate) -> Vec<usize> {
        let problem = self.problem;
        let mut involved = vec![false; candidate.len()];
        for a in 0..candidate.len() {
            for b in (a + 1)..candidate.len() {
                if problem
                    .clash(a, candidate.placement(a), b, candidate.placement(b))
                    .is_some()
                {
                    involved[a] = true;
                    involved[b] = true;
                }
            }
        }
        involved
            .into_iter()
            .enumerate()
            .filter_map(|(i, hit)| hit.then_some(i))
            .collect()
    }

    fn sorted_batches(&self) -> Vec<BatchId> {
        let mut batches: Vec<BatchId> = self.problem.active_batches().collect();
        batches.sort();
        batches
    }

    fn sorted_faculty(&self) -> Vec<FacultyId> {
        let mut faculty: Vec<FacultyId> = self.problem.active_faculty().collect();
        faculty.sort();
        faculty
    }

    /// Idle slots between the first and last session of each batch-day,
    /// summed linearly.
    fn idle_gap_penalty(
        &self,
        candidate: &Candidate,
        violations: &mut Vec<ConstraintViolation>,
    ) -> f64 {
        let problem = self.problem;
        let mut total = 0.0;
        for batch in self.sorted_batches() {
            // day -> (first covered slot, last covered slot, busy count)
            let mut per_day: Vec<(u8, usize, usize, usize)> = Vec::new();
            for &sidx in problem.sessions_of_batch(batch) {
                let placement = candidate.placement(sidx);
                let duration = problem.session(sidx).duration_slots;
                let day = problem.slot(placement.slot).day;
                let range = problem.covered(placement, duration);
                match per_day.iter_mut().find(|(d, ..)| *d == day) {
                    Some((_, first, last, busy)) => {
                        *first = (*first).min(range.start);
                        *last = (*last).max(range.end);
                        *busy += range.len();
                    }
                    None => per_day.push((day, range.start, range.end, range.len())),
                }
            }
            for (day, first, last, busy) in per_day {
                let span = last - first;
                let gap = span.saturating_sub(busy);
                if gap > 0 {
                    total += gap as f64;
                    violations.push(ConstraintViolation::new(
                        ConstraintKind::IdleGap,
                        Vec::new(),
                        format!(
                            "{} has {} idle slot(s) on day {}",
                            problem.batch_name(batch),
                            gap,
                            day
                        ),
                    ));
                }
            }
        }
        total * self.weights.idle_gap
    }

    /// Variance of per-day assigned slots for each faculty member, taken
    /// over the days present in the slot catalog.
    fn workload_penalty(
        &self,
        candidate: &Candidate,
        violations: &mut Vec<ConstraintViolation>,
    ) -> f64 {
        let problem = self.problem;
        let mut teaching_days: Vec<u8> = problem.slots().iter().map(|s| s.day).collect();
        teaching_days.dedup();
        if teaching_days.len() < 2 {
            return 0.0;
        }

        let mut total = 0.0;
        for faculty in self.sorted_faculty() {
            let mut hours: Vec<usize> = vec![0; teaching_days.len()];
            for &sidx in problem.sessions_of_faculty(faculty) {
                let placement = candidate.placement(sidx);
                let duration = problem.session(sidx).duration_slots as usize;
                let day = problem.slot(placement.slot).day;
                if let Some(pos) = teaching_days.iter().position(|&d| d == day) {
                    hours[pos] += duration;
                }
            }
            let n = hours.len() as f64;
            let mean = hours.iter().sum::<usize>() as f64 / n;
            let variance = hours
                .iter()
                .map(|&h| {
                    let d = h as f64 - mean;
                    d * d
                })
                .sum::<f64>()
                / n;
            if variance > 0.0 {
                total += variance;
                violations.push(ConstraintViolation::new(
                    ConstraintKind::WorkloadImbalance,
                    Vec::new(),
                    format!(
                        "{} has uneven daily load (variance {:.2})",
                        problem.faculty_name(faculty),
                        variance
                    ),
                ));
            }
        }
        total * self.weights.workload_balance
    }

    /// One count per session placed outside every declared preferred
    /// window of its faculty. Faculty with no declared windows contribute
    /// nothing.
    fn preference_penalty(
        &self,
        candidate: &Candidate,
        violations: &mut Vec<ConstraintViolation>,
    ) -> f64 {
        let problem = self.problem;
        let mut misses = 0usize;
        for (sidx, session) in problem.sessions().iter().enumerate() {
            let windows: Vec<_> = problem.preferences_of(session.faculty).collect();
            if windows.is_empty() {
                continue;
            }
            let placement = candidate.placement(sidx);
            let inside = problem
                .covered(placement, session.duration_slots)
                .all(|slot| windows.iter().any(|w| w.covers(problem.slot(slot))));
            if !inside {
                misses += 1;
                violations.push(ConstraintViolation::new(
                    ConstraintKind::PreferenceMiss,
                    vec![session.id],
                    format!(
                        "{} placed outside {}'s preferred windows",
                        problem.describe_session(sidx),
                        problem.faculty_name(session.faculty)
                    ),
                ));
            }
        }
        misses as f64 * self.weights.preference
    }

    /// One count per consecutive same-batch session pair on a day that
    /// switches rooms.
    fn room_change_penalty(
        &self,
        candidate: &Candidate,
        violations: &mut Vec<ConstraintViolation>,
    ) -> f64 {
        let problem = self.problem;
        let mut changes = 0usize;
        for batch in self.sorted_batches() {
            let mut placed: Vec<(usize, usize)> = problem
                .sessions_of_batch(batch)
                .iter()
                .map(|&sidx| (candidate.placement(sidx).slot, sidx))
                .collect();
            placed.sort_unstable();
            for pair in placed.windows(2) {
                let (slot_a, a) = pair[0];
                let (slot_b, b) = pair[1];
                let same_day = problem.slot(slot_a).day == problem.slot(slot_b).day;
                if same_day && candidate.placement(a).room != candidate.placement(b).room {
                    changes += 1;
                    violations.push(ConstraintViolation::new(
                        ConstraintKind::RoomChange,
                        vec![problem.session(a).id, problem.session(b).id],
                        format!(
                            "{} moves rooms between consecutive sessions",
                            problem.batch_name(batch)
                        ),
                    ));
                }
            }
        }
        changes as f64 * self.weights.room_change
    }
}
