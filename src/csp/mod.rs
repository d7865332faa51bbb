//! # CSP Feasibility Solver
//!
//! Backtracking search that produces complete assignments satisfying
//! every hard constraint: no faculty, batch, or room double-booked, room
//! capacity and kind respected, every session placed exactly once with
//! fixed classes pinned.
//!
//! The search runs over an explicit frame stack rather than recursion:
//! each decision point records the session it placed, a cursor into its
//! value order, and the trail of domain prunes its forward checking
//! performed, so backtracking is a cheap undo and cancellation
//! checkpoints fall naturally between frames. Sessions are chosen
//! most-constrained-first (smallest live domain, ties broken by
//! descending duration), and a depth-tagged no-good cache keeps dynamic
//! reordering from re-deriving dead ends it has already proven.
//!
//! Exhaustion is reported as proven infeasibility carrying the
//! conflicting constraint set from the deepest frontier the search
//! reached, which is what makes the failure actionable for the caller.
//! Running out of wall-clock budget is a distinct outcome.

mod conflict;
mod nogood;

pub use conflict::InfeasibilityReport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cancel::CancelToken;
use crate::domain::DomainSet;
use crate::error::{EngineError, Result};
use crate::model::{Candidate, ConstraintKind, ConstraintViolation, Placement};
use crate::problem::Problem;
use crate::rng::SearchRng;
use nogood::NoGoodCache;

/// Callback receiving coarse overall progress, 0 to 100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Frames between cancellation and deadline checks.
const CHECKPOINT_INTERVAL: u64 = 256;

/// Feasibility search over a problem instance and its static domains.
///
/// The solver itself is cheap to construct and holds only references and
/// run options; all search state lives per call.
pub struct CspSolver<'p> {
    problem: &'p Problem,
    domains: &'p DomainSet,
    budget: Option<Duration>,
    cancel: CancelToken,
    progress: Option<ProgressFn>,
}

impl<'p> CspSolver<'p> {
    pub fn new(problem: &'p Problem, domains: &'p DomainSet) -> Self {
        Self {
            problem,
            domains,
            budget: None,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Bounds the wall-clock time of each solve call.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Installs a cooperative cancellation token, checked between frames.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Installs a progress callback. Feasibility search maps its depth
    /// onto the 0 to 30 band of overall job progress.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Searches with the domain's deterministic value order.
    pub fn solve(&self) -> Result<Candidate> {
        self.run(None)
    }

    /// Searches with per-session value order shuffled by `rng`, producing
    /// a different feasible solution per seed. Used to diversify
    /// optimizer seeding.
    pub fn solve_shuffled(&self, rng: &mut SearchRng) -> Result<Candidate> {
        self.run(Some(rng))
    }

    fn run(&self, rng: Option<&mut SearchRng>) -> Result<Candidate> {
        let targets = self.problem.free_sessions();
        let mut preassigned = vec![None; self.problem.sessions().len()];
        for (sidx, placement) in self.problem.fixed_placements() {
            preassigned[sidx] = Some(placement);
        }
        debug!(
            sessions = self.problem.sessions().len(),
            free = targets.len(),
            "feasibility search started"
        );
        let started = Instant::now();
        let mut state = SearchState::new(self.problem, self.domains, preassigned, &targets, rng)?;
        let result = state.search(
            self.budget.map(|b| started + b),
            self.budget,
            &self.cancel,
            self.progress.as_ref(),
        );
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            steps = state.steps,
            outcome = result.is_ok(),
            "feasibility search finished"
        );
        result
    }

    /// Re-places `victims` within an otherwise complete assignment,
    /// holding every other session where `base` put it.
    ///
    /// This is the repair pass used after recombination: the caller
    /// identifies the sessions involved in hard clashes and this method
    /// re-resolves exactly those with the same forward-checking search.
    /// The victims must not include fixed sessions, and the non-victim
    /// remainder must be pairwise clash-free.
    pub fn repair(
        &self,
        base: &Candidate,
        victims: &[usize],
        rng: &mut SearchRng,
    ) -> Result<Candidate> {
        debug_assert!(victims.iter().all(|&v| !self.problem.is_fixed(v)));
        let mut preassigned: Vec<Option<Placement>> =
            base.placements().iter().copied().map(Some).collect();
        for &v in victims {
            preassigned[v] = None;
        }
        let mut state =
            SearchState::new(self.problem, self.domains, preassigned, victims, Some(rng))?;
        state.search(
            self.budget.map(|b| Instant::now() + b),
            self.budget,
            &self.cancel,
            None,
        )
    }
}

struct Frame {
    session: usize,
    cursor: usize,
    chosen: Option<usize>,
    trail: Vec<(usize, usize)>,
}

struct FailureSite {
    depth: usize,
    session: usize,
    /// Distinct (clash kind, other session) pairs that emptied the domain.
    causes: Vec<(ConstraintKind, usize)>,
}

struct SearchState<'p> {
    problem: &'p Problem,
    /// Per-session value order. Empty for preassigned sessions.
    values: Vec<Vec<Placement>>,
    alive: Vec<Vec<bool>>,
    /// For each dead value, the session whose assignment pruned it.
    pruner: Vec<Vec<Option<usize>>>,
    live: Vec<usize>,
    assigned: Vec<Option<Placement>>,
    total_targets: usize,
    remaining: usize,
    frames: Vec<Frame>,
    nogood: NoGoodCache,
    deepest: Option<FailureSite>,
    steps: u64,
}

impl<'p> SearchState<'p> {
    fn new(
        problem: &'p Problem,
        domains: &DomainSet,
        preassigned: Vec<Option<Placement>>,
        targets: &[usize],
        mut rng: Option<&mut SearchRng>,
    ) -> Result<Self> {
        let n = problem.sessions().len();
        let mut state = Self {
            problem,
            values: vec![Vec::new(); n],
            alive: vec![Vec::new(); n],
            pruner: vec![Vec::new(); n],
            live: vec![0; n],
            assigned: preassigned,
            total_targets: targets.len(),
            remaining: targets.len(),
            frames: Vec::new(),
            nogood: NoGoodCache::new(),
            deepest: None,
            steps: 0,
        };

        for &t in targets {
            let mut vals = domains.candidates(t).to_vec();
            if let Some(rng) = rng.as_deref_mut() {
                rng.shuffle(&mut vals);
            }
            state.alive[t] = vec![true; vals.len()];
            state.pruner[t] = vec![None; vals.len()];
            state.live[t] = vals.len();
            state.values[t] = vals;
            state.assigned[t] = None;
        }

        // Initial consistency against everything preassigned.
        for &t in targets {
            for i in 0..state.values[t].len() {
                let value = state.values[t][i];
                let blocker = (0..n)
                    .filter(|&other| other != t)
                    .find(|&other| match state.assigned[other] {
                        Some(op) => problem.clash(t, value, other, op).is_some(),
                        None => false,
                    });
                if let Some(other) = blocker {
                    state.alive[t][i] = false;
                    state.pruner[t][i] = Some(other);
                    state.live[t] -= 1;
                }
            }
            if state.live[t] == 0 {
                state.record_failure(t);
                return Err(EngineError::Infeasible(state.infeasibility()));
            }
        }

        Ok(state)
    }

    fn search(
        &mut self,
        deadline: Option<Instant>,
        budget: Option<Duration>,
        cancel: &CancelToken,
        progress: Option<&ProgressFn>,
    ) -> Result<Candidate> {
        self.report(progress);
        if self.remaining == 0 {
            return Ok(self.finish());
        }
        self.push_frame();
        loop {
            self.checkpoint(deadline, budget, cancel)?;
            if self.advance_top() {
                if self.remaining == 0 {
                    return Ok(self.finish());
                }
                self.report(progress);
                self.push_frame();
            } else {
                // The top frame's session has no viable value left under
                // the current prefix.
                let dead = self.frames.pop().filter(|f| f.chosen.is_none());
                debug_assert!(dead.is_some());
                match self.frames.last() {
                    Some(parent) => {
                        let depth = self.frames.len() - 1;
                        if let Some(chosen) = parent.chosen {
                            let placement = self.values[parent.session][chosen];
                            self.nogood.insert(parent.session, placement, depth);
                        }
                    }
                    None => return Err(EngineError::Infeasible(self.infeasibility())),
                }
            }
        }
    }

    /// Moves the top frame to its next viable value, forward-checking it.
    /// Returns `false` when the frame is exhausted.
    fn advance_top(&mut self) -> bool {
        let depth = self.frames.len() - 1;
        loop {
            if self.frames[depth].chosen.is_some() {
                self.undo_top();
                self.nogood.invalidate_deeper_than(depth);
            }
            let session = self.frames[depth].session;
            let cursor = self.frames[depth].cursor;
            let next = (cursor..self.values[session].len()).find(|&i| {
                self.alive[session][i] && !self.nogood.contains(session, self.values[session][i])
            });
            let Some(idx) = next else {
                self.record_failure(session);
                return false;
            };
            {
                let frame = &mut self.frames[depth];
                frame.cursor = idx + 1;
                frame.chosen = Some(idx);
            }
            let placement = self.values[session][idx];
            self.assigned[session] = Some(placement);
            self.remaining -= 1;
            if self.propagate(depth, session, placement) {
                return true;
            }
            // Forward checking wiped out a peer; undo and try the next
            // value on the next loop iteration.
        }
    }

    /// Prunes now-conflicting values from unassigned sessions after
    /// placing `session`. Returns `false` on a domain wipeout.
    fn propagate(&mut self, depth: usize, session: usize, placement: Placement) -> bool {
        let problem = self.problem;
        let mut trail = Vec::new();
        let mut wiped = None;
        for t in 0..self.values.len() {
            if t == session || self.assigned[t].is_some() {
                continue;
            }
            for i in 0..self.values[t].len() {
                if !self.alive[t][i] {
                    continue;
                }
                if problem.clash(t, self.values[t][i], session, placement).is_some() {
                    self.alive[t][i] = false;
                    self.pruner[t][i] = Some(session);
                    self.live[t] -= 1;
                    trail.push((t, i));
                }
            }
            if self.live[t] == 0 {
                wiped = Some(t);
                break;
            }
        }
        self.frames[depth].trail = trail;
        match wiped {
            Some(t) => {
                self.record_failure(t);
                false
            }
            None => true,
        }
    }

    /// Undoes the top frame's current value: restores its prunes and
    /// returns its session to the unassigned set.
    fn undo_top(&mut self) {
        let depth = self.frames.len() - 1;
        let trail = std::mem::take(&mut self.frames[depth].trail);
        for (t, i) in trail.into_iter().rev() {
            self.alive[t][i] = true;
            self.pruner[t][i] = None;
            self.live[t] += 1;
        }
        let session = self.frames[depth].session;
        if self.frames[depth].chosen.take().is_some() {
            self.assigned[session] = None;
            self.remaining += 1;
        }
    }

    /// Picks the next session to place: smallest live domain, ties broken
    /// by descending duration, then by session order.
    fn push_frame(&mut self) {
        let mut best: Option<usize> = None;
        for t in 0..self.values.len() {
            if self.assigned[t].is_some() || self.values[t].is_empty() {
                continue;
            }
            match best {
                None => best = Some(t),
                Some(b) => {
                    let duration =
                        |s: usize| self.problem.session(s).duration_slots;
                    let better = self.live[t] < self.live[b]
                        || (self.live[t] == self.live[b] && duration(t) > duration(b));
                    if better {
                        best = Some(t);
                    }
                }
            }
        }
        if let Some(session) = best {
            self.frames.push(Frame {
                session,
                cursor: 0,
                chosen: None,
                trail: Vec::new(),
            });
        }
    }

    fn checkpoint(
        &mut self,
        deadline: Option<Instant>,
        budget: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.steps += 1;
        if self.steps % CHECKPOINT_INTERVAL != 1 {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout {
                    budget_secs: budget.map(|b| b.as_secs()).unwrap_or(0),
                });
            }
        }
        Ok(())
    }

    fn report(&self, progress: Option<&ProgressFn>) {
        if let Some(progress) = progress {
            let placed = self.total_targets - self.remaining;
            let pct = (placed * 30 / self.total_targets.max(1)) as u8;
            progress(pct);
        }
    }

    /// Records the failure site if it is at least as deep as any seen so
    /// far. The deepest site is what the infeasibility report describes;
    /// at equal depth a site with identified causes wins over one whose
    /// values were only skipped through the no-good cache.
    fn record_failure(&mut self, session: usize) {
        let depth = self.frames.len();
        if matches!(&self.deepest, Some(site) if site.depth > depth) {
            return;
        }
        let mut causes: Vec<(ConstraintKind, usize)> = Vec::new();
        for i in 0..self.values[session].len() {
            if self.alive[session][i] {
                continue;
            }
            let Some(other) = self.pruner[session][i] else {
                continue;
            };
            let Some(op) = self.assigned[other] else {
                continue;
            };
            for kind in self
                .problem
                .clash_kinds(session, self.values[session][i], other, op)
            {
                if !causes.iter().any(|&(k, o)| k == kind && o == other) {
                    causes.push((kind, other));
                }
            }
        }
        let replace = match &self.deepest {
            None => true,
            Some(site) => depth > site.depth || !causes.is_empty() || site.causes.is_empty(),
        };
        if replace {
            self.deepest = Some(FailureSite {
                depth,
                session,
                causes,
            });
        }
    }

    fn infeasibility(&self) -> InfeasibilityReport {
        let Some(site) = &self.deepest else {
            return InfeasibilityReport::new("the instance".to_string(), Vec::new());
        };
        let problem = self.problem;
        let session_desc = problem.describe_session(site.session);
        let conflicts = site
            .causes
            .iter()
            .map(|&(kind, other)| {
                let detail = match kind {
                    ConstraintKind::FacultyClash => format!(
                        "{} is already committed to {}",
                        problem.faculty_name(problem.session(site.session).faculty),
                        problem.describe_session(other)
                    ),
                    ConstraintKind::BatchClash => format!(
                        "{} is already attending {}",
                        problem.batch_name(problem.session(site.session).batch),
                        problem.describe_session(other)
                    ),
                    ConstraintKind::RoomClash => {
                        let room = self.assigned[other]
                            .map(|p| problem.room(p.room).name.as_str())
                            .unwrap_or("?");
                        format!("room {} is occupied by {}", room, problem.describe_session(other))
                    }
                    other_kind => format!("{}", other_kind),
                };
                ConstraintViolation::new(
                    kind,
                    vec![
                        problem.session(site.session).id,
                        problem.session(other).id,
                    ],
                    detail,
                )
            })
            .collect();
        InfeasibilityReport::new(session_desc, conflicts)
    }

    fn finish(&self) -> Candidate {
        let placements = self
            .assigned
            .iter()
            .map(|p| p.expect("search finished with a complete assignment"))
            .collect();
        Candidate::new(placements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Batch, BatchId, Faculty, FacultyId, Room, RoomId, RoomKindId, SlotId, Subject, SubjectId,
        TeachingAssignment, TimeSlot,
    };

    fn slots(days: u8, per_day: u32) -> Vec<TimeSlot> {
        let mut out = Vec::new();
        let mut id = 0;
        for day in 0..days {
            for i in 0..per_day {
                let start = 540 + (i as u16) * 60;
                out.push(TimeSlot {
                    id: SlotId(id),
                    day,
                    start_minute: start,
                    end_minute: start + 60,
                });
                id += 1;
            }
        }
        out
    }

    fn room(id: u32, capacity: u16) -> Room {
        Room {
            id: RoomId(id),
            name: format!("R{id}"),
            capacity,
            kind: RoomKindId(0),
            is_lab: false,
        }
    }

    fn tiny_problem(slot_days: u8, per_day: u32, lectures: u8) -> Problem {
        Problem::builder()
            .subjects(vec![Subject {
                id: SubjectId(1),
                name: "Signals".to_string(),
                required_room_kind: None,
            }])
            .faculty(vec![Faculty {
                id: FacultyId(1),
                name: "Dr. Bose".to_string(),
            }])
            .batches(vec![Batch {
                id: BatchId(1),
                name: "EE-1".to_string(),
                strength: 30,
            }])
            .rooms(vec![room(1, 60)])
            .slots(slots(slot_days, per_day))
            .assignments(vec![TeachingAssignment::new(
                SubjectId(1),
                FacultyId(1),
                BatchId(1),
                lectures,
                0,
                0,
            )])
            .build()
            .unwrap()
    }

    #[test]
    fn solves_when_slots_suffice() {
        let problem = tiny_problem(5, 2, 6);
        let domains = DomainSet::build(&problem).unwrap();
        let candidate = CspSolver::new(&problem, &domains).solve().unwrap();
        assert_eq!(candidate.len(), 6);
        for a in 0..candidate.len() {
            for b in (a + 1)..candidate.len() {
                assert!(problem
                    .clash(a, candidate.placement(a), b, candidate.placement(b))
                    .is_none());
            }
        }
    }

    #[test]
    fn proves_infeasibility_when_oversubscribed() {
        // 4 slots, 6 single-faculty sessions.
        let problem = tiny_problem(2, 2, 6);
        let domains = DomainSet::build(&problem).unwrap();
        let err = CspSolver::new(&problem, &domains).solve().unwrap_err();
        match err {
            EngineError::Infeasible(report) => {
                assert!(!report.conflicts.is_empty());
                assert!(report.to_string().contains("Signals"));
            }
            other => panic!("expected Infeasible, got {other}"),
        }
    }

    #[test]
    fn cancellation_surfaces_between_frames() {
        let problem = tiny_problem(5, 2, 6);
        let domains = DomainSet::build(&problem).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = CspSolver::new(&problem, &domains)
            .with_cancel(cancel)
            .solve()
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn shuffled_solves_stay_feasible() {
        let problem = tiny_problem(5, 3, 8);
        let domains = DomainSet::build(&problem).unwrap();
        let solver = CspSolver::new(&problem, &domains);
        let mut rng = SearchRng::from_seed(11);
        for _ in 0..4 {
            let candidate = solver.solve_shuffled(&mut rng).unwrap();
            for a in 0..candidate.len() {
                for b in (a + 1)..candidate.len() {
                    assert!(problem
                        .clash(a, candidate.placement(a), b, candidate.placement(b))
                        .is_none());
                }
            }
        }
    }

    #[test]
    fn repair_replaces_only_victims() {
        let problem = tiny_problem(5, 2, 4);
        let domains = DomainSet::build(&problem).unwrap();
        let solver = CspSolver::new(&problem, &domains);
        let base = solver.solve().unwrap();

        // Force sessions 0 and 1 onto the same placement, then repair 1.
        let mut broken = base.clone();
        broken.set_placement(1, broken.placement(0));
        let mut rng = SearchRng::from_seed(5);
        let repaired = solver.repair(&broken, &[1], &mut rng).unwrap();

        assert_eq!(repaired.placement(0), broken.placement(0));
        assert_eq!(repaired.placement(2), broken.placement(2));
        assert_eq!(repaired.placement(3), broken.placement(3));
        for a in 0..repaired.len() {
            for b in (a + 1)..repaired.len() {
                assert!(problem
                    .clash(a, repaired.placement(a), b, repaired.placement(b))
                    .is_none());
            }
        }
    }
}
