//! The generation pipeline run by a worker for one job.
//!
//! Domain generation, feasibility search, and (for the genetic and
//! hybrid algorithms) evolution, glued together under one wall-clock
//! budget and one cancellation token. The pipeline returns ranked
//! timetables or the engine error the orchestrator converts into a
//! user-displayable failure.

use std::cmp;
use std::time::{Duration, Instant};

use tracing::info;

use crate::cancel::CancelToken;
use crate::config::{Algorithm, GenerationRequest};
use crate::csp::{CspSolver, ProgressFn};
use crate::domain::DomainSet;
use crate::error::{EngineError, Result};
use crate::fitness::{Evaluation, FitnessEvaluator};
use crate::ga::GeneticOptimizer;
use crate::model::{Candidate, ScheduleMetrics, Timetable, TimetableEntry};
use crate::problem::Problem;
use crate::rng::SearchRng;

/// Randomized re-solves attempted when seeding the optimizer.
const SEED_SOLVES: usize = 4;

/// Costs closer than this count as the same result when ranking.
const COST_EPS: f64 = 1e-9;

pub(crate) fn run_generation(
    problem: &Problem,
    request: &GenerationRequest,
    cancel: &CancelToken,
    progress: ProgressFn,
) -> Result<Vec<Timetable>> {
    let started = Instant::now();
    let deadline = started + request.time_limit();
    let mut rng = match request.seed() {
        Some(seed) => SearchRng::from_seed(seed),
        None => SearchRng::new(),
    };

    let domains = DomainSet::build(problem)?;

    // The feasibility phase owns the whole budget when it is the whole
    // run, and roughly the 0 to 30 progress band otherwise.
    let csp_budget = match request.algorithm() {
        Algorithm::CspOnly => request.time_limit(),
        _ => cmp::max(
            request.time_limit().mul_f64(0.3),
            Duration::from_millis(100),
        ),
    };
    let solver = CspSolver::new(problem, &domains)
        .with_cancel(cancel.clone())
        .with_budget(csp_budget)
        .with_progress(progress.clone());
    let evaluator = FitnessEvaluator::new(problem, request.weights());

    match request.algorithm() {
        Algorithm::CspOnly => {
            let mut results = vec![solver.solve()?];
            while results.len() < request.top_k() {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                if Instant::now() >= deadline {
                    break;
                }
                match solver.solve_shuffled(&mut rng) {
                    Ok(candidate) => results.push(candidate),
                    Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                    Err(_) => break,
                }
            }
            info!(solutions = results.len(), "feasibility-only run finished");
            Ok(rank_candidates(problem, &evaluator, results, request.top_k()))
        }
        Algorithm::Genetic | Algorithm::Hybrid => {
            let mut seeds = Vec::new();
            if request.algorithm() == Algorithm::Hybrid {
                seeds.push(solver.solve()?);
            }
            while seeds.len() < SEED_SOLVES {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                match solver.solve_shuffled(&mut rng) {
                    Ok(candidate) => seeds.push(candidate),
                    Err(e) if seeds.is_empty() => return Err(e),
                    Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                    Err(_) => break,
                }
            }
            info!(seeds = seeds.len(), "optimizer seeding finished");

            let optimizer = GeneticOptimizer::new(problem, &domains, request)?
                .with_cancel(cancel.clone())
                .with_deadline(deadline)
                .with_progress(progress.clone());
            let outcome = optimizer.run(seeds, &mut rng)?;
            info!(
                generations = outcome.generations,
                stalled = outcome.stalled,
                results = outcome.ranked.len(),
                "optimization finished"
            );
            Ok(outcome
                .ranked
                .into_iter()
                .map(|r| to_timetable(problem, &r.candidate, r.evaluation))
                .collect())
        }
    }
}

/// Evaluates, sorts ascending by cost, drops duplicate costs, and
/// converts the best `top_k`.
fn rank_candidates(
    problem: &Problem,
    evaluator: &FitnessEvaluator<'_>,
    mut candidates: Vec<Candidate>,
    top_k: usize,
) -> Vec<Timetable> {
    evaluator.evaluate_population(&mut candidates);
    candidates.sort_by(|a, b| {
        a.cost_or_worst()
            .partial_cmp(&b.cost_or_worst())
            .unwrap_or(cmp::Ordering::Equal)
    });

    let mut out = Vec::new();
    let mut last_cost = f64::NEG_INFINITY;
    for candidate in candidates {
        let cost = candidate.cost_or_worst();
        if (cost - last_cost).abs() <= COST_EPS {
            continue;
        }
        last_cost = cost;
        let evaluation = evaluator.evaluate(&candidate);
        out.push(to_timetable(problem, &candidate, evaluation));
        if out.len() == top_k {
            break;
        }
    }
    out
}

fn to_timetable(problem: &Problem, candidate: &Candidate, evaluation: Evaluation) -> Timetable {
    let mut entries: Vec<TimetableEntry> = (0..candidate.len())
        .map(|sidx| problem.timetable_entry(sidx, candidate.placement(sidx)))
        .collect();
    entries.sort_by_key(|e| (e.day, e.start_minute, e.batch));
    let metrics = ScheduleMetrics {
        hard_violations: evaluation.hard_count(),
        soft_violations: evaluation.soft_count(),
        room_utilization: problem.room_utilization(candidate),
        total_sessions: entries.len(),
    };
    Timetable {
        entries,
        cost: evaluation.cost,
        violations: evaluation.violations,
        metrics,
    }
}
