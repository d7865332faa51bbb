//! Population evolution.
//!
//! The optimizer owns its population for the whole run. Each generation
//! evaluates every candidate (in parallel above a threshold), preserves
//! the current best unconditionally, fills the rest of the next
//! generation through tournament-selected crossover with repair, and
//! mutates at the configured rate. It stops on the generation cap, on a
//! stall of the best cost, on the deadline, or at a cancellation
//! checkpoint; only cancellation is an error.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::GenerationRequest;
use crate::csp::{CspSolver, ProgressFn};
use crate::domain::DomainSet;
use crate::error::{EngineError, Result};
use crate::fitness::{Evaluation, FitnessEvaluator};
use crate::model::Candidate;
use crate::problem::Problem;
use crate::rng::SearchRng;

use super::crossover::{partition_crossover, PartitionAxis};
use super::mutation::mutate;
use super::selection::{SelectionStrategy, TournamentSelection};

/// Matings attempted before giving up on producing a repaired child and
/// falling back to cloning a tournament winner.
const CROSSOVER_RETRIES: usize = 5;

/// Resamples per mutation before leaving the candidate unchanged.
const MUTATION_TRIES: usize = 8;

/// Wall-clock cap on each repair search. A repair that cannot finish in
/// this budget is treated like an irreparable child and discarded.
const REPAIR_BUDGET: Duration = Duration::from_millis(200);

/// Best-cost improvements smaller than this count as a stall, and costs
/// closer than this count as duplicates when ranking results.
const COST_EPS: f64 = 1e-9;

/// One ranked result of an optimization run.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub evaluation: Evaluation,
}

/// The outcome of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizerOutcome {
    /// Top candidates with pairwise distinct costs, ascending.
    pub ranked: Vec<RankedCandidate>,
    /// Generations actually executed.
    pub generations: usize,
    /// Whether the run ended early because the best cost stopped
    /// improving.
    pub stalled: bool,
}

/// Genetic optimizer over feasible candidate timetables.
pub struct GeneticOptimizer<'p> {
    problem: &'p Problem,
    domains: &'p DomainSet,
    request: &'p GenerationRequest,
    evaluator: FitnessEvaluator<'p>,
    selection: TournamentSelection,
    cancel: CancelToken,
    deadline: Option<Instant>,
    progress: Option<ProgressFn>,
}

impl<'p> GeneticOptimizer<'p> {
    pub fn new(
        problem: &'p Problem,
        domains: &'p DomainSet,
        request: &'p GenerationRequest,
    ) -> Result<Self> {
        Ok(Self {
            problem,
            domains,
            request,
            evaluator: FitnessEvaluator::new(problem, request.weights()),
            selection: TournamentSelection::new(request.tournament_size())?,
            cancel: CancelToken::new(),
            deadline: None,
            progress: None,
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Hard wall-clock bound; reaching it ends the run with the best
    /// candidates found so far.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Installs a progress callback. Evolution maps generation count onto
    /// the 30 to 100 band of overall job progress.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Evolves a population grown from `seeds` and returns the ranked
    /// distinct results.
    ///
    /// Seeds must be hard-feasible; every operator preserves feasibility,
    /// so the whole population stays feasible throughout.
    pub fn run(&self, seeds: Vec<Candidate>, rng: &mut SearchRng) -> Result<OptimizerOutcome> {
        if seeds.is_empty() {
            return Err(EngineError::EmptyPopulation);
        }
        let repairer = CspSolver::new(self.problem, self.domains)
            .with_cancel(self.cancel.clone())
            .with_budget(REPAIR_BUDGET);

        let mut population = self.seed_population(seeds, rng);
        self.evaluator.evaluate_population(&mut population);
        sort_by_cost(&mut population);

        let mut best = population[0].cost_or_worst();
        let mut stall = 0usize;
        let mut stalled = false;
        let mut generations = 0usize;

        for generation in 0..self.request.max_generations() {
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if matches!(self.deadline, Some(d) if Instant::now() >= d) {
                debug!(generation, "optimizer deadline reached");
                break;
            }

            let mut next = Vec::with_capacity(self.request.population_size());
            next.push(population[0].clone());
            while next.len() < self.request.population_size() {
                let mut child = if rng.gen_bool(self.request.crossover_rate()) {
                    self.offspring(&population, &repairer, rng)?
                } else {
                    let idx = self.selection.pick(&population, rng)?;
                    population[idx].clone()
                };
                if rng.gen_bool(self.request.mutation_rate()) {
                    mutate(self.problem, self.domains, &mut child, rng, MUTATION_TRIES);
                }
                next.push(child);
            }

            population = next;
            self.evaluator.evaluate_population(&mut population);
            sort_by_cost(&mut population);
            generations = generation + 1;

            let current = population[0].cost_or_worst();
            let mean = population.iter().map(Candidate::cost_or_worst).sum::<f64>()
                / population.len() as f64;
            debug!(
                generation,
                best = current,
                mean,
                "generation complete"
            );
            self.report(generations);

            if current + COST_EPS < best {
                best = current;
                stall = 0;
            } else {
                stall += 1;
                if stall >= self.request.stall_generations() {
                    debug!(generation, stall, "optimizer stalled, stopping early");
                    stalled = true;
                    break;
                }
            }
        }

        Ok(OptimizerOutcome {
            ranked: self.rank(&population),
            generations,
            stalled,
        })
    }

    /// Grows the initial population: the seeds themselves plus perturbed
    /// variants produced by validated random reassignments.
    fn seed_population(&self, seeds: Vec<Candidate>, rng: &mut SearchRng) -> Vec<Candidate> {
        let mut population = seeds;
        population.truncate(self.request.population_size());
        let base_count = population.len();
        while population.len() < self.request.population_size() {
            let mut variant = population[rng.gen_range(0..base_count)].clone();
            let perturbations = 1 + rng.gen_range(0..3);
            for _ in 0..perturbations {
                mutate(self.problem, self.domains, &mut variant, rng, MUTATION_TRIES);
            }
            population.push(variant);
        }
        population
    }

    /// Produces one hard-feasible child via partition crossover and
    /// repair. Irreparable children are discarded and the mating retried
    /// with freshly selected parents; after the retry budget the fallback
    /// is a clone of a tournament winner, never an error.
    fn offspring(
        &self,
        population: &[Candidate],
        repairer: &CspSolver<'_>,
        rng: &mut SearchRng,
    ) -> Result<Candidate> {
        for _ in 0..CROSSOVER_RETRIES {
            let pa = self.selection.pick(population, rng)?;
            let pb = self.selection.pick(population, rng)?;
            let axis = PartitionAxis::random(rng);
            let child =
                partition_crossover(self.problem, &population[pa], &population[pb], axis, rng);

            let victims: Vec<usize> = self
                .evaluator
                .conflicting_sessions(&child)
                .into_iter()
                .filter(|&s| !self.problem.is_fixed(s))
                .collect();
            if victims.is_empty() {
                return Ok(child);
            }
            match repairer.repair(&child, &victims, rng) {
                Ok(repaired) => return Ok(repaired),
                Err(EngineError::Infeasible(_)) | Err(EngineError::Timeout { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        let idx = self.selection.pick(population, rng)?;
        Ok(population[idx].clone())
    }

    fn rank(&self, population: &[Candidate]) -> Vec<RankedCandidate> {
        let mut ranked = Vec::new();
        let mut last_cost = f64::NEG_INFINITY;
        for candidate in population {
            let cost = candidate.cost_or_worst();
            if (cost - last_cost).abs() <= COST_EPS {
                continue;
            }
            last_cost = cost;
            ranked.push(RankedCandidate {
                candidate: candidate.clone(),
                evaluation: self.evaluator.evaluate(candidate),
            });
            if ranked.len() == self.request.top_k() {
                break;
            }
        }
        ranked
    }

    fn report(&self, generations: usize) {
        if let Some(progress) = &self.progress {
            let pct = 30 + (generations * 70 / self.request.max_generations().max(1));
            progress(pct.min(100) as u8);
        }
    }
}

fn sort_by_cost(population: &mut [Candidate]) {
    population.sort_by(|a, b| {
        a.cost_or_worst()
            .partial_cmp(&b.cost_or_worst())
            .unwrap_or(Ordering::Equal)
    });
}
