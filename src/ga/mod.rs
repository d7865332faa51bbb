//! # Genetic Optimizer
//!
//! Population-based optimization over feasible candidate timetables.
//! The feasibility solver supplies the seeds; evolution lowers their
//! soft-constraint cost under the configured weights.
//!
//! One generation is select, crossover with repair, mutate, evaluate.
//! Every operator preserves hard feasibility: crossover children are
//! repaired with the solver's forward-checking pass restricted to the
//! clashing sessions, and mutation resamples from the session's static
//! domain until it finds a clash-free placement. Elitism carries the
//! best candidate into the next generation unconditionally, so the best
//! cost never regresses.

pub mod crossover;
pub mod mutation;
pub mod optimizer;
pub mod selection;

pub use crossover::{partition_crossover, PartitionAxis};
pub use mutation::mutate;
pub use optimizer::{GeneticOptimizer, OptimizerOutcome, RankedCandidate};
pub use selection::{SelectionStrategy, TournamentSelection};
