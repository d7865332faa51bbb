//! Parent selection.
//!
//! Selection strategies pick mating-pool members from an evaluated
//! population. Costs are read from the candidates' cached evaluations;
//! lower cost wins.

use std::fmt::Debug;

use crate::error::{EngineError, Result};
use crate::model::Candidate;
use crate::rng::SearchRng;

/// Strategy seam for choosing parents from an evaluated population.
pub trait SelectionStrategy: Debug + Send + Sync {
    /// Returns the index of one selected parent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyPopulation`] when the population is
    /// empty.
    fn pick(&self, population: &[Candidate], rng: &mut SearchRng) -> Result<usize>;
}

/// Tournament selection: draw `tournament_size` candidates uniformly with
/// replacement and keep the cheapest.
///
/// Larger tournaments increase selection pressure; size 1 is uniform
/// random selection.
#[derive(Debug, Clone)]
pub struct TournamentSelection {
    tournament_size: usize,
}

impl TournamentSelection {
    pub fn new(tournament_size: usize) -> Result<Self> {
        if tournament_size == 0 {
            return Err(EngineError::Configuration(
                "tournament size must be at least 1".to_string(),
            ));
        }
        Ok(Self { tournament_size })
    }
}

impl SelectionStrategy for TournamentSelection {
    fn pick(&self, population: &[Candidate], rng: &mut SearchRng) -> Result<usize> {
        if population.is_empty() {
            return Err(EngineError::EmptyPopulation);
        }
        let mut winner = rng.gen_range(0..population.len());
        for _ in 1..self.tournament_size {
            let challenger = rng.gen_range(0..population.len());
            if population[challenger].cost_or_worst() < population[winner].cost_or_worst() {
                winner = challenger;
            }
        }
        Ok(winner)
    }
}
