//! # Generation Configuration
//!
//! Per-request parameters for one generation run: algorithm choice, the
//! soft-constraint weight vector, optimizer knobs, the wall-clock budget,
//! and the optional RNG seed that makes a run reproducible.
//!
//! Requests are built through [`GenerationRequestBuilder`], which
//! validates every knob so the pipeline never has to defend against a
//! zero population or a mutation rate of 3.

use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::fitness::SoftWeights;

/// Which phases a generation run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Algorithm {
    /// Feasibility search only; results are ranked feasible solutions.
    CspOnly,
    /// Evolution seeded from randomized feasible solves.
    Genetic,
    /// The deterministic feasible solution seeds the evolution together
    /// with randomized re-solves.
    Hybrid,
}

/// Parameters of one generation request.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationRequest {
    algorithm: Algorithm,
    weights: SoftWeights,
    population_size: usize,
    max_generations: usize,
    mutation_rate: f64,
    crossover_rate: f64,
    tournament_size: usize,
    stall_generations: usize,
    time_limit: Duration,
    top_k: usize,
    seed: Option<u64>,
}

impl GenerationRequest {
    pub fn builder() -> GenerationRequestBuilder {
        GenerationRequestBuilder::new()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn weights(&self) -> SoftWeights {
        self.weights
    }

    pub fn population_size(&self) -> usize {
        self.population_size
    }

    pub fn max_generations(&self) -> usize {
        self.max_generations
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation_rate
    }

    pub fn crossover_rate(&self) -> f64 {
        self.crossover_rate
    }

    pub fn tournament_size(&self) -> usize {
        self.tournament_size
    }

    pub fn stall_generations(&self) -> usize {
        self.stall_generations
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl Default for GenerationRequest {
    fn default() -> Self {
        // The builder defaults are always valid.
        GenerationRequestBuilder::new()
            .build()
            .expect("default generation request is valid")
    }
}

/// Builder for [`GenerationRequest`] with validation at `build` time.
#[derive(Debug, Clone)]
pub struct GenerationRequestBuilder {
    algorithm: Algorithm,
    weights: SoftWeights,
    population_size: usize,
    max_generations: usize,
    mutation_rate: f64,
    crossover_rate: f64,
    tournament_size: usize,
    stall_generations: usize,
    time_limit: Duration,
    top_k: usize,
    seed: Option<u64>,
}

impl GenerationRequestBuilder {
    pub fn new() -> Self {
        Self {
            algorithm: Algorithm::Hybrid,
            weights: SoftWeights::default(),
            population_size: 100,
            max_generations: 200,
            mutation_rate: 0.1,
            crossover_rate: 0.8,
            tournament_size: 3,
            stall_generations: 25,
            time_limit: Duration::from_secs(60),
            top_k: 5,
            seed: None,
        }
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn weights(mut self, weights: SoftWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    pub fn max_generations(mut self, max_generations: usize) -> Self {
        self.max_generations = max_generations;
        self
    }

    pub fn mutation_rate(mut self, mutation_rate: f64) -> Self {
        self.mutation_rate = mutation_rate;
        self
    }

    pub fn crossover_rate(mut self, crossover_rate: f64) -> Self {
        self.crossover_rate = crossover_rate;
        self
    }

    pub fn tournament_size(mut self, tournament_size: usize) -> Self {
        self.tournament_size = tournament_size;
        self
    }

    pub fn stall_generations(mut self, stall_generations: usize) -> Self {
        self.stall_generations = stall_generations;
        self
    }

    pub fn time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<GenerationRequest> {
        if self.population_size < 2 {
            return Err(EngineError::Configuration(
                "population size must be at least 2".to_string(),
            ));
        }
        if self.max_generations == 0 {
            return Err(EngineError::Configuration(
                "max generations must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EngineError::Configuration(format!(
                "mutation rate {} is outside [0, 1]",
                self.mutation_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(EngineError::Configuration(format!(
                "crossover rate {} is outside [0, 1]",
                self.crossover_rate
            )));
        }
        if self.tournament_size == 0 {
            return Err(EngineError::Configuration(
                "tournament size must be at least 1".to_string(),
            ));
        }
        if self.tournament_size > self.population_size {
            return Err(EngineError::Configuration(format!(
                "tournament size {} exceeds population size {}",
                self.tournament_size, self.population_size
            )));
        }
        if self.stall_generations == 0 {
            return Err(EngineError::Configuration(
                "stall window must be at least 1 generation".to_string(),
            ));
        }
        if self.time_limit.is_zero() {
            return Err(EngineError::Configuration(
                "time limit must be positive".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(EngineError::Configuration(
                "top-k must be at least 1".to_string(),
            ));
        }
        Ok(GenerationRequest {
            algorithm: self.algorithm,
            weights: self.weights,
            population_size: self.population_size,
            max_generations: self.max_generations,
            mutation_rate: self.mutation_rate,
            crossover_rate: self.crossover_rate,
            tournament_size: self.tournament_size,
            stall_generations: self.stall_generations,
            time_limit: self.time_limit,
            top_k: self.top_k,
            seed: self.seed,
        })
    }
}

impl Default for GenerationRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let request = GenerationRequest::default();
        assert_eq!(request.population_size(), 100);
        assert_eq!(request.max_generations(), 200);
        assert_eq!(request.algorithm(), Algorithm::Hybrid);
    }

    #[test]
    fn rejects_zero_population() {
        let err = GenerationRequest::builder()
            .population_size(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn rejects_out_of_range_rates() {
        assert!(GenerationRequest::builder()
            .mutation_rate(1.5)
            .build()
            .is_err());
        assert!(GenerationRequest::builder()
            .crossover_rate(-0.1)
            .build()
            .is_err());
    }

    #[test]
    fn rejects_tournament_larger_than_population() {
        let err = GenerationRequest::builder()
            .population_size(4)
            .tournament_size(8)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("tournament"));
    }
}
