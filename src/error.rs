//! # Error Types
//!
//! This module defines the error taxonomy for the timetable generation
//! engine. Every fatal condition a generation run can hit has its own
//! variant, so callers can distinguish "your data makes a timetable
//! impossible" from "the search ran out of time" and react accordingly.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use timetablegen::error::{EngineError, Result};
//!
//! fn some_step() -> Result<()> {
//!     Ok(())
//! }
//!
//! fn caller() {
//!     match some_step() {
//!         Ok(_) => println!("Success!"),
//!         Err(e) => println!("Error: {}", e),
//!     }
//! }
//! ```

use thiserror::Error;

use crate::csp::InfeasibilityReport;

/// Represents errors that can occur while generating a timetable.
///
/// The variants mirror the engine's failure taxonomy: static domain
/// construction, feasibility search, and configuration each fail in
/// distinguishable ways. Soft-constraint stalls during optimization are
/// deliberately *not* errors; the optimizer always returns the best
/// candidate it found.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No (slot, room) placement exists for a session even before search
    /// begins. Carries the session description and the requirement that
    /// could not be met.
    #[error("empty domain for {session}: {requirement}")]
    DomainEmpty {
        /// Human-readable description of the session with no candidates.
        session: String,
        /// The unmet requirement that emptied the domain.
        requirement: String,
    },

    /// The feasibility search exhausted the whole space without finding a
    /// complete assignment. Carries the conflicting constraint set
    /// discovered at the deepest point of the search.
    #[error("no feasible timetable: {0}")]
    Infeasible(InfeasibilityReport),

    /// The search exceeded its wall-clock budget without either finding a
    /// solution or proving that none exists. Distinct from
    /// [`EngineError::Infeasible`] so callers can suggest a larger time
    /// limit instead of reporting contradictory constraints.
    #[error("solver exceeded its time budget of {budget_secs}s")]
    Timeout {
        /// The budget that was exceeded, in seconds.
        budget_secs: u64,
    },

    /// Cooperative cancellation was observed at a checkpoint. Partial work
    /// is discarded.
    #[error("generation cancelled")]
    Cancelled,

    /// An invalid configuration or inconsistent input data was provided.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation that requires a non-empty population was invoked on an
    /// empty one.
    #[error("empty population: cannot operate on an empty population")]
    EmptyPopulation,
}

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
