//! Infeasibility reporting.
//!
//! When the search exhausts the space, the caller gets more than a bare
//! failure: the session that could not be placed at the deepest point the
//! search reached, and the constraints that emptied its domain there.
//! That set is the actionable part; it tells an administrator which
//! resources are over-subscribed.

use std::fmt;

use crate::model::ConstraintViolation;

/// The conflicting constraint set witnessed at the deepest backtrack
/// frontier of an exhausted search.
#[derive(Debug, Clone)]
pub struct InfeasibilityReport {
    /// Description of the session that could not be placed.
    pub session: String,
    /// The constraints that eliminated its remaining placements.
    pub conflicts: Vec<ConstraintViolation>,
}

impl InfeasibilityReport {
    pub fn new(session: String, conflicts: Vec<ConstraintViolation>) -> Self {
        Self { session, conflicts }
    }
}

impl fmt::Display for InfeasibilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cannot be placed", self.session)?;
        if self.conflicts.is_empty() {
            return write!(f, " (no placement satisfies its static requirements)");
        }
        write!(f, "; conflicting constraints: ")?;
        for (i, v) in self.conflicts.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}
