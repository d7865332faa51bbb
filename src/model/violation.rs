//! Constraint violations.
//!
//! Produced by evaluation and infeasibility reporting, consumed by the
//! caller for display. A violation names the rule that was broken, how
//! severe breaking it is, and which sessions were involved.

use std::fmt;

use super::SessionId;

/// Whether a broken rule invalidates a timetable or merely degrades it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Hard,
    Soft,
}

/// The rule a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintKind {
    /// A faculty member is double-booked at a slot.
    FacultyClash,
    /// A batch is double-booked at a slot.
    BatchClash,
    /// A room hosts two sessions at a slot.
    RoomClash,
    /// A batch placed in a room smaller than its strength.
    CapacityExceeded,
    /// A session placed in a room of the wrong category.
    RoomKindMismatch,
    /// A placement inside a declared unavailability window.
    UnavailableSlot,
    /// Idle slots between a batch's first and last session of a day.
    IdleGap,
    /// Uneven distribution of a faculty member's hours across the week.
    WorkloadImbalance,
    /// A session outside its faculty's preferred-time windows.
    PreferenceMiss,
    /// Consecutive sessions of a batch in different rooms.
    RoomChange,
}

impl ConstraintKind {
    pub fn severity(self) -> Severity {
        match self {
            ConstraintKind::FacultyClash
            | ConstraintKind::BatchClash
            | ConstraintKind::RoomClash
            | ConstraintKind::CapacityExceeded
            | ConstraintKind::RoomKindMismatch
            | ConstraintKind::UnavailableSlot => Severity::Hard,
            ConstraintKind::IdleGap
            | ConstraintKind::WorkloadImbalance
            | ConstraintKind::PreferenceMiss
            | ConstraintKind::RoomChange => Severity::Soft,
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::FacultyClash => "faculty double-booked",
            ConstraintKind::BatchClash => "batch double-booked",
            ConstraintKind::RoomClash => "room double-booked",
            ConstraintKind::CapacityExceeded => "room capacity exceeded",
            ConstraintKind::RoomKindMismatch => "room kind mismatch",
            ConstraintKind::UnavailableSlot => "placement in unavailable slot",
            ConstraintKind::IdleGap => "idle gap",
            ConstraintKind::WorkloadImbalance => "workload imbalance",
            ConstraintKind::PreferenceMiss => "outside preferred time",
            ConstraintKind::RoomChange => "room change",
        };
        f.write_str(name)
    }
}

/// A specific violation of a constraint by a candidate timetable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintViolation {
    pub kind: ConstraintKind,
    pub severity: Severity,
    /// The sessions involved in the violation.
    pub sessions: Vec<SessionId>,
    pub description: String,
}

impl ConstraintViolation {
    pub fn new<D: Into<String>>(
        kind: ConstraintKind,
        sessions: Vec<SessionId>,
        description: D,
    ) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            sessions,
            description: description.into(),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}
