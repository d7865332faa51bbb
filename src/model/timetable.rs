//! Finished timetables.
//!
//! The persistence-ready boundary shape handed back to the caller: one
//! entry per scheduled session with entity ids and wall-clock times, the
//! candidate's fitness score, its itemized violations, and aggregate
//! quality metrics.

use super::{
    BatchId, ConstraintViolation, FacultyId, RoomId, SessionKind, SubjectId,
};

/// One scheduled session in a finished timetable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimetableEntry {
    pub subject: SubjectId,
    pub faculty: FacultyId,
    pub batch: BatchId,
    pub room: RoomId,
    pub kind: SessionKind,
    /// Day of week, 0 = Monday through 6 = Sunday.
    pub day: u8,
    /// Minutes from midnight.
    pub start_minute: u16,
    pub end_minute: u16,
}

/// Aggregate quality metrics for a finished timetable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleMetrics {
    pub hard_violations: usize,
    pub soft_violations: usize,
    /// Share of (slot, room) pairs in use, 0 to 100.
    pub room_utilization: f64,
    pub total_sessions: usize,
}

/// A ranked generation result.
///
/// Lower `cost` is better; the orchestrator returns timetables sorted by
/// ascending cost.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timetable {
    pub entries: Vec<TimetableEntry>,
    pub cost: f64,
    pub violations: Vec<ConstraintViolation>,
    pub metrics: ScheduleMetrics,
}
