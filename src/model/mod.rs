//! # Constraint Model
//!
//! Typed representation of everything a generation run consumes and
//! produces: entity records supplied by the data layer, the sessions
//! expanded from teaching assignments, candidate timetables, and the
//! violations reported back for explainability.
//!
//! Entity records are read-only inputs. The engine never mutates them and
//! never persists anything; it hands finished [`Timetable`]s back to the
//! caller.

pub mod candidate;
pub mod session;
pub mod timetable;
pub mod violation;

pub use candidate::{Candidate, Placement};
pub use session::{expand_sessions, Session, SessionKind};
pub use timetable::{ScheduleMetrics, Timetable, TimetableEntry};
pub use violation::{ConstraintKind, ConstraintViolation, Severity};

use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a subject record.
    SubjectId, "subject#");
entity_id!(
    /// Identifier of a faculty member record.
    FacultyId, "faculty#");
entity_id!(
    /// Identifier of a student batch record.
    BatchId, "batch#");
entity_id!(
    /// Identifier of a room record.
    RoomId, "room#");
entity_id!(
    /// Identifier of a time slot in the catalog.
    SlotId, "slot#");
entity_id!(
    /// Identifier of a room category (seminar room, lab, auditorium, ...).
    RoomKindId, "roomkind#");

/// One session instance within a generation run.
///
/// Session ids are engine-internal: they index into the run's expanded
/// session list and are not stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// A subject taught during the term.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    /// Room category this subject must be taught in, if it has one beyond
    /// the lecture/practical distinction.
    pub required_room_kind: Option<RoomKindId>,
}

/// A faculty member who can be scheduled to teach.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Faculty {
    pub id: FacultyId,
    pub name: String,
}

/// A student batch attending sessions together.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Batch {
    pub id: BatchId,
    pub name: String,
    /// Number of students; rooms below this capacity are never candidates.
    pub strength: u16,
}

/// A room sessions can be placed in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u16,
    pub kind: RoomKindId,
    /// Labs host practical sessions; non-labs host lectures and tutorials.
    pub is_lab: bool,
}

/// One slot in the institution's weekly time grid.
///
/// The engine treats the full catalog, ordered by day and start time, as
/// the time domain. Slots on the same day that are adjacent in that order
/// can be combined into multi-slot sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSlot {
    pub id: SlotId,
    /// Day of week, 0 = Monday through 6 = Sunday.
    pub day: u8,
    /// Minutes from midnight.
    pub start_minute: u16,
    pub end_minute: u16,
}

/// A half-open range of minutes within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeRange {
    pub start_minute: u16,
    pub end_minute: u16,
}

impl TimeRange {
    /// Whether this range overlaps a slot's span.
    pub fn covers(&self, slot: &TimeSlot) -> bool {
        self.start_minute < slot.end_minute && slot.start_minute < self.end_minute
    }
}

/// A static unavailability rule excluding placements before search begins.
///
/// Each variant carries a typed payload for one resource kind; matching on
/// the variant replaces the loosely typed parameter bags a data layer
/// typically stores.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AvailabilityRule {
    /// The faculty member cannot teach on the given days, optionally only
    /// within a time range (whole day when `span` is `None`).
    FacultyUnavailable {
        faculty: FacultyId,
        days: Vec<u8>,
        span: Option<TimeRange>,
    },
    /// The batch cannot attend on the given days.
    BatchUnavailable {
        batch: BatchId,
        days: Vec<u8>,
        span: Option<TimeRange>,
    },
    /// The room cannot be used on the given days.
    RoomUnavailable {
        room: RoomId,
        days: Vec<u8>,
        span: Option<TimeRange>,
    },
}

impl AvailabilityRule {
    /// Whether this rule excludes the given slot for the given resources.
    ///
    /// `faculty`, `batch` and `room` are the resources of the placement
    /// being tested; a rule only applies when its subject matches.
    pub fn blocks(
        &self,
        faculty: FacultyId,
        batch: BatchId,
        room: RoomId,
        slot: &TimeSlot,
    ) -> bool {
        let (days, span, applies) = match self {
            AvailabilityRule::FacultyUnavailable { faculty: f, days, span } => {
                (days, span, *f == faculty)
            }
            AvailabilityRule::BatchUnavailable { batch: b, days, span } => {
                (days, span, *b == batch)
            }
            AvailabilityRule::RoomUnavailable { room: r, days, span } => {
                (days, span, *r == room)
            }
        };
        if !applies || !days.contains(&slot.day) {
            return false;
        }
        match span {
            Some(range) => range.covers(slot),
            None => true,
        }
    }

    /// Short description of the rule's subject, used in diagnostics.
    pub fn subject_description(&self) -> String {
        match self {
            AvailabilityRule::FacultyUnavailable { faculty, .. } => faculty.to_string(),
            AvailabilityRule::BatchUnavailable { batch, .. } => batch.to_string(),
            AvailabilityRule::RoomUnavailable { room, .. } => room.to_string(),
        }
    }
}

/// A declared preferred-time window for a faculty member.
///
/// Preference windows never exclude placements; sessions placed outside
/// every declared window of their faculty are charged the preference
/// penalty during fitness evaluation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FacultyPreference {
    pub faculty: FacultyId,
    pub days: Vec<u8>,
    pub span: TimeRange,
}

impl FacultyPreference {
    /// Whether the window covers the given slot.
    pub fn covers(&self, slot: &TimeSlot) -> bool {
        self.days.contains(&slot.day) && self.span.covers(slot)
    }
}

/// A subject-faculty-batch assignment with required weekly hours.
///
/// One assignment expands into `lecture_hours + tutorial_hours +
/// lab_hours` discrete session instances for the term; see
/// [`expand_sessions`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TeachingAssignment {
    pub subject: SubjectId,
    pub faculty: FacultyId,
    pub batch: BatchId,
    pub lecture_hours: u8,
    pub tutorial_hours: u8,
    pub lab_hours: u8,
    /// Consecutive slots per practical session. Lab hours are grouped into
    /// blocks of this size, with a shorter final block if they do not
    /// divide evenly. Defaults to 2 via [`TeachingAssignment::new`].
    pub lab_block_slots: u8,
}

impl TeachingAssignment {
    pub fn new(
        subject: SubjectId,
        faculty: FacultyId,
        batch: BatchId,
        lecture_hours: u8,
        tutorial_hours: u8,
        lab_hours: u8,
    ) -> Self {
        Self {
            subject,
            faculty,
            batch,
            lecture_hours,
            tutorial_hours,
            lab_hours,
            lab_block_slots: 2,
        }
    }
}

/// A session pinned to one (slot, room) placement by an administrator.
///
/// Fixed classes take part in clash checking like any other session, but
/// their placement is a singleton domain: search never moves them and
/// mutation never touches them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedClass {
    pub subject: SubjectId,
    pub faculty: FacultyId,
    pub batch: BatchId,
    pub kind: SessionKind,
    pub duration_slots: u8,
    pub slot: SlotId,
    pub room: RoomId,
}
