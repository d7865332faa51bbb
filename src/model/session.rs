//! Session expansion.
//!
//! A [`TeachingAssignment`](super::TeachingAssignment) states how many
//! weekly hours of each kind a subject needs for a batch. The engine
//! schedules discrete session instances, so assignments are expanded once
//! per run into the flat session list every other component indexes into.

use std::fmt;

use super::{BatchId, FacultyId, FixedClass, SessionId, SubjectId, TeachingAssignment};

/// The kind of a teaching session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionKind {
    Lecture,
    Tutorial,
    Practical,
}

impl SessionKind {
    /// Practicals must be placed in lab rooms; everything else must not.
    pub fn needs_lab(self) -> bool {
        matches!(self, SessionKind::Practical)
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Lecture => write!(f, "lecture"),
            SessionKind::Tutorial => write!(f, "tutorial"),
            SessionKind::Practical => write!(f, "practical"),
        }
    }
}

/// One required teaching unit to be placed on the calendar.
///
/// Immutable for the duration of a generation run. `duration_slots`
/// consecutive catalog slots on one day are consumed by the placement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Session {
    pub id: SessionId,
    pub subject: SubjectId,
    pub faculty: FacultyId,
    pub batch: BatchId,
    pub kind: SessionKind,
    pub duration_slots: u8,
}

impl Session {
    /// Short human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        format!(
            "{} ({} for {} by {})",
            self.id, self.kind, self.batch, self.faculty
        )
    }
}

/// Expands teaching assignments and fixed classes into the run's session
/// list.
///
/// Each assignment contributes `lecture_hours` single-slot lectures,
/// `tutorial_hours` single-slot tutorials, and its lab hours grouped into
/// practical blocks of `lab_block_slots` consecutive slots (the final
/// block is shorter when the hours do not divide evenly). Fixed classes
/// are appended last; the returned offset is the index of the first fixed
/// session.
pub fn expand_sessions(
    assignments: &[TeachingAssignment],
    fixed: &[FixedClass],
) -> (Vec<Session>, usize) {
    fn push(
        sessions: &mut Vec<Session>,
        subject: SubjectId,
        faculty: FacultyId,
        batch: BatchId,
        kind: SessionKind,
        duration_slots: u8,
    ) {
        let id = SessionId(sessions.len() as u32);
        sessions.push(Session {
            id,
            subject,
            faculty,
            batch,
            kind,
            duration_slots,
        });
    }

    let mut sessions = Vec::new();
    for a in assignments {
        for _ in 0..a.lecture_hours {
            push(&mut sessions, a.subject, a.faculty, a.batch, SessionKind::Lecture, 1);
        }
        for _ in 0..a.tutorial_hours {
            push(&mut sessions, a.subject, a.faculty, a.batch, SessionKind::Tutorial, 1);
        }
        let block = a.lab_block_slots.max(1);
        let mut remaining = a.lab_hours;
        while remaining > 0 {
            let d = remaining.min(block);
            push(&mut sessions, a.subject, a.faculty, a.batch, SessionKind::Practical, d);
            remaining -= d;
        }
    }

    let fixed_offset = sessions.len();
    for fc in fixed {
        push(
            &mut sessions,
            fc.subject,
            fc.faculty,
            fc.batch,
            fc.kind,
            fc.duration_slots.max(1),
        );
    }

    (sessions, fixed_offset)
}
