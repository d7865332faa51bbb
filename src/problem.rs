//! # Problem Instance
//!
//! The validated, immutable bundle of everything one generation run works
//! on: entity catalogs, the expanded session list, fixed placements,
//! availability rules, and the index structures the solvers share.
//!
//! Construction goes through [`ProblemBuilder`], which fails fast with
//! [`EngineError::Configuration`] on dangling references or malformed
//! catalogs so the search phases never have to re-check input integrity.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::{EngineError, Result};
use crate::model::{
    expand_sessions, AvailabilityRule, Batch, BatchId, ConstraintKind, Faculty, FacultyId,
    FacultyPreference, FixedClass, Placement, Room, RoomId, Session, SlotId, Subject, SubjectId,
    TeachingAssignment, TimeSlot, TimetableEntry,
};

/// Builder for [`Problem`].
///
/// All inputs are plain record lists; `build` validates them as a whole.
#[derive(Debug, Default, Clone)]
pub struct ProblemBuilder {
    subjects: Vec<Subject>,
    faculty: Vec<Faculty>,
    batches: Vec<Batch>,
    rooms: Vec<Room>,
    slots: Vec<TimeSlot>,
    assignments: Vec<TeachingAssignment>,
    fixed_classes: Vec<FixedClass>,
    rules: Vec<AvailabilityRule>,
    preferences: Vec<FacultyPreference>,
}

impl ProblemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subjects(mut self, subjects: Vec<Subject>) -> Self {
        self.subjects = subjects;
        self
    }

    pub fn faculty(mut self, faculty: Vec<Faculty>) -> Self {
        self.faculty = faculty;
        self
    }

    pub fn batches(mut self, batches: Vec<Batch>) -> Self {
        self.batches = batches;
        self
    }

    pub fn rooms(mut self, rooms: Vec<Room>) -> Self {
        self.rooms = rooms;
        self
    }

    pub fn slots(mut self, slots: Vec<TimeSlot>) -> Self {
        self.slots = slots;
        self
    }

    pub fn assignments(mut self, assignments: Vec<TeachingAssignment>) -> Self {
        self.assignments = assignments;
        self
    }

    pub fn fixed_classes(mut self, fixed_classes: Vec<FixedClass>) -> Self {
        self.fixed_classes = fixed_classes;
        self
    }

    pub fn rules(mut self, rules: Vec<AvailabilityRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn preferences(mut self, preferences: Vec<FacultyPreference>) -> Self {
        self.preferences = preferences;
        self
    }

    /// Validates the records and assembles the immutable instance.
    pub fn build(self) -> Result<Problem> {
        if self.slots.is_empty() {
            return Err(EngineError::Configuration(
                "time slot catalog is empty".to_string(),
            ));
        }
        if self.rooms.is_empty() {
            return Err(EngineError::Configuration("no rooms supplied".to_string()));
        }
        if self.assignments.is_empty() && self.fixed_classes.is_empty() {
            return Err(EngineError::Configuration(
                "nothing to schedule: no teaching assignments or fixed classes".to_string(),
            ));
        }

        let mut slots = self.slots;
        slots.sort_by_key(|s| (s.day, s.start_minute, s.end_minute));

        let slot_index = unique_index(slots.iter().map(|s| s.id), "time slot")?;
        let room_index = unique_index(self.rooms.iter().map(|r| r.id), "room")?;
        let subject_index = unique_index(self.subjects.iter().map(|s| s.id), "subject")?;
        let faculty_index = unique_index(self.faculty.iter().map(|f| f.id), "faculty")?;
        let batch_index = unique_index(self.batches.iter().map(|b| b.id), "batch")?;

        for a in &self.assignments {
            check_ref(&subject_index, a.subject, "teaching assignment")?;
            check_ref(&faculty_index, a.faculty, "teaching assignment")?;
            check_ref(&batch_index, a.batch, "teaching assignment")?;
        }
        for fc in &self.fixed_classes {
            check_ref(&subject_index, fc.subject, "fixed class")?;
            check_ref(&faculty_index, fc.faculty, "fixed class")?;
            check_ref(&batch_index, fc.batch, "fixed class")?;
            check_ref(&slot_index, fc.slot, "fixed class")?;
            check_ref(&room_index, fc.room, "fixed class")?;
        }
        for rule in &self.rules {
            match rule {
                AvailabilityRule::FacultyUnavailable { faculty, .. } => {
                    check_ref(&faculty_index, *faculty, "availability rule")?
                }
                AvailabilityRule::BatchUnavailable { batch, .. } => {
                    check_ref(&batch_index, *batch, "availability rule")?
                }
                AvailabilityRule::RoomUnavailable { room, .. } => {
                    check_ref(&room_index, *room, "availability rule")?
                }
            }
        }
        for pref in &self.preferences {
            check_ref(&faculty_index, pref.faculty, "faculty preference")?;
        }

        let (sessions, fixed_offset) = expand_sessions(&self.assignments, &self.fixed_classes);

        let mut fixed: Vec<Option<Placement>> = vec![None; sessions.len()];
        for (i, fc) in self.fixed_classes.iter().enumerate() {
            let sidx = fixed_offset + i;
            let placement = Placement::new(slot_index[&fc.slot], room_index[&fc.room]);
            fixed[sidx] = Some(placement);
        }

        let mut sessions_by_faculty: HashMap<FacultyId, Vec<usize>> = HashMap::new();
        let mut sessions_by_batch: HashMap<BatchId, Vec<usize>> = HashMap::new();
        for (i, s) in sessions.iter().enumerate() {
            sessions_by_faculty.entry(s.faculty).or_default().push(i);
            sessions_by_batch.entry(s.batch).or_default().push(i);
        }

        let problem = Problem {
            subjects: self.subjects,
            faculty: self.faculty,
            batches: self.batches,
            rooms: self.rooms,
            slots,
            sessions,
            fixed,
            rules: self.rules,
            preferences: self.preferences,
            slot_index,
            room_index,
            subject_index,
            faculty_index,
            batch_index,
            sessions_by_faculty,
            sessions_by_batch,
        };

        for (sidx, placement) in problem.fixed_placements() {
            if !problem.span_fits(placement.slot, problem.sessions[sidx].duration_slots) {
                return Err(EngineError::Configuration(format!(
                    "fixed class {} does not fit at its pinned slot: \
                     {} consecutive same-day slots required",
                    problem.describe_session(sidx),
                    problem.sessions[sidx].duration_slots
                )));
            }
        }

        Ok(problem)
    }
}

fn unique_index<I, K>(ids: I, what: &str) -> Result<HashMap<K, usize>>
where
    I: Iterator<Item = K>,
    K: std::hash::Hash + Eq + std::fmt::Display + Copy,
{
    let mut map = HashMap::new();
    for (i, id) in ids.enumerate() {
        if map.insert(id, i).is_some() {
            return Err(EngineError::Configuration(format!(
                "duplicate {} id: {}",
                what, id
            )));
        }
    }
    Ok(map)
}

fn check_ref<K>(index: &HashMap<K, usize>, id: K, referrer: &str) -> Result<()>
where
    K: std::hash::Hash + Eq + std::fmt::Display + Copy,
{
    if index.contains_key(&id) {
        Ok(())
    } else {
        Err(EngineError::Configuration(format!(
            "{} references unknown {}",
            referrer, id
        )))
    }
}

/// The immutable problem instance one generation run works on.
#[derive(Debug, Clone)]
pub struct Problem {
    subjects: Vec<Subject>,
    faculty: Vec<Faculty>,
    batches: Vec<Batch>,
    rooms: Vec<Room>,
    slots: Vec<TimeSlot>,
    sessions: Vec<Session>,
    fixed: Vec<Option<Placement>>,
    rules: Vec<AvailabilityRule>,
    preferences: Vec<FacultyPreference>,
    slot_index: HashMap<SlotId, usize>,
    room_index: HashMap<RoomId, usize>,
    subject_index: HashMap<SubjectId, usize>,
    faculty_index: HashMap<FacultyId, usize>,
    batch_index: HashMap<BatchId, usize>,
    sessions_by_faculty: HashMap<FacultyId, Vec<usize>>,
    sessions_by_batch: HashMap<BatchId, Vec<usize>>,
}

impl Problem {
    pub fn builder() -> ProblemBuilder {
        ProblemBuilder::new()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, idx: usize) -> &Session {
        &self.sessions[idx]
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn slot(&self, idx: usize) -> &TimeSlot {
        &self.slots[idx]
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, idx: usize) -> &Room {
        &self.rooms[idx]
    }

    pub fn rules(&self) -> &[AvailabilityRule] {
        &self.rules
    }

    pub fn preferences(&self) -> &[FacultyPreference] {
        &self.preferences
    }

    /// Preference windows declared by the given faculty member.
    pub fn preferences_of(&self, faculty: FacultyId) -> impl Iterator<Item = &FacultyPreference> {
        self.preferences.iter().filter(move |p| p.faculty == faculty)
    }

    pub fn is_fixed(&self, sidx: usize) -> bool {
        self.fixed[sidx].is_some()
    }

    pub fn fixed_placement(&self, sidx: usize) -> Option<Placement> {
        self.fixed[sidx]
    }

    /// All pinned sessions with their placements.
    pub fn fixed_placements(&self) -> impl Iterator<Item = (usize, Placement)> + '_ {
        self.fixed
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|p| (i, p)))
    }

    /// Indices of the sessions search must place, in session order.
    pub fn free_sessions(&self) -> Vec<usize> {
        (0..self.sessions.len())
            .filter(|&i| !self.is_fixed(i))
            .collect()
    }

    pub fn batch_strength(&self, batch: BatchId) -> u16 {
        self.batch_index
            .get(&batch)
            .map(|&i| self.batches[i].strength)
            .unwrap_or(0)
    }

    /// Whether a session of the given duration starting at slot `start`
    /// stays within one day of adjacent catalog slots.
    pub fn span_fits(&self, start: usize, duration: u8) -> bool {
        let end = start + duration as usize;
        if end > self.slots.len() {
            return false;
        }
        let day = self.slots[start].day;
        self.slots[start..end].iter().all(|s| s.day == day)
    }

    /// The catalog slots covered by a placement of the given duration.
    pub fn covered(&self, placement: Placement, duration: u8) -> Range<usize> {
        placement.slot..placement.slot + duration as usize
    }

    /// Whether two placements occupy overlapping time.
    ///
    /// Valid spans never cross a day boundary, so overlapping index
    /// ranges imply the same day.
    pub fn spans_overlap(&self, a: Placement, da: u8, b: Placement, db: u8) -> bool {
        let ra = self.covered(a, da);
        let rb = self.covered(b, db);
        ra.start < rb.end && rb.start < ra.end
    }

    /// The hard clash, if any, between two placed sessions.
    pub fn clash(
        &self,
        a: usize,
        pa: Placement,
        b: usize,
        pb: Placement,
    ) -> Option<ConstraintKind> {
        let sa = &self.sessions[a];
        let sb = &self.sessions[b];
        if !self.spans_overlap(pa, sa.duration_slots, pb, sb.duration_slots) {
            return None;
        }
        if sa.faculty == sb.faculty {
            Some(ConstraintKind::FacultyClash)
        } else if sa.batch == sb.batch {
            Some(ConstraintKind::BatchClash)
        } else if pa.room == pb.room {
            Some(ConstraintKind::RoomClash)
        } else {
            None
        }
    }

    /// All hard clash kinds between two placed sessions. Unlike
    /// [`Problem::clash`] this does not stop at the first matching
    /// resource, which is what conflict reporting needs.
    pub fn clash_kinds(
        &self,
        a: usize,
        pa: Placement,
        b: usize,
        pb: Placement,
    ) -> Vec<ConstraintKind> {
        let sa = &self.sessions[a];
        let sb = &self.sessions[b];
        if !self.spans_overlap(pa, sa.duration_slots, pb, sb.duration_slots) {
            return Vec::new();
        }
        let mut kinds = Vec::new();
        if sa.faculty == sb.faculty {
            kinds.push(ConstraintKind::FacultyClash);
        }
        if sa.batch == sb.batch {
            kinds.push(ConstraintKind::BatchClash);
        }
        if pa.room == pb.room {
            kinds.push(ConstraintKind::RoomClash);
        }
        kinds
    }

    /// Whether placing session `sidx` at `placement` clashes with any
    /// other session of `candidate`.
    pub fn placement_conflicts(
        &self,
        candidate: &crate::model::Candidate,
        sidx: usize,
        placement: Placement,
    ) -> bool {
        (0..self.sessions.len())
            .filter(|&other| other != sidx)
            .any(|other| self.clash(sidx, placement, other, candidate.placement(other)).is_some())
    }

    pub fn subject_name(&self, id: SubjectId) -> &str {
        self.subject_index
            .get(&id)
            .map(|&i| self.subjects[i].name.as_str())
            .unwrap_or("?")
    }

    pub fn faculty_name(&self, id: FacultyId) -> &str {
        self.faculty_index
            .get(&id)
            .map(|&i| self.faculty[i].name.as_str())
            .unwrap_or("?")
    }

    pub fn batch_name(&self, id: BatchId) -> &str {
        self.batch_index
            .get(&id)
            .map(|&i| self.batches[i].name.as_str())
            .unwrap_or("?")
    }

    /// The room kind required by a session, if any: practicals require
    /// labs, and a subject may pin a specific room category.
    pub fn required_room_kind(&self, session: &Session) -> Option<crate::model::RoomKindId> {
        self.subject_index
            .get(&session.subject)
            .and_then(|&i| self.subjects[i].required_room_kind)
    }

    /// Human-readable description of a session with entity names.
    pub fn describe_session(&self, sidx: usize) -> String {
        let s = &self.sessions[sidx];
        format!(
            "{} {} for {} by {}",
            self.subject_name(s.subject),
            s.kind,
            self.batch_name(s.batch),
            self.faculty_name(s.faculty),
        )
    }

    /// Sessions taught by the given faculty member.
    pub fn sessions_of_faculty(&self, faculty: FacultyId) -> &[usize] {
        self.sessions_by_faculty
            .get(&faculty)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sessions attended by the given batch.
    pub fn sessions_of_batch(&self, batch: BatchId) -> &[usize] {
        self.sessions_by_batch
            .get(&batch)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Faculty members appearing in at least one session.
    pub fn active_faculty(&self) -> impl Iterator<Item = FacultyId> + '_ {
        self.sessions_by_faculty.keys().copied()
    }

    /// Batches appearing in at least one session.
    pub fn active_batches(&self) -> impl Iterator<Item = BatchId> + '_ {
        self.sessions_by_batch.keys().copied()
    }

    /// Converts one placed session into its boundary shape.
    pub fn timetable_entry(&self, sidx: usize, placement: Placement) -> TimetableEntry {
        let s = &self.sessions[sidx];
        let first = &self.slots[placement.slot];
        let last = &self.slots[placement.slot + s.duration_slots as usize - 1];
        TimetableEntry {
            subject: s.subject,
            faculty: s.faculty,
            batch: s.batch,
            room: self.rooms[placement.room].id,
            kind: s.kind,
            day: first.day,
            start_minute: first.start_minute,
            end_minute: last.end_minute,
        }
    }

    /// Share of (slot, room) pairs occupied by a candidate, 0 to 100.
    pub fn room_utilization(&self, candidate: &crate::model::Candidate) -> f64 {
        let total = self.slots.len() * self.rooms.len();
        if total == 0 {
            return 0.0;
        }
        let mut used = std::collections::HashSet::new();
        for (sidx, s) in self.sessions.iter().enumerate() {
            let p = candidate.placement(sidx);
            for slot in self.covered(p, s.duration_slots) {
                used.insert((slot, p.room));
            }
        }
        used.len() as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_kind_subjects(names: &[(u32, &str)]) -> Vec<Subject> {
        names
            .iter()
            .map(|&(id, name)| Subject {
                id: SubjectId(id),
                name: name.to_string(),
                required_room_kind: None,
            })
            .collect()
    }

    fn slot(id: u32, day: u8, start: u16) -> TimeSlot {
        TimeSlot {
            id: SlotId(id),
            day,
            start_minute: start,
            end_minute: start + 60,
        }
    }

    fn small_problem() -> Problem {
        Problem::builder()
            .subjects(single_kind_subjects(&[(1, "Algorithms")]))
            .faculty(vec![Faculty {
                id: FacultyId(1),
                name: "Dr. Rao".to_string(),
            }])
            .batches(vec![Batch {
                id: BatchId(1),
                name: "CS-2A".to_string(),
                strength: 40,
            }])
            .rooms(vec![Room {
                id: RoomId(1),
                name: "R101".to_string(),
                capacity: 60,
                kind: crate::model::RoomKindId(0),
                is_lab: false,
            }])
            .slots(vec![slot(0, 0, 540), slot(1, 0, 600), slot(2, 1, 540)])
            .assignments(vec![TeachingAssignment::new(
                SubjectId(1),
                FacultyId(1),
                BatchId(1),
                2,
                0,
                0,
            )])
            .build()
            .unwrap()
    }

    #[test]
    fn builder_sorts_slots_and_expands_sessions() {
        let p = small_problem();
        assert_eq!(p.sessions().len(), 2);
        assert!(p.slots().windows(2).all(|w| {
            (w[0].day, w[0].start_minute) <= (w[1].day, w[1].start_minute)
        }));
    }

    #[test]
    fn builder_rejects_dangling_assignment() {
        let err = Problem::builder()
            .subjects(single_kind_subjects(&[(1, "Algorithms")]))
            .faculty(vec![Faculty {
                id: FacultyId(1),
                name: "Dr. Rao".to_string(),
            }])
            .batches(vec![Batch {
                id: BatchId(1),
                name: "CS-2A".to_string(),
                strength: 40,
            }])
            .rooms(vec![Room {
                id: RoomId(1),
                name: "R101".to_string(),
                capacity: 60,
                kind: crate::model::RoomKindId(0),
                is_lab: false,
            }])
            .slots(vec![slot(0, 0, 540)])
            .assignments(vec![TeachingAssignment::new(
                SubjectId(99),
                FacultyId(1),
                BatchId(1),
                1,
                0,
                0,
            )])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown subject#99"));
    }

    #[test]
    fn clash_detects_shared_faculty_overlap() {
        let p = small_problem();
        let a = Placement::new(0, 0);
        let b = Placement::new(0, 0);
        assert_eq!(p.clash(0, a, 1, b), Some(ConstraintKind::FacultyClash));
        let apart = Placement::new(1, 0);
        assert_eq!(p.clash(0, a, 1, apart), None);
    }

    #[test]
    fn span_fits_respects_day_boundaries() {
        let p = small_problem();
        assert!(p.span_fits(0, 2)); // two slots on day 0
        assert!(!p.span_fits(1, 2)); // crosses into day 1
        assert!(!p.span_fits(2, 2)); // runs off the catalog
    }

    #[test]
    fn timetable_entry_carries_slot_times_and_room_id() {
        let p = small_problem();
        let entry = p.timetable_entry(0, Placement::new(1, 0));
        assert_eq!(entry.day, 0);
        assert_eq!(entry.start_minute, 600);
        assert_eq!(entry.end_minute, 660);
        assert_eq!(entry.room, RoomId(1));
    }

    #[test]
    fn describe_session_uses_entity_names() {
        let p = small_problem();
        let description = p.describe_session(0);
        assert!(description.contains("Algorithms"));
        assert!(description.contains("CS-2A"));
        assert!(description.contains("Dr. Rao"));
    }
}
