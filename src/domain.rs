//! # Domain Generator
//!
//! Builds the static search space: for every session, the set of
//! (slot, room) placements that satisfy the hard constraints which do not
//! depend on other sessions' placements. Room kind and capacity,
//! availability rules, day-boundary fit for multi-slot sessions, and
//! exclusions forced by fixed classes are all applied here, once per run.
//!
//! Domain construction is a pure function of the problem instance, so
//! sessions are processed in parallel. An empty domain is a fatal,
//! actionable error naming the session and the requirement that emptied
//! it.

use rayon::prelude::*;

use crate::error::{EngineError, Result};
use crate::model::Placement;
use crate::problem::Problem;

/// Sessions below this count are processed sequentially; the parallel
/// split is not worth it for tiny instances.
const PARALLEL_THRESHOLD: usize = 16;

/// The per-session candidate domains for one run. Immutable once built.
#[derive(Debug, Clone)]
pub struct DomainSet {
    domains: Vec<Vec<Placement>>,
}

impl DomainSet {
    /// Builds the domain of every session, failing fast on the first
    /// session with no legal placement.
    pub fn build(problem: &Problem) -> Result<Self> {
        let indices: Vec<usize> = (0..problem.sessions().len()).collect();
        let domains: Result<Vec<Vec<Placement>>> = if indices.len() >= PARALLEL_THRESHOLD {
            indices
                .par_iter()
                .map(|&sidx| session_domain(problem, sidx))
                .collect()
        } else {
            indices
                .iter()
                .map(|&sidx| session_domain(problem, sidx))
                .collect()
        };
        let domains = domains?;
        tracing::debug!(
            sessions = domains.len(),
            placements = domains.iter().map(Vec::len).sum::<usize>(),
            "domains built"
        );
        Ok(Self { domains })
    }

    /// The candidate placements of session `sidx`.
    pub fn candidates(&self, sidx: usize) -> &[Placement] {
        &self.domains[sidx]
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

fn session_domain(problem: &Problem, sidx: usize) -> Result<Vec<Placement>> {
    let session = problem.session(sidx);

    // A pinned session has a singleton domain, but the pin must still
    // point at a usable room.
    if let Some(placement) = problem.fixed_placement(sidx) {
        let room = problem.room(placement.room);
        if room.is_lab != session.kind.needs_lab() {
            return Err(EngineError::DomainEmpty {
                session: problem.describe_session(sidx),
                requirement: format!(
                    "pinned to {} which {} a lab, but the session is a {}",
                    room.name,
                    if room.is_lab { "is" } else { "is not" },
                    session.kind
                ),
            });
        }
        if room.capacity < problem.batch_strength(session.batch) {
            return Err(EngineError::DomainEmpty {
                session: problem.describe_session(sidx),
                requirement: format!(
                    "pinned to {} with capacity {} below batch strength {}",
                    room.name,
                    room.capacity,
                    problem.batch_strength(session.batch)
                ),
            });
        }
        return Ok(vec![placement]);
    }

    let strength = problem.batch_strength(session.batch);
    let required_kind = problem.required_room_kind(session);

    let rooms: Vec<usize> = (0..problem.rooms().len())
        .filter(|&ridx| {
            let room = problem.room(ridx);
            room.is_lab == session.kind.needs_lab()
                && room.capacity >= strength
                && required_kind.map_or(true, |k| room.kind == k)
        })
        .collect();

    if rooms.is_empty() {
        let kind = if session.kind.needs_lab() {
            "lab"
        } else {
            "non-lab"
        };
        return Err(EngineError::DomainEmpty {
            session: problem.describe_session(sidx),
            requirement: format!(
                "no {} room with capacity >= {} exists",
                kind, strength
            ),
        });
    }

    let mut blocked_by: Vec<String> = Vec::new();
    let mut span_candidates = 0usize;
    let mut after_rules = Vec::new();

    for start in 0..problem.slots().len() {
        if !problem.span_fits(start, session.duration_slots) {
            continue;
        }
        for &ridx in &rooms {
            span_candidates += 1;
            let room_id = problem.room(ridx).id;
            let blocking_rule = problem.rules().iter().find(|rule| {
                problem
                    .covered(Placement::new(start, ridx), session.duration_slots)
                    .any(|slot| {
                        rule.blocks(session.faculty, session.batch, room_id, problem.slot(slot))
                    })
            });
            match blocking_rule {
                Some(rule) => {
                    let who = rule.subject_description();
                    if !blocked_by.contains(&who) {
                        blocked_by.push(who);
                    }
                }
                None => after_rules.push(Placement::new(start, ridx)),
            }
        }
    }

    if after_rules.is_empty() {
        let requirement = if span_candidates == 0 {
            format!(
                "no run of {} consecutive same-day slots exists in the catalog",
                session.duration_slots
            )
        } else {
            format!(
                "all {} placements fall inside declared unavailability of {}",
                span_candidates,
                blocked_by.join(", ")
            )
        };
        return Err(EngineError::DomainEmpty {
            session: problem.describe_session(sidx),
            requirement,
        });
    }

    // Placements that clash with a pinned class sharing a resource can
    // never appear in a feasible candidate; drop them now.
    let survivors: Vec<Placement> = after_rules
        .into_iter()
        .filter(|&p| {
            problem
                .fixed_placements()
                .filter(|&(other, _)| other != sidx)
                .all(|(other, fp)| problem.clash(sidx, p, other, fp).is_none())
        })
        .collect();

    if survivors.is_empty() {
        return Err(EngineError::DomainEmpty {
            session: problem.describe_session(sidx),
            requirement: "every remaining placement conflicts with a fixed class".to_string(),
        });
    }

    Ok(survivors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AvailabilityRule, Batch, BatchId, Faculty, FacultyId, Room, RoomId, RoomKindId, SlotId,
        Subject, SubjectId, TeachingAssignment, TimeSlot,
    };
    use crate::problem::Problem;

    fn slots_for_week(days: u8, per_day: u32) -> Vec<TimeSlot> {
        let mut slots = Vec::new();
        let mut id = 0;
        for day in 0..days {
            for i in 0..per_day {
                let start = 540 + (i as u16) * 60;
                slots.push(TimeSlot {
                    id: SlotId(id),
                    day,
                    start_minute: start,
                    end_minute: start + 60,
                });
                id += 1;
            }
        }
        slots
    }

    fn base_builder() -> crate::problem::ProblemBuilder {
        Problem::builder()
            .subjects(vec![Subject {
                id: SubjectId(1),
                name: "Databases".to_string(),
                required_room_kind: None,
            }])
            .faculty(vec![Faculty {
                id: FacultyId(1),
                name: "Dr. Iyer".to_string(),
            }])
            .batches(vec![Batch {
                id: BatchId(1),
                name: "CS-3B".to_string(),
                strength: 50,
            }])
            .slots(slots_for_week(5, 4))
    }

    #[test]
    fn capacity_filter_empties_domain_with_named_requirement() {
        let err = base_builder()
            .rooms(vec![Room {
                id: RoomId(1),
                name: "Small".to_string(),
                capacity: 20,
                kind: RoomKindId(0),
                is_lab: false,
            }])
            .assignments(vec![TeachingAssignment::new(
                SubjectId(1),
                FacultyId(1),
                BatchId(1),
                1,
                0,
                0,
            )])
            .build()
            .and_then(|p| DomainSet::build(&p).map(|_| ()))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("capacity >= 50"), "got: {msg}");
        assert!(msg.contains("Databases"), "got: {msg}");
    }

    #[test]
    fn unavailability_excludes_whole_days() {
        let p = base_builder()
            .rooms(vec![Room {
                id: RoomId(1),
                name: "R1".to_string(),
                capacity: 60,
                kind: RoomKindId(0),
                is_lab: false,
            }])
            .assignments(vec![TeachingAssignment::new(
                SubjectId(1),
                FacultyId(1),
                BatchId(1),
                1,
                0,
                0,
            )])
            .rules(vec![AvailabilityRule::FacultyUnavailable {
                faculty: FacultyId(1),
                days: vec![4],
                span: None,
            }])
            .build()
            .unwrap();
        let domains = DomainSet::build(&p).unwrap();
        for placement in domains.candidates(0) {
            assert_ne!(p.slot(placement.slot).day, 4);
        }
        // 4 days x 4 slots remain.
        assert_eq!(domains.candidates(0).len(), 16);
    }

    #[test]
    fn practicals_only_land_in_labs() {
        let p = base_builder()
            .rooms(vec![
                Room {
                    id: RoomId(1),
                    name: "R1".to_string(),
                    capacity: 60,
                    kind: RoomKindId(0),
                    is_lab: false,
                },
                Room {
                    id: RoomId(2),
                    name: "Lab-A".to_string(),
                    capacity: 60,
                    kind: RoomKindId(1),
                    is_lab: true,
                },
            ])
            .assignments(vec![TeachingAssignment::new(
                SubjectId(1),
                FacultyId(1),
                BatchId(1),
                0,
                0,
                2,
            )])
            .build()
            .unwrap();
        let domains = DomainSet::build(&p).unwrap();
        for placement in domains.candidates(0) {
            assert!(p.room(placement.room).is_lab);
        }
    }

    #[test]
    fn multi_slot_sessions_never_cross_days() {
        let p = base_builder()
            .rooms(vec![Room {
                id: RoomId(2),
                name: "Lab-A".to_string(),
                capacity: 60,
                kind: RoomKindId(1),
                is_lab: true,
            }])
            .assignments(vec![TeachingAssignment::new(
                SubjectId(1),
                FacultyId(1),
                BatchId(1),
                0,
                0,
                2,
            )])
            .build()
            .unwrap();
        let domains = DomainSet::build(&p).unwrap();
        let session = p.session(0);
        assert_eq!(session.duration_slots, 2);
        for placement in domains.candidates(0) {
            assert!(p.span_fits(placement.slot, 2));
        }
        // 3 starting positions per day x 5 days.
        assert_eq!(domains.candidates(0).len(), 15);
    }
}
