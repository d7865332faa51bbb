use std::sync::Arc;
use std::thread;
use std::time::Duration;

use timetablegen::config::{Algorithm, GenerationRequest};
use timetablegen::job::{FailureKind, JobId, JobResult, JobState, Orchestrator};
use timetablegen::model::{
    Batch, BatchId, Faculty, FacultyId, FacultyPreference, Room, RoomId, RoomKindId, SlotId,
    Subject, SubjectId, TeachingAssignment, TimeRange, TimeSlot,
};
use timetablegen::problem::Problem;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn week_slots(days: u8, per_day: u32) -> Vec<TimeSlot> {
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

fn subject(id: u32, name: &str) -> Subject {
    Subject {
        id: SubjectId(id),
        name: name.to_string(),
        required_room_kind: None,
    }
}

fn medium_problem(days: u8, per_day: u32) -> Arc<Problem> {
    Arc::new(
        Problem::builder()
            .subjects(vec![subject(1, "Fields"), subject(2, "Waves")])
            .faculty(vec![
                Faculty {
                    id: FacultyId(1),
                    name: "Dr. X".to_string(),
                },
                Faculty {
                    id: FacultyId(2),
                    name: "Dr. Y".to_string(),
                },
            ])
            .batches(vec![
                Batch {
                    id: BatchId(1),
                    name: "B1".to_string(),
                    strength: 30,
                },
                Batch {
                    id: BatchId(2),
                    name: "B2".to_string(),
                    strength: 30,
                },
            ])
            .rooms(vec![
                Room {
                    id: RoomId(1),
                    name: "R1".to_string(),
                    capacity: 50,
                    kind: RoomKindId(0),
                    is_lab: false,
                },
                Room {
                    id: RoomId(2),
                    name: "R2".to_string(),
                    capacity: 50,
                    kind: RoomKindId(0),
                    is_lab: false,
                },
            ])
            .slots(week_slots(days, per_day))
            .assignments(vec![
                TeachingAssignment::new(SubjectId(1), FacultyId(1), BatchId(1), 4, 0, 0),
                TeachingAssignment::new(SubjectId(2), FacultyId(2), BatchId(2), 4, 0, 0),
            ])
            .preferences(vec![
                FacultyPreference {
                    faculty: FacultyId(1),
                    days: vec![0, 1, 2, 3, 4],
                    span: TimeRange {
                        start_minute: 720,
                        end_minute: 1440,
                    },
                },
            ])
            .build()
            .unwrap(),
    )
}

fn wait_for<F: Fn(JobState) -> bool>(
    orchestrator: &Orchestrator,
    id: JobId,
    pred: F,
    timeout: Duration,
) -> JobState {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let state = orchestrator.status(id).unwrap().state;
        if pred(state) {
            return state;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "timed out waiting; last state {state:?}"
        );
        thread::sleep(Duration::from_millis(5));
    }
}

/// A hybrid job runs to completion and returns ranked, feasible
/// timetables with itemized violations.
#[test]
fn hybrid_job_returns_ranked_timetables() {
    init_tracing();
    let orchestrator = Orchestrator::with_workers(2);
    let request = GenerationRequest::builder()
        .algorithm(Algorithm::Hybrid)
        .population_size(20)
        .max_generations(30)
        .time_limit(Duration::from_secs(30))
        .top_k(3)
        .seed(11)
        .build()
        .unwrap();
    let id = orchestrator.submit(medium_problem(5, 5), request);
    wait_for(&orchestrator, id, JobState::is_terminal, Duration::from_secs(60));

    let status = orchestrator.status(id).unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.progress, 100);

    let Some(JobResult::Completed(timetables)) = orchestrator.result(id) else {
        panic!("expected a completed result");
    };
    assert!(!timetables.is_empty());
    assert!(timetables.len() <= 3);
    for pair in timetables.windows(2) {
        assert!(pair[0].cost <= pair[1].cost);
    }
    for timetable in &timetables {
        assert_eq!(timetable.metrics.hard_violations, 0);
        assert_eq!(timetable.entries.len(), 8);
    }
}

/// Progress only ever moves forward while a job runs.
#[test]
fn progress_is_monotonic() {
    init_tracing();
    let orchestrator = Orchestrator::with_workers(1);
    let request = GenerationRequest::builder()
        .algorithm(Algorithm::Hybrid)
        .population_size(20)
        .max_generations(200)
        .stall_generations(10_000)
        .time_limit(Duration::from_secs(60))
        .seed(13)
        .build()
        .unwrap();
    let id = orchestrator.submit(medium_problem(5, 5), request);

    let mut samples = Vec::new();
    loop {
        let status = orchestrator.status(id).unwrap();
        samples.push(status.progress);
        if status.state.is_terminal() {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    for pair in samples.windows(2) {
        assert!(pair[1] >= pair[0], "progress went backwards: {samples:?}");
    }
    assert_eq!(*samples.last().unwrap(), 100);
}

/// Cancelling a running job lands it in `cancelled` at the next
/// checkpoint, and no result is ever exposed for it.
#[test]
fn cancelled_jobs_never_expose_results() {
    init_tracing();
    let orchestrator = Orchestrator::with_workers(1);
    let request = GenerationRequest::builder()
        .algorithm(Algorithm::Genetic)
        .population_size(40)
        .max_generations(1_000_000)
        .stall_generations(1_000_000)
        .time_limit(Duration::from_secs(600))
        .seed(17)
        .build()
        .unwrap();
    let id = orchestrator.submit(medium_problem(5, 6), request);

    wait_for(
        &orchestrator,
        id,
        |s| s == JobState::Running,
        Duration::from_secs(10),
    );
    thread::sleep(Duration::from_millis(50));
    assert!(orchestrator.cancel(id));

    let state = wait_for(&orchestrator, id, JobState::is_terminal, Duration::from_secs(30));
    assert_eq!(state, JobState::Cancelled);
    assert!(orchestrator.result(id).is_none());
}

/// An impossible instance fails the job with a structured infeasibility
/// reason, not a crash.
#[test]
fn infeasible_jobs_fail_with_structured_reason() {
    init_tracing();
    let orchestrator = Orchestrator::with_workers(1);
    let request = GenerationRequest::builder()
        .algorithm(Algorithm::CspOnly)
        .time_limit(Duration::from_secs(30))
        .build()
        .unwrap();
    // Each faculty needs four distinct slots; only two exist.
    let id = orchestrator.submit(medium_problem(2, 1), request);
    wait_for(&orchestrator, id, JobState::is_terminal, Duration::from_secs(60));

    let status = orchestrator.status(id).unwrap();
    assert_eq!(status.state, JobState::Failed);

    let Some(JobResult::Failed(reason)) = orchestrator.result(id) else {
        panic!("expected a failure reason");
    };
    assert_eq!(reason.kind, FailureKind::Infeasible);
    assert!(!reason.message.is_empty());
}

/// Cancelling a job that is still queued cancels it before it starts.
#[test]
fn pending_jobs_cancel_immediately() {
    // One worker, keep it busy with a long job first.
    let orchestrator = Orchestrator::with_workers(1);
    let busy = GenerationRequest::builder()
        .algorithm(Algorithm::Genetic)
        .population_size(40)
        .max_generations(1_000_000)
        .stall_generations(1_000_000)
        .time_limit(Duration::from_secs(600))
        .build()
        .unwrap();
    let blocker = orchestrator.submit(medium_problem(5, 6), busy);

    let quick = GenerationRequest::builder()
        .algorithm(Algorithm::CspOnly)
        .time_limit(Duration::from_secs(5))
        .build()
        .unwrap();
    let queued = orchestrator.submit(medium_problem(5, 5), quick);

    wait_for(
        &orchestrator,
        blocker,
        |s| s == JobState::Running,
        Duration::from_secs(10),
    );
    assert_eq!(orchestrator.status(queued).unwrap().state, JobState::Pending);
    assert!(orchestrator.cancel(queued));
    assert_eq!(
        orchestrator.status(queued).unwrap().state,
        JobState::Cancelled
    );
    assert!(orchestrator.result(queued).is_none());

    // Unblock the worker so the test tears down quickly.
    orchestrator.cancel(blocker);
    wait_for(&orchestrator, blocker, JobState::is_terminal, Duration::from_secs(30));
}
