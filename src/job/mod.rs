//! # Job Orchestrator
//!
//! Owns the lifecycle of generation jobs: `pending` to `running` to one
//! of `completed`, `failed`, or `cancelled`, with no transitions out of a
//! terminal state.
//!
//! Jobs are queued FIFO into a bounded pool of worker threads. Each
//! running job executes the full pipeline on its own worker with its own
//! problem instance and candidates; no mutable state is shared between
//! jobs. Workers report progress through a callback into the job table,
//! where it is clamped monotonically non-decreasing, and observe
//! cancellation cooperatively between search frames and optimizer
//! generations.
//!
//! Every pipeline failure is captured here and converted into a
//! structured, user-displayable [`FailureReason`]; nothing escapes as a
//! panic or a raw error chain. Cancelled jobs never expose a result.

mod pipeline;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::SystemTime;

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::config::GenerationRequest;
use crate::csp::ProgressFn;
use crate::error::EngineError;
use crate::model::Timetable;
use crate::problem::Problem;

/// Identifier of a generation job, unique within one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// The state machine of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// A point-in-time snapshot of a job, as returned by
/// [`Orchestrator::status`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobStatus {
    pub state: JobState,
    /// 0 to 100, monotonically non-decreasing over the job's lifetime.
    pub progress: u8,
    pub message: String,
    pub created_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
}

/// Coarse classification of a failure, for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailureKind {
    /// A session has no legal placement at all.
    EmptyDomain,
    /// The constraints are contradictory; no timetable exists.
    Infeasible,
    /// The time budget ran out before a conclusion; a larger limit may
    /// succeed.
    Timeout,
    /// The request or input data was rejected up front.
    InvalidRequest,
    /// Anything the engine did not expect.
    Internal,
}

/// A structured, user-displayable failure reason.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    fn from_error(error: &EngineError) -> Self {
        let (kind, message) = match error {
            EngineError::DomainEmpty { .. } => (FailureKind::EmptyDomain, error.to_string()),
            EngineError::Infeasible(_) => (FailureKind::Infeasible, error.to_string()),
            EngineError::Timeout { .. } => (
                FailureKind::Timeout,
                format!("{error}; a larger time limit may succeed"),
            ),
            EngineError::Configuration(_) => (FailureKind::InvalidRequest, error.to_string()),
            EngineError::Cancelled | EngineError::EmptyPopulation => {
                (FailureKind::Internal, error.to_string())
            }
        };
        Self { kind, message }
    }
}

/// The terminal outcome of a job, as returned by
/// [`Orchestrator::result`].
#[derive(Debug, Clone)]
pub enum JobResult {
    /// Ranked timetables, ascending by cost.
    Completed(Vec<Timetable>),
    Failed(FailureReason),
}

struct JobRecord {
    state: JobState,
    progress: u8,
    message: String,
    created_at: SystemTime,
    started_at: Option<SystemTime>,
    completed_at: Option<SystemTime>,
    cancel: CancelToken,
    result: Option<JobResult>,
}

struct Queued {
    id: JobId,
    problem: Arc<Problem>,
    request: GenerationRequest,
}

struct Shared {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    next_id: AtomicU64,
}

impl Shared {
    fn with_job<R>(&self, id: JobId, f: impl FnOnce(&mut JobRecord) -> R) -> Option<R> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get_mut(&id).map(f)
    }

    /// Progress is only advanced, never rewound, and only while running.
    fn update_progress(&self, id: JobId, pct: u8) {
        self.with_job(id, |job| {
            if job.state == JobState::Running {
                job.progress = job.progress.max(pct.min(100));
            }
        });
    }
}

/// The generation job orchestrator and worker pool.
///
/// Dropping the orchestrator closes the queue; workers finish their
/// current job and exit.
pub struct Orchestrator {
    shared: Arc<Shared>,
    sender: Option<Sender<Queued>>,
    _workers: Vec<thread::JoinHandle<()>>,
}

impl Orchestrator {
    /// An orchestrator with two workers, enough to overlap a long job
    /// with a short one.
    pub fn new() -> Self {
        Self::with_workers(2)
    }

    pub fn with_workers(count: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Queued>();
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(Shared {
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        });
        let workers = (0..count.max(1))
            .map(|i| {
                let receiver = Arc::clone(&receiver);
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("timetable-worker-{i}"))
                    .spawn(move || worker_loop(receiver, shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self {
            shared,
            sender: Some(sender),
            _workers: workers,
        }
    }

    /// Queues a generation job and returns its id immediately.
    pub fn submit(&self, problem: Arc<Problem>, request: GenerationRequest) -> JobId {
        let id = JobId(self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        {
            let mut jobs = self
                .shared
                .jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            jobs.insert(
                id,
                JobRecord {
                    state: JobState::Pending,
                    progress: 0,
                    message: "queued".to_string(),
                    created_at: SystemTime::now(),
                    started_at: None,
                    completed_at: None,
                    cancel: CancelToken::new(),
                    result: None,
                },
            );
        }
        let dispatched = self
            .sender
            .as_ref()
            .map(|tx| {
                tx.send(Queued {
                    id,
                    problem,
                    request,
                })
                .is_ok()
            })
            .unwrap_or(false);
        if !dispatched {
            self.shared.with_job(id, |job| {
                job.state = JobState::Failed;
                job.completed_at = Some(SystemTime::now());
                job.message = "worker pool is not accepting jobs".to_string();
                job.result = Some(JobResult::Failed(FailureReason {
                    kind: FailureKind::Internal,
                    message: job.message.clone(),
                }));
            });
        }
        info!(%id, "job submitted");
        id
    }

    /// Snapshot of a job's state, progress, and message.
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.shared.with_job(id, |job| JobStatus {
            state: job.state,
            progress: job.progress,
            message: job.message.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        })
    }

    /// Requests cooperative cancellation. Pending jobs are cancelled
    /// immediately; running jobs stop at their next checkpoint. Returns
    /// whether a non-terminal job was found.
    pub fn cancel(&self, id: JobId) -> bool {
        self.shared
            .with_job(id, |job| {
                if job.state.is_terminal() {
                    return false;
                }
                job.cancel.cancel();
                if job.state == JobState::Pending {
                    job.state = JobState::Cancelled;
                    job.completed_at = Some(SystemTime::now());
                    job.message = "cancelled before start".to_string();
                } else {
                    job.message = "cancellation requested".to_string();
                }
                info!(%id, "cancellation requested");
                true
            })
            .unwrap_or(false)
    }

    /// The terminal outcome of a job. `None` while the job is still
    /// pending or running, and forever `None` for cancelled jobs.
    pub fn result(&self, id: JobId) -> Option<JobResult> {
        self.shared.with_job(id, |job| job.result.clone()).flatten()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Closing the channel lets idle workers exit; busy workers
        // finish their current job first.
        self.sender.take();
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Queued>>>, shared: Arc<Shared>) {
    loop {
        let queued = {
            let guard = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            guard.recv()
        };
        match queued {
            Ok(job) => run_job(&shared, job),
            Err(_) => break,
        }
    }
}

fn run_job(shared: &Arc<Shared>, queued: Queued) {
    let Queued {
        id,
        problem,
        request,
    } = queued;

    let claimed = shared
        .with_job(id, |job| {
            if job.state != JobState::Pending {
                return None;
            }
            job.state = JobState::Running;
            job.started_at = Some(SystemTime::now());
            job.message = "generation running".to_string();
            Some(job.cancel.clone())
        })
        .flatten();
    let Some(cancel) = claimed else {
        // Cancelled while queued, or unknown; nothing to run.
        return;
    };
    info!(%id, "job started");

    let progress: ProgressFn = {
        let shared = Arc::clone(shared);
        Arc::new(move |pct| shared.update_progress(id, pct))
    };
    let outcome = pipeline::run_generation(&problem, &request, &cancel, progress);

    let (state, message, result) = match outcome {
        Ok(timetables) => (
            JobState::Completed,
            format!("generation completed with {} candidate(s)", timetables.len()),
            Some(JobResult::Completed(timetables)),
        ),
        Err(EngineError::Cancelled) => (
            JobState::Cancelled,
            "generation cancelled".to_string(),
            None,
        ),
        Err(error) => {
            warn!(%id, %error, "job failed");
            let reason = FailureReason::from_error(&error);
            (
                JobState::Failed,
                reason.message.clone(),
                Some(JobResult::Failed(reason)),
            )
        }
    };
    shared.with_job(id, |job| {
        job.completed_at = Some(SystemTime::now());
        job.message = message;
        job.result = result;
        if state == JobState::Completed {
            job.progress = 100;
        }
        job.state = state;
    });
    info!(%id, state = ?state, "job finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Algorithm;
    use crate::model::{
        Batch, BatchId, Faculty, FacultyId, Room, RoomId, RoomKindId, SlotId, Subject, SubjectId,
        TeachingAssignment, TimeSlot,
    };
    use std::time::Duration;

    fn small_problem() -> Arc<Problem> {
        let slots = (0..10u32)
            .map(|i| TimeSlot {
                id: SlotId(i),
                day: (i / 2) as u8,
                start_minute: 540 + ((i % 2) as u16) * 60,
                end_minute: 600 + ((i % 2) as u16) * 60,
            })
            .collect();
        Arc::new(
            Problem::builder()
                .subjects(vec![Subject {
                    id: SubjectId(1),
                    name: "Graphs".to_string(),
                    required_room_kind: None,
                }])
                .faculty(vec![Faculty {
                    id: FacultyId(1),
                    name: "Dr. D".to_string(),
                }])
                .batches(vec![Batch {
                    id: BatchId(1),
                    name: "B1".to_string(),
                    strength: 20,
                }])
                .rooms(vec![Room {
                    id: RoomId(1),
                    name: "R1".to_string(),
                    capacity: 40,
                    kind: RoomKindId(0),
                    is_lab: false,
                }])
                .slots(slots)
                .assignments(vec![TeachingAssignment::new(
                    SubjectId(1),
                    FacultyId(1),
                    BatchId(1),
                    3,
                    0,
                    0,
                )])
                .build()
                .unwrap(),
        )
    }

    fn wait_terminal(orchestrator: &Orchestrator, id: JobId) -> JobStatus {
        for _ in 0..2000 {
            let status = orchestrator.status(id).unwrap();
            if status.state.is_terminal() {
                return status;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("job {id} did not reach a terminal state");
    }

    #[test]
    fn csp_only_job_completes_with_results() {
        let orchestrator = Orchestrator::with_workers(1);
        let request = GenerationRequest::builder()
            .algorithm(Algorithm::CspOnly)
            .time_limit(Duration::from_secs(10))
            .seed(1)
            .build()
            .unwrap();
        let id = orchestrator.submit(small_problem(), request);
        let status = wait_terminal(&orchestrator, id);
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.progress, 100);
        assert!(status.started_at.is_some());
        assert!(status.completed_at.is_some());

        match orchestrator.result(id) {
            Some(JobResult::Completed(timetables)) => {
                assert!(!timetables.is_empty());
                assert_eq!(timetables[0].entries.len(), 3);
                assert_eq!(timetables[0].metrics.hard_violations, 0);
            }
            other => panic!("expected completed result, got {other:?}"),
        }
    }

    #[test]
    fn unknown_job_has_no_status() {
        let orchestrator = Orchestrator::with_workers(1);
        assert!(orchestrator.status(JobId(999)).is_none());
        assert!(!orchestrator.cancel(JobId(999)));
        assert!(orchestrator.result(JobId(999)).is_none());
    }

    #[test]
    fn failure_reasons_classify_errors() {
        let timeout = FailureReason::from_error(&EngineError::Timeout { budget_secs: 5 });
        assert_eq!(timeout.kind, FailureKind::Timeout);
        assert!(timeout.message.contains("larger time limit"));

        let config = FailureReason::from_error(&EngineError::Configuration("bad".to_string()));
        assert_eq!(config.kind, FailureKind::InvalidRequest);
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }
}
