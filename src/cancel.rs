//! Cooperative cancellation.
//!
//! A [`CancelToken`] is shared between the job orchestrator and the worker
//! running a generation. The searches check it at well-defined
//! checkpoints (between backtracking frames, between optimizer
//! generations); there is no forced preemption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag requesting cooperative cancellation.
///
/// Cloning produces handles to the same flag. Cancellation is permanent:
/// once set, the flag never clears.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Safe to call from any thread, any number of
    /// times.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
