//! Per-engine re-entrancy guard: at most one concurrent run. A trigger
//! arriving while the flag is held is logged at `debug` and dropped rather
//! than queued (§4.4, §5).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Default)]
pub struct ReentrancyGuard {
    running: Arc<AtomicBool>,
}

/// Held for the duration of one engine run; resets the flag on drop so a
/// panic mid-run cannot wedge the engine out permanently.
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to begin a run. Returns `None` (and logs at `debug`) if a run is
    /// already in progress.
    pub fn try_begin(&self, engine: &str) -> Option<RunPermit> {
        match self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => Some(RunPermit { running: self.running.clone() }),
            Err(_) => {
                tracing::debug!(engine, "trigger dropped: a run is already in progress");
                None
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
