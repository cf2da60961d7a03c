//! Tokio-backed timer service
//!
//! Each armed timer is a sleeping task. When it wakes it removes itself from
//! the shared arena and pushes its handle into the fired channel, which the
//! endpoint task drains into `TransactionEngine::on_timeout`. Cancelling
//! aborts the task.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

use epcgw_gtpv2c_core::timer::TimerArena;
use epcgw_gtpv2c_core::{TimerHandle, TimerService};

type Tasks = Arc<Mutex<TimerArena<Option<AbortHandle>>>>;

/// Timer service spawning one tokio sleep per armed timer
pub struct TokioTimerService {
    tasks: Tasks,
    fired_tx: mpsc::UnboundedSender<TimerHandle>,
}

impl TokioTimerService {
    /// Create the service and the channel its expiries are delivered on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerHandle>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let service = Self {
            tasks: Arc::new(Mutex::new(TimerArena::new())),
            fired_tx,
        };
        (service, fired_rx)
    }

    /// Number of timers still sleeping
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl TimerService for TokioTimerService {
    fn arm(&mut self, after: Duration) -> TimerHandle {
        // The arena stays locked until the abort handle is stored, so a
        // zero-length timer cannot remove its slot before it is filled in.
        let mut tasks = self.tasks.lock();
        let handle = tasks.insert(None);

        let shared = self.tasks.clone();
        let fired_tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if shared.lock().remove(handle).is_some() {
                trace!(%handle, "Timer fired");
                let _ = fired_tx.send(handle);
            }
        });

        if let Some(slot) = tasks.get_mut(handle) {
            *slot = Some(task.abort_handle());
        }
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(Some(task)) = self.tasks.lock().remove(handle) {
            task.abort();
            trace!(%handle, "Timer cancelled");
        }
    }
}

impl Drop for TokioTimerService {
    fn drop(&mut self) {
        for (_, task) in self.tasks.lock().drain() {
            if let Some(task) = task {
                task.abort();
            }
        }
    }
}

impl fmt::Debug for TokioTimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioTimerService")
            .field("pending", &self.pending())
            .finish()
    }
}
