//! Timer handles, the external timer service contract and the per-procedure
//! timer subsystem.
//!
//! # Overview
//!
//! Every procedure owns at most two live timers:
//!
//! - **Retry** (T3): armed on every transmission of an outbound initial
//!   message. Each firing either retransmits or, once N3 retransmissions were
//!   spent, aborts the procedure.
//! - **Cleanup**: armed once at procedure creation, bounding the lifetime of
//!   the procedure whatever happens on the wire.
//!
//! ```text
//! ┌──────────────────┐  arm/cancel   ┌────────────────┐
//! │ ProcedureTimers  │──────────────▶│  TimerService  │
//! │ handle → (seq,   │               │ (deadline list,│
//! │          kind)   │◀──────────────│  tokio sleeps) │
//! └──────────────────┘  fired handle └────────────────┘
//! ```
//!
//! Handles are generation-counted arena slots. A handle that fires after its
//! slot was reused compares unequal to the fresh handle, so a late expiry can
//! never be mistaken for the timer that replaced it.

pub mod arena;
pub mod deadline;
pub mod procedure_timers;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use arena::TimerArena;
pub use deadline::DeadlineTimerService;
pub use procedure_timers::ProcedureTimers;

/// Opaque token identifying one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle {
    index: u32,
    generation: u32,
}

impl TimerHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot the handle points at
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}.{}", self.index, self.generation)
    }
}

/// The two timers a procedure may own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// T3 retransmission timer
    Retry,
    /// Procedure lifetime backstop
    Cleanup,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::Retry => f.write_str("retry"),
            TimerKind::Cleanup => f.write_str("cleanup"),
        }
    }
}

/// External timer service.
///
/// Expiries are not returned from these calls: the owner of the service
/// delivers each fired handle back to the engine through `on_timeout`, in the
/// same serialized context as datagrams.
pub trait TimerService: Send {
    /// Arm a one-shot timer firing after `after`
    fn arm(&mut self, after: Duration) -> TimerHandle;

    /// Cancel a timer. Cancelling a fired or unknown handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

impl<S: TimerService + ?Sized> TimerService for Box<S> {
    fn arm(&mut self, after: Duration) -> TimerHandle {
        (**self).arm(after)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        (**self).cancel(handle)
    }
}

/// Lets a poll loop keep access to a service the engine also owns
impl<S: TimerService> TimerService for Arc<parking_lot::Mutex<S>> {
    fn arm(&mut self, after: Duration) -> TimerHandle {
        self.lock().arm(after)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.lock().cancel(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_timer_kind_display() {
        assert_eq!(TimerKind::Retry.to_string(), "retry");
        assert_eq!(TimerKind::Cleanup.to_string(), "cleanup");
    }

    #[test]
    fn test_shared_service_arms_through_the_lock() {
        let shared = Arc::new(Mutex::new(DeadlineTimerService::new()));
        let mut owned: Box<dyn TimerService> = Box::new(shared.clone());

        let handle = owned.arm(Duration::from_millis(10));
        assert!(shared.lock().is_armed(handle));

        owned.cancel(handle);
        assert!(!shared.lock().is_armed(handle));
    }
}
