//! Per-procedure timer bookkeeping on top of a [`TimerService`]

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::{error, trace};

use super::{TimerHandle, TimerKind, TimerService};
use crate::error::{Error, Result};
use crate::procedure::Procedure;

/// Arms and cancels the retry and cleanup timers of procedures and maps a
/// fired handle back to the procedure and timer kind it belongs to.
///
/// A binding exists exactly as long as the handle is stored in its
/// procedure's slot, so a handle that fires after being cancelled resolves
/// to nothing.
pub struct ProcedureTimers {
    service: Box<dyn TimerService>,
    bindings: HashMap<TimerHandle, (u32, TimerKind)>,
}

fn slot(procedure: &mut Procedure, kind: TimerKind) -> &mut Option<TimerHandle> {
    match kind {
        TimerKind::Retry => &mut procedure.retry_timer,
        TimerKind::Cleanup => &mut procedure.cleanup_timer,
    }
}

impl ProcedureTimers {
    pub fn new(service: Box<dyn TimerService>) -> Self {
        Self {
            service,
            bindings: HashMap::new(),
        }
    }

    /// Arm a timer of `kind` for `procedure`.
    ///
    /// Arming a kind that already holds a live handle is an invariant
    /// violation: it panics in debug builds and is refused with
    /// [`Error::DoubleArmTimer`] otherwise. The live handle is left untouched.
    pub fn arm(&mut self, procedure: &mut Procedure, kind: TimerKind, after: Duration) -> Result<TimerHandle> {
        let sequence_number = procedure.sequence_number;
        let slot = slot(procedure, kind);

        if let Some(live) = *slot {
            error!(%kind, sequence_number, %live, "Refusing to arm a timer that is already armed");
            debug_assert!(slot.is_none(), "{} timer already armed for seq {}", kind, sequence_number);
            return Err(Error::DoubleArmTimer { kind, sequence_number });
        }

        let handle = self.service.arm(after);
        *slot = Some(handle);
        self.bindings.insert(handle, (sequence_number, kind));
        trace!(%kind, sequence_number, %handle, ?after, "Procedure timer armed");
        Ok(handle)
    }

    /// Cancel the timer of `kind`, returning whether one was armed
    pub fn cancel(&mut self, procedure: &mut Procedure, kind: TimerKind) -> bool {
        match slot(procedure, kind).take() {
            Some(handle) => {
                self.bindings.remove(&handle);
                self.service.cancel(handle);
                trace!(%kind, sequence_number = procedure.sequence_number, %handle, "Procedure timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel both timers; used whenever a procedure leaves the table
    pub fn cancel_all(&mut self, procedure: &mut Procedure) {
        self.cancel(procedure, TimerKind::Retry);
        self.cancel(procedure, TimerKind::Cleanup);
    }

    /// Resolve a fired handle to its procedure's sequence number and timer
    /// kind, dropping the binding. Unknown or stale handles yield `None`.
    pub fn take_fired(&mut self, handle: TimerHandle) -> Option<(u32, TimerKind)> {
        self.bindings.remove(&handle)
    }

    /// Clear the slot a fired handle occupied so the kind can be rearmed
    pub fn clear_fired(&mut self, procedure: &mut Procedure, kind: TimerKind, handle: TimerHandle) {
        let slot = slot(procedure, kind);
        if *slot == Some(handle) {
            *slot = None;
        }
    }

    /// Number of armed timers bound to procedures
    pub fn armed(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_bound(&self, handle: TimerHandle) -> bool {
        self.bindings.contains_key(&handle)
    }
}

impl fmt::Debug for ProcedureTimers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureTimers")
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::DeadlineTimerService;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn procedure(seq: u32) -> Procedure {
        Procedure::outbound(seq, 1, Bytes::from_static(b"echo"), "10.0.0.1:2123".parse().unwrap(), None)
    }

    fn timers() -> (ProcedureTimers, Arc<Mutex<DeadlineTimerService>>) {
        let service = Arc::new(Mutex::new(DeadlineTimerService::new()));
        (ProcedureTimers::new(Box::new(service.clone())), service)
    }

    #[test]
    fn test_arm_binds_handle_to_procedure() {
        let (mut timers, service) = timers();
        let mut proc = procedure(11);

        let retry = timers.arm(&mut proc, TimerKind::Retry, Duration::from_secs(1)).unwrap();
        let cleanup = timers.arm(&mut proc, TimerKind::Cleanup, Duration::from_secs(5)).unwrap();

        assert_eq!(proc.retry_timer(), Some(retry));
        assert_eq!(proc.cleanup_timer(), Some(cleanup));
        assert_eq!(timers.armed(), 2);
        assert_eq!(service.lock().len(), 2);
        assert_eq!(timers.take_fired(retry), Some((11, TimerKind::Retry)));
        assert_eq!(timers.take_fired(retry), None);
    }

    #[test]
    fn test_cancel_all_releases_service_timers() {
        let (mut timers, service) = timers();
        let mut proc = procedure(3);
        let retry = timers.arm(&mut proc, TimerKind::Retry, Duration::from_secs(1)).unwrap();
        timers.arm(&mut proc, TimerKind::Cleanup, Duration::from_secs(5)).unwrap();

        timers.cancel_all(&mut proc);
        assert_eq!(proc.retry_timer(), None);
        assert_eq!(proc.cleanup_timer(), None);
        assert_eq!(timers.armed(), 0);
        assert!(service.lock().is_empty());
        assert!(!timers.cancel(&mut proc, TimerKind::Retry));

        // A fire notification already in flight resolves to nothing
        assert_eq!(timers.take_fired(retry), None);
    }

    #[test]
    fn test_cleared_slot_can_be_rearmed() {
        let (mut timers, _service) = timers();
        let mut proc = procedure(4);
        let first = timers.arm(&mut proc, TimerKind::Retry, Duration::from_secs(1)).unwrap();

        let (_, kind) = timers.take_fired(first).unwrap();
        timers.clear_fired(&mut proc, kind, first);
        let second = timers.arm(&mut proc, TimerKind::Retry, Duration::from_secs(1)).unwrap();

        assert_ne!(first, second);
        assert_eq!(proc.retry_timer(), Some(second));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "retry timer already armed for seq 9")]
    fn test_double_arm_panics_in_debug_builds() {
        let (mut timers, _service) = timers();
        let mut proc = procedure(9);
        timers.arm(&mut proc, TimerKind::Retry, Duration::from_secs(1)).unwrap();
        let _ = timers.arm(&mut proc, TimerKind::Retry, Duration::from_secs(1));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_double_arm_is_refused_in_release_builds() {
        let (mut timers, _service) = timers();
        let mut proc = procedure(9);
        let live = timers.arm(&mut proc, TimerKind::Retry, Duration::from_secs(1)).unwrap();

        let err = timers.arm(&mut proc, TimerKind::Retry, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, Error::DoubleArmTimer { kind: TimerKind::Retry, sequence_number: 9 });
        assert_eq!(proc.retry_timer(), Some(live));
        assert_eq!(timers.armed(), 1);
    }
}
