//! Deterministic deadline-list timer service
//!
//! Nothing fires on its own: the owner polls [`DeadlineTimerService::expired`]
//! (or [`DeadlineTimerService::advance`] against the service's virtual clock)
//! and feeds each returned handle to the engine. This suits poll-driven event
//! loops and makes timer-driven behaviour reproducible in tests.

use std::time::{Duration, Instant};

use tracing::trace;

use super::{TimerArena, TimerHandle, TimerService};

/// Timer service backed by a list of absolute deadlines
#[derive(Debug)]
pub struct DeadlineTimerService {
    deadlines: TimerArena<Instant>,
    now: Instant,
}

impl DeadlineTimerService {
    /// Create a service whose virtual clock starts at the current instant
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            deadlines: TimerArena::new(),
            now,
        }
    }

    /// Current value of the virtual clock
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().map(|(_, deadline)| *deadline).min()
    }

    /// Deadline of an armed timer
    pub fn deadline(&self, handle: TimerHandle) -> Option<Instant> {
        self.deadlines.get(handle).copied()
    }

    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains(handle)
    }

    /// Number of armed timers
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Move the clock to `now` and remove every timer due by then, earliest
    /// first. The clock never moves backwards.
    pub fn expired(&mut self, now: Instant) -> Vec<TimerHandle> {
        if now > self.now {
            self.now = now;
        }

        let mut due: Vec<(Instant, TimerHandle)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= self.now)
            .map(|(handle, deadline)| (*deadline, handle))
            .collect();
        due.sort();

        for (_, handle) in &due {
            self.deadlines.remove(*handle);
        }

        if !due.is_empty() {
            trace!(count = due.len(), "Timers expired");
        }
        due.into_iter().map(|(_, handle)| handle).collect()
    }

    /// Advance the virtual clock by `by` and collect what expired
    pub fn advance(&mut self, by: Duration) -> Vec<TimerHandle> {
        let now = self.now + by;
        self.expired(now)
    }
}

impl Default for DeadlineTimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerService for DeadlineTimerService {
    fn arm(&mut self, after: Duration) -> TimerHandle {
        let handle = self.deadlines.insert(self.now + after);
        trace!(%handle, ?after, "Timer armed");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if self.deadlines.remove(handle).is_some() {
            trace!(%handle, "Timer cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_returns_due_timers_in_deadline_order() {
        let start = Instant::now();
        let mut service = DeadlineTimerService::starting_at(start);
        let late = service.arm(Duration::from_millis(300));
        let early = service.arm(Duration::from_millis(100));
        let never = service.arm(Duration::from_secs(60));

        assert_eq!(service.next_deadline(), Some(start + Duration::from_millis(100)));
        assert!(service.expired(start + Duration::from_millis(50)).is_empty());

        let fired = service.expired(start + Duration::from_millis(300));
        assert_eq!(fired, vec![early, late]);
        assert_eq!(service.len(), 1);
        assert!(service.is_armed(never));
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut service = DeadlineTimerService::new();
        let handle = service.arm(Duration::from_millis(10));
        service.cancel(handle);
        service.cancel(handle);

        assert!(service.advance(Duration::from_secs(1)).is_empty());
        assert_eq!(service.next_deadline(), None);
    }

    #[test]
    fn test_arm_is_relative_to_virtual_clock() {
        let start = Instant::now();
        let mut service = DeadlineTimerService::starting_at(start);
        service.advance(Duration::from_secs(5));

        let handle = service.arm(Duration::from_secs(1));
        assert_eq!(service.deadline(handle), Some(start + Duration::from_secs(6)));

        // The clock does not move backwards
        assert!(service.expired(start).is_empty());
        assert_eq!(service.advance(Duration::from_secs(1)), vec![handle]);
    }
}
