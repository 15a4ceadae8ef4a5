//! Fire-once timer abstraction driving the sequencer

use std::time::Duration;

/// Opaque handle for one scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// Host timer. The scheduler only records and fires handles; the owner maps a
/// fired handle back to its own state and ignores handles it no longer expects.
pub trait Scheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

/// Virtual-clock scheduler for deterministic tests and offline rendering
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    pending: Vec<(Duration, TimerHandle)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Earliest pending deadline
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.iter().map(|&(due, _)| due).min()
    }

    /// Time left until the earliest pending deadline
    pub fn next_delay(&self) -> Option<Duration> {
        self.next_due().map(|due| due.saturating_sub(self.now))
    }

    /// Pop the earliest timer and move the clock to its deadline
    pub fn fire_next(&mut self) -> Option<TimerHandle> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .min_by_key(|(_, (due, handle))| (*due, *handle))
            .map(|(idx, _)| idx)?;
        let (due, handle) = self.pending.remove(idx);
        self.now = self.now.max(due);
        Some(handle)
    }

    /// Move the clock forward by `by`, returning every handle that came due in
    /// deadline order
    pub fn advance(&mut self, by: Duration) -> Vec<TimerHandle> {
        let target = self.now + by;
        let mut fired = Vec::new();
        while self.next_due().is_some_and(|due| due <= target) {
            if let Some(handle) = self.fire_next() {
                fired.push(handle);
            }
        }
        self.now = target;
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.pending.push((self.now + delay, handle));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.retain(|&(_, h)| h != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_deadline_order() {
        let mut sched = ManualScheduler::new();
        let late = sched.schedule(Duration::from_millis(300));
        let early = sched.schedule(Duration::from_millis(100));
        assert_eq!(sched.next_delay(), Some(Duration::from_millis(100)));
        let fired = sched.advance(Duration::from_millis(500));
        assert_eq!(fired, vec![early, late]);
        assert_eq!(sched.now(), Duration::from_millis(500));
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_cancel_removes_timer() {
        let mut sched = ManualScheduler::new();
        let h = sched.schedule(Duration::from_millis(10));
        sched.cancel(h);
        assert!(sched.advance(Duration::from_secs(1)).is_empty());
        assert!(sched.fire_next().is_none());
    }

    #[test]
    fn test_fire_next_moves_clock() {
        let mut sched = ManualScheduler::new();
        sched.schedule(Duration::from_millis(250));
        let h = sched.fire_next();
        assert!(h.is_some());
        assert_eq!(sched.now(), Duration::from_millis(250));
        assert_ne!(sched.schedule(Duration::ZERO), h.unwrap_or(TimerHandle(0)));
    }
}
