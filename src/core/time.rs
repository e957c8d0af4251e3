//! Wall-clock sources and rate limiting for time-driven terrain settling

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source measured from an arbitrary start point.
pub trait Clock: Send {
    fn elapsed(&self) -> Duration;
}

/// Clock backed by `Instant`.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Manually advanced clock. Clones share the same time value, so a test can
/// keep a handle while the engine owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.nanos.fetch_add(delta.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: Duration) {
        self.nanos.store(now.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Permits one step per fixed interval of wall-clock time.
///
/// A late caller still gets a single step; the timer then advances by exactly
/// one interval, so leftover time carries into later calls.
#[derive(Clone, Debug)]
pub struct StepTimer {
    interval: Duration,
    ready_at: Duration,
}

impl StepTimer {
    /// Create a timer whose first step is available immediately.
    pub fn new(interval: Duration, now: Duration) -> Self {
        Self {
            interval,
            ready_at: now,
        }
    }

    /// Step interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Consume one step if at least one interval has elapsed.
    pub fn try_step(&mut self, now: Duration) -> bool {
        if now >= self.ready_at {
            self.ready_at += self.interval;
            true
        } else {
            false
        }
    }

    /// Drop any accumulated backlog and make the next step available at once.
    pub fn rearm(&mut self, now: Duration) {
        self.ready_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
        handle.set(Duration::from_secs(2));
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn test_step_timer_first_step_immediate() {
        let mut timer = StepTimer::new(Duration::from_millis(100), Duration::from_secs(1));
        assert!(timer.try_step(Duration::from_secs(1)));
        assert!(!timer.try_step(Duration::from_secs(1)));
    }

    #[test]
    fn test_step_timer_single_step_per_call() {
        let interval = Duration::from_millis(100);
        let mut timer = StepTimer::new(interval, Duration::ZERO);
        assert!(timer.try_step(Duration::ZERO));

        // 350ms later: three intervals are owed but only one is paid per call
        let now = Duration::from_millis(350);
        assert!(timer.try_step(now));
        assert!(timer.try_step(now));
        assert!(timer.try_step(now));
        assert!(!timer.try_step(now));
    }

    #[test]
    fn test_step_timer_rearm_drops_backlog() {
        let interval = Duration::from_millis(100);
        let mut timer = StepTimer::new(interval, Duration::ZERO);
        assert!(timer.try_step(Duration::ZERO));
        timer.rearm(Duration::from_secs(10));
        assert!(timer.try_step(Duration::from_secs(10)));
        assert!(!timer.try_step(Duration::from_secs(10)));
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.elapsed();
        let b = clock.elapsed();
        assert!(b >= a);
    }
}
