//! Progress tracking.
//!
//! Translates discrete unit completion into a percentage that never
//! decreases within a run. Delivery to observers is fire-and-forget: an
//! observer that errors or panics is logged and ignored.

use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Callback receiving the current percentage.
pub type ProgressObserver = Arc<dyn Fn(u8) -> anyhow::Result<()> + Send + Sync>;

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

#[derive(Default)]
pub struct ProgressTracker {
    counters: Mutex<ProgressSnapshot>,
    observers: RwLock<Vec<ProgressObserver>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Observers are invoked in no guaranteed order.
    pub fn subscribe(&self, observer: ProgressObserver) {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    /// Start a new run with `total` units. The only way percent goes down.
    pub fn reset(&self, total: usize) {
        *self.lock() = ProgressSnapshot {
            completed: 0,
            total,
            percent: 0,
        };
    }

    /// Record that `completed` of `total` units are done.
    ///
    /// `percent = floor(completed / total * 100)` clamped to `[0, 100]`,
    /// but never below the previously reported value.
    pub fn advance(&self, completed: usize, total: usize) -> u8 {
        let percent = {
            let mut counters = self.lock();
            counters.total = total;
            counters.completed = counters.completed.max(completed.min(total));
            counters.percent = counters.percent.max(percent_of(completed, total));
            counters.percent
        };
        self.notify(percent);
        percent
    }

    /// Count one more finished unit against the current total.
    pub fn increment(&self) -> u8 {
        let percent = {
            let mut counters = self.lock();
            counters.completed = (counters.completed + 1).min(counters.total);
            let computed = percent_of(counters.completed, counters.total);
            counters.percent = counters.percent.max(computed);
            counters.percent
        };
        self.notify(percent);
        percent
    }

    /// Set progress to 100% regardless of how many units completed.
    pub fn force_complete(&self) {
        self.lock().percent = 100;
        self.notify(100);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressSnapshot> {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, percent: u8) {
        let observers: Vec<ProgressObserver> = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for observer in observers {
            match catch_unwind(AssertUnwindSafe(|| observer(percent))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Progress observer failed (ignored): {}", e),
                Err(_) => debug!("Progress observer panicked (ignored)"),
            }
        }
    }
}

fn percent_of(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = completed.saturating_mul(100) / total;
    pct.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_percent_is_floored() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.advance(1, 3), 33);
        assert_eq!(tracker.advance(2, 3), 66);
        assert_eq!(tracker.advance(3, 3), 100);
    }

    #[test]
    fn test_percent_is_clamped() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.advance(7, 5), 100);
        assert_eq!(tracker.snapshot().completed, 5);
        assert_eq!(ProgressTracker::new().advance(3, 0), 0);
    }

    #[test]
    fn test_percent_never_decreases() {
        let tracker = ProgressTracker::new();
        let mut last = 0;
        for (done, total) in [(1, 4), (2, 4), (2, 10), (3, 10), (4, 4), (1, 4)] {
            let pct = tracker.advance(done, total);
            assert!(pct >= last, "{} dropped below {}", pct, last);
            last = pct;
        }
    }

    #[test]
    fn test_increment_counts_against_total() {
        let tracker = ProgressTracker::new();
        tracker.reset(4);
        tracker.increment();
        assert_eq!(tracker.increment(), 50);
        let snap = tracker.snapshot();
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.total, 4);
    }

    #[test]
    fn test_force_complete_reaches_hundred() {
        let tracker = ProgressTracker::new();
        tracker.reset(10);
        tracker.increment();
        tracker.force_complete();
        assert_eq!(tracker.snapshot().percent, 100);
        assert_eq!(tracker.snapshot().completed, 1);
    }

    #[test]
    fn test_reset_starts_a_new_run() {
        let tracker = ProgressTracker::new();
        tracker.force_complete();
        tracker.reset(2);
        assert_eq!(tracker.snapshot().percent, 0);
    }

    #[test]
    fn test_failing_observers_are_swallowed() {
        let tracker = ProgressTracker::new();
        let calls = Arc::new(AtomicUsize::new(0));

        tracker.subscribe(Arc::new(|_| anyhow::bail!("client disconnected")));
        tracker.subscribe(Arc::new(|_| panic!("observer exploded")));
        let counter = calls.clone();
        tracker.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        tracker.reset(2);
        tracker.increment();
        tracker.increment();
        tracker.force_complete();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.snapshot().percent, 100);
    }
}
