//! Time and cancellation.
//!
//! All waiting in the engine (backoff, DNS polling, CA polling) goes through a
//! [`Clock`] and observes a [`Cancel`] token, so a failed sibling identifier
//! stops the rest of the order promptly and tests never really sleep.
use std::fmt::Debug;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Source of time and sleeping.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;

    /// Sleep for `dur` unless `cancel` fires first. Returns `false` when
    /// cancelled.
    fn sleep(&self, dur: Duration, cancel: &Cancel) -> bool;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, dur: Duration, cancel: &Cancel) -> bool {
        !cancel.wait_timeout(dur)
    }
}

/// Virtual clock. Sleeping advances time instantly.
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            start: Instant::now(),
            offset: Default::default(),
        }
    }

    pub fn advance(&self, dur: Duration) {
        *self.offset.lock().unwrap() += dur;
    }

    /// Total virtual time slept so far.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, dur: Duration, cancel: &Cancel) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.advance(dur);
        // let other threads observe progress
        std::thread::yield_now();
        !cancel.is_cancelled()
    }
}

/// Clonable cancellation flag shared by the tasks of one order.
#[derive(Debug, Clone, Default)]
pub struct Cancel {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Cancel {
    pub fn new() -> Self {
        Cancel::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap()
    }

    /// Block up to `dur`. Returns `true` if cancelled.
    pub fn wait_timeout(&self, dur: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap();
        let (guard, _) = cvar
            .wait_timeout_while(guard, dur, |cancelled| !*cancelled)
            .unwrap();
        *guard
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert!(clock.sleep(Duration::from_secs(5), &Cancel::new()));
        assert_eq!(clock.now() - t0, Duration::from_secs(5));
    }

    #[test]
    fn test_cancel_wakes_sleeper() {
        let cancel = Cancel::new();
        let c2 = cancel.clone();
        let h = thread::spawn(move || SystemClock.sleep(Duration::from_secs(30), &c2));
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        assert!(!h.join().unwrap());
    }

    #[test]
    fn test_cancelled_manual_sleep() {
        let clock = ManualClock::new();
        let cancel = Cancel::new();
        cancel.cancel();
        assert!(!clock.sleep(Duration::from_secs(1), &cancel));
        assert_eq!(clock.elapsed(), Duration::from_secs(0));
    }
}
