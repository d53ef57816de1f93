//! Time sources for driving a [`PhaseOscillator`].
//!
//! The oscillator only ever asks two things of time: how long it has been, and to wait a little.
//! [`SystemClock`] answers both with the real thing. [`SimulatedClock`] answers them with a
//! shared counter that only moves when someone sleeps on it or advances it, which lets a whole
//! run of phase cycles finish instantly and deterministically.
//!
//! [`PhaseOscillator`]: ../oscillator/struct.PhaseOscillator.html
//! [`SystemClock`]: struct.SystemClock.html
//! [`SimulatedClock`]: struct.SimulatedClock.html

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A monotonic time source that the oscillator's background loop polls against.
pub trait Clock: Send + 'static {
    /// Returns the time elapsed since this clock's origin.
    fn now(&self) -> Duration;

    /// Waits for (roughly) the given quantum.
    fn sleep(&self, quantum: Duration);
}

/// A `Clock` backed by `std::time::Instant` and `std::thread::sleep`.
#[derive(Debug, Copy, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a new `SystemClock` whose origin is the moment of creation.
    pub fn new() -> SystemClock {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> SystemClock {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, quantum: Duration) {
        thread::sleep(quantum);
    }
}

/// A `Clock` whose time only moves when it is slept on or advanced.
///
/// Clones share the same virtual time, so a test can keep one handle while the oscillator owns
/// another. Sleeping advances the shared time by exactly the requested quantum and returns
/// immediately.
///
/// # Example
///
/// ```
/// use signalphase::{Clock, SimulatedClock};
/// use std::time::Duration;
///
/// let clock = SimulatedClock::new();
/// let handle = clock.clone();
///
/// clock.sleep(Duration::from_millis(3));
/// handle.advance(Duration::from_secs(1));
///
/// assert_eq!(clock.now(), Duration::from_millis(1003));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    nanos: Arc<AtomicU64>,
}

impl SimulatedClock {
    /// Creates a new `SimulatedClock` starting at zero.
    pub fn new() -> SimulatedClock {
        SimulatedClock::default()
    }

    /// Moves virtual time forward by the given duration.
    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        //saturate rather than wrap; nobody is simulating 584 years of traffic
        let mut current = self.nanos.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(by);
            match self
                .nanos
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    fn sleep(&self, quantum: Duration) {
        self.advance(quantum);
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, SimulatedClock, SystemClock};

    use std::thread;
    use std::time::Duration;

    #[test_log::test]
    fn simulated_clock_starts_at_zero() {
        assert_eq!(SimulatedClock::new().now(), Duration::ZERO);
    }

    #[test_log::test]
    fn simulated_sleep_advances_shared_time() {
        let clock = SimulatedClock::new();
        let other = clock.clone();

        for _ in 0..250 {
            clock.sleep(Duration::from_millis(1));
        }

        assert_eq!(other.now(), Duration::from_millis(250));
    }

    #[test_log::test]
    fn simulated_clock_saturates() {
        let clock = SimulatedClock::new();
        clock.advance(Duration::MAX);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_nanos(u64::MAX));
    }

    #[test_log::test]
    fn concurrent_advances_all_land() {
        let clock = SimulatedClock::new();

        let handles = (0..4)
            .map(|_| {
                let clock = clock.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        clock.sleep(Duration::from_micros(1));
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(clock.now(), Duration::from_millis(4));
    }

    #[test_log::test]
    fn system_clock_moves_forward() {
        let clock = SystemClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_millis(5));
        assert!(clock.now() >= before + Duration::from_millis(5));
    }
}
