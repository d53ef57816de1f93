//! A self-driving two-phase signal that publishes every transition through a
//! [`SynchronizedQueue`].
//!
//! The primary type in this module is the [`PhaseOscillator`] struct. See its documentation for
//! further information.
//!
//! [`SynchronizedQueue`]: ../queue/struct.SynchronizedQueue.html
//! [`PhaseOscillator`]: struct.PhaseOscillator.html

use std::env;
use std::io;
use std::mem;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::clock::{Clock, SystemClock};
use crate::phase::{Phase, PhaseCell};
use crate::queue::SynchronizedQueue;
use crate::util;

const MIN_CYCLE_VAR: &str = "SIGNALPHASE_MIN_CYCLE_MS";
const MAX_CYCLE_VAR: &str = "SIGNALPHASE_MAX_CYCLE_MS";
const POLL_INTERVAL_VAR: &str = "SIGNALPHASE_POLL_INTERVAL_MS";

/// Timing and startup settings for a [`PhaseOscillator`].
///
/// The defaults cycle every 4 to 6 seconds, polling the clock once a millisecond, starting on
/// `Phase::Red`.
///
/// [`PhaseOscillator`]: struct.PhaseOscillator.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscillatorConfig {
    min_cycle: Duration,
    max_cycle: Duration,
    poll_interval: Duration,
    initial_phase: Phase,
    thread_name: String,
}

/// The collection of errors that can be returned when building an [`OscillatorConfig`].
///
/// [`OscillatorConfig`]: struct.OscillatorConfig.html
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Returned when the shortest allowed cycle is longer than the longest.
    #[error("minimum cycle {min:?} is longer than maximum cycle {max:?}")]
    InvertedCycleRange {
        /// The configured shortest cycle.
        min: Duration,
        /// The configured longest cycle.
        max: Duration,
    },
    /// Returned when the poll interval is zero, which would spin the background thread.
    #[error("poll interval must be longer than zero")]
    ZeroPollInterval,
    /// Returned when the background thread's name contains a NUL byte, which the operating
    /// system can't accept as a thread name.
    #[error("thread name {name:?} contains a NUL byte")]
    InvalidThreadName {
        /// The rejected name.
        name: String,
    },
    /// Returned when an environment override is not a whole number of milliseconds.
    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    InvalidEnv {
        /// The variable that failed to parse.
        var: &'static str,
        /// The value it held.
        value: String,
    },
}

/// The collection of errors that can be returned by [`PhaseOscillator::start`].
///
/// [`PhaseOscillator::start`]: struct.PhaseOscillator.html#method.start
#[derive(Debug, thiserror::Error)]
pub enum OscillatorError {
    /// Returned when `start` is called on an oscillator that has already been started.
    #[error("the oscillator has already been started")]
    AlreadyStarted,
    /// Returned when the operating system refused to spawn the background thread.
    #[error("failed to spawn the oscillator thread")]
    Spawn(#[from] io::Error),
}

impl OscillatorConfig {
    /// Creates a config with the default settings.
    pub fn new() -> OscillatorConfig {
        OscillatorConfig {
            min_cycle: Duration::from_secs(4),
            max_cycle: Duration::from_secs(6),
            poll_interval: Duration::from_millis(1),
            initial_phase: Phase::Red,
            thread_name: String::from("phase-oscillator"),
        }
    }

    /// Creates a config from the defaults, overridden by any of the `SIGNALPHASE_MIN_CYCLE_MS`,
    /// `SIGNALPHASE_MAX_CYCLE_MS` and `SIGNALPHASE_POLL_INTERVAL_MS` environment variables that
    /// are set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnv` if a set variable is not a whole number, and otherwise
    /// the same errors as [`validate`].
    ///
    /// [`validate`]: #method.validate
    pub fn from_env() -> Result<OscillatorConfig, ConfigError> {
        OscillatorConfig::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<OscillatorConfig, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let millis = |var: &'static str| -> Result<Option<Duration>, ConfigError> {
            match lookup(var) {
                None => Ok(None),
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(ms) => Ok(Some(Duration::from_millis(ms))),
                    Err(_) => Err(ConfigError::InvalidEnv { var, value }),
                },
            }
        };

        let mut config = OscillatorConfig::new();
        if let Some(min) = millis(MIN_CYCLE_VAR)? {
            config.min_cycle = min;
        }
        if let Some(max) = millis(MAX_CYCLE_VAR)? {
            config.max_cycle = max;
        }
        if let Some(poll) = millis(POLL_INTERVAL_VAR)? {
            config.poll_interval = poll;
        }

        config.validate()?;
        log::debug!("oscillator config loaded: {:?}", config);
        Ok(config)
    }

    /// Sets the range that each cycle's duration is drawn from. Both ends are inclusive.
    pub fn with_cycle_range(mut self, min: Duration, max: Duration) -> OscillatorConfig {
        self.min_cycle = min;
        self.max_cycle = max;
        self
    }

    /// Sets how long the background loop sleeps between checks of the clock.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> OscillatorConfig {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the phase the oscillator holds before its first toggle.
    pub fn with_initial_phase(mut self, phase: Phase) -> OscillatorConfig {
        self.initial_phase = phase;
        self
    }

    /// Sets the name given to the background thread.
    pub fn with_thread_name<S: Into<String>>(mut self, name: S) -> OscillatorConfig {
        self.thread_name = name.into();
        self
    }

    /// Returns the shortest cycle duration.
    pub fn min_cycle(&self) -> Duration {
        self.min_cycle
    }

    /// Returns the longest cycle duration.
    pub fn max_cycle(&self) -> Duration {
        self.max_cycle
    }

    /// Returns the poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the phase held before the first toggle.
    pub fn initial_phase(&self) -> Phase {
        self.initial_phase
    }

    /// Checks that the settings describe a loop that can actually run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvertedCycleRange` if the minimum cycle is longer than the maximum,
    /// `ConfigError::ZeroPollInterval` if the poll interval is zero, and
    /// `ConfigError::InvalidThreadName` if the thread name contains a NUL byte.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_cycle > self.max_cycle {
            return Err(ConfigError::InvertedCycleRange {
                min: self.min_cycle,
                max: self.max_cycle,
            });
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }

        if self.thread_name.contains('\0') {
            return Err(ConfigError::InvalidThreadName {
                name: self.thread_name.clone(),
            });
        }

        Ok(())
    }
}

impl Default for OscillatorConfig {
    fn default() -> OscillatorConfig {
        OscillatorConfig::new()
    }
}

/// State shared between an oscillator handle and its background thread.
struct Shared {
    phase: PhaseCell,
    queue: SynchronizedQueue<Phase>,
}

enum Lifecycle<C, R> {
    Idle(PhaseCycle<C, R>),
    Running(JoinHandle<()>),
    //the driver went into the closure that failed to spawn, there's nothing left to restart
    Lost,
}

/// A two-phase signal that toggles itself on a randomized schedule and announces every toggle.
///
/// Once `start` is called, a background thread flips the oscillator between `Phase::Red` and
/// `Phase::Green` forever, waiting a freshly-drawn random duration (4 to 6 seconds by default)
/// before each flip. Every new phase is sent into the oscillator's [`SynchronizedQueue`], where
/// threads calling `wait_for_phase` pick them up. Threads that only want to glance at the signal
/// can call `current_phase`, which never blocks.
///
/// Each published phase is received by exactly one waiting thread. If several threads are blocked
/// in `wait_for_green`, one of them is released per green phase.
///
/// The background thread has no stop operation; it runs until the process exits. It shares
/// ownership of the queue and the phase with the oscillator, so neither is ever torn down under
/// it.
///
/// The clock and random source are type parameters so that tests can drive the oscillator with a
/// [`SimulatedClock`] and a seeded generator. `PhaseOscillator::new` uses the system clock and a
/// `SmallRng` seeded from the thread-local generator.
///
/// [`SynchronizedQueue`]: ../queue/struct.SynchronizedQueue.html
/// [`SimulatedClock`]: ../clock/struct.SimulatedClock.html
///
/// # Example
///
/// ```no_run
/// use signalphase::{Phase, PhaseOscillator};
/// use std::sync::Arc;
/// use std::thread;
///
/// let light = Arc::new(PhaseOscillator::new());
/// light.start().unwrap();
///
/// let cars = (0..3).map(|i| {
///     let light = light.clone();
///     thread::spawn(move || {
///         light.wait_for_green();
///         println!("car {} crossing", i);
///     })
/// }).collect::<Vec<_>>();
///
/// println!("the light is {}", light.current_phase());
///
/// for car in cars {
///     car.join().unwrap();
/// }
/// ```
pub struct PhaseOscillator<C = SystemClock, R = SmallRng> {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle<C, R>>,
}

impl PhaseOscillator {
    /// Creates a new, unstarted `PhaseOscillator` with the default settings, the system clock, and
    /// a randomly-seeded generator.
    pub fn new() -> PhaseOscillator {
        let rng = SmallRng::from_rng(&mut rand::rng());
        PhaseOscillator::build(OscillatorConfig::new(), SystemClock::new(), rng)
    }

    /// Creates a new, unstarted `PhaseOscillator` with the given settings, the system clock, and a
    /// randomly-seeded generator.
    ///
    /// # Errors
    ///
    /// Returns the same errors as `OscillatorConfig::validate`.
    pub fn with_config(config: OscillatorConfig) -> Result<PhaseOscillator, ConfigError> {
        let rng = SmallRng::from_rng(&mut rand::rng());
        PhaseOscillator::with_parts(config, SystemClock::new(), rng)
    }
}

impl Default for PhaseOscillator {
    fn default() -> PhaseOscillator {
        PhaseOscillator::new()
    }
}

impl<C, R> PhaseOscillator<C, R>
where
    C: Clock,
    R: Rng + Send + 'static,
{
    /// Creates a new, unstarted `PhaseOscillator` from the given settings, clock and random
    /// source.
    ///
    /// # Errors
    ///
    /// Returns the same errors as `OscillatorConfig::validate`.
    pub fn with_parts(
        config: OscillatorConfig,
        clock: C,
        rng: R,
    ) -> Result<PhaseOscillator<C, R>, ConfigError> {
        config.validate()?;
        Ok(PhaseOscillator::build(config, clock, rng))
    }

    fn build(config: OscillatorConfig, clock: C, rng: R) -> PhaseOscillator<C, R> {
        let shared = Arc::new(Shared {
            phase: PhaseCell::new(config.initial_phase),
            queue: SynchronizedQueue::new(),
        });
        let cycle = PhaseCycle {
            shared: shared.clone(),
            clock,
            rng,
            config,
        };

        PhaseOscillator {
            shared,
            lifecycle: Mutex::new(Lifecycle::Idle(cycle)),
        }
    }

    /// Launches the background thread that toggles the phase. Returns without waiting for the
    /// first toggle.
    ///
    /// # Errors
    ///
    /// Returns `OscillatorError::AlreadyStarted` if this oscillator was already started; only one
    /// background loop ever writes to an oscillator.
    ///
    /// Returns `OscillatorError::Spawn` if the thread could not be spawned. The oscillator cannot
    /// be started again after that, and later calls return `AlreadyStarted`.
    pub fn start(&self) -> Result<(), OscillatorError> {
        let mut lifecycle = util::recover(self.lifecycle.lock());

        let cycle = match mem::replace(&mut *lifecycle, Lifecycle::Lost) {
            Lifecycle::Idle(cycle) => cycle,
            other => {
                *lifecycle = other;
                return Err(OscillatorError::AlreadyStarted);
            }
        };

        let name = cycle.config.thread_name.clone();
        log::debug!(
            "starting oscillator thread {:?}: cycle {:?}..={:?}, polling every {:?}",
            name,
            cycle.config.min_cycle,
            cycle.config.max_cycle,
            cycle.config.poll_interval
        );

        let handle = thread::Builder::new().name(name).spawn(move || cycle.run())?;
        log::trace!("oscillator thread running as {:?}", handle.thread().id());
        *lifecycle = Lifecycle::Running(handle);

        Ok(())
    }

    /// Returns whether `start` has launched the background thread.
    pub fn is_started(&self) -> bool {
        matches!(*util::recover(self.lifecycle.lock()), Lifecycle::Running(_))
    }

    /// Returns the id of the background thread, or `None` if it hasn't been started.
    pub fn thread_id(&self) -> Option<thread::ThreadId> {
        match *util::recover(self.lifecycle.lock()) {
            Lifecycle::Running(ref handle) => Some(handle.thread().id()),
            _ => None,
        }
    }
}

impl<C, R> PhaseOscillator<C, R> {
    /// Returns the phase the oscillator holds right now, without blocking.
    ///
    /// The phase may change the moment after this returns, and it may already differ from the last
    /// message a waiting thread received.
    pub fn current_phase(&self) -> Phase {
        self.shared.phase.load()
    }

    /// Blocks the current thread until the oscillator publishes the given phase.
    ///
    /// Every published phase that isn't `target` is taken off the queue and thrown away. If
    /// `target` is never published, this blocks forever.
    pub fn wait_for_phase(&self, target: Phase) {
        loop {
            let phase = self.shared.queue.receive();
            if phase == target {
                return;
            }
            log::trace!("waiting for {}, discarded {}", target, phase);
        }
    }

    /// Blocks the current thread until the oscillator publishes `Phase::Green`.
    pub fn wait_for_green(&self) {
        self.wait_for_phase(Phase::Green);
    }

    /// Returns the queue this oscillator publishes its transitions into.
    pub fn queue(&self) -> &SynchronizedQueue<Phase> {
        &self.shared.queue
    }
}

/// The body of the background loop: everything needed to draw a cycle, wait it out, and publish
/// the toggle.
struct PhaseCycle<C, R> {
    shared: Arc<Shared>,
    clock: C,
    rng: R,
    config: OscillatorConfig,
}

impl<C: Clock, R: Rng> PhaseCycle<C, R> {
    fn next_cycle_duration(&mut self) -> Duration {
        let (min, max) = (self.config.min_cycle, self.config.max_cycle);
        if min == max {
            return min;
        }

        Duration::from_secs_f64(self.rng.random_range(min.as_secs_f64()..=max.as_secs_f64()))
    }

    /// Waits out one randomly-drawn cycle, toggles the phase, and publishes the new phase.
    /// Returns the time that passed between the start of the cycle and the toggle.
    fn run_cycle(&mut self) -> Duration {
        let cycle = self.next_cycle_duration();
        let last_update = self.clock.now();

        loop {
            self.clock.sleep(self.config.poll_interval);

            let elapsed = self.clock.now().saturating_sub(last_update);
            if elapsed >= cycle {
                let phase = self.shared.phase.toggle();
                self.shared.queue.send(phase);
                log::trace!("phase is now {} after {:?} (drew {:?})", phase, elapsed, cycle);
                return elapsed;
            }
        }
    }

    fn run(mut self) {
        loop {
            self.run_cycle();
        }
    }
}
