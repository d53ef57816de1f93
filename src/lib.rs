//! A blocking hand-off queue, and a self-driving two-phase signal that announces itself through
//! one.
//!
//! This library contains the following primitives:
//!
//! * [`SynchronizedQueue`], an unbounded channel guarded by a `Mutex`, where receivers block
//!   until a value arrives. Values are handed out most-recent-first.
//! * [`PhaseOscillator`], a signal that flips between [`Phase::Red`] and [`Phase::Green`] on a
//!   background thread at randomized intervals, sending every new phase into its own
//!   `SynchronizedQueue` so other threads can wait for the phase they care about.
//!
//! Supporting these are [`PhaseCell`], the atomic cell that holds an oscillator's current phase,
//! and the [`Clock`] trait, which lets the oscillator run against either real time
//! ([`SystemClock`]) or a virtual one ([`SimulatedClock`]).
//!
//! This crate emits diagnostics through the [`log`] facade, and never installs a logger itself.
//!
//! [`SynchronizedQueue`]: queue/struct.SynchronizedQueue.html
//! [`PhaseOscillator`]: oscillator/struct.PhaseOscillator.html
//! [`Phase::Red`]: phase/enum.Phase.html#variant.Red
//! [`Phase::Green`]: phase/enum.Phase.html#variant.Green
//! [`PhaseCell`]: phase/struct.PhaseCell.html
//! [`Clock`]: clock/trait.Clock.html
//! [`SystemClock`]: clock/struct.SystemClock.html
//! [`SimulatedClock`]: clock/struct.SimulatedClock.html
//! [`log`]: https://docs.rs/log

#![deny(warnings, missing_docs)]

mod util;

pub mod clock;
pub mod oscillator;
pub mod phase;
pub mod queue;

pub use crate::clock::{Clock, SimulatedClock, SystemClock};
pub use crate::oscillator::{ConfigError, OscillatorConfig, OscillatorError, PhaseOscillator};
pub use crate::phase::{Phase, PhaseCell};
pub use crate::queue::SynchronizedQueue;
