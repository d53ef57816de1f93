//! The two signal phases, and an atomic cell to hold the current one.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// One of the two states a [`PhaseOscillator`] cycles through.
///
/// [`PhaseOscillator`]: ../oscillator/struct.PhaseOscillator.html
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Traffic must wait. Every oscillator starts here unless configured otherwise.
    #[default]
    Red,
    /// Traffic may proceed.
    Green,
}

impl Phase {
    /// Returns the other phase.
    ///
    /// ```
    /// use signalphase::Phase;
    ///
    /// assert_eq!(Phase::Red.toggled(), Phase::Green);
    /// assert_eq!(Phase::Green.toggled(), Phase::Red);
    /// ```
    pub fn toggled(self) -> Phase {
        match self {
            Phase::Red => Phase::Green,
            Phase::Green => Phase::Red,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Phase::Red => 0,
            Phase::Green => 1,
        }
    }

    fn from_bits(bits: u8) -> Phase {
        if bits & 1 == 0 {
            Phase::Red
        } else {
            Phase::Green
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Phase::Red => f.write_str("red"),
            Phase::Green => f.write_str("green"),
        }
    }
}

/// A `Phase` that can be read from any thread without taking a lock.
///
/// Only the oscillator's background loop ever writes to its cell; everyone else just loads it.
/// A reader gets whichever phase was last stored, with no ordering promised against the
/// messages the oscillator publishes to its queue.
#[derive(Debug)]
pub struct PhaseCell {
    bits: AtomicU8,
}

impl PhaseCell {
    /// Creates a new cell holding the given phase.
    pub fn new(phase: Phase) -> PhaseCell {
        PhaseCell {
            bits: AtomicU8::new(phase.to_bits()),
        }
    }

    /// Returns the phase currently held.
    pub fn load(&self) -> Phase {
        Phase::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Overwrites the phase currently held.
    pub fn store(&self, phase: Phase) {
        self.bits.store(phase.to_bits(), Ordering::Release);
    }

    /// Flips the held phase and returns the phase it flipped *to*.
    pub fn toggle(&self) -> Phase {
        let previous = self.bits.fetch_xor(1, Ordering::AcqRel);
        Phase::from_bits(previous).toggled()
    }
}

impl Default for PhaseCell {
    fn default() -> PhaseCell {
        PhaseCell::new(Phase::default())
    }
}

#[cfg(test)]
mod tests {
    use super::{Phase, PhaseCell};

    #[test_log::test]
    fn default_phase_is_red() {
        assert_eq!(Phase::default(), Phase::Red);
        assert_eq!(PhaseCell::default().load(), Phase::Red);
    }

    #[test_log::test]
    fn toggle_returns_new_phase() {
        let cell = PhaseCell::new(Phase::Red);

        assert_eq!(cell.toggle(), Phase::Green);
        assert_eq!(cell.load(), Phase::Green);
        assert_eq!(cell.toggle(), Phase::Red);
        assert_eq!(cell.load(), Phase::Red);
    }

    #[test_log::test]
    fn store_overwrites() {
        let cell = PhaseCell::new(Phase::Red);
        cell.store(Phase::Green);
        assert_eq!(cell.load(), Phase::Green);
        cell.store(Phase::Green);
        assert_eq!(cell.load(), Phase::Green);
    }

    #[test_log::test]
    fn display_names() {
        assert_eq!(Phase::Red.to_string(), "red");
        assert_eq!(Phase::Green.to_string(), "green");
    }
}
