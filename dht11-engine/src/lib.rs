//! A cycle-counting driver for the world's lousiest humidity/temperature
//! sensor, the ubiquitous DHT11.
//!
//! The DHT11 talks over a single wire. The host pulls the line low for ~20ms
//! to wake it up, lets go, and then the sensor answers with a handshake pulse
//! pair followed by 40 bits of data. Each bit is a ~50us low pulse followed by
//! a high pulse that is either ~27us (a 0) or ~70us (a 1).
//!
//! Rather than trusting a microsecond timer, this crate counts how many times
//! it managed to sample the line while it held a level, and compares the low
//! and high counts of each bit against each other. That makes the decode
//! independent of how fast the CPU happens to be running, as long as nothing
//! interrupts us mid-pulse. The pulse wait is bounded by a [`CycleBudget`]
//! derived from the current CPU frequency, so a sensor that stops talking
//! costs about a millisecond, not forever.
//!
//! The pieces, from the bottom up:
//!
//! - [`SignalLine`]: the data pin. [`OpenDrain`] adapts any [`embedded-hal`]
//!   open-drain pin.
//! - [`pulse::count_cycles`]: the tight polling loop.
//! - [`CycleBudget`] and [`FrequencySource`]: timeout calibration.
//! - [`InterruptMask`] and [`MaskGuard`]: keeps the sampling window from being
//!   preempted.
//! - [`Sequencer`]: the wake-up handshake and the 80 pulse reads.
//! - [`RawFrame`]: turns pulse counts into a [`Measurement`].
//! - `ReadingCache` and `Dht11` (with the `std` feature): rate limiting and a
//!   cached last reading shared between threads.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal
#![cfg_attr(not(feature = "std"), no_std)]
#[cfg(test)]
extern crate std;

use core::fmt;

pub mod budget;
pub mod frame;
pub mod line;
pub mod mask;
pub mod measurement;
pub mod pulse;
pub mod sequencer;

#[cfg(feature = "std")]
pub mod cache;
#[cfg(feature = "std")]
pub mod coordinator;

#[cfg(test)]
mod sim;

pub use self::budget::{CycleBudget, FrequencySource};
pub use self::frame::{Pulse, RawFrame};
pub use self::line::{Direction, OpenDrain, SignalLine};
pub use self::mask::{InterruptMask, MaskGuard, NoMask};
pub use self::measurement::Measurement;
pub use self::sequencer::{Sequencer, Stage};
pub use embedded_hal::digital::PinState;

#[cfg(feature = "critical-section")]
pub use self::mask::CriticalSectionMask;

#[cfg(feature = "std")]
pub use self::cache::ReadingCache;
#[cfg(feature = "std")]
pub use self::coordinator::{Clock, Dht11, SystemClock, MIN_INTERVAL};

#[derive(Eq, PartialEq, Debug)]
pub struct Error<I>(ErrorKind<I>);

#[derive(Eq, PartialEq, Debug)]
pub(crate) enum ErrorKind<I> {
    Io(I),
    Checksum { expected: u8, actual: u8 },
    Timeout { stage: Stage },
    SleepingLine,
}

impl<E> From<E> for ErrorKind<E> {
    fn from(e: E) -> Self {
        ErrorKind::Io(e)
    }
}

// === impl Error ===

impl<E> From<ErrorKind<E>> for Error<E> {
    fn from(e: ErrorKind<E>) -> Self {
        Self(e)
    }
}

impl<E> Error<E> {
    /// Returns `true` if a pulse wait ran out of cycle budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self.0, ErrorKind::Timeout { .. })
    }

    /// Returns `true` if an IO error occurred while reading from or writing to
    /// the sensor's data pin.
    pub fn is_io(&self) -> bool {
        matches!(self.0, ErrorKind::Io(_))
    }

    /// Returns `true` if the reading from the sensor had a bad checksum.
    pub fn is_checksum(&self) -> bool {
        matches!(self.0, ErrorKind::Checksum { .. })
    }

    /// Returns `true` if the data line was rejected because accessing it may
    /// sleep.
    pub fn is_sleeping_line(&self) -> bool {
        matches!(self.0, ErrorKind::SleepingLine)
    }

    /// If a pulse wait timed out, returns the stage it timed out in.
    pub fn timeout_stage(&self) -> Option<Stage> {
        match self.0 {
            ErrorKind::Timeout { stage } => Some(stage),
            _ => None,
        }
    }

    /// If the error was caused by an underlying pin IO error, returns it.
    pub fn into_io(self) -> Option<E> {
        match self.0 {
            ErrorKind::Io(io) => Some(io),
            _ => None,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ErrorKind::Io(e) => write!(f, "data line error: {:?}", e),
            ErrorKind::Checksum { expected, actual } => write!(
                f,
                "checksum mismatch: sensor sent {:#04x}, data sums to {:#04x}",
                expected, actual
            ),
            ErrorKind::Timeout { stage } => write!(f, "timed out waiting for pulse in {}", stage),
            ErrorKind::SleepingLine => {
                f.write_str("data line may sleep and cannot be sampled with interrupts masked")
            }
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for Error<E> {}
