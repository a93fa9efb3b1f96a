//! The sensor's data line.
use embedded_hal::digital::{InputPin, OutputPin, PinState};

/// Which way the data line is currently driven.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Input,
    Output,
}

/// A single bidirectional GPIO line.
///
/// Implementations may sit on memory-mapped registers or on an OS-provided
/// line abstraction; the engine only cares that a level can be driven and
/// sampled. Every method here is called from inside the sampling window, so
/// none of them may sleep.
pub trait SignalLine {
    type Error;

    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error>;

    fn set_level(&mut self, level: PinState) -> Result<(), Self::Error>;

    fn level(&mut self) -> Result<PinState, Self::Error>;

    /// Returns `true` if accessing this line may block, e.g. because the GPIO
    /// controller sits behind a slow bus.
    ///
    /// This is probed once when the engine is constructed, never while
    /// sampling.
    fn can_sleep(&self) -> bool {
        false
    }
}

/// Adapts an [`embedded-hal`] open-drain pin into a [`SignalLine`].
///
/// With an external pull-up (which the DHT11 needs anyway), driving an
/// open-drain pin high just lets go of the line, so "switching to input"
/// means setting it high and reading from then on.
///
/// [`embedded-hal`]: https://crates.io/crates/embedded-hal
#[derive(Debug)]
pub struct OpenDrain<P> {
    pin: P,
}

impl<P> OpenDrain<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }

    pub fn get_mut(&mut self) -> &mut P {
        &mut self.pin
    }
}

impl<P, E> SignalLine for OpenDrain<P>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
{
    type Error = E;

    fn set_direction(&mut self, direction: Direction) -> Result<(), E> {
        match direction {
            Direction::Input => self.pin.set_high(),
            Direction::Output => Ok(()),
        }
    }

    #[inline(always)]
    fn set_level(&mut self, level: PinState) -> Result<(), E> {
        self.pin.set_state(level)
    }

    #[inline(always)]
    fn level(&mut self) -> Result<PinState, E> {
        Ok(PinState::from(self.pin.is_high()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    #[test]
    fn input_releases_the_line() {
        let expectations = [PinTransaction::set(State::High)];
        let mut line = OpenDrain::new(PinMock::new(&expectations));

        line.set_direction(Direction::Output).unwrap();
        line.set_direction(Direction::Input).unwrap();

        line.get_mut().done();
    }

    #[test]
    fn levels_pass_through() {
        let expectations = [
            PinTransaction::set(State::Low),
            PinTransaction::get(State::High),
            PinTransaction::get(State::Low),
        ];
        let mut line = OpenDrain::new(PinMock::new(&expectations));

        line.set_level(PinState::Low).unwrap();
        assert_eq!(line.level().unwrap(), PinState::High);
        assert_eq!(line.level().unwrap(), PinState::Low);
        assert!(!line.can_sleep());

        line.into_inner().done();
    }
}
