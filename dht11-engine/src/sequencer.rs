//! Waking the sensor up and capturing its answer.
use crate::{
    frame::BITS, pulse::count_cycles, CycleBudget, Direction, ErrorKind, InterruptMask,
    MaskGuard, RawFrame, SignalLine,
};
use core::fmt;
use embedded_hal::{delay::DelayNs, digital::PinState};

// Datasheet says at least 18 ms.
const START_SIGNAL_LOW_MS: u32 = 20;
const START_SIGNAL_HIGH_US: u32 = 40;
const IDLE_HIGH_MS: u32 = 1;

/// Drives one acquisition: the start signal, the sensor's acknowledgement,
/// and the 40 data bits.
#[derive(Debug)]
pub struct Sequencer<L, D, M> {
    line: L,
    delay: D,
    mask: M,
}

/// Where an acquisition is (or was, when it failed).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    /// Driving the line high, its idle state.
    Idle,
    /// Holding the line low to wake the sensor.
    Trigger,
    /// Releasing the line to the sensor. Interrupts are masked from here on.
    RequestResponse,
    /// Waiting for the sensor's low/high acknowledgement.
    AwaitAck,
    /// Reading data bit `bit` (0 through 39).
    SampleBits { bit: u8 },
    /// All 40 bits captured. Interrupts are unmasked again.
    Done,
}

impl<L, D, M> Sequencer<L, D, M>
where
    L: SignalLine,
    D: DelayNs,
    M: InterruptMask,
{
    /// Returns a new sequencer driving `line`.
    ///
    /// `delay` must busy-wait for microsecond delays: one is taken with
    /// interrupts masked.
    pub fn new(line: L, delay: D, mask: M) -> Self {
        Self { line, delay, mask }
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    pub fn into_parts(self) -> (L, D, M) {
        (self.line, self.delay, self.mask)
    }

    /// Runs one acquisition and returns the captured pulses.
    ///
    /// Every pulse wait is bounded by `budget`; the first one to run out
    /// abandons the rest of the frame. Whatever happens, the line is left
    /// driven high afterwards, ready for the next start signal.
    pub fn acquire(&mut self, budget: CycleBudget) -> Result<RawFrame, crate::Error<L::Error>> {
        let captured = self.capture(budget);
        let restored = self.restore();
        let frame = captured?;
        restored?;
        Ok(frame)
    }

    fn capture(&mut self, budget: CycleBudget) -> Result<RawFrame, ErrorKind<L::Error>> {
        let mut frame = RawFrame::empty();
        let mut stage = Stage::Idle;

        loop {
            stage = match stage {
                Stage::Idle => {
                    self.line.set_direction(Direction::Output)?;
                    self.line.set_level(PinState::High)?;
                    self.delay.delay_ms(IDLE_HIGH_MS);
                    Stage::Trigger
                }
                Stage::Trigger => {
                    self.line.set_level(PinState::Low)?;
                    self.delay.delay_ms(START_SIGNAL_LOW_MS);
                    Stage::RequestResponse
                }
                Stage::Done => return Ok(frame),
                // Timing-critical from here until the last bit is in. The
                // window closes when `_window` drops, early returns included.
                stage => {
                    let _window = MaskGuard::enter(&mut self.mask);
                    sample(&mut self.line, &mut self.delay, stage, budget, &mut frame)?
                }
            };
        }
    }

    fn restore(&mut self) -> Result<(), ErrorKind<L::Error>> {
        self.line.set_direction(Direction::Output)?;
        self.line.set_level(PinState::High)?;
        Ok(())
    }
}

/// Runs the stages that happen with interrupts masked, returning once the
/// whole frame has been captured.
#[inline(always)] // timing-critical
fn sample<L, D>(
    line: &mut L,
    delay: &mut D,
    mut stage: Stage,
    budget: CycleBudget,
    frame: &mut RawFrame,
) -> Result<Stage, ErrorKind<L::Error>>
where
    L: SignalLine,
    D: DelayNs,
{
    loop {
        stage = match stage {
            Stage::RequestResponse => {
                line.set_level(PinState::High)?;
                delay.delay_us(START_SIGNAL_HIGH_US);
                line.set_direction(Direction::Input)?;
                Stage::AwaitAck
            }
            Stage::AwaitAck => {
                // ~80us low, then ~80us high.
                count_cycles(line, PinState::Low, budget)?.ok_or(ErrorKind::Timeout { stage })?;
                count_cycles(line, PinState::High, budget)?.ok_or(ErrorKind::Timeout { stage })?;
                Stage::SampleBits { bit: 0 }
            }
            Stage::SampleBits { bit } if bit as usize == BITS => return Ok(Stage::Done),
            Stage::SampleBits { bit } => {
                // Only count here. Decoding waits until the window is closed.
                let pulse = frame.pulse_mut(bit as usize);
                pulse.lo = count_cycles(line, PinState::Low, budget)?
                    .ok_or(ErrorKind::Timeout { stage })?;
                pulse.hi = count_cycles(line, PinState::High, budget)?
                    .ok_or(ErrorKind::Timeout { stage })?;
                Stage::SampleBits { bit: bit + 1 }
            }
            other => return Ok(other),
        };
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => f.write_str("idle"),
            Stage::Trigger => f.write_str("start signal"),
            Stage::RequestResponse => f.write_str("line release"),
            Stage::AwaitAck => f.write_str("sensor acknowledgement"),
            Stage::SampleBits { bit } => write!(f, "data bit {}", bit),
            Stage::Done => f.write_str("done"),
        }
    }
}
