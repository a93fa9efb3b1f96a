//! A scripted DHT11 for tests.
//!
//! Each sample of the line consumes one "cycle" of the script, so pulse widths
//! in the script come back out of `count_cycles` as (almost) the same counts.
use crate::frame::BITS;
use crate::{Direction, Pulse, RawFrame, SignalLine};
use embedded_hal::digital::PinState;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const ACK: u32 = 80;
const BIT_LO: u32 = 50;
const ZERO_HI: u32 = 27;
const ONE_HI: u32 = 70;

/// Returns the frame a perfectly-timed sensor would produce for `bytes`.
pub(crate) fn frame_for(bytes: [u8; 5]) -> RawFrame {
    let mut pulses = [Pulse::default(); BITS];
    for (i, pulse) in pulses.iter_mut().enumerate() {
        let bit = bytes[i / 8] & (0x80 >> (i % 8)) != 0;
        *pulse = Pulse::new(BIT_LO, if bit { ONE_HI } else { ZERO_HI });
    }
    RawFrame::from_pulses(pulses)
}

/// What the sensor does the next time it is woken up.
#[derive(Clone, Debug)]
pub(crate) enum Response {
    Frame([u8; 5]),
    /// Sends a frame but holds the line low forever at the start of this bit.
    StallAt { bytes: [u8; 5], bit: usize },
    /// Sends a frame, but the line starts failing to read at the start of
    /// this bit.
    FaultAt { bytes: [u8; 5], bit: usize },
    /// Never answers.
    Silent,
}

/// What a broken line reports.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct BusFault;

enum Run {
    Hold(PinState, u32),
    Fault,
}

/// The sensor end of the wire, shared with the test so it can queue up
/// responses and look at what the host did.
#[derive(Clone, Default)]
pub(crate) struct Sensor {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    responses: VecDeque<Response>,
    triggers: usize,
    samples: usize,
}

pub(crate) struct SimLine {
    sensor: Sensor,
    direction: Direction,
    driven: PinState,
    runs: VecDeque<Run>,
    can_sleep: bool,
}

impl Sensor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, response: Response) -> &Self {
        self.lock().responses.push_back(response);
        self
    }

    /// How many times the host has sent a start signal.
    pub(crate) fn triggers(&self) -> usize {
        self.lock().triggers
    }

    /// How many times the host has sampled the line.
    pub(crate) fn samples(&self) -> usize {
        self.lock().samples
    }

    pub(crate) fn line(&self) -> SimLine {
        SimLine {
            sensor: self.clone(),
            direction: Direction::Output,
            driven: PinState::High,
            runs: VecDeque::new(),
            can_sleep: false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }
}

impl SimLine {
    pub(crate) fn sleepy(mut self) -> Self {
        self.can_sleep = true;
        self
    }

    pub(crate) fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn driven(&self) -> PinState {
        self.driven
    }

    fn script(response: Response) -> VecDeque<Run> {
        // After the last pulse: the end-of-frame low (then the pull-up takes
        // over), a low that never ends, or a broken line.
        let (bytes, cut, tail) = match response {
            Response::Silent => return VecDeque::new(),
            Response::Frame(bytes) => (bytes, BITS, Run::Hold(PinState::Low, BIT_LO)),
            Response::StallAt { bytes, bit } => (bytes, bit, Run::Hold(PinState::Low, u32::MAX)),
            Response::FaultAt { bytes, bit } => (bytes, bit, Run::Fault),
        };
        let mut runs = VecDeque::new();
        runs.push_back(Run::Hold(PinState::Low, ACK));
        runs.push_back(Run::Hold(PinState::High, ACK));
        for pulse in frame_for(bytes).pulses().iter().take(cut) {
            runs.push_back(Run::Hold(PinState::Low, pulse.lo));
            runs.push_back(Run::Hold(PinState::High, pulse.hi));
        }
        runs.push_back(tail);
        runs
    }
}

impl SignalLine for SimLine {
    type Error = BusFault;

    fn set_direction(&mut self, direction: Direction) -> Result<(), BusFault> {
        if direction == Direction::Input && self.direction == Direction::Output {
            let response = self
                .sensor
                .lock()
                .responses
                .pop_front()
                .unwrap_or(Response::Silent);
            self.runs = Self::script(response);
        }
        if direction == Direction::Output {
            self.runs.clear();
        }
        self.direction = direction;
        Ok(())
    }

    fn set_level(&mut self, level: PinState) -> Result<(), BusFault> {
        if level == PinState::Low && self.driven == PinState::High {
            self.sensor.lock().triggers += 1;
        }
        self.driven = level;
        Ok(())
    }

    fn level(&mut self) -> Result<PinState, BusFault> {
        self.sensor.lock().samples += 1;
        if self.direction == Direction::Output {
            return Ok(self.driven);
        }
        while let Some(run) = self.runs.front_mut() {
            match run {
                Run::Fault => return Err(BusFault),
                Run::Hold(level, remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    return Ok(*level);
                }
                Run::Hold(..) => {
                    self.runs.pop_front();
                }
            }
        }
        Ok(PinState::High)
    }

    fn can_sleep(&self) -> bool {
        self.can_sleep
    }
}
