//! The Linux host side of a DHT11: GPIO, CPU frequency, delays, and keeping
//! the scheduler off our back while sampling.
use dht11_engine::{Direction, FrequencySource, InterruptMask, PinState, SignalLine};
use embedded_hal::delay::DelayNs;
use rppal::gpio::{Gpio, IoPin, Level, Mode, Bias};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use std::{fs, hint, io, mem, thread};

/// A Raspberry Pi GPIO line, driven through `rppal`'s memory-mapped
/// registers. Register access never sleeps.
#[derive(Debug)]
pub struct GpioLine {
    pin: IoPin,
}

/// Reads the current frequency of whichever CPU the caller is running on
/// from cpufreq's sysfs interface.
#[derive(Debug)]
pub struct CpuFreq {
    fallback_khz: u32,
    warned: AtomicBool,
}

/// Busy-waits for sub-millisecond delays, which are taken with the sampling
/// window open, and sleeps for anything longer.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpinDelay;

/// Raises the calling thread to `SCHED_FIFO` while sampling.
///
/// Userspace can't mask interrupts, but it can stop other threads from
/// preempting it, which is the bulk of the jitter on a Linux host.
#[derive(Clone, Debug)]
pub struct SchedFifo {
    priority: libc::c_int,
}

/// The scheduling policy and parameters to go back to.
pub struct SchedState {
    policy: libc::c_int,
    param: libc::sched_param,
}

// === impl GpioLine ===

impl GpioLine {
    /// Opens BCM pin `pin` as an output, driven high (the bus's idle state).
    pub fn open(pin: u8) -> Result<Self, rppal::gpio::Error> {
        let mut pin = Gpio::new()?.get(pin)?.into_io(Mode::Output);
        pin.set_bias(Bias::PullUp);
        pin.write(Level::High);
        Ok(Self { pin })
    }
}

impl SignalLine for GpioLine {
    type Error = Infallible;

    fn set_direction(&mut self, direction: Direction) -> Result<(), Infallible> {
        let mode = match direction {
            Direction::Input => Mode::Input,
            Direction::Output => Mode::Output,
        };
        self.pin.set_mode(mode);
        Ok(())
    }

    #[inline(always)]
    fn set_level(&mut self, level: PinState) -> Result<(), Infallible> {
        self.pin.write(match level {
            PinState::High => Level::High,
            PinState::Low => Level::Low,
        });
        Ok(())
    }

    #[inline(always)]
    fn level(&mut self) -> Result<PinState, Infallible> {
        Ok(match self.pin.read() {
            Level::High => PinState::High,
            Level::Low => PinState::Low,
        })
    }
}

// === impl CpuFreq ===

impl CpuFreq {
    pub fn new(fallback_khz: u32) -> Self {
        Self {
            fallback_khz,
            warned: AtomicBool::new(false),
        }
    }

    fn read(cpu: libc::c_int) -> io::Result<u32> {
        let path = format!("/sys/devices/system/cpu/cpu{}/cpufreq/scaling_cur_freq", cpu);
        fs::read_to_string(path)?
            .trim()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Only the first failure is a warning.
    fn or_fallback(&self, cpu: libc::c_int, read: io::Result<u32>) -> u32 {
        let error = match read {
            Ok(khz) => return khz,
            Err(error) => error,
        };
        if self.warned.swap(true, Ordering::Relaxed) {
            tracing::debug!(
                cpu,
                %error,
                fallback_khz = self.fallback_khz,
                "can't read CPU frequency, using fallback"
            );
        } else {
            tracing::warn!(
                cpu,
                %error,
                fallback_khz = self.fallback_khz,
                "can't read CPU frequency, using fallback (repeats are logged at debug)"
            );
        }
        self.fallback_khz
    }
}

impl FrequencySource for CpuFreq {
    fn current_frequency_khz(&self) -> u32 {
        // Safety: no preconditions; returns -1 on failure.
        let cpu = unsafe { libc::sched_getcpu() }.max(0);
        self.or_fallback(cpu, Self::read(cpu))
    }
}

// === impl SpinDelay ===

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let deadline = Instant::now() + Duration::from_nanos(ns.into());
        while Instant::now() < deadline {
            hint::spin_loop();
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }
}

// === impl SchedFifo ===

impl SchedFifo {
    pub fn new(priority: i32) -> Self {
        Self { priority }
    }

    /// Checks that this process may actually switch to `SCHED_FIFO`
    /// (typically that needs root or `CAP_SYS_NICE`).
    pub fn probe(&mut self) -> io::Result<()> {
        let state = self.raise()?;
        Self::reset(&state)
    }

    fn raise(&mut self) -> io::Result<SchedState> {
        // Safety: these only touch the calling thread's scheduling
        // parameters, and `sched_param` is plain old data.
        unsafe {
            let policy = libc::sched_getscheduler(0);
            if policy < 0 {
                return Err(io::Error::last_os_error());
            }
            let mut param: libc::sched_param = mem::zeroed();
            if libc::sched_getparam(0, &mut param) != 0 {
                return Err(io::Error::last_os_error());
            }
            let mut fifo: libc::sched_param = mem::zeroed();
            fifo.sched_priority = self.priority;
            if libc::sched_setscheduler(0, libc::SCHED_FIFO, &fifo) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(SchedState { policy, param })
        }
    }

    fn reset(state: &SchedState) -> io::Result<()> {
        // Safety: see `raise`.
        if unsafe { libc::sched_setscheduler(0, state.policy, &state.param) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl InterruptMask for SchedFifo {
    /// `None` if the priority couldn't be raised. Nothing can be logged from
    /// inside the window, so [`SchedFifo::probe`] is how that gets reported.
    type State = Option<SchedState>;

    fn disable(&mut self) -> Self::State {
        self.raise().ok()
    }

    fn restore(&mut self, state: Self::State) {
        // The window is closed by now, so this is the first chance to say
        // anything.
        if let Some(state) = state {
            if let Err(error) = Self::reset(&state) {
                tracing::warn!(
                    %error,
                    policy = state.policy,
                    "can't restore scheduling policy after sampling"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_delay_waits_at_least_as_long_as_asked() {
        let mut delay = SpinDelay;
        let start = Instant::now();
        delay.delay_us(200);
        assert!(start.elapsed() >= Duration::from_micros(200));

        let start = Instant::now();
        delay.delay_ms(2);
        assert!(start.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn frequency_falls_back() {
        // Containers and CI machines often have no cpufreq at all, so only
        // check that we always get something usable.
        let khz = CpuFreq::new(123_456).current_frequency_khz();
        assert!(khz > 0);
    }

    #[test]
    fn frequency_warns_once() {
        let freq = CpuFreq::new(123_456);
        assert_eq!(freq.or_fallback(0, Ok(600_000)), 600_000);
        assert!(!freq.warned.load(Ordering::Relaxed));

        let missing = || -> io::Result<u32> { Err(io::Error::from(io::ErrorKind::NotFound)) };
        assert_eq!(freq.or_fallback(0, missing()), 123_456);
        assert!(freq.warned.load(Ordering::Relaxed));
        assert_eq!(freq.or_fallback(1, missing()), 123_456);
    }

    #[test]
    fn failed_restore_is_reported() {
        // Safety: `sched_param` is plain old data.
        let bogus = SchedState {
            policy: -1,
            param: unsafe { mem::zeroed() },
        };
        let err = SchedFifo::reset(&bogus).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));

        // Logged, not panicked.
        let mut mask = SchedFifo::new(10);
        mask.restore(Some(bogus));
    }

    #[test]
    fn sched_fifo_restores_policy() {
        // Safety: reading our own scheduling policy.
        let before = unsafe { libc::sched_getscheduler(0) };
        let mut mask = SchedFifo::new(10);
        // Usually not permitted when running unprivileged; either way the
        // policy must come back.
        let _ = mask.probe();
        let state = mask.disable();
        mask.restore(state);
        assert_eq!(unsafe { libc::sched_getscheduler(0) }, before);
    }
}
