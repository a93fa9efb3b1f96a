//! Deciding, per read, whether to talk to the sensor at all.
use crate::{
    CycleBudget, ErrorKind, FrequencySource, InterruptMask, Measurement, ReadingCache, Sequencer,
    SignalLine,
};
use core::fmt;
use embedded_hal::delay::DelayNs;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// The DHT11 can only be read about once a second. Reads arriving sooner are
/// answered from the cache.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// A monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// [`Instant::now`].
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

/// A DHT11 sensor, safe to read from several threads at once.
///
/// Each call to [`Dht11::read`] either runs a fresh acquisition or, if the
/// last one started less than the minimum interval ago, returns the cached
/// measurement without touching the hardware. Either way it returns promptly
/// with a [`Measurement`]; a failed acquisition shows up as
/// [`Measurement::is_valid`] returning `false`, never as a panic or an error.
pub struct Dht11<L, D, M, F, C = SystemClock> {
    sequencer: Mutex<Sequencer<L, D, M>>,
    frequency: F,
    clock: C,
    cache: ReadingCache,
}

impl<L, D, M, F> Dht11<L, D, M, F>
where
    L: SignalLine,
    L::Error: fmt::Debug,
    D: DelayNs,
    M: InterruptMask,
    F: FrequencySource,
{
    /// Returns a new DHT11 on `line`, rate limited to [`MIN_INTERVAL`].
    ///
    /// # Errors
    ///
    /// Fails if `line` reports that accessing it may sleep, since it could
    /// not be sampled with interrupts masked.
    pub fn new(line: L, delay: D, mask: M, frequency: F) -> Result<Self, crate::Error<L::Error>> {
        Self::with_clock(line, delay, mask, frequency, SystemClock, MIN_INTERVAL)
    }
}

impl<L, D, M, F, C> Dht11<L, D, M, F, C>
where
    L: SignalLine,
    L::Error: fmt::Debug,
    D: DelayNs,
    M: InterruptMask,
    F: FrequencySource,
    C: Clock,
{
    /// Returns a new DHT11 on `line`, using `clock` for rate limiting and
    /// acquiring at most once per `min_interval`.
    pub fn with_clock(
        line: L,
        delay: D,
        mask: M,
        frequency: F,
        clock: C,
        min_interval: Duration,
    ) -> Result<Self, crate::Error<L::Error>> {
        if line.can_sleep() {
            return Err(crate::Error(ErrorKind::SleepingLine));
        }
        Ok(Self {
            sequencer: Mutex::new(Sequencer::new(line, delay, mask)),
            frequency,
            clock,
            cache: ReadingCache::new(min_interval),
        })
    }

    /// Returns the current measurement, acquiring a new one first if the
    /// minimum interval has passed.
    pub fn read(&self) -> Measurement {
        let now = self.clock.now();
        if !self.cache.try_begin(now) {
            tracing::trace!("within minimum interval, serving cached reading");
            return self.cache.get();
        }

        let budget = CycleBudget::calibrate(&self.frequency);
        self.cache.record_budget(budget);

        match self.acquire(budget) {
            Ok(measurement) => {
                tracing::debug!(
                    humidity = measurement.humidity_integral(),
                    humidity_decimal = measurement.humidity_decimal(),
                    temperature = measurement.temperature_integral(),
                    temperature_decimal = measurement.temperature_decimal(),
                    "read DHT11"
                );
                self.cache.record(measurement);
            }
            Err(error) if error.is_checksum() => {
                tracing::info!(%error, "invalid data read from DHT11");
                self.cache.invalidate();
            }
            Err(error) => {
                tracing::debug!(%error, %budget, "DHT11 acquisition failed");
                self.cache.invalidate();
            }
        }

        self.cache.get()
    }

    /// Reads (see [`Dht11::read`]) and writes the result into `buf` as a
    /// 5-byte record.
    ///
    /// Returns the number of bytes written, which is 0 if `buf` is shorter
    /// than [`Measurement::RECORD_LEN`].
    pub fn read_record(&self, buf: &mut [u8]) -> usize {
        let written = self.read().write_record(buf);
        if written == 0 {
            tracing::warn!(
                len = buf.len(),
                needed = Measurement::RECORD_LEN,
                "buffer too short for DHT11 record"
            );
        }
        written
    }

    /// Returns the cached measurement without ever acquiring.
    pub fn cached(&self) -> Measurement {
        self.cache.get()
    }

    /// Returns the cycle budget the most recent acquisition was calibrated
    /// with, if there has been one.
    pub fn last_budget(&self) -> Option<CycleBudget> {
        self.cache.last_budget()
    }

    fn acquire(&self, budget: CycleBudget) -> Result<Measurement, crate::Error<L::Error>> {
        // Each acquisition starts by forcing the line back to idle, so a
        // panic mid-acquisition doesn't leave anything to clean up.
        let frame = self
            .sequencer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .acquire(budget)?;
        frame.decode()
    }
}

impl<L, D, M, F: fmt::Debug, C: fmt::Debug> fmt::Debug for Dht11<L, D, M, F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dht11")
            .field("frequency", &self.frequency)
            .field("clock", &self.clock)
            .field("cache", &self.cache)
            .finish()
    }
}

// === impl Clock ===

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
