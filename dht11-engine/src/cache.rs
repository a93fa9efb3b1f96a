//! The last reading, and when it was taken.
use crate::{CycleBudget, Measurement};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Holds the most recent measurement and rate-limits acquisitions.
///
/// The state lives in three independently locked sections, since nothing
/// ever needs two of them to change together:
///
/// - the time of the last acquisition, which is checked and claimed in one
///   step by [`ReadingCache::try_begin`];
/// - the measurement itself, always replaced whole, so a reader sees either
///   the old reading or the new one and never a mix;
/// - the cycle budget the last acquisition was calibrated with.
#[derive(Debug)]
pub struct ReadingCache {
    min_interval: Duration,
    last_acquisition: Mutex<Option<Instant>>,
    measurement: Mutex<Measurement>,
    budget: Mutex<Option<CycleBudget>>,
}

impl ReadingCache {
    /// Returns an empty cache. The first call to [`ReadingCache::try_begin`]
    /// always succeeds.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_acquisition: Mutex::new(None),
            measurement: Mutex::new(Measurement::NONE),
            budget: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn get(&self) -> Measurement {
        *lock(&self.measurement)
    }

    /// Returns `true` if an acquisition started at `now` would be allowed.
    ///
    /// This doesn't claim anything; two callers may both see `true`. Use
    /// [`ReadingCache::try_begin`] to actually start one.
    pub fn should_acquire(&self, now: Instant) -> bool {
        Self::due(*lock(&self.last_acquisition), now, self.min_interval)
    }

    /// Claims the right to acquire at `now`.
    ///
    /// If at least the minimum interval has passed since the last acquisition
    /// (or there never was one), records `now` as the new acquisition time and
    /// returns `true`. Otherwise leaves everything alone and returns `false`.
    /// The check and the update happen under one lock, so of several callers
    /// racing within the same interval exactly one wins.
    pub fn try_begin(&self, now: Instant) -> bool {
        let mut last = lock(&self.last_acquisition);
        if !Self::due(*last, now, self.min_interval) {
            return false;
        }
        *last = Some(now);
        true
    }

    /// Replaces the cached measurement.
    pub fn record(&self, measurement: Measurement) {
        *lock(&self.measurement) = measurement;
    }

    /// Marks the cached measurement as not valid, leaving its data in place.
    pub fn invalidate(&self) {
        let mut measurement = lock(&self.measurement);
        *measurement = measurement.invalidated();
    }

    pub fn last_acquisition(&self) -> Option<Instant> {
        *lock(&self.last_acquisition)
    }

    pub fn record_budget(&self, budget: CycleBudget) {
        *lock(&self.budget) = Some(budget);
    }

    pub fn last_budget(&self) -> Option<CycleBudget> {
        *lock(&self.budget)
    }

    fn due(last: Option<Instant>, now: Instant, min_interval: Duration) -> bool {
        match last {
            Some(last) => now.saturating_duration_since(last) >= min_interval,
            None => true,
        }
    }
}

/// Every section holds plain `Copy` data that is replaced in one assignment,
/// so a panic elsewhere can't have left it half-written.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
