//! Pulse-wait timeouts, calibrated against the current CPU frequency.
use core::fmt;

/// The most polling iterations a single pulse wait may spend before it is
/// declared timed out.
///
/// A budget is recalibrated at the start of every acquisition from the CPU's
/// current frequency, so that a pulse wait gives up after roughly the same
/// wall-clock time (about a millisecond) whether the CPU has been scaled up
/// or down since the last read.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CycleBudget(u32);

/// Reports the current clock frequency of the CPU doing the sampling.
pub trait FrequencySource {
    fn current_frequency_khz(&self) -> u32;
}

impl CycleBudget {
    pub const fn new(cycles: u32) -> Self {
        Self(cycles)
    }

    /// Returns a budget of roughly one millisecond of polling at `khz`.
    ///
    /// One kilohertz is one thousand cycles per second, i.e. one cycle per
    /// millisecond, so the frequency in kHz is already the number of cycles
    /// in a millisecond. A polling iteration takes more than one CPU cycle, so
    /// this errs on the long side, which is what we want from a timeout.
    pub const fn from_khz(khz: u32) -> Self {
        Self(khz)
    }

    /// Samples `source` and returns the budget for the next acquisition.
    pub fn calibrate<F: FrequencySource + ?Sized>(source: &F) -> Self {
        Self::from_khz(source.current_frequency_khz())
    }

    pub const fn cycles(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CycleBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cycles", self.0)
    }
}

impl<F: FrequencySource + ?Sized> FrequencySource for &F {
    fn current_frequency_khz(&self) -> u32 {
        (**self).current_frequency_khz()
    }
}

/// A fixed frequency, for CPUs that don't do frequency scaling.
impl FrequencySource for u32 {
    fn current_frequency_khz(&self) -> u32 {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct Scaling(Cell<u32>);

    impl FrequencySource for Scaling {
        fn current_frequency_khz(&self) -> u32 {
            self.0.get()
        }
    }

    #[test]
    fn budget_is_a_millisecond_of_cycles() {
        // 1.2 GHz.
        assert_eq!(CycleBudget::calibrate(&1_200_000u32).cycles(), 1_200_000);
        assert_eq!(CycleBudget::from_khz(600_000), CycleBudget::new(600_000));
    }

    #[test]
    fn recalibration_follows_frequency_changes() {
        let cpu = Scaling(Cell::new(1_500_000));
        let fast = CycleBudget::calibrate(&cpu);
        cpu.0.set(600_000);
        let slow = CycleBudget::calibrate(&cpu);
        assert!(slow < fast);
        assert_eq!(slow.cycles(), 600_000);
    }
}
