//! Measuring pulse widths by counting polling iterations.
use crate::{CycleBudget, SignalLine};
use embedded_hal::digital::PinState;

/// Spins on `line` for as long as it holds `level`, and returns how many
/// samples saw that level.
///
/// Returns `Ok(None)` if the count reaches `budget` before the level changes.
/// The budget is an inclusive ceiling: a pulse that lasts exactly `budget`
/// samples has timed out.
///
/// There is deliberately no delay between samples. DHT11 pulses are tens of
/// microseconds long, and the only unit of time here is "one more trip around
/// this loop", so this must run with interrupts masked to mean anything.
#[inline(always)] // timing-critical
pub fn count_cycles<L: SignalLine>(
    line: &mut L,
    level: PinState,
    budget: CycleBudget,
) -> Result<Option<u32>, L::Error> {
    let max = budget.cycles();
    let mut cycles: u32 = 0;
    while line.level()? == level {
        cycles += 1;
        if cycles >= max {
            return Ok(None);
        }
    }
    Ok(Some(cycles))
}
