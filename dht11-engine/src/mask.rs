//! Keeping the sampling window free of interruptions.
//!
//! A pulse is only as long as the number of loop iterations we saw it for,
//! so an interrupt landing in the middle of a pulse makes that pulse look
//! longer than it was. While the sensor is talking, whatever can preempt the
//! sampling loop has to be held off.
//!
//! Nothing may sleep while a [`MaskGuard`] is alive.

/// Something that can hold off asynchronous interruption of the current
/// execution context.
pub trait InterruptMask {
    /// Whatever is needed to put things back the way they were.
    type State;

    fn disable(&mut self) -> Self::State;

    fn restore(&mut self, state: Self::State);
}

/// Interruptions are held off for as long as this guard lives.
///
/// Dropping the guard restores the previous state, so leaving the window
/// early with `?` can't leave interrupts masked.
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct MaskGuard<'a, M: InterruptMask> {
    mask: &'a mut M,
    state: Option<M::State>,
}

/// Does nothing.
///
/// For hosts where the caller has already arranged not to be preempted, and
/// for tests.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoMask;

impl<'a, M: InterruptMask> MaskGuard<'a, M> {
    pub fn enter(mask: &'a mut M) -> Self {
        let state = mask.disable();
        Self {
            mask,
            state: Some(state),
        }
    }
}

impl<M: InterruptMask> Drop for MaskGuard<'_, M> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.mask.restore(state);
        }
    }
}

impl InterruptMask for NoMask {
    type State = ();

    fn disable(&mut self) {}

    fn restore(&mut self, _: ()) {}
}

impl<M: InterruptMask + ?Sized> InterruptMask for &mut M {
    type State = M::State;

    fn disable(&mut self) -> Self::State {
        (**self).disable()
    }

    fn restore(&mut self, state: Self::State) {
        (**self).restore(state)
    }
}

/// Masks interrupts with the platform's [`critical-section`] implementation.
///
/// [`critical-section`]: https://crates.io/crates/critical-section
#[cfg(feature = "critical-section")]
#[derive(Copy, Clone, Debug, Default)]
pub struct CriticalSectionMask;

#[cfg(feature = "critical-section")]
impl InterruptMask for CriticalSectionMask {
    type State = critical_section::RestoreState;

    fn disable(&mut self) -> Self::State {
        // Safety: `MaskGuard` hands the state back to `restore` exactly once,
        // and guards nest in LIFO order because each one borrows its mask
        // mutably.
        unsafe { critical_section::acquire() }
    }

    fn restore(&mut self, state: Self::State) {
        // Safety: `state` came from the matching `acquire` above.
        unsafe { critical_section::release(state) }
    }
}
