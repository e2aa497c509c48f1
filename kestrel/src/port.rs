//! Interface to the platform the kernel runs on, implemented in separate crates.

/// Something that happened on the platform while the kernel was idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// A tick period elapsed.
    Tick,
    /// An interrupt handler ran and may have requested a reschedule.
    Interrupt,
    /// Stop the kernel.
    Shutdown,
}

/// Source of ticks and interrupts driving [`Kernel::start`](crate::Kernel::start).
pub trait Port {
    /// Blocks until the next event.
    fn wait_for_event(&mut self) -> Event;
}
