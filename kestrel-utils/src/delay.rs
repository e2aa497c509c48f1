//! Delays expressed in wall-clock units instead of ticks.
//! The precision is limited by the tick frequency setting of the kernel (usually order of a millisecond or more).

use core::task::Poll;

use kestrel::{Kernel, TaskContext};

#[derive(Clone, Copy, Debug)]
pub struct Delay {
    tick_freq: u32,
}

impl Delay {
    pub fn new<M>(kernel: &Kernel<M>) -> Self {
        Self::with_tick_freq(kernel.config().tick_freq)
    }

    pub fn with_tick_freq(tick_freq: u32) -> Self {
        Self { tick_freq }
    }

    /// Rounds up, so a non-zero delay never becomes zero ticks.
    pub fn ns_to_ticks(&self, ns: u32) -> u64 {
        (ns as u64 * self.tick_freq as u64).div_ceil(1_000_000_000)
    }

    pub fn us_to_ticks(&self, us: u32) -> u64 {
        (us as u64 * self.tick_freq as u64).div_ceil(1_000_000)
    }

    pub fn ms_to_ticks(&self, ms: u32) -> u64 {
        (ms as u64 * self.tick_freq as u64).div_ceil(1_000)
    }

    pub fn delay_us<M>(&self, cx: &mut TaskContext<'_, M>, us: u32) -> Poll<()> {
        cx.delay(self.us_to_ticks(us))
    }

    pub fn delay_ms<M>(&self, cx: &mut TaskContext<'_, M>, ms: u32) -> Poll<()> {
        cx.delay(self.ms_to_ticks(ms))
    }
}
