//! Simulated output pins for task bodies that drive LEDs.

use core::{cell::RefCell, convert::Infallible};

use critical_section::Mutex;
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};

#[derive(Clone, Copy, Debug, Default)]
struct Line {
    high: bool,
    transitions: u32,
}

/// A bank of `N` output lines, shareable between tasks and interrupt handlers.
pub struct OutputBank<const N: usize> {
    lines: Mutex<RefCell<[Line; N]>>,
}

impl<const N: usize> OutputBank<N> {
    pub const fn new() -> Self {
        Self {
            lines: Mutex::new(RefCell::new(
                [Line {
                    high: false,
                    transitions: 0,
                }; N],
            )),
        }
    }

    pub fn pin(&self, index: usize) -> Option<Pin<'_, N>> {
        (index < N).then_some(Pin { bank: self, index })
    }

    /// Drives line `index` to `high`. Out-of-range lines are ignored.
    pub fn set_output(&self, index: usize, high: bool) {
        critical_section::with(|cs| {
            if let Some(line) = self.lines.borrow_ref_mut(cs).get_mut(index)
                && line.high != high
            {
                line.high = high;
                line.transitions += 1;
            }
        });
    }

    pub fn is_high(&self, index: usize) -> Option<bool> {
        critical_section::with(|cs| self.lines.borrow_ref(cs).get(index).map(|line| line.high))
    }

    /// Number of level changes of line `index` so far.
    pub fn transitions(&self, index: usize) -> Option<u32> {
        critical_section::with(|cs| {
            self.lines
                .borrow_ref(cs)
                .get(index)
                .map(|line| line.transitions)
        })
    }
}

impl<const N: usize> Default for OutputBank<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// One line of an [`OutputBank`], usable through `embedded-hal` traits.
pub struct Pin<'a, const N: usize> {
    bank: &'a OutputBank<N>,
    index: usize,
}

impl<const N: usize> ErrorType for Pin<'_, N> {
    type Error = Infallible;
}

impl<const N: usize> OutputPin for Pin<'_, N> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bank.set_output(self.index, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bank.set_output(self.index, true);
        Ok(())
    }
}

impl<const N: usize> StatefulOutputPin for Pin<'_, N> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.bank.is_high(self.index).unwrap_or(false))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_set_high()?)
    }
}
