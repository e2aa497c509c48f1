//! Helpers for kestrel task bodies.

#![cfg_attr(not(test), no_std)]

pub mod delay;
pub mod gpio;

pub use delay::Delay;
pub use gpio::{OutputBank, Pin};
