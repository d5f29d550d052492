//! Core traits for the ProDOS 8 emulator.

mod bus;

pub use bus::Bus;
