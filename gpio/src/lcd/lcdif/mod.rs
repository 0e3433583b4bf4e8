//! Bit-banged parallel bus for HD44780-style controllers.
//!
//! See [LcdBus] for the operations a display driver needs from a bus, and [LcdInterface] for the
//! implementation over [GpioRegister](crate::GpioRegister)s. Several interfaces may share one
//! [ChannelConfig] (the RW, RS and data lines) and differ only in their enable line; the channel's
//! ownership token makes sure only one of them drives the shared lines at a time.

mod channel;
mod gpio;

use crate::lcd::LcdResult;
use crate::registry::Registry;
pub use channel::*;
pub use gpio::*;
use std::fmt::{Debug, Display, Formatter};

/// Registry of bus interfaces.
pub type LcdifRegistry<'a> = Registry<'a, LcdInterface<'a>>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusWidth {
    /// 4 data lines, every byte is sent as two nibbles, high nibble first.
    Four,
    /// 8 data lines.
    Eight,
}

impl BusWidth {
    pub fn bits(self) -> u8 {
        match self {
            BusWidth::Four => 4,
            BusWidth::Eight => 8,
        }
    }
}

impl Display for BusWidth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Operations a display driver needs from an open bus interface.
///
/// Acquiring never blocks: [LcdBus::acquire_bus] either takes the bus right away or reports that
/// somebody else holds it, and the caller is expected to come back later. Transactions fail with
/// `LcdError::BusBusy` unless the bus was acquired first.
pub trait LcdBus: Debug {
    /// Tries to take ownership of the bus. Returns `false` if it is already owned.
    fn acquire_bus(&self) -> bool;

    /// Gives up ownership of the bus. Unconditional.
    fn release_bus(&self);

    /// Writes a byte to the data register (RS high).
    fn write_data(&self, data: u8) -> LcdResult<()>;

    /// Reads a byte from the data register (RS high).
    fn read_data(&self) -> LcdResult<u8>;

    /// Writes an instruction (RS low).
    fn write_instruction(&self, instruction: u8) -> LcdResult<()>;

    /// Reads the busy flag (bit 7) and the address counter (RS low).
    fn read_address(&self) -> LcdResult<u8>;

    /// Writes the low nibble of `nibble` as a single-pulse instruction, for the 4-bit wake-up
    /// sequence.
    fn write_function_set_nibble(&self, nibble: u8) -> LcdResult<()>;

    fn bus_width(&self) -> BusWidth;

    fn is_open(&self) -> bool;
}
