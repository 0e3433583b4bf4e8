pub mod lcd;
pub mod raw;
pub mod registry;
pub mod sim;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// A memory-mapped style GPIO register.
///
/// The LCD layers only ever see registers: an output latch, an input port and a direction
/// register for the data lines, and latches for the control lines. Every backend exposes its
/// hardware through this trait, so the bus driver does not care whether the bits land in a PIC
/// `LATx`, a Raspberry Pi GPIO bank, or a simulated port.
pub trait GpioRegister: Debug {
    /// Reads the current value of the register.
    fn read(&self) -> GpioResult<u32>;

    /// Writes the whole register.
    fn write(&self, value: u32) -> GpioResult<()>;

    /// Read-modify-write: clears the `clear` bits, then sets the `set` bits.
    fn modify(&self, clear: u32, set: u32) -> GpioResult<()> {
        let value = self.read()?;
        self.write((value & !clear) | set)
    }

    /// Sets the bits selected by `mask`.
    fn set_bits(&self, mask: u32) -> GpioResult<()> {
        self.modify(0, mask)
    }

    /// Clears the bits selected by `mask`.
    fn clear_bits(&self, mask: u32) -> GpioResult<()> {
        self.modify(mask, 0)
    }

    /// Drives the bits selected by `mask` high or low.
    fn write_bits(&self, mask: u32, high: bool) -> GpioResult<()> {
        if high {
            self.set_bits(mask)
        } else {
            self.clear_bits(mask)
        }
    }
}
