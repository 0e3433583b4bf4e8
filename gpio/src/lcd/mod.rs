//! Character LCD stack.
//!
//! Two layers, each with its own [Registry](crate::registry::Registry):
//! - [lcdif]: the bit-banged parallel bus, one [LcdInterface](lcdif::LcdInterface) per enable line,
//!   several of them possibly sharing one [ChannelConfig](lcdif::ChannelConfig);
//! - [hd44780]: the display controller, talking to an open interface through the
//!   [LcdBus](lcdif::LcdBus) trait.
pub mod hd44780;
pub mod lcdif;

use crate::GpioError;
use crate::registry::Id;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("invalid wiring: {0}")]
    InvalidWiring(&'static str),
    #[error("registry is full")]
    RegistryFull,
    #[error("object is already registered")]
    AlreadyRegistered,
    #[error("no object registered as {0}")]
    NotFound(Id),
    #[error("{0} is already open")]
    AlreadyOpen(Id),
    #[error("{0} is still open")]
    StillOpen(Id),
    #[error("handle is not open")]
    NotOpen,
    #[error("bus interface is not open")]
    InterfaceNotOpen,
    #[error("bus is owned by another interface")]
    BusBusy,
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
}

pub type LcdResult<T> = Result<T, LcdError>;
