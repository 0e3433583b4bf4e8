use crate::lcd::lcdif::BusWidth;
use crate::lcd::{LcdError, LcdResult};
use crate::{GpioRegister, GpioResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// A single control line: one bit of an output register.
#[derive(Debug, Copy, Clone)]
pub struct ControlLine<'a> {
    pub register: &'a dyn GpioRegister,
    pub mask: u32,
}

impl<'a> ControlLine<'a> {
    pub fn new(register: &'a dyn GpioRegister, mask: u32) -> Self {
        ControlLine { register, mask }
    }

    pub(crate) fn validate(&self, error: &'static str) -> LcdResult<()> {
        if self.mask.count_ones() != 1 {
            return Err(LcdError::InvalidWiring(error));
        }
        Ok(())
    }

    pub(crate) fn drive(&self, high: bool) -> GpioResult<()> {
        self.register.write_bits(self.mask, high)
    }
}

/// The data lines of a bus: 4 or 8 contiguous bits of one port.
#[derive(Debug, Copy, Clone)]
pub struct DataLines<'a> {
    /// Output latch the lines are driven through.
    pub latch: &'a dyn GpioRegister,
    /// Input port the lines are sampled from.
    pub port: &'a dyn GpioRegister,
    /// Direction register, a set bit makes the line an input.
    pub direction: &'a dyn GpioRegister,
    pub mask: u32,
}

impl<'a> DataLines<'a> {
    pub fn new(
        latch: &'a dyn GpioRegister,
        port: &'a dyn GpioRegister,
        direction: &'a dyn GpioRegister,
        mask: u32,
    ) -> Self {
        DataLines {
            latch,
            port,
            direction,
            mask,
        }
    }

    /// Bus width selected by the mask.
    ///
    /// # Errors
    /// - `LcdError::InvalidWiring` unless the mask selects exactly 4 or 8 contiguous bits.
    pub fn width(&self) -> LcdResult<BusWidth> {
        let width = match self.mask.count_ones() {
            4 => BusWidth::Four,
            8 => BusWidth::Eight,
            _ => return Err(LcdError::InvalidWiring("data mask must select 4 or 8 bits")),
        };

        if (self.mask >> self.shift()).count_ones() != (self.mask >> self.shift()).trailing_ones() {
            return Err(LcdError::InvalidWiring("data mask must be contiguous"));
        }

        Ok(width)
    }

    /// Position of the lowest data line.
    pub fn shift(&self) -> u32 {
        self.mask.trailing_zeros()
    }
}

/// Wiring of one parallel bus shared by any number of [LcdInterface](super::LcdInterface)s,
/// which only differ in their enable lines.
///
/// The channel also carries the bus ownership token. Whoever acquires it is the only one allowed to
/// drive RW, RS and the data lines until it releases it again.
#[derive(Debug)]
pub struct ChannelConfig<'a> {
    pub rw: ControlLine<'a>,
    pub rs: ControlLine<'a>,
    pub data: DataLines<'a>,
    bus_owned: AtomicBool,
}

impl<'a> ChannelConfig<'a> {
    pub fn new(rw: ControlLine<'a>, rs: ControlLine<'a>, data: DataLines<'a>) -> Self {
        ChannelConfig {
            rw,
            rs,
            data,
            bus_owned: AtomicBool::new(false),
        }
    }

    /// Checks the wiring and returns the bus width.
    pub fn validate(&self) -> LcdResult<BusWidth> {
        self.rw.validate("RW must select exactly one bit")?;
        self.rs.validate("RS must select exactly one bit")?;
        self.data.width()
    }

    pub fn is_bus_owned(&self) -> bool {
        self.bus_owned.load(Ordering::Acquire)
    }

    pub(crate) fn try_acquire(&self) -> bool {
        self.bus_owned
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.bus_owned.store(false, Ordering::Release);
    }
}
