use crate::lcd::lcdif::{BusWidth, ChannelConfig, ControlLine, LcdBus};
use crate::lcd::{LcdError, LcdResult};
use crate::registry::{Registered, Registration};
use log::trace;
use std::cell::Cell;
use std::thread::sleep;
use std::time::Duration;

/// A bus interface: a [ChannelConfig] plus the enable line of one display.
#[derive(Debug)]
pub struct LcdInterface<'a> {
    channel: &'a ChannelConfig<'a>,
    enable: ControlLine<'a>,
    width: BusWidth,
    shift: u32,
    pulse_width: Duration,
    swap_nibbles: Cell<bool>,
    owns_bus: Cell<bool>,
    registration: Registration,
}

impl<'a> LcdInterface<'a> {
    /// Creates an interface, checking the wiring of the channel and the enable line.
    ///
    /// # Errors
    /// - `LcdError::InvalidWiring` if RW, RS or E select other than one bit, or the data mask other
    ///   than 4 or 8 contiguous bits.
    pub fn new(channel: &'a ChannelConfig<'a>, enable: ControlLine<'a>) -> LcdResult<Self> {
        let width = channel.validate()?;
        enable.validate("E must select exactly one bit")?;

        Ok(LcdInterface {
            channel,
            enable,
            width,
            shift: channel.data.shift(),
            pulse_width: Duration::ZERO,
            swap_nibbles: Cell::new(false),
            owns_bus: Cell::new(false),
            registration: Registration::new(),
        })
    }

    /// Holds E high, and then low, for `pulse_width` on every strobe. Zero (the default) means no
    /// delay at all, which is enough for slow hosts.
    pub fn with_pulse_width(mut self, pulse_width: Duration) -> Self {
        self.pulse_width = pulse_width;
        self
    }

    /// Swaps the two nibbles of every address read, for boards that wire the data bus reversed.
    pub fn set_swap_nibbles(&self, swap: bool) {
        self.swap_nibbles.set(swap);
    }

    pub fn swaps_nibbles(&self) -> bool {
        self.swap_nibbles.get()
    }

    pub fn channel(&self) -> &'a ChannelConfig<'a> {
        self.channel
    }

    /// Number of data lines below the lowest data line, used to align nibbles and bytes.
    pub fn shift(&self) -> u32 {
        self.shift
    }

    pub fn owns_bus(&self) -> bool {
        self.owns_bus.get()
    }

    fn ensure_owner(&self) -> LcdResult<()> {
        if !self.owns_bus.get() {
            return Err(LcdError::BusBusy);
        }
        Ok(())
    }

    fn wait(&self) {
        if !self.pulse_width.is_zero() {
            sleep(self.pulse_width);
        }
    }

    fn pulse(&self) -> LcdResult<()> {
        self.enable.drive(true)?;
        self.wait();
        self.enable.drive(false)?;
        self.wait();
        Ok(())
    }

    /// Latches `value` at the data line position, turns the lines to outputs and strobes E.
    fn put(&self, value: u8) -> LcdResult<()> {
        let data = &self.channel.data;
        data.latch.modify(data.mask, ((value as u32) << self.shift) & data.mask)?;
        data.direction.clear_bits(data.mask)?;
        self.pulse()
    }

    /// Samples the data lines while E is high.
    fn sample(&self) -> LcdResult<u8> {
        let data = &self.channel.data;
        self.enable.drive(true)?;
        self.wait();
        let value = (data.port.read()? & data.mask) >> self.shift;
        self.enable.drive(false)?;
        self.wait();
        Ok(value as u8)
    }

    fn write(&self, value: u8, rs: bool) -> LcdResult<()> {
        self.ensure_owner()?;
        trace!("Writing {:08b}, RS: {}, {} bus", value, rs, self.width);

        self.channel.rw.drive(false)?;
        self.channel.rs.drive(rs)?;

        match self.width {
            BusWidth::Eight => self.put(value),
            BusWidth::Four => {
                self.put(value >> 4)?;
                self.put(value & 0x0F)
            }
        }
    }

    fn read(&self, rs: bool) -> LcdResult<u8> {
        self.ensure_owner()?;

        self.channel.rw.drive(true)?;
        self.channel.rs.drive(rs)?;
        self.channel.data.direction.set_bits(self.channel.data.mask)?;

        let value = match self.width {
            BusWidth::Eight => self.sample()?,
            BusWidth::Four => {
                let high = self.sample()?;
                let low = self.sample()?;
                (high << 4) | (low & 0x0F)
            }
        };

        trace!("Read {:08b}, RS: {}, {} bus", value, rs, self.width);
        Ok(value)
    }
}

impl Registered for LcdInterface<'_> {
    fn registration(&self) -> &Registration {
        &self.registration
    }
}

impl LcdBus for LcdInterface<'_> {
    fn acquire_bus(&self) -> bool {
        if self.channel.try_acquire() {
            self.owns_bus.set(true);
            true
        } else {
            trace!("Bus already owned");
            false
        }
    }

    fn release_bus(&self) {
        self.channel.release();
        self.owns_bus.set(false);
    }

    fn write_data(&self, data: u8) -> LcdResult<()> {
        self.write(data, true)
    }

    fn read_data(&self) -> LcdResult<u8> {
        self.read(true)
    }

    fn write_instruction(&self, instruction: u8) -> LcdResult<()> {
        self.write(instruction, false)
    }

    fn read_address(&self) -> LcdResult<u8> {
        let address = self.read(false)?;
        if self.swap_nibbles.get() {
            Ok(address.rotate_left(4))
        } else {
            Ok(address)
        }
    }

    fn write_function_set_nibble(&self, nibble: u8) -> LcdResult<()> {
        self.ensure_owner()?;
        trace!("Writing nibble {:04b}, {} bus", nibble & 0x0F, self.width);

        self.channel.rw.drive(false)?;
        self.channel.rs.drive(false)?;

        match self.width {
            BusWidth::Four => self.put(nibble & 0x0F),
            // A controller still in 8-bit mode samples D7..D4.
            BusWidth::Eight => self.put((nibble & 0x0F) << 4),
        }
    }

    fn bus_width(&self) -> BusWidth {
        self.width
    }

    fn is_open(&self) -> bool {
        self.registration.is_open()
    }
}
