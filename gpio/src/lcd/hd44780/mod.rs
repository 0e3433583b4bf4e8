//! HD44780 display driver.
//!
//! An [Hd44780] sits on top of an open [LcdBus] and never blocks. Every command goes through the
//! same busy gate: take the bus, read the busy flag, and only if the controller is idle run the
//! transaction, then give the bus back. When the bus is taken or the controller is busy the command
//! reports that it did not complete (`Ok(false)`, `Ok(None)`, or the unwritten rest of a string)
//! and the caller simply tries again later.
//!
//! Initialization is a resumable state machine, see [Hd44780::instruction_init].

mod init;
pub mod options;

use crate::lcd::lcdif::LcdBus;
use crate::lcd::{LcdError, LcdResult};
use crate::registry::{Registered, Registration, Registry};
pub use init::*;
use log::trace;
pub use options::{CursorDirection, DisplayControl, EntryMode, Font, FunctionSet, ShiftControl};
use options::*;
use std::cell::Cell;

/// Registry of displays.
pub type Hd44780Registry<'a> = Registry<'a, Hd44780<'a>>;

#[derive(Debug)]
pub struct Hd44780<'a> {
    bus: &'a dyn LcdBus,
    init_state: Cell<InitState>,
    registration: Registration,
}

impl<'a> Hd44780<'a> {
    /// Binds a display to a bus handle.
    ///
    /// # Errors
    /// - `LcdError::InterfaceNotOpen` if the bus handle is not open.
    pub fn new(bus: &'a dyn LcdBus) -> LcdResult<Self> {
        if !bus.is_open() {
            return Err(LcdError::InterfaceNotOpen);
        }

        Ok(Hd44780 {
            bus,
            init_state: Cell::new(InitState::StartInit),
            registration: Registration::new(),
        })
    }

    pub fn bus(&self) -> &'a dyn LcdBus {
        self.bus
    }

    pub fn is_open(&self) -> bool {
        self.registration.is_open()
    }

    fn ensure_open(&self) -> LcdResult<()> {
        if !self.is_open() {
            return Err(LcdError::NotOpen);
        }
        Ok(())
    }

    /// Reads the busy flag. The bus must be owned.
    fn is_ready(&self) -> LcdResult<bool> {
        let ready = self.bus.read_address()? & BUSY_FLAG == 0;
        if !ready {
            trace!("Controller busy");
        }
        Ok(ready)
    }

    /// Runs `transaction` behind the busy gate. `None` if the bus was taken or the controller busy.
    fn gated<R>(
        &self,
        transaction: impl FnOnce(&dyn LcdBus) -> LcdResult<R>,
    ) -> LcdResult<Option<R>> {
        self.ensure_open()?;

        if !self.bus.acquire_bus() {
            return Ok(None);
        }

        let result = match self.is_ready() {
            Ok(true) => transaction(self.bus).map(Some),
            Ok(false) => Ok(None),
            Err(err) => Err(err),
        };
        self.bus.release_bus();
        result
    }

    fn instruction(&self, instruction: u8) -> LcdResult<bool> {
        Ok(self.gated(|bus| bus.write_instruction(instruction))?.is_some())
    }

    /// Clears the display and sets the cursor to the home position.
    pub fn clear_display(&self) -> LcdResult<bool> {
        self.instruction(CLEAR_DISPLAY)
    }

    /// Sets the cursor to the home position and undoes any display shift.
    pub fn return_home(&self) -> LcdResult<bool> {
        self.instruction(RETURN_HOME)
    }

    pub fn entry_mode_set(&self, mode: impl Into<u8>) -> LcdResult<bool> {
        self.instruction(ENTRY_MODE_SET & mode.into())
    }

    /// Turns the display, the cursor and the blinking on or off.
    pub fn display_control(&self, control: impl Into<u8>) -> LcdResult<bool> {
        self.instruction(DISPLAY_CONTROL & control.into())
    }

    /// Moves the cursor or shifts the display without touching the display data.
    pub fn shift_control(&self, shift: impl Into<u8>) -> LcdResult<bool> {
        self.instruction(SHIFT_CONTROL & shift.into())
    }

    pub fn function_set(&self, function: impl Into<u8>) -> LcdResult<bool> {
        self.instruction(FUNCTION_SET & function.into())
    }

    /// Points the address counter at character generator RAM.
    pub fn set_cgram_addr(&self, address: u8) -> LcdResult<bool> {
        self.instruction((address | 0x40) & SET_CGRAM_ADDR)
    }

    /// Points the address counter at display data RAM.
    pub fn set_cursor_addr(&self, address: u8) -> LcdResult<bool> {
        self.instruction((address | 0x80) & SET_DDRAM_ADDR)
    }

    /// Writes one byte to the RAM selected by the last address instruction.
    pub fn write_char(&self, character: u8) -> LcdResult<bool> {
        Ok(self.gated(|bus| bus.write_data(character))?.is_some())
    }

    /// Reads the address counter.
    pub fn read_addr(&self) -> LcdResult<Option<u8>> {
        self.gated(|bus| bus.read_address())
    }

    /// Reads one byte from the RAM selected by the last address instruction.
    pub fn read_char(&self) -> LcdResult<Option<u8>> {
        self.gated(|bus| bus.read_data())
    }

    /// Writes `text` up to its first zero byte or its end, one byte per pass of the busy gate.
    ///
    /// Returns `None` once everything was written, or the part that is still to be written if the
    /// gate refused. Pass that back in to continue.
    ///
    /// # Errors
    /// - Any bus error, after releasing the bus. How many bytes made it to the display is unknown
    ///   then, so set the address again before retrying.
    pub fn write_ram_string<'b>(&self, text: &'b [u8]) -> LcdResult<Option<&'b [u8]>> {
        self.ensure_open()?;

        let mut rest = text;
        while let Some((&character, tail)) = rest.split_first() {
            if character == 0 {
                break;
            }
            if !self.write_char(character)? {
                return Ok(Some(rest));
            }
            rest = tail;
        }
        Ok(None)
    }

    /// Writes a glyph to character generator RAM, like [Hd44780::write_ram_string] but at most as
    /// many rows as `font` has.
    pub fn write_cgram<'b>(&self, glyph: &'b [u8], font: Font) -> LcdResult<Option<&'b [u8]>> {
        let rows = glyph.len().min(font.rows());
        self.write_ram_string(&glyph[..rows])
    }

    /// Fills `buffer` from RAM, one byte per pass of the busy gate.
    ///
    /// Returns `None` once the buffer is full, or its unfilled tail if the gate refused.
    ///
    /// # Errors
    /// - Any bus error, after releasing the bus. The buffer contents and the address counter are
    ///   unknown then.
    pub fn read_ram<'b>(&self, buffer: &'b mut [u8]) -> LcdResult<Option<&'b mut [u8]>> {
        self.ensure_open()?;

        for index in 0..buffer.len() {
            match self.read_char()? {
                Some(character) => buffer[index] = character,
                None => return Ok(Some(&mut buffer[index..])),
            }
        }
        Ok(None)
    }

    /// Reads a glyph from character generator RAM, at most as many rows as `font` has.
    pub fn read_cgram<'b>(
        &self,
        buffer: &'b mut [u8],
        font: Font,
    ) -> LcdResult<Option<&'b mut [u8]>> {
        let rows = buffer.len().min(font.rows());
        self.read_ram(&mut buffer[..rows])
    }
}

impl Registered for Hd44780<'_> {
    fn registration(&self) -> &Registration {
        &self.registration
    }
}
