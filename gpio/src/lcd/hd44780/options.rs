//! Instruction templates and option bytes.
//!
//! Options work by masking: every template has all its option bits set, and an option byte keeps
//! a bit set unless the option turns the feature off. An instruction is always sent as
//! `template & options`, so `0xFF` selects everything and raw option bytes can be combined with
//! `&`.
use crate::lcd::lcdif::BusWidth;

pub const CLEAR_DISPLAY: u8 = 0x01;
pub const RETURN_HOME: u8 = 0x02;
pub const ENTRY_MODE_SET: u8 = 0x07;
pub const DISPLAY_CONTROL: u8 = 0x0F;
pub const SHIFT_CONTROL: u8 = 0x1C;
pub const FUNCTION_SET: u8 = 0x3C;
pub const SET_CGRAM_ADDR: u8 = 0x7F;
pub const SET_DDRAM_ADDR: u8 = 0xFF;

/// Busy flag in the byte returned by an address read.
pub const BUSY_FLAG: u8 = 0x80;

pub const ENTRY_CURSOR_MOVE: u8 = 0xFE;
pub const ENTRY_DISPLAY_SHIFT: u8 = 0xFF;
pub const ENTRY_DECREMENT: u8 = 0xFD;
pub const ENTRY_INCREMENT: u8 = 0xFF;

pub const BLINKING_OFF: u8 = 0xFE;
pub const CURSOR_OFF: u8 = 0xFD;
pub const DISPLAY_OFF: u8 = 0xFB;

pub const SHIFT_LEFT: u8 = 0xFB;
pub const SHIFT_CURSOR: u8 = 0xF7;

pub const FONT_5X8: u8 = 0xFB;
pub const ONE_LINE: u8 = 0xF7;
pub const BUS_4BIT: u8 = 0xEF;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Font {
    Dots5x8,
    Dots5x10,
}

impl Font {
    /// Rows of a character generator glyph.
    pub fn rows(self) -> usize {
        match self {
            Font::Dots5x8 => 8,
            Font::Dots5x10 => 10,
        }
    }
}

/// Options of the entry mode set instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EntryMode {
    pub direction: CursorDirection,
    /// Shifts the whole display instead of moving the cursor.
    pub shift_display: bool,
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode {
            direction: CursorDirection::Right,
            shift_display: false,
        }
    }
}

impl From<EntryMode> for u8 {
    fn from(mode: EntryMode) -> Self {
        let mut options = 0xFF;
        if mode.direction == CursorDirection::Left {
            options &= ENTRY_DECREMENT;
        }
        if !mode.shift_display {
            options &= ENTRY_CURSOR_MOVE;
        }
        options
    }
}

/// Options of the display on/off control instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DisplayControl {
    pub display: bool,
    pub cursor: bool,
    pub blink: bool,
}

impl DisplayControl {
    pub const OFF: DisplayControl = DisplayControl {
        display: false,
        cursor: false,
        blink: false,
    };
}

impl Default for DisplayControl {
    fn default() -> Self {
        DisplayControl {
            display: true,
            cursor: false,
            blink: false,
        }
    }
}

impl From<DisplayControl> for u8 {
    fn from(control: DisplayControl) -> Self {
        let mut options = 0xFF;
        if !control.display {
            options &= DISPLAY_OFF;
        }
        if !control.cursor {
            options &= CURSOR_OFF;
        }
        if !control.blink {
            options &= BLINKING_OFF;
        }
        options
    }
}

/// Options of the cursor or display shift instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ShiftControl {
    /// Shifts the display instead of moving the cursor.
    pub shift_display: bool,
    pub direction: CursorDirection,
}

impl From<ShiftControl> for u8 {
    fn from(shift: ShiftControl) -> Self {
        let mut options = 0xFF;
        if !shift.shift_display {
            options &= SHIFT_CURSOR;
        }
        if shift.direction == CursorDirection::Left {
            options &= SHIFT_LEFT;
        }
        options
    }
}

/// Options of the function set instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FunctionSet {
    pub bus_width: BusWidth,
    pub two_lines: bool,
    pub font: Font,
}

impl Default for FunctionSet {
    fn default() -> Self {
        FunctionSet {
            bus_width: BusWidth::Eight,
            two_lines: true,
            font: Font::Dots5x8,
        }
    }
}

impl From<FunctionSet> for u8 {
    fn from(function: FunctionSet) -> Self {
        let mut options = 0xFF;
        if function.bus_width == BusWidth::Four {
            options &= BUS_4BIT;
        }
        if !function.two_lines {
            options &= ONE_LINE;
        }
        if function.font == Font::Dots5x8 {
            options &= FONT_5X8;
        }
        options
    }
}

/// Function set instruction with the data length bit matching `width`.
pub fn function_set_for(options: u8, width: BusWidth) -> u8 {
    let instruction = FUNCTION_SET & options;
    match width {
        BusWidth::Eight => instruction | !BUS_4BIT,
        BusWidth::Four => instruction & BUS_4BIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_options_mask_templates() {
        assert_eq!(ENTRY_MODE_SET & u8::from(EntryMode::default()), 0x06);
        assert_eq!(DISPLAY_CONTROL & u8::from(DisplayControl::default()), 0x0C);
        assert_eq!(DISPLAY_CONTROL & u8::from(DisplayControl::OFF), 0x08);

        let shift = ShiftControl {
            shift_display: true,
            direction: CursorDirection::Left,
        };
        assert_eq!(SHIFT_CONTROL & u8::from(shift), 0x18);

        let function = FunctionSet {
            bus_width: BusWidth::Four,
            two_lines: true,
            font: Font::Dots5x10,
        };
        assert_eq!(FUNCTION_SET & u8::from(function), 0x2C);
        assert_eq!(FUNCTION_SET & u8::from(FunctionSet::default()), 0x38);
    }

    #[test]
    fn function_set_follows_bus_width() {
        assert_eq!(function_set_for(0xFF, BusWidth::Four), 0x2C);
        assert_eq!(function_set_for(BUS_4BIT, BusWidth::Eight), 0x3C);
        assert_eq!(function_set_for(FONT_5X8 & ONE_LINE, BusWidth::Eight), 0x30);
    }
}
