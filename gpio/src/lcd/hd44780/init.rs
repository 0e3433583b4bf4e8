use crate::lcd::LcdResult;
use crate::lcd::hd44780::Hd44780;
use crate::lcd::hd44780::options::*;
use crate::lcd::lcdif::BusWidth;
use log::{debug, warn};
use std::time::Duration;

/// HD44780 compatible controllers. They share the instruction set, but not the power-on
/// initialization sequence and timing.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Hd44780Clone {
    /// Hitachi HD44780U.
    Hd44780u,
    /// Sitronix ST7066U.
    St7066u,
    /// Samsung S6A0069.
    S6a0069,
    /// Samsung KS0066U.
    Ks0066u,
    /// Neotec NT7603.
    Nt7603,
}

impl Hd44780Clone {
    /// Time to wait after power-on before the first instruction.
    pub fn power_on_delay(self) -> Duration {
        match self {
            Hd44780Clone::Hd44780u => Duration::from_micros(15_000),
            Hd44780Clone::Ks0066u | Hd44780Clone::Nt7603 => Duration::from_micros(30_000),
            Hd44780Clone::St7066u | Hd44780Clone::S6a0069 => Duration::from_micros(40_000),
        }
    }

    /// Whether the busy flag can be polled during initialization. The others are timed.
    pub fn polls_busy(self) -> bool {
        matches!(self, Hd44780Clone::Hd44780u | Hd44780Clone::St7066u)
    }

    fn instruction_delay(self) -> Duration {
        match self {
            Hd44780Clone::Nt7603 => Duration::from_micros(40),
            _ => Duration::from_micros(39),
        }
    }

    fn clear_delay(self) -> Duration {
        match self {
            Hd44780Clone::Nt7603 => Duration::from_micros(1_640),
            _ => Duration::from_micros(1_530),
        }
    }
}

/// Where [Hd44780::instruction_init] continues on its next call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum InitState {
    #[default]
    StartInit,
    FunctionSet1,
    FunctionSet2,
    FunctionSet3,
    FunctionSet4,
    DisplayOnOffControl,
    DisplayClear,
    EntryModeSet,
}

/// What the caller of [Hd44780::instruction_init] should do next.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InitStep {
    /// The display is initialized.
    Done,
    /// Call again as soon as possible.
    RetryNow,
    /// Call again once the duration has passed.
    RetryAfter(Duration),
}

impl InitStep {
    /// Classic return code: `0` when done, `1` to retry right away, otherwise the microseconds to
    /// wait before retrying.
    pub fn as_micros(self) -> u64 {
        match self {
            InitStep::Done => 0,
            InitStep::RetryNow => 1,
            InitStep::RetryAfter(delay) => delay.as_micros() as u64,
        }
    }
}

/// Settings applied by the initialization sequence.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InitSettings {
    pub controller: Hd44780Clone,
    /// Function set options. The data length bit is always taken from the bus width.
    pub function_set: u8,
    pub display_control: u8,
    pub entry_mode: u8,
}

impl InitSettings {
    pub fn new(controller: Hd44780Clone) -> Self {
        InitSettings {
            controller,
            function_set: FunctionSet::default().into(),
            display_control: DisplayControl::default().into(),
            entry_mode: EntryMode::default().into(),
        }
    }

    pub fn with_function_set(mut self, function: impl Into<u8>) -> Self {
        self.function_set = function.into();
        self
    }

    pub fn with_display_control(mut self, control: impl Into<u8>) -> Self {
        self.display_control = control.into();
        self
    }

    pub fn with_entry_mode(mut self, mode: impl Into<u8>) -> Self {
        self.entry_mode = mode.into();
        self
    }
}

impl Hd44780<'_> {
    /// Advances the power-on initialization by at most one step.
    ///
    /// Keep calling until it returns [InitStep::Done], honoring [InitStep::RetryAfter] delays.
    /// Nothing blocks: if the bus is taken or the controller busy, the step is retried on the next
    /// call. After `Done` the state is back at [InitState::StartInit].
    ///
    /// The HD44780U comes out of initialization with the display off, as its datasheet sequence
    /// prescribes; turn it on with [Hd44780::display_control] afterwards.
    pub fn instruction_init(&self, settings: &InitSettings) -> LcdResult<InitStep> {
        self.ensure_open()?;

        let state = self.init_state.get();
        if state == InitState::StartInit {
            self.advance(state, InitState::FunctionSet1);
            return Ok(InitStep::RetryAfter(settings.controller.power_on_delay()));
        }

        if !self.bus.acquire_bus() {
            return Ok(InitStep::RetryNow);
        }
        let step = self.init_on_bus(state, settings);
        self.bus.release_bus();
        step
    }

    pub fn init_state(&self) -> InitState {
        self.init_state.get()
    }

    /// Restarts initialization from [InitState::StartInit].
    pub fn reset_init(&self) {
        self.init_state.set(InitState::StartInit);
    }

    fn advance(&self, from: InitState, to: InitState) {
        debug!("Init {:?} -> {:?}", from, to);
        self.init_state.set(to);
    }

    fn init_on_bus(&self, state: InitState, settings: &InitSettings) -> LcdResult<InitStep> {
        use Hd44780Clone::*;
        use InitState::*;

        let controller = settings.controller;
        let width = self.bus.bus_width();
        let function_set = function_set_for(settings.function_set, width);

        if matches!(state, DisplayOnOffControl | DisplayClear | EntryModeSet)
            && controller.polls_busy()
            && !self.is_ready()?
        {
            return Ok(InitStep::RetryNow);
        }

        let (next, step) = match (state, controller, width) {
            (FunctionSet1, Hd44780u, BusWidth::Four) => {
                self.bus.write_function_set_nibble(0x3)?;
                (FunctionSet2, InitStep::RetryAfter(Duration::from_micros(4_100)))
            }
            (FunctionSet1, Hd44780u, BusWidth::Eight) => {
                self.bus.write_instruction(function_set)?;
                (FunctionSet2, InitStep::RetryAfter(Duration::from_micros(4_100)))
            }
            (FunctionSet2, Hd44780u, BusWidth::Four) => {
                self.bus.write_function_set_nibble(0x3)?;
                (FunctionSet3, InitStep::RetryAfter(Duration::from_micros(100)))
            }
            (FunctionSet2, Hd44780u, BusWidth::Eight) => {
                self.bus.write_instruction(function_set)?;
                (FunctionSet3, InitStep::RetryAfter(Duration::from_micros(100)))
            }
            (FunctionSet3, Hd44780u, BusWidth::Four) => {
                self.bus.write_function_set_nibble(0x3)?;
                self.bus.write_function_set_nibble(0x2)?;
                (FunctionSet4, InitStep::RetryNow)
            }
            (FunctionSet3, Hd44780u, BusWidth::Eight) => {
                self.bus.write_instruction(function_set)?;
                (FunctionSet4, InitStep::RetryNow)
            }
            (FunctionSet4, Hd44780u, _) => {
                self.bus.write_instruction(function_set)?;
                (DisplayOnOffControl, InitStep::RetryNow)
            }

            (FunctionSet1, St7066u, BusWidth::Four) => {
                self.bus.write_function_set_nibble(0x3)?;
                (FunctionSet2, InitStep::RetryAfter(Duration::from_micros(37)))
            }
            (FunctionSet1 | FunctionSet2, St7066u, _) => {
                self.bus.write_instruction(function_set)?;
                let next = if state == FunctionSet1 { FunctionSet2 } else { FunctionSet3 };
                (next, InitStep::RetryAfter(Duration::from_micros(37)))
            }
            (FunctionSet3, St7066u, _) => {
                self.bus.write_instruction(function_set)?;
                (DisplayOnOffControl, InitStep::RetryNow)
            }

            (FunctionSet1, S6a0069 | Ks0066u | Nt7603, _) => {
                if width == BusWidth::Four {
                    self.bus.write_function_set_nibble(0x2)?;
                }
                self.bus.write_instruction(function_set)?;
                (DisplayOnOffControl, InitStep::RetryAfter(controller.instruction_delay()))
            }

            (DisplayOnOffControl, Hd44780u, _) => {
                self.bus.write_instruction(DISPLAY_CONTROL & u8::from(DisplayControl::OFF))?;
                (DisplayClear, InitStep::RetryNow)
            }
            (DisplayOnOffControl, St7066u, _) => {
                self.bus.write_instruction(DISPLAY_CONTROL & settings.display_control)?;
                (DisplayClear, InitStep::RetryNow)
            }
            (DisplayOnOffControl, S6a0069 | Ks0066u | Nt7603, _) => {
                self.bus.write_instruction(DISPLAY_CONTROL & settings.display_control)?;
                (DisplayClear, InitStep::RetryAfter(controller.instruction_delay()))
            }

            (DisplayClear, _, _) => {
                self.bus.write_instruction(CLEAR_DISPLAY)?;
                let step = if controller.polls_busy() {
                    InitStep::RetryNow
                } else {
                    InitStep::RetryAfter(controller.clear_delay())
                };
                (EntryModeSet, step)
            }

            (EntryModeSet, _, _) => {
                self.bus.write_instruction(ENTRY_MODE_SET & settings.entry_mode)?;
                (StartInit, InitStep::Done)
            }

            // Only reachable if the controller changed between calls.
            (state, controller, _) => {
                warn!("{:?} has no init step {:?}, restarting", controller, state);
                (StartInit, InitStep::RetryNow)
            }
        };

        self.advance(state, next);
        Ok(step)
    }
}
