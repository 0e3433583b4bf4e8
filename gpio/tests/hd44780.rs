mod common;

use common::{FakeBus, Op};
use hdlcd_gpio::GpioError;
use hdlcd_gpio::lcd::LcdError;
use hdlcd_gpio::lcd::hd44780::*;
use hdlcd_gpio::lcd::lcdif::BusWidth;
use std::io::ErrorKind;

fn with_display(bus: &FakeBus, test: impl FnOnce(&Hd44780)) {
    let display = Hd44780::new(bus).unwrap();
    let mut registry = Hd44780Registry::new();
    let id = registry.create(&display).unwrap();
    let display = registry.open(id).unwrap();
    test(display);
}

/// Runs the init state machine to completion. Returns the number of calls and the states visited.
fn run_init(display: &Hd44780, settings: &InitSettings) -> (usize, Vec<InitState>) {
    let mut states = Vec::new();
    for calls in 1..=32 {
        states.push(display.init_state());
        if display.instruction_init(settings).unwrap() == InitStep::Done {
            return (calls, states);
        }
    }
    panic!("initialization did not finish");
}

#[test]
fn display_needs_an_open_bus() {
    let bus = FakeBus::closed(BusWidth::Four);
    assert_eq!(Hd44780::new(&bus).unwrap_err(), LcdError::InterfaceNotOpen);
}

#[test]
fn closed_display_refuses_commands() {
    let bus = FakeBus::new(BusWidth::Eight);
    let display = Hd44780::new(&bus).unwrap();

    assert_eq!(display.clear_display(), Err(LcdError::NotOpen));
    assert_eq!(display.read_addr(), Err(LcdError::NotOpen));
    assert_eq!(display.write_ram_string(b"hi"), Err(LcdError::NotOpen));
    assert_eq!(
        display.instruction_init(&InitSettings::new(Hd44780Clone::Hd44780u)),
        Err(LcdError::NotOpen)
    );
    assert!(bus.log().is_empty());
}

#[test]
fn init_call_counts_per_clone() {
    let expected = [
        (Hd44780Clone::Hd44780u, 8),
        (Hd44780Clone::St7066u, 7),
        (Hd44780Clone::S6a0069, 5),
        (Hd44780Clone::Ks0066u, 5),
        (Hd44780Clone::Nt7603, 5),
    ];

    for (controller, count) in expected {
        for width in [BusWidth::Four, BusWidth::Eight] {
            let bus = FakeBus::new(width);
            with_display(&bus, |display| {
                let (calls, states) = run_init(display, &InitSettings::new(controller));
                assert_eq!(calls, count, "{:?} on a {} bus", controller, width);
                assert!(states.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", states);
                assert_eq!(display.init_state(), InitState::StartInit);
                assert!(!bus.is_owned());
            });
        }
    }
}

#[test]
fn init_timing_and_transactions_per_clone() {
    use Hd44780Clone::*;
    use Op::{Instruction as I, Nibble as N};

    let four = BusWidth::Four;
    let eight = BusWidth::Eight;
    let table: Vec<(Hd44780Clone, BusWidth, Vec<u64>, Vec<Op>)> = vec![
        (
            Hd44780u,
            four,
            vec![15_000, 4_100, 100, 1, 1, 1, 1, 0],
            vec![N(0x3), N(0x3), N(0x3), N(0x2), I(0x28), I(0x08), I(0x01), I(0x06)],
        ),
        (
            Hd44780u,
            eight,
            vec![15_000, 4_100, 100, 1, 1, 1, 1, 0],
            vec![I(0x38), I(0x38), I(0x38), I(0x38), I(0x08), I(0x01), I(0x06)],
        ),
        (
            St7066u,
            four,
            vec![40_000, 37, 37, 1, 1, 1, 0],
            vec![N(0x3), I(0x28), I(0x28), I(0x0C), I(0x01), I(0x06)],
        ),
        (
            St7066u,
            eight,
            vec![40_000, 37, 37, 1, 1, 1, 0],
            vec![I(0x38), I(0x38), I(0x38), I(0x0C), I(0x01), I(0x06)],
        ),
        (
            S6a0069,
            four,
            vec![40_000, 39, 39, 1_530, 0],
            vec![N(0x2), I(0x28), I(0x0C), I(0x01), I(0x06)],
        ),
        (
            S6a0069,
            eight,
            vec![40_000, 39, 39, 1_530, 0],
            vec![I(0x38), I(0x0C), I(0x01), I(0x06)],
        ),
        (
            Ks0066u,
            four,
            vec![30_000, 39, 39, 1_530, 0],
            vec![N(0x2), I(0x28), I(0x0C), I(0x01), I(0x06)],
        ),
        (
            Ks0066u,
            eight,
            vec![30_000, 39, 39, 1_530, 0],
            vec![I(0x38), I(0x0C), I(0x01), I(0x06)],
        ),
        (
            Nt7603,
            four,
            vec![30_000, 40, 40, 1_640, 0],
            vec![N(0x2), I(0x28), I(0x0C), I(0x01), I(0x06)],
        ),
        (
            Nt7603,
            eight,
            vec![30_000, 40, 40, 1_640, 0],
            vec![I(0x38), I(0x0C), I(0x01), I(0x06)],
        ),
    ];

    for (controller, width, delays, writes) in table {
        let bus = FakeBus::new(width);
        with_display(&bus, |display| {
            let settings = InitSettings::new(controller);
            let mut seen = Vec::new();
            loop {
                let step = display.instruction_init(&settings).unwrap();
                seen.push(step.as_micros());
                if step == InitStep::Done || seen.len() > 32 {
                    break;
                }
            }
            assert_eq!(seen, delays, "{:?} on a {} bus", controller, width);
        });
        assert_eq!(bus.writes(), writes, "{:?} on a {} bus", controller, width);
        assert_eq!(
            bus.log().contains(&Op::ReadAddress),
            controller.polls_busy(),
            "{:?} on a {} bus",
            controller,
            width
        );
    }
}

#[test]
fn st7066u_8bit_sequence_applies_settings() {
    let bus = FakeBus::new(BusWidth::Eight);
    let settings = InitSettings::new(Hd44780Clone::St7066u).with_display_control(DisplayControl {
        display: true,
        cursor: true,
        blink: false,
    });
    with_display(&bus, |display| {
        run_init(display, &settings);
    });

    assert_eq!(
        bus.writes(),
        vec![
            Op::Instruction(0x38),
            Op::Instruction(0x38),
            Op::Instruction(0x38),
            Op::Instruction(0x0E),
            Op::Instruction(0x01),
            Op::Instruction(0x06),
        ]
    );
}

#[test]
fn function_set_data_length_follows_the_bus() {
    let bus = FakeBus::new(BusWidth::Eight);
    let settings = InitSettings::new(Hd44780Clone::Ks0066u).with_function_set(FunctionSet {
        bus_width: BusWidth::Four,
        two_lines: false,
        font: Font::Dots5x10,
    });
    with_display(&bus, |display| {
        run_init(display, &settings);
    });

    assert_eq!(bus.writes()[0], Op::Instruction(0x34));
}

#[test]
fn entry_mode_is_masked_with_its_template() {
    let bus = FakeBus::new(BusWidth::Eight);
    let settings = InitSettings::new(Hd44780Clone::S6a0069).with_entry_mode(0xFD_u8);
    with_display(&bus, |display| {
        run_init(display, &settings);
    });

    assert_eq!(bus.writes().last(), Some(&Op::Instruction(0x07 & 0xFD)));
}

#[test]
fn init_waits_for_busy_controller() {
    let bus = FakeBus::new(BusWidth::Eight);
    let settings = InitSettings::new(Hd44780Clone::Hd44780u);
    with_display(&bus, |display| {
        for _ in 0..5 {
            display.instruction_init(&settings).unwrap();
        }
        assert_eq!(display.init_state(), InitState::DisplayOnOffControl);

        bus.busy_for(2);
        bus.clear_log();
        assert_eq!(display.instruction_init(&settings), Ok(InitStep::RetryNow));
        assert_eq!(display.instruction_init(&settings), Ok(InitStep::RetryNow));
        assert_eq!(display.init_state(), InitState::DisplayOnOffControl);
        assert!(bus.writes().is_empty());
        assert!(!bus.is_owned());

        assert_eq!(display.instruction_init(&settings), Ok(InitStep::RetryNow));
        assert_eq!(display.init_state(), InitState::DisplayClear);
        assert_eq!(bus.writes(), vec![Op::Instruction(0x08)]);
    });
}

#[test]
fn init_retries_when_bus_is_taken() {
    let bus = FakeBus::new(BusWidth::Four);
    let settings = InitSettings::new(Hd44780Clone::Ks0066u);
    with_display(&bus, |display| {
        display.instruction_init(&settings).unwrap();
        assert_eq!(display.init_state(), InitState::FunctionSet1);

        bus.deny_every(1);
        assert_eq!(display.instruction_init(&settings), Ok(InitStep::RetryNow));
        assert_eq!(display.init_state(), InitState::FunctionSet1);
        assert!(bus.log().is_empty());
    });
}

#[test]
fn reset_init_restarts_the_sequence() {
    let bus = FakeBus::new(BusWidth::Eight);
    let settings = InitSettings::new(Hd44780Clone::St7066u);
    with_display(&bus, |display| {
        display.instruction_init(&settings).unwrap();
        display.instruction_init(&settings).unwrap();
        assert_eq!(display.init_state(), InitState::FunctionSet2);

        display.reset_init();
        assert_eq!(display.init_state(), InitState::StartInit);
        assert_eq!(run_init(display, &settings).0, 7);
    });
}

#[test]
fn address_instructions_force_their_bits() {
    let bus = FakeBus::new(BusWidth::Eight);
    with_display(&bus, |display| {
        assert_eq!(display.set_cgram_addr(0x3F), Ok(true));
        assert_eq!(display.set_cursor_addr(0x3F), Ok(true));
        assert_eq!(display.set_cgram_addr(0xFF), Ok(true));
    });

    assert_eq!(
        bus.writes(),
        vec![Op::Instruction(0x7F), Op::Instruction(0xBF), Op::Instruction(0x7F)]
    );
}

#[test]
fn commands_pass_the_busy_gate() {
    let bus = FakeBus::new(BusWidth::Four);
    with_display(&bus, |display| {
        bus.busy_for(1);
        assert_eq!(display.clear_display(), Ok(false));
        assert_eq!(bus.log(), vec![Op::ReadAddress]);
        assert!(!bus.is_owned());

        assert_eq!(display.clear_display(), Ok(true));
        let shift = ShiftControl {
            shift_display: false,
            direction: CursorDirection::Left,
        };
        assert_eq!(display.shift_control(shift), Ok(true));
        assert_eq!(display.write_char(b'x'), Ok(true));

        bus.deny_every(1);
        assert_eq!(display.return_home(), Ok(false));
        assert_eq!(display.read_char(), Ok(None));
    });

    assert_eq!(
        bus.writes(),
        vec![Op::Instruction(0x01), Op::Instruction(0x10), Op::Data(b'x')]
    );
}

#[test]
fn reads_return_controller_values() {
    let bus = FakeBus::new(BusWidth::Eight);
    bus.set_address(0x42);
    bus.queue_data(b"Z");
    with_display(&bus, |display| {
        assert_eq!(display.read_addr(), Ok(Some(0x42)));
        assert_eq!(display.read_char(), Ok(Some(b'Z')));
    });
}

#[test]
fn string_write_resumes_after_refused_gate() {
    let bus = FakeBus::new(BusWidth::Four);
    bus.deny_every(3);
    with_display(&bus, |display| {
        let mut text: &[u8] = b"ABCD";
        let mut continuations = 0;
        while let Some(rest) = display.write_ram_string(text).unwrap() {
            continuations += 1;
            text = rest;
        }
        assert!(continuations >= 1);
    });

    assert_eq!(
        bus.writes(),
        vec![Op::Data(b'A'), Op::Data(b'B'), Op::Data(b'C'), Op::Data(b'D')]
    );
}

#[test]
fn string_write_stops_at_zero_byte() {
    let bus = FakeBus::new(BusWidth::Eight);
    with_display(&bus, |display| {
        assert_eq!(display.write_ram_string(b"AB\0CD"), Ok(None));
        assert_eq!(display.write_ram_string(b""), Ok(None));
        assert_eq!(display.write_ram_string(b"\0"), Ok(None));
    });

    assert_eq!(bus.writes(), vec![Op::Data(b'A'), Op::Data(b'B')]);
}

#[test]
fn cgram_glyphs_are_limited_to_font_rows() {
    let bus = FakeBus::new(BusWidth::Eight);
    let glyph = [0x1F_u8; 12];
    with_display(&bus, |display| {
        assert_eq!(display.write_cgram(&glyph, Font::Dots5x8), Ok(None));
        assert_eq!(bus.writes().len(), 8);

        bus.clear_log();
        assert_eq!(display.write_cgram(&glyph, Font::Dots5x10), Ok(None));
        assert_eq!(bus.writes().len(), 10);
    });
}

#[test]
fn ram_reads_fill_the_buffer() {
    let bus = FakeBus::new(BusWidth::Four);
    bus.queue_data(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    bus.deny_every(4);
    with_display(&bus, |display| {
        let mut buffer = [0_u8; 5];
        let rest = display.read_ram(&mut buffer).unwrap().map(|rest| rest.len());
        assert_eq!(rest, Some(2));
        assert_eq!(display.read_ram(&mut buffer[3..]), Ok(None));
        assert_eq!(buffer, [1, 2, 3, 4, 5]);

        bus.allow_all();

        let mut glyph = [0_u8; 10];
        assert_eq!(display.read_cgram(&mut glyph, Font::Dots5x8), Ok(None));
        assert_eq!(glyph, [6, 7, 8, 9, 10, 0, 0, 0, 0, 0]);
    });
}

#[test]
fn string_write_error_releases_the_bus() {
    let bus = FakeBus::new(BusWidth::Eight);
    bus.fail_data_writes_after(2);
    with_display(&bus, |display| {
        let error = display.write_ram_string(b"ABCD").unwrap_err();
        assert_eq!(error, LcdError::Gpio(GpioError::Io(ErrorKind::BrokenPipe)));
        assert!(!bus.is_owned());
    });

    assert_eq!(bus.writes(), vec![Op::Data(b'A'), Op::Data(b'B')]);
}
