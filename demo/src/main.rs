mod config;

use crate::config::{Backend, Config, pin_bit};
use dotenv::dotenv;
use eyre::eyre;
use hdlcd_gpio::GpioRegister;
use hdlcd_gpio::lcd::LcdResult;
use hdlcd_gpio::lcd::hd44780::{
    DisplayControl, Font, FunctionSet, Hd44780, Hd44780Registry, InitSettings, InitStep,
};
use hdlcd_gpio::lcd::lcdif::{
    ChannelConfig, ControlLine, DataLines, LcdBus, LcdInterface, LcdifRegistry,
};
use hdlcd_gpio::raw::RawGpioDriver;
use hdlcd_gpio::sim::SimPort;
use log::{debug, info, warn};
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;

/// Upper bound on non-completing calls before giving up on the display.
const MAX_ATTEMPTS: usize = 10_000;

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!("Architecture {}", System::cpu_arch());

    let config = match Config::try_load() {
        Some(config) => config,
        None => {
            let config = Config::default();
            if !Config::exists() {
                info!("No configuration found, writing defaults");
                config.save()?;
            } else {
                warn!("Configuration could not be parsed, using defaults");
            }
            config
        }
    };
    let config = config.with_env_overrides()?;
    debug!("{:?}", config);

    match config.backend {
        Backend::Raw => {
            let gpio = if config.gpiomem {
                RawGpioDriver::new_gpiomem()?
            } else {
                RawGpioDriver::new_mem()?
            };
            let pins = config.pin_mask()?;
            gpio.claim_pins(pins)?;
            let result = run(&config, &gpio.latch(), &gpio.port(), &gpio.direction());
            gpio.release_pins(pins)?;
            result
        }
        Backend::Sim => {
            let port = SimPort::new();
            run(&config, &port.latch(), &port.port(), &port.direction())?;
            info!(
                "Simulated bus saw {} latch writes and {} port reads",
                port.latch_history().len(),
                port.port_reads()
            );
            Ok(())
        }
    }
}

fn run(
    config: &Config,
    latch: &dyn GpioRegister,
    port: &dyn GpioRegister,
    direction: &dyn GpioRegister,
) -> eyre::Result<()> {
    let (rw, rs, enable) = (
        pin_bit(config.rw_pin)?,
        pin_bit(config.rs_pin)?,
        pin_bit(config.enable_pin)?,
    );
    // The bus only switches the data lines, control lines stay outputs for good.
    direction.clear_bits(rw | rs | enable)?;

    let channel = ChannelConfig::new(
        ControlLine::new(latch, rw),
        ControlLine::new(latch, rs),
        DataLines::new(latch, port, direction, config.data_mask),
    );
    let interface = LcdInterface::new(&channel, ControlLine::new(latch, enable))?
        .with_pulse_width(Duration::from_micros(config.pulse_width_us));
    interface.set_swap_nibbles(config.swap_nibbles);

    let mut interfaces = LcdifRegistry::new();
    let interface_id = interfaces.create(&interface)?;
    let bus = interfaces.open(interface_id)?;
    info!("Opened {} interface {}", bus.bus_width(), interface_id);

    let display = Hd44780::new(bus)?;
    let mut displays = Hd44780Registry::new();
    let display_id = displays.create(&display)?;
    let lcd = displays.open(display_id)?;

    let settings = InitSettings::new(config.controller.into()).with_function_set(FunctionSet {
        bus_width: bus.bus_width(),
        two_lines: config.two_lines,
        font: Font::Dots5x8,
    });
    initialize(lcd, &settings)?;
    retry("display control", || lcd.display_control(DisplayControl::default()))?;

    let mut text = config.text.as_bytes();
    let mut attempts = 0;
    while let Some(rest) = lcd.write_ram_string(text)? {
        attempts += 1;
        if attempts > MAX_ATTEMPTS {
            return Err(eyre!("gave up writing, {} bytes left", rest.len()));
        }
        text = rest;
    }
    info!("Wrote {:?}", config.text);

    match lcd.read_addr()? {
        Some(address) => debug!("Address counter at {:#04x}", address),
        None => debug!("Controller busy, address counter not read"),
    }

    displays.close(lcd)?;
    displays.destroy(display_id)?;
    interfaces.close(bus)?;
    interfaces.destroy(interface_id)?;
    Ok(())
}

fn initialize(lcd: &Hd44780, settings: &InitSettings) -> eyre::Result<()> {
    for calls in 1..=MAX_ATTEMPTS {
        match lcd.instruction_init(settings)? {
            InitStep::Done => {
                info!("{:?} initialized after {} calls", settings.controller, calls);
                return Ok(());
            }
            InitStep::RetryNow => {}
            InitStep::RetryAfter(delay) => sleep(delay),
        }
    }
    Err(eyre!("display did not initialize"))
}

fn retry(what: &str, mut command: impl FnMut() -> LcdResult<bool>) -> eyre::Result<()> {
    for _ in 0..MAX_ATTEMPTS {
        if command()? {
            return Ok(());
        }
    }
    Err(eyre!("{} did not complete", what))
}
