use dotenv::var;
use eyre::eyre;
use hdlcd_gpio::lcd::hd44780::Hd44780Clone;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Raspberry Pi GPIO through the memory-mapped registers.
    Raw,
    /// In-memory port, for trying the stack without hardware.
    Sim,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Controller {
    #[serde(rename = "HD44780U")]
    Hd44780u,
    #[serde(rename = "ST7066U")]
    St7066u,
    #[serde(rename = "S6A0069")]
    S6a0069,
    #[serde(rename = "KS0066U")]
    Ks0066u,
    #[serde(rename = "NT7603")]
    Nt7603,
}

impl From<Controller> for Hd44780Clone {
    fn from(controller: Controller) -> Self {
        match controller {
            Controller::Hd44780u => Hd44780Clone::Hd44780u,
            Controller::St7066u => Hd44780Clone::St7066u,
            Controller::S6a0069 => Hd44780Clone::S6a0069,
            Controller::Ks0066u => Hd44780Clone::Ks0066u,
            Controller::Nt7603 => Hd44780Clone::Nt7603,
        }
    }
}

/// Wiring and settings of the demo display. All pins are BCM numbers in GPIO bank 0.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    /// Map `/dev/gpiomem` instead of `/dev/mem`.
    pub gpiomem: bool,
    pub controller: Controller,
    pub rw_pin: u8,
    pub rs_pin: u8,
    pub enable_pin: u8,
    /// 4 or 8 contiguous data pins, lowest pin is D0 (D4 on a 4-bit bus).
    pub data_mask: u32,
    pub pulse_width_us: u64,
    pub swap_nibbles: bool,
    pub two_lines: bool,
    pub text: String,
}

impl Config {
    fn path() -> String {
        var("HDLCD_CONFIG").unwrap_or_else(|_| "hdlcd.json".to_string())
    }

    pub fn exists() -> bool {
        let config_str = var_os("HDLCD_CONFIG");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("hdlcd.json"));
        Path::new(config_str).exists()
    }

    pub fn try_load() -> Option<Self> {
        if !Self::exists() {
            return None;
        }
        let file = std::fs::File::open(Self::path()).ok()?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).ok()
    }

    pub fn save(&self) -> std::io::Result<()> {
        let file = std::fs::File::create(Self::path())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Applies `HDLCD_BACKEND` and `HDLCD_CLONE` on top of the file.
    pub fn with_env_overrides(mut self) -> eyre::Result<Self> {
        if let Some(backend) = env_override("HDLCD_BACKEND")? {
            self.backend = backend;
        }
        if let Some(controller) = env_override("HDLCD_CLONE")? {
            self.controller = controller;
        }
        Ok(self)
    }

    /// Every pin the display uses.
    pub fn pin_mask(&self) -> eyre::Result<u32> {
        let control = pin_bit(self.rw_pin)? | pin_bit(self.rs_pin)? | pin_bit(self.enable_pin)?;
        Ok(self.data_mask | control)
    }
}

/// Mask of a bank 0 pin.
pub fn pin_bit(pin: u8) -> eyre::Result<u32> {
    1u32.checked_shl(pin as u32).ok_or_else(|| eyre!("GPIO{} is not in bank 0", pin))
}

fn env_override<T: DeserializeOwned>(name: &str) -> eyre::Result<Option<T>> {
    match var(name) {
        Ok(value) => serde_json::from_value(serde_json::Value::String(value.clone()))
            .map(Some)
            .map_err(|_| eyre!("invalid {}: {:?}", name, value)),
        Err(_) => Ok(None),
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::Sim,
            gpiomem: true,
            controller: Controller::Hd44780u,
            rw_pin: 27,
            rs_pin: 22,
            enable_pin: 17,
            data_mask: 0xF << 20,
            pulse_width_us: 1,
            swap_nibbles: false,
            two_lines: true,
            text: "Hello, world!".to_string(),
        }
    }
}
