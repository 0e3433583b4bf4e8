//! Raspberry Pi GPIO through `/dev/gpiomem` or `/dev/mem`.
//!
//! The BCM283x has no PIC-style latch/port/direction triple, so [RawGpioDriver] exposes GPIO
//! bank 0 (pins 0-31) as three virtual registers built on the function-select, set/clear and
//! level registers. Only pins claimed through [RawGpioDriver::claim_pins] are ever touched.
use crate::{GpioError, GpioRegister, GpioResult};
use bitvec::vec::BitVec;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

pub struct RawGpioDriver {
    mmap: MmapRaw,
    used_pins: BitVec<AtomicU8>,
    latch_shadow: AtomicU32,
}

impl RawGpioDriver {
    // #[cfg(target_pointer_width = "64")]
    // const GPIO_BASE: u32 = 0xFE200000;
    const GPIO_BASE: u32 = 0x3F200000;

    const PIN_COUNT: usize = 58;
    const BANK_PINS: usize = 32;

    const FUNCTION_INPUT: u8 = 0b000;
    const FUNCTION_OUTPUT: u8 = 0b001;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = MmapOptions::new().offset(offset).len(4096).map_raw(&file)?;

        Ok(RawGpioDriver {
            mmap,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
            latch_shadow: AtomicU32::new(0),
        })
    }

    /// Maps the GPIO block through `/dev/gpiomem`, which already starts at the GPIO base.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    /// Maps the GPIO block through `/dev/mem`. Needs root.
    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE as u64)
    }

    /// Latch register of bank 0. Reads return the last written value.
    pub fn latch(&self) -> RawGpioRegister<'_> {
        RawGpioRegister {
            driver: self,
            kind: RawRegisterKind::Latch,
        }
    }

    /// Level register of bank 0.
    pub fn port(&self) -> RawGpioRegister<'_> {
        RawGpioRegister {
            driver: self,
            kind: RawRegisterKind::Port,
        }
    }

    /// Direction register of bank 0 (`1` = input, `0` = output).
    pub fn direction(&self) -> RawGpioRegister<'_> {
        RawGpioRegister {
            driver: self,
            kind: RawRegisterKind::Direction,
        }
    }

    /// Claims the bank 0 pins selected by `mask` and resets them to low inputs.
    ///
    /// # Errors
    /// - `GpioError::AlreadyInUse` if any of the pins was claimed before.
    /// - Any error resetting a pin. None of the pins stay claimed then.
    pub fn claim_pins(&self, mask: u32) -> GpioResult<()> {
        claim_in(&self.used_pins, mask, |index| self.raw_reset(index))?;
        self.latch_shadow.fetch_and(!mask, Ordering::Relaxed);
        Ok(())
    }

    /// Returns the pins selected by `mask` to inputs and releases them.
    pub fn release_pins(&self, mask: u32) -> GpioResult<()> {
        for index in Self::pins_in(mask) {
            if self.used_pins[index] {
                self.raw_set_pin_function(index, Self::FUNCTION_INPUT)?;
                self.used_pins.set_aliased(index, false);
            }
        }
        Ok(())
    }

    fn claimed_mask(&self) -> u32 {
        (0..Self::BANK_PINS)
            .filter(|&index| self.used_pins[index])
            .fold(0, |mask, index| mask | (1 << index))
    }

    fn pins_in(mask: u32) -> impl Iterator<Item = usize> + Clone {
        (0..Self::BANK_PINS).filter(move |&index| mask & (1 << index) != 0)
    }

    pub fn raw_get_pin_function(&self, pin_index: usize) -> GpioResult<u32> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_ptr() as *const u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        let register_value = unsafe { register_ptr.read_volatile() };
        Ok((register_value >> shift) & 0b111)
    }

    pub fn raw_set_pin_function(&self, pin_index: usize, function: u8) -> GpioResult<()> {
        if function > 0b111 {
            return Err(GpioError::InvalidArgument);
        }

        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift);
        register_value |= (function as u32) << shift;
        unsafe { register_ptr.write_volatile(register_value) };

        Ok(())
    }

    fn raw_write_bank(&self, set: u32, clear: u32) {
        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPSET0/GPCLR0 registers, writing 0 bits has no effect
        unsafe {
            mmap.add(0x1c / 4).write_volatile(set);
            mmap.add(0x28 / 4).write_volatile(clear);
        }
    }

    fn raw_read_bank_levels(&self) -> u32 {
        let mmap = self.mmap.as_ptr() as *const u32;
        // GPLEV0 register
        unsafe { mmap.add(0x34 / 4).read_volatile() }
    }

    fn raw_reset(&self, pin_index: usize) -> GpioResult<()> {
        self.raw_set_pin_function(pin_index, Self::FUNCTION_INPUT)?;
        if pin_index < Self::BANK_PINS {
            self.raw_write_bank(0, 1 << pin_index);
        }
        Ok(())
    }
}

/// Marks the pins of `mask` used, resetting each one. Nothing stays marked if a reset fails.
fn claim_in(
    used_pins: &BitVec<AtomicU8>,
    mask: u32,
    mut reset: impl FnMut(usize) -> GpioResult<()>,
) -> GpioResult<()> {
    if RawGpioDriver::pins_in(mask).any(|index| used_pins[index]) {
        return Err(GpioError::AlreadyInUse);
    }

    for index in RawGpioDriver::pins_in(mask) {
        used_pins.set_aliased(index, true);
        if let Err(err) = reset(index) {
            for index in RawGpioDriver::pins_in(mask) {
                used_pins.set_aliased(index, false);
            }
            return Err(err);
        }
    }
    Ok(())
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum RawRegisterKind {
    Latch,
    Port,
    Direction,
}

/// One of the virtual bank 0 registers of a [RawGpioDriver].
pub struct RawGpioRegister<'a> {
    driver: &'a RawGpioDriver,
    kind: RawRegisterKind,
}

impl Debug for RawGpioRegister<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{:?}]", self.driver, self.kind)
    }
}

impl GpioRegister for RawGpioRegister<'_> {
    fn read(&self) -> GpioResult<u32> {
        match self.kind {
            RawRegisterKind::Latch => Ok(self.driver.latch_shadow.load(Ordering::Relaxed)),
            RawRegisterKind::Port => Ok(self.driver.raw_read_bank_levels()),
            RawRegisterKind::Direction => {
                let mut direction = 0;
                for index in RawGpioDriver::pins_in(self.driver.claimed_mask()) {
                    let function = self.driver.raw_get_pin_function(index)?;
                    if function != RawGpioDriver::FUNCTION_OUTPUT as u32 {
                        direction |= 1 << index;
                    }
                }
                Ok(direction)
            }
        }
    }

    fn write(&self, value: u32) -> GpioResult<()> {
        let claimed = self.driver.claimed_mask();
        match self.kind {
            RawRegisterKind::Latch => {
                self.driver.raw_write_bank(value & claimed, !value & claimed);
                self.driver.latch_shadow.store(value & claimed, Ordering::Relaxed);
                Ok(())
            }
            RawRegisterKind::Port => Err(GpioError::NotSupported),
            RawRegisterKind::Direction => {
                for index in RawGpioDriver::pins_in(claimed) {
                    let function = if value & (1 << index) != 0 {
                        RawGpioDriver::FUNCTION_INPUT
                    } else {
                        RawGpioDriver::FUNCTION_OUTPUT
                    };
                    self.driver.raw_set_pin_function(index, function)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_claim_leaves_no_pin_claimed() {
        let used_pins: BitVec<AtomicU8> = BitVec::repeat(false, RawGpioDriver::PIN_COUNT);

        let result = claim_in(&used_pins, 0b1111 << 4, |index| {
            if index == 6 {
                Err(GpioError::InvalidArgument)
            } else {
                Ok(())
            }
        });

        assert_eq!(result, Err(GpioError::InvalidArgument));
        assert!(used_pins.not_any());
        assert_eq!(claim_in(&used_pins, 0b1111 << 4, |_| Ok(())), Ok(()));
        assert_eq!(used_pins.count_ones(), 4);
    }

    #[test]
    fn claimed_pins_cannot_be_claimed_again() {
        let used_pins: BitVec<AtomicU8> = BitVec::repeat(false, RawGpioDriver::PIN_COUNT);
        let mut resets = 0;

        assert_eq!(claim_in(&used_pins, 1 << 17, |_| Ok(())), Ok(()));
        let result = claim_in(&used_pins, 1 << 17 | 1 << 18, |_| {
            resets += 1;
            Ok(())
        });

        assert_eq!(result, Err(GpioError::AlreadyInUse));
        assert_eq!(resets, 0);
        assert!(!used_pins[18]);
    }
}
