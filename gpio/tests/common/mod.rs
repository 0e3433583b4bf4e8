#![allow(dead_code)]

use hdlcd_gpio::lcd::lcdif::{BusWidth, LcdBus};
use hdlcd_gpio::GpioError;
use hdlcd_gpio::lcd::{LcdError, LcdResult};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::ErrorKind;

/// One transaction seen by a [FakeBus].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Op {
    Instruction(u8),
    Data(u8),
    Nibble(u8),
    ReadAddress,
    ReadData,
}

/// Scripted stand-in for a bus interface.
#[derive(Debug)]
pub struct FakeBus {
    width: BusWidth,
    open: Cell<bool>,
    owned: Cell<bool>,
    acquires: Cell<usize>,
    /// Every n-th acquire is refused.
    deny_every: Cell<Option<usize>>,
    /// Number of upcoming address reads that report busy.
    busy_reads: Cell<usize>,
    address: Cell<u8>,
    /// Data writes fail with a GPIO error once this many have succeeded.
    failing_writes_after: Cell<Option<usize>>,
    data: RefCell<VecDeque<u8>>,
    log: RefCell<Vec<Op>>,
}

impl FakeBus {
    pub fn new(width: BusWidth) -> Self {
        FakeBus {
            width,
            open: Cell::new(true),
            owned: Cell::new(false),
            acquires: Cell::new(0),
            deny_every: Cell::new(None),
            busy_reads: Cell::new(0),
            address: Cell::new(0),
            failing_writes_after: Cell::new(None),
            data: RefCell::new(VecDeque::new()),
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn closed(width: BusWidth) -> Self {
        let bus = Self::new(width);
        bus.open.set(false);
        bus
    }

    pub fn deny_every(&self, n: usize) {
        self.deny_every.set(Some(n));
    }

    pub fn allow_all(&self) {
        self.deny_every.set(None);
    }

    pub fn fail_data_writes_after(&self, writes: usize) {
        self.failing_writes_after.set(Some(writes));
    }

    pub fn busy_for(&self, reads: usize) {
        self.busy_reads.set(reads);
    }

    pub fn set_address(&self, address: u8) {
        self.address.set(address);
    }

    pub fn queue_data(&self, data: &[u8]) {
        self.data.borrow_mut().extend(data);
    }

    pub fn is_owned(&self) -> bool {
        self.owned.get()
    }

    pub fn log(&self) -> Vec<Op> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    /// Everything but the busy flag reads.
    pub fn writes(&self) -> Vec<Op> {
        self.log()
            .into_iter()
            .filter(|op| !matches!(op, Op::ReadAddress))
            .collect()
    }

    fn record(&self, op: Op) -> LcdResult<()> {
        if !self.owned.get() {
            return Err(LcdError::BusBusy);
        }
        self.log.borrow_mut().push(op);
        Ok(())
    }
}

impl LcdBus for FakeBus {
    fn acquire_bus(&self) -> bool {
        let count = self.acquires.get() + 1;
        self.acquires.set(count);

        let denied = self.deny_every.get().is_some_and(|n| count % n == 0);
        if denied || self.owned.get() {
            return false;
        }
        self.owned.set(true);
        true
    }

    fn release_bus(&self) {
        self.owned.set(false);
    }

    fn write_data(&self, data: u8) -> LcdResult<()> {
        match self.failing_writes_after.get() {
            Some(0) => Err(GpioError::Io(ErrorKind::BrokenPipe).into()),
            Some(writes) => {
                self.failing_writes_after.set(Some(writes - 1));
                self.record(Op::Data(data))
            }
            None => self.record(Op::Data(data)),
        }
    }

    fn read_data(&self) -> LcdResult<u8> {
        self.record(Op::ReadData)?;
        Ok(self.data.borrow_mut().pop_front().unwrap_or(0))
    }

    fn write_instruction(&self, instruction: u8) -> LcdResult<()> {
        self.record(Op::Instruction(instruction))
    }

    fn read_address(&self) -> LcdResult<u8> {
        self.record(Op::ReadAddress)?;
        let busy = self.busy_reads.get();
        if busy > 0 {
            self.busy_reads.set(busy - 1);
            Ok(0x80 | self.address.get())
        } else {
            Ok(self.address.get())
        }
    }

    fn write_function_set_nibble(&self, nibble: u8) -> LcdResult<()> {
        self.record(Op::Nibble(nibble))
    }

    fn bus_width(&self) -> BusWidth {
        self.width
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }
}
