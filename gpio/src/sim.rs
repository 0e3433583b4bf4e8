//! In-memory GPIO port.
//!
//! [SimPort] models one PIC-style port: an output latch, an input port and a direction register
//! where a set bit makes the line an input. It records every latch write so the bus traffic can
//! be decoded afterwards, and serves queued values to port reads so a controller's answers can be
//! scripted. Used by the tests and by the demo's dry-run backend.
use crate::{GpioRegister, GpioResult};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};

#[derive(Debug)]
pub struct SimPort {
    latch: Cell<u32>,
    direction: Cell<u32>,
    idle_input: Cell<u32>,
    input: RefCell<VecDeque<u32>>,
    latch_history: RefCell<Vec<u32>>,
    port_reads: Cell<usize>,
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPort {
    /// Creates a port in its reset state: latch cleared, every line an input.
    pub fn new() -> Self {
        SimPort {
            latch: Cell::new(0),
            direction: Cell::new(u32::MAX),
            idle_input: Cell::new(0),
            input: RefCell::new(VecDeque::new()),
            latch_history: RefCell::new(Vec::new()),
            port_reads: Cell::new(0),
        }
    }

    /// The output latch register.
    pub fn latch(&self) -> SimRegister<'_> {
        SimRegister {
            port: self,
            kind: SimRegisterKind::Latch,
        }
    }

    /// The input port register.
    pub fn port(&self) -> SimRegister<'_> {
        SimRegister {
            port: self,
            kind: SimRegisterKind::Port,
        }
    }

    /// The direction register (`1` = input, `0` = output).
    pub fn direction(&self) -> SimRegister<'_> {
        SimRegister {
            port: self,
            kind: SimRegisterKind::Direction,
        }
    }

    /// Queues a value for the next port read. Queued values are consumed one per read.
    pub fn push_input(&self, value: u32) {
        self.input.borrow_mut().push_back(value);
    }

    /// Sets the value seen by port reads once the queue is empty.
    pub fn set_idle_input(&self, value: u32) {
        self.idle_input.set(value);
    }

    pub fn latch_value(&self) -> u32 {
        self.latch.get()
    }

    pub fn direction_value(&self) -> u32 {
        self.direction.get()
    }

    /// Number of port reads performed so far.
    pub fn port_reads(&self) -> usize {
        self.port_reads.get()
    }

    /// Every value written to the latch, oldest first.
    pub fn latch_history(&self) -> Vec<u32> {
        self.latch_history.borrow().clone()
    }

    pub fn clear_history(&self) {
        self.latch_history.borrow_mut().clear();
    }

    /// Decodes strobes on the latch: for every falling edge of the `strobe` bits, returns the
    /// latch value that was held while the strobe was high.
    pub fn strobes(&self, strobe: u32) -> Vec<u32> {
        let mut strobes = Vec::new();
        let mut previous = 0;
        for &value in self.latch_history.borrow().iter() {
            if previous & strobe != 0 && value & strobe == 0 {
                strobes.push(previous);
            }
            previous = value;
        }
        strobes
    }

    fn read_port(&self) -> u32 {
        self.port_reads.set(self.port_reads.get() + 1);
        let external = self
            .input
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.idle_input.get());
        let direction = self.direction.get();
        (self.latch.get() & !direction) | (external & direction)
    }

    fn write_latch(&self, value: u32) {
        self.latch.set(value);
        self.latch_history.borrow_mut().push(value);
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SimRegisterKind {
    Latch,
    Port,
    Direction,
}

/// One register of a [SimPort].
pub struct SimRegister<'a> {
    port: &'a SimPort,
    kind: SimRegisterKind,
}

impl Debug for SimRegister<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimPort[{:?}]", self.kind)
    }
}

impl GpioRegister for SimRegister<'_> {
    fn read(&self) -> GpioResult<u32> {
        Ok(match self.kind {
            SimRegisterKind::Latch => self.port.latch.get(),
            SimRegisterKind::Port => self.port.read_port(),
            SimRegisterKind::Direction => self.port.direction.get(),
        })
    }

    fn write(&self, value: u32) -> GpioResult<()> {
        match self.kind {
            // Writing the port of a PIC writes its latch.
            SimRegisterKind::Latch | SimRegisterKind::Port => self.port.write_latch(value),
            SimRegisterKind::Direction => self.port.direction.set(value),
        }
        Ok(())
    }

    fn modify(&self, clear: u32, set: u32) -> GpioResult<()> {
        // Read-modify-write on the port register goes through the latch, not the pins.
        let current = match self.kind {
            SimRegisterKind::Latch | SimRegisterKind::Port => self.port.latch.get(),
            SimRegisterKind::Direction => self.port.direction.get(),
        };
        self.write((current & !clear) | set)
    }
}
