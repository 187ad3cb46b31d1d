//! Recording fakes for the bus, pins and timer.

extern crate std;

use core::cell::RefCell;
use core::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};

use crate::Timer;
use crate::bus::{DataLines, QSPI_WRITE_COLOR, QSPI_WRITE_COMMAND, QspiDevice, Transaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Cs(bool),
    Reset(bool),
    Tx {
        command: Option<u8>,
        address: Option<u32>,
        data: Vec<u8>,
        lines: DataLines,
    },
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeError(pub i32);

#[derive(Default, Clone)]
pub struct Log {
    events: Rc<RefCell<Vec<Event>>>,
    spi: Rc<RefCell<Vec<Vec<u8>>>>,
}

pub type RawTx = (Option<u8>, Option<u32>, Vec<u8>, DataLines);

impl Log {
    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
        self.spi.borrow_mut().clear();
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn transactions(&self) -> Vec<RawTx> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Tx {
                    command,
                    address,
                    data,
                    lines,
                } => Some((*command, *address, data.clone(), *lines)),
                _ => None,
            })
            .collect()
    }

    /// Register writes as `(opcode, params)`.
    pub fn commands(&self) -> Vec<(u8, Vec<u8>)> {
        self.transactions()
            .into_iter()
            .filter(|tx| tx.0 == Some(QSPI_WRITE_COMMAND))
            .map(|tx| ((tx.1.unwrap_or_default() >> 8) as u8, tx.2))
            .collect()
    }

    pub fn commands_with(&self, opcode: u8) -> Vec<Vec<u8>> {
        self.commands()
            .into_iter()
            .filter(|(op, _)| *op == opcode)
            .map(|(_, params)| params)
            .collect()
    }

    /// Sizes of the data-only chunks following memory write primes.
    pub fn color_chunks(&self) -> Vec<Vec<u8>> {
        self.transactions()
            .into_iter()
            .filter(|tx| tx.0.is_none() && tx.1.is_none())
            .map(|tx| tx.2)
            .collect()
    }

    pub fn color_primes(&self) -> usize {
        self.transactions()
            .iter()
            .filter(|tx| tx.0 == Some(QSPI_WRITE_COLOR))
            .count()
    }

    pub fn cs_toggles(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Cs(_)))
            .count()
    }

    /// Inclusive `(x0, y0, x1, y1)` window of every memory write, decoded
    /// from the CASET/RASET sent before it.
    pub fn written_windows(&self) -> Vec<(u16, u16, u16, u16)> {
        let (mut x0, mut x1, mut y0, mut y1) = (0, 0, 0, 0);
        let mut windows = Vec::new();
        for tx in self.transactions() {
            match tx.0 {
                Some(QSPI_WRITE_COMMAND) => match (tx.1.unwrap_or_default() >> 8) as u8 {
                    0x2A => {
                        x0 = u16::from_be_bytes([tx.2[0], tx.2[1]]);
                        x1 = u16::from_be_bytes([tx.2[2], tx.2[3]]);
                    }
                    0x2B => {
                        y0 = u16::from_be_bytes([tx.2[0], tx.2[1]]);
                        y1 = u16::from_be_bytes([tx.2[2], tx.2[3]]);
                    }
                    _ => {}
                },
                Some(QSPI_WRITE_COLOR) => windows.push((x0, y0, x1, y1)),
                _ => {}
            }
        }
        windows
    }

    pub fn written_origins(&self) -> Vec<(u16, u16)> {
        self.written_windows()
            .into_iter()
            .map(|(x0, y0, _, _)| (x0, y0))
            .collect()
    }

    pub fn spi_writes(&self) -> Vec<Vec<u8>> {
        self.spi.borrow().clone()
    }
}

pub struct FakeQspi {
    log: Log,
    fail_at: Option<usize>,
    count: usize,
}

impl FakeQspi {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            fail_at: None,
            count: 0,
        }
    }

    /// Fails the `n`-th transmit (zero based) and every one after it.
    pub fn failing_at(log: &Log, n: usize) -> Self {
        Self {
            fail_at: Some(n),
            ..Self::new(log)
        }
    }
}

impl QspiDevice for FakeQspi {
    type Error = FakeError;

    fn transmit(&mut self, transaction: &Transaction<'_>) -> Result<(), Self::Error> {
        let index = self.count;
        self.count += 1;
        if self.fail_at.is_some_and(|n| index >= n) {
            return Err(FakeError(-1));
        }
        self.log.push(Event::Tx {
            command: transaction.command,
            address: transaction.address,
            data: transaction.data.to_vec(),
            lines: transaction.lines,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.log.push(Event::Released);
    }
}

pub struct FakePin {
    log: Log,
    reset: bool,
}

impl FakePin {
    pub fn cs(log: &Log) -> Self {
        Self {
            log: log.clone(),
            reset: false,
        }
    }

    pub fn reset(log: &Log) -> Self {
        Self {
            log: log.clone(),
            reset: true,
        }
    }

    fn record(&self, level: bool) {
        if self.reset {
            self.log.push(Event::Reset(level));
        } else {
            self.log.push(Event::Cs(level));
        }
    }
}

impl PinErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.record(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.record(true);
        Ok(())
    }
}

pub struct FakeSpi {
    log: Log,
}

impl FakeSpi {
    pub fn new(log: &Log) -> Self {
        Self { log: log.clone() }
    }
}

impl SpiErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut bytes = Vec::new();
        for op in operations.iter() {
            if let Operation::Write(data) = op {
                bytes.extend_from_slice(data);
            }
        }
        self.log.spi.borrow_mut().push(bytes);
        Ok(())
    }
}

std::thread_local! {
    static DELAYS: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Timer that records requested delays per test thread.
pub struct FakeTimer;

impl FakeTimer {
    pub fn clear() {
        DELAYS.with(|d| d.borrow_mut().clear());
    }

    pub fn delays() -> Vec<u64> {
        DELAYS.with(|d| d.borrow().clone())
    }
}

impl Timer for FakeTimer {
    fn delay_ms(milliseconds: u64) {
        DELAYS.with(|d| d.borrow_mut().push(milliseconds));
    }
}
