//! Bus transport for the RM67162.
//!
//! The controller is written through two framings:
//!
//! * QSPI ([`QspiInterface`]): every register write is a `0x02` command
//!   phase with the panel opcode in the 24-bit address field. Pixel data is
//!   primed with a `0x32` / `0x002C00` transaction (command and address on
//!   one line, quad data) and then streamed as data-only quad chunks.
//!   Chip-select is a plain GPIO held low for the whole logical write.
//! * Single-line SPI ([`SpiInterface`]): the same `0x02` opcode is sent as
//!   a 4-byte header in front of the payload on an `embedded-hal`
//!   [`SpiDevice`], which owns chip-select.

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::Operation;
#[cfg(not(feature = "async"))]
use embedded_hal::spi::SpiDevice;
#[cfg(feature = "async")]
use embedded_hal_async::spi::SpiDevice;

use crate::instruction::Instruction;

/// Command phase selecting "register write, opcode in address field".
pub const QSPI_WRITE_COMMAND: u8 = 0x02;
/// Command phase selecting a quad pixel write.
pub const QSPI_WRITE_COLOR: u8 = 0x32;
/// Largest data phase a single transaction may carry.
pub const MAX_TRANSFER_SIZE: usize = 0x8000;

/// Line layout of a transaction's command, address and data phases.
///
/// The command and address phases always go out on a single line; only the
/// data phase changes width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataLines {
    /// 1-1-1: every phase on one line.
    Single,
    /// 1-1-4: single-line command and address, data on four lines.
    Quad,
}

/// A single QSPI exchange.
///
/// A `None` command or address means the phase is skipped entirely (zero
/// bits), so only the data phase is clocked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction<'a> {
    pub command: Option<u8>,
    /// 24-bit address phase.
    pub address: Option<u32>,
    pub data: &'a [u8],
    pub lines: DataLines,
}

impl<'a> Transaction<'a> {
    /// Register write: opcode shifted into the address field, parameters as data.
    pub const fn command(opcode: u8, params: &'a [u8]) -> Self {
        Self {
            command: Some(QSPI_WRITE_COMMAND),
            address: Some((opcode as u32) << 8),
            data: params,
            lines: DataLines::Single,
        }
    }

    /// Switch the controller into quad memory write at RAMWR.
    pub const fn memory_write() -> Self {
        Self {
            command: Some(QSPI_WRITE_COLOR),
            address: Some((Instruction::MemoryWrite as u32) << 8),
            data: &[],
            lines: DataLines::Quad,
        }
    }

    /// Data-only continuation of a memory write.
    pub const fn data(chunk: &'a [u8]) -> Self {
        Self {
            command: None,
            address: None,
            data: chunk,
            lines: DataLines::Quad,
        }
    }
}

/// Chunk sizes covering `total` bytes, none larger than `max`.
pub(crate) fn chunk_lengths(total: usize, max: usize) -> impl Iterator<Item = usize> {
    let max = max.max(1);
    let mut remaining = total;
    core::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let len = remaining.min(max);
        remaining -= len;
        Some(len)
    })
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "QspiDevice",),
    async(feature = "async", keep_self)
)]
/// Transaction submission on a QSPI host configured for 8-bit command and
/// 24-bit address phases. Chip-select is not touched by the device.
pub trait QspiDevice {
    type Error: core::fmt::Debug;

    /// Transmit one transaction and block until it has completed.
    async fn transmit(&mut self, transaction: &Transaction<'_>) -> Result<(), Self::Error>;

    /// Release the host. Best effort, may be a no-op.
    fn release(&mut self) {}
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "PanelBus",),
    async(feature = "async", keep_self)
)]
/// What the panel needs from its bus.
///
/// Each call is one logical operation: implementations frame it with a
/// single chip-select assertion, however many transactions it takes.
pub trait PanelBus {
    type Error: core::fmt::Debug;

    /// Write `command` followed by its parameter bytes.
    async fn write_command(&mut self, command: u8, params: &[u8]) -> Result<(), Self::Error>;

    /// Stream pixel data into frame memory at the current window.
    async fn write_color(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Stream `len` bytes of pixel data by cycling `pattern` from its start.
    ///
    /// `pattern` must hold whole pixels; every chunk sent is a prefix of it.
    /// An empty `pattern` is only valid with `len == 0`, which primes the
    /// memory write without sending pixels.
    async fn write_color_repeated(&mut self, pattern: &[u8], len: usize)
    -> Result<(), Self::Error>;

    /// Give up the bus. Called once on panel teardown.
    fn release(&mut self) {}
}

/// QSPI transport with a GPIO chip-select.
pub struct QspiInterface<D, CS> {
    device: D,
    cs: CS,
}

impl<D, CS> QspiInterface<D, CS>
where
    CS: OutputPin<Error = Infallible>,
{
    pub fn new(device: D, mut cs: CS) -> Self {
        let Ok(()) = cs.set_high();
        Self { device, cs }
    }

    pub fn into_inner(self) -> (D, CS) {
        (self.device, self.cs)
    }

    fn select(&mut self) {
        let Ok(()) = self.cs.set_low();
    }

    fn deselect(&mut self) {
        let Ok(()) = self.cs.set_high();
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "QspiInterface",),
    async(feature = "async", keep_self)
)]
impl<D, CS> QspiInterface<D, CS>
where
    D: QspiDevice,
    CS: OutputPin<Error = Infallible>,
{
    async fn stream(&mut self, data: &[u8]) -> Result<(), D::Error> {
        self.device.transmit(&Transaction::memory_write()).await?;
        for chunk in data.chunks(MAX_TRANSFER_SIZE) {
            self.device.transmit(&Transaction::data(chunk)).await?;
        }
        Ok(())
    }

    async fn stream_repeated(&mut self, pattern: &[u8], len: usize) -> Result<(), D::Error> {
        debug_assert!(!pattern.is_empty() || len == 0);
        self.device.transmit(&Transaction::memory_write()).await?;
        if pattern.is_empty() {
            return Ok(());
        }
        for chunk_len in chunk_lengths(len, pattern.len().min(MAX_TRANSFER_SIZE)) {
            self.device
                .transmit(&Transaction::data(&pattern[..chunk_len]))
                .await?;
        }
        Ok(())
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "QspiInterface",),
    async(feature = "async", keep_self)
)]
impl<D, CS> PanelBus for QspiInterface<D, CS>
where
    D: QspiDevice,
    CS: OutputPin<Error = Infallible>,
{
    type Error = D::Error;

    async fn write_command(&mut self, command: u8, params: &[u8]) -> Result<(), Self::Error> {
        self.select();
        let result = self
            .device
            .transmit(&Transaction::command(command, params))
            .await;
        self.deselect();
        result
    }

    async fn write_color(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.select();
        let result = self.stream(data).await;
        self.deselect();
        result
    }

    async fn write_color_repeated(
        &mut self,
        pattern: &[u8],
        len: usize,
    ) -> Result<(), Self::Error> {
        self.select();
        let result = self.stream_repeated(pattern, len).await;
        self.deselect();
        result
    }

    fn release(&mut self) {
        self.deselect();
        self.device.release();
    }
}

/// Single-line SPI transport using the `0x02 0x00 CMD 0x00` header framing.
pub struct SpiInterface<SPI> {
    spi: SPI,
}

impl<SPI> SpiInterface<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    pub fn into_inner(self) -> SPI {
        self.spi
    }
}

const fn header(opcode: u8) -> [u8; 4] {
    [QSPI_WRITE_COMMAND, 0x00, opcode, 0x00]
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "SpiInterface",),
    async(feature = "async", keep_self)
)]
impl<SPI> PanelBus for SpiInterface<SPI>
where
    SPI: SpiDevice,
{
    type Error = SPI::Error;

    async fn write_command(&mut self, command: u8, params: &[u8]) -> Result<(), Self::Error> {
        let hdr = header(command);
        self.spi
            .transaction(&mut [Operation::Write(&hdr), Operation::Write(params)])
            .await
    }

    async fn write_color(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        // RAMWR restarts at the window origin, RAMWRC continues after the
        // last pixel, so every chunk after the first uses RAMWRC.
        let mut opcode = Instruction::MemoryWrite.opcode();
        if data.is_empty() {
            let hdr = header(opcode);
            return self.spi.transaction(&mut [Operation::Write(&hdr)]).await;
        }
        for chunk in data.chunks(MAX_TRANSFER_SIZE) {
            let hdr = header(opcode);
            self.spi
                .transaction(&mut [Operation::Write(&hdr), Operation::Write(chunk)])
                .await?;
            opcode = Instruction::MemoryWriteContinue.opcode();
        }
        Ok(())
    }

    async fn write_color_repeated(
        &mut self,
        pattern: &[u8],
        len: usize,
    ) -> Result<(), Self::Error> {
        debug_assert!(!pattern.is_empty() || len == 0);
        let mut opcode = Instruction::MemoryWrite.opcode();
        if pattern.is_empty() || len == 0 {
            let hdr = header(opcode);
            return self.spi.transaction(&mut [Operation::Write(&hdr)]).await;
        }
        for chunk_len in chunk_lengths(len, pattern.len().min(MAX_TRANSFER_SIZE)) {
            let hdr = header(opcode);
            self.spi
                .transaction(&mut [
                    Operation::Write(&hdr),
                    Operation::Write(&pattern[..chunk_len]),
                ])
                .await?;
            opcode = Instruction::MemoryWriteContinue.opcode();
        }
        Ok(())
    }
}
