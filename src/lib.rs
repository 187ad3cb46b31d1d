#![no_std]

//! RM67162 AMOLED driver over QSPI.
//!
//! The driver keeps a mirror of the controller registers it owns (MADCTL,
//! COLMOD, addressing window, rotation and gaps) and only updates the mirror
//! after the matching write reached the bus. Drawing goes through an
//! addressing window followed by a memory write; large writes are chunked by
//! the [`bus::PanelBus`] implementation.
//!
//! Blocking by default; enable the `async` feature for `async fn` variants.

use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_graphics_core::pixelcolor::{Rgb565, raw::RawU16};
use embedded_graphics_core::prelude::RawData;
use embedded_hal::digital::{ErrorType, OutputPin};

pub mod bus;
mod graphics;
pub mod instruction;
pub mod state;

#[cfg(all(test, not(feature = "async")))]
mod mock;

pub use bus::{DataLines, PanelBus, QspiDevice, QspiInterface, SpiInterface, Transaction};
pub use instruction::Instruction;
pub use state::{ColorSpace, PanelState, PixelFormat, RotationEntry, Window};

use instruction::{MADCTL_ML, MADCTL_MV, MADCTL_MX, MADCTL_MY};

/// Native (unrotated) resolution of the common 1.91" module.
pub const SCREEN_WIDTH: u16 = 240;
pub const SCREEN_HEIGHT: u16 = 536;

/// The controller addresses 10 bits per coordinate.
const ADDRESS_HIGH_MASK: u8 = 0x03;

#[derive(Clone, Copy)]
pub struct Config {
    pub color_space: ColorSpace,
    /// 16, 18 or 24.
    pub bits_per_pixel: u8,
    /// Native width, before rotation.
    pub width: u16,
    /// Native height, before rotation.
    pub height: u16,
    /// Level that holds the panel in reset.
    pub reset_level: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Rgb,
            bits_per_pixel: 16,
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            reset_level: false,
        }
    }
}

#[derive(Debug)]
pub enum Error<E = ()> {
    /// Communication error
    Comm(E),
    /// Pin setting error
    Pin(Infallible),
    UnsupportedColorSpace(ColorSpace),
    UnsupportedBitDepth(u8),
    /// The panel was deinitialized.
    Deinitialized,
}

/// Placeholder for panels wired without a reset line.
pub struct NoResetPin;

impl ErrorType for NoResetPin {
    type Error = Infallible;
}

impl OutputPin for NoResetPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Big-endian RGB565 bytes as the panel expects them.
#[inline]
pub(crate) fn color_bytes(color: Rgb565) -> [u8; 2] {
    RawU16::from(color).into_inner().to_be_bytes()
}

/// CASET/RASET payload for an inclusive `start..=end` range.
pub(crate) fn address_range(start: u16, end: u16) -> [u8; 4] {
    let [sh, sl] = start.to_be_bytes();
    let [eh, el] = end.to_be_bytes();
    [sh & ADDRESS_HIGH_MASK, sl, eh & ADDRESS_HIGH_MASK, el]
}

/// WRDISBV value for a brightness percentage, clamped to 0..=100.
pub(crate) fn brightness_level(percent: i32) -> u8 {
    (percent.clamp(0, 100) * 255 / 100) as u8
}

pub struct Rm67162<'b, BUS, RST, TIMER>
where
    BUS: PanelBus,
    RST: OutputPin<Error = Infallible>,
    TIMER: Timer,
{
    bus: BUS,
    rst: Option<RST>,
    reset_level: bool,
    state: PanelState,
    buffer: &'b mut [u8],
    active: bool,
    _timer: PhantomData<TIMER>,
}

impl<'b, BUS, RST, TIMER> Rm67162<'b, BUS, RST, TIMER>
where
    BUS: PanelBus,
    RST: OutputPin<Error = Infallible>,
    TIMER: Timer,
{
    /// Current width, after rotation.
    #[inline]
    pub fn width(&self) -> u16 {
        self.state.width
    }

    /// Current height, after rotation.
    #[inline]
    pub fn height(&self) -> u16 {
        self.state.height
    }

    #[inline]
    pub fn rotation(&self) -> u8 {
        self.state.rotation
    }

    /// Register mirror as last transmitted.
    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// Sets the gap added to every coordinate sent to the controller.
    pub fn set_gap(&mut self, x: u16, y: u16) {
        self.state.x_gap = x;
        self.state.y_gap = y;
    }

    /// Replace all four rotation slots. Takes effect on the next
    /// [`set_rotation`](Self::set_rotation).
    pub fn set_rotation_table(&mut self, table: [RotationEntry; 4]) {
        self.state.rotations = table;
    }

    /// Release the bus. Further calls are no-ops, further drawing fails with
    /// [`Error::Deinitialized`].
    pub fn deinit(&mut self) {
        if self.active {
            self.active = false;
            self.bus.release();
        }
    }

    /// Deinitialize and hand back the bus, reset pin and scratch buffer.
    pub fn release(mut self) -> (BUS, Option<RST>, &'b mut [u8]) {
        self.deinit();
        (self.bus, self.rst, self.buffer)
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Rm67162",),
    async(feature = "async", keep_self)
)]
impl<'b, BUS, RST, E, TIMER> Rm67162<'b, BUS, RST, TIMER>
where
    BUS: PanelBus<Error = E>,
    RST: OutputPin<Error = Infallible>,
    TIMER: Timer,
{
    /// Validate the configuration, pick the rotation table and put the panel
    /// into rotation 0.
    ///
    /// `buffer` is scratch space for solid fills; larger buffers mean fewer
    /// transactions. Any length works, an empty one falls back to per-pixel
    /// chunks.
    pub async fn new(
        config: Config,
        bus: BUS,
        rst: Option<RST>,
        buffer: &'b mut [u8],
    ) -> Result<Self, Error<E>> {
        let madctl = config
            .color_space
            .madctl_bits()
            .ok_or(Error::UnsupportedColorSpace(config.color_space))?;
        let format = PixelFormat::from_bits(config.bits_per_pixel)
            .ok_or(Error::UnsupportedBitDepth(config.bits_per_pixel))?;

        let (rotations, known) = state::rotation_table(config.width, config.height);
        if !known {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "no rotation table for {}x{} panel, using generic one",
                config.width,
                config.height
            );
        }

        let mut this = Self {
            bus,
            rst,
            reset_level: config.reset_level,
            state: PanelState::new(madctl, config.color_space, format, rotations),
            buffer,
            active: true,
            _timer: PhantomData,
        };
        this.set_rotation(0).await?;
        Ok(this)
    }

    fn ensure_active(&self) -> Result<(), Error<E>> {
        if self.active {
            Ok(())
        } else {
            Err(Error::Deinitialized)
        }
    }

    /// Hardware reset through the reset pin, software reset without one.
    pub async fn reset(&mut self) -> Result<(), Error<E>> {
        self.ensure_active()?;
        let level = self.reset_level;
        match self.rst.as_mut() {
            None => self.write_command(Instruction::SoftwareReset, &[]).await,
            Some(rst) => {
                rst.set_state(level.into()).map_err(Error::Pin)?;
                TIMER::delay_ms(300).await;
                rst.set_state((!level).into()).map_err(Error::Pin)?;
                TIMER::delay_ms(200).await;
                Ok(())
            }
        }
    }

    /// Wake the panel and push the mirrored MADCTL/COLMOD before turning the
    /// display on.
    pub async fn init(&mut self) -> Result<(), Error<E>> {
        self.write_command(Instruction::SleepOut, &[]).await?;
        TIMER::delay_ms(100).await;

        let madctl = self.state.madctl;
        self.write_command(Instruction::MemoryAccessControl, &[madctl])
            .await?;
        let colmod = self.state.colmod;
        self.write_command(Instruction::PixelFormatSet, &[colmod])
            .await?;

        self.write_command(Instruction::DisplayOn, &[]).await?;
        Ok(())
    }

    /// Send a raw command.
    ///
    /// MADCTL and COLMOD writes are tracked in the register mirror once
    /// they went out.
    pub async fn send_command(&mut self, command: u8, params: &[u8]) -> Result<(), Error<E>> {
        self.ensure_active()?;
        self.bus
            .write_command(command, params)
            .await
            .map_err(Error::Comm)?;
        self.state.record_command(command, params);
        Ok(())
    }

    async fn write_command(
        &mut self,
        instruction: Instruction,
        params: &[u8],
    ) -> Result<(), Error<E>> {
        self.send_command(instruction.opcode(), params).await
    }

    async fn write_madctl(&mut self, madctl: u8) -> Result<(), Error<E>> {
        self.write_command(Instruction::MemoryAccessControl, &[madctl])
            .await?;
        self.state.madctl = madctl;
        Ok(())
    }

    /// Select rotation `index % 4` from the rotation table.
    pub async fn set_rotation(&mut self, index: u8) -> Result<(), Error<E>> {
        let index = index % 4;
        let madctl = self.state.madctl_for_rotation(index);
        self.write_command(Instruction::MemoryAccessControl, &[madctl])
            .await?;
        self.state.apply_rotation(index, madctl);
        Ok(())
    }

    /// Set the addressing window to the inclusive rectangle, as given.
    ///
    /// Rectangles not fully on the panel are dropped without transmitting
    /// anything; clamp before calling if partial drawing is wanted. The gap
    /// is not applied here.
    pub async fn set_address_window(
        &mut self,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
    ) -> Result<(), Error<E>> {
        if !self.state.contains(x0, y0, x1, y1) {
            return Ok(());
        }
        self.write_window(x0, y0, x1, y1).await
    }

    /// Like [`set_address_window`](Self::set_address_window), shifted by
    /// the current gap. Used by the drawing primitives.
    async fn set_drawing_window(
        &mut self,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
    ) -> Result<(), Error<E>> {
        if !self.state.contains(x0, y0, x1, y1) {
            return Ok(());
        }
        let (gx, gy) = (self.state.x_gap, self.state.y_gap);
        self.write_window(
            x0.saturating_add(gx),
            y0.saturating_add(gy),
            x1.saturating_add(gx),
            y1.saturating_add(gy),
        )
        .await
    }

    /// CASET + RASET with controller coordinates, no bounds check.
    async fn write_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), Error<E>> {
        self.write_command(Instruction::ColumnAddressSet, &address_range(x0, x1))
            .await?;
        self.write_command(Instruction::RowAddressSet, &address_range(y0, y1))
            .await?;
        self.state.window = Some(Window { x0, y0, x1, y1 });
        Ok(())
    }

    /// Switch the interface pixel format. Accepts 16, 18 or 24.
    pub async fn set_pixel_format(&mut self, bits_per_pixel: u8) -> Result<(), Error<E>> {
        let format = PixelFormat::from_bits(bits_per_pixel)
            .ok_or(Error::UnsupportedBitDepth(bits_per_pixel))?;
        self.write_command(Instruction::PixelFormatSet, &[format.colmod()])
            .await?;
        self.state.format = format;
        self.state.colmod = format.colmod();
        Ok(())
    }

    pub async fn set_color_space(&mut self, color_space: ColorSpace) -> Result<(), Error<E>> {
        let bits = color_space
            .madctl_bits()
            .ok_or(Error::UnsupportedColorSpace(color_space))?;
        let madctl = (self.state.madctl & !instruction::MADCTL_BGR) | bits;
        self.write_madctl(madctl).await?;
        self.state.color_space = color_space;
        Ok(())
    }

    pub async fn mirror(&mut self, mirror_x: bool, mirror_y: bool) -> Result<(), Error<E>> {
        let mut madctl = self.state.madctl & !(MADCTL_MX | MADCTL_MY);
        if mirror_x {
            madctl |= MADCTL_MX;
        }
        if mirror_y {
            madctl |= MADCTL_MY;
        }
        self.write_madctl(madctl).await
    }

    pub async fn swap_xy(&mut self, swap: bool) -> Result<(), Error<E>> {
        let madctl = if swap {
            self.state.madctl | MADCTL_MV
        } else {
            self.state.madctl & !MADCTL_MV
        };
        self.write_madctl(madctl).await
    }

    pub async fn invert_color(&mut self, invert: bool) -> Result<(), Error<E>> {
        let instruction = if invert {
            Instruction::DisplayInversionOn
        } else {
            Instruction::DisplayInversionOff
        };
        self.write_command(instruction, &[]).await
    }

    /// Sleep out, then display on.
    pub async fn display_on(&mut self) -> Result<(), Error<E>> {
        self.write_command(Instruction::SleepOut, &[]).await?;
        self.write_command(Instruction::DisplayOn, &[]).await
    }

    /// Sleep in, then display off.
    pub async fn display_off(&mut self) -> Result<(), Error<E>> {
        self.write_command(Instruction::SleepIn, &[]).await?;
        self.write_command(Instruction::DisplayOff, &[]).await
    }

    pub async fn backlight_on(&mut self) -> Result<(), Error<E>> {
        self.write_command(Instruction::WriteBrightness, &[0xFF])
            .await
    }

    pub async fn backlight_off(&mut self) -> Result<(), Error<E>> {
        self.write_command(Instruction::WriteBrightness, &[0x00])
            .await
    }

    /// Brightness in percent; values outside 0..=100 are clamped.
    pub async fn brightness(&mut self, percent: i32) -> Result<(), Error<E>> {
        self.write_command(Instruction::WriteBrightness, &[brightness_level(percent)])
            .await
    }

    /// Define the top fixed, scrolling and bottom fixed areas, in lines.
    pub async fn vscroll_area(&mut self, tfa: u16, vsa: u16, bfa: u16) -> Result<(), Error<E>> {
        let [t0, t1] = tfa.to_be_bytes();
        let [v0, v1] = vsa.to_be_bytes();
        let [b0, b1] = bfa.to_be_bytes();
        self.write_command(
            Instruction::VerticalScrollDefinition,
            &[t0, t1, v0, v1, b0, b1],
        )
        .await
    }

    /// Set the first line of the scrolling area.
    ///
    /// `wrap` sets the ML bit when `Some(true)`; `None` or `Some(false)`
    /// clears it.
    pub async fn vscroll_start(&mut self, offset: u16, wrap: Option<bool>) -> Result<(), Error<E>> {
        let madctl = if wrap == Some(true) {
            self.state.madctl | MADCTL_ML
        } else {
            self.state.madctl & !MADCTL_ML
        };
        self.write_madctl(madctl).await?;
        self.write_command(Instruction::VerticalScrollStart, &offset.to_be_bytes())
            .await
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Timer",),
    async(feature = "async", keep_self)
)]
/// Simplified timer trait for delay operations.
pub trait Timer {
    /// Delay for the specified number of milliseconds.
    async fn delay_ms(milliseconds: u64);
}

/// [`Timer`] backed by `embassy-time`.
#[cfg(feature = "embassy-time")]
pub struct EmbassyTimer;

#[cfg(all(feature = "embassy-time", feature = "async"))]
impl Timer for EmbassyTimer {
    async fn delay_ms(milliseconds: u64) {
        embassy_time::Timer::after_millis(milliseconds).await;
    }
}

#[cfg(all(feature = "embassy-time", not(feature = "async")))]
impl Timer for EmbassyTimer {
    fn delay_ms(milliseconds: u64) {
        embassy_time::block_for(embassy_time::Duration::from_millis(milliseconds));
    }
}
