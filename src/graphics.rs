//! Drawing primitives.
//!
//! Every primitive reduces to an addressing window plus a memory write.
//! Coordinates are signed so shapes may hang off the panel; the visible
//! part is clipped before any window is set.

use core::convert::Infallible;

use embedded_graphics_core::pixelcolor::Rgb565;
use embedded_hal::digital::OutputPin;

use crate::{Error, PanelBus, Rm67162, Timer, color_bytes};

/// `v` as a coordinate on an axis of `limit` pixels.
fn on_axis(v: i64, limit: u16) -> Option<u16> {
    (0..i64::from(limit)).contains(&v).then_some(v as u16)
}

/// Inclusive ends of `start..start + len` clipped to `0..limit`.
///
/// Callers widen from `i32` first, so the sums here can't overflow.
fn clip_span(start: i64, len: i64, limit: u16) -> Option<(u16, u16)> {
    if len <= 0 || limit == 0 {
        return None;
    }
    let lo = start.max(0);
    let hi = (start + len - 1).min(i64::from(limit) - 1);
    (lo <= hi).then_some((lo as u16, hi as u16))
}

/// Midpoint circle walk over the first octant, `(x, y)` per step.
fn octant(r: i64) -> impl Iterator<Item = (i64, i64)> {
    let mut x = 0;
    let mut y = r;
    let mut p = 1 - r;
    core::iter::from_fn(move || {
        if x > y {
            return None;
        }
        let step = (x, y);
        if p < 0 {
            p += 2 * x + 3;
        } else {
            p += 2 * (x - y) + 5;
            y -= 1;
        }
        x += 1;
        Some(step)
    })
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
    async fn write_pixels(&mut self, data: &[u8]) -> Result<(), Error<E>> {
        self.ensure_active()?;
        self.bus.write_color(data).await.map_err(Error::Comm)
    }

    /// Stream `len` bytes of `color`, cycling the scratch buffer.
    async fn write_repeated(&mut self, color: Rgb565, len: usize) -> Result<(), Error<E>> {
        self.ensure_active()?;
        let bytes = color_bytes(color);
        let n = (self.buffer.len() & !1).min(len);
        if n == 0 {
            return self
                .bus
                .write_color_repeated(&bytes, len)
                .await
                .map_err(Error::Comm);
        }
        for px in self.buffer[..n].chunks_exact_mut(2) {
            px.copy_from_slice(&bytes);
        }
        self.bus
            .write_color_repeated(&self.buffer[..n], len)
            .await
            .map_err(Error::Comm)
    }

    /// Fill an inclusive rectangle already known to be on the panel.
    async fn fill_area(
        &mut self,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
        color: Rgb565,
    ) -> Result<(), Error<E>> {
        self.set_drawing_window(x0, y0, x1, y1).await?;
        let pixels = usize::from(x1 - x0 + 1) * usize::from(y1 - y0 + 1);
        self.write_repeated(color, pixels * 2).await
    }

    async fn plot(&mut self, x: i64, y: i64, color: Rgb565) -> Result<(), Error<E>> {
        let (Some(x), Some(y)) = (on_axis(x, self.width()), on_axis(y, self.height())) else {
            return Ok(());
        };
        self.set_drawing_window(x, y, x, y).await?;
        self.write_pixels(&color_bytes(color)).await
    }

    async fn span_h(&mut self, x: i64, y: i64, len: i64, color: Rgb565) -> Result<(), Error<E>> {
        let Some(y) = on_axis(y, self.height()) else {
            return Ok(());
        };
        let Some((x0, x1)) = clip_span(x, len, self.width()) else {
            return Ok(());
        };
        if x0 == x1 {
            return self.plot(i64::from(x0), i64::from(y), color).await;
        }
        self.fill_area(x0, y, x1, y, color).await
    }

    async fn span_v(&mut self, x: i64, y: i64, len: i64, color: Rgb565) -> Result<(), Error<E>> {
        let Some(x) = on_axis(x, self.width()) else {
            return Ok(());
        };
        let Some((y0, y1)) = clip_span(y, len, self.height()) else {
            return Ok(());
        };
        if y0 == y1 {
            return self.plot(i64::from(x), i64::from(y0), color).await;
        }
        self.fill_area(x, y0, x, y1, color).await
    }

    /// Draw a single pixel. Off-panel pixels are ignored.
    pub async fn pixel(&mut self, x: i32, y: i32, color: Rgb565) -> Result<(), Error<E>> {
        self.plot(x.into(), y.into(), color).await
    }

    /// Fill the entire screen with a single color.
    pub async fn fill(&mut self, color: Rgb565) -> Result<(), Error<E>> {
        let (width, height) = (self.width(), self.height());
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.fill_area(0, 0, width - 1, height - 1, color).await
    }

    /// Fill a `width` x `height` rectangle at (`x`, `y`), clipped to the panel.
    pub async fn fill_rect(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        color: Rgb565,
    ) -> Result<(), Error<E>> {
        let Some((x0, x1)) = clip_span(x.into(), width.into(), self.width()) else {
            return Ok(());
        };
        let Some((y0, y1)) = clip_span(y.into(), height.into(), self.height()) else {
            return Ok(());
        };
        self.fill_area(x0, y0, x1, y1, color).await
    }

    /// Horizontal line of `len` pixels starting at (`x`, `y`).
    pub async fn hline(&mut self, x: i32, y: i32, len: i32, color: Rgb565) -> Result<(), Error<E>> {
        self.span_h(x.into(), y.into(), len.into(), color).await
    }

    /// Vertical line of `len` pixels starting at (`x`, `y`).
    pub async fn vline(&mut self, x: i32, y: i32, len: i32, color: Rgb565) -> Result<(), Error<E>> {
        self.span_v(x.into(), y.into(), len.into(), color).await
    }

    /// Rectangle outline.
    pub async fn rect(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        color: Rgb565,
    ) -> Result<(), Error<E>> {
        if width <= 0 || height <= 0 {
            return Ok(());
        }
        let (x, y, w, h) = (i64::from(x), i64::from(y), i64::from(width), i64::from(height));
        self.span_h(x, y, w, color).await?;
        self.span_h(x, y + h - 1, w, color).await?;
        self.span_v(x, y, h, color).await?;
        self.span_v(x + w - 1, y, h, color).await
    }

    /// Circle outline centered on (`xm`, `ym`), midpoint algorithm.
    pub async fn circle(
        &mut self,
        xm: i32,
        ym: i32,
        r: i32,
        color: Rgb565,
    ) -> Result<(), Error<E>> {
        if r < 0 {
            return Ok(());
        }
        let (xm, ym) = (i64::from(xm), i64::from(ym));
        for (x, y) in octant(r.into()) {
            self.plot(xm + x, ym + y, color).await?;
            self.plot(xm + x, ym - y, color).await?;
            self.plot(xm - x, ym + y, color).await?;
            self.plot(xm - x, ym - y, color).await?;
            self.plot(xm + y, ym + x, color).await?;
            self.plot(xm + y, ym - x, color).await?;
            self.plot(xm - y, ym + x, color).await?;
            self.plot(xm - y, ym - x, color).await?;
        }
        Ok(())
    }

    /// Filled circle, drawn as vertical spans per step of the midpoint walk.
    pub async fn fill_circle(
        &mut self,
        xm: i32,
        ym: i32,
        r: i32,
        color: Rgb565,
    ) -> Result<(), Error<E>> {
        if r < 0 {
            return Ok(());
        }
        let (xm, ym) = (i64::from(xm), i64::from(ym));
        for (x, y) in octant(r.into()) {
            self.span_v(xm + x, ym - y, 2 * y + 1, color).await?;
            self.span_v(xm - x, ym - y, 2 * y + 1, color).await?;
            self.span_v(xm + y, ym - x, 2 * x + 1, color).await?;
            self.span_v(xm - y, ym - x, 2 * x + 1, color).await?;
        }
        Ok(())
    }

    /// Blit `data` into the half-open rectangle `x0..x1` x `y0..y1`.
    ///
    /// The stored gap is added to all coordinates and no bounds check is
    /// done. `data` must already be packed in the configured pixel format;
    /// exactly `(x1 - x0) * (y1 - y0) * bytes_per_pixel` bytes are sent.
    ///
    /// # Panics
    ///
    /// Panics if `data` is shorter than that length.
    pub async fn bitmap(
        &mut self,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
        data: &[u8],
    ) -> Result<(), Error<E>> {
        if x1 <= x0 || y1 <= y0 {
            return Ok(());
        }
        self.ensure_active()?;
        let len = usize::from(x1 - x0) * usize::from(y1 - y0) * self.state.bytes_per_pixel();
        let data = &data[..len];

        let (gx, gy) = (self.state.x_gap, self.state.y_gap);
        self.write_window(
            x0.saturating_add(gx),
            y0.saturating_add(gy),
            (x1 - 1).saturating_add(gx),
            (y1 - 1).saturating_add(gy),
        )
        .await?;
        self.write_pixels(data).await
    }
}

#[cfg(not(feature = "async"))]
mod draw_target {
    use core::convert::Infallible;

    use embedded_graphics_core::Pixel;
    use embedded_graphics_core::draw_target::DrawTarget;
    use embedded_graphics_core::geometry::{OriginDimensions, Size};
    use embedded_graphics_core::pixelcolor::Rgb565;
    use embedded_graphics_core::primitives::Rectangle;
    use embedded_hal::digital::OutputPin;

    use crate::{Error, PanelBus, Rm67162, Timer};

    impl<BUS, RST, TIMER> OriginDimensions for Rm67162<'_, BUS, RST, TIMER>
    where
        BUS: PanelBus,
        RST: OutputPin<Error = Infallible>,
        TIMER: Timer,
    {
        fn size(&self) -> Size {
            Size::new(self.width().into(), self.height().into())
        }
    }

    impl<BUS, RST, E, TIMER> DrawTarget for Rm67162<'_, BUS, RST, TIMER>
    where
        BUS: PanelBus<Error = E>,
        RST: OutputPin<Error = Infallible>,
        TIMER: Timer,
    {
        type Color = Rgb565;
        type Error = Error<E>;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(point, color) in pixels {
                self.pixel(point.x, point.y, color)?;
            }
            Ok(())
        }

        fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
            let width = i32::try_from(area.size.width).unwrap_or(i32::MAX);
            let height = i32::try_from(area.size.height).unwrap_or(i32::MAX);
            self.fill_rect(area.top_left.x, area.top_left.y, width, height, color)
        }

        fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
            self.fill(color)
        }
    }
}
