//! Register mirror of the controller.
//!
//! Everything here is plain data. The driver mutates it only after the
//! corresponding register write went out on the bus, so the mirror always
//! matches what the panel last received.

use crate::instruction::{
    Instruction, MADCTL_BGR, MADCTL_KEEP_ON_ROTATION, MADCTL_MV, MADCTL_MX, MADCTL_MY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorSpace {
    Rgb,
    Bgr,
    /// Accepted by the API for completeness, rejected by the RM67162.
    Monochrome,
}

impl ColorSpace {
    /// MADCTL bits selecting this color order, `None` if the panel can't do it.
    pub const fn madctl_bits(self) -> Option<u8> {
        match self {
            ColorSpace::Rgb => Some(0),
            ColorSpace::Bgr => Some(MADCTL_BGR),
            ColorSpace::Monochrome => None,
        }
    }
}

/// Interface pixel format written to COLMOD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PixelFormat {
    /// 16 bpp, RGB565 framebuffer.
    Bpp16,
    /// 18 bpp, transferred as 24-bit padded pixels.
    Bpp18,
    /// 24 bpp, RGB888 framebuffer.
    Bpp24,
}

impl PixelFormat {
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            16 => Some(PixelFormat::Bpp16),
            18 => Some(PixelFormat::Bpp18),
            24 => Some(PixelFormat::Bpp24),
            _ => None,
        }
    }

    pub const fn bits(self) -> u8 {
        match self {
            PixelFormat::Bpp16 => 16,
            PixelFormat::Bpp18 => 18,
            PixelFormat::Bpp24 => 24,
        }
    }

    pub const fn colmod(self) -> u8 {
        match self {
            PixelFormat::Bpp16 => 0x75,
            PixelFormat::Bpp18 => 0x76,
            PixelFormat::Bpp24 => 0x77,
        }
    }

    pub const fn from_colmod(colmod: u8) -> Option<Self> {
        match colmod {
            0x75 => Some(PixelFormat::Bpp16),
            0x76 => Some(PixelFormat::Bpp18),
            0x77 => Some(PixelFormat::Bpp24),
            _ => None,
        }
    }

    /// Bytes per pixel in the framebuffer layout the panel expects.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bpp16 => 2,
            PixelFormat::Bpp18 | PixelFormat::Bpp24 => 3,
        }
    }
}

/// One slot of the rotation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RotationEntry {
    pub madctl: u8,
    pub width: u16,
    pub height: u16,
    pub col_start: u16,
    pub row_start: u16,
}

impl RotationEntry {
    pub const fn new(madctl: u8, width: u16, height: u16, col_start: u16, row_start: u16) -> Self {
        Self {
            madctl,
            width,
            height,
            col_start,
            row_start,
        }
    }
}

/// Vendor table for the 1.91" 240x536 RM67162 module.
pub const ROTATIONS_240X536: [RotationEntry; 4] = [
    RotationEntry::new(0x00, 240, 536, 0, 0),
    RotationEntry::new(MADCTL_MX | MADCTL_MV, 536, 240, 0, 0),
    RotationEntry::new(MADCTL_MY | MADCTL_MX, 240, 536, 0, 0),
    RotationEntry::new(MADCTL_MY | MADCTL_MV, 536, 240, 0, 0),
];

/// Fallback table for panels of unknown geometry: 0/2 keep the native
/// size, 1/3 swap it, no gaps.
pub const fn generic_rotations(width: u16, height: u16) -> [RotationEntry; 4] {
    [
        RotationEntry::new(0x00, width, height, 0, 0),
        RotationEntry::new(MADCTL_MX | MADCTL_MV, height, width, 0, 0),
        RotationEntry::new(MADCTL_MY | MADCTL_MX, width, height, 0, 0),
        RotationEntry::new(MADCTL_MY | MADCTL_MV, height, width, 0, 0),
    ]
}

/// Pick the rotation table for a native (unrotated) resolution.
///
/// Returns `false` as second element when the geometry was not recognised
/// and the generic table was synthesised instead.
pub fn rotation_table(width: u16, height: u16) -> ([RotationEntry; 4], bool) {
    match (width, height) {
        (240, 536) | (536, 240) => (ROTATIONS_240X536, true),
        _ => (generic_rotations(width, height), false),
    }
}

/// Inclusive column/row window as last sent with CASET/RASET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Window {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

#[derive(Debug, Clone)]
pub struct PanelState {
    pub madctl: u8,
    pub colmod: u8,
    pub color_space: ColorSpace,
    pub format: PixelFormat,
    pub rotation: u8,
    pub rotations: [RotationEntry; 4],
    pub width: u16,
    pub height: u16,
    pub x_gap: u16,
    pub y_gap: u16,
    pub window: Option<Window>,
}

impl PanelState {
    /// Build the mirror for a freshly constructed panel. Dimensions and gaps
    /// are taken from rotation 0; nothing has been transmitted yet.
    pub fn new(
        madctl: u8,
        color_space: ColorSpace,
        format: PixelFormat,
        rotations: [RotationEntry; 4],
    ) -> Self {
        let first = rotations[0];
        Self {
            madctl,
            colmod: format.colmod(),
            color_space,
            format,
            rotation: 0,
            rotations,
            width: first.width,
            height: first.height,
            x_gap: first.col_start,
            y_gap: first.row_start,
            window: None,
        }
    }

    /// MADCTL value selecting rotation `index`, keeping the non-rotation bits.
    pub fn madctl_for_rotation(&self, index: u8) -> u8 {
        (self.madctl & MADCTL_KEEP_ON_ROTATION) | self.rotations[usize::from(index % 4)].madctl
    }

    /// Adopt geometry of rotation `index` after its MADCTL was transmitted.
    pub fn apply_rotation(&mut self, index: u8, madctl: u8) {
        let index = index % 4;
        let entry = self.rotations[usize::from(index)];
        self.madctl = madctl;
        self.rotation = index;
        self.width = entry.width;
        self.height = entry.height;
        self.x_gap = entry.col_start;
        self.y_gap = entry.row_start;
    }

    /// Track a raw register write that went out on the bus.
    pub fn record_command(&mut self, opcode: u8, params: &[u8]) {
        let Some(&value) = params.first() else {
            return;
        };
        if opcode == Instruction::MemoryAccessControl.opcode() {
            self.madctl = value;
            self.color_space = if value & MADCTL_BGR != 0 {
                ColorSpace::Bgr
            } else {
                ColorSpace::Rgb
            };
        } else if opcode == Instruction::PixelFormatSet.opcode() {
            self.colmod = value;
            if let Some(format) = PixelFormat::from_colmod(value) {
                self.format = format;
            }
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    /// Whether the logical rectangle lies fully on the panel.
    pub fn contains(&self, x0: u16, y0: u16, x1: u16, y1: u16) -> bool {
        x0 <= x1 && x1 < self.width && y0 <= y1 && y1 < self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_geometry_loads_vendor_table() {
        let (table, known) = rotation_table(240, 536);
        assert!(known);
        assert_eq!(table, ROTATIONS_240X536);

        let (table, known) = rotation_table(536, 240);
        assert!(known);
        assert_eq!(table[0].width, 240);
        assert_eq!(table[1].width, 536);
    }

    #[test]
    fn unknown_geometry_synthesises_swaps() {
        let (table, known) = rotation_table(368, 448);
        assert!(!known);
        assert_eq!((table[0].width, table[0].height), (368, 448));
        assert_eq!((table[1].width, table[1].height), (448, 368));
        assert_eq!((table[2].width, table[2].height), (368, 448));
        assert_eq!((table[3].width, table[3].height), (448, 368));
        assert!(table.iter().all(|e| e.col_start == 0 && e.row_start == 0));
    }

    #[test]
    fn pixel_format_mapping() {
        assert_eq!(PixelFormat::from_bits(16).map(PixelFormat::colmod), Some(0x75));
        assert_eq!(PixelFormat::from_bits(18).map(PixelFormat::colmod), Some(0x76));
        assert_eq!(PixelFormat::from_bits(24).map(PixelFormat::colmod), Some(0x77));
        assert_eq!(PixelFormat::from_bits(18).map(PixelFormat::bytes_per_pixel), Some(3));
        assert_eq!(PixelFormat::from_bits(12), None);
        assert_eq!(PixelFormat::from_bits(32), None);
    }

    #[test]
    fn rotation_keeps_low_bits() {
        let mut state = PanelState::new(
            MADCTL_BGR | 0x10,
            ColorSpace::Bgr,
            PixelFormat::Bpp16,
            ROTATIONS_240X536,
        );
        // mirror bits set by hand must be dropped by the rotation
        state.madctl |= MADCTL_MX;
        let madctl = state.madctl_for_rotation(3);
        assert_eq!(madctl, MADCTL_BGR | 0x10 | MADCTL_MY | MADCTL_MV);
        state.apply_rotation(3, madctl);
        assert_eq!((state.width, state.height), (536, 240));
        assert_eq!(state.rotation, 3);
    }

    #[test]
    fn record_command_tracks_registers() {
        let mut state = PanelState::new(0, ColorSpace::Rgb, PixelFormat::Bpp16, ROTATIONS_240X536);
        state.record_command(0x36, &[MADCTL_BGR | MADCTL_MY]);
        assert_eq!(state.madctl, MADCTL_BGR | MADCTL_MY);
        assert_eq!(state.color_space, ColorSpace::Bgr);

        state.record_command(0x3A, &[0x76]);
        assert_eq!((state.colmod, state.format), (0x76, PixelFormat::Bpp18));

        // unknown COLMOD codes are mirrored, the pixel layout stays
        state.record_command(0x3A, &[0x55]);
        assert_eq!((state.colmod, state.format), (0x55, PixelFormat::Bpp18));

        state.record_command(0x29, &[0x01]);
        state.record_command(0x36, &[]);
        assert_eq!(state.madctl, MADCTL_BGR | MADCTL_MY);
    }

    #[test]
    fn contains_checks_order_and_bounds() {
        let state = PanelState::new(0, ColorSpace::Rgb, PixelFormat::Bpp16, ROTATIONS_240X536);
        assert!(state.contains(0, 0, 239, 535));
        assert!(!state.contains(0, 0, 240, 10));
        assert!(!state.contains(5, 0, 4, 10));
        assert!(!state.contains(0, 11, 0, 10));
        assert!(!state.contains(0, 0, 0, 536));
    }
}
