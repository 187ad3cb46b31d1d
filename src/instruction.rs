/// RM67162 user command set opcodes used by this driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Instruction {
    /// Software Reset (01h)
    SoftwareReset = 0x01,

    /// Sleep In (10h) - Enter low-power mode
    SleepIn = 0x10,
    /// Sleep Out (11h) - Exit low-power mode
    SleepOut = 0x11,

    /// Display Inversion Off (20h)
    DisplayInversionOff = 0x20,
    /// Display Inversion On (21h)
    DisplayInversionOn = 0x21,

    /// Display Off (28h) - Disable panel output
    DisplayOff = 0x28,
    /// Display On (29h) - Enable panel output
    DisplayOn = 0x29,
    /// Column Address Set (2Ah) - Horizontal addressing bounds
    ColumnAddressSet = 0x2A,
    /// Row Address Set (2Bh) - Vertical addressing bounds
    RowAddressSet = 0x2B,
    /// Memory Write (2Ch) - Start writing to frame memory
    MemoryWrite = 0x2C,

    /// Vertical Scrolling Definition (33h) - Top/scroll/bottom areas
    VerticalScrollDefinition = 0x33,
    /// Memory Data Access Control (36h) - GRAM orientation/order
    MemoryAccessControl = 0x36,
    /// Vertical Scrolling Start Address (37h)
    VerticalScrollStart = 0x37,
    /// Interface Pixel Format (3Ah) - Color depth configuration
    PixelFormatSet = 0x3A,
    /// Memory Write Continue (3Ch) - Resume after the last written pixel
    MemoryWriteContinue = 0x3C,

    /// Write Display Brightness (51h)
    WriteBrightness = 0x51,
}

impl Instruction {
    #[inline]
    pub const fn opcode(self) -> u8 {
        self as u8
    }
}

// MADCTL bits
pub const MADCTL_MY: u8 = 0x80;
pub const MADCTL_MX: u8 = 0x40;
pub const MADCTL_MV: u8 = 0x20;
/// Vertical refresh order; doubles as the scroll wrap flag.
pub const MADCTL_ML: u8 = 0x10;
pub const MADCTL_BGR: u8 = 0x08;

/// Bits of MADCTL that survive a rotation change.
pub const MADCTL_KEEP_ON_ROTATION: u8 = 0x1F;
