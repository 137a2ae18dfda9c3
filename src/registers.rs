//! Register map of the FPGA SPI bridge and the transceiver bring-up tables.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

/// Offset of the SPI receive-data register.
pub const SPI_RX_DATA: usize = 0x40;
/// Offset of the SPI transmit-data register.
pub const SPI_TX_DATA: usize = 0x44;
/// Offset of the SPI status register.
pub const SPI_STATUS: usize = 0x48;
/// Offset of the SPI chip-select register.
pub const SPI_CHIP_SELECT: usize = 0x54;

/// Width in bytes of every bridge register.
pub const REGISTER_WIDTH: usize = core::mem::size_of::<u32>();

/// First byte past the highest SPI register; the mapped window must cover it.
pub const SPI_WINDOW_END: usize = SPI_CHIP_SELECT + REGISTER_WIDTH;

/// Read-request flag OR-ed into a 16-bit SPI address.
pub const READ_FLAG: u16 = 0x8000;
/// Read-request flag as seen on the first (high) frame byte.
pub const READ_FLAG_HIGH_BYTE: u8 = 0x80;

/// Access permissions of a bridge register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read-only register.
    ReadOnly,
    /// Write-only register.
    WriteOnly,
    /// Read/write register.
    ReadWrite,
}

/// Metadata exposed by every typed register view.
pub trait Register {
    /// Offset of the register inside the mapped window.
    const OFFSET: usize;
    /// Access permission classification.
    const ACCESS: Access;
}

/// Bitfield representation of the SPI status register (offset `0x48`).
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiStatus {
    #[skip]
    __: B6,
    // Transmit FIFO can take another frame (bit 6).
    pub tx_ready: bool,
    // A reply word is waiting in the receive register (bit 7).
    pub rx_ready: bool,
    #[skip]
    __: B24,
}

impl From<u32> for SpiStatus {
    fn from(value: u32) -> Self {
        Self::from_bytes(value.to_le_bytes())
    }
}

impl From<SpiStatus> for u32 {
    fn from(value: SpiStatus) -> Self {
        u32::from_le_bytes(value.into_bytes())
    }
}

/// Status bits the transport waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFlag {
    /// `SPI_STATUS[6]`.
    TxReady,
    /// `SPI_STATUS[7]`.
    RxReady,
}

impl StatusFlag {
    /// Returns whether this flag is asserted in `status`.
    pub fn is_set(self, status: SpiStatus) -> bool {
        match self {
            Self::TxReady => status.tx_ready(),
            Self::RxReady => status.rx_ready(),
        }
    }
}

/// Peripheral selection used by [`SpiHal::init_spi`](crate::device::SpiHal::init_spi).
///
/// The same encoding is written to the chip-select register, so a selector
/// with a single bit set doubles as the register value for that peripheral.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipSelect {
    // AD9371 transceiver (bit 0).
    pub transceiver: bool,
    // AD9528 clock generator (bit 1).
    pub clock: bool,
    #[skip]
    __: B6,
}

impl ChipSelect {
    /// Highest raw selector accepted by the bring-up sequence.
    pub const MAX_RAW: u8 = 0b11;

    /// Selects only the transceiver.
    pub fn transceiver_only() -> Self {
        Self::new().with_transceiver(true)
    }

    /// Selects only the clock generator.
    pub fn clock_only() -> Self {
        Self::new().with_clock(true)
    }

    /// Selects both peripherals.
    pub fn all() -> Self {
        Self::transceiver_only() | Self::clock_only()
    }

    /// Raw selector value.
    pub fn bits(self) -> u8 {
        u8::from(self)
    }

    /// Returns whether the raw value names at least one known peripheral and nothing else.
    pub fn is_valid(self) -> bool {
        (1..=Self::MAX_RAW).contains(&self.bits())
    }
}

impl From<u8> for ChipSelect {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

impl From<ChipSelect> for u8 {
    fn from(value: ChipSelect) -> Self {
        value.into_bytes()[0]
    }
}

impl core::ops::BitOr for ChipSelect {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::from(self.bits() | rhs.bits())
    }
}

impl Register for SpiStatus {
    const OFFSET: usize = SPI_STATUS;
    const ACCESS: Access = Access::ReadOnly;
}

impl Register for ChipSelect {
    const OFFSET: usize = SPI_CHIP_SELECT;
    const ACCESS: Access = Access::ReadWrite;
}

/// AD9528 bring-up: assert soft reset in 4-wire mode, commit, deassert, commit.
pub const CLOCK_INIT_SEQUENCE: [(u16, u8); 4] = [
    (0x0000, 0x99),
    (0x0044, 0x01),
    (0x0000, 0x18),
    (0x000F, 0x01),
];

/// AD9371 bring-up: 4-wire SPI mode, then single-instruction mode.
pub const TRANSCEIVER_INIT_SEQUENCE: [(u16, u8); 2] = [(0x0000, 0x18), (0x0001, 0x80)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_layout_matches_bridge() {
        let status = SpiStatus::from(0x0000_0040);
        assert!(status.tx_ready());
        assert!(!status.rx_ready());

        let status = SpiStatus::from(0xFFFF_FF80);
        assert!(!status.tx_ready());
        assert!(status.rx_ready());
        assert_eq!(u32::from(status), 0xFFFF_FF80);
    }

    #[test]
    fn status_flag_selects_its_bit() {
        let both = SpiStatus::from(0xC0);
        assert!(StatusFlag::TxReady.is_set(both));
        assert!(StatusFlag::RxReady.is_set(both));
        assert!(!StatusFlag::RxReady.is_set(SpiStatus::from(0x40)));
    }

    #[test]
    fn chip_select_encoding() {
        assert_eq!(ChipSelect::transceiver_only().bits(), 1);
        assert_eq!(ChipSelect::clock_only().bits(), 2);
        assert_eq!(ChipSelect::all().bits(), 3);
        assert!(ChipSelect::all().is_valid());
        assert!(!ChipSelect::from(0).is_valid());
        assert!(!ChipSelect::from(4).is_valid());
        assert!(!ChipSelect::from(0x81).is_valid());
    }

    #[test]
    fn register_metadata_matches_offsets() {
        assert_eq!(SpiStatus::OFFSET, SPI_STATUS);
        assert_eq!(SpiStatus::ACCESS, Access::ReadOnly);
        assert_eq!(ChipSelect::OFFSET, SPI_CHIP_SELECT);
        assert_eq!(ChipSelect::ACCESS, Access::ReadWrite);
    }

    #[test]
    fn window_covers_every_spi_register() {
        for offset in [SPI_RX_DATA, SPI_TX_DATA, SPI_STATUS, SPI_CHIP_SELECT] {
            assert!(offset + REGISTER_WIDTH <= SPI_WINDOW_END);
            assert_eq!(offset % REGISTER_WIDTH, 0);
        }
    }
}
