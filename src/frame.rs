//! The 3-byte SPI transaction unit.

use crate::registers::{READ_FLAG, READ_FLAG_HIGH_BYTE};

/// Number of bytes in one SPI transaction.
pub const FRAME_LEN: usize = 3;

/// Address high byte, address low byte, data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpiFrame([u8; FRAME_LEN]);

impl SpiFrame {
    /// Builds a write frame carrying `data` for `address`.
    pub const fn new(address: u16, data: u8) -> Self {
        let [high, low] = address.to_be_bytes();
        Self([high, low, data])
    }

    /// Builds a read request for `address`; the data byte is zero.
    pub const fn read_request(address: u16) -> Self {
        Self::new(address | READ_FLAG, 0)
    }

    /// Wraps raw frame bytes.
    pub const fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the frame with the read-request bit set on the high address byte.
    pub const fn into_read(self) -> Self {
        let [high, low, data] = self.0;
        Self([high | READ_FLAG_HIGH_BYTE, low, data])
    }

    /// The 16-bit address including the read flag.
    pub const fn address(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    /// The data byte.
    pub const fn data(&self) -> u8 {
        self.0[2]
    }

    /// Whether the read-request bit is set.
    pub const fn is_read(&self) -> bool {
        self.0[0] & READ_FLAG_HIGH_BYTE != 0
    }

    /// Raw frame bytes.
    pub const fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Packs the frame into the transmit-data word.
    ///
    /// The first frame byte lands in bits 23..16 and the data byte in bits 7..0,
    /// so a frame reads as `address << 8 | data`.
    pub const fn to_word(&self) -> u32 {
        pack_word([self.0[0], self.0[1], self.0[2]])
    }
}

impl From<[u8; FRAME_LEN]> for SpiFrame {
    fn from(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for SpiFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

pub(crate) const fn pack_word(bytes: [u8; FRAME_LEN]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_frame_is_big_endian_address_then_data() {
        let frame = SpiFrame::new(0x0154, 0xAB);
        assert_eq!(frame.as_bytes(), &[0x01, 0x54, 0xAB]);
        assert!(!frame.is_read());
        assert_eq!(frame.address(), 0x0154);
        assert_eq!(frame.data(), 0xAB);
    }

    #[test]
    fn read_request_sets_high_bit_and_clears_data() {
        let frame = SpiFrame::read_request(0x0054);
        assert_eq!(frame.as_bytes(), &[0x80, 0x54, 0x00]);
        assert!(frame.is_read());
        assert_eq!(SpiFrame::new(0x0054, 0x12).into_read().as_bytes(), &[0x80, 0x54, 0x12]);
    }

    #[test]
    fn word_packing_places_data_in_low_byte() {
        assert_eq!(SpiFrame::from_bytes([0x00, 0x44, 0x01]).to_word(), 0x0000_4401);
        assert_eq!(SpiFrame::new(0x000F, 0x01).to_word(), 0x0000_0F01);
        assert_eq!(SpiFrame::read_request(0x00AA).to_word(), 0x0080_AA00);
    }
}
