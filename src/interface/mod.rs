//! Bus abstractions layered between the register bridge and the SPI API.

pub mod spi;

use crate::error::Result;
use crate::frame::SpiFrame;

/// Word-wide access to the bridge's register window.
pub trait RegisterAccess {
    /// Error type produced by the concrete register bus.
    type Error;

    /// Reads the 32-bit register at `offset`.
    fn read_register(&mut self, offset: usize) -> core::result::Result<u32, Self::Error>;

    /// Writes the 32-bit register at `offset`.
    fn write_register(&mut self, offset: usize, value: u32) -> core::result::Result<(), Self::Error>;
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &mut T {
    type Error = T::Error;

    fn read_register(&mut self, offset: usize) -> core::result::Result<u32, Self::Error> {
        (**self).read_register(offset)
    }

    fn write_register(&mut self, offset: usize, value: u32) -> core::result::Result<(), Self::Error> {
        (**self).write_register(offset, value)
    }
}

/// Frame-level SPI access required by [`SpiHal`](crate::device::SpiHal).
pub trait FrameTransport {
    /// Error type of the register bus beneath the transport.
    type BusError;

    /// Sends a payload made of whole 3-byte frames.
    fn write_frame(&mut self, payload: &[u8]) -> Result<(), Self::BusError>;

    /// Sends `frame` as a read request and returns the reply byte.
    fn read_frame(&mut self, frame: SpiFrame) -> Result<u8, Self::BusError>;

    /// Reads a bridge register directly.
    fn read_register(&mut self, offset: usize) -> Result<u32, Self::BusError>;

    /// Writes a bridge register directly.
    fn write_register(&mut self, offset: usize, value: u32) -> Result<(), Self::BusError>;
}
