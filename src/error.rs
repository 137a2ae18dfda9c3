//! Error handling primitives for the Mykonos access layer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::registers::StatusFlag;

/// Crate-wide result type alias.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error variants produced by the SPI transport and the high-level API.
#[derive(Debug, Error)]
pub enum Error<E> {
    /// Any error reported by the underlying register bus.
    #[error("register bus error: {0}")]
    Interface(E),
    /// SPI payload length is not a whole number of 3-byte frames.
    #[error("SPI payload of {0} bytes is not a multiple of 3")]
    InvalidLength(usize),
    /// A status bit was not asserted before the poll deadline.
    #[error("timed out waiting for {0:?}")]
    Timeout(StatusFlag),
    /// The chip-select selector is zero or names unknown peripherals.
    #[error("invalid chip selector {0:#04x}")]
    InvalidChipSelect(u8),
    /// The provided configuration parameters are invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(ConfigError),
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Self::Interface(err)
    }
}

/// Failures of the memory-mapped register bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The device file could not be opened.
    #[error("could not open {}: {source}", .path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// `mmap` refused the window; the device handle has been closed again.
    #[error("mmap of {len:#x} bytes at {base:#x} failed: {source}")]
    MappingFailed {
        base: u64,
        len: usize,
        #[source]
        source: io::Error,
    },
    /// The register word does not fit inside the mapped window.
    #[error("offset {offset:#x} is outside the {len:#x}-byte register window")]
    OutOfRange { offset: usize, len: usize },
    /// The register word is not 4-byte aligned.
    #[error("offset {offset:#x} is not word aligned")]
    Misaligned { offset: usize },
}
