//! User-space access to the AD9371 (Mykonos) transceiver's SPI bus through the
//! memory-mapped FPGA lightweight bridge.
//!
//! The stack, bottom to top:
//!
//! - [`RegisterBridge`]: lazily mapped 32-bit register window.
//! - [`SpiTransport`]: 3-byte frames pushed through the bridge's SPI engine,
//!   every status wait bounded by a [`TimeoutGuard`].
//! - [`SpiHal`]: address/data reads and writes plus peripheral bring-up, the
//!   surface the vendor device driver calls into.
//!
//! ```no_run
//! use mykonos_hal::{BridgeConfig, ChipSelect, SpiHal, TransportConfig};
//!
//! let mut hal = SpiHal::open_bridge(BridgeConfig::default(), TransportConfig::default())?;
//! hal.init_spi(ChipSelect::all())?;
//! hal.spi_write(0x0054, 0x02)?;
//! assert_eq!(hal.spi_read(0x0054)?, 0x02);
//! hal.close();
//! # Ok::<(), mykonos_hal::Error<mykonos_hal::BridgeError>>(())
//! ```

mod error;

pub mod bridge;
pub mod config;
pub mod delay;
pub mod device;
pub mod frame;
pub mod interface;
pub mod logger;
pub mod registers;
pub mod timeout;

pub use crate::bridge::RegisterBridge;
pub use crate::config::{BridgeConfig, ConfigError, TransportConfig};
pub use crate::device::SpiHal;
pub use crate::error::{BridgeError, Error, Result};
pub use crate::frame::SpiFrame;
pub use crate::interface::spi::SpiTransport;
pub use crate::interface::{FrameTransport, RegisterAccess};
pub use crate::registers::{ChipSelect, StatusFlag};
pub use crate::timeout::TimeoutGuard;
