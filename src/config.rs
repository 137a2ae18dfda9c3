//! Configuration primitives for the register bridge and the SPI transport.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::registers::SPI_WINDOW_END;

/// Physical-memory device exposing the FPGA lightweight bridge.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/mem";
/// Physical address of the lightweight HPS-to-FPGA bridge.
pub const DEFAULT_PHYSICAL_BASE: u64 = 0xFF20_0000;
/// Length of the mapped register window.
pub const DEFAULT_MAP_LEN: usize = 0x1000;
/// Sleep between two status polls, in microseconds.
pub const DEFAULT_POLL_INTERVAL_US: u32 = 10;
/// Upper bound on a single status poll loop.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

// mmap offsets must be a multiple of the page size; 4 KiB covers every target we run on.
const PAGE_SIZE: u64 = 0x1000;

/// Location and size of the memory-mapped register window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Device file opened for the mapping.
    pub device_path: PathBuf,
    /// Physical offset of the window inside the device.
    pub physical_base: u64,
    /// Length of the mapping in bytes.
    pub map_len: usize,
}

impl BridgeConfig {
    /// Begins building a [`BridgeConfig`] using the builder pattern.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::new()
    }

    /// Checks the window can be mapped and covers the SPI registers.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.map_len == 0 {
            return Err(ConfigError::EmptyWindow);
        }

        if self.physical_base % PAGE_SIZE != 0 {
            return Err(ConfigError::UnalignedBase(self.physical_base));
        }

        if self.map_len < SPI_WINDOW_END {
            return Err(ConfigError::WindowTooSmall(self.map_len));
        }

        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            physical_base: DEFAULT_PHYSICAL_BASE,
            map_len: DEFAULT_MAP_LEN,
        }
    }
}

/// Builder for [`BridgeConfig`] allowing piecemeal construction.
#[derive(Debug, Clone)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Creates a new builder seeded with [`BridgeConfig::default()`].
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
        }
    }

    /// Overrides the device file.
    pub fn device_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.device_path = path.as_ref().to_path_buf();
        self
    }

    /// Overrides the physical base of the window.
    pub fn physical_base(mut self, base: u64) -> Self {
        self.config.physical_base = base;
        self
    }

    /// Overrides the mapping length.
    pub fn map_len(mut self, len: usize) -> Self {
        self.config.map_len = len;
        self
    }

    /// Finalizes the builder and returns the [`BridgeConfig`].
    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

impl Default for BridgeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Polling behaviour of the SPI transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Delay between two status reads, in microseconds.
    pub poll_interval_us: u32,
    /// Deadline applied to every wait for a status bit.
    pub poll_timeout: Duration,
}

impl TransportConfig {
    /// Begins building a [`TransportConfig`] using the builder pattern.
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::new()
    }

    /// Rejects a zero poll timeout, which would fail every transaction.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.poll_timeout.is_zero() {
            return Err(ConfigError::ZeroPollTimeout);
        }

        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: DEFAULT_POLL_INTERVAL_US,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Clone, Copy)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Creates a new builder seeded with [`TransportConfig::default()`].
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
        }
    }

    /// Sets the sleep between status polls.
    pub fn poll_interval_us(mut self, interval_us: u32) -> Self {
        self.config.poll_interval_us = interval_us;
        self
    }

    /// Sets the deadline of each status wait.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    /// Finalizes the builder and returns the [`TransportConfig`].
    pub fn build(self) -> TransportConfig {
        self.config
    }
}

impl Default for TransportConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Validation errors generated while verifying a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The mapping length is zero.
    #[error("register window is empty")]
    EmptyWindow,
    /// The physical base is not page aligned.
    #[error("physical base {0:#x} is not page aligned")]
    UnalignedBase(u64),
    /// The window ends before the last SPI register.
    #[error("register window of {0:#x} bytes does not reach the SPI registers")]
    WindowTooSmall(usize),
    /// The poll timeout is zero.
    #[error("poll timeout must be non-zero")]
    ZeroPollTimeout,
}
