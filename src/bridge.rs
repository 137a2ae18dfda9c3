//! Memory-mapped window onto the FPGA lightweight bridge.
//!
//! The bridge opens the physical-memory device and maps a fixed window of it
//! the first time a register is touched. The device handle and the mapping
//! live and die together inside [`RegisterBridge`]; nothing else holds a
//! pointer into the window.
//!
//! Only one bridge should map a given window per process. The type is `Send`
//! but not `Sync`: share it behind a mutex if several threads need it.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::ptr::{self, NonNull};

use crate::config::{BridgeConfig, ConfigError};
use crate::error::BridgeError;
use crate::interface::RegisterAccess;
use crate::registers::REGISTER_WIDTH;

/// Lazily mapped register window.
#[derive(Debug)]
pub struct RegisterBridge {
    config: BridgeConfig,
    mapping: Option<Mapping>,
    open_count: usize,
}

impl RegisterBridge {
    /// Creates an unopened bridge over the default lightweight-bridge window.
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
            mapping: None,
            open_count: 0,
        }
    }

    /// Creates an unopened bridge over a custom window.
    pub fn with_config(config: BridgeConfig) -> core::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            mapping: None,
            open_count: 0,
        })
    }

    /// Returns the window description.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Opens the device and maps the window. Does nothing if already open.
    pub fn open(&mut self) -> core::result::Result<(), BridgeError> {
        self.mapping().map(|_| ())
    }

    /// Unmaps the window and closes the device. Safe to call when closed.
    pub fn close(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            drop(mapping);
            log::debug!("unmapped register window of {}", self.config.device_path.display());
        }
    }

    /// Whether the device is open and the window mapped.
    pub fn is_open(&self) -> bool {
        self.mapping.is_some()
    }

    /// Number of successful open+map cycles since construction.
    pub fn open_count(&self) -> usize {
        self.open_count
    }

    /// Reads the 32-bit register at `offset`, opening the bridge if needed.
    pub fn read(&mut self, offset: usize) -> core::result::Result<u32, BridgeError> {
        self.check_offset(offset)?;
        let mapping = self.mapping()?;
        Ok(mapping.read(offset))
    }

    /// Writes the 32-bit register at `offset`, opening the bridge if needed.
    pub fn write(&mut self, offset: usize, value: u32) -> core::result::Result<(), BridgeError> {
        self.check_offset(offset)?;
        let mapping = self.mapping()?;
        mapping.write(offset, value);
        Ok(())
    }

    fn check_offset(&self, offset: usize) -> core::result::Result<(), BridgeError> {
        let len = self.config.map_len;
        match offset.checked_add(REGISTER_WIDTH) {
            Some(end) if end <= len => {}
            _ => return Err(BridgeError::OutOfRange { offset, len }),
        }

        if offset % REGISTER_WIDTH != 0 {
            return Err(BridgeError::Misaligned { offset });
        }

        Ok(())
    }

    fn mapping(&mut self) -> core::result::Result<&Mapping, BridgeError> {
        let mapping = match self.mapping.take() {
            Some(mapping) => mapping,
            None => {
                let mapping = Mapping::establish(&self.config)?;
                self.open_count += 1;
                log::debug!(
                    "mapped {:#x} bytes of {} at {:#x}",
                    self.config.map_len,
                    self.config.device_path.display(),
                    self.config.physical_base
                );
                mapping
            }
        };
        Ok(self.mapping.insert(mapping))
    }
}

impl Default for RegisterBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterAccess for RegisterBridge {
    type Error = BridgeError;

    fn read_register(&mut self, offset: usize) -> core::result::Result<u32, Self::Error> {
        self.read(offset)
    }

    fn write_register(&mut self, offset: usize, value: u32) -> core::result::Result<(), Self::Error> {
        self.write(offset, value)
    }
}

/// An open device handle together with its live mapping.
#[derive(Debug)]
struct Mapping {
    base: NonNull<u8>,
    len: usize,
    _file: File,
}

// The mapping is owned exclusively; moving it to another thread moves that ownership.
unsafe impl Send for Mapping {}

impl Mapping {
    fn establish(config: &BridgeConfig) -> core::result::Result<Self, BridgeError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&config.device_path)
            .map_err(|source| {
                log::error!("could not open {}: {source}", config.device_path.display());
                BridgeError::ResourceUnavailable {
                    path: config.device_path.clone(),
                    source,
                }
            })?;

        // Wrapping conversion: 32-bit targets pass high physical addresses through off_t unchanged.
        let offset = config.physical_base as libc::off_t;

        // SAFETY: a fresh mapping chosen by the kernel (null hint) aliases no Rust object;
        // the fd is valid for the duration of the call.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                config.map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset,
            )
        };

        let mapping_failed = |source: io::Error| {
            log::error!("mmap() of {} failed: {source}", config.device_path.display());
            BridgeError::MappingFailed {
                base: config.physical_base,
                len: config.map_len,
                source,
            }
        };

        // `file` drops on the error paths, closing the handle again.
        if addr == libc::MAP_FAILED {
            return Err(mapping_failed(io::Error::last_os_error()));
        }
        let base = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| mapping_failed(io::Error::from(io::ErrorKind::AddrNotAvailable)))?;

        Ok(Self {
            base,
            len: config.map_len,
            _file: file,
        })
    }

    fn read(&self, offset: usize) -> u32 {
        debug_assert!(offset + REGISTER_WIDTH <= self.len);
        // SAFETY: the caller validated `offset` as an aligned word inside the live mapping.
        unsafe { ptr::read_volatile(self.base.as_ptr().add(offset).cast::<u32>()) }
    }

    fn write(&self, offset: usize, value: u32) {
        debug_assert!(offset + REGISTER_WIDTH <= self.len);
        // SAFETY: as in `read`.
        unsafe { ptr::write_volatile(self.base.as_ptr().add(offset).cast::<u32>(), value) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `base`/`len` describe exactly the region returned by mmap, unmapped once.
        unsafe {
            libc::munmap(self.base.as_ptr().cast(), self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{SPI_CHIP_SELECT, SPI_TX_DATA};
    use tempfile::NamedTempFile;

    fn backing_file() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(0x1000).unwrap();
        file
    }

    fn bridge_over(path: &std::path::Path) -> RegisterBridge {
        let config = BridgeConfig::builder()
            .device_path(path)
            .physical_base(0)
            .build();
        RegisterBridge::with_config(config).unwrap()
    }

    #[test]
    fn first_access_opens_lazily() {
        let file = backing_file();
        let mut bridge = bridge_over(file.path());
        assert!(!bridge.is_open());

        bridge.write(SPI_TX_DATA, 0xDEAD_BEEF).unwrap();
        assert!(bridge.is_open());
        assert_eq!(bridge.read(SPI_TX_DATA).unwrap(), 0xDEAD_BEEF);
        assert_eq!(bridge.open_count(), 1);
    }

    #[test]
    fn writes_reach_the_backing_device() {
        let file = backing_file();
        let mut bridge = bridge_over(file.path());
        bridge.write(SPI_CHIP_SELECT, 0x0102_0304).unwrap();
        bridge.close();

        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(
            &bytes[SPI_CHIP_SELECT..SPI_CHIP_SELECT + 4],
            &0x0102_0304u32.to_ne_bytes()
        );
    }

    #[test]
    fn close_then_access_maps_exactly_once_more() {
        let file = backing_file();
        let mut bridge = bridge_over(file.path());

        bridge.open().unwrap();
        bridge.open().unwrap();
        assert_eq!(bridge.open_count(), 1);

        bridge.close();
        bridge.close();
        assert!(!bridge.is_open());
        assert_eq!(bridge.open_count(), 1);

        bridge.read(0).unwrap();
        bridge.read(4).unwrap();
        assert_eq!(bridge.open_count(), 2);
    }

    #[test]
    fn missing_device_is_resource_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut bridge = bridge_over(&dir.path().join("no-such-device"));

        let err = bridge.write(SPI_TX_DATA, 1).unwrap_err();
        assert!(matches!(err, BridgeError::ResourceUnavailable { .. }));
        assert!(!bridge.is_open());
        assert_eq!(bridge.open_count(), 0);
    }

    #[test]
    fn unmappable_device_leaves_bridge_closed() {
        let mut bridge = bridge_over(std::path::Path::new("/dev/null"));

        let err = bridge.read(0).unwrap_err();
        assert!(matches!(err, BridgeError::MappingFailed { .. }));
        assert!(!bridge.is_open());
        assert_eq!(bridge.open_count(), 0);
    }

    #[test]
    fn offsets_are_checked_before_opening() {
        let file = backing_file();
        let mut bridge = bridge_over(file.path());

        assert!(matches!(
            bridge.read(0x1000),
            Err(BridgeError::OutOfRange { offset: 0x1000, len: 0x1000 })
        ));
        assert!(matches!(
            bridge.write(0xFFE, 0),
            Err(BridgeError::OutOfRange { .. })
        ));
        assert!(matches!(
            bridge.write(usize::MAX, 0),
            Err(BridgeError::OutOfRange { .. })
        ));
        assert!(matches!(
            bridge.read(0x42),
            Err(BridgeError::Misaligned { offset: 0x42 })
        ));
        assert!(!bridge.is_open());
        assert_eq!(bridge.open_count(), 0);

        assert!(bridge.read(0xFFC).is_ok());
    }

    #[test]
    fn invalid_window_is_rejected_at_construction() {
        let config = BridgeConfig::builder().map_len(0).build();
        assert_eq!(
            RegisterBridge::with_config(config).unwrap_err(),
            ConfigError::EmptyWindow
        );
    }
}
