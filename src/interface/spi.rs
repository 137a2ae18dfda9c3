//! SPI transport built on the bridge's status, transmit and receive registers.

use embedded_hal::delay::DelayNs;

use super::{FrameTransport, RegisterAccess};
use crate::config::{ConfigError, TransportConfig};
use crate::error::{Error, Result};
use crate::frame::{pack_word, SpiFrame, FRAME_LEN};
use crate::logger::{LogFacade, LogSink};
use crate::registers::{Register, SpiStatus, StatusFlag, SPI_RX_DATA, SPI_TX_DATA};
use crate::timeout::TimeoutGuard;

/// Polled SPI master behind the FPGA register bridge.
///
/// Every wait on a status bit is bounded by [`TransportConfig::poll_timeout`]
/// and backs off for [`TransportConfig::poll_interval_us`] between reads.
pub struct SpiTransport<REGS, D, L = LogFacade> {
    regs: REGS,
    delay: D,
    log: L,
    config: TransportConfig,
}

impl<REGS, D> SpiTransport<REGS, D, LogFacade> {
    /// Creates a transport that reports protocol errors through the `log` facade.
    pub fn new(
        regs: REGS,
        delay: D,
        config: TransportConfig,
    ) -> core::result::Result<Self, ConfigError> {
        Self::with_log(regs, delay, LogFacade, config)
    }
}

impl<REGS, D, L> SpiTransport<REGS, D, L> {
    /// Creates a transport reporting protocol errors to `log`.
    ///
    /// Fails if `config` does not pass [`TransportConfig::validate`].
    pub fn with_log(
        regs: REGS,
        delay: D,
        log: L,
        config: TransportConfig,
    ) -> core::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            regs,
            delay,
            log,
            config,
        })
    }

    /// Returns the polling configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Provides mutable access to the register bus.
    pub fn registers_mut(&mut self) -> &mut REGS {
        &mut self.regs
    }

    /// Provides access to the log sink.
    pub fn log(&self) -> &L {
        &self.log
    }

    /// Consumes the transport and returns the owned register bus.
    pub fn release(self) -> REGS {
        self.regs
    }
}

impl<REGS, D, L> SpiTransport<REGS, D, L>
where
    REGS: RegisterAccess,
    D: DelayNs,
    L: LogSink,
{
    /// Sends `payload` as consecutive 3-byte frames.
    ///
    /// A payload that is not a whole number of frames is rejected before any
    /// register is touched.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<(), REGS::Error> {
        if payload.len() % FRAME_LEN != 0 {
            self.log
                .write(&format!("Error SPI data len [{}]", payload.len()));
            return Err(Error::InvalidLength(payload.len()));
        }

        for frame in payload.chunks_exact(FRAME_LEN) {
            self.wait_for(StatusFlag::TxReady)?;
            let word = pack_word([frame[0], frame[1], frame[2]]);
            log::trace!("spi tx {word:#08x}");
            self.regs.write_register(SPI_TX_DATA, word)?;
        }

        Ok(())
    }

    /// Issues `frame` as a read request and returns the low byte of the reply.
    pub fn read_frame(&mut self, frame: SpiFrame) -> Result<u8, REGS::Error> {
        let request = frame.into_read();
        self.write_frame(request.as_bytes())?;
        self.wait_for(StatusFlag::RxReady)?;

        let word = self.regs.read_register(SPI_RX_DATA)?;
        log::trace!("spi rx {word:#08x}");
        Ok((word & 0xFF) as u8)
    }

    fn wait_for(&mut self, flag: StatusFlag) -> Result<(), REGS::Error> {
        let guard = TimeoutGuard::armed(self.config.poll_timeout);

        loop {
            let status = SpiStatus::from(self.regs.read_register(SpiStatus::OFFSET)?);
            if flag.is_set(status) {
                return Ok(());
            }

            if guard.expired() {
                self.log.write(&format!(
                    "Timeout waiting for {flag:?}, status [{:#010x}]",
                    u32::from(status)
                ));
                return Err(Error::Timeout(flag));
            }

            self.delay.delay_us(self.config.poll_interval_us);
        }
    }
}

impl<REGS, D, L> FrameTransport for SpiTransport<REGS, D, L>
where
    REGS: RegisterAccess,
    D: DelayNs,
    L: LogSink,
{
    type BusError = REGS::Error;

    fn write_frame(&mut self, payload: &[u8]) -> Result<(), Self::BusError> {
        SpiTransport::write_frame(self, payload)
    }

    fn read_frame(&mut self, frame: SpiFrame) -> Result<u8, Self::BusError> {
        SpiTransport::read_frame(self, frame)
    }

    fn read_register(&mut self, offset: usize) -> Result<u32, Self::BusError> {
        self.regs.read_register(offset).map_err(Error::from)
    }

    fn write_register(&mut self, offset: usize, value: u32) -> Result<(), Self::BusError> {
        self.regs.write_register(offset, value).map_err(Error::from)
    }
}
