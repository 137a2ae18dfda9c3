//! Address-level SPI API consumed by the Mykonos device driver.

use crate::bridge::RegisterBridge;
use crate::config::{BridgeConfig, TransportConfig};
use crate::delay::StdDelay;
use crate::error::{BridgeError, Error, Result};
use crate::frame::SpiFrame;
use crate::interface::spi::SpiTransport;
use crate::interface::FrameTransport;
use crate::logger::LogFacade;
use crate::registers::{
    ChipSelect, Register, CLOCK_INIT_SEQUENCE, TRANSCEIVER_INIT_SEQUENCE,
};
use crate::timeout::TimeoutGuard;

/// Transport stack used on the target: mmap bridge, sleeping delay, `log` sink.
pub type BridgeTransport = SpiTransport<RegisterBridge, StdDelay, LogFacade>;

/// High-level SPI access to the clock generator and transceiver.
pub struct SpiHal<IFACE> {
    interface: IFACE,
    timer: TimeoutGuard,
}

impl<IFACE> SpiHal<IFACE> {
    // ==================================================================
    // == Construction & Ownership ======================================
    // ==================================================================
    /// Creates a new instance from the provided frame transport.
    pub fn new(interface: IFACE) -> Self {
        Self {
            interface,
            timer: TimeoutGuard::new(),
        }
    }

    /// Consumes the instance and returns the owned transport.
    pub fn release(self) -> IFACE {
        self.interface
    }

    /// Provides mutable access to the underlying transport.
    pub fn interface_mut(&mut self) -> &mut IFACE {
        &mut self.interface
    }

    // ==================================================================
    // == Driver Timer ==================================================
    // ==================================================================
    /// Arms the driver timer with a millisecond timeout.
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timer.arm_ms(timeout_ms);
    }

    /// Arms the driver timer with a microsecond timeout.
    pub fn set_timeout_us(&mut self, timeout_us: u32) {
        self.timer.arm_us(timeout_us);
    }

    /// Returns `true` while the driver timer's deadline is still ahead.
    pub fn is_before_deadline(&self) -> bool {
        self.timer.is_before_deadline()
    }
}

impl SpiHal<BridgeTransport> {
    /// Builds the full stack over a memory-mapped bridge.
    ///
    /// The device is not opened until the first transaction.
    pub fn open_bridge(
        bridge: BridgeConfig,
        transport: TransportConfig,
    ) -> Result<Self, BridgeError> {
        let invalid = Error::<BridgeError>::InvalidConfig;
        let bridge = RegisterBridge::with_config(bridge).map_err(invalid)?;
        let transport = SpiTransport::new(bridge, StdDelay, transport).map_err(invalid)?;
        Ok(Self::new(transport))
    }

    /// Releases the bridge's device handle and mapping.
    ///
    /// Any later transaction maps the window again.
    pub fn close(&mut self) {
        self.interface.registers_mut().close();
    }
}

impl<IFACE, BusE> SpiHal<IFACE>
where
    IFACE: FrameTransport<BusError = BusE>,
{
    // ==================================================================
    // == Register Transactions =========================================
    // ==================================================================
    /// Writes `data` to the 16-bit SPI `address`.
    pub fn spi_write(&mut self, address: u16, data: u8) -> Result<(), BusE> {
        let frame = SpiFrame::new(address, data);
        self.interface.write_frame(frame.as_bytes())
    }

    /// Reads one byte from the 16-bit SPI `address`.
    pub fn spi_read(&mut self, address: u16) -> Result<u8, BusE> {
        self.interface.read_frame(SpiFrame::read_request(address))
    }

    /// Reads a bridge register, bypassing the SPI engine.
    pub fn read_register(&mut self, offset: usize) -> Result<u32, BusE> {
        self.interface.read_register(offset)
    }

    /// Writes a bridge register, bypassing the SPI engine.
    pub fn write_register(&mut self, offset: usize, value: u32) -> Result<(), BusE> {
        self.interface.write_register(offset, value)
    }

    // ==================================================================
    // == Peripheral Bring-up ===========================================
    // ==================================================================
    /// Puts the selected peripherals into 4-wire SPI mode.
    ///
    /// The clock generator is soft-reset first, then the transceiver is put in
    /// single-instruction mode. The chip-select register is restored to its
    /// prior value afterwards, even when a step fails.
    pub fn init_spi(&mut self, selector: ChipSelect) -> Result<(), BusE> {
        if !selector.is_valid() {
            return Err(Error::InvalidChipSelect(selector.bits()));
        }

        let saved = self.interface.read_register(ChipSelect::OFFSET)?;
        let outcome = self.run_init_sequences(selector);
        let restored = self.interface.write_register(ChipSelect::OFFSET, saved);

        outcome?;
        restored
    }

    fn run_init_sequences(&mut self, selector: ChipSelect) -> Result<(), BusE> {
        if selector.clock() {
            self.select_and_send(ChipSelect::clock_only(), &CLOCK_INIT_SEQUENCE)?;
            log::debug!("clock generator switched to 4-wire SPI");
        }

        if selector.transceiver() {
            self.select_and_send(ChipSelect::transceiver_only(), &TRANSCEIVER_INIT_SEQUENCE)?;
            log::debug!("transceiver switched to 4-wire single-instruction SPI");
        }

        Ok(())
    }

    fn select_and_send(&mut self, target: ChipSelect, sequence: &[(u16, u8)]) -> Result<(), BusE> {
        self.interface
            .write_register(ChipSelect::OFFSET, u32::from(target.bits()))?;
        for &(address, data) in sequence {
            self.spi_write(address, data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SpiHal;
    use crate::error::{Error, Result};
    use crate::frame::SpiFrame;
    use crate::interface::FrameTransport;
    use crate::registers::{ChipSelect, SPI_CHIP_SELECT};
    use std::collections::HashMap;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Frame(u16, u8),
        Read(u16),
        RegRead(usize),
        RegWrite(usize, u32),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct BusFault;

    /// Frame-level loopback: writes land in a map, reads return them.
    #[derive(Default)]
    struct Loopback {
        memory: HashMap<u16, u8>,
        chip_select: u32,
        ops: Vec<Op>,
        fail_on_frame: Option<usize>,
    }

    impl FrameTransport for Loopback {
        type BusError = BusFault;

        fn write_frame(&mut self, payload: &[u8]) -> Result<(), BusFault> {
            if payload.len() % 3 != 0 {
                return Err(Error::InvalidLength(payload.len()));
            }
            for chunk in payload.chunks_exact(3) {
                let frames = self.ops.iter().filter(|op| matches!(op, Op::Frame(..))).count();
                if self.fail_on_frame == Some(frames) {
                    return Err(Error::Interface(BusFault));
                }
                let frame = SpiFrame::from_bytes([chunk[0], chunk[1], chunk[2]]);
                self.ops.push(Op::Frame(frame.address(), frame.data()));
                self.memory.insert(frame.address(), frame.data());
            }
            Ok(())
        }

        fn read_frame(&mut self, frame: SpiFrame) -> Result<u8, BusFault> {
            let address = frame.address() & 0x7FFF;
            self.ops.push(Op::Read(address));
            Ok(self.memory.get(&address).copied().unwrap_or(0))
        }

        fn read_register(&mut self, offset: usize) -> Result<u32, BusFault> {
            self.ops.push(Op::RegRead(offset));
            Ok(self.chip_select)
        }

        fn write_register(&mut self, offset: usize, value: u32) -> Result<(), BusFault> {
            self.ops.push(Op::RegWrite(offset, value));
            self.chip_select = value;
            Ok(())
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut hal = SpiHal::new(Loopback::default());

        hal.spi_write(0x0054, 0x02).unwrap();
        assert_eq!(hal.spi_read(0x0054).unwrap(), 0x02);

        hal.spi_write(0x00AA, 0xAB).unwrap();
        assert_eq!(hal.spi_read(0x00AA).unwrap(), 0xAB);
    }

    #[test]
    fn read_requests_carry_the_read_flag() {
        let mut hal = SpiHal::new(Loopback::default());
        hal.spi_read(0x1234).unwrap();
        assert_eq!(hal.release().ops, vec![Op::Read(0x1234)]);
    }

    #[test]
    fn transceiver_bring_up_sequence() {
        let mut hal = SpiHal::new(Loopback {
            chip_select: 0x3,
            ..Loopback::default()
        });

        hal.init_spi(ChipSelect::transceiver_only()).unwrap();

        assert_eq!(
            hal.release().ops,
            vec![
                Op::RegRead(SPI_CHIP_SELECT),
                Op::RegWrite(SPI_CHIP_SELECT, 1),
                Op::Frame(0x0000, 0x18),
                Op::Frame(0x0001, 0x80),
                Op::RegWrite(SPI_CHIP_SELECT, 0x3),
            ]
        );
    }

    #[test]
    fn combined_bring_up_runs_clock_first() {
        let mut hal = SpiHal::new(Loopback::default());

        hal.init_spi(ChipSelect::all()).unwrap();

        assert_eq!(
            hal.release().ops,
            vec![
                Op::RegRead(SPI_CHIP_SELECT),
                Op::RegWrite(SPI_CHIP_SELECT, 2),
                Op::Frame(0x0000, 0x99),
                Op::Frame(0x0044, 0x01),
                Op::Frame(0x0000, 0x18),
                Op::Frame(0x000F, 0x01),
                Op::RegWrite(SPI_CHIP_SELECT, 1),
                Op::Frame(0x0000, 0x18),
                Op::Frame(0x0001, 0x80),
                Op::RegWrite(SPI_CHIP_SELECT, 0),
            ]
        );
    }

    #[test]
    fn invalid_selectors_touch_nothing() {
        for raw in [0u8, 4, 0xFF] {
            let mut hal = SpiHal::new(Loopback::default());
            let err = hal.init_spi(ChipSelect::from(raw)).unwrap_err();
            assert!(matches!(err, Error::InvalidChipSelect(bits) if bits == raw));
            assert!(hal.release().ops.is_empty());
        }
    }

    #[test]
    fn chip_select_is_restored_after_a_failed_sequence() {
        let mut hal = SpiHal::new(Loopback {
            chip_select: 0x2,
            fail_on_frame: Some(1),
            ..Loopback::default()
        });

        let err = hal.init_spi(ChipSelect::clock_only()).unwrap_err();
        assert!(matches!(err, Error::Interface(BusFault)));

        let ops = hal.release().ops;
        assert_eq!(ops.last(), Some(&Op::RegWrite(SPI_CHIP_SELECT, 0x2)));
        assert_eq!(ops.iter().filter(|op| matches!(op, Op::Frame(..))).count(), 1);
    }

    #[test]
    fn driver_timer_tracks_deadline() {
        let mut hal = SpiHal::new(Loopback::default());
        assert!(!hal.is_before_deadline());

        hal.set_timeout_ms(1_000);
        assert!(hal.is_before_deadline());

        hal.set_timeout_us(50);
        std::thread::sleep(std::time::Duration::from_micros(200));
        assert!(!hal.is_before_deadline());
    }
}
