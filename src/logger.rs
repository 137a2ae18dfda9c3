//! Log sink handed to the SPI transport for protocol-level error reports.

/// Receives already formatted diagnostic lines.
pub trait LogSink {
    /// Appends one message to the sink.
    fn write(&mut self, message: &str);
}

/// Forwards every message to the [`log`] facade under the `mykonos_hal` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

impl LogSink for LogFacade {
    fn write(&mut self, message: &str) {
        log::error!(target: "mykonos_hal", "{message}");
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl LogSink for NullLog {
    fn write(&mut self, _message: &str) {}
}

/// Collects messages in memory.
impl LogSink for Vec<String> {
    fn write(&mut self, message: &str) {
        self.push(message.to_owned());
    }
}

impl<L: LogSink + ?Sized> LogSink for &mut L {
    fn write(&mut self, message: &str) {
        (**self).write(message);
    }
}
