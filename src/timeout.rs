//! Monotonic deadline used to bound status polling.

use std::time::{Duration, Instant};

const MICROS_PER_SEC: u64 = 1_000_000;
const NANOS_PER_MICRO: u64 = 1_000;

/// A deadline captured at arm time.
///
/// The guard starts unarmed and reports no pending deadline until one of the
/// `arm*` methods is called. Re-arming replaces the previous deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutGuard {
    deadline: Deadline,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Deadline {
    #[default]
    Unarmed,
    At(Instant),
    // The timeout reaches past what the monotonic clock can represent.
    Never,
}

impl TimeoutGuard {
    /// Creates an unarmed guard.
    pub const fn new() -> Self {
        Self {
            deadline: Deadline::Unarmed,
        }
    }

    /// Creates a guard armed with `timeout` from now.
    pub fn armed(timeout: Duration) -> Self {
        let mut guard = Self::new();
        guard.arm(timeout);
        guard
    }

    /// Arms the guard with `timeout` from now.
    ///
    /// A timeout too large to add to the current instant, such as
    /// [`Duration::MAX`], never expires.
    pub fn arm(&mut self, timeout: Duration) {
        self.deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => Deadline::At(deadline),
            None => Deadline::Never,
        };
    }

    /// Arms the guard with a millisecond timeout.
    pub fn arm_ms(&mut self, timeout_ms: u32) {
        self.arm(split_micros(u64::from(timeout_ms) * 1_000));
    }

    /// Arms the guard with a microsecond timeout.
    pub fn arm_us(&mut self, timeout_us: u32) {
        self.arm(split_micros(u64::from(timeout_us)));
    }

    /// Returns `true` while the current time is strictly before the deadline.
    ///
    /// An unarmed guard has no deadline to be before and returns `false`.
    pub fn is_before_deadline(&self) -> bool {
        match self.deadline {
            Deadline::Unarmed => false,
            Deadline::At(deadline) => Instant::now() < deadline,
            Deadline::Never => true,
        }
    }

    /// Returns `true` once the deadline has been reached, or if the guard was never armed.
    pub fn expired(&self) -> bool {
        !self.is_before_deadline()
    }

    /// Time left until the deadline, zero when expired and [`Duration::MAX`] when it never expires.
    pub fn remaining(&self) -> Duration {
        match self.deadline {
            Deadline::Unarmed => Duration::ZERO,
            Deadline::At(deadline) => deadline.saturating_duration_since(Instant::now()),
            Deadline::Never => Duration::MAX,
        }
    }

    /// The captured deadline, if armed with a representable one.
    pub fn deadline(&self) -> Option<Instant> {
        match self.deadline {
            Deadline::At(deadline) => Some(deadline),
            Deadline::Unarmed | Deadline::Never => None,
        }
    }
}

// Whole seconds plus sub-second remainder, so large inputs never spill into the fraction.
fn split_micros(micros: u64) -> Duration {
    let secs = micros / MICROS_PER_SEC;
    let sub_micros = micros % MICROS_PER_SEC;
    Duration::new(secs, (sub_micros * NANOS_PER_MICRO) as u32)
}
