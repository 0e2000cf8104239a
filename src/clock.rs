use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of record timestamps.
///
/// This trait allows the user to choose between wall-clock time (slower, but
/// standard) and TSC-based time (faster, monotonic, but requires calibration).
/// Timestamps are only ever compared for ordering and converted to a
/// time-of-day prefix by the consumer.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current timestamp in nanoseconds since the UNIX epoch.
    fn now(&self) -> u64;
}

/// A clock that uses `std::time::SystemTime`.
///
/// Susceptible to NTP adjustments and has higher read latency (~20-50ns),
/// but requires no calibration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX epoch");
        u64::try_from(timestamp.as_nanos()).expect("system time exceeds timestamp range")
    }
}

/// A clock that uses the CPU's Time-Stamp Counter via the `quanta` crate.
///
/// Significantly cheaper to read (~6-10ns) and monotonic. It captures a
/// (tick, wall-clock) pair once at construction and progresses by rescaled
/// TSC deltas, so no backward jumps are possible.
#[derive(Debug, Clone)]
pub struct TscClock {
    clock: quanta::Clock,
    start_wall_ns: u64,
    start_instant: quanta::Instant,
}

impl Default for TscClock {
    fn default() -> Self {
        let clock = quanta::Clock::new();
        let start_instant = clock.now();
        let start_wall_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX epoch")
            .as_nanos() as u64;

        Self {
            clock,
            start_wall_ns,
            start_instant,
        }
    }
}

impl TscClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for TscClock {
    fn now(&self) -> u64 {
        let delta = self.clock.now().duration_since(self.start_instant);
        self.start_wall_ns + delta.as_nanos() as u64
    }
}

static GLOBAL: OnceLock<Box<dyn Clock>> = OnceLock::new();

/// Install a process-wide clock before the first record is submitted.
///
/// Returns `false` if the clock was already decided (either explicitly or by
/// an earlier submit falling back to [`TscClock`]).
pub fn set_clock(clock: impl Clock) -> bool {
    GLOBAL.set(Box::new(clock)).is_ok()
}

#[inline]
pub(crate) fn global() -> &'static dyn Clock {
    GLOBAL.get_or_init(|| Box::new(TscClock::new())).as_ref()
}
