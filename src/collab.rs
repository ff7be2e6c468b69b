//! Narrow contracts the kernel core consumes from its out-of-scope
//! collaborators: the command shell, the ring-buffer log, the
//! UART DMA transport, flash storage, and the monotonic clock source.
//!
//! The core never depends on a concrete transport directly; it programs
//! against these traits, the same narrow-facade shape used elsewhere in
//! this crate (`SysClockDriver`, `PioArbiterHw`) to keep register-level
//! access out of the pure logic.

/// A monotonic millisecond counter. On target this is backed by the RP2040
/// timer peripheral; in tests it is a `Cell<u32>` the test advances by hand.
pub trait MonotonicClock {
    /// Milliseconds since an arbitrary but fixed epoch (usually power-on).
    fn now_ms(&self) -> u32;
}

/// Severity of a log line, mirrored from the `log` crate's levels so the
/// core doesn't need to depend on `log` just for this enum's variants to be
/// meaningful to a human reading `dmesg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// A fatal condition; core 0 is about to reboot.
    Critical,
    /// A handled-but-noteworthy edge case (PLL edge, dropped sample, …).
    Warn,
    /// Routine informational trace.
    Info,
}

/// A sink that accepts short, already-formatted strings. Resource scarcity
/// in the backing transport means the message is dropped, never
/// propagated as an error to the caller.
pub trait LogSink {
    /// Best-effort emit. Implementations must not block or panic; a full or
    /// busy transport simply drops the line.
    fn log(&self, level: LogLevel, msg: &str);
}

/// A sink that discards every line. Useful as a default/test collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn log(&self, _level: LogLevel, _msg: &str) {}
}

/// One of the two fixed persistence slots the kernel core uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistSlot {
    /// Offset 0: chosen governor name record.
    GovernorName,
    /// Offset 0x100: opaque governor-parameter blob.
    GovernorParams,
}

/// A persistence interface able to store/retrieve an opaque blob. The
/// concrete implementation (flash, in the `hardware` feature) owns the
/// read-modify-erase-write sector discipline; this trait only exposes the
/// two records the kernel core needs.
pub trait PersistenceStore {
    /// Read raw bytes previously written to `slot`, if any valid record is
    /// present (magic + CRC both check out).
    fn load(&self, slot: PersistSlot, out: &mut [u8]) -> Option<usize>;
    /// Write `bytes` as the record for `slot`, preserving the other slot's
    /// record in the shared sector.
    fn save(&mut self, slot: PersistSlot, bytes: &[u8]) -> Result<(), crate::PersistError>;
}

/// Lower/upper bound of the MMIO window `peek`/`poke` may touch. Out-of-window or misaligned addresses are rejected by the shell
/// handler itself, before this trait is ever called.
pub const MMIO_WINDOW: core::ops::RangeInclusive<u32> = 0x1000_0000..=0x5020_0000;

/// The out-of-scope MMIO peek/poke utility's read/write contract. Address validation (range + 4-byte alignment) is the shell
/// handler's job; by the time this trait is called, `addr` is known good.
pub trait MmioAccess {
    /// Read one 32-bit word.
    fn peek(&self, addr: u32) -> u32;
    /// Write one 32-bit word.
    fn poke(&mut self, addr: u32, value: u32);
}

/// The out-of-scope ring-buffer log store's dump/toggle contract. Appending lines flows through
/// [`LogSink`]; this trait is only the shell-facing read/admin side.
pub trait LogRing {
    /// Render the ring's contents into `out`, oldest first.
    fn dump(&self, out: &mut dyn core::fmt::Write);
    /// Enable/disable mirroring log lines to the UART sink.
    fn set_uart_sink(&mut self, enabled: bool);
}

/// The out-of-scope boot/USB-init collaborator's reboot contract. Both operations are requests: on real hardware they never
/// return (the watchdog or boot ROM takes over), but the trait itself
/// returns `()` so it stays callable from tests.
pub trait SystemControl {
    /// Request a watchdog-triggered reboot.
    fn request_reboot(&mut self);
    /// Request a reboot into USB mass-storage (BOOTSEL) mode.
    fn request_bootsel(&mut self);
}

/// The out-of-scope benchmark workloads' run contract. The workloads themselves (and what they submit to the metrics
/// aggregator) are entirely external; the shell only needs to hand off the
/// request and report whether one was already running.
pub trait BenchRunner {
    /// Run a single named workload for `duration_ms`. Returns `false` if a
    /// benchmark was already in progress.
    fn run(&mut self, target: &str, duration_ms: u32) -> bool;
    /// Run the full suite for `duration_ms` per workload, optionally
    /// emitting CSV-formatted results.
    fn run_suite(&mut self, duration_ms: u32, csv: bool) -> bool;
}
