//! PIO-based idle and heartbeat-jitter measurement.
//!
//! Two autonomous PIO state machines do the actual counting in hardware;
//! this module is the thin driver surface the rest of the system programs
//! against ([`PioArbiterHw`]) plus the pure poller/arbiter logic in
//! [`stats`] that turns raw tick counts into the stability predicate.

pub mod stats;

pub use stats::PioStats;

use critical_section::Mutex;
use core::cell::RefCell;

use crate::error::PioError;

/// [`PioStats`] behind the same `critical_section::Mutex<RefCell<_>>` guard
/// used for every other non-atomic shared region in this crate. The shell
/// and the poller both go through this handle rather than touching a bare
/// [`PioStats`] directly.
pub struct SharedPioStats {
    inner: Mutex<RefCell<PioStats>>,
}

impl Default for SharedPioStats {
    fn default() -> Self {
        Self::new_const()
    }
}

impl SharedPioStats {
    /// Build a fresh guard around an uninitialized [`PioStats`]. `const` so
    /// this can seed a `'static` instance in `src/bin/firmware.rs`.
    pub const fn new_const() -> Self {
        SharedPioStats { inner: Mutex::new(RefCell::new(PioStats::new())) }
    }


    /// Poll `hw` and fold the result into the guarded snapshot.
    pub fn poll_once(&self, hw: &mut impl PioArbiterHw, loop_period_ticks: u32) {
        critical_section::with(|cs| {
            poll_once(hw, &mut self.inner.borrow_ref_mut(cs), loop_period_ticks);
        });
    }

    /// Mark the arbiter initialized.
    pub fn mark_initialized(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).mark_initialized());
    }

    /// Must be invoked after every successful ramp step.
    pub fn notify_freq_change(&self, new_khz: u32) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).notify_freq_change(new_khz));
    }

    /// Evaluate the stability predicate against the current snapshot.
    pub fn safe_to_scale(&self, idle_thresh: f32, jitter_thresh_pct: f32, min_stable: u8) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).safe_to_scale(idle_thresh, jitter_thresh_pct, min_stable))
    }

    /// Get a consistent copy of the snapshot (shell `pio` introspection).
    pub fn get(&self) -> PioStats {
        critical_section::with(|cs| *self.inner.borrow_ref(cs))
    }
}

/// Which GPIO pin an SM watches (GPIO 20 for the idle pin, 21 for heartbeat).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PioChannel {
    /// Watches the IDLE pin; counts cycles while it is driven high.
    IdleMeasure,
    /// Watches the HB pin; times the low phase between heartbeat pulses.
    PeriodMeasure,
}

/// The narrow hardware surface the rest of the system programs against.
/// `start`, `drain_fifo`, and `set_divider` are the PIO driver's entire
/// platform-specific boundary; everything above this trait is portable.
pub trait PioArbiterHw {
    /// Load and start both PIO programs on GPIOs `idle_pin`/`hb_pin`.
    fn start(&mut self, idle_pin: u8, hb_pin: u8) -> Result<(), PioError>;

    /// Drain every word currently sitting in `channel`'s RX FIFO into
    /// `out`, without blocking, returning how many were read.
    fn drain_fifo(&mut self, channel: PioChannel, out: &mut [u32]) -> usize;

    /// Set the clock divider (integer part only, the measurement
    /// programs' two-instruction loops run at divider 1) for both state
    /// machines.
    fn set_divider(&mut self, divider_int: u16);
}

/// Poll both FIFOs and fold whatever arrived into `stats`, all under a
/// short critical section.
///
/// `loop_period_ticks` is the duration of the poll window, in PIO ticks,
/// used as the denominator of the idle-fraction EMA.
pub fn poll_once(
    hw: &mut impl PioArbiterHw,
    stats: &mut PioStats,
    loop_period_ticks: u32,
) {
    let mut idle_buf = [0u32; 4];
    let idle_count = hw.drain_fifo(PioChannel::IdleMeasure, &mut idle_buf);
    let idle_ticks = idle_buf[..idle_count].iter().copied().sum();

    let mut period_buf = [0u32; 4];
    let period_count = hw.drain_fifo(PioChannel::PeriodMeasure, &mut period_buf);
    let latest_period = period_buf[..period_count].last().copied();

    stats.update(idle_ticks, loop_period_ticks, latest_period);
    stats.refresh_cached_safe_to_scale();
}
