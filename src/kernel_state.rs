//! The shared kernel state facade.
//!
//! Every cross-core communication path in this crate flows through one
//! instance of [`KernelState`]. All fields are word-sized and accessed only
//! through atomic load/store: the RP2040's architecture guarantees atomic
//! word access, so no lock is needed here. `current_khz`/`current_voltage_mv` are written only by
//! the ramp engine; `target_khz` is written by governors or the shell `set`
//! handler and re-read each ramp step, so races on it are benign by
//! construction.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared, lock-free kernel state. There is exactly one instance, normally
/// held as a `'static` reference shared between core 0 and core 1.
#[derive(Debug, Default)]
pub struct KernelState {
    current_khz: AtomicU32,
    target_khz: AtomicU32,
    current_voltage_mv: AtomicU32,
    throttle_active: AtomicBool,
    core1_wdt_ping: AtomicU32,
    live_stats: AtomicBool,
    stat_period_ms: AtomicU32,
}

impl KernelState {
    /// Build a fresh state at the given boot frequency/voltage. `target_khz`
    /// starts equal to `current_khz` so the ramp engine has nothing to do
    /// until a governor or the shell changes it.
    pub const fn new(boot_khz: u32, boot_voltage_mv: u32) -> Self {
        KernelState {
            current_khz: AtomicU32::new(boot_khz),
            target_khz: AtomicU32::new(boot_khz),
            current_voltage_mv: AtomicU32::new(boot_voltage_mv),
            throttle_active: AtomicBool::new(false),
            core1_wdt_ping: AtomicU32::new(0),
            live_stats: AtomicBool::new(false),
            stat_period_ms: AtomicU32::new(1000),
        }
    }

    /// Current system clock frequency, in kilohertz.
    pub fn current_khz(&self) -> u32 {
        self.current_khz.load(Ordering::Acquire)
    }

    /// Write the current system clock frequency. Only the ramp engine calls
    /// this.
    pub(crate) fn set_current_khz(&self, khz: u32) {
        self.current_khz.store(khz, Ordering::Release);
    }

    /// The frequency a governor (or the shell) wants the ramp engine to move
    /// toward.
    pub fn target_khz(&self) -> u32 {
        self.target_khz.load(Ordering::Acquire)
    }

    /// Request a new target frequency. Called by governors and by the
    /// shell's `set` command; also called by the ramp engine itself to clamp
    /// the target back to `current_khz` after a PLL edge failure.
    pub fn set_target_khz(&self, khz: u32) {
        self.target_khz.store(khz, Ordering::Release);
    }

    /// Current regulator setpoint, in millivolts.
    pub fn current_voltage_mv(&self) -> u32 {
        self.current_voltage_mv.load(Ordering::Acquire)
    }

    /// Write the current regulator setpoint. Only the ramp engine calls
    /// this.
    pub(crate) fn set_current_voltage_mv(&self, mv: u32) {
        self.current_voltage_mv.store(mv, Ordering::Release);
    }

    /// Whether the thermal cap is currently in force.
    pub fn throttle_active(&self) -> bool {
        self.throttle_active.load(Ordering::Acquire)
    }

    /// Set/clear the thermal-cap flag.
    pub fn set_throttle_active(&self, active: bool) {
        self.throttle_active.store(active, Ordering::Release);
    }

    /// Read the core-1 watchdog ping counter.
    pub fn core1_wdt_ping(&self) -> u32 {
        self.core1_wdt_ping.load(Ordering::Acquire)
    }

    /// Increment the core-1 watchdog ping counter. Called once per governor
    /// tick and once per ramp step, so a long ramp cannot starve the
    /// watchdog.
    pub fn ping_core1_watchdog(&self) {
        self.core1_wdt_ping.fetch_add(1, Ordering::AcqRel);
    }

    /// Whether periodic telemetry output is enabled.
    pub fn live_stats(&self) -> bool {
        self.live_stats.load(Ordering::Acquire)
    }

    /// Toggle periodic telemetry output (shell `stats` command).
    pub fn toggle_live_stats(&self) -> bool {
        let was = self.live_stats.fetch_xor(true, Ordering::AcqRel);
        !was
    }

    /// Telemetry cadence, in milliseconds.
    pub fn stat_period_ms(&self) -> u32 {
        self.stat_period_ms.load(Ordering::Acquire)
    }

    /// Change the telemetry cadence.
    pub fn set_stat_period_ms(&self, ms: u32) {
        self.stat_period_ms.store(ms, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_matching_target_and_current() {
        let state = KernelState::new(125_000, 1100);
        assert_eq!(state.current_khz(), 125_000);
        assert_eq!(state.target_khz(), 125_000);
        assert_eq!(state.current_voltage_mv(), 1100);
    }

    #[test]
    fn watchdog_ping_monotonically_increases() {
        let state = KernelState::new(125_000, 1100);
        assert_eq!(state.core1_wdt_ping(), 0);
        state.ping_core1_watchdog();
        state.ping_core1_watchdog();
        assert_eq!(state.core1_wdt_ping(), 2);
    }

    #[test]
    fn live_stats_toggles() {
        let state = KernelState::new(125_000, 1100);
        assert!(!state.live_stats());
        assert!(state.toggle_live_stats());
        assert!(state.live_stats());
        assert!(!state.toggle_live_stats());
    }
}
