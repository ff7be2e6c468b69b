//! The clock/voltage ramp engine.
//!
//! `ramp_step` advances `current_khz` by at most [`crate::RAMP_STEP_KHZ`]
//! toward `new_khz`, maintaining the voltage-before-frequency invariant on
//! the way up and the frequency-before-voltage invariant on the way down,
//! and never leaves `current_khz` in an inconsistent state if the PLL
//! reconfigure itself fails. The engine never sleeps; pacing belongs to
//! `ramp_to`.

use super::pll::pll_divisors_for;
use super::voltage::vreg_for;
use crate::collab::{LogLevel, LogSink};
use crate::kernel_state::KernelState;
use crate::{MAX_KHZ, MIN_KHZ, RAMP_STEP_KHZ};

/// Inter-step pacing used by [`ramp_to`], in milliseconds.
pub const RAMP_STEP_DELAY_MS: u32 = 10;

/// The hardware-facing half of the ramp engine: PLL reconfiguration,
/// regulator control, and the multicore lockout that must bracket a PLL
/// reconfigure. `probe` is pure math and has a default implementation;
/// everything else genuinely touches silicon.
pub trait SysClockDriver {
    /// Whether `khz` has a valid PLL divisor solution. Pure computation,
    /// safe to call at any time.
    fn probe(&self, khz: u32) -> bool {
        super::pll::pll_divisors_for(khz).is_some()
    }

    /// Reconfigure the PLL and system clock mux to `khz`. `khz` has already
    /// been probed as achievable; this is the step that can still fail on
    /// real hardware (a PLL edge case the probe didn't catch).
    fn set_sys_clock(&mut self, khz: u32) -> bool;

    /// Program the voltage regulator to `mv`. Must complete before this
    /// call returns (the caller relies on ordering, not on the regulator's
    /// settling time).
    fn set_voltage(&mut self, mv: u32);

    /// Pause the other core for the duration of `f`, via the multicore
    /// lockout primitive.
    fn with_other_core_paused<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized;
}

/// Whether the SKU exposes the 1.35 V overdrive rail. A compile-time
/// constant because it is a board characteristic, not a runtime one.
pub const HIGH_BAND_OVERDRIVE: bool = false;

/// Find the frequency the engine should actually attempt for this step.
///
/// `bound` is already clamped to at most [`RAMP_STEP_KHZ`] away from
/// `current`. This searches strictly between `current` and `bound` for an
/// achievable frequency closest to `bound`, bounded to the step itself
/// rather than the full [`PROBE_RADIUS_KHZ`] window so a ramp step never
/// moves `current_khz` by more than `RAMP_STEP_KHZ`, unconditionally. If
/// nothing in that interior range is achievable, it falls back to `bound`
/// itself and lets the hardware reject it.
fn probe_step_candidate(current: u32, bound: u32) -> u32 {
    if pll_divisors_for(bound).is_some() {
        return bound;
    }
    let interior = if bound > current {
        (current + 1..bound).rev().find(|&khz| pll_divisors_for(khz).is_some())
    } else if bound < current {
        (bound + 1..current).find(|&khz| pll_divisors_for(khz).is_some())
    } else {
        None
    };
    interior.unwrap_or(bound)
}

/// Advance one bounded step toward `new_khz`. Returns `true` iff the engine
/// is already at `new_khz` (no step was necessary or the step was aborted
/// by a PLL edge, in which case the governor must stop retrying this
/// target). Never sleeps.
pub fn ramp_step(
    state: &KernelState,
    driver: &mut impl SysClockDriver,
    new_khz: u32,
    log: &dyn LogSink,
) -> bool {
    let current = state.current_khz();
    if current == new_khz {
        return true;
    }

    let stepping_up = new_khz > current;
    let bound = if stepping_up {
        current.saturating_add(RAMP_STEP_KHZ).min(MAX_KHZ).min(new_khz)
    } else {
        current.saturating_sub(RAMP_STEP_KHZ).max(MIN_KHZ).max(new_khz)
    };

    let next_khz = probe_step_candidate(current, bound);
    let next_mv = vreg_for(next_khz, HIGH_BAND_OVERDRIVE);

    if stepping_up {
        // Voltage before frequency on the way up (invariant 1).
        driver.set_voltage(next_mv);
    }

    let set_ok = driver.with_other_core_paused(|d| d.set_sys_clock(next_khz));

    if !set_ok {
        log.log(
            LogLevel::Warn,
            "PLL edge: set_sys_clock rejected a probed-achievable frequency",
        );
        // Invariant 2: current_khz unchanged, target_khz clamped to it.
        state.set_target_khz(current);
        return true;
    }

    if !stepping_up {
        // Frequency before voltage on the way down.
        driver.set_voltage(next_mv);
    }

    state.set_current_khz(next_khz);
    state.set_current_voltage_mv(next_mv);
    false
}

/// Convenience loop: repeatedly call [`ramp_step`] with inter-step pacing
/// until `new_khz` is reached (or a PLL edge ends the attempt early),
/// pinging the core-1 watchdog after every step so a long ramp cannot
/// starve it.
pub fn ramp_to(
    state: &KernelState,
    driver: &mut impl SysClockDriver,
    new_khz: u32,
    log: &dyn LogSink,
    mut delay_ms: impl FnMut(u32),
) {
    loop {
        let done = ramp_step(state, driver, new_khz, log);
        state.ping_core1_watchdog();
        if done {
            break;
        }
        delay_ms(RAMP_STEP_DELAY_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::NullLogSink;

    /// A deterministic software model of the PLL/regulator, for unit tests.
    struct FakeDriver {
        pub fail_khz: Option<u32>,
        pub voltage_mv: u32,
        pub pause_calls: u32,
    }

    impl FakeDriver {
        fn new() -> Self {
            FakeDriver { fail_khz: None, voltage_mv: 1100, pause_calls: 0 }
        }
    }

    impl SysClockDriver for FakeDriver {
        fn set_sys_clock(&mut self, khz: u32) -> bool {
            Some(khz) != self.fail_khz
        }

        fn set_voltage(&mut self, mv: u32) {
            self.voltage_mv = mv;
        }

        fn with_other_core_paused<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
            self.pause_calls += 1;
            f(self)
        }
    }

    #[test]
    fn idempotent_when_already_at_target() {
        let state = KernelState::new(200_000, 1100);
        let mut driver = FakeDriver::new();
        let log = NullLogSink;
        assert!(ramp_step(&state, &mut driver, 200_000, &log));
        assert_eq!(state.current_khz(), 200_000);
        assert_eq!(driver.pause_calls, 0);
    }

    #[test]
    fn single_step_never_exceeds_ramp_step_khz() {
        let state = KernelState::new(125_000, 1100);
        let mut driver = FakeDriver::new();
        let log = NullLogSink;
        let before = state.current_khz();
        let done = ramp_step(&state, &mut driver, 264_000, &log);
        let after = state.current_khz();
        assert!(!done);
        assert!(after > before);
        assert!(after - before <= RAMP_STEP_KHZ);
    }

    #[test]
    fn scenario_ramp_up_monotone_with_voltage_transitions() {
        let state = KernelState::new(125_000, 1100);
        let mut driver = FakeDriver::new();
        let log = NullLogSink;
        let mut prev = state.current_khz();
        let mut saw_1200 = false;
        let mut saw_1300 = false;
        loop {
            let done = ramp_step(&state, &mut driver, 264_000, &log);
            let now = state.current_khz();
            assert!(now >= prev);
            assert!(now - prev <= RAMP_STEP_KHZ);
            if now > 200_000 {
                assert!(driver.voltage_mv >= 1200);
                saw_1200 = true;
            }
            if now > 250_000 {
                assert!(driver.voltage_mv >= 1300);
                saw_1300 = true;
            }
            prev = now;
            if done {
                break;
            }
        }
        assert_eq!(state.current_khz(), 264_000);
        assert!(saw_1200 && saw_1300);
    }

    #[test]
    fn pll_edge_clamps_target_and_leaves_current_unchanged() {
        let state = KernelState::new(140_000, 1100);
        state.set_target_khz(150_000);
        let mut driver = FakeDriver::new();
        // The probe will find some achievable frequency near 145_000;
        // whatever it picks, force that exact attempt to fail.
        let candidate = probe_step_candidate(140_000, 145_000);
        driver.fail_khz = Some(candidate);
        let log = NullLogSink;

        let done = ramp_step(&state, &mut driver, 150_000, &log);

        assert!(done);
        assert_eq!(state.current_khz(), 140_000);
        assert_eq!(state.target_khz(), 140_000);
    }

    #[test]
    fn ramp_to_pings_watchdog_every_step() {
        let state = KernelState::new(125_000, 1100);
        let mut driver = FakeDriver::new();
        let log = NullLogSink;
        let mut delays = 0u32;
        ramp_to(&state, &mut driver, 150_000, &log, |_ms| delays += 1);
        assert_eq!(state.current_khz(), 150_000);
        assert!(state.core1_wdt_ping() >= delays);
    }
}
