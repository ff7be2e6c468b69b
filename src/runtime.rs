//! Dual-core Runtime: boot sequencing, the core-1 governor
//! loop, core-0's watchdog of core-1, heartbeat emission, and the
//! shared-state discipline that ties the other four components together.
//!
//! Both cores run one cooperative `loop { … }`, no async runtime, no
//! interrupts on the core control path. This module
//! factors each loop's body into a single pure-ish function per iteration
//! (`core0_iteration`, `core1_tick`) so the choreography is unit-testable
//! against mock collaborators; the actual `loop { sleep(); … }` wrapper
//! lives in `src/bin/firmware.rs` under the `hardware` feature, mirroring
//! `aps490_pfpu2_mini::main`'s single top-level loop.

use crate::collab::{LogLevel, LogSink, MonotonicClock, SystemControl};
use crate::governor::{GovernorCtx, GovernorRegistry};
use crate::kernel_state::KernelState;
use crate::metrics::{SharedKernelSnapshot, SharedMetricsRing};

/// How often core 0 samples `core1_wdt_ping` to detect a core-1 stall.
pub const WATCHDOG_SAMPLE_PERIOD_MS: u32 = 5_000;
/// Nominal pacing of the core-1 governor loop.
pub const GOVERNOR_TICK_PERIOD_MS: u32 = 40;

/// The narrow GPIO surface core 0's loop drives every iteration: the IDLE
/// pin (raised while waiting on a character, lowered as soon as one
/// arrives) and the heartbeat pulse.
pub trait HeartbeatIo {
    /// Raise the IDLE pin (about to block waiting for a character).
    fn idle_high(&mut self);
    /// Lower the IDLE pin (a character arrived, or the wait ended).
    fn idle_low(&mut self);
    /// Emit one heartbeat pulse, >= 8 PIO cycles wide.
    fn heartbeat_pulse(&mut self);
}

/// Samples `core1_wdt_ping` every [`WATCHDOG_SAMPLE_PERIOD_MS`] and reboots
/// via [`SystemControl::request_reboot`] if it hasn't advanced since the
/// last sample.
#[derive(Debug, Default)]
pub struct WatchdogMonitor {
    last_check_ms: Option<u32>,
    last_ping: u32,
}

impl WatchdogMonitor {
    /// Fresh monitor; the first sample always just records a baseline.
    pub const fn new() -> Self {
        WatchdogMonitor { last_check_ms: None, last_ping: 0 }
    }

    /// Call once per core-0 loop iteration. Internally a no-op unless
    /// [`WATCHDOG_SAMPLE_PERIOD_MS`] has elapsed since the last sample.
    /// Returns `true` if a stall was detected and a reboot was requested.
    pub fn poll(
        &mut self,
        kernel: &KernelState,
        now_ms: u32,
        log: &dyn LogSink,
        sysctl: &mut dyn SystemControl,
    ) -> bool {
        let due = match self.last_check_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= WATCHDOG_SAMPLE_PERIOD_MS,
        };
        if !due {
            return false;
        }
        let ping = kernel.core1_wdt_ping();
        let stalled = self.last_check_ms.is_some() && ping == self.last_ping;
        if stalled {
            log.log(LogLevel::Critical, "core1 watchdog stall: rebooting");
            sysctl.request_reboot();
        }
        self.last_ping = ping;
        self.last_check_ms = Some(now_ms);
        stalled
    }
}

/// One iteration of core 0's REPL loop body, minus the
/// line-parsing itself (external collaborator): emit the heartbeat, poll
/// PIO, drive the IDLE pin around the character read, refresh telemetry
/// cadence, and sample the watchdog. `try_read_char` is the zero-timeout
/// UART read; returning `None` means no character was available this
/// iteration.
pub struct Core0Iteration<'a> {
    pub kernel: &'a KernelState,
    pub clock: &'a dyn MonotonicClock,
    pub log: &'a dyn LogSink,
    pub sysctl: &'a mut dyn SystemControl,
    pub io: &'a mut dyn HeartbeatIo,
    pub watchdog: &'a mut WatchdogMonitor,
}

impl<'a> Core0Iteration<'a> {
    /// Run one iteration. `try_read_char` is called exactly once; its
    /// result is returned unchanged so the (external) line accumulator can
    /// act on it.
    pub fn run(&mut self, try_read_char: impl FnOnce() -> Option<u8>) -> Option<u8> {
        self.io.heartbeat_pulse();
        self.io.idle_high();
        let ch = try_read_char();
        self.io.idle_low();

        let now = self.clock.now_ms();
        self.watchdog.poll(self.kernel, now, self.log, self.sysctl);

        ch
    }
}

/// One governor tick on core 1: collect and
/// clear the metrics aggregate, run the current governor, record the tick's
/// wall time in the kernel snapshot, and ping the core-1 watchdog counter.
/// Pacing (`sleep(~40ms)`) is the caller's job: cooperative loops, not
/// async.
pub fn core1_tick(
    governors: &mut GovernorRegistry,
    ctx: &mut GovernorCtx,
    metrics: &SharedMetricsRing,
    snapshot: &SharedKernelSnapshot,
) -> crate::governor::GovernorAction {
    let agg = metrics.get_aggregate(true);
    let tick_start = ctx.clock.now_ms();
    let action = governors.tick(ctx, agg);
    let tick_end = ctx.clock.now_ms();
    snapshot.record_tick(tick_end.saturating_sub(tick_start), tick_end);
    ctx.kernel.ping_core1_watchdog();
    action
}
