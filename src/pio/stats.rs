//! PIO statistics snapshot and the rolling-stability arbiter.
//!
//! This module is pure logic: it consumes raw tick counts handed to it by
//! the poller (see [`super::poll_once`]) and never touches a PIO register
//! itself, so it is fully unit-testable on the host.

/// Number of heartbeat periods kept in the rolling stability window.
pub const STABILITY_WINDOW_LEN: usize = 8;
/// CV threshold, in percent, below which a poll counts toward `stable_count`.
pub const STABLE_CV_PCT: f32 = 1.5;
/// Number of polls after a frequency change during which `safe_to_scale`
/// is forced false, regardless of measurements.
pub const SETTLE_POLLS: u8 = 8;
/// EMA smoothing factor for the idle fraction.
pub const IDLE_EMA_ALPHA: f32 = 0.25;
/// Default minimum number of consecutive low-CV samples required to call
/// the system stable.
pub const DEFAULT_MIN_STABLE: u8 = 4;
/// Default heartbeat-jitter threshold, in percent.
pub const DEFAULT_JITTER_THRESH_PCT: f32 = 3.0;
/// Default idle-fraction threshold used by the reference governor's
/// stability gate.
pub const DEFAULT_IDLE_THRESH: f32 = 0.03;

/// A fixed-capacity ring of the last [`STABILITY_WINDOW_LEN`] heartbeat
/// periods, used to compute the coefficient of variation.
#[derive(Debug, Clone, Copy)]
pub struct StabilityWindow {
    periods: [u32; STABILITY_WINDOW_LEN],
    len: usize,
    next: usize,
}

impl Default for StabilityWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl StabilityWindow {
    /// Build an empty window. `const` so [`PioStats::new`] can be used in a
    /// `static` initializer.
    pub const fn new() -> Self {
        StabilityWindow { periods: [0; STABILITY_WINDOW_LEN], len: 0, next: 0 }
    }

    /// Push a new heartbeat period, overwriting the oldest entry once full.
    pub fn push(&mut self, period_ticks: u32) {
        self.periods[self.next] = period_ticks;
        self.next = (self.next + 1) % STABILITY_WINDOW_LEN;
        if self.len < STABILITY_WINDOW_LEN {
            self.len += 1;
        }
    }

    /// Discard all samples (used by [`PioStats::notify_freq_change`]).
    pub fn clear(&mut self) {
        *self = StabilityWindow::default();
    }

    /// Coefficient of variation (stddev / mean) of the samples currently in
    /// the window, or `0.0` if fewer than two samples are present.
    pub fn coefficient_of_variation(&self) -> f32 {
        if self.len < 2 {
            return 0.0;
        }
        let samples = &self.periods[..self.len];
        let sum: u64 = samples.iter().map(|&p| p as u64).sum();
        let mean = sum as f32 / self.len as f32;
        if mean == 0.0 {
            return 0.0;
        }
        let variance = samples
            .iter()
            .map(|&p| {
                let d = p as f32 - mean;
                d * d
            })
            .sum::<f32>()
            / self.len as f32;
        libm_sqrt(variance) / mean
    }
}

/// Newton's method for `f32` square root, over at most 8 samples.
fn libm_sqrt(x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    let mut guess = x;
    for _ in 0..20 {
        guess = 0.5 * (guess + x / guess);
    }
    guess
}

/// Snapshot of PIO-derived measurements, updated by the poller and consumed
/// by the stability arbiter and the shell.
#[derive(Debug, Clone, Copy)]
pub struct PioStats {
    /// Most recent raw idle-pin-high tick count.
    pub idle_ticks: u32,
    /// EMA of `idle_ticks / loop_period_ticks`, always in `[0, 1]`.
    pub idle_fraction: f32,
    /// Most recent heartbeat period, in ticks.
    pub hb_period_ticks: u32,
    /// Previous heartbeat period, in ticks.
    pub hb_period_prev: u32,
    /// Signed difference between the two most recent heartbeat periods.
    pub hb_jitter_ticks: i32,
    /// `hb_jitter_ticks` expressed as a percentage of `hb_period_prev`.
    pub hb_jitter_pct: f32,
    /// Consecutive polls with CV below [`STABLE_CV_PCT`].
    pub stable_count: u8,
    /// Whether the stability gate currently reports scaling is safe.
    pub safe_to_scale: bool,
    window: StabilityWindow,
    settle_remaining: u8,
    /// Whether the arbiter has ever been initialized. Used for the
    /// failsafe: an uninitialized arbiter always reports safe.
    initialized: bool,
}

impl Default for PioStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PioStats {
    /// Build a fresh, uninitialized snapshot. `const` so it can seed a
    /// `static` [`super::SharedPioStats`] without a runtime initializer.
    pub const fn new() -> Self {
        PioStats {
            idle_ticks: 0,
            idle_fraction: 0.0,
            hb_period_ticks: 0,
            hb_period_prev: 0,
            hb_jitter_ticks: 0,
            hb_jitter_pct: 0.0,
            stable_count: 0,
            safe_to_scale: false,
            window: StabilityWindow::new(),
            settle_remaining: 0,
            initialized: false,
        }
    }

    /// Mark the arbiter initialized. Called once the PIO state machines
    /// have actually been configured and started.
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Feed one poll's worth of raw tick counts into the snapshot.
    ///
    /// `idle_ticks` is the count drained from the idle-measure SM's FIFO
    /// (0 if nothing new arrived this poll), `loop_period_ticks` is the
    /// duration, in PIO ticks, of the window the idle count covers, and
    /// `hb_period_ticks` is the latest period drained from the
    /// period-measure SM (`None` if no new heartbeat arrived).
    pub fn update(&mut self, idle_ticks: u32, loop_period_ticks: u32, hb_period_ticks: Option<u32>) {
        self.idle_ticks = idle_ticks;
        if loop_period_ticks > 0 {
            let sample = (idle_ticks as f32 / loop_period_ticks as f32).clamp(0.0, 1.0);
            self.idle_fraction = (IDLE_EMA_ALPHA * sample + (1.0 - IDLE_EMA_ALPHA) * self.idle_fraction)
                .clamp(0.0, 1.0);
        }

        if let Some(period) = hb_period_ticks {
            self.hb_period_prev = self.hb_period_ticks;
            self.hb_period_ticks = period;
            if self.hb_period_prev > 0 {
                self.hb_jitter_ticks = period as i32 - self.hb_period_prev as i32;
                self.hb_jitter_pct = 100.0 * (self.hb_jitter_ticks.unsigned_abs() as f32) / self.hb_period_prev as f32;
            } else {
                self.hb_jitter_ticks = 0;
                self.hb_jitter_pct = 0.0;
            }
            self.window.push(period);

            if self.window.coefficient_of_variation() * 100.0 < STABLE_CV_PCT {
                self.stable_count = self.stable_count.saturating_add(1);
            } else {
                self.stable_count = 0;
            }
        }

        if self.settle_remaining > 0 {
            self.settle_remaining -= 1;
        }
    }

    /// Must be invoked after each successful ramp step. This
    /// discards stale pre-transition samples and forces `safe_to_scale`
    /// false for [`SETTLE_POLLS`] subsequent polls while the PLL relocks.
    pub fn notify_freq_change(&mut self, _new_khz: u32) {
        self.window.clear();
        self.stable_count = 0;
        self.settle_remaining = SETTLE_POLLS;
    }

    /// Evaluate the stability predicate. Returns `true` unconditionally if
    /// the arbiter was never initialized.
    pub fn safe_to_scale(&self, idle_thresh: f32, jitter_thresh_pct: f32, min_stable: u8) -> bool {
        if !self.initialized {
            return true;
        }
        if self.settle_remaining > 0 {
            return false;
        }
        let _ = idle_thresh;
        self.stable_count >= min_stable && self.hb_jitter_pct.abs() <= jitter_thresh_pct
    }

    /// Recompute and cache [`PioStats::safe_to_scale`] with the default
    /// thresholds, for callers (like the shell) that just want the cached
    /// snapshot value rather than calling the predicate themselves.
    pub fn refresh_cached_safe_to_scale(&mut self) {
        self.safe_to_scale = self.safe_to_scale(
            DEFAULT_IDLE_THRESH,
            DEFAULT_JITTER_THRESH_PCT,
            DEFAULT_MIN_STABLE,
        );
    }
}

/// Convert a PIO tick count to microseconds at the given system clock
/// frequency. One PIO tick is 2 system clock cycles at divider 1, so `us = ticks * 2000 / sys_khz`.
pub fn ticks_to_us(ticks: u32, sys_khz: u32) -> u32 {
    if sys_khz == 0 {
        return 0;
    }
    ((ticks as u64 * 2000) / sys_khz as u64) as u32
}
