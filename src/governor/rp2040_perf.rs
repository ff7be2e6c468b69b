//! Reference governor `rp2040_perf`.
//!
//! Priority-ordered decision: thermal backoff, thermal restore, activity
//! classification on the metrics aggregate, then idle timeout. Every
//! resulting target change is subject to the cooldown gate before it is
//! applied, and the shared [`super::converge_to_target`] step, common to
//! every governor in this crate, performs the actual stability-gated ramp.

use core::fmt::Write;

use super::{converge_to_target, GovernorAction, GovernorCtx, GovernorState, RampOutcome};
use crate::metrics::MetricsAggregate;
use crate::MAX_KHZ;

/// Tunable parameters, persisted as one opaque blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    pub cooldown_ms: u32,
    pub ramp_up_cooldown_ms: u32,
    pub thr_high: u32,
    pub thr_med: u32,
    pub thr_low: u32,
    pub dur_high: u32,
    pub dur_med: u32,
    pub dur_short: u32,
    pub temp_backoff_c: i32,
    pub temp_restore_c: i32,
    pub backoff_target_khz: u32,
    pub idle_target_khz: u32,
    pub idle_timeout_ms: u32,
}

/// Number of bytes [`Params::to_bytes`] produces. Bump
/// [`crate::persist::GOVERNOR_PARAMS_MAGIC`] if this layout ever changes.
pub const PARAMS_LEN: usize = 13 * 4;

impl Params {
    /// Built-in defaults.
    pub const DEFAULT: Params = Params {
        cooldown_ms: 2_000,
        ramp_up_cooldown_ms: 500,
        thr_high: 80,
        thr_med: 60,
        thr_low: 20,
        dur_high: 500,
        dur_med: 250,
        dur_short: 200,
        temp_backoff_c: 72,
        temp_restore_c: 65,
        backoff_target_khz: 200_000,
        idle_target_khz: 100_000,
        idle_timeout_ms: 5_000,
    };

    /// Serialize to the little-endian byte layout persisted in flash.
    pub fn to_bytes(&self) -> [u8; PARAMS_LEN] {
        let mut buf = [0u8; PARAMS_LEN];
        let fields: [u32; 13] = [
            self.cooldown_ms,
            self.ramp_up_cooldown_ms,
            self.thr_high,
            self.thr_med,
            self.thr_low,
            self.dur_high,
            self.dur_med,
            self.dur_short,
            self.temp_backoff_c as u32,
            self.temp_restore_c as u32,
            self.backoff_target_khz,
            self.idle_target_khz,
            self.idle_timeout_ms,
        ];
        for (i, v) in fields.iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        buf
    }

    /// Parse the byte layout [`Params::to_bytes`] produces. `None` if
    /// `bytes` is the wrong length.
    pub fn from_bytes(bytes: &[u8]) -> Option<Params> {
        if bytes.len() != PARAMS_LEN {
            return None;
        }
        let mut words = [0u32; 13];
        for (i, w) in words.iter_mut().enumerate() {
            let mut b = [0u8; 4];
            b.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            *w = u32::from_le_bytes(b);
        }
        Some(Params {
            cooldown_ms: words[0],
            ramp_up_cooldown_ms: words[1],
            thr_high: words[2],
            thr_med: words[3],
            thr_low: words[4],
            dur_high: words[5],
            dur_med: words[6],
            dur_short: words[7],
            temp_backoff_c: words[8] as i32,
            temp_restore_c: words[9] as i32,
            backoff_target_khz: words[10],
            idle_target_khz: words[11],
            idle_timeout_ms: words[12],
        })
    }

    /// `gov tune rp2040_perf get <name>`. `None` if `name` isn't one of this
    /// governor's parameters.
    pub fn get(&self, name: &str) -> Option<i64> {
        Some(match name {
            "cooldown_ms" => self.cooldown_ms as i64,
            "ramp_up_cooldown_ms" => self.ramp_up_cooldown_ms as i64,
            "thr_high" => self.thr_high as i64,
            "thr_med" => self.thr_med as i64,
            "thr_low" => self.thr_low as i64,
            "dur_high" => self.dur_high as i64,
            "dur_med" => self.dur_med as i64,
            "dur_short" => self.dur_short as i64,
            "temp_backoff_c" => self.temp_backoff_c as i64,
            "temp_restore_c" => self.temp_restore_c as i64,
            "backoff_target_khz" => self.backoff_target_khz as i64,
            "idle_target_khz" => self.idle_target_khz as i64,
            "idle_timeout_ms" => self.idle_timeout_ms as i64,
            _ => return None,
        })
    }

    /// `gov tune rp2040_perf set <name> <value>`. Returns `false` if `name`
    /// isn't recognized; the caller (the shell) leaves state untouched in
    /// that case.
    pub fn set(&mut self, name: &str, value: i64) -> bool {
        match name {
            "cooldown_ms" => self.cooldown_ms = value as u32,
            "ramp_up_cooldown_ms" => self.ramp_up_cooldown_ms = value as u32,
            "thr_high" => self.thr_high = value as u32,
            "thr_med" => self.thr_med = value as u32,
            "thr_low" => self.thr_low = value as u32,
            "dur_high" => self.dur_high = value as u32,
            "dur_med" => self.dur_med = value as u32,
            "dur_short" => self.dur_short = value as u32,
            "temp_backoff_c" => self.temp_backoff_c = value as i32,
            "temp_restore_c" => self.temp_restore_c = value as i32,
            "backoff_target_khz" => self.backoff_target_khz = value as u32,
            "idle_target_khz" => self.idle_target_khz = value as u32,
            "idle_timeout_ms" => self.idle_timeout_ms = value as u32,
            _ => return false,
        }
        true
    }

    /// Parameter names, in table order, for `gov tune rp2040_perf list`.
    pub const NAMES: [&'static str; 13] = [
        "cooldown_ms",
        "ramp_up_cooldown_ms",
        "thr_high",
        "thr_med",
        "thr_low",
        "dur_high",
        "dur_med",
        "dur_short",
        "temp_backoff_c",
        "temp_restore_c",
        "backoff_target_khz",
        "idle_target_khz",
        "idle_timeout_ms",
    ];
}

impl Default for Params {
    fn default() -> Self {
        Params::DEFAULT
    }
}

/// Private runtime state: tunables plus the cooldown/idle bookkeeping that
/// isn't itself persisted (it resets naturally across a reboot).
#[derive(Debug, Clone, Copy)]
pub struct State {
    pub params: Params,
    last_change_ms: Option<u32>,
    last_activity_ms: u32,
    idle: bool,
    /// Count of idle-state entries, for `gov status`/testing.
    pub idle_switch_count: u32,
}

impl State {
    /// Fresh state with default parameters, not yet idle.
    pub const fn new() -> Self {
        State {
            params: Params::DEFAULT,
            last_change_ms: None,
            last_activity_ms: 0,
            idle: false,
            idle_switch_count: 0,
        }
    }
}

pub fn init(state: &mut GovernorState) {
    if let GovernorState::Rp2040Perf(s) = state {
        s.last_change_ms = None;
        s.idle = false;
    }
}

pub fn tick(gstate: &mut GovernorState, ctx: &mut GovernorCtx, agg: MetricsAggregate) -> GovernorAction {
    let GovernorState::Rp2040Perf(state) = gstate else {
        return GovernorAction::NoAction;
    };
    let now = ctx.clock.now_ms();
    let current_target = ctx.kernel.target_khz();
    let temp = ctx.temp.read_temp_c();
    let params = state.params;

    let mut candidate: Option<u32> = None;
    let mut leaving_idle = false;
    let mut entering_idle = false;

    if temp > params.temp_backoff_c && current_target > params.backoff_target_khz {
        // 1. Thermal backoff.
        candidate = Some(params.backoff_target_khz);
    } else if temp < params.temp_restore_c && current_target < MAX_KHZ && !state.idle {
        // 2. Thermal restore.
        candidate = Some(MAX_KHZ);
    } else if agg.count > 0 {
        // 3. Activity classification.
        state.last_activity_ms = agg.last_ts_ms;
        let intensity = agg.avg_intensity;
        let duration = agg.avg_duration_ms;
        if intensity >= 90 || (intensity >= params.thr_high && duration >= params.dur_high) {
            candidate = Some(MAX_KHZ);
            leaving_idle = state.idle;
        } else if intensity >= params.thr_med && duration >= params.dur_med {
            candidate = Some(core::cmp::min(230_000, MAX_KHZ));
            leaving_idle = state.idle;
        } else if (intensity <= params.thr_low && duration < params.dur_short) || intensity <= 40 {
            candidate = Some(params.idle_target_khz);
            entering_idle = true;
        }
    }

    if candidate.is_none() && agg.count == 0 && !state.idle {
        // 4. Idle timeout.
        let since_activity = now.saturating_sub(state.last_activity_ms);
        if since_activity >= params.idle_timeout_ms {
            candidate = Some(params.idle_target_khz);
            entering_idle = true;
        }
    }

    let mut changed = false;
    if let Some(target) = candidate {
        if target != current_target {
            let stepping_up = target > current_target;
            let effective_cooldown = if stepping_up && !leaving_idle {
                params.ramp_up_cooldown_ms
            } else {
                params.cooldown_ms
            };
            let elapsed = state.last_change_ms.map_or(u32::MAX, |t| now.saturating_sub(t));
            if elapsed > effective_cooldown {
                ctx.kernel.set_target_khz(target);
                state.last_change_ms = Some(now);
                if entering_idle {
                    if !state.idle {
                        state.idle_switch_count += 1;
                    }
                    state.idle = true;
                }
                if leaving_idle {
                    state.idle = false;
                }
                changed = true;
            }
        }
    }

    match (changed, converge_to_target(ctx)) {
        (true, RampOutcome::Advanced(khz)) => GovernorAction::RampApplied(khz),
        (true, RampOutcome::Deferred) => GovernorAction::RampDeferred,
        (true, RampOutcome::PllEdge) => GovernorAction::PllEdge,
        (false, RampOutcome::Advanced(khz)) => GovernorAction::Converged(khz),
        (false, RampOutcome::PllEdge) => GovernorAction::PllEdge,
        _ => GovernorAction::NoAction,
    }
}

pub fn export_stats(state: &GovernorState, w: &mut dyn Write) {
    if let GovernorState::Rp2040Perf(s) = state {
        let _ = write!(
            w,
            "rp2040_perf: idle={} idle_switches={} cooldown={}ms/{}ms",
            s.idle, s.idle_switch_count, s.params.ramp_up_cooldown_ms, s.params.cooldown_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::NullLogSink;
    use crate::governor::{GovernorCtx, RampOutcome, TemperatureSensor};
    use crate::kernel_state::KernelState;

    struct ClockAt(core::cell::Cell<u32>);
    impl crate::collab::MonotonicClock for ClockAt {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }
    }
    struct TempAt(i32);
    impl TemperatureSensor for TempAt {
        fn read_temp_c(&self) -> i32 {
            self.0
        }
    }

    fn noop_ctx<'a>(
        kernel: &'a KernelState,
        clock: &'a ClockAt,
        temp: &'a TempAt,
        log: &'a NullLogSink,
        ramp_step: &'a mut dyn FnMut(u32) -> RampOutcome,
        notify: &'a mut dyn FnMut(u32),
        safe: &'a dyn Fn(f32, f32, u8) -> bool,
    ) -> GovernorCtx<'a> {
        GovernorCtx { kernel, clock, log, temp, ramp_step, notify_freq_change: notify, safe_to_scale: safe }
    }

    #[test]
    fn params_byte_round_trip() {
        let p = Params::DEFAULT;
        let bytes = p.to_bytes();
        assert_eq!(Params::from_bytes(&bytes), Some(p));
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert_eq!(Params::from_bytes(&[0u8; 4]), None);
    }

    #[test]
    fn get_set_round_trip_by_name() {
        let mut p = Params::DEFAULT;
        assert_eq!(p.get("thr_high"), Some(80));
        assert!(p.set("thr_high", 85));
        assert_eq!(p.get("thr_high"), Some(85));
        assert!(!p.set("no_such_param", 1));
    }

    #[test]
    fn scenario_thermal_backoff_then_restore() {
        let kernel = KernelState::new(264_000, 1300);
        kernel.set_target_khz(264_000);
        let clock = ClockAt(core::cell::Cell::new(10_000));
        let log = NullLogSink;
        let mut ramp_step = |khz: u32| {
            kernel.set_current_khz(khz);
            RampOutcome::Advanced(khz)
        };
        let mut notify = |_khz: u32| {};
        let safe = |_: f32, _: f32, _: u8| true;
        let mut state = GovernorState::Rp2040Perf(State::new());

        let hot = TempAt(75);
        {
            let mut ctx = noop_ctx(&kernel, &clock, &hot, &log, &mut ramp_step, &mut notify, &safe);
            tick(&mut state, &mut ctx, MetricsAggregate::default());
        }
        assert_eq!(kernel.target_khz(), 200_000);

        clock.0.set(20_000);
        let cool = TempAt(60);
        {
            let mut ctx = noop_ctx(&kernel, &clock, &cool, &log, &mut ramp_step, &mut notify, &safe);
            tick(&mut state, &mut ctx, MetricsAggregate::default());
        }
        assert_eq!(kernel.target_khz(), MAX_KHZ);
    }

    #[test]
    fn scenario_idle_timeout_marks_idle_switch() {
        let kernel = KernelState::new(MAX_KHZ, 1300);
        kernel.set_target_khz(MAX_KHZ);
        let clock = ClockAt(core::cell::Cell::new(0));
        let temp = TempAt(40);
        let log = NullLogSink;
        let mut ramp_step = |khz: u32| {
            kernel.set_current_khz(khz);
            RampOutcome::Advanced(khz)
        };
        let mut notify = |_khz: u32| {};
        let safe = |_: f32, _: f32, _: u8| true;
        let mut state = GovernorState::Rp2040Perf(State::new());

        clock.0.set(6_000);
        let mut ctx = noop_ctx(&kernel, &clock, &temp, &log, &mut ramp_step, &mut notify, &safe);
        let action = tick(&mut state, &mut ctx, MetricsAggregate::default());
        assert_eq!(kernel.target_khz(), Params::DEFAULT.idle_target_khz);
        assert!(matches!(action, GovernorAction::RampApplied(_)));
        if let GovernorState::Rp2040Perf(s) = &state {
            assert_eq!(s.idle_switch_count, 1);
        }
    }
}
