//! `ondemand` governor: uses die
//! temperature as a proxy for activity (this board exposes no other cheap
//! load signal to this governor) and ramps up/down with an asymmetric,
//! idle-backoff cooldown, a longer cooldown on the way down than on the
//! way up, mirroring the asymmetry `rp2040_perf` applies between
//! `ramp_up_cooldown_ms` and `cooldown_ms`.

use core::fmt::Write;

use super::{converge_to_target, GovernorAction, GovernorCtx, GovernorState, RampOutcome};
use crate::metrics::MetricsAggregate;
use crate::{MAX_KHZ, MIN_KHZ};

/// Private state for the `ondemand` governor.
#[derive(Debug, Clone, Copy)]
pub struct State {
    temp_hot_c: i32,
    temp_cold_c: i32,
    cooldown_ms: u32,
    idle_backoff_cooldown_ms: u32,
    last_change_ms: Option<u32>,
}

impl State {
    /// Fresh state with the governor's built-in defaults.
    pub const fn new() -> Self {
        State {
            temp_hot_c: 65,
            temp_cold_c: 45,
            cooldown_ms: 1_000,
            idle_backoff_cooldown_ms: 3_000,
            last_change_ms: None,
        }
    }
}

pub fn init(state: &mut GovernorState) {
    if let GovernorState::Ondemand(s) = state {
        s.last_change_ms = None;
    }
}

pub fn tick(gstate: &mut GovernorState, ctx: &mut GovernorCtx, _agg: MetricsAggregate) -> GovernorAction {
    let GovernorState::Ondemand(state) = gstate else {
        return GovernorAction::NoAction;
    };
    let now = ctx.clock.now_ms();
    let current_target = ctx.kernel.target_khz();
    let temp = ctx.temp.read_temp_c();

    let candidate = if temp > state.temp_hot_c && current_target < MAX_KHZ {
        Some(MAX_KHZ)
    } else if temp < state.temp_cold_c && current_target > MIN_KHZ {
        Some(MIN_KHZ)
    } else {
        None
    };

    let mut changed = false;
    if let Some(target) = candidate {
        let stepping_up = target > current_target;
        let effective_cooldown = if stepping_up { state.cooldown_ms } else { state.idle_backoff_cooldown_ms };
        let elapsed = state.last_change_ms.map_or(u32::MAX, |t| now.saturating_sub(t));
        if elapsed > effective_cooldown {
            ctx.kernel.set_target_khz(target);
            state.last_change_ms = Some(now);
            changed = true;
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
    if let GovernorState::Ondemand(s) = state {
        let _ = write!(
            w,
            "ondemand: hot>{}C cold<{}C cooldown={}ms/{}ms",
            s.temp_hot_c, s.temp_cold_c, s.cooldown_ms, s.idle_backoff_cooldown_ms
        );
    }
}
