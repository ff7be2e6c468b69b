//! `performance` governor: always targets
//! [`crate::MAX_KHZ`], subject to the same stability gate every governor
//! shares via [`super::converge_to_target`]. No parameters, no persisted
//! state: the simplest possible [`super::GovernorRecord`].

use core::fmt::Write;

use super::{converge_to_target, GovernorAction, GovernorCtx, GovernorState, RampOutcome};
use crate::MAX_KHZ;

/// `performance` carries no private state; `GovernorState::Performance` has
/// no associated data.
pub fn init(_state: &mut GovernorState) {}

/// Pin `target_khz` at `MAX_KHZ` and let the shared convergence step do the
/// rest.
pub fn tick(state: &mut GovernorState, ctx: &mut GovernorCtx, _agg: crate::metrics::MetricsAggregate) -> GovernorAction {
    if !matches!(state, GovernorState::Performance) {
        return GovernorAction::NoAction;
    }
    let changed = ctx.kernel.target_khz() != MAX_KHZ;
    if changed {
        ctx.kernel.set_target_khz(MAX_KHZ);
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

/// `gov status` output for this governor.
pub fn export_stats(_state: &GovernorState, w: &mut dyn Write) {
    let _ = write!(w, "performance: target pinned to {MAX_KHZ} kHz");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::NullLogSink;
    use crate::governor::{GovernorCtx, RampOutcome};
    use crate::kernel_state::KernelState;
    use crate::metrics::MetricsAggregate;

    struct FixedClock;
    impl crate::collab::MonotonicClock for FixedClock {
        fn now_ms(&self) -> u32 {
            0
        }
    }
    struct FixedTemp;
    impl super::super::TemperatureSensor for FixedTemp {
        fn read_temp_c(&self) -> i32 {
            40
        }
    }

    #[test]
    fn always_targets_max() {
        let kernel = KernelState::new(125_000, 1100);
        let clock = FixedClock;
        let temp = FixedTemp;
        let log = NullLogSink;
        let mut ramp_step = |_khz: u32| RampOutcome::AlreadyAtTarget;
        let mut notify = |_khz: u32| {};
        let safe = |_: f32, _: f32, _: u8| true;
        let mut ctx = GovernorCtx {
            kernel: &kernel,
            clock: &clock,
            log: &log,
            temp: &temp,
            ramp_step: &mut ramp_step,
            notify_freq_change: &mut notify,
            safe_to_scale: &safe,
        };
        let mut state = GovernorState::Performance;
        tick(&mut state, &mut ctx, MetricsAggregate::default());
        assert_eq!(kernel.target_khz(), MAX_KHZ);
    }
}
