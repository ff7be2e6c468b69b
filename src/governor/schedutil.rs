//! `schedutil` governor: maps the current
//! aggregate's `avg_intensity` linearly onto `[MIN_KHZ, MAX_KHZ]`, with a
//! ±5% hysteresis band around the current target so that small intensity
//! jitter doesn't thrash the ramp engine every tick.

use core::fmt::Write;

use super::{converge_to_target, GovernorAction, GovernorCtx, GovernorState, RampOutcome};
use crate::metrics::MetricsAggregate;
use crate::{MAX_KHZ, MIN_KHZ};

/// Hysteresis band, as a fraction of the full `[MIN_KHZ, MAX_KHZ]` span.
const HYSTERESIS_FRACTION: u32 = 5; // percent

/// Private state for the `schedutil` governor.
#[derive(Debug, Clone, Copy)]
pub struct State {
    last_intensity: u32,
}

impl State {
    /// Fresh state; starts as if the last observed intensity were zero.
    pub const fn new() -> Self {
        State { last_intensity: 0 }
    }
}

pub fn init(state: &mut GovernorState) {
    if let GovernorState::Schedutil(s) = state {
        s.last_intensity = 0;
    }
}

/// Linear map of `intensity` (`0..=100`) onto `[MIN_KHZ, MAX_KHZ]`.
fn khz_for_intensity(intensity: u32) -> u32 {
    let intensity = intensity.min(100);
    let span = MAX_KHZ - MIN_KHZ;
    MIN_KHZ + (span as u64 * intensity as u64 / 100) as u32
}

pub fn tick(gstate: &mut GovernorState, ctx: &mut GovernorCtx, agg: MetricsAggregate) -> GovernorAction {
    let GovernorState::Schedutil(state) = gstate else {
        return GovernorAction::NoAction;
    };

    let mut changed = false;
    if agg.count > 0 {
        let candidate_khz = khz_for_intensity(agg.avg_intensity);
        let current_target = ctx.kernel.target_khz();
        let span = (MAX_KHZ - MIN_KHZ) as u64;
        let band = (span * HYSTERESIS_FRACTION as u64 / 100) as u32;
        let outside_band = candidate_khz.abs_diff(current_target) > band;
        if outside_band {
            ctx.kernel.set_target_khz(candidate_khz);
            changed = true;
        }
        state.last_intensity = agg.avg_intensity;
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
    if let GovernorState::Schedutil(s) = state {
        let _ = write!(w, "schedutil: last_intensity={}%", s.last_intensity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_maps_linearly_onto_frequency_band() {
        assert_eq!(khz_for_intensity(0), MIN_KHZ);
        assert_eq!(khz_for_intensity(100), MAX_KHZ);
        let mid = khz_for_intensity(50);
        assert!(mid > MIN_KHZ && mid < MAX_KHZ);
    }

    #[test]
    fn small_intensity_changes_stay_within_hysteresis_band() {
        let a = khz_for_intensity(50);
        let b = khz_for_intensity(51);
        // A single percentage point of intensity must not cross the 5% band
        // on its own, otherwise every tick would thrash the ramp engine.
        let span = (MAX_KHZ - MIN_KHZ) as u64;
        let band = (span * HYSTERESIS_FRACTION as u64 / 100) as u32;
        assert!(a.abs_diff(b) <= band);
    }
}
