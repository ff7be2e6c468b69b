//! Clock/Voltage Ramp Engine.
//!
//! Three layers, cleanest-first: [`pll`] is pure divisor math, [`voltage`]
//! is the pure voltage/frequency interlock table, and [`ramp`] is the
//! stateful engine that drives both through the [`ramp::SysClockDriver`]
//! hardware trait.

pub mod pll;
pub mod ramp;
pub mod voltage;

pub use pll::{find_achievable_khz, pll_divisors_for, PROBE_RADIUS_KHZ};
pub use ramp::{ramp_step, ramp_to, SysClockDriver, HIGH_BAND_OVERDRIVE, RAMP_STEP_DELAY_MS};
pub use voltage::{millivolts, vreg_for};
