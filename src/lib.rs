//! Control kernel for adaptive CPU frequency scaling on a dual-core RP2040.
//!
//! This crate implements the hard core of the system: the clock/voltage
//! ramp engine, the PIO-based stability arbiter, the metrics aggregator, the
//! governor framework and the dual-core runtime discipline that ties them
//! together. The interactive shell parser, benchmark workloads, MMIO
//! peek/poke UI, ring-buffer log storage, UART DMA transport, flash block
//! device and boot/USB init are external collaborators; this crate only
//! consumes their contracts (see [`collab`]).
#![cfg_attr(not(test), no_std)]

pub mod clocks;
pub mod collab;
pub mod error;
pub mod governor;
pub mod kernel_state;
pub mod metrics;
pub mod persist;
pub mod pio;
pub mod runtime;
pub mod shell;

#[cfg(feature = "hardware")]
pub mod hw;

pub use error::{PersistError, PioError, RampError, ShellError};
pub use kernel_state::KernelState;

/// Lower bound of the system clock, in kilohertz.
pub const MIN_KHZ: u32 = 125_000;
/// Upper bound of the system clock, in kilohertz.
///
/// 265 MHz has no valid `(fbdiv, pd1, pd2)` solution against the 12 MHz
/// crystal, so 264 MHz is the ceiling instead.
pub const MAX_KHZ: u32 = 264_000;
/// Maximum step, in kilohertz, a single [`clocks::ramp::ramp_step`] call may move.
pub const RAMP_STEP_KHZ: u32 = 5_000;
