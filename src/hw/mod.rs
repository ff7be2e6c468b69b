//! On-target peripheral glue, behind the `hardware` Cargo feature.
//!
//! Every type in this module implements one of the narrow traits named in
//! [`crate::collab`]/[`crate::clocks::ramp`]/[`crate::pio`]/[`crate::governor`]
//! so that `src/bin/firmware.rs` can wire the pure kernel core to real
//! `rp2040-hal` peripherals without the core itself ever depending on a PAC
//! type. This is the intrinsically platform-specific layer: the PIO
//! programs, the PLL divisor programming sequence, and the flash sector
//! driver.

pub mod clock;
pub mod flash;
pub mod io;
pub mod pio_driver;

pub use clock::Rp2040ClockDriver;
pub use flash::FlashPersistenceStore;
pub use io::{Rp2040HeartbeatIo, Rp2040LogSink, Rp2040MmioAccess, Rp2040SystemControl, Rp2040TemperatureSensor, SystemClock};
pub use pio_driver::Rp2040PioArbiter;
