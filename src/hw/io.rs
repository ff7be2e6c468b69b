//! Small single-peripheral collaborator implementations: the monotonic
//! clock, the heartbeat/IDLE GPIO pair, the UART log sink, raw MMIO
//! peek/poke, system-control (reboot/BOOTSEL) and the on-die temperature
//! sensor.
//!
//! Each of these follows the habit of giving every peripheral its
//! own thin newtype wrapper (`Rcc`, `Delay`, …) rather than one grab-bag
//! "board support" struct.

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::SYST;
use rp2040_hal::adc::Adc;
use rp2040_hal::gpio::{FunctionSioOutput, Pin, PinId, PullDown};

use crate::collab::{LogLevel, LogSink, MmioAccess, MonotonicClock, SystemControl, MMIO_WINDOW};
use crate::governor::TemperatureSensor;
use crate::runtime::HeartbeatIo;

/// Millisecond counter driven off the RP2040's always-on `TIMER` peripheral
/// (64-bit microsecond counter, truncated to milliseconds here since no
/// governor decision needs sub-millisecond resolution).
pub struct SystemClock {
    timer: rp2040_hal::Timer,
}

impl SystemClock {
    pub fn new(timer: rp2040_hal::Timer) -> Self {
        SystemClock { timer }
    }
}

impl MonotonicClock for SystemClock {
    fn now_ms(&self) -> u32 {
        (self.timer.get_counter().ticks() / 1_000) as u32
    }
}

/// Drives the IDLE and HB GPIO pins core 0's loop toggles every iteration
///. `SYST`-based busy-wait gives the heartbeat pulse
/// its minimum width without pulling in a second timer peripheral.
pub struct Rp2040HeartbeatIo<I: PinId, H: PinId> {
    idle_pin: Pin<I, FunctionSioOutput, PullDown>,
    hb_pin: Pin<H, FunctionSioOutput, PullDown>,
    syst: SYST,
}

impl<I: PinId, H: PinId> Rp2040HeartbeatIo<I, H> {
    pub fn new(
        idle_pin: Pin<I, FunctionSioOutput, PullDown>,
        hb_pin: Pin<H, FunctionSioOutput, PullDown>,
        syst: SYST,
    ) -> Self {
        Rp2040HeartbeatIo { idle_pin, hb_pin, syst }
    }
}

impl<I: PinId, H: PinId> HeartbeatIo for Rp2040HeartbeatIo<I, H> {
    fn idle_high(&mut self) {
        let _ = self.idle_pin.set_high();
    }

    fn idle_low(&mut self) {
        let _ = self.idle_pin.set_low();
    }

    fn heartbeat_pulse(&mut self) {
        let _ = self.hb_pin.set_high();
        // >= 8 PIO cycles wide at the nominal PIO clock; a
        // short busy-wait is simplest since this runs once per core-0
        // iteration, not on a hot path.
        cortex_m::asm::delay(64);
        let _ = self.hb_pin.set_low();
    }
}

/// Mirrors log lines to the USB/UART serial console via `defmt`, which is
/// best-effort and never blocks: its RTT transport already drops data
/// rather than block when its buffer is full.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rp2040LogSink;

impl LogSink for Rp2040LogSink {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Critical => defmt::error!("{=str}", msg),
            LogLevel::Warn => defmt::warn!("{=str}", msg),
            LogLevel::Info => defmt::info!("{=str}", msg),
        }
    }
}

/// Raw MMIO peek/poke over the validated address window. The
/// address has already been checked against [`MMIO_WINDOW`] and 4-byte
/// alignment by the shell handler; this type only performs the volatile
/// access itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rp2040MmioAccess;

impl MmioAccess for Rp2040MmioAccess {
    fn peek(&self, addr: u32) -> u32 {
        debug_assert!(MMIO_WINDOW.contains(&addr) && addr % 4 == 0);
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    fn poke(&mut self, addr: u32, value: u32) {
        debug_assert!(MMIO_WINDOW.contains(&addr) && addr % 4 == 0);
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) };
    }
}

/// Requests a watchdog reboot or a BOOTSEL re-enumeration. Both paths never return on real hardware.
pub struct Rp2040SystemControl {
    watchdog: rp2040_hal::Watchdog,
}

impl Rp2040SystemControl {
    pub fn new(watchdog: rp2040_hal::Watchdog) -> Self {
        Rp2040SystemControl { watchdog }
    }
}

impl SystemControl for Rp2040SystemControl {
    fn request_reboot(&mut self) {
        self.watchdog.start(fugit::MillisDurationU32::from_ticks(1));
        loop {
            cortex_m::asm::wfi();
        }
    }

    fn request_bootsel(&mut self) {
        rp2040_hal::rom_data::reset_to_usb_boot(0, 0);
    }
}

/// Reads the RP2040's on-die temperature sensor off the built-in ADC
/// channel, converting the raw 12-bit sample per the datasheet's
/// `27 - (V - 0.706) / 0.001721` formula.
pub struct Rp2040TemperatureSensor {
    last_milli_c: AtomicU32,
}

impl Rp2040TemperatureSensor {
    pub fn new() -> Self {
        Rp2040TemperatureSensor { last_milli_c: AtomicU32::new(25_000) }
    }

    /// Called from the core-1 governor loop with a fresh ADC sample; stores
    /// the converted temperature for [`TemperatureSensor::read_temp_c`] to
    /// read back without re-sampling the ADC from an arbitrary call site.
    pub fn update(&self, adc: &mut Adc, channel: &mut rp2040_hal::adc::TempSense) {
        let raw: u16 = adc.read(channel).unwrap_or(0);
        let volts = (raw as f32) * 3.3 / 4096.0;
        let celsius = 27.0 - (volts - 0.706) / 0.001721;
        self.last_milli_c.store((celsius * 1000.0) as u32, Ordering::Relaxed);
    }
}

impl Default for Rp2040TemperatureSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureSensor for Rp2040TemperatureSensor {
    fn read_temp_c(&self) -> i32 {
        (self.last_milli_c.load(Ordering::Relaxed) / 1000) as i32
    }
}
