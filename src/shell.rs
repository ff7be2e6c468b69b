//! Shell command handlers.
//!
//! The line-oriented parser and the serial I/O loop are an external
//! collaborator; this module supplies the command *handlers* it calls
//! into, which is also the most direct way to exercise this crate's
//! public API end to end. [`ShellContext`] bundles references to every
//! module the commands touch, the same narrow-facade shape as
//! [`crate::governor::GovernorCtx`].

use core::fmt::Write;

use crate::collab::{BenchRunner, LogRing, MmioAccess, MonotonicClock, PersistSlot, PersistenceStore, SystemControl, MMIO_WINDOW};
use crate::error::ShellError;
use crate::governor::{GovernorRegistry, TemperatureSensor};
use crate::kernel_state::KernelState;
use crate::metrics::SharedMetricsRing;
use crate::pio::SharedPioStats;

/// Everything a shell command handler needs. One instance is built per
/// command invocation by the (external) serial driver loop.
pub struct ShellContext<'a> {
    pub kernel: &'a KernelState,
    pub governors: &'a mut GovernorRegistry,
    pub metrics: &'a SharedMetricsRing,
    pub pio: &'a SharedPioStats,
    pub store: &'a mut dyn PersistenceStore,
    pub clock: &'a dyn MonotonicClock,
    pub temp: &'a dyn TemperatureSensor,
    pub mmio: &'a mut dyn MmioAccess,
    pub log_ring: &'a mut dyn LogRing,
    pub sysctl: &'a mut dyn SystemControl,
    pub bench: &'a mut dyn BenchRunner,
}

fn parse_u32_dec(s: &str) -> Result<u32, ShellError> {
    s.parse::<u32>().map_err(|_| ShellError::OutOfRange)
}

fn parse_u32_hex(s: &str) -> Result<u32, ShellError> {
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u32::from_str_radix(s, 16).map_err(|_| ShellError::OutOfRange)
}

impl<'a> ShellContext<'a> {
    /// Dispatch one already-trimmed command line. Writes human-readable
    /// output to `out`; returns `Err` for domain violations (bad
    /// arguments, unknown governor, out-of-window MMIO address) without
    /// mutating any state.
    pub fn handle_line(&mut self, line: &str, out: &mut dyn Write) -> Result<(), ShellError> {
        let mut tokens = line.split_whitespace();
        let Some(cmd) = tokens.next() else { return Ok(()) };
        let rest: heapless::Vec<&str, 8> = tokens.collect();
        match cmd {
            "set" => self.cmd_set(&rest),
            "gov" => self.cmd_gov(&rest, out),
            "pio" => self.cmd_pio(&rest, out),
            "bench" => self.cmd_bench(&rest),
            "stats" => self.cmd_stats(out),
            "temp" => self.cmd_temp(out),
            "clocks" => self.cmd_clocks(out),
            "uptime" => self.cmd_uptime(out),
            "metrics" => self.cmd_metrics(out),
            "persist" => self.cmd_persist(out),
            "flash" => self.cmd_flash(out),
            "peek" => self.cmd_peek(&rest, out),
            "poke" => self.cmd_poke(&rest),
            "dmesg" => self.cmd_dmesg(&rest, out),
            "reboot" => {
                self.sysctl.request_reboot();
                Ok(())
            }
            "bootsel" => {
                self.sysctl.request_bootsel();
                Ok(())
            }
            "clear" => {
                let _ = out.write_str("\x1b[2J\x1b[H");
                Ok(())
            }
            "help" => {
                let _ = out.write_str(
                    "commands: set gov pio bench stats temp clocks uptime metrics persist flash peek poke dmesg reboot bootsel clear help",
                );
                Ok(())
            }
            _ => Err(ShellError::UnknownCommand),
        }
    }

    fn cmd_set(&mut self, args: &[&str]) -> Result<(), ShellError> {
        let mhz_str = args.first().ok_or(ShellError::MissingArgument)?;
        let mhz = parse_u32_dec(mhz_str)?;
        if !(125..=264).contains(&mhz) {
            return Err(ShellError::OutOfRange);
        }
        self.kernel.set_target_khz(mhz * 1000);
        Ok(())
    }

    fn cmd_gov(&mut self, args: &[&str], out: &mut dyn Write) -> Result<(), ShellError> {
        match args.first().copied() {
            Some("list") => {
                for name in self.governors.list() {
                    let _ = writeln!(out, "{name}");
                }
                Ok(())
            }
            Some("status") => {
                let current = self.governors.current_name().unwrap_or("<none>");
                let _ = writeln!(out, "current: {current}");
                self.governors.export_current_stats(out);
                Ok(())
            }
            Some("set") => {
                let name = args.get(1).ok_or(ShellError::MissingArgument)?;
                if self.governors.set_current(name, self.store) {
                    Ok(())
                } else {
                    Err(ShellError::UnknownGovernor)
                }
            }
            Some("tune") => self.cmd_gov_tune(&args[1..], out),
            _ => Err(ShellError::UnknownCommand),
        }
    }

    fn cmd_gov_tune(&mut self, args: &[&str], out: &mut dyn Write) -> Result<(), ShellError> {
        let gov_name = args.first().ok_or(ShellError::MissingArgument)?;
        if *gov_name != "rp2040_perf" {
            return Err(ShellError::UnknownGovernor);
        }
        let Some(state) = self.governors.rp2040_perf_state_mut() else {
            return Err(ShellError::UnknownGovernor);
        };
        match args.get(1).copied() {
            Some("show") | Some("list") => {
                for name in crate::governor::rp2040_perf::Params::NAMES {
                    let value = state.params.get(name).unwrap_or(0);
                    let _ = writeln!(out, "{name} = {value}");
                }
                Ok(())
            }
            Some("get") => {
                let param = args.get(2).ok_or(ShellError::MissingArgument)?;
                let value = state.params.get(param).ok_or(ShellError::UnknownParameter)?;
                let _ = writeln!(out, "{value}");
                Ok(())
            }
            Some("set") => {
                let param = args.get(2).ok_or(ShellError::MissingArgument)?;
                let value_str = args.get(3).ok_or(ShellError::MissingArgument)?;
                let value: i64 = value_str.parse().map_err(|_| ShellError::OutOfRange)?;
                if !state.params.set(param, value) {
                    return Err(ShellError::UnknownParameter);
                }
                let bytes = state.params.to_bytes();
                let mut blob = [0u8; crate::governor::rp2040_perf::PARAMS_LEN + 8 + 4];
                if let Ok(len) = crate::persist::encode_params_blob(&bytes, &mut blob) {
                    let _ = self.store.save(PersistSlot::GovernorParams, &blob[..len]);
                }
                Ok(())
            }
            _ => Err(ShellError::UnknownCommand),
        }
    }

    fn cmd_pio(&mut self, args: &[&str], out: &mut dyn Write) -> Result<(), ShellError> {
        match args.first().copied() {
            None => {
                let stats = self.pio.get();
                let _ = writeln!(
                    out,
                    "idle={:.3} hb_period={} jitter_pct={:.2} stable_count={} safe={}",
                    stats.idle_fraction, stats.hb_period_ticks, stats.hb_jitter_pct, stats.stable_count, stats.safe_to_scale
                );
                Ok(())
            }
            Some("safe") => {
                let safe = self.pio.safe_to_scale(
                    crate::pio::stats::DEFAULT_IDLE_THRESH,
                    crate::pio::stats::DEFAULT_JITTER_THRESH_PCT,
                    crate::pio::stats::DEFAULT_MIN_STABLE,
                );
                let _ = writeln!(out, "{safe}");
                Ok(())
            }
            Some("reset") => {
                self.pio.notify_freq_change(self.kernel.current_khz());
                Ok(())
            }
            Some("watch") => {
                // `pio watch [ms [n]]` simulates a frequency change for
                // introspection purposes: it is equivalent to
                // `pio reset` parameterized by the frequency the caller is
                // about to simulate. The actual periodic re-polling loop is
                // the external serial driver's job; this handler only
                // triggers the one state transition it can't reach
                // otherwise.
                self.pio.notify_freq_change(self.kernel.current_khz());
                Ok(())
            }
            _ => Err(ShellError::UnknownCommand),
        }
    }

    fn cmd_bench(&mut self, args: &[&str]) -> Result<(), ShellError> {
        match args.first().copied() {
            Some("suite") => {
                let ms_str = args.get(1).ok_or(ShellError::MissingArgument)?;
                let ms = parse_u32_dec(ms_str)?;
                let csv = args.get(2).copied() == Some("csv");
                self.bench.run_suite(ms, csv);
                Ok(())
            }
            Some(target) => {
                let ms_str = args.get(1).ok_or(ShellError::MissingArgument)?;
                let ms = parse_u32_dec(ms_str)?;
                self.bench.run(target, ms);
                Ok(())
            }
            None => Err(ShellError::MissingArgument),
        }
    }

    fn cmd_stats(&mut self, out: &mut dyn Write) -> Result<(), ShellError> {
        let enabled = self.kernel.toggle_live_stats();
        let _ = writeln!(out, "live stats: {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    fn cmd_temp(&mut self, out: &mut dyn Write) -> Result<(), ShellError> {
        let _ = writeln!(out, "{} C", self.temp.read_temp_c());
        Ok(())
    }

    fn cmd_clocks(&mut self, out: &mut dyn Write) -> Result<(), ShellError> {
        let _ = writeln!(
            out,
            "current={}kHz target={}kHz vreg={}mV throttle={}",
            self.kernel.current_khz(),
            self.kernel.target_khz(),
            self.kernel.current_voltage_mv(),
            self.kernel.throttle_active()
        );
        Ok(())
    }

    fn cmd_uptime(&mut self, out: &mut dyn Write) -> Result<(), ShellError> {
        let _ = writeln!(out, "{} ms", self.clock.now_ms());
        Ok(())
    }

    fn cmd_metrics(&mut self, out: &mut dyn Write) -> Result<(), ShellError> {
        let agg = self.metrics.get_aggregate(false);
        let _ = writeln!(
            out,
            "count={} avg_workload={} avg_intensity={} avg_duration_ms={}",
            agg.count, agg.avg_workload, agg.avg_intensity, agg.avg_duration_ms
        );
        Ok(())
    }

    fn cmd_persist(&mut self, out: &mut dyn Write) -> Result<(), ShellError> {
        let name = self.governors.current_name().unwrap_or("<none>");
        let _ = writeln!(out, "governor: {name}");
        Ok(())
    }

    fn cmd_flash(&mut self, out: &mut dyn Write) -> Result<(), ShellError> {
        let _ = writeln!(out, "persistent sector size: {} bytes", crate::persist::SECTOR_LEN);
        Ok(())
    }

    fn cmd_peek(&mut self, args: &[&str], out: &mut dyn Write) -> Result<(), ShellError> {
        let addr = validate_mmio_addr(args.first().ok_or(ShellError::MissingArgument)?)?;
        let value = self.mmio.peek(addr);
        let _ = writeln!(out, "0x{value:08x}");
        Ok(())
    }

    fn cmd_poke(&mut self, args: &[&str]) -> Result<(), ShellError> {
        let addr = validate_mmio_addr(args.first().ok_or(ShellError::MissingArgument)?)?;
        let value_str = args.get(1).ok_or(ShellError::MissingArgument)?;
        let value = parse_u32_hex(value_str)?;
        self.mmio.poke(addr, value);
        Ok(())
    }

    fn cmd_dmesg(&mut self, args: &[&str], out: &mut dyn Write) -> Result<(), ShellError> {
        match args.first().copied() {
            None => {
                self.log_ring.dump(out);
                Ok(())
            }
            Some("uart") => {
                let on = match args.get(1).copied() {
                    Some("on") => true,
                    Some("off") => false,
                    _ => return Err(ShellError::MissingArgument),
                };
                self.log_ring.set_uart_sink(on);
                Ok(())
            }
            _ => Err(ShellError::UnknownCommand),
        }
    }
}

/// Validate a `peek`/`poke` address string: must parse as hex, lie within
/// [`MMIO_WINDOW`], and be 4-byte aligned.
fn validate_mmio_addr(s: &str) -> Result<u32, ShellError> {
    let addr = parse_u32_hex(s)?;
    if !MMIO_WINDOW.contains(&addr) || addr % 4 != 0 {
        return Err(ShellError::BadAddress);
    }
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::PersistSlot;
    use crate::governor::TemperatureSensor;
    use heapless::FnvIndexMap;

    struct FixedClock;
    impl MonotonicClock for FixedClock {
        fn now_ms(&self) -> u32 {
            42_000
        }
    }
    struct FixedTemp;
    impl TemperatureSensor for FixedTemp {
        fn read_temp_c(&self) -> i32 {
            55
        }
    }
    struct MockMmio {
        last_poke: Option<(u32, u32)>,
    }
    impl MmioAccess for MockMmio {
        fn peek(&self, addr: u32) -> u32 {
            addr
        }
        fn poke(&mut self, addr: u32, value: u32) {
            self.last_poke = Some((addr, value));
        }
    }
    struct MockLogRing {
        uart_on: bool,
    }
    impl LogRing for MockLogRing {
        fn dump(&self, out: &mut dyn Write) {
            let _ = out.write_str("(empty)");
        }
        fn set_uart_sink(&mut self, enabled: bool) {
            self.uart_on = enabled;
        }
    }
    struct MockSysControl {
        rebooted: bool,
        bootsel: bool,
    }
    impl SystemControl for MockSysControl {
        fn request_reboot(&mut self) {
            self.rebooted = true;
        }
        fn request_bootsel(&mut self) {
            self.bootsel = true;
        }
    }
    struct MockBench {
        last_run: Option<(heapless::String<16>, u32)>,
    }
    impl BenchRunner for MockBench {
        fn run(&mut self, target: &str, duration_ms: u32) -> bool {
            self.last_run = Some((heapless::String::try_from(target).unwrap(), duration_ms));
            true
        }
        fn run_suite(&mut self, _duration_ms: u32, _csv: bool) -> bool {
            true
        }
    }
    struct MockStore {
        records: FnvIndexMap<u8, heapless::Vec<u8, 128>, 4>,
    }
    impl MockStore {
        fn new() -> Self {
            MockStore { records: FnvIndexMap::new() }
        }
        fn key(slot: PersistSlot) -> u8 {
            match slot {
                PersistSlot::GovernorName => 0,
                PersistSlot::GovernorParams => 1,
            }
        }
    }
    impl PersistenceStore for MockStore {
        fn load(&self, slot: PersistSlot, out: &mut [u8]) -> Option<usize> {
            let bytes = self.records.get(&Self::key(slot))?;
            out[..bytes.len()].copy_from_slice(bytes);
            Some(bytes.len())
        }
        fn save(&mut self, slot: PersistSlot, bytes: &[u8]) -> Result<(), crate::PersistError> {
            let _ = self.records.insert(Self::key(slot), heapless::Vec::from_slice(bytes).unwrap());
            Ok(())
        }
    }

    fn build_ctx<'a>(
        kernel: &'a KernelState,
        governors: &'a mut GovernorRegistry,
        metrics: &'a SharedMetricsRing,
        pio: &'a SharedPioStats,
        store: &'a mut MockStore,
        clock: &'a FixedClock,
        temp: &'a FixedTemp,
        mmio: &'a mut MockMmio,
        log_ring: &'a mut MockLogRing,
        sysctl: &'a mut MockSysControl,
        bench: &'a mut MockBench,
    ) -> ShellContext<'a> {
        ShellContext { kernel, governors, metrics, pio, store, clock, temp, mmio, log_ring, sysctl, bench }
    }

    #[test]
    fn set_writes_target_in_khz() {
        let kernel = KernelState::new(125_000, 1100);
        let mut governors = GovernorRegistry::default();
        let mut store = MockStore::new();
        governors.init(&store);
        let metrics = SharedMetricsRing::default();
        let pio = SharedPioStats::default();
        let clock = FixedClock;
        let temp = FixedTemp;
        let mut mmio = MockMmio { last_poke: None };
        let mut log_ring = MockLogRing { uart_on: false };
        let mut sysctl = MockSysControl { rebooted: false, bootsel: false };
        let mut bench = MockBench { last_run: None };
        let mut ctx = build_ctx(
            &kernel, &mut governors, &metrics, &pio, &mut store, &clock, &temp, &mut mmio, &mut log_ring, &mut sysctl,
            &mut bench,
        );
        let mut out = heapless::String::<64>::new();
        ctx.handle_line("set 200", &mut out).unwrap();
        assert_eq!(kernel.target_khz(), 200_000);
    }

    #[test]
    fn set_rejects_out_of_range() {
        let kernel = KernelState::new(125_000, 1100);
        let mut governors = GovernorRegistry::default();
        let mut store = MockStore::new();
        governors.init(&store);
        let metrics = SharedMetricsRing::default();
        let pio = SharedPioStats::default();
        let clock = FixedClock;
        let temp = FixedTemp;
        let mut mmio = MockMmio { last_poke: None };
        let mut log_ring = MockLogRing { uart_on: false };
        let mut sysctl = MockSysControl { rebooted: false, bootsel: false };
        let mut bench = MockBench { last_run: None };
        let mut ctx = build_ctx(
            &kernel, &mut governors, &metrics, &pio, &mut store, &clock, &temp, &mut mmio, &mut log_ring, &mut sysctl,
            &mut bench,
        );
        let mut out = heapless::String::<64>::new();
        assert_eq!(ctx.handle_line("set 1000", &mut out), Err(ShellError::OutOfRange));
        assert_eq!(kernel.target_khz(), 125_000);
    }

    #[test]
    fn peek_validates_window_and_alignment() {
        let kernel = KernelState::new(125_000, 1100);
        let mut governors = GovernorRegistry::default();
        let mut store = MockStore::new();
        governors.init(&store);
        let metrics = SharedMetricsRing::default();
        let pio = SharedPioStats::default();
        let clock = FixedClock;
        let temp = FixedTemp;
        let mut mmio = MockMmio { last_poke: None };
        let mut log_ring = MockLogRing { uart_on: false };
        let mut sysctl = MockSysControl { rebooted: false, bootsel: false };
        let mut bench = MockBench { last_run: None };
        let mut ctx = build_ctx(
            &kernel, &mut governors, &metrics, &pio, &mut store, &clock, &temp, &mut mmio, &mut log_ring, &mut sysctl,
            &mut bench,
        );
        let mut out = heapless::String::<64>::new();
        assert!(ctx.handle_line("peek 0x20000000", &mut out).is_ok());
        assert_eq!(ctx.handle_line("peek 0x20000001", &mut out), Err(ShellError::BadAddress));
        assert_eq!(ctx.handle_line("peek 0x00001000", &mut out), Err(ShellError::BadAddress));
    }

    #[test]
    fn poke_writes_through_mmio_trait() {
        let kernel = KernelState::new(125_000, 1100);
        let mut governors = GovernorRegistry::default();
        let mut store = MockStore::new();
        governors.init(&store);
        let metrics = SharedMetricsRing::default();
        let pio = SharedPioStats::default();
        let clock = FixedClock;
        let temp = FixedTemp;
        let mut mmio = MockMmio { last_poke: None };
        let mut log_ring = MockLogRing { uart_on: false };
        let mut sysctl = MockSysControl { rebooted: false, bootsel: false };
        let mut bench = MockBench { last_run: None };
        let mut ctx = build_ctx(
            &kernel, &mut governors, &metrics, &pio, &mut store, &clock, &temp, &mut mmio, &mut log_ring, &mut sysctl,
            &mut bench,
        );
        let mut out = heapless::String::<64>::new();
        ctx.handle_line("poke 0x20000000 0xdeadbeef", &mut out).unwrap();
        assert_eq!(mmio.last_poke, Some((0x2000_0000, 0xdead_beef)));
    }

    #[test]
    fn gov_set_rejects_unknown_name() {
        let kernel = KernelState::new(125_000, 1100);
        let mut governors = GovernorRegistry::default();
        let mut store = MockStore::new();
        governors.init(&store);
        let metrics = SharedMetricsRing::default();
        let pio = SharedPioStats::default();
        let clock = FixedClock;
        let temp = FixedTemp;
        let mut mmio = MockMmio { last_poke: None };
        let mut log_ring = MockLogRing { uart_on: false };
        let mut sysctl = MockSysControl { rebooted: false, bootsel: false };
        let mut bench = MockBench { last_run: None };
        let mut ctx = build_ctx(
            &kernel, &mut governors, &metrics, &pio, &mut store, &clock, &temp, &mut mmio, &mut log_ring, &mut sysctl,
            &mut bench,
        );
        let mut out = heapless::String::<64>::new();
        assert_eq!(ctx.handle_line("gov set no_such", &mut out), Err(ShellError::UnknownGovernor));
    }

    #[test]
    fn gov_tune_set_round_trips_and_persists() {
        let kernel = KernelState::new(125_000, 1100);
        let mut governors = GovernorRegistry::default();
        let mut store = MockStore::new();
        governors.init(&store);
        let metrics = SharedMetricsRing::default();
        let pio = SharedPioStats::default();
        let clock = FixedClock;
        let temp = FixedTemp;
        let mut mmio = MockMmio { last_poke: None };
        let mut log_ring = MockLogRing { uart_on: false };
        let mut sysctl = MockSysControl { rebooted: false, bootsel: false };
        let mut bench = MockBench { last_run: None };
        let mut ctx = build_ctx(
            &kernel, &mut governors, &metrics, &pio, &mut store, &clock, &temp, &mut mmio, &mut log_ring, &mut sysctl,
            &mut bench,
        );
        let mut out = heapless::String::<64>::new();
        ctx.handle_line("gov tune rp2040_perf set thr_high 85", &mut out).unwrap();
        out.clear();
        ctx.handle_line("gov tune rp2040_perf get thr_high", &mut out).unwrap();
        assert_eq!(out.as_str(), "85\n");
    }

    #[test]
    fn dmesg_uart_toggle_requires_on_or_off() {
        let kernel = KernelState::new(125_000, 1100);
        let mut governors = GovernorRegistry::default();
        let mut store = MockStore::new();
        governors.init(&store);
        let metrics = SharedMetricsRing::default();
        let pio = SharedPioStats::default();
        let clock = FixedClock;
        let temp = FixedTemp;
        let mut mmio = MockMmio { last_poke: None };
        let mut log_ring = MockLogRing { uart_on: false };
        let mut sysctl = MockSysControl { rebooted: false, bootsel: false };
        let mut bench = MockBench { last_run: None };
        let mut ctx = build_ctx(
            &kernel, &mut governors, &metrics, &pio, &mut store, &clock, &temp, &mut mmio, &mut log_ring, &mut sysctl,
            &mut bench,
        );
        let mut out = heapless::String::<64>::new();
        ctx.handle_line("dmesg uart on", &mut out).unwrap();
        assert!(log_ring.uart_on);
        assert_eq!(ctx.handle_line("dmesg uart sideways", &mut out), Err(ShellError::MissingArgument));
    }

    #[test]
    fn unknown_command_is_reported() {
        let kernel = KernelState::new(125_000, 1100);
        let mut governors = GovernorRegistry::default();
        let mut store = MockStore::new();
        governors.init(&store);
        let metrics = SharedMetricsRing::default();
        let pio = SharedPioStats::default();
        let clock = FixedClock;
        let temp = FixedTemp;
        let mut mmio = MockMmio { last_poke: None };
        let mut log_ring = MockLogRing { uart_on: false };
        let mut sysctl = MockSysControl { rebooted: false, bootsel: false };
        let mut bench = MockBench { last_run: None };
        let mut ctx = build_ctx(
            &kernel, &mut governors, &metrics, &pio, &mut store, &clock, &temp, &mut mmio, &mut log_ring, &mut sysctl,
            &mut bench,
        );
        let mut out = heapless::String::<64>::new();
        assert_eq!(ctx.handle_line("frobnicate", &mut out), Err(ShellError::UnknownCommand));
    }

    #[test]
    fn reboot_and_bootsel_request_system_control() {
        let kernel = KernelState::new(125_000, 1100);
        let mut governors = GovernorRegistry::default();
        let mut store = MockStore::new();
        governors.init(&store);
        let metrics = SharedMetricsRing::default();
        let pio = SharedPioStats::default();
        let clock = FixedClock;
        let temp = FixedTemp;
        let mut mmio = MockMmio { last_poke: None };
        let mut log_ring = MockLogRing { uart_on: false };
        let mut sysctl = MockSysControl { rebooted: false, bootsel: false };
        let mut bench = MockBench { last_run: None };
        let mut ctx = build_ctx(
            &kernel, &mut governors, &metrics, &pio, &mut store, &clock, &temp, &mut mmio, &mut log_ring, &mut sysctl,
            &mut bench,
        );
        let mut out = heapless::String::<64>::new();
        ctx.handle_line("reboot", &mut out).unwrap();
        ctx.handle_line("bootsel", &mut out).unwrap();
        assert!(sysctl.rebooted);
        assert!(sysctl.bootsel);
    }
}
