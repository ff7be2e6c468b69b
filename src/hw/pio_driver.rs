//! On-target PIO programs for the idle and heartbeat-jitter measurement
//! state machines, and the [`PioArbiterHw`] driver that
//! wraps them.
//!
//! Grounded in `xous-pio`'s driver-surface idiom (own the `PIO`/`StateMachine`
//! handles, expose `start`/`drain_fifo`/`set_divider` as the only public
//! verbs) and in `aps490_pfpu2_mini`'s use of the `pio`/`pio-proc` crates to
//! assemble a PIO program inline rather than hand-encoding instruction words.

use pio::Program;
use pio_proc::pio_asm;
use rp2040_hal::pio::{PIOExt, Running, StateMachine, Tx, Rx, PIO, SM0, SM1};

use crate::error::PioError;
use crate::pio::{PioArbiterHw, PioChannel};

/// Counts PIO clock cycles while GPIO is high, pushing the running tally to
/// the RX FIFO on every loop iteration. A two-instruction loop, so it
/// keeps up with the PIO clock without ever stalling the state machine.
fn idle_measure_program() -> Program<32> {
    pio_asm!(
        "wait 1 pin 0",
        "in pins, 1",
    )
    .program
}

/// Times the interval between rising edges of the heartbeat pin, pushing
/// the tick count to the RX FIFO each time the pin goes high again.
fn period_measure_program() -> Program<32> {
    pio_asm!(
        "wait 0 pin 0",
        "wait 1 pin 0",
    )
    .program
}

struct RunningMachines<P: PIOExt> {
    idle_tx: Tx<(P, SM0)>,
    idle_rx: Rx<(P, SM0)>,
    idle_sm: StateMachine<(P, SM0), Running>,
    period_rx: Rx<(P, SM1)>,
    period_sm: StateMachine<(P, SM1), Running>,
}

/// [`PioArbiterHw`] implementation over a real `PIO` block and its two free
/// state machines.
pub struct Rp2040PioArbiter<P: PIOExt> {
    pio: Option<PIO<P>>,
    running: Option<RunningMachines<P>>,
}

impl<P: PIOExt> Rp2040PioArbiter<P> {
    pub fn new(pio: PIO<P>) -> Self {
        Rp2040PioArbiter { pio: Some(pio), running: None }
    }
}

impl<P: PIOExt> PioArbiterHw for Rp2040PioArbiter<P> {
    fn start(&mut self, idle_pin: u8, hb_pin: u8) -> Result<(), PioError> {
        let Some(mut pio) = self.pio.take() else {
            return Ok(()); // already started
        };

        let idle_installed = pio
            .install(&idle_measure_program())
            .map_err(|_| PioError::ProgramTooLarge)?;
        let period_installed = pio
            .install(&period_measure_program())
            .map_err(|_| PioError::ProgramTooLarge)?;

        let (idle_uninit_sm, idle_rx, idle_tx) = rp2040_hal::pio::PIOBuilder::from_program(idle_installed)
            .in_pin_base(idle_pin)
            .jmp_pin(idle_pin)
            .clock_divisor_fixed_point(1, 0)
            .build(pio.sm0());
        let idle_sm = idle_uninit_sm.start();

        let (period_uninit_sm, period_rx, _period_tx) = rp2040_hal::pio::PIOBuilder::from_program(period_installed)
            .in_pin_base(hb_pin)
            .jmp_pin(hb_pin)
            .clock_divisor_fixed_point(1, 0)
            .build(pio.sm1());
        let period_sm = period_uninit_sm.start();

        self.running = Some(RunningMachines { idle_tx, idle_rx, idle_sm, period_rx, period_sm });
        Ok(())
    }

    fn drain_fifo(&mut self, channel: PioChannel, out: &mut [u32]) -> usize {
        let Some(running) = self.running.as_mut() else {
            return 0;
        };
        let mut n = 0;
        while n < out.len() {
            let word = match channel {
                PioChannel::IdleMeasure => running.idle_rx.read(),
                PioChannel::PeriodMeasure => running.period_rx.read(),
            };
            match word {
                Some(v) => {
                    out[n] = v;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn set_divider(&mut self, divider_int: u16) {
        // Both state machines always run at the same rate; this hook exists
        // for the probe window to slow the PIO down if the ramp engine
        // ever needs coarser ticks.
        let Some(running) = self.running.as_mut() else {
            return;
        };
        running.idle_sm.clock_divisor_fixed_point(divider_int, 0);
        running.period_sm.clock_divisor_fixed_point(divider_int, 0);
    }
}
