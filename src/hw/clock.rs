//! On-target PLL/VREG driver.
//!
//! Follows a "compute divisors, then program the PLL block and wait for
//! lock" shape against the RP2040's `PLL_SYS` block and its single
//! feedback divider plus two post-dividers. The multicore
//! lockout follows the Pico SDK's `multicore_lockout` protocol: core 0
//! pushes a request word onto the inter-core FIFO and spins until core 1
//! acknowledges with the same word, exactly the handshake
//! `rp2040_hal::multicore::Multicore`'s own stack-guard bring-up uses the
//! FIFO for.

use rp2040_hal::pac;

use crate::clocks::ramp::SysClockDriver;
use crate::clocks::pll::pll_divisors_for;

/// Magic FIFO word used to request/acknowledge a multicore lockout
/// (arbitrary but fixed, mirroring the Pico SDK's `LOCKOUT_MAGIC_START`).
const LOCKOUT_REQUEST: u32 = 0xB007_CAFE;
const LOCKOUT_RELEASE: u32 = 0xB007_FADE;

/// `rp2040-hal`-backed implementation of [`SysClockDriver`].
pub struct Rp2040ClockDriver<'a> {
    pll_sys: &'a pac::PLL_SYS,
    clocks: &'a pac::CLOCKS,
    vreg: &'a pac::VREG_AND_CHIP_RESET,
    sio_fifo: &'a mut rp2040_hal::sio::SioFifo,
}

impl<'a> Rp2040ClockDriver<'a> {
    /// Borrow the peripherals this driver programs directly. `sio_fifo` is
    /// the inter-core mailbox used for the multicore lockout handshake.
    pub fn new(
        pll_sys: &'a pac::PLL_SYS,
        clocks: &'a pac::CLOCKS,
        vreg: &'a pac::VREG_AND_CHIP_RESET,
        sio_fifo: &'a mut rp2040_hal::sio::SioFifo,
    ) -> Self {
        Rp2040ClockDriver { pll_sys, clocks, vreg, sio_fifo }
    }

    /// Map a millivolt setpoint to the
    /// RP2040's `VREG_AND_CHIP_RESET::VREG::VSEL` coarse step encoding.
    fn vsel_for_mv(mv: u32) -> u8 {
        match mv {
            0..=1099 => 0b0_1001,  // 1.00V-ish floor, shouldn't be reached
            1100..=1199 => 0b0_1011, // 1.10V
            1200..=1299 => 0b0_1101, // 1.20V
            1300..=1349 => 0b0_1111, // 1.30V
            _ => 0b1_0001,          // 1.35V overdrive
        }
    }
}

impl<'a> SysClockDriver for Rp2040ClockDriver<'a> {
    fn probe(&self, khz: u32) -> bool {
        pll_divisors_for(khz).is_some()
    }

    fn set_sys_clock(&mut self, khz: u32) -> bool {
        let Some((fbdiv, pd1, pd2)) = pll_divisors_for(khz) else {
            return false;
        };

        // Power down, reprogram, power back up, wait for lock: the usual
        // three-phase PLL reconfiguration sequence, here against
        // `PLL_SYS`'s register layout.
        self.pll_sys.pwr().modify(|_, w| w.pd().set_bit());
        self.pll_sys.fbdiv_int().write(|w| unsafe { w.fbdiv_int().bits(fbdiv) });
        self.pll_sys.pwr().modify(|_, w| w.pd().clear_bit().vcopd().clear_bit());

        let mut spins = 0u32;
        while self.pll_sys.cs().read().lock().bit_is_clear() {
            spins += 1;
            if spins > 1_000_000 {
                return false;
            }
        }

        self.pll_sys
            .prim()
            .write(|w| unsafe { w.postdiv1().bits(pd1).postdiv2().bits(pd2) });
        self.pll_sys.pwr().modify(|_, w| w.postdivpd().clear_bit());

        // Switch the system clock mux onto PLL_SYS now that it is locked
        // and stable.
        self.clocks
            .clk_sys_ctrl()
            .modify(|_, w| unsafe { w.src().bits(0) });

        true
    }

    fn set_voltage(&mut self, mv: u32) {
        let vsel = Self::vsel_for_mv(mv);
        self.vreg.vreg().modify(|_, w| unsafe { w.vsel().bits(vsel) });
        // VREG needs a few microseconds to settle onto the new rail before
        // the PLL reconfigure that follows on a ramp-up relies on it.
        cortex_m::asm::delay(1_000);
    }

    fn with_other_core_paused<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.sio_fifo.write(LOCKOUT_REQUEST);
        while self.sio_fifo.read() != Some(LOCKOUT_REQUEST) {
            cortex_m::asm::nop();
        }
        let result = f(self);
        self.sio_fifo.write(LOCKOUT_RELEASE);
        result
    }
}

/// Runs on core 0: waits for a lockout request from core 1, acknowledges
/// it, spins until release, then resumes. Installed once at boot alongside
/// `Multicore::cores()[1].spawn(...)`.
pub fn lockout_victim_poll(sio_fifo: &mut rp2040_hal::sio::SioFifo) {
    if sio_fifo.read() == Some(LOCKOUT_REQUEST) {
        sio_fifo.write(LOCKOUT_REQUEST);
        while sio_fifo.read() != Some(LOCKOUT_RELEASE) {
            cortex_m::asm::nop();
        }
    }
}
