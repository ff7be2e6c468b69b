//! PLL divisor search.
//!
//! We're told the target frequency and must find divisors, walking a VCO
//! range and a feedback divisor to find a valid `sys_ck` the same way a
//! forward PLL setup routine would validate one.
//!
//! `sys = XOSC_KHZ * fbdiv / (pd1 * pd2)`, with the RP2040's documented
//! constraints: VCO ∈ [750 MHz, 1600 MHz], `fbdiv` ∈ [16, 320],
//! `pd1, pd2` ∈ [1, 7], and hardware requires `pd1 >= pd2`.

/// Crystal frequency feeding the PLL, in kilohertz.
pub const XOSC_KHZ: u32 = 12_000;
const VCO_MIN_KHZ: u32 = 750_000;
const VCO_MAX_KHZ: u32 = 1_600_000;
const FBDIV_MIN: u32 = 16;
const FBDIV_MAX: u32 = 320;
const PD_MIN: u32 = 1;
const PD_MAX: u32 = 7;
/// How far the probe is allowed to walk from a requested frequency while
/// searching for an achievable one, in kilohertz.
pub const PROBE_RADIUS_KHZ: u32 = 50;

/// Find `(fbdiv, pd1, pd2)` that produce exactly `khz` out of the 12 MHz
/// crystal, or `None` if no such combination exists.
///
/// Search order favors the smallest total divide ratio `pd1 * pd2` first,
/// which keeps the VCO frequency (and therefore lock time and jitter) as
/// low as possible for a given target, the same bias the RP2040 boot ROM's
/// own PLL calculator applies.
pub fn pll_divisors_for(khz: u32) -> Option<(u16, u8, u8)> {
    if khz == 0 {
        return None;
    }
    for pd1 in PD_MIN..=PD_MAX {
        for pd2 in PD_MIN..=pd1 {
            let divisor = pd1 * pd2;
            let vco_khz = match khz.checked_mul(divisor) {
                Some(v) => v,
                None => continue,
            };
            if vco_khz < VCO_MIN_KHZ || vco_khz > VCO_MAX_KHZ {
                continue;
            }
            if vco_khz % XOSC_KHZ != 0 {
                continue;
            }
            let fbdiv = vco_khz / XOSC_KHZ;
            if (FBDIV_MIN..=FBDIV_MAX).contains(&fbdiv) {
                return Some((fbdiv as u16, pd1 as u8, pd2 as u8));
            }
        }
    }
    None
}

/// Walk outward from `desired_khz` toward an achievable PLL frequency.
///
/// When `current_khz != desired_khz`, the walk proceeds only in the
/// direction of travel (toward `desired_khz` from `current_khz`); this is
/// the probe routine used mid-ramp. When `current_khz == desired_khz`,
/// both directions are searched and the nearest achievable frequency wins.
///
/// Returns `None` if nothing within [`PROBE_RADIUS_KHZ`] kHz is achievable;
/// the caller then falls back to the raw target and lets the hardware
/// reject it.
pub fn find_achievable_khz(current_khz: u32, desired_khz: u32) -> Option<u32> {
    if pll_divisors_for(desired_khz).is_some() {
        return Some(desired_khz);
    }

    use core::cmp::Ordering;
    match current_khz.cmp(&desired_khz) {
        Ordering::Less => {
            // Travelling upward: only look above desired_khz.
            (1..=PROBE_RADIUS_KHZ).find_map(|d| {
                let cand = desired_khz.checked_add(d)?;
                pll_divisors_for(cand).map(|_| cand)
            })
        }
        Ordering::Greater => {
            // Travelling downward: only look below desired_khz.
            (1..=PROBE_RADIUS_KHZ).find_map(|d| {
                let cand = desired_khz.checked_sub(d)?;
                pll_divisors_for(cand).map(|_| cand)
            })
        }
        Ordering::Equal => (1..=PROBE_RADIUS_KHZ).find_map(|d| {
            if let Some(cand) = desired_khz.checked_add(d) {
                if pll_divisors_for(cand).is_some() {
                    return Some(cand);
                }
            }
            if let Some(cand) = desired_khz.checked_sub(d) {
                if pll_divisors_for(cand).is_some() {
                    return Some(cand);
                }
            }
            None
        }),
    }
}
