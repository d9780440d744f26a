// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Barriers, busy-wait delays and exception masking for the 32-bit Krait cores.

#[cfg(all(target_arch = "arm", not(test)))]
use core::arch::asm;
#[cfg(all(target_arch = "arm", not(test)))]
use percore::ExceptionFree;

/// Issues a full system data synchronization barrier (`dsb sy`) instruction.
pub fn dsb_sy() {
    // SAFETY: `dsb` does not violate safe Rust guarantees.
    #[cfg(all(target_arch = "arm", not(test)))]
    unsafe {
        asm!("dsb sy", options(nostack));
    }
}

/// Reads the physical count of the generic timer (`CNTPCT`).
#[cfg(all(target_arch = "arm", not(test)))]
fn read_cntpct() -> u64 {
    let (low, high): (u32, u32);
    // SAFETY: Reading `CNTPCT` has no side effects.
    unsafe {
        asm!(
            "isb",
            "mrrc p15, 0, {low}, {high}, c14",
            low = out(reg) low,
            high = out(reg) high,
            options(nostack, nomem),
        );
    }
    (u64::from(high) << 32) | u64::from(low)
}

/// Reads the frequency in Hz of the generic timer (`CNTFRQ`).
#[cfg(all(target_arch = "arm", not(test)))]
fn read_cntfrq() -> u64 {
    let value: u32;
    // SAFETY: Reading `CNTFRQ` has no side effects.
    unsafe {
        asm!("mrc p15, 0, {}, c14, c0, 0", out(reg) value, options(nostack, nomem));
    }
    u64::from(value)
}

/// Busy-waits for at least the given number of microseconds.
///
/// Host builds return immediately.
pub fn delay_us(us: u32) {
    #[cfg(all(target_arch = "arm", not(test)))]
    {
        let ticks = (read_cntfrq() * u64::from(us)).div_ceil(1_000_000);
        let start = read_cntpct();
        while read_cntpct().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }
    #[cfg(any(not(target_arch = "arm"), test))]
    let _ = us;
}

/// Runs `f` with IRQs and FIQs masked on the current core, then restores the previous mask.
#[cfg(all(target_arch = "arm", not(test)))]
pub fn exception_free<T>(f: impl FnOnce(ExceptionFree) -> T) -> T {
    let cpsr: u32;
    // SAFETY: Masking IRQs and FIQs doesn't affect memory safety.
    unsafe {
        asm!("mrs {}, cpsr", "cpsid if", out(reg) cpsr, options(nostack));
    }
    // SAFETY: IRQs and FIQs stay masked until `f` returns, and the token can't escape it.
    let result = f(unsafe { ExceptionFree::new() });
    // SAFETY: This only restores the mask bits saved above, in the same processor mode.
    unsafe {
        asm!("msr cpsr_c, {}", in(reg) cpsr, options(nostack));
    }
    result
}
