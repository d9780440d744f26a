// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Clock hardware and firmware services shared by the Krait based SoCs.

use crate::{
    arch::{dsb_sy, exception_free},
    clock::{ClockRegisters, PllRegister},
    dvfs::{BandwidthBackend, Footprint, PowerFramework, TransitionStage},
    error::BackendError,
    logger::LockedWriter,
    rails::{RailBackend, RailId},
};
use arm_sysregs::MidrEl1;
use core::{
    arch::asm,
    ffi::c_void,
    fmt::{self, Write},
    ptr::NonNull,
    sync::atomic::{AtomicBool, Ordering},
};
use safe_mmio::{
    UniqueMmioPointer, field,
    fields::{ReadOnly, ReadWrite},
};
use spin::mutex::SpinMutex;

/// Indirect address of the L2 clock and power mux register.
pub const L2CPMR_IADDR: u32 = 0x500;
/// Indirect address of the calling core's clock and power mux register.
pub const L2CPUCPMR_IADDR: u32 = 0x501;

/// Base address of the HFPLL register blocks.
pub const HFPLL_BASE: usize = 0x0090_3000;
/// Base address of the global clock controller of the application processor subsystem.
pub const APCS_GCC_BASE: usize = 0x0201_1000;
/// Offset of the auxiliary clock selector within a core's ACC block.
pub const ACC_AUX_CLK_SEL: usize = 0x14;
/// Offset of the L2 auxiliary clock selector within the APCS GCC block.
pub const L2_AUX_CLK_SEL: usize = 0x28;

/// Address of the PTE efuse, which holds the speed bin.
pub const QFPROM_PTE_EFUSE: usize = 0x0070_00C0;

/// Base address of the footprint area, which survives a watchdog reset.
pub const FOOTPRINT_BASE: usize = 0x8F70_0000;
const FOOTPRINT_MAGIC: u32 = 0xACBD_FE00;
const FOOTPRINT_CORES: usize = 4;

/// RPM regulator voter of the L2 PLL supplies.
pub const L2_VOTER: u32 = 6;
/// RPM regulator ID of the L2 memory rail.
pub const RPM_L24: u32 = 24;
/// RPM regulator ID of the L2 digital rail.
pub const RPM_S3: u32 = 3;

unsafe extern "C" {
    /// Votes for a voltage range on a regulator owned by the RPM. Returns 0 on success.
    fn rpm_vreg_set_voltage(id: u32, voter: u32, min_uv: u32, max_uv: u32) -> i32;

    /// Sets the voltage of a regulator owned by this processor. Returns 0 on success.
    fn regulator_set_voltage(id: u32, min_uv: u32, max_uv: u32) -> i32;

    /// Turns on a regulator owned by this processor. Returns 0 on success.
    fn regulator_enable(id: u32) -> i32;

    /// Updates the bus scaling request of the application processor. Returns 0 on success.
    fn msm_bus_update_request(tier: u32) -> i32;

    /// Returns whether the given core is online.
    fn cpu_online(core: u32) -> bool;

    /// Returns whether the given core is in a state where it can be power collapsed.
    fn cpu_can_power_collapse(core: u32) -> bool;

    /// Calls `func(info)` on every online core, and returns once all calls have returned.
    fn on_each_online_cpu(func: unsafe extern "C" fn(*mut c_void), info: *mut c_void);

    /// Writes a string to the console.
    fn console_write(bytes: *const u8, len: usize);
}

fn backend_result(ret: i32) -> Result<(), BackendError> {
    if ret == 0 {
        Ok(())
    } else {
        Err(BackendError(ret))
    }
}

/// Reads an L2 indirect register.
fn read_l2_indirect(iaddr: u32) -> u32 {
    exception_free(|_| {
        let value: u32;
        // SAFETY: Selecting an indirect address and reading it back only affects the banked
        // indirect access registers of this core, and exceptions are masked so nothing else on
        // this core can use them in between.
        unsafe {
            asm!(
                "mcr p15, 3, {iaddr}, c15, c0, 6",
                "isb",
                "mrc p15, 3, {value}, c15, c0, 7",
                iaddr = in(reg) iaddr,
                value = out(reg) value,
                options(nostack),
            );
        }
        value
    })
}

/// Writes an L2 indirect register.
fn write_l2_indirect(iaddr: u32, value: u32) {
    exception_free(|_| {
        // SAFETY: As for `read_l2_indirect`. The caller is responsible for the effect of the value
        // written on the clocks.
        unsafe {
            asm!(
                "mcr p15, 3, {iaddr}, c15, c0, 6",
                "isb",
                "mcr p15, 3, {value}, c15, c0, 7",
                "isb",
                iaddr = in(reg) iaddr,
                value = in(reg) value,
                options(nostack),
            );
        }
    })
}

/// Reads the main ID register of this core.
pub fn read_midr() -> MidrEl1 {
    let value: u32;
    // SAFETY: Reading `MIDR` has no side effects.
    unsafe {
        asm!("mrc p15, 0, {}, c0, c0, 0", out(reg) value, options(nostack, nomem));
    }
    MidrEl1::from_bits_retain(u64::from(value))
}

/// Returns the index of the core this is running on, from the affinity level 0 field of `MPIDR`.
fn read_core_index() -> usize {
    let value: u32;
    // SAFETY: Reading `MPIDR` has no side effects.
    unsafe {
        asm!("mrc p15, 0, {}, c0, c0, 5", out(reg) value, options(nostack, nomem));
    }
    (value & 0xFF) as usize
}

/// The register block of one HFPLL.
#[repr(C)]
pub struct HfpllRegisters {
    mode: ReadWrite<u32>,
    config_ctl: ReadWrite<u32>,
    l_val: ReadWrite<u32>,
    m_val: ReadWrite<u32>,
    n_val: ReadWrite<u32>,
    droop_ctl: ReadWrite<u32>,
}

/// The clock hardware of one Krait core or of the L2.
///
/// The CPMR of a core is reached through the indirect address of the calling core, so the
/// registers of a core must only be used while running on that core.
pub struct KraitClockRegisters {
    hfpll: UniqueMmioPointer<'static, HfpllRegisters>,
    aux_clk_sel: UniqueMmioPointer<'static, ReadWrite<u32>>,
    cpmr_iaddr: u32,
}

impl KraitClockRegisters {
    /// Creates a new instance for the HFPLL at `hfpll_base` and the auxiliary clock selector at
    /// `aux_clk_sel`.
    ///
    /// # Safety
    ///
    /// Both addresses must be the mapped register blocks of the same clock domain, and nothing
    /// else may access them for the lifetime of the program.
    pub unsafe fn new(hfpll_base: usize, aux_clk_sel: usize, cpmr_iaddr: u32) -> Self {
        // SAFETY: The caller guarantees that the addresses are valid and unaliased.
        unsafe {
            Self {
                hfpll: UniqueMmioPointer::new(
                    NonNull::new(hfpll_base as *mut HfpllRegisters).unwrap(),
                ),
                aux_clk_sel: UniqueMmioPointer::new(
                    NonNull::new(aux_clk_sel as *mut ReadWrite<u32>).unwrap(),
                ),
                cpmr_iaddr,
            }
        }
    }
}

impl ClockRegisters for KraitClockRegisters {
    fn read_cpmr(&mut self) -> u32 {
        read_l2_indirect(self.cpmr_iaddr)
    }

    fn write_cpmr(&mut self, value: u32) {
        write_l2_indirect(self.cpmr_iaddr, value);
    }

    fn write_aux_clk_sel(&mut self, value: u32) {
        self.aux_clk_sel.write(value);
    }

    fn write_pll(&mut self, register: PllRegister, value: u32) {
        match register {
            PllRegister::Mode => field!(self.hfpll, mode).write(value),
            PllRegister::ConfigCtl => field!(self.hfpll, config_ctl).write(value),
            PllRegister::LVal => field!(self.hfpll, l_val).write(value),
            PllRegister::MVal => field!(self.hfpll, m_val).write(value),
            PllRegister::NVal => field!(self.hfpll, n_val).write(value),
            PllRegister::DroopCtl => field!(self.hfpll, droop_ctl).write(value),
        }
    }
}

/// Reads the PTE efuse.
pub fn read_pte_efuse() -> u32 {
    // SAFETY: `QFPROM_PTE_EFUSE` is the address of a read-only fuse register, and reading it has
    // no side effects.
    let mut efuse = unsafe {
        UniqueMmioPointer::new(NonNull::new(QFPROM_PTE_EFUSE as *mut ReadOnly<u32>).unwrap())
    };
    efuse.read()
}

/// Regulators reached through the RPM and the local regulator framework.
#[derive(Debug, Default)]
pub struct KraitRails;

impl RailBackend for KraitRails {
    fn set_voltage(&self, rail: RailId, uv: u32, max_uv: u32) -> Result<(), BackendError> {
        // SAFETY: The regulator services only read their arguments.
        backend_result(unsafe {
            match rail {
                RailId::Regulator(id) => regulator_set_voltage(id, uv, max_uv),
                RailId::Rpm { id, voter } => rpm_vreg_set_voltage(id, voter, uv, max_uv),
            }
        })
    }

    fn enable(&self, rail: RailId) -> Result<(), BackendError> {
        match rail {
            // SAFETY: The regulator service only reads its argument.
            RailId::Regulator(id) => backend_result(unsafe { regulator_enable(id) }),
            // RPM votes are on as soon as they are non-zero.
            RailId::Rpm { .. } => Ok(()),
        }
    }
}

/// The bus scaling client of the application processor.
#[derive(Debug, Default)]
pub struct KraitBandwidth;

impl BandwidthBackend for KraitBandwidth {
    fn set_bandwidth_tier(&self, tier: usize) -> Result<(), BackendError> {
        let tier = u32::try_from(tier).map_err(|_| BackendError(-22))?;
        // SAFETY: The bus scaling service only reads its argument.
        backend_result(unsafe { msm_bus_update_request(tier) })
    }
}

/// The kernel's view of the cores.
#[derive(Debug, Default)]
pub struct KraitPower;

impl PowerFramework for KraitPower {
    fn is_online(&self, core: usize) -> bool {
        // SAFETY: `cpu_online` only reads its argument.
        unsafe { cpu_online(core as u32) }
    }

    fn can_power_collapse(&self, core: usize) -> bool {
        // SAFETY: `cpu_can_power_collapse` only reads its argument.
        unsafe { cpu_can_power_collapse(core as u32) }
    }

    fn current_core(&self) -> usize {
        read_core_index()
    }

    fn on_each_online_core(&self, f: &(dyn Fn() + Sync)) {
        // SAFETY: `info` points to `f`, which outlives the call as `on_each_online_cpu` waits for
        // every core to return. `f` is `Sync`, so it may be called from several cores at once.
        unsafe { on_each_online_cpu(call_on_core, (&raw const f).cast_mut().cast()) };
    }
}

/// Calls the closure passed to `KraitPower::on_each_online_core`.
///
/// # Safety
///
/// `info` must point to a live `&(dyn Fn() + Sync)`.
unsafe extern "C" fn call_on_core(info: *mut c_void) {
    // SAFETY: The caller guarantees that `info` points to a live closure reference.
    let f = unsafe { *info.cast::<&(dyn Fn() + Sync)>() };
    f();
}

/// The layout of the footprint area.
#[repr(C)]
pub struct FootprintRegisters {
    reserved: [u32; 22],
    core_khz: [ReadWrite<u32>; FOOTPRINT_CORES],
    l2_khz: ReadWrite<u32>,
    stage: [ReadWrite<u32>; FOOTPRINT_CORES],
}

/// Records transition progress in memory which survives a watchdog reset, so it can be recovered
/// after a hang.
pub struct KraitFootprint {
    regs: SpinMutex<UniqueMmioPointer<'static, FootprintRegisters>>,
}

impl KraitFootprint {
    /// Creates a new instance for the footprint area at `FOOTPRINT_BASE`.
    ///
    /// # Safety
    ///
    /// The footprint area must be mapped, and nothing else may access it for the lifetime of the
    /// program.
    pub unsafe fn new() -> Self {
        // SAFETY: The caller guarantees that the area is mapped and unaliased.
        let regs = unsafe {
            UniqueMmioPointer::new(
                NonNull::new(FOOTPRINT_BASE as *mut FootprintRegisters).unwrap(),
            )
        };
        Self {
            regs: SpinMutex::new(regs),
        }
    }
}

impl Footprint for KraitFootprint {
    fn record_stage(&self, core: usize, stage: TransitionStage) {
        let mut regs = self.regs.lock();
        if let Some(mut slot) = field!(*regs, stage).get(core) {
            slot.write(FOOTPRINT_MAGIC | u32::from(stage));
        }
        dsb_sy();
    }

    fn record_core_khz(&self, core: usize, khz: u32) {
        let mut regs = self.regs.lock();
        if let Some(mut slot) = field!(*regs, core_khz).get(core) {
            slot.write(khz);
        }
        dsb_sy();
    }

    fn record_l2_khz(&self, khz: u32) {
        let mut regs = self.regs.lock();
        field!(*regs, l2_khz).write(khz);
        dsb_sy();
    }
}

/// Writes to the console through the kernel.
#[derive(Debug, Default)]
pub struct Console;

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // SAFETY: The pointer and length come from a valid string slice, which the console only
        // reads for the duration of the call.
        unsafe { console_write(s.as_ptr(), s.len()) };
        Ok(())
    }
}

/// The log sink used by the Krait SoCs.
pub type KraitLogSink = LockedWriter<Console>;

/// Creates the log sink used by the Krait SoCs.
pub const fn log_sink() -> KraitLogSink {
    LockedWriter::new(Console)
}

static HARDWARE_TAKEN: AtomicBool = AtomicBool::new(false);

/// Returns true the first time it is called, and false on every later call.
pub fn claim_hardware() -> bool {
    !HARDWARE_TAKEN.swap(true, Ordering::AcqRel)
}
