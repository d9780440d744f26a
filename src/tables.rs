// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Static frequency and voltage tables, and the frequency plan selected from them at boot.

use crate::{
    errata::{ErratumEntry, apply_table_errata},
    error::PlanError,
};
use arm_sysregs::MidrEl1;
use arrayvec::ArrayVec;
use log::{info, warn};
use num_enum::{FromPrimitive, IntoPrimitive};

/// The maximum number of performance levels in a frequency plan.
pub const MAX_LEVELS: usize = 32;

/// The maximum number of frequencies offered to the frequency governor.
pub const MAX_SCALING_FREQUENCIES: usize = 30;

/// The kind of upstream clock which drives a clock domain at some speed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClockSource {
    /// The always-on low power source (QSB).
    Standby,
    /// PLL8, shared with the rest of the SoC and reached through the auxiliary mux.
    SharedPll,
    /// The domain's own high frequency PLL.
    Hfpll,
}

/// Values of the primary source selector field.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, IntoPrimitive, PartialEq)]
#[repr(u32)]
pub enum PrimarySource {
    /// Whatever the secondary source selector picks.
    #[num_enum(default)]
    SecondarySource = 0,
    /// The HFPLL output.
    Hfpll = 1,
    /// The HFPLL output divided by two.
    HfpllDiv2 = 2,
}

/// Values of the secondary source selector field.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, IntoPrimitive, PartialEq)]
#[repr(u32)]
pub enum SecondarySource {
    /// The always-on QSB clock.
    #[num_enum(default)]
    Qsb = 0,
    /// The auxiliary mux, which is set up to select PLL8.
    Aux = 2,
}

/// A speed at which a clock domain can run, and how to make it run at that speed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CoreSpeed {
    /// The frequency in kHz.
    pub khz: u32,
    /// The kind of source the frequency is derived from.
    pub source: ClockSource,
    /// The primary source selector value.
    pub primary: PrimarySource,
    /// The secondary source selector value.
    pub secondary: SecondarySource,
    /// The HFPLL multiplier, if `source` is `Hfpll`.
    pub pll_l_val: u32,
}

impl CoreSpeed {
    /// The nominal frequency reported while running from the standby source.
    pub const STANDBY_KHZ: u32 = 1;

    /// Running from the always-on source.
    pub const STANDBY: Self = Self {
        khz: Self::STANDBY_KHZ,
        source: ClockSource::Standby,
        primary: PrimarySource::SecondarySource,
        secondary: SecondarySource::Qsb,
        pll_l_val: 0,
    };

    /// Running from PLL8 through the auxiliary mux.
    pub const fn shared_pll(khz: u32) -> Self {
        Self {
            khz,
            source: ClockSource::SharedPll,
            primary: PrimarySource::SecondarySource,
            secondary: SecondarySource::Aux,
            pll_l_val: 0,
        }
    }

    /// Running directly from the HFPLL programmed with the given multiplier.
    pub const fn hfpll(khz: u32, pll_l_val: u32) -> Self {
        Self {
            khz,
            source: ClockSource::Hfpll,
            primary: PrimarySource::Hfpll,
            secondary: SecondarySource::Qsb,
            pll_l_val,
        }
    }

    /// Running from half the output of the HFPLL programmed with the given multiplier.
    pub const fn hfpll_div2(khz: u32, pll_l_val: u32) -> Self {
        Self {
            khz,
            source: ClockSource::Hfpll,
            primary: PrimarySource::HfpllDiv2,
            secondary: SecondarySource::Qsb,
            pll_l_val,
        }
    }

    /// Returns whether this speed is derived from the domain's own HFPLL.
    pub const fn is_hfpll(&self) -> bool {
        matches!(self.source, ClockSource::Hfpll)
    }
}

/// An operating point of the shared L2 clock domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct L2Level {
    /// The L2 clock speed.
    pub speed: CoreSpeed,
    /// The minimum L2 digital logic voltage in µV.
    pub vdd_dig: u32,
    /// The minimum L2 memory voltage in µV.
    pub vdd_mem: u32,
    /// The interconnect bandwidth tier to request.
    pub bw_tier: usize,
}

impl L2Level {
    /// Creates a new L2 level.
    pub const fn new(speed: CoreSpeed, vdd_dig: u32, vdd_mem: u32, bw_tier: usize) -> Self {
        Self {
            speed,
            vdd_dig,
            vdd_mem,
            bw_tier,
        }
    }
}

/// An operating point of a CPU core.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PerformanceLevel {
    /// Whether the level is offered to the frequency governor.
    pub use_for_scaling: bool,
    /// The core clock speed.
    pub speed: CoreSpeed,
    /// The index of the L2 level which the core needs while running at this level.
    pub l2: usize,
    /// The minimum core voltage in µV.
    pub vdd_core: u32,
}

impl PerformanceLevel {
    /// Creates a new performance level.
    pub const fn new(use_for_scaling: bool, speed: CoreSpeed, l2: usize, vdd_core: u32) -> Self {
        Self {
            use_for_scaling,
            speed,
            l2,
            vdd_core,
        }
    }
}

/// The HFPLL analog supply requirements of the L2 digital rail.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PllVddTable {
    /// Requirement when the L2 isn't running from its HFPLL.
    pub none: u32,
    /// Requirement when the HFPLL multiplier is at most `LOW_VDD_L_MAX`.
    pub low: u32,
    /// Requirement for higher multipliers.
    pub nominal: u32,
}

impl PllVddTable {
    /// The highest HFPLL multiplier which can run at the low voltage.
    pub const LOW_VDD_L_MAX: u32 = 0x28;

    /// Returns the digital rail voltage needed to run the HFPLL for the given L2 speed.
    pub const fn vdd_for(&self, speed: &CoreSpeed) -> u32 {
        if !speed.is_hfpll() {
            self.none
        } else if speed.pll_l_val > Self::LOW_VDD_L_MAX {
            self.nominal
        } else {
            self.low
        }
    }
}

/// The static tables for one SoC variant and speed bin.
#[derive(Clone, Copy, Debug)]
pub struct FreqTables {
    /// The CPU performance levels, in ascending order of frequency.
    pub levels: &'static [PerformanceLevel],
    /// The L2 levels, in ascending order of frequency.
    pub l2_levels: &'static [L2Level],
    /// The HFPLL supply requirements of the L2 digital rail.
    pub pll_vdd: PllVddTable,
}

/// A process variation bucket, read from fuses at boot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpeedBin {
    /// Slow silicon, needing the highest voltages.
    Slow,
    /// Nominal silicon.
    Nominal,
    /// Fast silicon.
    Fast,
    /// Faster silicon, only recognised by some SoCs.
    Faster,
}

impl SpeedBin {
    const PRIMARY_SHIFT: u32 = 10;
    const REDUNDANT_SHIFT: u32 = 13;
    const FIELD_MASK: u32 = 0x7;
    const BLOWN: u32 = 0x7;

    /// Decodes the speed bin from the PTE efuse value.
    ///
    /// The redundant field is used if the primary one is fully blown. Unknown values fall back to
    /// `Slow`, which is safe on any part.
    pub fn from_efuse(efuse: u32, faster_supported: bool) -> Self {
        let mut field = (efuse >> Self::PRIMARY_SHIFT) & Self::FIELD_MASK;
        if field == Self::BLOWN {
            field = (efuse >> Self::REDUNDANT_SHIFT) & Self::FIELD_MASK;
        }
        let bin = match field {
            0x0 | 0x7 => Self::Slow,
            0x1 => Self::Nominal,
            0x3 => Self::Fast,
            0x4 if faster_supported => Self::Faster,
            _ => {
                warn!("Unknown speed bin {field:#x}, defaulting to slow");
                return Self::Slow;
            }
        };
        info!("Speed bin: {bin:?}");
        bin
    }
}

/// The frequency plan used for the lifetime of the system.
///
/// This is built once at boot from the tables selected for the SoC and speed bin, with any CPU
/// errata applied, and is never modified afterwards.
#[derive(Clone, Debug)]
pub struct FreqPlan {
    levels: ArrayVec<PerformanceLevel, MAX_LEVELS>,
    l2_levels: &'static [L2Level],
    pll_vdd: PllVddTable,
    max_level: usize,
}

impl FreqPlan {
    /// Validates the given tables, applies errata and picks the boot frequency.
    ///
    /// The boot frequency is the fastest level used for scaling which doesn't exceed
    /// `max_scaling_khz`.
    pub fn load(
        tables: &FreqTables,
        midr: MidrEl1,
        errata: &[ErratumEntry],
        max_scaling_khz: u32,
    ) -> Result<Self, PlanError> {
        validate(tables)?;

        let mut levels = ArrayVec::new();
        levels
            .try_extend_from_slice(tables.levels)
            .map_err(|_| PlanError::TooManyLevels {
                len: tables.levels.len(),
                capacity: MAX_LEVELS,
            })?;
        apply_table_errata(errata, midr, &mut levels);

        let max_level = levels
            .iter()
            .rposition(|level: &PerformanceLevel| {
                level.use_for_scaling && level.speed.khz <= max_scaling_khz
            })
            .ok_or(PlanError::NoScalingLevel {
                cap: max_scaling_khz,
            })?;

        let plan = Self {
            levels,
            l2_levels: tables.l2_levels,
            pll_vdd: tables.pll_vdd,
            max_level,
        };
        info!("Max CPU frequency: {} kHz", plan.max_level().speed.khz);
        Ok(plan)
    }

    /// Returns all performance levels, in ascending order of frequency.
    pub fn levels(&self) -> &[PerformanceLevel] {
        &self.levels
    }

    /// Returns all L2 levels, in ascending order of frequency.
    pub fn l2_levels(&self) -> &'static [L2Level] {
        self.l2_levels
    }

    /// Returns the L2 level with the given index.
    ///
    /// Panics if the index is out of range.
    pub fn l2_level(&self, index: usize) -> &'static L2Level {
        &self.l2_levels[index]
    }

    /// Returns the HFPLL supply requirements of the L2 digital rail.
    pub fn pll_vdd(&self) -> &PllVddTable {
        &self.pll_vdd
    }

    /// Looks up the performance level with exactly the given frequency.
    pub fn level_for_khz(&self, khz: u32) -> Option<&PerformanceLevel> {
        self.levels.iter().find(|level| level.speed.khz == khz)
    }

    /// Returns the level every core is brought up at.
    pub fn max_level(&self) -> &PerformanceLevel {
        &self.levels[self.max_level]
    }

    /// Returns the frequency used while a core is idle or unplugged.
    pub fn standby_khz(&self) -> u32 {
        self.levels[0].speed.khz
    }

    /// Returns the frequencies offered to the frequency governor, in ascending order.
    pub fn scaling_frequencies(&self) -> ArrayVec<u32, MAX_SCALING_FREQUENCIES> {
        self.levels
            .iter()
            .filter(|level| level.use_for_scaling)
            .map(|level| level.speed.khz)
            .collect()
    }
}

fn validate(tables: &FreqTables) -> Result<(), PlanError> {
    if tables.levels.is_empty() {
        return Err(PlanError::EmptyTable);
    }
    if tables.l2_levels.is_empty() {
        return Err(PlanError::EmptyL2Table);
    }
    if tables.levels.len() > MAX_LEVELS {
        return Err(PlanError::TooManyLevels {
            len: tables.levels.len(),
            capacity: MAX_LEVELS,
        });
    }
    let scaling = tables
        .levels
        .iter()
        .filter(|level| level.use_for_scaling)
        .count();
    if scaling > MAX_SCALING_FREQUENCIES {
        return Err(PlanError::TooManyScalingLevels {
            count: scaling,
            capacity: MAX_SCALING_FREQUENCIES,
        });
    }

    for pair in tables.levels.windows(2) {
        if pair[1].speed.khz <= pair[0].speed.khz {
            return Err(PlanError::NotAscending {
                khz: pair[1].speed.khz,
            });
        }
    }
    for level in tables.levels {
        if level.l2 >= tables.l2_levels.len() {
            return Err(PlanError::L2OutOfRange {
                khz: level.speed.khz,
                l2: level.l2,
                count: tables.l2_levels.len(),
            });
        }
    }

    for (index, pair) in tables.l2_levels.windows(2).enumerate() {
        let (lower, upper) = (&pair[0], &pair[1]);
        if upper.speed.khz <= lower.speed.khz {
            return Err(PlanError::NotAscending {
                khz: upper.speed.khz,
            });
        }
        if upper.vdd_dig < lower.vdd_dig
            || upper.vdd_mem < lower.vdd_mem
            || upper.bw_tier < lower.bw_tier
        {
            return Err(PlanError::L2NotMonotonic { index: index + 1 });
        }
    }
    Ok(())
}
