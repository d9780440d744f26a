// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The quad core APQ8064.

use super::{
    Hardware, Platform,
    msm::{
        ACC_AUX_CLK_SEL, APCS_GCC_BASE, HFPLL_BASE, KraitBandwidth, KraitClockRegisters,
        KraitFootprint, KraitLogSink, KraitPower, KraitRails, L2_AUX_CLK_SEL, L2_VOTER,
        L2CPMR_IADDR, L2CPUCPMR_IADDR, RPM_L24, RPM_S3, claim_hardware, log_sink, read_midr,
        read_pte_efuse,
    },
};
use crate::{
    errata::{KraitMinimumVoltage, define_errata_list},
    logger,
    rails::{DomainRails, RailConfig, RailId},
    tables::{CoreSpeed, FreqTables, L2Level, PerformanceLevel, PllVddTable, SpeedBin},
};
use arm_sysregs::MidrEl1;

define_errata_list!(KraitMinimumVoltage);

const ACC_BASES: [usize; Apq8064::CORE_COUNT] =
    [0x0208_8000, 0x0209_8000, 0x020A_8000, 0x020B_8000];
const HFPLL_OFFSETS: [usize; Apq8064::CORE_COUNT] = [0x200, 0x240, 0x280, 0x2C0];
const L2_HFPLL_OFFSET: usize = 0x300;

const VOTERS: [u32; Apq8064::CORE_COUNT] = [1, 2, 4, 5];
const RPM_LVS7: u32 = 37;

const CORE_NAMES: [&str; Apq8064::CORE_COUNT] = ["krait0", "krait1", "krait2", "krait3"];
const MEM_NAMES: [&str; Apq8064::CORE_COUNT] =
    ["krait0_mem", "krait1_mem", "krait2_mem", "krait3_mem"];
const DIG_NAMES: [&str; Apq8064::CORE_COUNT] =
    ["krait0_dig", "krait1_dig", "krait2_dig", "krait3_dig"];
const PLL_NAMES: [&str; Apq8064::CORE_COUNT] = ["hfpll0", "hfpll1", "hfpll2", "hfpll3"];

const PLL_VDD: PllVddTable = PllVddTable {
    none: 0,
    low: 945_000,
    nominal: 1_050_000,
};

static L2_LEVELS: [L2Level; 16] = [
    L2Level::new(CoreSpeed::STANDBY, 1_050_000, 1_050_000, 0),
    L2Level::new(CoreSpeed::shared_pll(384_000), 1_050_000, 1_050_000, 1),
    L2Level::new(CoreSpeed::hfpll_div2(432_000, 0x20), 1_050_000, 1_050_000, 2),
    L2Level::new(CoreSpeed::hfpll_div2(486_000, 0x24), 1_050_000, 1_050_000, 2),
    L2Level::new(CoreSpeed::hfpll_div2(540_000, 0x28), 1_050_000, 1_050_000, 2),
    L2Level::new(CoreSpeed::hfpll(594_000, 0x16), 1_050_000, 1_050_000, 2),
    L2Level::new(CoreSpeed::hfpll(648_000, 0x18), 1_050_000, 1_050_000, 4),
    L2Level::new(CoreSpeed::hfpll(702_000, 0x1A), 1_050_000, 1_050_000, 4),
    L2Level::new(CoreSpeed::hfpll(756_000, 0x1C), 1_150_000, 1_150_000, 4),
    L2Level::new(CoreSpeed::hfpll(810_000, 0x1E), 1_150_000, 1_150_000, 4),
    L2Level::new(CoreSpeed::hfpll(864_000, 0x20), 1_150_000, 1_150_000, 4),
    L2Level::new(CoreSpeed::hfpll(918_000, 0x22), 1_150_000, 1_150_000, 7),
    L2Level::new(CoreSpeed::hfpll(972_000, 0x24), 1_150_000, 1_150_000, 7),
    L2Level::new(CoreSpeed::hfpll(1_026_000, 0x26), 1_150_000, 1_150_000, 7),
    L2Level::new(CoreSpeed::hfpll(1_080_000, 0x28), 1_150_000, 1_150_000, 7),
    L2Level::new(CoreSpeed::hfpll(1_134_000, 0x2A), 1_150_000, 1_150_000, 7),
];

static SLOW: [PerformanceLevel; 23] = [
    PerformanceLevel::new(false, CoreSpeed::STANDBY, 0, 950_000),
    PerformanceLevel::new(true, CoreSpeed::shared_pll(384_000), 1, 950_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll_div2(432_000, 0x20), 7, 975_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll_div2(486_000, 0x24), 7, 975_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll_div2(540_000, 0x28), 7, 1_000_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(594_000, 0x16), 7, 1_000_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(648_000, 0x18), 7, 1_025_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(702_000, 0x1A), 7, 1_025_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(756_000, 0x1C), 7, 1_075_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(810_000, 0x1E), 7, 1_075_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(864_000, 0x20), 7, 1_100_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(918_000, 0x22), 7, 1_100_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(972_000, 0x24), 7, 1_125_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_026_000, 0x26), 7, 1_125_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_080_000, 0x28), 15, 1_175_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_134_000, 0x2A), 15, 1_175_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_188_000, 0x2C), 15, 1_200_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_242_000, 0x2E), 15, 1_200_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_296_000, 0x30), 15, 1_225_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_350_000, 0x32), 15, 1_225_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_404_000, 0x34), 15, 1_237_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_458_000, 0x36), 15, 1_237_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_512_000, 0x38), 15, 1_250_000),
];

static NOM: [PerformanceLevel; 23] = [
    PerformanceLevel::new(false, CoreSpeed::STANDBY, 0, 900_000),
    PerformanceLevel::new(true, CoreSpeed::shared_pll(384_000), 1, 900_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll_div2(432_000, 0x20), 7, 925_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll_div2(486_000, 0x24), 7, 925_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll_div2(540_000, 0x28), 7, 950_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(594_000, 0x16), 7, 950_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(648_000, 0x18), 7, 975_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(702_000, 0x1A), 7, 975_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(756_000, 0x1C), 7, 1_025_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(810_000, 0x1E), 7, 1_025_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(864_000, 0x20), 7, 1_050_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(918_000, 0x22), 7, 1_050_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(972_000, 0x24), 7, 1_075_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_026_000, 0x26), 7, 1_075_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_080_000, 0x28), 15, 1_125_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_134_000, 0x2A), 15, 1_125_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_188_000, 0x2C), 15, 1_150_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_242_000, 0x2E), 15, 1_150_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_296_000, 0x30), 15, 1_175_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_350_000, 0x32), 15, 1_175_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_404_000, 0x34), 15, 1_187_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_458_000, 0x36), 15, 1_187_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_512_000, 0x38), 15, 1_200_000),
];

static FAST: [PerformanceLevel; 23] = [
    PerformanceLevel::new(false, CoreSpeed::STANDBY, 0, 850_000),
    PerformanceLevel::new(true, CoreSpeed::shared_pll(384_000), 1, 850_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll_div2(432_000, 0x20), 7, 875_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll_div2(486_000, 0x24), 7, 875_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll_div2(540_000, 0x28), 7, 900_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(594_000, 0x16), 7, 900_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(648_000, 0x18), 7, 925_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(702_000, 0x1A), 7, 925_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(756_000, 0x1C), 7, 975_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(810_000, 0x1E), 7, 975_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(864_000, 0x20), 7, 1_000_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(918_000, 0x22), 7, 1_000_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(972_000, 0x24), 7, 1_025_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_026_000, 0x26), 7, 1_025_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_080_000, 0x28), 15, 1_075_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_134_000, 0x2A), 15, 1_075_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_188_000, 0x2C), 15, 1_100_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_242_000, 0x2E), 15, 1_100_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_296_000, 0x30), 15, 1_125_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_350_000, 0x32), 15, 1_125_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_404_000, 0x34), 15, 1_137_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_458_000, 0x36), 15, 1_137_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_512_000, 0x38), 15, 1_150_000),
];

static SLOW_TABLES: FreqTables = FreqTables {
    levels: &SLOW,
    l2_levels: &L2_LEVELS,
    pll_vdd: PLL_VDD,
};

static NOM_TABLES: FreqTables = FreqTables {
    levels: &NOM,
    l2_levels: &L2_LEVELS,
    pll_vdd: PLL_VDD,
};

static FAST_TABLES: FreqTables = FreqTables {
    levels: &FAST,
    l2_levels: &L2_LEVELS,
    pll_vdd: PLL_VDD,
};

/// The APQ8064 SoC.
pub struct Apq8064;

impl Platform for Apq8064 {
    const CORE_COUNT: usize = 4;
    const BANDWIDTH_TIER_COUNT: usize = 8;
    const MAX_SCALING_KHZ: u32 = 918_000;
    const REGULATORS_AFTER_CLOCKS: bool = true;

    type LogSinkImpl = KraitLogSink;
    type ClockRegistersImpl = KraitClockRegisters;
    type RailBackendImpl = KraitRails;
    type BandwidthBackendImpl = KraitBandwidth;
    type PowerFrameworkImpl = KraitPower;
    type FootprintImpl = KraitFootprint;

    fn init_before_dvfs() {
        logger::init(log_sink()).expect("Failed to initialise logger");
    }

    fn speed_bin() -> SpeedBin {
        SpeedBin::from_efuse(read_pte_efuse(), true)
    }

    fn midr() -> MidrEl1 {
        read_midr()
    }

    fn freq_tables(bin: SpeedBin) -> Option<&'static FreqTables> {
        Some(match bin {
            SpeedBin::Slow => &SLOW_TABLES,
            SpeedBin::Nominal => &NOM_TABLES,
            SpeedBin::Fast | SpeedBin::Faster => &FAST_TABLES,
        })
    }

    fn core_rails(core: usize) -> DomainRails {
        let voter = VOTERS[core];
        DomainRails {
            core: Some(RailConfig::new(
                CORE_NAMES[core],
                RailId::Regulator(core as u32),
                1_300_000,
            )),
            mem: Some(RailConfig::new(
                MEM_NAMES[core],
                RailId::Rpm { id: RPM_L24, voter },
                1_150_000,
            )),
            dig: Some(RailConfig::new(
                DIG_NAMES[core],
                RailId::Rpm { id: RPM_S3, voter },
                1_150_000,
            )),
            pll_a: None,
            pll_b: Some(RailConfig::new(
                PLL_NAMES[core],
                RailId::Rpm { id: RPM_LVS7, voter },
                1_800_000,
            )),
        }
    }

    fn l2_rails() -> DomainRails {
        DomainRails {
            pll_b: Some(RailConfig::new(
                "hfpll_l2",
                RailId::Rpm {
                    id: RPM_LVS7,
                    voter: L2_VOTER,
                },
                1_800_000,
            )),
            ..Default::default()
        }
    }

    fn parks_dying_core() -> bool {
        false
    }

    fn hardware() -> Option<Hardware> {
        if !claim_hardware() {
            return None;
        }
        let core_clocks = [0, 1, 2, 3].map(|core| {
            // SAFETY: The HFPLL and ACC blocks of each core are only used here, and each core
            // gets its own.
            unsafe {
                KraitClockRegisters::new(
                    HFPLL_BASE + HFPLL_OFFSETS[core],
                    ACC_BASES[core] + ACC_AUX_CLK_SEL,
                    L2CPUCPMR_IADDR,
                )
            }
        });
        // SAFETY: The L2 HFPLL and the L2 auxiliary selector are only used here.
        let l2_clocks = unsafe {
            KraitClockRegisters::new(
                HFPLL_BASE + L2_HFPLL_OFFSET,
                APCS_GCC_BASE + L2_AUX_CLK_SEL,
                L2CPMR_IADDR,
            )
        };
        Some(Hardware {
            core_clocks,
            l2_clocks,
            rails: KraitRails,
            bandwidth: KraitBandwidth,
            power: KraitPower,
            // SAFETY: `claim_hardware` ensures this is only done once.
            footprint: unsafe { KraitFootprint::new() },
        })
    }
}
