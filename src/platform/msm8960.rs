// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The dual core MSM8960.

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

const ACC_BASES: [usize; Msm8960::CORE_COUNT] = [0x0208_8000, 0x0209_8000];
const HFPLL_OFFSETS: [usize; Msm8960::CORE_COUNT] = [0x200, 0x300];
const L2_HFPLL_OFFSET: usize = 0x400;

const VOTERS: [u32; Msm8960::CORE_COUNT] = [1, 2];
const RPM_S8: u32 = 8;
const RPM_L23: u32 = 23;

const CORE_NAMES: [&str; Msm8960::CORE_COUNT] = ["krait0", "krait1"];
const MEM_NAMES: [&str; Msm8960::CORE_COUNT] = ["krait0_mem", "krait1_mem"];
const DIG_NAMES: [&str; Msm8960::CORE_COUNT] = ["krait0_dig", "krait1_dig"];
const PLL_A_NAMES: [&str; Msm8960::CORE_COUNT] = ["hfpll0_s8", "hfpll1_s8"];
const PLL_B_NAMES: [&str; Msm8960::CORE_COUNT] = ["hfpll0_l23", "hfpll1_l23"];

const PLL_VDD: PllVddTable = PllVddTable {
    none: 0,
    low: 850_000,
    nominal: 1_050_000,
};

static L2_KRAIT_V1: [L2Level; 12] = [
    L2Level::new(CoreSpeed::STANDBY, 1_050_000, 1_050_000, 0),
    L2Level::new(CoreSpeed::shared_pll(384_000), 1_050_000, 1_050_000, 1),
    L2Level::new(CoreSpeed::hfpll_div2(432_000, 0x20), 1_050_000, 1_050_000, 1),
    L2Level::new(CoreSpeed::hfpll_div2(486_000, 0x24), 1_050_000, 1_050_000, 1),
    L2Level::new(CoreSpeed::hfpll_div2(540_000, 0x28), 1_050_000, 1_050_000, 1),
    L2Level::new(CoreSpeed::hfpll(594_000, 0x16), 1_050_000, 1_050_000, 2),
    L2Level::new(CoreSpeed::hfpll(648_000, 0x18), 1_050_000, 1_050_000, 2),
    L2Level::new(CoreSpeed::hfpll(702_000, 0x1A), 1_050_000, 1_050_000, 2),
    L2Level::new(CoreSpeed::hfpll(756_000, 0x1C), 1_150_000, 1_150_000, 2),
    L2Level::new(CoreSpeed::hfpll(810_000, 0x1E), 1_150_000, 1_150_000, 3),
    L2Level::new(CoreSpeed::hfpll(864_000, 0x20), 1_150_000, 1_150_000, 3),
    L2Level::new(CoreSpeed::hfpll(918_000, 0x22), 1_150_000, 1_150_000, 3),
];

static KRAIT_V1_SLOW: [PerformanceLevel; 12] = [
    PerformanceLevel::new(false, CoreSpeed::STANDBY, 0, 900_000),
    PerformanceLevel::new(true, CoreSpeed::shared_pll(384_000), 1, 900_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll_div2(432_000, 0x20), 6, 925_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll_div2(486_000, 0x24), 6, 925_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll_div2(540_000, 0x28), 6, 937_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(594_000, 0x16), 6, 962_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(648_000, 0x18), 6, 987_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(702_000, 0x1A), 6, 1_000_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(756_000, 0x1C), 11, 1_025_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(810_000, 0x1E), 11, 1_062_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(864_000, 0x20), 11, 1_062_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(918_000, 0x22), 11, 1_087_500),
];

static KRAIT_V1_NOM_FAST: [PerformanceLevel; 12] = [
    PerformanceLevel::new(false, CoreSpeed::STANDBY, 0, 862_500),
    PerformanceLevel::new(true, CoreSpeed::shared_pll(384_000), 1, 862_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll_div2(432_000, 0x20), 6, 862_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll_div2(486_000, 0x24), 6, 887_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll_div2(540_000, 0x28), 6, 900_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(594_000, 0x16), 6, 925_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(648_000, 0x18), 6, 925_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(702_000, 0x1A), 6, 937_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(756_000, 0x1C), 11, 962_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(810_000, 0x1E), 11, 1_012_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(864_000, 0x20), 11, 1_025_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(918_000, 0x22), 11, 1_025_000),
];

static L2_KRAIT_V2: [L2Level; 20] = [
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
    L2Level::new(CoreSpeed::hfpll(918_000, 0x22), 1_150_000, 1_150_000, 6),
    L2Level::new(CoreSpeed::hfpll(972_000, 0x24), 1_150_000, 1_150_000, 6),
    L2Level::new(CoreSpeed::hfpll(1_026_000, 0x26), 1_150_000, 1_150_000, 6),
    L2Level::new(CoreSpeed::hfpll(1_080_000, 0x28), 1_150_000, 1_150_000, 6),
    L2Level::new(CoreSpeed::hfpll(1_134_000, 0x2A), 1_150_000, 1_150_000, 6),
    L2Level::new(CoreSpeed::hfpll(1_188_000, 0x2C), 1_150_000, 1_150_000, 6),
    L2Level::new(CoreSpeed::hfpll(1_242_000, 0x2E), 1_150_000, 1_150_000, 6),
    L2Level::new(CoreSpeed::hfpll(1_296_000, 0x30), 1_150_000, 1_150_000, 6),
    L2Level::new(CoreSpeed::hfpll(1_350_000, 0x32), 1_150_000, 1_150_000, 6),
];

static KRAIT_V2_SLOW: [PerformanceLevel; 23] = [
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
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_080_000, 0x28), 19, 1_175_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_134_000, 0x2A), 19, 1_175_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_188_000, 0x2C), 19, 1_200_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_242_000, 0x2E), 19, 1_200_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_296_000, 0x30), 19, 1_225_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_350_000, 0x32), 19, 1_225_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_404_000, 0x34), 19, 1_237_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_458_000, 0x36), 19, 1_237_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_512_000, 0x38), 19, 1_250_000),
];

static KRAIT_V2_NOM: [PerformanceLevel; 23] = [
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
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_080_000, 0x28), 19, 1_125_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_134_000, 0x2A), 19, 1_125_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_188_000, 0x2C), 19, 1_150_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_242_000, 0x2E), 19, 1_150_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_296_000, 0x30), 19, 1_175_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_350_000, 0x32), 19, 1_175_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_404_000, 0x34), 19, 1_187_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_458_000, 0x36), 19, 1_187_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_512_000, 0x38), 19, 1_200_000),
];

static KRAIT_V2_FAST: [PerformanceLevel; 23] = [
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
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_080_000, 0x28), 19, 1_075_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_134_000, 0x2A), 19, 1_075_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_188_000, 0x2C), 19, 1_100_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_242_000, 0x2E), 19, 1_100_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_296_000, 0x30), 19, 1_125_000),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_350_000, 0x32), 19, 1_125_000),
    PerformanceLevel::new(false, CoreSpeed::hfpll(1_404_000, 0x34), 19, 1_137_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_458_000, 0x36), 19, 1_137_500),
    PerformanceLevel::new(true, CoreSpeed::hfpll(1_512_000, 0x38), 19, 1_150_000),
];

static KRAIT_V1_SLOW_TABLES: FreqTables = FreqTables {
    levels: &KRAIT_V1_SLOW,
    l2_levels: &L2_KRAIT_V1,
    pll_vdd: PLL_VDD,
};

static KRAIT_V1_NOM_FAST_TABLES: FreqTables = FreqTables {
    levels: &KRAIT_V1_NOM_FAST,
    l2_levels: &L2_KRAIT_V1,
    pll_vdd: PLL_VDD,
};

static KRAIT_V2_SLOW_TABLES: FreqTables = FreqTables {
    levels: &KRAIT_V2_SLOW,
    l2_levels: &L2_KRAIT_V2,
    pll_vdd: PLL_VDD,
};

static KRAIT_V2_NOM_TABLES: FreqTables = FreqTables {
    levels: &KRAIT_V2_NOM,
    l2_levels: &L2_KRAIT_V2,
    pll_vdd: PLL_VDD,
};

static KRAIT_V2_FAST_TABLES: FreqTables = FreqTables {
    levels: &KRAIT_V2_FAST,
    l2_levels: &L2_KRAIT_V2,
    pll_vdd: PLL_VDD,
};

/// Returns whether the CPU is one of the first Krait revisions.
fn is_krait_v1(midr: MidrEl1) -> bool {
    matches!(midr.bits(), 0x510F_04D0 | 0x511F_04D0 | 0x511F_04D1)
}

/// The MSM8960 SoC.
pub struct Msm8960;

impl Platform for Msm8960 {
    const CORE_COUNT: usize = 2;
    const BANDWIDTH_TIER_COUNT: usize = 8;

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
        SpeedBin::from_efuse(read_pte_efuse(), false)
    }

    fn midr() -> MidrEl1 {
        read_midr()
    }

    fn freq_tables(bin: SpeedBin) -> Option<&'static FreqTables> {
        if is_krait_v1(Self::midr()) {
            match bin {
                SpeedBin::Slow => Some(&KRAIT_V1_SLOW_TABLES),
                SpeedBin::Nominal | SpeedBin::Fast => Some(&KRAIT_V1_NOM_FAST_TABLES),
                SpeedBin::Faster => None,
            }
        } else {
            match bin {
                SpeedBin::Slow => Some(&KRAIT_V2_SLOW_TABLES),
                SpeedBin::Nominal => Some(&KRAIT_V2_NOM_TABLES),
                SpeedBin::Fast => Some(&KRAIT_V2_FAST_TABLES),
                SpeedBin::Faster => None,
            }
        }
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
            pll_a: Some(RailConfig::new(
                PLL_A_NAMES[core],
                RailId::Rpm { id: RPM_S8, voter },
                2_100_000,
            )),
            pll_b: Some(RailConfig::new(
                PLL_B_NAMES[core],
                RailId::Rpm { id: RPM_L23, voter },
                1_800_000,
            )),
        }
    }

    fn l2_rails() -> DomainRails {
        DomainRails {
            pll_a: Some(RailConfig::new(
                "hfpll_l2_s8",
                RailId::Rpm {
                    id: RPM_S8,
                    voter: L2_VOTER,
                },
                2_100_000,
            )),
            pll_b: Some(RailConfig::new(
                "hfpll_l2_l23",
                RailId::Rpm {
                    id: RPM_L23,
                    voter: L2_VOTER,
                },
                1_800_000,
            )),
            ..Default::default()
        }
    }

    fn parks_dying_core() -> bool {
        is_krait_v1(Self::midr())
    }

    fn hardware() -> Option<Hardware> {
        if !claim_hardware() {
            return None;
        }
        let core_clocks = [0, 1].map(|core| {
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
