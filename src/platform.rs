// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

macro_rules! select_platform {
    (platform = $condition:literal, $mod:ident::$plat_impl:ident) => {
        #[cfg(platform = $condition)]
        mod $mod;

        #[cfg(platform = $condition)]
        pub use $mod::{ERRATA_LIST, $plat_impl as PlatformImpl};
    };
    (test, $mod:ident::$plat_impl:ident) => {
        #[cfg(test)]
        mod $mod;

        #[cfg(test)]
        pub use $mod::{ERRATA_LIST, $plat_impl as PlatformImpl};
    };
}

#[cfg(any(platform = "msm8960", platform = "apq8064"))]
mod msm;

#[cfg(all(
    any(platform = "msm8960", platform = "apq8064"),
    not(target_arch = "arm")
))]
compile_error!("The Krait platforms must be built for a 32-bit Arm target");

select_platform!(platform = "msm8960", msm8960::Msm8960);
select_platform!(platform = "apq8064", apq8064::Apq8064);
select_platform!(test, test::TestPlatform);

use crate::{
    clock::ClockRegisters,
    dvfs::{BandwidthBackend, Footprint, PowerFramework},
    logger::LogSink,
    rails::{DomainRails, RailBackend},
    tables::{FreqTables, SpeedBin},
};
#[cfg(not(test))]
pub use crate::arch::exception_free;
use arm_sysregs::MidrEl1;
#[cfg(test)]
pub use test::{Event, TestHarness, TestPlatform, exception_free};

/// Type alias for convenience, to avoid having to use the complicated type name everywhere.
pub type LogSinkImpl = <PlatformImpl as Platform>::LogSinkImpl;
/// The platform's clock register access type.
pub type ClockRegistersImpl = <PlatformImpl as Platform>::ClockRegistersImpl;
/// The platform's voltage rail backend type.
pub type RailBackendImpl = <PlatformImpl as Platform>::RailBackendImpl;
/// The platform's bandwidth backend type.
pub type BandwidthBackendImpl = <PlatformImpl as Platform>::BandwidthBackendImpl;
/// The platform's power framework type.
pub type PowerFrameworkImpl = <PlatformImpl as Platform>::PowerFrameworkImpl;
/// The platform's footprint type.
pub type FootprintImpl = <PlatformImpl as Platform>::FootprintImpl;

/// The hardware and collaborators handed over to the rate-change engine.
pub struct Hardware {
    /// The clock registers of each CPU core.
    pub core_clocks: [ClockRegistersImpl; PlatformImpl::CORE_COUNT],
    /// The clock registers of the L2.
    pub l2_clocks: ClockRegistersImpl,
    /// The voltage rail backend.
    pub rails: RailBackendImpl,
    /// The interconnect bandwidth backend.
    pub bandwidth: BandwidthBackendImpl,
    /// The power management framework.
    pub power: PowerFrameworkImpl,
    /// Where transition progress is recorded.
    pub footprint: FootprintImpl,
}

/// The hooks implemented by all platforms.
pub trait Platform {
    /// The number of CPU cores.
    const CORE_COUNT: usize;

    /// The number of interconnect bandwidth tiers.
    const BANDWIDTH_TIER_COUNT: usize;

    /// The fastest frequency in kHz the cores may be brought up at.
    const MAX_SCALING_KHZ: u32 = u32::MAX;

    /// Whether the rails of each core are initialised after rather than before its clocks.
    const REGULATORS_AFTER_CLOCKS: bool = false;

    /// Platform dependent LogSink implementation type for Logger.
    type LogSinkImpl: LogSink;

    /// Access to the clock hardware of one domain.
    type ClockRegistersImpl: ClockRegisters + Send;

    /// Performs voltage changes.
    type RailBackendImpl: RailBackend + Send + Sync;

    /// Requests interconnect bandwidth.
    type BandwidthBackendImpl: BandwidthBackend + Send + Sync;

    /// Reports the state of the cores.
    type PowerFrameworkImpl: PowerFramework + Send + Sync;

    /// Records the progress of transitions.
    type FootprintImpl: Footprint + Send + Sync;

    /// Initialises the logger and anything else the platform needs. This will be called before
    /// the frequency plan is selected.
    ///
    /// Any logs sent before this is called will be ignored.
    fn init_before_dvfs();

    /// Returns the process variation bucket of this part.
    fn speed_bin() -> SpeedBin;

    /// Returns the tables for the given speed bin on this SoC, or `None` if there are none.
    fn freq_tables(bin: SpeedBin) -> Option<&'static FreqTables>;

    /// Returns the main ID register value used to decide which errata apply.
    fn midr() -> MidrEl1;

    /// Returns the rails feeding the given core's domain.
    fn core_rails(core: usize) -> DomainRails;

    /// Returns the rails feeding the L2 domain.
    fn l2_rails() -> DomainRails;

    /// Returns whether a core's muxes must be moved to the always-on source before it dies.
    fn parks_dying_core() -> bool;

    /// Returns the clock hardware and collaborators. The function should only be called once,
    /// when it returns `Some`. All subsequent calls must return `None`.
    fn hardware() -> Option<Hardware>;
}
