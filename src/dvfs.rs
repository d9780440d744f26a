// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The rate-change engine: per-core transitions and the shared L2 domain they drive.

mod hotplug;

pub use hotplug::{CpuEvent, PowerFramework};

use crate::{
    arch::delay_us,
    clock::{ClockDomain, DomainId, SwitchMode},
    error::{BackendError, DvfsError},
    platform::{
        BandwidthBackendImpl, ClockRegistersImpl, FootprintImpl, Hardware, Platform,
        PlatformImpl, PowerFrameworkImpl, RailBackendImpl,
    },
    rails::{RailKind, RailSet},
    reason::{Caller, SetRateReason},
    sequencer::{self, VoltageTargets},
    sync::IrqSafeMutex,
    tables::{FreqPlan, L2Level, MAX_SCALING_FREQUENCIES},
    votes::L2Votes,
};
use arrayvec::ArrayVec;
use hotplug::HotplugMemo;
use log::{debug, error, info};
use num_enum::IntoPrimitive;
use spin::mutex::SpinMutex;

/// Time for the rails to settle after being raised, before the clock speeds up.
const VOLTAGE_SETTLE_US: u32 = 60;

/// Requests interconnect bandwidth for the L2.
pub trait BandwidthBackend {
    /// Votes for the given bandwidth tier.
    fn set_bandwidth_tier(&self, tier: usize) -> Result<(), BackendError>;
}

/// The steps of a transition, in the order they are reached.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq)]
#[repr(u32)]
pub enum TransitionStage {
    /// The request was accepted.
    Entered = 1,
    /// The serialization lock is held, if the reason needs it.
    Locked = 2,
    /// Rails needing a higher voltage have been raised.
    VoltageRaised = 3,
    /// The core's clock domain has been switched.
    CoreSwitched = 4,
    /// The L2 has been moved to the new effective level.
    L2Switched = 5,
    /// The bandwidth vote has been updated.
    BandwidthSet = 6,
    /// Rails needing a lower voltage have been lowered.
    VoltageLowered = 7,
    /// The transition has finished, successfully or not.
    Done = 8,
}

/// Records the progress of transitions somewhere that survives a crash.
///
/// All methods default to doing nothing.
pub trait Footprint {
    /// Records that `core` has reached `stage` of a transition.
    fn record_stage(&self, _core: usize, _stage: TransitionStage) {}

    /// Records the frequency `core` has just switched to.
    fn record_core_khz(&self, _core: usize, _khz: u32) {}

    /// Records the frequency the L2 has just switched to.
    fn record_l2_khz(&self, _khz: u32) {}
}

/// The state of one CPU core's domain.
struct CoreDomain {
    clock: ClockDomain<ClockRegistersImpl>,
    clocks_initialised: bool,
    regulators_initialised: bool,
    hotplug: HotplugMemo,
}

/// The state of the shared L2 domain.
struct L2Domain {
    clock: ClockDomain<ClockRegistersImpl>,
    votes: L2Votes<{ PlatformImpl::CORE_COUNT }>,
}

/// Scales the frequency and voltage of every core and of the L2 they share.
///
/// Locks are always taken in the same order: the serialization lock, then a core's domain, then
/// the L2 domain.
pub struct Dvfs {
    plan: FreqPlan,
    transition_lock: SpinMutex<()>,
    cores: [SpinMutex<CoreDomain>; PlatformImpl::CORE_COUNT],
    l2: IrqSafeMutex<L2Domain>,
    rails: RailBackendImpl,
    bandwidth: BandwidthBackendImpl,
    power: PowerFrameworkImpl,
    footprint: FootprintImpl,
}

impl Dvfs {
    /// Takes ownership of the clock hardware and brings every online core and the L2 up at the
    /// plan's maximum level.
    pub(crate) fn new(plan: FreqPlan, hardware: Hardware) -> Result<Self, DvfsError> {
        let Hardware {
            core_clocks,
            l2_clocks,
            rails,
            bandwidth,
            power,
            footprint,
        } = hardware;

        let mut core = 0;
        let cores = core_clocks.map(|regs| {
            let domain_rails = RailSet::new(&PlatformImpl::core_rails(core));
            core += 1;
            SpinMutex::new(CoreDomain {
                clock: ClockDomain::new(regs, domain_rails),
                clocks_initialised: false,
                regulators_initialised: false,
                hotplug: HotplugMemo::default(),
            })
        });
        let l2 = IrqSafeMutex::new(L2Domain {
            clock: ClockDomain::new(l2_clocks, RailSet::new(&PlatformImpl::l2_rails())),
            votes: L2Votes::new(plan.l2_levels().len()),
        });

        let dvfs = Self {
            plan,
            transition_lock: SpinMutex::new(()),
            cores,
            l2,
            rails,
            bandwidth,
            power,
            footprint,
        };
        dvfs.bring_up()?;
        Ok(dvfs)
    }

    fn online_cores(&self) -> impl Iterator<Item = usize> + '_ {
        (0..PlatformImpl::CORE_COUNT).filter(|&core| self.power.is_online(core))
    }

    fn bring_up(&self) -> Result<(), DvfsError> {
        if !PlatformImpl::REGULATORS_AFTER_CLOCKS {
            for core in self.online_cores() {
                self.init_regulators(core)?;
            }
        }

        let max_l2 = self.plan.l2_level(self.plan.max_level().l2);
        self.set_bandwidth(max_l2.bw_tier);
        self.l2
            .with(|l2| l2.clock.init_clock_sources(&max_l2.speed, &self.rails));

        self.power.on_each_online_core(&|| {
            if let Err(e) = self.init_this_core() {
                error!("Clock initialisation failed: {e}");
            }
        });

        if PlatformImpl::REGULATORS_AFTER_CLOCKS {
            for core in self.online_cores() {
                self.init_regulators(core)?;
            }
        }

        info!(
            "{} scaling frequencies supported",
            self.plan.scaling_frequencies().len()
        );
        Ok(())
    }

    /// Sets the core's rails to what the maximum level needs and turns on its core rail.
    fn init_regulators(&self, core: usize) -> Result<(), DvfsError> {
        let targets = VoltageTargets::for_level(&self.plan, self.plan.max_level());
        let mut domain = self.cores[core].lock();
        let rails = domain.clock.rails_mut();
        for (kind, uv) in [
            (RailKind::Mem, targets.mem_uv),
            (RailKind::Dig, targets.dig_uv),
            (RailKind::Core, targets.core_uv),
        ] {
            rails.set(&self.rails, kind, uv).inspect_err(|e| {
                error!("CPU{core} regulator initialisation failed: {e}");
            })?;
        }
        rails.enable(&self.rails, RailKind::Core).inspect_err(|e| {
            error!("CPU{core} core rail enable failed: {e}");
        })?;
        domain.regulators_initialised = true;
        Ok(())
    }

    /// Brings up the clocks of the core this is running on, if that hasn't been done yet.
    ///
    /// This must be run on each core as it starts, as a core's clock muxes can only be reached
    /// from the core itself. Cores which are online when the engine is created are brought up by
    /// then.
    pub fn init_this_core(&self) -> Result<(), DvfsError> {
        self.handle_cpu_event(self.power.current_core(), CpuEvent::Starting)
    }

    /// Fails unless this is running on `core`.
    fn check_running_on(&self, core: usize) -> Result<(), DvfsError> {
        let current = self.power.current_core();
        if current == core {
            Ok(())
        } else {
            Err(DvfsError::WrongCore { core, current })
        }
    }

    /// Brings the core's clock domain up at the maximum level and casts its L2 vote.
    ///
    /// Must run on `core`.
    fn init_core_clocks(&self, core: usize, domain: &mut CoreDomain) {
        let max = self.plan.max_level();
        domain.clock.init_clock_sources(&max.speed, &self.rails);
        self.update_l2_vote(core, max.l2);
        domain.clocks_initialised = true;
    }

    /// Records the core's new L2 vote and moves the L2 to the resulting effective level.
    fn update_l2_vote(&self, core: usize, level: usize) -> &'static L2Level {
        self.l2.with(|l2| {
            let effective = self.plan.l2_level(l2.votes.cast_vote(core, level));
            l2.clock
                .switch_to(&effective.speed, SwitchMode::Full, &self.rails);
            self.footprint.record_l2_khz(effective.speed.khz);
            effective
        })
    }

    fn set_bandwidth(&self, tier: usize) {
        if tier >= PlatformImpl::BANDWIDTH_TIER_COUNT {
            error!("Invalid bandwidth request ({tier})");
            return;
        }
        if let Err(e) = self.bandwidth.set_bandwidth_tier(tier) {
            error!("Bandwidth request failed: {e}");
        }
    }

    /// Changes the frequency of `core` to `khz`.
    ///
    /// Fails if `khz` isn't in the frequency plan or a rail can't be raised; in either case the
    /// clocks are left as they were. A failure to lower a rail afterwards is only logged.
    ///
    /// Only hotplug requests may be made for a core other than the one this is running on. Other
    /// scaling requests are ignored, and idle entry requests are refused.
    pub fn set_rate(&self, core: usize, khz: u32, reason: SetRateReason) -> Result<(), DvfsError> {
        if core >= PlatformImpl::CORE_COUNT {
            return Err(DvfsError::InvalidCore(core));
        }
        let policy = reason.policy();
        if policy.skip_if_offline && !self.power.is_online(core) {
            info!("Not changing frequency of offline CPU{core}");
            return Ok(());
        }
        match policy.caller {
            Caller::AnyCore => {}
            Caller::TargetCoreOrIgnore => {
                let current = self.power.current_core();
                if current != core {
                    info!("CPU{current} not changing frequency of CPU{core}");
                    return Ok(());
                }
            }
            Caller::TargetCore => self.check_running_on(core)?,
        }

        self.footprint.record_stage(core, TransitionStage::Entered);
        let result = {
            let _serialized = policy
                .requires_serialization
                .then(|| self.transition_lock.lock());
            self.footprint.record_stage(core, TransitionStage::Locked);
            self.transition(core, khz, reason)
        };
        self.footprint.record_stage(core, TransitionStage::Done);
        result
    }

    fn transition(&self, core: usize, khz: u32, reason: SetRateReason) -> Result<(), DvfsError> {
        let policy = reason.policy();
        let mut domain = self.cores[core].lock();
        if !domain.clocks_initialised {
            return Err(DvfsError::NotInitialised(core));
        }
        let level = *self
            .plan
            .level_for_khz(khz)
            .ok_or(DvfsError::InvalidFrequency(khz))?;
        let start_khz = domain.clock.current().khz;
        if khz == start_khz {
            return Ok(());
        }

        let targets = VoltageTargets::for_level(&self.plan, &level);
        sequencer::increase(
            domain.clock.rails_mut(),
            &self.rails,
            &targets,
            policy.skip_core_rail,
        )?;
        self.footprint
            .record_stage(core, TransitionStage::VoltageRaised);

        debug!("Switching from CPU{core} rate {start_khz} kHz -> {khz} kHz");
        delay_us(VOLTAGE_SETTLE_US);

        let mode = if !policy.restrict_own_domain {
            SwitchMode::Full
        } else if self.power.can_power_collapse(core) {
            SwitchMode::PllOnly
        } else {
            debug!("CPU{core} can't power collapse, leaving its clocks alone");
            SwitchMode::Skip
        };
        domain.clock.switch_to(&level.speed, mode, &self.rails);
        self.footprint.record_core_khz(core, khz);
        self.footprint
            .record_stage(core, TransitionStage::CoreSwitched);

        let l2 = self.update_l2_vote(core, level.l2);
        self.footprint.record_stage(core, TransitionStage::L2Switched);

        if !policy.skip_bandwidth {
            self.set_bandwidth(l2.bw_tier);
            self.footprint
                .record_stage(core, TransitionStage::BandwidthSet);
        }
        if !policy.skip_decrease {
            sequencer::decrease(
                domain.clock.rails_mut(),
                &self.rails,
                &targets,
                policy.skip_core_rail,
            );
            self.footprint
                .record_stage(core, TransitionStage::VoltageLowered);
        }

        debug!("CPU{core} speed change complete");
        Ok(())
    }

    /// Returns the frequency `core` is running at, in kHz.
    pub fn get_rate(&self, core: usize) -> Result<u32, DvfsError> {
        let domain = self.cores.get(core).ok_or(DvfsError::InvalidCore(core))?;
        Ok(domain.lock().clock.current().khz)
    }

    /// Returns the frequency the L2 is running at, in kHz.
    pub fn l2_rate(&self) -> u32 {
        self.l2.with(|l2| l2.clock.current().khz)
    }

    /// Returns the index of the L2 level `core` currently needs.
    pub fn l2_vote(&self, core: usize) -> Result<usize, DvfsError> {
        if core >= PlatformImpl::CORE_COUNT {
            return Err(DvfsError::InvalidCore(core));
        }
        Ok(self.l2.with(|l2| l2.votes.vote(core)))
    }

    /// Returns the voltage last set on a rail of the given domain, if the domain has that rail.
    pub fn rail_voltage(&self, domain: DomainId, kind: RailKind) -> Option<u32> {
        match domain {
            DomainId::Core(core) => self.cores.get(core)?.lock().clock.rails().current_uv(kind),
            DomainId::L2 => self.l2.with(|l2| l2.clock.rails().current_uv(kind)),
        }
    }

    /// Returns the frequency a core should be switched to before power collapse, in kHz.
    pub fn power_collapse_khz(&self) -> u32 {
        self.plan.standby_khz()
    }

    /// Returns the frequency a core should be switched to before waiting for an interrupt, in kHz.
    pub fn wait_for_irq_khz(&self) -> u32 {
        self.plan.standby_khz()
    }

    /// Returns the frequencies offered to the frequency governor, in ascending order.
    pub fn scaling_frequencies(&self) -> ArrayVec<u32, MAX_SCALING_FREQUENCIES> {
        self.plan.scaling_frequencies()
    }

    /// Returns the frequency plan in use.
    pub fn plan(&self) -> &FreqPlan {
        &self.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{HFPLL_VDD_B_UV, PllRegister},
        platform::{ERRATA_LIST, Event, TestHarness, TestPlatform},
        tables::{CoreSpeed, SpeedBin},
    };
    use arm_sysregs::MidrEl1;

    pub(super) fn boot() -> (Dvfs, TestHarness) {
        boot_with(|_| {})
    }

    /// Boots with the harness adjusted by `setup` first.
    pub(super) fn boot_with(setup: impl FnOnce(&TestHarness)) -> (Dvfs, TestHarness) {
        let tables = PlatformImpl::freq_tables(SpeedBin::Nominal).unwrap();
        let plan = FreqPlan::load(
            tables,
            MidrEl1::empty(),
            &ERRATA_LIST,
            PlatformImpl::MAX_SCALING_KHZ,
        )
        .unwrap();
        let (hardware, harness) = TestPlatform::fake_hardware();
        setup(&harness);
        let dvfs = Dvfs::new(plan, hardware).unwrap();
        harness.clear();
        (dvfs, harness)
    }

    /// Scales `core` to `khz`, running on the core itself.
    fn scale_on(dvfs: &Dvfs, core: usize, khz: u32) {
        TestPlatform::run_on_core(core, || dvfs.set_rate(core, khz, SetRateReason::Scaling))
            .unwrap();
    }

    /// Checks that the L2 runs at the level of the highest vote.
    fn assert_l2_follows_votes(dvfs: &Dvfs) {
        let (khz, effective) = dvfs.l2.with(|l2| {
            let effective = (0..PlatformImpl::CORE_COUNT)
                .map(|core| l2.votes.vote(core))
                .max()
                .unwrap();
            (l2.clock.current().khz, effective)
        });
        assert_eq!(khz, dvfs.plan.l2_level(effective).speed.khz);
    }

    /// Returns the rail and clock state of every domain.
    fn snapshot(dvfs: &Dvfs) -> Vec<(DomainId, u32, [Option<u32>; 5])> {
        (0..PlatformImpl::CORE_COUNT)
            .map(DomainId::Core)
            .chain([DomainId::L2])
            .map(|domain| {
                let khz = match domain {
                    DomainId::Core(core) => dvfs.get_rate(core).unwrap(),
                    DomainId::L2 => dvfs.l2_rate(),
                };
                let rails = [
                    RailKind::Core,
                    RailKind::Mem,
                    RailKind::Dig,
                    RailKind::PllA,
                    RailKind::PllB,
                ]
                .map(|kind| dvfs.rail_voltage(domain, kind));
                (domain, khz, rails)
            })
            .collect()
    }

    fn is_core_domain_rail_write(event: &Event, core: usize) -> bool {
        matches!(
            event,
            Event::Voltage(rail, _)
                if [
                    TestPlatform::core_rail_id(core),
                    TestPlatform::mem_rail_id(core),
                    TestPlatform::dig_rail_id(core),
                ]
                .contains(rail)
        )
    }

    fn is_clock_write(event: &Event, domain: DomainId) -> bool {
        matches!(
            event,
            Event::Cpmr(d, _) | Event::Pll(d, _, _) | Event::AuxClkSel(d, _) if *d == domain
        )
    }

    #[test]
    fn boots_every_domain_at_the_maximum_level() {
        let (hardware, harness) = TestPlatform::fake_hardware();
        let tables = PlatformImpl::freq_tables(SpeedBin::Nominal).unwrap();
        let plan = FreqPlan::load(tables, MidrEl1::empty(), &ERRATA_LIST, u32::MAX).unwrap();
        let dvfs = Dvfs::new(plan, hardware).unwrap();

        for core in 0..PlatformImpl::CORE_COUNT {
            assert_eq!(dvfs.get_rate(core), Ok(918_000));
            assert_eq!(dvfs.l2_vote(core), Ok(3));
            assert_eq!(
                dvfs.rail_voltage(DomainId::Core(core), RailKind::Core),
                Some(1_100_000)
            );
            assert_eq!(
                dvfs.rail_voltage(DomainId::Core(core), RailKind::Mem),
                Some(1_150_000)
            );
            assert_eq!(
                dvfs.rail_voltage(DomainId::Core(core), RailKind::Dig),
                Some(1_150_000)
            );
        }
        assert_eq!(dvfs.l2_rate(), 1_134_000);

        let trace = harness.trace();
        assert_eq!(
            trace[0],
            Event::Voltage(TestPlatform::mem_rail_id(0), 1_150_000)
        );
        assert!(trace.contains(&Event::Enable(TestPlatform::core_rail_id(3))));
        assert!(trace.contains(&Event::Bandwidth(7)));
        // Regulators come up before any clock is touched.
        let first_clock = trace
            .iter()
            .position(|event| matches!(event, Event::AuxClkSel(..)))
            .unwrap();
        let last_regulator = trace
            .iter()
            .rposition(|event| matches!(event, Event::Enable(_)))
            .unwrap();
        assert!(last_regulator < first_clock);
        // Each core's muxes were programmed from the core itself.
        assert!(harness.foreign_mux_accesses().is_empty());
        for core in 0..PlatformImpl::CORE_COUNT {
            assert!(trace.contains(&Event::Cpmr(DomainId::Core(core), 0x1)));
        }
    }

    #[test]
    fn l2_follows_the_highest_vote() {
        let (dvfs, _) = boot();

        scale_on(&dvfs, 0, 384_000);
        scale_on(&dvfs, 1, 702_000);
        scale_on(&dvfs, 2, 384_000);
        assert_eq!(dvfs.l2_rate(), 1_134_000);
        scale_on(&dvfs, 3, 384_000);
        assert_eq!(dvfs.l2_rate(), 648_000);

        scale_on(&dvfs, 1, 384_000);
        assert_eq!(dvfs.l2_vote(1), Ok(1));
        assert_eq!(dvfs.l2_rate(), 384_000);
    }

    #[test]
    fn bandwidth_follows_effective_l2_level() {
        let (dvfs, harness) = boot();
        for core in 0..PlatformImpl::CORE_COUNT {
            scale_on(&dvfs, core, 702_000);
        }
        assert_eq!(harness.bandwidth_requests(), [7, 7, 7, 4]);
    }

    #[test]
    fn same_rate_touches_no_hardware() {
        let (dvfs, harness) = boot();

        assert_eq!(dvfs.set_rate(0, 918_000, SetRateReason::Scaling), Ok(()));
        assert!(harness.hardware_trace().is_empty());
    }

    #[test]
    fn unknown_rate_is_rejected() {
        let (dvfs, harness) = boot();
        let before = snapshot(&dvfs);

        assert_eq!(
            dvfs.set_rate(0, 700_000, SetRateReason::Scaling),
            Err(DvfsError::InvalidFrequency(700_000))
        );
        assert!(harness.hardware_trace().is_empty());
        assert_eq!(snapshot(&dvfs), before);
    }

    #[test]
    fn unknown_core_is_rejected() {
        let (dvfs, _) = boot();
        assert_eq!(
            dvfs.set_rate(4, 384_000, SetRateReason::Scaling),
            Err(DvfsError::InvalidCore(4))
        );
        assert_eq!(dvfs.get_rate(4), Err(DvfsError::InvalidCore(4)));
        assert_eq!(dvfs.l2_vote(4), Err(DvfsError::InvalidCore(4)));
    }

    #[test]
    fn rails_rise_before_speeding_up() {
        let (dvfs, harness) = boot();
        dvfs.set_rate(0, 384_000, SetRateReason::Scaling).unwrap();
        harness.clear();

        dvfs.set_rate(0, 918_000, SetRateReason::Scaling).unwrap();

        let trace = harness.trace();
        let last_rail = trace
            .iter()
            .rposition(|event| is_core_domain_rail_write(event, 0))
            .unwrap();
        let first_clock = trace
            .iter()
            .position(|event| is_clock_write(event, DomainId::Core(0)))
            .unwrap();
        assert!(last_rail < first_clock);
        assert_eq!(
            trace
                .iter()
                .filter(|event| is_core_domain_rail_write(event, 0))
                .cloned()
                .collect::<Vec<_>>(),
            [
                Event::Voltage(TestPlatform::mem_rail_id(0), 1_150_000),
                Event::Voltage(TestPlatform::dig_rail_id(0), 1_150_000),
                Event::Voltage(TestPlatform::core_rail_id(0), 1_100_000),
            ]
        );
    }

    #[test]
    fn rails_fall_after_slowing_down() {
        let (dvfs, harness) = boot();

        dvfs.set_rate(0, 384_000, SetRateReason::Scaling).unwrap();

        let trace = harness.trace();
        let first_rail = trace
            .iter()
            .position(|event| is_core_domain_rail_write(event, 0))
            .unwrap();
        let last_clock = trace
            .iter()
            .rposition(|event| is_clock_write(event, DomainId::Core(0)))
            .unwrap();
        assert!(last_clock < first_rail);
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(0), RailKind::Core),
            Some(950_000)
        );
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(0), RailKind::Dig),
            Some(1_050_000)
        );
    }

    #[test]
    fn round_trip_restores_every_domain() {
        let (dvfs, _) = boot();
        let frequencies = dvfs.scaling_frequencies();

        for &a in &frequencies {
            for &b in &frequencies {
                scale_on(&dvfs, 1, a);
                let before = snapshot(&dvfs);

                scale_on(&dvfs, 1, a);
                scale_on(&dvfs, 1, b);
                scale_on(&dvfs, 1, a);

                assert_eq!(snapshot(&dvfs), before, "{a} kHz -> {b} kHz -> {a} kHz");
            }
        }
    }

    #[test]
    fn hotplug_never_touches_core_rail() {
        let (dvfs, harness) = boot();

        dvfs.set_rate(2, CoreSpeed::STANDBY_KHZ, SetRateReason::Hotplug)
            .unwrap();
        assert_eq!(dvfs.get_rate(2), Ok(CoreSpeed::STANDBY_KHZ));
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(2), RailKind::Core),
            Some(1_100_000)
        );
        assert!(!harness.trace().iter().any(|event| matches!(
            event,
            Event::Voltage(rail, _) if *rail == TestPlatform::core_rail_id(2)
        )));

        dvfs.set_rate(2, 918_000, SetRateReason::Hotplug).unwrap();
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(2), RailKind::Core),
            Some(1_100_000)
        );
        assert!(!harness.trace().iter().any(|event| matches!(
            event,
            Event::Voltage(rail, _) if *rail == TestPlatform::core_rail_id(2)
        )));
    }

    #[test]
    fn hotplug_only_toggles_pll_of_collapsible_core() {
        let (dvfs, harness) = boot();

        dvfs.set_rate(2, CoreSpeed::STANDBY_KHZ, SetRateReason::Hotplug)
            .unwrap();
        let own_writes: Vec<_> = harness
            .trace()
            .into_iter()
            .filter(|event| is_clock_write(event, DomainId::Core(2)))
            .collect();
        assert_eq!(
            own_writes,
            [Event::Pll(DomainId::Core(2), PllRegister::Mode, 0)]
        );
    }

    #[test]
    fn hotplug_skips_clocks_of_core_which_cannot_collapse() {
        let (dvfs, harness) = boot();
        harness.set_can_power_collapse(2, false);

        dvfs.set_rate(2, CoreSpeed::STANDBY_KHZ, SetRateReason::Hotplug)
            .unwrap();
        assert_eq!(dvfs.get_rate(2), Ok(CoreSpeed::STANDBY_KHZ));
        assert!(
            !harness
                .trace()
                .iter()
                .any(|event| is_clock_write(event, DomainId::Core(2)))
        );
    }

    #[test]
    fn idle_entry_defers_bandwidth_and_lowering() {
        let (dvfs, harness) = boot();

        dvfs.set_rate(
            0,
            dvfs.power_collapse_khz(),
            SetRateReason::PowerCollapse,
        )
        .unwrap();
        assert_eq!(dvfs.get_rate(0), Ok(CoreSpeed::STANDBY_KHZ));
        assert!(harness.bandwidth_requests().is_empty());
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(0), RailKind::Core),
            Some(1_100_000)
        );

        // Coming back needs no voltage change, as nothing was lowered.
        harness.clear();
        dvfs.set_rate(0, 918_000, SetRateReason::WaitForInterrupt)
            .unwrap();
        assert!(
            !harness
                .trace()
                .iter()
                .any(|event| is_core_domain_rail_write(event, 0))
        );
    }

    #[test]
    fn offline_core_is_not_scaled() {
        let (dvfs, harness) = boot();
        harness.set_online(1, false);

        assert_eq!(dvfs.set_rate(1, 384_000, SetRateReason::Scaling), Ok(()));
        assert_eq!(dvfs.get_rate(1), Ok(918_000));
        assert!(harness.trace().is_empty());
    }

    #[test]
    fn increase_failure_leaves_clocks_alone() {
        let (dvfs, harness) = boot();
        dvfs.set_rate(0, 384_000, SetRateReason::Scaling).unwrap();
        harness.fail_rail(TestPlatform::dig_rail_id(0));
        harness.clear();

        assert_eq!(
            dvfs.set_rate(0, 918_000, SetRateReason::Scaling),
            Err(DvfsError::Rail {
                rail: "krait0_dig",
                code: TestHarness::FAILURE,
            })
        );
        assert_eq!(dvfs.get_rate(0), Ok(384_000));
        assert!(
            !harness
                .trace()
                .iter()
                .any(|event| is_clock_write(event, DomainId::Core(0)))
        );
        // The memory rail was raised first and stays raised.
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(0), RailKind::Mem),
            Some(1_150_000)
        );
    }

    #[test]
    fn decrease_failure_is_not_fatal() {
        let (dvfs, harness) = boot();
        harness.fail_rail(TestPlatform::core_rail_id(0));

        assert_eq!(dvfs.set_rate(0, 384_000, SetRateReason::Scaling), Ok(()));
        assert_eq!(dvfs.get_rate(0), Ok(384_000));
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(0), RailKind::Core),
            Some(1_100_000)
        );
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(0), RailKind::Mem),
            Some(1_150_000)
        );
    }

    #[test]
    fn stages_are_recorded_in_order() {
        let (dvfs, harness) = boot();

        dvfs.set_rate(0, 702_000, SetRateReason::Scaling).unwrap();
        assert_eq!(
            harness.stages(0),
            [
                TransitionStage::Entered,
                TransitionStage::Locked,
                TransitionStage::VoltageRaised,
                TransitionStage::CoreSwitched,
                TransitionStage::L2Switched,
                TransitionStage::BandwidthSet,
                TransitionStage::VoltageLowered,
                TransitionStage::Done,
            ]
        );
        assert!(harness.trace().contains(&Event::CoreKhz(0, 702_000)));
        assert!(harness.trace().contains(&Event::L2Khz(1_134_000)));

        harness.clear();
        dvfs.set_rate(0, 1, SetRateReason::WaitForInterrupt).unwrap();
        assert_eq!(
            harness.stages(0),
            [
                TransitionStage::Entered,
                TransitionStage::Locked,
                TransitionStage::VoltageRaised,
                TransitionStage::CoreSwitched,
                TransitionStage::L2Switched,
                TransitionStage::Done,
            ]
        );
    }

    #[test]
    fn scaling_another_core_is_ignored() {
        let (dvfs, harness) = boot();

        assert_eq!(dvfs.set_rate(1, 384_000, SetRateReason::Scaling), Ok(()));
        assert_eq!(dvfs.get_rate(1), Ok(918_000));
        assert!(harness.trace().is_empty());
    }

    #[test]
    fn idle_entry_for_another_core_is_refused() {
        let (dvfs, harness) = boot();

        for reason in [SetRateReason::PowerCollapse, SetRateReason::WaitForInterrupt] {
            assert_eq!(
                dvfs.set_rate(2, CoreSpeed::STANDBY_KHZ, reason),
                Err(DvfsError::WrongCore {
                    core: 2,
                    current: 0
                })
            );
        }
        assert_eq!(dvfs.get_rate(2), Ok(918_000));
        assert!(harness.hardware_trace().is_empty());
    }

    #[test]
    fn hotplug_from_another_core_leaves_its_muxes_alone() {
        let (dvfs, harness) = boot();

        dvfs.set_rate(3, 702_000, SetRateReason::Hotplug).unwrap();
        dvfs.set_rate(3, CoreSpeed::STANDBY_KHZ, SetRateReason::Hotplug)
            .unwrap();
        assert_eq!(dvfs.get_rate(3), Ok(CoreSpeed::STANDBY_KHZ));
        assert!(harness.foreign_mux_accesses().is_empty());
    }

    #[test]
    fn concurrent_transitions_keep_l2_at_highest_vote() {
        const ROUNDS: usize = 200;
        let (dvfs, harness) = boot();
        let frequencies = dvfs.scaling_frequencies();
        let reasons = [
            SetRateReason::Scaling,
            SetRateReason::PowerCollapse,
            SetRateReason::Hotplug,
            SetRateReason::Scaling,
            SetRateReason::WaitForInterrupt,
        ];

        std::thread::scope(|scope| {
            for core in 0..PlatformImpl::CORE_COUNT {
                let (dvfs, frequencies) = (&dvfs, &frequencies);
                scope.spawn(move || {
                    TestPlatform::run_on_core(core, || {
                        for round in 0..ROUNDS {
                            let khz = frequencies[(round * (core + 1)) % frequencies.len()];
                            let reason = reasons[(round + core) % reasons.len()];
                            dvfs.set_rate(core, khz, reason).unwrap();
                            assert_eq!(dvfs.get_rate(core), Ok(khz));
                            assert_l2_follows_votes(dvfs);
                        }
                    })
                });
            }
        });

        assert_l2_follows_votes(&dvfs);
        for core in 0..PlatformImpl::CORE_COUNT {
            let khz = dvfs.get_rate(core).unwrap();
            assert_eq!(
                dvfs.l2_vote(core),
                Ok(dvfs.plan().level_for_khz(khz).unwrap().l2)
            );
        }
        assert!(harness.foreign_mux_accesses().is_empty());
    }

    #[test]
    fn invalid_bandwidth_tier_is_not_sent() {
        let (dvfs, harness) = boot();
        dvfs.set_bandwidth(PlatformImpl::BANDWIDTH_TIER_COUNT);
        assert!(harness.bandwidth_requests().is_empty());
        dvfs.set_bandwidth(2);
        assert_eq!(harness.bandwidth_requests(), [2]);
    }

    #[test]
    fn idle_frequencies_are_the_lowest_level() {
        let (dvfs, _) = boot();
        assert_eq!(dvfs.power_collapse_khz(), CoreSpeed::STANDBY_KHZ);
        assert_eq!(dvfs.wait_for_irq_khz(), CoreSpeed::STANDBY_KHZ);
        assert_eq!(
            dvfs.scaling_frequencies().as_slice(),
            [384_000, 486_000, 702_000, 918_000]
        );
    }

    #[test]
    fn l2_has_only_pll_rails() {
        let (dvfs, _) = boot();
        assert_eq!(dvfs.rail_voltage(DomainId::L2, RailKind::Core), None);
        assert_eq!(
            dvfs.rail_voltage(DomainId::L2, RailKind::PllB),
            Some(HFPLL_VDD_B_UV)
        );
        assert_eq!(dvfs.rail_voltage(DomainId::Core(9), RailKind::Core), None);
    }
}
