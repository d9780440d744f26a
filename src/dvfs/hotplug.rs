// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Handling of CPU hotplug events.

use super::Dvfs;
use crate::{
    clock::ParkedSelectors,
    error::DvfsError,
    platform::{Platform, PlatformImpl},
    reason::SetRateReason,
};
use log::debug;

/// A step in bringing a core online or taking it offline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CpuEvent {
    /// The core is about to stop, and is running this on itself with interrupts masked.
    Dying,
    /// The core has stopped.
    Dead,
    /// Bringing the core online was abandoned.
    UpCanceled,
    /// The core is about to be brought online.
    UpPrepare,
    /// The core has started, and is running this on itself with interrupts masked.
    Starting,
}

/// The power management framework's view of the cores.
pub trait PowerFramework {
    /// Returns whether the core is online.
    fn is_online(&self, core: usize) -> bool;

    /// Returns whether the core is in a state where it can safely be left on a non-PLL source
    /// while its power-down path is running.
    fn can_power_collapse(&self, core: usize) -> bool;

    /// Returns the index of the core this is running on.
    fn current_core(&self) -> usize;

    /// Runs `f` on every online core and waits for all of them to finish.
    fn on_each_online_core(&self, f: &(dyn Fn() + Sync));
}

/// What a core's domain needs to remember while it is offline.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(super) struct HotplugMemo {
    prev_khz: Option<u32>,
    parked: Option<ParkedSelectors>,
}

impl Dvfs {
    /// Updates the clocks of `core` for a hotplug event.
    ///
    /// `Dying` and `Starting` are delivered on the core itself, and are refused anywhere else.
    pub fn handle_cpu_event(&self, core: usize, event: CpuEvent) -> Result<(), DvfsError> {
        let domain = self.cores.get(core).ok_or(DvfsError::InvalidCore(core))?;
        debug!("CPU{core} hotplug event {event:?}");

        match event {
            CpuEvent::Dying => {
                self.check_running_on(core)?;
                if PlatformImpl::parks_dying_core() {
                    let mut domain = domain.lock();
                    let parked = domain.clock.park_on_standby();
                    domain.hotplug.parked = Some(parked);
                }
                Ok(())
            }
            CpuEvent::Dead => {
                {
                    let mut domain = domain.lock();
                    domain.hotplug.prev_khz = Some(domain.clock.current().khz);
                }
                self.unplug(core)
            }
            CpuEvent::UpCanceled => self.unplug(core),
            CpuEvent::UpPrepare => {
                let (clocks_initialised, regulators_initialised, prev_khz) = {
                    let domain = domain.lock();
                    (
                        domain.clocks_initialised,
                        domain.regulators_initialised,
                        domain.hotplug.prev_khz,
                    )
                };
                if clocks_initialised && let Some(prev_khz) = prev_khz {
                    self.set_rate(core, prev_khz, SetRateReason::Hotplug)?;
                }
                if !regulators_initialised {
                    self.init_regulators(core)?;
                }
                Ok(())
            }
            CpuEvent::Starting => {
                self.check_running_on(core)?;
                let mut domain = domain.lock();
                if !domain.clocks_initialised {
                    self.init_core_clocks(core, &mut domain);
                } else if let Some(parked) = domain.hotplug.parked.take() {
                    domain.clock.restore_selectors(parked);
                }
                Ok(())
            }
        }
    }

    /// Drops an offline core to the standby speed.
    fn unplug(&self, core: usize) -> Result<(), DvfsError> {
        if self.cores[core].lock().clocks_initialised {
            self.set_rate(core, self.plan.standby_khz(), SetRateReason::Hotplug)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::DomainId,
        dvfs::tests::{boot, boot_with},
        platform::{Event, TestPlatform},
        rails::RailKind,
        tables::CoreSpeed,
    };

    fn last_cpmr(trace: &[Event], core: usize) -> Option<u32> {
        trace.iter().rev().find_map(|event| match event {
            Event::Cpmr(DomainId::Core(c), value) if *c == core => Some(*value),
            _ => None,
        })
    }

    #[test]
    fn unplug_and_replug_restores_rate() {
        let (dvfs, harness) = boot();
        TestPlatform::run_on_core(1, || {
            dvfs.set_rate(1, 702_000, SetRateReason::Scaling).unwrap();
            dvfs.handle_cpu_event(1, CpuEvent::Dying).unwrap();
        });
        dvfs.handle_cpu_event(1, CpuEvent::Dead).unwrap();
        assert_eq!(dvfs.get_rate(1), Ok(CoreSpeed::STANDBY_KHZ));
        assert_eq!(dvfs.l2_vote(1), Ok(0));

        dvfs.handle_cpu_event(1, CpuEvent::UpPrepare).unwrap();
        assert_eq!(dvfs.get_rate(1), Ok(702_000));
        assert_eq!(dvfs.l2_vote(1), Ok(2));
        TestPlatform::run_on_core(1, || dvfs.handle_cpu_event(1, CpuEvent::Starting)).unwrap();
        assert_eq!(dvfs.get_rate(1), Ok(702_000));
        assert!(harness.foreign_mux_accesses().is_empty());
    }

    #[test]
    fn hotplug_keeps_core_rail() {
        let (dvfs, _) = boot();
        let core_uv = dvfs.rail_voltage(DomainId::Core(1), RailKind::Core);

        dvfs.handle_cpu_event(1, CpuEvent::Dead).unwrap();
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(1), RailKind::Core),
            core_uv
        );
        dvfs.handle_cpu_event(1, CpuEvent::UpPrepare).unwrap();
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(1), RailKind::Core),
            core_uv
        );
    }

    #[test]
    fn dying_core_is_parked_and_restored_on_start() {
        let (dvfs, harness) = boot();
        assert!(TestPlatform::parks_dying_core());
        TestPlatform::run_on_core(2, || {
            dvfs.set_rate(2, 384_000, SetRateReason::Scaling).unwrap();
            let running = last_cpmr(&harness.trace(), 2);
            assert!(running.is_some());

            dvfs.handle_cpu_event(2, CpuEvent::Dying).unwrap();
            let parked = last_cpmr(&harness.trace(), 2).unwrap();
            assert_eq!(parked & 0xF, 0);

            dvfs.handle_cpu_event(2, CpuEvent::Starting).unwrap();
            assert_eq!(last_cpmr(&harness.trace(), 2), running);
        });
    }

    #[test]
    fn dying_and_starting_are_refused_on_another_core() {
        let (dvfs, harness) = boot();

        for event in [CpuEvent::Dying, CpuEvent::Starting] {
            assert_eq!(
                dvfs.handle_cpu_event(2, event),
                Err(DvfsError::WrongCore {
                    core: 2,
                    current: 0
                })
            );
        }
        assert!(harness.trace().iter().all(|event| !matches!(
            event,
            Event::Cpmr(DomainId::Core(2), _)
        )));
        assert!(harness.foreign_mux_accesses().is_empty());
    }

    #[test]
    fn up_canceled_drops_to_standby() {
        let (dvfs, _) = boot();

        dvfs.handle_cpu_event(3, CpuEvent::UpCanceled).unwrap();
        assert_eq!(dvfs.get_rate(3), Ok(dvfs.power_collapse_khz()));
    }

    #[test]
    fn core_offline_at_boot_is_brought_up_on_first_plug() {
        let (dvfs, harness) = boot_with(|harness| harness.set_online(3, false));
        assert_eq!(
            dvfs.set_rate(3, 384_000, SetRateReason::Hotplug),
            Err(DvfsError::NotInitialised(3))
        );
        assert_eq!(dvfs.rail_voltage(DomainId::Core(3), RailKind::Core), Some(0));
        assert_eq!(dvfs.l2_vote(3), Ok(0));

        dvfs.handle_cpu_event(3, CpuEvent::UpCanceled).unwrap();
        dvfs.handle_cpu_event(3, CpuEvent::UpPrepare).unwrap();
        assert!(
            harness
                .trace()
                .contains(&Event::Enable(TestPlatform::core_rail_id(3)))
        );
        assert_eq!(
            dvfs.rail_voltage(DomainId::Core(3), RailKind::Core),
            Some(1_100_000)
        );

        harness.set_online(3, true);
        TestPlatform::run_on_core(3, || dvfs.handle_cpu_event(3, CpuEvent::Starting)).unwrap();
        assert_eq!(dvfs.get_rate(3), Ok(918_000));
        assert_eq!(dvfs.l2_vote(3), Ok(3));
        assert!(harness.foreign_mux_accesses().is_empty());
    }

    #[test]
    fn init_this_core_brings_up_only_the_calling_core() {
        let (dvfs, harness) = boot_with(|harness| harness.set_online(2, false));
        harness.set_online(2, true);

        dvfs.init_this_core().unwrap();
        assert!(harness.hardware_trace().is_empty());
        assert_eq!(dvfs.l2_vote(2), Ok(0));
        assert_eq!(
            dvfs.set_rate(2, 384_000, SetRateReason::Hotplug),
            Err(DvfsError::NotInitialised(2))
        );

        TestPlatform::run_on_core(2, || dvfs.init_this_core()).unwrap();
        assert_eq!(dvfs.get_rate(2), Ok(918_000));
        assert_eq!(dvfs.l2_vote(2), Ok(3));
        assert!(harness.foreign_mux_accesses().is_empty());
    }

    #[test]
    fn unknown_core_is_rejected() {
        let (dvfs, _) = boot();
        assert_eq!(
            dvfs.handle_cpu_event(7, CpuEvent::Starting),
            Err(DvfsError::InvalidCore(7))
        );
    }
}
