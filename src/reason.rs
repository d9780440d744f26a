// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Why a rate change was requested, and which steps of the transition that implies.

/// The reason given for a rate change.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetRateReason {
    /// The frequency governor picked a new rate.
    Scaling,
    /// The core is about to enter power collapse.
    PowerCollapse,
    /// The core is about to wait for an interrupt.
    WaitForInterrupt,
    /// The core is being unplugged or plugged back in.
    Hotplug,
}

/// Which cores may request a transition for a given core.
///
/// A core's clock muxes can only be reached from the core itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Caller {
    /// Any core, as the target core's muxes are left alone.
    AnyCore,
    /// Only the target core. Requests made on other cores succeed without doing anything.
    TargetCoreOrIgnore,
    /// Only the target core. Requests made on other cores are refused.
    TargetCore,
}

/// The steps of a transition which depend on its reason.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReasonPolicy {
    /// Take the serialization lock for the whole transition.
    pub requires_serialization: bool,
    /// Leave the core rail alone.
    pub skip_core_rail: bool,
    /// Don't update the interconnect bandwidth.
    pub skip_bandwidth: bool,
    /// Don't lower any rails after the switch.
    pub skip_decrease: bool,
    /// Only do as much to the target core's own clock domain as is safe while it races with its
    /// power-down path.
    pub restrict_own_domain: bool,
    /// Succeed without doing anything if the core is offline.
    pub skip_if_offline: bool,
    /// Which cores may make the request.
    pub caller: Caller,
}

impl SetRateReason {
    /// Returns the policy for this reason.
    pub const fn policy(self) -> ReasonPolicy {
        match self {
            Self::Scaling => ReasonPolicy {
                requires_serialization: true,
                skip_core_rail: false,
                skip_bandwidth: false,
                skip_decrease: false,
                restrict_own_domain: false,
                skip_if_offline: true,
                caller: Caller::TargetCoreOrIgnore,
            },
            Self::Hotplug => ReasonPolicy {
                requires_serialization: true,
                skip_core_rail: true,
                skip_bandwidth: false,
                skip_decrease: false,
                restrict_own_domain: true,
                skip_if_offline: false,
                caller: Caller::AnyCore,
            },
            Self::PowerCollapse | Self::WaitForInterrupt => ReasonPolicy {
                requires_serialization: false,
                skip_core_rail: false,
                skip_bandwidth: true,
                skip_decrease: true,
                restrict_own_domain: false,
                skip_if_offline: false,
                caller: Caller::TargetCore,
            },
        }
    }
}
