// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The voltage rails feeding each clock domain, with a cache of what was last programmed.

use crate::error::{BackendError, DvfsError};

/// The rails which a clock domain may have.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum RailKind {
    /// The CPU core supply.
    Core,
    /// The L2 memory supply.
    Mem,
    /// The L2 digital logic supply.
    Dig,
    /// The first HFPLL analog supply.
    PllA,
    /// The second HFPLL analog supply.
    PllB,
}

impl RailKind {
    const COUNT: usize = 5;

    const fn index(self) -> usize {
        match self {
            Self::Core => 0,
            Self::Mem => 1,
            Self::Dig => 2,
            Self::PllA => 3,
            Self::PllB => 4,
        }
    }
}

/// How the rail backend addresses a rail.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RailId {
    /// A regulator owned by this processor.
    Regulator(u32),
    /// A regulator owned by the resource power manager, voted for on behalf of one voter.
    Rpm {
        /// The RPM regulator ID.
        id: u32,
        /// The voter casting the vote.
        voter: u32,
    },
}

/// The static description of a rail.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RailConfig {
    /// The name used in logs.
    pub name: &'static str,
    /// The address of the rail in the backend.
    pub id: RailId,
    /// The highest voltage the rail may be set to, in µV.
    pub max_uv: u32,
}

impl RailConfig {
    /// Creates a new rail description.
    pub const fn new(name: &'static str, id: RailId, max_uv: u32) -> Self {
        Self { name, id, max_uv }
    }
}

/// The rails of one clock domain. CPU domains have core, memory and digital rails; all domains
/// have one or both HFPLL supplies.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DomainRails {
    /// The CPU core supply.
    pub core: Option<RailConfig>,
    /// The L2 memory supply.
    pub mem: Option<RailConfig>,
    /// The L2 digital logic supply.
    pub dig: Option<RailConfig>,
    /// The first HFPLL analog supply.
    pub pll_a: Option<RailConfig>,
    /// The second HFPLL analog supply.
    pub pll_b: Option<RailConfig>,
}

/// Performs voltage changes on behalf of the rate-change engine.
pub trait RailBackend {
    /// Requests the given voltage on a rail, bounded above by `max_uv`.
    ///
    /// A request for 0 µV with a maximum of 0 µV withdraws the vote.
    fn set_voltage(&self, rail: RailId, uv: u32, max_uv: u32) -> Result<(), BackendError>;

    /// Turns on a rail.
    fn enable(&self, rail: RailId) -> Result<(), BackendError>;
}

/// A rail and the voltage it was last successfully set to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VoltageRail {
    config: RailConfig,
    current_uv: u32,
}

/// The rails of one clock domain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RailSet {
    rails: [Option<VoltageRail>; RailKind::COUNT],
}

impl RailSet {
    /// Creates a rail set with every rail assumed to be off.
    pub fn new(config: &DomainRails) -> Self {
        let mut rails = [None; RailKind::COUNT];
        for (kind, rail) in [
            (RailKind::Core, config.core),
            (RailKind::Mem, config.mem),
            (RailKind::Dig, config.dig),
            (RailKind::PllA, config.pll_a),
            (RailKind::PllB, config.pll_b),
        ] {
            rails[kind.index()] = rail.map(|config| VoltageRail {
                config,
                current_uv: 0,
            });
        }
        Self { rails }
    }

    /// Returns the voltage last programmed on the given rail, or `None` if the domain has no such
    /// rail.
    pub fn current_uv(&self, kind: RailKind) -> Option<u32> {
        self.rails[kind.index()].map(|rail| rail.current_uv)
    }

    /// Sets the given rail to `uv`.
    ///
    /// Nothing is written if the rail already has that voltage or the domain has no such rail.
    /// Setting 0 µV withdraws the vote entirely.
    pub fn set(
        &mut self,
        backend: &impl RailBackend,
        kind: RailKind,
        uv: u32,
    ) -> Result<(), DvfsError> {
        let Some(rail) = &mut self.rails[kind.index()] else {
            return Ok(());
        };
        if rail.current_uv == uv {
            return Ok(());
        }
        let max_uv = if uv == 0 { 0 } else { rail.config.max_uv };
        backend
            .set_voltage(rail.config.id, uv, max_uv)
            .map_err(|code| DvfsError::Rail {
                rail: rail.config.name,
                code,
            })?;
        rail.current_uv = uv;
        Ok(())
    }

    /// Turns on the given rail, if the domain has it.
    pub fn enable(&self, backend: &impl RailBackend, kind: RailKind) -> Result<(), DvfsError> {
        let Some(rail) = &self.rails[kind.index()] else {
            return Ok(());
        };
        backend
            .enable(rail.config.id)
            .map_err(|code| DvfsError::Rail {
                rail: rail.config.name,
                code,
            })
    }
}
