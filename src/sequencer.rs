// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Ordering of voltage changes around a frequency change.
//!
//! Rails are raised before the clock speeds up, memory first, and lowered after it slows down,
//! core first.

use crate::{
    error::DvfsError,
    rails::{RailBackend, RailKind, RailSet},
    tables::{FreqPlan, PerformanceLevel},
};
use log::error;

const INCREASE_ORDER: [RailKind; 3] = [RailKind::Mem, RailKind::Dig, RailKind::Core];
const DECREASE_ORDER: [RailKind; 3] = [RailKind::Core, RailKind::Dig, RailKind::Mem];

/// The voltages a core domain needs for one performance level, in µV.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VoltageTargets {
    /// The core rail.
    pub core_uv: u32,
    /// The L2 memory rail.
    pub mem_uv: u32,
    /// The L2 digital rail, including what the L2 HFPLL needs.
    pub dig_uv: u32,
}

impl VoltageTargets {
    /// Works out the rail voltages needed to run at `level`.
    pub fn for_level(plan: &FreqPlan, level: &PerformanceLevel) -> Self {
        let l2 = plan.l2_level(level.l2);
        Self {
            core_uv: level.vdd_core,
            mem_uv: l2.vdd_mem,
            dig_uv: l2.vdd_dig.max(plan.pll_vdd().vdd_for(&l2.speed)),
        }
    }

    fn get(&self, kind: RailKind) -> u32 {
        match kind {
            RailKind::Core => self.core_uv,
            RailKind::Mem => self.mem_uv,
            RailKind::Dig => self.dig_uv,
            RailKind::PllA | RailKind::PllB => 0,
        }
    }
}

/// Raises every rail whose target is above its current voltage.
///
/// The first failure is returned. Rails which were already raised are left where they are.
pub fn increase(
    rails: &mut RailSet,
    backend: &impl RailBackend,
    targets: &VoltageTargets,
    skip_core: bool,
) -> Result<(), DvfsError> {
    for kind in INCREASE_ORDER {
        if skip_core && kind == RailKind::Core {
            continue;
        }
        let target = targets.get(kind);
        if rails.current_uv(kind).is_some_and(|current| target > current) {
            rails.set(backend, kind, target).inspect_err(|e| {
                error!("Voltage increase failed: {e}");
            })?;
        }
    }
    Ok(())
}

/// Lowers every rail whose target is below its current voltage.
///
/// A failure is logged and stops the remaining rails from being lowered.
pub fn decrease(
    rails: &mut RailSet,
    backend: &impl RailBackend,
    targets: &VoltageTargets,
    skip_core: bool,
) {
    for kind in DECREASE_ORDER {
        if skip_core && kind == RailKind::Core {
            continue;
        }
        let target = targets.get(kind);
        if rails.current_uv(kind).is_some_and(|current| target < current) {
            if let Err(e) = rails.set(backend, kind, target) {
                error!("Voltage decrease failed: {e}");
                return;
            }
        }
    }
}
