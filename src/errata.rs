// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! CPU errata which are worked around by adjusting the frequency plan once, after it has been
//! selected and before it is first used.

use crate::tables::PerformanceLevel;
use arm_sysregs::MidrEl1;
use log::info;

/// A unique identifier for an erratum.
pub type ErratumId = u32;

/// An erratum whose workaround is a transformation of the performance level table.
pub trait TableErratum {
    /// The erratum number assigned by the CPU vendor.
    const ID: ErratumId;

    /// Returns true if the CPU with the given main ID register value is affected.
    fn check(midr: MidrEl1) -> bool;

    /// Rewrites the performance levels so that the erratum can't be triggered.
    fn apply(levels: &mut [PerformanceLevel]);
}

/// A type-erased table erratum, for use in a platform's errata list.
#[derive(Clone, Copy, Debug)]
pub struct ErratumEntry {
    /// The erratum number.
    pub id: ErratumId,
    /// Returns whether the erratum applies to a given CPU.
    pub check: fn(MidrEl1) -> bool,
    /// Applies the workaround to a table.
    pub apply: fn(&mut [PerformanceLevel]),
}

impl ErratumEntry {
    /// Creates an `ErratumEntry` from an implementation of the `TableErratum` trait.
    pub const fn from_erratum<T: TableErratum>() -> Self {
        Self {
            id: T::ID,
            check: T::check,
            apply: T::apply,
        }
    }
}

/// Calculates the count of specified erratum types.
macro_rules! errata_count {
    () => { 0 };
    ($erratum:ty) => { 1 };
    ($erratum:ty, $($errata:ty),+) => {
        $crate::errata::errata_count!($erratum) + $crate::errata::errata_count!($($errata),+)
    };
}
pub(crate) use errata_count;

/// Declares the ERRATA_LIST array.
macro_rules! define_errata_list {
    ($($erratum:ty),*) => {
        pub static ERRATA_LIST: [$crate::errata::ErratumEntry; $crate::errata::errata_count!($($erratum),*)] = [
            $($crate::errata::ErratumEntry::from_erratum::<$erratum>()),*
        ];
    }
}
pub(crate) use define_errata_list;

/// Applies every erratum in `errata` which affects the CPU identified by `midr` to `levels`.
///
/// Returns the number of errata applied.
pub fn apply_table_errata(
    errata: &[ErratumEntry],
    midr: MidrEl1,
    levels: &mut [PerformanceLevel],
) -> usize {
    let mut applied = 0;
    for erratum in errata {
        if (erratum.check)(midr) {
            info!("Applying workaround for Krait erratum {}", erratum.id);
            (erratum.apply)(levels);
            applied += 1;
        } else {
            info!("No need to apply workaround for Krait erratum {}", erratum.id);
        }
    }
    applied
}

/// Krait erratum 26: the core is unstable below 1.15 V on some early revisions.
pub struct KraitMinimumVoltage;

impl KraitMinimumVoltage {
    /// The lowest core voltage in µV which is safe on affected parts.
    pub const VMIN_UV: u32 = 1_150_000;
}

impl TableErratum for KraitMinimumVoltage {
    const ID: ErratumId = 26;

    fn check(midr: MidrEl1) -> bool {
        matches!(midr.bits(), 0x511F_04D0 | 0x511F_04D1 | 0x510F_06F0)
    }

    fn apply(levels: &mut [PerformanceLevel]) {
        for level in levels {
            level.vdd_core = level.vdd_core.max(Self::VMIN_UV);
        }
    }
}
