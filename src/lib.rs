// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Dynamic voltage and frequency scaling for Krait CPU clusters.
//!
//! Each core has its own clock domain and core rail, and all cores share an L2 whose speed,
//! voltage and bus bandwidth follow the highest requirement of any core. [`init`] selects the
//! frequency plan for the part and brings every online core up at its maximum level, after which
//! the engine returned by [`get`] changes core frequencies on request.

#![cfg_attr(not(test), no_std)]

mod arch;
mod clock;
mod debug;
mod dvfs;
mod errata;
mod error;
mod logger;
mod platform;
mod rails;
mod reason;
mod sequencer;
mod sync;
mod tables;
mod votes;

pub use clock::{ClockRegisters, DomainId, PllRegister};
pub use dvfs::{BandwidthBackend, CpuEvent, Dvfs, Footprint, PowerFramework, TransitionStage};
pub use error::{BackendError, DvfsError, PlanError};
pub use rails::{RailBackend, RailId, RailKind};
pub use reason::SetRateReason;
pub use tables::{
    ClockSource, CoreSpeed, FreqPlan, L2Level, MAX_SCALING_FREQUENCIES, PerformanceLevel,
    PllVddTable, PrimarySource, SecondarySource, SpeedBin,
};

use crate::platform::{ERRATA_LIST, Platform, PlatformImpl};
use core::sync::atomic::{AtomicBool, Ordering};
use log::info;
use spin::Once;

static INIT_STARTED: AtomicBool = AtomicBool::new(false);
static DVFS: Once<Dvfs> = Once::new();

/// Selects the frequency plan for this part, takes the platform's clock hardware and brings every
/// online core and the L2 up at the maximum level.
///
/// Only the first call does anything; every later call fails with
/// [`DvfsError::AlreadyInitialised`].
///
/// # Panics
///
/// Panics if the platform has no frequency tables for the speed bin of this part.
pub fn init() -> Result<&'static Dvfs, DvfsError> {
    if INIT_STARTED.swap(true, Ordering::AcqRel) {
        return Err(DvfsError::AlreadyInitialised);
    }
    PlatformImpl::init_before_dvfs();

    DVFS.try_call_once(|| {
        let bin = PlatformImpl::speed_bin();
        let Some(tables) = PlatformImpl::freq_tables(bin) else {
            panic!("No frequency plan for speed bin {bin:?}");
        };
        let plan = FreqPlan::load(
            tables,
            PlatformImpl::midr(),
            &ERRATA_LIST,
            PlatformImpl::MAX_SCALING_KHZ,
        )?;
        let hardware = PlatformImpl::hardware().ok_or(DvfsError::AlreadyInitialised)?;
        let dvfs = Dvfs::new(plan, hardware)?;
        info!("Krait DVFS initialised");
        Ok(dvfs)
    })
}

/// Returns the rate-change engine, if [`init`] has succeeded.
pub fn get() -> Option<&'static Dvfs> {
    DVFS.get()
}
