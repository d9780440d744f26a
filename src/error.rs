// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use thiserror::Error;

/// An opaque failure code reported by a platform collaborator such as a regulator driver or the
/// bus bandwidth client.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("backend error {0}")]
pub struct BackendError(pub i32);

/// A frequency plan which breaks one of the invariants the rate-change engine relies on.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum PlanError {
    /// There are no performance levels.
    #[error("performance level table is empty")]
    EmptyTable,
    /// There are no L2 levels.
    #[error("L2 level table is empty")]
    EmptyL2Table,
    /// A level is not strictly faster than the one before it.
    #[error("{khz} kHz is not above the preceding level")]
    NotAscending {
        /// The frequency of the offending level.
        khz: u32,
    },
    /// A performance level refers to an L2 level which doesn't exist.
    #[error("level at {khz} kHz refers to L2 level {l2}, but there are only {count}")]
    L2OutOfRange {
        /// The frequency of the offending performance level.
        khz: u32,
        /// The L2 level index it refers to.
        l2: usize,
        /// The number of L2 levels.
        count: usize,
    },
    /// An L2 level requires a lower voltage or bandwidth tier than the level below it.
    #[error("L2 level {index} requires less voltage or bandwidth than the level below it")]
    L2NotMonotonic {
        /// The index of the offending L2 level.
        index: usize,
    },
    /// No level may be used for scaling within the platform's frequency cap.
    #[error("no scaling level at or below {cap} kHz")]
    NoScalingLevel {
        /// The platform's frequency cap.
        cap: u32,
    },
    /// More levels are flagged for scaling than the frequency governor can be offered.
    #[error("table has {count} scaling levels, at most {capacity} are supported")]
    TooManyScalingLevels {
        /// The number of levels flagged for scaling.
        count: usize,
        /// The maximum number of scaling frequencies.
        capacity: usize,
    },
    /// The table doesn't fit in a frequency plan.
    #[error("table has {len} levels, at most {capacity} are supported")]
    TooManyLevels {
        /// The number of levels in the table.
        len: usize,
        /// The maximum number of levels in a plan.
        capacity: usize,
    },
}

/// Errors returned by the rate-change engine.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum DvfsError {
    /// The core index is not below the platform's core count.
    #[error("CPU{0} does not exist")]
    InvalidCore(usize),
    /// No performance level has the requested frequency.
    #[error("{0} kHz is not in the frequency plan")]
    InvalidFrequency(u32),
    /// The core's clocks were never brought up.
    #[error("clocks of CPU{0} have not been initialised")]
    NotInitialised(usize),
    /// The request may only be made by the core it is for.
    #[error("CPU{current} cannot change the clocks of CPU{core}")]
    WrongCore {
        /// The core the request was for.
        core: usize,
        /// The core the request was made on.
        current: usize,
    },
    /// The engine or its hardware has already been claimed.
    #[error("DVFS has already been initialised")]
    AlreadyInitialised,
    /// A voltage rail refused a new voltage.
    #[error("failed to set {rail}: {code}")]
    Rail {
        /// The name of the rail.
        rail: &'static str,
        /// The code returned by the rail backend.
        code: BackendError,
    },
    /// The selected frequency plan is inconsistent.
    #[error("invalid frequency plan: {0}")]
    Plan(#[from] PlanError),
}
