// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! A lock which can be taken from contexts with interrupts masked.

use crate::platform::exception_free;
use percore::ExceptionLock;
use spin::mutex::SpinMutex;

/// A spin lock which is only ever held with exceptions masked on the holding core.
///
/// This makes it safe to take from an exception handler or hotplug callback, as the holder can't
/// be interrupted by a path which tries to take it again on the same core.
pub struct IrqSafeMutex<T> {
    inner: ExceptionLock<SpinMutex<T>>,
}

impl<T> IrqSafeMutex<T> {
    /// Creates a new unlocked mutex.
    pub const fn new(value: T) -> Self {
        Self {
            inner: ExceptionLock::new(SpinMutex::new(value)),
        }
    }

    /// Masks exceptions, takes the lock and runs `f` on the protected value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        exception_free(|token| f(&mut self.inner.borrow(token).lock()))
    }
}
