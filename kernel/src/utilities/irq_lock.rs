// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Spin lock usable from both thread and interrupt context.

use spin::Mutex;

use crate::hil::interrupt::InterruptControl;

/// A spin lock that disables local interrupt delivery while held.
///
/// Critical sections must be short and must never block: the lock can be
/// taken by an interrupt handler, and with interrupts off nothing else runs on
/// this CPU until the closure returns.
pub struct IrqSpinLock<T> {
    inner: Mutex<T>,
}

impl<T> IrqSpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Run `f` with the protected value, interrupts disabled through `irq`.
    pub fn lock_irqsave<R>(&self, irq: &dyn InterruptControl, f: impl FnOnce(&mut T) -> R) -> R {
        let flags = irq.save_and_disable();
        let ret = {
            let mut guard = self.inner.lock();
            f(&mut guard)
        };
        irq.restore(flags);
        ret
    }
}
