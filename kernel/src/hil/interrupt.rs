// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Control over interrupt delivery on the local execution context.

/// Opaque interrupt state returned by
/// [`InterruptControl::save_and_disable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrqFlags(pub usize);

/// Disables and restores interrupt delivery on the current CPU.
///
/// This masks every interrupt source on the local context, not just the
/// device's own line, so a lock taken from both thread and interrupt context
/// cannot be re-entered by a handler while held.
pub trait InterruptControl {
    fn save_and_disable(&self) -> IrqFlags;
    fn restore(&self, flags: IrqFlags);
}

/// Implementation of `InterruptControl` for platforms where the driver's
/// interrupt handler never preempts the thread using the lock, e.g. when the
/// handler is dispatched from the main loop.
pub struct NoInterruptControl {}

impl InterruptControl for NoInterruptControl {
    fn save_and_disable(&self) -> IrqFlags {
        IrqFlags(0)
    }

    fn restore(&self, _flags: IrqFlags) {}
}

/// Instance of `NoInterruptControl` for passing to drivers.
pub static NO_INTERRUPT_CONTROL: NoInterruptControl = NoInterruptControl {};
