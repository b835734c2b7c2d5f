// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Hardware agnostic interfaces for sleeping and reading the boot clock.

/// Blocking delay used by bounded polling loops.
pub trait Delay {
    /// Sleep for at least `us` microseconds.
    fn sleep_us(&self, us: u32);
}

/// Monotonic clock counting nanoseconds since boot, including time spent
/// suspended.
pub trait BootClock {
    fn boot_time_ns(&self) -> u64;
}
