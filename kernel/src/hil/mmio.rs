// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for ordered access to a block of memory-mapped registers.

use crate::ErrorCode;

/// Ordered access to a block of 32-bit hardware registers.
///
/// Offsets are byte offsets from the start of the block. Every access carries
/// full memory-barrier semantics: a write is visible to the hardware before any
/// later access issued through the same interface, and a read is not satisfied
/// before earlier writes complete. Drivers rely on this to order a reset
/// strobe against the status poll that follows it.
pub trait RegisterIo {
    /// Read the register at `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`.
    fn write(&self, offset: usize, value: u32);

    /// Poll `offset` until `value & mask == expected`.
    ///
    /// Sleeps `sleep_us` between reads and gives up once `timeout_us` has
    /// elapsed, returning `ErrorCode::TIMEOUT`. On success the last value read
    /// is returned.
    fn poll_until(
        &self,
        offset: usize,
        mask: u32,
        expected: u32,
        sleep_us: u32,
        timeout_us: u32,
    ) -> Result<u32, ErrorCode>;
}
