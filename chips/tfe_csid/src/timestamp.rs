// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Start-of-frame timestamps.
//!
//! Each path latches the 19.2 MHz QTimer at SOF into a pair of 32-bit
//! registers. The pair cannot be read atomically, so [`read_split`] re-reads
//! the high word until it is stable. Tick values are mapped into the boot
//! clock domain by anchoring the first reading to the boot clock and adding
//! tick deltas afterwards.

use kernel::hil::mmio::RegisterIo;
use kernel::ErrorCode;

use crate::config::{QTIMER_DIV, QTIMER_MUL};

/// Read a 64-bit value split across `msb` and `lsb` registers.
///
/// Returns the value and whether the high word changed during the read.
pub fn read_split(io: &dyn RegisterIo, msb: usize, lsb: usize) -> (u64, bool) {
    let mut iterations = 0u32;
    let mut hi = io.read(msb);
    let lo = loop {
        iterations += 1;
        let prev_hi = hi;
        let lo = io.read(lsb);
        hi = io.read(msb);
        if hi == prev_hi {
            break lo;
        }
    };
    ((u64::from(hi) << 32) | u64::from(lo), iterations > 1)
}

pub fn qtimer_to_ns(ticks: u64) -> u64 {
    (u128::from(ticks) * u128::from(QTIMER_MUL) / u128::from(QTIMER_DIV)) as u64
}

/// Result of a timestamp query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timestamps {
    /// SOF time of the current frame, in nanoseconds of QTimer time.
    pub hw_time_ns: u64,
    /// SOF time of the previous frame, if requested.
    pub prev_hw_time_ns: Option<u64>,
    /// `hw_time_ns` mapped into the boot clock domain.
    pub boot_time_ns: u64,
    /// A register pair changed while it was read.
    pub torn: bool,
}

/// Correspondence between QTimer and boot clock established by the last
/// query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootAnchor {
    prev: Option<(u64, u64)>,
}

impl BootAnchor {
    pub const fn new() -> Self {
        Self { prev: None }
    }

    /// Map `hw_ns` into the boot domain. `now_boot` is consulted only when
    /// there is no anchor yet.
    pub fn convert(&mut self, hw_ns: u64, now_boot: impl FnOnce() -> u64) -> Result<u64, ErrorCode> {
        let boot_ns = match self.prev {
            None => now_boot(),
            Some((prev_hw, prev_boot)) => prev_boot
                .checked_add(hw_ns.wrapping_sub(prev_hw))
                .ok_or(ErrorCode::OVERFLOW)?,
        };
        self.prev = Some((hw_ns, boot_ns));
        Ok(boot_ns)
    }

    pub fn clear(&mut self) {
        self.prev = None;
    }
}
