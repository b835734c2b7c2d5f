// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for the clocks, regulators and bus votes backing a hardware
//! block.

use crate::ErrorCode;

pub trait SocResources {
    /// Power the block and start its clocks at `clock_rate` Hz.
    fn enable(&self, clock_rate: u64) -> Result<(), ErrorCode>;

    /// Stop the clocks and release power.
    fn disable(&self) -> Result<(), ErrorCode>;

    /// Change the core clock rate of a powered block.
    fn set_clock_rate(&self, rate: u64) -> Result<(), ErrorCode>;

    /// Route the C-PHY test pattern generator `tpg` to this block. Only
    /// platforms with a shared TPG mux need to implement this.
    fn select_tpg_mux(&self, _tpg: u32) {}
}
