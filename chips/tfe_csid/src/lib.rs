// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Driver for the CSI-2 decoder (CSID) of the Thin Front End image pipeline.
//!
//! The CSID receives MIPI CSI-2 traffic from a PHY or test pattern
//! generator, demultiplexes it by virtual channel and data type, and feeds
//! one pixel path (IPP) and up to three raw dump paths (RDI). This crate
//! implements the control plane: receiver and path reservation, power and
//! reset sequencing, path programming and streaming control, interrupt
//! triage and deferred error reporting to the ISP hardware manager.
//!
//! Platform services (register access, clocks, the PHY, the bottom-half
//! scheduler) are reached through the `kernel::hil` traits collected in
//! [`CsidResources`].

#![no_std]

pub mod cid;
mod config;
pub mod csid;
pub mod dump;
pub mod format;
mod irq;
pub mod irq_status;
pub mod path;
mod path_ctl;
pub mod payload;
pub mod registers;
pub mod timestamp;

#[cfg(test)]
mod test_support;

pub use crate::cid::InputResource;
pub use crate::csid::{CsidCaps, CsidResources, HwState, TfeCsid};
pub use crate::format::PixelFormat;
pub use crate::irq_status::{DebugFlags, IrqStatus};
pub use crate::path::{
    HaltCommand, HaltMode, PathConfig, PathId, PathState, PortConfig, SyncMode, UsageType, VcDt,
};
pub use crate::timestamp::Timestamps;
