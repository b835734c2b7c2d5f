// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Camera Kernel Services
//!
//! The kernel crate holds the hardware-independent pieces shared by camera
//! front-end drivers: the error type returned by every control-plane
//! operation, the Hardware Interface Layer (HIL) traits through which a driver
//! reaches registers, clocks, the PHY and its owner, a bottom-half work queue,
//! and the synchronization primitives used between thread and interrupt
//! context.
//!
//! Most `unsafe` code is in this kernel crate.

#![no_std]

pub mod debug;
pub mod deferred_call;
pub mod errorcode;
pub mod hil;
pub mod utilities;

pub use crate::errorcode::ErrorCode;

#[doc(hidden)]
pub use log as __log;
