// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Public traits for interfaces between camera drivers and the platform
//! services they consume.

pub mod interrupt;
pub mod isp;
pub mod mmio;
pub mod phy;
pub mod soc;
pub mod time;
