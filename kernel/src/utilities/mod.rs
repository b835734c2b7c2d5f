// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Utility types provided by the kernel crate.

pub mod completion;
pub mod irq_lock;
pub mod mmio;
