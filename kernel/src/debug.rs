// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for logging from interrupt context.
//!
//! Interrupt storms can produce the same diagnostic thousands of times a
//! second. `log_ratelimited!` keeps one limiter per call site that lets the
//! first [`RateLimit::BURST`] messages through and then one in every
//! [`RateLimit::INTERVAL`].
//!
//! ```rust
//! use cam_kernel::log_ratelimited;
//!
//! for lane in 0..4 {
//!     log_ratelimited!(log::Level::Error, "lane {} fifo overflow", lane);
//! }
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

/// Per call site message counter.
pub struct RateLimit {
    hits: AtomicU32,
}

impl RateLimit {
    pub const BURST: u32 = 10;
    pub const INTERVAL: u32 = 100;

    pub const fn new() -> Self {
        Self {
            hits: AtomicU32::new(0),
        }
    }

    /// Count one occurrence and report whether it should be emitted.
    pub fn allow(&self) -> bool {
        let n = self.hits.fetch_add(1, Ordering::Relaxed);
        n < Self::BURST || (n - Self::BURST) % Self::INTERVAL == 0
    }
}

/// Log at `$lvl` through the `log` facade, rate limited per call site.
#[macro_export]
macro_rules! log_ratelimited {
    ($lvl:expr, $($arg:tt)+) => {{
        static LIMIT: $crate::debug::RateLimit = $crate::debug::RateLimit::new();
        if LIMIT.allow() {
            $crate::__log::log!($lvl, $($arg)+);
        }
    }};
}
