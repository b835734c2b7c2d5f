// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! One-shot signal from interrupt context to a blocked control-plane caller.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::hil::time::Delay;
use crate::ErrorCode;

/// Granularity of [`Completion::wait_timeout`].
pub const COMPLETION_POLL_US: u32 = 1000;

/// Single-writer, single-waiter completion flag.
///
/// The interrupt handler calls [`complete`](Completion::complete); the waiter
/// sleeps in [`COMPLETION_POLL_US`] steps until the flag is seen or the
/// timeout expires. A successful wait consumes the signal.
pub struct Completion {
    done: AtomicBool,
}

impl Completion {
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    /// Discard a stale signal before starting an operation that will raise a
    /// new one.
    pub fn reinit(&self) {
        self.done.store(false, Ordering::Release);
    }

    pub fn complete(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Block until signalled, for at most `timeout_ms`.
    pub fn wait_timeout(&self, delay: &dyn Delay, timeout_ms: u32) -> Result<(), ErrorCode> {
        let budget_us = u64::from(timeout_ms) * 1000;
        let mut waited_us = 0u64;
        loop {
            if self.done.swap(false, Ordering::AcqRel) {
                return Ok(());
            }
            if waited_us >= budget_us {
                return Err(ErrorCode::TIMEOUT);
            }
            delay.sleep_us(COMPLETION_POLL_US);
            waited_us += u64::from(COMPLETION_POLL_US);
        }
    }
}
