// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! `RegisterIo` over a memory-mapped register window.

use core::ptr;
use core::sync::atomic::{fence, Ordering};

use crate::hil::mmio::RegisterIo;
use crate::hil::time::Delay;
use crate::ErrorCode;

/// Volatile, fenced access to a mapped register block.
pub struct MmioRegisterIo<'a> {
    base: *mut u32,
    size: usize,
    delay: &'a dyn Delay,
}

impl<'a> MmioRegisterIo<'a> {
    /// Create an accessor for the `size`-byte register window at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the word-aligned start of a device register window of at
    /// least `size` bytes which stays mapped for `'a`, and nothing else may
    /// treat that memory as ordinary RAM.
    pub const unsafe fn new(base: *mut u32, size: usize, delay: &'a dyn Delay) -> Self {
        Self { base, size, delay }
    }

    fn word(&self, offset: usize) -> Option<*mut u32> {
        if offset % 4 != 0 || offset + 4 > self.size {
            log::error!("mmio: offset {:#x} outside window of {:#x}", offset, self.size);
            return None;
        }
        // SAFETY: bounds checked above against the window given to `new`.
        Some(unsafe { self.base.add(offset / 4) })
    }
}

impl RegisterIo for MmioRegisterIo<'_> {
    fn read(&self, offset: usize) -> u32 {
        match self.word(offset) {
            Some(p) => {
                fence(Ordering::SeqCst);
                // SAFETY: `p` is inside the mapped window.
                let val = unsafe { ptr::read_volatile(p) };
                fence(Ordering::SeqCst);
                val
            }
            None => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        if let Some(p) = self.word(offset) {
            fence(Ordering::SeqCst);
            // SAFETY: `p` is inside the mapped window.
            unsafe { ptr::write_volatile(p, value) };
            fence(Ordering::SeqCst);
        }
    }

    fn poll_until(
        &self,
        offset: usize,
        mask: u32,
        expected: u32,
        sleep_us: u32,
        timeout_us: u32,
    ) -> Result<u32, ErrorCode> {
        let mut elapsed = 0u32;
        loop {
            let val = self.read(offset);
            if val & mask == expected {
                return Ok(val);
            }
            if elapsed >= timeout_us {
                return Err(ErrorCode::TIMEOUT);
            }
            self.delay.sleep_us(sleep_us);
            elapsed = elapsed.saturating_add(sleep_us.max(1));
        }
    }
}
