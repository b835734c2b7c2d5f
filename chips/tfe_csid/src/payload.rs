// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Fixed pool of event payloads handed from the top half to the bottom half.

use kernel::hil::isp::HwErrorType;

use crate::config::NUM_EVT_PAYLOADS;
use crate::irq_status::{IrqStatus, NUM_IRQ_GROUPS};

/// An event captured in interrupt context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventPayload {
    pub err_type: HwErrorType,
    pub status: IrqStatus,
    pub hw_idx: u32,
    /// Client context registered when the event was raised.
    pub ctx: usize,
}

impl EventPayload {
    const EMPTY: EventPayload = EventPayload {
        err_type: HwErrorType::None,
        status: IrqStatus([0; NUM_IRQ_GROUPS]),
        hw_idx: 0,
        ctx: 0,
    };
}

/// Slab of payloads with a bitmask free list.
///
/// Not synchronized; callers keep it behind the interrupt-safe lock.
pub struct PayloadPool {
    slots: [EventPayload; NUM_EVT_PAYLOADS],
    /// Bit `n` set means slot `n` is free.
    free: u8,
}

const ALL_FREE: u8 = u8::MAX >> (8 - NUM_EVT_PAYLOADS);

impl PayloadPool {
    /// An empty pool; [`PayloadPool::fill`] makes every slot available.
    pub const fn new() -> Self {
        Self {
            slots: [EventPayload::EMPTY; NUM_EVT_PAYLOADS],
            free: 0,
        }
    }

    pub fn fill(&mut self) {
        self.slots = [EventPayload::EMPTY; NUM_EVT_PAYLOADS];
        self.free = ALL_FREE;
    }

    /// Take a free slot and store `payload` in it.
    pub fn acquire(&mut self, payload: EventPayload) -> Option<usize> {
        if self.free == 0 {
            return None;
        }
        let idx = self.free.trailing_zeros() as usize;
        self.free &= !(1 << idx);
        self.slots[idx] = payload;
        Some(idx)
    }

    /// Copy of an acquired slot.
    pub fn get(&self, idx: usize) -> Option<EventPayload> {
        if idx < NUM_EVT_PAYLOADS && self.free & (1 << idx) == 0 {
            Some(self.slots[idx])
        } else {
            None
        }
    }

    pub fn release(&mut self, idx: usize) {
        if idx < NUM_EVT_PAYLOADS {
            self.slots[idx] = EventPayload::EMPTY;
            self.free |= 1 << idx;
        }
    }

    pub fn available(&self) -> usize {
        self.free.count_ones() as usize
    }
}
