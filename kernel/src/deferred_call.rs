// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Hardware-independent interface for deferring work out of interrupt
//! context.
//!
//! An interrupt handler that needs to do more than acknowledge hardware
//! reserves a command with [`BottomHalfScheduler::acquire_task`], fills in
//! whatever state it wants to hand over, and submits an opaque payload token
//! with [`BottomHalfScheduler::enqueue`]. Later, outside interrupt context, the
//! scheduler hands the token back to the registered [`BottomHalfClient`].
//!
//! Reserving and submitting are split so that a handler can find out that the
//! queue is full before it commits any other resource, and so that submission
//! itself can never fail.
//!
//! [`Tasklet`] is a bounded single-producer, single-consumer implementation
//! serviced from the main loop:
//!
//! ```rust
//! use cam_kernel::deferred_call::{BottomHalfClient, BottomHalfScheduler, Tasklet};
//! use cam_kernel::hil::interrupt::NO_INTERRUPT_CONTROL;
//!
//! struct Printer;
//! impl BottomHalfClient for Printer {
//!     fn handle_bottom_half(&self, payload: usize) {
//!         assert_eq!(payload, 7);
//!     }
//! }
//!
//! let tasklet: Tasklet<4> = Tasklet::new(&NO_INTERRUPT_CONTROL);
//! if let Some(task) = tasklet.acquire_task() {
//!     tasklet.enqueue(task, 7);
//! }
//! while tasklet.service_next_pending(&Printer) {}
//! ```

use heapless::Deque;

use crate::hil::interrupt::InterruptControl;
use crate::utilities::irq_lock::IrqSpinLock;

/// A reserved command slot in a scheduler queue.
///
/// Obtained from [`BottomHalfScheduler::acquire_task`] and consumed by
/// [`BottomHalfScheduler::enqueue`]. Holding one guarantees the enqueue has
/// room.
#[derive(Debug)]
pub struct TaskHandle {
    _private: (),
}

/// Work queue for deferred processing.
pub trait BottomHalfScheduler {
    /// Reserve a command slot. Returns `None` when the queue is full; callers
    /// in interrupt context must then drop their work rather than wait.
    fn acquire_task(&self) -> Option<TaskHandle>;

    /// Submit `payload` to be delivered to the bottom-half client.
    fn enqueue(&self, task: TaskHandle, payload: usize);
}

/// Receiver of deferred work.
pub trait BottomHalfClient {
    /// Called from deferred context with a payload token previously passed to
    /// [`BottomHalfScheduler::enqueue`].
    fn handle_bottom_half(&self, payload: usize);
}

struct TaskletState<const N: usize> {
    reserved: usize,
    pending: Deque<usize, N>,
}

/// Bounded bottom-half queue with `N` command slots.
pub struct Tasklet<'a, const N: usize> {
    state: IrqSpinLock<TaskletState<N>>,
    irq: &'a dyn InterruptControl,
}

impl<'a, const N: usize> Tasklet<'a, N> {
    pub fn new(irq: &'a dyn InterruptControl) -> Self {
        Self {
            state: IrqSpinLock::new(TaskletState {
                reserved: 0,
                pending: Deque::new(),
            }),
            irq,
        }
    }

    /// Deliver the oldest pending payload to `client`. Returns `false` if the
    /// queue was empty.
    ///
    /// The queue lock is not held while the client runs, so the client may
    /// itself acquire and enqueue tasks.
    pub fn service_next_pending(&self, client: &dyn BottomHalfClient) -> bool {
        let next = self.state.lock_irqsave(self.irq, |s| s.pending.pop_front());
        match next {
            Some(payload) => {
                client.handle_bottom_half(payload);
                self.state.lock_irqsave(self.irq, |s| {
                    s.reserved = s.reserved.saturating_sub(1);
                });
                true
            }
            None => false,
        }
    }

    /// Returns true if any payloads are waiting to be serviced.
    pub fn has_tasks(&self) -> bool {
        self.state.lock_irqsave(self.irq, |s| !s.pending.is_empty())
    }
}

impl<const N: usize> BottomHalfScheduler for Tasklet<'_, N> {
    fn acquire_task(&self) -> Option<TaskHandle> {
        self.state.lock_irqsave(self.irq, |s| {
            if s.reserved >= N {
                None
            } else {
                s.reserved += 1;
                Some(TaskHandle { _private: () })
            }
        })
    }

    fn enqueue(&self, _task: TaskHandle, payload: usize) {
        self.state.lock_irqsave(self.irq, |s| {
            // A reserved slot always has room.
            if s.pending.push_back(payload).is_err() {
                log::error!("tasklet: reserved slot lost, dropping payload {}", payload);
                s.reserved = s.reserved.saturating_sub(1);
            }
        });
    }
}
