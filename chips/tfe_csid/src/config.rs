// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Driver-wide compile-time configuration.
//!
//! Feature switches follow the kernel's `CONFIG` pattern: Cargo features are
//! folded into a single constant so that disabled diagnostics compile away.

/// Compile-time switches for the CSID driver.
pub(crate) struct Config {
    /// Log the raw status snapshot of every top-half invocation.
    pub(crate) trace_irq: bool,

    /// Start with `DebugFlags::RST_IRQ_LOG` set after probe.
    pub(crate) debug_reset_on_probe: bool,
}

pub(crate) const CONFIG: Config = Config {
    trace_irq: cfg!(feature = "trace_irq"),
    debug_reset_on_probe: cfg!(feature = "debug_reset_on_probe"),
};

/// Bound on any wait for a reset-done completion.
pub const COMPLETION_TIMEOUT_MS: u32 = 1000;

/// Sleep between reads of a polled status register.
pub const POLL_SLEEP_US: u32 = 1000;

/// Total budget of a status register poll.
pub const POLL_TIMEOUT_US: u32 = 100_000;

/// Soft RX errors tolerated before the receiver is declared dead.
pub const MAX_IRQ_ERROR_COUNT: u32 = 5;

/// SOF interrupts logged before SOF debugging turns itself off.
pub const SOF_DEBUG_SAMPLES: u32 = 12;

/// Event payloads available to the top half.
pub const NUM_EVT_PAYLOADS: usize = 8;

/// Channel id slots in the receiver.
pub const MAX_CID: usize = 4;

/// VC/DT pairs one channel id can carry.
pub const MAX_VC_DT: usize = 4;

/// Number of RDI paths a CSID can have.
pub const MAX_RDI: usize = 3;

/// PPI bridges a CSID can sit behind, one per physical PHY.
pub const MAX_PPI: usize = 8;

/// Tick to nanosecond conversion for the 19.2 MHz QTimer: `ns = ticks * MUL / DIV`.
pub const QTIMER_MUL: u64 = 10000;
pub const QTIMER_DIV: u64 = 192;

/// Default core clock requested at power up.
pub const DEFAULT_CLOCK_HZ: u64 = 400_000_000;
