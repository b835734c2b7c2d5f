// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Standard error enum for camera hardware operations.

use core::fmt;

/// Errors returned by camera hardware control-plane operations.
///
/// Errors raised from interrupt context are never returned through this type
/// directly; they are captured and delivered asynchronously to a registered
/// [`EventClient`](crate::hil::isp::EventClient).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ErrorCode {
    /// An invalid parameter was passed
    INVAL = 1,
    /// Operation is not legal in the current state
    STATE = 2,
    /// No free slot, or a reference counter is saturated
    NOMEM = 3,
    /// Format, mode or feature is not available on this hardware
    NOSUPPORT = 4,
    /// A bounded wait on the hardware expired
    TIMEOUT = 5,
    /// Arithmetic on a hardware value would wrap
    OVERFLOW = 6,
    /// Hardware reported an unrecoverable fault
    FATAL = 7,
}

impl From<ErrorCode> for usize {
    fn from(err: ErrorCode) -> usize {
        err as usize
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::INVAL => "invalid argument",
            ErrorCode::STATE => "invalid state",
            ErrorCode::NOMEM => "resource exhausted",
            ErrorCode::NOSUPPORT => "unsupported",
            ErrorCode::TIMEOUT => "timeout",
            ErrorCode::OVERFLOW => "overflow",
            ErrorCode::FATAL => "fatal hardware error",
        };
        f.write_str(s)
    }
}
