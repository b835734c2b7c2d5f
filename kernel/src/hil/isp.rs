// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interfaces between ISP front-end hardware drivers and the hardware
//! manager that owns them.

use crate::ErrorCode;

/// Platform features that some hardware instances lack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IspFeature {
    /// Quad-CFA sensor binning.
    Qcfa,
    /// Dynamic switching between sensors.
    DynamicSwitch,
}

/// Platform capability lookup.
pub trait CapabilityQuery {
    /// Returns whether `feature` is available on hardware instance `hw_idx`,
    /// or on any instance if `hw_idx` is `None`.
    fn is_feature_supported(&self, feature: IspFeature, hw_idx: Option<u32>) -> bool;
}

/// Kind of event delivered to an [`EventClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwEventKind {
    Error,
}

/// Classification of a hardware error event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwErrorType {
    /// Diagnostic only; carries status but requires no recovery.
    None,
    /// The CSI-2 receiver hit an unrecoverable fault and was shut off.
    CsidFatal,
}

/// Descriptor passed with an error event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HwEventInfo {
    /// Index of the hardware instance that raised the event.
    pub hw_idx: u32,
    pub err_type: HwErrorType,
}

/// Client for asynchronous hardware events.
///
/// Events are delivered from deferred context, never from the interrupt
/// handler itself.
pub trait EventClient {
    fn event(&self, kind: HwEventKind, info: &HwEventInfo) -> Result<(), ErrorCode>;
}
