// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Output path identifiers, configuration, and the per-path state shared
//! with the interrupt handler.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use kernel::hil::phy::LaneType;
use kernel::ErrorCode;

use crate::cid::InputResource;
use crate::config::{MAX_RDI, MAX_VC_DT};
use crate::format::PixelFormat;

/// Number of output paths: the pixel path plus every RDI.
pub const NUM_PATHS: usize = 1 + MAX_RDI;

/// An output path of the CSID.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathId {
    /// Image pixel path.
    #[default]
    Ipp,
    /// Raw dump path `n`.
    Rdi(u8),
}

impl PathId {
    /// Position of the path in per-path tables; IPP is 0, RDI n is n + 1.
    pub fn index(self) -> usize {
        match self {
            PathId::Ipp => 0,
            PathId::Rdi(n) => 1 + n as usize,
        }
    }

    pub fn from_index(index: usize) -> Option<PathId> {
        match index {
            0 => Some(PathId::Ipp),
            i if i < NUM_PATHS => Some(PathId::Rdi((i - 1) as u8)),
            _ => None,
        }
    }

    /// Reject RDI indices the block can never have.
    pub(crate) fn checked(self) -> Result<PathId, ErrorCode> {
        match self {
            PathId::Rdi(n) if n as usize >= MAX_RDI => Err(ErrorCode::INVAL),
            id => Ok(id),
        }
    }

    pub fn is_ipp(self) -> bool {
        self == PathId::Ipp
    }
}

/// Lifecycle of an output path.
///
/// ```text
/// Available -> Reserved -> InitHw -> Streaming
///     ^           |  ^        |  ^        |
///     +-----------+  +--------+  +--------+
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PathState {
    /// The path does not exist on this instance.
    Unavailable = 0,
    Available = 1,
    Reserved = 2,
    InitHw = 3,
    Streaming = 4,
}

impl PathState {
    fn from_u8(v: u8) -> PathState {
        match v {
            1 => PathState::Available,
            2 => PathState::Reserved,
            3 => PathState::InitHw,
            4 => PathState::Streaming,
            _ => PathState::Unavailable,
        }
    }
}

/// Dual sensor synchronization role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncMode {
    #[default]
    None = 0,
    Master = 1,
    Slave = 2,
}

impl SyncMode {
    fn from_u8(v: u8) -> SyncMode {
        match v {
            1 => SyncMode::Master,
            2 => SyncMode::Slave,
            _ => SyncMode::None,
        }
    }
}

/// Whether a path serves one sensor or a dual sensor pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UsageType {
    #[default]
    Single,
    Dual,
}

/// Command written to a path's halt field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaltCommand {
    AtFrameBoundary,
    ResumeAtFrameBoundary,
    Immediately,
}

impl HaltCommand {
    pub(crate) fn bits(self) -> u32 {
        match self {
            HaltCommand::AtFrameBoundary => 0,
            HaltCommand::ResumeAtFrameBoundary => 1,
            HaltCommand::Immediately => 2,
        }
    }
}

/// Source of the halt and resume commands a pixel path obeys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaltMode {
    Internal,
    Global,
    Master,
    Slave,
}

impl HaltMode {
    pub(crate) fn bits(self) -> u32 {
        match self {
            HaltMode::Internal => 0,
            HaltMode::Global => 1,
            HaltMode::Master => 2,
            HaltMode::Slave => 3,
        }
    }
}

/// CSI-2 virtual channel and data type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VcDt {
    pub vc: u32,
    pub dt: u32,
}

impl VcDt {
    pub const MAX_VC: u32 = 0x3;
    pub const MAX_DT: u32 = 0x3f;

    pub fn new(vc: u32, dt: u32) -> VcDt {
        VcDt { vc, dt }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.vc <= Self::MAX_VC && self.dt <= Self::MAX_DT
    }
}

/// Horizontal pixel window of one sensor in a dual sensor setup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelWindow {
    pub start: u32,
    pub end: u32,
    pub width: u32,
}

/// Sensor timing metadata carried for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SensorInfo {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub hbi: u32,
    pub vbi: u32,
}

/// Everything the hardware manager supplies when reserving a path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortConfig {
    pub path: PathId,

    pub input: InputResource,
    pub lane_type: LaneType,
    pub lane_num: u32,
    pub lane_cfg: u32,

    pub vc_dt: [VcDt; MAX_VC_DT],
    pub num_vc_dt: usize,

    pub in_format: PixelFormat,
    pub out_format: PixelFormat,

    pub sync_mode: SyncMode,
    /// Index of the master path when `sync_mode` is `Slave`.
    pub master_idx: u32,
    pub usage: UsageType,

    pub left: PixelWindow,
    pub right: PixelWindow,
    pub height: u32,
    pub line_start: u32,
    pub line_end: u32,
    pub sensor: SensorInfo,

    pub bayer_bin: bool,
    pub qcfa_bin: bool,
}

impl PortConfig {
    /// The VC/DT pairs actually in use.
    pub fn pairs(&self) -> &[VcDt] {
        &self.vc_dt[..self.num_vc_dt.min(MAX_VC_DT)]
    }
}

/// Software view of a reserved path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathConfig {
    pub cid: usize,
    pub vc_dt: [VcDt; MAX_VC_DT],
    pub num_vc_dt: usize,
    pub in_format: PixelFormat,
    pub out_format: PixelFormat,
    pub crop_enable: bool,
    pub start_pixel: u32,
    pub end_pixel: u32,
    pub width: u32,
    pub start_line: u32,
    pub end_line: u32,
    pub height: u32,
    pub sync_mode: SyncMode,
    pub master_idx: u32,
    pub usage: UsageType,
    pub bayer_bin: bool,
    pub qcfa_bin: bool,
    pub sensor: SensorInfo,
}

impl PathConfig {
    pub(crate) const EMPTY: PathConfig = PathConfig {
        cid: 0,
        vc_dt: [VcDt { vc: 0, dt: 0 }; MAX_VC_DT],
        num_vc_dt: 0,
        in_format: PixelFormat::Raw8,
        out_format: PixelFormat::Raw8,
        crop_enable: false,
        start_pixel: 0,
        end_pixel: 0,
        width: 0,
        start_line: 0,
        end_line: 0,
        height: 0,
        sync_mode: SyncMode::None,
        master_idx: 0,
        usage: UsageType::Single,
        bayer_bin: false,
        qcfa_bin: false,
        sensor: SensorInfo {
            width: 0,
            height: 0,
            fps: 0,
            hbi: 0,
            vbi: 0,
        },
    };

    pub(crate) fn from_port(port: &PortConfig, cid: usize) -> PathConfig {
        let mut cfg = PathConfig {
            cid,
            vc_dt: port.vc_dt,
            num_vc_dt: port.num_vc_dt,
            in_format: port.in_format,
            out_format: port.out_format,
            crop_enable: port.path.is_ipp(),
            start_line: port.line_start,
            end_line: port.line_end,
            height: port.height,
            sync_mode: port.sync_mode,
            usage: port.usage,
            bayer_bin: port.bayer_bin,
            qcfa_bin: port.qcfa_bin,
            sensor: port.sensor,
            ..PathConfig::default()
        };
        let window = match port.sync_mode {
            SyncMode::Slave => {
                cfg.master_idx = port.master_idx;
                port.right
            }
            SyncMode::Master | SyncMode::None => port.left,
        };
        cfg.start_pixel = window.start;
        cfg.end_pixel = window.end;
        cfg.width = window.width;
        cfg
    }
}

/// Path state the interrupt handler reads without the control lock.
///
/// Only control-plane operations holding the control lock change `state`
/// and `sync_mode`; the top half only advances `sof_cnt`.
pub(crate) struct PathIrqState {
    state: AtomicU8,
    sync_mode: AtomicU8,
    init_frame_drop: AtomicU32,
    sof_cnt: AtomicU32,
}

impl PathIrqState {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(PathState::Unavailable as u8),
            sync_mode: AtomicU8::new(SyncMode::None as u8),
            init_frame_drop: AtomicU32::new(0),
            sof_cnt: AtomicU32::new(0),
        }
    }

    pub(crate) fn state(&self) -> PathState {
        PathState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: PathState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn sync_mode(&self) -> SyncMode {
        SyncMode::from_u8(self.sync_mode.load(Ordering::Relaxed))
    }

    pub(crate) fn set_sync_mode(&self, mode: SyncMode) {
        self.sync_mode.store(mode as u8, Ordering::Relaxed);
    }

    pub(crate) fn init_frame_drop(&self) -> u32 {
        self.init_frame_drop.load(Ordering::Relaxed)
    }

    pub(crate) fn set_init_frame_drop(&self, n: u32) {
        self.init_frame_drop.store(n, Ordering::Relaxed);
    }

    pub(crate) fn sof_cnt(&self) -> u32 {
        self.sof_cnt.load(Ordering::Relaxed)
    }

    pub(crate) fn set_sof_cnt(&self, n: u32) {
        self.sof_cnt.store(n, Ordering::Relaxed);
    }

    /// Count one SOF and return the new total.
    pub(crate) fn bump_sof_cnt(&self) -> u32 {
        self.sof_cnt.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Drop both frame-drop counters.
    pub(crate) fn clear_counters(&self) {
        self.set_init_frame_drop(0);
        self.set_sof_cnt(0);
    }

    /// A streaming path still discarding its initial frames.
    pub(crate) fn frame_drop_pending(&self) -> bool {
        let target = self.init_frame_drop();
        self.state() == PathState::Streaming && target != 0 && self.sof_cnt() < target
    }
}
