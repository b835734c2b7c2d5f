// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register dumps for debugging.
//!
//! [`TfeCsid::dump_hw`] fills a caller buffer with two tagged sections:
//!
//! ```text
//! REG_DUMP_TAG, n, hw_idx, offset0, value0, ..., offset(n-1), value(n-1)
//! CLK_DUMP_TAG, 2, rate_lo, rate_hi
//! ```

use heapless::Vec;
use kernel::ErrorCode;
use log::{error, info};

use crate::csid::TfeCsid;
use crate::path::{PathId, PathState, NUM_PATHS};
use crate::registers::PathRegs;

/// Tag word starting the register section of a hardware dump.
pub const REG_DUMP_TAG: u32 = 0xc5d0_0001;
/// Tag word starting the clock section of a hardware dump.
pub const CLK_DUMP_TAG: u32 = 0xc5d0_0002;

/// Configuration registers captured without `dump_all`.
const MAX_CFG_REGS: usize = 8 + NUM_PATHS * 8;

const REG_HEADER_WORDS: usize = 3;
const CLK_SECTION_WORDS: usize = 4;

impl TfeCsid<'_> {
    /// Log the programmed registers of `path` and its software config.
    pub fn dump_registers(&self, path: PathId) -> Result<(), ErrorCode> {
        let regs = self.path_regs(path)?;
        let ctrl = self.ctrl.lock();
        self.require_power_up(&ctrl)?;
        let io = self.res.io;

        info!(
            "CSID:{} {:?} cfg0 {:#x} cfg1 {:#x} ctrl {:#x}",
            self.hw_idx,
            path,
            io.read(regs.cfg0),
            io.read(regs.cfg1),
            io.read(regs.ctrl)
        );
        if let (PathId::Ipp, Some(crop)) = (path, regs.crop) {
            info!(
                "CSID:{} {:?} hcrop {:#x} vcrop {:#x}",
                self.hw_idx,
                path,
                io.read(crop.hcrop),
                io.read(crop.vcrop)
            );
        }

        let cfg = &ctrl.paths[path.index()];
        info!(
            "CSID:{} {:?} cid {} vc/dt {:?} in {:?} out {:?} crop {} [{}..{}]x[{}..{}]",
            self.hw_idx,
            path,
            cfg.cid,
            &cfg.vc_dt[..cfg.num_vc_dt],
            cfg.in_format,
            cfg.out_format,
            cfg.crop_enable,
            cfg.start_pixel,
            cfg.end_pixel,
            cfg.start_line,
            cfg.end_line
        );
        Ok(())
    }

    fn push_path_cfg_regs(&self, list: &mut Vec<usize, MAX_CFG_REGS>, regs: &PathRegs) {
        let mut offsets: Vec<usize, 8> = Vec::new();
        let _ = offsets.extend_from_slice(&[regs.cfg0, regs.cfg1, regs.ctrl, regs.irq_mask]);
        if let Some(off) = regs.multi_vcdt_cfg0 {
            let _ = offsets.push(off);
        }
        if let Some(crop) = regs.crop {
            let _ = offsets.extend_from_slice(&[crop.hcrop, crop.vcrop]);
        }
        let _ = list.extend_from_slice(&offsets);
    }

    /// Offsets of the configuration registers worth dumping.
    fn cfg_reg_offsets(&self) -> Vec<usize, MAX_CFG_REGS> {
        let info = self.info;
        let mut list = Vec::new();
        let _ = list.extend_from_slice(&[
            info.cmn.cfg0,
            info.cmn.ctrl,
            info.cmn.top_irq_mask,
            info.rx.cfg0,
            info.rx.cfg1,
            info.rx.capture_ctrl,
            info.rx.irq_mask,
        ]);
        for (_, regs) in self.present_paths() {
            self.push_path_cfg_regs(&mut list, regs);
        }
        list
    }

    /// Write a tagged register and clock dump into `buf`. With `dump_all`
    /// every word of the register window is captured, otherwise only the
    /// configuration registers. Returns the number of words written.
    pub fn dump_hw(&self, buf: &mut [u32], dump_all: bool) -> Result<usize, ErrorCode> {
        let ctrl = self.ctrl.lock();
        self.require_power_up(&ctrl)?;

        let cfg_regs = self.cfg_reg_offsets();
        let num_regs = if dump_all {
            self.info.window_size / 4
        } else {
            cfg_regs.len()
        };
        let needed = REG_HEADER_WORDS + 2 * num_regs + CLK_SECTION_WORDS;
        if buf.len() < needed {
            error!(
                "CSID:{} dump buffer too small: {} words, need {}",
                self.hw_idx,
                buf.len(),
                needed
            );
            return Err(ErrorCode::NOMEM);
        }

        let io = self.res.io;
        buf[0] = REG_DUMP_TAG;
        buf[1] = num_regs as u32;
        buf[2] = self.hw_idx;
        let mut pos = REG_HEADER_WORDS;
        let mut put = |offset: usize| {
            buf[pos] = offset as u32;
            buf[pos + 1] = io.read(offset);
            pos += 2;
        };
        if dump_all {
            (0..num_regs).for_each(|i| put(i * 4));
        } else {
            cfg_regs.iter().for_each(|&off| put(off));
        }

        let rate = ctrl.applied_clk_rate;
        buf[pos] = CLK_DUMP_TAG;
        buf[pos + 1] = 2;
        buf[pos + 2] = rate as u32;
        buf[pos + 3] = (rate >> 32) as u32;
        Ok(pos + CLK_SECTION_WORDS)
    }

    /// Log per-frame data of a reserved path. RDIs report their ping/pong
    /// byte counters.
    pub fn log_acquire_data(&self, path: PathId) -> Result<(), ErrorCode> {
        let regs = self.path_regs(path)?;
        let ctrl = self.ctrl.lock();
        let state = self.path_irq[path.index()].state();
        if state <= PathState::Available {
            error!(
                "CSID:{} {:?} invalid state {:?} for acquire data",
                self.hw_idx, path, state
            );
            return Err(ErrorCode::STATE);
        }
        self.require_power_up(&ctrl)?;

        if let Some(bc) = regs.byte_counters {
            let io = self.res.io;
            info!(
                "CSID:{} {:?} byte count ping {:#x} pong {:#x}",
                self.hw_idx,
                path,
                io.read(bc.ping),
                io.read(bc.pong)
            );
        }
        Ok(())
    }
}
