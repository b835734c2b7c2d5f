// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Output path programming: init, start, stop and halt mode changes.

use core::sync::atomic::Ordering;

use kernel::ErrorCode;
use log::{debug, error, info};
use tock_registers::LocalRegisterCopy;

use crate::config::{POLL_SLEEP_US, POLL_TIMEOUT_US};
use crate::csid::{ControlState, TfeCsid};
use crate::format;
use crate::irq_status::{BinningSupport, DebugFlags, PathIrq};
use crate::path::{
    HaltCommand, HaltMode, PathConfig, PathId, PathState, SyncMode, UsageType, NUM_PATHS,
};
use crate::registers::{
    IppCfg0, PathCtrl, PathRegs, RdiCfg0, CROP, ERR_RECOVERY_CFG0, FORMAT_MEASURE_CFG0, IPP_CFG0,
    MULTI_VCDT_CFG0, PATH_CFG1, PATH_CTRL, RDI_CFG0, RX_CAPTURE_CTRL,
};

fn err_recovery_detect() -> u32 {
    let mut v = LocalRegisterCopy::<u32, ERR_RECOVERY_CFG0::Register>::new(0);
    v.modify(ERR_RECOVERY_CFG0::DETECT_EN::SET + ERR_RECOVERY_CFG0::OVERFLOW_CTRL_MODE::DetectOnly);
    v.get()
}

fn crop_window(start: u32, end: u32) -> u32 {
    let mut v = LocalRegisterCopy::<u32, CROP::Register>::new(0);
    v.modify(CROP::START.val(start) + CROP::END.val(end));
    v.get()
}

impl TfeCsid<'_> {
    /// Program a reserved path's decode, crop and VC/DT routing.
    pub fn init_path(&self, path: PathId) -> Result<(), ErrorCode> {
        self.path_regs(path)?;
        let ctrl = self.ctrl.lock();
        self.init_path_locked(&ctrl, path)
    }

    pub(crate) fn init_path_locked(&self, ctrl: &ControlState, path: PathId) -> Result<(), ErrorCode> {
        let regs = self.path_regs(path)?;
        let st = &self.path_irq[path.index()];
        if st.state() != PathState::Reserved {
            error!(
                "CSID:{} init {:?} in state {:?}",
                self.hw_idx,
                path,
                st.state()
            );
            return Err(ErrorCode::STATE);
        }
        self.require_power_up(ctrl)?;

        let cfg = &ctrl.paths[path.index()];
        match path {
            PathId::Ipp => self.init_ipp(cfg, regs)?,
            PathId::Rdi(_) => self.init_rdi(cfg, regs)?,
        }
        self.program_capture_ctrl(cfg);
        st.set_state(PathState::InitHw);
        debug!("CSID:{} {:?} initialized", self.hw_idx, path);
        Ok(())
    }

    fn init_ipp(&self, cfg: &PathConfig, regs: &PathRegs) -> Result<(), ErrorCode> {
        let io = self.res.io;
        let bin = self.info.binning;
        // Hardware without any binning mode ignores binning requests.
        let bin_capable = bin.intersects(BinningSupport::BAYER | BinningSupport::QCFA);
        let bayer_bin = bin_capable && cfg.bayer_bin;
        let qcfa_bin = bin_capable && cfg.qcfa_bin;
        if !bin_capable && (cfg.bayer_bin || cfg.qcfa_bin) {
            debug!("CSID:{} no binning support, request ignored", self.hw_idx);
        }
        if bayer_bin && !bin.contains(BinningSupport::BAYER) {
            error!("CSID:{} bayer binning not supported", self.hw_idx);
            return Err(ErrorCode::INVAL);
        }
        if qcfa_bin && !bin.contains(BinningSupport::QCFA) {
            error!("CSID:{} qcfa binning not supported", self.hw_idx);
            return Err(ErrorCode::INVAL);
        }
        if bayer_bin && qcfa_bin {
            error!("CSID:{} bayer and qcfa binning both requested", self.hw_idx);
            return Err(ErrorCode::INVAL);
        }
        let codes = format::ipp_codes(cfg.in_format)?;
        let debug = self.debug_flags();
        let measure = self.info.format_measure_support && debug.contains(DebugFlags::HBI_VBI_INFO);

        let mut cfg0 = IppCfg0::new(0);
        cfg0.modify(
            IPP_CFG0::VC.val(cfg.vc_dt[0].vc)
                + IPP_CFG0::DT.val(cfg.vc_dt[0].dt)
                + IPP_CFG0::DT_ID.val(cfg.cid as u32)
                + IPP_CFG0::DECODE_FORMAT.val(codes.decode)
                + IPP_CFG0::CROP_H_EN.val(u32::from(cfg.crop_enable))
                + IPP_CFG0::CROP_V_EN.val(u32::from(cfg.crop_enable))
                + IPP_CFG0::TIMESTAMP_EN::SET
                + IPP_CFG0::PIX_STORE_EN::SET,
        );
        if bayer_bin {
            cfg0.modify(IPP_CFG0::BIN_EN::SET);
        } else if qcfa_bin {
            cfg0.modify(IPP_CFG0::BIN_EN::SET + IPP_CFG0::BIN_QCFA_EN::SET);
        }
        if measure {
            cfg0.modify(IPP_CFG0::FORMAT_MEASURE_EN::SET);
        }
        io.write(regs.cfg0, cfg0.get());
        self.program_multi_vcdt(cfg, regs);

        self.modify_reg(regs.cfg1, |v| {
            let mut cfg1 = LocalRegisterCopy::<u32, PATH_CFG1::Register>::new(v);
            cfg1.modify(PATH_CFG1::TIMESTAMP_STB_SEL::PostIrq);
            cfg1.get()
        });

        if cfg.crop_enable {
            if let Some(crop) = regs.crop {
                io.write(crop.hcrop, crop_window(cfg.start_pixel, cfg.end_pixel));
                io.write(crop.vcrop, crop_window(cfg.start_line, cfg.end_line));
                debug!(
                    "CSID:{} ipp crop h {}..{} v {}..{}",
                    self.hw_idx, cfg.start_pixel, cfg.end_pixel, cfg.start_line, cfg.end_line
                );
            }
            if !debug.contains(DebugFlags::DISABLE_EARLY_EOF) {
                cfg0.modify(IPP_CFG0::EARLY_EOF_EN::SET);
            }
        }
        if measure {
            self.enable_hbi_vbi_count(regs);
        }

        cfg0.modify(IPP_CFG0::PATH_EN::SET);
        io.write(regs.cfg0, cfg0.get());
        io.write(regs.err_recovery_cfg0, err_recovery_detect());
        Ok(())
    }

    fn init_rdi(&self, cfg: &PathConfig, regs: &PathRegs) -> Result<(), ErrorCode> {
        let io = self.res.io;
        let codes = format::rdi_codes(cfg.in_format, cfg.out_format).map_err(|e| {
            error!(
                "CSID:{} rdi cannot convert {:?} to {:?}",
                self.hw_idx, cfg.in_format, cfg.out_format
            );
            e
        })?;
        let measure =
            self.info.format_measure_support && self.debug_flags().contains(DebugFlags::HBI_VBI_INFO);

        let mut cfg0 = RdiCfg0::new(0);
        cfg0.modify(
            RDI_CFG0::VC.val(cfg.vc_dt[0].vc)
                + RDI_CFG0::DT.val(cfg.vc_dt[0].dt)
                + RDI_CFG0::DT_ID.val(cfg.cid as u32)
                + RDI_CFG0::DECODE_FORMAT.val(codes.decode)
                + RDI_CFG0::PLAIN_FORMAT.val(codes.plain)
                + RDI_CFG0::BYTE_CNTR_EN::SET
                + RDI_CFG0::TIMESTAMP_EN::SET,
        );
        if measure {
            cfg0.modify(RDI_CFG0::FORMAT_MEASURE_EN::SET);
        }
        io.write(regs.cfg0, cfg0.get());
        self.program_multi_vcdt(cfg, regs);

        let mut cfg1 = LocalRegisterCopy::<u32, PATH_CFG1::Register>::new(0);
        cfg1.modify(PATH_CFG1::TIMESTAMP_STB_SEL::PostIrq);
        io.write(regs.cfg1, cfg1.get());
        io.write(regs.err_recovery_cfg0, err_recovery_detect());
        io.write(regs.ctrl, 0);
        if measure {
            self.enable_hbi_vbi_count(regs);
        }

        cfg0.modify(RDI_CFG0::PATH_EN::SET);
        io.write(regs.cfg0, cfg0.get());
        Ok(())
    }

    fn enable_hbi_vbi_count(&self, regs: &PathRegs) {
        self.modify_reg(regs.format_measure_cfg0, |v| {
            let mut fm = LocalRegisterCopy::<u32, FORMAT_MEASURE_CFG0::Register>::new(v);
            fm.modify(FORMAT_MEASURE_CFG0::HBI_VBI_CNT_EN.val(0x3));
            fm.get()
        });
    }

    /// Route the second VC/DT pair, when the hardware and request have one.
    fn program_multi_vcdt(&self, cfg: &PathConfig, regs: &PathRegs) {
        if !self.info.binning.contains(BinningSupport::MULTI_VCDT) || cfg.num_vc_dt < 2 {
            return;
        }
        if let Some(offset) = regs.multi_vcdt_cfg0 {
            let mut v = LocalRegisterCopy::<u32, MULTI_VCDT_CFG0::Register>::new(0);
            v.modify(
                MULTI_VCDT_CFG0::EN::SET
                    + MULTI_VCDT_CFG0::VC1.val(cfg.vc_dt[1].vc)
                    + MULTI_VCDT_CFG0::DT1.val(cfg.vc_dt[1].dt),
            );
            self.res.io.write(offset, v.get());
        }
    }

    /// Latch packet headers matching the path's VC/DT when packet capture
    /// debugging is on.
    fn program_capture_ctrl(&self, cfg: &PathConfig) {
        let debug = self.debug_flags();
        let vc = cfg.vc_dt[0].vc;
        let dt = cfg.vc_dt[0].dt;
        let mut v = LocalRegisterCopy::<u32, RX_CAPTURE_CTRL::Register>::new(0);
        if debug.contains(DebugFlags::SHORT_PKT_CAPTURE) {
            v.modify(RX_CAPTURE_CTRL::SHORT_PKT_EN::SET + RX_CAPTURE_CTRL::SHORT_PKT_VC.val(vc));
        }
        if debug.contains(DebugFlags::LONG_PKT_CAPTURE) {
            v.modify(
                RX_CAPTURE_CTRL::LONG_PKT_EN::SET
                    + RX_CAPTURE_CTRL::LONG_PKT_DT.val(dt)
                    + RX_CAPTURE_CTRL::LONG_PKT_VC.val(vc),
            );
        }
        if debug.contains(DebugFlags::CPHY_PKT_CAPTURE) {
            v.modify(
                RX_CAPTURE_CTRL::CPHY_PKT_EN::SET
                    + RX_CAPTURE_CTRL::CPHY_PKT_DT.val(dt)
                    + RX_CAPTURE_CTRL::CPHY_PKT_VC.val(vc),
            );
        }
        self.res.io.write(self.info.rx.capture_ctrl, v.get());
    }

    /// Return an initialized path to `Reserved`.
    pub fn deinit_path(&self, path: PathId) -> Result<(), ErrorCode> {
        self.path_regs(path)?;
        let ctrl = self.ctrl.lock();
        self.deinit_path_locked(&ctrl, path)
    }

    pub(crate) fn deinit_path_locked(&self, ctrl: &ControlState, path: PathId) -> Result<(), ErrorCode> {
        let regs = self.path_regs(path)?;
        let st = &self.path_irq[path.index()];
        if st.state() != PathState::InitHw {
            error!(
                "CSID:{} deinit {:?} in state {:?}",
                self.hw_idx,
                path,
                st.state()
            );
            return Err(ErrorCode::STATE);
        }
        self.require_power_up(ctrl)?;
        self.res.io.write(regs.err_recovery_cfg0, 0);
        st.set_state(PathState::Reserved);
        Ok(())
    }

    /// Start streaming on an initialized path.
    pub fn start_path(&self, path: PathId) -> Result<(), ErrorCode> {
        let regs = self.path_regs(path)?;
        let st = &self.path_irq[path.index()];
        let ctrl = self.ctrl.lock();
        if st.state() != PathState::InitHw {
            error!(
                "CSID:{} start {:?} in state {:?}",
                self.hw_idx,
                path,
                st.state()
            );
            return Err(ErrorCode::STATE);
        }
        self.require_power_up(&ctrl)?;

        self.sof_irq_triggered.store(false, Ordering::Relaxed);
        self.irq_debug_cnt.store(0, Ordering::Relaxed);

        let cfg = &ctrl.paths[path.index()];
        match path {
            PathId::Ipp => self.start_ipp(cfg, regs),
            PathId::Rdi(_) => self.start_rdi(path, cfg, regs),
        }
        info!("CSID:{} {:?} streaming", self.hw_idx, path);
        Ok(())
    }

    fn path_irq_mask(&self) -> PathIrq {
        let debug = self.debug_flags();
        let mut mask = PathIrq::BASE_MASK;
        if self.info.format_measure_support {
            mask |= PathIrq::FORMAT_MEASURE;
        }
        if debug.contains(DebugFlags::SOF_IRQ) {
            mask |= PathIrq::INPUT_SOF;
        }
        if debug.contains(DebugFlags::EOF_IRQ) {
            mask |= PathIrq::INPUT_EOF;
        }
        mask
    }

    fn start_ipp(&self, cfg: &PathConfig, regs: &PathRegs) {
        let io = self.res.io;
        let mut ctrl = PathCtrl::new(0);
        match cfg.sync_mode {
            SyncMode::Master => {
                ctrl.modify(PATH_CTRL::HALT_MODE::Master + PATH_CTRL::MASTER_SEL::Master)
            }
            SyncMode::Slave => ctrl.modify(PATH_CTRL::HALT_MODE::Slave),
            SyncMode::None => {}
        }
        if cfg.sync_mode != SyncMode::Slave {
            ctrl.modify(PATH_CTRL::HALT_CMD::ResumeAtFrameBoundary);
        }
        io.write(regs.ctrl, ctrl.get());

        self.path_irq[PathId::Ipp.index()].set_state(PathState::Streaming);
        io.write(regs.irq_mask, self.path_irq_mask().bits());
    }

    fn start_rdi(&self, path: PathId, cfg: &PathConfig, regs: &PathRegs) {
        let io = self.res.io;
        let st = &self.path_irq[path.index()];
        if cfg.usage == UsageType::Dual {
            st.set_init_frame_drop(1);
        }
        st.set_sof_cnt(0);

        let drop_pending = st.init_frame_drop() != 0;
        let path_active = drop_pending && self.check_path_active();
        if !drop_pending || path_active {
            let mut ctrl = PathCtrl::new(0);
            ctrl.modify(PATH_CTRL::HALT_CMD::ResumeAtFrameBoundary);
            io.write(regs.ctrl, ctrl.get());
        }

        let mut mask = self.path_irq_mask();
        if drop_pending && !path_active {
            mask |= PathIrq::INPUT_SOF;
        }
        st.set_state(PathState::Streaming);
        io.write(regs.irq_mask, mask.bits());
        debug!(
            "CSID:{} {:?} mask {:#x} frame drop {}",
            self.hw_idx,
            path,
            mask.bits(),
            st.init_frame_drop()
        );
    }

    /// Whether any path of this CSID is already passing frames.
    pub(crate) fn check_path_active(&self) -> bool {
        self.present_paths()
            .any(|(_, regs)| self.res.io.read(regs.status) == 0)
    }

    /// Halt every path in `paths`, wait for the hardware to confirm, and
    /// move the stopped paths back to `InitHw`.
    ///
    /// Paths that are only reserved or initialized are skipped. A path that
    /// fails to halt in time is still moved back; the timeout is returned.
    pub fn stop_paths(&self, paths: &[PathId], cmd: HaltCommand) -> Result<(), ErrorCode> {
        if paths.is_empty() {
            return Err(ErrorCode::INVAL);
        }
        if !matches!(cmd, HaltCommand::AtFrameBoundary | HaltCommand::Immediately) {
            error!("CSID:{} invalid stop command {:?}", self.hw_idx, cmd);
            return Err(ErrorCode::INVAL);
        }
        for &path in paths {
            self.path_regs(path)?;
        }

        let _ctrl = self.ctrl.lock();
        let mut ret = Ok(());
        let mut stopped = [false; NUM_PATHS];
        for &path in paths {
            match self.stop_path(path, cmd) {
                Ok(true) => stopped[path.index()] = true,
                Ok(false) => {}
                Err(e) => ret = ret.and(Err(e)),
            }
        }

        let polled = self.poll_stop_status(&stopped);
        for (idx, _) in stopped.iter().enumerate().filter(|(_, s)| **s) {
            self.path_irq[idx].set_state(PathState::InitHw);
        }
        ret.and(polled)
    }

    /// Issue the halt for one path. Returns whether the path was streaming.
    fn stop_path(&self, path: PathId, cmd: HaltCommand) -> Result<bool, ErrorCode> {
        let regs = self.path_regs(path)?;
        let st = &self.path_irq[path.index()];
        match st.state() {
            PathState::Reserved | PathState::InitHw => {
                debug!("CSID:{} {:?} not streaming", self.hw_idx, path);
                return Ok(false);
            }
            PathState::Streaming => {}
            state => {
                error!(
                    "CSID:{} stop {:?} in state {:?}",
                    self.hw_idx, path, state
                );
                return Err(ErrorCode::INVAL);
            }
        }

        let io = self.res.io;
        io.write(regs.irq_mask, 0);
        st.clear_counters();

        match path {
            PathId::Ipp => match st.sync_mode() {
                SyncMode::Master | SyncMode::None => {
                    self.modify_reg(regs.ctrl, |v| {
                        let mut ctrl = PathCtrl::new(v);
                        ctrl.modify(PATH_CTRL::HALT_CMD.val(cmd.bits()));
                        ctrl.get()
                    });
                }
                SyncMode::Slave if cmd == HaltCommand::Immediately => {
                    self.modify_reg(regs.ctrl, |v| {
                        let mut ctrl = PathCtrl::new(v);
                        ctrl.modify(
                            PATH_CTRL::HALT_CMD.val(cmd.bits()) + PATH_CTRL::HALT_MODE::Master,
                        );
                        ctrl.get()
                    });
                }
                SyncMode::Slave => {}
            },
            PathId::Rdi(_) => {
                self.modify_reg(regs.ctrl, |v| {
                    let mut ctrl = PathCtrl::new(v);
                    ctrl.modify(PATH_CTRL::HALT_CMD.val(cmd.bits()));
                    ctrl.get()
                });
            }
        }
        debug!("CSID:{} {:?} halt {:?}", self.hw_idx, path, cmd);
        Ok(true)
    }

    /// Wait until every path flagged in `stopped` reports halted. Every
    /// flagged path is polled; the first failure is returned.
    fn poll_stop_status(&self, stopped: &[bool]) -> Result<(), ErrorCode> {
        let mut ret = Ok(());
        for (idx, _) in stopped.iter().enumerate().filter(|(_, s)| **s) {
            let Some(path) = PathId::from_index(idx) else {
                continue;
            };
            let regs = match self.path_regs(path) {
                Ok(regs) => regs,
                Err(e) => {
                    ret = ret.and(Err(e));
                    continue;
                }
            };
            if self.path_irq[idx].state() != PathState::Streaming {
                continue;
            }
            let polled = self
                .res
                .io
                .poll_until(regs.status, 0x1, 0x1, POLL_SLEEP_US, POLL_TIMEOUT_US);
            if let Err(e) = polled {
                error!("CSID:{} {:?} halt timed out", self.hw_idx, path);
                ret = ret.and(Err(e));
            }
        }
        ret
    }

    /// Switch the halt source of the streaming pixel path.
    pub fn change_halt_mode(&self, path: PathId, mode: HaltMode) -> Result<(), ErrorCode> {
        if !path.is_ipp() {
            error!("CSID:{} halt mode change on {:?}", self.hw_idx, path);
            return Err(ErrorCode::INVAL);
        }
        let regs = self.path_regs(path)?;
        let _ctrl = self.ctrl.lock();
        let st = &self.path_irq[path.index()];
        if st.state() != PathState::Streaming {
            error!(
                "CSID:{} halt mode change in state {:?}",
                self.hw_idx,
                st.state()
            );
            return Err(ErrorCode::STATE);
        }

        self.res.io.write(regs.irq_mask, 0);
        self.modify_reg(regs.ctrl, |v| {
            let mut ctrl = PathCtrl::new(v);
            ctrl.modify(PATH_CTRL::HALT_MODE.val(mode.bits()));
            ctrl.get()
        });
        debug!("CSID:{} ipp halt mode {:?}", self.hw_idx, mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::POLL_TIMEOUT_US;
    use crate::format::PixelFormat;
    use crate::irq_status::IrqGroup;
    use crate::path::PixelWindow;
    use crate::registers::{CsidRegInfo, CSID530};
    use crate::test_support::{ipp_port, leak, rdi_port, Fixture};

    const RESUME: u32 = 1;

    #[test]
    fn start_requires_init_and_init_requires_reserve() {
        let fx = Fixture::new();
        let csid = fx.csid;
        assert_eq!(csid.init_path(PathId::Rdi(0)), Err(ErrorCode::STATE));
        assert_eq!(csid.init_hw(PathId::Rdi(0)), Err(ErrorCode::STATE));

        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        assert_eq!(csid.start_path(path), Err(ErrorCode::STATE));
        csid.init_hw(path).unwrap();
        assert_eq!(csid.init_path(path), Err(ErrorCode::STATE));
        csid.start_path(path).unwrap();
        assert_eq!(csid.path_state(path), Ok(PathState::Streaming));
        assert_eq!(csid.start_path(path), Err(ErrorCode::STATE));
    }

    #[test]
    fn ipp_raw10_decodes_and_crops() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let port = crate::path::PortConfig {
            in_format: PixelFormat::Raw10,
            out_format: PixelFormat::Plain16_10,
            left: PixelWindow {
                start: 8,
                end: 1927,
                width: 1920,
            },
            line_start: 4,
            line_end: 1083,
            height: 1080,
            ..ipp_port(0, 0x2b)
        };
        let path = csid.reserve(&port, fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();

        let codes = format::ipp_codes(PixelFormat::Raw10).unwrap();
        assert_eq!((codes.decode, codes.plain), (0x2, 0x1));

        let regs = CSID530.ipp.unwrap();
        let cfg0 = IppCfg0::new(fx.hw.reg(regs.cfg0));
        assert_eq!(cfg0.read(IPP_CFG0::DECODE_FORMAT), 0x2);
        assert_eq!(cfg0.read(IPP_CFG0::DT), 0x2b);
        assert!(cfg0.is_set(IPP_CFG0::CROP_H_EN));
        assert!(cfg0.is_set(IPP_CFG0::CROP_V_EN));
        assert!(cfg0.is_set(IPP_CFG0::EARLY_EOF_EN));
        assert!(cfg0.is_set(IPP_CFG0::PATH_EN));

        let crop = regs.crop.unwrap();
        assert_eq!(fx.hw.writes_to(crop.hcrop), [crop_window(8, 1927)]);
        assert_eq!(fx.hw.writes_to(crop.vcrop), [crop_window(4, 1083)]);
        assert_eq!(fx.hw.reg(regs.err_recovery_cfg0), 0x9);
    }

    fn binning_port(bayer_bin: bool, qcfa_bin: bool) -> crate::path::PortConfig {
        crate::path::PortConfig {
            in_format: PixelFormat::Raw10,
            bayer_bin,
            qcfa_bin,
            ..ipp_port(0, 0x2b)
        }
    }

    fn variant(binning: BinningSupport) -> &'static CsidRegInfo {
        leak(CsidRegInfo { binning, ..CSID530 })
    }

    fn ipp_cfg0(fx: &Fixture) -> IppCfg0 {
        let regs = fx.csid.info.ipp.unwrap();
        IppCfg0::new(fx.hw.reg(regs.cfg0))
    }

    #[test]
    fn bayer_binning_sets_bin_only() {
        let fx = Fixture::new();
        let path = fx.csid.reserve(&binning_port(true, false), fx.client, 0).unwrap();
        fx.csid.init_hw(path).unwrap();
        let cfg0 = ipp_cfg0(&fx);
        assert!(cfg0.is_set(IPP_CFG0::BIN_EN));
        assert!(!cfg0.is_set(IPP_CFG0::BIN_QCFA_EN));
    }

    #[test]
    fn qcfa_binning_sets_bin_and_qcfa() {
        let fx = Fixture::new();
        fx.caps.qcfa.set(true);
        let path = fx.csid.reserve(&binning_port(false, true), fx.client, 0).unwrap();
        fx.csid.init_hw(path).unwrap();
        let cfg0 = ipp_cfg0(&fx);
        assert!(cfg0.is_set(IPP_CFG0::BIN_EN));
        assert!(cfg0.is_set(IPP_CFG0::BIN_QCFA_EN));
    }

    #[test]
    fn both_binning_modes_rejected() {
        let fx = Fixture::new();
        fx.caps.qcfa.set(true);
        let path = fx.csid.reserve(&binning_port(true, true), fx.client, 0).unwrap();
        assert_eq!(fx.csid.init_hw(path), Err(ErrorCode::INVAL));
        assert_eq!(fx.csid.path_state(path), Ok(PathState::Reserved));
        assert_eq!(fx.csid.hw_state(), crate::csid::HwState::PowerDown);
    }

    #[test]
    fn binning_mode_missing_from_hw_rejected() {
        let fx = Fixture::with_info(variant(BinningSupport::BAYER | BinningSupport::MULTI_VCDT));
        fx.caps.qcfa.set(true);
        let path = fx.csid.reserve(&binning_port(false, true), fx.client, 0).unwrap();
        assert_eq!(fx.csid.init_hw(path), Err(ErrorCode::INVAL));
        assert_eq!(fx.csid.path_state(path), Ok(PathState::Reserved));
    }

    #[test]
    fn binning_ignored_without_hw_binning() {
        // Multi VC/DT routing alone is not a binning capability.
        let fx = Fixture::with_info(variant(BinningSupport::MULTI_VCDT));
        let path = fx.csid.reserve(&binning_port(true, false), fx.client, 0).unwrap();
        fx.csid.init_hw(path).unwrap();
        assert_eq!(fx.csid.path_state(path), Ok(PathState::InitHw));
        let cfg0 = ipp_cfg0(&fx);
        assert!(!cfg0.is_set(IPP_CFG0::BIN_EN));
        assert!(!cfg0.is_set(IPP_CFG0::BIN_QCFA_EN));
        assert!(cfg0.is_set(IPP_CFG0::PATH_EN));
    }

    #[test]
    fn rdi_unpacks_raw10_to_plain16() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let port = crate::path::PortConfig {
            in_format: PixelFormat::Raw10,
            out_format: PixelFormat::Plain16_10,
            ..rdi_port(1, 2, 0x2b)
        };
        let path = csid.reserve(&port, fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();

        let regs = &CSID530.rdi[1];
        let cfg0 = RdiCfg0::new(fx.hw.reg(regs.cfg0));
        assert_eq!(cfg0.read(RDI_CFG0::DECODE_FORMAT), 0x2);
        assert_eq!(cfg0.read(RDI_CFG0::PLAIN_FORMAT), 0x1);
        assert_eq!(cfg0.read(RDI_CFG0::VC), 2);
        assert!(cfg0.is_set(RDI_CFG0::PATH_EN));
        assert!(CSID530.rdi[1].crop.is_none());
    }

    #[test]
    fn rdi_unsupported_conversion_fails_init() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let port = crate::path::PortConfig {
            in_format: PixelFormat::Raw12,
            out_format: PixelFormat::Plain16_10,
            ..rdi_port(0, 0, 0x2c)
        };
        let path = csid.reserve(&port, fx.client, 0).unwrap();
        assert_eq!(csid.init_hw(path), Err(ErrorCode::NOSUPPORT));
        assert_eq!(csid.path_state(path), Ok(PathState::Reserved));
        assert_eq!(csid.hw_state(), crate::csid::HwState::PowerDown);
    }

    #[test]
    fn second_vc_dt_routed_when_requested() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let mut port = rdi_port(0, 0, 0x2b);
        port.vc_dt[1] = crate::path::VcDt::new(1, 0x12);
        port.num_vc_dt = 2;
        let path = csid.reserve(&port, fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();

        let v = LocalRegisterCopy::<u32, MULTI_VCDT_CFG0::Register>::new(
            fx.hw.reg(CSID530.rdi[0].multi_vcdt_cfg0.unwrap()),
        );
        assert!(v.is_set(MULTI_VCDT_CFG0::EN));
        assert_eq!(v.read(MULTI_VCDT_CFG0::VC1), 1);
        assert_eq!(v.read(MULTI_VCDT_CFG0::DT1), 0x12);
    }

    fn dual_rdi(fx: &Fixture) -> PathId {
        let port = crate::path::PortConfig {
            usage: UsageType::Dual,
            ..rdi_port(0, 0, 0x2b)
        };
        let path = fx.csid.reserve(&port, fx.client, 0).unwrap();
        fx.csid.init_hw(path).unwrap();
        path
    }

    #[test]
    fn frame_drop_resumes_exactly_once() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let path = dual_rdi(&fx);
        let regs = &CSID530.rdi[0];

        fx.hw.clear_writes();
        csid.start_path(path).unwrap();
        assert!(fx.hw.writes_to(regs.ctrl).is_empty());
        assert_ne!(fx.hw.reg(regs.irq_mask) & PathIrq::INPUT_SOF.bits(), 0);

        fx.fire(IrqGroup::Rdi0, PathIrq::INPUT_SOF.bits());
        assert_eq!(fx.hw.writes_to(regs.ctrl), [RESUME]);
        assert_eq!(fx.hw.reg(regs.irq_mask) & PathIrq::INPUT_SOF.bits(), 0);

        fx.fire(IrqGroup::Rdi0, PathIrq::INPUT_SOF.bits());
        fx.fire(IrqGroup::Rdi0, PathIrq::INPUT_SOF.bits());
        assert_eq!(fx.hw.writes_to(regs.ctrl), [RESUME]);
        assert_eq!(fx.run_bottom_halves(), 0);
    }

    #[test]
    fn restart_resets_sof_count() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let path = dual_rdi(&fx);
        let regs = &CSID530.rdi[0];

        csid.start_path(path).unwrap();
        fx.fire(IrqGroup::Rdi0, PathIrq::INPUT_SOF.bits());
        assert_eq!(csid.path_irq[path.index()].sof_cnt(), 1);

        csid.stop_paths(&[path], HaltCommand::AtFrameBoundary).unwrap();
        assert_eq!(csid.path_state(path), Ok(PathState::InitHw));
        assert_eq!(csid.path_irq[path.index()].sof_cnt(), 0);

        fx.hw.clear_writes();
        csid.start_path(path).unwrap();
        assert_eq!(csid.path_irq[path.index()].sof_cnt(), 0);
        assert_eq!(csid.path_irq[path.index()].init_frame_drop(), 1);
        assert!(fx.hw.writes_to(regs.ctrl).is_empty());

        fx.fire(IrqGroup::Rdi0, PathIrq::INPUT_SOF.bits());
        assert_eq!(fx.hw.writes_to(regs.ctrl), [RESUME]);
    }

    #[test]
    fn single_rdi_resumes_at_start() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let path = csid.reserve(&rdi_port(2, 0, 0x2b), fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();
        csid.start_path(path).unwrap();

        let regs = &CSID530.rdi[2];
        assert_eq!(fx.hw.reg(regs.ctrl), RESUME);
        assert_eq!(fx.hw.reg(regs.irq_mask) & PathIrq::INPUT_SOF.bits(), 0);
        assert_ne!(fx.hw.reg(regs.irq_mask) & PathIrq::BASE_MASK.bits(), 0);
    }

    #[test]
    fn stop_times_out_on_busy_path() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();
        csid.start_path(path).unwrap();

        let regs = &CSID530.rdi[0];
        fx.hw.set_reg(regs.status, 0);
        let before = fx.hw.slept_us.get();
        assert_eq!(
            csid.stop_paths(&[path], HaltCommand::Immediately),
            Err(ErrorCode::TIMEOUT)
        );
        let slept = fx.hw.slept_us.get() - before;
        assert!(slept >= u64::from(POLL_TIMEOUT_US));
        assert!(slept <= u64::from(POLL_TIMEOUT_US) * 2);
        assert_eq!(csid.path_state(path), Ok(PathState::InitHw));
        assert_eq!(fx.hw.reg(regs.irq_mask), 0);
        assert_eq!(fx.hw.reg(regs.ctrl), HaltCommand::Immediately.bits());
    }

    #[test]
    fn stop_polls_every_busy_path() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let rdi0 = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        let rdi1 = csid.reserve(&rdi_port(1, 0, 0x2c), fx.client, 0).unwrap();
        for path in [rdi0, rdi1] {
            csid.init_hw(path).unwrap();
            csid.start_path(path).unwrap();
        }
        fx.hw.set_reg(CSID530.rdi[0].status, 0);
        fx.hw.set_reg(CSID530.rdi[1].status, 0);

        let before = fx.hw.slept_us.get();
        assert_eq!(
            csid.stop_paths(&[rdi0, rdi1], HaltCommand::AtFrameBoundary),
            Err(ErrorCode::TIMEOUT)
        );
        assert!(fx.hw.slept_us.get() - before >= 2 * u64::from(POLL_TIMEOUT_US));
        assert_eq!(csid.path_state(rdi0), Ok(PathState::InitHw));
        assert_eq!(csid.path_state(rdi1), Ok(PathState::InitHw));
    }

    #[test]
    fn rdi_halt_keeps_other_ctrl_bits() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();
        csid.start_path(path).unwrap();

        let regs = &CSID530.rdi[0];
        fx.hw.set_reg(regs.ctrl, fx.hw.reg(regs.ctrl) | 0x100);
        csid.stop_paths(&[path], HaltCommand::Immediately).unwrap();
        let ctrl = PathCtrl::new(fx.hw.reg(regs.ctrl));
        assert_eq!(ctrl.read(PATH_CTRL::HALT_CMD), HaltCommand::Immediately.bits());
        assert_eq!(ctrl.get() & 0x100, 0x100);
    }

    #[test]
    fn stop_validates_arguments() {
        let fx = Fixture::new();
        let csid = fx.csid;
        assert_eq!(
            csid.stop_paths(&[], HaltCommand::AtFrameBoundary),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(
            csid.stop_paths(&[PathId::Rdi(0)], HaltCommand::ResumeAtFrameBoundary),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(
            csid.stop_paths(&[PathId::Rdi(0)], HaltCommand::AtFrameBoundary),
            Err(ErrorCode::INVAL)
        );

        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        assert_eq!(
            csid.stop_paths(&[path], HaltCommand::AtFrameBoundary),
            Ok(())
        );
        assert_eq!(csid.path_state(path), Ok(PathState::Reserved));
    }

    #[test]
    fn slave_ipp_waits_for_master() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let port = crate::path::PortConfig {
            sync_mode: SyncMode::Slave,
            master_idx: 1,
            ..ipp_port(0, 0x2b)
        };
        let path = csid.reserve(&port, fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();
        csid.start_path(path).unwrap();

        let regs = CSID530.ipp.unwrap();
        let ctrl = PathCtrl::new(fx.hw.reg(regs.ctrl));
        assert!(ctrl.matches_all(PATH_CTRL::HALT_MODE::Slave));
        assert_eq!(ctrl.read(PATH_CTRL::HALT_CMD), 0);

        // A frame boundary halt is left to the master.
        fx.hw.clear_writes();
        csid.stop_paths(&[path], HaltCommand::AtFrameBoundary).unwrap();
        assert!(fx.hw.writes_to(regs.ctrl).is_empty());
    }

    #[test]
    fn halt_mode_change_only_on_streaming_ipp() {
        let fx = Fixture::new();
        let csid = fx.csid;
        assert_eq!(
            csid.change_halt_mode(PathId::Rdi(0), HaltMode::Global),
            Err(ErrorCode::INVAL)
        );
        let path = csid.reserve(&ipp_port(0, 0x2b), fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();
        assert_eq!(
            csid.change_halt_mode(path, HaltMode::Global),
            Err(ErrorCode::STATE)
        );

        csid.start_path(path).unwrap();
        csid.change_halt_mode(path, HaltMode::Global).unwrap();
        let regs = CSID530.ipp.unwrap();
        let ctrl = PathCtrl::new(fx.hw.reg(regs.ctrl));
        assert!(ctrl.matches_all(PATH_CTRL::HALT_MODE::Global));
        assert_eq!(fx.hw.reg(regs.irq_mask), 0);
    }
}
