// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interrupt handling.
//!
//! The top half ([`TfeCsid::handle_interrupt`]) runs in interrupt context. It
//! snapshots and clears every status group, signals reset completions,
//! triages receiver and path errors, and hands anything the client must hear
//! about to the bottom half through a pooled [`EventPayload`]. The bottom
//! half runs from the deferred scheduler and is the only place the event
//! client is called.

use core::sync::atomic::Ordering;

use kernel::deferred_call::BottomHalfClient;
use kernel::hil::isp::{EventClient, HwErrorType, HwEventInfo, HwEventKind};
use kernel::log_ratelimited;
use log::{debug, error, info, Level};
use tock_registers::fields::FieldValue;
use tock_registers::LocalRegisterCopy;

use crate::config::{CONFIG, MAX_IRQ_ERROR_COUNT, SOF_DEBUG_SAMPLES};
use crate::csid::{TfeCsid, NO_PHY};
use crate::irq_status::{
    DebugFlags, IrqGroup, IrqStatus, PathIrq, RxIrq, TopIrq, RX_ERROR_NAMES,
};
use crate::path::{PathId, PathState, SyncMode};
use crate::payload::EventPayload;
use crate::registers::{
    CapturedPkt, Measure, PathCtrl, PathRegs, CAPTURED_PKT, FORMAT_MEASURE, PATH_CTRL,
    RX_RST_STROBES,
};

/// Mask of the DT field in short and C-PHY packet headers.
const SHORT_DT_MASK: u32 = 0x1f;

impl TfeCsid<'_> {
    /// Top half. Call on every CSID interrupt.
    pub fn handle_interrupt(&self) {
        let io = self.res.io;
        let regs = self.info;

        let mut status = IrqStatus::default();
        status.set(IrqGroup::Top, io.read(regs.cmn.top_irq_status));
        status.set(IrqGroup::Rx, io.read(regs.rx.irq_status));
        for (path, p) in self.present_paths() {
            status.set_path(path.index(), io.read(p.irq_status));
        }

        io.write(regs.cmn.top_irq_clear, status.get(IrqGroup::Top));
        io.write(regs.rx.irq_clear, status.get(IrqGroup::Rx));
        for (path, p) in self.present_paths() {
            io.write(p.irq_clear, status.path(path.index()).bits());
        }
        io.write(regs.cmn.irq_cmd, 1);

        if CONFIG.trace_irq {
            debug!("CSID:{} irq status {:x?}", self.hw_idx, status.0);
        }

        if status.get(IrqGroup::Top) != 0 {
            self.top_done.complete();
        }
        let rx = status.rx();
        if rx.contains(RxIrq::RST_DONE) {
            self.rx_done.complete();
        }

        let (mut err, fatal) = self.shared.lock_irqsave(self.res.irq_ctl, |s| {
            let mut err = false;
            let mut fatal = false;
            if s.device_enabled {
                if rx.intersects(RxIrq::LANE_FIFO_OVERFLOW) {
                    fatal = true;
                } else {
                    let soft = rx.intersection(RxIrq::SOFT_ERRORS).bits().count_ones();
                    if soft > 0 {
                        s.error_irq_count = s.error_irq_count.saturating_add(soft);
                        err = true;
                    }
                    if rx.intersects(RxIrq::PROTOCOL_ERRORS) {
                        err = true;
                    }
                }
            }
            if s.error_irq_count > MAX_IRQ_ERROR_COUNT {
                fatal = true;
                s.error_irq_count = 0;
            }
            (err, fatal)
        });

        if fatal {
            io.write(regs.rx.cfg0, 0);
            io.write(regs.rx.cfg1, 0);
            io.write(regs.rx.irq_mask, 0);
            let phy = self.phy_dump_idx.load(Ordering::Relaxed);
            if phy != NO_PHY {
                if let Some(notifier) = self.res.phy {
                    notifier.notify_register_dump(phy);
                }
            }
            self.handle_hw_err_irq(HwErrorType::CsidFatal, &status);
        }

        let debug = self.debug_flags();
        self.log_rx_status(rx, debug);
        if debug.contains(DebugFlags::RST_IRQ_LOG) && status.top().contains(TopIrq::RST_DONE) {
            info!("CSID:{} top reset done", self.hw_idx);
        }

        let mut log_en = false;
        for (path, p) in self.present_paths() {
            let idx = path.index();
            let st = status.path(idx);
            if st.is_empty() {
                continue;
            }

            if st.contains(PathIrq::RST_DONE) {
                self.path_done[idx].complete();
                if debug.contains(DebugFlags::RST_IRQ_LOG) {
                    info!("CSID:{} {:?} reset done", self.hw_idx, path);
                }
            }

            if st.contains(PathIrq::INPUT_SOF) {
                self.frame_drop_completion(path, p);
                if debug.contains(DebugFlags::SOF_IRQ) {
                    if !self.sof_irq_triggered.load(Ordering::Relaxed) {
                        log_ratelimited!(Level::Info, "CSID:{} {:?} SOF", self.hw_idx, path);
                    } else {
                        log_en = true;
                        self.irq_debug_cnt.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            if st.contains(PathIrq::INPUT_EOF) && debug.contains(DebugFlags::EOF_IRQ) {
                log_ratelimited!(Level::Info, "CSID:{} {:?} EOF", self.hw_idx, path);
            }

            if st.contains(PathIrq::FIFO_OVERFLOW) {
                let mut ctrl = PathCtrl::new(0);
                ctrl.modify(PATH_CTRL::HALT_CMD::HaltImmediately);
                io.write(p.ctrl, ctrl.get());
                err = true;
                log_ratelimited!(
                    Level::Error,
                    "CSID:{} {:?} fifo overflow, halted",
                    self.hw_idx,
                    path
                );
            }
            if st.intersects(PathIrq::CCIF_VIOLATION | PathIrq::OVERFLOW_IRQ) {
                err = true;
                log_ratelimited!(
                    Level::Error,
                    "CSID:{} {:?} path error {:#x}",
                    self.hw_idx,
                    path,
                    st.bits()
                );
            }
            if st.intersects(PathIrq::FORMAT_MEASURE) {
                self.log_format_mismatch(path, p, st);
            }
        }

        if err || fatal || log_en {
            if err || fatal {
                log_ratelimited!(
                    Level::Error,
                    "CSID:{} error irq {:x?}",
                    self.hw_idx,
                    status.0
                );
            }
            self.handle_hw_err_irq(HwErrorType::None, &status);
        }

        if self.irq_debug_cnt.load(Ordering::Relaxed) >= SOF_DEBUG_SAMPLES {
            self.set_sof_irq_debug(false);
            self.irq_debug_cnt.store(0, Ordering::Relaxed);
        }
    }

    fn log_rx_status(&self, rx: RxIrq, debug: DebugFlags) {
        if rx.contains(RxIrq::CPHY_PH_CRC) {
            log_ratelimited!(
                Level::Error,
                "CSID:{} cphy packet header crc error",
                self.hw_idx
            );
        }
        if debug.contains(DebugFlags::EOT_IRQ) && rx.intersects(RxIrq::EOT_CAPTURED) {
            log_ratelimited!(
                Level::Info,
                "CSID:{} EOT lanes {:#x}",
                self.hw_idx,
                rx.intersection(RxIrq::EOT_CAPTURED).bits()
            );
        }
        if debug.contains(DebugFlags::SOT_IRQ) && rx.intersects(RxIrq::SOT_CAPTURED) {
            log_ratelimited!(
                Level::Info,
                "CSID:{} SOT lanes {:#x}",
                self.hw_idx,
                rx.intersection(RxIrq::SOT_CAPTURED).bits() >> 4
            );
        }
        if debug.contains(DebugFlags::SHORT_PKT_CAPTURE) && rx.contains(RxIrq::SHORT_PKT_CAPTURED) {
            self.log_short_packet();
        }
        if debug.contains(DebugFlags::LONG_PKT_CAPTURE) && rx.contains(RxIrq::LONG_PKT_CAPTURED) {
            self.log_long_packet();
        }
        if debug.contains(DebugFlags::CPHY_PKT_CAPTURE) && rx.contains(RxIrq::CPHY_PKT_HDR_CAPTURED)
        {
            self.log_cphy_packet();
        }
        if debug.contains(DebugFlags::RST_IRQ_LOG) && rx.contains(RxIrq::RST_DONE) {
            info!("CSID:{} rx reset done", self.hw_idx);
        }
    }

    fn reset_capture(&self, strobe: FieldValue<u32, RX_RST_STROBES::Register>) {
        let mut v = LocalRegisterCopy::<u32, RX_RST_STROBES::Register>::new(0);
        v.modify(strobe);
        self.res.io.write(self.info.rx.rst_strobes, v.get());
    }

    fn log_short_packet(&self) {
        let io = self.res.io;
        let hdr = CapturedPkt::new(io.read(self.info.rx.captured_short_pkt_0));
        let line = io.read(self.info.rx.captured_short_pkt_1);
        log_ratelimited!(
            Level::Info,
            "CSID:{} short pkt vc {} dt {:#x} frame {} line {}",
            self.hw_idx,
            hdr.read(CAPTURED_PKT::VC),
            hdr.read(CAPTURED_PKT::DT) & SHORT_DT_MASK,
            hdr.read(CAPTURED_PKT::WORD_COUNT),
            line
        );
        self.reset_capture(RX_RST_STROBES::SHORT_PKT_HDR::SET);
    }

    fn log_long_packet(&self) {
        let io = self.res.io;
        let rx = &self.info.rx;
        let hdr = CapturedPkt::new(io.read(rx.captured_long_pkt_0));
        let ecc = io.read(rx.captured_long_pkt_1);
        let ftr = io.read(rx.captured_long_pkt_ftr);
        log_ratelimited!(
            Level::Info,
            "CSID:{} long pkt vc {} dt {:#x} wc {} ecc {:#x} crc calc {:#x} exp {:#x}",
            self.hw_idx,
            hdr.read(CAPTURED_PKT::VC),
            hdr.read(CAPTURED_PKT::DT),
            hdr.read(CAPTURED_PKT::WORD_COUNT),
            ecc,
            ftr >> 16,
            ftr & 0xffff
        );
        self.reset_capture(RX_RST_STROBES::LONG_PKT_HDR::SET);
    }

    fn log_cphy_packet(&self) {
        let hdr = CapturedPkt::new(self.res.io.read(self.info.rx.captured_cphy_pkt_hdr));
        log_ratelimited!(
            Level::Info,
            "CSID:{} cphy pkt vc {} dt {:#x} wc {}",
            self.hw_idx,
            hdr.read(CAPTURED_PKT::VC),
            hdr.read(CAPTURED_PKT::DT) & SHORT_DT_MASK,
            hdr.read(CAPTURED_PKT::WORD_COUNT)
        );
        self.reset_capture(RX_RST_STROBES::CPHY_PKT_HDR::SET);
    }

    fn log_format_mismatch(&self, path: PathId, regs: &PathRegs, st: PathIrq) {
        let io = self.res.io;
        let expected = Measure::new(io.read(regs.format_measure_cfg1));
        let measured = Measure::new(io.read(regs.format_measure0));
        let what = if st.contains(PathIrq::PIX_COUNT) {
            "pixel"
        } else {
            "line"
        };
        log_ratelimited!(
            Level::Error,
            "CSID:{} {:?} {} count mismatch: expected {}x{} measured {}x{}",
            self.hw_idx,
            path,
            what,
            expected.read(FORMAT_MEASURE::WIDTH),
            expected.read(FORMAT_MEASURE::HEIGHT),
            measured.read(FORMAT_MEASURE::WIDTH),
            measured.read(FORMAT_MEASURE::HEIGHT)
        );
    }

    /// Count one SOF toward the path's initial frame drop and resume the path
    /// once the target is reached.
    pub(crate) fn frame_drop_completion(&self, path: PathId, regs: &PathRegs) {
        let st = &self.path_irq[path.index()];
        let target = st.init_frame_drop();
        if target == 0 || st.state() != PathState::Streaming {
            return;
        }
        if st.sof_cnt() == u32::MAX {
            log_ratelimited!(
                Level::Warn,
                "CSID:{} {:?} sof count overflow",
                self.hw_idx,
                path
            );
            return;
        }

        let cnt = st.bump_sof_cnt();
        debug!(
            "CSID:{} {:?} sof {} frame drop {}",
            self.hw_idx, path, cnt, target
        );
        if cnt != target {
            return;
        }

        let io = self.res.io;
        match path {
            PathId::Ipp => {
                if st.sync_mode() != SyncMode::Slave {
                    self.modify_reg(regs.ctrl, |v| {
                        let mut ctrl = PathCtrl::new(v);
                        ctrl.modify(PATH_CTRL::HALT_CMD::ResumeAtFrameBoundary);
                        ctrl.get()
                    });
                }
            }
            PathId::Rdi(_) => {
                let mut ctrl = PathCtrl::new(0);
                ctrl.modify(PATH_CTRL::HALT_CMD::ResumeAtFrameBoundary);
                io.write(regs.ctrl, ctrl.get());
            }
        }
        if !self.debug_flags().contains(DebugFlags::SOF_IRQ) {
            self.modify_reg(regs.irq_mask, |v| v & !PathIrq::INPUT_SOF.bits());
        }
        debug!("CSID:{} {:?} frame drop done, resumed", self.hw_idx, path);
    }

    /// Queue an event for the bottom half. Drops the event if no payload or
    /// task is free.
    pub(crate) fn handle_hw_err_irq(&self, err_type: HwErrorType, status: &IrqStatus) {
        let hw_idx = self.hw_idx;
        let slot = self.shared.lock_irqsave(self.res.irq_ctl, |s| {
            s.pool.acquire(EventPayload {
                err_type,
                status: *status,
                hw_idx,
                ctx: s.client_ctx,
            })
        });
        let Some(slot) = slot else {
            log_ratelimited!(
                Level::Error,
                "CSID:{} no free event payload, dropping {:?}",
                self.hw_idx,
                err_type
            );
            return;
        };

        let Some(task) = self.res.scheduler.acquire_task() else {
            self.shared
                .lock_irqsave(self.res.irq_ctl, |s| s.pool.release(slot));
            log_ratelimited!(
                Level::Error,
                "CSID:{} no bottom half task, dropping {:?}",
                self.hw_idx,
                err_type
            );
            return;
        };
        self.res.scheduler.enqueue(task, slot);
    }

    fn process_event(&self, payload: &EventPayload, client: Option<&dyn EventClient>, ctx: usize) {
        let Some(client) = client else {
            error!("CSID:{} event without a client", self.hw_idx);
            return;
        };
        if payload.ctx != ctx {
            error!(
                "CSID:{} event context {:#x} does not match client {:#x}",
                self.hw_idx, payload.ctx, ctx
            );
            return;
        }

        let status = &payload.status;
        if self.sof_irq_triggered.load(Ordering::Relaxed) && payload.err_type == HwErrorType::None
        {
            for (path, _) in self.present_paths() {
                if status.path(path.index()).contains(PathIrq::INPUT_SOF) {
                    info!("CSID:{} {:?} SOF", self.hw_idx, path);
                }
            }
        } else {
            error!(
                "CSID:{} status top {:#x} rx {:#x} ipp {:#x} rdi {:#x} {:#x} {:#x}",
                self.hw_idx,
                status.get(IrqGroup::Top),
                status.get(IrqGroup::Rx),
                status.get(IrqGroup::Ipp),
                status.get(IrqGroup::Rdi0),
                status.get(IrqGroup::Rdi1),
                status.get(IrqGroup::Rdi2)
            );
            let rx = status.rx();
            for (bit, name) in RX_ERROR_NAMES.iter() {
                if rx.contains(*bit) {
                    error!("CSID:{} rx error: {}", self.hw_idx, name);
                }
            }
        }

        if payload.err_type == HwErrorType::CsidFatal {
            let first = self.shared.lock_irqsave(self.res.irq_ctl, |s| {
                !core::mem::replace(&mut s.fatal_err_detected, true)
            });
            if !first {
                debug!("CSID:{} fatal error already reported", self.hw_idx);
                return;
            }
            let info = HwEventInfo {
                hw_idx: payload.hw_idx,
                err_type: HwErrorType::CsidFatal,
            };
            if let Err(e) = client.event(HwEventKind::Error, &info) {
                error!("CSID:{} event client failed: {}", self.hw_idx, e);
            }
        }
    }
}

impl BottomHalfClient for TfeCsid<'_> {
    fn handle_bottom_half(&self, slot: usize) {
        let (payload, client, ctx) = self.shared.lock_irqsave(self.res.irq_ctl, |s| {
            (s.pool.get(slot), s.client, s.client_ctx)
        });
        let Some(payload) = payload else {
            error!("CSID:{} bottom half for free payload {}", self.hw_idx, slot);
            return;
        };
        self.process_event(&payload, client, ctx);
        self.shared
            .lock_irqsave(self.res.irq_ctl, |s| s.pool.release(slot));
    }
}
