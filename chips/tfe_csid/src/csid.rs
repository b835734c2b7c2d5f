// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! TFE CSID device: resource reservation, power sequencing and resets.
//!
//! A `TfeCsid` is driven from two contexts. Control-plane calls from the ISP
//! hardware manager take the coarse `ctrl` lock and may sleep. The interrupt
//! handler never takes that lock: it reads path state from atomics and
//! shares the enable/fatal flags, the event client and the payload pool with
//! the control plane through the interrupt-safe `shared` lock, which is never
//! held across a wait.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let csid = TfeCsid::new(0, &registers::CSID530, resources);
//! csid.probe_init()?;
//! let path = csid.reserve(&port, &hw_mgr, ctx)?;
//! csid.init_hw(path)?;
//! csid.start_path(path)?;
//! // ... interrupts call csid.handle_interrupt() ...
//! csid.stop_paths(&[path], HaltCommand::AtFrameBoundary)?;
//! csid.deinit_hw(path)?;
//! csid.release(path)?;
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use kernel::deferred_call::BottomHalfScheduler;
use kernel::hil::interrupt::InterruptControl;
use kernel::hil::isp::{CapabilityQuery, EventClient, IspFeature};
use kernel::hil::mmio::RegisterIo;
use kernel::hil::phy::{PhyNotifier, PpiBridge, PpiLaneConfig};
use kernel::hil::soc::SocResources;
use kernel::hil::time::{BootClock, Delay};
use kernel::utilities::completion::Completion;
use kernel::utilities::irq_lock::IrqSpinLock;
use kernel::ErrorCode;
use log::{debug, error, info, warn};
use spin::Mutex;

use crate::cid::{CidTable, Csi2Rx, Csi2RxConfig, InputResource, PhySelBase, RxRequest};
use crate::config::{
    COMPLETION_TIMEOUT_MS, CONFIG, DEFAULT_CLOCK_HZ, MAX_PPI, MAX_VC_DT, POLL_SLEEP_US,
    POLL_TIMEOUT_US,
};
use crate::irq_status::{DebugFlags, PathIrq, RxIrq, TopIrq};
use crate::path::{PathConfig, PathId, PathIrqState, PathState, PortConfig, VcDt, NUM_PATHS};
use crate::payload::PayloadPool;
use crate::registers::{CsidRegInfo, CsidVersion, PathRegs, RxCfg0, RxCfg1, RX_CFG0, RX_CFG1};
use crate::timestamp::{self, BootAnchor, Timestamps};

/// Power state of the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwState {
    PowerDown,
    PowerUp,
}

/// Platform services a CSID instance is built on.
#[derive(Clone, Copy)]
pub struct CsidResources<'a> {
    /// The CSID register window.
    pub io: &'a dyn RegisterIo,
    /// Top level register window holding the TFE fuses. Fuse checks are
    /// skipped without it.
    pub fuse_io: Option<&'a dyn RegisterIo>,
    pub delay: &'a dyn Delay,
    pub boot_clock: &'a dyn BootClock,
    pub soc: &'a dyn SocResources,
    pub irq_ctl: &'a dyn InterruptControl,
    pub scheduler: &'a dyn BottomHalfScheduler,
    pub caps: &'a dyn CapabilityQuery,
    pub phy: Option<&'a dyn PhyNotifier>,
    /// PPI bridges, indexed by physical PHY.
    pub ppi: [Option<&'a dyn PpiBridge>; MAX_PPI],
}

/// Capabilities reported to the hardware manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CsidCaps {
    pub num_rdis: usize,
    /// Pixel paths; 0 when fused off.
    pub num_pix: usize,
    pub version: CsidVersion,
    pub sync_clk: bool,
}

/// State owned by the control plane.
pub(crate) struct ControlState {
    pub(crate) hw_state: HwState,
    pub(crate) open_count: u32,
    pub(crate) cid: CidTable,
    pub(crate) rx: Csi2Rx,
    pub(crate) paths: [PathConfig; NUM_PATHS],
    /// Rate requested for the next power up.
    pub(crate) clk_rate: u64,
    /// Rate the clock currently runs at.
    pub(crate) applied_clk_rate: u64,
    pub(crate) anchor: BootAnchor,
    pub(crate) hw_version: u32,
}

impl ControlState {
    const fn new() -> Self {
        Self {
            hw_state: HwState::PowerDown,
            open_count: 0,
            cid: CidTable::new(),
            rx: Csi2Rx::new(),
            paths: [PathConfig::EMPTY; NUM_PATHS],
            clk_rate: DEFAULT_CLOCK_HZ,
            applied_clk_rate: 0,
            anchor: BootAnchor::new(),
            hw_version: 0,
        }
    }
}

/// State shared with the interrupt handler.
pub(crate) struct IrqShared<'a> {
    pub(crate) device_enabled: bool,
    /// Latched once a fatal event reached the client; cleared by a global
    /// reset or power up.
    pub(crate) fatal_err_detected: bool,
    pub(crate) error_irq_count: u32,
    pub(crate) client: Option<&'a dyn EventClient>,
    pub(crate) client_ctx: usize,
    pub(crate) pool: PayloadPool,
}

/// Marker stored in `phy_dump_idx` when no physical PHY is selected.
pub(crate) const NO_PHY: u32 = u32::MAX;

pub struct TfeCsid<'a> {
    pub(crate) hw_idx: u32,
    pub(crate) info: &'static CsidRegInfo,
    pub(crate) res: CsidResources<'a>,

    pub(crate) ctrl: Mutex<ControlState>,
    pub(crate) shared: IrqSpinLock<IrqShared<'a>>,

    pub(crate) path_irq: [PathIrqState; NUM_PATHS],
    pub(crate) path_done: [Completion; NUM_PATHS],
    pub(crate) top_done: Completion,
    pub(crate) rx_done: Completion,

    pub(crate) debug: AtomicU32,
    pub(crate) ipp_present: AtomicBool,
    pub(crate) sof_irq_triggered: AtomicBool,
    pub(crate) irq_debug_cnt: AtomicU32,
    pub(crate) phy_dump_idx: AtomicU32,
}

impl<'a> TfeCsid<'a> {
    pub fn new(hw_idx: u32, info: &'static CsidRegInfo, res: CsidResources<'a>) -> Self {
        Self {
            hw_idx,
            info,
            res,
            ctrl: Mutex::new(ControlState::new()),
            shared: IrqSpinLock::new(IrqShared {
                device_enabled: false,
                fatal_err_detected: false,
                error_irq_count: 0,
                client: None,
                client_ctx: 0,
                pool: PayloadPool::new(),
            }),
            path_irq: [const { PathIrqState::new() }; NUM_PATHS],
            path_done: [const { Completion::new() }; NUM_PATHS],
            top_done: Completion::new(),
            rx_done: Completion::new(),
            debug: AtomicU32::new(0),
            ipp_present: AtomicBool::new(false),
            sof_irq_triggered: AtomicBool::new(false),
            irq_debug_cnt: AtomicU32::new(0),
            phy_dump_idx: AtomicU32::new(NO_PHY),
        }
    }

    pub fn hw_idx(&self) -> u32 {
        self.hw_idx
    }

    /// Check the fuses and bring every software structure to its initial
    /// state. Must run before any other call.
    pub fn probe_init(&self) -> Result<(), ErrorCode> {
        let mut ipp = self.info.ipp.is_some();
        if let (Some(fuse), Some(fuse_io)) = (self.info.fuse, self.res.fuse_io) {
            if fuse.hw_idx == self.hw_idx {
                if fuse_io.read(fuse.tfe_fuse) & 0x1 != 0 {
                    error!("CSID:{} TFE disabled by fuse", self.hw_idx);
                    return Err(ErrorCode::NOSUPPORT);
                }
                if fuse_io.read(fuse.pix_pipe_fuse) & 0x1 != 0 {
                    info!("CSID:{} pixel path disabled by fuse", self.hw_idx);
                    ipp = false;
                }
            }
        }
        self.ipp_present.store(ipp, Ordering::Relaxed);

        let mut ctrl = self.ctrl.lock();
        *ctrl = ControlState::new();
        for (idx, st) in self.path_irq.iter().enumerate() {
            let present = PathId::from_index(idx).is_some_and(|p| self.path_regs(p).is_ok());
            st.clear_counters();
            st.set_sync_mode(Default::default());
            st.set_state(if present {
                PathState::Available
            } else {
                PathState::Unavailable
            });
        }
        ctrl.cid.clear();

        self.shared.lock_irqsave(self.res.irq_ctl, |s| {
            s.device_enabled = false;
            s.fatal_err_detected = false;
            s.error_irq_count = 0;
            s.client = None;
            s.pool.fill();
        });

        let debug = if CONFIG.debug_reset_on_probe {
            DebugFlags::RST_IRQ_LOG
        } else {
            DebugFlags::empty()
        };
        self.debug.store(debug.bits(), Ordering::Relaxed);
        self.phy_dump_idx.store(NO_PHY, Ordering::Relaxed);

        info!(
            "CSID:{} probed, ipp {} rdis {}",
            self.hw_idx,
            if ipp { "present" } else { "absent" },
            self.info.num_rdis
        );
        Ok(())
    }

    pub fn get_capabilities(&self) -> CsidCaps {
        CsidCaps {
            num_rdis: self.info.num_rdis,
            num_pix: usize::from(self.ipp_present.load(Ordering::Relaxed)),
            version: self.info.version,
            sync_clk: self.info.sync_clk,
        }
    }

    pub fn path_state(&self, path: PathId) -> Result<PathState, ErrorCode> {
        let path = path.checked()?;
        Ok(self.path_irq[path.index()].state())
    }

    /// Software configuration of a reserved path.
    pub fn path_config(&self, path: PathId) -> Result<PathConfig, ErrorCode> {
        self.path_regs(path)?;
        Ok(self.ctrl.lock().paths[path.index()])
    }

    pub fn hw_state(&self) -> HwState {
        self.ctrl.lock().hw_state
    }

    /// Registers of `path`, or `NOSUPPORT` if this instance lacks it.
    pub(crate) fn path_regs(&self, path: PathId) -> Result<&'static PathRegs, ErrorCode> {
        let info: &'static CsidRegInfo = self.info;
        match path.checked()? {
            PathId::Ipp => match info.ipp.as_ref() {
                Some(regs) if self.ipp_present.load(Ordering::Relaxed) => Ok(regs),
                _ => Err(ErrorCode::NOSUPPORT),
            },
            PathId::Rdi(n) if (n as usize) < info.num_rdis => Ok(&info.rdi[n as usize]),
            PathId::Rdi(_) => Err(ErrorCode::NOSUPPORT),
        }
    }

    /// Every path this instance has, with its registers.
    pub(crate) fn present_paths(&self) -> impl Iterator<Item = (PathId, &'static PathRegs)> + '_ + use<'_, 'a> {
        (0..NUM_PATHS)
            .filter_map(PathId::from_index)
            .filter_map(move |p| self.path_regs(p).ok().map(|r| (p, r)))
    }

    pub(crate) fn debug_flags(&self) -> DebugFlags {
        DebugFlags::from_bits_retain(self.debug.load(Ordering::Relaxed))
    }

    pub(crate) fn phy_sel_base(&self) -> PhySelBase {
        PhySelBase {
            phy: self.info.phy_sel_base,
            cphy_tpg: self.info.cphy_tpg_base_id,
        }
    }

    pub(crate) fn modify_reg(&self, offset: usize, f: impl FnOnce(u32) -> u32) {
        let io = self.res.io;
        io.write(offset, f(io.read(offset)));
    }

    pub(crate) fn require_power_up(&self, ctrl: &ControlState) -> Result<(), ErrorCode> {
        if ctrl.hw_state != HwState::PowerUp {
            error!(
                "CSID:{} invalid hw state {:?}",
                self.hw_idx, ctrl.hw_state
            );
            return Err(ErrorCode::STATE);
        }
        Ok(())
    }

    /// Reserve the receiver, a channel id and `port.path` for a client.
    ///
    /// Events for the path are delivered to `client` with `ctx` attached.
    pub fn reserve(
        &self,
        port: &PortConfig,
        client: &'a dyn EventClient,
        ctx: usize,
    ) -> Result<PathId, ErrorCode> {
        let path = port.path.checked()?;
        self.path_regs(path)?;
        let st = &self.path_irq[path.index()];

        let mut ctrl = self.ctrl.lock();
        if st.state() != PathState::Available {
            error!(
                "CSID:{} path {:?} in state {:?}, cannot reserve",
                self.hw_idx,
                path,
                st.state()
            );
            return Err(ErrorCode::STATE);
        }

        if port.num_vc_dt == 0 || port.num_vc_dt > MAX_VC_DT {
            error!("CSID:{} invalid vc/dt count {}", self.hw_idx, port.num_vc_dt);
            return Err(ErrorCode::INVAL);
        }
        if !port.pairs().iter().all(VcDt::is_valid) {
            error!("CSID:{} vc/dt out of range {:?}", self.hw_idx, port.pairs());
            return Err(ErrorCode::INVAL);
        }
        if path.is_ipp() {
            crate::format::ipp_codes(port.in_format).map_err(|e| {
                error!(
                    "CSID:{} ipp does not support {:?}",
                    self.hw_idx, port.in_format
                );
                e
            })?;
        }
        if port.qcfa_bin
            && !self
                .res
                .caps
                .is_feature_supported(IspFeature::Qcfa, Some(self.hw_idx))
        {
            error!("CSID:{} qcfa binning not supported", self.hw_idx);
            return Err(ErrorCode::NOSUPPORT);
        }

        let base = self.phy_sel_base();
        if base.phy_sel(port.input) > RX_CFG0::PHY_NUM_SEL.mask {
            error!("CSID:{} invalid input {:?}", self.hw_idx, port.input);
            return Err(ErrorCode::INVAL);
        }
        let req = RxRequest {
            input: port.input,
            lane_type: port.lane_type,
            lane_num: port.lane_num,
            lane_cfg: port.lane_cfg,
        };
        ctrl.rx.reserve_receiver(&req, &base).map_err(|e| {
            error!("CSID:{} receiver reservation failed: {}", self.hw_idx, e);
            e
        })?;
        let cid = match ctrl.cid.reserve_channel(port.pairs()) {
            Ok(cid) => cid,
            Err(e) => {
                error!("CSID:{} no channel id for {:?}", self.hw_idx, port.pairs());
                ctrl.rx.release_receiver();
                return Err(e);
            }
        };

        ctrl.paths[path.index()] = PathConfig::from_port(port, cid);
        if let Some(cfg) = ctrl.rx.config() {
            let phy = base.phy_index(cfg.req.input, cfg.phy_sel).unwrap_or(NO_PHY);
            self.phy_dump_idx.store(phy, Ordering::Relaxed);
        }
        st.clear_counters();
        st.set_sync_mode(port.sync_mode);
        self.shared.lock_irqsave(self.res.irq_ctl, |s| {
            s.client = Some(client);
            s.client_ctx = ctx;
        });
        st.set_state(PathState::Reserved);

        info!(
            "CSID:{} reserved {:?} cid {} vc {} dt {:#x}",
            self.hw_idx, path, cid, port.vc_dt[0].vc, port.vc_dt[0].dt
        );
        Ok(path)
    }

    /// Give back a reserved or initialized path.
    ///
    /// Releasing an available or streaming path is logged and ignored.
    pub fn release(&self, path: PathId) -> Result<(), ErrorCode> {
        let path = path.checked()?;
        self.path_regs(path)?;
        let st = &self.path_irq[path.index()];

        let mut ctrl = self.ctrl.lock();
        self.shared.lock_irqsave(self.res.irq_ctl, |s| s.client = None);

        match st.state() {
            PathState::Reserved | PathState::InitHw => {}
            state => {
                warn!(
                    "CSID:{} path {:?} released in state {:?}",
                    self.hw_idx, path, state
                );
                return Ok(());
            }
        }

        let cid = ctrl.paths[path.index()].cid;
        ctrl.cid.release_channel(cid);
        ctrl.rx.release_receiver();
        if ctrl.rx.config().is_none() {
            self.phy_dump_idx.store(NO_PHY, Ordering::Relaxed);
        }
        st.clear_counters();
        st.set_state(PathState::Available);
        debug!("CSID:{} released {:?}", self.hw_idx, path);
        Ok(())
    }

    /// Full hardware reset of the block.
    pub fn global_reset(&self) -> Result<(), ErrorCode> {
        let mut ctrl = self.ctrl.lock();
        self.global_reset_locked(&mut ctrl)
    }

    pub(crate) fn global_reset_locked(&self, ctrl: &mut ControlState) -> Result<(), ErrorCode> {
        self.require_power_up(ctrl)?;
        let io = self.res.io;
        let regs = self.info;
        debug!("CSID:{} global reset", self.hw_idx);

        io.write(regs.cmn.top_irq_mask, 0);
        io.write(regs.rx.irq_mask, 0);
        for (_, p) in self.present_paths() {
            io.write(p.irq_mask, 0);
        }

        io.write(regs.cmn.top_irq_clear, regs.top_irq_mask_all);
        io.write(regs.rx.irq_clear, regs.rx_irq_mask_all);
        for (_, p) in self.present_paths() {
            io.write(p.irq_clear, regs.path_irq_mask_all);
        }
        io.write(regs.cmn.irq_cmd, 1);

        let mut cfg1 = RxCfg1::new(0);
        cfg1.modify(RX_CFG1::LANE_RESET::SET);
        io.write(regs.rx.cfg1, cfg1.get());

        io.write(regs.cmn.rst_strobes, regs.rst_stb);
        let polled = io
            .poll_until(
                regs.cmn.top_irq_status,
                TopIrq::RST_DONE.bits(),
                TopIrq::RST_DONE.bits(),
                POLL_SLEEP_US,
                POLL_TIMEOUT_US,
            )
            .map(|_| ());
        if let Err(e) = polled {
            error!("CSID:{} hw reset failed: {}", self.hw_idx, e);
        }

        self.top_done.reinit();
        self.rx_done.reinit();
        io.write(regs.cmn.rst_strobes, regs.reg_rst_stb);
        let waited = self
            .top_done
            .wait_timeout(self.res.delay, COMPLETION_TIMEOUT_MS);
        if let Err(e) = waited {
            error!("CSID:{} soft register reset failed: {}", self.hw_idx, e);
        }

        let mask = io.read(regs.rx.irq_mask);
        if mask != 0 {
            error!("CSID:{} rx irq mask {:#x} after reset", self.hw_idx, mask);
        }

        self.shared.lock_irqsave(self.res.irq_ctl, |s| {
            s.error_irq_count = 0;
            s.fatal_err_detected = false;
        });
        ctrl.anchor.clear();
        for st in self.path_irq.iter() {
            st.set_sof_cnt(0);
        }
        polled.and(waited)
    }

    /// Reset the core logic while keeping the programmed configuration.
    pub fn reset_retain_sw_reg(&self) -> Result<(), ErrorCode> {
        let ctrl = self.ctrl.lock();
        self.reset_retain_sw_reg_locked(&ctrl)
    }

    pub(crate) fn reset_retain_sw_reg_locked(&self, ctrl: &ControlState) -> Result<(), ErrorCode> {
        self.require_power_up(ctrl)?;
        let io = self.res.io;
        let cmn = &self.info.cmn;

        io.write(cmn.top_irq_mask, 0);
        io.write(cmn.top_irq_clear, TopIrq::RST_DONE.bits());
        io.write(cmn.irq_cmd, 1);
        io.write(cmn.rst_strobes, self.info.rst_stb);
        let ret = io
            .poll_until(
                cmn.top_irq_status,
                TopIrq::RST_DONE.bits(),
                TopIrq::RST_DONE.bits(),
                POLL_SLEEP_US,
                POLL_TIMEOUT_US,
            )
            .map(|_| ());
        if let Err(e) = ret {
            error!("CSID:{} reset retaining registers failed: {}", self.hw_idx, e);
        }
        io.write(cmn.top_irq_clear, TopIrq::RST_DONE.bits());
        io.write(cmn.irq_cmd, 1);
        ret
    }

    /// Reset one output path and wait for its reset-done interrupt.
    pub fn path_reset(&self, path: PathId) -> Result<(), ErrorCode> {
        let regs = self.path_regs(path)?;
        let ctrl = self.ctrl.lock();
        self.require_power_up(&ctrl)?;

        self.modify_reg(regs.irq_mask, |v| v | PathIrq::RST_DONE.bits());
        let done = &self.path_done[path.index()];
        done.reinit();
        self.res
            .io
            .write(regs.rst_strobes, self.info.path_rst_stb_all);
        done.wait_timeout(self.res.delay, COMPLETION_TIMEOUT_MS)
            .map_err(|e| {
                error!("CSID:{} {:?} reset timed out", self.hw_idx, path);
                e
            })
    }

    pub fn enable_hw(&self) -> Result<(), ErrorCode> {
        let mut ctrl = self.ctrl.lock();
        self.enable_hw_locked(&mut ctrl)
    }

    pub(crate) fn enable_hw_locked(&self, ctrl: &mut ControlState) -> Result<(), ErrorCode> {
        if ctrl.open_count == u32::MAX {
            error!("CSID:{} open count overflow", self.hw_idx);
            return Err(ErrorCode::NOMEM);
        }
        ctrl.open_count += 1;
        if ctrl.open_count > 1 {
            debug!("CSID:{} already enabled, count {}", self.hw_idx, ctrl.open_count);
            return Ok(());
        }

        if let Err(e) = self.res.soc.enable(ctrl.clk_rate) {
            error!("CSID:{} soc enable failed: {}", self.hw_idx, e);
            ctrl.open_count -= 1;
            return Err(e);
        }
        ctrl.applied_clk_rate = ctrl.clk_rate;
        ctrl.hw_state = HwState::PowerUp;

        let io = self.res.io;
        io.write(self.info.cmn.top_irq_mask, 0);

        let ret = self.global_reset_locked(ctrl).and_then(|()| {
            self.clear_all_irqs();
            ctrl.hw_version = io.read(self.info.cmn.hw_version);
            self.enable_csi2(ctrl)
        });
        if let Err(e) = ret {
            error!("CSID:{} enable failed: {}", self.hw_idx, e);
            if let Err(e) = self.res.soc.disable() {
                error!("CSID:{} soc disable failed: {}", self.hw_idx, e);
            }
            ctrl.hw_state = HwState::PowerDown;
            ctrl.open_count -= 1;
            return Err(e);
        }

        self.shared.lock_irqsave(self.res.irq_ctl, |s| {
            s.fatal_err_detected = false;
            s.device_enabled = true;
        });
        for st in self.path_irq.iter() {
            st.set_sof_cnt(0);
        }
        info!(
            "CSID:{} enabled, hw version {:#x}",
            self.hw_idx, ctrl.hw_version
        );
        Ok(())
    }

    pub fn disable_hw(&self) -> Result<(), ErrorCode> {
        let mut ctrl = self.ctrl.lock();
        self.disable_hw_locked(&mut ctrl)
    }

    pub(crate) fn disable_hw_locked(&self, ctrl: &mut ControlState) -> Result<(), ErrorCode> {
        if ctrl.open_count == 0 {
            warn!("CSID:{} unbalanced disable", self.hw_idx);
            return Err(ErrorCode::INVAL);
        }
        ctrl.open_count -= 1;
        if ctrl.open_count > 0 {
            debug!("CSID:{} still in use, count {}", self.hw_idx, ctrl.open_count);
            return Ok(());
        }

        if let Err(e) = self.disable_csi2(ctrl) {
            error!("CSID:{} csi2 disable failed: {}", self.hw_idx, e);
        }
        if let Err(e) = self.global_reset_locked(ctrl) {
            error!("CSID:{} reset on disable failed: {}", self.hw_idx, e);
        }
        self.res.io.write(self.info.cmn.top_irq_mask, 0);

        let ret = self.res.soc.disable();
        if let Err(e) = ret {
            error!("CSID:{} soc disable failed: {}", self.hw_idx, e);
        }

        self.shared.lock_irqsave(self.res.irq_ctl, |s| {
            s.device_enabled = false;
            s.error_irq_count = 0;
        });
        ctrl.hw_state = HwState::PowerDown;
        ctrl.anchor.clear();
        info!("CSID:{} disabled", self.hw_idx);
        ret
    }

    /// Clear every interrupt group.
    fn clear_all_irqs(&self) {
        let io = self.res.io;
        let regs = self.info;
        io.write(regs.cmn.top_irq_clear, regs.top_irq_mask_all);
        io.write(regs.rx.irq_clear, regs.rx_irq_mask_all);
        for (_, p) in self.present_paths() {
            io.write(p.irq_clear, regs.path_irq_mask_all);
        }
        io.write(regs.cmn.irq_cmd, 1);
    }

    fn ppi_for(&self, cfg: &Csi2RxConfig) -> Option<&'a dyn PpiBridge> {
        let idx = self.phy_sel_base().phy_index(cfg.req.input, cfg.phy_sel)?;
        self.res.ppi.get(idx as usize).copied().flatten()
    }

    /// Program and enable the CSI-2 receiver from the reserved configuration.
    fn enable_csi2(&self, ctrl: &ControlState) -> Result<(), ErrorCode> {
        let io = self.res.io;
        let rx = &self.info.rx;
        let cfg = ctrl.rx.config().copied().unwrap_or_default();
        let req = cfg.req;

        let mut cfg0 = RxCfg0::new(0);
        cfg0.modify(
            RX_CFG0::NUM_ACTIVE_LANES.val(req.lane_num.saturating_sub(1))
                + RX_CFG0::LANE_CFG.val(req.lane_cfg)
                + RX_CFG0::PHY_NUM_SEL.val(cfg.phy_sel)
                + RX_CFG0::PHY_TYPE_SEL.val(req.lane_type as u32),
        );
        io.write(rx.cfg0, cfg0.get());

        if let InputResource::CphyTpg(n) = req.input {
            if self.info.need_to_sel_tpg_mux {
                self.res.soc.select_tpg_mux(u32::from(n));
            }
        }

        let mut cfg1 = RxCfg1::new(0);
        cfg1.modify(RX_CFG1::MISR_EN::SET + RX_CFG1::ECC_CORRECTION_EN::SET);
        io.write(rx.cfg1, cfg1.get());

        let debug = self.debug_flags();
        let mut mask = RxIrq::BASE_MASK;
        if debug.contains(DebugFlags::SOT_IRQ) {
            mask |= RxIrq::SOT_CAPTURED;
        }
        if debug.contains(DebugFlags::EOT_IRQ) {
            mask |= RxIrq::EOT_CAPTURED;
        }
        if debug.contains(DebugFlags::SHORT_PKT_CAPTURE) {
            mask |= RxIrq::SHORT_PKT_CAPTURED;
        }
        if debug.contains(DebugFlags::LONG_PKT_CAPTURE) {
            mask |= RxIrq::LONG_PKT_CAPTURED;
        }
        if debug.contains(DebugFlags::CPHY_PKT_CAPTURE) {
            mask |= RxIrq::CPHY_PKT_HDR_CAPTURED;
        }
        io.write(rx.irq_mask, mask.bits());

        if let Some(ppi) = self.ppi_for(&cfg) {
            ppi.init(&PpiLaneConfig {
                lane_type: req.lane_type,
                lane_num: req.lane_num,
                lane_cfg: req.lane_cfg,
            })?;
        }
        debug!(
            "CSID:{} csi2 rx cfg0 {:#x} mask {:#x}",
            self.hw_idx,
            cfg0.get(),
            mask.bits()
        );
        Ok(())
    }

    fn disable_csi2(&self, ctrl: &ControlState) -> Result<(), ErrorCode> {
        let io = self.res.io;
        let rx = &self.info.rx;
        io.write(rx.irq_mask, 0);
        io.write(rx.cfg0, 0);
        io.write(rx.cfg1, 0);
        match ctrl.rx.config().and_then(|cfg| self.ppi_for(cfg)) {
            Some(ppi) => ppi.deinit(),
            None => Ok(()),
        }
    }

    /// Power up and program `path`, which must be reserved.
    pub fn init_hw(&self, path: PathId) -> Result<(), ErrorCode> {
        self.path_regs(path)?;
        let st = &self.path_irq[path.index()];
        let mut ctrl = self.ctrl.lock();
        if st.state() != PathState::Reserved {
            error!(
                "CSID:{} init_hw on {:?} in state {:?}",
                self.hw_idx,
                path,
                st.state()
            );
            return Err(ErrorCode::STATE);
        }

        self.enable_hw_locked(&mut ctrl)?;
        let ret = self
            .init_path_locked(&ctrl, path)
            .and_then(|()| self.reset_retain_sw_reg_locked(&ctrl));
        if let Err(e) = ret {
            error!("CSID:{} init_hw {:?} failed: {}", self.hw_idx, path, e);
            if st.state() == PathState::InitHw {
                if let Err(e) = self.deinit_path_locked(&ctrl, path) {
                    error!("CSID:{} deinit after failure: {}", self.hw_idx, e);
                }
            }
            if let Err(e) = self.disable_hw_locked(&mut ctrl) {
                error!("CSID:{} power down after failure: {}", self.hw_idx, e);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Undo [`TfeCsid::init_hw`]. A path already back in `Reserved` is left
    /// alone.
    pub fn deinit_hw(&self, path: PathId) -> Result<(), ErrorCode> {
        self.path_regs(path)?;
        let st = &self.path_irq[path.index()];
        let mut ctrl = self.ctrl.lock();
        match st.state() {
            PathState::Reserved => {
                debug!("CSID:{} {:?} already deinitialized", self.hw_idx, path);
                return Ok(());
            }
            PathState::InitHw => {}
            state => {
                error!(
                    "CSID:{} deinit_hw on {:?} in state {:?}",
                    self.hw_idx, path, state
                );
                return Err(ErrorCode::STATE);
            }
        }
        self.deinit_path_locked(&ctrl, path)?;
        self.disable_hw_locked(&mut ctrl)
    }

    /// Read the SOF timestamp of `path` and map it into the boot clock.
    pub fn get_timestamp(&self, path: PathId, want_prev: bool) -> Result<Timestamps, ErrorCode> {
        let regs = self.path_regs(path)?;
        let mut ctrl = self.ctrl.lock();
        self.require_power_up(&ctrl)?;
        let io = self.res.io;

        let (curr, mut torn) =
            timestamp::read_split(io, regs.timestamp_curr1_sof, regs.timestamp_curr0_sof);
        let hw_time_ns = timestamp::qtimer_to_ns(curr);

        let prev_hw_time_ns = if want_prev {
            let (prev, prev_torn) =
                timestamp::read_split(io, regs.timestamp_prev1_sof, regs.timestamp_prev0_sof);
            torn |= prev_torn;
            Some(timestamp::qtimer_to_ns(prev))
        } else {
            None
        };

        let boot_clock = self.res.boot_clock;
        let boot_time_ns = ctrl
            .anchor
            .convert(hw_time_ns, || boot_clock.boot_time_ns())
            .map_err(|e| {
                error!("CSID:{} boot timestamp overflow", self.hw_idx);
                e
            })?;
        if torn {
            debug!("CSID:{} {:?} timestamp read was torn", self.hw_idx, path);
        }

        if self.debug_flags().contains(DebugFlags::HBI_VBI_INFO) {
            self.print_hbi_vbi(path, regs);
        }

        Ok(Timestamps {
            hw_time_ns,
            prev_hw_time_ns,
            boot_time_ns,
            torn,
        })
    }

    fn print_hbi_vbi(&self, path: PathId, regs: &PathRegs) {
        let io = self.res.io;
        let hbi = io.read(regs.format_measure1);
        let vbi = io.read(regs.format_measure2);
        info!(
            "CSID:{} {:?} hbi {:#x} vbi {:#x}",
            self.hw_idx, path, hbi, vbi
        );
    }

    /// Replace the debug flag set. Takes effect at the next enable or start.
    pub fn set_debug_mask(&self, flags: DebugFlags) {
        self.debug.store(flags.bits(), Ordering::Relaxed);
        debug!("CSID:{} debug mask {:#x}", self.hw_idx, flags.bits());
    }

    /// Turn SOF interrupt logging on or off on every active path.
    pub fn enable_sof_irq_debug(&self, enable: bool) {
        let ctrl = self.ctrl.lock();
        if ctrl.hw_state == HwState::PowerDown {
            warn!(
                "CSID:{} powered down, cannot {} sof irq",
                self.hw_idx,
                if enable { "enable" } else { "disable" }
            );
            return;
        }
        self.set_sof_irq_debug(enable);
        info!(
            "CSID:{} SOF irq {}",
            self.hw_idx,
            if enable { "enabled" } else { "disabled" }
        );
    }

    /// SOF debug toggle usable from interrupt context.
    ///
    /// Paths whose mask is zero are not streaming and are left alone. When
    /// disabling, a path with a pending frame drop keeps SOF unmasked so
    /// the drop can complete.
    pub(crate) fn set_sof_irq_debug(&self, enable: bool) {
        let sof = PathIrq::INPUT_SOF.bits();
        for (path, regs) in self.present_paths() {
            let mask = self.res.io.read(regs.irq_mask);
            if mask == 0 {
                continue;
            }
            let mask = if enable {
                mask | sof
            } else if self.path_irq[path.index()].frame_drop_pending() {
                debug!(
                    "CSID:{} {:?} keeps sof for pending frame drop",
                    self.hw_idx, path
                );
                mask
            } else {
                mask & !sof
            };
            self.res.io.write(regs.irq_mask, mask);
        }

        let flags = if enable {
            self.debug_flags() | DebugFlags::SOF_IRQ
        } else {
            self.debug_flags() - DebugFlags::SOF_IRQ
        };
        self.debug.store(flags.bits(), Ordering::Relaxed);
        self.sof_irq_triggered.store(enable, Ordering::Relaxed);
    }

    /// Store the clock rate used at the next power up.
    pub fn update_clock_rate(&self, rate: u64) {
        self.ctrl.lock().clk_rate = rate;
        debug!("CSID:{} clock rate {}", self.hw_idx, rate);
    }

    /// Raise the running clock to `rate` if it is currently lower.
    /// Returns the rate the clock runs at afterwards.
    pub fn update_clock_dynamically(&self, rate: u64) -> Result<u64, ErrorCode> {
        let mut ctrl = self.ctrl.lock();
        debug!(
            "CSID:{} clock requested {} current {}",
            self.hw_idx, rate, ctrl.applied_clk_rate
        );
        if rate > ctrl.applied_clk_rate {
            self.res.soc.set_clock_rate(rate).map_err(|e| {
                error!("CSID:{} cannot set clock to {}", self.hw_idx, rate);
                e
            })?;
            ctrl.applied_clk_rate = rate;
        }
        Ok(ctrl.applied_clk_rate)
    }

    pub fn dump_clock(&self) {
        info!("CSID:{} clock rate {}", self.hw_idx, self.ctrl.lock().clk_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::HaltCommand;
    use crate::registers::CSID530;
    use crate::test_support::{ipp_port, rdi_port, Fixture};

    #[test]
    fn probe_reports_all_paths() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let caps = csid.get_capabilities();
        assert_eq!(caps.num_rdis, 3);
        assert_eq!(caps.num_pix, 1);
        assert_eq!(caps.version, CSID530.version);
        for idx in 0..NUM_PATHS {
            let path = PathId::from_index(idx).unwrap();
            assert_eq!(csid.path_state(path), Ok(PathState::Available));
        }
        assert_eq!(csid.hw_state(), HwState::PowerDown);
    }

    #[test]
    fn pixel_fuse_hides_ipp() {
        let fuse = CSID530.fuse.unwrap();
        let fx = Fixture::build(fuse.hw_idx, |fx| fx.set_fuse(fuse.pix_pipe_fuse, 1));
        let csid = fx.csid;
        csid.probe_init().unwrap();
        assert_eq!(csid.get_capabilities().num_pix, 0);
        assert_eq!(csid.path_state(PathId::Ipp), Ok(PathState::Unavailable));
        assert_eq!(
            csid.reserve(&ipp_port(0, 0x2b), fx.client, 0),
            Err(ErrorCode::NOSUPPORT)
        );
    }

    #[test]
    fn tfe_fuse_fails_probe() {
        let fuse = CSID530.fuse.unwrap();
        let fx = Fixture::build(fuse.hw_idx, |fx| fx.set_fuse(fuse.tfe_fuse, 1));
        assert_eq!(fx.csid.probe_init(), Err(ErrorCode::NOSUPPORT));
    }

    #[test]
    fn rdis_share_channel_for_same_vc_dt() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let rdi0 = csid.reserve(&rdi_port(0, 1, 0x2b), fx.client, 7).unwrap();
        let rdi1 = csid.reserve(&rdi_port(1, 1, 0x2b), fx.client, 7).unwrap();

        let cid = csid.path_config(rdi0).unwrap().cid;
        assert_eq!(csid.path_config(rdi1).unwrap().cid, cid);
        assert_eq!(csid.ctrl.lock().cid.refcount(cid), 2);
        assert_eq!(csid.ctrl.lock().rx.reserve_count(), 2);

        csid.release(rdi0).unwrap();
        assert_eq!(csid.ctrl.lock().cid.refcount(cid), 1);
        assert_eq!(csid.path_state(rdi0), Ok(PathState::Available));
        assert_eq!(csid.path_state(rdi1), Ok(PathState::Reserved));

        let other = csid.reserve(&rdi_port(2, 2, 0x2c), fx.client, 7).unwrap();
        assert_ne!(csid.path_config(other).unwrap().cid, cid);
    }

    #[test]
    fn reserve_rejects_bad_requests() {
        let fx = Fixture::new();
        let csid = fx.csid;

        let mut port = rdi_port(0, 0, 0x2b);
        port.num_vc_dt = 0;
        assert_eq!(csid.reserve(&port, fx.client, 0), Err(ErrorCode::INVAL));

        let port = rdi_port(0, VcDt::MAX_VC + 1, 0x2b);
        assert_eq!(csid.reserve(&port, fx.client, 0), Err(ErrorCode::INVAL));

        let mut port = ipp_port(0, 0x2b);
        port.in_format = crate::format::PixelFormat::Raw16;
        assert_eq!(csid.reserve(&port, fx.client, 0), Err(ErrorCode::NOSUPPORT));

        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        assert_eq!(
            csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0),
            Err(ErrorCode::STATE)
        );

        // A second receiver configuration cannot be mixed in.
        let mut port = rdi_port(1, 0, 0x2b);
        port.lane_num = 2;
        assert_eq!(csid.reserve(&port, fx.client, 0), Err(ErrorCode::INVAL));
        assert_eq!(csid.ctrl.lock().rx.reserve_count(), 1);
        csid.release(path).unwrap();
    }

    #[test]
    fn qcfa_without_platform_support_touches_nothing() {
        let fx = Fixture::new();
        let csid = fx.csid;
        fx.hw.clear_writes();

        let mut port = ipp_port(0, 0x2b);
        port.qcfa_bin = true;
        assert_eq!(csid.reserve(&port, fx.client, 0), Err(ErrorCode::NOSUPPORT));
        assert_eq!(fx.hw.write_count(), 0);
        assert_eq!(csid.path_state(PathId::Ipp), Ok(PathState::Available));
        assert_eq!(csid.ctrl.lock().rx.reserve_count(), 0);

        fx.caps.qcfa.set(true);
        assert_eq!(csid.reserve(&port, fx.client, 0), Ok(PathId::Ipp));
    }

    #[test]
    fn power_is_reference_counted() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let rdi0 = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        let rdi1 = csid.reserve(&rdi_port(1, 0, 0x2c), fx.client, 0).unwrap();

        csid.init_hw(rdi0).unwrap();
        csid.init_hw(rdi1).unwrap();
        assert_eq!(csid.hw_state(), HwState::PowerUp);
        assert_eq!(fx.soc.enabled_at.borrow().len(), 1);
        assert_eq!(fx.ppi.inits.borrow().len(), 1);
        assert_eq!(fx.ppi.inits.borrow()[0].lane_num, 4);

        csid.deinit_hw(rdi0).unwrap();
        assert_eq!(csid.hw_state(), HwState::PowerUp);
        csid.deinit_hw(rdi1).unwrap();
        assert_eq!(csid.hw_state(), HwState::PowerDown);
        assert_eq!(fx.soc.disables.get(), 1);
        assert_eq!(fx.ppi.deinits.get(), 1);
        assert_eq!(csid.path_state(rdi1), Ok(PathState::Reserved));
    }

    #[test]
    fn receiver_programmed_from_reservation() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();

        let cfg0 = RxCfg0::new(fx.hw.reg(CSID530.rx.cfg0));
        assert_eq!(cfg0.read(RX_CFG0::NUM_ACTIVE_LANES), 3);
        assert_eq!(cfg0.read(RX_CFG0::LANE_CFG), 0x3210);
        assert_eq!(cfg0.read(RX_CFG0::PHY_NUM_SEL), CSID530.phy_sel_base);
        assert_eq!(csid.phy_dump_idx.load(Ordering::Relaxed), 0);
        assert_eq!(
            fx.hw.reg(CSID530.rx.irq_mask) & RxIrq::BASE_MASK.bits(),
            RxIrq::BASE_MASK.bits()
        );
    }

    #[test]
    fn failed_power_up_rolls_back() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        fx.soc.fail_enable.set(true);
        assert_eq!(csid.init_hw(path), Err(ErrorCode::FATAL));
        assert_eq!(csid.hw_state(), HwState::PowerDown);
        assert_eq!(csid.path_state(path), Ok(PathState::Reserved));

        fx.soc.fail_enable.set(false);
        csid.init_hw(path).unwrap();
        assert_eq!(csid.path_state(path), Ok(PathState::InitHw));
    }

    #[test]
    fn saturated_open_count_is_exhaustion() {
        let fx = Fixture::new();
        let csid = fx.csid;
        csid.ctrl.lock().open_count = u32::MAX;
        assert_eq!(csid.enable_hw(), Err(ErrorCode::NOMEM));
        assert_eq!(csid.ctrl.lock().open_count, u32::MAX);
        assert_eq!(csid.hw_state(), HwState::PowerDown);
        assert!(fx.soc.enabled_at.borrow().is_empty());
    }

    #[test]
    fn global_reset_reports_timeout() {
        let fx = Fixture::new();
        let csid = fx.csid;
        assert_eq!(csid.global_reset(), Err(ErrorCode::STATE));

        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();
        assert_eq!(csid.global_reset(), Ok(()));

        fx.hw.hang_reset.set(true);
        assert_eq!(csid.global_reset(), Err(ErrorCode::TIMEOUT));
    }

    #[test]
    fn path_reset_waits_for_done() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let path = csid.reserve(&rdi_port(1, 0, 0x2b), fx.client, 0).unwrap();
        assert_eq!(csid.path_reset(path), Err(ErrorCode::STATE));
        csid.init_hw(path).unwrap();
        assert_eq!(csid.path_reset(path), Ok(()));
        assert_eq!(
            fx.hw.writes_to(CSID530.rdi[1].rst_strobes),
            [CSID530.path_rst_stb_all]
        );
    }

    #[test]
    fn boot_time_advances_by_tick_delta() {
        let fx = Fixture::new();
        let csid = fx.csid;
        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        assert_eq!(csid.get_timestamp(path, false), Err(ErrorCode::STATE));
        csid.init_hw(path).unwrap();

        let regs = &CSID530.rdi[0];
        let set_ticks = |t: u64| {
            fx.hw.set_reg(regs.timestamp_curr1_sof, (t >> 32) as u32);
            fx.hw.set_reg(regs.timestamp_curr0_sof, t as u32);
        };
        let t1: u64 = 192 * 5_000_000_000;
        let t2: u64 = t1 + 192 * 3_333;
        fx.clock.now_ns.set(42_000_000);

        set_ticks(t1);
        let first = csid.get_timestamp(path, false).unwrap();
        assert_eq!(first.boot_time_ns, 42_000_000);
        assert_eq!(first.hw_time_ns, timestamp::qtimer_to_ns(t1));
        assert!(!first.torn);
        assert_eq!(first.prev_hw_time_ns, None);

        fx.clock.now_ns.set(99_000_000_000);
        set_ticks(t2);
        let second = csid.get_timestamp(path, true).unwrap();
        assert_eq!(
            second.boot_time_ns - first.boot_time_ns,
            timestamp::qtimer_to_ns(t2 - t1)
        );
        assert_eq!(second.prev_hw_time_ns, Some(0));
    }

    #[test]
    fn clock_only_raised_dynamically() {
        let fx = Fixture::new();
        let csid = fx.csid;
        csid.update_clock_rate(300_000_000);
        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();
        assert_eq!(fx.soc.enabled_at.borrow()[0], 300_000_000);

        assert_eq!(csid.update_clock_dynamically(200_000_000), Ok(300_000_000));
        assert_eq!(csid.update_clock_dynamically(480_000_000), Ok(480_000_000));
        assert_eq!(fx.soc.rate.get(), 480_000_000);
    }

    #[test]
    fn release_in_wrong_state_is_ignored() {
        let fx = Fixture::new();
        let csid = fx.csid;
        assert_eq!(csid.release(PathId::Rdi(0)), Ok(()));
        assert_eq!(csid.release(PathId::Rdi(3)), Err(ErrorCode::INVAL));

        let path = csid.reserve(&rdi_port(0, 0, 0x2b), fx.client, 0).unwrap();
        csid.init_hw(path).unwrap();
        csid.start_path(path).unwrap();
        assert_eq!(csid.release(path), Ok(()));
        assert_eq!(csid.path_state(path), Ok(PathState::Streaming));
        csid.stop_paths(&[path], HaltCommand::AtFrameBoundary).unwrap();
    }
}
