// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Fakes of the platform services for unit tests.
//!
//! `FakeHw` models the register window as a sparse map. Writes to an
//! interrupt clear register clear the matching status bits; reset strobes
//! raise the reset-done status and leave an interrupt pending, which is
//! delivered to the attached CSID the next time anything sleeps.

extern crate std;

use core::cell::{Cell, RefCell};
use std::boxed::Box;
use std::collections::BTreeMap;
use std::vec::Vec;

use kernel::deferred_call::Tasklet;
use kernel::hil::interrupt::NO_INTERRUPT_CONTROL;
use kernel::hil::isp::{CapabilityQuery, EventClient, HwEventInfo, HwEventKind, IspFeature};
use kernel::hil::mmio::RegisterIo;
use kernel::hil::phy::{LaneType, PhyNotifier, PpiBridge, PpiLaneConfig};
use kernel::hil::soc::SocResources;
use kernel::hil::time::{BootClock, Delay};
use kernel::ErrorCode;

use crate::cid::InputResource;
use crate::config::MAX_PPI;
use crate::csid::{CsidResources, TfeCsid};
use crate::irq_status::{IrqGroup, PathIrq, RxIrq, TopIrq};
use crate::path::{PathId, PortConfig, VcDt};
use crate::registers::{CsidRegInfo, CSID530};

pub(crate) fn leak<T>(v: T) -> &'static T {
    Box::leak(Box::new(v))
}

pub(crate) struct FakeHw {
    info: &'static CsidRegInfo,
    regs: RefCell<BTreeMap<usize, u32>>,
    writes: RefCell<Vec<(usize, u32)>>,
    irq_pending: Cell<bool>,
    csid: Cell<Option<&'static TfeCsid<'static>>>,
    /// Top level reset strobes never complete.
    pub(crate) hang_reset: Cell<bool>,
    pub(crate) slept_us: Cell<u64>,
}

impl FakeHw {
    fn new(info: &'static CsidRegInfo) -> Self {
        Self {
            info,
            regs: RefCell::new(BTreeMap::new()),
            writes: RefCell::new(Vec::new()),
            irq_pending: Cell::new(false),
            csid: Cell::new(None),
            hang_reset: Cell::new(false),
            slept_us: Cell::new(0),
        }
    }

    fn paths(&self) -> impl Iterator<Item = &'static crate::registers::PathRegs> {
        let info = self.info;
        info.ipp.iter().chain(info.rdi[..info.num_rdis].iter())
    }

    /// Status register cleared through `clear`, if it is a clear register.
    fn status_for_clear(&self, clear: usize) -> Option<usize> {
        let info = self.info;
        if clear == info.cmn.top_irq_clear {
            return Some(info.cmn.top_irq_status);
        }
        if clear == info.rx.irq_clear {
            return Some(info.rx.irq_status);
        }
        self.paths()
            .find(|p| p.irq_clear == clear)
            .map(|p| p.irq_status)
    }

    fn default_value(&self, offset: usize) -> u32 {
        // Paths read as halted unless a test says otherwise.
        if self.paths().any(|p| p.status == offset) {
            1
        } else {
            0
        }
    }

    pub(crate) fn reg(&self, offset: usize) -> u32 {
        self.regs
            .borrow()
            .get(&offset)
            .copied()
            .unwrap_or_else(|| self.default_value(offset))
    }

    pub(crate) fn set_reg(&self, offset: usize, value: u32) {
        self.regs.borrow_mut().insert(offset, value);
    }

    fn set_bits(&self, offset: usize, bits: u32) {
        let v = self.reg(offset);
        self.set_reg(offset, v | bits);
    }

    /// Every value written to `offset`, oldest first.
    pub(crate) fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.writes
            .borrow()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.writes.borrow().len()
    }

    pub(crate) fn clear_writes(&self) {
        self.writes.borrow_mut().clear();
    }

    /// Raise status bits without delivering the interrupt.
    pub(crate) fn raise(&self, group: IrqGroup, bits: u32) {
        let info = self.info;
        let offset = match group {
            IrqGroup::Top => info.cmn.top_irq_status,
            IrqGroup::Rx => info.rx.irq_status,
            IrqGroup::Ipp => info.ipp.map_or(usize::MAX, |p| p.irq_status),
            IrqGroup::Rdi0 => info.rdi[0].irq_status,
            IrqGroup::Rdi1 => info.rdi[1].irq_status,
            IrqGroup::Rdi2 => info.rdi[2].irq_status,
        };
        self.set_bits(offset, bits);
    }

    fn attach(&self, csid: &'static TfeCsid<'static>) {
        self.csid.set(Some(csid));
    }
}

impl RegisterIo for FakeHw {
    fn read(&self, offset: usize) -> u32 {
        self.reg(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        self.writes.borrow_mut().push((offset, value));
        let info = self.info;

        if let Some(status) = self.status_for_clear(offset) {
            let v = self.reg(status);
            self.set_reg(status, v & !value);
            return;
        }
        self.set_reg(offset, value);

        if offset == info.cmn.rst_strobes && !self.hang_reset.get() {
            self.set_bits(info.cmn.top_irq_status, TopIrq::RST_DONE.bits());
            self.set_bits(info.rx.irq_status, RxIrq::RST_DONE.bits());
            self.irq_pending.set(true);
        }
        if let Some(p) = self.paths().find(|p| p.rst_strobes == offset) {
            self.set_bits(p.irq_status, PathIrq::RST_DONE.bits());
            self.irq_pending.set(true);
        }
    }

    fn poll_until(
        &self,
        offset: usize,
        mask: u32,
        expected: u32,
        sleep_us: u32,
        timeout_us: u32,
    ) -> Result<u32, ErrorCode> {
        let mut waited = 0;
        loop {
            let v = self.read(offset);
            if v & mask == expected {
                return Ok(v);
            }
            if waited >= timeout_us {
                return Err(ErrorCode::TIMEOUT);
            }
            self.sleep_us(sleep_us);
            waited += sleep_us;
        }
    }
}

impl Delay for FakeHw {
    fn sleep_us(&self, us: u32) {
        self.slept_us.set(self.slept_us.get() + u64::from(us));
        if self.irq_pending.replace(false) {
            if let Some(csid) = self.csid.get() {
                csid.handle_interrupt();
            }
        }
    }
}

pub(crate) struct FakeFuse {
    regs: RefCell<BTreeMap<usize, u32>>,
}

impl RegisterIo for FakeFuse {
    fn read(&self, offset: usize) -> u32 {
        self.regs.borrow().get(&offset).copied().unwrap_or(0)
    }

    fn write(&self, offset: usize, value: u32) {
        self.regs.borrow_mut().insert(offset, value);
    }

    fn poll_until(
        &self,
        offset: usize,
        mask: u32,
        expected: u32,
        _sleep_us: u32,
        _timeout_us: u32,
    ) -> Result<u32, ErrorCode> {
        let v = self.read(offset);
        if v & mask == expected {
            Ok(v)
        } else {
            Err(ErrorCode::TIMEOUT)
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeSoc {
    pub(crate) enabled_at: RefCell<Vec<u64>>,
    pub(crate) disables: Cell<u32>,
    pub(crate) rate: Cell<u64>,
    pub(crate) tpg_mux: Cell<Option<u32>>,
    pub(crate) fail_enable: Cell<bool>,
}

impl SocResources for FakeSoc {
    fn enable(&self, clock_rate: u64) -> Result<(), ErrorCode> {
        if self.fail_enable.get() {
            return Err(ErrorCode::FATAL);
        }
        self.enabled_at.borrow_mut().push(clock_rate);
        self.rate.set(clock_rate);
        Ok(())
    }

    fn disable(&self) -> Result<(), ErrorCode> {
        self.disables.set(self.disables.get() + 1);
        Ok(())
    }

    fn set_clock_rate(&self, rate: u64) -> Result<(), ErrorCode> {
        self.rate.set(rate);
        Ok(())
    }

    fn select_tpg_mux(&self, tpg: u32) {
        self.tpg_mux.set(Some(tpg));
    }
}

#[derive(Default)]
pub(crate) struct FakeClient {
    pub(crate) events: RefCell<Vec<(HwEventKind, HwEventInfo)>>,
}

impl EventClient for FakeClient {
    fn event(&self, kind: HwEventKind, info: &HwEventInfo) -> Result<(), ErrorCode> {
        self.events.borrow_mut().push((kind, *info));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeCaps {
    pub(crate) qcfa: Cell<bool>,
}

impl CapabilityQuery for FakeCaps {
    fn is_feature_supported(&self, feature: IspFeature, _hw_idx: Option<u32>) -> bool {
        match feature {
            IspFeature::Qcfa => self.qcfa.get(),
            IspFeature::DynamicSwitch => false,
        }
    }
}

#[derive(Default)]
pub(crate) struct FakePhy {
    pub(crate) dumps: RefCell<Vec<u32>>,
}

impl PhyNotifier for FakePhy {
    fn notify_register_dump(&self, phy_index: u32) {
        self.dumps.borrow_mut().push(phy_index);
    }
}

#[derive(Default)]
pub(crate) struct FakePpi {
    pub(crate) inits: RefCell<Vec<PpiLaneConfig>>,
    pub(crate) deinits: Cell<u32>,
}

impl PpiBridge for FakePpi {
    fn init(&self, cfg: &PpiLaneConfig) -> Result<(), ErrorCode> {
        self.inits.borrow_mut().push(*cfg);
        Ok(())
    }

    fn deinit(&self) -> Result<(), ErrorCode> {
        self.deinits.set(self.deinits.get() + 1);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeClock {
    pub(crate) now_ns: Cell<u64>,
}

impl BootClock for FakeClock {
    fn boot_time_ns(&self) -> u64 {
        self.now_ns.get()
    }
}

pub(crate) const TASKLET_SLOTS: usize = 4;

/// A probed CSID instance on fake hardware.
pub(crate) struct Fixture {
    pub(crate) hw: &'static FakeHw,
    pub(crate) fuse: &'static FakeFuse,
    pub(crate) soc: &'static FakeSoc,
    pub(crate) client: &'static FakeClient,
    pub(crate) caps: &'static FakeCaps,
    pub(crate) phy: &'static FakePhy,
    /// Bridge for physical PHY 0.
    pub(crate) ppi: &'static FakePpi,
    pub(crate) clock: &'static FakeClock,
    pub(crate) tasklet: &'static Tasklet<'static, TASKLET_SLOTS>,
    pub(crate) csid: &'static TfeCsid<'static>,
}

impl Fixture {
    /// Instance 0, probed.
    pub(crate) fn new() -> Fixture {
        let fx = Self::build(0, |_| {});
        fx.csid.probe_init().unwrap();
        fx
    }

    /// Build instance `hw_idx` without probing it. `setup` runs first and
    /// may program the fuse window.
    pub(crate) fn build(hw_idx: u32, setup: impl FnOnce(&Fixture)) -> Fixture {
        Self::build_on(hw_idx, &CSID530, setup)
    }

    /// Instance 0 of a variant described by `info`, probed.
    pub(crate) fn with_info(info: &'static CsidRegInfo) -> Fixture {
        let fx = Self::build_on(0, info, |_| {});
        fx.csid.probe_init().unwrap();
        fx
    }

    fn build_on(
        hw_idx: u32,
        info: &'static CsidRegInfo,
        setup: impl FnOnce(&Fixture),
    ) -> Fixture {
        let hw = leak(FakeHw::new(info));
        let fuse = leak(FakeFuse {
            regs: RefCell::new(BTreeMap::new()),
        });
        let soc = leak(FakeSoc::default());
        let client = leak(FakeClient::default());
        let caps = leak(FakeCaps::default());
        let phy = leak(FakePhy::default());
        let ppi = leak(FakePpi::default());
        let clock = leak(FakeClock::default());
        let tasklet: &'static Tasklet<'static, TASKLET_SLOTS> =
            leak(Tasklet::new(&NO_INTERRUPT_CONTROL));

        let mut bridges: [Option<&'static dyn PpiBridge>; MAX_PPI] = [None; MAX_PPI];
        bridges[0] = Some(ppi);
        let res = CsidResources {
            io: hw,
            fuse_io: Some(fuse),
            delay: hw,
            boot_clock: clock,
            soc,
            irq_ctl: &NO_INTERRUPT_CONTROL,
            scheduler: tasklet,
            caps,
            phy: Some(phy),
            ppi: bridges,
        };
        let csid = leak(TfeCsid::new(hw_idx, info, res));
        hw.attach(csid);

        let fx = Fixture {
            hw,
            fuse,
            soc,
            client,
            caps,
            phy,
            ppi,
            clock,
            tasklet,
            csid,
        };
        setup(&fx);
        fx
    }

    /// Raise `bits` in `group` and run the top half.
    pub(crate) fn fire(&self, group: IrqGroup, bits: u32) {
        self.hw.raise(group, bits);
        self.csid.handle_interrupt();
    }

    /// Run queued bottom halves. Returns how many ran.
    pub(crate) fn run_bottom_halves(&self) -> usize {
        let mut n = 0;
        while self.tasklet.service_next_pending(self.csid) {
            n += 1;
        }
        n
    }

    pub(crate) fn set_fuse(&self, offset: usize, value: u32) {
        self.fuse.write(offset, value);
    }
}

/// Single VC/DT port on RDI `n` fed by PHY 0 over four D-PHY lanes.
pub(crate) fn rdi_port(n: u8, vc: u32, dt: u32) -> PortConfig {
    let mut port = PortConfig {
        path: PathId::Rdi(n),
        input: InputResource::Phy(0),
        lane_type: LaneType::Dphy,
        lane_num: 4,
        lane_cfg: 0x3210,
        num_vc_dt: 1,
        ..PortConfig::default()
    };
    port.vc_dt[0] = VcDt::new(vc, dt);
    port
}

/// IPP port with the same receiver settings as [`rdi_port`].
pub(crate) fn ipp_port(vc: u32, dt: u32) -> PortConfig {
    PortConfig {
        path: PathId::Ipp,
        ..rdi_port(0, vc, dt)
    }
}
