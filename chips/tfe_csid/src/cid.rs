// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Channel id table and shared receiver configuration.
//!
//! Every reserved path is bound to a channel id (CID), a slot naming the
//! ordered set of VC/DT pairs the path accepts. Paths asking for the same set
//! share a slot. All paths also share one CSI-2 receiver, whose lane setup is
//! fixed by the first reservation and checked against every later one.

use kernel::hil::phy::LaneType;
use kernel::ErrorCode;

use crate::config::{MAX_CID, MAX_VC_DT};
use crate::path::VcDt;

/// Source feeding the receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputResource {
    /// Internal test pattern generator.
    Tpg,
    /// Physical PHY `n`.
    Phy(u8),
    /// C-PHY test pattern generator `n`.
    CphyTpg(u8),
}

impl Default for InputResource {
    fn default() -> Self {
        InputResource::Phy(0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct CidSlot {
    cnt: u32,
    vc_dt: [VcDt; MAX_VC_DT],
    num_vc_dt: usize,
}

impl CidSlot {
    fn matches(&self, pairs: &[VcDt]) -> bool {
        self.cnt > 0 && self.num_vc_dt == pairs.len() && self.vc_dt[..self.num_vc_dt] == *pairs
    }
}

/// Fixed set of channel id slots.
pub struct CidTable {
    slots: [CidSlot; MAX_CID],
}

impl CidTable {
    pub const fn new() -> Self {
        Self {
            slots: [CidSlot {
                cnt: 0,
                vc_dt: [VcDt { vc: 0, dt: 0 }; MAX_VC_DT],
                num_vc_dt: 0,
            }; MAX_CID],
        }
    }

    /// Bind `pairs` to a slot, sharing an existing slot carrying the same
    /// pairs in the same order.
    pub fn reserve_channel(&mut self, pairs: &[VcDt]) -> Result<usize, ErrorCode> {
        if pairs.is_empty() || pairs.len() > MAX_VC_DT {
            return Err(ErrorCode::INVAL);
        }

        if let Some(cid) = self.slots.iter().position(|s| s.matches(pairs)) {
            self.slots[cid].cnt += 1;
            return Ok(cid);
        }

        let cid = self
            .slots
            .iter()
            .position(|s| s.cnt == 0)
            .ok_or(ErrorCode::NOMEM)?;
        let slot = &mut self.slots[cid];
        slot.vc_dt[..pairs.len()].copy_from_slice(pairs);
        slot.num_vc_dt = pairs.len();
        slot.cnt = 1;
        Ok(cid)
    }

    pub fn release_channel(&mut self, cid: usize) {
        if let Some(slot) = self.slots.get_mut(cid) {
            slot.cnt = slot.cnt.saturating_sub(1);
        }
    }

    pub fn refcount(&self, cid: usize) -> u32 {
        self.slots.get(cid).map_or(0, |s| s.cnt)
    }

    pub fn clear(&mut self) {
        self.slots = [CidSlot::default(); MAX_CID];
    }
}

/// Receiver setup requested by a path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RxRequest {
    pub input: InputResource,
    pub lane_type: LaneType,
    pub lane_num: u32,
    pub lane_cfg: u32,
}

/// Canonical receiver configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Csi2RxConfig {
    pub req: RxRequest,
    /// Value programmed into the PHY selector field.
    pub phy_sel: u32,
}

/// Base values used to turn an input resource into a PHY selector.
#[derive(Clone, Copy, Debug)]
pub struct PhySelBase {
    pub phy: u32,
    pub cphy_tpg: u32,
}

impl PhySelBase {
    pub fn phy_sel(&self, input: InputResource) -> u32 {
        match input {
            InputResource::Tpg => 0,
            InputResource::Phy(n) => self.phy + n as u32,
            InputResource::CphyTpg(n) => self.cphy_tpg + n as u32,
        }
    }

    /// Index of the physical PHY behind `phy_sel`, if it selects one.
    pub fn phy_index(&self, input: InputResource, phy_sel: u32) -> Option<u32> {
        match input {
            InputResource::Phy(_) => phy_sel.checked_sub(self.phy),
            _ => None,
        }
    }
}

/// The shared CSI-2 receiver and its reservation count.
#[derive(Default)]
pub struct Csi2Rx {
    reserve_cnt: u32,
    cfg: Option<Csi2RxConfig>,
}

impl Csi2Rx {
    pub const fn new() -> Self {
        Self {
            reserve_cnt: 0,
            cfg: None,
        }
    }

    pub fn reserve_receiver(&mut self, req: &RxRequest, base: &PhySelBase) -> Result<(), ErrorCode> {
        if req.lane_num == 0 || req.lane_num > req.lane_type.max_lanes() {
            return Err(ErrorCode::INVAL);
        }
        if self.reserve_cnt == u32::MAX {
            return Err(ErrorCode::NOMEM);
        }

        match self.cfg {
            Some(cfg) if self.reserve_cnt > 0 => {
                if cfg.req != *req {
                    return Err(ErrorCode::INVAL);
                }
            }
            _ => {
                self.cfg = Some(Csi2RxConfig {
                    req: *req,
                    phy_sel: base.phy_sel(req.input),
                });
            }
        }
        self.reserve_cnt += 1;
        Ok(())
    }

    pub fn release_receiver(&mut self) {
        self.reserve_cnt = self.reserve_cnt.saturating_sub(1);
        if self.reserve_cnt == 0 {
            self.cfg = None;
        }
    }

    pub fn config(&self) -> Option<&Csi2RxConfig> {
        self.cfg.as_ref()
    }

    pub fn reserve_count(&self) -> u32 {
        self.reserve_cnt
    }
}
