// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interfaces to the MIPI physical layer and the PPI bridge in front of a
//! receiver.

use crate::ErrorCode;

/// Physical lane encoding of a CSI-2 link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LaneType {
    #[default]
    Dphy = 0,
    Cphy = 1,
}

impl LaneType {
    /// Largest number of data lanes (D-PHY) or trios (C-PHY) a link carries.
    pub fn max_lanes(self) -> u32 {
        match self {
            LaneType::Dphy => 4,
            LaneType::Cphy => 3,
        }
    }
}

/// Lane setup handed to a PPI bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PpiLaneConfig {
    pub lane_type: LaneType,
    pub lane_num: u32,
    pub lane_cfg: u32,
}

/// Diagnostic hook into the PHY driver.
pub trait PhyNotifier {
    /// Ask the PHY driver to dump the registers of `phy_index`. Called from
    /// interrupt context, so implementations must only queue the request.
    fn notify_register_dump(&self, phy_index: u32);
}

/// A PPI bridge sitting between a PHY and the receiver.
pub trait PpiBridge {
    fn init(&self, cfg: &PpiLaneConfig) -> Result<(), ErrorCode>;
    fn deinit(&self) -> Result<(), ErrorCode>;
}
