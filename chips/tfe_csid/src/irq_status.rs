// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interrupt status bits and debug flags.

use bitflags::bitflags;

bitflags! {
    /// Top level interrupt group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TopIrq: u32 {
        const RST_DONE = 1 << 0;
    }
}

bitflags! {
    /// CSI-2 receiver interrupt group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxIrq: u32 {
        const DL0_EOT_CAPTURED = 1 << 0;
        const DL1_EOT_CAPTURED = 1 << 1;
        const DL2_EOT_CAPTURED = 1 << 2;
        const DL3_EOT_CAPTURED = 1 << 3;
        const DL0_SOT_CAPTURED = 1 << 4;
        const DL1_SOT_CAPTURED = 1 << 5;
        const DL2_SOT_CAPTURED = 1 << 6;
        const DL3_SOT_CAPTURED = 1 << 7;
        const LONG_PKT_CAPTURED = 1 << 8;
        const SHORT_PKT_CAPTURED = 1 << 9;
        const CPHY_PKT_HDR_CAPTURED = 1 << 10;
        const CPHY_EOT_RECEPTION = 1 << 11;
        const CPHY_SOT_RECEPTION = 1 << 12;
        const CPHY_PH_CRC = 1 << 13;
        const WARNING_ECC = 1 << 14;
        const LANE0_FIFO_OVERFLOW = 1 << 15;
        const LANE1_FIFO_OVERFLOW = 1 << 16;
        const LANE2_FIFO_OVERFLOW = 1 << 17;
        const LANE3_FIFO_OVERFLOW = 1 << 18;
        const CRC = 1 << 19;
        const ECC = 1 << 20;
        const MMAPPED_VC_DT = 1 << 21;
        const UNMAPPED_VC_DT = 1 << 22;
        const STREAM_UNDERFLOW = 1 << 23;
        const UNBOUNDED_FRAME = 1 << 24;
        const RST_DONE = 1 << 27;

        const EOT_CAPTURED = Self::DL0_EOT_CAPTURED.bits()
            | Self::DL1_EOT_CAPTURED.bits()
            | Self::DL2_EOT_CAPTURED.bits()
            | Self::DL3_EOT_CAPTURED.bits();
        const SOT_CAPTURED = Self::DL0_SOT_CAPTURED.bits()
            | Self::DL1_SOT_CAPTURED.bits()
            | Self::DL2_SOT_CAPTURED.bits()
            | Self::DL3_SOT_CAPTURED.bits();
        const LANE_FIFO_OVERFLOW = Self::LANE0_FIFO_OVERFLOW.bits()
            | Self::LANE1_FIFO_OVERFLOW.bits()
            | Self::LANE2_FIFO_OVERFLOW.bits()
            | Self::LANE3_FIFO_OVERFLOW.bits();
        /// Errors counted toward fatal escalation.
        const SOFT_ERRORS = Self::CPHY_EOT_RECEPTION.bits()
            | Self::CPHY_SOT_RECEPTION.bits()
            | Self::STREAM_UNDERFLOW.bits()
            | Self::UNBOUNDED_FRAME.bits();
        /// Errors reported to the client without escalation.
        const PROTOCOL_ERRORS = Self::CRC.bits()
            | Self::ECC.bits()
            | Self::MMAPPED_VC_DT.bits();
        /// Interrupts enabled whenever the receiver is on.
        const BASE_MASK = Self::RST_DONE.bits()
            | Self::LANE_FIFO_OVERFLOW.bits()
            | Self::CPHY_EOT_RECEPTION.bits()
            | Self::CPHY_SOT_RECEPTION.bits()
            | Self::CRC.bits()
            | Self::ECC.bits()
            | Self::MMAPPED_VC_DT.bits()
            | Self::STREAM_UNDERFLOW.bits()
            | Self::UNBOUNDED_FRAME.bits()
            | Self::CPHY_PH_CRC.bits();
    }
}

/// Names of the receiver error bits, for the deferred status report.
pub const RX_ERROR_NAMES: [(RxIrq, &str); 13] = [
    (RxIrq::LANE0_FIFO_OVERFLOW, "lane 0 fifo overflow"),
    (RxIrq::LANE1_FIFO_OVERFLOW, "lane 1 fifo overflow"),
    (RxIrq::LANE2_FIFO_OVERFLOW, "lane 2 fifo overflow"),
    (RxIrq::LANE3_FIFO_OVERFLOW, "lane 3 fifo overflow"),
    (RxIrq::CPHY_EOT_RECEPTION, "cphy eot reception"),
    (RxIrq::CPHY_SOT_RECEPTION, "cphy sot reception"),
    (RxIrq::CPHY_PH_CRC, "cphy packet header crc"),
    (RxIrq::CRC, "long packet payload crc"),
    (RxIrq::ECC, "packet header ecc"),
    (RxIrq::MMAPPED_VC_DT, "multi-mapped vc/dt"),
    (RxIrq::UNMAPPED_VC_DT, "unmapped vc/dt"),
    (RxIrq::STREAM_UNDERFLOW, "stream underflow"),
    (RxIrq::UNBOUNDED_FRAME, "unbounded frame"),
];

bitflags! {
    /// Interrupt group of one output path.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PathIrq: u32 {
        const RST_DONE = 1 << 1;
        const FIFO_OVERFLOW = 1 << 2;
        const SUBSAMPLED_EOF = 1 << 3;
        const SUBSAMPLED_SOF = 1 << 4;
        const FRAME_DROP_EOF = 1 << 5;
        const FRAME_DROP_EOL = 1 << 6;
        const FRAME_DROP_SOL = 1 << 7;
        const FRAME_DROP_SOF = 1 << 8;
        const INPUT_EOF = 1 << 9;
        const INPUT_EOL = 1 << 10;
        const INPUT_SOL = 1 << 11;
        const INPUT_SOF = 1 << 12;
        const PIX_COUNT = 1 << 13;
        const LINE_COUNT = 1 << 14;
        const CCIF_VIOLATION = 1 << 15;
        const OVERFLOW_IRQ = 1 << 16;

        /// Interrupts enabled on every streaming path.
        const BASE_MASK = Self::RST_DONE.bits()
            | Self::FIFO_OVERFLOW.bits()
            | Self::CCIF_VIOLATION.bits()
            | Self::OVERFLOW_IRQ.bits();
        const FORMAT_MEASURE = Self::PIX_COUNT.bits() | Self::LINE_COUNT.bits();
    }
}

bitflags! {
    /// Runtime debug switches, set through `TfeCsid::set_debug_mask`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugFlags: u32 {
        const SOF_IRQ = 1 << 0;
        const EOF_IRQ = 1 << 1;
        const SOT_IRQ = 1 << 2;
        const EOT_IRQ = 1 << 3;
        const SHORT_PKT_CAPTURE = 1 << 4;
        const LONG_PKT_CAPTURE = 1 << 5;
        const CPHY_PKT_CAPTURE = 1 << 6;
        const HBI_VBI_INFO = 1 << 7;
        const DISABLE_EARLY_EOF = 1 << 8;
        const RST_IRQ_LOG = 1 << 9;
    }
}

bitflags! {
    /// Sensor binning modes the pixel path can decode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BinningSupport: u32 {
        const BAYER = 1 << 0;
        const QCFA = 1 << 1;
        const MULTI_VCDT = 1 << 2;
    }
}

/// Interrupt register groups, in status snapshot order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqGroup {
    Top = 0,
    Rx = 1,
    Ipp = 2,
    Rdi0 = 3,
    Rdi1 = 4,
    Rdi2 = 5,
}

pub const NUM_IRQ_GROUPS: usize = 6;

/// Status of every interrupt group as read by one top half.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IrqStatus(pub [u32; NUM_IRQ_GROUPS]);

impl IrqStatus {
    pub fn get(&self, group: IrqGroup) -> u32 {
        self.0[group as usize]
    }

    pub fn set(&mut self, group: IrqGroup, value: u32) {
        self.0[group as usize] = value;
    }

    pub fn top(&self) -> TopIrq {
        TopIrq::from_bits_retain(self.get(IrqGroup::Top))
    }

    pub fn rx(&self) -> RxIrq {
        RxIrq::from_bits_retain(self.get(IrqGroup::Rx))
    }

    /// Status of the path at snapshot position `index` (IPP is 0).
    pub fn path(&self, index: usize) -> PathIrq {
        PathIrq::from_bits_retain(self.0[IrqGroup::Ipp as usize + index])
    }

    pub fn set_path(&mut self, index: usize, value: u32) {
        self.0[IrqGroup::Ipp as usize + index] = value;
    }
}
