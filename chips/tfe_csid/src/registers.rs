// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register map of the TFE CSID block.
//!
//! The CSID is reached through a single register window. Offsets differ
//! between hardware generations, so the driver never hard-codes them: every
//! access goes through a [`CsidRegInfo`] describing one generation. Field
//! layouts of the configuration words are shared by all generations and are
//! described with `register_bitfields!` below.

use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::config::MAX_RDI;

register_bitfields![u32,
    /// Top level reset strobes.
    pub RST_STROBES [
        /// Reset the software-programmed registers.
        SW_REGS OFFSET(0) NUMBITS(1) [],
        /// Reset the core logic, keeping register contents.
        HW_CORE OFFSET(1) NUMBITS(4) []
    ],

    pub RX_CFG0 [
        NUM_ACTIVE_LANES OFFSET(0) NUMBITS(2) [],
        LANE_CFG OFFSET(4) NUMBITS(16) [],
        PHY_NUM_SEL OFFSET(20) NUMBITS(4) [],
        PHY_TYPE_SEL OFFSET(24) NUMBITS(1) [
            Dphy = 0,
            Cphy = 1
        ]
    ],

    pub RX_CFG1 [
        ECC_CORRECTION_EN OFFSET(0) NUMBITS(1) [],
        MISR_EN OFFSET(6) NUMBITS(1) [],
        /// Hold the lane front end in reset.
        LANE_RESET OFFSET(7) NUMBITS(1) []
    ],

    pub RX_CAPTURE_CTRL [
        LONG_PKT_EN OFFSET(0) NUMBITS(1) [],
        SHORT_PKT_EN OFFSET(1) NUMBITS(1) [],
        CPHY_PKT_EN OFFSET(3) NUMBITS(1) [],
        LONG_PKT_DT OFFSET(4) NUMBITS(6) [],
        LONG_PKT_VC OFFSET(10) NUMBITS(5) [],
        SHORT_PKT_VC OFFSET(15) NUMBITS(5) [],
        CPHY_PKT_DT OFFSET(20) NUMBITS(6) [],
        CPHY_PKT_VC OFFSET(26) NUMBITS(5) []
    ],

    /// RX capture latch reset strobes.
    pub RX_RST_STROBES [
        SHORT_PKT_HDR OFFSET(1) NUMBITS(1) [],
        LONG_PKT_HDR OFFSET(2) NUMBITS(1) [],
        CPHY_PKT_HDR OFFSET(3) NUMBITS(1) []
    ],

    /// Header of a captured CSI-2 packet.
    pub CAPTURED_PKT [
        WORD_COUNT OFFSET(0) NUMBITS(16) [],
        DT OFFSET(16) NUMBITS(6) [],
        VC OFFSET(22) NUMBITS(5) []
    ],

    /// Footer of a captured long packet.
    pub CAPTURED_PKT_FTR [
        EXPECTED_CRC OFFSET(0) NUMBITS(16) [],
        CALCULATED_CRC OFFSET(16) NUMBITS(16) []
    ],

    /// Pixel path configuration.
    pub IPP_CFG0 [
        TIMESTAMP_EN OFFSET(1) NUMBITS(1) [],
        BIN_EN OFFSET(2) NUMBITS(1) [],
        CROP_H_EN OFFSET(4) NUMBITS(1) [],
        CROP_V_EN OFFSET(5) NUMBITS(1) [],
        PIX_STORE_EN OFFSET(7) NUMBITS(1) [],
        FORMAT_MEASURE_EN OFFSET(8) NUMBITS(1) [],
        DECODE_FORMAT OFFSET(12) NUMBITS(4) [],
        DT OFFSET(16) NUMBITS(6) [],
        VC OFFSET(22) NUMBITS(5) [],
        DT_ID OFFSET(27) NUMBITS(2) [],
        EARLY_EOF_EN OFFSET(29) NUMBITS(1) [],
        BIN_QCFA_EN OFFSET(30) NUMBITS(1) [],
        PATH_EN OFFSET(31) NUMBITS(1) []
    ],

    /// Raw dump path configuration.
    pub RDI_CFG0 [
        BYTE_CNTR_EN OFFSET(0) NUMBITS(1) [],
        TIMESTAMP_EN OFFSET(2) NUMBITS(1) [],
        FORMAT_MEASURE_EN OFFSET(8) NUMBITS(1) [],
        PLAIN_FORMAT OFFSET(10) NUMBITS(2) [],
        DECODE_FORMAT OFFSET(12) NUMBITS(4) [],
        DT OFFSET(16) NUMBITS(6) [],
        VC OFFSET(22) NUMBITS(5) [],
        DT_ID OFFSET(27) NUMBITS(2) [],
        PATH_EN OFFSET(31) NUMBITS(1) []
    ],

    /// Secondary VC/DT a path accepts besides the one in CFG0.
    pub MULTI_VCDT_CFG0 [
        EN OFFSET(0) NUMBITS(1) [],
        VC1 OFFSET(2) NUMBITS(5) [],
        DT1 OFFSET(7) NUMBITS(6) []
    ],

    pub PATH_CFG1 [
        TIMESTAMP_STB_SEL OFFSET(8) NUMBITS(2) [
            None = 0,
            PreIrq = 1,
            PostIrq = 2
        ]
    ],

    pub PATH_CTRL [
        HALT_CMD OFFSET(0) NUMBITS(2) [
            HaltAtFrameBoundary = 0,
            ResumeAtFrameBoundary = 1,
            HaltImmediately = 2
        ],
        HALT_MODE OFFSET(2) NUMBITS(2) [
            Internal = 0,
            Global = 1,
            Master = 2,
            Slave = 3
        ],
        MASTER_SEL OFFSET(4) NUMBITS(1) [
            Master = 0,
            Slave = 1
        ]
    ],

    /// Horizontal or vertical crop window, inclusive.
    pub CROP [
        START OFFSET(0) NUMBITS(16) [],
        END OFFSET(16) NUMBITS(16) []
    ],

    pub ERR_RECOVERY_CFG0 [
        DETECT_EN OFFSET(0) NUMBITS(1) [],
        OVERFLOW_CTRL_MODE OFFSET(2) NUMBITS(2) [
            None = 0,
            DetectOnly = 2
        ]
    ],

    pub FORMAT_MEASURE_CFG0 [
        HBI_VBI_CNT_EN OFFSET(2) NUMBITS(2) []
    ],

    /// Measured or expected frame geometry.
    pub FORMAT_MEASURE [
        WIDTH OFFSET(0) NUMBITS(16) [],
        HEIGHT OFFSET(16) NUMBITS(16) []
    ]
];

pub type RxCfg0 = LocalRegisterCopy<u32, RX_CFG0::Register>;
pub type RxCfg1 = LocalRegisterCopy<u32, RX_CFG1::Register>;
pub type RxCaptureCtrl = LocalRegisterCopy<u32, RX_CAPTURE_CTRL::Register>;
pub type IppCfg0 = LocalRegisterCopy<u32, IPP_CFG0::Register>;
pub type RdiCfg0 = LocalRegisterCopy<u32, RDI_CFG0::Register>;
pub type PathCtrl = LocalRegisterCopy<u32, PATH_CTRL::Register>;
pub type Measure = LocalRegisterCopy<u32, FORMAT_MEASURE::Register>;
pub type CapturedPkt = LocalRegisterCopy<u32, CAPTURED_PKT::Register>;

/// Registers shared by the whole block.
#[derive(Clone, Copy, Debug)]
pub struct CommonRegs {
    pub hw_version: usize,
    pub cfg0: usize,
    pub ctrl: usize,
    pub reset: usize,
    pub rst_strobes: usize,
    pub test_bus_ctrl: usize,
    pub top_irq_status: usize,
    pub top_irq_mask: usize,
    pub top_irq_clear: usize,
    pub top_irq_set: usize,
    /// Writing 1 commits every pending interrupt clear.
    pub irq_cmd: usize,
}

/// CSI-2 receiver registers.
#[derive(Clone, Copy, Debug)]
pub struct RxRegs {
    pub irq_status: usize,
    pub irq_mask: usize,
    pub irq_clear: usize,
    pub irq_set: usize,
    pub cfg0: usize,
    pub cfg1: usize,
    pub capture_ctrl: usize,
    pub rst_strobes: usize,
    pub captured_short_pkt_0: usize,
    pub captured_short_pkt_1: usize,
    pub captured_long_pkt_0: usize,
    pub captured_long_pkt_1: usize,
    pub captured_long_pkt_ftr: usize,
    pub captured_cphy_pkt_hdr: usize,
    pub total_crc_err: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct CropRegs {
    pub hcrop: usize,
    pub vcrop: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct ByteCounterRegs {
    pub ping: usize,
    pub pong: usize,
}

/// Registers of one output path, IPP or RDI.
#[derive(Clone, Copy, Debug)]
pub struct PathRegs {
    pub irq_status: usize,
    pub irq_mask: usize,
    pub irq_clear: usize,
    pub irq_set: usize,
    pub cfg0: usize,
    pub cfg1: usize,
    pub ctrl: usize,
    pub rst_strobes: usize,
    /// Bit 0 reads 1 once the path has halted.
    pub status: usize,
    pub err_recovery_cfg0: usize,
    pub format_measure_cfg0: usize,
    pub format_measure_cfg1: usize,
    pub format_measure0: usize,
    /// Horizontal blanking count.
    pub format_measure1: usize,
    /// Vertical blanking count.
    pub format_measure2: usize,
    pub timestamp_curr0_sof: usize,
    pub timestamp_curr1_sof: usize,
    pub timestamp_prev0_sof: usize,
    pub timestamp_prev1_sof: usize,
    pub multi_vcdt_cfg0: Option<usize>,
    pub crop: Option<CropRegs>,
    pub byte_counters: Option<ByteCounterRegs>,
}

impl PathRegs {
    /// Standard path layout with interrupt registers at `irq` and the
    /// configuration block at `base`.
    pub const fn at(irq: usize, base: usize) -> PathRegs {
        PathRegs {
            irq_status: irq,
            irq_mask: irq + 0x4,
            irq_clear: irq + 0x8,
            irq_set: irq + 0xc,
            cfg0: base,
            cfg1: base + 0x4,
            ctrl: base + 0x8,
            rst_strobes: base + 0x10,
            status: base + 0x14,
            err_recovery_cfg0: base + 0x34,
            format_measure_cfg0: base + 0x40,
            format_measure_cfg1: base + 0x44,
            format_measure0: base + 0x48,
            format_measure1: base + 0x4c,
            format_measure2: base + 0x50,
            timestamp_curr0_sof: base + 0x54,
            timestamp_curr1_sof: base + 0x58,
            timestamp_prev0_sof: base + 0x5c,
            timestamp_prev1_sof: base + 0x60,
            multi_vcdt_cfg0: None,
            crop: None,
            byte_counters: None,
        }
    }
}

/// Hardware version triple reported through the capabilities query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CsidVersion {
    pub major: u32,
    pub minor: u32,
    pub incr: u32,
}

/// Fuse registers that can remove a TFE instance or its pixel pipe.
#[derive(Clone, Copy, Debug)]
pub struct FuseInfo {
    /// Instance the fuses apply to.
    pub hw_idx: u32,
    /// Offset of the "TFE disabled" fuse in the top register window.
    pub tfe_fuse: usize,
    /// Offset of the "pixel pipe disabled" fuse.
    pub pix_pipe_fuse: usize,
}

/// Description of one CSID hardware generation.
#[derive(Clone, Copy, Debug)]
pub struct CsidRegInfo {
    pub cmn: CommonRegs,
    pub rx: RxRegs,
    pub ipp: Option<PathRegs>,
    pub rdi: [PathRegs; MAX_RDI],
    pub num_rdis: usize,
    pub version: CsidVersion,
    pub sync_clk: bool,

    pub top_irq_mask_all: u32,
    pub rx_irq_mask_all: u32,
    pub path_irq_mask_all: u32,
    /// Full hardware reset, registers retained.
    pub rst_stb: u32,
    /// Reset of the software-programmed registers.
    pub reg_rst_stb: u32,
    pub path_rst_stb_all: u32,

    /// PHY selector value of PHY 0.
    pub phy_sel_base: u32,
    /// PHY selector value of C-PHY TPG 0.
    pub cphy_tpg_base_id: u32,
    /// The C-PHY TPG must be routed through the camera mux.
    pub need_to_sel_tpg_mux: bool,
    pub format_measure_support: bool,
    pub binning: crate::irq_status::BinningSupport,
    pub fuse: Option<FuseInfo>,
    /// Size of the register window in bytes.
    pub window_size: usize,
}

const CSID530_IPP: PathRegs = PathRegs {
    multi_vcdt_cfg0: Some(0x30c),
    crop: Some(CropRegs {
        hcrop: 0x31c,
        vcrop: 0x320,
    }),
    ..PathRegs::at(0x1b0, 0x300)
};

const fn csid530_rdi(irq: usize, base: usize) -> PathRegs {
    PathRegs {
        multi_vcdt_cfg0: Some(base + 0xc),
        byte_counters: Some(ByteCounterRegs {
            ping: base + 0x74,
            pong: base + 0x78,
        }),
        ..PathRegs::at(irq, base)
    }
}

/// CSID v5.3.0, the reference generation.
pub const CSID530: CsidRegInfo = CsidRegInfo {
    cmn: CommonRegs {
        hw_version: 0x0,
        cfg0: 0x4,
        ctrl: 0x8,
        reset: 0xc,
        rst_strobes: 0x10,
        test_bus_ctrl: 0x14,
        top_irq_status: 0x180,
        top_irq_mask: 0x184,
        top_irq_clear: 0x188,
        top_irq_set: 0x18c,
        irq_cmd: 0x190,
    },
    rx: RxRegs {
        irq_status: 0x1a0,
        irq_mask: 0x1a4,
        irq_clear: 0x1a8,
        irq_set: 0x1ac,
        cfg0: 0x200,
        cfg1: 0x204,
        capture_ctrl: 0x208,
        rst_strobes: 0x210,
        captured_short_pkt_0: 0x230,
        captured_short_pkt_1: 0x234,
        captured_long_pkt_0: 0x238,
        captured_long_pkt_1: 0x23c,
        captured_long_pkt_ftr: 0x240,
        captured_cphy_pkt_hdr: 0x244,
        total_crc_err: 0x24c,
    },
    ipp: Some(CSID530_IPP),
    rdi: [
        csid530_rdi(0x1c0, 0x500),
        csid530_rdi(0x1d0, 0x600),
        csid530_rdi(0x1e0, 0x700),
    ],
    num_rdis: 3,
    version: CsidVersion {
        major: 5,
        minor: 3,
        incr: 0,
    },
    sync_clk: true,
    top_irq_mask_all: 0x1,
    rx_irq_mask_all: 0x0fff_ffff,
    path_irq_mask_all: 0x7_ffff,
    rst_stb: 0x1e,
    reg_rst_stb: 0x1,
    path_rst_stb_all: 0x1,
    phy_sel_base: 1,
    cphy_tpg_base_id: 9,
    need_to_sel_tpg_mux: true,
    format_measure_support: true,
    binning: crate::irq_status::BinningSupport::all(),
    fuse: Some(FuseInfo {
        hw_idx: 2,
        tfe_fuse: 0x2c,
        pix_pipe_fuse: 0x30,
    }),
    window_size: 0x800,
};
