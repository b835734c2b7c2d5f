// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Pixel format decode tables.
//!
//! Each path decodes the incoming CSI-2 payload into a storage format. The
//! pixel path only unpacks Bayer data; a raw dump path can either pass the
//! stream through untouched or unpack it into byte/half-word aligned
//! ("plain") words.

use kernel::ErrorCode;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    Raw6,
    #[default]
    Raw8,
    Raw10,
    Raw12,
    Raw14,
    Raw16,
    Plain128,
    Plain8,
    Plain16_10,
    Plain16_12,
    Plain16_14,
    Plain16_16,
}

/// Decode register values for one path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatCodes {
    pub decode: u32,
    pub plain: u32,
}

/// Decode value that stores the payload without unpacking.
pub const DECODE_PAYLOAD_ONLY: u32 = 0xf;

/// Decode codes for the pixel path, which only accepts Bayer RAW6..RAW12.
pub fn ipp_codes(input: PixelFormat) -> Result<FormatCodes, ErrorCode> {
    let (decode, plain) = match input {
        PixelFormat::Raw6 => (0, 0),
        PixelFormat::Raw8 => (1, 0),
        PixelFormat::Raw10 => (2, 1),
        PixelFormat::Raw12 => (3, 1),
        _ => return Err(ErrorCode::NOSUPPORT),
    };
    Ok(FormatCodes { decode, plain })
}

/// Decode codes for a raw dump path converting `input` to `output`.
pub fn rdi_codes(input: PixelFormat, output: PixelFormat) -> Result<FormatCodes, ErrorCode> {
    use PixelFormat::*;

    let passthrough = FormatCodes {
        decode: DECODE_PAYLOAD_ONLY,
        plain: 0,
    };
    let unpack = |decode, plain| Ok(FormatCodes { decode, plain });

    match (input, output) {
        (Raw6, Raw6) | (Raw12, Raw12) | (Raw14, Raw14) | (Raw16, Raw16) => Ok(passthrough),
        (Raw8, Raw8 | Plain128) | (Raw10, Raw10 | Plain128) => Ok(passthrough),
        (Raw6, Plain8) => unpack(0, 0),
        (Raw8, Plain8) => unpack(1, 0),
        (Raw10, Plain16_10) => unpack(2, 1),
        (Raw12, Plain16_12) => unpack(3, 1),
        (Raw14, Plain16_14) => unpack(4, 1),
        (Raw16, Plain16_16) => unpack(5, 1),
        _ => Err(ErrorCode::NOSUPPORT),
    }
}
