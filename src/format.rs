// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::SensorError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Pixel format of the frame written to the frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixFormat {
    #[default]
    Invalid,
    /// 8-bit luma.
    Grayscale,
    /// 16-bit RGB 5:6:5.
    Rgb565,
    /// 8-bit raw color filter array data.
    Bayer,
    /// 16-bit YUV 4:2:2.
    Yuv422,
    /// Compressed, variable size.
    Jpeg,
}

impl PixFormat {
    /// Bytes per pixel read from the sensor. Grayscale depends on whether
    /// the sensor emits 8-bit luma or full YUV (`mono_bpp`).
    pub fn src_bpp(self, mono_bpp: u8) -> u32 {
        match self {
            PixFormat::Grayscale => u32::from(mono_bpp),
            PixFormat::Rgb565 | PixFormat::Yuv422 => 2,
            PixFormat::Bayer | PixFormat::Jpeg => 1,
            PixFormat::Invalid => 0,
        }
    }

    /// Bytes per pixel written to memory, `None` when the size is not a
    /// function of the geometry (JPEG).
    pub fn dst_bpp(self) -> Option<u32> {
        match self {
            PixFormat::Grayscale | PixFormat::Bayer => Some(1),
            PixFormat::Rgb565 | PixFormat::Yuv422 => Some(2),
            PixFormat::Jpeg | PixFormat::Invalid => None,
        }
    }

    /// Bytes per pixel charged against the frame buffer budget. JPEG output
    /// is bounded by one byte per pixel.
    pub fn budget_bpp(self) -> Option<u32> {
        match self {
            PixFormat::Jpeg => Some(1),
            other => other.dst_bpp(),
        }
    }

    /// Two byte per pixel color formats, which can fall back to Bayer.
    pub fn is_color_2bpp(self) -> bool {
        matches!(self, PixFormat::Rgb565 | PixFormat::Yuv422)
    }

    pub fn is_valid(self) -> bool {
        self != PixFormat::Invalid
    }

    pub fn name(self) -> &'static str {
        match self {
            PixFormat::Invalid => "INVALID",
            PixFormat::Grayscale => "GRAYSCALE",
            PixFormat::Rgb565 => "RGB565",
            PixFormat::Bayer => "BAYER",
            PixFormat::Yuv422 => "YUV422",
            PixFormat::Jpeg => "JPEG",
        }
    }
}

impl fmt::Display for PixFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixFormat {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GRAYSCALE" | "GRAY" => Ok(PixFormat::Grayscale),
            "RGB565" => Ok(PixFormat::Rgb565),
            "BAYER" => Ok(PixFormat::Bayer),
            "YUV422" => Ok(PixFormat::Yuv422),
            "JPEG" => Ok(PixFormat::Jpeg),
            _ => Err(SensorError::InvalidPixformat),
        }
    }
}
