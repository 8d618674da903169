// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Frame size catalog.
//!
//! Symbolic frame sizes resolve to a fixed `(width, height)` through
//! [`RESOLUTION`]. The table is indexed by the enum discriminant, with the
//! `Invalid` slot at index zero holding `(0, 0)`.

use crate::error::SensorError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

macro_rules! framesizes {
    ($($name:ident = $label:literal ($w:literal, $h:literal),)*) => {
        /// Symbolic frame size identifier.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum FrameSize {
            #[default]
            Invalid = 0,
            $($name,)*
        }

        /// Width and height of every frame size, indexed by discriminant.
        pub const RESOLUTION: &[(u16, u16)] = &[(0, 0), $(($w, $h),)*];

        impl FrameSize {
            /// Every valid identifier in catalog order.
            pub const ALL: &'static [FrameSize] = &[$(FrameSize::$name,)*];

            pub fn name(self) -> &'static str {
                match self {
                    FrameSize::Invalid => "INVALID",
                    $(FrameSize::$name => $label,)*
                }
            }
        }
    };
}

framesizes! {
    // C/SIF
    Qqcif = "QQCIF" (88, 72),
    Qcif = "QCIF" (176, 144),
    Cif = "CIF" (352, 288),
    Qqsif = "QQSIF" (88, 60),
    Qsif = "QSIF" (176, 120),
    Sif = "SIF" (352, 240),
    // VGA
    Qqqqvga = "QQQQVGA" (40, 30),
    Qqqvga = "QQQVGA" (80, 60),
    Qqvga = "QQVGA" (160, 120),
    Qvga = "QVGA" (320, 240),
    Vga = "VGA" (640, 480),
    Hqqqqvga = "HQQQQVGA" (30, 20),
    Hqqqvga = "HQQQVGA" (60, 40),
    Hqqvga = "HQQVGA" (120, 80),
    Hqvga = "HQVGA" (240, 160),
    Hvga = "HVGA" (480, 320),
    // FFT
    R64x32 = "64X32" (64, 32),
    R64x64 = "64X64" (64, 64),
    R128x64 = "128X64" (128, 64),
    R128x128 = "128X128" (128, 128),
    // Himax
    R160x160 = "160X160" (160, 160),
    R320x320 = "320X320" (320, 320),
    // Other
    Lcd = "LCD" (128, 160),
    Qqvga2 = "QQVGA2" (128, 160),
    Wvga = "WVGA" (720, 480),
    Wvga2 = "WVGA2" (752, 480),
    Svga = "SVGA" (800, 600),
    Xga = "XGA" (1024, 768),
    Wxga = "WXGA" (1280, 768),
    Sxga = "SXGA" (1280, 1024),
    Sxgam = "SXGAM" (1280, 960),
    Uxga = "UXGA" (1600, 1200),
    Hd = "HD" (1280, 720),
    Fhd = "FHD" (1920, 1080),
    Qhd = "QHD" (2560, 1440),
    Qxga = "QXGA" (2048, 1536),
    Wqxga = "WQXGA" (2560, 1600),
    Wqxga2 = "WQXGA2" (2592, 1944),
}

impl FrameSize {
    /// Resolution of this identifier, `None` for `Invalid`.
    pub fn dims(self) -> Option<(u32, u32)> {
        match self {
            FrameSize::Invalid => None,
            fs => RESOLUTION
                .get(fs as usize)
                .map(|&(w, h)| (u32::from(w), u32::from(h))),
        }
    }

    pub fn width(self) -> u32 {
        self.dims().map_or(0, |d| d.0)
    }

    pub fn height(self) -> u32 {
        self.dims().map_or(0, |d| d.1)
    }

    pub fn is_valid(self) -> bool {
        self != FrameSize::Invalid
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FrameSize {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        FrameSize::ALL
            .iter()
            .copied()
            .find(|fs| fs.name() == upper)
            .ok_or(SensorError::InvalidFramesize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_entries_are_positive() {
        assert_eq!(RESOLUTION.len(), FrameSize::ALL.len() + 1);
        for fs in FrameSize::ALL {
            let (w, h) = fs.dims().unwrap();
            assert!(w > 0 && h > 0, "{fs} has an empty resolution");
        }
        assert_eq!(FrameSize::Invalid.dims(), None);
    }

    #[test]
    fn known_sizes() {
        assert_eq!(FrameSize::Vga.dims(), Some((640, 480)));
        assert_eq!(FrameSize::Qqcif.dims(), Some((88, 72)));
        assert_eq!(FrameSize::R320x320.dims(), Some((320, 320)));
        assert_eq!(FrameSize::Wqxga2.dims(), Some((2592, 1944)));
    }

    #[test]
    fn parse_by_name() {
        assert_eq!("vga".parse::<FrameSize>(), Ok(FrameSize::Vga));
        assert_eq!("128x64".parse::<FrameSize>(), Ok(FrameSize::R128x64));
        assert_eq!(
            "bogus".parse::<FrameSize>(),
            Err(SensorError::InvalidFramesize)
        );
    }
}
