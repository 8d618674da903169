// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Live sensor session state.

use crate::{format::PixFormat, image::Rect, resolution::FrameSize};
use serde::{Deserialize, Serialize};

/// Active level of a control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    pub fn flipped(self) -> Self {
        match self {
            Polarity::ActiveLow => Polarity::ActiveHigh,
            Polarity::ActiveHigh => Polarity::ActiveLow,
        }
    }
}

/// Chroma order of 2-byte YUV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YuvOrder {
    Yuv,
    Yvu,
}

/// Color filter array layout of raw output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfaPattern {
    Bggr,
    Gbrg,
    Grbg,
    Rggb,
}

/// Hardware polarity and output quirks of a chip family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwFlags {
    pub reset_pol: Polarity,
    pub power_pol: Polarity,
    pub vsync_pol: Polarity,
    pub hsync_pol: Polarity,
    /// Pixel clock sampling edge.
    pub pixck_pol: Polarity,
    /// Hardware frame sync input.
    pub frame_sync: bool,
    /// Grayscale bytes per pixel as read from the sensor (1 or 2).
    pub mono_bpp: u8,
    /// Byte-swap 2BPP RGB formats after capture.
    pub rgb_swap: bool,
    /// Byte-swap 2BPP YUV formats after capture.
    pub yuv_swap: bool,
    /// Number of black level calibration registers.
    pub blc_size: u8,
    /// The sensor supports raw output only.
    pub raw_output: bool,
    pub yuv_order: YuvOrder,
    /// JPEG output mode, zero when the chip has no encoder.
    pub jpeg_mode: u8,
    pub cfa: CfaPattern,
}

impl HwFlags {
    pub const DEFAULT: HwFlags = HwFlags {
        reset_pol: Polarity::ActiveHigh,
        power_pol: Polarity::ActiveHigh,
        vsync_pol: Polarity::ActiveHigh,
        hsync_pol: Polarity::ActiveLow,
        pixck_pol: Polarity::ActiveHigh,
        frame_sync: false,
        mono_bpp: 2,
        rgb_swap: false,
        yuv_swap: false,
        blc_size: 0,
        raw_output: false,
        yuv_order: YuvOrder::Yuv,
        jpeg_mode: 0,
        cfa: CfaPattern::Bggr,
    };
}

impl Default for HwFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// AGC gain ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GainCeiling {
    #[default]
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
    X128,
}

/// Special digital effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpecialEffect {
    #[default]
    Normal,
    Negative,
}

/// Session state of one sensor on one bus.
///
/// Owned by [`crate::sensor::Sensor`] and only changed through its
/// operations. The capture-time fields (`first_line`, `drop_frame`, last
/// frame timestamp) are shared with interrupt context and live behind the
/// capture critical section instead, see
/// [`crate::sensor::Sensor::capture_status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorDescriptor {
    pub chip_id: u32,
    pub slv_addr: u8,
    pub flags: HwFlags,
    pub pixformat: PixFormat,
    pub framesize: FrameSize,
    /// Active capture window within `framesize`.
    pub window: Rect,
    /// Target frame rate, zero when unthrottled.
    pub framerate: u32,
    pub gainceiling: GainCeiling,
    pub sde: SpecialEffect,
    pub hmirror: bool,
    pub vflip: bool,
    pub transpose: bool,
    pub auto_rotation: bool,
    pub disable_delays: bool,
    pub disable_full_flush: bool,
    pub detected: bool,
    #[serde(skip)]
    pub color_palette: Option<&'static [u16]>,
}

impl SensorDescriptor {
    pub(crate) fn new(chip_id: u32, slv_addr: u8, flags: HwFlags) -> Self {
        Self {
            chip_id,
            slv_addr,
            flags,
            pixformat: PixFormat::Invalid,
            framesize: FrameSize::Invalid,
            window: Rect::default(),
            framerate: 0,
            gainceiling: GainCeiling::default(),
            sde: SpecialEffect::default(),
            hmirror: false,
            vflip: false,
            transpose: false,
            auto_rotation: false,
            disable_delays: false,
            disable_full_flush: false,
            detected: false,
            color_palette: None,
        }
    }

    /// Restores the mutable image state to post-probe defaults.
    pub(crate) fn reset_state(&mut self) {
        self.pixformat = PixFormat::Invalid;
        self.framesize = FrameSize::Invalid;
        self.window = Rect::default();
        self.framerate = 0;
        self.gainceiling = GainCeiling::default();
        self.sde = SpecialEffect::default();
        self.hmirror = false;
        self.vflip = false;
        self.transpose = false;
        self.auto_rotation = false;
    }

    /// True when the window is smaller than the frame.
    pub fn is_cropped(&self) -> bool {
        match self.framesize.dims() {
            Some((w, h)) => self.window != Rect::full(w, h),
            None => false,
        }
    }
}
