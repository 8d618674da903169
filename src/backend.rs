// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Chip backends and the family registry.
//!
//! A backend is characterized entirely by the operations it implements.
//! Every slot of [`SensorBackend`] has a default body returning
//! [`SensorError::CtlUnsupported`], so a chip driver only overrides what its
//! hardware can do and callers always get a status instead of a crash.
//!
//! Backends are bound at probe time through a [`Registry`] that maps known
//! [`SensorFamily`] descriptors (slave address, chip-id register, variant
//! ids, default hardware flags) to backend factories.

use crate::{
    bus::{RegFormat, Regs},
    capture::CaptureState,
    controls::{BlackLevel, ExposureControl, GainControl, RgbGain, WhiteBalance},
    descriptor::{CfaPattern, GainCeiling, HwFlags, Polarity, SensorDescriptor, SpecialEffect},
    error::{Result, SensorError},
    format::PixFormat,
    image::{Image, Rect},
    ioctl::{AutoFocus, IoctlRequest, IoctlResponse, RgbStats},
    resolution::FrameSize,
    sensor::SnapshotFlags,
};
use std::{thread, time::Duration};

/// View of the session handed to every backend slot.
pub struct SensorCtx<'a> {
    /// Register access to the bound chip.
    pub regs: Regs<'a>,
    desc: &'a SensorDescriptor,
    state: CaptureState,
}

impl<'a> SensorCtx<'a> {
    pub(crate) fn new(regs: Regs<'a>, desc: &'a SensorDescriptor, state: CaptureState) -> Self {
        Self { regs, desc, state }
    }

    pub fn descriptor(&self) -> &SensorDescriptor {
        self.desc
    }

    /// Capture state at the time the slot was invoked.
    pub fn capture_state(&self) -> CaptureState {
        self.state
    }

    /// Waits for sensor settling unless delays are disabled.
    pub fn settle(&self, ms: u64) {
        if !self.desc.disable_delays {
            thread::sleep(Duration::from_millis(ms));
        }
    }
}

/// Capability table of a chip backend.
#[allow(unused_variables)]
pub trait SensorBackend: Send {
    /// Short chip name for logging.
    fn name(&self) -> &'static str;

    /// Register initialization run once after chip-id detection.
    fn init(&mut self, ctx: &mut SensorCtx) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self, ctx: &mut SensorCtx) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn sleep(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn read_reg(&mut self, ctx: &mut SensorCtx, reg: u16) -> Result<u16> {
        Err(SensorError::CtlUnsupported)
    }

    fn write_reg(&mut self, ctx: &mut SensorCtx, reg: u16, value: u16) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_pixformat(&mut self, ctx: &mut SensorCtx, pixformat: PixFormat) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_framesize(&mut self, ctx: &mut SensorCtx, framesize: FrameSize) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_framerate(&mut self, ctx: &mut SensorCtx, framerate: u32) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_contrast(&mut self, ctx: &mut SensorCtx, level: i32) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_brightness(&mut self, ctx: &mut SensorCtx, level: i32) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_saturation(&mut self, ctx: &mut SensorCtx, level: i32) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_gainceiling(&mut self, ctx: &mut SensorCtx, ceiling: GainCeiling) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_quality(&mut self, ctx: &mut SensorCtx, quality: u8) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_colorbar(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_auto_gain(&mut self, ctx: &mut SensorCtx, control: GainControl) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn get_gain_db(&mut self, ctx: &mut SensorCtx) -> Result<f32> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_auto_exposure(&mut self, ctx: &mut SensorCtx, control: ExposureControl) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn get_exposure_us(&mut self, ctx: &mut SensorCtx) -> Result<u32> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_auto_whitebal(&mut self, ctx: &mut SensorCtx, control: WhiteBalance) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn get_rgb_gain_db(&mut self, ctx: &mut SensorCtx) -> Result<RgbGain> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_auto_blc(&mut self, ctx: &mut SensorCtx, control: &BlackLevel) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn get_blc_regs(&mut self, ctx: &mut SensorCtx) -> Result<Vec<i32>> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_hmirror(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_vflip(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_special_effect(&mut self, ctx: &mut SensorCtx, sde: SpecialEffect) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_lens_correction(
        &mut self,
        ctx: &mut SensorCtx,
        enable: bool,
        radi: i32,
        coef: i32,
    ) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_readout_window(&mut self, ctx: &mut SensorCtx, window: Rect) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn get_readout_window(&mut self, ctx: &mut SensorCtx) -> Result<Rect> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_triggered_mode(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn get_triggered_mode(&mut self, ctx: &mut SensorCtx) -> Result<bool> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_fov_wide(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn get_fov_wide(&mut self, ctx: &mut SensorCtx) -> Result<bool> {
        Err(SensorError::CtlUnsupported)
    }

    fn auto_focus(&mut self, ctx: &mut SensorCtx, action: AutoFocus) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn set_night_mode(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }

    fn get_night_mode(&mut self, ctx: &mut SensorCtx) -> Result<bool> {
        Err(SensorError::CtlUnsupported)
    }

    fn rgb_stats(&mut self, ctx: &mut SensorCtx) -> Result<RgbStats> {
        Err(SensorError::CtlUnsupported)
    }

    /// Generic slot for family specific requests.
    fn ioctl(&mut self, ctx: &mut SensorCtx, request: &IoctlRequest) -> Result<IoctlResponse> {
        Err(SensorError::CtlUnsupported)
    }

    /// Chip specific capture path. Backends without one leave this
    /// unsupported and the session's line-based capture is used.
    fn snapshot(&mut self, ctx: &mut SensorCtx, image: &mut Image, flags: SnapshotFlags) -> Result<()> {
        Err(SensorError::CtlUnsupported)
    }
}

/// Static description of a chip family used during probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFamily {
    pub name: &'static str,
    pub slv_addr: u8,
    /// Register holding the chip id.
    pub id_reg: u16,
    /// Register widths of the family, also used to read the id.
    pub reg_format: RegFormat,
    /// Recognized chip-id values.
    pub ids: &'static [u32],
    /// External clock frequency programmed before init.
    pub xclk_hz: u32,
    /// Hardware flag defaults.
    pub flags: HwFlags,
}

impl SensorFamily {
    pub fn recognizes(&self, chip_id: u32) -> bool {
        self.ids.contains(&chip_id)
    }
}

const MHZ: u32 = 1_000_000;

pub const OV2640: SensorFamily = SensorFamily {
    name: "OV2640",
    slv_addr: 0x60,
    id_reg: 0x0A,
    reg_format: RegFormat::A8D8,
    ids: &[0x26],
    xclk_hz: 12 * MHZ,
    flags: HwFlags {
        jpeg_mode: 3,
        ..HwFlags::DEFAULT
    },
};

pub const OV9650: SensorFamily = SensorFamily {
    name: "OV9650",
    slv_addr: 0x60,
    id_reg: 0x0A,
    reg_format: RegFormat::A8D8,
    ids: &[0x96],
    xclk_hz: 24 * MHZ,
    flags: HwFlags::DEFAULT,
};

pub const OV5640: SensorFamily = SensorFamily {
    name: "OV5640",
    slv_addr: 0x78,
    id_reg: 0x300A,
    reg_format: RegFormat::A16D8,
    ids: &[0x56],
    xclk_hz: 24 * MHZ,
    flags: HwFlags {
        vsync_pol: Polarity::ActiveLow,
        hsync_pol: Polarity::ActiveLow,
        jpeg_mode: 4,
        ..HwFlags::DEFAULT
    },
};

pub const OV7670: SensorFamily = SensorFamily {
    name: "OV7670",
    slv_addr: 0x42,
    id_reg: 0x0A,
    reg_format: RegFormat::A8D8,
    ids: &[0x76],
    xclk_hz: 24 * MHZ,
    flags: HwFlags {
        vsync_pol: Polarity::ActiveLow,
        ..HwFlags::DEFAULT
    },
};

pub const OV7725: SensorFamily = SensorFamily {
    name: "OV7725",
    slv_addr: 0x42,
    id_reg: 0x0A,
    reg_format: RegFormat::A8D8,
    ids: &[0x77],
    xclk_hz: 24 * MHZ,
    flags: HwFlags {
        vsync_pol: Polarity::ActiveLow,
        ..HwFlags::DEFAULT
    },
};

pub const MT9V0XX: SensorFamily = SensorFamily {
    name: "MT9V0XX",
    slv_addr: 0xB8,
    id_reg: 0x00,
    reg_format: RegFormat::A8D16,
    ids: &[0x1311, 0x1312, 0x1313, 0x1413, 0x1324, 0x1424],
    xclk_hz: 27 * MHZ,
    flags: HwFlags {
        mono_bpp: 1,
        ..HwFlags::DEFAULT
    },
};

pub const MT9M114: SensorFamily = SensorFamily {
    name: "MT9M114",
    slv_addr: 0x90,
    id_reg: 0x0000,
    reg_format: RegFormat::A16D16,
    ids: &[0x2481],
    xclk_hz: 24 * MHZ,
    flags: HwFlags {
        vsync_pol: Polarity::ActiveLow,
        cfa: CfaPattern::Grbg,
        ..HwFlags::DEFAULT
    },
};

pub const HIMAX: SensorFamily = SensorFamily {
    name: "HM0XX0",
    slv_addr: 0x48,
    id_reg: 0x0001,
    reg_format: RegFormat::A16D8,
    ids: &[0xB0, 0x60],
    xclk_hz: 6 * MHZ,
    flags: HwFlags {
        mono_bpp: 1,
        ..HwFlags::DEFAULT
    },
};

pub const GC2145: SensorFamily = SensorFamily {
    name: "GC2145",
    slv_addr: 0x78,
    id_reg: 0xF0,
    reg_format: RegFormat::A8D8,
    ids: &[0x21],
    xclk_hz: 12 * MHZ,
    flags: HwFlags {
        vsync_pol: Polarity::ActiveLow,
        ..HwFlags::DEFAULT
    },
};

pub const PAG79XX: SensorFamily = SensorFamily {
    name: "PAG79XX",
    slv_addr: 0x80,
    id_reg: 0x0000,
    reg_format: RegFormat::A16D16,
    ids: &[0x7920, 0x7936],
    xclk_hz: 24 * MHZ,
    flags: HwFlags {
        mono_bpp: 1,
        raw_output: true,
        ..HwFlags::DEFAULT
    },
};

/// Every family known to the probe, in probe order.
pub const FAMILIES: &[SensorFamily] = &[
    OV2640, OV9650, OV5640, OV7670, OV7725, MT9V0XX, MT9M114, HIMAX, GC2145, PAG79XX,
];

/// Builds the backend for a detected chip.
pub type BackendFactory = fn(&SensorFamily, u32) -> Box<dyn SensorBackend>;

/// Families the probe may bind, with their backend factories.
#[derive(Default, Clone)]
pub struct Registry {
    entries: Vec<(SensorFamily, BackendFactory)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a family. Families are probed in registration order.
    pub fn register(mut self, family: SensorFamily, factory: BackendFactory) -> Self {
        self.entries.push((family, factory));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn families(&self) -> impl Iterator<Item = &SensorFamily> {
        self.entries.iter().map(|(f, _)| f)
    }

    pub(crate) fn entries(&self) -> &[(SensorFamily, BackendFactory)] {
        &self.entries
    }
}
