// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Image controls routed to the bound backend.
//!
//! Gain, exposure, white balance and black level calibration each come as an
//! auto/manual pair: in auto mode the backend runs its own loop and the
//! getter reports the loop's current value, in manual mode the caller's
//! value is applied as is. Values are passed through in physical units (dB,
//! microseconds) without clamping. Calls to a slot the backend does not
//! implement fail with [`SensorError::CtlUnsupported`] and leave the
//! descriptor untouched.

use crate::{
    descriptor::{GainCeiling, SpecialEffect},
    error::{Result, SensorError},
    format::PixFormat,
    sensor::Sensor,
};
use serde::Serialize;
use tracing::debug;

/// Automatic gain control setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainControl {
    /// Backend loop, optionally limited to `ceiling_db`.
    Auto { ceiling_db: Option<f32> },
    Manual { gain_db: f32 },
}

/// Automatic exposure control setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureControl {
    Auto,
    Manual { exposure_us: u32 },
}

/// Per-channel gains in dB.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RgbGain {
    pub r_db: f32,
    pub g_db: f32,
    pub b_db: f32,
}

impl RgbGain {
    fn is_finite(&self) -> bool {
        self.r_db.is_finite() && self.g_db.is_finite() && self.b_db.is_finite()
    }
}

/// Automatic white balance setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WhiteBalance {
    Auto,
    Manual(RgbGain),
}

/// Black level calibration setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlackLevel {
    Auto,
    /// Register values from a previous calibration, one per BLC register.
    Manual(Vec<i32>),
}

impl Sensor {
    pub fn set_auto_gain(&mut self, control: GainControl) -> Result<()> {
        let valid = match control {
            GainControl::Auto { ceiling_db } => ceiling_db.map_or(true, f32::is_finite),
            GainControl::Manual { gain_db } => gain_db.is_finite(),
        };
        if !valid {
            return Err(SensorError::InvalidArgument);
        }
        debug!(?control, "auto gain");
        self.with_backend(|b, ctx| b.set_auto_gain(ctx, control))
    }

    pub fn get_gain_db(&mut self) -> Result<f32> {
        self.with_backend(|b, ctx| b.get_gain_db(ctx))
    }

    pub fn set_auto_exposure(&mut self, control: ExposureControl) -> Result<()> {
        debug!(?control, "auto exposure");
        self.with_backend(|b, ctx| b.set_auto_exposure(ctx, control))
    }

    pub fn get_exposure_us(&mut self) -> Result<u32> {
        self.with_backend(|b, ctx| b.get_exposure_us(ctx))
    }

    pub fn set_auto_whitebal(&mut self, control: WhiteBalance) -> Result<()> {
        if let WhiteBalance::Manual(gain) = control {
            if !gain.is_finite() {
                return Err(SensorError::InvalidArgument);
            }
        }
        debug!(?control, "auto white balance");
        self.with_backend(|b, ctx| b.set_auto_whitebal(ctx, control))
    }

    pub fn get_rgb_gain_db(&mut self) -> Result<RgbGain> {
        self.with_backend(|b, ctx| b.get_rgb_gain_db(ctx))
    }

    /// Enables automatic black level calibration or restores a previous
    /// calibration. Manual values must cover every BLC register.
    pub fn set_auto_blc(&mut self, control: BlackLevel) -> Result<()> {
        if let BlackLevel::Manual(regs) = &control {
            if regs.len() != usize::from(self.descriptor().flags.blc_size) {
                return Err(SensorError::InvalidArgument);
            }
        }
        self.with_backend(|b, ctx| b.set_auto_blc(ctx, &control))
    }

    pub fn get_blc_regs(&mut self) -> Result<Vec<i32>> {
        self.with_backend(|b, ctx| b.get_blc_regs(ctx))
    }

    pub fn set_contrast(&mut self, level: i32) -> Result<()> {
        self.with_backend(|b, ctx| b.set_contrast(ctx, level))
    }

    pub fn set_brightness(&mut self, level: i32) -> Result<()> {
        self.with_backend(|b, ctx| b.set_brightness(ctx, level))
    }

    pub fn set_saturation(&mut self, level: i32) -> Result<()> {
        self.with_backend(|b, ctx| b.set_saturation(ctx, level))
    }

    /// Sets the AGC gain ceiling. Has no effect while gain is manual.
    pub fn set_gainceiling(&mut self, ceiling: GainCeiling) -> Result<()> {
        if self.descriptor().gainceiling == ceiling {
            return Ok(());
        }
        self.with_backend(|b, ctx| b.set_gainceiling(ctx, ceiling))?;
        self.desc.gainceiling = ceiling;
        Ok(())
    }

    /// JPEG quantization scale.
    pub fn set_quality(&mut self, quality: u8) -> Result<()> {
        self.with_backend(|b, ctx| b.set_quality(ctx, quality))
    }

    pub fn set_colorbar(&mut self, enable: bool) -> Result<()> {
        self.with_backend(|b, ctx| b.set_colorbar(ctx, enable))
    }

    pub fn set_hmirror(&mut self, enable: bool) -> Result<()> {
        if self.desc.hmirror == enable {
            return Ok(());
        }
        self.with_backend(|b, ctx| b.set_hmirror(ctx, enable))?;
        self.desc.hmirror = enable;
        Ok(())
    }

    pub fn hmirror(&self) -> bool {
        self.desc.hmirror
    }

    pub fn set_vflip(&mut self, enable: bool) -> Result<()> {
        if self.desc.vflip == enable {
            return Ok(());
        }
        self.with_backend(|b, ctx| b.set_vflip(ctx, enable))?;
        self.desc.vflip = enable;
        Ok(())
    }

    pub fn vflip(&self) -> bool {
        self.desc.vflip
    }

    /// Transposes the output image. Not available for JPEG.
    pub fn set_transpose(&mut self, enable: bool) -> Result<()> {
        if self.desc.pixformat == PixFormat::Jpeg {
            return Err(SensorError::PixformatUnsupported);
        }
        if self.desc.transpose != enable {
            self.abort(true, false)?;
            self.desc.transpose = enable;
        }
        Ok(())
    }

    pub fn transpose(&self) -> bool {
        self.desc.transpose
    }

    /// Rotates the output image to follow the device orientation. Not
    /// available for JPEG.
    pub fn set_auto_rotation(&mut self, enable: bool) -> Result<()> {
        if self.desc.pixformat == PixFormat::Jpeg {
            return Err(SensorError::PixformatUnsupported);
        }
        if self.desc.auto_rotation != enable {
            self.abort(true, false)?;
            self.desc.auto_rotation = enable;
        }
        Ok(())
    }

    pub fn auto_rotation(&self) -> bool {
        self.desc.auto_rotation
    }

    pub fn set_special_effect(&mut self, sde: SpecialEffect) -> Result<()> {
        if self.desc.sde == sde {
            return Ok(());
        }
        self.with_backend(|b, ctx| b.set_special_effect(ctx, sde))?;
        self.desc.sde = sde;
        Ok(())
    }

    pub fn set_lens_correction(&mut self, enable: bool, radi: i32, coef: i32) -> Result<()> {
        self.with_backend(|b, ctx| b.set_lens_correction(ctx, enable, radi, coef))
    }
}
