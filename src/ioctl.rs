// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Extensible request channel.
//!
//! Requests are identified by a numeric code. Bit 8 ([`IOCTL_ABORT`]) marks
//! requests that stop in-flight capture before they run; the low bits select
//! the operation. Codes `0x00..=0x1F` form the catalogue below, higher codes
//! are vendor extensions forwarded untouched to the backend.
//!
//! Payloads are typed per request. [`IoctlRequest::decode`] turns a raw code
//! and argument list into a request, checking the argument shapes.

use crate::{
    error::{Result, SensorError},
    image::Rect,
    sensor::Sensor,
};
use serde::Serialize;
use tracing::debug;

/// Request code bit that aborts capture before dispatch.
pub const IOCTL_ABORT: u32 = 1 << 8;

/// First code of the vendor extension space.
pub const IOCTL_VENDOR_BASE: u32 = 0x20;

pub const IOCTL_SET_READOUT_WINDOW: u32 = 0x00 | IOCTL_ABORT;
pub const IOCTL_GET_READOUT_WINDOW: u32 = 0x01;
pub const IOCTL_SET_TRIGGERED_MODE: u32 = 0x02;
pub const IOCTL_GET_TRIGGERED_MODE: u32 = 0x03;
pub const IOCTL_SET_FOV_WIDE: u32 = 0x04;
pub const IOCTL_GET_FOV_WIDE: u32 = 0x05;
pub const IOCTL_TRIGGER_AUTO_FOCUS: u32 = 0x06;
pub const IOCTL_PAUSE_AUTO_FOCUS: u32 = 0x07;
pub const IOCTL_RESET_AUTO_FOCUS: u32 = 0x08;
pub const IOCTL_WAIT_ON_AUTO_FOCUS: u32 = 0x09;
pub const IOCTL_SET_NIGHT_MODE: u32 = 0x0A;
pub const IOCTL_GET_NIGHT_MODE: u32 = 0x0B;
pub const IOCTL_LEPTON_GET_WIDTH: u32 = 0x0C;
pub const IOCTL_LEPTON_GET_HEIGHT: u32 = 0x0D;
pub const IOCTL_LEPTON_GET_RADIOMETRY: u32 = 0x0E;
pub const IOCTL_LEPTON_GET_REFRESH: u32 = 0x0F;
pub const IOCTL_LEPTON_GET_RESOLUTION: u32 = 0x10;
pub const IOCTL_LEPTON_RUN_COMMAND: u32 = 0x11;
pub const IOCTL_LEPTON_SET_ATTRIBUTE: u32 = 0x12;
pub const IOCTL_LEPTON_GET_ATTRIBUTE: u32 = 0x13;
pub const IOCTL_LEPTON_GET_FPA_TEMPERATURE: u32 = 0x14;
pub const IOCTL_LEPTON_GET_AUX_TEMPERATURE: u32 = 0x15;
pub const IOCTL_LEPTON_SET_MEASUREMENT_MODE: u32 = 0x16 | IOCTL_ABORT;
pub const IOCTL_LEPTON_GET_MEASUREMENT_MODE: u32 = 0x17;
pub const IOCTL_LEPTON_SET_MEASUREMENT_RANGE: u32 = 0x18 | IOCTL_ABORT;
pub const IOCTL_LEPTON_GET_MEASUREMENT_RANGE: u32 = 0x19;
pub const IOCTL_HIMAX_MD_ENABLE: u32 = 0x1A;
pub const IOCTL_HIMAX_MD_CLEAR: u32 = 0x1B;
pub const IOCTL_HIMAX_MD_WINDOW: u32 = 0x1C | IOCTL_ABORT;
pub const IOCTL_HIMAX_MD_THRESHOLD: u32 = 0x1D;
pub const IOCTL_HIMAX_OSC_ENABLE: u32 = 0x1E | IOCTL_ABORT;
pub const IOCTL_GET_RGB_STATS: u32 = 0x1F;

/// Auto-focus actions of the built-in focus requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoFocus {
    Trigger,
    Pause,
    Reset,
    /// Block until focus settles or `timeout_ms` elapses.
    Wait { timeout_ms: u32 },
}

/// Per-channel averages of the last statistics window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RgbStats {
    pub r: u32,
    pub gb: u32,
    pub gr: u32,
    pub b: u32,
}

/// One argument of a raw request.
#[derive(Debug, Clone, PartialEq)]
pub enum IoctlArg {
    Int(i32),
    Float(f32),
    Bool(bool),
    Rect(Rect),
    Words(Vec<u16>),
}

/// Typed request.
#[derive(Debug, Clone, PartialEq)]
pub enum IoctlRequest {
    SetReadoutWindow(Rect),
    GetReadoutWindow,
    SetTriggeredMode(bool),
    GetTriggeredMode,
    SetFovWide(bool),
    GetFovWide,
    AutoFocus(AutoFocus),
    SetNightMode(bool),
    GetNightMode,
    LeptonGetWidth,
    LeptonGetHeight,
    LeptonGetRadiometry,
    LeptonGetRefresh,
    LeptonGetResolution,
    LeptonRunCommand(u16),
    LeptonSetAttribute { command: u16, data: Vec<u16> },
    LeptonGetAttribute { command: u16, words: usize },
    LeptonGetFpaTemperature,
    LeptonGetAuxTemperature,
    LeptonSetMeasurementMode { enabled: bool, high_temp: bool },
    LeptonGetMeasurementMode,
    LeptonSetMeasurementRange { min: f32, max: f32 },
    LeptonGetMeasurementRange,
    HimaxMdEnable(bool),
    HimaxMdClear,
    HimaxMdWindow(Rect),
    HimaxMdThreshold(u32),
    HimaxOscEnable(bool),
    GetRgbStats,
    /// Chip-specific request outside the catalogue.
    Vendor { code: u32, args: Vec<IoctlArg> },
}

/// Typed response.
#[derive(Debug, Clone, PartialEq)]
pub enum IoctlResponse {
    None,
    Bool(bool),
    Int(i32),
    Float(f32),
    Window(Rect),
    Range { min: f32, max: f32 },
    MeasurementMode { enabled: bool, high_temp: bool },
    Words(Vec<u16>),
    RgbStats(RgbStats),
}

fn arg_bool(args: &[IoctlArg], i: usize) -> Result<bool> {
    match args.get(i) {
        Some(IoctlArg::Bool(b)) => Ok(*b),
        Some(IoctlArg::Int(v)) => Ok(*v != 0),
        _ => Err(SensorError::InvalidArgument),
    }
}

fn arg_int(args: &[IoctlArg], i: usize) -> Result<i32> {
    match args.get(i) {
        Some(IoctlArg::Int(v)) => Ok(*v),
        _ => Err(SensorError::InvalidArgument),
    }
}

fn arg_u16(args: &[IoctlArg], i: usize) -> Result<u16> {
    u16::try_from(arg_int(args, i)?).map_err(|_| SensorError::InvalidArgument)
}

fn arg_float(args: &[IoctlArg], i: usize) -> Result<f32> {
    match args.get(i) {
        Some(IoctlArg::Float(v)) => Ok(*v),
        Some(IoctlArg::Int(v)) => Ok(*v as f32),
        _ => Err(SensorError::InvalidArgument),
    }
}

fn arg_rect(args: &[IoctlArg], i: usize) -> Result<Rect> {
    match args.get(i) {
        Some(IoctlArg::Rect(r)) => Ok(*r),
        _ => Err(SensorError::InvalidArgument),
    }
}

fn arg_words(args: &[IoctlArg], i: usize) -> Result<Vec<u16>> {
    match args.get(i) {
        Some(IoctlArg::Words(w)) => Ok(w.clone()),
        _ => Err(SensorError::InvalidArgument),
    }
}

fn no_args(args: &[IoctlArg]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(SensorError::InvalidArgument)
    }
}

fn exact(args: &[IoctlArg], n: usize) -> Result<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(SensorError::InvalidArgument)
    }
}

impl IoctlRequest {
    /// Numeric request code, including the abort bit.
    pub fn code(&self) -> u32 {
        match self {
            IoctlRequest::SetReadoutWindow(_) => IOCTL_SET_READOUT_WINDOW,
            IoctlRequest::GetReadoutWindow => IOCTL_GET_READOUT_WINDOW,
            IoctlRequest::SetTriggeredMode(_) => IOCTL_SET_TRIGGERED_MODE,
            IoctlRequest::GetTriggeredMode => IOCTL_GET_TRIGGERED_MODE,
            IoctlRequest::SetFovWide(_) => IOCTL_SET_FOV_WIDE,
            IoctlRequest::GetFovWide => IOCTL_GET_FOV_WIDE,
            IoctlRequest::AutoFocus(AutoFocus::Trigger) => IOCTL_TRIGGER_AUTO_FOCUS,
            IoctlRequest::AutoFocus(AutoFocus::Pause) => IOCTL_PAUSE_AUTO_FOCUS,
            IoctlRequest::AutoFocus(AutoFocus::Reset) => IOCTL_RESET_AUTO_FOCUS,
            IoctlRequest::AutoFocus(AutoFocus::Wait { .. }) => IOCTL_WAIT_ON_AUTO_FOCUS,
            IoctlRequest::SetNightMode(_) => IOCTL_SET_NIGHT_MODE,
            IoctlRequest::GetNightMode => IOCTL_GET_NIGHT_MODE,
            IoctlRequest::LeptonGetWidth => IOCTL_LEPTON_GET_WIDTH,
            IoctlRequest::LeptonGetHeight => IOCTL_LEPTON_GET_HEIGHT,
            IoctlRequest::LeptonGetRadiometry => IOCTL_LEPTON_GET_RADIOMETRY,
            IoctlRequest::LeptonGetRefresh => IOCTL_LEPTON_GET_REFRESH,
            IoctlRequest::LeptonGetResolution => IOCTL_LEPTON_GET_RESOLUTION,
            IoctlRequest::LeptonRunCommand(_) => IOCTL_LEPTON_RUN_COMMAND,
            IoctlRequest::LeptonSetAttribute { .. } => IOCTL_LEPTON_SET_ATTRIBUTE,
            IoctlRequest::LeptonGetAttribute { .. } => IOCTL_LEPTON_GET_ATTRIBUTE,
            IoctlRequest::LeptonGetFpaTemperature => IOCTL_LEPTON_GET_FPA_TEMPERATURE,
            IoctlRequest::LeptonGetAuxTemperature => IOCTL_LEPTON_GET_AUX_TEMPERATURE,
            IoctlRequest::LeptonSetMeasurementMode { .. } => IOCTL_LEPTON_SET_MEASUREMENT_MODE,
            IoctlRequest::LeptonGetMeasurementMode => IOCTL_LEPTON_GET_MEASUREMENT_MODE,
            IoctlRequest::LeptonSetMeasurementRange { .. } => IOCTL_LEPTON_SET_MEASUREMENT_RANGE,
            IoctlRequest::LeptonGetMeasurementRange => IOCTL_LEPTON_GET_MEASUREMENT_RANGE,
            IoctlRequest::HimaxMdEnable(_) => IOCTL_HIMAX_MD_ENABLE,
            IoctlRequest::HimaxMdClear => IOCTL_HIMAX_MD_CLEAR,
            IoctlRequest::HimaxMdWindow(_) => IOCTL_HIMAX_MD_WINDOW,
            IoctlRequest::HimaxMdThreshold(_) => IOCTL_HIMAX_MD_THRESHOLD,
            IoctlRequest::HimaxOscEnable(_) => IOCTL_HIMAX_OSC_ENABLE,
            IoctlRequest::GetRgbStats => IOCTL_GET_RGB_STATS,
            IoctlRequest::Vendor { code, .. } => *code,
        }
    }

    /// True when capture must be aborted before this request runs.
    pub fn aborts_capture(&self) -> bool {
        self.code() & IOCTL_ABORT != 0
    }

    /// Builds a request from a raw code and argument list.
    ///
    /// Catalogue codes with a mismatched abort bit are rejected as
    /// unsupported, argument lists of the wrong shape as invalid.
    pub fn decode(code: u32, args: &[IoctlArg]) -> Result<Self> {
        let req = match code {
            IOCTL_SET_READOUT_WINDOW => {
                exact(args, 1)?;
                IoctlRequest::SetReadoutWindow(arg_rect(args, 0)?)
            }
            IOCTL_GET_READOUT_WINDOW => no_args(args).map(|_| IoctlRequest::GetReadoutWindow)?,
            IOCTL_SET_TRIGGERED_MODE => {
                exact(args, 1)?;
                IoctlRequest::SetTriggeredMode(arg_bool(args, 0)?)
            }
            IOCTL_GET_TRIGGERED_MODE => no_args(args).map(|_| IoctlRequest::GetTriggeredMode)?,
            IOCTL_SET_FOV_WIDE => {
                exact(args, 1)?;
                IoctlRequest::SetFovWide(arg_bool(args, 0)?)
            }
            IOCTL_GET_FOV_WIDE => no_args(args).map(|_| IoctlRequest::GetFovWide)?,
            IOCTL_TRIGGER_AUTO_FOCUS => {
                no_args(args).map(|_| IoctlRequest::AutoFocus(AutoFocus::Trigger))?
            }
            IOCTL_PAUSE_AUTO_FOCUS => {
                no_args(args).map(|_| IoctlRequest::AutoFocus(AutoFocus::Pause))?
            }
            IOCTL_RESET_AUTO_FOCUS => {
                no_args(args).map(|_| IoctlRequest::AutoFocus(AutoFocus::Reset))?
            }
            IOCTL_WAIT_ON_AUTO_FOCUS => {
                exact(args, 1)?;
                let timeout_ms =
                    u32::try_from(arg_int(args, 0)?).map_err(|_| SensorError::InvalidArgument)?;
                IoctlRequest::AutoFocus(AutoFocus::Wait { timeout_ms })
            }
            IOCTL_SET_NIGHT_MODE => {
                exact(args, 1)?;
                IoctlRequest::SetNightMode(arg_bool(args, 0)?)
            }
            IOCTL_GET_NIGHT_MODE => no_args(args).map(|_| IoctlRequest::GetNightMode)?,
            IOCTL_LEPTON_GET_WIDTH => no_args(args).map(|_| IoctlRequest::LeptonGetWidth)?,
            IOCTL_LEPTON_GET_HEIGHT => no_args(args).map(|_| IoctlRequest::LeptonGetHeight)?,
            IOCTL_LEPTON_GET_RADIOMETRY => {
                no_args(args).map(|_| IoctlRequest::LeptonGetRadiometry)?
            }
            IOCTL_LEPTON_GET_REFRESH => no_args(args).map(|_| IoctlRequest::LeptonGetRefresh)?,
            IOCTL_LEPTON_GET_RESOLUTION => {
                no_args(args).map(|_| IoctlRequest::LeptonGetResolution)?
            }
            IOCTL_LEPTON_RUN_COMMAND => {
                exact(args, 1)?;
                IoctlRequest::LeptonRunCommand(arg_u16(args, 0)?)
            }
            IOCTL_LEPTON_SET_ATTRIBUTE => {
                exact(args, 2)?;
                IoctlRequest::LeptonSetAttribute {
                    command: arg_u16(args, 0)?,
                    data: arg_words(args, 1)?,
                }
            }
            IOCTL_LEPTON_GET_ATTRIBUTE => {
                exact(args, 2)?;
                let words =
                    usize::try_from(arg_int(args, 1)?).map_err(|_| SensorError::InvalidArgument)?;
                IoctlRequest::LeptonGetAttribute {
                    command: arg_u16(args, 0)?,
                    words,
                }
            }
            IOCTL_LEPTON_GET_FPA_TEMPERATURE => {
                no_args(args).map(|_| IoctlRequest::LeptonGetFpaTemperature)?
            }
            IOCTL_LEPTON_GET_AUX_TEMPERATURE => {
                no_args(args).map(|_| IoctlRequest::LeptonGetAuxTemperature)?
            }
            IOCTL_LEPTON_SET_MEASUREMENT_MODE => {
                exact(args, 2)?;
                IoctlRequest::LeptonSetMeasurementMode {
                    enabled: arg_bool(args, 0)?,
                    high_temp: arg_bool(args, 1)?,
                }
            }
            IOCTL_LEPTON_GET_MEASUREMENT_MODE => {
                no_args(args).map(|_| IoctlRequest::LeptonGetMeasurementMode)?
            }
            IOCTL_LEPTON_SET_MEASUREMENT_RANGE => {
                exact(args, 2)?;
                IoctlRequest::LeptonSetMeasurementRange {
                    min: arg_float(args, 0)?,
                    max: arg_float(args, 1)?,
                }
            }
            IOCTL_LEPTON_GET_MEASUREMENT_RANGE => {
                no_args(args).map(|_| IoctlRequest::LeptonGetMeasurementRange)?
            }
            IOCTL_HIMAX_MD_ENABLE => {
                exact(args, 1)?;
                IoctlRequest::HimaxMdEnable(arg_bool(args, 0)?)
            }
            IOCTL_HIMAX_MD_CLEAR => no_args(args).map(|_| IoctlRequest::HimaxMdClear)?,
            IOCTL_HIMAX_MD_WINDOW => {
                exact(args, 1)?;
                IoctlRequest::HimaxMdWindow(arg_rect(args, 0)?)
            }
            IOCTL_HIMAX_MD_THRESHOLD => {
                exact(args, 1)?;
                let threshold =
                    u32::try_from(arg_int(args, 0)?).map_err(|_| SensorError::InvalidArgument)?;
                IoctlRequest::HimaxMdThreshold(threshold)
            }
            IOCTL_HIMAX_OSC_ENABLE => {
                exact(args, 1)?;
                IoctlRequest::HimaxOscEnable(arg_bool(args, 0)?)
            }
            IOCTL_GET_RGB_STATS => no_args(args).map(|_| IoctlRequest::GetRgbStats)?,
            code if code & !IOCTL_ABORT >= IOCTL_VENDOR_BASE => IoctlRequest::Vendor {
                code,
                args: args.to_vec(),
            },
            _ => return Err(SensorError::CtlUnsupported),
        };
        Ok(req)
    }

    /// Checks payload values that the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        match self {
            IoctlRequest::SetReadoutWindow(r) | IoctlRequest::HimaxMdWindow(r)
                if r.is_empty() =>
            {
                Err(SensorError::InvalidArgument)
            }
            IoctlRequest::LeptonSetMeasurementRange { min, max }
                if !(min.is_finite() && max.is_finite() && min < max) =>
            {
                Err(SensorError::InvalidArgument)
            }
            IoctlRequest::LeptonSetAttribute { data, .. } if data.is_empty() => {
                Err(SensorError::InvalidArgument)
            }
            IoctlRequest::LeptonGetAttribute { words, .. } if *words == 0 => {
                Err(SensorError::InvalidArgument)
            }
            IoctlRequest::Vendor { code, .. } if code & !IOCTL_ABORT < IOCTL_VENDOR_BASE => {
                Err(SensorError::CtlUnsupported)
            }
            _ => Ok(()),
        }
    }
}

impl Sensor {
    /// Dispatches a typed request.
    ///
    /// Requests carrying the abort bit stop any in-flight capture first.
    /// Catalogue requests with a dedicated capability slot go to that slot,
    /// everything else goes to the backend's generic `ioctl` slot.
    pub fn ioctl(&mut self, request: IoctlRequest) -> Result<IoctlResponse> {
        request.validate()?;
        if request.aborts_capture() {
            self.abort(true, false)?;
        }
        debug!(code = format_args!("{:#05x}", request.code()), "ioctl");

        match request {
            IoctlRequest::SetReadoutWindow(r) => self
                .with_backend(|b, ctx| b.set_readout_window(ctx, r))
                .map(|_| IoctlResponse::None),
            IoctlRequest::GetReadoutWindow => self
                .with_backend(|b, ctx| b.get_readout_window(ctx))
                .map(IoctlResponse::Window),
            IoctlRequest::SetTriggeredMode(on) => self
                .with_backend(|b, ctx| b.set_triggered_mode(ctx, on))
                .map(|_| IoctlResponse::None),
            IoctlRequest::GetTriggeredMode => self
                .with_backend(|b, ctx| b.get_triggered_mode(ctx))
                .map(IoctlResponse::Bool),
            IoctlRequest::SetFovWide(on) => self
                .with_backend(|b, ctx| b.set_fov_wide(ctx, on))
                .map(|_| IoctlResponse::None),
            IoctlRequest::GetFovWide => self
                .with_backend(|b, ctx| b.get_fov_wide(ctx))
                .map(IoctlResponse::Bool),
            IoctlRequest::AutoFocus(action) => self
                .with_backend(|b, ctx| b.auto_focus(ctx, action))
                .map(|_| IoctlResponse::None),
            IoctlRequest::SetNightMode(on) => self
                .with_backend(|b, ctx| b.set_night_mode(ctx, on))
                .map(|_| IoctlResponse::None),
            IoctlRequest::GetNightMode => self
                .with_backend(|b, ctx| b.get_night_mode(ctx))
                .map(IoctlResponse::Bool),
            IoctlRequest::GetRgbStats => self
                .with_backend(|b, ctx| b.rgb_stats(ctx))
                .map(IoctlResponse::RgbStats),
            other => self.with_backend(|b, ctx| b.ioctl(ctx, &other)),
        }
    }

    /// Decodes a raw request code and argument list, then dispatches it.
    pub fn ioctl_raw(&mut self, code: u32, args: &[IoctlArg]) -> Result<IoctlResponse> {
        let request = IoctlRequest::decode(code, args)?;
        self.ioctl(request)
    }
}
