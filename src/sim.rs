// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Simulated hardware.
//!
//! [`SimBus`] holds register maps for any number of chips, [`SimCapture`]
//! plays scripted or generated frames through the capture interface, and
//! [`SimBackend`] is a register-backed backend implementing every slot.
//! Together they allow a full session to run without a camera attached.
//!
//! ```
//! use edgefirst_sensor::{
//!     backend::OV2640,
//!     bus::BusSpeed,
//!     sensor::Sensor,
//!     sim::{self, SimBus, SimCapture},
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sensor = Sensor::builder()
//!     .with_bus(SimBus::new().with_chip(&OV2640, 0x26))
//!     .with_hardware(Arc::new(SimCapture::new()))
//!     .with_registry(sim::registry())
//!     .probe(0, BusSpeed::Standard)?;
//! assert_eq!(sensor.get_id(), 0x26);
//! # Ok(())
//! # }
//! ```

use crate::{
    backend::{Registry, SensorBackend, SensorCtx, SensorFamily, FAMILIES},
    bus::{BusSpeed, RegFormat, SccbBus},
    capture::{CaptureHardware, CaptureTiming},
    controls::{BlackLevel, ExposureControl, GainControl, RgbGain, WhiteBalance},
    descriptor::{GainCeiling, HwFlags, Polarity, SpecialEffect},
    error::{Result, SensorError},
    format::PixFormat,
    image::Rect,
    ioctl::{AutoFocus, IoctlRequest, IoctlResponse, RgbStats},
    resolution::FrameSize,
};
use spin::Mutex;
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::trace;

#[derive(Default)]
struct BusState {
    chips: BTreeMap<u8, HashMap<u16, u16>>,
    silent_scans: u32,
    fail_io: bool,
    speed: Option<BusSpeed>,
}

/// Simulated SCCB bus. Clones share the same chips.
#[derive(Clone, Default)]
pub struct SimBus {
    state: Arc<Mutex<BusState>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chip of `family` reporting `chip_id`.
    pub fn with_chip(self, family: &SensorFamily, chip_id: u32) -> Self {
        self.state
            .lock()
            .chips
            .entry(family.slv_addr)
            .or_default()
            .insert(family.id_reg, chip_id as u16);
        self
    }

    pub fn with_reg(self, slv_addr: u8, reg: u16, value: u16) -> Self {
        self.state
            .lock()
            .chips
            .entry(slv_addr)
            .or_default()
            .insert(reg, value);
        self
    }

    /// The first `scans` scans find nothing, like a chip held in reset.
    pub fn silent_for(self, scans: u32) -> Self {
        self.state.lock().silent_scans = scans;
        self
    }

    /// Makes every transfer fail with [`SensorError::IoError`].
    pub fn set_fail_io(&self, fail: bool) {
        self.state.lock().fail_io = fail;
    }

    pub fn reg(&self, slv_addr: u8, reg: u16) -> Option<u16> {
        self.state
            .lock()
            .chips
            .get(&slv_addr)
            .and_then(|regs| regs.get(&reg).copied())
    }

    /// Speed passed to the last `init`.
    pub fn speed(&self) -> Option<BusSpeed> {
        self.state.lock().speed
    }
}

impl SccbBus for SimBus {
    fn init(&mut self, _bus_id: u32, speed: BusSpeed) -> Result<()> {
        self.state.lock().speed = Some(speed);
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        if state.fail_io {
            return Err(SensorError::IoError);
        }
        if state.silent_scans > 0 {
            state.silent_scans -= 1;
            return Ok(Vec::new());
        }
        Ok(state.chips.keys().copied().collect())
    }

    fn read_reg(&mut self, slv_addr: u8, reg: u16, format: RegFormat) -> Result<u16> {
        let state = self.state.lock();
        if state.fail_io {
            return Err(SensorError::IoError);
        }
        let regs = state.chips.get(&slv_addr).ok_or(SensorError::IoError)?;
        let value = regs.get(&reg).copied().unwrap_or(0);
        Ok(if format.data16() { value } else { value & 0xFF })
    }

    fn write_reg(&mut self, slv_addr: u8, reg: u16, value: u16, _format: RegFormat) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_io {
            return Err(SensorError::IoError);
        }
        let regs = state.chips.get_mut(&slv_addr).ok_or(SensorError::IoError)?;
        regs.insert(reg, value);
        Ok(())
    }
}

/// Calls made on a [`SimCapture`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Init,
    Configure,
    Start,
    Stop,
    DisableIrqs,
    EnableIrqs,
    PowerCycle { reset_pol: Polarity, power_pol: Polarity },
    PowerDown(bool),
    Xclk(u32),
}

type LineHook = Box<dyn FnMut(u32) + Send>;

struct CaptureSim {
    timing: Option<CaptureTiming>,
    running: bool,
    frames: VecDeque<Vec<u8>>,
    pattern: bool,
    frame_no: u32,
    interval_ms: u32,
    jpeg_len: Option<usize>,
    current: Option<Vec<u8>>,
    offset: usize,
    line_no: u32,
    xclk_hz: u32,
    fail_init: Option<SensorError>,
    fail_configure: Option<SensorError>,
    fail_xclk: bool,
    fail_line: Option<u32>,
    events: Vec<SimEvent>,
}

/// Simulated capture peripheral.
///
/// Frames are taken from the script queue first, then generated from a
/// test pattern unless patterns are disabled. Every frame start advances
/// the tick counter by the frame interval.
pub struct SimCapture {
    state: Mutex<CaptureSim>,
    hook: Mutex<Option<LineHook>>,
    irqs: AtomicBool,
    ticks: AtomicU32,
}

impl Default for SimCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCapture {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CaptureSim {
                timing: None,
                running: false,
                frames: VecDeque::new(),
                pattern: true,
                frame_no: 0,
                interval_ms: 10,
                jpeg_len: None,
                current: None,
                offset: 0,
                line_no: 0,
                xclk_hz: 0,
                fail_init: None,
                fail_configure: None,
                fail_xclk: false,
                fail_line: None,
                events: Vec::new(),
            }),
            hook: Mutex::new(None),
            irqs: AtomicBool::new(false),
            ticks: AtomicU32::new(0),
        }
    }

    /// Queues one raw frame, full frame width, as the sensor sends it.
    pub fn push_frame(&self, bytes: Vec<u8>) {
        self.state.lock().frames.push_back(bytes);
    }

    /// With patterns disabled, frame starts stop once the script is empty.
    pub fn set_pattern(&self, enable: bool) {
        self.state.lock().pattern = enable;
    }

    pub fn set_interval_ms(&self, ms: u32) {
        self.state.lock().interval_ms = ms;
    }

    /// Size of generated JPEG frames.
    pub fn set_jpeg_len(&self, len: Option<usize>) {
        self.state.lock().jpeg_len = len;
    }

    pub fn set_ticks(&self, ms: u32) {
        self.ticks.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u32) {
        self.ticks.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn fail_init(&self, err: Option<SensorError>) {
        self.state.lock().fail_init = err;
    }

    pub fn fail_configure(&self, err: Option<SensorError>) {
        self.state.lock().fail_configure = err;
    }

    pub fn fail_xclk(&self, fail: bool) {
        self.state.lock().fail_xclk = fail;
    }

    /// Fails the transfer of line `line` of every frame.
    pub fn fail_line(&self, line: Option<u32>) {
        self.state.lock().fail_line = line;
    }

    /// Runs `hook` after each line is delivered, with the line number.
    pub fn on_line(&self, hook: impl FnMut(u32) + Send + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.state.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    pub fn irqs_enabled(&self) -> bool {
        self.irqs.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn timing(&self) -> Option<CaptureTiming> {
        self.state.lock().timing
    }

    fn run_hook(&self, line: u32) {
        let mut hook = self.hook.lock().take();
        if let Some(hook) = hook.as_mut() {
            hook(line);
        }
        if let Some(hook) = hook {
            let mut slot = self.hook.lock();
            if slot.is_none() {
                *slot = Some(hook);
            }
        }
    }
}

/// Generates a frame whose bytes depend on position and frame number.
fn pattern_frame(timing: &CaptureTiming, frame_no: u32, jpeg_len: Option<usize>) -> Vec<u8> {
    if timing.pixformat == PixFormat::Jpeg {
        let len = jpeg_len.unwrap_or(timing.window.area() / 8).max(4);
        let mut data = vec![frame_no as u8; len];
        data[..2].copy_from_slice(&[0xFF, 0xD8]);
        data[len - 2..].copy_from_slice(&[0xFF, 0xD9]);
        return data;
    }
    let stride = timing.src_line_bytes();
    (0..timing.frame_height)
        .flat_map(|y| (0..stride).map(move |x| (x as u32).wrapping_add(y).wrapping_add(frame_no) as u8))
        .collect()
}

impl CaptureHardware for SimCapture {
    fn init(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.events.push(SimEvent::Init);
        match state.fail_init {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn configure(&self, timing: &CaptureTiming) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_configure {
            return Err(err);
        }
        state.timing = Some(*timing);
        state.events.push(SimEvent::Configure);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.timing.is_none() {
            return Err(SensorError::CaptureFailed);
        }
        state.running = true;
        state.events.push(SimEvent::Start);
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.current = None;
        state.events.push(SimEvent::Stop);
    }

    fn disable_irqs(&self) {
        self.irqs.store(false, Ordering::SeqCst);
        self.state.lock().events.push(SimEvent::DisableIrqs);
    }

    fn enable_irqs(&self) {
        self.irqs.store(true, Ordering::SeqCst);
        self.state.lock().events.push(SimEvent::EnableIrqs);
    }

    fn wait_frame_start(&self, _timeout: Duration) -> bool {
        let mut state = self.state.lock();
        let Some(timing) = state.timing.filter(|_| state.running) else {
            return false;
        };
        let frame = match state.frames.pop_front() {
            Some(frame) => frame,
            None if state.pattern => pattern_frame(&timing, state.frame_no, state.jpeg_len),
            None => return false,
        };
        state.frame_no = state.frame_no.wrapping_add(1);
        state.current = Some(frame);
        state.offset = 0;
        state.line_no = 0;
        self.ticks.fetch_add(state.interval_ms, Ordering::SeqCst);
        trace!(frame = state.frame_no, "sim frame start");
        true
    }

    fn read_line(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        let (line, n) = {
            let mut state = self.state.lock();
            let state = &mut *state;
            let (Some(timing), Some(frame)) = (state.timing, state.current.as_ref()) else {
                return Ok(None);
            };
            if !state.running || state.offset >= frame.len() {
                state.current = None;
                return Ok(None);
            }
            if state.fail_line == Some(state.line_no) {
                return Err(SensorError::IoError);
            }
            let chunk = match timing.pixformat {
                PixFormat::Jpeg => timing.frame_width as usize,
                _ => timing.src_line_bytes(),
            };
            let n = chunk.min(frame.len() - state.offset).min(buf.len());
            buf[..n].copy_from_slice(&frame[state.offset..state.offset + n]);
            state.offset += n;
            state.line_no += 1;
            (state.line_no - 1, n)
        };
        self.run_hook(line);
        Ok(Some(n))
    }

    fn ticks_ms(&self) -> u32 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn set_xclk_frequency(&self, hz: u32) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_xclk {
            return Err(SensorError::TimInitFailed);
        }
        state.xclk_hz = hz;
        state.events.push(SimEvent::Xclk(hz));
        Ok(())
    }

    fn xclk_frequency(&self) -> u32 {
        self.state.lock().xclk_hz
    }

    fn power_cycle(&self, flags: &HwFlags) {
        self.state.lock().events.push(SimEvent::PowerCycle {
            reset_pol: flags.reset_pol,
            power_pol: flags.power_pol,
        });
    }

    fn set_power_down(&self, asserted: bool, _pol: Polarity) {
        self.state.lock().events.push(SimEvent::PowerDown(asserted));
    }
}

const REG_RESET: u16 = 0x12;
const REG_FORMAT: u16 = 0x40;
const REG_FRAMESIZE: u16 = 0x41;
const REG_MIRROR: u16 = 0x42;
const REG_SLEEP: u16 = 0x43;
const REG_COLORBAR: u16 = 0x44;
const REG_QUALITY: u16 = 0x45;

/// Register-backed backend implementing every slot.
///
/// Format, frame size, mirroring, sleep, color bar and JPEG quality are
/// written to chip registers. Everything else is kept in memory, with the
/// auto loops reporting fixed values.
pub struct SimBackend {
    family: &'static str,
    chip_id: u32,
    framerate: u32,
    levels: [i32; 3],
    gainceiling: GainCeiling,
    gain: GainControl,
    exposure: ExposureControl,
    whitebal: WhiteBalance,
    blc: BlackLevel,
    sde: SpecialEffect,
    lens: (bool, i32, i32),
    readout: Option<Rect>,
    triggered: bool,
    fov_wide: bool,
    night: bool,
    focusing: bool,
    attributes: HashMap<u16, Vec<u16>>,
    measurement: (bool, bool),
    range: (f32, f32),
    md_enabled: bool,
    md_window: Rect,
    md_threshold: u32,
    osc: bool,
}

impl SimBackend {
    pub fn new(family: &'static str, chip_id: u32) -> Self {
        Self {
            family,
            chip_id,
            framerate: 0,
            levels: [0; 3],
            gainceiling: GainCeiling::default(),
            gain: GainControl::Auto { ceiling_db: None },
            exposure: ExposureControl::Auto,
            whitebal: WhiteBalance::Auto,
            blc: BlackLevel::Auto,
            sde: SpecialEffect::default(),
            lens: (false, 0, 0),
            readout: None,
            triggered: false,
            fov_wide: false,
            night: false,
            focusing: false,
            attributes: HashMap::new(),
            measurement: (false, false),
            range: (-10.0, 140.0),
            md_enabled: false,
            md_window: Rect::default(),
            md_threshold: 0,
            osc: false,
        }
    }

    pub fn chip_id(&self) -> u32 {
        self.chip_id
    }

    pub fn family(&self) -> &'static str {
        self.family
    }
}

fn format_code(pixformat: PixFormat) -> u16 {
    match pixformat {
        PixFormat::Invalid => 0,
        PixFormat::Grayscale => 1,
        PixFormat::Rgb565 => 2,
        PixFormat::Bayer => 3,
        PixFormat::Yuv422 => 4,
        PixFormat::Jpeg => 5,
    }
}

impl SensorBackend for SimBackend {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn init(&mut self, ctx: &mut SensorCtx) -> Result<()> {
        ctx.regs.write(REG_RESET, 0x80)?;
        ctx.settle(2);
        ctx.regs.write(REG_RESET, 0x00)
    }

    fn reset(&mut self, ctx: &mut SensorCtx) -> Result<()> {
        *self = SimBackend::new(self.family, self.chip_id);
        self.init(ctx)
    }

    fn sleep(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        ctx.regs.write(REG_SLEEP, u16::from(enable))
    }

    fn read_reg(&mut self, ctx: &mut SensorCtx, reg: u16) -> Result<u16> {
        ctx.regs.read(reg)
    }

    fn write_reg(&mut self, ctx: &mut SensorCtx, reg: u16, value: u16) -> Result<()> {
        ctx.regs.write(reg, value)
    }

    fn set_pixformat(&mut self, ctx: &mut SensorCtx, pixformat: PixFormat) -> Result<()> {
        ctx.regs.write(REG_FORMAT, format_code(pixformat))
    }

    fn set_framesize(&mut self, ctx: &mut SensorCtx, framesize: FrameSize) -> Result<()> {
        ctx.regs.write(REG_FRAMESIZE, framesize as u16)
    }

    fn set_framerate(&mut self, _ctx: &mut SensorCtx, framerate: u32) -> Result<()> {
        self.framerate = framerate;
        Ok(())
    }

    fn set_contrast(&mut self, _ctx: &mut SensorCtx, level: i32) -> Result<()> {
        self.levels[0] = level;
        Ok(())
    }

    fn set_brightness(&mut self, _ctx: &mut SensorCtx, level: i32) -> Result<()> {
        self.levels[1] = level;
        Ok(())
    }

    fn set_saturation(&mut self, _ctx: &mut SensorCtx, level: i32) -> Result<()> {
        self.levels[2] = level;
        Ok(())
    }

    fn set_gainceiling(&mut self, _ctx: &mut SensorCtx, ceiling: GainCeiling) -> Result<()> {
        self.gainceiling = ceiling;
        Ok(())
    }

    fn set_quality(&mut self, ctx: &mut SensorCtx, quality: u8) -> Result<()> {
        ctx.regs.write(REG_QUALITY, u16::from(quality))
    }

    fn set_colorbar(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        ctx.regs.write(REG_COLORBAR, u16::from(enable))
    }

    fn set_auto_gain(&mut self, _ctx: &mut SensorCtx, control: GainControl) -> Result<()> {
        self.gain = control;
        Ok(())
    }

    fn get_gain_db(&mut self, _ctx: &mut SensorCtx) -> Result<f32> {
        Ok(match self.gain {
            GainControl::Auto { ceiling_db } => ceiling_db.map_or(6.0, |c| c.min(6.0)),
            GainControl::Manual { gain_db } => gain_db,
        })
    }

    fn set_auto_exposure(&mut self, _ctx: &mut SensorCtx, control: ExposureControl) -> Result<()> {
        self.exposure = control;
        Ok(())
    }

    fn get_exposure_us(&mut self, _ctx: &mut SensorCtx) -> Result<u32> {
        Ok(match self.exposure {
            ExposureControl::Auto => 10_000,
            ExposureControl::Manual { exposure_us } => exposure_us,
        })
    }

    fn set_auto_whitebal(&mut self, _ctx: &mut SensorCtx, control: WhiteBalance) -> Result<()> {
        self.whitebal = control;
        Ok(())
    }

    fn get_rgb_gain_db(&mut self, _ctx: &mut SensorCtx) -> Result<RgbGain> {
        Ok(match self.whitebal {
            WhiteBalance::Auto => RgbGain {
                r_db: 1.5,
                g_db: 0.0,
                b_db: 2.0,
            },
            WhiteBalance::Manual(gain) => gain,
        })
    }

    fn set_auto_blc(&mut self, ctx: &mut SensorCtx, control: &BlackLevel) -> Result<()> {
        if ctx.descriptor().flags.blc_size == 0 {
            return Err(SensorError::CtlUnsupported);
        }
        self.blc = control.clone();
        Ok(())
    }

    fn get_blc_regs(&mut self, ctx: &mut SensorCtx) -> Result<Vec<i32>> {
        let size = usize::from(ctx.descriptor().flags.blc_size);
        if size == 0 {
            return Err(SensorError::CtlUnsupported);
        }
        Ok(match &self.blc {
            BlackLevel::Auto => vec![16; size],
            BlackLevel::Manual(regs) => regs.clone(),
        })
    }

    fn set_hmirror(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        ctx.regs.modify(REG_MIRROR, 0x01, u16::from(enable))
    }

    fn set_vflip(&mut self, ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        ctx.regs.modify(REG_MIRROR, 0x02, u16::from(enable) << 1)
    }

    fn set_special_effect(&mut self, _ctx: &mut SensorCtx, sde: SpecialEffect) -> Result<()> {
        self.sde = sde;
        Ok(())
    }

    fn set_lens_correction(&mut self, _ctx: &mut SensorCtx, enable: bool, radi: i32, coef: i32) -> Result<()> {
        self.lens = (enable, radi, coef);
        Ok(())
    }

    fn set_readout_window(&mut self, ctx: &mut SensorCtx, window: Rect) -> Result<()> {
        self.readout = Some(window);
        trace!(state = ?ctx.capture_state(), %window, "readout window");
        Ok(())
    }

    fn get_readout_window(&mut self, ctx: &mut SensorCtx) -> Result<Rect> {
        let desc = ctx.descriptor();
        Ok(self
            .readout
            .unwrap_or_else(|| Rect::full(desc.framesize.width(), desc.framesize.height())))
    }

    fn set_triggered_mode(&mut self, _ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        self.triggered = enable;
        Ok(())
    }

    fn get_triggered_mode(&mut self, _ctx: &mut SensorCtx) -> Result<bool> {
        Ok(self.triggered)
    }

    fn set_fov_wide(&mut self, _ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        self.fov_wide = enable;
        Ok(())
    }

    fn get_fov_wide(&mut self, _ctx: &mut SensorCtx) -> Result<bool> {
        Ok(self.fov_wide)
    }

    fn auto_focus(&mut self, _ctx: &mut SensorCtx, action: AutoFocus) -> Result<()> {
        match action {
            AutoFocus::Trigger => self.focusing = true,
            AutoFocus::Pause | AutoFocus::Reset => self.focusing = false,
            AutoFocus::Wait { .. } => self.focusing = false,
        }
        Ok(())
    }

    fn set_night_mode(&mut self, _ctx: &mut SensorCtx, enable: bool) -> Result<()> {
        self.night = enable;
        Ok(())
    }

    fn get_night_mode(&mut self, _ctx: &mut SensorCtx) -> Result<bool> {
        Ok(self.night)
    }

    fn rgb_stats(&mut self, _ctx: &mut SensorCtx) -> Result<RgbStats> {
        Ok(RgbStats {
            r: 128,
            gb: 120,
            gr: 121,
            b: 96,
        })
    }

    fn ioctl(&mut self, _ctx: &mut SensorCtx, request: &IoctlRequest) -> Result<IoctlResponse> {
        let response = match request {
            IoctlRequest::LeptonGetWidth => IoctlResponse::Int(80),
            IoctlRequest::LeptonGetHeight => IoctlResponse::Int(60),
            IoctlRequest::LeptonGetRadiometry => IoctlResponse::Bool(true),
            IoctlRequest::LeptonGetRefresh => IoctlResponse::Int(27),
            IoctlRequest::LeptonGetResolution => IoctlResponse::Int(14),
            IoctlRequest::LeptonRunCommand(_) => IoctlResponse::None,
            IoctlRequest::LeptonSetAttribute { command, data } => {
                self.attributes.insert(*command, data.clone());
                IoctlResponse::None
            }
            IoctlRequest::LeptonGetAttribute { command, words } => {
                let data = self.attributes.get(command).ok_or(SensorError::CtlFailed)?;
                let mut data = data.clone();
                data.resize(*words, 0);
                IoctlResponse::Words(data)
            }
            IoctlRequest::LeptonGetFpaTemperature => IoctlResponse::Float(30.5),
            IoctlRequest::LeptonGetAuxTemperature => IoctlResponse::Float(28.0),
            IoctlRequest::LeptonSetMeasurementMode { enabled, high_temp } => {
                self.measurement = (*enabled, *high_temp);
                IoctlResponse::None
            }
            IoctlRequest::LeptonGetMeasurementMode => IoctlResponse::MeasurementMode {
                enabled: self.measurement.0,
                high_temp: self.measurement.1,
            },
            IoctlRequest::LeptonSetMeasurementRange { min, max } => {
                self.range = (*min, *max);
                IoctlResponse::None
            }
            IoctlRequest::LeptonGetMeasurementRange => IoctlResponse::Range {
                min: self.range.0,
                max: self.range.1,
            },
            IoctlRequest::HimaxMdEnable(enable) => {
                self.md_enabled = *enable;
                IoctlResponse::None
            }
            IoctlRequest::HimaxMdClear => IoctlResponse::None,
            IoctlRequest::HimaxMdWindow(window) => {
                self.md_window = *window;
                IoctlResponse::None
            }
            IoctlRequest::HimaxMdThreshold(threshold) => {
                self.md_threshold = *threshold;
                IoctlResponse::None
            }
            IoctlRequest::HimaxOscEnable(enable) => {
                self.osc = *enable;
                IoctlResponse::None
            }
            _ => return Err(SensorError::CtlUnsupported),
        };
        Ok(response)
    }
}

/// Factory binding [`SimBackend`] to any family.
pub fn sim_backend(family: &SensorFamily, chip_id: u32) -> Box<dyn SensorBackend> {
    Box::new(SimBackend::new(family.name, chip_id))
}

/// Registry with every known family bound to [`SimBackend`].
pub fn registry() -> Registry {
    FAMILIES
        .iter()
        .fold(Registry::new(), |registry, family| registry.register(*family, sim_backend))
}
