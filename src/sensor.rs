// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sensor session.
//!
//! A [`Sensor`] owns one probed chip on one bus: the register transport,
//! the bound backend, the descriptor, and the capture pipeline. Sessions are
//! created with [`Sensor::builder`] and torn down on drop, which aborts any
//! capture still running.

use crate::{
    backend::{Registry, SensorBackend, SensorCtx, SensorFamily},
    bus::{BusSpeed, Regs, SccbBus},
    capture::{
        CaptureCore, CaptureHardware, CaptureState, CaptureStatus, CaptureTiming, FrameCallback,
        FrameEnd, IrqHandle, LineDma, VsyncCallback,
    },
    config::SensorConfig,
    descriptor::{HwFlags, SensorDescriptor},
    error::{Result, SensorError},
    format::PixFormat,
    framebuffer::FrameBuffer,
    image::{Image, Rect},
    resolution::FrameSize,
    sizing::{self, CropPlan},
};
use std::{sync::Arc, thread, time::Duration};
use tracing::{debug, info, warn};

/// Highest accepted frame rate, one frame per millisecond.
pub const MAX_FRAMERATE: u32 = 1000;

/// Options of a single [`Sensor::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotFlags {
    /// Leave capture armed afterwards so following frames queue up.
    pub keep_armed: bool,
    /// Discard frames already queued and wait for a new one.
    pub fresh: bool,
}

/// Configuration changes applied as one step by [`Sensor::configure`].
///
/// Axes left as `None` keep their current value. A change of frame size
/// without a window resets the window to the full frame.
///
/// ```
/// use edgefirst_sensor::{format::PixFormat, resolution::FrameSize, sensor::ChangeSet};
///
/// let changes = ChangeSet::new()
///     .pixformat(PixFormat::Rgb565)
///     .framesize(FrameSize::Qvga)
///     .framerate(30);
/// assert!(!changes.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet {
    pub pixformat: Option<PixFormat>,
    pub framesize: Option<FrameSize>,
    pub window: Option<Rect>,
    pub framerate: Option<u32>,
    /// Fail with [`SensorError::CtlUnsupported`] when the backend cannot
    /// apply a requested axis, instead of leaving the chip at its default.
    pub strict: bool,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pixformat(mut self, pixformat: PixFormat) -> Self {
        self.pixformat = Some(pixformat);
        self
    }

    pub fn framesize(mut self, framesize: FrameSize) -> Self {
        self.framesize = Some(framesize);
        self
    }

    pub fn window(mut self, window: Rect) -> Self {
        self.window = Some(window);
        self
    }

    pub fn framerate(mut self, framerate: u32) -> Self {
        self.framerate = Some(framerate);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pixformat.is_none()
            && self.framesize.is_none()
            && self.window.is_none()
            && self.framerate.is_none()
    }
}

/// Validated configuration requested by the caller, before auto-crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    pixformat: PixFormat,
    framesize: FrameSize,
    window: Rect,
    framerate: u32,
}

/// Backend slots written by an in-progress configuration.
#[derive(Debug, Default)]
struct Touched {
    pixformat: bool,
    framesize: bool,
    framerate: bool,
}

/// Builder for a [`Sensor`] session.
#[derive(Default)]
pub struct SensorBuilder {
    bus: Option<Box<dyn SccbBus>>,
    hw: Option<Arc<dyn CaptureHardware>>,
    dma: Option<Arc<dyn LineDma>>,
    registry: Registry,
    config: SensorConfig,
}

impl SensorBuilder {
    pub fn with_bus<B: SccbBus + 'static>(mut self, bus: B) -> Self {
        self.bus = Some(Box::new(bus));
        self
    }

    pub fn with_hardware<H: CaptureHardware + 'static>(mut self, hw: Arc<H>) -> Self {
        self.hw = Some(hw);
        self
    }

    /// Uses DMA for line copies.
    pub fn with_dma<D: LineDma + 'static>(mut self, dma: Arc<D>) -> Self {
        self.dma = Some(dma);
        self
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: SensorConfig) -> Self {
        self.config = config;
        self
    }

    /// Detects the chip on `bus_id` and binds its backend.
    ///
    /// The bus is scanned after a power cycle. When nothing answers, the
    /// reset polarity and then the power-down polarity are flipped and the
    /// scan is repeated. The first registered family whose slave address
    /// answered and whose chip-id register holds a recognized id is bound.
    /// The session is only returned once the backend initialized the chip.
    pub fn probe(self, bus_id: u32, speed: BusSpeed) -> Result<Sensor> {
        let SensorBuilder {
            bus,
            hw,
            dma,
            registry,
            config,
        } = self;
        let mut bus = bus.ok_or(SensorError::InvalidArgument)?;
        let hw = hw.ok_or(SensorError::InvalidArgument)?;
        if let Err(err) = config.validate() {
            warn!(%err, "rejected sensor config");
            return Err(SensorError::InvalidArgument);
        }

        bus.init(bus_id, speed)?;
        let mut flags = HwFlags::DEFAULT;
        let found = scan(bus.as_mut(), hw.as_ref(), &mut flags)?;
        debug!(bus_id, ?found, "bus scan");

        let mut io_error = false;
        let mut matched = None;
        for &(family, factory) in registry.entries() {
            if !found.contains(&family.slv_addr) {
                continue;
            }
            match bus.read_reg(family.slv_addr, family.id_reg, family.reg_format) {
                Ok(id) => {
                    let chip_id = u32::from(id);
                    debug!(family = family.name, chip_id = format_args!("{chip_id:#x}"), "chip id");
                    if family.recognizes(chip_id) {
                        matched = Some((family, factory, chip_id));
                        break;
                    }
                }
                Err(err) => {
                    debug!(family = family.name, %err, "chip id read failed");
                    io_error = true;
                }
            }
        }
        let Some((family, factory, chip_id)) = matched else {
            return Err(if io_error {
                SensorError::IoError
            } else {
                SensorError::IscUnsupported
            });
        };

        let mut desc_flags = family.flags;
        desc_flags.reset_pol = flags.reset_pol;
        desc_flags.power_pol = flags.power_pol;
        let mut desc = SensorDescriptor::new(chip_id, family.slv_addr, desc_flags);
        desc.disable_delays = config.disable_delays;
        desc.disable_full_flush = config.disable_full_flush;

        if let Err(err) = hw.set_xclk_frequency(family.xclk_hz) {
            warn!(%err, hz = family.xclk_hz, "failed to set xclk");
            return Err(SensorError::TimInitFailed);
        }

        let mut backend = factory(&family, chip_id);
        {
            let regs = Regs::new(bus.as_mut(), family.slv_addr, family.reg_format);
            let mut ctx = SensorCtx::new(regs, &desc, CaptureState::Idle);
            if let Err(err) = backend.init(&mut ctx) {
                warn!(family = family.name, %err, "sensor init failed");
                return Err(SensorError::IscInitFailed);
            }
        }
        hw.init()?;

        let fb = FrameBuffer::new(config.framebuffer_size, config.framebuffers)?;
        let core = Arc::new(CaptureCore::new(hw.clone(), dma, fb, config.disable_full_flush));
        desc.detected = true;
        info!(
            family = family.name,
            backend = backend.name(),
            chip_id = format_args!("{chip_id:#x}"),
            slv_addr = format_args!("{:#04x}", family.slv_addr),
            "sensor detected"
        );

        Ok(Sensor {
            desc,
            family,
            bus,
            backend,
            hw,
            core,
            config,
            requested_pixformat: PixFormat::Invalid,
            requested_window: Rect::default(),
        })
    }
}

/// Scans the bus, flipping the reset and power-down polarities in turn
/// until something answers.
fn scan(bus: &mut dyn SccbBus, hw: &dyn CaptureHardware, flags: &mut HwFlags) -> Result<Vec<u8>> {
    hw.power_cycle(flags);
    let mut found = bus.scan()?;
    if found.is_empty() {
        debug!("no answer, retrying with reset polarity flipped");
        flags.reset_pol = flags.reset_pol.flipped();
        hw.power_cycle(flags);
        found = bus.scan()?;
    }
    if found.is_empty() {
        debug!("no answer, retrying with power-down polarity flipped");
        flags.power_pol = flags.power_pol.flipped();
        hw.power_cycle(flags);
        found = bus.scan()?;
    }
    if found.is_empty() {
        return Err(SensorError::IscUndetected);
    }
    Ok(found)
}

/// One probed sensor on one bus.
pub struct Sensor {
    pub(crate) desc: SensorDescriptor,
    family: SensorFamily,
    bus: Box<dyn SccbBus>,
    backend: Box<dyn SensorBackend>,
    hw: Arc<dyn CaptureHardware>,
    core: Arc<CaptureCore>,
    config: SensorConfig,
    /// Format last asked for, before any auto-crop downgrade.
    requested_pixformat: PixFormat,
    /// Window last asked for, before auto-crop.
    requested_window: Rect,
}

impl Sensor {
    pub fn builder() -> SensorBuilder {
        SensorBuilder::default()
    }

    pub fn descriptor(&self) -> &SensorDescriptor {
        &self.desc
    }

    pub fn family(&self) -> &SensorFamily {
        &self.family
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn get_id(&self) -> u32 {
        self.desc.chip_id
    }

    pub fn slv_addr(&self) -> u8 {
        self.desc.slv_addr
    }

    pub fn is_detected(&self) -> bool {
        self.desc.detected
    }

    pub fn pixformat(&self) -> PixFormat {
        self.desc.pixformat
    }

    pub fn framesize(&self) -> FrameSize {
        self.desc.framesize
    }

    /// Effective capture window after auto-crop.
    pub fn window(&self) -> Rect {
        self.desc.window
    }

    pub fn framerate(&self) -> u32 {
        self.desc.framerate
    }

    pub fn is_cropped(&self) -> bool {
        self.desc.is_cropped()
    }

    /// Bytes per pixel read from the sensor in the current format.
    pub fn src_bpp(&self) -> u32 {
        self.desc.pixformat.src_bpp(self.desc.flags.mono_bpp)
    }

    /// Bytes per pixel stored in the current format, `None` for JPEG.
    pub fn dst_bpp(&self) -> Option<u32> {
        self.desc.pixformat.dst_bpp()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.core.state()
    }

    pub fn capture_status(&self) -> CaptureStatus {
        self.core.status()
    }

    /// Runs `f` against the bound backend with a fresh context.
    pub(crate) fn with_backend<R>(
        &mut self,
        f: impl FnOnce(&mut dyn SensorBackend, &mut SensorCtx) -> Result<R>,
    ) -> Result<R> {
        let state = self.core.state();
        let regs = Regs::new(self.bus.as_mut(), self.desc.slv_addr, self.family.reg_format);
        let mut ctx = SensorCtx::new(regs, &self.desc, state);
        f(self.backend.as_mut(), &mut ctx)
    }

    /// Power cycles the chip and restores post-probe defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.abort(true, false)?;
        self.desc.reset_state();
        self.requested_pixformat = PixFormat::Invalid;
        self.requested_window = Rect::default();
        self.core.reconfigure(None, 0);
        self.hw.power_cycle(&self.desc.flags);
        self.with_backend(|b, ctx| b.reset(ctx))?;
        debug!("sensor reset");
        Ok(())
    }

    pub fn sleep(&mut self, enable: bool) -> Result<()> {
        self.abort(true, false)?;
        self.with_backend(|b, ctx| b.sleep(ctx, enable))
    }

    /// Drives the power-down pin.
    pub fn shutdown(&mut self, enable: bool) -> Result<()> {
        self.abort(true, false)?;
        self.hw.set_power_down(enable, self.desc.flags.power_pol);
        if !enable && !self.desc.disable_delays {
            thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }

    pub fn read_reg(&mut self, reg: u16) -> Result<u16> {
        self.with_backend(|b, ctx| b.read_reg(ctx, reg))
    }

    pub fn write_reg(&mut self, reg: u16, value: u16) -> Result<()> {
        self.with_backend(|b, ctx| b.write_reg(ctx, reg, value))
    }

    pub fn xclk_frequency(&self) -> u32 {
        self.hw.xclk_frequency()
    }

    pub fn set_xclk_frequency(&mut self, hz: u32) -> Result<()> {
        self.hw.set_xclk_frequency(hz).map_err(|err| {
            warn!(%err, hz, "failed to set xclk");
            SensorError::TimInitFailed
        })
    }

    pub fn set_vsync_callback(&mut self, cb: Option<VsyncCallback>) {
        self.core.set_vsync_callback(cb);
    }

    pub fn set_frame_callback(&mut self, cb: Option<FrameCallback>) {
        self.core.set_frame_callback(cb);
    }

    /// Stores a reference to an externally owned color palette.
    pub fn set_color_palette(&mut self, palette: Option<&'static [u16]>) {
        self.desc.color_palette = palette;
    }

    pub fn color_palette(&self) -> Option<&'static [u16]> {
        self.desc.color_palette
    }

    pub fn set_pixformat(&mut self, pixformat: PixFormat) -> Result<()> {
        self.configure(ChangeSet::new().pixformat(pixformat).strict())
    }

    pub fn set_framesize(&mut self, framesize: FrameSize) -> Result<()> {
        self.configure(ChangeSet::new().framesize(framesize).strict())
    }

    pub fn set_windowing(&mut self, window: Rect) -> Result<()> {
        self.configure(ChangeSet::new().window(window))
    }

    /// Sets the target frame rate, zero disables throttling.
    pub fn set_framerate(&mut self, framerate: u32) -> Result<()> {
        self.configure(ChangeSet::new().framerate(framerate))
    }

    /// Applies `changes` as one step.
    ///
    /// Values are validated before any hardware is touched. Capture is then
    /// aborted, and the backend receives the format, frame size and frame
    /// rate in that order. Finally the sizing engine checks the frame
    /// against the per-buffer budget, auto-cropping if needed. On failure
    /// the descriptor is rolled back and the backend is restored on a best
    /// effort basis.
    pub fn configure(&mut self, changes: ChangeSet) -> Result<()> {
        let target = self.validate(&changes)?;
        if changes.is_empty() || target == self.current_target() {
            return Ok(());
        }
        self.abort(true, false)?;
        self.negotiate(target, changes.strict)
    }

    fn current_target(&self) -> Target {
        Target {
            pixformat: self.requested_pixformat,
            framesize: self.desc.framesize,
            window: self.requested_window,
            framerate: self.desc.framerate,
        }
    }

    fn check_pixformat(&self, pixformat: PixFormat) -> Result<()> {
        let flags = &self.desc.flags;
        if !pixformat.is_valid() {
            return Err(SensorError::InvalidPixformat);
        }
        if flags.raw_output && pixformat != PixFormat::Bayer {
            return Err(SensorError::PixformatUnsupported);
        }
        if pixformat == PixFormat::Jpeg
            && (flags.jpeg_mode == 0 || self.desc.transpose || self.desc.auto_rotation)
        {
            return Err(SensorError::PixformatUnsupported);
        }
        Ok(())
    }

    fn validate(&self, changes: &ChangeSet) -> Result<Target> {
        if let Some(pixformat) = changes.pixformat {
            self.check_pixformat(pixformat)?;
        }
        if changes.framesize.is_some_and(|f| !f.is_valid()) {
            return Err(SensorError::InvalidFramesize);
        }
        if changes.framerate.is_some_and(|r| r > MAX_FRAMERATE) {
            return Err(SensorError::InvalidFramerate);
        }

        let framesize = changes.framesize.unwrap_or(self.desc.framesize);
        let window = match (changes.window, framesize.dims()) {
            (Some(window), Some((w, h))) if window.fits_within(w, h) => window,
            (Some(_), _) => return Err(SensorError::InvalidWindow),
            (None, Some((w, h))) if changes.framesize.is_some() => Rect::full(w, h),
            (None, _) => self.requested_window,
        };

        Ok(Target {
            pixformat: changes.pixformat.unwrap_or(self.requested_pixformat),
            framesize,
            window,
            framerate: changes.framerate.unwrap_or(self.desc.framerate),
        })
    }

    /// Applies a validated target, committing or rolling back.
    fn negotiate(&mut self, target: Target, strict: bool) -> Result<()> {
        let previous = self.desc.clone();
        let mut touched = Touched::default();
        match self.apply(target, strict, &mut touched) {
            Ok((plan, timing)) => {
                self.desc.pixformat = plan.pixformat;
                self.desc.framesize = target.framesize;
                self.desc.window = plan.window;
                self.desc.framerate = target.framerate;
                self.requested_pixformat = target.pixformat;
                self.requested_window = target.window;
                self.core.reconfigure(timing, target.framerate);
                info!(
                    pixformat = %plan.pixformat,
                    framesize = %target.framesize,
                    window = %plan.window,
                    framerate = target.framerate,
                    "sensor configured"
                );
                Ok(())
            }
            Err(err) => {
                warn!(%err, "configuration rolled back");
                self.rollback(&previous, &touched);
                Err(err)
            }
        }
    }

    fn apply(
        &mut self,
        target: Target,
        strict: bool,
        touched: &mut Touched,
    ) -> Result<(CropPlan, Option<CaptureTiming>)> {
        let optional = |res: Result<()>| match res {
            Err(SensorError::CtlUnsupported) if !strict => Ok(()),
            other => other,
        };

        if target.pixformat.is_valid() && target.pixformat != self.desc.pixformat {
            touched.pixformat = true;
            let pixformat = target.pixformat;
            optional(self.with_backend(|b, ctx| b.set_pixformat(ctx, pixformat)))?;
        }
        if target.framesize.is_valid() && target.framesize != self.desc.framesize {
            touched.framesize = true;
            let framesize = target.framesize;
            optional(self.with_backend(|b, ctx| b.set_framesize(ctx, framesize)))?;
        }
        if target.framerate != self.desc.framerate {
            touched.framerate = true;
            let framerate = target.framerate;
            optional(self.with_backend(|b, ctx| b.set_framerate(ctx, framerate)))?;
        }

        let Some(frame) = target.framesize.dims().filter(|_| target.pixformat.is_valid()) else {
            let plan = CropPlan {
                pixformat: target.pixformat,
                window: target.window,
            };
            return Ok((plan, None));
        };

        let budget = self.core.buffer_size();
        let plan = sizing::auto_crop(
            target.pixformat,
            target.framesize,
            target.window,
            budget,
            self.config.crop_floor_divisor,
        )?;
        if plan.window != target.window || plan.pixformat != target.pixformat {
            info!(
                budget,
                pixformat = %plan.pixformat,
                window = %plan.window,
                "auto-cropped to fit frame buffer"
            );
        }
        if plan.pixformat != target.pixformat {
            touched.pixformat = true;
            let pixformat = plan.pixformat;
            self.with_backend(|b, ctx| b.set_pixformat(ctx, pixformat))
                .map_err(|err| {
                    debug!(%err, "backend refused format downgrade");
                    SensorError::FramebufferOverflow
                })?;
        }

        let timing = CaptureTiming::new(plan.pixformat, frame, plan.window, &self.desc.flags);
        if let Some(timing) = &timing {
            self.hw.configure(timing)?;
        }
        Ok((plan, timing))
    }

    fn rollback(&mut self, previous: &SensorDescriptor, touched: &Touched) {
        let (pixformat, framesize, framerate) =
            (previous.pixformat, previous.framesize, previous.framerate);
        if touched.pixformat && pixformat.is_valid() {
            if let Err(err) = self.with_backend(|b, ctx| b.set_pixformat(ctx, pixformat)) {
                debug!(%err, "failed to restore pixformat");
            }
        }
        if touched.framesize && framesize.is_valid() {
            if let Err(err) = self.with_backend(|b, ctx| b.set_framesize(ctx, framesize)) {
                debug!(%err, "failed to restore framesize");
            }
        }
        if touched.framerate {
            if let Err(err) = self.with_backend(|b, ctx| b.set_framerate(ctx, framerate)) {
                debug!(%err, "failed to restore framerate");
            }
        }
        if let Some((w, h)) = framesize.dims() {
            if let Some(timing) = CaptureTiming::new(pixformat, (w, h), previous.window, &previous.flags) {
                if let Err(err) = self.hw.configure(&timing) {
                    debug!(%err, "failed to restore capture timing");
                }
            }
        }
        self.desc = previous.clone();
    }

    /// True when the current frame fits one frame buffer.
    pub fn check_fits(&self) -> bool {
        sizing::check_fits(
            self.desc.pixformat,
            self.desc.framesize,
            &self.desc.window,
            self.core.buffer_size(),
        )
    }

    /// Restores the budget invariant for the current configuration,
    /// cropping or downgrading as needed.
    pub fn auto_crop(&mut self) -> Result<()> {
        if self.check_fits() {
            return Ok(());
        }
        self.abort(true, false)?;
        self.negotiate(self.current_target(), false)
    }

    pub fn framebuffers(&self) -> usize {
        self.core.buffer_count()
    }

    /// Splits the frame buffer into `count` buffers and renegotiates the
    /// window against the new per-buffer budget.
    pub fn set_framebuffers(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(SensorError::InvalidArgument);
        }
        self.abort(true, false)?;
        let previous = self.core.buffer_count();
        self.core.set_buffer_count(count)?;
        if self.desc.pixformat.is_valid() && self.desc.framesize.is_valid() {
            if let Err(err) = self.negotiate(self.current_target(), false) {
                self.core.set_buffer_count(previous)?;
                return Err(err);
            }
        }
        debug!(count, size = self.core.buffer_size(), "frame buffers");
        Ok(())
    }

    /// Cancels any capture in progress.
    ///
    /// Interrupts are masked before the shared state is touched. With
    /// `flush`, completed frames are discarded when more than one buffer
    /// is in use. Aborting an idle session succeeds without side effects.
    pub fn abort(&mut self, flush: bool, from_irq: bool) -> Result<()> {
        self.core.abort(flush, from_irq)
    }

    /// Runs the frame rate throttle at the current tick and returns whether
    /// the frame completing now is dropped. Only a frame in transfer can be
    /// dropped, so outside `Capturing` this returns false and changes
    /// nothing.
    pub fn throttle_framerate(&mut self) -> bool {
        self.core.throttle()
    }

    /// Starts interrupt-driven capture. Frames are delivered through an
    /// [`IrqHandle`] and collected with [`Sensor::take_frame`].
    pub fn arm(&mut self) -> Result<()> {
        self.check_configured()?;
        self.core.arm()
    }

    pub fn irq_handle(&self) -> IrqHandle {
        IrqHandle(self.core.clone())
    }

    /// Moves the oldest completed frame into `image`, returning false when
    /// none is ready.
    pub fn take_frame(&mut self, image: &mut Image) -> Result<bool> {
        self.core.take_frame(image)
    }

    fn check_configured(&self) -> Result<()> {
        if !self.desc.pixformat.is_valid() {
            return Err(SensorError::InvalidPixformat);
        }
        if !self.desc.framesize.is_valid() {
            return Err(SensorError::InvalidFramesize);
        }
        Ok(())
    }

    /// Captures one frame into `image`.
    ///
    /// A backend with its own snapshot path handles the request directly.
    /// Otherwise capture is armed, and each frame is read line by line
    /// through the capture pipeline until one is committed. Throttled frames
    /// are skipped up to `max_dropped_frames`.
    pub fn snapshot(&mut self, image: &mut Image, flags: SnapshotFlags) -> Result<()> {
        match self.with_backend(|b, ctx| b.snapshot(ctx, image, flags)) {
            Err(SensorError::CtlUnsupported) => {}
            other => return other,
        }

        self.check_configured()?;
        let frame = self.desc.framesize.dims().unwrap_or((0, 0));
        let timing = CaptureTiming::new(self.desc.pixformat, frame, self.desc.window, &self.desc.flags)
            .ok_or(SensorError::InvalidPixformat)?;
        let need = timing.frame_bytes();
        if image.capacity() < need || self.core.buffer_size() < need {
            return Err(SensorError::FramebufferError);
        }

        if flags.fresh {
            let flushed = self.core.flush();
            debug!(flushed, "discarded queued frames");
        }
        self.core.arm()?;

        let timeout = Duration::from_millis(self.config.frame_timeout_ms);
        let mut line = vec![0u8; timing.src_line_bytes()];
        let mut dropped = 0;
        while !self.core.take_frame(image)? {
            if !self.hw.wait_frame_start(timeout) {
                self.abort(false, false)?;
                return Err(SensorError::CaptureTimeout);
            }
            if !self.core.frame_start() {
                return Err(SensorError::CaptureFailed);
            }
            loop {
                match self.hw.read_line(&mut line) {
                    Ok(Some(n)) => {
                        // line errors are recorded against the frame
                        let _ = self.core.line(&line[..n.min(line.len())]);
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "line transfer failed");
                        self.abort(false, false)?;
                        return Err(SensorError::CaptureFailed);
                    }
                }
            }
            match self.core.frame_end() {
                FrameEnd::Committed => {}
                FrameEnd::Dropped => {
                    dropped += 1;
                    debug!(dropped, "frame dropped");
                    if dropped > self.config.max_dropped_frames {
                        self.abort(false, false)?;
                        return Err(SensorError::CaptureTimeout);
                    }
                }
                FrameEnd::Failed(err) => {
                    self.abort(false, false)?;
                    return Err(match err {
                        SensorError::JpegOverflow | SensorError::FramebufferError => err,
                        _ => SensorError::CaptureFailed,
                    });
                }
                FrameEnd::Idle => return Err(SensorError::CaptureFailed),
            }
        }

        if !flags.keep_armed {
            self.abort(false, false)?;
        }
        Ok(())
    }
}

impl Drop for Sensor {
    fn drop(&mut self) {
        if let Err(err) = self.core.abort(true, false) {
            warn!(%err, "abort on close failed");
        }
        debug!(chip_id = format_args!("{:#x}", self.desc.chip_id), "sensor closed");
    }
}
