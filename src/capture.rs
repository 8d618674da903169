// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Capture pipeline shared between the session and interrupt context.
//!
//! The capture peripheral raises three events per frame: frame start
//! (vsync), one event per line, and frame end. Those events run through an
//! [`IrqHandle`] on the platform's interrupt path, while configuration and
//! frame retrieval run on the session. Both sides meet in one shared state
//! behind a spin lock, which the session only takes with the peripheral's
//! interrupts masked.
//!
//! ```text
//! IDLE --arm--> ARMED --frame start--> CAPTURING --frame end--> ARMED
//!   ^                                                            |
//!   +---------------------------- abort -------------------------+
//! ```

use crate::{
    descriptor::{HwFlags, Polarity},
    error::{Result, SensorError},
    format::PixFormat,
    framebuffer::{FrameBuffer, FrameMeta},
    image::{Image, Rect},
};
use serde::Serialize;
use spin::{Mutex, RwLock};
use std::{sync::Arc, time::Duration};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum CaptureState {
    #[default]
    Idle,
    Armed,
    Capturing,
    Aborting,
}

/// Frame geometry and signal polarities programmed into the capture
/// peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureTiming {
    pub pixformat: PixFormat,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Window kept from each frame.
    pub window: Rect,
    /// Bytes per pixel on the wire.
    pub src_bpp: u32,
    /// Swap the two bytes of every pixel after the copy.
    pub swap_bytes: bool,
    pub vsync_pol: Polarity,
    pub hsync_pol: Polarity,
    pub pixck_pol: Polarity,
    pub frame_sync: bool,
}

impl CaptureTiming {
    /// Builds the timing for a configuration, `None` when the format or
    /// frame is not set.
    pub fn new(pixformat: PixFormat, frame: (u32, u32), window: Rect, flags: &HwFlags) -> Option<Self> {
        if !pixformat.is_valid() || frame.0 == 0 || frame.1 == 0 {
            return None;
        }
        let swap_bytes = match pixformat {
            PixFormat::Rgb565 => flags.rgb_swap,
            PixFormat::Yuv422 => flags.yuv_swap,
            _ => false,
        };
        Some(Self {
            pixformat,
            frame_width: frame.0,
            frame_height: frame.1,
            window,
            src_bpp: pixformat.src_bpp(flags.mono_bpp),
            swap_bytes,
            vsync_pol: flags.vsync_pol,
            hsync_pol: flags.hsync_pol,
            pixck_pol: flags.pixck_pol,
            frame_sync: flags.frame_sync,
        })
    }

    /// Bytes in one line as delivered by the peripheral.
    pub fn src_line_bytes(&self) -> usize {
        self.frame_width as usize * self.src_bpp as usize
    }

    /// Bytes in one stored line, `None` for JPEG.
    pub fn dst_line_bytes(&self) -> Option<usize> {
        self.pixformat
            .dst_bpp()
            .map(|bpp| self.window.width as usize * bpp as usize)
    }

    /// Upper bound of a stored frame.
    pub fn frame_bytes(&self) -> usize {
        self.pixformat
            .budget_bpp()
            .map_or(0, |bpp| bpp as usize * self.window.area())
    }
}

/// Platform capture peripheral.
///
/// Methods take `&self` because interrupt handlers and the session hold the
/// peripheral at the same time.
pub trait CaptureHardware: Send + Sync {
    /// Initializes the peripheral and its DMA. Errors are reported as is.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Programs line geometry and polarities.
    fn configure(&self, timing: &CaptureTiming) -> Result<()>;

    /// Starts capture, frame events follow.
    fn start(&self) -> Result<()>;

    /// Stops capture immediately, dropping any transfer in progress.
    fn stop(&self);

    /// Masks the peripheral's interrupts.
    fn disable_irqs(&self);

    /// Unmasks the peripheral's interrupts.
    fn enable_irqs(&self);

    /// Blocks until the next frame start, false on timeout.
    fn wait_frame_start(&self, timeout: Duration) -> bool;

    /// Reads the next line of the current frame into `buf`, returning its
    /// length, or `None` at frame end.
    fn read_line(&self, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Monotonic millisecond tick.
    fn ticks_ms(&self) -> u32;

    fn set_xclk_frequency(&self, hz: u32) -> Result<()>;

    fn xclk_frequency(&self) -> u32;

    /// Pulses the reset and power-down pins with the given polarities.
    fn power_cycle(&self, flags: &HwFlags) {
        let _ = flags;
    }

    /// Drives the power-down pin.
    fn set_power_down(&self, asserted: bool, pol: Polarity) {
        let _ = (asserted, pol);
    }
}

/// Hardware line copier.
pub trait LineDma: Send + Sync {
    fn copy(&self, src: &[u8], dst: &mut [u8]) -> Result<()>;
}

/// Copies one line, with DMA when available. Both slices must have the
/// same length.
pub fn copy_line(dma: Option<&dyn LineDma>, src: &[u8], dst: &mut [u8]) -> Result<()> {
    if src.len() != dst.len() {
        return Err(SensorError::InvalidArgument);
    }
    match dma {
        Some(dma) => dma.copy(src, dst),
        None => {
            dst.copy_from_slice(src);
            Ok(())
        }
    }
}

/// Crops one raw line to the window and converts it to the stored layout.
fn transfer_line(dma: Option<&dyn LineDma>, timing: &CaptureTiming, src: &[u8], dst: &mut [u8]) -> Result<()> {
    let bpp = timing.src_bpp as usize;
    let start = timing.window.x as usize * bpp;
    let end = start + timing.window.width as usize * bpp;
    let src = src.get(start..end).ok_or(SensorError::CaptureFailed)?;

    if timing.pixformat == PixFormat::Grayscale && bpp == 2 {
        // luma is the first byte of each YUV pair
        for (d, s) in dst.iter_mut().zip(src.chunks_exact(2)) {
            *d = s[0];
        }
        return Ok(());
    }

    copy_line(dma, src, dst)?;
    if timing.swap_bytes {
        for px in dst.chunks_exact_mut(2) {
            px.swap(0, 1);
        }
    }
    Ok(())
}

/// Result of a frame end event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEnd {
    /// The frame was queued.
    Committed,
    /// The frame was discarded by the throttle or for lack of a buffer.
    Dropped,
    /// The frame was discarded after a line error.
    Failed(SensorError),
    /// No frame was in progress.
    Idle,
}

/// Snapshot of the interrupt-shared capture fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub first_line: bool,
    pub drop_frame: bool,
    pub last_frame_ms: Option<u32>,
    /// Frame starts seen since the session was created.
    pub frame_count: u32,
    /// Completed frames waiting to be taken.
    pub ready: usize,
}

/// Called at frame start with the frame number, from interrupt context.
pub type VsyncCallback = Arc<dyn Fn(u32) + Send + Sync>;
/// Called when a frame is committed, from interrupt context.
pub type FrameCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    vsync: Option<VsyncCallback>,
    frame: Option<FrameCallback>,
}

/// Fields shared with interrupt context.
pub(crate) struct CaptureShared {
    state: CaptureState,
    first_line: bool,
    drop_frame: bool,
    last_frame_ms: Option<u32>,
    framerate: u32,
    line_no: u32,
    frame_count: u32,
    timing: Option<CaptureTiming>,
    fb: FrameBuffer,
    active: Option<usize>,
    jpeg_len: usize,
    frame_error: Option<SensorError>,
    disable_full_flush: bool,
}

impl CaptureShared {
    /// Decides whether the frame completing at `now` is kept.
    fn throttle(&mut self, now: u32) {
        if self.framerate == 0 {
            return;
        }
        let period = 1000 / self.framerate;
        match self.last_frame_ms {
            None => self.last_frame_ms = Some(now),
            Some(last) => {
                let elapsed = now.wrapping_sub(last);
                if elapsed < period {
                    self.drop_frame = true;
                } else if elapsed >= 2 * period {
                    // fell behind, resync instead of bursting
                    self.last_frame_ms = Some(now);
                } else {
                    self.last_frame_ms = Some(last.wrapping_add(period));
                }
            }
        }
    }

    fn clear_frame(&mut self) {
        if let Some(idx) = self.active.take() {
            self.fb.release(idx);
        }
        self.first_line = false;
        self.drop_frame = false;
        self.frame_error = None;
        self.jpeg_len = 0;
        self.line_no = 0;
    }

    fn is_live(&self) -> bool {
        matches!(self.state, CaptureState::Armed | CaptureState::Capturing)
    }
}

pub(crate) struct CaptureCore {
    hw: Arc<dyn CaptureHardware>,
    dma: Option<Arc<dyn LineDma>>,
    shared: Mutex<CaptureShared>,
    callbacks: RwLock<Callbacks>,
}

impl CaptureCore {
    pub(crate) fn new(
        hw: Arc<dyn CaptureHardware>,
        dma: Option<Arc<dyn LineDma>>,
        fb: FrameBuffer,
        disable_full_flush: bool,
    ) -> Self {
        Self {
            hw,
            dma,
            shared: Mutex::new(CaptureShared {
                state: CaptureState::Idle,
                first_line: false,
                drop_frame: false,
                last_frame_ms: None,
                framerate: 0,
                line_no: 0,
                frame_count: 0,
                timing: None,
                fb,
                active: None,
                jpeg_len: 0,
                frame_error: None,
                disable_full_flush,
            }),
            callbacks: RwLock::new(Callbacks::default()),
        }
    }

    /// Runs `f` with the peripheral's interrupts masked and the shared
    /// state locked. Interrupts are unmasked again only while capture is
    /// armed.
    fn critical<R>(&self, f: impl FnOnce(&mut CaptureShared) -> R) -> R {
        self.hw.disable_irqs();
        let (ret, live) = {
            let mut shared = self.shared.lock();
            let ret = f(&mut shared);
            (ret, shared.is_live())
        };
        if live {
            self.hw.enable_irqs();
        }
        ret
    }

    pub(crate) fn state(&self) -> CaptureState {
        self.critical(|s| s.state)
    }

    pub(crate) fn status(&self) -> CaptureStatus {
        self.critical(|s| CaptureStatus {
            state: s.state,
            first_line: s.first_line,
            drop_frame: s.drop_frame,
            last_frame_ms: s.last_frame_ms,
            frame_count: s.frame_count,
            ready: s.fb.ready_len(),
        })
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.critical(|s| s.fb.buffer_size())
    }

    pub(crate) fn buffer_count(&self) -> usize {
        self.critical(|s| s.fb.count())
    }

    /// Reallocates the frame buffers. Capture must be idle.
    pub(crate) fn set_buffer_count(&self, count: usize) -> Result<()> {
        self.critical(|s| {
            if s.state != CaptureState::Idle {
                return Err(SensorError::CaptureFailed);
            }
            s.fb.set_count(count)
        })
    }

    /// Installs new geometry and frame rate. Queued frames are discarded
    /// and the throttle restarts.
    pub(crate) fn reconfigure(&self, timing: Option<CaptureTiming>, framerate: u32) {
        self.critical(|s| {
            s.timing = timing;
            s.framerate = framerate;
            s.last_frame_ms = None;
            s.clear_frame();
            s.fb.reset();
        });
    }

    pub(crate) fn set_vsync_callback(&self, cb: Option<VsyncCallback>) {
        self.callbacks.write().vsync = cb;
    }

    pub(crate) fn set_frame_callback(&self, cb: Option<FrameCallback>) {
        self.callbacks.write().frame = cb;
    }

    /// Runs the throttle at the current tick, returning `drop_frame`.
    /// Outside a frame transfer there is no frame to drop and the throttle
    /// is left untouched.
    pub(crate) fn throttle(&self) -> bool {
        let now = self.hw.ticks_ms();
        self.critical(|s| {
            if s.state != CaptureState::Capturing {
                return false;
            }
            s.throttle(now);
            s.drop_frame
        })
    }

    /// Starts the peripheral if capture is idle.
    pub(crate) fn arm(&self) -> Result<()> {
        self.critical(|s| match s.state {
            CaptureState::Armed | CaptureState::Capturing => Ok(()),
            CaptureState::Idle | CaptureState::Aborting => {
                if s.timing.is_none() {
                    return Err(SensorError::InvalidPixformat);
                }
                if let Err(err) = self.hw.start() {
                    warn!(%err, "capture start failed");
                    return Err(SensorError::CaptureFailed);
                }
                s.clear_frame();
                s.state = CaptureState::Armed;
                Ok(())
            }
        })
    }

    /// Cancels any capture in progress and returns to idle.
    ///
    /// With `flush`, completed frames are discarded as well when more than
    /// one buffer is in use. `disable_full_flush` keeps the newest one. The
    /// frame rate throttle restarts with the next frame.
    pub(crate) fn abort(&self, flush: bool, from_irq: bool) -> Result<()> {
        self.hw.disable_irqs();
        let mut s = self.shared.lock();
        if s.state == CaptureState::Idle {
            return Ok(());
        }
        let prev = s.state;
        s.state = CaptureState::Aborting;
        self.hw.stop();
        let mut flushed = 0;
        if let Some(idx) = s.active.take() {
            s.fb.release(idx);
        }
        if flush && s.fb.count() > 1 {
            let keep_latest = s.disable_full_flush;
            flushed = s.fb.flush(keep_latest);
        }
        s.clear_frame();
        s.last_frame_ms = None;
        s.state = CaptureState::Idle;
        drop(s);
        debug!(?prev, flush, flushed, from_irq, "capture aborted");
        Ok(())
    }

    /// Frame start event. Returns false when capture was not armed.
    pub(crate) fn frame_start(&self) -> bool {
        let frame_no = {
            let mut s = self.shared.lock();
            if s.state != CaptureState::Armed {
                return false;
            }
            s.frame_count = s.frame_count.wrapping_add(1);
            s.state = CaptureState::Capturing;
            s.first_line = true;
            s.drop_frame = false;
            s.frame_error = None;
            s.line_no = 0;
            s.jpeg_len = 0;
            let mut active = s.fb.acquire();
            if active.is_none() && !s.disable_full_flush {
                active = s.fb.recycle_oldest();
            }
            if active.is_none() {
                // every buffer holds a frame that must be kept
                s.drop_frame = true;
            }
            s.active = active;
            s.frame_count
        };
        let cb = self.callbacks.read().vsync.clone();
        if let Some(cb) = cb {
            cb(frame_no);
        }
        true
    }

    /// Line event with one raw line of the frame.
    pub(crate) fn line(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.shared.lock();
        let s = &mut *guard;
        if s.state != CaptureState::Capturing {
            return Ok(());
        }
        let line_no = s.line_no;
        s.line_no += 1;
        if s.first_line {
            s.first_line = false;
            trace!(len = data.len(), "first line");
        }
        let (Some(idx), Some(timing)) = (s.active, s.timing) else {
            return Ok(());
        };
        if s.drop_frame || s.frame_error.is_some() {
            return Ok(());
        }

        let dma = self.dma.as_deref();
        let buf = s.fb.data_mut(idx);
        let res = match timing.dst_line_bytes() {
            None => {
                let start = s.jpeg_len;
                let end = start + data.len();
                match buf.get_mut(start..end) {
                    Some(dst) => copy_line(dma, data, dst).map(|_| s.jpeg_len = end),
                    None => Err(SensorError::JpegOverflow),
                }
            }
            Some(stride) => {
                let window = timing.window;
                if line_no < window.y || line_no >= window.y + window.height {
                    return Ok(());
                }
                let row = (line_no - window.y) as usize;
                match buf.get_mut(row * stride..(row + 1) * stride) {
                    Some(dst) => transfer_line(dma, &timing, data, dst),
                    None => Err(SensorError::FramebufferError),
                }
            }
        };
        if let Err(err) = res {
            s.frame_error = Some(err);
        }
        res
    }

    /// Frame end event.
    pub(crate) fn frame_end(&self) -> FrameEnd {
        let now = self.hw.ticks_ms();
        let end = {
            let mut guard = self.shared.lock();
            let s = &mut *guard;
            if s.state != CaptureState::Capturing {
                return FrameEnd::Idle;
            }
            s.state = CaptureState::Armed;
            let active = s.active.take();
            let end = match (s.frame_error.take(), s.timing) {
                (Some(err), _) => FrameEnd::Failed(err),
                (None, Some(timing)) if timing.pixformat != PixFormat::Jpeg
                    && s.line_no < timing.window.y + timing.window.height =>
                {
                    FrameEnd::Failed(SensorError::CaptureFailed)
                }
                _ => {
                    if !s.drop_frame {
                        s.throttle(now);
                    }
                    if s.drop_frame || active.is_none() {
                        FrameEnd::Dropped
                    } else {
                        FrameEnd::Committed
                    }
                }
            };
            match (end, active, s.timing) {
                (FrameEnd::Committed, Some(idx), Some(timing)) => {
                    let len = match timing.pixformat {
                        PixFormat::Jpeg => s.jpeg_len,
                        _ => timing.frame_bytes(),
                    };
                    let meta = FrameMeta {
                        width: timing.window.width,
                        height: timing.window.height,
                        pixformat: timing.pixformat,
                        len,
                    };
                    s.fb.commit(idx, meta);
                }
                (_, Some(idx), _) => s.fb.release(idx),
                _ => {}
            }
            end
        };
        if end == FrameEnd::Committed {
            let cb = self.callbacks.read().frame.clone();
            if let Some(cb) = cb {
                cb();
            }
        }
        end
    }

    /// Moves the oldest completed frame into `image`. Returns false when no
    /// frame is ready.
    pub(crate) fn take_frame(&self, image: &mut Image) -> Result<bool> {
        self.critical(|s| {
            let Some(idx) = s.fb.take() else {
                return Ok(false);
            };
            let meta = s.fb.meta(idx);
            match image.fill(meta.width, meta.height, meta.pixformat, s.fb.data(idx)) {
                Ok(()) => {
                    s.fb.release(idx);
                    Ok(true)
                }
                Err(err) => {
                    s.fb.untake(idx);
                    Err(err)
                }
            }
        })
    }

    /// Discards completed frames.
    pub(crate) fn flush(&self) -> usize {
        self.critical(|s| s.fb.flush(false))
    }
}

/// Entry points for the platform's capture interrupt handlers.
///
/// ```text
/// vsync ISR       -> IrqHandle::frame_start
/// line DMA ISR    -> IrqHandle::line
/// frame end ISR   -> IrqHandle::frame_end
/// ```
#[derive(Clone)]
pub struct IrqHandle(pub(crate) Arc<CaptureCore>);

impl IrqHandle {
    pub fn frame_start(&self) -> bool {
        self.0.frame_start()
    }

    pub fn line(&self, data: &[u8]) -> Result<()> {
        self.0.line(data)
    }

    pub fn frame_end(&self) -> FrameEnd {
        self.0.frame_end()
    }

    /// Aborts capture from interrupt context.
    pub fn abort(&self, flush: bool) {
        let _ = self.0.abort(flush, true);
    }

    pub fn state(&self) -> CaptureState {
        self.0.shared.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(framerate: u32) -> CaptureShared {
        CaptureShared {
            state: CaptureState::Idle,
            first_line: false,
            drop_frame: false,
            last_frame_ms: None,
            framerate,
            line_no: 0,
            frame_count: 0,
            timing: None,
            fb: FrameBuffer::new(16, 1).unwrap(),
            active: None,
            jpeg_len: 0,
            frame_error: None,
            disable_full_flush: false,
        }
    }

    #[test]
    fn throttle_schedule() {
        let mut s = shared(10);
        s.throttle(1000);
        assert_eq!(s.last_frame_ms, Some(1000));
        assert!(!s.drop_frame);

        s.throttle(1050);
        assert!(s.drop_frame);
        assert_eq!(s.last_frame_ms, Some(1000));

        s.drop_frame = false;
        s.throttle(1120);
        assert!(!s.drop_frame);
        assert_eq!(s.last_frame_ms, Some(1100));

        s.throttle(1400);
        assert_eq!(s.last_frame_ms, Some(1400));
    }

    #[test]
    fn unthrottled() {
        let mut s = shared(0);
        s.throttle(5);
        s.throttle(6);
        assert!(!s.drop_frame);
        assert_eq!(s.last_frame_ms, None);
    }

    #[test]
    fn line_transforms() {
        let flags = HwFlags {
            rgb_swap: true,
            ..HwFlags::DEFAULT
        };
        let timing = CaptureTiming::new(PixFormat::Rgb565, (4, 1), Rect::new(1, 0, 2, 1), &flags).unwrap();
        let src = [0, 1, 2, 3, 4, 5, 6, 7];
        let mut dst = [0u8; 4];
        transfer_line(None, &timing, &src, &mut dst).unwrap();
        assert_eq!(dst, [3, 2, 5, 4]);

        let timing = CaptureTiming::new(PixFormat::Grayscale, (4, 1), Rect::new(0, 0, 4, 1), &flags).unwrap();
        let mut dst = [0u8; 4];
        transfer_line(None, &timing, &src, &mut dst).unwrap();
        assert_eq!(dst, [0, 2, 4, 6]);
    }

    #[test]
    fn short_line() {
        let timing =
            CaptureTiming::new(PixFormat::Bayer, (8, 1), Rect::new(0, 0, 8, 1), &HwFlags::DEFAULT).unwrap();
        let mut dst = [0u8; 8];
        assert_eq!(
            transfer_line(None, &timing, &[0; 4], &mut dst),
            Err(SensorError::CaptureFailed)
        );
        assert_eq!(copy_line(None, &[0; 2], &mut dst), Err(SensorError::InvalidArgument));
    }
}
