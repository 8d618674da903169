// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Frame buffer sizing and auto-crop.
//!
//! A configuration fits when `budget_bpp(pixformat) * window area` is no
//! larger than the per-buffer budget. When it does not, [`auto_crop`]
//! searches for a smaller, centered window with the same aspect ratio, and
//! as a last resort switches 2-byte color formats to Bayer. Every step of
//! the search strictly reduces the bytes required and the search stops at a
//! floor window, so it always terminates.
//!
//! These are pure functions with no hardware side effects.

use crate::{
    error::{Result, SensorError},
    format::PixFormat,
    image::Rect,
    resolution::FrameSize,
};

/// Outcome of [`auto_crop`]: the effective format and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlan {
    pub pixformat: PixFormat,
    pub window: Rect,
}

/// Bytes charged against the budget, `None` for an invalid format.
pub fn frame_bytes(pixformat: PixFormat, window: &Rect) -> Option<usize> {
    pixformat
        .budget_bpp()
        .map(|bpp| bpp as usize * window.area())
}

/// True when `window` lies within `framesize` and its frame fits `budget`.
pub fn check_fits(pixformat: PixFormat, framesize: FrameSize, window: &Rect, budget: usize) -> bool {
    let Some((w, h)) = framesize.dims() else {
        return false;
    };
    window.fits_within(w, h) && frame_bytes(pixformat, window).is_some_and(|n| n <= budget)
}

/// Finds the column/row step that keeps the aspect ratio of a `w` x `h`
/// window, within 1% over at most 100 multiples.
fn aspect_step(w: u32, h: u32) -> (u32, u32) {
    let max = w.max(h);
    let min = w.min(h).max(1);
    let aspect = max as f32 / min as f32;

    let mut r = aspect;
    let mut best_r = r;
    let mut best_c = 1u32;
    let mut best_err = f32::MAX;
    for c in 1..=100u32 {
        let err = (r - r.round()).abs();
        if err <= best_err {
            best_err = err;
            best_r = r;
            best_c = c;
        }
        if best_err <= 0.01 {
            break;
        }
        r += aspect;
    }

    let major = (best_r.round() as u32).max(1);
    if w > h {
        (major, best_c)
    } else {
        (best_c, major)
    }
}

/// Shrinks `window` around its center until it fits, keeping both sides
/// even. Returns `None` once the next step would go below `floor`.
fn shrink(window: &Rect, bpp: u32, budget: usize, floor: (u32, u32)) -> Option<Rect> {
    let (mut du, mut dv) = aspect_step(window.width, window.height);
    if du % 2 != 0 || dv % 2 != 0 {
        du *= 2;
        dv *= 2;
    }
    let (mut u, mut v) = (window.width & !1, window.height & !1);
    if u < floor.0 || v < floor.1 {
        return None;
    }
    let bytes = |u: u32, v: u32| bpp as usize * u as usize * v as usize;

    while bytes(u, v) > budget {
        if u < floor.0 + du || v < floor.1 + dv {
            return None;
        }
        u -= du;
        v -= dv;
    }

    Some(Rect::new(
        window.x + (window.width - u) / 2,
        window.y + (window.height - v) / 2,
        u,
        v,
    ))
}

/// Smallest window the crop search may reach for `framesize`.
pub fn crop_floor(framesize: FrameSize, divisor: u32) -> (u32, u32) {
    let divisor = divisor.max(1);
    let (w, h) = framesize.dims().unwrap_or((0, 0));
    ((w / divisor).max(2), (h / divisor).max(2))
}

/// Restores the budget invariant for a configuration that overflows it.
///
/// Returns the unchanged configuration when it already fits. Otherwise the
/// window is cropped at the current format; if that reaches the floor, a
/// 2-byte color format is replaced by Bayer and the search restarts from
/// the original window. The logical frame size never changes.
pub fn auto_crop(
    pixformat: PixFormat,
    framesize: FrameSize,
    window: Rect,
    budget: usize,
    floor_divisor: u32,
) -> Result<CropPlan> {
    let (w, h) = framesize.dims().ok_or(SensorError::InvalidFramesize)?;
    if !window.fits_within(w, h) {
        return Err(SensorError::InvalidWindow);
    }
    let bpp = pixformat.budget_bpp().ok_or(SensorError::InvalidPixformat)?;

    if check_fits(pixformat, framesize, &window, budget) {
        return Ok(CropPlan { pixformat, window });
    }

    let floor = crop_floor(framesize, floor_divisor);
    if let Some(window) = shrink(&window, bpp, budget, floor) {
        return Ok(CropPlan { pixformat, window });
    }

    if pixformat.is_color_2bpp() {
        let pixformat = PixFormat::Bayer;
        if check_fits(pixformat, framesize, &window, budget) {
            return Ok(CropPlan { pixformat, window });
        }
        if let Some(window) = shrink(&window, 1, budget, floor) {
            return Ok(CropPlan { pixformat, window });
        }
    }

    Err(SensorError::FramebufferOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_steps() {
        assert_eq!(aspect_step(640, 480), (4, 3));
        assert_eq!(aspect_step(1280, 720), (16, 9));
        assert_eq!(aspect_step(320, 320), (1, 1));
        assert_eq!(aspect_step(128, 160), (4, 5));
    }

    #[test]
    fn fits_without_crop() {
        let vga = Rect::full(640, 480);
        assert!(check_fits(PixFormat::Rgb565, FrameSize::Vga, &vga, 640 * 480 * 2));
        assert!(!check_fits(PixFormat::Rgb565, FrameSize::Vga, &vga, 640 * 480 * 2 - 1));
        assert!(!check_fits(PixFormat::Invalid, FrameSize::Vga, &vga, usize::MAX));
        assert!(!check_fits(PixFormat::Bayer, FrameSize::Invalid, &vga, usize::MAX));
        assert!(!check_fits(PixFormat::Bayer, FrameSize::Qvga, &vga, usize::MAX));
    }

    #[test]
    fn crop_keeps_center() {
        let plan = auto_crop(PixFormat::Jpeg, FrameSize::Vga, Rect::full(640, 480), 200_000, 2)
            .unwrap();
        assert_eq!(plan.pixformat, PixFormat::Jpeg);
        assert_eq!(plan.window, Rect::new(64, 48, 512, 384));
    }

    #[test]
    fn crop_before_downgrade() {
        let budget = 640 * 480;
        let plan = auto_crop(PixFormat::Rgb565, FrameSize::Vga, Rect::full(640, 480), budget, 8)
            .unwrap();
        assert_eq!(plan.pixformat, PixFormat::Rgb565);
        assert_eq!(plan.window, Rect::new(96, 72, 448, 336));
    }

    #[test]
    fn downgrade_to_bayer() {
        // a floor equal to the frame leaves no room to crop
        let budget = 640 * 480;
        let plan = auto_crop(PixFormat::Rgb565, FrameSize::Vga, Rect::full(640, 480), budget, 1)
            .unwrap();
        assert_eq!(plan.pixformat, PixFormat::Bayer);
        assert_eq!(plan.window, Rect::full(640, 480));

        let plan = auto_crop(PixFormat::Yuv422, FrameSize::Vga, Rect::full(640, 480), budget / 4, 2)
            .unwrap();
        assert_eq!(plan.pixformat, PixFormat::Bayer);
        assert_eq!(plan.window, Rect::new(160, 120, 320, 240));
    }

    #[test]
    fn odd_window_is_evened() {
        let plan = auto_crop(PixFormat::Rgb565, FrameSize::Vga, Rect::new(0, 0, 639, 479), 640 * 480, 8)
            .unwrap();
        assert_eq!(plan.pixformat, PixFormat::Rgb565);
        assert_eq!(plan.window, Rect::new(96, 72, 446, 334));
    }

    #[test]
    fn overflow_at_floor() {
        assert_eq!(
            auto_crop(PixFormat::Grayscale, FrameSize::Vga, Rect::full(640, 480), 1000, 2),
            Err(SensorError::FramebufferOverflow)
        );
    }
}
