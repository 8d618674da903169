// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod common;

use common::{fast_config, rig, rig_with};
use edgefirst_sensor::{
    backend::{Registry, SensorBackend, SensorCtx, SensorFamily, OV2640, OV9650, PAG79XX},
    bus::BusSpeed,
    capture::CaptureState,
    config::SensorConfig,
    error::{Result, SensorError},
    format::PixFormat,
    image::{Image, Rect},
    resolution::FrameSize,
    sensor::{ChangeSet, Sensor, SnapshotFlags},
    sim::{SimBus, SimCapture},
};
use std::{error::Error, sync::Arc};

const REG_FORMAT: u16 = 0x40;
const REG_FRAMESIZE: u16 = 0x41;

/// Backend that can set the format and frame size but has no frame rate
/// control.
struct NoFramerate;

impl SensorBackend for NoFramerate {
    fn name(&self) -> &'static str {
        "no-framerate"
    }

    fn set_pixformat(&mut self, _ctx: &mut SensorCtx, _pixformat: PixFormat) -> Result<()> {
        Ok(())
    }

    fn set_framesize(&mut self, _ctx: &mut SensorCtx, _framesize: FrameSize) -> Result<()> {
        Ok(())
    }
}

fn no_framerate(_family: &SensorFamily, _chip_id: u32) -> Box<dyn SensorBackend> {
    Box::new(NoFramerate)
}

#[test]
fn test_full_window_on_framesize() -> Result<(), Box<dyn Error>> {
    let mut rig = rig(&OV2640, 0x26)?;
    rig.sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Rgb565)
            .framesize(FrameSize::Qvga),
    )?;
    assert_eq!(rig.sensor.pixformat(), PixFormat::Rgb565);
    assert_eq!(rig.sensor.framesize(), FrameSize::Qvga);
    assert_eq!(rig.sensor.window(), Rect::full(320, 240));
    assert!(!rig.sensor.is_cropped());
    assert!(rig.sensor.check_fits());
    assert_eq!(rig.sensor.src_bpp(), 2);
    assert_eq!(rig.sensor.dst_bpp(), Some(2));
    assert_eq!(rig.bus.reg(0x60, REG_FORMAT), Some(2));
    assert_eq!(rig.bus.reg(0x60, REG_FRAMESIZE), Some(FrameSize::Qvga as u16));

    let timing = rig.hw.timing().ok_or("capture not configured")?;
    assert_eq!(timing.frame_width, 320);
    assert_eq!(timing.window, Rect::full(320, 240));

    rig.sensor.set_windowing(Rect::new(16, 8, 128, 96))?;
    assert_eq!(rig.sensor.window(), Rect::new(16, 8, 128, 96));
    assert!(rig.sensor.is_cropped());

    // a new frame size without a window resets to the full frame
    rig.sensor.set_framesize(FrameSize::Qqvga)?;
    assert_eq!(rig.sensor.window(), Rect::full(160, 120));
    Ok(())
}

#[test]
fn test_validation_rejects_before_hardware() -> Result<(), Box<dyn Error>> {
    let mut rig = rig(&OV2640, 0x26)?;
    rig.sensor.set_pixformat(PixFormat::Rgb565)?;
    rig.sensor.set_framesize(FrameSize::Qvga)?;
    let before = rig.sensor.descriptor().clone();
    let writes = rig.hw.events().len();

    assert_eq!(
        rig.sensor.set_framesize(FrameSize::Invalid),
        Err(SensorError::InvalidFramesize)
    );
    assert_eq!(
        rig.sensor.set_pixformat(PixFormat::Invalid),
        Err(SensorError::InvalidPixformat)
    );
    assert_eq!(
        rig.sensor.set_framerate(1001),
        Err(SensorError::InvalidFramerate)
    );
    assert_eq!(
        rig.sensor.set_windowing(Rect::new(300, 0, 32, 32)),
        Err(SensorError::InvalidWindow)
    );
    assert_eq!(
        rig.sensor.set_windowing(Rect::new(0, 0, 0, 32)),
        Err(SensorError::InvalidWindow)
    );

    assert_eq!(rig.sensor.descriptor(), &before);
    assert_eq!(rig.hw.events().len(), writes);
    Ok(())
}

#[test]
fn test_unchanged_configure_is_noop() -> Result<(), Box<dyn Error>> {
    let mut rig = rig(&OV2640, 0x26)?;
    rig.sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Bayer)
            .framesize(FrameSize::Qqvga),
    )?;
    rig.sensor.arm()?;
    rig.sensor.set_framesize(FrameSize::Qqvga)?;
    rig.sensor.configure(ChangeSet::new())?;
    assert_eq!(rig.sensor.capture_state(), CaptureState::Armed);
    Ok(())
}

#[test]
fn test_overflow_rolls_back() -> Result<(), Box<dyn Error>> {
    let config = SensorConfig {
        framebuffer_size: 20_000,
        crop_floor_divisor: 2,
        ..fast_config()
    };
    let mut rig = rig_with(&OV2640, 0x26, config)?;
    rig.sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Grayscale)
            .framesize(FrameSize::Qqvga),
    )?;
    let before = rig.sensor.descriptor().clone();

    // grayscale VGA cannot be cropped above the floor and has no fallback
    assert_eq!(
        rig.sensor.set_framesize(FrameSize::Vga),
        Err(SensorError::FramebufferOverflow)
    );
    assert_eq!(rig.sensor.descriptor(), &before);
    assert_eq!(rig.sensor.framesize(), FrameSize::Qqvga);
    assert_eq!(rig.bus.reg(0x60, REG_FRAMESIZE), Some(FrameSize::Qqvga as u16));
    let timing = rig.hw.timing().ok_or("capture not configured")?;
    assert_eq!(timing.frame_width, 160);
    Ok(())
}

#[test]
fn test_peripheral_failure_rolls_back() -> Result<(), Box<dyn Error>> {
    let mut rig = rig(&OV2640, 0x26)?;
    rig.sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Rgb565)
            .framesize(FrameSize::Qqvga),
    )?;

    rig.hw.fail_configure(Some(SensorError::CaptureFailed));
    assert_eq!(
        rig.sensor.configure(
            ChangeSet::new()
                .pixformat(PixFormat::Yuv422)
                .framesize(FrameSize::Qvga)
        ),
        Err(SensorError::CaptureFailed)
    );
    assert_eq!(rig.sensor.pixformat(), PixFormat::Rgb565);
    assert_eq!(rig.sensor.framesize(), FrameSize::Qqvga);
    assert_eq!(rig.bus.reg(0x60, REG_FORMAT), Some(2));
    assert_eq!(rig.bus.reg(0x60, REG_FRAMESIZE), Some(FrameSize::Qqvga as u16));
    Ok(())
}

#[test]
fn test_downgrade_is_not_persistent() -> Result<(), Box<dyn Error>> {
    let config = SensorConfig {
        framebuffer_size: 76_800,
        crop_floor_divisor: 2,
        ..fast_config()
    };
    let mut rig = rig_with(&OV2640, 0x26, config)?;

    rig.sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Rgb565)
            .framesize(FrameSize::Vga),
    )?;
    assert_eq!(rig.sensor.pixformat(), PixFormat::Bayer);
    assert_eq!(rig.sensor.window(), Rect::new(160, 120, 320, 240));
    assert!(rig.sensor.is_cropped());
    assert_eq!(rig.bus.reg(0x60, REG_FORMAT), Some(3));

    let mut img = Image::new(320, 240, PixFormat::Bayer);
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    assert_eq!(img.format(), PixFormat::Bayer);
    assert_eq!(img.len(), 320 * 240);

    // the next negotiation starts from the requested format again
    rig.sensor.set_framesize(FrameSize::Qqvga)?;
    assert_eq!(rig.sensor.pixformat(), PixFormat::Rgb565);
    assert_eq!(rig.sensor.window(), Rect::full(160, 120));
    assert_eq!(rig.bus.reg(0x60, REG_FORMAT), Some(2));
    Ok(())
}

#[test]
fn test_odd_window_keeps_format() -> Result<(), Box<dyn Error>> {
    let config = SensorConfig {
        framebuffer_size: 640 * 480,
        crop_floor_divisor: 8,
        ..fast_config()
    };
    let mut rig = rig_with(&OV2640, 0x26, config)?;
    rig.sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Rgb565)
            .framesize(FrameSize::Vga)
            .window(Rect::new(0, 0, 639, 479)),
    )?;
    assert_eq!(rig.sensor.pixformat(), PixFormat::Rgb565);
    assert_eq!(rig.sensor.window(), Rect::new(96, 72, 446, 334));
    assert_eq!(rig.bus.reg(0x60, REG_FORMAT), Some(2));
    Ok(())
}

#[test]
fn test_jpeg_auto_crop() -> Result<(), Box<dyn Error>> {
    let config = SensorConfig {
        framebuffer_size: 200_000,
        crop_floor_divisor: 2,
        ..fast_config()
    };
    let mut rig = rig_with(&OV2640, 0x26, config)?;
    rig.sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Jpeg)
            .framesize(FrameSize::Vga),
    )?;
    assert_eq!(rig.sensor.pixformat(), PixFormat::Jpeg);
    assert_eq!(rig.sensor.framesize(), FrameSize::Vga);
    assert_eq!(rig.sensor.window(), Rect::new(64, 48, 512, 384));
    assert!(rig.sensor.check_fits());
    assert_eq!(rig.sensor.dst_bpp(), None);

    let timing = rig.hw.timing().ok_or("capture not configured")?;
    assert_eq!(timing.window, Rect::new(64, 48, 512, 384));

    let mut img = Image::new(512, 384, PixFormat::Jpeg);
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    let data = img.as_slice();
    assert_eq!(img.format(), PixFormat::Jpeg);
    assert_eq!(data.len(), 512 * 384 / 8);
    assert_eq!(&data[..2], &[0xFF, 0xD8]);
    assert_eq!(&data[data.len() - 2..], &[0xFF, 0xD9]);
    Ok(())
}

#[test]
fn test_format_capabilities() -> Result<(), Box<dyn Error>> {
    // no JPEG encoder on this family
    let mut ov9650 = rig(&OV9650, 0x96)?;
    assert_eq!(
        ov9650.sensor.set_pixformat(PixFormat::Jpeg),
        Err(SensorError::PixformatUnsupported)
    );

    // raw-only sensor
    let mut pag = rig(&PAG79XX, 0x7920)?;
    assert_eq!(
        pag.sensor.set_pixformat(PixFormat::Rgb565),
        Err(SensorError::PixformatUnsupported)
    );
    pag.sensor.set_pixformat(PixFormat::Bayer)?;
    assert_eq!(pag.sensor.pixformat(), PixFormat::Bayer);

    // transposed output cannot be JPEG
    let mut ov2640 = rig(&OV2640, 0x26)?;
    ov2640.sensor.set_transpose(true)?;
    assert_eq!(
        ov2640.sensor.set_pixformat(PixFormat::Jpeg),
        Err(SensorError::PixformatUnsupported)
    );
    ov2640.sensor.set_transpose(false)?;
    ov2640.sensor.set_pixformat(PixFormat::Jpeg)?;
    assert_eq!(
        ov2640.sensor.set_auto_rotation(true),
        Err(SensorError::PixformatUnsupported)
    );
    Ok(())
}

#[test]
fn test_strict_changes() -> Result<(), Box<dyn Error>> {
    let mut sensor = Sensor::builder()
        .with_bus(SimBus::new().with_chip(&OV2640, 0x26))
        .with_hardware(Arc::new(SimCapture::new()))
        .with_registry(Registry::new().register(OV2640, no_framerate))
        .with_config(fast_config())
        .probe(0, BusSpeed::Standard)?;

    sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Rgb565)
            .framesize(FrameSize::Qvga)
            .framerate(15),
    )?;
    assert_eq!(sensor.framerate(), 15);

    assert_eq!(
        sensor.configure(ChangeSet::new().framerate(20).strict()),
        Err(SensorError::CtlUnsupported)
    );
    assert_eq!(sensor.framerate(), 15);

    sensor.set_framerate(0)?;
    assert_eq!(sensor.framerate(), 0);
    Ok(())
}

#[test]
fn test_framebuffer_split() -> Result<(), Box<dyn Error>> {
    let mut rig = rig(&OV2640, 0x26)?;
    rig.sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Rgb565)
            .framesize(FrameSize::Qvga),
    )?;

    rig.sensor.set_framebuffers(4)?;
    assert_eq!(rig.sensor.framebuffers(), 4);
    assert_eq!(rig.sensor.window(), Rect::full(320, 240));

    rig.sensor.set_framebuffers(8)?;
    assert_eq!(rig.sensor.pixformat(), PixFormat::Rgb565);
    assert_eq!(rig.sensor.window(), Rect::new(48, 36, 224, 168));

    // the crop follows the budget back up
    rig.sensor.set_framebuffers(1)?;
    assert_eq!(rig.sensor.window(), Rect::full(320, 240));

    assert_eq!(
        rig.sensor.set_framebuffers(0),
        Err(SensorError::InvalidArgument)
    );
    assert_eq!(
        rig.sensor.set_framebuffers(1_000_000),
        Err(SensorError::FramebufferError)
    );
    assert_eq!(rig.sensor.framebuffers(), 1);
    Ok(())
}
