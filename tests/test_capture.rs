// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod common;

use common::{fast_config, rig, rig_with, Rig};
use edgefirst_sensor::{
    backend::OV2640,
    capture::{CaptureState, FrameEnd},
    config::SensorConfig,
    error::SensorError,
    format::PixFormat,
    image::{Image, Rect},
    resolution::FrameSize,
    sensor::{ChangeSet, SnapshotFlags},
    sim::SimEvent,
};
use serial_test::serial;
use std::{
    error::Error,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

fn configured(pixformat: PixFormat, framesize: FrameSize) -> Result<Rig, Box<dyn Error>> {
    let mut rig = rig(&OV2640, 0x26)?;
    rig.sensor
        .configure(ChangeSet::new().pixformat(pixformat).framesize(framesize))?;
    Ok(rig)
}

/// Expected byte of the sim test pattern.
fn pattern(x: usize, y: usize, frame: u32) -> u8 {
    (x as u32).wrapping_add(y as u32).wrapping_add(frame) as u8
}

#[test]
fn test_snapshot_pattern() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Rgb565, FrameSize::Qqvga)?;
    let mut img = Image::new(160, 120, PixFormat::Rgb565);

    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    println!("{}", img);
    assert_eq!((img.width(), img.height()), (160, 120));
    assert_eq!(img.format(), PixFormat::Rgb565);
    assert_eq!(img.len(), 160 * 120 * 2);
    let data = img.as_slice();
    for (y, row) in data.chunks_exact(320).enumerate() {
        for (x, &b) in row.iter().enumerate() {
            assert_eq!(b, pattern(x, y, 0), "byte {} of row {}", x, y);
        }
    }
    assert_eq!(rig.sensor.capture_state(), CaptureState::Idle);
    assert!(!rig.hw.is_running());

    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    assert_eq!(img.as_slice()[0], pattern(0, 0, 1));
    Ok(())
}

#[test]
fn test_snapshot_window() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Rgb565, FrameSize::Qvga)?;
    rig.sensor.set_windowing(Rect::new(8, 4, 64, 48))?;
    let mut img = Image::new(64, 48, PixFormat::Rgb565);

    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    assert_eq!((img.width(), img.height()), (64, 48));
    for (row, line) in img.as_slice().chunks_exact(128).enumerate() {
        for (i, &b) in line.iter().enumerate() {
            assert_eq!(b, pattern(16 + i, 4 + row, 0));
        }
    }
    Ok(())
}

#[test]
fn test_snapshot_grayscale_from_yuv() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Grayscale, FrameSize::Qqqvga)?;
    assert_eq!(rig.sensor.src_bpp(), 2);

    // luma in even bytes, chroma in odd bytes
    let frame: Vec<u8> = (0..60u8)
        .flat_map(|y| (0..80).flat_map(move |_| [y, 0xEE]))
        .collect();
    rig.hw.push_frame(frame);

    let mut img = Image::new(80, 60, PixFormat::Grayscale);
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    assert_eq!(img.len(), 80 * 60);
    for (y, row) in img.as_slice().chunks_exact(80).enumerate() {
        assert!(row.iter().all(|&b| b == y as u8));
    }
    Ok(())
}

#[test]
fn test_snapshot_image_too_small() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Rgb565, FrameSize::Qvga)?;
    let mut img = Image::new(160, 120, PixFormat::Rgb565);
    assert_eq!(
        rig.sensor.snapshot(&mut img, SnapshotFlags::default()),
        Err(SensorError::FramebufferError)
    );

    let mut unconfigured = common::rig(&OV2640, 0x26)?;
    assert_eq!(
        unconfigured.sensor.snapshot(&mut img, SnapshotFlags::default()),
        Err(SensorError::InvalidPixformat)
    );
    Ok(())
}

#[test]
fn test_throttle() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    rig.sensor.set_framerate(30)?;
    let mut img = Image::new(80, 60, PixFormat::Bayer);
    let armed = SnapshotFlags {
        keep_armed: true,
        ..Default::default()
    };

    // frames arrive every 10 ms, a 30 fps target keeps one in four
    rig.sensor.snapshot(&mut img, armed)?;
    assert_eq!(rig.sensor.capture_status().last_frame_ms, Some(10));
    rig.sensor.snapshot(&mut img, armed)?;

    let status = rig.sensor.capture_status();
    assert_eq!(status.frame_count, 5);
    assert_eq!(status.last_frame_ms, Some(43));
    assert_eq!(img.as_slice()[0], pattern(0, 0, 4));
    Ok(())
}

#[test]
fn test_abort_restarts_throttle() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    rig.sensor.set_framerate(30)?;
    let mut img = Image::new(80, 60, PixFormat::Bayer);

    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    assert_eq!(rig.sensor.capture_status().last_frame_ms, None);
    rig.sensor.abort(true, false)?;

    // the first frame after an abort is never throttled
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    let status = rig.sensor.capture_status();
    assert_eq!(status.frame_count, 2);
    assert_eq!(status.last_frame_ms, None);
    assert_eq!(img.as_slice()[0], pattern(0, 0, 1));
    Ok(())
}

#[test]
fn test_throttle_outside_capture() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    rig.sensor.set_framerate(30)?;
    let mut img = Image::new(80, 60, PixFormat::Bayer);
    rig.sensor.snapshot(
        &mut img,
        SnapshotFlags {
            keep_armed: true,
            ..Default::default()
        },
    )?;
    assert_eq!(rig.sensor.capture_state(), CaptureState::Armed);

    // between frames there is nothing to drop
    assert!(!rig.sensor.throttle_framerate());
    let status = rig.sensor.capture_status();
    assert_eq!(status.last_frame_ms, Some(10));
    assert!(!status.drop_frame);

    let irq = rig.sensor.irq_handle();
    assert!(irq.frame_start());
    rig.hw.advance(5);
    assert!(rig.sensor.throttle_framerate());
    assert!(rig.sensor.capture_status().drop_frame);
    rig.sensor.abort(true, false)?;
    assert!(!rig.sensor.capture_status().drop_frame);
    Ok(())
}

#[test]
fn test_throttle_gives_up() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    rig.sensor.set_framerate(1)?;
    let mut img = Image::new(80, 60, PixFormat::Bayer);

    rig.sensor.snapshot(
        &mut img,
        SnapshotFlags {
            keep_armed: true,
            ..Default::default()
        },
    )?;
    assert_eq!(
        rig.sensor.snapshot(&mut img, SnapshotFlags::default()),
        Err(SensorError::CaptureTimeout)
    );
    assert_eq!(rig.sensor.capture_state(), CaptureState::Idle);
    Ok(())
}

#[test]
fn test_timeout() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    rig.hw.set_pattern(false);
    let mut img = Image::new(80, 60, PixFormat::Bayer);
    assert_eq!(
        rig.sensor.snapshot(&mut img, SnapshotFlags::default()),
        Err(SensorError::CaptureTimeout)
    );
    assert_eq!(rig.sensor.capture_state(), CaptureState::Idle);
    assert!(!rig.hw.is_running());
    Ok(())
}

#[test]
fn test_line_failure() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    rig.hw.fail_line(Some(7));
    let mut img = Image::new(80, 60, PixFormat::Bayer);
    assert_eq!(
        rig.sensor.snapshot(&mut img, SnapshotFlags::default()),
        Err(SensorError::CaptureFailed)
    );
    assert_eq!(rig.sensor.capture_state(), CaptureState::Idle);

    rig.hw.fail_line(None);
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    Ok(())
}

#[test]
fn test_short_frame() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    rig.hw.set_pattern(false);
    rig.hw.push_frame(vec![0; 80 * 30]);
    let mut img = Image::new(80, 60, PixFormat::Bayer);
    assert_eq!(
        rig.sensor.snapshot(&mut img, SnapshotFlags::default()),
        Err(SensorError::CaptureFailed)
    );
    Ok(())
}

#[test]
fn test_jpeg_overflow() -> Result<(), Box<dyn Error>> {
    let config = SensorConfig {
        framebuffer_size: 20_000,
        ..fast_config()
    };
    let mut rig = rig_with(&OV2640, 0x26, config)?;
    rig.sensor.configure(
        ChangeSet::new()
            .pixformat(PixFormat::Jpeg)
            .framesize(FrameSize::Qqvga),
    )?;
    assert!(!rig.sensor.is_cropped());

    rig.hw.set_jpeg_len(Some(25_000));
    let mut img = Image::new(160, 120, PixFormat::Jpeg);
    assert_eq!(
        rig.sensor.snapshot(&mut img, SnapshotFlags::default()),
        Err(SensorError::JpegOverflow)
    );
    assert_eq!(rig.sensor.capture_state(), CaptureState::Idle);

    rig.hw.set_jpeg_len(Some(1_000));
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    assert_eq!(img.len(), 1_000);
    Ok(())
}

#[test]
fn test_callbacks() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    let vsync = Arc::new(AtomicU32::new(0));
    let frames = Arc::new(AtomicU32::new(0));
    {
        let vsync = vsync.clone();
        rig.sensor
            .set_vsync_callback(Some(Arc::new(move |n: u32| vsync.store(n, Ordering::SeqCst))));
        let frames = frames.clone();
        rig.sensor.set_frame_callback(Some(Arc::new(move || {
            frames.fetch_add(1, Ordering::SeqCst);
        })));
    }

    let mut img = Image::new(80, 60, PixFormat::Bayer);
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    assert_eq!(vsync.load(Ordering::SeqCst), 2);
    assert_eq!(frames.load(Ordering::SeqCst), 2);

    rig.sensor.set_vsync_callback(None);
    rig.sensor.set_frame_callback(None);
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    assert_eq!(frames.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
#[serial]
fn test_abort_is_idempotent() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    rig.sensor.abort(true, false)?;
    rig.sensor.abort(false, true)?;
    assert!(!rig.hw.events().contains(&SimEvent::Start));
    assert!(!rig.hw.events().contains(&SimEvent::Stop));

    rig.sensor.arm()?;
    assert_eq!(rig.sensor.capture_state(), CaptureState::Armed);
    assert!(rig.hw.irqs_enabled());

    rig.hw.clear_events();
    rig.sensor.abort(true, false)?;
    let events = rig.hw.events();
    assert_eq!(events.first(), Some(&SimEvent::DisableIrqs));
    let stop = events
        .iter()
        .position(|e| *e == SimEvent::Stop)
        .ok_or("peripheral not stopped")?;
    assert!(!events[stop..].contains(&SimEvent::EnableIrqs));
    assert!(!rig.hw.irqs_enabled());
    assert_eq!(rig.sensor.capture_state(), CaptureState::Idle);

    rig.hw.clear_events();
    rig.sensor.abort(true, false)?;
    assert!(!rig.hw.events().contains(&SimEvent::Stop));
    Ok(())
}

#[test]
#[serial]
fn test_abort_from_interrupt() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    let irq = rig.sensor.irq_handle();
    rig.hw.on_line(move |line| {
        if line == 10 {
            irq.abort(true);
        }
    });

    let mut img = Image::new(80, 60, PixFormat::Bayer);
    assert_eq!(
        rig.sensor.snapshot(&mut img, SnapshotFlags::default()),
        Err(SensorError::CaptureFailed)
    );
    assert_eq!(rig.sensor.capture_state(), CaptureState::Idle);
    assert!(!rig.hw.is_running());
    assert!(img.is_empty());

    rig.hw.on_line(|_| {});
    rig.sensor.snapshot(&mut img, SnapshotFlags::default())?;
    assert_eq!(img.len(), 80 * 60);
    Ok(())
}

#[test]
fn test_interrupt_driven_capture() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Grayscale, FrameSize::Qqqvga)?;
    rig.sensor.set_framebuffers(2)?;
    let irq = rig.sensor.irq_handle();
    let mut img = Image::new(80, 60, PixFormat::Grayscale);

    // events before arming are ignored
    assert!(!irq.frame_start());
    assert_eq!(irq.frame_end(), FrameEnd::Idle);

    rig.sensor.arm()?;
    assert_eq!(irq.state(), CaptureState::Armed);
    for frame in 0..3u8 {
        assert!(irq.frame_start());
        assert_eq!(irq.state(), CaptureState::Capturing);
        for y in 0..60u8 {
            let line: Vec<u8> = (0..80).flat_map(|_| [frame * 60 + y, 0]).collect();
            irq.line(&line)?;
        }
        assert_eq!(irq.frame_end(), FrameEnd::Committed);
    }
    // two buffers, the oldest frame was recycled for the third
    assert_eq!(rig.sensor.capture_status().ready, 2);

    assert!(rig.sensor.take_frame(&mut img)?);
    assert_eq!(img.as_slice()[0], 60);
    assert!(rig.sensor.take_frame(&mut img)?);
    assert_eq!(img.as_slice()[80 * 59], 179);
    assert!(!rig.sensor.take_frame(&mut img)?);

    rig.sensor.abort(true, false)?;
    assert!(!irq.frame_start());
    Ok(())
}

#[test]
fn test_keep_armed_queue() -> Result<(), Box<dyn Error>> {
    let mut rig = configured(PixFormat::Bayer, FrameSize::Qqqvga)?;
    rig.sensor.set_framebuffers(3)?;
    let irq = rig.sensor.irq_handle();
    let mut img = Image::new(80, 60, PixFormat::Bayer);
    let keep = SnapshotFlags {
        keep_armed: true,
        fresh: false,
    };

    rig.sensor.snapshot(&mut img, keep)?;
    assert_eq!(rig.sensor.capture_state(), CaptureState::Armed);

    // a frame completes in the background while armed
    assert!(irq.frame_start());
    for _ in 0..60 {
        irq.line(&[7; 80])?;
    }
    assert_eq!(irq.frame_end(), FrameEnd::Committed);

    rig.sensor.snapshot(&mut img, keep)?;
    assert!(img.as_slice().iter().all(|&b| b == 7));

    // fresh discards queued frames before waiting
    assert!(irq.frame_start());
    for _ in 0..60 {
        irq.line(&[9; 80])?;
    }
    assert_eq!(irq.frame_end(), FrameEnd::Committed);
    rig.sensor.snapshot(
        &mut img,
        SnapshotFlags {
            keep_armed: false,
            fresh: true,
        },
    )?;
    assert_ne!(img.as_slice()[0], 9);
    assert_eq!(rig.sensor.capture_state(), CaptureState::Idle);
    Ok(())
}
