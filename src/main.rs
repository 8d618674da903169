// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use edgefirst_sensor::{
    backend::FAMILIES,
    bus::BusSpeed,
    image::Image,
    sensor::{ChangeSet, Sensor, SnapshotFlags},
    sim::{self, SimBus, SimCapture},
};
use serde_json::json;
use std::{error::Error, fs, sync::Arc, time::Instant};
use tracing::{debug, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    };

    let stdout_log = tracing_subscriber::fmt::layer().with_filter(filter());
    let journald = tracing_journald::layer()
        .ok()
        .map(|layer| layer.with_filter(filter()));
    let tracy = if args.tracy {
        tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default().with_filter(filter()))
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(stdout_log)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let config = args.sensor_config()?;
    let family = FAMILIES
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(&args.chip))
        .ok_or_else(|| format!("unknown chip family {}", args.chip))?;
    let chip_id = args
        .chip_id
        .or_else(|| family.ids.first().copied())
        .ok_or("chip family has no chip id")?;
    let speed = if args.fast_bus {
        BusSpeed::Fast
    } else {
        BusSpeed::Standard
    };

    let hw = Arc::new(SimCapture::new());
    let mut sensor = Sensor::builder()
        .with_bus(SimBus::new().with_chip(family, chip_id))
        .with_hardware(hw.clone())
        .with_registry(sim::registry())
        .with_config(config)
        .probe(args.bus, speed)?;

    let mut changes = ChangeSet::new()
        .pixformat(args.pixformat)
        .framesize(args.framesize)
        .framerate(args.framerate);
    if let Some(window) = args.window() {
        changes = changes.window(window);
    }
    sensor.configure(changes)?;
    let window = sensor.window();
    info!(
        pixformat = %sensor.pixformat(),
        %window,
        cropped = sensor.is_cropped(),
        "ready"
    );

    let mut image = Image::new(window.width, window.height, sensor.pixformat());
    let flags = SnapshotFlags {
        keep_armed: args.frames > 1,
        fresh: false,
    };
    let start = Instant::now();
    for frame in 0..args.frames {
        sensor.snapshot(&mut image, flags)?;
        debug!(frame, %image, "snapshot");
    }
    sensor.abort(true, false)?;
    info!(
        frames = args.frames,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "capture done"
    );

    if let Some(path) = &args.output {
        fs::write(path, image.as_slice())?;
        info!(path = %path.display(), bytes = image.len(), "wrote frame");
    }

    if args.dump {
        let dump = json!({
            "descriptor": sensor.descriptor(),
            "status": sensor.capture_status(),
            "framebuffers": sensor.framebuffers(),
            "xclk_hz": sensor.xclk_frequency(),
        });
        println!("{}", serde_json::to_string_pretty(&dump)?);
    }

    Ok(())
}
