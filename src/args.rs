// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_sensor::{
    config::{ConfigError, SensorConfig},
    format::PixFormat,
    image::Rect,
    resolution::FrameSize,
};
use std::{num::ParseIntError, path::PathBuf};

fn parse_int(s: &str) -> Result<u32, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

/// Command-line arguments for the EdgeFirst sensor tool.
///
/// Probes a simulated chip, applies the requested configuration and
/// captures frames through the full sensor pipeline. Arguments can be
/// specified via command line or environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edgefirst-sensor --chip OV2640 --pixformat JPEG --framesize VGA -n 10
///
/// # Via environment variables
/// export SENSOR_CHIP=OV5640
/// export FRAMESIZE=HD
/// edgefirst-sensor
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Sensor configuration file (JSON)
    #[arg(long, env = "SENSOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Chip family of the simulated sensor
    #[arg(long, env = "SENSOR_CHIP", default_value = "OV2640")]
    pub chip: String,

    /// Chip id reported by the simulated sensor, defaults to the family's
    /// first id
    #[arg(long, env = "SENSOR_CHIP_ID", value_parser = parse_int)]
    pub chip_id: Option<u32>,

    /// Bus number to probe
    #[arg(long, env = "SENSOR_BUS", default_value = "0")]
    pub bus: u32,

    /// Run the bus at 400 kHz
    #[arg(long, env = "SENSOR_FAST_BUS")]
    pub fast_bus: bool,

    /// Pixel format (GRAYSCALE, RGB565, BAYER, YUV422, JPEG)
    #[arg(short, long, env = "PIXFORMAT", default_value = "RGB565")]
    pub pixformat: PixFormat,

    /// Frame size name (e.g. QVGA, VGA, HD)
    #[arg(short, long, env = "FRAMESIZE", default_value = "QVGA")]
    pub framesize: FrameSize,

    /// Capture window within the frame (x y width height)
    #[arg(long, env = "WINDOW", value_delimiter = ' ', num_args = 4)]
    pub window: Option<Vec<u32>>,

    /// Target frame rate, 0 for unthrottled
    #[arg(long, env = "FRAMERATE", default_value = "0")]
    pub framerate: u32,

    /// Number of frames to capture
    #[arg(short = 'n', long, env = "FRAMES", default_value = "1")]
    pub frames: u32,

    /// Number of virtual frame buffers, overrides the config file
    #[arg(long, env = "FRAMEBUFFERS")]
    pub framebuffers: Option<usize>,

    /// Frame buffer memory in bytes, overrides the config file
    #[arg(long, env = "FRAMEBUFFER_SIZE")]
    pub framebuffer_size: Option<usize>,

    /// Write the last captured frame to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the sensor descriptor and capture status as JSON
    #[arg(long)]
    pub dump: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl Args {
    /// Builds the session config from the config file and overrides.
    pub fn sensor_config(&self) -> Result<SensorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => SensorConfig::from_json_file(path)?,
            None => SensorConfig::default(),
        };
        if let Some(count) = self.framebuffers {
            config.framebuffers = count;
        }
        if let Some(size) = self.framebuffer_size {
            config.framebuffer_size = size;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn window(&self) -> Option<Rect> {
        match self.window.as_deref() {
            Some(&[x, y, width, height]) => Some(Rect::new(x, y, width, height)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let args = Args::parse_from(["edgefirst-sensor"]);
        assert_eq!(args.pixformat, PixFormat::Rgb565);
        assert_eq!(args.framesize, FrameSize::Qvga);
        assert_eq!(args.frames, 1);
        assert!(args.window().is_none());
    }

    #[test]
    fn parse_window_and_hex_id() {
        let args = Args::parse_from([
            "edgefirst-sensor",
            "--chip-id",
            "0x26",
            "--window",
            "8",
            "4",
            "64",
            "48",
            "--framebuffers",
            "3",
        ]);
        assert_eq!(args.chip_id, Some(0x26));
        assert_eq!(args.window(), Some(Rect::new(8, 4, 64, 48)));
        assert_eq!(args.sensor_config().unwrap().framebuffers, 3);
    }
}
