// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst Image Sensor Abstraction Layer
//!
//! This library drives interchangeable camera and thermal sensor chips
//! through one session API. Chip drivers plug in as backends that implement
//! only the operations their hardware supports; the library takes care of
//! probing, format and window negotiation, frame buffer sizing, capture and
//! abort across interrupt and task context, and the extensible IOCTL
//! channel.
//!
//! ## Features
//!
//! - **Probing**: Scan the bus, identify the chip family by its chip-id
//!   register and bind the registered backend.
//! - **Negotiation**: Apply pixel format, frame size, window and frame rate
//!   as one step with rollback on failure.
//! - **Auto-Crop**: Keep every frame within the per-buffer memory budget by
//!   cropping the window around its center, or switching to Bayer.
//! - **Capture**: Line-by-line capture into rotating virtual frame buffers,
//!   frame rate throttling and abort from interrupt context.
//! - **IOCTL**: Typed requests for readout windows, focus, thermal
//!   radiometry, motion detection and vendor extensions.
//!
//! ## Example
//!
//! ```
//! use edgefirst_sensor::{
//!     backend::OV2640,
//!     bus::BusSpeed,
//!     format::PixFormat,
//!     image::Image,
//!     resolution::FrameSize,
//!     sensor::{ChangeSet, Sensor, SnapshotFlags},
//!     sim::{self, SimBus, SimCapture},
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sensor = Sensor::builder()
//!     .with_bus(SimBus::new().with_chip(&OV2640, 0x26))
//!     .with_hardware(Arc::new(SimCapture::new()))
//!     .with_registry(sim::registry())
//!     .probe(0, BusSpeed::Standard)?;
//!
//! sensor.configure(
//!     ChangeSet::new()
//!         .pixformat(PixFormat::Rgb565)
//!         .framesize(FrameSize::Qvga),
//! )?;
//!
//! let mut img = Image::new(320, 240, PixFormat::Rgb565);
//! sensor.snapshot(&mut img, SnapshotFlags::default())?;
//! assert_eq!(img.len(), 320 * 240 * 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Integration
//!
//! A platform provides three things: an [`bus::SccbBus`] for register
//! access, a [`capture::CaptureHardware`] for the camera interface, and
//! optionally a [`capture::LineDma`] for accelerated line copies. Interrupt
//! handlers forward frame events through [`capture::IrqHandle`].

pub mod backend;
pub mod bus;
pub mod capture;
pub mod config;
pub mod controls;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod framebuffer;
pub mod image;
pub mod ioctl;
pub mod resolution;
pub mod sensor;
pub mod sim;
pub mod sizing;

pub use error::{Result, SensorError};
pub use sensor::Sensor;
