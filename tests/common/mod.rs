// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

#![allow(dead_code)]

use edgefirst_sensor::{
    backend::SensorFamily,
    bus::BusSpeed,
    config::SensorConfig,
    error::SensorError,
    sensor::Sensor,
    sim::{self, SimBus, SimCapture},
};
use std::sync::Arc;

pub struct Rig {
    pub sensor: Sensor,
    pub hw: Arc<SimCapture>,
    pub bus: SimBus,
}

pub fn fast_config() -> SensorConfig {
    SensorConfig {
        disable_delays: true,
        ..Default::default()
    }
}

/// Probes a simulated `family` chip with the sim backend bound to every
/// family.
pub fn rig_with(family: &SensorFamily, chip_id: u32, config: SensorConfig) -> Result<Rig, SensorError> {
    let hw = Arc::new(SimCapture::new());
    let bus = SimBus::new().with_chip(family, chip_id);
    let sensor = Sensor::builder()
        .with_bus(bus.clone())
        .with_hardware(hw.clone())
        .with_registry(sim::registry())
        .with_config(config)
        .probe(0, BusSpeed::Standard)?;
    Ok(Rig { sensor, hw, bus })
}

pub fn rig(family: &SensorFamily, chip_id: u32) -> Result<Rig, SensorError> {
    rig_with(family, chip_id, fast_config())
}
