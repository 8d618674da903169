// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! SCCB/I2C register transport.
//!
//! The bus itself is provided by the platform. Transport failures are
//! reported as [`SensorError::IoError`].

use crate::error::{Result, SensorError};
use serde::{Deserialize, Serialize};

/// Bus clock selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BusSpeed {
    /// 100 kHz.
    #[default]
    Standard,
    /// 400 kHz.
    Fast,
}

impl BusSpeed {
    pub fn hz(self) -> u32 {
        match self {
            BusSpeed::Standard => 100_000,
            BusSpeed::Fast => 400_000,
        }
    }
}

/// Register address and data widths used by a chip family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegFormat {
    /// 8-bit address, 8-bit data (SCCB).
    A8D8,
    /// 16-bit address, 8-bit data.
    A16D8,
    /// 8-bit address, 16-bit data.
    A8D16,
    /// 16-bit address, 16-bit data.
    A16D16,
}

impl RegFormat {
    pub fn addr16(self) -> bool {
        matches!(self, RegFormat::A16D8 | RegFormat::A16D16)
    }

    pub fn data16(self) -> bool {
        matches!(self, RegFormat::A8D16 | RegFormat::A16D16)
    }
}

/// Register transport to the sensor chip.
///
/// # Safety Invariants
///
/// - The bus is owned by exactly one sensor session.
/// - Addresses are 8-bit write addresses as used on the SCCB bus.
pub trait SccbBus: Send {
    /// Initializes the bus peripheral.
    fn init(&mut self, bus_id: u32, speed: BusSpeed) -> Result<()>;

    /// Returns the addresses of all devices that acknowledged.
    fn scan(&mut self) -> Result<Vec<u8>>;

    fn read_reg(&mut self, slv_addr: u8, reg: u16, format: RegFormat) -> Result<u16>;

    fn write_reg(&mut self, slv_addr: u8, reg: u16, value: u16, format: RegFormat) -> Result<()>;
}

/// Register accessor for the probed chip, handed to backends.
pub struct Regs<'a> {
    bus: &'a mut dyn SccbBus,
    slv_addr: u8,
    format: RegFormat,
}

impl<'a> Regs<'a> {
    pub fn new(bus: &'a mut dyn SccbBus, slv_addr: u8, format: RegFormat) -> Self {
        Self {
            bus,
            slv_addr,
            format,
        }
    }

    pub fn slv_addr(&self) -> u8 {
        self.slv_addr
    }

    pub fn read(&mut self, reg: u16) -> Result<u16> {
        self.bus.read_reg(self.slv_addr, reg, self.format)
    }

    pub fn write(&mut self, reg: u16, value: u16) -> Result<()> {
        if !self.format.data16() && value > 0xFF {
            return Err(SensorError::InvalidArgument);
        }
        self.bus.write_reg(self.slv_addr, reg, value, self.format)
    }

    /// Read-modify-write of the bits selected by `mask`.
    pub fn modify(&mut self, reg: u16, mask: u16, value: u16) -> Result<()> {
        let old = self.read(reg)?;
        self.write(reg, (old & !mask) | (value & mask))
    }

    /// Writes a register table in order, stopping at the first failure.
    pub fn write_table(&mut self, table: &[(u16, u16)]) -> Result<()> {
        for &(reg, value) in table {
            self.write(reg, value)?;
        }
        Ok(())
    }
}
