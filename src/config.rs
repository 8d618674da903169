// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Session settings fixed at probe time.
///
/// Every field has a default so partial JSON documents are accepted.
///
/// ```
/// use edgefirst_sensor::config::SensorConfig;
///
/// let cfg: SensorConfig = serde_json::from_str(r#"{ "framebuffers": 3 }"#).unwrap();
/// assert_eq!(cfg.framebuffers, 3);
/// assert_eq!(cfg.frame_timeout_ms, 3000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Total frame buffer memory in bytes, split across `framebuffers`.
    pub framebuffer_size: usize,
    /// Number of virtual frame buffers.
    pub framebuffers: usize,
    /// Keep one completed frame on flush and drop new frames when every
    /// buffer is full.
    pub disable_full_flush: bool,
    /// Skip settling delays in backends.
    pub disable_delays: bool,
    /// Longest wait for a frame start during snapshot.
    pub frame_timeout_ms: u64,
    /// Consecutive throttled or buffer-starved frames tolerated by one
    /// snapshot.
    pub max_dropped_frames: u32,
    /// Auto-crop never shrinks a window below the frame size divided by
    /// this value.
    pub crop_floor_divisor: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            framebuffer_size: 640 * 480 * 2,
            framebuffers: 1,
            disable_full_flush: false,
            disable_delays: false,
            frame_timeout_ms: 3000,
            max_dropped_frames: 8,
            crop_floor_divisor: 4,
        }
    }
}

impl SensorConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let cfg: SensorConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.framebuffers == 0 {
            return Err(ConfigError::Invalid("framebuffers must be at least 1"));
        }
        if self.framebuffer_size < self.framebuffers {
            return Err(ConfigError::Invalid("framebuffer_size too small"));
        }
        if self.crop_floor_divisor == 0 {
            return Err(ConfigError::Invalid("crop_floor_divisor must be at least 1"));
        }
        Ok(())
    }
}
