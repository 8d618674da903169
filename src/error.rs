// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sensor status codes.
//!
//! Every failure in this crate is one of a closed set of negative status
//! codes. The numeric values are stable and shared with firmware consumers,
//! so `SensorError::code()` round-trips through `SensorError::from_code()`.
//!
//! The codes fall into six groups:
//!
//! - **Control**: `CtlFailed`, `CtlUnsupported`. The backend rejected the
//!   request or has no implementation for it.
//! - **Detection/init**: `IscUndetected`, `IscUnsupported`, `IscInitFailed`,
//!   `TimInitFailed`, `DmaInitFailed`, `CsiInitFailed`. Fatal to the probe.
//! - **Transport**: `IoError`.
//! - **Capture**: `CaptureFailed`, `CaptureTimeout`. The frame is discarded
//!   and the capture machine is idle again.
//! - **Validation**: `InvalidFramesize`, `InvalidPixformat`, `InvalidWindow`,
//!   `InvalidFramerate`, `InvalidArgument`, `PixformatUnsupported`. Nothing
//!   was written to hardware.
//! - **Resources**: `FramebufferError`, `FramebufferOverflow`,
//!   `JpegOverflow`.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = SensorError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SensorError {
    #[error("Control failed.")]
    CtlFailed = -1,
    #[error("The function is not supported by the image sensor.")]
    CtlUnsupported = -2,
    #[error("Failed to detect the image sensor or image sensor is detached.")]
    IscUndetected = -3,
    #[error("The detected image sensor is not supported.")]
    IscUnsupported = -4,
    #[error("Failed to initialize the image sensor.")]
    IscInitFailed = -5,
    #[error("Failed to initialize the external clock.")]
    TimInitFailed = -6,
    #[error("Failed to initialize the camera DMA.")]
    DmaInitFailed = -7,
    #[error("Failed to initialize the CSI interface.")]
    CsiInitFailed = -8,
    #[error("A low level I/O error has occurred.")]
    IoError = -9,
    #[error("Frame capture has failed.")]
    CaptureFailed = -10,
    #[error("Frame capture has timed out.")]
    CaptureTimeout = -11,
    #[error("Invalid framesize.")]
    InvalidFramesize = -12,
    #[error("Invalid pixformat.")]
    InvalidPixformat = -13,
    #[error("Invalid window.")]
    InvalidWindow = -14,
    #[error("Invalid framerate.")]
    InvalidFramerate = -15,
    #[error("Invalid argument.")]
    InvalidArgument = -16,
    #[error("The FB pixel format is not supported.")]
    PixformatUnsupported = -17,
    #[error("Frame buffer error.")]
    FramebufferError = -18,
    #[error("Frame buffer overflow, try reducing the frame size.")]
    FramebufferOverflow = -19,
    #[error("JPEG frame buffer overflow.")]
    JpegOverflow = -20,
}

const ALL: [SensorError; 20] = [
    SensorError::CtlFailed,
    SensorError::CtlUnsupported,
    SensorError::IscUndetected,
    SensorError::IscUnsupported,
    SensorError::IscInitFailed,
    SensorError::TimInitFailed,
    SensorError::DmaInitFailed,
    SensorError::CsiInitFailed,
    SensorError::IoError,
    SensorError::CaptureFailed,
    SensorError::CaptureTimeout,
    SensorError::InvalidFramesize,
    SensorError::InvalidPixformat,
    SensorError::InvalidWindow,
    SensorError::InvalidFramerate,
    SensorError::InvalidArgument,
    SensorError::PixformatUnsupported,
    SensorError::FramebufferError,
    SensorError::FramebufferOverflow,
    SensorError::JpegOverflow,
];

impl SensorError {
    /// Negative status code of this error.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Maps a status code back to its error. `0` and unknown codes map to
    /// `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        ALL.iter().copied().find(|e| e.code() == code)
    }

    /// True for the validation group, which never touches hardware.
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            SensorError::InvalidFramesize
                | SensorError::InvalidPixformat
                | SensorError::InvalidWindow
                | SensorError::InvalidFramerate
                | SensorError::InvalidArgument
                | SensorError::PixformatUnsupported
        )
    }
}

/// Converts a raw status code into a human readable message.
pub fn strerror(code: i32) -> String {
    match code {
        0 => "Success.".to_string(),
        _ => match SensorError::from_code(code) {
            Some(e) => e.to_string(),
            None => "Unknown error.".to_string(),
        },
    }
}

/// Converts a `Result` into the raw status code used by firmware consumers.
pub fn status<T>(res: &Result<T>) -> i32 {
    match res {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_contiguous() {
        for (i, e) in ALL.iter().enumerate() {
            assert_eq!(e.code(), -(i as i32) - 1);
            assert_eq!(SensorError::from_code(e.code()), Some(*e));
        }
        assert_eq!(SensorError::from_code(0), None);
        assert_eq!(SensorError::from_code(-21), None);
    }

    #[test]
    fn strerror_lookup() {
        assert_eq!(strerror(0), "Success.");
        assert_eq!(strerror(-2), "The function is not supported by the image sensor.");
        assert_eq!(strerror(-19), "Frame buffer overflow, try reducing the frame size.");
        assert_eq!(strerror(7), "Unknown error.");
    }

    #[test]
    fn status_of_result() {
        assert_eq!(status(&Ok::<_, SensorError>(())), 0);
        assert_eq!(status::<()>(&Err(SensorError::IoError)), -9);
    }
}
