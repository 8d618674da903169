// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Result, SensorError},
    format::PixFormat,
};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Rectangle used for windowing operations.
///
/// Defines a rectangular region within the sensor frame, used for the
/// capture window, the readout window and motion-detection windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// X coordinate of top-left corner
    pub x: u32,
    /// Y coordinate of top-left corner
    pub y: u32,
    /// Width of the rectangle in pixels
    pub width: u32,
    /// Height of the rectangle in pixels
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Full frame rectangle anchored at the origin.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the rectangle lies within a `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty()
            && u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Destination image filled by a snapshot.
///
/// The buffer has a fixed capacity chosen by the caller; a snapshot whose
/// negotiated frame does not fit is rejected with
/// [`SensorError::FramebufferError`].
///
/// # Example
///
/// ```
/// use edgefirst_sensor::{image::Image, format::PixFormat};
///
/// let img = Image::new(320, 240, PixFormat::Rgb565);
/// assert_eq!(img.capacity(), 320 * 240 * 2);
/// assert_eq!(img.len(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Image {
    width: u32,
    height: u32,
    format: PixFormat,
    capacity: usize,
    data: Vec<u8>,
}

/// Bytes in one row of a frame, `None` when rows have no fixed size.
pub const fn format_row_stride(format: PixFormat, width: u32) -> Option<usize> {
    match format {
        PixFormat::Grayscale | PixFormat::Bayer => Some(width as usize),
        PixFormat::Rgb565 | PixFormat::Yuv422 => Some(2 * width as usize),
        PixFormat::Jpeg | PixFormat::Invalid => None,
    }
}

/// Bytes in a whole frame, bounded at one byte per pixel for JPEG.
pub const fn image_size(width: u32, height: u32, format: PixFormat) -> usize {
    match format_row_stride(format, width) {
        Some(stride) => stride * height as usize,
        None => match format {
            PixFormat::Jpeg => width as usize * height as usize,
            _ => 0,
        },
    }
}

impl Image {
    /// Creates an empty image able to hold a `width` x `height` frame in
    /// `format`.
    pub fn new(width: u32, height: u32, format: PixFormat) -> Self {
        Self::with_capacity(image_size(width, height, format))
    }

    /// Creates an empty image with a raw byte capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixFormat::Invalid,
            capacity,
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixFormat {
        self.format
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid bytes, the compressed size for JPEG.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Replaces the contents with a completed frame.
    pub(crate) fn fill(
        &mut self,
        width: u32,
        height: u32,
        format: PixFormat,
        bytes: &[u8],
    ) -> Result<()> {
        if bytes.len() > self.capacity {
            return Err(SensorError::FramebufferError);
        }
        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.width = width;
        self.height = height;
        self.format = format;
        Ok(())
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} {}/{} bytes",
            self.width,
            self.height,
            self.format,
            self.data.len(),
            self.capacity
        )
    }
}
