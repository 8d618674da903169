// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Virtual frame buffers.
//!
//! The frame buffer memory is split evenly into `count` buffers. Buffers
//! move from the free list to the capture side, then to the ready FIFO once
//! a frame completes, and back to the free list when the frame is taken or
//! discarded.

use crate::{
    error::{Result, SensorError},
    format::PixFormat,
};
use std::collections::VecDeque;

/// Geometry of a completed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMeta {
    pub width: u32,
    pub height: u32,
    pub pixformat: PixFormat,
    /// Valid bytes, the compressed size for JPEG.
    pub len: usize,
}

struct Slot {
    data: Vec<u8>,
    meta: FrameMeta,
}

pub struct FrameBuffer {
    capacity: usize,
    slots: Vec<Slot>,
    free: VecDeque<usize>,
    ready: VecDeque<usize>,
}

impl FrameBuffer {
    /// Splits `capacity` bytes into `count` buffers.
    pub fn new(capacity: usize, count: usize) -> Result<Self> {
        let mut fb = Self {
            capacity,
            slots: Vec::new(),
            free: VecDeque::new(),
            ready: VecDeque::new(),
        };
        fb.set_count(count)?;
        Ok(fb)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Bytes available to one frame.
    pub fn buffer_size(&self) -> usize {
        match self.slots.len() {
            0 => 0,
            n => self.capacity / n,
        }
    }

    /// Reallocates the buffers, discarding every queued frame.
    pub fn set_count(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(SensorError::InvalidArgument);
        }
        let size = self.capacity / count;
        if size == 0 {
            return Err(SensorError::FramebufferError);
        }
        self.slots = (0..count)
            .map(|_| Slot {
                data: vec![0; size],
                meta: FrameMeta::default(),
            })
            .collect();
        self.reset();
        Ok(())
    }

    /// Returns every buffer to the free list.
    pub fn reset(&mut self) {
        self.ready.clear();
        self.free = (0..self.slots.len()).collect();
    }

    pub(crate) fn acquire(&mut self) -> Option<usize> {
        self.free.pop_front()
    }

    /// Reuses the oldest completed frame for capture, discarding it.
    pub(crate) fn recycle_oldest(&mut self) -> Option<usize> {
        self.ready.pop_front()
    }

    pub(crate) fn data_mut(&mut self, idx: usize) -> &mut [u8] {
        &mut self.slots[idx].data
    }

    pub(crate) fn data(&self, idx: usize) -> &[u8] {
        let slot = &self.slots[idx];
        &slot.data[..slot.meta.len.min(slot.data.len())]
    }

    pub(crate) fn meta(&self, idx: usize) -> FrameMeta {
        self.slots[idx].meta
    }

    /// Queues a completed frame.
    pub(crate) fn commit(&mut self, idx: usize, meta: FrameMeta) {
        self.slots[idx].meta = meta;
        self.ready.push_back(idx);
    }

    pub(crate) fn release(&mut self, idx: usize) {
        if !self.free.contains(&idx) {
            self.free.push_back(idx);
        }
    }

    /// Dequeues the oldest completed frame.
    pub(crate) fn take(&mut self) -> Option<usize> {
        self.ready.pop_front()
    }

    /// Puts a frame back at the head of the FIFO.
    pub(crate) fn untake(&mut self, idx: usize) {
        self.ready.push_front(idx);
    }

    /// Completed frames waiting to be taken.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Discards queued frames, keeping the newest one when `keep_latest` is
    /// set. Returns the number of frames discarded.
    pub fn flush(&mut self, keep_latest: bool) -> usize {
        let keep = usize::from(keep_latest).min(self.ready.len());
        let discard = self.ready.len() - keep;
        for _ in 0..discard {
            if let Some(idx) = self.ready.pop_front() {
                self.free.push_back(idx);
            }
        }
        discard
    }
}
