//! CPU-side view of a completed occupancy target

use crate::consts::*;

/// Read-only view over a mapped RGBA8 readback buffer.
///
/// Only ever handed out inside [`FrameSync::read_current`](super::FrameSync::read_current),
/// after the slot's fence has been observed complete.
#[derive(Debug, Clone, Copy)]
pub struct OccupancyBitmap<'a> {
    bytes: &'a [u8],
    width: u32,
    height: u32,
    row_pitch: usize,
}

impl<'a> OccupancyBitmap<'a> {
    /// Canvas-sized view with tightly packed rows
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_layout(bytes, WIDTH, HEIGHT, ROW_PITCH)
    }

    pub fn with_layout(bytes: &'a [u8], width: u32, height: u32, row_pitch: usize) -> Self {
        debug_assert!(row_pitch >= width as usize * BYTES_PER_PIXEL);
        Self {
            bytes,
            width,
            height,
            row_pitch,
        }
    }

    /// Stored intensity of `channel` at pixel (x, y).
    ///
    /// Anything outside the canvas (or the buffer) reads as 0.
    #[inline]
    pub fn check(&self, x: i32, y: i32, channel: usize) -> u8 {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return 0;
        }
        if channel >= BYTES_PER_PIXEL {
            return 0;
        }
        let index = y as usize * self.row_pitch + x as usize * BYTES_PER_PIXEL + channel;
        self.bytes.get(index).copied().unwrap_or(0)
    }

    #[inline]
    pub fn is_occupied(&self, x: i32, y: i32, channel: usize) -> bool {
        self.check(x, y, channel) != 0
    }
}
