//! The device seam: everything the frame synchronizer needs from a GPU
//!
//! Implemented by [`WgpuDevice`](super::WgpuDevice) for real hardware and by
//! [`SoftDevice`](super::SoftDevice), a worker-thread rasterizer with the
//! same asynchronous submit/signal/wait behavior.

use super::bitmap::OccupancyBitmap;
use super::occupancy::EntityInstance;
use crate::error::GpuError;

/// A GPU timeline with per-slot resources and completion fences.
///
/// Methods take the slot's resources explicitly; the device never decides
/// which slot is current. Selection happens at compile time through
/// `FrameSync<D>`, so none of this needs to be object safe.
pub trait Device {
    /// Monotonic completion counter the device advances as work retires
    type Fence;
    /// One frame slot's resources: command recording state, occupancy
    /// target, readback buffer and instance buffer
    type Frame;

    fn create_fence(&mut self) -> Result<Self::Fence, GpuError>;

    /// Allocate slot `index`, sized for `capacity` instances
    fn create_frame(&mut self, index: usize, capacity: usize) -> Result<Self::Frame, GpuError>;

    /// Last value the device reported complete on this fence
    fn completed_value(&self, fence: &Self::Fence) -> u64;

    /// Block the calling thread until `fence` reaches `value`. Unbounded.
    fn wait(&mut self, fence: &Self::Fence, value: u64) -> Result<(), GpuError>;

    /// Enqueue a signal of `value` behind all work submitted so far
    fn signal(&mut self, fence: &mut Self::Fence, value: u64) -> Result<(), GpuError>;

    /// Discard previously recorded commands and open the slot for recording
    fn reset(&mut self, frame: &mut Self::Frame) -> Result<(), GpuError>;

    /// Record: clear target, one instanced draw, copy target into readback
    fn record(&mut self, frame: &mut Self::Frame, instances: &[EntityInstance])
    -> Result<(), GpuError>;

    /// Close the recorded commands and hand them to the device
    fn execute(&mut self, frame: &mut Self::Frame) -> Result<(), GpuError>;

    /// Map the slot's readback buffer, run `f` over it, unmap.
    ///
    /// Only valid once the slot's fence confirmed its last render complete.
    fn read<R>(
        &mut self,
        frame: &mut Self::Frame,
        f: impl FnOnce(&OccupancyBitmap<'_>) -> R,
    ) -> Result<R, GpuError>;
}
