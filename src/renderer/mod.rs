//! Occupancy rendering module
//!
//! Renders both groups as filled circles into an off-screen RGBA8 target per
//! frame slot, pipelined `FRAME_COUNT` frames deep, and exposes the completed
//! targets to the CPU as occupancy bitmaps.

pub mod bitmap;
pub mod device;
pub mod frame_sync;
pub mod occupancy;
pub mod soft;
pub mod wgpu_device;

pub use bitmap::OccupancyBitmap;
pub use device::Device;
pub use frame_sync::{FrameSync, SlotPhase};
pub use occupancy::{EntityInstance, OccupancyRenderer, rasterize};
pub use soft::SoftDevice;
pub use wgpu_device::WgpuDevice;
