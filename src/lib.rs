//! Occupancy Bench - collision detection via GPU occupancy bitmaps
//!
//! Core modules:
//! - `sim`: Entity model, motion rule and hit detection strategies
//! - `renderer`: Frame synchronization, occupancy rendering and bitmap readback
//! - `runner`: Per-tick scene update loop and benchmark runs
//! - `settings`: Benchmark configuration

pub mod error;
pub mod renderer;
pub mod runner;
pub mod settings;
pub mod sim;

pub use error::GpuError;
pub use settings::{BackendKind, BenchSettings, SettingsError, Strategy};

use glam::{IVec2, Vec2};

/// Benchmark configuration constants
pub mod consts {
    /// Canvas dimensions in pixels
    pub const WIDTH: u32 = 1280;
    pub const HEIGHT: u32 = 960;
    pub const WIDTH_FLOAT: f32 = WIDTH as f32;
    pub const HEIGHT_FLOAT: f32 = HEIGHT as f32;

    /// Bytes per occupancy pixel (RGBA8)
    pub const BYTES_PER_PIXEL: usize = 4;
    /// Row pitch of a readback bitmap
    pub const ROW_PITCH: usize = WIDTH as usize * BYTES_PER_PIXEL;

    /// Frames in flight
    pub const FRAME_COUNT: usize = 2;

    /// Entity defaults
    pub const ENTITY_RADIUS: f32 = 5.0;
    pub const ENTITY_SPEED: f32 = 2.5;
    /// Distance of each group's spawn row from its canvas edge
    pub const SPAWN_MARGIN: f32 = 10.0;
    /// Heading increment between neighbouring spawns (degrees)
    pub const SPAWN_HEADING_STEP_DEG: f32 = 10.0;
}

/// Round a sub-pixel position to the pixel it is sampled at
#[inline]
pub fn to_pixel(pos: Vec2) -> IVec2 {
    IVec2::new(pos.x.round() as i32, pos.y.round() as i32)
}

/// Reflect a heading off a vertical wall (x bound)
#[inline]
pub fn reflect_x(heading: f32) -> f32 {
    std::f32::consts::PI - heading
}

/// Reflect a heading off a horizontal wall (y bound)
#[inline]
pub fn reflect_y(heading: f32) -> f32 {
    heading + std::f32::consts::PI
}
