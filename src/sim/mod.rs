//! Deterministic simulation module
//!
//! Entity motion and hit detection live here. This module stays pure:
//! - Fixed per-tick motion step, no wall-clock time
//! - Stable iteration order (group A, then group B, in spawn order)
//! - Reads occupancy bitmaps, never talks to a device

pub mod detect;
pub mod entity;
pub mod midpoint;
pub mod scene;
pub mod tick;

pub use detect::{BitmapSampler, BruteForce, Detector};
pub use entity::{Entity, step};
pub use midpoint::{MidpointCircle, outline};
pub use scene::{Group, Scene, Team};
pub use tick::{bitmap_pass, brute_force_pass, detect_and_advance};
