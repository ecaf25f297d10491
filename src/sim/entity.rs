//! Bouncing circular entities and the shared motion rule

use glam::{IVec2, Vec2};

use crate::consts::*;
use crate::{reflect_x, reflect_y, to_pixel};

/// A moving circle.
///
/// `prev` lags one motion step behind `pos`: it is the position the entity
/// had when the frame being sampled was rendered, so bitmap detection reads
/// `prev` while rendering writes `pos`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    pub pos: Vec2,
    pub prev: Vec2,
    pub radius: f32,
    pub speed: f32,
    /// Heading in radians
    pub heading: f32,
}

impl Entity {
    pub fn new(x: f32, y: f32, radius: f32, speed: f32, heading: f32) -> Self {
        let pos = Vec2::new(x, y);
        Self {
            pos,
            prev: pos,
            radius,
            speed,
            heading,
        }
    }

    /// Stationary entity, used to pin collisions in place
    pub fn stationary(x: f32, y: f32, radius: f32) -> Self {
        Self::new(x, y, radius, 0.0, 0.0)
    }

    /// Record the current position as `prev`, then apply one motion step
    pub fn advance(&mut self) {
        self.prev = self.pos;
        let (pos, heading) = step(self.pos, self.heading, self.speed);
        self.pos = pos;
        self.heading = heading;
    }

    /// Pixel center sampled by bitmap detection
    #[inline]
    pub fn sample_center(&self) -> IVec2 {
        to_pixel(self.prev)
    }

    /// Pixel radius sampled by bitmap detection
    #[inline]
    pub fn sample_radius(&self) -> i32 {
        self.radius.round() as i32
    }

    /// Exact circle overlap against another entity's current position
    #[inline]
    pub fn overlaps(&self, other: &Entity) -> bool {
        let reach = self.radius + other.radius;
        self.pos.distance_squared(other.pos) < reach * reach
    }
}

/// Motion rule: move `speed` along `heading`, bouncing off the canvas edges.
///
/// Crossing an x bound reflects the heading to `π - heading`, crossing a y
/// bound turns it by `π`; the position is clamped back into the canvas.
pub fn step(pos: Vec2, heading: f32, speed: f32) -> (Vec2, f32) {
    let mut pos = pos + Vec2::new(heading.cos(), heading.sin()) * speed;
    let mut heading = heading;

    if pos.x < 0.0 || pos.x > WIDTH_FLOAT {
        heading = reflect_x(heading);
        pos.x = pos.x.clamp(0.0, WIDTH_FLOAT);
    }
    if pos.y < 0.0 || pos.y > HEIGHT_FLOAT {
        heading = reflect_y(heading);
        pos.y = pos.y.clamp(0.0, HEIGHT_FLOAT);
    }

    (pos, heading)
}
