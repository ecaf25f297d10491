//! Hit detection strategies
//!
//! Both strategies answer the same question for one entity: does it touch
//! the opposing group this tick? They differ in what they look at.

use super::entity::Entity;
use super::midpoint::MidpointCircle;
use crate::renderer::OccupancyBitmap;

/// Per-entity collision test against the opposing group
pub trait Detector {
    fn is_hit(&self, entity: &Entity) -> bool;
}

/// Exact pairwise test against every opposing entity's current position
#[derive(Debug, Clone, Copy)]
pub struct BruteForce<'a> {
    opponents: &'a [Entity],
}

impl<'a> BruteForce<'a> {
    pub fn new(opponents: &'a [Entity]) -> Self {
        Self { opponents }
    }

    /// Number of opponents overlapping `entity`
    pub fn count(&self, entity: &Entity) -> usize {
        self.opponents.iter().filter(|o| entity.overlaps(o)).count()
    }
}

impl Detector for BruteForce<'_> {
    fn is_hit(&self, entity: &Entity) -> bool {
        self.opponents.iter().any(|o| entity.overlaps(o))
    }
}

/// Walks the entity's sampled outline over the opponent's bitmap channel.
///
/// Only the boundary is sampled, so an opponent drawn entirely inside a
/// larger entity's disk goes unnoticed by that entity.
#[derive(Debug, Clone, Copy)]
pub struct BitmapSampler<'a, 'b> {
    bitmap: &'a OccupancyBitmap<'b>,
    channel: usize,
}

impl<'a, 'b> BitmapSampler<'a, 'b> {
    pub fn new(bitmap: &'a OccupancyBitmap<'b>, channel: usize) -> Self {
        Self { bitmap, channel }
    }
}

impl Detector for BitmapSampler<'_, '_> {
    fn is_hit(&self, entity: &Entity) -> bool {
        MidpointCircle::new(entity.sample_center(), entity.sample_radius())
            .flatten()
            .any(|p| self.bitmap.is_occupied(p.x, p.y, self.channel))
    }
}
