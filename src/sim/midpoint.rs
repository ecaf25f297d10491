//! Midpoint (Bresenham) circle traversal
//!
//! Enumerates the pixels closest to a circle's boundary using integer
//! arithmetic only. The walk covers the first octant, from (r, 0) up to the
//! diagonal; every step yields its eight mirror images.

use glam::IVec2;

/// Iterator over the octant steps of a circle outline.
///
/// Each item holds the 8 symmetric points of one step, in the order
/// (x0±x, y0±y), then (x0±y, y0±x).
#[derive(Debug, Clone)]
pub struct MidpointCircle {
    center: IVec2,
    x: i32,
    y: i32,
    /// Decision variable: residual of (x, y+1) plus residual of (x-1, y+1)
    f: i32,
}

impl MidpointCircle {
    pub fn new(center: IVec2, radius: i32) -> Self {
        Self {
            center,
            x: radius,
            y: 0,
            f: -2 * radius + 3,
        }
    }
}

impl Iterator for MidpointCircle {
    type Item = [IVec2; 8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.x < self.y {
            return None;
        }

        let (x, y) = (self.x, self.y);
        let c = self.center;
        let ring = [
            IVec2::new(c.x + x, c.y + y),
            IVec2::new(c.x - x, c.y + y),
            IVec2::new(c.x + x, c.y - y),
            IVec2::new(c.x - x, c.y - y),
            IVec2::new(c.x + y, c.y + x),
            IVec2::new(c.x - y, c.y + x),
            IVec2::new(c.x + y, c.y - x),
            IVec2::new(c.x - y, c.y - x),
        ];

        if self.f >= 0 {
            self.x -= 1;
            self.f -= 4 * self.x;
        }
        self.y += 1;
        self.f += 4 * self.y + 2;

        Some(ring)
    }
}

/// All boundary pixels of a circle, deduplicated and sorted
pub fn outline(center: IVec2, radius: i32) -> Vec<IVec2> {
    let mut points: Vec<IVec2> = MidpointCircle::new(center, radius).flatten().collect();
    points.sort_by_key(|p| (p.y, p.x));
    points.dedup();
    points
}
