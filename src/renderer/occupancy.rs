//! Occupancy rendering: instance layout and per-frame draw submission

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::device::Device;
use super::frame_sync::FrameSync;
use crate::consts::*;
use crate::error::GpuError;
use crate::sim::{Group, Scene};

/// One filled circle, as consumed by the occupancy shader
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct EntityInstance {
    pub center: [f32; 2],
    pub diameter: f32,
    pub _pad: f32,
    /// Additive color written to every covered pixel
    pub mask: [f32; 4],
}

impl EntityInstance {
    pub const fn new(center: Vec2, radius: f32, mask: [f32; 4]) -> Self {
        Self {
            center: [center.x, center.y],
            diameter: radius * 2.0,
            _pad: 0.0,
            mask,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<EntityInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }

    /// Whether pixel (x, y) is covered, sampling at the pixel center
    #[inline]
    pub fn covers(&self, x: u32, y: u32) -> bool {
        let dx = x as f32 + 0.5 - self.center[0];
        let dy = y as f32 + 0.5 - self.center[1];
        let r = self.diameter * 0.5;
        dx * dx + dy * dy <= r * r
    }
}

/// Rasterize instances into a tightly packed RGBA8 canvas.
///
/// Same coverage rule and blending (`One + One`, saturating) as the
/// occupancy shader; the caller clears the canvas first.
pub fn rasterize(pixels: &mut [u8], instances: &[EntityInstance]) {
    for inst in instances {
        let r = inst.diameter * 0.5;
        let min_x = (inst.center[0] - r - 0.5).floor().max(0.0) as u32;
        let min_y = (inst.center[1] - r - 0.5).floor().max(0.0) as u32;
        let max_x = ((inst.center[0] + r).ceil().max(0.0) as u32).min(WIDTH);
        let max_y = ((inst.center[1] + r).ceil().max(0.0) as u32).min(HEIGHT);

        let add: [u8; 4] = inst.mask.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);

        for y in min_y..max_y {
            let row = y as usize * ROW_PITCH;
            for x in min_x..max_x {
                if !inst.covers(x, y) {
                    continue;
                }
                let px = row + x as usize * BYTES_PER_PIXEL;
                for (dst, src) in pixels[px..px + BYTES_PER_PIXEL].iter_mut().zip(add) {
                    *dst = dst.saturating_add(src);
                }
            }
        }
    }
}

/// Collects both groups into one instance list and records the draw
/// into the current frame slot.
#[derive(Debug, Default)]
pub struct OccupancyRenderer {
    instances: Vec<EntityInstance>,
}

impl OccupancyRenderer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            instances: Vec::with_capacity(capacity),
        }
    }

    /// Rebuild the instance list from the scene's current positions
    pub fn collect(&mut self, scene: &Scene) -> &[EntityInstance] {
        self.instances.clear();
        for group in scene.groups() {
            push_group(&mut self.instances, group);
        }
        &self.instances
    }

    /// Clear the current slot's target and draw every entity of both groups.
    ///
    /// Must run after [`FrameSync::wait`] and before [`FrameSync::submit`].
    pub fn draw<D: Device>(
        &mut self,
        sync: &mut FrameSync<D>,
        scene: &Scene,
    ) -> Result<(), GpuError> {
        self.collect(scene);
        sync.record(&self.instances)
    }
}

fn push_group(out: &mut Vec<EntityInstance>, group: &Group) {
    let mask = group.team.mask();
    out.extend(
        group
            .entities
            .iter()
            .map(|e| EntityInstance::new(e.pos, e.radius, mask)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::OccupancyBitmap;
    use crate::sim::{Entity, Team};

    fn canvas() -> Vec<u8> {
        vec![0u8; ROW_PITCH * HEIGHT as usize]
    }

    #[test]
    fn test_instance_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<EntityInstance>(), 32);
        let layout = EntityInstance::desc();
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.attributes[2].offset, 16);
    }

    #[test]
    fn test_rasterize_fills_disk() {
        let mut pixels = canvas();
        let inst = EntityInstance::new(Vec2::new(640.0, 480.0), 5.0, Team::A.mask());
        rasterize(&mut pixels, &[inst]);
        let bitmap = OccupancyBitmap::new(&pixels);

        assert!(bitmap.is_occupied(640, 480, 0));
        assert!(bitmap.is_occupied(644, 480, 0));
        assert!(bitmap.is_occupied(635, 480, 0));
        assert!(!bitmap.is_occupied(645, 480, 0));
        assert!(!bitmap.is_occupied(640, 480, 1));

        let covered = pixels.chunks(4).filter(|p| p[0] != 0).count();
        // Area of a radius-5 disk, give or take the boundary
        assert!((70..=90).contains(&covered), "covered {covered}");
    }

    #[test]
    fn test_rasterize_blends_teams_additively() {
        let mut pixels = canvas();
        rasterize(
            &mut pixels,
            &[
                EntityInstance::new(Vec2::new(100.0, 100.0), 5.0, Team::A.mask()),
                EntityInstance::new(Vec2::new(103.0, 100.0), 5.0, Team::B.mask()),
                EntityInstance::new(Vec2::new(101.0, 100.0), 5.0, Team::A.mask()),
            ],
        );
        let bitmap = OccupancyBitmap::new(&pixels);
        assert_eq!(bitmap.check(101, 100, 0), 255);
        assert_eq!(bitmap.check(101, 100, 1), 255);
        assert_eq!(bitmap.check(101, 100, 2), 0);
    }

    #[test]
    fn test_rasterize_clips_at_canvas_edges() {
        let mut pixels = canvas();
        rasterize(
            &mut pixels,
            &[
                EntityInstance::new(Vec2::new(0.0, 0.0), 5.0, Team::B.mask()),
                EntityInstance::new(Vec2::new(WIDTH_FLOAT, HEIGHT_FLOAT), 5.0, Team::B.mask()),
            ],
        );
        let bitmap = OccupancyBitmap::new(&pixels);
        assert!(bitmap.is_occupied(0, 0, 1));
        assert!(bitmap.is_occupied(WIDTH as i32 - 1, HEIGHT as i32 - 1, 1));
    }

    #[test]
    fn test_collect_tags_groups() {
        let scene = Scene::from_groups(
            Group::new(Team::A, vec![Entity::stationary(10.0, 20.0, 3.0)]),
            Group::new(
                Team::B,
                vec![
                    Entity::stationary(30.0, 40.0, 4.0),
                    Entity::stationary(50.0, 60.0, 5.0),
                ],
            ),
        );
        let mut renderer = OccupancyRenderer::default();
        let instances = renderer.collect(&scene);
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].mask, Team::A.mask());
        assert_eq!(instances[0].diameter, 6.0);
        assert_eq!(instances[2].center, [50.0, 60.0]);
        assert_eq!(instances[2].mask, Team::B.mask());
    }
}
