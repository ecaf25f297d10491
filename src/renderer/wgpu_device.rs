//! wgpu-backed device
//!
//! Each slot owns an RGBA8 render target, a mappable readback buffer and an
//! instance buffer. Fences are completion counters advanced from
//! `Queue::on_submitted_work_done`; waiting blocks inside `Device::poll`
//! on the submission that carried the signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::SlotPhase;
use super::bitmap::OccupancyBitmap;
use super::device::Device;
use super::occupancy::EntityInstance;
use crate::consts::*;
use crate::error::GpuError;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CanvasUniform {
    size: [f32; 2],
    _pad: [f32; 2],
}

pub struct WgpuFence {
    completed: Arc<AtomicU64>,
    /// Submission the latest signal was queued behind
    submission: Option<wgpu::SubmissionIndex>,
}

pub struct WgpuFrame {
    index: usize,
    capacity: usize,
    view: wgpu::TextureView,
    target: wgpu::Texture,
    readback: wgpu::Buffer,
    instances: wgpu::Buffer,
    encoder: Option<wgpu::CommandEncoder>,
    /// Submission that last rendered into this slot
    submission: Option<wgpu::SubmissionIndex>,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    adapter_info: wgpu::AdapterInfo,
    last_submission: Option<wgpu::SubmissionIndex>,
}

impl WgpuDevice {
    /// Select an adapter, request a device and build the occupancy pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::NoAdapter`] if no compatible GPU is found and
    /// [`GpuError::DeviceRequest`] if device creation fails.
    pub fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|_| GpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        log::info!(
            "GPU adapter: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("occupancy-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| GpuError::DeviceRequest(e.to_string()))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("occupancy_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("occupancy.wgsl").into()),
        });

        let canvas_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("canvas"),
            contents: bytemuck::bytes_of(&CanvasUniform {
                size: [WIDTH_FLOAT, HEIGHT_FLOAT],
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("occupancy_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("occupancy_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: canvas_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("occupancy_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        // Additive so overlapping teams keep both channels
        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("occupancy_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[EntityInstance::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: additive,
                        alpha: additive,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group,
            adapter_info,
            last_submission: None,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_info.name
    }

    fn poll(&self, poll: wgpu::PollType) -> Result<(), GpuError> {
        self.device
            .poll(poll)
            .map(|_| ())
            .map_err(|e| GpuError::Poll(e.to_string()))
    }
}

impl Device for WgpuDevice {
    type Fence = WgpuFence;
    type Frame = WgpuFrame;

    fn create_fence(&mut self) -> Result<WgpuFence, GpuError> {
        Ok(WgpuFence {
            completed: Arc::new(AtomicU64::new(0)),
            submission: None,
        })
    }

    fn create_frame(&mut self, index: usize, capacity: usize) -> Result<WgpuFrame, GpuError> {
        let target = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("occupancy_target_{index}")),
            size: wgpu::Extent3d {
                width: WIDTH,
                height: HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("occupancy_readback_{index}")),
            size: (ROW_PITCH * HEIGHT as usize) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let instances = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("occupancy_instances_{index}")),
            size: (std::mem::size_of::<EntityInstance>() * capacity.max(1)) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(WgpuFrame {
            index,
            capacity,
            view,
            target,
            readback,
            instances,
            encoder: None,
            submission: None,
        })
    }

    fn completed_value(&self, fence: &WgpuFence) -> u64 {
        // Completion callbacks only run while the device is polled
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("non-blocking poll failed: {e}");
        }
        fence.completed.load(Ordering::Acquire)
    }

    fn wait(&mut self, fence: &WgpuFence, value: u64) -> Result<(), GpuError> {
        if fence.completed.load(Ordering::Acquire) >= value {
            return Ok(());
        }
        self.poll(wgpu::PollType::Wait {
            submission_index: fence.submission.clone(),
            timeout: None,
        })?;
        if fence.completed.load(Ordering::Acquire) < value {
            // The signal callback can trail its submission; drain everything
            self.poll(wgpu::PollType::wait_indefinitely())?;
        }

        let completed = fence.completed.load(Ordering::Acquire);
        if completed < value {
            return Err(GpuError::Poll(format!(
                "fence stalled at {completed}, waiting for {value}"
            )));
        }
        Ok(())
    }

    fn signal(&mut self, fence: &mut WgpuFence, value: u64) -> Result<(), GpuError> {
        let completed = Arc::clone(&fence.completed);
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(value, Ordering::AcqRel);
        });
        fence.submission = self.last_submission.clone();
        Ok(())
    }

    fn reset(&mut self, frame: &mut WgpuFrame) -> Result<(), GpuError> {
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&format!("occupancy_frame_{}", frame.index)),
            });
        frame.encoder = Some(encoder);
        Ok(())
    }

    fn record(&mut self, frame: &mut WgpuFrame, instances: &[EntityInstance]) -> Result<(), GpuError> {
        if instances.len() > frame.capacity {
            return Err(GpuError::CapacityExceeded {
                requested: instances.len(),
                capacity: frame.capacity,
            });
        }
        let encoder = frame.encoder.as_mut().ok_or(GpuError::InvalidPhase {
            slot: frame.index,
            expected: SlotPhase::Recording,
            actual: SlotPhase::Submitted,
        })?;

        if !instances.is_empty() {
            self.queue
                .write_buffer(&frame.instances, 0, bytemuck::cast_slice(instances));
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("occupancy_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if !instances.is_empty() {
                let bytes = std::mem::size_of_val(instances) as wgpu::BufferAddress;
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, &self.bind_group, &[]);
                render_pass.set_vertex_buffer(0, frame.instances.slice(..bytes));
                render_pass.draw(0..4, 0..instances.len() as u32);
            }
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &frame.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &frame.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(ROW_PITCH as u32),
                    rows_per_image: Some(HEIGHT),
                },
            },
            wgpu::Extent3d {
                width: WIDTH,
                height: HEIGHT,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn execute(&mut self, frame: &mut WgpuFrame) -> Result<(), GpuError> {
        let encoder = frame.encoder.take().ok_or(GpuError::InvalidPhase {
            slot: frame.index,
            expected: SlotPhase::Recording,
            actual: SlotPhase::Submitted,
        })?;
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        frame.submission = Some(index.clone());
        self.last_submission = Some(index);
        Ok(())
    }

    fn read<R>(
        &mut self,
        frame: &mut WgpuFrame,
        f: impl FnOnce(&OccupancyBitmap<'_>) -> R,
    ) -> Result<R, GpuError> {
        // Never rendered: nothing to map, every pixel reads unoccupied
        if frame.submission.is_none() {
            return Ok(f(&OccupancyBitmap::new(&[])));
        }

        let slice = frame.readback.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        // The slot's render already retired; this only drives the map callback
        self.poll(wgpu::PollType::Wait {
            submission_index: frame.submission.clone(),
            timeout: None,
        })?;
        rx.recv()
            .map_err(|_| GpuError::BufferMapping("map callback dropped".into()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let result = f(&OccupancyBitmap::new(&mapped));
        drop(mapped);
        frame.readback.unmap();

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{FrameSync, rasterize};
    use glam::Vec2;

    fn frame(sync: &mut FrameSync<WgpuDevice>, instances: &[EntityInstance]) {
        sync.wait().unwrap();
        sync.record(instances).unwrap();
        sync.submit().unwrap();
        sync.next().unwrap();
    }

    #[test]
    #[ignore = "requires GPU"]
    fn test_gpu_reports_adapter() {
        let device = WgpuDevice::new().expect("GPU device");
        assert!(!device.adapter_name().is_empty());
    }

    #[test]
    #[ignore = "requires GPU"]
    fn test_gpu_fresh_slot_reads_empty() {
        let device = WgpuDevice::new().expect("GPU device");
        let mut sync = FrameSync::new(device, 1).unwrap();

        sync.wait().unwrap();
        let occupied = sync
            .read_current(|bitmap| bitmap.is_occupied(640, 480, 0) || bitmap.is_occupied(0, 0, 1))
            .unwrap();
        assert!(!occupied);
        assert_eq!(sync.completed(0), 0);
    }

    #[test]
    #[ignore = "requires GPU"]
    fn test_gpu_renders_occupancy() {
        let device = WgpuDevice::new().expect("GPU device");
        let mut sync = FrameSync::new(device, 4).unwrap();

        let a = EntityInstance::new(Vec2::new(640.0, 480.0), 5.0, [1.0, 0.0, 0.0, 0.0]);
        let b = EntityInstance::new(Vec2::new(643.0, 480.0), 5.0, [0.0, 1.0, 0.0, 0.0]);
        frame(&mut sync, &[a, b]);
        frame(&mut sync, &[]);

        sync.wait().unwrap();
        let (red, green, far) = sync
            .read_current(|bitmap| {
                (
                    bitmap.check(641, 480, 0),
                    bitmap.check(641, 480, 1),
                    bitmap.check(700, 480, 0),
                )
            })
            .unwrap();
        assert_eq!(red, 255);
        assert_eq!(green, 255);
        assert_eq!(far, 0);
    }

    #[test]
    #[ignore = "requires GPU"]
    fn test_gpu_matches_software_coverage() {
        let inst = EntityInstance::new(Vec2::new(100.25, 200.75), 7.0, [0.0, 1.0, 0.0, 0.0]);
        let mut expected = vec![0u8; ROW_PITCH * HEIGHT as usize];
        rasterize(&mut expected, &[inst]);

        let device = WgpuDevice::new().expect("GPU device");
        let mut sync = FrameSync::new(device, 1).unwrap();
        frame(&mut sync, &[inst]);
        frame(&mut sync, &[]);
        sync.wait().unwrap();

        let reference = OccupancyBitmap::new(&expected);
        let mismatches = sync
            .read_current(|bitmap| {
                (190..212)
                    .flat_map(|y| (90..112).map(move |x| (x, y)))
                    .filter(|&(x, y)| {
                        bitmap.is_occupied(x, y, 1) != reference.is_occupied(x, y, 1)
                    })
                    .count()
            })
            .unwrap();
        assert_eq!(mismatches, 0);
    }
}
