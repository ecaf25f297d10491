//! Scene update loop and benchmark runs
//!
//! One bitmap tick is: wait for the current slot, read its bitmap while
//! detecting and moving every entity, render the moved scene back into the
//! slot, submit, advance. Whatever a slot renders on tick `k` is read on
//! tick `k + FRAME_COUNT`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::GpuError;
use crate::renderer::{Device, FrameSync, OccupancyRenderer, SoftDevice, WgpuDevice};
use crate::settings::{BackendKind, BenchSettings, Strategy};
use crate::sim::{Scene, bitmap_pass, brute_force_pass};

/// Drives a scene through the occupancy pipeline on device `D`
pub struct GpuRunner<D: Device> {
    sync: FrameSync<D>,
    renderer: OccupancyRenderer,
    ticks: u64,
}

impl<D: Device> GpuRunner<D> {
    /// Runner whose slots hold up to `capacity` entities
    pub fn new(device: D, capacity: usize) -> Result<Self, GpuError> {
        Ok(Self {
            sync: FrameSync::new(device, capacity)?,
            renderer: OccupancyRenderer::with_capacity(capacity),
            ticks: 0,
        })
    }

    /// Runner sized for every entity of `scene`
    pub fn for_scene(device: D, scene: &Scene) -> Result<Self, GpuError> {
        Self::new(device, scene.entity_count())
    }

    pub fn sync(&self) -> &FrameSync<D> {
        &self.sync
    }

    /// Ticks completed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick. Returns the hits detected in it.
    pub fn tick(&mut self, scene: &mut Scene) -> Result<u64, GpuError> {
        self.sync.wait()?;
        let hits = self.sync.read_current(|bitmap| bitmap_pass(scene, bitmap))?;
        self.renderer.draw(&mut self.sync, scene)?;
        self.sync.submit()?;
        self.sync.next()?;

        self.ticks += 1;
        Ok(hits)
    }

    /// Run `ticks` ticks. Returns the hits detected across them.
    pub fn run_for(&mut self, scene: &mut Scene, ticks: usize) -> Result<u64, GpuError> {
        let mut hits = 0;
        for _ in 0..ticks {
            hits += self.tick(scene)?;
        }
        Ok(hits)
    }

    /// Tick until `stop` is raised, then drain the frames in flight.
    /// Returns the number of ticks run.
    pub fn run_until(&mut self, scene: &mut Scene, stop: &AtomicBool) -> Result<u64, GpuError> {
        let start = self.ticks;
        while !stop.load(Ordering::Acquire) {
            self.tick(scene)?;
        }
        self.finish()?;
        log::debug!("stopped after {} ticks", self.ticks - start);
        Ok(self.ticks - start)
    }

    /// Wait for every frame in flight to retire
    pub fn finish(&mut self) -> Result<(), GpuError> {
        self.sync.wait_all()
    }
}

/// Outcome of one timed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchResult {
    /// Entities per group
    pub entity_count: usize,
    pub elapsed: Duration,
    pub hits: u64,
}

impl BenchResult {
    /// Elapsed wall-clock time in fractional milliseconds
    pub fn millis(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

impl fmt::Display for BenchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.3} {}", self.entity_count, self.millis(), self.hits)
    }
}

/// Brute-force run: `ticks` CPU passes over a fresh scene
pub fn run_cpu(entity_count: usize, ticks: usize) -> BenchResult {
    let mut scene = Scene::new(entity_count);
    let start = Instant::now();
    for _ in 0..ticks {
        brute_force_pass(&mut scene);
    }

    BenchResult {
        entity_count,
        elapsed: start.elapsed(),
        hits: scene.hit_count(),
    }
}

/// Bitmap run on `device`: `ticks` pipelined ticks over a fresh scene.
///
/// The timer stops before the final drain.
pub fn run_gpu<D: Device>(
    device: D,
    entity_count: usize,
    ticks: usize,
) -> Result<BenchResult, GpuError> {
    let mut scene = Scene::new(entity_count);
    let mut runner = GpuRunner::for_scene(device, &scene)?;

    let start = Instant::now();
    runner.run_for(&mut scene, ticks)?;
    let elapsed = start.elapsed();
    runner.finish()?;

    Ok(BenchResult {
        entity_count,
        elapsed,
        hits: scene.hit_count(),
    })
}

/// One run of the configured strategy and backend with a fresh device
pub fn run(settings: &BenchSettings, entity_count: usize) -> Result<BenchResult, GpuError> {
    match (settings.strategy, settings.backend) {
        (Strategy::BruteForce, _) => Ok(run_cpu(entity_count, settings.ticks)),
        (Strategy::Bitmap, BackendKind::Wgpu) => {
            let device = WgpuDevice::new()?;
            log::debug!("{entity_count} entities on {}", device.adapter_name());
            run_gpu(device, entity_count, settings.ticks)
        }
        (Strategy::Bitmap, BackendKind::Software) => {
            let device = match settings.soft_latency() {
                Some(latency) => SoftDevice::with_latency(latency)?,
                None => SoftDevice::new()?,
            };
            run_gpu(device, entity_count, settings.ticks)
        }
    }
}
