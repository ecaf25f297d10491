//! Software device: a worker thread standing in for the GPU queue
//!
//! Submissions travel over a channel to the worker, which executes them in
//! order (clear, rasterize, copy to readback) and then retires fence
//! signals. Waiting blocks on a condvar that the worker notifies, so the
//! CPU side sees the same asynchronous timeline it would see on hardware.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use super::bitmap::OccupancyBitmap;
use super::device::Device;
use super::occupancy::{EntityInstance, rasterize};
use crate::consts::*;
use crate::error::GpuError;

type Canvas = Arc<Mutex<Vec<u8>>>;

fn canvas() -> Canvas {
    Arc::new(Mutex::new(vec![0u8; ROW_PITCH * HEIGHT as usize]))
}

/// Completion counter plus the event the worker fires when it advances
#[derive(Debug, Default)]
struct FenceState {
    completed: Mutex<u64>,
    retired: Condvar,
}

impl FenceState {
    fn complete(&self, value: u64) {
        let mut completed = self.completed.lock();
        if value > *completed {
            *completed = value;
        }
        self.retired.notify_all();
    }

    fn value(&self) -> u64 {
        *self.completed.lock()
    }

    fn wait_for(&self, value: u64) {
        let mut completed = self.completed.lock();
        while *completed < value {
            self.retired.wait(&mut completed);
        }
    }
}

#[derive(Debug, Clone)]
pub struct SoftFence(Arc<FenceState>);

enum Command {
    Clear,
    Draw(Vec<EntityInstance>),
    CopyToReadback,
}

/// A closed command list bound to one slot's target and readback
struct CommandList {
    slot: usize,
    target: Canvas,
    readback: Canvas,
    commands: Vec<Command>,
}

enum Submission {
    Execute(CommandList),
    Signal { fence: Arc<FenceState>, value: u64 },
}

pub struct SoftFrame {
    index: usize,
    target: Canvas,
    readback: Canvas,
    /// Open command list; `None` once closed by `execute`
    recording: Option<Vec<Command>>,
}

pub struct SoftDevice {
    queue: Option<Sender<Submission>>,
    worker: Option<JoinHandle<()>>,
}

impl SoftDevice {
    pub fn new() -> Result<Self, GpuError> {
        Self::spawn(None)
    }

    /// Device whose worker sleeps `latency` before executing each
    /// command list, to make frames in flight observable.
    pub fn with_latency(latency: Duration) -> Result<Self, GpuError> {
        Self::spawn(Some(latency))
    }

    fn spawn(latency: Option<Duration>) -> Result<Self, GpuError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = std::thread::Builder::new()
            .name("soft-gpu".into())
            .spawn(move || run_queue(rx, latency))
            .map_err(|e| GpuError::Worker(e.to_string()))?;
        log::info!("software device started (latency: {latency:?})");

        Ok(Self {
            queue: Some(tx),
            worker: Some(worker),
        })
    }

    fn send(&self, submission: Submission) -> Result<(), GpuError> {
        self.queue
            .as_ref()
            .ok_or(GpuError::QueueDisconnected)?
            .send(submission)
            .map_err(|_| GpuError::QueueDisconnected)
    }
}

impl Drop for SoftDevice {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish the backlog and exit
        self.queue.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("software device worker panicked");
            }
        }
    }
}

fn run_queue(rx: Receiver<Submission>, latency: Option<Duration>) {
    for submission in rx {
        match submission {
            Submission::Execute(list) => {
                if let Some(latency) = latency {
                    std::thread::sleep(latency);
                }
                log::trace!("soft-gpu: executing slot {}", list.slot);
                execute_list(list);
            }
            Submission::Signal { fence, value } => fence.complete(value),
        }
    }
    log::debug!("soft-gpu: queue closed");
}

fn execute_list(list: CommandList) {
    let mut target = list.target.lock();
    for command in list.commands {
        match command {
            Command::Clear => target.fill(0),
            Command::Draw(instances) => rasterize(&mut target, &instances),
            Command::CopyToReadback => list.readback.lock().copy_from_slice(&target),
        }
    }
}

impl Device for SoftDevice {
    type Fence = SoftFence;
    type Frame = SoftFrame;

    fn create_fence(&mut self) -> Result<SoftFence, GpuError> {
        Ok(SoftFence(Arc::new(FenceState::default())))
    }

    fn create_frame(&mut self, index: usize, _capacity: usize) -> Result<SoftFrame, GpuError> {
        Ok(SoftFrame {
            index,
            target: canvas(),
            readback: canvas(),
            recording: None,
        })
    }

    fn completed_value(&self, fence: &SoftFence) -> u64 {
        fence.0.value()
    }

    fn wait(&mut self, fence: &SoftFence, value: u64) -> Result<(), GpuError> {
        if self.worker.as_ref().is_none_or(|w| w.is_finished()) && fence.0.value() < value {
            return Err(GpuError::QueueDisconnected);
        }
        fence.0.wait_for(value);
        Ok(())
    }

    fn signal(&mut self, fence: &mut SoftFence, value: u64) -> Result<(), GpuError> {
        self.send(Submission::Signal {
            fence: Arc::clone(&fence.0),
            value,
        })
    }

    fn reset(&mut self, frame: &mut SoftFrame) -> Result<(), GpuError> {
        frame.recording = Some(Vec::new());
        Ok(())
    }

    fn record(&mut self, frame: &mut SoftFrame, instances: &[EntityInstance]) -> Result<(), GpuError> {
        let commands = frame.recording.as_mut().ok_or(GpuError::InvalidPhase {
            slot: frame.index,
            expected: super::SlotPhase::Recording,
            actual: super::SlotPhase::Submitted,
        })?;
        commands.push(Command::Clear);
        commands.push(Command::Draw(instances.to_vec()));
        commands.push(Command::CopyToReadback);
        Ok(())
    }

    fn execute(&mut self, frame: &mut SoftFrame) -> Result<(), GpuError> {
        let commands = frame.recording.take().unwrap_or_default();
        self.send(Submission::Execute(CommandList {
            slot: frame.index,
            target: Arc::clone(&frame.target),
            readback: Arc::clone(&frame.readback),
            commands,
        }))
    }

    fn read<R>(
        &mut self,
        frame: &mut SoftFrame,
        f: impl FnOnce(&OccupancyBitmap<'_>) -> R,
    ) -> Result<R, GpuError> {
        let mapped = frame.readback.lock();
        let result = f(&OccupancyBitmap::new(&mapped));
        drop(mapped);
        Ok(result)
    }
}
