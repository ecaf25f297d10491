//! Error types for device setup and frame pipelining.

use thiserror::Error;

use crate::renderer::SlotPhase;

/// Errors raised by a [`Device`](crate::renderer::Device) or the frame synchronizer.
///
/// None of these are recoverable: a benchmark run that sees one is over.
#[derive(Error, Debug)]
pub enum GpuError {
    /// No compatible GPU adapter was found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(String),

    /// The software device's worker thread could not be started.
    #[error("failed to start software device worker: {0}")]
    Worker(String),

    /// The submission queue is gone (worker thread exited).
    #[error("device queue disconnected")]
    QueueDisconnected,

    /// Waiting on the device timeline failed.
    #[error("device poll failed: {0}")]
    Poll(String),

    /// Buffer mapping failed.
    #[error("buffer mapping failed: {0}")]
    BufferMapping(String),

    /// A slot operation was called out of order.
    #[error("frame slot {slot} is {actual:?}, expected {expected:?}")]
    InvalidPhase {
        slot: usize,
        expected: SlotPhase,
        actual: SlotPhase,
    },

    /// More instances than the slot's instance buffer holds.
    #[error("instance buffer holds {capacity} entities, got {requested}")]
    CapacityExceeded { requested: usize, capacity: usize },
}
