//! Frames-in-flight synchronization
//!
//! A fixed arena of `FRAME_COUNT` slots, round-robined. Each slot carries a
//! fence and the value it is expected to reach; a slot is only reset for
//! recording once the device reports that value complete. The per-tick
//! protocol is `wait → (read) → record → submit → next`.

use super::bitmap::OccupancyBitmap;
use super::device::Device;
use super::occupancy::EntityInstance;
use crate::consts::FRAME_COUNT;
use crate::error::GpuError;

/// Where a slot is in the per-tick protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    /// Not current, or current but not yet waited on
    Idle,
    /// Fence confirmed, commands may be recorded and the bitmap read
    Recording,
    /// Commands handed to the device; nothing more may be recorded
    Submitted,
}

struct FrameSlot<D: Device> {
    frame: D::Frame,
    fence: D::Fence,
    /// Value the fence reaches once this slot's latest submission retires
    expected: u64,
    phase: SlotPhase,
}

pub struct FrameSync<D: Device> {
    slots: [FrameSlot<D>; FRAME_COUNT],
    current: usize,
    capacity: usize,
    device: D,
}

impl<D: Device> FrameSync<D> {
    /// Create every slot up front. Any creation failure aborts construction.
    pub fn new(mut device: D, capacity: usize) -> Result<Self, GpuError> {
        let mut slots = Vec::with_capacity(FRAME_COUNT);
        for index in 0..FRAME_COUNT {
            slots.push(FrameSlot {
                frame: device.create_frame(index, capacity)?,
                fence: device.create_fence()?,
                expected: 0,
                phase: SlotPhase::Idle,
            });
        }
        let slots: [FrameSlot<D>; FRAME_COUNT] = match slots.try_into() {
            Ok(slots) => slots,
            Err(_) => unreachable!("exactly FRAME_COUNT slots were created"),
        };
        log::debug!("frame sync ready: {FRAME_COUNT} slots, {capacity} instances each");

        Ok(Self {
            slots,
            current: 0,
            capacity,
            device,
        })
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn phase(&self) -> SlotPhase {
        self.slots[self.current].phase
    }

    /// Expected fence value of slot `index`
    pub fn expected(&self, index: usize) -> u64 {
        self.slots[index].expected
    }

    /// Fence value the device has completed for slot `index`
    pub fn completed(&self, index: usize) -> u64 {
        self.device.completed_value(&self.slots[index].fence)
    }

    /// Block until the current slot's previous work is done, then reset it
    /// for recording.
    pub fn wait(&mut self) -> Result<(), GpuError> {
        let index = self.current;
        self.expect_phase(SlotPhase::Idle)?;

        let slot = &mut self.slots[index];
        if self.device.completed_value(&slot.fence) < slot.expected {
            log::trace!("slot {index}: waiting for fence value {}", slot.expected);
            self.device.wait(&slot.fence, slot.expected)?;
        }
        slot.expected += 1;
        self.device.reset(&mut slot.frame)?;
        slot.phase = SlotPhase::Recording;
        Ok(())
    }

    /// Map the current slot's occupancy bitmap for the duration of `f`.
    ///
    /// The bitmap holds whatever this slot rendered `FRAME_COUNT` ticks ago.
    pub fn read_current<R>(
        &mut self,
        f: impl FnOnce(&OccupancyBitmap<'_>) -> R,
    ) -> Result<R, GpuError> {
        self.expect_phase(SlotPhase::Recording)?;
        let slot = &mut self.slots[self.current];
        self.device.read(&mut slot.frame, f)
    }

    /// Record the occupancy draw for this frame into the current slot
    pub fn record(&mut self, instances: &[EntityInstance]) -> Result<(), GpuError> {
        self.expect_phase(SlotPhase::Recording)?;
        if instances.len() > self.capacity {
            return Err(GpuError::CapacityExceeded {
                requested: instances.len(),
                capacity: self.capacity,
            });
        }
        let slot = &mut self.slots[self.current];
        self.device.record(&mut slot.frame, instances)
    }

    /// Close and execute the current slot's commands.
    ///
    /// Nothing may be recorded into the slot again until after [`Self::next`].
    pub fn submit(&mut self) -> Result<(), GpuError> {
        self.expect_phase(SlotPhase::Recording)?;
        let slot = &mut self.slots[self.current];
        self.device.execute(&mut slot.frame)?;
        slot.phase = SlotPhase::Submitted;
        Ok(())
    }

    /// Signal the current slot's fence and move to the next slot
    pub fn next(&mut self) -> Result<(), GpuError> {
        self.expect_phase(SlotPhase::Submitted)?;
        let slot = &mut self.slots[self.current];
        self.device.signal(&mut slot.fence, slot.expected)?;
        slot.phase = SlotPhase::Idle;
        self.current = (self.current + 1) % FRAME_COUNT;
        Ok(())
    }

    /// Drain every slot's outstanding work. Used before teardown.
    pub fn wait_all(&mut self) -> Result<(), GpuError> {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.expected += 1;
            self.device.signal(&mut slot.fence, slot.expected)?;
            if self.device.completed_value(&slot.fence) < slot.expected {
                log::trace!("slot {index}: draining to fence value {}", slot.expected);
                self.device.wait(&slot.fence, slot.expected)?;
            }
        }
        Ok(())
    }

    fn expect_phase(&self, expected: SlotPhase) -> Result<(), GpuError> {
        let actual = self.slots[self.current].phase;
        if actual == expected {
            Ok(())
        } else {
            Err(GpuError::InvalidPhase {
                slot: self.current,
                expected,
                actual,
            })
        }
    }
}

impl<D: Device> Drop for FrameSync<D> {
    fn drop(&mut self) {
        if let Err(e) = self.wait_all() {
            log::error!("failed to drain frames in flight: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::SoftDevice;
    use glam::Vec2;
    use std::time::Duration;

    fn sync() -> FrameSync<SoftDevice> {
        FrameSync::new(SoftDevice::new().unwrap(), 8).unwrap()
    }

    fn disk(x: f32, y: f32) -> EntityInstance {
        EntityInstance::new(Vec2::new(x, y), 5.0, [1.0, 0.0, 0.0, 0.0])
    }

    fn frame(sync: &mut FrameSync<SoftDevice>, instances: &[EntityInstance]) {
        sync.wait().unwrap();
        sync.record(instances).unwrap();
        sync.submit().unwrap();
        sync.next().unwrap();
    }

    #[test]
    fn test_slots_round_robin() {
        let mut sync = sync();
        assert_eq!(sync.current_index(), 0);
        frame(&mut sync, &[]);
        assert_eq!(sync.current_index(), 1);
        frame(&mut sync, &[]);
        assert_eq!(sync.current_index(), 0);
        assert_eq!(sync.expected(0), 1);
        assert_eq!(sync.expected(1), 1);
    }

    #[test]
    fn test_out_of_order_calls_are_rejected() {
        let mut sync = sync();
        assert!(matches!(
            sync.submit(),
            Err(GpuError::InvalidPhase { expected: SlotPhase::Recording, .. })
        ));
        assert!(sync.record(&[]).is_err());
        assert!(sync.read_current(|_| ()).is_err());

        sync.wait().unwrap();
        assert!(sync.wait().is_err());
        sync.submit().unwrap();
        // Nothing may be recorded between submit and next
        assert!(matches!(
            sync.record(&[disk(1.0, 1.0)]),
            Err(GpuError::InvalidPhase { actual: SlotPhase::Submitted, .. })
        ));
        sync.next().unwrap();
        assert!(sync.next().is_err());
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut sync = sync();
        sync.wait().unwrap();
        let too_many = vec![disk(1.0, 1.0); 9];
        assert!(matches!(
            sync.record(&too_many),
            Err(GpuError::CapacityExceeded { requested: 9, capacity: 8 })
        ));
    }

    #[test]
    fn test_wait_blocks_until_slot_retires() {
        let device = SoftDevice::with_latency(Duration::from_millis(30)).unwrap();
        let mut sync = FrameSync::new(device, 8).unwrap();

        frame(&mut sync, &[disk(640.0, 480.0)]);
        // The device is still sleeping on slot 0's work
        assert!(sync.completed(0) < sync.expected(0));
        frame(&mut sync, &[]);

        // Back on slot 0: wait must not return before its render is done
        sync.wait().unwrap();
        assert!(sync.completed(0) >= 1);
        let hit = sync.read_current(|b| b.is_occupied(640, 480, 0)).unwrap();
        assert!(hit);
    }

    #[test]
    fn test_wait_all_drains_every_slot() {
        let device = SoftDevice::with_latency(Duration::from_millis(10)).unwrap();
        let mut sync = FrameSync::new(device, 8).unwrap();
        frame(&mut sync, &[disk(10.0, 10.0)]);
        frame(&mut sync, &[disk(20.0, 20.0)]);

        sync.wait_all().unwrap();
        for index in 0..FRAME_COUNT {
            assert_eq!(sync.completed(index), sync.expected(index));
        }

        // The pipeline keeps working after a drain
        frame(&mut sync, &[]);
        assert_eq!(sync.current_index(), 1);
    }
}
