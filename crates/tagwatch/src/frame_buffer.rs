//! Single-slot, latest-wins frame exchange between the capture thread and
//! the processing loop.

use crate::frame::Frame;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Holds at most one frame. Each publish replaces the previous one whether
/// or not it was read; nothing is queued.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    slot: Mutex<Option<Frame>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, dropping whatever was there.
    pub fn publish(&self, frame: Frame) {
        let previous = self.lock().replace(frame);
        // drop the old pixels outside the lock
        drop(previous);
    }

    /// Copy of the most recent frame; `None` before the first publish.
    pub fn fetch_latest(&self) -> Option<Frame> {
        self.lock().clone()
    }

    /// Sequence number of the stored frame, without copying pixels.
    pub fn latest_seq(&self) -> Option<u64> {
        self.lock().as_ref().map(|f| f.seq)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Frame>> {
        // a panic mid-publish cannot leave a torn frame: the slot is
        // assigned in one move
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
