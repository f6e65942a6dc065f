//! Cyclic frame index for temporally varying passes (jitter, dithering)

use crate::params::{names, ParameterBus};

/// Length of the frame cycle
pub const FRAME_CYCLE: u32 = 64;

/// Publishes `frame_count` once per frame, wrapping at [`FRAME_CYCLE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounter {
    next: u32,
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value the next [`tick`](Self::tick) publishes
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Publish the current index, then advance; returns the published value
    pub fn tick(&mut self, bus: &mut dyn ParameterBus) -> u32 {
        let current = self.next;
        bus.set_int(names::FRAME_COUNT, current as i32);
        self.next = (current + 1) % FRAME_CYCLE;
        current
    }
}
