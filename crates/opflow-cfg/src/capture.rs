// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! FlowCaptureAllocator - hands out capture ids.

use opflow_ops::CaptureId;

/// Ids increase by one per allocation and are never reused within a graph.
#[derive(Debug, Default)]
pub struct FlowCaptureAllocator {
    next: u32,
}

impl FlowCaptureAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> CaptureId {
        let id = CaptureId(self.next);
        self.next += 1;
        id
    }

    pub fn count(&self) -> u32 {
        self.next
    }
}
