// Start/stop requests raised on the audio thread, serviced by the duty cycle

use super::MAX_INSTANCES;
use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free mailbox of instance requests: one bit per id.
///
/// Shared by every instance; written from audio callbacks (main controls
/// start/stop instance) and drained by the manager's duty cycle.
#[derive(Debug, Default)]
pub struct InstanceSignals {
    start: AtomicU32,
    /// Requests for "the lowest free id"
    start_any: AtomicU32,
    stop: AtomicU32,
}

impl InstanceSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for instance `id` to be started, 0 meaning any free id
    pub fn request_start(&self, id: u32) -> bool {
        if id as usize >= MAX_INSTANCES {
            return false;
        }
        if id == 0 {
            self.start_any.fetch_add(1, Ordering::AcqRel);
        } else {
            self.start.fetch_or(1 << id, Ordering::AcqRel);
        }
        true
    }

    /// Ask for instance `id` to stop; the primary cannot be stopped this way
    pub fn request_stop(&self, id: u32) -> bool {
        if id == 0 || id as usize >= MAX_INSTANCES {
            return false;
        }
        self.stop.fetch_or(1 << id, Ordering::AcqRel);
        true
    }

    /// Pending start requests: (bitmask of explicit ids, count of "any")
    pub fn take_starts(&self) -> (u32, u32) {
        (
            self.start.swap(0, Ordering::AcqRel),
            self.start_any.swap(0, Ordering::AcqRel),
        )
    }

    pub fn take_stops(&self) -> u32 {
        self.stop.swap(0, Ordering::AcqRel)
    }
}
