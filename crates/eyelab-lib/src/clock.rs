//! Local monotonic clock and conversion into the tracker's time base.

use crate::error::{Result, TrackerError};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Local time source in microseconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Converts local clock readings into remote (device) clock readings.
pub trait ClockSync: Send + Sync {
    fn local_to_remote(&self, local: i64) -> i64;
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }
}

/// Sync with a fixed offset between the two clocks.
#[derive(Debug, Clone, Copy)]
pub struct OffsetSync {
    pub offset: i64,
}

impl ClockSync for OffsetSync {
    fn local_to_remote(&self, local: i64) -> i64 {
        local + self.offset
    }
}

/// Local clock paired with the sync of the active device.
///
/// Clones share the sync slot, so a tracking session handed a clone before
/// activation picks up the device's sync once it is established.
#[derive(Clone)]
pub struct SyncAdapter {
    clock: Arc<dyn Clock>,
    sync: Arc<RwLock<Option<Arc<dyn ClockSync>>>>,
}

impl SyncAdapter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sync: Arc::new(RwLock::new(None)),
        }
    }

    pub fn establish(&self, sync: Arc<dyn ClockSync>) {
        *self.sync.write().unwrap_or_else(PoisonError::into_inner) = Some(sync);
    }

    pub fn reset(&self) {
        *self.sync.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_synchronized(&self) -> bool {
        self.sync
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn to_remote(&self, local: i64) -> Result<i64> {
        let guard = self.sync.read().unwrap_or_else(PoisonError::into_inner);
        let sync = guard.as_ref().ok_or(TrackerError::NotSynchronized)?;
        Ok(sync.local_to_remote(local))
    }

    /// Current local time expressed on the device clock.
    pub fn remote_now(&self) -> Result<i64> {
        self.to_remote(self.now())
    }
}
