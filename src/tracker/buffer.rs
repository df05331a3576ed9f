use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};
use heapless::Deque;

use super::config::POSITION_BUFFER_MAX;
use super::telemetry;
use super::types::Fix;

/// Replay slots needed to cover one reconnect timeout, twice over.
pub fn capacity_for(reconnect_timeout_s: u32, duty_cycle_s: u32) -> usize {
    if duty_cycle_s == 0 {
        return POSITION_BUFFER_MAX;
    }
    let slots = libm::round(f64::from(reconnect_timeout_s) / f64::from(duty_cycle_s) * 2.0);
    (slots as usize).clamp(1, POSITION_BUFFER_MAX)
}

/// Bounded, recency-biased queue of fixes that have not reached the broker.
///
/// New fixes go to the front, the oldest entry falls off the back once
/// capacity is reached, and [`PositionBuffer::dequeue_next`] hands out the
/// newest fix first.
pub struct PositionBuffer<M: RawMutex> {
    entries: Mutex<M, RefCell<Deque<Fix, POSITION_BUFFER_MAX>>>,
    capacity: usize,
}

impl<M: RawMutex> PositionBuffer<M> {
    pub const fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            1
        } else if capacity > POSITION_BUFFER_MAX {
            POSITION_BUFFER_MAX
        } else {
            capacity
        };
        Self {
            entries: Mutex::new(RefCell::new(Deque::new())),
            capacity,
        }
    }

    pub fn for_timings(reconnect_timeout_s: u32, duty_cycle_s: u32) -> Self {
        Self::new(capacity_for(reconnect_timeout_s, duty_cycle_s))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock(|entries| entries.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the evicted oldest fix when the buffer was already full.
    pub fn enqueue(&self, fix: Fix) -> Option<Fix> {
        let evicted = self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            let evicted = if entries.len() >= self.capacity {
                entries.pop_back()
            } else {
                None
            };
            let _ = entries.push_front(fix);
            evicted
        });
        telemetry::record_fix_buffered();
        if let Some(oldest) = evicted {
            telemetry::record_fix_evicted();
            log::warn!(
                "buffer: full capacity={} evicted_ts={}",
                self.capacity,
                oldest.epoch_seconds
            );
        }
        evicted
    }

    pub fn dequeue_next(&self) -> Option<Fix> {
        self.entries
            .lock(|entries| entries.borrow_mut().pop_front())
    }

    pub fn clear(&self) {
        self.entries.lock(|entries| entries.borrow_mut().clear());
    }
}
