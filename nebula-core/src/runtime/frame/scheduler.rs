//! Per-frame suspension state (Wait / Wait_n)

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::core::ObjectHandle;

#[derive(Debug, Default, Clone)]
pub struct FrameScheduler {
    sleep_until: Option<Instant>,
    waiting: HashMap<ObjectHandle, HashSet<u64>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleep_for(&mut self, duration: Duration) {
        self.sleep_until = Some(Instant::now() + duration);
    }

    pub fn is_sleeping(&mut self) -> bool {
        self.is_sleeping_at(Instant::now())
    }

    /// The timer clears itself once `now` reaches the deadline
    pub fn is_sleeping_at(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.sleep_until {
            if now < deadline {
                return true;
            }
            self.sleep_until = None;
        }
        !self.waiting.is_empty()
    }

    pub fn wait_for(&mut self, object: ObjectHandle, hash: u64) {
        self.waiting.entry(object).or_default().insert(hash);
    }

    /// Returns true when the wait on `object` is fully satisfied
    pub fn on_notification(&mut self, object: ObjectHandle, hash: u64) -> bool {
        let Some(pending) = self.waiting.get_mut(&object) else {
            return true;
        };
        pending.remove(&hash);
        if pending.is_empty() {
            self.waiting.remove(&object);
            return true;
        }
        false
    }

    pub fn is_waiting_on(&self, object: ObjectHandle) -> bool {
        self.waiting.contains_key(&object)
    }

    pub fn waiting_objects(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.waiting.keys().copied()
    }
}
