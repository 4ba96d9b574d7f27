//! Central Wait_n / Notify listener registry
//!
//! Maps a heap object to the frames subscribed to it. Frames keep the
//! per-hash detail in their own scheduler; the registry only answers
//! "who listens on this object".

use std::collections::{BTreeSet, HashMap};

use crate::core::ObjectHandle;

use super::frame::FrameId;

#[derive(Debug, Default)]
pub struct NotificationRegistry {
    listeners: HashMap<ObjectHandle, BTreeSet<FrameId>>,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, object: ObjectHandle, frame: FrameId) {
        self.listeners.entry(object).or_default().insert(frame);
    }

    pub fn unsubscribe(&mut self, object: ObjectHandle, frame: FrameId) {
        if let Some(set) = self.listeners.get_mut(&object) {
            set.remove(&frame);
            if set.is_empty() {
                self.listeners.remove(&object);
            }
        }
    }

    /// Snapshot in frame-id order
    pub fn listeners(&self, object: ObjectHandle) -> Vec<FrameId> {
        self.listeners
            .get(&object)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// A frame went away
    pub fn remove_frame<I>(&mut self, frame: FrameId, objects: I)
    where
        I: IntoIterator<Item = ObjectHandle>,
    {
        for object in objects {
            self.unsubscribe(object, frame);
        }
    }

    /// An object was collected
    pub fn remove_object(&mut self, object: ObjectHandle) {
        self.listeners.remove(&object);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
