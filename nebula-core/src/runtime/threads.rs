//! Logical threads: independent call stacks serviced in rotation

use super::frame::{Frame, FrameId};

/// One logical thread; the last frame is the one executing
pub type CallStack = Vec<Frame>;

#[derive(Debug, Default)]
pub struct ThreadMap {
    callstacks: Vec<CallStack>,
}

impl ThreadMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.callstacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callstacks.is_empty()
    }

    /// Append a new call stack seeded with `frame`; returns its index
    pub fn create_thread(&mut self, frame: Frame) -> usize {
        self.callstacks.push(vec![frame]);
        self.callstacks.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&CallStack> {
        self.callstacks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CallStack> {
        self.callstacks.get_mut(index)
    }

    /// Swap-with-last removal: the former last thread takes `index`
    pub fn remove(&mut self, index: usize) -> Option<CallStack> {
        (index < self.callstacks.len()).then(|| self.callstacks.swap_remove(index))
    }

    pub fn drain(&mut self) -> Vec<CallStack> {
        std::mem::take(&mut self.callstacks)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CallStack> {
        self.callstacks.iter()
    }

    /// Every frame of every thread
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.callstacks.iter().flatten()
    }

    pub fn find_frame_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.callstacks
            .iter_mut()
            .flatten()
            .find(|frame| frame.id() == id)
    }
}
