//! Garbage-collected object heap
//!
//! Slot-map arena with generation-checked handles plus a tracing mark-sweep
//! collector. Roots are supplied by the caller (the interpreter walks its
//! frames); the heap itself only knows how objects reference each other.

use nebula_config::GcConfig;
use thiserror::Error;
use tracing::debug;

use crate::core::{Bundle, HeapObject, ObjectHandle, ValueKind, VariantArray};

/// Heap access failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// Freed, never allocated, or from a previous slot generation
    #[error("invalid object handle {0}")]
    InvalidHandle(ObjectHandle),
    #[error("expected {expected} object, found {found}")]
    WrongObjectKind {
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Result of one collection cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectStats {
    pub tracked_before: usize,
    pub freed: usize,
    pub threshold: usize,
}

#[derive(Debug)]
struct Entry {
    object: HeapObject,
    marked: bool,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Debug)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    threshold: usize,
    min_threshold: usize,
    enabled: bool,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(&GcConfig::default())
    }
}

impl Heap {
    pub fn new(config: &GcConfig) -> Self {
        let min_threshold = config.min_threshold.max(1);
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            threshold: min_threshold,
            min_threshold,
            enabled: config.enabled,
        }
    }

    // ==================== allocation ====================

    /// Number of tracked objects
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether an opportunistic collection is due before the next insert
    pub fn should_collect(&self) -> bool {
        self.enabled && self.live >= self.threshold
    }

    /// Track a fully built object
    pub fn insert(&mut self, object: HeapObject) -> ObjectHandle {
        self.live += 1;
        let entry = Entry {
            object,
            marked: false,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return ObjectHandle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        ObjectHandle::new(index, 0)
    }

    // ==================== access ====================

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub fn get(&self, handle: ObjectHandle) -> Result<&HeapObject, HeapError> {
        self.entry(handle)
            .map(|e| &e.object)
            .ok_or(HeapError::InvalidHandle(handle))
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut HeapObject, HeapError> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.entry.as_mut())
            .map(|e| &mut e.object)
            .ok_or(HeapError::InvalidHandle(handle))
    }

    pub fn bundle(&self, handle: ObjectHandle) -> Result<&Bundle, HeapError> {
        match self.get(handle)? {
            HeapObject::Bundle(b) => Ok(b),
            other => Err(wrong_kind(ValueKind::Bundle, other)),
        }
    }

    pub fn bundle_mut(&mut self, handle: ObjectHandle) -> Result<&mut Bundle, HeapError> {
        match self.get_mut(handle)? {
            HeapObject::Bundle(b) => Ok(b),
            other => Err(wrong_kind(ValueKind::Bundle, other)),
        }
    }

    pub fn array(&self, handle: ObjectHandle) -> Result<&VariantArray, HeapError> {
        match self.get(handle)? {
            HeapObject::Array(a) => Ok(a),
            other => Err(wrong_kind(ValueKind::Array, other)),
        }
    }

    pub fn array_mut(&mut self, handle: ObjectHandle) -> Result<&mut VariantArray, HeapError> {
        match self.get_mut(handle)? {
            HeapObject::Array(a) => Ok(a),
            other => Err(wrong_kind(ValueKind::Array, other)),
        }
    }

    fn entry(&self, handle: ObjectHandle) -> Option<&Entry> {
        self.slots
            .get(handle.index() as usize)
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.entry.as_ref())
    }

    // ==================== collection ====================

    /// Mark from `roots`, sweep everything else, then retune the threshold.
    /// Returns the handles that were freed alongside the stats.
    pub fn collect<I>(&mut self, roots: I) -> (CollectStats, Vec<ObjectHandle>)
    where
        I: IntoIterator<Item = ObjectHandle>,
    {
        let tracked_before = self.live;
        self.mark(roots);
        let freed = self.sweep();
        self.retune(tracked_before, freed.len());

        let stats = CollectStats {
            tracked_before,
            freed: freed.len(),
            threshold: self.threshold,
        };
        debug!(
            target: "nebula::gc",
            tracked = stats.tracked_before,
            freed = stats.freed,
            threshold = stats.threshold,
            "collection finished"
        );
        (stats, freed)
    }

    /// Iterative depth-first marking
    fn mark<I>(&mut self, roots: I)
    where
        I: IntoIterator<Item = ObjectHandle>,
    {
        let mut pending: Vec<ObjectHandle> = roots.into_iter().collect();
        while let Some(handle) = pending.pop() {
            let Some(entry) = self
                .slots
                .get_mut(handle.index() as usize)
                .filter(|s| s.generation == handle.generation())
                .and_then(|s| s.entry.as_mut())
            else {
                continue;
            };
            if entry.marked {
                continue;
            }
            entry.marked = true;
            entry.object.trace(&mut pending);
        }
    }

    /// Free unmarked objects (fields cleared first) and reset survivor marks
    fn sweep(&mut self) -> Vec<ObjectHandle> {
        let mut freed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };
            if entry.marked {
                entry.marked = false;
                continue;
            }
            entry.object.clear();
            slot.entry = None;
            freed.push(ObjectHandle::new(index as u32, slot.generation));
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
        }
        self.live -= freed.len();
        freed
    }

    fn retune(&mut self, tracked_before: usize, freed: usize) {
        if tracked_before == 0 {
            return;
        }
        if freed * 4 < tracked_before {
            self.threshold = self.threshold.saturating_mul(2);
        } else if freed * 4 > tracked_before * 3 {
            self.threshold /= 2;
        }
        self.threshold = self.threshold.max(self.min_threshold);
    }
}

fn wrong_kind(expected: ValueKind, found: &HeapObject) -> HeapError {
    HeapError::WrongObjectKind {
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BundleDefinition, Value};
    use std::sync::Arc;

    fn node_def() -> Arc<BundleDefinition> {
        Arc::new(BundleDefinition::new(
            "Node",
            vec![("next".to_string(), ValueKind::Bundle)],
        ))
    }

    fn node(heap: &mut Heap) -> ObjectHandle {
        heap.insert(HeapObject::Bundle(Bundle::new(node_def())))
    }

    fn link(heap: &mut Heap, from: ObjectHandle, to: ObjectHandle) {
        heap.bundle_mut(from)
            .unwrap()
            .set(0, Value::Bundle(to))
            .unwrap();
    }

    #[test]
    fn test_unreachable_cycle_is_reclaimed() {
        let mut heap = Heap::default();
        let a = node(&mut heap);
        let b = node(&mut heap);
        let keep = node(&mut heap);
        link(&mut heap, a, b);
        link(&mut heap, b, a);

        let (stats, freed) = heap.collect([keep]);
        assert_eq!(stats.freed, 2);
        assert_eq!(heap.len(), 1);
        assert!(freed.contains(&a) && freed.contains(&b));
        assert!(heap.contains(keep));
    }

    #[test]
    fn test_reachable_chain_survives() {
        let mut heap = Heap::default();
        let a = node(&mut heap);
        let b = node(&mut heap);
        link(&mut heap, a, b);
        let (stats, _) = heap.collect([a]);
        assert_eq!(stats.freed, 0);
        assert!(heap.contains(b));

        // marks were reset: a second cycle without roots frees both
        let (stats, _) = heap.collect(std::iter::empty());
        assert_eq!(stats.freed, 2);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_array_elements_are_traced() {
        let mut heap = Heap::default();
        let target = node(&mut heap);
        let mut arr = VariantArray::new(None);
        arr.append(Value::Bundle(target)).unwrap();
        let arr = heap.insert(HeapObject::Array(arr));
        let (stats, _) = heap.collect([arr]);
        assert_eq!(stats.freed, 0);
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut heap = Heap::default();
        let old = node(&mut heap);
        heap.collect(std::iter::empty());
        let reused = node(&mut heap);
        assert_eq!(old.index(), reused.index());
        assert_ne!(old, reused);
        assert_eq!(heap.get(old).unwrap_err(), HeapError::InvalidHandle(old));
        assert!(heap.bundle(reused).is_ok());
        assert!(matches!(
            heap.array(reused),
            Err(HeapError::WrongObjectKind { .. })
        ));
    }

    #[test]
    fn test_threshold_adapts() {
        let mut heap = Heap::new(&GcConfig {
            min_threshold: 4,
            enabled: true,
        });
        let roots: Vec<_> = (0..8).map(|_| node(&mut heap)).collect();
        assert!(heap.should_collect());

        // nothing reclaimed: threshold doubles
        heap.collect(roots.clone());
        assert_eq!(heap.threshold(), 8);

        // everything reclaimed: threshold halves, never below the floor
        heap.collect(std::iter::empty());
        assert_eq!(heap.threshold(), 4);
        heap.insert(HeapObject::Array(VariantArray::new(None)));
        heap.collect(std::iter::empty());
        assert_eq!(heap.threshold(), 4);
    }

    #[test]
    fn test_disabled_gc_never_requests_collection() {
        let mut heap = Heap::new(&GcConfig {
            min_threshold: 1,
            enabled: false,
        });
        node(&mut heap);
        assert!(!heap.should_collect());
    }
}
