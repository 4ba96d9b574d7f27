//! Parameter and local-variable storage

use crate::core::{InstructionErrorCode, ObjectHandle, Value, ValueKind};

type Result<T> = std::result::Result<T, InstructionErrorCode>;

/// A typed slot; value-less until first store
#[derive(Clone, Debug, PartialEq)]
pub struct FrameVariable {
    kind: ValueKind,
    value: Option<Value>,
}

impl FrameVariable {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind, value: None }
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

/// Which half of the storage a slot index refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotSpace {
    Param,
    Local,
}

impl SlotSpace {
    fn name(self) -> &'static str {
        match self {
            SlotSpace::Param => "param",
            SlotSpace::Local => "local",
        }
    }
}

/// Params first, then locals, in one contiguous array
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameMemory {
    slots: Vec<FrameVariable>,
    param_count: usize,
}

impl FrameMemory {
    pub fn new(params: &[ValueKind], locals: &[ValueKind]) -> Self {
        let slots = params
            .iter()
            .chain(locals)
            .copied()
            .map(FrameVariable::new)
            .collect();
        Self {
            slots,
            param_count: params.len(),
        }
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    pub fn local_count(&self) -> usize {
        self.slots.len() - self.param_count
    }

    pub fn variable(&self, space: SlotSpace, index: usize) -> Option<&FrameVariable> {
        self.resolve(space, index).map(|i| &self.slots[i])
    }

    /// Argument binding does not enforce the declared kind
    pub(crate) fn bind_param(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.slots.get_mut(index).filter(|_| index < self.param_count) {
            slot.value = Some(value);
        }
    }

    pub fn load(&self, space: SlotSpace, index: usize) -> Result<&Value> {
        let slot = self
            .resolve(space, index)
            .ok_or_else(|| fatal!("{} slot {} out of range", space.name(), index))?;
        let var = &self.slots[slot];
        let value = var
            .value
            .as_ref()
            .ok_or_else(|| fatal!("{} slot {} read before assignment", space.name(), index))?;
        if value.kind() != var.kind {
            return Err(fatal!(
                "{} slot {} declared {} holds {}",
                space.name(),
                index,
                var.kind,
                value.kind()
            ));
        }
        Ok(value)
    }

    pub fn store(&mut self, space: SlotSpace, index: usize, value: Value) -> Result<()> {
        let slot = self
            .resolve(space, index)
            .ok_or_else(|| fatal!("{} slot {} out of range", space.name(), index))?;
        let var = &mut self.slots[slot];
        if var.kind != value.kind() {
            return Err(fatal!(
                "cannot store {} into {} slot {} of kind {}",
                value.kind(),
                space.name(),
                index,
                var.kind
            ));
        }
        var.value = Some(value);
        Ok(())
    }

    /// Heap handles held by any slot (GC roots)
    pub fn references(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.slots
            .iter()
            .filter_map(|v| v.value.as_ref().and_then(Value::as_handle))
    }

    fn resolve(&self, space: SlotSpace, index: usize) -> Option<usize> {
        match space {
            SlotSpace::Param if index < self.param_count => Some(index),
            SlotSpace::Local if index < self.local_count() => Some(self.param_count + index),
            _ => None,
        }
    }
}
