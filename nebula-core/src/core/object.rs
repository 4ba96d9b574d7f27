//! Heap object model (bundles and arrays)
//!
//! Objects only ever live inside the interpreter heap and are addressed by
//! generation-checked [`ObjectHandle`]s.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::script::BundleDefinition;
use super::value::{Value, ValueKind};

/// Opaque reference to a heap slot
///
/// The generation is bumped every time a slot is freed, so a handle that
/// outlived its object never resolves to the slot's next occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.index, self.generation)
    }
}

/// Field access failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("field index {index} out of range (bundle '{bundle}' has {count} fields)")]
    OutOfRange {
        bundle: String,
        index: usize,
        count: usize,
    },
    #[error("field '{field}' expects {expected}, got {found}")]
    KindMismatch {
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("field '{field}' has no value")]
    Unset { field: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BundleField {
    kind: ValueKind,
    value: Option<Value>,
}

impl BundleField {
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

/// A record instance created from a [`BundleDefinition`]
#[derive(Clone, Debug)]
pub struct Bundle {
    definition: Arc<BundleDefinition>,
    fields: Vec<BundleField>,
}

impl Bundle {
    /// Fields start typed but empty
    pub fn new(definition: Arc<BundleDefinition>) -> Self {
        let fields = definition
            .fields()
            .iter()
            .map(|(_, kind)| BundleField {
                kind: *kind,
                value: None,
            })
            .collect();
        Self { definition, fields }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<BundleDefinition> {
        &self.definition
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&BundleField> {
        self.fields.get(index)
    }

    pub fn get(&self, index: usize) -> Result<&Value, FieldError> {
        let field = self.fields.get(index).ok_or_else(|| self.out_of_range(index))?;
        field.value.as_ref().ok_or_else(|| FieldError::Unset {
            field: self.field_name(index),
        })
    }

    /// The value's kind must match the field's declared kind
    pub fn set(&mut self, index: usize, value: Value) -> Result<(), FieldError> {
        let Some(expected) = self.fields.get(index).map(BundleField::kind) else {
            return Err(self.out_of_range(index));
        };
        if expected != value.kind() {
            return Err(FieldError::KindMismatch {
                field: self.field_name(index),
                expected,
                found: value.kind(),
            });
        }
        self.fields[index].value = Some(value);
        Ok(())
    }

    /// Drop every field value, severing outgoing references
    pub fn clear(&mut self) {
        for field in &mut self.fields {
            field.value = None;
        }
    }

    pub fn references(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.fields
            .iter()
            .filter_map(|f| f.value.as_ref().and_then(Value::as_handle))
    }

    fn field_name(&self, index: usize) -> String {
        self.definition
            .fields()
            .get(index)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| format!("#{index}"))
    }

    fn out_of_range(&self, index: usize) -> FieldError {
        FieldError::OutOfRange {
            bundle: self.name().to_string(),
            index,
            count: self.fields.len(),
        }
    }
}

/// Array access failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArrayError {
    #[error("array of {expected} cannot hold {found}")]
    KindMismatch { expected: ValueKind, found: ValueKind },
    #[error("index {index} out of bounds (len {len})")]
    OutOfBounds { index: i64, len: usize },
}

/// Homogeneous growable array
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariantArray {
    kind: Option<ValueKind>,
    elements: Vec<Value>,
}

impl VariantArray {
    /// `None` leaves the element kind open until the first append
    pub fn new(kind: Option<ValueKind>) -> Self {
        Self {
            kind,
            elements: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<ValueKind> {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: i64) -> Result<&Value, ArrayError> {
        let slot = self.slot(index)?;
        Ok(&self.elements[slot])
    }

    pub fn set(&mut self, index: i64, value: Value) -> Result<(), ArrayError> {
        self.check_kind(&value)?;
        let slot = self.slot(index)?;
        self.elements[slot] = value;
        Ok(())
    }

    pub fn append(&mut self, value: Value) -> Result<(), ArrayError> {
        self.check_kind(&value)?;
        if self.kind.is_none() {
            self.kind = Some(value.kind());
        }
        self.elements.push(value);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.elements.iter()
    }

    pub fn references(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.elements.iter().filter_map(Value::as_handle)
    }

    fn check_kind(&self, value: &Value) -> Result<(), ArrayError> {
        match self.kind {
            Some(expected) if expected != value.kind() => Err(ArrayError::KindMismatch {
                expected,
                found: value.kind(),
            }),
            _ => Ok(()),
        }
    }

    fn slot(&self, index: i64) -> Result<usize, ArrayError> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.elements.len())
            .ok_or(ArrayError::OutOfBounds {
                index,
                len: self.elements.len(),
            })
    }
}

/// Built-in methods reachable through `CallVirt` on arrays
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayMethod {
    Append,
    Clear,
    Count,
}

impl ArrayMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Append" => Some(ArrayMethod::Append),
            "Clear" => Some(ArrayMethod::Clear),
            "Count" => Some(ArrayMethod::Count),
            _ => None,
        }
    }
}

/// Everything the heap can hold
#[derive(Clone, Debug)]
pub enum HeapObject {
    Bundle(Bundle),
    Array(VariantArray),
}

impl HeapObject {
    pub fn kind(&self) -> ValueKind {
        match self {
            HeapObject::Bundle(_) => ValueKind::Bundle,
            HeapObject::Array(_) => ValueKind::Array,
        }
    }

    /// Push every handle this object holds onto `out`
    pub fn trace(&self, out: &mut Vec<ObjectHandle>) {
        match self {
            HeapObject::Bundle(b) => out.extend(b.references()),
            HeapObject::Array(a) => out.extend(a.references()),
        }
    }

    pub fn clear(&mut self) {
        match self {
            HeapObject::Bundle(b) => b.clear(),
            HeapObject::Array(a) => a.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Arc<BundleDefinition> {
        Arc::new(BundleDefinition::new(
            "Point",
            vec![
                ("x".to_string(), ValueKind::Int32),
                ("label".to_string(), ValueKind::String),
            ],
        ))
    }

    #[test]
    fn test_bundle_fields_start_unset() {
        let b = Bundle::new(point());
        assert_eq!(b.field_count(), 2);
        assert!(matches!(b.get(0), Err(FieldError::Unset { .. })));
        assert_eq!(b.field(1).map(BundleField::kind), Some(ValueKind::String));
    }

    #[test]
    fn test_bundle_write_rejects_mismatch() {
        let mut b = Bundle::new(point());
        b.set(0, Value::Int(7)).unwrap();
        assert_eq!(b.get(0).unwrap(), &Value::Int(7));

        let err = b.set(0, Value::from("x")).unwrap_err();
        assert!(matches!(err, FieldError::KindMismatch { .. }));
        assert_eq!(b.get(0).unwrap(), &Value::Int(7));
    }

    #[test]
    fn test_bundle_write_keeps_declared_kind() {
        let mut b = Bundle::new(point());
        assert!(b.set(0, Value::Float(1.5)).is_err());
        assert_eq!(b.field(0).unwrap().kind(), ValueKind::Int32);
        assert!(b.field(0).unwrap().value().is_none());
        assert!(matches!(
            b.set(9, Value::Int(0)),
            Err(FieldError::OutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn test_array_first_append_fixes_kind() {
        let mut a = VariantArray::new(None);
        a.append(Value::Int(1)).unwrap();
        assert_eq!(a.kind(), Some(ValueKind::Int32));
        assert!(a.append(Value::from("no")).is_err());
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_array_bounds() {
        let mut a = VariantArray::new(Some(ValueKind::Int32));
        a.append(Value::Int(10)).unwrap();
        assert_eq!(a.get(0).unwrap(), &Value::Int(10));
        assert!(matches!(a.get(1), Err(ArrayError::OutOfBounds { index: 1, len: 1 })));
        assert!(matches!(a.get(-1), Err(ArrayError::OutOfBounds { .. })));
        a.set(0, Value::Int(11)).unwrap();
        assert_eq!(a.get(0).unwrap(), &Value::Int(11));
        a.clear();
        assert!(a.is_empty());
        assert_eq!(a.kind(), Some(ValueKind::Int32));
    }

    #[test]
    fn test_array_method_names() {
        assert_eq!(ArrayMethod::from_name("Append"), Some(ArrayMethod::Append));
        assert_eq!(ArrayMethod::from_name("append"), None);
    }
}
