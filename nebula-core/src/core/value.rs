//! Runtime value model
//!
//! `Value` is the closed tagged union that lives on operand stacks, in frame
//! slots, in bundle fields and in array elements. Heap kinds carry an
//! [`ObjectHandle`] into the interpreter heap; copying them copies the
//! reference, never the object.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::object::ObjectHandle;

/// The five value kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int32,
    Float,
    String,
    Bundle,
    Array,
}

impl ValueKind {
    pub const ALL: [ValueKind; 5] = [
        ValueKind::Int32,
        ValueKind::Float,
        ValueKind::String,
        ValueKind::Bundle,
        ValueKind::Array,
    ];

    /// Numeric code carried by instruction operands (ConvType, NewArr)
    pub fn code(self) -> i32 {
        match self {
            ValueKind::Int32 => 0,
            ValueKind::Float => 1,
            ValueKind::String => 2,
            ValueKind::Bundle => 3,
            ValueKind::Array => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    /// Parse a script-level type name. `bool` is an alias of `int32`.
    /// `void` is not a value kind and yields `None`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int32" | "int" | "bool" => Some(ValueKind::Int32),
            "float" => Some(ValueKind::Float),
            "string" => Some(ValueKind::String),
            "bundle" => Some(ValueKind::Bundle),
            "array" => Some(ValueKind::Array),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Int32 => "int32",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Bundle => "bundle",
            ValueKind::Array => "array",
        }
    }

    pub fn is_reference(self) -> bool {
        matches!(self, ValueKind::Bundle | ValueKind::Array)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    String(String),
    Bundle(ObjectHandle),
    Array(ObjectHandle),
}

impl Value {
    // ==================== type queries ====================

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int32,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Bundle(_) => ValueKind::Bundle,
            Value::Array(_) => ValueKind::Array,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    // ==================== accessors ====================

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view with int-to-float promotion
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Value::Int(v) => Some(*v as f32),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bundle(&self) -> Option<ObjectHandle> {
        match self {
            Value::Bundle(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ObjectHandle> {
        match self {
            Value::Array(h) => Some(*h),
            _ => None,
        }
    }

    /// Heap handle of either reference kind
    pub fn as_handle(&self) -> Option<ObjectHandle> {
        match self {
            Value::Bundle(h) | Value::Array(h) => Some(*h),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::Bundle(h) => write!(f, "bundle@{}", h.index()),
            Value::Array(h) => write!(f, "array@{}", h.index()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(v as i32)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Hash used to key Wait_n/Notify channels and returned by `HashString`
pub fn notification_hash(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}
