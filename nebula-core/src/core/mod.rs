//! Core layer: pure data types shared by the runtime and the loader

pub mod error;
pub mod instruction;
pub mod object;
pub mod script;
pub mod value;

pub use error::{ErrorCallStack, ErrorCallStackLine, InstructionErrorCode};
pub use instruction::{Instruction, Opcode};
pub use object::{
    ArrayError, ArrayMethod, Bundle, BundleField, FieldError, HeapObject, ObjectHandle,
    VariantArray,
};
pub use script::{BundleDefinition, Function, FunctionAttribute, Script, ScriptBuilder, ScriptError};
pub use value::{notification_hash, Value, ValueKind};
