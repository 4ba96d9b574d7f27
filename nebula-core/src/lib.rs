//! Nebula Core - value model, heap, frames, instruction engine and loader
//!
//! Pure in-memory logic: the only I/O is reading script and debug-symbol
//! files on request and the default console output sink.
//!
//! Configuration is passed explicitly via `VmConfig`, not via global state.

pub mod core;
pub mod loader;
pub mod runtime;

// Re-export common types
pub use crate::core::{
    ErrorCallStack, Function, Instruction, InstructionErrorCode, ObjectHandle, Opcode, Script,
    Value, ValueKind,
};
pub use loader::{load_file, load_source, DiagnosticReport, LoadError, LoadedScript};
pub use runtime::stdlib::bind_standard_library;
pub use runtime::{BufferedOutput, Frame, Interpreter, InterpreterState, StandardOutput};

// Re-export config types from nebula-config
pub use nebula_config::{GcConfig, LogConfig, LogLevel, Phase, VmConfig};
