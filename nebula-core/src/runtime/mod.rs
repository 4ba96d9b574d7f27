//! Runtime layer: heap, frames, scheduler and the interpreter

/// Log the concrete cause of a fatal instruction error and yield `Fatal`
macro_rules! fatal {
    ($($arg:tt)*) => {{
        tracing::warn!(target: "nebula::vm", $($arg)*);
        $crate::core::InstructionErrorCode::Fatal
    }};
}

pub mod debug;
pub mod frame;
pub mod heap;
pub mod notify;
pub mod output;
pub mod stdlib;
pub mod threads;
pub mod vm;

pub use debug::{DebugSymbols, DebugSymbolsError, JsonDebugSymbols};
pub use frame::{DataStack, Frame, FrameId, FrameMemory, FrameScheduler, FrameStatus};
pub use heap::{CollectStats, Heap, HeapError};
pub use notify::NotificationRegistry;
pub use output::{BufferedOutput, ConsoleOutput, StandardOutput};
pub use threads::{CallStack, ThreadMap};
pub use vm::{
    execute_instruction, generate_arguments_for_opcode, ArgumentError, ExecutionControl,
    Interpreter, InterpreterState, NativeFunction,
};
