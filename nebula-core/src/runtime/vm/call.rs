//! Call, Call_t, native dispatch, Ret and CallVirt

use tracing::{trace, warn};

use crate::core::{ArrayMethod, InstructionErrorCode, Value};
use crate::runtime::frame::Frame;

use super::Interpreter;

type Result<T> = std::result::Result<T, InstructionErrorCode>;

/// `[name]` looks in the caller's namespace, then the native table.
/// `[ns, name]` must name a loaded script function.
pub(super) fn call(
    vm: &mut Interpreter,
    frame: &mut Frame,
    args: &[Value],
    threaded: bool,
) -> Result<()> {
    let function = match args {
        [Value::String(ns), Value::String(name)] => vm.find_function(ns, name).ok_or_else(|| {
            warn!(target: "nebula::vm", "function '{}::{}' not found", ns, name);
            InstructionErrorCode::FunctionNotFound
        })?,
        [Value::String(name)] => {
            let own = frame.function().namespace().to_string();
            match vm.find_function(&own, name) {
                Some(function) => function,
                None => return call_native(vm, frame, name),
            }
        }
        _ => return Err(fatal!("malformed call operands {:?}", args)),
    };

    let mut child = vm.create_frame(function);
    child.bind_arguments(frame.stack_mut())?;
    trace!(
        target: "nebula::vm",
        callee = %child.function().signature(),
        threaded,
        "call"
    );
    if threaded {
        child.detach_parent();
        vm.spawn_thread(child);
    } else {
        vm.push_pending_frame(child);
    }
    Ok(())
}

/// The native works directly on the caller's stack
fn call_native(vm: &mut Interpreter, frame: &mut Frame, name: &str) -> Result<()> {
    let native = vm.native_function(name).ok_or_else(|| {
        warn!(target: "nebula::vm", "native function '{}' is not bound", name);
        InstructionErrorCode::NativeFunctionNotFound
    })?;
    let code = native(vm, frame);
    if !code.is_ok() {
        warn!(target: "nebula::vm", "native function '{}' failed with {}", name, code);
    }
    code.into_result()
}

/// Hand the single return value to the parent, or drop it for thread roots
pub(super) fn ret(vm: &mut Interpreter, frame: &mut Frame) -> Result<()> {
    let Some(kind) = frame.function().return_kind() else {
        return Ok(());
    };
    if frame.stack().len() != 1 {
        return Err(fatal!(
            "{} returns {} but {} values are on the stack",
            frame.function().signature(),
            kind,
            frame.stack().len()
        ));
    }
    let value = frame.stack_mut().pop()?;
    if value.kind() != kind {
        return Err(fatal!(
            "{} returns {} but the stack holds {}",
            frame.function().signature(),
            kind,
            value.kind()
        ));
    }
    if frame.has_parent() {
        vm.push_to_parent(value)?;
    }
    Ok(())
}

/// Receiver is on top of the stack, method arguments below it
pub(super) fn call_virtual(vm: &mut Interpreter, frame: &mut Frame, name: &str) -> Result<()> {
    let handle = match frame.stack_mut().pop()? {
        Value::Array(handle) => handle,
        other => {
            warn!(
                target: "nebula::vm",
                "no virtual method '{}' on {}",
                name,
                other.kind()
            );
            return Err(InstructionErrorCode::NativeFunctionNotFound);
        }
    };
    let Some(method) = ArrayMethod::from_name(name) else {
        warn!(target: "nebula::vm", "no virtual method '{}' on array", name);
        return Err(InstructionErrorCode::NativeFunctionNotFound);
    };

    match method {
        ArrayMethod::Append => {
            let value = frame.stack_mut().pop()?;
            vm.heap_mut()
                .array_mut(handle)
                .map_err(|e| fatal!("Append: {}", e))?
                .append(value)
                .map_err(|e| fatal!("Append: {}", e))
        }
        ArrayMethod::Clear => {
            vm.heap_mut()
                .array_mut(handle)
                .map_err(|e| fatal!("Clear: {}", e))?
                .clear();
            Ok(())
        }
        ArrayMethod::Count => {
            let len = vm
                .heap()
                .array(handle)
                .map_err(|e| fatal!("Count: {}", e))?
                .len();
            frame.stack_mut().push(len as i32);
            Ok(())
        }
    }
}
