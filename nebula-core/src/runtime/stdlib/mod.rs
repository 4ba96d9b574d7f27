//! Natives every script can call by bare name

use crate::core::{notification_hash, InstructionErrorCode, Value};
use crate::runtime::frame::Frame;
use crate::runtime::vm::Interpreter;

/// Bind `WriteLine`, `Write` and `HashString`; already-bound names are kept
pub fn bind_standard_library(vm: &mut Interpreter) {
    vm.bind_native_function("WriteLine", write_line);
    vm.bind_native_function("Write", write);
    vm.bind_native_function("HashString", hash_string);
}

fn write_line(vm: &mut Interpreter, frame: &mut Frame) -> InstructionErrorCode {
    match frame.stack_mut().pop() {
        Ok(value) => {
            vm.output().write_line(&value.to_string());
            InstructionErrorCode::None
        }
        Err(code) => code,
    }
}

fn write(vm: &mut Interpreter, frame: &mut Frame) -> InstructionErrorCode {
    match frame.stack_mut().pop() {
        Ok(value) => {
            vm.output().write(&value.to_string());
            InstructionErrorCode::None
        }
        Err(code) => code,
    }
}

/// Same hash `Wait_n`/`Notify` use, truncated to int32
fn hash_string(_vm: &mut Interpreter, frame: &mut Frame) -> InstructionErrorCode {
    match frame.stack_mut().pop_string() {
        Ok(text) => {
            frame
                .stack_mut()
                .push(Value::Int(notification_hash(&text) as i32));
            InstructionErrorCode::None
        }
        Err(code) => code,
    }
}
