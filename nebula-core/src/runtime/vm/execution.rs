//! Single dispatch point: one instruction per tick

use std::time::Duration;

use crate::core::{
    notification_hash, InstructionErrorCode, ObjectHandle, Opcode, Value, ValueKind,
};
use crate::runtime::frame::{Frame, SlotSpace};

use super::call;
use super::operators::{self, ArithOp, IntOp};
use super::Interpreter;

type Result<T> = std::result::Result<T, InstructionErrorCode>;

/// Execute `opcode` against `frame`; `None` on success
pub fn execute_instruction(
    opcode: Opcode,
    vm: &mut Interpreter,
    frame: &mut Frame,
    args: &[Value],
) -> InstructionErrorCode {
    InstructionErrorCode::from_result(execute(opcode, vm, frame, args))
}

fn execute(opcode: Opcode, vm: &mut Interpreter, frame: &mut Frame, args: &[Value]) -> Result<()> {
    use Opcode::*;

    match opcode {
        // ===== stack =====
        Nop => Ok(()),
        Pop => frame.stack_mut().pop().map(drop),
        Dup => {
            let top = frame.stack().peek()?.clone();
            frame.stack_mut().push(top);
            Ok(())
        }

        // ===== constants =====
        LdcI4Zero => push(frame, Value::Int(0)),
        LdcI4One => push(frame, Value::Int(1)),
        LdcI4 => push(frame, Value::Int(int_arg(args, 0)?)),
        LdcR4 => match args.first() {
            Some(Value::Float(f)) => push(frame, Value::Float(*f)),
            _ => Err(fatal!("Ldc_r4 expects a float operand")),
        },
        LdcS => push(frame, Value::from(str_arg(args, 0)?)),

        // ===== arithmetic =====
        Add => arithmetic(frame, ArithOp::Add),
        Sub => arithmetic(frame, ArithOp::Sub),
        Mul => arithmetic(frame, ArithOp::Mul),
        Div => arithmetic(frame, ArithOp::Div),
        Rem => arithmetic(frame, ArithOp::Rem),
        Ceq => int_binary(frame, IntOp::Ceq),
        Clt => int_binary(frame, IntOp::Clt),
        Cgt => int_binary(frame, IntOp::Cgt),
        And => int_binary(frame, IntOp::And),
        Or => int_binary(frame, IntOp::Or),
        Xor => int_binary(frame, IntOp::Xor),
        Neg => {
            let v = frame.stack_mut().pop()?;
            push(frame, operators::negate(v)?)
        }
        Not => {
            let v = frame.stack_mut().pop()?;
            push(frame, operators::complement(v)?)
        }
        AddStr => concat_strings(frame, int_arg(args, 0)?),
        ConvType => {
            let target = kind_arg(args, 0)?;
            let v = frame.stack_mut().pop()?;
            push(frame, operators::convert(v, target)?)
        }

        // ===== control flow =====
        Br => frame.jump(label_arg(args)?),
        BrTrue => branch_if(frame, args, 1),
        BrFalse => branch_if(frame, args, 0),

        // ===== calls =====
        Call => call::call(vm, frame, args, false),
        CallThreaded => call::call(vm, frame, args, true),
        CallVirt => call::call_virtual(vm, frame, str_arg(args, 0)?),
        Ret => call::ret(vm, frame),

        // ===== scheduling =====
        Wait => {
            let millis = frame.stack_mut().pop_number()?;
            frame
                .scheduler_mut()
                .sleep_for(Duration::from_millis(millis.max(0.0) as u64));
            Ok(())
        }
        WaitNotify => {
            let (object, hash) = notification_operands(vm, frame)?;
            vm.wait_for_notification(frame, object, hash);
            Ok(())
        }
        Notify => {
            let (object, hash) = notification_operands(vm, frame)?;
            vm.notify(object, hash);
            Ok(())
        }

        // ===== allocation =====
        Newobj => {
            let (namespace, name) = qualified_name(frame, args)?;
            let definition = vm.find_bundle(&namespace, name).ok_or_else(|| {
                tracing::warn!(target: "nebula::vm", "bundle '{}::{}' not found", namespace, name);
                InstructionErrorCode::BundleNotFound
            })?;
            let handle = vm.alloc_bundle(definition, frame);
            push(frame, Value::Bundle(handle))
        }
        NewArr => {
            let kind = kind_arg(args, 0)?;
            if kind == ValueKind::Bundle && args.len() > 1 {
                let (namespace, name) = qualified_name(frame, &args[1..])?;
                if vm.find_bundle(&namespace, name).is_none() {
                    tracing::warn!(target: "nebula::vm", "bundle '{}::{}' not found", namespace, name);
                    return Err(InstructionErrorCode::BundleNotFound);
                }
            }
            let handle = vm.alloc_array(Some(kind), frame);
            push(frame, Value::Array(handle))
        }

        // ===== locals & params =====
        Ldarg => load_slot(frame, SlotSpace::Param, args),
        Ldloc => load_slot(frame, SlotSpace::Local, args),
        StArg => store_slot(frame, SlotSpace::Param, args),
        Stloc => store_slot(frame, SlotSpace::Local, args),
        LdBarg => load_field(vm, frame, SlotSpace::Param, args),
        LdBloc => load_field(vm, frame, SlotSpace::Local, args),
        StBArg => store_field(vm, frame, SlotSpace::Param, args),
        StBloc => store_field(vm, frame, SlotSpace::Local, args),

        // ===== arrays =====
        Ldelem => {
            let index = frame.stack_mut().pop_int()?;
            let array = frame.stack_mut().pop_array()?;
            let value = vm
                .heap()
                .array(array)
                .map_err(|e| fatal!("Ldelem: {}", e))?
                .get(index as i64)
                .map_err(|e| fatal!("Ldelem: {}", e))?
                .clone();
            push(frame, value)
        }
        StElem => {
            let value = frame.stack_mut().pop()?;
            let index = frame.stack_mut().pop_int()?;
            let array = frame.stack_mut().pop_array()?;
            vm.heap_mut()
                .array_mut(array)
                .map_err(|e| fatal!("StElem: {}", e))?
                .set(index as i64, value)
                .map_err(|e| fatal!("StElem: {}", e))
        }
    }
}

// ===== operand helpers =====

fn push(frame: &mut Frame, value: Value) -> Result<()> {
    frame.stack_mut().push(value);
    Ok(())
}

pub(super) fn int_arg(args: &[Value], at: usize) -> Result<i32> {
    match args.get(at) {
        Some(Value::Int(v)) => Ok(*v),
        other => Err(fatal!("operand {} should be an int32, got {:?}", at, other)),
    }
}

pub(super) fn str_arg(args: &[Value], at: usize) -> Result<&str> {
    match args.get(at) {
        Some(Value::String(s)) => Ok(s),
        other => Err(fatal!("operand {} should be a string, got {:?}", at, other)),
    }
}

fn kind_arg(args: &[Value], at: usize) -> Result<ValueKind> {
    let code = int_arg(args, at)?;
    ValueKind::from_code(code).ok_or_else(|| fatal!("unknown type code {}", code))
}

fn index_arg(args: &[Value], at: usize) -> Result<usize> {
    let v = int_arg(args, at)?;
    usize::try_from(v).map_err(|_| fatal!("negative slot index {}", v))
}

fn label_arg(args: &[Value]) -> Result<usize> {
    index_arg(args, 0)
}

/// `[Name]` resolves in the frame's own namespace, `[ns, Name]` explicitly
fn qualified_name<'a>(frame: &Frame, args: &'a [Value]) -> Result<(String, &'a str)> {
    match args {
        [Value::String(name)] => Ok((frame.function().namespace().to_string(), name.as_str())),
        [Value::String(ns), Value::String(name)] => Ok((ns.clone(), name.as_str())),
        _ => Err(fatal!("malformed type operands {:?}", args)),
    }
}

// ===== instruction bodies =====

fn arithmetic(frame: &mut Frame, op: ArithOp) -> Result<()> {
    let b = frame.stack_mut().pop()?;
    let a = frame.stack_mut().pop()?;
    push(frame, operators::arithmetic(op, a, b)?)
}

fn int_binary(frame: &mut Frame, op: IntOp) -> Result<()> {
    let b = frame.stack_mut().pop()?;
    let a = frame.stack_mut().pop()?;
    push(frame, operators::int_binary(op, a, b)?)
}

/// Pop `count` strings and push them joined in push order
fn concat_strings(frame: &mut Frame, count: i32) -> Result<()> {
    let count = usize::try_from(count).map_err(|_| fatal!("AddStr count {} is negative", count))?;
    if frame.stack().len() < count {
        return Err(fatal!(
            "AddStr {} with only {} values on stack",
            count,
            frame.stack().len()
        ));
    }
    let mut parts = Vec::with_capacity(count);
    for _ in 0..count {
        parts.push(frame.stack_mut().pop_string()?);
    }
    parts.reverse();
    push(frame, Value::String(parts.concat()))
}

fn branch_if(frame: &mut Frame, args: &[Value], expected: i32) -> Result<()> {
    let label = label_arg(args)?;
    if frame.stack_mut().pop_int()? == expected {
        frame.jump(label)?;
    }
    Ok(())
}

fn notification_operands(vm: &Interpreter, frame: &mut Frame) -> Result<(ObjectHandle, u64)> {
    let name = frame.stack_mut().pop_string()?;
    let object = frame.stack_mut().pop_bundle()?;
    if !vm.heap().contains(object) {
        return Err(fatal!("notification target {} is not a live bundle", object));
    }
    Ok((object, notification_hash(&name)))
}

fn load_slot(frame: &mut Frame, space: SlotSpace, args: &[Value]) -> Result<()> {
    let index = index_arg(args, 0)?;
    let value = frame.memory().load(space, index)?.clone();
    push(frame, value)
}

fn store_slot(frame: &mut Frame, space: SlotSpace, args: &[Value]) -> Result<()> {
    let index = index_arg(args, 0)?;
    let value = frame.stack_mut().pop()?;
    frame.memory_mut().store(space, index, value)
}

fn bundle_in_slot(frame: &Frame, space: SlotSpace, index: usize) -> Result<ObjectHandle> {
    match frame.memory().load(space, index)? {
        Value::Bundle(handle) => Ok(*handle),
        other => Err(fatal!("slot {} holds {}, not a bundle", index, other.kind())),
    }
}

fn load_field(vm: &Interpreter, frame: &mut Frame, space: SlotSpace, args: &[Value]) -> Result<()> {
    let handle = bundle_in_slot(frame, space, index_arg(args, 0)?)?;
    let field = index_arg(args, 1)?;
    let value = vm
        .heap()
        .bundle(handle)
        .map_err(|e| fatal!("{}", e))?
        .get(field)
        .map_err(|e| fatal!("{}", e))?
        .clone();
    push(frame, value)
}

fn store_field(
    vm: &mut Interpreter,
    frame: &mut Frame,
    space: SlotSpace,
    args: &[Value],
) -> Result<()> {
    let handle = bundle_in_slot(frame, space, index_arg(args, 0)?)?;
    let field = index_arg(args, 1)?;
    let value = frame.stack_mut().pop()?;
    vm.heap_mut()
        .bundle_mut(handle)
        .map_err(|e| fatal!("{}", e))?
        .set(field, value)
        .map_err(|e| fatal!("{}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::{Function, ScriptBuilder};

    fn frame_with(vm: &mut Interpreter, locals: Vec<ValueKind>, values: &[Value]) -> Frame {
        let function = Function::new("F", None)
            .with_locals(locals)
            .with_body(vec![crate::core::Instruction::simple(Opcode::Nop); 8]);
        let mut frame = vm.create_frame(Arc::new(function));
        for v in values {
            frame.stack_mut().push(v.clone());
        }
        frame
    }

    fn run(vm: &mut Interpreter, frame: &mut Frame, opcode: Opcode, args: &[Value]) -> InstructionErrorCode {
        execute_instruction(opcode, vm, frame, args)
    }

    #[test]
    fn test_divide_by_zero_only_consumes_operands() {
        let mut vm = Interpreter::new();
        let mut frame = frame_with(&mut vm, vec![], &[9.into(), 7.into(), 0.into()]);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::Div, &[]),
            InstructionErrorCode::DivideByZero
        );
        assert_eq!(frame.stack().len(), 1);
        assert_eq!(frame.stack().peek(), Ok(&Value::Int(9)));
    }

    #[test]
    fn test_stack_ops() {
        let mut vm = Interpreter::new();
        let mut frame = frame_with(&mut vm, vec![], &[3.into()]);
        assert_eq!(run(&mut vm, &mut frame, Opcode::Dup, &[]), InstructionErrorCode::None);
        assert_eq!(frame.stack().len(), 2);
        assert_eq!(run(&mut vm, &mut frame, Opcode::Pop, &[]), InstructionErrorCode::None);
        assert_eq!(run(&mut vm, &mut frame, Opcode::Pop, &[]), InstructionErrorCode::None);
        assert_eq!(run(&mut vm, &mut frame, Opcode::Pop, &[]), InstructionErrorCode::Fatal);
    }

    #[test]
    fn test_locals_are_typed() {
        let mut vm = Interpreter::new();
        let mut frame = frame_with(&mut vm, vec![ValueKind::Int32], &["text".into()]);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::Ldloc, &[Value::Int(0)]),
            InstructionErrorCode::Fatal
        );
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::Stloc, &[Value::Int(0)]),
            InstructionErrorCode::Fatal
        );
        frame.stack_mut().push(4);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::Stloc, &[Value::Int(0)]),
            InstructionErrorCode::None
        );
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::Ldloc, &[Value::Int(0)]),
            InstructionErrorCode::None
        );
        assert_eq!(frame.stack().peek(), Ok(&Value::Int(4)));
    }

    #[test]
    fn test_conditional_branches() {
        let mut vm = Interpreter::new();
        let mut frame = frame_with(&mut vm, vec![], &[1.into()]);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::BrTrue, &[Value::Int(5)]),
            InstructionErrorCode::None
        );
        assert_eq!(frame.cursor(), 5);

        frame.stack_mut().push(1);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::BrFalse, &[Value::Int(2)]),
            InstructionErrorCode::None
        );
        assert_eq!(frame.cursor(), 5);

        frame.stack_mut().push(0);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::BrFalse, &[Value::Int(99)]),
            InstructionErrorCode::Fatal
        );
    }

    #[test]
    fn test_add_str_keeps_push_order() {
        let mut vm = Interpreter::new();
        let mut frame = frame_with(&mut vm, vec![], &["a".into(), "b".into(), "c".into()]);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::AddStr, &[Value::Int(3)]),
            InstructionErrorCode::None
        );
        assert_eq!(frame.stack().peek(), Ok(&Value::from("abc")));
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::AddStr, &[Value::Int(2)]),
            InstructionErrorCode::Fatal
        );
    }

    #[test]
    fn test_call_binds_parameters_into_pending_frame() {
        let mut vm = Interpreter::new();
        let mut builder = ScriptBuilder::new("Lib");
        builder
            .add_function(
                Function::new("Pair", None)
                    .with_parameters(vec![ValueKind::Int32, ValueKind::String])
                    .with_body(vec![crate::core::Instruction::simple(Opcode::Ret)]),
            )
            .unwrap();
        vm.add_script(builder.build());

        let mut frame = frame_with(&mut vm, vec![], &[0.into(), 1.into(), "two".into()]);
        assert_eq!(
            run(
                &mut vm,
                &mut frame,
                Opcode::Call,
                &[Value::from("Lib"), Value::from("Pair")]
            ),
            InstructionErrorCode::None
        );
        assert_eq!(frame.stack().len(), 1);

        let child = vm.pending_frame.take().unwrap();
        assert!(child.has_parent());
        assert_eq!(child.memory().load(SlotSpace::Param, 0), Ok(&Value::Int(1)));
        assert_eq!(
            child.memory().load(SlotSpace::Param, 1),
            Ok(&Value::from("two"))
        );

        assert_eq!(
            run(&mut vm, &mut frame, Opcode::Call, &[Value::from("Lib"), Value::from("Nope")]),
            InstructionErrorCode::FunctionNotFound
        );
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::Call, &[Value::from("Nope")]),
            InstructionErrorCode::NativeFunctionNotFound
        );
    }

    #[test]
    fn test_call_threaded_spawns_detached_thread() {
        let mut vm = Interpreter::new();
        let mut builder = ScriptBuilder::new("Lib");
        builder
            .add_function(
                Function::new("Job", None)
                    .with_body(vec![crate::core::Instruction::simple(Opcode::Ret)]),
            )
            .unwrap();
        vm.add_script(builder.build());

        let mut frame = frame_with(&mut vm, vec![], &[]);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::CallThreaded, &[Value::from("Lib"), Value::from("Job")]),
            InstructionErrorCode::None
        );
        assert!(vm.pending_frame.is_none());
        assert_eq!(vm.thread_map().len(), 1);
        assert!(!vm.thread_map().get(0).unwrap()[0].has_parent());
    }

    #[test]
    fn test_native_error_is_propagated() {
        let mut vm = Interpreter::new();
        vm.bind_native_function("Boom", |_, _| InstructionErrorCode::DivideByZero);
        let mut frame = frame_with(&mut vm, vec![], &[]);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::Call, &[Value::from("Boom")]),
            InstructionErrorCode::DivideByZero
        );
    }

    #[test]
    fn test_newobj_unknown_bundle() {
        let mut vm = Interpreter::new();
        let mut frame = frame_with(&mut vm, vec![], &[]);
        assert_eq!(
            run(&mut vm, &mut frame, Opcode::Newobj, &[Value::from("Missing")]),
            InstructionErrorCode::BundleNotFound
        );
        assert!(vm.heap().is_empty());
    }
}
