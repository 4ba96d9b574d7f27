//! Frames: one live activation of a script function

mod memory;
mod scheduler;
mod stack;

pub use memory::{FrameMemory, FrameVariable, SlotSpace};
pub use scheduler::FrameScheduler;
pub use stack::DataStack;

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::core::{Function, Instruction, InstructionErrorCode, ObjectHandle};
use crate::runtime::vm::{execute_instruction, Interpreter};

/// Interpreter-unique frame identity (notification listeners key on it)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Outcome of one tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    FatalError,
    Running,
    /// Sleeping; nothing was executed
    Paused,
    Finished,
}

#[derive(Debug)]
pub struct Frame {
    id: FrameId,
    function: Arc<Function>,
    memory: FrameMemory,
    stack: DataStack,
    cursor: usize,
    last_executed: Option<usize>,
    has_parent: bool,
    scheduler: FrameScheduler,
    last_error: InstructionErrorCode,
}

impl Frame {
    // ==================== construction ====================

    /// A parentless frame with unbound parameters
    pub fn new(id: FrameId, function: Arc<Function>, stack_capacity: usize) -> Self {
        let memory = FrameMemory::new(function.parameters(), function.locals());
        Self {
            id,
            function,
            memory,
            stack: DataStack::with_capacity(stack_capacity),
            cursor: 0,
            last_executed: None,
            has_parent: false,
            scheduler: FrameScheduler::new(),
            last_error: InstructionErrorCode::None,
        }
    }

    /// Pop this function's arguments off the caller's stack, last-declared
    /// parameter first, and link the caller as parent.
    pub fn bind_arguments(&mut self, caller: &mut DataStack) -> Result<(), InstructionErrorCode> {
        let params = self.function.parameters();
        if caller.len() < params.len() {
            return Err(fatal!(
                "{} expects {} arguments, caller stack holds {}",
                self.function.signature(),
                params.len(),
                caller.len()
            ));
        }
        for (index, declared) in params.iter().enumerate().rev() {
            let value = caller.pop()?;
            if value.kind() != *declared {
                warn!(
                    target: "nebula::vm",
                    "{}: parameter {} declared {} bound to {}",
                    self.function.signature(),
                    index,
                    declared,
                    value.kind()
                );
            }
            self.memory.bind_param(index, value);
        }
        self.has_parent = true;
        Ok(())
    }

    /// Drop the parent link; a later Ret discards its value
    pub fn detach_parent(&mut self) {
        self.has_parent = false;
    }

    // ==================== accessors ====================

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn memory(&self) -> &FrameMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut FrameMemory {
        &mut self.memory
    }

    pub fn stack(&self) -> &DataStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut DataStack {
        &mut self.stack
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Jump to an absolute instruction index
    pub fn jump(&mut self, label: usize) -> Result<(), InstructionErrorCode> {
        if label >= self.function.body().len() {
            return Err(fatal!(
                "{}: branch target {} outside body of {} instructions",
                self.function.signature(),
                label,
                self.function.body().len()
            ));
        }
        self.cursor = label;
        Ok(())
    }

    pub fn has_parent(&self) -> bool {
        self.has_parent
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler {
        &mut self.scheduler
    }

    pub fn is_sleeping(&mut self) -> bool {
        self.scheduler.is_sleeping()
    }

    pub fn last_error(&self) -> InstructionErrorCode {
        self.last_error
    }

    /// Index of the instruction being (or last) executed
    pub fn current_instruction_index(&self) -> usize {
        self.last_executed.unwrap_or(self.cursor)
    }

    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.function.body().get(self.current_instruction_index())
    }

    /// Heap handles held by slots and the operand stack
    pub fn roots(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.memory
            .references()
            .chain(self.stack.iter().filter_map(|v| v.as_handle()))
    }

    // ==================== execution ====================

    /// Execute exactly one instruction unless the frame is suspended
    pub fn tick(&mut self, vm: &mut Interpreter) -> FrameStatus {
        if self.scheduler.is_sleeping() {
            return FrameStatus::Paused;
        }

        let function = Arc::clone(&self.function);
        let body = function.body();
        let Some(instruction) = body.get(self.cursor) else {
            self.last_error = fatal!(
                "{}: instruction cursor {} past end of body",
                function.signature(),
                self.cursor
            );
            return FrameStatus::FatalError;
        };

        let index = self.cursor;
        self.last_executed = Some(index);
        self.cursor += 1;

        let code = execute_instruction(instruction.opcode, vm, self, &instruction.arguments);
        if !code.is_ok() {
            self.last_error = code;
            return FrameStatus::FatalError;
        }

        if instruction.opcode == crate::core::Opcode::Ret {
            return FrameStatus::Finished;
        }

        // fell through the last instruction
        if index + 1 == body.len() && self.cursor == body.len() {
            self.last_error = fatal!(
                "{}: execution ran past the last instruction ({})",
                function.signature(),
                instruction
            );
            return FrameStatus::FatalError;
        }

        FrameStatus::Running
    }
}
