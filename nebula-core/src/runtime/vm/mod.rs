//! Interpreter: owns the logical threads, drives ticks and manages state
//!
//! ```ignore
//! let mut vm = Interpreter::new();
//! bind_standard_library(&mut vm);
//! vm.add_script(script);
//! vm.init(false);
//! let state = vm.run();
//! ```

mod arguments;
mod call;
mod control;
mod execution;
mod operators;

pub use arguments::{generate_arguments_for_opcode, ArgumentError};
pub use control::{ExecutionControl, InterpreterState};
pub use execution::execute_instruction;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nebula_config::VmConfig;
use tracing::{debug, error, info, trace, warn};

use crate::core::{
    Bundle, BundleDefinition, ErrorCallStack, ErrorCallStackLine, Function, HeapObject,
    InstructionErrorCode, ObjectHandle, Script, Value, ValueKind, VariantArray,
};

use super::debug::DebugSymbols;
use super::frame::{Frame, FrameId, FrameStatus};
use super::heap::{CollectStats, Heap};
use super::notify::NotificationRegistry;
use super::output::{ConsoleOutput, StandardOutput};
use super::threads::ThreadMap;

/// Host callback invoked by name from script code
pub type NativeFunction =
    Arc<dyn Fn(&mut Interpreter, &mut Frame) -> InstructionErrorCode + Send + Sync>;

type ExitCallback = Box<dyn FnMut() + Send>;

pub struct Interpreter {
    config: VmConfig,
    control: ExecutionControl,
    threads: ThreadMap,
    current_thread: usize,
    slice_started: Instant,
    /// Frame created by the executing tick, pushed once its caller is back
    pending_frame: Option<Frame>,
    /// Set while a frame is out of its call stack for a tick
    in_tick: bool,
    /// `collect_garbage` called mid-tick; runs once the tick is over
    collection_deferred: bool,
    next_frame_id: u64,
    scripts: HashMap<String, Arc<Script>>,
    natives: HashMap<String, NativeFunction>,
    heap: Heap,
    notifications: NotificationRegistry,
    fatal_error: Option<ErrorCallStack>,
    output: Box<dyn StandardOutput>,
    exit_callback: Option<ExitCallback>,
    exit_notified: bool,
    debug_symbols: Option<Box<dyn DebugSymbols>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("state", &self.state())
            .field("threads", &self.threads.len())
            .field("current_thread", &self.current_thread)
            .field("scripts", &self.scripts.len())
            .field("natives", &self.natives.len())
            .field("heap_objects", &self.heap.len())
            .finish()
    }
}

impl Interpreter {
    // ==================== construction ====================

    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            heap: Heap::new(&config.gc),
            config,
            control: ExecutionControl::new(InterpreterState::Paused),
            threads: ThreadMap::new(),
            current_thread: 0,
            slice_started: Instant::now(),
            pending_frame: None,
            in_tick: false,
            collection_deferred: false,
            next_frame_id: 0,
            scripts: HashMap::new(),
            natives: HashMap::new(),
            notifications: NotificationRegistry::new(),
            fatal_error: None,
            output: Box::new(ConsoleOutput),
            exit_callback: None,
            exit_notified: false,
            debug_symbols: None,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    // ==================== host driving API ====================

    /// Enter Running (or Paused) and schedule thread 0
    pub fn init(&mut self, start_paused: bool) {
        let state = if start_paused {
            InterpreterState::Paused
        } else {
            InterpreterState::Running
        };
        self.control.set_state(state);
        self.current_thread = 0;
        self.slice_started = Instant::now();
        info!(
            target: "nebula::vm",
            threads = self.threads.len(),
            state = %state,
            "interpreter initialised"
        );
    }

    /// Step until Exited or Abort; blocks while Paused
    pub fn run(&mut self) -> InterpreterState {
        loop {
            match self.control.state() {
                InterpreterState::Paused => {
                    self.control.wait_while_paused();
                }
                InterpreterState::Running => {
                    if !self.step() {
                        break;
                    }
                }
                InterpreterState::Abort | InterpreterState::Exited => {
                    self.check_and_set_exit_state();
                    break;
                }
            }
        }
        self.state()
    }

    /// Tick the current thread's top frame once.
    /// Returns false once the VM can make no further progress.
    pub fn step(&mut self) -> bool {
        if self.check_and_set_exit_state() {
            return false;
        }
        self.skip_sleeping_thread();

        let index = self.current_thread;
        let Some(mut frame) = self.threads.get_mut(index).and_then(Vec::pop) else {
            self.remove_thread(index);
            return !self.check_and_set_exit_state();
        };

        self.in_tick = true;
        let status = frame.tick(self);
        self.in_tick = false;
        let pending = self.pending_frame.take();

        match status {
            FrameStatus::FatalError => {
                self.restore_frames(index, frame, None);
                if let Some(orphan) = pending {
                    self.retire_frame(orphan);
                }
                self.capture_fatal_error(index);
                self.control.set_state(InterpreterState::Abort);
            }
            FrameStatus::Finished => {
                trace!(
                    target: "nebula::vm",
                    function = %frame.function().signature(),
                    "frame finished"
                );
                self.retire_frame(frame);
                if let Some(orphan) = pending {
                    self.retire_frame(orphan);
                }
            }
            FrameStatus::Running | FrameStatus::Paused => {
                self.restore_frames(index, frame, pending);
            }
        }

        if std::mem::take(&mut self.collection_deferred) {
            self.collect_with(None);
        }

        if self.threads.get(index).is_some_and(Vec::is_empty) {
            self.remove_thread(index);
        } else if self.should_schedule_new_thread() {
            self.swap_executing_thread();
        }

        !self.check_and_set_exit_state()
    }

    /// Running -> Paused
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Paused -> Running
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Exit without running any remaining instructions
    pub fn stop(&mut self) {
        self.control.stop();
        self.discard_threads();
        info!(target: "nebula::vm", "interpreter stopped");
    }

    /// Drop every thread, script and native binding; back to Paused
    pub fn reset(&mut self) {
        self.discard_threads();
        self.scripts.clear();
        self.natives.clear();
        self.notifications.clear();
        self.collect_with(None);
        self.fatal_error = None;
        self.current_thread = 0;
        self.exit_notified = false;
        self.control.set_state(InterpreterState::Paused);
        debug!(target: "nebula::vm", "interpreter reset");
    }

    pub fn state(&self) -> InterpreterState {
        self.control.state()
    }

    /// Handle for pausing/resuming/stopping from another OS thread
    pub fn control(&self) -> ExecutionControl {
        self.control.clone()
    }

    pub fn thread_map(&self) -> &ThreadMap {
        &self.threads
    }

    pub fn current_thread_index(&self) -> usize {
        self.current_thread
    }

    pub fn fatal_error_callstack(&self) -> Option<&ErrorCallStack> {
        self.fatal_error.as_ref()
    }

    // ==================== scripts & natives ====================

    /// Rejects empty and duplicate namespaces; spawns auto-exec functions
    pub fn add_script(&mut self, script: Arc<Script>) -> bool {
        let namespace = script.namespace().to_string();
        if namespace.is_empty() {
            warn!(target: "nebula::loader", "rejecting script without a namespace");
            return false;
        }
        if self.scripts.contains_key(&namespace) {
            warn!(target: "nebula::loader", "namespace '{}' is already loaded", namespace);
            return false;
        }

        let auto_exec: Vec<Arc<Function>> = script.auto_exec_functions().cloned().collect();
        self.scripts.insert(namespace.clone(), script);
        for function in auto_exec {
            debug!(
                target: "nebula::sched",
                function = %function.signature(),
                "spawning auto-exec thread"
            );
            let frame = self.create_frame(function);
            self.threads.create_thread(frame);
        }
        info!(target: "nebula::loader", namespace = %namespace, "script added");
        true
    }

    pub fn script(&self, namespace: &str) -> Option<&Arc<Script>> {
        self.scripts.get(namespace)
    }

    /// Fails (without overwriting) when `name` is already bound
    pub fn bind_native_function<F>(&mut self, name: impl Into<String>, function: F) -> bool
    where
        F: Fn(&mut Interpreter, &mut Frame) -> InstructionErrorCode + Send + Sync + 'static,
    {
        let name = name.into();
        if self.natives.contains_key(&name) {
            warn!(target: "nebula::vm", "native function '{}' is already bound", name);
            return false;
        }
        self.natives.insert(name, Arc::new(function));
        true
    }

    pub fn native_function(&self, name: &str) -> Option<NativeFunction> {
        self.natives.get(name).cloned()
    }

    pub fn find_function(&self, namespace: &str, name: &str) -> Option<Arc<Function>> {
        self.scripts.get(namespace)?.function(name).cloned()
    }

    pub fn find_bundle(&self, namespace: &str, name: &str) -> Option<Arc<BundleDefinition>> {
        self.scripts.get(namespace)?.bundle(name).cloned()
    }

    // ==================== collaborators ====================

    pub fn set_output(&mut self, output: impl StandardOutput + 'static) {
        self.output = Box::new(output);
    }

    pub fn output(&mut self) -> &mut dyn StandardOutput {
        self.output.as_mut()
    }

    /// Called once when every thread has finished normally
    pub fn set_exit_callback(&mut self, callback: impl FnMut() + Send + 'static) {
        self.exit_callback = Some(Box::new(callback));
    }

    pub fn set_debug_symbols(&mut self, symbols: impl DebugSymbols + 'static) {
        self.debug_symbols = Some(Box::new(symbols));
    }

    // ==================== heap ====================

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// `frame` is the executing frame, which is outside every call stack
    pub fn alloc_bundle(&mut self, definition: Arc<BundleDefinition>, frame: &Frame) -> ObjectHandle {
        let object = HeapObject::Bundle(Bundle::new(definition));
        self.alloc(object, frame)
    }

    pub fn alloc_array(&mut self, kind: Option<ValueKind>, frame: &Frame) -> ObjectHandle {
        let object = HeapObject::Array(VariantArray::new(kind));
        self.alloc(object, frame)
    }

    /// Forced collection rooted in every live frame.
    ///
    /// Called from a native, the caller's frame is outside its call stack,
    /// so the cycle is put off until the tick ends and `None` is returned.
    /// Use [`Interpreter::collect_garbage_in`] to collect right away.
    pub fn collect_garbage(&mut self) -> Option<CollectStats> {
        if self.in_tick {
            self.collection_deferred = true;
            debug!(target: "nebula::gc", "collection deferred to the end of the tick");
            return None;
        }
        Some(self.collect_with(None))
    }

    /// Forced collection from inside a native; `frame` is the caller
    pub fn collect_garbage_in(&mut self, frame: &Frame) -> CollectStats {
        self.collect_with(Some(frame))
    }

    fn alloc(&mut self, object: HeapObject, frame: &Frame) -> ObjectHandle {
        if self.heap.should_collect() {
            self.collect_with(Some(frame));
        }
        self.heap.insert(object)
    }

    fn collect_with(&mut self, executing: Option<&Frame>) -> CollectStats {
        let mut roots: Vec<ObjectHandle> = Vec::new();
        for frame in self.threads.frames().chain(&self.pending_frame).chain(executing) {
            roots.extend(frame.roots());
        }
        let (stats, freed) = self.heap.collect(roots);
        for handle in freed {
            self.notifications.remove_object(handle);
        }
        stats
    }

    // ==================== notifications ====================

    /// Suspend `frame` until `hash` is notified on `object`
    pub fn wait_for_notification(&mut self, frame: &mut Frame, object: ObjectHandle, hash: u64) {
        frame.scheduler_mut().wait_for(object, hash);
        self.notifications.subscribe(object, frame.id());
    }

    /// Deliver to every listener of `object`; returns how many were released
    pub fn notify(&mut self, object: ObjectHandle, hash: u64) -> usize {
        let mut released = 0;
        for id in self.notifications.listeners(object) {
            let satisfied = match self.threads.find_frame_mut(id) {
                Some(frame) => frame.scheduler_mut().on_notification(object, hash),
                None => true,
            };
            if satisfied {
                self.notifications.unsubscribe(object, id);
                released += 1;
            }
        }
        trace!(target: "nebula::sched", object = %object, released, "notify");
        released
    }

    // ==================== frames ====================

    pub(crate) fn create_frame(&mut self, function: Arc<Function>) -> Frame {
        self.next_frame_id += 1;
        Frame::new(
            FrameId(self.next_frame_id),
            function,
            self.config.initial_stack_capacity,
        )
    }

    pub(crate) fn spawn_thread(&mut self, frame: Frame) {
        let index = self.threads.create_thread(frame);
        debug!(target: "nebula::sched", thread = index, "thread spawned");
    }

    pub(crate) fn push_pending_frame(&mut self, frame: Frame) {
        self.pending_frame = Some(frame);
    }

    /// Push onto the frame below the executing one
    pub(crate) fn push_to_parent(&mut self, value: Value) -> Result<(), InstructionErrorCode> {
        let parent = self
            .threads
            .get_mut(self.current_thread)
            .and_then(|stack| stack.last_mut())
            .ok_or_else(|| fatal!("returning frame has no parent on its call stack"))?;
        parent.stack_mut().push(value);
        Ok(())
    }

    fn restore_frames(&mut self, index: usize, frame: Frame, pending: Option<Frame>) {
        match self.threads.get_mut(index) {
            Some(stack) => {
                stack.push(frame);
                stack.extend(pending);
            }
            // threads were discarded by a native during the tick
            None => {
                self.retire_frame(frame);
                if let Some(orphan) = pending {
                    self.retire_frame(orphan);
                }
            }
        }
    }

    fn retire_frame(&mut self, frame: Frame) {
        self.notifications
            .remove_frame(frame.id(), frame.scheduler().waiting_objects());
    }

    fn discard_threads(&mut self) {
        for stack in self.threads.drain() {
            for frame in stack {
                self.retire_frame(frame);
            }
        }
        if let Some(orphan) = self.pending_frame.take() {
            self.retire_frame(orphan);
        }
        self.current_thread = 0;
    }

    // ==================== scheduling ====================

    fn remove_thread(&mut self, index: usize) {
        if self.threads.remove(index).is_some() {
            debug!(
                target: "nebula::sched",
                thread = index,
                remaining = self.threads.len(),
                "thread finished"
            );
        }
        // the former last thread now occupies `index`
        if self.current_thread >= self.threads.len() {
            self.current_thread = 0;
        }
        self.slice_started = Instant::now();
    }

    fn should_schedule_new_thread(&self) -> bool {
        self.threads.len() > 1
            && self.slice_started.elapsed() >= Duration::from_millis(self.config.time_slice_ms)
    }

    fn swap_executing_thread(&mut self) {
        let count = self.threads.len();
        self.current_thread = if count == 0 {
            0
        } else {
            (self.current_thread + 1) % count
        };
        self.slice_started = Instant::now();
        trace!(target: "nebula::sched", thread = self.current_thread, "swapped thread");
    }

    /// With several threads, never park the CPU on a sleeping one
    fn skip_sleeping_thread(&mut self) {
        let count = self.threads.len();
        if count < 2 {
            return;
        }
        for offset in 0..count {
            let index = (self.current_thread + offset) % count;
            let runnable = self
                .threads
                .get_mut(index)
                .and_then(|stack| stack.last_mut())
                .is_some_and(|frame| !frame.is_sleeping());
            if runnable {
                if offset != 0 {
                    self.current_thread = index;
                    self.slice_started = Instant::now();
                    trace!(target: "nebula::sched", thread = index, "skipped sleeping thread");
                }
                return;
            }
        }
    }

    /// Returns true when the VM is in (or just entered) a terminal state
    fn check_and_set_exit_state(&mut self) -> bool {
        if self.state().is_terminal() {
            if !self.threads.is_empty() {
                self.discard_threads();
            }
            return true;
        }
        if self.threads.is_empty() {
            self.control.set_state(InterpreterState::Exited);
            if !self.exit_notified {
                self.exit_notified = true;
                info!(target: "nebula::vm", "all threads finished");
                if let Some(callback) = self.exit_callback.as_mut() {
                    callback();
                }
            }
            return true;
        }
        false
    }

    // ==================== error reporting ====================

    fn capture_fatal_error(&mut self, index: usize) {
        let Some(stack) = self.threads.get(index) else {
            return;
        };
        let code = stack
            .last()
            .map(Frame::last_error)
            .unwrap_or(InstructionErrorCode::Unknown);

        let mut lines = Vec::new();
        for frame in stack.iter().rev() {
            lines.push(self.describe_frame(frame));
            if !frame.has_parent() {
                break;
            }
        }

        let report = ErrorCallStack::new(code, lines);
        error!(target: "nebula::vm", "{}", report.explanation());
        debug!(target: "nebula::vm", "{}", report.as_text());
        self.fatal_error = Some(report);
    }

    fn describe_frame(&self, frame: &Frame) -> ErrorCallStackLine {
        let function = frame.function();
        let index = frame.current_instruction_index();
        let source = function.source().map(str::to_string);
        let source_line = match (&self.debug_symbols, &source) {
            (Some(symbols), Some(src)) => symbols.line_for(src, function.name(), index),
            _ => None,
        };
        ErrorCallStackLine {
            source,
            function: function.signature(),
            instruction_index: index,
            instruction_text: frame
                .current_instruction()
                .map(|i| i.to_string())
                .unwrap_or_else(|| "<end of body>".to_string()),
            source_line,
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.discard_threads();
        let freed = self.collect_with(None).freed;
        if self.heap.is_empty() {
            debug!(target: "nebula::gc", freed, "heap released");
        } else {
            error!(target: "nebula::gc", leaked = self.heap.len(), "heap not empty at teardown");
        }
    }
}
