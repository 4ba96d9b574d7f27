//! Interpreter state shared with host threads
//!
//! The state lives behind a mutex/condvar pair so that a host thread can
//! pause, resume or stop a VM whose `run` loop is driving another thread.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterpreterState {
    Abort,
    Running,
    Paused,
    Exited,
}

impl InterpreterState {
    pub fn is_terminal(self) -> bool {
        matches!(self, InterpreterState::Abort | InterpreterState::Exited)
    }
}

impl fmt::Display for InterpreterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpreterState::Abort => "Abort",
            InterpreterState::Running => "Running",
            InterpreterState::Paused => "Paused",
            InterpreterState::Exited => "Exited",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<InterpreterState>,
    changed: Condvar,
}

/// Cloneable handle onto an interpreter's execution state
#[derive(Debug, Clone)]
pub struct ExecutionControl {
    shared: Arc<Shared>,
}

impl ExecutionControl {
    pub fn new(state: InterpreterState) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn state(&self) -> InterpreterState {
        *self.lock()
    }

    pub fn set_state(&self, state: InterpreterState) {
        *self.lock() = state;
        self.shared.changed.notify_all();
    }

    /// Running -> Paused
    pub fn pause(&self) {
        self.transition(InterpreterState::Running, InterpreterState::Paused);
    }

    /// Paused -> Running, waking a blocked `run`
    pub fn resume(&self) {
        self.transition(InterpreterState::Paused, InterpreterState::Running);
    }

    /// Any live state -> Exited
    pub fn stop(&self) {
        let mut state = self.lock();
        if !state.is_terminal() {
            *state = InterpreterState::Exited;
        }
        drop(state);
        self.shared.changed.notify_all();
    }

    /// Block while Paused; returns the state that ended the wait
    pub fn wait_while_paused(&self) -> InterpreterState {
        let guard = self
            .shared
            .changed
            .wait_while(self.lock(), |s| *s == InterpreterState::Paused)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn transition(&self, from: InterpreterState, to: InterpreterState) {
        let mut state = self.lock();
        if *state == from {
            *state = to;
        }
        drop(state);
        self.shared.changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, InterpreterState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
