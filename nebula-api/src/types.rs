//! API types: what a run produces

use nebula_core::{ErrorCallStack, InterpreterState};

use crate::error::NebulaError;

/// Execution output
#[derive(Debug, Clone)]
pub struct ExecuteOutput {
    /// `Exited` or `Abort`
    pub exit_state: InterpreterState,
    /// Captured script output, when `RunConfig::capture_stdout` was set
    pub stdout: Option<String>,
    /// Fatal error report for an aborted run
    pub error: Option<ErrorCallStack>,
}

impl ExecuteOutput {
    pub fn is_success(&self) -> bool {
        self.exit_state == InterpreterState::Exited && self.error.is_none()
    }

    /// 0 on success, otherwise the numeric error code
    pub fn exit_code(&self) -> i32 {
        match &self.error {
            Some(error) => error.code().code(),
            None => 0,
        }
    }

    /// Turn an aborted run into `NebulaError::Runtime`
    pub fn into_result(self) -> Result<ExecuteOutput, NebulaError> {
        match self.error {
            Some(error) => Err(NebulaError::Runtime(error)),
            None => Ok(self),
        }
    }
}
