//! Unified error type for the API layer

use nebula_config::Phase;
use nebula_core::loader::Diagnostic;
use nebula_core::runtime::DebugSymbolsError;
use nebula_core::{ErrorCallStack, LoadError};
use serde::Serialize;
use thiserror::Error;

/// Exit code for scripts that could not be read
pub const EXIT_NO_INPUT: i32 = 66;
/// Exit code for scripts or symbol files that were read but rejected
pub const EXIT_DATA_ERROR: i32 = 65;

#[derive(Error, Debug)]
pub enum NebulaError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    DebugSymbols(#[from] DebugSymbolsError),

    /// Empty or already registered namespace
    #[error("namespace '{namespace}' rejected by the interpreter")]
    NamespaceRejected { namespace: String },

    #[error("{}", .0.explanation())]
    Runtime(ErrorCallStack),
}

impl NebulaError {
    pub fn phase(&self) -> Phase {
        match self {
            NebulaError::Load(_) | NebulaError::DebugSymbols(_) => Phase::Loader,
            NebulaError::NamespaceRejected { .. } | NebulaError::Runtime(_) => Phase::Vm,
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            NebulaError::Load(LoadError::Io { .. }) => EXIT_NO_INPUT,
            NebulaError::DebugSymbols(DebugSymbolsError::Io { .. }) => EXIT_NO_INPUT,
            NebulaError::Load(_) | NebulaError::DebugSymbols(_) => EXIT_DATA_ERROR,
            NebulaError::NamespaceRejected { .. } => EXIT_DATA_ERROR,
            NebulaError::Runtime(stack) => stack.code().code(),
        }
    }

    /// Structured report; callers (CLI, embedders) format it as they like
    pub fn to_report(&self) -> ErrorReport {
        let phase = self.phase().as_str();
        match self {
            NebulaError::Load(e @ LoadError::Io { .. }) => ErrorReport {
                phase,
                error_kind: "Io".to_string(),
                message: e.to_string(),
                details: None,
            },
            NebulaError::Load(e @ LoadError::Invalid { report, .. }) => ErrorReport {
                phase,
                error_kind: "InvalidScript".to_string(),
                message: e.to_string(),
                details: Some(ErrorDetails::Diagnostics {
                    diagnostics: report.errors.clone(),
                }),
            },
            NebulaError::DebugSymbols(e) => ErrorReport {
                phase,
                error_kind: "DebugSymbols".to_string(),
                message: e.to_string(),
                details: None,
            },
            NebulaError::NamespaceRejected { .. } => ErrorReport {
                phase,
                error_kind: "NamespaceRejected".to_string(),
                message: self.to_string(),
                details: None,
            },
            NebulaError::Runtime(stack) => ErrorReport {
                phase,
                error_kind: stack.code().to_string(),
                message: stack.explanation().to_string(),
                details: Some(ErrorDetails::CallStack {
                    code: stack.code().code(),
                    frames: stack
                        .lines()
                        .iter()
                        .map(|line| match line.source_line {
                            Some(n) => format!("{} (line {})", line.text(), n),
                            None => line.text(),
                        })
                        .collect(),
                }),
            },
        }
    }
}

/// Structured error report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// `loader` or `vm`
    pub phase: &'static str,
    /// Machine-readable kind, e.g. `InvalidScript` or `DivideByZero`
    pub error_kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetails {
    /// Loader errors, each with its line
    Diagnostics { diagnostics: Vec<Diagnostic> },
    /// Fatal error trace, innermost frame first
    CallStack { code: i32, frames: Vec<String> },
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} error: {}", self.error_kind, self.phase, self.message)?;
        match &self.details {
            Some(ErrorDetails::Diagnostics { diagnostics }) => {
                for diagnostic in diagnostics {
                    write!(f, "\n  {diagnostic}")?;
                }
            }
            Some(ErrorDetails::CallStack { frames, .. }) => {
                for frame in frames {
                    write!(f, "\n  at {frame}")?;
                }
            }
            None => {}
        }
        Ok(())
    }
}

impl ErrorReport {
    pub fn to_json(&self) -> String {
        // only &str, String, i32 and Vec fields: serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// One line, for terminals
    pub fn to_short(&self) -> String {
        format!("{}: {}", self.phase, self.message)
    }
}
