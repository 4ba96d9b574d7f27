//! Runtime error codes and the fatal-error call stack report

use std::fmt;

use thiserror::Error;

/// Outcome of one instruction
///
/// Every code other than `None` is thread-fatal and aborts the VM. The numeric
/// value doubles as the host process exit code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum InstructionErrorCode {
    #[error("Unknown")]
    Unknown = 0,
    #[error("None")]
    None = 1,
    #[error("Fatal")]
    Fatal = 2,
    #[error("FunctionNotFound")]
    FunctionNotFound = 3,
    #[error("NativeFunctionNotFound")]
    NativeFunctionNotFound = 4,
    #[error("BundleNotFound")]
    BundleNotFound = 5,
    #[error("DivideByZero")]
    DivideByZero = 6,
}

impl InstructionErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == InstructionErrorCode::None
    }

    /// Fold a handler result into the code contract
    pub fn from_result(result: Result<(), InstructionErrorCode>) -> Self {
        match result {
            Ok(()) => InstructionErrorCode::None,
            Err(code) => code,
        }
    }

    /// Unfold a code (e.g. from a native callback) into a handler result
    pub fn into_result(self) -> Result<(), InstructionErrorCode> {
        match self {
            InstructionErrorCode::None => Ok(()),
            code => Err(code),
        }
    }
}

/// One frame of a fatal error trace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorCallStackLine {
    /// Script source identity, when known
    pub source: Option<String>,
    /// `ns::func(param kinds)`
    pub function: String,
    /// Index of the guilty instruction in the function body
    pub instruction_index: usize,
    /// `OPCODE args`
    pub instruction_text: String,
    /// Source line resolved through debug symbols
    pub source_line: Option<usize>,
}

impl ErrorCallStackLine {
    /// `ns::func(...) -> OPCODE args`
    pub fn text(&self) -> String {
        format!("{} -> {}", self.function, self.instruction_text)
    }
}

/// Snapshot captured when a frame reports a fatal error, innermost first
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorCallStack {
    code: InstructionErrorCode,
    explanation: String,
    lines: Vec<ErrorCallStackLine>,
}

impl ErrorCallStack {
    pub fn new(code: InstructionErrorCode, lines: Vec<ErrorCallStackLine>) -> Self {
        Self {
            code,
            explanation: format!("Fatal error ({}) : {}", code.code(), code),
            lines,
        }
    }

    pub fn code(&self) -> InstructionErrorCode {
        self.code
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn lines(&self) -> &[ErrorCallStackLine] {
        &self.lines
    }

    /// Human-readable report; the last line is the thread root
    pub fn as_text(&self) -> String {
        const ROOT: &str = "Root: ";

        let mut out = String::from("~~~~~~ Interpreter fatal error report: ~~~~~~\n");
        if !self.explanation.is_empty() {
            out.push_str(&format!("Error description: {}\n", self.explanation));
        }
        out.push_str("See callstack for error location: \n");
        for (i, line) in self.lines.iter().enumerate() {
            let prefix = if i + 1 == self.lines.len() {
                ROOT.to_string()
            } else {
                " ".repeat(ROOT.len())
            };
            let location = match (&line.source, line.source_line) {
                (Some(src), Some(n)) => format!(" ({src}:{n})"),
                (Some(src), None) => format!(" ({src})"),
                _ => String::new(),
            };
            out.push_str(&format!(
                "{prefix}+ @{}::{}{location}\n",
                line.instruction_index,
                line.text()
            ));
        }
        out.push_str("~~~~~~ End of Error ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~\n");
        out
    }
}

impl fmt::Display for ErrorCallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}
