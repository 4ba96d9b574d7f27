//! Diagnostics collected while loading a script

use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Information => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// One message; `line` is 1-based, `None` when it concerns the whole file
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {}): {}", self.severity, line, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub information: Vec<Diagnostic>,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, line: Option<usize>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            severity,
            line,
            message: message.into(),
        };
        match severity {
            Severity::Information => self.information.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
            Severity::Error => self.errors.push(diagnostic),
        }
    }

    pub fn error(&mut self, line: usize, message: impl Into<String>) {
        self.push(Severity::Error, Some(line), message);
    }

    pub fn warning(&mut self, line: usize, message: impl Into<String>) {
        self.push(Severity::Warning, Some(line), message);
    }

    pub fn info(&mut self, line: Option<usize>, message: impl Into<String>) {
        self.push(Severity::Information, line, message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len() + self.warnings.len() + self.information.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&mut self, other: DiagnosticReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.information.extend(other.information);
    }

    /// Errors first, then warnings, then information
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors
            .iter()
            .chain(&self.warnings)
            .chain(&self.information)
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in self.iter() {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_sorts_by_severity() {
        let mut report = DiagnosticReport::new();
        report.warning(3, "label mismatch");
        report.error(7, "unknown opcode 'Foo'");
        report.info(None, "loaded 2 functions");

        assert!(report.has_errors());
        assert!(report.has_warnings());
        assert_eq!(report.len(), 3);
        let order: Vec<Severity> = report.iter().map(|d| d.severity).collect();
        assert_eq!(
            order,
            vec![Severity::Error, Severity::Warning, Severity::Information]
        );
    }

    #[test]
    fn test_display() {
        let mut report = DiagnosticReport::new();
        report.error(2, "missing namespace");
        report.info(None, "done");
        assert_eq!(
            report.to_string(),
            "error (line 2): missing namespace\ninfo: done\n"
        );
    }
}
