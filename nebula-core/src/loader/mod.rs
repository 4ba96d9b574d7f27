//! Script loading: text files into [`Script`]s plus their diagnostics

mod parser;
mod report;

pub use parser::{parse_script, ScriptParser};
pub use report::{Diagnostic, DiagnosticReport, Severity};

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::Script;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read script '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("script '{name}' has {} error(s)", .report.errors.len())]
    Invalid {
        name: String,
        report: DiagnosticReport,
    },
}

impl LoadError {
    /// Diagnostics for `Invalid`, `None` for I/O failures
    pub fn report(&self) -> Option<&DiagnosticReport> {
        match self {
            LoadError::Invalid { report, .. } => Some(report),
            LoadError::Io { .. } => None,
        }
    }
}

/// A successfully parsed script and any warnings
#[derive(Debug, Clone)]
pub struct LoadedScript {
    pub script: Arc<Script>,
    pub report: DiagnosticReport,
}

/// Parse script text; `name` is used for reporting and as the script source
pub fn load_source(text: &str, name: Option<&str>) -> Result<LoadedScript, LoadError> {
    let (script, report) = parse_script(text, name);
    for warning in &report.warnings {
        warn!(target: "nebula::loader", "{}", warning);
    }
    match script {
        Some(script) => {
            debug!(
                target: "nebula::loader",
                namespace = %script.namespace(),
                "script parsed"
            );
            Ok(LoadedScript { script, report })
        }
        None => Err(LoadError::Invalid {
            name: name.unwrap_or("<memory>").to_string(),
            report,
        }),
    }
}

/// Read and parse a script file; the file name becomes the script source
pub fn load_file(path: impl AsRef<Path>) -> Result<LoadedScript, LoadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!(target: "nebula::loader", path = %path.display(), "loading script");
    load_source(&text, Some(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_source() {
        let loaded = load_source(".namespace M\n.func void F ( ) {\n0000 Ret\n}\n", Some("m.nbl"))
            .unwrap();
        assert_eq!(loaded.script.namespace(), "M");
        assert_eq!(loaded.script.source(), Some("m.nbl"));
        assert!(loaded.report.warnings.is_empty());
    }

    #[test]
    fn test_invalid_source_carries_report() {
        let err = load_source(".func void F ( ) {\n0000 Ret\n}\n", None).unwrap_err();
        assert_eq!(err.to_string(), "script '<memory>' has 1 error(s)");
        assert_eq!(err.report().unwrap().errors.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let err = load_file("/definitely/not/here.nbl").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.report().is_none());
    }
}
