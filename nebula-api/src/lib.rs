//! Nebula API - embedding layer
//!
//! Loads scripts, wires the interpreter (standard library, output sink,
//! debug symbols) and runs it to completion:
//! - `run_files` / `run_sources` for the one-shot case
//! - `prepare` + `Session` when the host needs the control handle first
//!
//! For CLI convenience, this crate also keeps a global `RunConfig`.

use std::path::Path;

use tracing::{debug, info, warn};

use nebula_core::runtime::{ExecutionControl, JsonDebugSymbols};
use nebula_core::{bind_standard_library, BufferedOutput, Interpreter};

pub mod config;
pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};

pub mod error;
pub mod types;
pub use error::{ErrorDetails, ErrorReport, NebulaError};
pub use types::ExecuteOutput;

pub use nebula_config;
pub use nebula_core::{
    DiagnosticReport, ErrorCallStack, InstructionErrorCode, InterpreterState, LoadError,
    LoadedScript, Phase, VmConfig,
};

/// Read and parse one script file
pub fn load_file(path: impl AsRef<Path>) -> Result<LoadedScript, NebulaError> {
    Ok(nebula_core::load_file(path)?)
}

/// Parse script text; `name` identifies it in reports and debug symbols
pub fn load_source(text: &str, name: &str) -> Result<LoadedScript, NebulaError> {
    Ok(nebula_core::load_source(text, Some(name))?)
}

/// Load every file, then run them together
pub fn run_files<P: AsRef<Path>>(
    paths: &[P],
    config: &RunConfig,
) -> Result<ExecuteOutput, NebulaError> {
    let scripts = paths
        .iter()
        .map(load_file)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(prepare(scripts, config)?.run())
}

/// Run in-memory scripts given as `(name, text)` pairs
pub fn run_sources(
    sources: &[(&str, &str)],
    config: &RunConfig,
) -> Result<ExecuteOutput, NebulaError> {
    let scripts = sources
        .iter()
        .map(|(name, text)| load_source(text, name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(prepare(scripts, config)?.run())
}

/// An initialised interpreter that has not started running yet
pub struct Session {
    vm: Interpreter,
    output: Option<BufferedOutput>,
}

impl Session {
    /// Handle for pausing, resuming or stopping from another OS thread
    pub fn control(&self) -> ExecutionControl {
        self.vm.control()
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.vm
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.vm
    }

    /// Run until Exited or Abort
    pub fn run(mut self) -> ExecuteOutput {
        let exit_state = self.vm.run();
        let error = self.vm.fatal_error_callstack().cloned();
        match exit_state {
            InterpreterState::Abort => warn!(
                target: "nebula::vm",
                code = error.as_ref().map(|e| e.code().code()),
                "execution aborted"
            ),
            _ => info!(target: "nebula::vm", state = %exit_state, "execution completed"),
        }
        ExecuteOutput {
            exit_state,
            stdout: self.output.as_ref().map(BufferedOutput::take),
            error,
        }
    }
}

/// Build an interpreter for `scripts`: stdlib bound, symbols loaded,
/// namespaces registered and auto-exec threads scheduled
pub fn prepare(scripts: Vec<LoadedScript>, config: &RunConfig) -> Result<Session, NebulaError> {
    let mut vm = Interpreter::with_config(config.vm.clone());

    let output = if config.capture_stdout {
        let buffer = BufferedOutput::new();
        vm.set_output(buffer.clone());
        Some(buffer)
    } else {
        None
    };
    bind_standard_library(&mut vm);

    if !config.debug_symbols.is_empty() {
        let mut symbols = JsonDebugSymbols::new();
        for path in &config.debug_symbols {
            symbols.load_file(path)?;
        }
        debug!(target: "nebula::loader", files = symbols.len(), "debug symbols loaded");
        vm.set_debug_symbols(symbols);
    }

    for loaded in scripts {
        let namespace = loaded.script.namespace().to_string();
        if !vm.add_script(loaded.script) {
            return Err(NebulaError::NamespaceRejected { namespace });
        }
    }

    vm.init(config.vm.start_paused);
    Ok(Session { vm, output })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = r#"
.namespace "Main"
.func void Main ( ) ;autoexec
{
    0000 Ldc_s "hello"
    0001 Call WriteLine
    0002 Ret
}
"#;

    const DIVIDE: &str = r#"
.namespace "Main"
.func void Main ( ) ;autoexec
{
    0000 Ldc_i4 1
    0001 Ldc_i4_0
    0002 Div
    0003 Ret
}
"#;

    #[test]
    fn test_run_sources_captures_output() {
        let output = run_sources(&[("hello.nbl", HELLO)], &RunConfig::captured()).unwrap();
        assert!(output.is_success());
        assert_eq!(output.exit_code(), 0);
        assert_eq!(output.stdout.as_deref(), Some("hello\n"));
    }

    #[test]
    fn test_abort_is_reported_in_output() {
        let output = run_sources(&[("div.nbl", DIVIDE)], &RunConfig::captured()).unwrap();
        assert_eq!(output.exit_state, InterpreterState::Abort);
        assert_eq!(output.exit_code(), InstructionErrorCode::DivideByZero.code());

        let err = output.into_result().unwrap_err();
        assert!(matches!(err, NebulaError::Runtime(_)));
        assert_eq!(err.to_report().error_kind, "DivideByZero");
    }

    #[test]
    fn test_duplicate_namespace_rejected() {
        let result = run_sources(
            &[("a.nbl", HELLO), ("b.nbl", HELLO)],
            &RunConfig::captured(),
        );
        match result {
            Err(NebulaError::NamespaceRejected { namespace }) => assert_eq!(namespace, "Main"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_load_error_stops_before_running() {
        let result = run_sources(
            &[("ok.nbl", HELLO), ("bad.nbl", "Ldc_i4 1\n")],
            &RunConfig::captured(),
        );
        assert!(matches!(result, Err(NebulaError::Load(_))));
    }

    #[test]
    fn test_missing_debug_symbols_file() {
        let config = RunConfig {
            debug_symbols: vec!["/nonexistent/main.ndbg".into()],
            ..RunConfig::captured()
        };
        let result = run_sources(&[("hello.nbl", HELLO)], &config);
        assert!(matches!(result, Err(NebulaError::DebugSymbols(_))));
    }

    #[test]
    fn test_run_files() {
        let dir = std::env::temp_dir().join(format!("nebula-api-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hello.nbl");
        std::fs::write(&path, HELLO).unwrap();

        let output = run_files(&[&path], &RunConfig::captured()).unwrap();
        assert_eq!(output.stdout.as_deref(), Some("hello\n"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_paused_session_resumed_by_control() {
        let config = RunConfig {
            vm: VmConfig {
                start_paused: true,
                ..VmConfig::default()
            },
            ..RunConfig::captured()
        };
        let session = prepare(vec![load_source(HELLO, "hello.nbl").unwrap()], &config).unwrap();
        assert_eq!(session.interpreter().state(), InterpreterState::Paused);

        let control = session.control();
        let resumer = std::thread::spawn(move || control.resume());
        let output = session.run();
        resumer.join().unwrap();
        assert_eq!(output.stdout.as_deref(), Some("hello\n"));
    }
}
