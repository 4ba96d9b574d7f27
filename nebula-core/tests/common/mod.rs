//! Test helpers
//!
//! Load scripts from text, run the interpreter to completion and capture
//! what the scripts wrote.

#![allow(dead_code)]

use nebula_core::loader::load_source;
use nebula_core::runtime::stdlib::bind_standard_library;
use nebula_core::runtime::{BufferedOutput, Interpreter, InterpreterState};
use nebula_core::{ErrorCallStack, VmConfig};

pub struct ExecResult {
    pub state: InterpreterState,
    pub output: String,
    pub error: Option<ErrorCallStack>,
}

/// An interpreter with the standard library and a captured output sink
pub fn new_vm(config: VmConfig) -> (Interpreter, BufferedOutput) {
    let mut vm = Interpreter::with_config(config);
    let output = BufferedOutput::new();
    vm.set_output(output.clone());
    bind_standard_library(&mut vm);
    (vm, output)
}

/// Parse `source` and add it; panics on load errors
pub fn add_source(vm: &mut Interpreter, source: &str) {
    let loaded = match load_source(source, Some("test.nbl")) {
        Ok(loaded) => loaded,
        Err(e) => panic!("{e}\n{}", e.report().map(|r| r.to_string()).unwrap_or_default()),
    };
    assert!(vm.add_script(loaded.script), "namespace rejected");
}

pub fn run_sources_with(config: VmConfig, sources: &[&str]) -> ExecResult {
    let (mut vm, output) = new_vm(config);
    for source in sources {
        add_source(&mut vm, source);
    }
    vm.init(false);
    let state = vm.run();
    ExecResult {
        state,
        output: output.contents(),
        error: vm.fatal_error_callstack().cloned(),
    }
}

pub fn run_source(source: &str) -> ExecResult {
    run_sources_with(VmConfig::default(), &[source])
}

/// Wrap `body` (instruction lines without labels) into an auto-exec `Main`
pub fn main_script(locals: &str, body: &[&str]) -> String {
    let mut text = String::from(".namespace \"Main\"\n.func void Main ( ) ;autoexec\n{\n");
    if !locals.is_empty() {
        text.push_str(&format!("    .locals [ {locals} ]\n"));
    }
    for (i, line) in body.iter().enumerate() {
        text.push_str(&format!("    {i:04X} {line}\n"));
    }
    text.push_str("}\n");
    text
}
