//! End-to-end execution tests: scripts from text through the interpreter

mod common;
use common::{main_script, run_source, run_sources_with};
use nebula_core::{InstructionErrorCode, InterpreterState, VmConfig};

// ===== basics =====

#[test]
fn test_add_and_write_line() {
    let result = run_source(&main_script(
        "",
        &["Ldc_i4 2", "Ldc_i4 3", "Add", "Call WriteLine", "Ret"],
    ));
    assert_eq!(result.state, InterpreterState::Exited);
    assert_eq!(result.output, "5\n");
    assert!(result.error.is_none());
}

#[test]
fn test_unbound_native_aborts() {
    let result = run_source(&main_script("", &["Ldc_i4 1", "Call Missing", "Ret"]));
    assert_eq!(result.state, InterpreterState::Abort);
    let error = result.error.unwrap();
    assert_eq!(error.code(), InstructionErrorCode::NativeFunctionNotFound);
    assert_eq!(error.lines()[0].instruction_index, 1);
}

#[test]
fn test_int_arithmetic() {
    let result = run_source(&main_script(
        "",
        &[
            "Ldc_i4 7", "Ldc_i4 3", "Sub", "Call WriteLine",
            "Ldc_i4 7", "Ldc_i4 3", "Mul", "Call WriteLine",
            "Ldc_i4 7", "Ldc_i4 3", "Div", "Call WriteLine",
            "Ldc_i4 7", "Ldc_i4 3", "Rem", "Call WriteLine",
            "Ret",
        ],
    ));
    assert_eq!(result.output, "4\n21\n2\n1\n");
}

#[test]
fn test_int_divide_by_zero() {
    let result = run_source(&main_script("", &["Ldc_i4 7", "Ldc_i4_0", "Div", "Ret"]));
    assert_eq!(result.state, InterpreterState::Abort);
    assert_eq!(result.error.unwrap().code(), InstructionErrorCode::DivideByZero);

    let result = run_source(&main_script("", &["Ldc_i4 7", "Ldc_i4_0", "Rem", "Ret"]));
    assert_eq!(result.error.unwrap().code(), InstructionErrorCode::DivideByZero);
}

#[test]
fn test_float_divide_by_zero_follows_ieee() {
    let result = run_source(&main_script(
        "",
        &[
            "Ldc_r4 1.0", "Ldc_r4 0.0", "Div", "Call WriteLine",
            "Ldc_i4 -1", "Ldc_r4 0.0", "Div", "Call WriteLine",
            "Ret",
        ],
    ));
    assert_eq!(result.state, InterpreterState::Exited);
    assert_eq!(result.output, "inf\n-inf\n");
}

#[test]
fn test_mixed_comparison_is_fatal() {
    let result = run_source(&main_script("", &["Ldc_i4 1", "Ldc_r4 2.0", "Clt", "Ret"]));
    assert_eq!(result.error.unwrap().code(), InstructionErrorCode::Fatal);
}

#[test]
fn test_conversion_and_concatenation() {
    let result = run_source(&main_script(
        "",
        &[
            "Ldc_s \"x = \"",
            "Ldc_r4 2.5",
            "ConvType int32",
            "ConvType string",
            "AddStr 2",
            "Call WriteLine",
            "Ret",
        ],
    ));
    assert_eq!(result.output, "x = 2\n");

    let result = run_source(&main_script("", &["Ldc_s \"5\"", "ConvType int32", "Ret"]));
    assert_eq!(result.error.unwrap().code(), InstructionErrorCode::Fatal);
}

#[test]
fn test_counting_loop() {
    let result = run_source(&main_script(
        "int32",
        &[
            "Ldc_i4_0",
            "Stloc 0",
            "Ldloc 0",
            "Call WriteLine",
            "Ldloc 0",
            "Ldc_i4_1",
            "Add",
            "Stloc 0",
            "Ldloc 0",
            "Ldc_i4 3",
            "Clt",
            "BrTrue 2",
            "Ret",
        ],
    ));
    assert_eq!(result.output, "0\n1\n2\n");
}

#[test]
fn test_falling_off_the_end_is_fatal() {
    let result = run_source(&main_script("", &["Nop"]));
    assert_eq!(result.state, InterpreterState::Abort);
    assert_eq!(result.error.unwrap().code(), InstructionErrorCode::Fatal);
}

// ===== calls =====

const SHOW: &str = r#"
.namespace "Main"
.func void Show ( int32 a , string b )
{
    0000 Ldarg 0
    0001 Call WriteLine
    0002 Ldarg 1
    0003 Call WriteLine
    0004 Ret
}

.func void Main ( ) ;autoexec
{
    0000 Ldc_i4 99
    0001 Ldc_i4 1
    0002 Ldc_s "two"
    0003 Call Show
    0004 Call WriteLine
    0005 Ret
}
"#;

#[test]
fn test_call_binds_parameters_in_declared_order() {
    let result = run_source(SHOW);
    assert_eq!(result.state, InterpreterState::Exited);
    // 99 is still on the caller's stack after the call
    assert_eq!(result.output, "1\ntwo\n99\n");
}

const DOUBLE: &str = r#"
.namespace "Main"
.func int32 Double ( int32 v )
{
    0000 Ldarg 0
    0001 Ldarg 0
    0002 Add
    0003 Ret
}

.func void Main ( ) ;autoexec
{
    0000 Ldc_i4 21
    0001 Call Double
    0002 Call WriteLine
    0003 Ldc_i4 5
    0004 Call_t Double
    0005 Ldc_s "done"
    0006 Call WriteLine
    0007 Ret
}
"#;

#[test]
fn test_ret_value_goes_to_parent_or_is_discarded() {
    let result = run_source(DOUBLE);
    assert_eq!(result.state, InterpreterState::Exited);
    assert_eq!(result.output, "42\ndone\n");
}

#[test]
fn test_ret_checks_the_declared_kind() {
    let script = r#"
.namespace "Main"
.func int32 Bad ( )
{
    0000 Ldc_s "nope"
    0001 Ret
}
.func void Main ( ) ;autoexec
{
    0000 Call Bad
    0001 Ret
}
"#;
    let result = run_source(script);
    assert_eq!(result.state, InterpreterState::Abort);
    let error = result.error.unwrap();
    assert_eq!(error.code(), InstructionErrorCode::Fatal);
    assert_eq!(error.lines().len(), 2);
    assert_eq!(error.lines()[0].function, "Main::Bad()");
    assert_eq!(error.lines()[1].function, "Main::Main()");
    assert!(error.as_text().contains("Root: + @0::Main::Main() -> Call \"Bad\""));
}

#[test]
fn test_ret_requires_a_single_value() {
    let script = r#"
.namespace "Main"
.func int32 Two ( )
{
    0000 Ldc_i4_1
    0001 Ldc_i4_1
    0002 Ret
}
.func void Main ( ) ;autoexec
{
    0000 Call Two
    0001 Pop
    0002 Ret
}
"#;
    assert_eq!(
        run_source(script).error.unwrap().code(),
        InstructionErrorCode::Fatal
    );
}

#[test]
fn test_cross_namespace_call() {
    let lib = r#"
.namespace "Lib"
.func string Greet ( string who )
{
    0000 Ldc_s "hello "
    0001 Ldarg 0
    0002 AddStr 2
    0003 Ret
}
"#;
    let main = r#"
.namespace "Main"
.func void Main ( ) ;autoexec
{
    0000 Ldc_s "nebula"
    0001 Call Lib Greet
    0002 Call WriteLine
    0003 Ldc_i4_0
    0004 Call Lib Missing
    0005 Ret
}
"#;
    let result = run_sources_with(VmConfig::default(), &[lib, main]);
    assert_eq!(result.output, "hello nebula\n");
    assert_eq!(
        result.error.unwrap().code(),
        InstructionErrorCode::FunctionNotFound
    );
}

#[test]
fn test_hash_string_matches_across_calls() {
    let result = run_source(&main_script(
        "",
        &[
            "Ldc_s \"ready\"",
            "Call HashString",
            "Ldc_s \"ready\"",
            "Call HashString",
            "Ceq",
            "Call WriteLine",
            "Ret",
        ],
    ));
    assert_eq!(result.output, "1\n");
}
