#![allow(dead_code)]

use quill::{compile_str, BoundStatement, EvalError, Evaluator, EvaluatorOptions, FunctionId, Program};

/// Compile a program that must not produce errors
pub fn compile_ok(source: &str) -> Program {
    let compilation = compile_str(source);
    let errors: Vec<_> = compilation.errors().map(|d| d.to_string()).collect();
    assert!(errors.is_empty(), "unexpected errors: {errors:#?}");
    compilation.program.expect("a program without errors")
}

/// Messages of all error diagnostics, in location order
pub fn errors(source: &str) -> Vec<String> {
    compile_str(source)
        .errors()
        .map(|d| d.message.clone())
        .collect()
}

/// Messages of all diagnostics, in location order
pub fn messages(source: &str) -> Vec<String> {
    compile_str(source)
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

pub fn evaluate(program: &Program, options: EvaluatorOptions) -> (Result<i64, EvalError>, String) {
    let mut output = Vec::new();
    let result = Evaluator::new(program, options, &mut output).run();
    (result, String::from_utf8(output).expect("utf-8 output"))
}

/// Run a program, returning its exit code and what it printed
pub fn run(source: &str) -> (i64, String) {
    let (result, output) = evaluate(&compile_ok(source), EvaluatorOptions::default());
    match result {
        Ok(code) => (code, output),
        Err(err) => panic!("evaluation failed: {err}"),
    }
}

pub fn exit_code(source: &str) -> i64 {
    run(source).0
}

pub fn run_err(source: &str) -> EvalError {
    match evaluate(&compile_ok(source), EvaluatorOptions::default()).0 {
        Ok(code) => panic!("expected a runtime error, program exited with {code}"),
        Err(err) => err,
    }
}

pub fn function(program: &Program, name: &str) -> FunctionId {
    program
        .context
        .functions
        .iter_enumerated()
        .find(|(_, symbol)| symbol.name == name)
        .map(|(function, _)| function)
        .unwrap_or_else(|| panic!("no function named `{name}`"))
}

/// Lowered body of the function called `name`
pub fn lowered<'p>(program: &'p Program, name: &str) -> &'p [BoundStatement] {
    &program.functions[&function(program, name)]
}
