mod common;
use common::{errors, run_err};

use quill::{compile_str, EvalError};

#[test]
fn fail_parsing() {
    let compilation = compile_str(include_str!("fails/fail_parsing.ql"));
    assert!(compilation.has_errors());
    assert!(compilation.program.is_none());
    // the tree is still returned for inspection
    assert_eq!(compilation.trees.len(), 2);
}

#[test]
fn fail_binding() {
    assert_eq!(
        errors(include_str!("fails/fail_binding.ql")),
        ["Undefined function `add(i32, bool)`"]
    );
}

#[test]
fn fail_lowering() {
    assert_eq!(
        errors(include_str!("fails/fail_lowering.ql")),
        ["Not all code paths of `sign` return a value"]
    );
}

#[test]
fn fail_division() {
    assert!(matches!(
        run_err(include_str!("fails/fail_division.ql")),
        EvalError::DivisionByZero
    ));
}
