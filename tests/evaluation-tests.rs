mod common;
use common::{compile_ok, evaluate, exit_code, run, run_err};

use quill::{compile, CompileOptions, EvalError, EvaluatorOptions};

#[test]
fn for_loops_include_the_upper_bound() {
    assert_eq!(
        exit_code("entry fn main(): i32 { var count = 0; for i in 1..4 { count += i; } count }"),
        10
    );
}

#[test]
fn for_loop_bodies_run_once_per_value() {
    let (code, output) = run("entry fn main(): i32 { var runs = 0; for i in 0..3 { trace(i); runs += 1; } runs }");
    assert_eq!(code, 4);
    assert_eq!(output, "0\n1\n2\n3\n");
}

#[test]
fn operands_are_read_before_later_operands_run() {
    assert_eq!(
        exit_code("entry fn main(): i32 { var x = 1; val y = x + { x = 5; x }; y }"),
        6
    );
    assert_eq!(
        exit_code(
            "
            fn left(c: bool): i32 { var x = 1; x + if c { x = 5; 0 } else { 0 } }
            entry fn main(): i32 { left(true) }
            "
        ),
        1
    );
    assert_eq!(
        exit_code(
            "
            fn sub(a: i32, b: i32): i32 { a - b }
            fn first_argument(c: bool): i32 { var x = 10; sub(x, if c { x = 1; 0 } else { 0 }) }
            entry fn main(): i32 { first_argument(true) }
            "
        ),
        10
    );
    assert_eq!(
        exit_code("entry fn main(): i32 { var x = 1; x += { x = 5; x }; x }"),
        6
    );
}

#[test]
fn loops_with_break_and_continue() {
    let source = "
        entry fn main(): i32 {
            var total = 0;
            var i = 0;
            loop {
                i += 1;
                if i > 10 { break; }
                if i % 2 == 0 { continue; }
                total += i;
            }
            total
        }
    ";
    assert_eq!(exit_code(source), 25);
}

#[test]
fn lambdas_are_values() {
    let source = "
        fn apply(f: fn(i32): i32, x: i32): i32 { f(x) }
        entry fn main(): i32 {
            val double = fn(x: i32): i32 { x * 2 };
            apply(double, 20) + apply(fn(x: i32): i32 { x - 1 }, 3)
        }
    ";
    assert_eq!(exit_code(source), 42);
}

#[test]
fn globals_are_initialized_before_the_entry() {
    let source = "
        var counter = 0;
        const LIMIT = 3;
        fn tick() { counter += 1; }
        entry fn main(): i32 {
            while counter < LIMIT { tick(); }
            counter
        }
    ";
    assert_eq!(exit_code(source), 3);
}

#[test]
fn logical_operators_short_circuit() {
    let source = "
        var calls = 0;
        fn touch(): bool { calls += 1; true }
        entry fn main(): i32 {
            val a = false && touch();
            val b = true || touch();
            val c = true && touch();
            if a || !b || !c { return 100; }
            calls
        }
    ";
    assert_eq!(exit_code(source), 1);
}

#[test]
fn namespaces_across_files() {
    let compilation = compile(
        [
            ("util.ql", "namespace app.util\n fn double(x: i32): i32 { x * 2 }"),
            (
                "main.ql",
                "namespace app\n use app.util\n entry fn main(): i32 { double(20) + app.util.double(1) }",
            ),
        ],
        &CompileOptions::default(),
    );
    let program = compilation.program.expect("no errors");
    let (result, _) = evaluate(&program, EvaluatorOptions::default());
    assert_eq!(result.ok(), Some(42));
}

#[test]
fn void_entry_exits_with_zero() {
    assert_eq!(run("entry fn main() { print(\"done\\n\"); }"), (0, String::from("done\n")));
}

#[test]
fn trace_prints_unsigned_values() {
    let (_, output) = run("entry fn main() { trace(18446744073709551615); trace(-3 as i8); }");
    assert_eq!(output, "18446744073709551615\n-3\n");
}

#[test]
fn missing_entry() {
    let program = compile_ok("fn helper() {}");
    assert!(program.entry.is_none());
    let (result, _) = evaluate(&program, EvaluatorOptions::default());
    assert!(matches!(result, Err(EvalError::MissingEntry)));
}

#[test]
fn call_depth_is_limited() {
    let program = compile_ok(
        "
        fn forever(n: i32): i32 { forever(n + 1) }
        entry fn main(): i32 { forever(0) }
        ",
    );
    let options = EvaluatorOptions { max_call_depth: 64 };
    let (result, _) = evaluate(&program, options);
    assert!(matches!(result, Err(EvalError::CallDepthExceeded(64))));
}

#[test]
fn null_dereference() {
    let error = run_err("entry fn main(): i32 { val p: *i32 = null; unsafe { *p } }");
    assert!(matches!(error, EvalError::NullPointer));
}

#[test]
fn out_of_bounds() {
    let error = run_err("entry fn main(): i32 { val a = [1, 2]; unsafe { a[5] } }");
    assert!(matches!(error, EvalError::OutOfBounds { offset: 5, len: 2 }));
}

#[test]
fn unknown_extern() {
    let error = run_err(
        "
        extern fn puts(text: *u8): i32 as \"puts\"
        entry fn main(): i32 { puts(\"hi\") }
        ",
    );
    assert!(matches!(error, EvalError::UnknownExtern(name) if name == "puts"));
}
