mod common;
use common::{compile_ok, errors, exit_code, messages};

use quill::{compile, CompileOptions, Severity};

#[test]
fn undefined_name() {
    assert_eq!(
        errors("entry fn main(): i32 { missing }"),
        ["Undefined name `missing`"]
    );
}

#[test]
fn type_mismatch() {
    assert_eq!(
        errors("entry fn main(): i32 { val x: i32 = true; x }"),
        ["Expected a value of type `i32` but found `bool`"]
    );
}

#[test]
fn immutable_assignment_is_reported_once() {
    assert_eq!(
        errors("entry fn main(): i32 { val x = 1; x = 2; x }"),
        ["`x` is immutable and cannot be assigned to"]
    );
    assert_eq!(
        errors("fn f(n: i32): i32 { n += 1; n }"),
        ["`n` is immutable and cannot be assigned to"]
    );
}

#[test]
fn read_only_fields() {
    let source = "
        struct Point { val x: i32, y: i32 }
        entry fn main(): i32 {
            val p = new Point { x: 1, y: 2 };
            p.y = 3;
            p.x = 4;
            p.x + p.y
        }
    ";
    assert_eq!(errors(source), ["`x` is immutable and cannot be assigned to"]);
}

#[test]
fn shadowing_in_nested_blocks() {
    compile_ok(
        "
        entry fn main(): i32 {
            val x = 1;
            {
                val x = true;
                trace(x);
            }
            x
        }
        ",
    );
    assert_eq!(
        errors("entry fn main(): i32 { val x = 1; val x = 2; x }"),
        ["`x` is already declared in this scope"]
    );
}

#[test]
fn break_outside_loop() {
    assert_eq!(
        errors("entry fn main() { break; }"),
        ["`break` can only be used inside a loop"]
    );
}

#[test]
fn pointer_access_requires_unsafe() {
    assert_eq!(
        errors("entry fn main(): i32 { val p = [1, 2]; *p }"),
        ["Pointer access is only allowed inside an `unsafe` block"]
    );
    compile_ok("entry fn main(): i32 { val p = [1, 2]; unsafe { p[1] } }");
}

#[test]
fn redundant_cast_is_a_style_hint() {
    let compilation = compile([("main.ql", "entry fn main(): i32 { 1 as i32 }")], &CompileOptions::default());
    assert!(compilation.program.is_some());
    assert_eq!(compilation.diagnostics.len(), 1);
    assert_eq!(compilation.diagnostics[0].severity, Severity::Style);
    assert_eq!(
        compilation.diagnostics[0].message,
        "Redundant cast, the value already has type `i32`"
    );
}

#[test]
fn unused_variables() {
    let source = "entry fn main() { val unused = 1; val _ignored = 2; }";
    assert_eq!(messages(source), ["Variable `unused` is never used"]);

    let compilation = compile([("main.ql", source)], &CompileOptions::default());
    assert!(compilation.program.is_some());
    assert_eq!(compilation.diagnostics[0].severity, Severity::Warning);

    let denied = compile([("main.ql", source)], &CompileOptions { deny_warnings: true });
    assert!(denied.program.is_none());
    assert_eq!(denied.diagnostics[0].severity, Severity::Error);
}

#[test]
fn entry_points() {
    assert_eq!(
        errors("entry fn main(x: i32) {}"),
        ["The entry function takes no parameters and returns nothing or an integer"]
    );
    assert_eq!(
        errors("entry fn main(): bool { true }"),
        ["The entry function takes no parameters and returns nothing or an integer"]
    );
    assert_eq!(
        errors("entry fn first() {} entry fn second() {}"),
        ["A program can only have one entry function"]
    );
}

#[test]
fn function_bodies() {
    assert_eq!(
        errors("fn f(): i32; entry fn main() {}"),
        ["Function `f` needs a body"]
    );
    assert_eq!(
        errors("extern fn f(): i32 as \"f\" { 1 }"),
        ["Extern function `f` cannot have a body"]
    );
}

#[test]
fn struct_initializers() {
    let source = "
        struct Point { x: i32, y: i32 = 0 }
        entry fn main(): i32 {
            val p = new Point { };
            p.x + p.z
        }
    ";
    assert_eq!(
        errors(source),
        [
            "Field `x` must be initialized",
            "Type `Point` has no field `z`"
        ]
    );
}

#[test]
fn private_functions_stay_in_their_file() {
    let compilation = compile(
        [
            ("secret.ql", "private fn secret(): i32 { 42 }"),
            ("main.ql", "entry fn main(): i32 { secret() }"),
        ],
        &CompileOptions::default(),
    );
    let errors: Vec<_> = compilation.errors().map(|d| d.message.as_str()).collect();
    assert_eq!(errors, ["Undefined function `secret()`"]);
}

#[test]
fn overloads_prefer_exact_matches() {
    let source = "
        fn pick(x: i64): i32 { 64 }
        fn pick(x: i32): i32 { 32 }
        entry fn main(): i32 { pick(1) + pick(1 as i64) }
    ";
    assert_eq!(exit_code(source), 96);
}

#[test]
fn overloads_are_filtered_by_arity() {
    let source = "
        fn f(a: i32): i32 { a }
        fn f(a: i32, b: i32, c: i32): i32 { a + b + c }
        entry fn main(): i32 { f(1, 2) }
    ";
    assert_eq!(errors(source), ["Undefined function `f(i32, i32)`"]);
}

#[test]
fn struct_casts_only_go_to_ancestors() {
    let shapes = "
        struct Shape { id: i32 }
        struct Square: Shape { side: i32 }
    ";
    let downcast = format!(
        "{shapes} entry fn main(): i32 {{ val s = new Shape {{ id: 1 }} as Square; 0 }}"
    );
    assert_eq!(errors(&downcast), ["Cannot cast `Shape` to `Square`"]);

    let upcast = format!(
        "{shapes} entry fn main(): i32 {{ val s = new Square {{ id: 4, side: 2 }} as Shape; s.id }}"
    );
    assert_eq!(exit_code(&upcast), 4);
}

#[test]
fn const_initializers_must_fold() {
    assert_eq!(
        errors("fn make(): i32 { 3 } const X = make(); entry fn main(): i32 { X }"),
        ["`X` must be initialized with a compile-time constant"]
    );
    assert_eq!(
        errors("fn make(): i32 { 3 } entry fn main(): i32 { const y = make(); y }"),
        ["`y` must be initialized with a compile-time constant"]
    );
    assert_eq!(exit_code("const X = 3 * 2; entry fn main(): i32 { const y = X + 1; y }"), 7);
}
