mod common;
use common::{compile_ok, lowered};

use std::collections::HashSet;

use quill::binding::pretty::render_statement;
use quill::binding::{BoundExpression, BoundExpressionKind};
use quill::symbols::Constant;
use quill::{BoundStatement, ControlFlowGraph, Program};

fn variable_names(program: &Program, body: &[BoundStatement]) -> Vec<String> {
    body.iter()
        .filter_map(|statement| match statement {
            BoundStatement::Variable { variable, .. } => {
                Some(program.context.variables[*variable].name.clone())
            }
            _ => None,
        })
        .collect()
}

#[test]
fn for_loops_become_jumps() {
    let program = compile_ok("fn count(): i32 { var n = 0; for i in 1..4 { n += 1; } n }");
    let body = lowered(&program, "count");

    assert!(
        matches!(
            body,
            [
                BoundStatement::Variable { .. },
                BoundStatement::Variable { .. },
                BoundStatement::Variable { .. },
                BoundStatement::Label(_),
                BoundStatement::ConditionalGoto { jump_if_true: false, .. },
                BoundStatement::Assignment { .. },
                BoundStatement::Assignment { .. },
                BoundStatement::Goto(_),
                BoundStatement::Label(_),
                BoundStatement::Return(Some(_)),
            ]
        ),
        "{body:#?}"
    );
    assert_eq!(variable_names(&program, body), ["n", "i", "$upper"]);
}

#[test]
fn unreachable_branches_are_removed() {
    let program = compile_ok(
        "
        fn never() { if false { trace(1); } }
        fn always(): i32 { if true { return 1; } 2 }
        ",
    );

    let never = lowered(&program, "never");
    assert!(
        matches!(never, [BoundStatement::Goto(target), BoundStatement::Label(label)] if target == label),
        "{never:#?}"
    );

    let always = lowered(&program, "always");
    let rendered: Vec<_> = always
        .iter()
        .map(|statement| render_statement(&program.context, statement))
        .collect();
    assert_eq!(rendered, ["return 1"]);
}

#[test]
fn value_ifs_use_a_temporary() {
    let program = compile_ok(include_str!("../demos/gcd.ql"));
    let body = lowered(&program, "gcd");
    assert_eq!(variable_names(&program, body), ["$if"]);
    assert!(matches!(body.last(), Some(BoundStatement::Return(Some(_)))));
}

#[test]
fn logical_operators_keep_short_circuiting() {
    let program = compile_ok(
        "
        var calls = 0;
        fn touch(): bool { calls += 1; true }
        fn pure(a: bool, b: bool): bool { a && b }
        fn effect(a: bool): bool { a || touch() }
        ",
    );

    let pure = lowered(&program, "pure");
    assert!(matches!(pure, [BoundStatement::Return(Some(_))]), "{pure:#?}");

    let effect = lowered(&program, "effect");
    assert_eq!(variable_names(&program, effect), ["$or"]);
    assert!(effect.iter().any(|statement| matches!(
        statement,
        BoundStatement::ConditionalGoto { jump_if_true: true, .. }
    )));
}

#[test]
fn lowered_bodies_are_flat_and_closed() {
    let program = compile_ok(include_str!("../demos/pointers.ql"));

    for body in program.functions.values() {
        let labels: HashSet<_> = body
            .iter()
            .filter_map(|statement| match statement {
                BoundStatement::Label(label) => Some(label),
                _ => None,
            })
            .collect();

        for statement in body {
            match statement {
                BoundStatement::Loop { .. } | BoundStatement::For { .. } | BoundStatement::NoOp => {
                    panic!("structured statement left after lowering: {statement:?}")
                }
                BoundStatement::Goto(label) | BoundStatement::ConditionalGoto { label, .. } => {
                    assert!(labels.contains(label), "jump to missing label `{label}`");
                }
                _ => {}
            }
        }
        assert!(ControlFlowGraph::build(body).reachable_statements().iter().all(|&r| r));
    }
}

#[test]
fn shadowed_locals_get_unique_names() {
    let program = compile_ok(
        "
        fn f(): i32 {
            val x = 1;
            {
                val x = 2;
                trace(x);
            }
            x
        }
        ",
    );
    let body = lowered(&program, "f");
    let emitted: Vec<_> = body
        .iter()
        .filter_map(|statement| match statement {
            BoundStatement::Variable { variable, .. } => {
                Some(program.context.variables[*variable].emit_name.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(emitted, ["x", "1_x"]);
}

/// Arguments of the calls left in a lowered body
fn call_arguments(body: &[BoundStatement]) -> Vec<Constant> {
    body.iter()
        .filter_map(|statement| match statement {
            BoundStatement::Expression(BoundExpression {
                kind: BoundExpressionKind::Call { args, .. },
                ..
            }) => args[0].constant.clone(),
            _ => None,
        })
        .collect()
}

#[test]
fn constant_conditions_keep_one_branch() {
    let program = compile_ok(
        "
        fn then_branch() { if true { trace(1); } else { trace(2); } }
        fn else_branch() { if false { trace(1); } else { trace(2); } }
        ",
    );

    for (name, kept) in [("then_branch", 1), ("else_branch", 2)] {
        let body = lowered(&program, name);
        assert_eq!(call_arguments(body), [Constant::Int(kept)], "{name}");
        assert!(!body
            .iter()
            .any(|statement| matches!(statement, BoundStatement::ConditionalGoto { .. })));
    }
}
