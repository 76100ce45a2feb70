use std::rc::Rc;

use quill::ast::Item;
use quill::{parse, DiagnosticBag, FileId, Idx, SourceFile};

fn parse_str(source: &str) -> (quill::SyntaxTree, DiagnosticBag) {
    let mut diagnostics = DiagnosticBag::new();
    let file = SourceFile::new(FileId::new(1), "main.ql", source);
    let tree = parse(Rc::new(file), &mut diagnostics);
    (tree, diagnostics)
}

#[test]
fn compilation_unit() {
    let (tree, diagnostics) = parse_str(include_str!("../demos/shapes.ql"));
    assert!(diagnostics.is_empty());
    assert!(tree.unit.namespace.is_none());

    let kinds: Vec<_> = tree
        .unit
        .items
        .iter()
        .map(|item| match item {
            Item::Struct(_) => "struct",
            Item::Function(_) => "fn",
            Item::Global(_) => "global",
        })
        .collect();
    assert_eq!(kinds, ["struct", "struct", "fn", "fn"]);
}

#[test]
fn namespace_and_uses() {
    let (tree, diagnostics) = parse_str("namespace app.core\nuse app.util\nuse std\nval LIMIT = 3");
    assert!(diagnostics.is_empty());

    let namespace = tree.unit.namespace.expect("a namespace");
    let segments: Vec<_> = namespace.segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(segments, ["app", "core"]);
    assert_eq!(tree.unit.uses.len(), 2);
    assert!(matches!(tree.unit.items[..], [Item::Global(_)]));
}

#[test]
fn syntax_errors_are_diagnostics() {
    let (_, diagnostics) = parse_str(include_str!("fails/fail_parsing.ql"));
    assert!(diagnostics.has_errors());
}

#[test]
fn every_demo_parses() {
    let demos = [
        include_str!("../demos/fib.ql"),
        include_str!("../demos/gcd.ql"),
        include_str!("../demos/output.ql"),
        include_str!("../demos/pointers.ql"),
        include_str!("../demos/shapes.ql"),
        include_str!("../demos/vectors.ql"),
    ];
    for demo in demos {
        let (_, diagnostics) = parse_str(demo);
        assert!(diagnostics.is_empty(), "{:#?}", diagnostics.into_vec());
    }
}
