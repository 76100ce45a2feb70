//! Parsing
//!
//! This module is responsible for turning the source code from its string form into a
//! [SyntaxTree]. The main interface is [parse] which takes a [SourceFile] and reports syntax
//! errors into a [DiagnosticBag].
//!
//! Internally, parsing works in two phases:
//! - the [lexer] scans the source text and turns it into a stream of tokens
//! - the [parser] generates the syntax tree from these tokens
//!
//! Both phases recover from errors, so a file with a typo still produces a best-effort tree in
//! which unparsable expressions are [ExpressionKind::Missing](crate::ast::ExpressionKind::Missing).
//!
//! The module relies heavily on the [chumsky] crate for lexing and parsing.

use std::rc::Rc;

use chumsky::error::SimpleReason;
use chumsky::{prelude::*, Stream};
use tracing::debug;

use crate::ast::SyntaxTree;
use crate::diagnostics::DiagnosticBag;
use crate::util::{SourceFile, Span, TextLocation};

mod lexer;
mod parser;

pub use lexer::Token;

pub type Spanned<T> = (T, Span);

type ParseErr<T> = Simple<T, Span>;

/// Parse a source file into a syntax tree
pub fn parse(source: Rc<SourceFile>, diagnostics: &mut DiagnosticBag) -> SyntaxTree {
    let end_of_input = Span::marker(source.char_count());

    let char_iter = source
        .text
        .chars()
        .enumerate()
        .map(|(i, c)| (c, Span::single(i)));

    let (tokens, lex_errs) =
        lexer::lex().parse_recovery(Stream::from_iter(end_of_input, char_iter));

    let (unit, parse_errs) = match tokens {
        Some(tokens) => {
            debug!(file = %source.name, tokens = tokens.len(), "lexed");
            parser::parser().parse_recovery(Stream::from_iter(end_of_input, tokens.into_iter()))
        }
        None => (None, Vec::new()),
    };

    let errors = lex_errs
        .into_iter()
        .map(|e| e.map(|c| c.to_string()))
        .chain(parse_errs.into_iter().map(|e| e.map(|tok| tok.to_string())));

    for err in errors {
        let (span, message) = build_error(err);
        diagnostics.report_syntax_error(TextLocation::new(source.clone(), span), message);
    }

    SyntaxTree {
        source,
        unit: unit.unwrap_or_default(),
    }
}

/// Turn a chumsky error into a span and a message
fn build_error(err: ParseErr<String>) -> (Span, String) {
    let eof = String::from("end of file");
    match err.reason() {
        SimpleReason::Unexpected => {
            let token = err.found().unwrap_or(&eof);
            let mut expected: Vec<_> = err
                .expected()
                .map(|tok| match tok {
                    Some(tok) => format!("`{tok}`"),
                    None => eof.clone(),
                })
                .collect();
            expected.sort();

            let message = if expected.is_empty() {
                format!("Unexpected `{token}`")
            } else {
                format!(
                    "Unexpected `{token}`, expected one of: {}",
                    expected.join(", ")
                )
            };
            (err.span(), message)
        }
        SimpleReason::Unclosed { span, delimiter } => {
            let must_close_before = err.found().unwrap_or(&eof);
            (
                *span,
                format!("Unclosed delimiter `{delimiter}`, must be closed before `{must_close_before}`"),
            )
        }
        SimpleReason::Custom(msg) => (err.span(), msg.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        BinaryOperator, ExpressionKind, Item, StatementKind, TypeClauseKind, UnaryOperator,
    };
    use crate::util::{FileId, Idx};

    fn parse_str(src: &str) -> (SyntaxTree, DiagnosticBag) {
        let mut diagnostics = DiagnosticBag::new();
        let source = Rc::new(SourceFile::new(FileId::new(0), "test.ql", src));
        let tree = parse(source, &mut diagnostics);
        (tree, diagnostics)
    }

    fn parse_ok(src: &str) -> SyntaxTree {
        let (tree, diagnostics) = parse_str(src);
        assert!(
            diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            diagnostics.iter().map(|d| d.to_string()).collect::<Vec<_>>()
        );
        tree
    }

    #[test]
    fn header() {
        let tree = parse_ok("namespace app.core; use std\nuse app.util;");
        assert_eq!(tree.unit.namespace.unwrap().to_string(), "app.core");
        let uses: Vec<_> = tree.unit.uses.iter().map(|u| u.to_string()).collect();
        assert_eq!(uses, ["std", "app.util"]);
        assert!(tree.unit.items.is_empty());
    }

    #[test]
    fn function() {
        let tree = parse_ok("entry fn main(): i32 { val x = 1 + 2 * 3; x }");
        let Item::Function(f) = &tree.unit.items[0] else {
            panic!("expected a function");
        };
        assert!(f.modifiers.is_entry);
        assert_eq!(f.name.text, "main");
        assert_eq!(f.name.span, Span::new(9, 13));
        assert_eq!(f.return_type.as_ref().unwrap().to_string(), "i32");

        let body = f.body.as_ref().unwrap();
        assert_eq!(body.statements.len(), 1);
        let StatementKind::Variable { initializer, .. } = &body.statements[0].kind else {
            panic!("expected a declaration");
        };
        let ExpressionKind::Binary { operator, rhs, .. } = &initializer.kind else {
            panic!("expected a binary expression");
        };
        assert_eq!(*operator, BinaryOperator::Add);
        assert!(matches!(
            rhs.kind,
            ExpressionKind::Binary {
                operator: BinaryOperator::Mul,
                ..
            }
        ));
        assert!(matches!(
            body.value.as_deref().map(|v| &v.kind),
            Some(ExpressionKind::Name(_))
        ));
    }

    #[test]
    fn extern_function() {
        let tree = parse_ok("extern fn putchar(c: i32): i32 as \"putchar\"\nfn f() {}");
        let Item::Function(f) = &tree.unit.items[0] else {
            panic!("expected a function");
        };
        assert!(f.modifiers.is_extern);
        assert!(f.body.is_none());
        assert_eq!(f.cname.as_deref(), Some("putchar"));
        assert_eq!(tree.unit.items.len(), 2);
    }

    #[test]
    fn trailing_if_is_block_value() {
        let tree = parse_ok("fn f(a: bool): i32 { if a { 1 } else { 2 } }");
        let Item::Function(f) = &tree.unit.items[0] else {
            panic!("expected a function");
        };
        let body = f.body.as_ref().unwrap();
        assert!(body.statements.is_empty());
        assert!(matches!(
            body.value.as_deref().map(|v| &v.kind),
            Some(ExpressionKind::If { .. })
        ));
    }

    #[test]
    fn statements() {
        let tree = parse_ok(
            "fn f() {
                var i = 0;
                for j in 0..3 { i += j; }
                while i > 0 { i -= 1; if i == 2 { break; } }
                loop { continue; }
                unsafe { val p = &i; *p = 4; p[0] = 5; }
                return;
            }",
        );
        let Item::Function(f) = &tree.unit.items[0] else {
            panic!("expected a function");
        };
        let kinds: Vec<_> = f
            .body
            .as_ref()
            .unwrap()
            .statements
            .iter()
            .map(|s| std::mem::discriminant(&s.kind))
            .collect();
        assert_eq!(kinds.len(), 6);
        assert!(matches!(
            f.body.as_ref().unwrap().statements[1].kind,
            StatementKind::For { .. }
        ));
        assert!(matches!(
            f.body.as_ref().unwrap().statements[5].kind,
            StatementKind::Return(None)
        ));
    }

    #[test]
    fn types_and_structs() {
        let tree = parse_ok(
            "struct Square: Shape { side: i32, override area: i64 = 4, val kind: i32 = 7 }
             val f: fn(i32): *u8 = fn(x: i32): *u8 { null(x) }",
        );
        let Item::Struct(s) = &tree.unit.items[0] else {
            panic!("expected a struct");
        };
        assert_eq!(s.parent.as_ref().unwrap().to_string(), "Shape");
        assert_eq!(s.fields.len(), 3);
        assert!(!s.fields[0].is_read_only);
        assert!(s.fields[1].is_override);
        assert!(s.fields[2].is_read_only && s.fields[2].default.is_some());

        let Item::Global(g) = &tree.unit.items[1] else {
            panic!("expected a global");
        };
        let ty = g.ty.as_ref().unwrap();
        assert_eq!(ty.to_string(), "fn(i32): *u8");
        assert!(matches!(ty.kind, TypeClauseKind::Function { .. }));
        assert!(matches!(g.initializer.kind, ExpressionKind::Lambda { .. }));
    }

    #[test]
    fn postfix_and_prefix() {
        let tree = parse_ok("fn f() { -a.b(1)[2] as i64; }");
        let Item::Function(f) = &tree.unit.items[0] else {
            panic!("expected a function");
        };
        let StatementKind::Expression { expression, .. } =
            &f.body.as_ref().unwrap().statements[0].kind
        else {
            panic!("expected an expression statement");
        };
        let ExpressionKind::Cast { expression, .. } = &expression.kind else {
            panic!("cast binds loosest");
        };
        let ExpressionKind::Unary { operator, operand } = &expression.kind else {
            panic!("expected a negation");
        };
        assert_eq!(*operator, UnaryOperator::Negate);
        assert!(matches!(operand.kind, ExpressionKind::Index { .. }));
    }

    #[test]
    fn errors_are_reported() {
        let (_, diagnostics) = parse_str("fn f() { val = 3; }");
        assert!(diagnostics.has_errors());

        let (_, diagnostics) = parse_str("fn f() { (1 + 2; }");
        assert!(diagnostics.has_errors());

        let (_, diagnostics) = parse_str("fn f() { \"abc }");
        assert!(diagnostics.has_errors());
    }
}
