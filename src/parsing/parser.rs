use chumsky::prelude::*;

use super::lexer::Token;
use super::ParseErr;
use crate::ast::{self, BinaryOperator, ExpressionKind, StatementKind, UnaryOperator};
use crate::util::Span;

enum Postfix {
    Call(Vec<ast::Expression>),
    Field(ast::Name),
    Index(ast::Expression),
}

fn expression(kind: ExpressionKind, span: Span) -> ast::Expression {
    ast::Expression { kind, span }
}

fn missing(span: Span) -> ast::Expression {
    expression(ExpressionKind::Missing, span)
}

/// One precedence level of left associative binary operators
fn binary_level<'a, P, O>(
    operand: P,
    operators: O,
) -> BoxedParser<'a, Token, ast::Expression, ParseErr<Token>>
where
    P: Parser<Token, ast::Expression, Error = ParseErr<Token>> + Clone + 'a,
    O: Parser<Token, BinaryOperator, Error = ParseErr<Token>> + Clone + 'a,
{
    operand
        .clone()
        .then(operators.then(operand).repeated())
        .foldl(|lhs, (operator, rhs)| {
            let span = lhs.span.to(rhs.span);
            expression(
                ExpressionKind::Binary {
                    operator,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            )
        })
        .boxed()
}

pub fn parser() -> impl Parser<Token, ast::CompilationUnit, Error = ParseErr<Token>> + Clone {
    let ident = select! { Token::Ident(ident) => ident }
        .map_with_span(|text, span: Span| ast::Name { text, span })
        .labelled("identifier");

    let path = ident
        .clone()
        .separated_by(just(Token::Dot))
        .at_least(1)
        .map_with_span(|segments, span: Span| ast::Path { segments, span })
        .labelled("path");

    let ty = recursive(|ty| {
        let named = path.clone().map(ast::TypeClauseKind::Named);

        let pointer = just(Token::Star)
            .ignore_then(ty.clone())
            .map(|inner| ast::TypeClauseKind::Pointer(Box::new(inner)));

        let function = just(Token::Fn)
            .ignore_then(
                ty.clone()
                    .separated_by(just(Token::Comma))
                    .allow_trailing()
                    .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
            )
            .then(just(Token::Colon).ignore_then(ty).or_not())
            .map(|(params, return_type)| ast::TypeClauseKind::Function {
                params,
                return_type: return_type.map(Box::new),
            });

        choice((pointer, function, named))
            .map_with_span(|kind, span: Span| ast::TypeClause { kind, span })
            .labelled("type")
    });

    let params = ident
        .clone()
        .then_ignore(just(Token::Colon))
        .then(ty.clone())
        .map(|(name, ty)| ast::Parameter { name, ty })
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

    let return_type = just(Token::Colon).ignore_then(ty.clone()).or_not();

    let mut expr = Recursive::<Token, ast::Expression, ParseErr<Token>>::declare();
    let mut block = Recursive::<Token, ast::Block, ParseErr<Token>>::declare();

    let if_expr = recursive(|if_expr| {
        let else_branch = just(Token::Else).ignore_then(
            block
                .clone()
                .map_with_span(|block, span: Span| expression(ExpressionKind::Block(block), span))
                .or(if_expr),
        );

        just(Token::If)
            .ignore_then(expr.clone())
            .then(block.clone())
            .then(else_branch.or_not())
            .map_with_span(|((condition, then_branch), else_branch), span: Span| {
                expression(
                    ExpressionKind::If {
                        condition: Box::new(condition),
                        then_branch,
                        else_branch: else_branch.map(Box::new),
                    },
                    span,
                )
            })
    });

    let block_expr = block
        .clone()
        .map_with_span(|block, span: Span| expression(ExpressionKind::Block(block), span));

    let unsafe_expr = just(Token::Unsafe)
        .ignore_then(block.clone())
        .map_with_span(|block, span: Span| expression(ExpressionKind::Unsafe(block), span));

    let expression_parser = {
        let literal = select! {
            Token::Int(x) => ExpressionKind::Int(x),
            Token::Float(x) => ExpressionKind::Float(x),
            Token::Bool(x) => ExpressionKind::Bool(x),
            Token::Str(x) => ExpressionKind::Str(x),
        }
        .labelled("literal");

        let items = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing();

        let struct_init = just(Token::New)
            .ignore_then(ty.clone())
            .then(
                ident
                    .clone()
                    .then_ignore(just(Token::Colon))
                    .then(expr.clone())
                    .separated_by(just(Token::Comma))
                    .allow_trailing()
                    .delimited_by(just(Token::CurlyOpen), just(Token::CurlyClose)),
            )
            .map(|(ty, fields)| ExpressionKind::StructInit { ty, fields });

        let zeroed_array = ty
            .clone()
            .then_ignore(just(Token::Semicolon))
            .then(expr.clone())
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(|(element, length)| ExpressionKind::ZeroedArray {
                element,
                length: Box::new(length),
            });

        let array = items
            .clone()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(ExpressionKind::Array);

        let lambda = just(Token::Fn)
            .ignore_then(params.clone())
            .then(return_type.clone())
            .then(block.clone())
            .map(|((params, return_type), body)| ExpressionKind::Lambda {
                params,
                return_type,
                body,
            });

        let atom = choice((
            literal,
            ident.clone().map(ExpressionKind::Name),
            struct_init,
            zeroed_array,
            array,
            lambda,
        ))
        .map_with_span(expression)
        .or(if_expr.clone())
        .or(unsafe_expr.clone())
        .or(block_expr.clone())
        .or(expr
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)))
        .recover_with(nested_delimiters(
            Token::ParenOpen,
            Token::ParenClose,
            [
                (Token::CurlyOpen, Token::CurlyClose),
                (Token::BracketOpen, Token::BracketClose),
            ],
            missing,
        ))
        .recover_with(nested_delimiters(
            Token::BracketOpen,
            Token::BracketClose,
            [
                (Token::ParenOpen, Token::ParenClose),
                (Token::CurlyOpen, Token::CurlyClose),
            ],
            missing,
        ));

        let postfix = choice((
            items
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
                .map(Postfix::Call),
            just(Token::Dot).ignore_then(ident.clone()).map(Postfix::Field),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Postfix::Index),
        ))
        .map_with_span(|postfix, span: Span| (postfix, span));

        let call = atom
            .then(postfix.repeated())
            .foldl(|target, (postfix, span)| {
                let span = target.span.to(span);
                let kind = match postfix {
                    Postfix::Call(args) => ExpressionKind::Call {
                        callee: Box::new(target),
                        args,
                    },
                    Postfix::Field(name) => ExpressionKind::Field {
                        target: Box::new(target),
                        name,
                    },
                    Postfix::Index(index) => ExpressionKind::Index {
                        target: Box::new(target),
                        index: Box::new(index),
                    },
                };
                expression(kind, span)
            })
            .boxed();

        let unary = choice((
            just(Token::Minus).to(UnaryOperator::Negate),
            just(Token::Bang).to(UnaryOperator::Not),
            just(Token::Tilde).to(UnaryOperator::BitwiseNot),
            just(Token::Amp).to(UnaryOperator::AddressOf),
            just(Token::Star).to(UnaryOperator::Deref),
        ))
        .map_with_span(|operator, span: Span| (operator, span))
        .repeated()
        .then(call)
        .foldr(|(operator, span), operand| {
            let span = span.to(operand.span);
            expression(
                ExpressionKind::Unary {
                    operator,
                    operand: Box::new(operand),
                },
                span,
            )
        })
        .boxed();

        let cast = unary
            .then(
                just(Token::As)
                    .ignore_then(ty.clone())
                    .map_with_span(|ty, span: Span| (ty, span))
                    .repeated(),
            )
            .foldl(|expr, (ty, span)| {
                let span = expr.span.to(span);
                expression(
                    ExpressionKind::Cast {
                        expression: Box::new(expr),
                        ty,
                    },
                    span,
                )
            })
            .boxed();

        let product = binary_level(
            cast,
            choice((
                just(Token::Star).to(BinaryOperator::Mul),
                just(Token::Slash).to(BinaryOperator::Div),
                just(Token::Percent).to(BinaryOperator::Rem),
            )),
        );
        let sum = binary_level(
            product,
            just(Token::Plus)
                .to(BinaryOperator::Add)
                .or(just(Token::Minus).to(BinaryOperator::Sub)),
        );
        let shift = binary_level(
            sum,
            just(Token::Shl)
                .to(BinaryOperator::Shl)
                .or(just(Token::Shr).to(BinaryOperator::Shr)),
        );
        let bit_and = binary_level(shift, just(Token::Amp).to(BinaryOperator::BitAnd));
        let bit_xor = binary_level(bit_and, just(Token::Caret).to(BinaryOperator::BitXor));
        let bit_or = binary_level(bit_xor, just(Token::Pipe).to(BinaryOperator::BitOr));
        let comparison = binary_level(
            bit_or,
            choice((
                just(Token::Less).to(BinaryOperator::Less),
                just(Token::LessEq).to(BinaryOperator::LessEq),
                just(Token::Greater).to(BinaryOperator::Greater),
                just(Token::GreaterEq).to(BinaryOperator::GreaterEq),
            )),
        );
        let equality = binary_level(
            comparison,
            just(Token::EqEq)
                .to(BinaryOperator::Equals)
                .or(just(Token::NotEq).to(BinaryOperator::NotEquals)),
        );
        let and = binary_level(equality, just(Token::AndAnd).to(BinaryOperator::And));
        let or = binary_level(and, just(Token::OrOr).to(BinaryOperator::Or));

        or.labelled("expression")
    };
    expr.define(expression_parser);

    let variable_keyword = choice((
        just(Token::Val).to(ast::VariableKeyword::Val),
        just(Token::Var).to(ast::VariableKeyword::Var),
        just(Token::Const).to(ast::VariableKeyword::Const),
    ));

    let stmt = {
        let variable = variable_keyword
            .clone()
            .then(ident.clone())
            .then(just(Token::Colon).ignore_then(ty.clone()).or_not())
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .map(|(((keyword, name), ty), initializer)| StatementKind::Variable {
                keyword,
                name,
                ty,
                initializer,
            });

        let assign_operator = choice((
            just(Token::Assign).to(None),
            just(Token::PlusAssign).to(Some(BinaryOperator::Add)),
            just(Token::MinusAssign).to(Some(BinaryOperator::Sub)),
            just(Token::StarAssign).to(Some(BinaryOperator::Mul)),
            just(Token::SlashAssign).to(Some(BinaryOperator::Div)),
        ));

        let assignment_or_expression = expr
            .clone()
            .then(assign_operator.then(expr.clone()).or_not())
            .map(|(target, assignment)| match assignment {
                Some((operator, value)) => StatementKind::Assignment {
                    target,
                    operator,
                    value,
                },
                None => StatementKind::Expression {
                    expression: target,
                    has_semicolon: true,
                },
            });

        let simple = choice((
            variable,
            just(Token::Return)
                .ignore_then(expr.clone().or_not())
                .map(StatementKind::Return),
            just(Token::Break).to(StatementKind::Break),
            just(Token::Continue).to(StatementKind::Continue),
            assignment_or_expression,
        ))
        .then_ignore(just(Token::Semicolon));

        let while_loop = just(Token::While)
            .ignore_then(expr.clone())
            .then(block.clone())
            .map(|(condition, body)| StatementKind::While { condition, body });

        let infinite_loop = just(Token::Loop)
            .ignore_then(block.clone())
            .map(|body| StatementKind::Loop { body });

        let for_loop = just(Token::For)
            .ignore_then(ident.clone())
            .then_ignore(just(Token::In))
            .then(expr.clone())
            .then_ignore(just(Token::DotDot))
            .then(expr.clone())
            .then(block.clone())
            .map(|(((variable, lower), upper), body)| StatementKind::For {
                variable,
                lower,
                upper,
                body,
            });

        let block_like = choice((if_expr, unsafe_expr, block_expr))
            .then(just(Token::Semicolon).or_not())
            .map(|(expression, semicolon)| StatementKind::Expression {
                expression,
                has_semicolon: semicolon.is_some(),
            });

        choice((while_loop, infinite_loop, for_loop, block_like, simple))
            .then_ignore(just(Token::Semicolon).repeated())
            .map_with_span(|kind, span: Span| ast::Statement { kind, span })
            .labelled("statement")
    };

    block.define(
        stmt.repeated()
            .then(expr.clone().or_not())
            .delimited_by(just(Token::CurlyOpen), just(Token::CurlyClose))
            .map_with_span(|(mut statements, value), span: Span| {
                // a trailing block-like statement without `;` is the value of the block
                let trailing = matches!(
                    statements.last(),
                    Some(ast::Statement {
                        kind: StatementKind::Expression {
                            has_semicolon: false,
                            ..
                        },
                        ..
                    })
                );
                let value = match value {
                    Some(value) => Some(Box::new(value)),
                    None if trailing => match statements.pop().map(|s| s.kind) {
                        Some(StatementKind::Expression { expression, .. }) => {
                            Some(Box::new(expression))
                        }
                        _ => None,
                    },
                    None => None,
                };
                ast::Block {
                    statements,
                    value,
                    span,
                }
            })
            .recover_with(nested_delimiters(
                Token::CurlyOpen,
                Token::CurlyClose,
                [
                    (Token::ParenOpen, Token::ParenClose),
                    (Token::BracketOpen, Token::BracketClose),
                ],
                |span| ast::Block {
                    statements: Vec::new(),
                    value: None,
                    span,
                },
            ))
            .labelled("block"),
    );

    let modifiers = choice((
        just(Token::Private),
        just(Token::Internal),
        just(Token::Inline),
        just(Token::Extern),
        just(Token::Entry),
        just(Token::Ext),
        just(Token::Operator),
    ))
    .repeated()
    .map(|tokens| {
        let mut modifiers = ast::Modifiers::default();
        for token in tokens {
            match token {
                Token::Private => modifiers.is_private = true,
                Token::Internal => modifiers.is_internal = true,
                Token::Inline => modifiers.is_inline = true,
                Token::Extern => modifiers.is_extern = true,
                Token::Entry => modifiers.is_entry = true,
                Token::Ext => modifiers.is_extension = true,
                Token::Operator => modifiers.is_operator = true,
                _ => unreachable!(),
            }
        }
        modifiers
    });

    let function = modifiers
        .clone()
        .then_ignore(just(Token::Fn))
        .then(ident.clone())
        .then(params)
        .then(return_type)
        .then(
            just(Token::As)
                .ignore_then(select! { Token::Str(name) => name })
                .or_not(),
        )
        .then(block.clone().or_not())
        .then_ignore(just(Token::Semicolon).or_not())
        .map_with_span(
            |(((((modifiers, name), params), return_type), cname), body), span: Span| {
                ast::Item::Function(ast::FunctionDeclaration {
                    modifiers,
                    name,
                    params,
                    return_type,
                    cname,
                    body,
                    span,
                })
            },
        )
        .labelled("function");

    let field = just(Token::Override)
        .or_not()
        .then(
            just(Token::Val)
                .to(true)
                .or(just(Token::Var).to(false))
                .or_not(),
        )
        .then(ident.clone())
        .then_ignore(just(Token::Colon))
        .then(ty.clone())
        .then(just(Token::Assign).ignore_then(expr.clone()).or_not())
        .map_with_span(
            |((((is_override, is_read_only), name), ty), default), span: Span| {
                ast::FieldDeclaration {
                    name,
                    ty,
                    is_read_only: is_read_only.unwrap_or(false),
                    is_override: is_override.is_some(),
                    default,
                    span,
                }
            },
        )
        .labelled("field");

    let structure = modifiers
        .clone()
        .then_ignore(just(Token::Struct))
        .then(ident.clone())
        .then(just(Token::Colon).ignore_then(ty.clone()).or_not())
        .then(
            field
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .delimited_by(just(Token::CurlyOpen), just(Token::CurlyClose)),
        )
        .map_with_span(|(((modifiers, name), parent), fields), span: Span| {
            ast::Item::Struct(ast::StructDeclaration {
                is_private: modifiers.is_private,
                is_internal: modifiers.is_internal,
                name,
                parent,
                fields,
                span,
            })
        })
        .labelled("struct");

    let global = modifiers
        .then(variable_keyword)
        .then(ident.clone())
        .then(just(Token::Colon).ignore_then(ty).or_not())
        .then_ignore(just(Token::Assign))
        .then(expr)
        .then_ignore(just(Token::Semicolon).or_not())
        .map_with_span(
            |((((modifiers, keyword), name), ty), initializer), span: Span| {
                ast::Item::Global(ast::GlobalDeclaration {
                    is_private: modifiers.is_private,
                    is_internal: modifiers.is_internal,
                    keyword,
                    name,
                    ty,
                    initializer,
                    span,
                })
            },
        )
        .labelled("global");

    let namespace = just(Token::Namespace)
        .ignore_then(path.clone())
        .then_ignore(just(Token::Semicolon).or_not());

    let uses = just(Token::Use)
        .ignore_then(path)
        .then_ignore(just(Token::Semicolon).or_not())
        .repeated();

    namespace
        .or_not()
        .then(uses)
        .then(choice((function, structure, global)).repeated())
        .map(|((namespace, uses), items)| ast::CompilationUnit {
            namespace,
            uses,
            items,
        })
        .then_ignore(end())
}
