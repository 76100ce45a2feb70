use std::fmt;

use chumsky::prelude::*;

use super::{ParseErr, Spanned};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Int(String),
    Float(String),
    Str(String),
    Bool(bool),
    Ident(String),

    Namespace,
    Use,
    Struct,
    Fn,
    Val,
    Var,
    Const,
    Return,
    If,
    Else,
    While,
    Loop,
    For,
    In,
    Break,
    Continue,
    As,
    New,
    Unsafe,

    Private,
    Internal,
    Inline,
    Extern,
    Entry,
    Ext,
    Operator,
    Override,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Shl,
    Shr,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    AndAnd,
    OrOr,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,

    ParenOpen,
    ParenClose,
    CurlyOpen,
    CurlyClose,
    BracketOpen,
    BracketClose,

    Comma,
    Colon,
    Semicolon,
    Dot,
    DotDot,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Int(x) | Token::Float(x) | Token::Ident(x) => return write!(f, "{x}"),
            Token::Str(s) => return write!(f, "\"{s}\""),
            Token::Bool(b) => return write!(f, "{b}"),
            Token::Namespace => "namespace",
            Token::Use => "use",
            Token::Struct => "struct",
            Token::Fn => "fn",
            Token::Val => "val",
            Token::Var => "var",
            Token::Const => "const",
            Token::Return => "return",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::Loop => "loop",
            Token::For => "for",
            Token::In => "in",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::As => "as",
            Token::New => "new",
            Token::Unsafe => "unsafe",
            Token::Private => "private",
            Token::Internal => "internal",
            Token::Inline => "inline",
            Token::Extern => "extern",
            Token::Entry => "entry",
            Token::Ext => "ext",
            Token::Operator => "operator",
            Token::Override => "override",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Bang => "!",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Less => "<",
            Token::LessEq => "<=",
            Token::Greater => ">",
            Token::GreaterEq => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Assign => "=",
            Token::PlusAssign => "+=",
            Token::MinusAssign => "-=",
            Token::StarAssign => "*=",
            Token::SlashAssign => "/=",
            Token::ParenOpen => "(",
            Token::ParenClose => ")",
            Token::CurlyOpen => "{",
            Token::CurlyClose => "}",
            Token::BracketOpen => "[",
            Token::BracketClose => "]",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semicolon => ";",
            Token::Dot => ".",
            Token::DotDot => "..",
        };
        write!(f, "{text}")
    }
}

pub fn lex() -> impl Parser<char, Vec<Spanned<Token>>, Error = ParseErr<char>> {
    let float = text::int(10)
        .then_ignore(just('.'))
        .then(text::digits(10))
        .map(|(int, frac): (String, String)| Token::Float(format!("{int}.{frac}")));

    let integer = text::int(10).map(Token::Int);

    // escapes are kept verbatim and validated by the binder
    let escape = just('\\')
        .ignore_then(any())
        .map(|c: char| vec!['\\', c]);

    let string = just('"')
        .ignore_then(none_of("\\\"").map(|c: char| vec![c]).or(escape).repeated())
        .then_ignore(just('"'))
        .map(|parts: Vec<Vec<char>>| Token::Str(parts.into_iter().flatten().collect()));

    let symbol = choice((
        just("..").to(Token::DotDot),
        just("==").to(Token::EqEq),
        just("!=").to(Token::NotEq),
        just("<=").to(Token::LessEq),
        just(">=").to(Token::GreaterEq),
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
        just("<<").to(Token::Shl),
        just(">>").to(Token::Shr),
        just("+=").to(Token::PlusAssign),
        just("-=").to(Token::MinusAssign),
        just("*=").to(Token::StarAssign),
        just("/=").to(Token::SlashAssign),
        one_of("+-*/%&|^~!<>=(){}[],:;.").map(|symb: char| match symb {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '&' => Token::Amp,
            '|' => Token::Pipe,
            '^' => Token::Caret,
            '~' => Token::Tilde,
            '!' => Token::Bang,
            '<' => Token::Less,
            '>' => Token::Greater,
            '=' => Token::Assign,
            '(' => Token::ParenOpen,
            ')' => Token::ParenClose,
            '{' => Token::CurlyOpen,
            '}' => Token::CurlyClose,
            '[' => Token::BracketOpen,
            ']' => Token::BracketClose,
            ',' => Token::Comma,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            '.' => Token::Dot,
            _ => unreachable!(),
        }),
    ));

    let kw_or_ident = text::ident().map(|ident: String| match ident.as_str() {
        "namespace" => Token::Namespace,
        "use" => Token::Use,
        "struct" => Token::Struct,
        "fn" => Token::Fn,
        "val" => Token::Val,
        "var" => Token::Var,
        "const" => Token::Const,
        "return" => Token::Return,
        "if" => Token::If,
        "else" => Token::Else,
        "while" => Token::While,
        "loop" => Token::Loop,
        "for" => Token::For,
        "in" => Token::In,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "as" => Token::As,
        "new" => Token::New,
        "unsafe" => Token::Unsafe,
        "private" => Token::Private,
        "internal" => Token::Internal,
        "inline" => Token::Inline,
        "extern" => Token::Extern,
        "entry" => Token::Entry,
        "ext" => Token::Ext,
        "operator" => Token::Operator,
        "override" => Token::Override,
        "true" => Token::Bool(true),
        "false" => Token::Bool(false),
        _ => Token::Ident(ident),
    });

    let token = choice((float, integer, string, symbol, kw_or_ident));

    let comment = just("//").then(take_until(just('\n'))).padded();

    token
        .map_with_span(|tok, span| (tok, span))
        .padded_by(comment.repeated())
        .padded()
        .recover_with(skip_then_retry_until([]))
        .repeated()
        .then_ignore(end())
}
