//! Operator tables
//!
//! Builtin operators are resolved against the primitive kind of their operands. Anything the
//! tables reject may still be handled by an `operator fn` with the matching name.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::symbols::PrimitiveKind;

use super::BoundUnaryOperator;

/// Names an `operator fn` may have
pub const OPERATOR_FUNCTION_NAMES: [&str; 10] = [
    "plus", "minus", "times", "div", "rem", "equals", "less", "greater", "negate", "not",
];

/// Resolve a unary operator on a primitive operand. The result has the operand type.
pub fn bind_unary_operator(operand: PrimitiveKind, operator: UnaryOperator) -> Option<BoundUnaryOperator> {
    if !operand.supports_unary_op(operator) {
        return None;
    }
    match operator {
        UnaryOperator::Negate => Some(BoundUnaryOperator::Negate),
        UnaryOperator::Not => Some(BoundUnaryOperator::Not),
        UnaryOperator::BitwiseNot => Some(BoundUnaryOperator::BitwiseNot),
        UnaryOperator::AddressOf | UnaryOperator::Deref => None,
    }
}

/// Resolve a binary operator on two operands of the same primitive kind, returning the kind of
/// the result
pub fn bind_binary_operator(operand: PrimitiveKind, operator: BinaryOperator) -> Option<PrimitiveKind> {
    if !operand.supports_binary_op(operator) {
        return None;
    }
    Some(if is_comparison(operator) || is_logical(operator) {
        PrimitiveKind::Bool
    } else {
        operand
    })
}

pub fn is_comparison(operator: BinaryOperator) -> bool {
    use BinaryOperator::*;
    matches!(operator, Equals | NotEquals | Less | LessEq | Greater | GreaterEq)
}

pub fn is_logical(operator: BinaryOperator) -> bool {
    matches!(operator, BinaryOperator::And | BinaryOperator::Or)
}

pub fn binary_operator_function(operator: BinaryOperator) -> Option<&'static str> {
    match operator {
        BinaryOperator::Add => Some("plus"),
        BinaryOperator::Sub => Some("minus"),
        BinaryOperator::Mul => Some("times"),
        BinaryOperator::Div => Some("div"),
        BinaryOperator::Rem => Some("rem"),
        BinaryOperator::Equals => Some("equals"),
        BinaryOperator::Less => Some("less"),
        BinaryOperator::Greater => Some("greater"),
        _ => None,
    }
}

pub fn unary_operator_function(operator: UnaryOperator) -> Option<&'static str> {
    match operator {
        UnaryOperator::Negate => Some("negate"),
        UnaryOperator::Not => Some("not"),
        _ => None,
    }
}

/// Number of parameters an operator function with this name takes
pub fn operator_function_arity(name: &str) -> Option<usize> {
    match name {
        "negate" | "not" => Some(1),
        _ if OPERATOR_FUNCTION_NAMES.contains(&name) => Some(2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_kinds() {
        use PrimitiveKind::*;
        assert_eq!(bind_binary_operator(I32, BinaryOperator::Add), Some(I32));
        assert_eq!(bind_binary_operator(U8, BinaryOperator::Less), Some(Bool));
        assert_eq!(bind_binary_operator(Bool, BinaryOperator::And), Some(Bool));
        assert_eq!(bind_binary_operator(F64, BinaryOperator::Shl), None);
        assert_eq!(bind_binary_operator(Void, BinaryOperator::Equals), None);
        assert_eq!(bind_unary_operator(U32, UnaryOperator::Negate), None);
        assert_eq!(
            bind_unary_operator(F32, UnaryOperator::Negate),
            Some(BoundUnaryOperator::Negate)
        );
    }

    #[test]
    fn operator_functions() {
        assert_eq!(binary_operator_function(BinaryOperator::Mul), Some("times"));
        assert_eq!(binary_operator_function(BinaryOperator::Shl), None);
        assert_eq!(operator_function_arity("negate"), Some(1));
        assert_eq!(operator_function_arity("plus"), Some(2));
        assert_eq!(operator_function_arity("concat"), None);
    }
}
