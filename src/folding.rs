//! Constant folding
//!
//! Pure functions that compute the value of an operation over compile time constants. A `None`
//! result only means "not folded": the operation is left for runtime, which also covers cases
//! like a division by zero that must fail when the program runs.
//!
//! The evaluator shares [evaluate_unary], [evaluate_binary] and [convert], so constant folding
//! and execution can never disagree.

use crate::ast::BinaryOperator;
use crate::binding::{BoundBinaryOperator, BoundExpression, BoundUnaryOperator};
use crate::symbols::{Constant, PrimitiveKind, TypeId, TypeTable};

/// Fold `operator operand`
pub fn fold_unary(
    types: &TypeTable,
    operator: BoundUnaryOperator,
    operand: &BoundExpression,
) -> Option<Constant> {
    let value = operand.constant.as_ref()?;
    evaluate_unary(types.as_primitive(operand.ty)?, operator, value)
}

/// Fold `lhs operator rhs`
pub fn fold_binary(
    types: &TypeTable,
    lhs: &BoundExpression,
    operator: BoundBinaryOperator,
    rhs: &BoundExpression,
) -> Option<Constant> {
    let (lhs, rhs) = (lhs.constant.as_ref()?, rhs.constant.as_ref()?);
    evaluate_binary(types.as_primitive(operator.operand_type)?, operator.kind, lhs, rhs)
}

/// Fold a cast of a constant to `target`
pub fn fold_cast(types: &TypeTable, operand: &BoundExpression, target: TypeId) -> Option<Constant> {
    let value = operand.constant.as_ref()?;
    convert(
        types.as_primitive(operand.ty)?,
        types.as_primitive(target)?,
        value,
    )
}

/// Truncate an integer to the width of its type, sign or zero extending the rest
pub fn wrap(kind: PrimitiveKind, value: i64) -> i64 {
    match kind {
        PrimitiveKind::I8 => value as i8 as i64,
        PrimitiveKind::I16 => value as i16 as i64,
        PrimitiveKind::I32 => value as i32 as i64,
        PrimitiveKind::U8 => value as u8 as i64,
        PrimitiveKind::U16 => value as u16 as i64,
        PrimitiveKind::U32 => value as u32 as i64,
        _ => value,
    }
}

fn round(kind: PrimitiveKind, value: f64) -> f64 {
    match kind {
        PrimitiveKind::F32 => value as f32 as f64,
        _ => value,
    }
}

pub fn evaluate_unary(
    kind: PrimitiveKind,
    operator: BoundUnaryOperator,
    value: &Constant,
) -> Option<Constant> {
    match (operator, value) {
        (BoundUnaryOperator::Negate, Constant::Int(x)) => {
            Some(Constant::Int(wrap(kind, x.wrapping_neg())))
        }
        (BoundUnaryOperator::Negate, Constant::Float(x)) => Some(Constant::Float(round(kind, -x))),
        (BoundUnaryOperator::Not, Constant::Bool(x)) => Some(Constant::Bool(!x)),
        (BoundUnaryOperator::BitwiseNot, Constant::Int(x)) => Some(Constant::Int(wrap(kind, !x))),
        _ => None,
    }
}

pub fn evaluate_binary(
    kind: PrimitiveKind,
    operator: BinaryOperator,
    lhs: &Constant,
    rhs: &Constant,
) -> Option<Constant> {
    use BinaryOperator::*;

    match (lhs, rhs) {
        (&Constant::Int(a), &Constant::Int(b)) if kind.is_integer() => {
            let unsigned = kind.is_unsigned();
            let int = |value: i64| Some(Constant::Int(wrap(kind, value)));
            let ordering = if unsigned {
                (a as u64).cmp(&(b as u64))
            } else {
                a.cmp(&b)
            };

            match operator {
                Add => int(a.wrapping_add(b)),
                Sub => int(a.wrapping_sub(b)),
                Mul => int(a.wrapping_mul(b)),
                Div | Rem if b == 0 => None,
                Div if unsigned => int(((a as u64) / (b as u64)) as i64),
                Div => int(a.wrapping_div(b)),
                Rem if unsigned => int(((a as u64) % (b as u64)) as i64),
                Rem => int(a.wrapping_rem(b)),
                BitAnd => int(a & b),
                BitOr => int(a | b),
                BitXor => int(a ^ b),
                Shl => int(a.wrapping_shl(b as u32)),
                Shr if unsigned => int((a as u64).wrapping_shr(b as u32) as i64),
                Shr => int(a.wrapping_shr(b as u32)),
                Equals => Some(Constant::Bool(ordering.is_eq())),
                NotEquals => Some(Constant::Bool(ordering.is_ne())),
                Less => Some(Constant::Bool(ordering.is_lt())),
                LessEq => Some(Constant::Bool(ordering.is_le())),
                Greater => Some(Constant::Bool(ordering.is_gt())),
                GreaterEq => Some(Constant::Bool(ordering.is_ge())),
                And | Or => None,
            }
        }
        (&Constant::Float(a), &Constant::Float(b)) => {
            let float = |value: f64| Some(Constant::Float(round(kind, value)));
            match operator {
                Add => float(a + b),
                Sub => float(a - b),
                Mul => float(a * b),
                Div => float(a / b),
                Rem => float(a % b),
                Equals => Some(Constant::Bool(a == b)),
                NotEquals => Some(Constant::Bool(a != b)),
                Less => Some(Constant::Bool(a < b)),
                LessEq => Some(Constant::Bool(a <= b)),
                Greater => Some(Constant::Bool(a > b)),
                GreaterEq => Some(Constant::Bool(a >= b)),
                _ => None,
            }
        }
        (&Constant::Bool(a), &Constant::Bool(b)) => match operator {
            Equals => Some(Constant::Bool(a == b)),
            NotEquals | BitXor => Some(Constant::Bool(a != b)),
            And | BitAnd => Some(Constant::Bool(a && b)),
            Or | BitOr => Some(Constant::Bool(a || b)),
            _ => None,
        },
        _ => None,
    }
}

/// Convert a primitive value between primitive types
pub fn convert(from: PrimitiveKind, to: PrimitiveKind, value: &Constant) -> Option<Constant> {
    if to.is_integer() {
        let bits = match *value {
            Constant::Int(x) => x,
            Constant::Float(x) if to.is_unsigned() => x as u64 as i64,
            Constant::Float(x) => x as i64,
            Constant::Bool(x) => x as i64,
            _ => return None,
        };
        return Some(Constant::Int(wrap(to, bits)));
    }

    if to.is_float() {
        let float = match *value {
            Constant::Int(x) if from.is_unsigned() => x as u64 as f64,
            Constant::Int(x) => x as f64,
            Constant::Float(x) => x,
            Constant::Bool(x) => f64::from(u8::from(x)),
            _ => return None,
        };
        return Some(Constant::Float(round(to, float)));
    }

    if to == PrimitiveKind::Bool {
        return match *value {
            Constant::Int(x) => Some(Constant::Bool(x != 0)),
            Constant::Float(x) => Some(Constant::Bool(x != 0.0)),
            Constant::Bool(x) => Some(Constant::Bool(x)),
            _ => None,
        };
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BoundExpressionKind;
    use crate::util::Idx;

    fn int(value: i64) -> Constant {
        Constant::Int(value)
    }

    #[test]
    fn arithmetic() {
        let i32 = PrimitiveKind::I32;
        assert_eq!(evaluate_binary(i32, BinaryOperator::Add, &int(1), &int(2)), Some(int(3)));
        assert_eq!(evaluate_binary(i32, BinaryOperator::Div, &int(-7), &int(2)), Some(int(-3)));
        assert_eq!(evaluate_binary(i32, BinaryOperator::Rem, &int(7), &int(0)), None);
        assert_eq!(
            evaluate_binary(i32, BinaryOperator::Add, &int(i32::MAX as i64), &int(1)),
            Some(int(i32::MIN as i64))
        );
        assert_eq!(
            evaluate_binary(i32, BinaryOperator::Shl, &int(1), &int(4)),
            Some(int(16))
        );
    }

    #[test]
    fn unsigned() {
        let u8 = PrimitiveKind::U8;
        assert_eq!(evaluate_binary(u8, BinaryOperator::Add, &int(250), &int(10)), Some(int(4)));
        assert_eq!(evaluate_unary(u8, BoundUnaryOperator::BitwiseNot, &int(0)), Some(int(255)));

        // -1 as u64 is the largest u64
        assert_eq!(
            evaluate_binary(PrimitiveKind::U64, BinaryOperator::Greater, &int(-1), &int(1)),
            Some(Constant::Bool(true))
        );
        assert_eq!(
            evaluate_binary(PrimitiveKind::I64, BinaryOperator::Greater, &int(-1), &int(1)),
            Some(Constant::Bool(false))
        );
    }

    #[test]
    fn floats_and_bools() {
        let f64 = PrimitiveKind::F64;
        assert_eq!(
            evaluate_binary(f64, BinaryOperator::Mul, &Constant::Float(1.5), &Constant::Float(2.0)),
            Some(Constant::Float(3.0))
        );
        assert_eq!(
            evaluate_binary(f64, BinaryOperator::BitAnd, &Constant::Float(1.0), &Constant::Float(2.0)),
            None
        );
        assert_eq!(
            evaluate_binary(
                PrimitiveKind::Bool,
                BinaryOperator::Or,
                &Constant::Bool(false),
                &Constant::Bool(true)
            ),
            Some(Constant::Bool(true))
        );
        assert_eq!(
            evaluate_unary(PrimitiveKind::Bool, BoundUnaryOperator::Not, &Constant::Bool(true)),
            Some(Constant::Bool(false))
        );
    }

    #[test]
    fn conversions() {
        use PrimitiveKind::*;
        assert_eq!(convert(I32, U8, &int(300)), Some(int(44)));
        assert_eq!(convert(I8, U64, &int(-1)), Some(int(-1)));
        assert_eq!(convert(U32, F64, &int(7)), Some(Constant::Float(7.0)));
        assert_eq!(convert(F64, I32, &Constant::Float(2.9)), Some(int(2)));
        assert_eq!(convert(I32, Bool, &int(2)), Some(Constant::Bool(true)));
        assert_eq!(convert(Bool, I64, &Constant::Bool(true)), Some(int(1)));
        assert_eq!(convert(I32, Void, &int(1)), None);
    }

    #[test]
    fn only_constants_fold() {
        let types = TypeTable::new();
        let i32 = types.primitive(PrimitiveKind::I32);
        let operator = BoundBinaryOperator {
            kind: BinaryOperator::Sub,
            operand_type: i32,
            result_type: i32,
        };

        let five = BoundExpression::literal(int(5), i32);
        let three = BoundExpression::literal(int(3), i32);
        let unknown = BoundExpression::new(
            BoundExpressionKind::Variable(crate::symbols::VariableId::new(0)),
            i32,
        );

        assert_eq!(fold_binary(&types, &five, operator, &three), Some(int(2)));
        assert_eq!(fold_binary(&types, &five, operator, &unknown), None);
        assert_eq!(
            fold_unary(&types, BoundUnaryOperator::Negate, &five),
            Some(int(-5))
        );
        assert_eq!(
            fold_cast(&types, &five, types.primitive(PrimitiveKind::F32)),
            Some(Constant::Float(5.0))
        );
    }
}
