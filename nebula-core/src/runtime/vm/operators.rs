//! Arithmetic, comparison, logic and conversion over values
//!
//! All functions take operands in stack order: `a` was pushed before `b`.

use crate::core::{InstructionErrorCode, Value, ValueKind};

type Result<T> = std::result::Result<T, InstructionErrorCode>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntOp {
    Ceq,
    Clt,
    Cgt,
    And,
    Or,
    Xor,
}

// ===== arithmetic =====

/// int∘int stays int (wrapping); any float operand promotes to float.
/// Only the int path checks for a zero divisor.
pub fn arithmetic(op: ArithOp, a: Value, b: Value) -> Result<Value> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => int_arithmetic(op, *x, *y).map(Value::Int),
        _ if a.is_numeric() && b.is_numeric() => {
            let x = a.as_number().unwrap_or_default();
            let y = b.as_number().unwrap_or_default();
            Ok(Value::Float(match op {
                ArithOp::Add => x + y,
                ArithOp::Sub => x - y,
                ArithOp::Mul => x * y,
                ArithOp::Div => x / y,
                ArithOp::Rem => x % y,
            }))
        }
        _ => Err(fatal!(
            "{:?} is not defined for {} and {}",
            op,
            a.kind(),
            b.kind()
        )),
    }
}

fn int_arithmetic(op: ArithOp, x: i32, y: i32) -> Result<i32> {
    match op {
        ArithOp::Add => Ok(x.wrapping_add(y)),
        ArithOp::Sub => Ok(x.wrapping_sub(y)),
        ArithOp::Mul => Ok(x.wrapping_mul(y)),
        ArithOp::Div if y == 0 => Err(InstructionErrorCode::DivideByZero),
        ArithOp::Rem if y == 0 => Err(InstructionErrorCode::DivideByZero),
        ArithOp::Div => Ok(x.wrapping_div(y)),
        ArithOp::Rem => Ok(x.wrapping_rem(y)),
    }
}

// ===== int-only binary ops =====

/// Comparisons and logic push canonical 0/1; Xor is bitwise
pub fn int_binary(op: IntOp, a: Value, b: Value) -> Result<Value> {
    let (Value::Int(x), Value::Int(y)) = (&a, &b) else {
        return Err(fatal!(
            "{:?} requires two int32 operands, got {} and {}",
            op,
            a.kind(),
            b.kind()
        ));
    };
    let (x, y) = (*x, *y);
    Ok(Value::Int(match op {
        IntOp::Ceq => (x == y) as i32,
        IntOp::Clt => (x < y) as i32,
        IntOp::Cgt => (x > y) as i32,
        IntOp::And => (x != 0 && y != 0) as i32,
        IntOp::Or => (x != 0 || y != 0) as i32,
        IntOp::Xor => x ^ y,
    }))
}

// ===== unary =====

pub fn negate(v: Value) -> Result<Value> {
    match v {
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(fatal!("Neg is not defined for {}", other.kind())),
    }
}

/// Bitwise complement, ints only
pub fn complement(v: Value) -> Result<Value> {
    match v {
        Value::Int(i) => Ok(Value::Int(!i)),
        other => Err(fatal!("Not is not defined for {}", other.kind())),
    }
}

// ===== conversion =====

/// To string always succeeds; int/float convert between each other only
pub fn convert(v: Value, target: ValueKind) -> Result<Value> {
    match (target, v) {
        (ValueKind::String, v) => Ok(Value::String(v.to_string())),
        (ValueKind::Int32, Value::Int(i)) => Ok(Value::Int(i)),
        (ValueKind::Int32, Value::Float(f)) => Ok(Value::Int(f as i32)),
        (ValueKind::Float, Value::Float(f)) => Ok(Value::Float(f)),
        (ValueKind::Float, Value::Int(i)) => Ok(Value::Float(i as f32)),
        (target, v) => Err(fatal!("cannot convert {} to {}", v.kind(), target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic() {
        let cases = [
            (ArithOp::Add, 7, 3, 10),
            (ArithOp::Sub, 7, 3, 4),
            (ArithOp::Mul, 7, 3, 21),
            (ArithOp::Div, 7, 3, 2),
            (ArithOp::Rem, 7, 3, 1),
            (ArithOp::Div, -7, 2, -3),
            (ArithOp::Rem, -7, 2, -1),
        ];
        for (op, a, b, expected) in cases {
            assert_eq!(
                arithmetic(op, Value::Int(a), Value::Int(b)),
                Ok(Value::Int(expected)),
                "{op:?} {a} {b}"
            );
        }
        assert_eq!(
            arithmetic(ArithOp::Add, Value::Int(i32::MAX), Value::Int(1)),
            Ok(Value::Int(i32::MIN))
        );
    }

    #[test]
    fn test_int_division_by_zero() {
        assert_eq!(
            arithmetic(ArithOp::Div, Value::Int(1), Value::Int(0)),
            Err(InstructionErrorCode::DivideByZero)
        );
        assert_eq!(
            arithmetic(ArithOp::Rem, Value::Int(1), Value::Int(0)),
            Err(InstructionErrorCode::DivideByZero)
        );
    }

    #[test]
    fn test_float_division_by_zero_is_ieee() {
        assert_eq!(
            arithmetic(ArithOp::Div, Value::Float(1.0), Value::Float(0.0)),
            Ok(Value::Float(f32::INFINITY))
        );
        // mixed operands take the float path too
        assert_eq!(
            arithmetic(ArithOp::Div, Value::Int(-1), Value::Float(0.0)),
            Ok(Value::Float(f32::NEG_INFINITY))
        );
        let nan = arithmetic(ArithOp::Div, Value::Float(0.0), Value::Int(0)).unwrap();
        assert!(nan.as_float().unwrap().is_nan());
    }

    #[test]
    fn test_promotion_and_mismatch() {
        assert_eq!(
            arithmetic(ArithOp::Add, Value::Int(1), Value::Float(0.5)),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            arithmetic(ArithOp::Add, Value::from("a"), Value::Int(1)),
            Err(InstructionErrorCode::Fatal)
        );
    }

    #[test]
    fn test_int_binary() {
        assert_eq!(int_binary(IntOp::Clt, 1.into(), 2.into()), Ok(Value::Int(1)));
        assert_eq!(int_binary(IntOp::Cgt, 1.into(), 2.into()), Ok(Value::Int(0)));
        assert_eq!(int_binary(IntOp::Ceq, 2.into(), 2.into()), Ok(Value::Int(1)));
        assert_eq!(int_binary(IntOp::And, 5.into(), 0.into()), Ok(Value::Int(0)));
        assert_eq!(int_binary(IntOp::Or, 5.into(), 0.into()), Ok(Value::Int(1)));
        assert_eq!(int_binary(IntOp::Xor, 6.into(), 3.into()), Ok(Value::Int(5)));
        assert_eq!(
            int_binary(IntOp::Clt, Value::Float(1.0), 2.into()),
            Err(InstructionErrorCode::Fatal)
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(negate(Value::Int(4)), Ok(Value::Int(-4)));
        assert_eq!(negate(Value::Float(1.5)), Ok(Value::Float(-1.5)));
        assert_eq!(complement(Value::Int(0)), Ok(Value::Int(-1)));
        assert_eq!(complement(Value::Float(0.0)), Err(InstructionErrorCode::Fatal));
    }

    #[test]
    fn test_convert() {
        assert_eq!(convert(Value::Int(5), ValueKind::String), Ok(Value::from("5")));
        assert_eq!(convert(Value::Float(2.9), ValueKind::Int32), Ok(Value::Int(2)));
        assert_eq!(convert(Value::Int(2), ValueKind::Float), Ok(Value::Float(2.0)));
        assert_eq!(
            convert(Value::from("5"), ValueKind::Int32),
            Err(InstructionErrorCode::Fatal)
        );
        assert_eq!(
            convert(Value::Int(1), ValueKind::Bundle),
            Err(InstructionErrorCode::Fatal)
        );
    }
}
