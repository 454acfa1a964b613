//! Operator semantics shared by the evaluator and the built-in functions.

use crate::error::{Fault, FaultKind, Result};
use crate::parser::{BinOp, UnaryOp};
use crate::value::{Value, dict_get};

/// Longest sequence a single repetition may produce.
pub(crate) const MAX_SEQUENCE_LEN: usize = 1_000_000;

pub(crate) fn unary_op(op: UnaryOp, operand: Value) -> Result<Value> {
    if op == UnaryOp::Not {
        return Ok(Value::Bool(!operand.is_truthy()));
    }
    if let Value::Float(x) = operand {
        return Ok(Value::Float(if op == UnaryOp::Neg { -x } else { x }));
    }
    match operand.as_i64() {
        Some(i) if op == UnaryOp::Neg => i.checked_neg().map(Value::Int).ok_or_else(Fault::overflow),
        Some(i) => Ok(Value::Int(i)),
        None => Err(Fault::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            operand.type_name()
        ))),
    }
}

pub(crate) fn binary_op(op: BinOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinOp::Eq => Ok(Value::Bool(left.loose_eq(&right))),
        BinOp::Ne => Ok(Value::Bool(!left.loose_eq(&right))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = left.compare(&right).map_err(|_| {
                Fault::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinOp::In => contains(&right, &left).map(Value::Bool),
        BinOp::NotIn => contains(&right, &left).map(|found| Value::Bool(!found)),
        BinOp::Add => add(left, right),
        BinOp::Mul => multiply(left, right),
        BinOp::Sub | BinOp::Div | BinOp::FloorDiv | BinOp::Mod | BinOp::Pow => {
            arithmetic(op, &left, &right)
        }
    }
}

/// Length of the sequence `left * right` would build, if it is a repetition.
pub(crate) fn repetition_len(left: &Value, right: &Value) -> Option<usize> {
    let (len, times) = match (left, right) {
        (Value::Str(s), n) | (n, Value::Str(s)) => (s.len(), n.as_i64()?),
        (Value::List(items), n) | (n, Value::List(items)) => (items.len(), n.as_i64()?),
        _ => return None,
    };
    Some(len.saturating_mul(usize::try_from(times).unwrap_or(0)))
}

pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::List(items) => Ok(items.iter().any(|x| x.loose_eq(item))),
        Value::Dict(entries) => Ok(dict_get(entries, item).is_some()),
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_str())),
            other => Err(Fault::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        other => Err(Fault::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn add(left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Str(mut a), Value::Str(b)) => {
            a.push_str(&b);
            Ok(Value::Str(a))
        }
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (a, b) => arithmetic(BinOp::Add, &a, &b),
    }
}

fn multiply(left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Str(s), n @ (Value::Int(_) | Value::Bool(_)))
        | (n @ (Value::Int(_) | Value::Bool(_)), Value::Str(s)) => {
            let times = repeat_times(s.len(), &n)?;
            Ok(Value::Str(s.repeat(times)))
        }
        (Value::List(items), n @ (Value::Int(_) | Value::Bool(_)))
        | (n @ (Value::Int(_) | Value::Bool(_)), Value::List(items)) => {
            let times = repeat_times(items.len(), &n)?;
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Ok(Value::List(out))
        }
        (a, b) => arithmetic(BinOp::Mul, &a, &b),
    }
}

fn repeat_times(len: usize, n: &Value) -> Result<usize> {
    let times = usize::try_from(n.as_i64().unwrap_or(0)).unwrap_or(0);
    if len.saturating_mul(times) > MAX_SEQUENCE_LEN {
        return Err(Fault::new(FaultKind::Overflow, "repeated sequence is too long"));
    }
    Ok(times)
}

pub(crate) fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return int_arithmetic(op, a, b);
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => float_arithmetic(op, a, b),
        _ => Err(Fault::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn int_arithmetic(op: BinOp, a: i64, b: i64) -> Result<Value> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(Fault::zero_division("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(Fault::zero_division("integer division or modulo by zero"));
            }
            a.checked_div(b).map(|q| {
                if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(Fault::zero_division("integer modulo by zero"));
            }
            let r = a.wrapping_rem(b);
            Some(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
        }
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(Fault::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp))
        }
        other => {
            return Err(Fault::type_error(format!(
                "unsupported operand for {}",
                other.symbol()
            )));
        }
    };
    result.map(Value::Int).ok_or_else(Fault::overflow)
}

fn float_arithmetic(op: BinOp, a: f64, b: f64) -> Result<Value> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(Fault::zero_division("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(Fault::zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(Fault::zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(Fault::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(Fault::value("math domain error"));
            }
            a.powf(b)
        }
        other => {
            return Err(Fault::type_error(format!(
                "unsupported operand for {}",
                other.symbol()
            )));
        }
    };
    Ok(Value::Float(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    #[test]
    fn floor_division_and_modulo_round_toward_negative_infinity() {
        assert_eq!(binary_op(BinOp::FloorDiv, int(-7), int(2)).unwrap(), int(-4));
        assert_eq!(binary_op(BinOp::Mod, int(-7), int(2)).unwrap(), int(1));
        assert_eq!(binary_op(BinOp::Mod, int(7), int(-2)).unwrap(), int(-1));
        assert_eq!(
            binary_op(BinOp::FloorDiv, Value::Float(7.0), int(2)).unwrap(),
            Value::Float(3.0)
        );
    }

    #[test]
    fn true_division_always_yields_float() {
        assert_eq!(binary_op(BinOp::Div, int(6), int(3)).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn zero_division_messages() {
        let err = binary_op(BinOp::Div, int(1), int(0)).unwrap_err();
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero");
        let err = binary_op(BinOp::FloorDiv, int(1), int(0)).unwrap_err();
        assert_eq!(err.kind, FaultKind::ZeroDivision);
        let err = binary_op(BinOp::Mod, Value::Float(1.0), Value::Float(0.0)).unwrap_err();
        assert_eq!(err.kind, FaultKind::ZeroDivision);
    }

    #[test]
    fn overflow_is_reported() {
        let err = binary_op(BinOp::Add, int(i64::MAX), int(1)).unwrap_err();
        assert_eq!(err.to_string(), "OverflowError: integer overflow");
        assert!(binary_op(BinOp::FloorDiv, int(i64::MIN), int(-1)).is_err());
        assert!(binary_op(BinOp::Pow, int(2), int(64)).is_err());
    }

    #[test]
    fn negative_exponent_gives_float() {
        assert_eq!(binary_op(BinOp::Pow, int(2), int(-1)).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn sequence_operators() {
        assert_eq!(
            binary_op(BinOp::Add, Value::str("ab"), Value::str("c")).unwrap(),
            Value::str("abc")
        );
        assert_eq!(
            binary_op(BinOp::Mul, Value::str("ab"), int(2)).unwrap(),
            Value::str("abab")
        );
        assert_eq!(
            binary_op(BinOp::Mul, int(2), Value::List(vec![int(0)])).unwrap(),
            Value::List(vec![int(0), int(0)])
        );
        assert_eq!(
            binary_op(BinOp::Mul, Value::str("x"), int(-3)).unwrap(),
            Value::str("")
        );
    }

    #[test]
    fn oversized_repetition_fails() {
        let err = binary_op(BinOp::Mul, Value::str("x"), int(i64::MAX)).unwrap_err();
        assert_eq!(err.kind, FaultKind::Overflow);
    }

    #[test]
    fn mixed_types_are_type_errors() {
        let err = binary_op(BinOp::Add, int(1), Value::str("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
        let err = binary_op(BinOp::Lt, int(1), Value::str("a")).unwrap_err();
        assert!(err.message.starts_with("'<' not supported"));
    }

    #[test]
    fn membership() {
        let list = Value::List(vec![int(1), Value::str("a")]);
        assert_eq!(binary_op(BinOp::In, Value::Float(1.0), list.clone()).unwrap(), Value::Bool(true));
        assert_eq!(binary_op(BinOp::NotIn, Value::str("b"), list).unwrap(), Value::Bool(true));
        assert_eq!(
            binary_op(BinOp::In, Value::str("ell"), Value::str("hello")).unwrap(),
            Value::Bool(true)
        );
        assert!(binary_op(BinOp::In, int(1), int(2)).is_err());
    }

    #[test]
    fn unary_operators() {
        assert_eq!(unary_op(UnaryOp::Neg, int(3)).unwrap(), int(-3));
        assert_eq!(unary_op(UnaryOp::Not, Value::List(vec![])).unwrap(), Value::Bool(true));
        assert!(unary_op(UnaryOp::Neg, int(i64::MIN)).is_err());
        assert!(unary_op(UnaryOp::Neg, Value::str("a")).is_err());
    }
}
