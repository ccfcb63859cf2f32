//! Operator semantics over runtime values

use std::cmp::Ordering;

use crate::frontend::ast::{Operator, TypeName};
use crate::interpreter::value::Value;
use crate::utils::{Result, RuntimeError};

/// `+ - * / % ^`. Floats win over ints; int arithmetic wraps.
pub fn arithmetic(operator: Operator, left: &Value, right: &Value) -> Result<Value> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        return int_arithmetic(operator, *a, *b);
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => float_arithmetic(operator, a, b).map(Value::Float),
        _ => Err(RuntimeError::unsupported_operands(
            operator.symbol(),
            left.type_name(),
            right.type_name(),
        )),
    }
}

fn int_arithmetic(operator: Operator, a: i64, b: i64) -> Result<Value> {
    let value = match operator {
        Operator::Add => a.wrapping_add(b),
        Operator::Subtract => a.wrapping_sub(b),
        Operator::Multiply => a.wrapping_mul(b),
        Operator::Divide | Operator::Remainder if b == 0 => return Err(RuntimeError::zero_division()),
        Operator::Divide => a.wrapping_div(b),
        Operator::Remainder => a.wrapping_rem(b),
        Operator::Exponent if b < 0 => return Ok(Value::Float((a as f64).powf(b as f64))),
        Operator::Exponent => a.wrapping_pow(u32::try_from(b).unwrap_or(u32::MAX)),
        other => return Err(RuntimeError::internal(format!("`{}` is not arithmetic", other))),
    };
    Ok(Value::Int(value))
}

fn float_arithmetic(operator: Operator, a: f64, b: f64) -> Result<f64> {
    Ok(match operator {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        Operator::Divide => a / b,
        Operator::Remainder => a % b,
        Operator::Exponent => a.powf(b),
        other => return Err(RuntimeError::internal(format!("`{}` is not arithmetic", other))),
    })
}

/// `..` joins two strings; anything else yields null
pub fn concatenate(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Value::string(format!("{}{}", a, b)),
        _ => Value::Null,
    }
}

/// Comparison operators. Mismatched types yield null, except that equality
/// involving null is always decided.
pub fn compare(operator: Operator, left: &Value, right: &Value) -> Value {
    let equality = matches!(operator, Operator::Equal | Operator::NotEqual);
    let expect_equal = operator == Operator::Equal;

    if equality && (left.is_null() || right.is_null()) {
        return Value::Bool((left.is_null() && right.is_null()) == expect_equal);
    }

    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ if equality && left.type_name() == right.type_name() => {
                return Value::Bool((left == right) == expect_equal);
            }
            _ => return Value::Null,
        },
    };

    Value::Bool(match ordering {
        // NaN is unordered and unequal to everything
        None => operator == Operator::NotEqual,
        Some(ordering) => ordering_satisfies(operator, ordering),
    })
}

fn ordering_satisfies(operator: Operator, ordering: Ordering) -> bool {
    match operator {
        Operator::Less => ordering.is_lt(),
        Operator::LessEqual => ordering.is_le(),
        Operator::Greater => ordering.is_gt(),
        Operator::GreaterEqual => ordering.is_ge(),
        Operator::Equal => ordering.is_eq(),
        Operator::NotEqual => ordering.is_ne(),
        _ => false,
    }
}

/// Prefix `+ - !`
pub fn unary(operator: Operator, operand: &Value) -> Result<Value> {
    match (operator, operand) {
        (Operator::Plus, Value::Int(_) | Value::Float(_)) => Ok(operand.clone()),
        (Operator::Negate, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (Operator::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (Operator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (Operator::Not, other) => Err(RuntimeError::expected_boolean(other.type_name())),
        (operator, other) => Err(RuntimeError::unsupported_operand(operator.symbol(), other.type_name())),
    }
}

/// `value is target`
pub fn is_type(value: &Value, target: TypeName) -> bool {
    value.type_of() == Some(target)
}

/// Explicit conversions: `int(x)`, `float(x)`, `string(x)`, `bool(x)`,
/// `function(x)`. Strings that do not parse convert to null.
pub fn cast(value: &Value, target: TypeName) -> Result<Value> {
    let invalid = || Err(RuntimeError::invalid_cast(value.type_name(), target.to_string()));

    match (value, target) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Function(_) | Value::Native(_), TypeName::Function) => Ok(value.clone()),
        (Value::Function(_) | Value::Native(_) | Value::Namespace(_), _) => invalid(),
        (_, TypeName::Function) | (_, TypeName::Null) => invalid(),

        (_, TypeName::String) => Ok(Value::string(value.to_string())),

        (Value::Int(i), TypeName::Int) => Ok(Value::Int(*i)),
        (Value::Float(f), TypeName::Int) => Ok(Value::Int(*f as i64)),
        (Value::Bool(b), TypeName::Int) => Ok(Value::Int(i64::from(*b))),
        (Value::String(s), TypeName::Int) => Ok(s.trim().parse().map(Value::Int).unwrap_or(Value::Null)),

        (Value::Int(i), TypeName::Float) => Ok(Value::Float(*i as f64)),
        (Value::Float(f), TypeName::Float) => Ok(Value::Float(*f)),
        (Value::Bool(b), TypeName::Float) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        (Value::String(s), TypeName::Float) => Ok(s.trim().parse().map(Value::Float).unwrap_or(Value::Null)),

        (Value::Int(i), TypeName::Bool) => Ok(Value::Bool(*i != 0)),
        (Value::Float(f), TypeName::Bool) => Ok(Value::Bool(*f != 0.0)),
        (Value::Bool(b), TypeName::Bool) => Ok(Value::Bool(*b)),
        (Value::String(s), TypeName::Bool) => Ok(match s.as_ref() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Null,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic_wraps() {
        assert_eq!(
            arithmetic(Operator::Add, &Value::Int(i64::MAX), &Value::Int(1)).unwrap(),
            Value::Int(i64::MIN)
        );
        assert_eq!(
            arithmetic(Operator::Exponent, &Value::Int(2), &Value::Int(10)).unwrap(),
            Value::Int(1024)
        );
        assert_eq!(
            arithmetic(Operator::Exponent, &Value::Int(2), &Value::Int(-1)).unwrap(),
            Value::Float(0.5)
        );
    }

    #[test]
    fn test_float_promotion() {
        assert_eq!(
            arithmetic(Operator::Divide, &Value::Int(1), &Value::Float(4.0)).unwrap(),
            Value::Float(0.25)
        );
        match arithmetic(Operator::Divide, &Value::Float(1.0), &Value::Int(0)).unwrap() {
            Value::Float(f) => assert!(f.is_infinite()),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn test_integer_division_by_zero() {
        assert!(matches!(
            arithmetic(Operator::Remainder, &Value::Int(1), &Value::Int(0)),
            Err(RuntimeError::ZeroDivision { .. })
        ));
    }

    #[test]
    fn test_non_numeric_arithmetic() {
        assert!(matches!(
            arithmetic(Operator::Add, &Value::string("a"), &Value::Int(1)),
            Err(RuntimeError::UnsupportedOperands { .. })
        ));
    }

    #[test]
    fn test_concatenate() {
        assert_eq!(concatenate(&Value::string("a"), &Value::string("b")), Value::string("ab"));
        assert_eq!(concatenate(&Value::string("a"), &Value::Int(1)), Value::Null);
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(Operator::Less, &Value::Int(1), &Value::Float(1.5)), Value::Bool(true));
        assert_eq!(compare(Operator::Less, &Value::Int(1), &Value::string("2")), Value::Null);
        assert_eq!(compare(Operator::Equal, &Value::Null, &Value::Int(0)), Value::Bool(false));
        assert_eq!(compare(Operator::NotEqual, &Value::Null, &Value::Null), Value::Bool(false));
        assert_eq!(compare(Operator::Equal, &Value::Bool(true), &Value::Bool(true)), Value::Bool(true));
        assert_eq!(compare(Operator::Less, &Value::Bool(true), &Value::Bool(false)), Value::Null);
        assert_eq!(
            compare(Operator::GreaterEqual, &Value::string("b"), &Value::string("a")),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(Operator::Negate, &Value::Int(3)).unwrap(), Value::Int(-3));
        assert!(matches!(
            unary(Operator::Not, &Value::Int(1)),
            Err(RuntimeError::ExpectedBoolean { .. })
        ));
        assert!(matches!(
            unary(Operator::Negate, &Value::string("x")),
            Err(RuntimeError::UnsupportedOperand { .. })
        ));
    }

    #[test]
    fn test_casts() {
        assert_eq!(cast(&Value::string(" 42 "), TypeName::Int).unwrap(), Value::Int(42));
        assert_eq!(cast(&Value::string("x"), TypeName::Int).unwrap(), Value::Null);
        assert_eq!(cast(&Value::Float(3.9), TypeName::Int).unwrap(), Value::Int(3));
        assert_eq!(cast(&Value::Int(0), TypeName::Bool).unwrap(), Value::Bool(false));
        assert_eq!(cast(&Value::Bool(true), TypeName::Int).unwrap(), Value::Int(1));
        assert_eq!(cast(&Value::Float(2.0), TypeName::String).unwrap(), Value::string("2.0"));
        assert_eq!(cast(&Value::string("false"), TypeName::Bool).unwrap(), Value::Bool(false));
        assert_eq!(cast(&Value::Null, TypeName::String).unwrap(), Value::Null);
        assert!(matches!(
            cast(&Value::Int(1), TypeName::Function),
            Err(RuntimeError::InvalidCast { .. })
        ));
    }
}
