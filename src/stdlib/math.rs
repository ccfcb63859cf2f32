//! The `math` namespace

use std::f64::consts::PI;

use crate::interpreter::{Namespace, NativeFunction, Value};
use crate::utils::{Result, RuntimeError};

/// Apply `$int` to ints and `$float` to floats
macro_rules! numeric_unary {
    ($name:literal, $int:expr, $float:expr) => {
        NativeFunction::new($name, Some(1), |arguments: &[Value]| match &arguments[0] {
            Value::Int(i) => Ok(Value::Int($int(*i))),
            Value::Float(f) => Ok(Value::Float($float(*f))),
            other => Err(not_a_number($name, other)),
        })
    };
}

pub fn namespace() -> Namespace {
    Namespace::new("math")
        .with_member("pi", Value::Float(PI))
        .with_function(numeric_unary!("abs", i64::wrapping_abs, f64::abs))
        .with_function(numeric_unary!("floor", |i| i, f64::floor))
        .with_function(numeric_unary!("ceil", |i| i, f64::ceil))
        .with_function(NativeFunction::new("sqrt", Some(1), sqrt))
        .with_function(NativeFunction::new("min", Some(2), |arguments: &[Value]| {
            extremum("min", arguments, i64::min, f64::min)
        }))
        .with_function(NativeFunction::new("max", Some(2), |arguments: &[Value]| {
            extremum("max", arguments, i64::max, f64::max)
        }))
}

fn sqrt(arguments: &[Value]) -> Result<Value> {
    let n = arguments[0]
        .as_f64()
        .ok_or_else(|| not_a_number("sqrt", &arguments[0]))?;
    if n < 0.0 {
        return Err(RuntimeError::host("sqrt", "negative number"));
    }
    Ok(Value::Float(n.sqrt()))
}

fn extremum(
    name: &str,
    arguments: &[Value],
    on_ints: fn(i64, i64) -> i64,
    on_floats: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (&arguments[0], &arguments[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(on_ints(*a, *b))),
        (a, b) => {
            let a = a.as_f64().ok_or_else(|| not_a_number(name, a))?;
            let b = b.as_f64().ok_or_else(|| not_a_number(name, b))?;
            Ok(Value::Float(on_floats(a, b)))
        }
    }
}

fn not_a_number(name: &str, value: &Value) -> RuntimeError {
    RuntimeError::host(name, format!("expected a number, got {}", value.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: &[Value]) -> Result<Value> {
        let math = namespace();
        match math.member(name) {
            Some(Value::Native(native)) => (native.func)(arguments),
            other => panic!("{name} is not a function: {other:?}"),
        }
    }

    #[test]
    fn test_int_results_stay_int() {
        assert_eq!(call("abs", &[Value::Int(-4)]).unwrap(), Value::Int(4));
        assert_eq!(call("floor", &[Value::Int(3)]).unwrap(), Value::Int(3));
        assert_eq!(call("max", &[Value::Int(3), Value::Int(9)]).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_float_results() {
        assert_eq!(call("ceil", &[Value::Float(1.2)]).unwrap(), Value::Float(2.0));
        assert_eq!(call("min", &[Value::Int(3), Value::Float(2.5)]).unwrap(), Value::Float(2.5));
        assert_eq!(call("sqrt", &[Value::Int(9)]).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            call("sqrt", &[Value::Float(-1.0)]),
            Err(RuntimeError::HostFunction { .. })
        ));
        assert!(matches!(
            call("abs", &[Value::string("x")]),
            Err(RuntimeError::HostFunction { .. })
        ));
    }
}
