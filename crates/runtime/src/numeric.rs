//! Numeric Primitives
//!
//! Arithmetic and comparison for the integer and float immediates, as both
//! the inlinable helpers named by the compiler contract and the prototype
//! methods behind `1.+(2)`. Mixed integer/float operands promote to float;
//! anything non-numeric is reported, never coerced.

use rime_core::Value;

use crate::error::{RtResult, RuntimeError, raise_with_message};
use crate::function::define_method;
use crate::heap::ObjRef;
use crate::object::create_object;
use crate::string;

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f32),
}

fn number(value: Value) -> RtResult<Number> {
    if value.is_integer() {
        Ok(Number::Int(value.as_integer()))
    } else if value.is_float() {
        Ok(Number::Float(value.as_float()))
    } else {
        Err(RuntimeError::wrong_type("a numeric value"))
    }
}

fn binary<FI, FF>(a: Value, b: Value, int_op: FI, float_op: FF) -> RtResult<Value>
where
    FI: FnOnce(i64, i64) -> RtResult<Value>,
    FF: FnOnce(f32, f32) -> Value,
{
    match (number(a)?, number(b)?) {
        (Number::Int(x), Number::Int(y)) => int_op(x, y),
        (x, y) => Ok(float_op(to_float(x), to_float(y))),
    }
}

fn to_float(n: Number) -> f32 {
    match n {
        Number::Int(i) => i as f32,
        Number::Float(f) => f,
    }
}

// Inlinable helpers named by the compiler contract.

pub fn add(a: Value, b: Value) -> RtResult<Value> {
    binary(
        a,
        b,
        |x, y| Ok(Value::integer(x.wrapping_add(y))),
        |x, y| Value::float(x + y),
    )
}

pub fn sub(a: Value, b: Value) -> RtResult<Value> {
    binary(
        a,
        b,
        |x, y| Ok(Value::integer(x.wrapping_sub(y))),
        |x, y| Value::float(x - y),
    )
}

pub fn mul(a: Value, b: Value) -> RtResult<Value> {
    binary(
        a,
        b,
        |x, y| Ok(Value::integer(x.wrapping_mul(y))),
        |x, y| Value::float(x * y),
    )
}

pub fn div(a: Value, b: Value) -> RtResult<Value> {
    binary(
        a,
        b,
        |x, y| {
            if y == 0 {
                Err(raise_with_message("division by zero"))
            } else {
                Ok(Value::integer(x.wrapping_div(y)))
            }
        },
        |x, y| Value::float(x / y),
    )
}

pub fn rem(a: Value, b: Value) -> RtResult<Value> {
    if !a.is_integer() || !b.is_integer() {
        return Err(RuntimeError::wrong_type("integers for modulo"));
    }
    let y = b.as_integer();
    if y == 0 {
        return Err(raise_with_message("division by zero"));
    }
    Ok(Value::integer(a.as_integer().wrapping_rem(y)))
}

fn compare<FI, FF>(a: Value, b: Value, int_op: FI, float_op: FF) -> RtResult<Value>
where
    FI: FnOnce(i64, i64) -> bool,
    FF: FnOnce(f32, f32) -> bool,
{
    binary(
        a,
        b,
        |x, y| Ok(Value::boolean(int_op(x, y))),
        |x, y| Value::boolean(float_op(x, y)),
    )
}

// ---------------------------------------------------------------------------
// Prototype methods

fn numeric_add(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    if it.is_undefined() {
        // unary plus
        return Ok(self_value);
    }
    add(self_value, it)
}

fn numeric_subtract(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    if it.is_undefined() {
        // unary minus
        return match number(self_value)? {
            Number::Int(n) => Ok(Value::integer(n.wrapping_neg())),
            Number::Float(f) => Ok(Value::float(-f)),
        };
    }
    sub(self_value, it)
}

fn numeric_multiply(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    if it.is_undefined() {
        return Ok(self_value);
    }
    mul(self_value, it)
}

fn numeric_divide(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    div(self_value, it)
}

fn numeric_less_than(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    compare(self_value, it, |x, y| x < y, |x, y| x < y)
}

fn numeric_less_or_equal(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    compare(self_value, it, |x, y| x <= y, |x, y| x <= y)
}

fn numeric_greater_than(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    compare(self_value, it, |x, y| x > y, |x, y| x > y)
}

fn numeric_greater_or_equal(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    compare(self_value, it, |x, y| x >= y, |x, y| x >= y)
}

fn numeric_equals(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    if !it.is_integer() && !it.is_float() {
        return Ok(Value::FALSE);
    }
    compare(self_value, it, |x, y| x == y, |x, y| x == y)
}

fn integer_modulo(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    rem(self_value, it)
}

fn integer_complement(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    if !self_value.is_integer() {
        return Err(RuntimeError::wrong_type("an integer"));
    }
    Ok(Value::integer(!self_value.as_integer()))
}

fn numeric_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    let text = match number(self_value)? {
        Number::Int(n) => n.to_string(),
        Number::Float(f) => format!("{f:?}"),
    };
    Ok(string::create(&text).value())
}

pub fn create_integer_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "+", numeric_add, 1);
    define_method(proto, "-", numeric_subtract, 1);
    define_method(proto, "*", numeric_multiply, 1);
    define_method(proto, "/", numeric_divide, 1);
    define_method(proto, "%", integer_modulo, 1);
    define_method(proto, "~", integer_complement, 0);
    define_method(proto, "<", numeric_less_than, 1);
    define_method(proto, "<=", numeric_less_or_equal, 1);
    define_method(proto, ">", numeric_greater_than, 1);
    define_method(proto, ">=", numeric_greater_or_equal, 1);
    define_method(proto, "=", numeric_equals, 1);
    define_method(proto, "inspect", numeric_inspect, 0);
    define_method(proto, "to_string", numeric_inspect, 0);
    proto
}

pub fn create_float_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "+", numeric_add, 1);
    define_method(proto, "-", numeric_subtract, 1);
    define_method(proto, "*", numeric_multiply, 1);
    define_method(proto, "/", numeric_divide, 1);
    define_method(proto, "<", numeric_less_than, 1);
    define_method(proto, "<=", numeric_less_or_equal, 1);
    define_method(proto, ">", numeric_greater_than, 1);
    define_method(proto, ">=", numeric_greater_or_equal, 1);
    define_method(proto, "=", numeric_equals, 1);
    define_method(proto, "inspect", numeric_inspect, 0);
    define_method(proto, "to_string", numeric_inspect, 0);
    proto
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(
            add(Value::integer(3), Value::integer(4)).unwrap(),
            Value::integer(7)
        );
        assert_eq!(
            sub(Value::integer(10), Value::integer(2)).unwrap(),
            Value::integer(8)
        );
        assert_eq!(
            mul(Value::integer(6), Value::integer(7)).unwrap(),
            Value::integer(42)
        );
        assert_eq!(
            div(Value::integer(9), Value::integer(2)).unwrap(),
            Value::integer(4)
        );
        assert_eq!(
            rem(Value::integer(9), Value::integer(4)).unwrap(),
            Value::integer(1)
        );
    }

    #[test]
    fn test_mixed_operands_promote_to_float() {
        let v = add(Value::integer(1), Value::float(0.5)).unwrap();
        assert!(v.is_float());
        assert_eq!(v.as_float(), 1.5);
    }

    #[test]
    fn test_non_numeric_operand_is_wrong_type() {
        let err = add(Value::integer(1), Value::NIL).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongType);
        let err = mul(Value::TRUE, Value::integer(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongType);
    }

    #[test]
    fn test_division_by_zero_raises() {
        assert!(div(Value::integer(1), Value::integer(0)).is_err());
        assert!(rem(Value::integer(1), Value::integer(0)).is_err());
        // Float division by zero follows IEEE 754 instead.
        let v = div(Value::float(1.0), Value::float(0.0)).unwrap();
        assert!(v.as_float().is_infinite());
    }

    #[test]
    fn test_unary_minus() {
        let v = numeric_subtract(Value::UNDEFINED, Value::integer(5), Value::UNDEFINED).unwrap();
        assert_eq!(v, Value::integer(-5));
    }
}
