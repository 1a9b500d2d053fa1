//! Method dispatch on immediates and the primitive prototypes.

use rime_core::{Value, intern};
use rime_runtime::error::ErrorKind;
use rime_runtime::{dispatch, process, string};

fn setup() {
    process::ensure_initialized();
}

#[test]
fn test_integer_addition_dispatches_to_prototype() {
    setup();
    // 3 + 4 == 7, routed through the integer prototype's `+`.
    let result = dispatch::call_method(Value::integer(3), intern("+"), &[Value::integer(4)]).unwrap();
    assert_eq!(result, Value::integer(7));
}

#[test]
fn test_arithmetic_method_suite() {
    setup();
    let cases: &[(&str, i64, i64, i64)] = &[
        ("+", 3, 4, 7),
        ("-", 10, 2, 8),
        ("*", 6, 7, 42),
        ("/", 9, 2, 4),
        ("%", 9, 4, 1),
    ];
    for (op, a, b, expected) in cases {
        let result =
            dispatch::call_method(Value::integer(*a), intern(op), &[Value::integer(*b)]).unwrap();
        assert_eq!(result, Value::integer(*expected), "{a} {op} {b}");
    }
}

#[test]
fn test_comparison_methods() {
    setup();
    let lt = dispatch::call_method(Value::integer(1), intern("<"), &[Value::integer(2)]).unwrap();
    assert_eq!(lt, Value::TRUE);
    let ge = dispatch::call_method(Value::float(1.5), intern(">="), &[Value::integer(2)]).unwrap();
    assert_eq!(ge, Value::FALSE);
}

#[test]
fn test_mixed_arithmetic_promotes() {
    setup();
    let result =
        dispatch::call_method(Value::integer(1), intern("+"), &[Value::float(0.5)]).unwrap();
    assert!(result.is_float());
    assert_eq!(result.as_float(), 1.5);
}

#[test]
fn test_unary_minus_via_dispatch() {
    setup();
    let result = dispatch::call_method(Value::integer(5), intern("-"), &[]).unwrap();
    assert_eq!(result, Value::integer(-5));
}

#[test]
fn test_wrong_type_operand_raises() {
    setup();
    let err = dispatch::call_method(Value::integer(1), intern("+"), &[Value::NIL]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongType);
}

#[test]
fn test_missing_method_raises_no_method() {
    setup();
    let err =
        dispatch::call_method(Value::integer(1), intern("definitely_missing"), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMethod);
}

#[test]
fn test_primitive_inspect() {
    setup();
    let cases: &[(Value, &str)] = &[
        (Value::integer(42), "42"),
        (Value::NIL, "nil"),
        (Value::TRUE, "true"),
        (Value::FALSE, "false"),
    ];
    for (value, expected) in cases {
        assert_eq!(&dispatch::inspect_to_string(*value).unwrap(), expected);
    }
}

#[test]
fn test_symbol_inspect_and_to_string() {
    setup();
    let sym = Value::symbol(intern("flurry"));
    assert_eq!(dispatch::inspect_to_string(sym).unwrap(), "#flurry");
    assert_eq!(dispatch::to_display_string(sym).unwrap(), "flurry");
}

#[test]
fn test_nil_to_string_is_empty() {
    setup();
    assert_eq!(dispatch::to_display_string(Value::NIL).unwrap(), "");
}

#[test]
fn test_string_concat_and_size() {
    setup();
    let s = string::create("rime").value();
    let out = dispatch::call_method(s, intern("+"), &[string::create("stone").value()]).unwrap();
    assert_eq!(dispatch::to_display_string(out).unwrap(), "rimestone");
    let size = dispatch::get_member(out, intern("size")).unwrap();
    assert_eq!(size, Value::integer(9));
}

#[test]
fn test_eval_without_backend_reports_compile_error() {
    setup();
    // This binary installs the null backend, so source never compiles.
    let err = process::eval("3 + 4").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CompileError);
}

#[test]
fn test_boolean_methods_shared_between_true_and_false() {
    setup();
    assert_eq!(dispatch::inspect_to_string(Value::TRUE).unwrap(), "true");
    assert_eq!(dispatch::inspect_to_string(Value::FALSE).unwrap(), "false");
}
