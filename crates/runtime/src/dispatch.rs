//! Value-Level Dispatch
//!
//! Member access and invocation for any value. Immediates dispatch through
//! their type prototype: `nearest_object` branches on the tag and never
//! allocates, so `1.+(2)` routes to the integer prototype without boxing.

use rime_core::{Symbol, Value, intern};

use crate::error::{RtResult, RuntimeError};
use crate::function::{create_call_frame, function_call, value_to_function};
use crate::heap::ObjRef;
use crate::{object, string, types};

/// The starting node for dispatch on any receiver: the object itself for
/// pointer values, the type prototype for immediates.
pub fn nearest_object(value: Value) -> ObjRef {
    match ObjRef::from_value(value) {
        Some(obj) => obj,
        None => types::prototype_for_value(value),
    }
}

/// Member lookup on any value.
pub fn get_member(receiver: Value, name: Symbol) -> RtResult<Value> {
    object::get_member(nearest_object(receiver), receiver, name)
}

/// Member assignment on any value. Assignment to an immediate lands on its
/// shared type prototype, which is occasionally what prelude code wants.
pub fn set_member(receiver: Value, name: Symbol, value: Value) -> RtResult<Value> {
    object::set_member(nearest_object(receiver), receiver, name, value)
}

/// Module-scope name resolution: the compiler's fallback when an
/// identifier is neither a local nor an upvalue.
pub fn get_module_value(module: ObjRef, name: Symbol) -> RtResult<Value> {
    let v = object::get_member(module, module.value(), name)?;
    if v.is_nil() || v.is_undefined() {
        return Err(RuntimeError::undefined_name(name));
    }
    Ok(v)
}

/// Call with positional arguments only.
pub fn call(functor: Value, self_value: Value, args: &[Value]) -> RtResult<Value> {
    invoke(functor, self_value, &[], args)
}

/// Call with named and positional arguments. The named pairs are sorted by
/// symbol id before binding; `it` stays the first positional argument as
/// supplied.
pub fn call_with_named(
    functor: Value,
    self_value: Value,
    named: &[(Symbol, Value)],
    positional: &[Value],
) -> RtResult<Value> {
    let mut named = named.to_vec();
    named.sort_by_key(|(name, _)| *name);
    invoke(functor, self_value, &named, positional)
}

fn invoke(
    functor: Value,
    mut self_value: Value,
    sorted_named: &[(Symbol, Value)],
    positional: &[Value],
) -> RtResult<Value> {
    let (function, rebound_self) = value_to_function(functor)?;
    if let Some(rebound) = rebound_self {
        self_value = rebound;
    }

    let names: Vec<Symbol> = sorted_named.iter().map(|(n, _)| *n).collect();
    let mut values: Vec<Value> = sorted_named.iter().map(|(_, v)| *v).collect();
    values.extend_from_slice(positional);
    let it = positional.first().copied().unwrap_or(Value::UNDEFINED);

    let frame = create_call_frame(function, None, &names, &values)?;
    function_call(function, frame, self_value, it)
}

/// Resolve a method for a receiver. Fails with *no-method* when lookup
/// comes back empty.
pub fn get_method(receiver: Value, name: Symbol) -> RtResult<(ObjRef, Value)> {
    let member = get_member(receiver, name)?;
    if member.is_nil() || member.is_undefined() {
        return Err(RuntimeError::no_method(name));
    }
    let (function, rebound) = value_to_function(member)?;
    Ok((function, rebound.unwrap_or(receiver)))
}

/// Look up `name` on the receiver and call it with `self = receiver`.
pub fn call_method(receiver: Value, name: Symbol, args: &[Value]) -> RtResult<Value> {
    let (method, self_value) = get_method(receiver, name)?;
    invoke(method.value(), self_value, &[], args)
}

/// Named-argument variant of [`call_method`].
pub fn call_method_with_named(
    receiver: Value,
    name: Symbol,
    named: &[(Symbol, Value)],
    positional: &[Value],
) -> RtResult<Value> {
    let (method, self_value) = get_method(receiver, name)?;
    call_with_named(method.value(), self_value, named, positional)
}

/// Truth test used by compiled conditionals.
#[inline(always)]
pub fn eval_truth(value: Value) -> bool {
    value.is_truthy()
}

/// Render a value through its `inspect` method.
pub fn inspect_to_string(value: Value) -> RtResult<String> {
    let result = call_method(value, intern("inspect"), &[])?;
    Ok(string::snapshot(string::expect_string(result)?))
}

/// Render a value through its `to_string` method.
pub fn to_display_string(value: Value) -> RtResult<String> {
    let result = call_method(value, intern("to_string"), &[])?;
    Ok(string::snapshot(string::expect_string(result)?))
}
