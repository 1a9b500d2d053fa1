//! Array: the ordered value sequence
//!
//! Negative indices count from the end. Out-of-range reads return nil;
//! out-of-range writes extend the array with nils, and an index that is
//! still negative after length adjustment is an error.

use std::sync::RwLock;

use rime_core::Value;

use crate::error::{RtResult, RuntimeError};
use crate::function::{define_method, define_property_accessors, frame_argument};
use crate::heap::ObjRef;
use crate::object::{ObjectKind, create_with_kind};
use crate::{dispatch, string, types};

/// Allocate an empty array object.
pub fn create() -> ObjRef {
    create_sized(Vec::new())
}

/// Allocate an array holding the given values.
pub fn create_from_slice(values: &[Value]) -> ObjRef {
    create_sized(values.to_vec())
}

fn create_sized(values: Vec<Value>) -> ObjRef {
    let obj = create_with_kind(ObjectKind::Array(RwLock::new(values)));
    if let Some(proto) = types::array_prototype_if_ready() {
        obj.meta().write().expect("object meta lock poisoned").prototype = Some(proto);
    }
    obj
}

fn storage(array: ObjRef) -> &'static RwLock<Vec<Value>> {
    unsafe { &*array.as_ptr() }
        .as_array()
        .expect("not an array object")
}

pub fn size(array: ObjRef) -> usize {
    storage(array).read().expect("array lock poisoned").len()
}

/// Read with negative-index normalization. Out of range reads nil.
pub fn get(array: ObjRef, index: i64) -> Value {
    let data = storage(array).read().expect("array lock poisoned");
    let len = data.len() as i64;
    let index = if index < 0 { index + len } else { index };
    if index < 0 || index >= len {
        return Value::NIL;
    }
    data[index as usize]
}

/// Write with negative-index normalization. Writing past the end extends
/// with nils; an index still negative after adjustment fails.
pub fn set(array: ObjRef, index: i64, value: Value) -> RtResult<Value> {
    let mut data = storage(array).write().expect("array lock poisoned");
    let len = data.len() as i64;
    let index = if index < 0 { index + len } else { index };
    if index < 0 {
        return Err(RuntimeError::index_out_of_range(index));
    }
    let index = index as usize;
    if index >= data.len() {
        data.resize(index + 1, Value::NIL);
    }
    data[index] = value;
    Ok(value)
}

pub fn push(array: ObjRef, value: Value) -> ObjRef {
    storage(array)
        .write()
        .expect("array lock poisoned")
        .push(value);
    array
}

/// Identity containment; module inclusion relies on this.
pub fn contains(array: ObjRef, value: Value) -> bool {
    storage(array)
        .read()
        .expect("array lock poisoned")
        .iter()
        .any(|v| *v == value)
}

/// Copy of the current contents. Callers that invoke script per element
/// iterate the snapshot rather than holding the lock.
pub fn snapshot(array: ObjRef) -> Vec<Value> {
    storage(array).read().expect("array lock poisoned").clone()
}

// ---------------------------------------------------------------------------
// Array prototype

fn expect_array(value: Value) -> RtResult<ObjRef> {
    ObjRef::from_value(value)
        .filter(|o| o.as_array().is_some())
        .ok_or_else(|| RuntimeError::wrong_type("an array"))
}

fn expect_index(value: Value) -> RtResult<i64> {
    if value.is_integer() {
        Ok(value.as_integer())
    } else {
        Err(RuntimeError::wrong_type("an integer index"))
    }
}

fn array_get(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    Ok(get(expect_array(self_value)?, expect_index(it)?))
}

fn array_set(frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    let value = frame_argument(frame, 1);
    set(expect_array(self_value)?, expect_index(it)?, value)
}

fn array_push(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    push(expect_array(self_value)?, it);
    Ok(self_value)
}

fn array_each(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    for element in snapshot(expect_array(self_value)?) {
        dispatch::call(it, Value::UNDEFINED, &[element])?;
    }
    Ok(Value::NIL)
}

fn array_contains(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    Ok(Value::boolean(contains(expect_array(self_value)?, it)))
}

fn array_get_size(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(Value::integer(size(expect_array(self_value)?) as i64))
}

fn array_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    let elements = snapshot(expect_array(self_value)?);
    let mut out = String::from("@(");
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&dispatch::inspect_to_string(*element)?);
    }
    out.push(')');
    Ok(string::create(&out).value())
}

pub fn create_array_prototype() -> ObjRef {
    let proto = crate::object::create_object(None);
    define_method(proto, "get", array_get, 1);
    define_method(proto, "set", array_set, -1);
    define_method(proto, "push", array_push, 1);
    define_method(proto, "<<", array_push, 1);
    define_method(proto, "each", array_each, 1);
    define_method(proto, "contains?", array_contains, 1);
    define_method(proto, "inspect", array_inspect, 0);
    define_method(proto, "to_string", array_inspect, 0);
    define_property_accessors(proto, "size", Some(array_get_size), None);
    proto
}
