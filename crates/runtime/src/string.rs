//! String objects
//!
//! UTF-8 strings on the heap. The full formatting layer lives outside the
//! core; what is here is what the core itself needs: creation, snapshots
//! for diagnostics and `puts`, concatenation, and the prototype methods.

use std::sync::RwLock;

use rime_core::Value;

use crate::error::{RtResult, RuntimeError};
use crate::function::{define_method, define_property_accessors};
use crate::heap::ObjRef;
use crate::object::{ObjectKind, create_object, create_with_kind};
use crate::types;

/// Allocate a string object.
pub fn create(text: &str) -> ObjRef {
    let obj = create_with_kind(ObjectKind::String(RwLock::new(text.to_owned())));
    if let Some(proto) = types::string_prototype_if_ready() {
        obj.meta().write().expect("object meta lock poisoned").prototype = Some(proto);
    }
    obj
}

fn storage(string: ObjRef) -> &'static RwLock<String> {
    unsafe { &*string.as_ptr() }
        .as_string()
        .expect("not a string object")
}

/// Owned copy of the contents.
pub fn snapshot(string: ObjRef) -> String {
    storage(string).read().expect("string lock poisoned").clone()
}

pub fn len(string: ObjRef) -> usize {
    storage(string)
        .read()
        .expect("string lock poisoned")
        .chars()
        .count()
}

/// Expect a string object, as the dispatch surface for wrong receivers.
pub fn expect_string(value: Value) -> RtResult<ObjRef> {
    ObjRef::from_value(value)
        .filter(|o| o.as_string().is_some())
        .ok_or_else(|| RuntimeError::wrong_type("a string"))
}

// ---------------------------------------------------------------------------
// String prototype

fn string_to_string(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    expect_string(self_value)?;
    Ok(self_value)
}

fn string_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    let text = snapshot(expect_string(self_value)?);
    Ok(create(&format!("\"{text}\"")).value())
}

fn string_concat(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    let mut text = snapshot(expect_string(self_value)?);
    text.push_str(&crate::dispatch::to_display_string(it)?);
    Ok(create(&text).value())
}

fn string_get_size(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(Value::integer(len(expect_string(self_value)?) as i64))
}

pub fn create_string_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "to_string", string_to_string, 0);
    define_method(proto, "inspect", string_inspect, 0);
    define_method(proto, "+", string_concat, 1);
    define_property_accessors(proto, "size", Some(string_get_size), None);
    proto
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_snapshot() {
        let s = create("hoarfrost");
        assert_eq!(snapshot(s), "hoarfrost");
        assert_eq!(len(s), 9);
    }

    #[test]
    fn test_len_counts_chars_not_bytes() {
        let s = create("søen");
        assert_eq!(len(s), 4);
    }

    #[test]
    fn test_expect_string_rejects_other_kinds() {
        assert!(expect_string(Value::integer(1)).is_err());
        assert!(expect_string(Value::NIL).is_err());
    }
}
