//! Nil prototype

use rime_core::Value;

use crate::error::RtResult;
use crate::function::define_method;
use crate::heap::ObjRef;
use crate::object::create_object;
use crate::string;

fn nil_inspect(_frame: Value, _self: Value, _it: Value) -> RtResult<Value> {
    Ok(string::create("nil").value())
}

fn nil_to_string(_frame: Value, _self: Value, _it: Value) -> RtResult<Value> {
    Ok(string::create("").value())
}

pub fn create_nil_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "inspect", nil_inspect, 0);
    define_method(proto, "to_string", nil_to_string, 0);
    proto
}
