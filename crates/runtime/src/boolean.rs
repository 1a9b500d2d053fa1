//! Boolean prototype, shared by true and false

use rime_core::Value;

use crate::error::RtResult;
use crate::function::define_method;
use crate::heap::ObjRef;
use crate::object::create_object;
use crate::string;

fn boolean_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(string::create(if self_value.is_truthy() { "true" } else { "false" }).value())
}

pub fn create_boolean_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "inspect", boolean_inspect, 0);
    define_method(proto, "to_string", boolean_inspect, 0);
    proto
}
