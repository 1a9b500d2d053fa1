//! Symbol prototype
//!
//! Dispatch for symbol immediates; the table itself lives in rime-core.

use rime_core::{Value, symbol_name};

use crate::error::{RtResult, RuntimeError};
use crate::function::define_method;
use crate::heap::ObjRef;
use crate::object::create_object;
use crate::string;

fn resolve(self_value: Value) -> RtResult<&'static str> {
    if !self_value.is_symbol() {
        return Err(RuntimeError::wrong_type("a symbol"));
    }
    let sym = self_value.as_symbol();
    symbol_name(sym).map_err(|e| RuntimeError::unknown_symbol(e.id))
}

fn symbol_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(string::create(&format!("#{}", resolve(self_value)?)).value())
}

fn symbol_to_string(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(string::create(resolve(self_value)?).value())
}

pub fn create_symbol_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "inspect", symbol_inspect, 0);
    define_method(proto, "to_string", symbol_to_string, 0);
    proto
}
