//! Global Module Contents
//!
//! The members every program starts with: the `Rime` interface object, the
//! core constructor functions, module loading, and the `__*_prototype__`
//! bindings that let prelude code extend the built-in types.

use rime_core::{Value, intern};

use crate::error::RtResult;
use crate::function::{
    EntryPoint, create_method, define_property_accessors, frame_arguments,
};
use crate::heap::ObjRef;
use crate::object::{create_object, make_object, set_member_direct};
use crate::{arguments, array, dispatch, module, process, string, types};

/// Install the default globals into the global module. Called once, while
/// the module object is being bootstrapped, so members are stored
/// directly.
pub fn install(global: ObjRef) {
    let registry = types::registry();

    set(global, "Rime", interface_object().value());

    define_global(global, "puts", global_puts, -1);
    define_global(global, "@", global_make_array, -1);
    define_global(global, "__make_object__", global_make_object, -1);
    define_global(global, "import", global_import, 1);
    define_global(global, "load", global_load, 1);
    define_global(global, "require", global_require, 1);

    set(global, "__integer_prototype__", registry.integer.value());
    set(global, "__nil_prototype__", registry.nil.value());
    set(global, "__boolean_prototype__", registry.boolean.value());
    set(global, "__symbol_prototype__", registry.symbol.value());
    set(global, "__float_prototype__", registry.float.value());
    set(global, "__object_prototype__", registry.object.value());
    set(global, "__string_prototype__", registry.string.value());
    set(global, "__array_prototype__", registry.array.value());
    set(global, "__map_prototype__", registry.map.value());
    set(global, "__function_prototype__", registry.function.value());
    set(global, "__frame_prototype__", registry.frame.value());
    set(global, "__arguments_prototype__", registry.arguments.value());
    set(global, "__fiber_prototype__", registry.fiber.value());
}

/// The `Rime` object: what scripts can ask about the runtime itself.
fn interface_object() -> ObjRef {
    let rime = create_object(None);
    set(rime, "version", string::create(&process::version()).value());
    define_property_accessors(rime, "load_paths", Some(get_load_paths), None);
    rime
}

fn set(object: ObjRef, name: &str, value: Value) {
    set_member_direct(object, intern(name), value).expect("global member store");
}

fn define_global(global: ObjRef, name: &str, entry: EntryPoint, arity: i32) {
    let sym = intern(name);
    set_member_direct(global, sym, create_method(entry, sym, arity).value())
        .expect("global member store");
}

fn get_load_paths(_frame: Value, _self: Value, _it: Value) -> RtResult<Value> {
    Ok(module::load_paths().value())
}

fn frame_slots(frame: Value) -> Vec<Value> {
    frame_arguments(frame)
        .map(|args| {
            arguments::snapshot_pairs(args)
                .into_iter()
                .map(|(_, v)| v)
                .collect()
        })
        .unwrap_or_default()
}

fn global_puts(frame: Value, _self: Value, _it: Value) -> RtResult<Value> {
    let mut out = String::new();
    for value in frame_slots(frame) {
        out.push_str(&dispatch::to_display_string(value)?);
    }
    println!("{out}");
    Ok(Value::NIL)
}

fn global_make_array(frame: Value, _self: Value, _it: Value) -> RtResult<Value> {
    Ok(array::create_from_slice(&frame_slots(frame)).value())
}

fn global_make_object(_frame: Value, _self: Value, it: Value) -> RtResult<Value> {
    make_object(it)
}

fn spec_string(it: Value) -> RtResult<String> {
    string::expect_string(it).map(string::snapshot)
}

fn global_import(_frame: Value, _self: Value, it: Value) -> RtResult<Value> {
    module::import(&spec_string(it)?)
}

fn global_load(_frame: Value, _self: Value, it: Value) -> RtResult<Value> {
    module::load(&spec_string(it)?)
}

fn global_require(_frame: Value, _self: Value, it: Value) -> RtResult<Value> {
    module::require(&spec_string(it)?)
}
