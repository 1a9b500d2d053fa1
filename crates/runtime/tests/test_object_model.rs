//! Object-model behavior through the public dispatch surface: member
//! stability, assignment, property precedence, module inclusion, and the
//! `__make_object__` constructor.

use rime_core::{Value, intern};
use rime_runtime::error::ErrorKind;
use rime_runtime::heap::ObjRef;
use rime_runtime::{dispatch, function, object, process};

fn setup() {
    process::ensure_initialized();
}

#[test]
fn test_member_lookup_is_stable_without_mutation() {
    setup();
    let o = object::create_object(None);
    let key = intern("stable_member");
    object::set_member(o, o.value(), key, Value::integer(3)).unwrap();
    for _ in 0..10 {
        assert_eq!(
            object::get_member(o, o.value(), key).unwrap(),
            Value::integer(3)
        );
    }
}

#[test]
fn test_assignment_then_read() {
    setup();
    let o = object::create_object(None);
    let key = intern("assigned_member");
    dispatch::set_member(o.value(), key, Value::TRUE).unwrap();
    assert_eq!(dispatch::get_member(o.value(), key).unwrap(), Value::TRUE);
}

#[test]
fn test_make_object_and_missing_member_reads_nil() {
    setup();
    // o = __make_object__(); o.x = 5; o.x == 5 and o.y is nil.
    let make = process::get_global(intern("__make_object__")).unwrap();
    let o = dispatch::call(make, Value::UNDEFINED, &[]).unwrap();
    assert!(o.is_object());
    dispatch::set_member(o, intern("x"), Value::integer(5)).unwrap();
    assert_eq!(
        dispatch::get_member(o, intern("x")).unwrap(),
        Value::integer(5)
    );
    assert!(dispatch::get_member(o, intern("y")).unwrap().is_nil());
}

#[test]
fn test_make_object_with_prototype() {
    setup();
    let make = process::get_global(intern("__make_object__")).unwrap();
    let proto = object::create_object(None);
    object::set_member(proto, proto.value(), intern("greeting"), Value::integer(1)).unwrap();
    let o = dispatch::call(make, Value::UNDEFINED, &[proto.value()]).unwrap();
    assert_eq!(
        dispatch::get_member(o, intern("greeting")).unwrap(),
        Value::integer(1)
    );
}

// A property pair backed by a plain member on the receiver. The getter
// and setter run with the *original* receiver as self even though the
// property lives on the prototype.
fn backing_get(_frame: Value, self_value: Value, _it: Value) -> rime_runtime::RtResult<Value> {
    let obj = dispatch::nearest_object(self_value);
    object::get_member(obj, self_value, intern("backing_slot"))
}

fn backing_set(_frame: Value, self_value: Value, it: Value) -> rime_runtime::RtResult<Value> {
    let obj = dispatch::nearest_object(self_value);
    object::set_member_direct(obj, intern("backing_slot"), it)
}

#[test]
fn test_property_precedence_at_depth() {
    setup();
    // Property on a prototype two levels up; reads and writes through the
    // bottom object still route through the accessors, with self bound to
    // the bottom object.
    let top = object::create_object(None);
    function::define_property_accessors(top, "temperature", Some(backing_get), Some(backing_set));
    let middle = object::create_object(Some(top));
    let o = object::create_object(Some(middle));

    object::set_member(o, o.value(), intern("temperature"), Value::integer(21)).unwrap();
    // The setter stored onto `o`, not onto the prototype that owns the
    // property.
    assert_eq!(
        object::get_member(o, o.value(), intern("backing_slot")).unwrap(),
        Value::integer(21)
    );
    assert!(
        object::get_member(top, top.value(), intern("backing_slot"))
            .unwrap()
            .is_nil()
    );
    assert_eq!(
        object::get_member(o, o.value(), intern("temperature")).unwrap(),
        Value::integer(21)
    );
}

#[test]
fn test_read_only_property_rejects_writes_at_depth() {
    setup();
    let proto = object::create_object(None);
    function::define_property_accessors(proto, "constant", Some(backing_get), None);
    let o = object::create_object(Some(proto));
    let err = object::set_member(o, o.value(), intern("constant"), Value::NIL).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PropertyReadOnly);
}

#[test]
fn test_module_inclusion_is_idempotent() {
    setup();
    let o = object::create_object(None);
    let module = object::create_object(None);
    assert!(object::include_module(o, module));
    assert!(!object::include_module(o, module));
}

#[test]
fn test_included_module_lookup_preserves_receiver() {
    setup();
    let o = object::create_object(None);
    let module = object::create_object(None);
    function::define_property_accessors(module, "via_module", Some(backing_get), Some(backing_set));
    object::include_module(o, module);

    // The getter discovered through the module sees `o` as self.
    object::set_member_direct(o, intern("backing_slot"), Value::integer(7)).unwrap();
    assert_eq!(
        object::get_member(o, o.value(), intern("via_module")).unwrap(),
        Value::integer(7)
    );
}

#[test]
fn test_object_prototype_methods_reachable_from_any_object() {
    setup();
    let o = object::create_object(None);
    // `=` and `!=` come from the Object prototype fallback.
    let same = dispatch::call_method(o.value(), intern("="), &[o.value()]).unwrap();
    assert_eq!(same, Value::TRUE);
    let other = object::create_object(None);
    let diff = dispatch::call_method(o.value(), intern("!="), &[other.value()]).unwrap();
    assert_eq!(diff, Value::TRUE);
}

#[test]
fn test_members_property_reflects_lazy_map() {
    setup();
    let o = object::create_object(None);
    // Before the first write there is no members map.
    let members = dispatch::get_member(o.value(), intern("members")).unwrap();
    assert!(members.is_nil());
    dispatch::set_member(o.value(), intern("k"), Value::integer(1)).unwrap();
    let members = dispatch::get_member(o.value(), intern("members")).unwrap();
    assert!(members.is_object());
}

#[test]
fn test_prototype_property_reports_chain() {
    setup();
    let proto = object::create_object(None);
    let o = object::create_object(Some(proto));
    let reported = dispatch::get_member(o.value(), intern("prototype")).unwrap();
    assert_eq!(ObjRef::from_value(reported), Some(proto));
}

#[test]
fn test_instance_eval_binds_self() {
    setup();
    fn read_self_marker(_f: Value, self_value: Value, _it: Value) -> rime_runtime::RtResult<Value> {
        dispatch::get_member(self_value, intern("marker"))
    }
    let o = object::create_object(None);
    dispatch::set_member(o.value(), intern("marker"), Value::integer(99)).unwrap();
    let body = function::create_method(read_self_marker, intern("body"), 0);
    let result = dispatch::call_method(o.value(), intern("instance_eval"), &[body.value()]).unwrap();
    assert_eq!(result, Value::integer(99));
}
