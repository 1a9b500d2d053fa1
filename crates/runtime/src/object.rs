//! Object Model
//!
//! Every heap value is an [`Object`]: a typed payload plus the prototype
//! metadata that drives member lookup. Lookup walks the object's members
//! map, its sorted property table, its included modules, and then the
//! prototype chain; a node with no prototype falls back to the global
//! Object prototype, and the walk terminates after visiting it.
//!
//! The `meta` lock is the per-object reader/writer lock of the collector's
//! mutator contract: it is held only to read or update fields, never across
//! a call that may allocate. Getter/setter invocations and recursive module
//! lookups therefore operate on snapshots taken under the lock.

use std::sync::RwLock;

use rime_core::{Symbol, Value};

use crate::arguments::ArgumentsData;
use crate::error::{RtResult, RuntimeError};
use crate::fiber::FiberData;
use crate::function::{FrameData, FunctionData, define_method, define_property_accessors};
use crate::heap::{ObjRef, heap};
use crate::map::MapData;
use crate::{array, dispatch, map, string, types};

/// A `(name, getter, setter)` property entry. Either accessor may be
/// undefined, making the property write-only or read-only.
#[derive(Debug, Clone, Copy)]
pub struct Property {
    pub name: Symbol,
    pub getter: Value,
    pub setter: Value,
}

/// The prototype-model fields shared by every object.
#[derive(Debug, Default)]
pub struct ObjectMeta {
    /// Next node of the lookup chain; `None` falls back to the global
    /// Object prototype.
    pub prototype: Option<ObjRef>,
    /// Own members, a symbol-keyed map object. Allocated on first write.
    pub members: Option<ObjRef>,
    /// Sorted by symbol id; binary search is always valid.
    pub properties: Vec<Property>,
    /// Modules contributing members/properties to lookup, an array object.
    pub included_modules: Option<ObjRef>,
    /// Diagnostic name, set by the class-construction helper.
    pub name: Option<Symbol>,
}

impl ObjectMeta {
    fn find_property(&self, name: Symbol) -> Option<Property> {
        self.properties
            .binary_search_by_key(&name, |p| p.name)
            .ok()
            .map(|i| self.properties[i])
    }
}

/// Per-type payload of a heap object.
pub enum ObjectKind {
    Plain,
    String(RwLock<String>),
    Array(RwLock<Vec<Value>>),
    Map(RwLock<MapData>),
    Function(FunctionData),
    Frame(FrameData),
    Arguments(RwLock<ArgumentsData>),
    Fiber(FiberData),
}

/// A heap object: typed payload plus prototype metadata.
pub struct Object {
    kind: ObjectKind,
    meta: RwLock<ObjectMeta>,
}

impl Object {
    pub fn new(kind: ObjectKind) -> Object {
        Object {
            kind,
            meta: RwLock::new(ObjectMeta::default()),
        }
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn meta(&self) -> &RwLock<ObjectMeta> {
        &self.meta
    }

    pub fn as_string(&self) -> Option<&RwLock<String>> {
        match &self.kind {
            ObjectKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&RwLock<Vec<Value>>> {
        match &self.kind {
            ObjectKind::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&RwLock<MapData>> {
        match &self.kind {
            ObjectKind::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_frame(&self) -> Option<&FrameData> {
        match &self.kind {
            ObjectKind::Frame(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_arguments(&self) -> Option<&RwLock<ArgumentsData>> {
        match &self.kind {
            ObjectKind::Arguments(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_fiber(&self) -> Option<&FiberData> {
        match &self.kind {
            ObjectKind::Fiber(f) => Some(f),
            _ => None,
        }
    }
}

/// Allocate a plain object with the given prototype.
pub fn create_object(prototype: Option<ObjRef>) -> ObjRef {
    let obj = heap().alloc(Object::new(ObjectKind::Plain));
    if prototype.is_some() {
        obj.meta().write().expect("object meta lock poisoned").prototype = prototype;
    }
    obj
}

/// Allocate an object with a typed payload and no prototype. Creation
/// primitives in the per-type modules wire the type prototype afterwards.
pub fn create_with_kind(kind: ObjectKind) -> ObjRef {
    heap().alloc(Object::new(kind))
}

fn meta_read(obj: ObjRef) -> std::sync::RwLockReadGuard<'static, ObjectMeta> {
    // Safety of the 'static guard: ObjRef derefs to a heap object that
    // lives for the run.
    obj.as_ptr_meta().read().expect("object meta lock poisoned")
}

impl ObjRef {
    fn as_ptr_meta(self) -> &'static RwLock<ObjectMeta> {
        unsafe { &(*self.as_ptr()).meta }
    }
}

/// Member lookup, walking the chain described in the module docs.
///
/// `receiver` stays fixed while the chain is walked so that property
/// getters discovered on a prototype still see the original self. Returns
/// nil when nothing matches.
pub fn get_member(object: ObjRef, receiver: Value, name: Symbol) -> RtResult<Value> {
    let object_proto = types::object_prototype();
    let mut node = object;
    loop {
        // Snapshot under the read lock; nothing below may run with it held.
        let (members, property, modules, prototype) = {
            let meta = meta_read(node);
            (
                meta.members,
                meta.find_property(name),
                meta.included_modules,
                meta.prototype,
            )
        };

        if let Some(members) = members
            && let Some(v) = map::get_opt(members, Value::symbol(name))?
        {
            return Ok(v);
        }

        if let Some(property) = property {
            if property.getter.is_undefined() {
                return Err(RuntimeError::property_write_only(name));
            }
            return dispatch::call(property.getter, receiver, &[]);
        }

        if let Some(modules) = modules {
            // First non-nil wins; the original receiver stays bound.
            for module in array::snapshot(modules) {
                if let Some(module) = ObjRef::from_value(module) {
                    let v = get_member(module, receiver, name)?;
                    if !v.is_nil() && !v.is_undefined() {
                        return Ok(v);
                    }
                }
            }
        }

        if node == object_proto {
            return Ok(Value::NIL);
        }
        node = prototype.unwrap_or(object_proto);
    }
}

/// Member assignment. Property setters anywhere along the prototype chain
/// intercept the write; otherwise the value lands in the object's own
/// members map.
pub fn set_member(object: ObjRef, receiver: Value, name: Symbol, value: Value) -> RtResult<Value> {
    let object_proto = types::object_prototype();
    let mut node = object;
    loop {
        let (property, prototype) = {
            let meta = meta_read(node);
            (meta.find_property(name), meta.prototype)
        };
        if let Some(property) = property {
            if property.setter.is_undefined() {
                return Err(RuntimeError::property_read_only(name));
            }
            return dispatch::call(property.setter, receiver, &[value]);
        }
        if node == object_proto {
            break;
        }
        node = prototype.unwrap_or(object_proto);
    }

    store_member(object, name, value)?;
    Ok(value)
}

/// Store into the members map directly, bypassing property setters. Used
/// while bootstrapping prototypes (whose own chain is not walkable yet)
/// and by the member-store tail of [`set_member`].
pub fn set_member_direct(object: ObjRef, name: Symbol, value: Value) -> RtResult<Value> {
    store_member(object, name, value)?;
    Ok(value)
}

fn store_member(object: ObjRef, name: Symbol, value: Value) -> RtResult<()> {
    // The members map is allocated lazily. Check under the lock, drop it,
    // allocate, re-acquire for writing, and install only if still missing:
    // allocation is not permitted while the lock is held, and somebody may
    // have installed a map in the window.
    let members = {
        let meta = meta_read(object);
        meta.members
    };
    let members = match members {
        Some(m) => m,
        None => {
            let fresh = map::create_members_map();
            let mut meta = object
                .as_ptr_meta()
                .write()
                .expect("object meta lock poisoned");
            *meta.members.get_or_insert(fresh)
        }
    };
    map::set(members, Value::symbol(name), value)?;
    Ok(())
}

/// Insert or replace a property, keeping the table sorted by symbol id.
pub fn define_property(object: ObjRef, name: Symbol, getter: Value, setter: Value) {
    let mut meta = object
        .as_ptr_meta()
        .write()
        .expect("object meta lock poisoned");
    match meta.properties.binary_search_by_key(&name, |p| p.name) {
        Ok(i) => {
            meta.properties[i].getter = getter;
            meta.properties[i].setter = setter;
        }
        Err(i) => meta.properties.insert(
            i,
            Property {
                name,
                getter,
                setter,
            },
        ),
    }
}

/// Append a module to the inclusion list. Returns false (and does nothing)
/// when the module is already included.
pub fn include_module(object: ObjRef, module: ObjRef) -> bool {
    let list = {
        let meta = meta_read(object);
        meta.included_modules
    };
    let list = match list {
        Some(l) => l,
        None => {
            let fresh = array::create();
            let mut meta = object
                .as_ptr_meta()
                .write()
                .expect("object meta lock poisoned");
            *meta.included_modules.get_or_insert(fresh)
        }
    };
    if array::contains(list, module.value()) {
        return false;
    }
    array::push(list, module.value());
    true
}

/// Diagnostic name accessor used by the class helper and inspect.
pub fn set_name(object: ObjRef, name: Symbol) {
    object
        .as_ptr_meta()
        .write()
        .expect("object meta lock poisoned")
        .name = Some(name);
}

pub fn name_of(object: ObjRef) -> Option<Symbol> {
    meta_read(object).name
}

// ---------------------------------------------------------------------------
// Object prototype

fn object_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(string::create(&format!("[Object@0x{:x}]", self_value.bits())).value())
}

fn object_instance_eval(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    dispatch::call(it, self_value, &[])
}

fn object_include(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    let target = ObjRef::from_value(self_value)
        .ok_or_else(|| RuntimeError::wrong_type("an object to include a module into"))?;
    let module =
        ObjRef::from_value(it).ok_or_else(|| RuntimeError::wrong_type("an object as module"))?;
    Ok(Value::boolean(include_module(target, module)))
}

fn object_equals(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    Ok(Value::boolean(self_value == it))
}

fn object_not_equals(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    Ok(Value::boolean(self_value != it))
}

fn object_compare(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    let ordering = self_value.bits().cmp(&it.bits());
    Ok(Value::integer(ordering as i64))
}

fn object_get_members(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    let obj = dispatch::nearest_object(self_value);
    let members = meta_read(obj).members;
    Ok(members.map(|m| m.value()).unwrap_or(Value::NIL))
}

fn object_get_prototype(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    match ObjRef::from_value(self_value) {
        Some(obj) => {
            let proto = meta_read(obj).prototype;
            Ok(proto.unwrap_or_else(types::object_prototype).value())
        }
        None => Ok(dispatch::nearest_object(self_value).value()),
    }
}

/// Build the global Object prototype: the terminal node of every lookup
/// chain.
pub fn create_object_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "inspect", object_inspect, 0);
    define_method(proto, "to_string", object_inspect, 0);
    define_method(proto, "instance_eval", object_instance_eval, 1);
    define_method(proto, "include", object_include, 1);
    define_method(proto, "=", object_equals, 1);
    define_method(proto, "!=", object_not_equals, 1);
    define_method(proto, "<=>", object_compare, 1);
    define_property_accessors(proto, "members", Some(object_get_members), None);
    define_property_accessors(proto, "prototype", Some(object_get_prototype), None);
    proto
}

/// Global constructor behind `__make_object__`: prototype from `it` when
/// given, the Object prototype fallback otherwise.
pub fn make_object(it: Value) -> RtResult<Value> {
    if it.is_undefined() || it.is_nil() {
        return Ok(create_object(None).value());
    }
    let proto = ObjRef::from_value(it)
        .ok_or_else(|| RuntimeError::wrong_type("an object usable as prototype"))?;
    Ok(create_object(Some(proto)).value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rime_core::intern;

    fn sym(s: &str) -> Symbol {
        intern(s)
    }

    #[test]
    fn test_member_set_then_get() {
        let obj = create_object(None);
        let name = sym("answer");
        set_member(obj, obj.value(), name, Value::integer(42)).unwrap();
        let got = get_member(obj, obj.value(), name).unwrap();
        assert_eq!(got, Value::integer(42));
    }

    #[test]
    fn test_missing_member_reads_nil() {
        let obj = create_object(None);
        let got = get_member(obj, obj.value(), sym("no_such_member")).unwrap();
        assert!(got.is_nil());
    }

    #[test]
    fn test_members_resolve_through_prototype() {
        let proto = create_object(None);
        set_member(proto, proto.value(), sym("inherited"), Value::integer(1)).unwrap();
        let obj = create_object(Some(proto));
        let got = get_member(obj, obj.value(), sym("inherited")).unwrap();
        assert_eq!(got, Value::integer(1));
        // Writes land on the object itself, not the prototype.
        set_member(obj, obj.value(), sym("inherited"), Value::integer(2)).unwrap();
        assert_eq!(
            get_member(proto, proto.value(), sym("inherited")).unwrap(),
            Value::integer(1)
        );
        assert_eq!(
            get_member(obj, obj.value(), sym("inherited")).unwrap(),
            Value::integer(2)
        );
    }

    #[test]
    fn test_property_table_stays_sorted() {
        let obj = create_object(None);
        // Interning order deliberately differs from insertion order.
        let names = [sym("prop_c"), sym("prop_a"), sym("prop_b")];
        for name in names {
            define_property(obj, name, Value::UNDEFINED, Value::UNDEFINED);
        }
        let meta = obj.meta().read().unwrap();
        for pair in meta.properties.windows(2) {
            assert!(pair[0].name < pair[1].name);
        }
    }

    #[test]
    fn test_include_module_is_idempotent() {
        let obj = create_object(None);
        let module = create_object(None);
        assert!(include_module(obj, module));
        assert!(!include_module(obj, module));
    }

    #[test]
    fn test_included_module_contributes_members() {
        let obj = create_object(None);
        let module = create_object(None);
        set_member(module, module.value(), sym("from_module"), Value::integer(9)).unwrap();
        include_module(obj, module);
        assert_eq!(
            get_member(obj, obj.value(), sym("from_module")).unwrap(),
            Value::integer(9)
        );
    }

    #[test]
    fn test_write_only_property_read_fails() {
        let obj = create_object(None);
        let name = sym("write_only_prop");
        // Neither accessor defined: reads report write-only, writes report
        // read-only, and nothing falls through to the members map.
        define_property(obj, name, Value::UNDEFINED, Value::UNDEFINED);
        let err = get_member(obj, obj.value(), name).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PropertyWriteOnly);
        let err = set_member(obj, obj.value(), name, Value::NIL).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PropertyReadOnly);
    }
}
