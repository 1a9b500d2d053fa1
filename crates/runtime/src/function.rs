//! Functions, Descriptors, and Call Frames
//!
//! A function descriptor is immutable once the backend emits it; a
//! function couples a descriptor with the frame it was instantiated in
//! (its definition context, the root of the upvalue chain). A call frame
//! is itself a heap object so that closures created inside it keep its
//! locals reachable and observable after the call returns.
//!
//! Compiled bodies receive `(frame, self, it)` and are responsible for the
//! frame push/pop discipline (see the vm module); natives built by
//! [`create_method`] with fixed arity <= 1 run without a frame of their
//! own, reusing the definition context.

use std::sync::{Arc, Mutex, RwLock};

use rime_core::{Symbol, Value, intern, symbol_name};

use crate::arguments;
use crate::error::{RtResult, RuntimeError};
use crate::heap::ObjRef;
use crate::object::{self, ObjectKind, create_object, create_with_kind};
use crate::{map, string, types};

/// The signature every compiled or native body conforms to. The first
/// parameter is the call frame (undefined when the callee runs without
/// one).
pub type EntryPoint = fn(Value, Value, Value) -> RtResult<Value>;

/// Placeholder name for the unnamed parameters of native methods. The id
/// sorts after every real symbol, so named arguments can never bind to a
/// native's positional parameters.
pub const ANONYMOUS_PARAM: Symbol = Symbol::from_id(u64::MAX);

/// A captured non-local reference: go `level` definition contexts outward,
/// then read local slot `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueRef {
    pub level: u32,
    pub index: u32,
}

/// Immutable description of a callable body, emitted by the backend.
pub struct FunctionDescriptor {
    pub entry: EntryPoint,
    pub name: Symbol,
    /// Declared parameter names, sorted by symbol id.
    pub param_names: Vec<Symbol>,
    /// Post-sort position of the first declared parameter: the slot the
    /// implicit `it` argument aliases.
    pub it_index: usize,
    /// Locals, parameters first (in sorted order) then body locals.
    pub local_names: Vec<Symbol>,
    /// False only for natives with fixed arity <= 1, which run on the
    /// definition context instead of a fresh frame.
    pub needs_context: bool,
    /// Captured references resolved by `get_local`/`set_local`.
    pub upvalues: Vec<UpvalueRef>,
}

impl FunctionDescriptor {
    /// Descriptor for a compiled function. `declared_params` is in source
    /// order; it is sorted here and `it_index` records where the first
    /// declared parameter lands.
    pub fn scripted(
        name: &str,
        entry: EntryPoint,
        declared_params: &[&str],
        body_locals: &[&str],
    ) -> Arc<FunctionDescriptor> {
        Self::scripted_with_upvalues(name, entry, declared_params, body_locals, Vec::new())
    }

    /// As [`FunctionDescriptor::scripted`], carrying the upvalue-reference
    /// table the backend computed for captured names.
    pub fn scripted_with_upvalues(
        name: &str,
        entry: EntryPoint,
        declared_params: &[&str],
        body_locals: &[&str],
        upvalues: Vec<UpvalueRef>,
    ) -> Arc<FunctionDescriptor> {
        let declared: Vec<Symbol> = declared_params.iter().map(|p| intern(p)).collect();
        let mut param_names = declared.clone();
        param_names.sort();
        let it_index = declared
            .first()
            .and_then(|first| param_names.iter().position(|p| p == first))
            .unwrap_or(0);
        let mut local_names = param_names.clone();
        local_names.extend(body_locals.iter().map(|l| intern(l)));
        Arc::new(FunctionDescriptor {
            entry,
            name: intern(name),
            param_names,
            it_index,
            local_names,
            needs_context: true,
            upvalues,
        })
    }

    /// Descriptor for a native method. Negative arity means variadic.
    pub fn native(name: Symbol, entry: EntryPoint, arity: i32) -> Arc<FunctionDescriptor> {
        let num_params = arity.max(0) as usize;
        let param_names = vec![ANONYMOUS_PARAM; num_params];
        Arc::new(FunctionDescriptor {
            entry,
            name,
            param_names: param_names.clone(),
            it_index: 0,
            local_names: param_names,
            needs_context: arity < 0 || arity > 1,
            upvalues: Vec::new(),
        })
    }

    pub fn num_params(&self) -> usize {
        self.param_names.len()
    }

    pub fn num_locals(&self) -> usize {
        self.local_names.len()
    }
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &symbol_name(self.name).unwrap_or("<unknown>"))
            .field("params", &self.param_names.len())
            .field("locals", &self.local_names.len())
            .field("needs_context", &self.needs_context)
            .finish()
    }
}

/// Payload of a function object.
pub struct FunctionData {
    pub descriptor: Arc<FunctionDescriptor>,
    pub definition_context: Option<ObjRef>,
}

/// Payload of a call-frame object.
pub struct FrameData {
    pub function: ObjRef,
    /// Caller link, maintained by the fiber frame chain.
    pub caller: Mutex<Option<ObjRef>>,
    pub self_value: Mutex<Value>,
    pub module: Mutex<Option<ObjRef>>,
    pub arguments: ObjRef,
    pub locals: RwLock<Vec<Value>>,
}

/// Instantiate a function value from a descriptor and the frame it closes
/// over (`None` for top-level and native functions).
pub fn create_function(
    descriptor: Arc<FunctionDescriptor>,
    definition_context: Option<ObjRef>,
) -> ObjRef {
    let obj = create_with_kind(ObjectKind::Function(FunctionData {
        descriptor,
        definition_context,
    }));
    if let Some(proto) = types::function_prototype_if_ready() {
        obj.meta().write().expect("object meta lock poisoned").prototype = Some(proto);
    }
    obj
}

/// Build a native method. Negative arity means variadic (the body reads
/// the reified arguments from its frame).
pub fn create_method(entry: EntryPoint, name: Symbol, arity: i32) -> ObjRef {
    create_function(FunctionDescriptor::native(name, entry, arity), None)
}

/// Define a native method as a member on a prototype.
pub fn define_method(proto: ObjRef, name: &str, entry: EntryPoint, arity: i32) {
    let sym = intern(name);
    let method = create_method(entry, sym, arity);
    object::set_member_direct(proto, sym, method.value()).expect("prototype member store");
}

/// Define a property whose accessors are native entry points.
pub fn define_property_accessors(
    proto: ObjRef,
    name: &str,
    getter: Option<EntryPoint>,
    setter: Option<EntryPoint>,
) {
    let sym = intern(name);
    let getter = getter
        .map(|g| create_method(g, sym, 0).value())
        .unwrap_or(Value::UNDEFINED);
    let setter = setter
        .map(|s| create_method(s, sym, 1).value())
        .unwrap_or(Value::UNDEFINED);
    object::define_property(proto, sym, getter, setter);
}

fn frame_data(frame: ObjRef) -> &'static FrameData {
    unsafe { &*frame.as_ptr() }
        .as_frame()
        .expect("not a frame object")
}

fn function_data(function: ObjRef) -> RtResult<&'static FunctionData> {
    unsafe { &*function.as_ptr() }
        .as_function()
        .ok_or_else(|| RuntimeError::wrong_type("a function"))
}

/// Build the call frame for an invocation of `callee`. Returns the frame
/// value, or the callee's definition context when the descriptor does not
/// need one. `names` are the caller's named arguments (sorted by symbol
/// id), parallel to the first `names.len()` entries of `values`.
pub fn create_call_frame(
    callee: ObjRef,
    caller: Option<ObjRef>,
    names: &[Symbol],
    values: &[Value],
) -> RtResult<Value> {
    create_call_frame_in_module(callee, caller, names, values, None)
}

/// As [`create_call_frame`], with an explicit owning module. Module
/// execution enters top-level code this way; everything else inherits the
/// module of the definition context.
pub fn create_call_frame_in_module(
    callee: ObjRef,
    caller: Option<ObjRef>,
    names: &[Symbol],
    values: &[Value],
    module: Option<ObjRef>,
) -> RtResult<Value> {
    let f = function_data(callee)?;
    if !f.descriptor.needs_context {
        return Ok(f
            .definition_context
            .map(|c| c.value())
            .unwrap_or(Value::UNDEFINED));
    }

    let bound = arguments::bind(&f.descriptor, names, values);
    let num_locals = f.descriptor.num_locals();
    let mut locals = vec![Value::UNDEFINED; num_locals];
    let copied = f.descriptor.num_params().min(num_locals);
    locals[..copied].copy_from_slice(&bound.slots[..copied]);

    let module = module.or_else(|| {
        f.definition_context
            .and_then(|ctx| *frame_data(ctx).module.lock().expect("frame lock poisoned"))
    });
    let arguments_obj = arguments::create_arguments_object(bound);

    let frame = create_with_kind(ObjectKind::Frame(FrameData {
        function: callee,
        caller: Mutex::new(caller),
        self_value: Mutex::new(Value::UNDEFINED),
        module: Mutex::new(module),
        arguments: arguments_obj,
        locals: RwLock::new(locals),
    }));
    if let Some(proto) = types::frame_prototype_if_ready() {
        frame.meta().write().expect("object meta lock poisoned").prototype = Some(proto);
    }
    Ok(frame.value())
}

/// Invoke a function on a prepared context. An undefined `self` inherits
/// the definition context's self.
pub fn function_call(
    function: ObjRef,
    context: Value,
    mut self_value: Value,
    it: Value,
) -> RtResult<Value> {
    let f = function_data(function)?;
    if self_value.is_undefined()
        && let Some(ctx) = f.definition_context
    {
        self_value = *frame_data(ctx)
            .self_value
            .lock()
            .expect("frame lock poisoned");
    }
    if f.descriptor.needs_context
        && let Some(frame) = ObjRef::from_value(context)
        && frame.as_frame().is_some()
    {
        *frame_data(frame)
            .self_value
            .lock()
            .expect("frame lock poisoned") = self_value;
    }
    (f.descriptor.entry)(context, self_value, it)
}

/// Resolve a value to a callable function. Follows `__call__` up to one
/// object level; when resolution goes through `__call__`, self rebinds to
/// the original functor object.
pub fn value_to_function(value: Value) -> RtResult<(ObjRef, Option<Value>)> {
    let obj = ObjRef::from_value(value).ok_or_else(RuntimeError::not_callable)?;
    if obj.as_function().is_some() {
        return Ok((obj, None));
    }
    let call_sym = intern("__call__");
    let member = object::get_member(obj, value, call_sym)?;
    let function = ObjRef::from_value(member)
        .filter(|f| f.as_function().is_some())
        .ok_or_else(RuntimeError::not_callable)?;
    Ok((function, Some(value)))
}

/// Read a local through the definition-context chain: `level` steps
/// outward, then slot `index`.
///
/// # Panics
/// Panics when the reference does not match the descriptor chain; such a
/// reference is a backend bug, not a script error.
pub fn get_local(frame: ObjRef, level: u32, index: u32) -> Value {
    let ctx = walk_contexts(frame, level);
    let locals = frame_data(ctx).locals.read().expect("frame lock poisoned");
    *locals
        .get(index as usize)
        .expect("local index out of range for descriptor")
}

/// Write a local through the definition-context chain.
///
/// # Panics
/// As [`get_local`].
pub fn set_local(frame: ObjRef, level: u32, index: u32, value: Value) -> Value {
    let ctx = walk_contexts(frame, level);
    let mut locals = frame_data(ctx).locals.write().expect("frame lock poisoned");
    let slot = locals
        .get_mut(index as usize)
        .expect("local index out of range for descriptor");
    *slot = value;
    value
}

fn walk_contexts(frame: ObjRef, level: u32) -> ObjRef {
    let mut ctx = frame;
    for _ in 0..level {
        let function = frame_data(ctx).function;
        ctx = function_data(function)
            .expect("frame holds a function")
            .definition_context
            .expect("upvalue level exceeds definition contexts");
    }
    ctx
}

/// Merge a splatted value into a callee's reified arguments: array
/// elements fill unset parameter slots then append positionally, map
/// pairs split into named and positional extras, and another arguments
/// object merges wholesale. Anything else is ignored with a warning, as
/// splatting it is meaningless rather than fatal.
pub fn merge_splat_arguments(frame: Value, splat: Value) {
    let Some(frame) = ObjRef::from_value(frame).filter(|f| f.as_frame().is_some()) else {
        return;
    };
    let args = frame_data(frame).arguments;
    match ObjRef::from_value(splat) {
        Some(obj) if obj.as_array().is_some() => {
            arguments::append_values(args, &crate::array::snapshot(obj));
        }
        Some(obj) if obj.as_map().is_some() => {
            arguments::append_map(args, &map::pairs(obj));
        }
        Some(obj) if obj.as_arguments().is_some() => {
            arguments::merge(args, obj);
        }
        _ => {
            tracing::warn!(value = ?splat, "splat argument is not an array, map, or arguments");
            return;
        }
    }
    sync_locals_from_arguments(frame);
}

/// Re-copy argument slots into any still-unset locals. Splat merging can
/// fill parameter slots after the frame was built.
pub fn sync_locals_from_arguments(frame: ObjRef) {
    let data = frame_data(frame);
    let slots = {
        let args = unsafe { &*data.arguments.as_ptr() }
            .as_arguments()
            .expect("frame arguments object")
            .read()
            .expect("arguments lock poisoned");
        args.slots.clone()
    };
    let mut locals = data.locals.write().expect("frame lock poisoned");
    for (local, slot) in locals.iter_mut().zip(slots) {
        if local.is_undefined() {
            *local = slot;
        }
    }
}

/// Read the nth reified argument of a frame (undefined when absent or the
/// callee runs without a frame).
pub fn frame_argument(frame: Value, index: usize) -> Value {
    match frame_arguments(frame) {
        Some(args) => {
            let data = unsafe { &*args.as_ptr() }
                .as_arguments()
                .expect("frame arguments object")
                .read()
                .expect("arguments lock poisoned");
            data.slots.get(index).copied().unwrap_or(Value::UNDEFINED)
        }
        None => Value::UNDEFINED,
    }
}

/// The frame's reified arguments object, when the value is a frame.
pub fn frame_arguments(frame: Value) -> Option<ObjRef> {
    ObjRef::from_value(frame)
        .filter(|f| f.as_frame().is_some())
        .map(|f| frame_data(f).arguments)
}

// ---------------------------------------------------------------------------
// Function and frame prototypes

fn function_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    let text = match ObjRef::from_value(self_value).and_then(|o| {
        o.as_function()
            .map(|f| symbol_name(f.descriptor.name).unwrap_or("<unknown>"))
    }) {
        Some(name) => format!("[Function@0x{:x}({})]", self_value.bits(), name),
        None => format!("[Function@0x{:x}]", self_value.bits()),
    };
    Ok(string::create(&text).value())
}

fn function_name(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    match ObjRef::from_value(self_value).and_then(|o| o.as_function().map(|f| f.descriptor.name)) {
        Some(name) => Ok(Value::symbol(name)),
        None => Ok(Value::NIL),
    }
}

pub fn create_function_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "inspect", function_inspect, 0);
    define_method(proto, "to_string", function_inspect, 0);
    define_property_accessors(proto, "name", Some(function_name), None);
    proto
}

fn expect_frame(value: Value) -> RtResult<ObjRef> {
    ObjRef::from_value(value)
        .filter(|o| o.as_frame().is_some())
        .ok_or_else(|| RuntimeError::wrong_type("a call frame"))
}

fn frame_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    let frame = expect_frame(self_value)?;
    let data = frame_data(frame);
    let function = function_data(data.function)?;
    Ok(string::create(&format!(
        "[Frame@0x{:x} function:{}]",
        self_value.bits(),
        symbol_name(function.descriptor.name).unwrap_or("<unknown>"),
    ))
    .value())
}

fn frame_get_arguments(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(frame_data(expect_frame(self_value)?).arguments.value())
}

fn frame_get_locals(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    let frame = expect_frame(self_value)?;
    let data = frame_data(frame);
    let function = function_data(data.function)?;
    let out = map::create_with_immediate_keys_and_insertion_order();
    let locals = data.locals.read().expect("frame lock poisoned").clone();
    for (name, value) in function.descriptor.local_names.iter().zip(locals) {
        map::set(out, Value::symbol(*name), value)?;
    }
    Ok(out.value())
}

pub fn create_frame_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "inspect", frame_inspect, 0);
    define_property_accessors(proto, "arguments", Some(frame_get_arguments), None);
    define_property_accessors(proto, "locals", Some(frame_get_locals), None);
    proto
}

#[cfg(test)]
mod tests {
    use super::*;

    fn return_it(_frame: Value, _self: Value, it: Value) -> RtResult<Value> {
        Ok(it)
    }

    #[test]
    fn test_native_descriptor_context_rule() {
        // Fixed arity <= 1 runs without a frame; variadic and multi-arg
        // methods need one.
        assert!(!FunctionDescriptor::native(intern("f0"), return_it, 0).needs_context);
        assert!(!FunctionDescriptor::native(intern("f1"), return_it, 1).needs_context);
        assert!(FunctionDescriptor::native(intern("f2"), return_it, 2).needs_context);
        assert!(FunctionDescriptor::native(intern("fv"), return_it, -1).needs_context);
    }

    #[test]
    fn test_scripted_descriptor_sorts_params() {
        let desc = FunctionDescriptor::scripted("f", return_it, &["zeta", "alpha"], &[]);
        assert!(desc.param_names[0] < desc.param_names[1]);
        // `it` aliases the first *declared* parameter, wherever sorting
        // moved it.
        assert_eq!(desc.param_names[desc.it_index], intern("zeta"));
    }

    #[test]
    fn test_locals_are_params_then_body_locals() {
        let desc = FunctionDescriptor::scripted("f", return_it, &["b", "a"], &["tmp"]);
        assert_eq!(desc.num_locals(), 3);
        assert_eq!(desc.local_names[2], intern("tmp"));
    }

    #[test]
    fn test_frame_for_no_context_native_is_definition_context() {
        let method = create_method(return_it, intern("identity"), 1);
        let frame = create_call_frame(method, None, &[], &[Value::integer(1)]).unwrap();
        assert!(frame.is_undefined());
    }
}
