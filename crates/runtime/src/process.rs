//! Per-Process State & Host Embedding API
//!
//! One runtime per process: the backend installed by `init`, the global
//! module, and teardown. Everything here is one-shot initialised and
//! reachable from any thread or fiber.
//!
//! `init` must be called before anything that compiles source; the object
//! model and fibers bootstrap themselves lazily and work without it.

use std::sync::{Once, OnceLock};

use rime_core::{Symbol, Value, intern};

use crate::error::{RtResult, RuntimeError};
use crate::function::{create_call_frame_in_module, create_function, function_call};
use crate::heap::{ObjRef, heap};
use crate::object::{self, create_object};
use crate::vm::Backend;
use crate::{dispatch, fiber, globals, types};

static BACKEND: OnceLock<Box<dyn Backend>> = OnceLock::new();
static GLOBAL_MODULE: OnceLock<ObjRef> = OnceLock::new();
static GLOBALS_INIT: Once = Once::new();

/// Initialise the process: configure the scheduler, build the type
/// prototypes and global module, bootstrap this thread's main fiber, and
/// install the compiler backend. Idempotent; the first backend wins.
pub fn init(backend: Box<dyn Backend>) {
    fiber::configure_scheduler();
    types::registry();
    let name = backend.name().to_owned();
    if BACKEND.set(backend).is_err() {
        tracing::warn!("process already initialised; backend unchanged");
    } else {
        tracing::info!(backend = name, "runtime initialised");
    }
    global_module();
    fiber::current_fiber();
}

/// Initialise with the null backend when nothing is installed yet. Test
/// harnesses and hosts that never compile source use this.
pub fn ensure_initialized() {
    if BACKEND.get().is_none() {
        init(Box::new(crate::vm::NullBackend));
    } else {
        global_module();
    }
}

/// The installed backend, or a compile error when `init` has not run.
pub fn backend() -> RtResult<&'static dyn Backend> {
    BACKEND
        .get()
        .map(|b| &**b)
        .ok_or_else(|| RuntimeError::compile_error("runtime not initialised; call init first"))
}

/// The global module, bootstrapped with the default globals on first use.
pub fn global_module() -> ObjRef {
    let global = *GLOBAL_MODULE.get_or_init(|| create_object(None));
    GLOBALS_INIT.call_once(|| {
        globals::install(global);
        heap().add_root(global.value());
    });
    global
}

pub fn get_global(name: Symbol) -> RtResult<Value> {
    let global = global_module();
    object::get_member(global, global.value(), name)
}

pub fn set_global(name: Symbol, value: Value) -> RtResult<Value> {
    let global = global_module();
    object::set_member(global, global.value(), name, value)
}

/// Runtime version string, including the linked backend's name.
pub fn version() -> String {
    let backend = BACKEND.get().map(|b| b.name()).unwrap_or("unlinked");
    format!("{} pre-alpha [{backend}]", env!("CARGO_PKG_VERSION"))
}

/// Compile source to a function value without running it.
pub fn compile(module_name: &str, source: &str) -> RtResult<ObjRef> {
    let descriptor = backend()?
        .compile(module_name, source)
        .map_err(|e| RuntimeError::compile_error(e.message))?;
    Ok(create_function(descriptor, None))
}

/// Compile and run source in the global module.
pub fn eval(source: &str) -> RtResult<Value> {
    let function = compile("<eval>", source)?;
    let global = global_module();
    let frame = create_call_frame_in_module(function, None, &[], &[], Some(global))?;
    function_call(function, frame, global.value(), Value::UNDEFINED)
}

/// Host-side invocation of any functor.
pub fn call(functor: Value, self_value: Value, args: &[Value]) -> RtResult<Value> {
    dispatch::call(functor, self_value, args)
}

/// Host-side method invocation.
pub fn call_method(receiver: Value, name: Symbol, args: &[Value]) -> RtResult<Value> {
    dispatch::call_method(receiver, name, args)
}

/// Build a class object naming `prototype` as its instance prototype. The
/// class's prototype is the `__class_prototype__` global when the prelude
/// has defined one.
pub fn create_class_for_prototype(name: Symbol, prototype: ObjRef) -> RtResult<ObjRef> {
    let class_proto = get_global(intern("__class_prototype__"))?;
    let class = create_object(ObjRef::from_value(class_proto));
    object::set_name(class, name);
    object::set_name(prototype, name);
    object::set_member(
        class,
        class.value(),
        intern("instance_prototype"),
        prototype.value(),
    )?;
    object::set_member(prototype, prototype.value(), intern("class"), class.value())?;
    Ok(class)
}

/// Tear the runtime down, running every object's finalizer.
///
/// # Safety
/// Nothing may touch the runtime afterwards; callers invoke this once,
/// immediately before process exit.
pub unsafe fn shutdown() {
    tracing::debug!(objects = heap().len(), "runtime teardown");
    unsafe { heap().finalize_all() };
}
