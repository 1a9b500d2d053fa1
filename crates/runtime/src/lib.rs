//! Rime Runtime: the core of a prototype-based scripting language
//!
//! Key design principles:
//! - `Value`: one tagged machine word (rime-core); heap objects are
//!   handles into a process-lifetime arena
//! - Objects: prototype-chained members, sorted property tables, module
//!   inclusion; every mutable field behind the object's reader/writer lock
//! - Invocation: immutable function descriptors, heap call frames,
//!   sorted-merge argument binding, upvalues through definition contexts
//! - Fibers: cooperative full-stack coroutines with explicit resume,
//!   deterministic interleaving on a single-worker scheduler
//! - Errors: a `Result` rail through every call boundary; no unwinder

pub mod arguments;
pub mod array;
pub mod boolean;
pub mod dispatch;
pub mod error;
pub mod fiber;
pub mod function;
pub mod gc;
pub mod globals;
pub mod heap;
pub mod map;
pub mod module;
pub mod nil;
pub mod numeric;
pub mod object;
pub mod process;
pub mod string;
pub mod symbol;
pub mod types;
pub mod vm;

// Re-export the key types and entry points for embedders.
pub use rime_core::{Kind, Symbol, Value, intern, symbol_name};

pub use error::{ErrorKind, RtResult, RuntimeError, raise, raise_with_message};
pub use heap::ObjRef;

pub use dispatch::{
    call, call_method, call_method_with_named, call_with_named, eval_truth, get_member,
    get_method, get_module_value, nearest_object, set_member,
};
pub use fiber::{create_fiber, current_fiber, pop_call_frame, push_call_frame, resume};
pub use function::{
    EntryPoint, FunctionDescriptor, UpvalueRef, create_call_frame, create_function,
    create_method, function_call, get_local, merge_splat_arguments, set_local,
};
pub use object::{create_object, define_property, include_module};
pub use process::{
    compile, create_class_for_prototype, ensure_initialized, eval, get_global, init, set_global,
    version,
};
pub use vm::{Backend, CompileError, NullBackend};
