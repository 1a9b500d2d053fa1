//! Cooperative Fiber Scheduler
//!
//! A fiber is a first-class coroutine with explicit resume semantics:
//! control transfers only at `resume`, and within one fiber execution is
//! strictly sequential. The backing stacks and context switches come from
//! May green threads configured with a single worker, so interleaving is
//! deterministic; suspension is a park on the fiber's one-slot mailbox,
//! and delivering a value into the mailbox is what "restoring the saved
//! context" means here.
//!
//! Each OS thread that touches the runtime gets an implicit main fiber:
//! already started, already running, no functor of its own. The
//! current-fiber pointer is thread-local and every fiber re-asserts it
//! when it wakes, so the pointer is correct on whichever thread the
//! scheduler runs script on.
//!
//! ## Transitions
//!
//! ```text
//! create               -> not-started
//! resume (not started) -> running   (spawn stack, invoke functor with
//!                                    (caller, incoming_value))
//! resume (suspended)   -> running   (deliver incoming value)
//! cross-fiber resume   -> suspends the resumer
//! functor returns      -> finished; the link is resumed with the result
//! ```
//!
//! Resuming a finished fiber fails with *fiber-finished*; resuming a
//! running fiber fails with *fiber-self-resume*.

use std::cell::Cell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, Once};

use may::sync::mpmc;
use rime_core::Value;

use crate::error::{RtResult, RuntimeError, raise_with_message};
use crate::function::{define_method, define_property_accessors};
use crate::heap::ObjRef;
use crate::object::{ObjectKind, create_object, create_with_kind};
use crate::{dispatch, string, types};

const STARTED: u8 = 0b001;
const RUNNING: u8 = 0b010;
const FINISHED: u8 = 0b100;

/// Default fiber stack size: 1MB. Compiled code is stack-hungry, so this
/// errs well above what interpreter-only workloads need.
const DEFAULT_STACK_SIZE: usize = 0x10_0000;

/// Payload of a fiber object.
pub struct FiberData {
    functor: Value,
    mailbox_tx: mpmc::Sender<RtResult<Value>>,
    mailbox_rx: mpmc::Receiver<RtResult<Value>>,
    /// Most recently delivered resume value; a collector root.
    incoming: Mutex<Value>,
    /// The fiber that resumed this one most recently. Control returns
    /// here on yield or return.
    link: Mutex<Option<ObjRef>>,
    flags: AtomicU8,
    /// Head of this fiber's call-frame chain, maintained by push/pop
    /// independent of the machine stack so the collector never walks raw
    /// stack memory.
    current_frame: Mutex<Option<ObjRef>>,
}

impl FiberData {
    fn with_flags(functor: Value, flags: u8) -> FiberData {
        let (mailbox_tx, mailbox_rx) = mpmc::channel();
        FiberData {
            functor,
            mailbox_tx,
            mailbox_rx,
            incoming: Mutex::new(Value::UNDEFINED),
            link: Mutex::new(None),
            flags: AtomicU8::new(flags),
            current_frame: Mutex::new(None),
        }
    }

    pub fn functor(&self) -> Value {
        self.functor
    }

    pub fn incoming_value(&self) -> Value {
        *self.incoming.lock().expect("fiber lock poisoned")
    }

    pub fn link(&self) -> Option<ObjRef> {
        *self.link.lock().expect("fiber lock poisoned")
    }

    pub fn current_frame(&self) -> Option<ObjRef> {
        *self.current_frame.lock().expect("fiber lock poisoned")
    }

    pub fn is_started(&self) -> bool {
        self.flags.load(Ordering::Acquire) & STARTED != 0
    }

    pub fn is_running(&self) -> bool {
        self.flags.load(Ordering::Acquire) & RUNNING != 0
    }

    pub fn is_finished(&self) -> bool {
        self.flags.load(Ordering::Acquire) & FINISHED != 0
    }
}

thread_local! {
    static CURRENT: Cell<Option<ObjRef>> = const { Cell::new(None) };
}

static SCHEDULER_INIT: Once = Once::new();

/// Parse a stack size from the environment, warning and defaulting for
/// missing, zero, or malformed values.
fn parse_stack_size(env_value: Option<String>) -> usize {
    match env_value {
        Some(val) => match val.parse::<usize>() {
            Ok(0) => {
                eprintln!(
                    "Warning: RIME_FIBER_STACK_SIZE=0 is invalid, using default {DEFAULT_STACK_SIZE}"
                );
                DEFAULT_STACK_SIZE
            }
            Ok(size) => size,
            Err(_) => {
                eprintln!(
                    "Warning: RIME_FIBER_STACK_SIZE='{val}' is not a valid number, using default {DEFAULT_STACK_SIZE}"
                );
                DEFAULT_STACK_SIZE
            }
        },
        None => DEFAULT_STACK_SIZE,
    }
}

fn stack_size() -> usize {
    parse_stack_size(std::env::var("RIME_FIBER_STACK_SIZE").ok())
}

/// Configure the coroutine scheduler. One worker thread keeps the fiber
/// world cooperative and its interleaving deterministic.
pub fn configure_scheduler() {
    SCHEDULER_INIT.call_once(|| {
        may::config().set_workers(1).set_stack_size(stack_size());
    });
}

fn fiber_data(fiber: ObjRef) -> RtResult<&'static FiberData> {
    unsafe { &*fiber.as_ptr() }
        .as_fiber()
        .ok_or_else(|| RuntimeError::wrong_type("a fiber"))
}

/// Create a fiber. On first resume the functor is invoked with
/// `(calling_fiber, incoming_value)`.
pub fn create_fiber(functor: Value) -> ObjRef {
    configure_scheduler();
    let obj = create_with_kind(ObjectKind::Fiber(FiberData::with_flags(functor, 0)));
    obj.meta().write().expect("object meta lock poisoned").prototype = Some(types::registry().fiber);
    obj
}

/// The fiber currently executing on this thread, bootstrapping the
/// thread's implicit main fiber on first use.
pub fn current_fiber() -> ObjRef {
    if let Some(fiber) = CURRENT.with(Cell::get) {
        return fiber;
    }
    configure_scheduler();
    let main = create_with_kind(ObjectKind::Fiber(FiberData::with_flags(
        Value::UNDEFINED,
        STARTED | RUNNING,
    )));
    main.meta().write().expect("object meta lock poisoned").prototype =
        Some(types::registry().fiber);
    CURRENT.with(|c| c.set(Some(main)));
    tracing::trace!(fiber = ?main, "bootstrapped main fiber for thread");
    main
}

/// Transfer control to `target`, delivering `value`. Returns the value
/// the current fiber is eventually resumed with (or the target's return
/// value when it finishes back into us).
pub fn resume(target: ObjRef, value: Value) -> RtResult<Value> {
    let target_data = fiber_data(target)?;
    let current = current_fiber();
    if current == target {
        return Ok(value);
    }

    let flags = target_data.flags.load(Ordering::Acquire);
    if flags & FINISHED != 0 {
        return Err(RuntimeError::fiber_finished());
    }
    if flags & RUNNING != 0 {
        return Err(RuntimeError::fiber_self_resume());
    }

    let current_data = fiber_data(current)?;
    current_data.flags.fetch_and(!RUNNING, Ordering::AcqRel);
    *target_data.link.lock().expect("fiber lock poisoned") = Some(current);
    *target_data.incoming.lock().expect("fiber lock poisoned") = value;
    target_data.flags.fetch_or(STARTED | RUNNING, Ordering::AcqRel);

    if flags & STARTED == 0 {
        tracing::trace!(fiber = ?target, "starting fiber");
        spawn_fiber(target)?;
    } else if target_data.mailbox_tx.send(Ok(value)).is_err() {
        return Err(raise_with_message("fiber mailbox closed"));
    }

    park(current, current_data)
}

/// Park the current fiber until somebody delivers into its mailbox, then
/// re-assert its identity on the waking thread.
fn park(current: ObjRef, current_data: &FiberData) -> RtResult<Value> {
    let result = current_data
        .mailbox_rx
        .recv()
        .unwrap_or_else(|_| Err(raise_with_message("fiber mailbox closed")));
    CURRENT.with(|c| c.set(Some(current)));
    current_data.flags.fetch_or(RUNNING, Ordering::AcqRel);
    result
}

fn spawn_fiber(fiber: ObjRef) -> RtResult<()> {
    let builder = may::coroutine::Builder::new().stack_size(stack_size());
    // Safety: the closure only touches heap handles and lock-protected
    // state; TLS access inside resolves against the worker thread.
    let spawned = unsafe { builder.spawn(move || fiber_main(fiber)) };
    match spawned {
        Ok(_handle) => Ok(()),
        Err(e) => Err(raise_with_message(format!("failed to spawn fiber: {e}"))),
    }
}

/// Body of every spawned fiber: invoke the functor, then hand the result
/// (or the error unwinding out of it) to the most recent link.
fn fiber_main(fiber: ObjRef) {
    CURRENT.with(|c| c.set(Some(fiber)));
    let data = fiber_data(fiber).expect("spawned on a fiber object");
    let caller = data
        .link()
        .map(|l| l.value())
        .unwrap_or(Value::UNDEFINED);
    let incoming = data.incoming_value();

    let result = dispatch::call(data.functor, Value::UNDEFINED, &[caller, incoming]);

    // Finished: the started flag drops with the rest; only FINISHED
    // remains, and any further resume fails.
    data.flags.store(FINISHED, Ordering::Release);
    tracing::trace!(fiber = ?fiber, ok = result.is_ok(), "fiber finished");

    match data.link() {
        Some(link) => {
            if let Ok(link_data) = fiber_data(link) {
                let _ = link_data.mailbox_tx.send(result);
            }
        }
        None => {
            if let Err(e) = result {
                eprintln!("fiber aborted with uncaught error: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Call-frame chain

/// Push a frame onto the current fiber's chain. Compiled bodies call this
/// on entry; [`FrameGuard`] pairs it with the pop.
pub fn push_call_frame(frame: ObjRef) {
    let fiber = current_fiber();
    let data = fiber_data(fiber).expect("current fiber object");
    let mut head = data.current_frame.lock().expect("fiber lock poisoned");
    if let Some(frame_data) = unsafe { &*frame.as_ptr() }.as_frame() {
        *frame_data.caller.lock().expect("frame lock poisoned") = *head;
    }
    *head = Some(frame);
}

/// Pop a frame from the current fiber's chain.
///
/// # Panics
/// Panics when `frame` is not the chain head; an unbalanced push/pop is a
/// backend bug.
pub fn pop_call_frame(frame: ObjRef) {
    let fiber = current_fiber();
    let data = fiber_data(fiber).expect("current fiber object");
    let mut head = data.current_frame.lock().expect("fiber lock poisoned");
    assert_eq!(*head, Some(frame), "unbalanced call frame pop");
    if let Some(frame_data) = unsafe { &*frame.as_ptr() }.as_frame() {
        let mut caller = frame_data.caller.lock().expect("frame lock poisoned");
        *head = *caller;
        *caller = None;
    } else {
        *head = None;
    }
}

/// Scoped frame push that pops on drop, including the unwind path.
pub struct FrameGuard {
    frame: ObjRef,
}

impl FrameGuard {
    pub fn push(frame: ObjRef) -> FrameGuard {
        push_call_frame(frame);
        FrameGuard { frame }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        pop_call_frame(self.frame);
    }
}

// ---------------------------------------------------------------------------
// Fiber prototype

fn expect_fiber(value: Value) -> RtResult<ObjRef> {
    ObjRef::from_value(value)
        .filter(|o| o.as_fiber().is_some())
        .ok_or_else(|| RuntimeError::wrong_type("a fiber"))
}

fn fiber_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    expect_fiber(self_value)?;
    Ok(string::create(&format!("[Fiber@0x{:x}]", self_value.bits())).value())
}

fn fiber_resume(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    resume(expect_fiber(self_value)?, it)
}

fn fiber_each(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    let fiber = expect_fiber(self_value)?;
    let data = fiber_data(fiber)?;
    let first = resume(fiber, Value::UNDEFINED)?;
    dispatch::call(it, Value::UNDEFINED, &[first])?;
    while data.is_started() {
        let value = resume(fiber, Value::UNDEFINED)?;
        dispatch::call(it, Value::UNDEFINED, &[value])?;
    }
    Ok(Value::NIL)
}

fn fiber_is_running(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(Value::boolean(fiber_data(expect_fiber(self_value)?)?.is_running()))
}

fn fiber_is_started(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(Value::boolean(fiber_data(expect_fiber(self_value)?)?.is_started()))
}

pub fn create_fiber_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "inspect", fiber_inspect, 0);
    define_method(proto, "to_string", fiber_inspect, 0);
    define_method(proto, "resume", fiber_resume, 1);
    define_method(proto, "each", fiber_each, 1);
    define_property_accessors(proto, "running?", Some(fiber_is_running), None);
    define_property_accessors(proto, "started?", Some(fiber_is_started), None);
    proto
}
