//! Mutator Contract
//!
//! The tracing collector itself is an external collaborator; what the core
//! owes it is a root set and a frame chain it can walk without touching
//! raw stack memory. Per fiber, the roots are its functor, its incoming
//! value, its link, and every frame of its chain (self, module, arguments,
//! locals, callee). Per-object field access goes through the object's
//! reader/writer lock, held only while copying values out.

use rime_core::Value;

use crate::heap::{ObjRef, heap};

/// Register a process-lifetime root.
pub fn add_root(value: Value) {
    heap().add_root(value);
}

/// Snapshot of the registered process roots.
pub fn process_roots() -> Vec<Value> {
    heap().roots()
}

/// Enumerate the roots owned by one fiber.
pub fn for_each_fiber_root(fiber: ObjRef, visit: &mut dyn FnMut(Value)) {
    let Some(data) = (unsafe { &*fiber.as_ptr() }).as_fiber() else {
        return;
    };
    visit(data.functor());
    visit(data.incoming_value());
    if let Some(link) = data.link() {
        visit(link.value());
    }
    let mut frame = data.current_frame();
    while let Some(current) = frame {
        for_each_frame_root(current, visit);
        frame = current
            .as_frame_caller()
            .expect("frame chain holds frame objects");
    }
}

/// Enumerate the roots held by one call frame.
pub fn for_each_frame_root(frame: ObjRef, visit: &mut dyn FnMut(Value)) {
    let Some(data) = (unsafe { &*frame.as_ptr() }).as_frame() else {
        return;
    };
    visit(data.function.value());
    visit(*data.self_value.lock().expect("frame lock poisoned"));
    if let Some(module) = *data.module.lock().expect("frame lock poisoned") {
        visit(module.value());
    }
    visit(data.arguments.value());
    if let Some(args) = (unsafe { &*data.arguments.as_ptr() }).as_arguments() {
        for slot in &args.read().expect("arguments lock poisoned").slots {
            visit(*slot);
        }
    }
    for local in data.locals.read().expect("frame lock poisoned").iter() {
        visit(*local);
    }
}

impl ObjRef {
    /// Caller link of a frame object, `Ok(None)` at the chain end.
    fn as_frame_caller(self) -> Option<Option<ObjRef>> {
        (unsafe { &*self.as_ptr() })
            .as_frame()
            .map(|f| *f.caller.lock().expect("frame lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::current_fiber;

    #[test]
    fn test_fiber_roots_include_functor_and_incoming() {
        let functor = crate::object::create_object(None);
        let fiber = crate::fiber::create_fiber(functor.value());
        let mut seen = Vec::new();
        for_each_fiber_root(fiber, &mut |v| seen.push(v));
        assert!(seen.contains(&functor.value()));
    }

    #[test]
    fn test_main_fiber_walk_terminates() {
        let mut count = 0usize;
        for_each_fiber_root(current_fiber(), &mut |_| count += 1);
        // functor + incoming at minimum
        assert!(count >= 2);
    }
}
