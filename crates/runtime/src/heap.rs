//! Object Heap
//!
//! Bump-allocated storage for every heap object in the process. Objects are
//! addressed by [`ObjRef`] handles and are never moved or freed while the
//! runtime is live, which is what makes handle copies, prototype cycles,
//! and module self-references safe without ownership edges: reclamation
//! belongs to the collector, and at this layer the collector's only moves
//! are "register a root" and "finalize everything at teardown".
//!
//! Allocation is 16-byte aligned so the low nibble of an object pointer is
//! always the object tag of the value word.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::{Mutex, OnceLock};

use bumpalo::Bump;
use rime_core::{Value, value::OBJECT_ALIGN};

use crate::object::Object;

/// A handle to a heap object. Copyable; compares by identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(NonNull<Object>);

// Safety: the pointee lives in the process-wide heap for the lifetime of
// the run, every mutable field behind it is lock-protected, and handles are
// only created by `Heap::alloc`. Fibers pass handles between the spawning
// thread and the coroutine worker, so both markers are required.
unsafe impl Send for ObjRef {}
unsafe impl Sync for ObjRef {}

impl ObjRef {
    /// The tagged value word for this object.
    #[inline(always)]
    pub fn value(self) -> Value {
        unsafe { Value::from_ptr(self.0.as_ptr() as *const ()) }
    }

    /// Recover a handle from a value word, if it is an object reference.
    #[inline(always)]
    pub fn from_value(v: Value) -> Option<ObjRef> {
        NonNull::new(v.as_ptr() as *mut Object).map(ObjRef)
    }

    #[inline(always)]
    pub fn as_ptr(self) -> *const Object {
        self.0.as_ptr()
    }
}

impl std::ops::Deref for ObjRef {
    type Target = Object;

    #[inline(always)]
    fn deref(&self) -> &Object {
        // Safety: see the Send/Sync justification above; objects outlive
        // every handle because the heap never frees during a run.
        unsafe { self.0.as_ref() }
    }
}

impl std::fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjRef(0x{:012x})", self.0.as_ptr() as usize)
    }
}

/// The process-wide heap.
pub struct Heap {
    bump: Mutex<Bump>,
    /// Every allocation, in order, for teardown finalization.
    objects: Mutex<Vec<NonNull<Object>>>,
    /// Extra roots registered by the embedder (the per-process state and
    /// the fiber chains are enumerated separately by the gc module).
    roots: Mutex<Vec<Value>>,
}

// Safety: the raw pointers in the registry only ever refer into the bump
// arena owned by this same struct, and all access goes through the
// mutexes.
unsafe impl Send for Heap {}
unsafe impl Sync for Heap {}

/// The one heap of this process, created on first use.
pub fn heap() -> &'static Heap {
    static HEAP: OnceLock<Heap> = OnceLock::new();
    HEAP.get_or_init(|| Heap {
        bump: Mutex::new(Bump::new()),
        objects: Mutex::new(Vec::new()),
        roots: Mutex::new(Vec::new()),
    })
}

impl Heap {
    /// Allocate an object. The returned handle is stable for the rest of
    /// the run.
    pub fn alloc(&self, object: Object) -> ObjRef {
        let layout = Layout::new::<Object>()
            .align_to(OBJECT_ALIGN)
            .expect("object layout");
        let raw = {
            let bump = self.bump.lock().expect("heap lock poisoned");
            bump.alloc_layout(layout).cast::<Object>()
        };
        // Safety: alloc_layout returned exclusive, properly aligned space.
        unsafe { raw.as_ptr().write(object) };
        self.objects.lock().expect("heap lock poisoned").push(raw);
        ObjRef(raw)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.lock().expect("heap lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a value as a collector root.
    pub fn add_root(&self, v: Value) {
        self.roots.lock().expect("heap lock poisoned").push(v);
    }

    /// Snapshot of the registered roots.
    pub fn roots(&self) -> Vec<Value> {
        self.roots.lock().expect("heap lock poisoned").clone()
    }

    /// Run every object's type-specific finalizer and drop the backing
    /// arena. Called once at process teardown.
    ///
    /// # Safety
    /// No `ObjRef` or object-tagged `Value` may be used afterwards. The
    /// caller must be the last user of the runtime.
    pub unsafe fn finalize_all(&self) {
        let mut objects = self.objects.lock().expect("heap lock poisoned");
        for obj in objects.drain(..) {
            unsafe { std::ptr::drop_in_place(obj.as_ptr()) };
        }
        self.roots.lock().expect("heap lock poisoned").clear();
        self.bump.lock().expect("heap lock poisoned").reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Object, ObjectKind};

    #[test]
    fn test_alloc_is_aligned_for_the_value_tag() {
        let obj = heap().alloc(Object::new(ObjectKind::Plain));
        assert_eq!(obj.as_ptr() as usize % OBJECT_ALIGN, 0);
        let v = obj.value();
        assert!(v.is_object());
        assert_eq!(ObjRef::from_value(v), Some(obj));
    }

    #[test]
    fn test_from_value_rejects_immediates() {
        assert_eq!(ObjRef::from_value(Value::NIL), None);
        assert_eq!(ObjRef::from_value(Value::integer(12)), None);
        assert_eq!(ObjRef::from_value(Value::UNDEFINED), None);
    }

    #[test]
    fn test_handles_are_stable_across_allocations() {
        let first = heap().alloc(Object::new(ObjectKind::Plain));
        let first_ptr = first.as_ptr();
        // Force enough allocation to spill into new bump chunks.
        for _ in 0..4096 {
            heap().alloc(Object::new(ObjectKind::Plain));
        }
        assert_eq!(first.as_ptr(), first_ptr);
    }
}
