//! Type Prototype Registry
//!
//! One lazily-built prototype object per value kind, process-wide. The
//! whole registry is constructed in a single shot on first use: prototype
//! construction stores members directly and creates only raw objects, so
//! nothing inside the build re-enters the registry. Objects created while
//! the build is in flight (the prototypes' own method functions and member
//! maps) resolve their type prototype through the `*_if_ready` accessors
//! and simply go without one.
//!
//! True and false share the boolean prototype, whichever is asked for
//! first.

use std::sync::OnceLock;

use rime_core::{Kind, Value};

use crate::heap::ObjRef;
use crate::{arguments, array, boolean, fiber, function, map, nil, numeric, object, string, symbol};

pub struct Registry {
    pub object: ObjRef,
    pub integer: ObjRef,
    pub nil: ObjRef,
    pub boolean: ObjRef,
    pub symbol: ObjRef,
    pub float: ObjRef,
    pub string: ObjRef,
    pub array: ObjRef,
    pub map: ObjRef,
    pub function: ObjRef,
    pub frame: ObjRef,
    pub arguments: ObjRef,
    pub fiber: ObjRef,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The prototype registry, built on first access.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry {
        object: object::create_object_prototype(),
        integer: numeric::create_integer_prototype(),
        nil: nil::create_nil_prototype(),
        boolean: boolean::create_boolean_prototype(),
        symbol: symbol::create_symbol_prototype(),
        float: numeric::create_float_prototype(),
        string: string::create_string_prototype(),
        array: array::create_array_prototype(),
        map: map::create_map_prototype(),
        function: function::create_function_prototype(),
        frame: function::create_frame_prototype(),
        arguments: arguments::create_arguments_prototype(),
        fiber: fiber::create_fiber_prototype(),
    })
}

/// The terminal node of every member-lookup chain.
pub fn object_prototype() -> ObjRef {
    registry().object
}

/// Prototype for an immediate value's kind. Undefined dispatches like nil,
/// matching how a zero word reads everywhere else.
pub fn prototype_for_value(value: Value) -> ObjRef {
    let registry = registry();
    match value.kind() {
        Kind::Undefined | Kind::Nil => registry.nil,
        Kind::Integer => registry.integer,
        Kind::False | Kind::True => registry.boolean,
        Kind::Symbol => registry.symbol,
        Kind::Float => registry.float,
        Kind::Object => object_prototype(),
    }
}

// Non-blocking accessors for creation primitives that may run while the
// registry build is in flight.

pub fn string_prototype_if_ready() -> Option<ObjRef> {
    REGISTRY.get().map(|r| r.string)
}

pub fn array_prototype_if_ready() -> Option<ObjRef> {
    REGISTRY.get().map(|r| r.array)
}

pub fn map_prototype_if_ready() -> Option<ObjRef> {
    REGISTRY.get().map(|r| r.map)
}

pub fn function_prototype_if_ready() -> Option<ObjRef> {
    REGISTRY.get().map(|r| r.function)
}

pub fn frame_prototype_if_ready() -> Option<ObjRef> {
    REGISTRY.get().map(|r| r.frame)
}

pub fn arguments_prototype_if_ready() -> Option<ObjRef> {
    REGISTRY.get().map(|r| r.arguments)
}

pub fn fiber_prototype_if_ready() -> Option<ObjRef> {
    REGISTRY.get().map(|r| r.fiber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prototypes_are_lazily_built_and_stable() {
        let a = prototype_for_value(Value::integer(1));
        let b = prototype_for_value(Value::integer(2));
        assert_eq!(a, b);
    }

    #[test]
    fn test_true_and_false_share_a_prototype() {
        assert_eq!(
            prototype_for_value(Value::TRUE),
            prototype_for_value(Value::FALSE)
        );
    }

    #[test]
    fn test_undefined_dispatches_like_nil() {
        assert_eq!(
            prototype_for_value(Value::UNDEFINED),
            prototype_for_value(Value::NIL)
        );
    }

    #[test]
    fn test_distinct_kinds_distinct_prototypes() {
        let protos = [
            prototype_for_value(Value::integer(0)),
            prototype_for_value(Value::NIL),
            prototype_for_value(Value::TRUE),
            prototype_for_value(Value::float(0.0)),
            object_prototype(),
        ];
        for (i, a) in protos.iter().enumerate() {
            for b in &protos[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
