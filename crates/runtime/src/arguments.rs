//! Argument Binding
//!
//! An arguments object reifies one invocation's inputs: the descriptor's
//! parameter slots first, then the overflow (extra named values with their
//! names, then extra positional values).
//!
//! Binding merge-walks the descriptor's sorted parameter names against the
//! caller's sorted named arguments. Both sides being sorted by symbol id is
//! what makes the walk linear; the dispatch layer sorts the named prefix of
//! every call before it gets here.

use std::sync::{Arc, RwLock};

use rime_core::{Symbol, Value, symbol_name};

use crate::error::RtResult;
use crate::function::{FunctionDescriptor, define_method};
use crate::heap::ObjRef;
use crate::object::{ObjectKind, create_object, create_with_kind};
use crate::{dispatch, string, types};

/// Payload of an arguments object.
pub struct ArgumentsData {
    pub descriptor: Option<Arc<FunctionDescriptor>>,
    /// Parameter slots (`descriptor.num_params()` of them, unset slots are
    /// undefined), then named extras, then positional extras.
    pub slots: Vec<Value>,
    /// Names of the named-extras region, parallel to
    /// `slots[num_params .. num_params + extra_names.len()]`.
    pub extra_names: Vec<Symbol>,
}

impl ArgumentsData {
    fn num_params(&self) -> usize {
        self.descriptor
            .as_ref()
            .map(|d| d.num_params())
            .unwrap_or(0)
    }

    /// Fetch by name: parameters first, then named extras.
    pub fn get_by_name(&self, name: Symbol) -> Option<Value> {
        if let Some(descriptor) = &self.descriptor
            && let Some(i) = descriptor.param_names.iter().position(|p| *p == name)
        {
            return self.slots.get(i).copied();
        }
        let offset = self.num_params();
        self.extra_names
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.slots.get(offset + i).copied())
    }
}

/// Bind a call's inputs to a descriptor. `names` is sorted by symbol id
/// and parallel to the first `names.len()` entries of `values`; the rest
/// of `values` is positional.
pub fn bind(descriptor: &Arc<FunctionDescriptor>, names: &[Symbol], values: &[Value]) -> ArgumentsData {
    debug_assert!(names.len() <= values.len());
    debug_assert!(names.windows(2).all(|w| w[0] <= w[1]));

    let num_params = descriptor.num_params();
    let mut param_slots = vec![Value::UNDEFINED; num_params];
    let mut extra_names = Vec::new();
    let mut extra_named_values = Vec::new();

    let mut param_i = 0;
    let mut named_i = 0;
    let mut positional_i = names.len();

    while param_i < num_params {
        if named_i < names.len() {
            if names[named_i] == descriptor.param_names[param_i] {
                // Named argument matches this parameter.
                param_slots[param_i] = values[named_i];
                param_i += 1;
                named_i += 1;
                continue;
            }
            if names[named_i] < descriptor.param_names[param_i] {
                // This name corresponds to no parameter at all.
                extra_names.push(names[named_i]);
                extra_named_values.push(values[named_i]);
                named_i += 1;
                continue;
            }
        }
        // Parameter unmatched by name: consume the next positional value,
        // or leave the slot unset when none remain.
        if positional_i < values.len() {
            param_slots[param_i] = values[positional_i];
            positional_i += 1;
        }
        param_i += 1;
    }

    // Leftover named arguments and positional values become extras.
    while named_i < names.len() {
        extra_names.push(names[named_i]);
        extra_named_values.push(values[named_i]);
        named_i += 1;
    }

    let mut slots = param_slots;
    slots.extend(extra_named_values);
    slots.extend_from_slice(&values[positional_i..]);

    ArgumentsData {
        descriptor: Some(Arc::clone(descriptor)),
        slots,
        extra_names,
    }
}

/// Wrap bound arguments in a heap object.
pub fn create_arguments_object(data: ArgumentsData) -> ObjRef {
    let obj = create_with_kind(ObjectKind::Arguments(RwLock::new(data)));
    if let Some(proto) = types::arguments_prototype_if_ready() {
        obj.meta().write().expect("object meta lock poisoned").prototype = Some(proto);
    }
    obj
}

fn storage(arguments: ObjRef) -> &'static RwLock<ArgumentsData> {
    unsafe { &*arguments.as_ptr() }
        .as_arguments()
        .expect("not an arguments object")
}

/// Append positional values: unset parameter slots are filled in order
/// first, the rest append as positional extras.
pub fn append_values(arguments: ObjRef, values: &[Value]) {
    let mut data = storage(arguments).write().expect("arguments lock poisoned");
    let num_params = data.num_params();
    let mut supplied = values.iter().copied();
    for slot in data.slots[..num_params].iter_mut() {
        if slot.is_undefined() {
            match supplied.next() {
                Some(v) => *slot = v,
                None => break,
            }
        }
    }
    data.slots.extend(supplied);
}

/// Append map pairs: symbol keys become named extras, everything else
/// appends positionally.
pub fn append_map(arguments: ObjRef, pairs: &[(Value, Value)]) {
    let mut positional = Vec::new();
    {
        let mut data = storage(arguments).write().expect("arguments lock poisoned");
        let num_params = data.num_params();
        for (key, value) in pairs {
            if key.is_symbol() {
                // Insert at the end of the named-extras region so it stays
                // contiguous ahead of the positional extras.
                let at = num_params + data.extra_names.len();
                data.extra_names.push(key.as_symbol());
                data.slots.insert(at, *value);
            } else {
                positional.push(*value);
            }
        }
    }
    if !positional.is_empty() {
        append_values(arguments, &positional);
    }
}

/// Merge another arguments object: its named pairs (parameters and named
/// extras) carry their names, its positional values fill unset slots.
pub fn merge(arguments: ObjRef, other: ObjRef) {
    let (named, positional) = {
        let data = storage(other).read().expect("arguments lock poisoned");
        let num_params = data.num_params();
        let mut named: Vec<(Value, Value)> = Vec::new();
        if let Some(descriptor) = &data.descriptor {
            for (i, name) in descriptor.param_names.iter().enumerate() {
                let value = data.slots.get(i).copied().unwrap_or(Value::UNDEFINED);
                if !value.is_undefined() && *name != crate::function::ANONYMOUS_PARAM {
                    named.push((Value::symbol(*name), value));
                }
            }
        }
        for (i, name) in data.extra_names.iter().enumerate() {
            if let Some(value) = data.slots.get(num_params + i) {
                named.push((Value::symbol(*name), *value));
            }
        }
        let positional: Vec<Value> = data.slots[num_params + data.extra_names.len()..].to_vec();
        (named, positional)
    };
    append_map(arguments, &named);
    append_values(arguments, &positional);
}

// ---------------------------------------------------------------------------
// Arguments prototype

fn arguments_splat(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(self_value)
}

fn arguments_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    let Some(args) = ObjRef::from_value(self_value).filter(|o| o.as_arguments().is_some()) else {
        return Err(crate::error::RuntimeError::wrong_type("an arguments object"));
    };
    let (names, slots) = {
        let data = storage(args).read().expect("arguments lock poisoned");
        let names: Vec<Option<Symbol>> = (0..data.slots.len())
            .map(|i| {
                if i < data.num_params() {
                    data.descriptor.as_ref().map(|d| d.param_names[i])
                } else {
                    data.extra_names.get(i - data.num_params()).copied()
                }
            })
            .collect();
        (names, data.slots.clone())
    };
    let mut out = String::from("[Arguments (");
    for (i, (name, value)) in names.iter().zip(&slots).enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if let Some(name) = name.filter(|n| *n != crate::function::ANONYMOUS_PARAM) {
            out.push_str(symbol_name(name).unwrap_or("<unknown>"));
            out.push_str(": ");
        }
        out.push_str(&dispatch::inspect_to_string(*value)?);
    }
    out.push_str(")]");
    Ok(string::create(&out).value())
}

pub fn create_arguments_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "*", arguments_splat, 0);
    define_method(proto, "inspect", arguments_inspect, 0);
    define_method(proto, "to_string", arguments_inspect, 0);
    proto
}

/// Pairs view of an arguments object used when it is itself splatted into
/// a map-aware context.
pub fn snapshot_pairs(arguments: ObjRef) -> Vec<(Option<Symbol>, Value)> {
    let data = storage(arguments).read().expect("arguments lock poisoned");
    let num_params = data.num_params();
    data.slots
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let name = if i < num_params {
                data.descriptor
                    .as_ref()
                    .map(|d| d.param_names[i])
                    .filter(|n| *n != crate::function::ANONYMOUS_PARAM)
            } else {
                data.extra_names.get(i - num_params).copied()
            };
            (name, *v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rime_core::intern;

    fn return_it(_frame: Value, _self: Value, it: Value) -> RtResult<Value> {
        Ok(it)
    }

    fn descriptor(params: &[&str]) -> Arc<FunctionDescriptor> {
        FunctionDescriptor::scripted("test_fn", return_it, params, &[])
    }

    fn sorted_named(pairs: &mut Vec<(Symbol, Value)>) -> (Vec<Symbol>, Vec<Value>) {
        pairs.sort_by_key(|(name, _)| *name);
        (
            pairs.iter().map(|(n, _)| *n).collect(),
            pairs.iter().map(|(_, v)| *v).collect(),
        )
    }

    #[test]
    fn test_positional_binding_fills_sorted_slots_in_order() {
        let desc = descriptor(&["a", "b"]);
        let bound = bind(&desc, &[], &[Value::integer(1), Value::integer(2)]);
        assert_eq!(bound.slots.len(), 2);
        // Positionals fill the sorted parameter slots in supply order.
        assert_eq!(bound.slots[0], Value::integer(1));
        assert_eq!(bound.slots[1], Value::integer(2));
    }

    #[test]
    fn test_named_binding_overrides_position() {
        let desc = descriptor(&["a", "b"]);
        let mut named = vec![
            (intern("b"), Value::integer(2)),
            (intern("a"), Value::integer(10)),
        ];
        let (names, values) = sorted_named(&mut named);
        let bound = bind(&desc, &names, &values);
        assert_eq!(bound.get_by_name(intern("a")), Some(Value::integer(10)));
        assert_eq!(bound.get_by_name(intern("b")), Some(Value::integer(2)));
        assert!(bound.extra_names.is_empty());
    }

    #[test]
    fn test_unknown_named_argument_becomes_extra() {
        let desc = descriptor(&["a"]);
        let mut named = vec![
            (intern("a"), Value::integer(1)),
            (intern("zz_not_a_param"), Value::integer(9)),
        ];
        let (names, values) = sorted_named(&mut named);
        let bound = bind(&desc, &names, &values);
        assert_eq!(bound.get_by_name(intern("a")), Some(Value::integer(1)));
        assert_eq!(bound.extra_names, vec![intern("zz_not_a_param")]);
        assert_eq!(
            bound.get_by_name(intern("zz_not_a_param")),
            Some(Value::integer(9))
        );
    }

    #[test]
    fn test_mixed_named_and_positional() {
        // f(a, b, c) called with (b: 2, 1, 3): b binds by name, the two
        // positionals fill the remaining parameters in sorted order.
        let desc = descriptor(&["a", "b", "c"]);
        let bound = bind(
            &desc,
            &[intern("b")],
            &[Value::integer(2), Value::integer(1), Value::integer(3)],
        );
        assert_eq!(bound.get_by_name(intern("b")), Some(Value::integer(2)));
        let (first, second) = if intern("a") < intern("c") {
            (intern("a"), intern("c"))
        } else {
            (intern("c"), intern("a"))
        };
        assert_eq!(bound.get_by_name(first), Some(Value::integer(1)));
        assert_eq!(bound.get_by_name(second), Some(Value::integer(3)));
        assert!(bound.extra_names.is_empty());
    }

    #[test]
    fn test_surplus_positionals_are_extras() {
        let desc = descriptor(&["a"]);
        let bound = bind(
            &desc,
            &[],
            &[Value::integer(1), Value::integer(2), Value::integer(3)],
        );
        assert_eq!(bound.slots.len(), 3);
        assert_eq!(bound.slots[1], Value::integer(2));
        assert_eq!(bound.slots[2], Value::integer(3));
    }

    #[test]
    fn test_missing_parameters_stay_unset() {
        let desc = descriptor(&["a", "b"]);
        let bound = bind(&desc, &[], &[Value::integer(1)]);
        let unset = bound.slots.iter().filter(|v| v.is_undefined()).count();
        assert_eq!(unset, 1);
    }

    #[test]
    fn test_append_values_fills_unset_slots_first() {
        let desc = descriptor(&["a", "b"]);
        let bound = bind(&desc, &[], &[Value::integer(1)]);
        let args = create_arguments_object(bound);
        append_values(args, &[Value::integer(2), Value::integer(3)]);
        let data = storage(args).read().unwrap();
        assert!(data.slots[..2].iter().all(|v| !v.is_undefined()));
        assert_eq!(data.slots.len(), 3);
        assert_eq!(data.slots[2], Value::integer(3));
    }

    #[test]
    fn test_append_map_splits_symbol_and_other_keys() {
        let desc = descriptor(&[]);
        let args = create_arguments_object(bind(&desc, &[], &[]));
        let sym = intern("named_extra");
        append_map(
            args,
            &[
                (Value::symbol(sym), Value::integer(1)),
                (Value::integer(0), Value::integer(2)),
            ],
        );
        let data = storage(args).read().unwrap();
        assert_eq!(data.extra_names, vec![sym]);
        assert_eq!(data.get_by_name(sym), Some(Value::integer(1)));
        assert_eq!(data.slots.last().copied(), Some(Value::integer(2)));
    }
}
