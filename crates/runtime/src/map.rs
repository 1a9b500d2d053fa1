//! Map: the keyed associative container
//!
//! Four variants chosen at construction: {arbitrary-key | immediate-key} ×
//! {hashed | insertion-ordered}. Immediate-key variants use the value's bit
//! pattern as the key and never call back into script, which is why the
//! object model's member maps are safe to touch from lookup paths. The
//! arbitrary-key hashed variant consults the key's `hash` method when it
//! has one; the hash is computed *before* the map lock is taken.
//!
//! Entries resolve by value identity. Missing keys read as nil at the
//! script surface ([`get_opt`] distinguishes missing from stored-nil for
//! the member-lookup algorithm).

use std::collections::HashMap;
use std::sync::RwLock;

use rime_core::{Value, intern};

use crate::error::{RtResult, RuntimeError};
use crate::function::{define_method, define_property_accessors, frame_argument};
use crate::heap::ObjRef;
use crate::object::{ObjectKind, create_object, create_with_kind};
use crate::{dispatch, string, types};

/// Payload of a map object.
pub struct MapData {
    immediate_keys: bool,
    repr: MapRepr,
}

enum MapRepr {
    /// Buckets keyed by the hash token; entries resolve by identity.
    Hashed(HashMap<u64, Vec<(Value, Value)>>),
    /// Insertion-ordered pairs, scanned linearly.
    Ordered(Vec<(Value, Value)>),
}

impl MapData {
    fn new(immediate_keys: bool, ordered: bool) -> MapData {
        MapData {
            immediate_keys,
            repr: if ordered {
                MapRepr::Ordered(Vec::new())
            } else {
                MapRepr::Hashed(HashMap::new())
            },
        }
    }

    fn len(&self) -> usize {
        match &self.repr {
            MapRepr::Hashed(buckets) => buckets.values().map(Vec::len).sum(),
            MapRepr::Ordered(pairs) => pairs.len(),
        }
    }
}

/// Arbitrary keys, hashed.
pub fn create() -> ObjRef {
    create_map(false, false)
}

/// Immediate keys only: never calls `hash` on a key.
pub fn create_with_immediate_keys() -> ObjRef {
    create_map(true, false)
}

/// Arbitrary keys, insertion-ordered: never becomes a full hash map.
pub fn create_with_insertion_order() -> ObjRef {
    create_map(false, true)
}

pub fn create_with_immediate_keys_and_insertion_order() -> ObjRef {
    create_map(true, true)
}

fn create_map(immediate_keys: bool, ordered: bool) -> ObjRef {
    let obj = create_with_kind(ObjectKind::Map(RwLock::new(MapData::new(
        immediate_keys,
        ordered,
    ))));
    if let Some(proto) = types::map_prototype_if_ready() {
        obj.meta().write().expect("object meta lock poisoned").prototype = Some(proto);
    }
    obj
}

/// The members-map constructor used by the object model: immediate keys
/// (symbols), hashed. Must stay callable while the prototype registry is
/// still being built, hence the if-ready prototype wiring in `create_map`.
pub fn create_members_map() -> ObjRef {
    create_with_immediate_keys()
}

fn storage(map: ObjRef) -> &'static RwLock<MapData> {
    unsafe { &*map.as_ptr() }
        .as_map()
        .expect("not a map object")
}

/// Hash token for a key. Immediate-key maps and non-object keys use the
/// bit pattern; objects with a `hash` method use its integer result. The
/// token is computed with no map lock held.
fn key_token(map: ObjRef, key: Value) -> RtResult<u64> {
    let immediate = storage(map)
        .read()
        .expect("map lock poisoned")
        .immediate_keys;
    if immediate || !key.is_object() {
        return Ok(key.bits());
    }
    let hash_sym = intern("hash");
    let method = dispatch::get_member(key, hash_sym)?;
    if method.is_nil() || method.is_undefined() {
        return Ok(key.bits());
    }
    let hashed = dispatch::call(method, key, &[])?;
    if hashed.is_integer() {
        Ok(hashed.bits())
    } else {
        Err(RuntimeError::wrong_type("an integer from the hash method"))
    }
}

/// Lookup distinguishing missing from stored nil.
pub fn get_opt(map: ObjRef, key: Value) -> RtResult<Option<Value>> {
    let token = key_token(map, key)?;
    let data = storage(map).read().expect("map lock poisoned");
    Ok(match &data.repr {
        MapRepr::Hashed(buckets) => buckets
            .get(&token)
            .and_then(|bucket| bucket.iter().find(|(k, _)| *k == key))
            .map(|(_, v)| *v),
        MapRepr::Ordered(pairs) => pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| *v),
    })
}

/// Script-level read: nil when missing.
pub fn get(map: ObjRef, key: Value) -> RtResult<Value> {
    Ok(get_opt(map, key)?.unwrap_or(Value::NIL))
}

pub fn set(map: ObjRef, key: Value, value: Value) -> RtResult<Value> {
    let token = key_token(map, key)?;
    let mut data = storage(map).write().expect("map lock poisoned");
    match &mut data.repr {
        MapRepr::Hashed(buckets) => {
            let bucket = buckets.entry(token).or_default();
            match bucket.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => bucket.push((key, value)),
            }
        }
        MapRepr::Ordered(pairs) => match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => pairs.push((key, value)),
        },
    }
    Ok(value)
}

/// Remove a key, returning the stored value or nil.
pub fn erase(map: ObjRef, key: Value) -> RtResult<Value> {
    let token = key_token(map, key)?;
    let mut data = storage(map).write().expect("map lock poisoned");
    let removed = match &mut data.repr {
        MapRepr::Hashed(buckets) => buckets.get_mut(&token).and_then(|bucket| {
            bucket
                .iter()
                .position(|(k, _)| *k == key)
                .map(|i| bucket.remove(i).1)
        }),
        MapRepr::Ordered(pairs) => pairs
            .iter()
            .position(|(k, _)| *k == key)
            .map(|i| pairs.remove(i).1),
    };
    Ok(removed.unwrap_or(Value::NIL))
}

pub fn size(map: ObjRef) -> usize {
    storage(map).read().expect("map lock poisoned").len()
}

/// Snapshot of the pairs; insertion order for ordered maps.
pub fn pairs(map: ObjRef) -> Vec<(Value, Value)> {
    let data = storage(map).read().expect("map lock poisoned");
    match &data.repr {
        MapRepr::Hashed(buckets) => buckets
            .values()
            .flat_map(|bucket| bucket.iter().copied())
            .collect(),
        MapRepr::Ordered(pairs) => pairs.clone(),
    }
}

// ---------------------------------------------------------------------------
// Map prototype

fn expect_map(value: Value) -> RtResult<ObjRef> {
    ObjRef::from_value(value)
        .filter(|o| o.as_map().is_some())
        .ok_or_else(|| RuntimeError::wrong_type("a map"))
}

fn map_get(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    get(expect_map(self_value)?, it)
}

fn map_set(frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    let value = frame_argument(frame, 1);
    set(expect_map(self_value)?, it, value)
}

fn map_erase(_frame: Value, self_value: Value, it: Value) -> RtResult<Value> {
    erase(expect_map(self_value)?, it)
}

fn map_get_size(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    Ok(Value::integer(size(expect_map(self_value)?) as i64))
}

fn map_inspect(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    let entries = pairs(expect_map(self_value)?);
    let mut out = String::from("#(");
    for (i, (k, v)) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&dispatch::inspect_to_string(*k)?);
        out.push_str(" => ");
        out.push_str(&dispatch::inspect_to_string(*v)?);
    }
    out.push(')');
    Ok(string::create(&out).value())
}

pub fn create_map_prototype() -> ObjRef {
    let proto = create_object(None);
    define_method(proto, "get", map_get, 1);
    define_method(proto, "set", map_set, -1);
    define_method(proto, "erase", map_erase, 1);
    define_method(proto, "inspect", map_inspect, 0);
    define_method(proto, "to_string", map_inspect, 0);
    define_property_accessors(proto, "size", Some(map_get_size), None);
    proto
}
