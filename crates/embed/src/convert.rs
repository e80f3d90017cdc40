//! Conversion layer between Value and native runtime objects
//!
//! Two total functions: `from_native` inspects a native object's type
//! category and builds the matching Value recursively; `to_native` rebuilds
//! native objects from a Value. Neither can fail: an unrecognized native
//! type degrades to the none value rather than failing the surrounding
//! call.
//!
//! Conversion temporaries (a list normalized into a tuple-shaped snapshot,
//! recursively fetched elements) are held in `ObjRef` guards and released
//! before the conversion returns.

use tether_core::{Mapping, Sequence, Value};

use crate::host::{Host, ObjRef};
use crate::runtime::{Runtime, TypeTag};

/// Build a Value from a native object.
///
/// Dispatch is an exhaustive match over the runtime's type categories.
/// List-like objects are first normalized into a sequence snapshot, so
/// list and tuple both land on the sequence tag. Unrecognized categories
/// convert to the none value; conversion never fails.
pub fn from_native<R: Runtime>(host: &Host<R>, object: &R::Object) -> Value {
    let rt = host.runtime();
    match rt.type_of(object) {
        TypeTag::List => {
            let snapshot = host.adopt(rt.normalize_sequence(object));
            sequence_from_native(host, snapshot.raw())
        }
        TypeTag::Text | TypeTag::Str => Value::Str(rt.as_str(object)),
        TypeTag::Float => Value::Float(rt.as_float(object)),
        TypeTag::Int | TypeTag::Long => Value::Int(rt.as_int(object)),
        TypeTag::Tuple => sequence_from_native(host, object),
        TypeTag::Dict => mapping_from_native(host, object),
        TypeTag::Opaque => Value::None,
    }
}

fn sequence_from_native<R: Runtime>(host: &Host<R>, object: &R::Object) -> Value {
    let rt = host.runtime();
    let mut seq = Sequence::new();
    for index in 0..rt.sequence_len(object) {
        match rt.sequence_get(object, index) {
            Some(raw) => {
                let element = host.adopt(raw);
                seq.push(from_native(host, element.raw()));
            }
            None => seq.push(Value::None),
        }
    }
    Value::Seq(seq)
}

fn mapping_from_native<R: Runtime>(host: &Host<R>, object: &R::Object) -> Value {
    let rt = host.runtime();
    let mut map = Mapping::new();
    for (key_raw, value_raw) in rt.mapping_items(object) {
        let key = host.adopt(key_raw);
        let value = host.adopt(value_raw);
        map.insert(from_native(host, key.raw()), from_native(host, value.raw()));
    }
    Value::Map(map)
}

/// Build a native object from a Value.
///
/// With `force_sequence` the result is always sequence-shaped, which is
/// what the runtime's call protocol expects of argument lists: a Value
/// that is not already a sequence is wrapped in a one-element native
/// sequence, and the none value becomes the empty native sequence.
/// Without it, the none value converts to the runtime's canonical
/// empty/null object.
pub fn to_native<R: Runtime>(host: &Host<R>, value: &Value, force_sequence: bool) -> ObjRef<R> {
    let rt = host.runtime();
    match value {
        Value::Seq(seq) => host.adopt(sequence_to_native(host, seq)),
        Value::None => {
            if force_sequence {
                host.adopt(rt.new_sequence(Vec::new()))
            } else {
                host.adopt(rt.none())
            }
        }
        other => {
            let object = single_to_native(host, other);
            if force_sequence {
                let raw = object.into_raw();
                host.adopt(rt.new_sequence(vec![raw]))
            } else {
                object
            }
        }
    }
}

/// One non-sequence Value to one native object.
fn single_to_native<R: Runtime>(host: &Host<R>, value: &Value) -> ObjRef<R> {
    let rt = host.runtime();
    match value {
        Value::None => host.adopt(rt.none()),
        Value::Int(n) => host.adopt(rt.new_int(*n)),
        Value::Float(x) => host.adopt(rt.new_float(*x)),
        Value::Str(s) => host.adopt(rt.new_str(s)),
        Value::Seq(seq) => host.adopt(sequence_to_native(host, seq)),
        Value::Map(map) => host.adopt(mapping_to_native(host, map)),
    }
}

fn sequence_to_native<R: Runtime>(host: &Host<R>, seq: &Sequence) -> R::Object {
    let items = seq
        .iter()
        .map(|element| to_native(host, element, false).into_raw())
        .collect();
    host.runtime().new_sequence(items)
}

fn mapping_to_native<R: Runtime>(host: &Host<R>, map: &Mapping) -> R::Object {
    let items = map
        .iter()
        .map(|(key, value)| {
            (
                to_native(host, key, false).into_raw(),
                to_native(host, value, false).into_raw(),
            )
        })
        .collect();
    host.runtime().new_mapping(items)
}
