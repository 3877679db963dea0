// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! The PDF object graph.
//!
//! PDF files are built from a small set of object kinds: null, booleans, numbers, strings,
//! names, arrays, dictionaries and streams.  An object is either written inline at every place
//! that uses it, or it is *indirect*: it gets an object id, is written once as a stand-alone
//! definition, and is referenced by id everywhere else.
//!
//! Indirection is modelled explicitly: an [`ObjRef`][] owns an indirect slot, and
//! [`Object::Reference`][] values point at it.  Becoming indirect is a one-way step (an object is
//! wrapped into a slot once and never unwrapped), ids are assigned exactly once during the
//! writer's first phase, and a reference can only ever point at an indirect object.  Streams are
//! always indirect.
//!
//! [`ObjRef`]: struct.ObjRef.html
//! [`Object::Reference`]: enum.Object.html#variant.Reference

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A PDF name, written as `/Name`.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Name(pub String);

impl Name {
    /// Creates a new name.
    pub fn new(name: impl Into<String>) -> Name {
        Name(name.into())
    }
}

/// A PDF object.
#[derive(Clone, Debug)]
pub enum Object {
    /// The null object.
    Null,
    /// A boolean.
    Boolean(bool),
    /// An integer.
    Integer(i64),
    /// A real number.
    Real(f64),
    /// A string, stored as raw bytes.
    Str(Vec<u8>),
    /// A name.
    Name(Name),
    /// An array of objects.
    Array(Vec<Object>),
    /// A dictionary.
    Dict(Dict),
    /// A reference to an indirect object.
    Reference(ObjRef),
}

impl Object {
    /// Creates a string object from text.
    pub fn string(s: impl Into<String>) -> Object {
        Object::Str(s.into().into_bytes())
    }

    /// Creates a name object.
    pub fn name(name: impl Into<String>) -> Object {
        Object::Name(Name::new(name))
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Object {
        Object::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Object {
        Object::Integer(value)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Object {
        Object::Real(value)
    }
}

/// A PDF dictionary with deterministically ordered keys.
#[derive(Clone, Debug, Default)]
pub struct Dict {
    entries: std::collections::BTreeMap<Name, Object>,
}

impl Dict {
    /// Creates an empty dictionary.
    pub fn new() -> Dict {
        Dict::default()
    }

    /// Sets the value for the given key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Object>) {
        self.entries.insert(Name::new(key), value.into());
    }

    /// Returns the value for the given key.
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(&Name::new(key))
    }

    /// Removes the value for the given key.
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(&Name::new(key));
    }

    /// Returns whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter()
    }
}

/// The payload of a stream object: its dictionary and raw bytes.
#[derive(Clone, Debug, Default)]
pub struct StreamData {
    /// The stream dictionary, without the length and filter entries (the writer adds them).
    pub dict: Dict,
    /// The uncompressed stream bytes.
    pub data: Vec<u8>,
    /// Whether the writer should deflate the bytes.
    pub compress: bool,
}

/// The value stored in an indirect slot.
#[derive(Debug)]
pub enum SlotValue {
    /// A plain object.
    Object(Object),
    /// A stream.
    Stream(StreamData),
}

#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) id: Cell<u64>,
    pub(crate) offset: Cell<u64>,
    pub(crate) written: Cell<bool>,
    pub(crate) value: RefCell<SlotValue>,
}

/// A handle to an indirect object.
///
/// Cloning the handle shares the slot; all clones resolve to the same object id once the writer
/// has assigned one.
#[derive(Clone)]
pub struct ObjRef(pub(crate) Rc<Slot>);

impl ObjRef {
    /// Makes the given object indirect.
    pub fn object(object: Object) -> ObjRef {
        ObjRef(Rc::new(Slot {
            id: Cell::new(0),
            offset: Cell::new(0),
            written: Cell::new(false),
            value: RefCell::new(SlotValue::Object(object)),
        }))
    }

    /// Makes the given dictionary indirect.
    pub fn dict(dict: Dict) -> ObjRef {
        ObjRef::object(Object::Dict(dict))
    }

    /// Creates an indirect stream.
    pub fn stream(stream: StreamData) -> ObjRef {
        ObjRef(Rc::new(Slot {
            id: Cell::new(0),
            offset: Cell::new(0),
            written: Cell::new(false),
            value: RefCell::new(SlotValue::Stream(stream)),
        }))
    }

    /// Returns the assigned object id, or 0 if the writer has not assigned one yet.
    pub fn id(&self) -> u64 {
        self.0.id.get()
    }

    /// Returns a reference object pointing at this indirect object.
    pub fn reference(&self) -> Object {
        Object::Reference(self.clone())
    }

    /// Runs the given closure on the slot value.
    pub fn with_value<R>(&self, f: impl FnOnce(&SlotValue) -> R) -> R {
        f(&self.0.value.borrow())
    }

    /// Replaces the dictionary entry of an indirect dictionary object.
    pub fn update_dict(&self, f: impl FnOnce(&mut Dict)) {
        if let SlotValue::Object(Object::Dict(dict)) = &mut *self.0.value.borrow_mut() {
            f(dict);
        }
    }

    /// Returns whether two handles point at the same slot.
    pub fn same(&self, other: &ObjRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef(id={})", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_keys_are_ordered() {
        let mut dict = Dict::new();
        dict.set("Zebra", 1i64);
        dict.set("Alpha", 2i64);
        let keys: Vec<&str> = dict.iter().map(|(name, _)| name.0.as_str()).collect();
        assert_eq!(keys, vec!["Alpha", "Zebra"]);
    }

    #[test]
    fn references_share_ids() {
        let indirect = ObjRef::object(Object::Integer(42));
        let clone = indirect.clone();
        indirect.0.id.set(7);
        assert_eq!(clone.id(), 7);
        assert!(indirect.same(&clone));
    }
}
