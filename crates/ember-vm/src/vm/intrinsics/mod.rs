//! Runtime intrinsic dispatch for built-in object kinds
//!
//! Arrays, ranges, dictionaries and strings carry no per-object method
//! table entries. Property lookup falls back to this registry, keyed by the
//! receiver's [`ObjKind`], after the object's own table misses. Entries are
//! ordinary native function objects, so they bind and call like any other
//! method and receive the receiver as `args[0]`.

use crate::builtins::registry::BuiltinModule;
use crate::heap::Heap;
use crate::object::{ObjData, ObjKind, ObjNative, Table};
use crate::value::{ObjRef, Value};
use std::collections::HashMap;

/// Registry of intrinsic methods
#[derive(Debug, Default)]
pub(crate) struct Intrinsics {
    tables: HashMap<ObjKind, Table>,
}

impl Intrinsics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate natives for `methods` and make them visible on every `kind` object
    pub(crate) fn install(&mut self, heap: &mut Heap, kind: ObjKind, methods: &BuiltinModule) {
        let table = self.tables.entry(kind).or_default();
        for method in methods.functions() {
            let name = heap.intern(&method.name);
            let native = heap.alloc(ObjData::Native(ObjNative {
                name: method.name.clone(),
                arity: method.arity,
                function: method.func,
            }));
            table.insert(name, Value::object(native));
        }
    }

    /// Look up an intrinsic method
    #[inline]
    pub(crate) fn lookup(&self, kind: ObjKind, name: ObjRef) -> Option<Value> {
        self.tables.get(&kind)?.get(&name).copied()
    }

    /// Names and natives, kept alive across collections
    pub(crate) fn roots(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.tables.values().flat_map(|table| {
            table
                .iter()
                .flat_map(|(name, native)| std::iter::once(*name).chain(native.as_object()))
        })
    }
}
