//! Mark-and-sweep collector
//!
//! Marking is iterative over an explicit grey worklist so deep object graphs
//! cannot overflow the native stack. After tracing, interned strings that
//! were not reached are evicted from the intern table, then every unmarked
//! slot is freed and survivors have their mark cleared.

use super::{GcStats, Heap};
use crate::object::{Obj, ObjData, Table};
use crate::value::{ObjRef, Value};
use tracing::debug;

impl Heap {
    /// Run a full collection from `roots`
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjRef>) -> GcStats {
        let bytes_before = self.bytes_allocated;
        let mut grey = Vec::new();

        for root in roots {
            self.mark(root, &mut grey);
        }
        self.trace(&mut grey);
        self.remove_white_strings();
        let freed = self.sweep();

        self.next_gc = (self.bytes_allocated * self.growth_factor).max(self.min_threshold);
        self.clear_pending();

        let stats = GcStats {
            bytes_before,
            bytes_after: self.bytes_allocated,
            freed,
            live: self.live,
            next_threshold: self.next_gc,
        };
        debug!(
            freed = stats.freed,
            live = stats.live,
            before = stats.bytes_before,
            after = stats.bytes_after,
            next = stats.next_threshold,
            "gc cycle"
        );
        stats
    }

    fn mark(&mut self, r: ObjRef, grey: &mut Vec<ObjRef>) {
        if let Ok(obj) = self.get_mut(r) {
            if !obj.marked {
                obj.marked = true;
                grey.push(r);
            }
        }
    }

    fn trace(&mut self, grey: &mut Vec<ObjRef>) {
        let mut children = Vec::new();
        while let Some(r) = grey.pop() {
            if let Ok(obj) = self.get(r) {
                references(obj, &mut children);
            }
            for child in children.drain(..) {
                self.mark(child, grey);
            }
        }
    }

    fn remove_white_strings(&mut self) {
        let slots = &self.slots;
        self.strings.retain(|_, r| {
            slots
                .get(r.index() as usize)
                .filter(|s| s.generation == r.generation())
                .and_then(|s| s.object.as_ref())
                .is_some_and(|obj| obj.marked)
        });
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            let generation = slot.generation;
            let white = match slot.object.as_mut() {
                Some(obj) => !std::mem::replace(&mut obj.marked, false),
                None => false,
            };
            if white {
                self.free(ObjRef::new(index as u32, generation));
                freed += 1;
            }
        }
        freed
    }
}

fn push_value(value: Value, out: &mut Vec<ObjRef>) {
    if let Some(r) = value.as_object() {
        out.push(r);
    }
}

fn push_table(table: &Table, out: &mut Vec<ObjRef>) {
    for (key, value) in table {
        out.push(*key);
        push_value(*value, out);
    }
}

/// Every handle `obj` refers to
pub(crate) fn references(obj: &Obj, out: &mut Vec<ObjRef>) {
    push_table(&obj.methods, out);

    match &obj.data {
        ObjData::String(_) | ObjData::Native(_) | ObjData::Range(_) | ObjData::UserData(_) => {}
        ObjData::Array(array) => {
            for item in &array.items {
                push_value(*item, out);
            }
        }
        ObjData::Dictionary(dict) => {
            for (key, value) in &dict.entries {
                push_value(*key, out);
                push_value(*value, out);
            }
        }
        ObjData::Function(function) => {
            out.push(function.name);
            for constant in &function.chunk.constants {
                push_value(*constant, out);
            }
            out.extend(function.module);
        }
        ObjData::Class(class) => out.push(class.name),
        ObjData::Instance(instance) => {
            out.push(instance.class);
            push_table(&instance.fields, out);
        }
        ObjData::BoundMethod(bound) => {
            push_value(bound.receiver, out);
            out.push(bound.method);
        }
        ObjData::Module(module) => {
            out.push(module.name);
            out.extend(module.caller);
        }
        ObjData::Fiber(Some(fiber)) => {
            out.extend(fiber.caller);
            out.extend(fiber.module);
            for value in fiber.stack.values() {
                push_value(*value, out);
            }
            for frame in &fiber.frames {
                out.push(frame.function);
                out.extend(frame.scope);
            }
        }
        // The running fiber's body lives on the VM, which roots it directly
        ObjData::Fiber(None) => {}
    }
}
