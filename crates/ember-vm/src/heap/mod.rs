//! Object heap and allocator
//!
//! The heap is an arena of slots addressed by [`ObjRef`] (index +
//! generation). It is the sole owner of every object. All size changes go
//! through [`Heap::reallocate`], which keeps a running byte total and raises
//! a pending-collection flag once the total crosses the current threshold.
//! The flag is only acted on by the VM at a safe point.

use crate::error::VmError;
use crate::object::{
    Obj, ObjArray, ObjClass, ObjData, ObjDictionary, ObjFunction, ObjInstance, ObjKind,
    ObjModule, ObjRange, ObjString, Table,
};
use crate::value::{ObjRef, Value, GENERATION_MASK};
use std::collections::HashMap;

mod gc;

/// Default bytes allocated before the first collection
pub const DEFAULT_GC_THRESHOLD: usize = 512 * 1024;

/// Default multiplier applied to live bytes after a collection
pub const DEFAULT_GC_GROWTH: usize = 2;

#[derive(Debug)]
struct Slot {
    generation: u32,
    /// Bytes currently accounted to this slot
    size: usize,
    object: Option<Obj>,
}

/// Statistics for one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub freed: usize,
    pub live: usize,
    pub next_threshold: usize,
}

pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Intern table: at most one live string object per content
    pub(crate) strings: HashMap<Box<str>, ObjRef>,
    bytes_allocated: usize,
    pub(crate) next_gc: usize,
    pub(crate) growth_factor: usize,
    pub(crate) min_threshold: usize,
    collect_pending: bool,
    live: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_GC_THRESHOLD, DEFAULT_GC_GROWTH)
    }

    pub fn with_threshold(initial_threshold: usize, growth_factor: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            strings: HashMap::new(),
            bytes_allocated: 0,
            next_gc: initial_threshold,
            growth_factor: growth_factor.max(1),
            min_threshold: initial_threshold,
            collect_pending: false,
            live: 0,
        }
    }

    /// The single accounting choke point for growing, shrinking or freeing
    pub fn reallocate(&mut self, old_size: usize, new_size: usize) {
        self.bytes_allocated = (self.bytes_allocated + new_size).saturating_sub(old_size);
        if new_size > old_size && self.bytes_allocated > self.next_gc {
            self.collect_pending = true;
        }
    }

    /// A threshold crossing happened since the last collection
    #[inline]
    pub fn should_collect(&self) -> bool {
        self.collect_pending
    }

    pub(crate) fn clear_pending(&mut self) {
        self.collect_pending = false;
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn next_threshold(&self) -> usize {
        self.next_gc
    }

    /// Number of live objects
    pub fn object_count(&self) -> usize {
        self.live
    }

    /// Move an object into the heap
    pub fn alloc(&mut self, data: ObjData) -> ObjRef {
        let object = Obj::new(data);
        let size = object.footprint();
        self.reallocate(0, size);
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.size = size;
            slot.object = Some(object);
            ObjRef::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                size,
                object: Some(object),
            });
            ObjRef::new(index, 0)
        }
    }

    /// Drop the object in `r`'s slot and recycle the slot
    pub(crate) fn free(&mut self, r: ObjRef) {
        let Some(slot) = self.slots.get_mut(r.index() as usize) else {
            return;
        };
        if slot.generation != r.generation() || slot.object.is_none() {
            return;
        }
        let size = slot.size;
        slot.size = 0;
        slot.generation = (slot.generation + 1) & GENERATION_MASK;
        let object = slot.object.take();
        self.free.push(r.index());
        self.live -= 1;
        self.reallocate(size, 0);
        drop(object);
    }

    pub fn is_live(&self, r: ObjRef) -> bool {
        self.slot(r).is_some()
    }

    fn slot(&self, r: ObjRef) -> Option<&Slot> {
        self.slots
            .get(r.index() as usize)
            .filter(|s| s.generation == r.generation() && s.object.is_some())
    }

    #[inline]
    pub fn get(&self, r: ObjRef) -> Result<&Obj, VmError> {
        self.slots
            .get(r.index() as usize)
            .filter(|s| s.generation == r.generation())
            .and_then(|s| s.object.as_ref())
            .ok_or(VmError::DanglingReference)
    }

    /// Mutable access without re-accounting; use [`Heap::mutate`] when the object may grow
    #[inline]
    pub fn get_mut(&mut self, r: ObjRef) -> Result<&mut Obj, VmError> {
        self.slots
            .get_mut(r.index() as usize)
            .filter(|s| s.generation == r.generation())
            .and_then(|s| s.object.as_mut())
            .ok_or(VmError::DanglingReference)
    }

    /// Mutate an object and account for any change in its size
    pub fn mutate<R>(&mut self, r: ObjRef, f: impl FnOnce(&mut Obj) -> R) -> Result<R, VmError> {
        let slot = self
            .slots
            .get_mut(r.index() as usize)
            .filter(|s| s.generation == r.generation())
            .ok_or(VmError::DanglingReference)?;
        let object = slot.object.as_mut().ok_or(VmError::DanglingReference)?;
        let result = f(object);
        let new_size = object.footprint();
        let old_size = std::mem::replace(&mut slot.size, new_size);
        if new_size != old_size {
            self.reallocate(old_size, new_size);
        }
        Ok(result)
    }

    pub fn kind(&self, r: ObjRef) -> Result<ObjKind, VmError> {
        Ok(self.get(r)?.kind())
    }

    /// Kind of an object value, `None` for scalars or stale handles
    pub fn kind_of(&self, value: Value) -> Option<ObjKind> {
        value
            .as_object()
            .and_then(|r| self.get(r).ok())
            .map(Obj::kind)
    }

    /// Describe a value's type for error messages
    pub fn type_name(&self, value: Value) -> &'static str {
        match self.kind_of(value) {
            Some(kind) => kind.name(),
            None => value.kind_name(),
        }
    }

    // ===== Strings =====

    /// Canonical string object for `text`, allocating it on first use
    pub fn intern(&mut self, text: &str) -> ObjRef {
        if let Some(&r) = self.strings.get(text) {
            return r;
        }
        let r = self.alloc(ObjData::String(ObjString {
            chars: text.into(),
        }));
        self.strings.insert(text.into(), r);
        r
    }

    /// Interned string for `text` if one is live
    pub fn find_interned(&self, text: &str) -> Option<ObjRef> {
        self.strings.get(text).copied()
    }

    pub fn interned_count(&self) -> usize {
        self.strings.len()
    }

    pub fn string(&self, r: ObjRef) -> Result<&str, VmError> {
        match &self.get(r)?.data {
            ObjData::String(s) => Ok(&s.chars),
            other => Err(VmError::type_error("string access", "string", other.kind().name())),
        }
    }

    /// Text of a string value
    pub fn as_str(&self, value: Value) -> Option<&str> {
        value.as_object().and_then(|r| self.string(r).ok())
    }

    // ===== Typed constructors =====

    pub fn new_array(&mut self, items: Vec<Value>) -> ObjRef {
        self.alloc(ObjData::Array(ObjArray { items }))
    }

    pub fn new_range(&mut self, range: ObjRange) -> ObjRef {
        self.alloc(ObjData::Range(range))
    }

    pub fn new_dictionary(&mut self) -> ObjRef {
        self.alloc(ObjData::Dictionary(ObjDictionary::default()))
    }

    pub fn new_class(&mut self, name: ObjRef) -> ObjRef {
        self.alloc(ObjData::Class(ObjClass { name }))
    }

    pub fn new_module(&mut self, name: ObjRef, caller: Option<ObjRef>) -> ObjRef {
        self.alloc(ObjData::Module(ObjModule { name, caller }))
    }

    /// New instance holding a snapshot of the class's method table
    pub fn new_instance(&mut self, class: ObjRef) -> Result<ObjRef, VmError> {
        let methods = self.get(class)?.methods.clone();
        let r = self.alloc(ObjData::Instance(ObjInstance {
            class,
            fields: Table::new(),
        }));
        self.mutate(r, |obj| obj.methods = methods)?;
        Ok(r)
    }

    // ===== Typed accessors =====

    pub fn array(&self, r: ObjRef) -> Result<&ObjArray, VmError> {
        match &self.get(r)?.data {
            ObjData::Array(a) => Ok(a),
            other => Err(VmError::type_error("array access", "array", other.kind().name())),
        }
    }

    pub fn range(&self, r: ObjRef) -> Result<ObjRange, VmError> {
        match &self.get(r)?.data {
            ObjData::Range(range) => Ok(*range),
            other => Err(VmError::type_error("range access", "range", other.kind().name())),
        }
    }

    pub fn dictionary(&self, r: ObjRef) -> Result<&ObjDictionary, VmError> {
        match &self.get(r)?.data {
            ObjData::Dictionary(d) => Ok(d),
            other => Err(VmError::type_error(
                "dictionary access",
                "dictionary",
                other.kind().name(),
            )),
        }
    }

    pub fn function(&self, r: ObjRef) -> Result<&ObjFunction, VmError> {
        match &self.get(r)?.data {
            ObjData::Function(f) => Ok(f),
            other => Err(VmError::type_error("call", "function", other.kind().name())),
        }
    }

    pub fn instance(&self, r: ObjRef) -> Result<&ObjInstance, VmError> {
        match &self.get(r)?.data {
            ObjData::Instance(i) => Ok(i),
            other => Err(VmError::type_error(
                "property access",
                "instance",
                other.kind().name(),
            )),
        }
    }

    pub fn module(&self, r: ObjRef) -> Result<&ObjModule, VmError> {
        match &self.get(r)?.data {
            ObjData::Module(m) => Ok(m),
            other => Err(VmError::type_error("module access", "module", other.kind().name())),
        }
    }

    /// Append to an array, accounting for growth
    pub fn array_push(&mut self, r: ObjRef, value: Value) -> Result<(), VmError> {
        self.mutate(r, |obj| match &mut obj.data {
            ObjData::Array(a) => {
                a.items.push(value);
                Ok(())
            }
            other => Err(VmError::type_error("append", "array", other.kind().name())),
        })?
    }

    /// Handles of every live object
    pub fn handles(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.object
                .as_ref()
                .map(|_| ObjRef::new(i as u32, s.generation))
        })
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_same_handle() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        let c = heap.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(heap.string(a).unwrap(), "hello");
        assert_eq!(heap.object_count(), 2);
    }

    #[test]
    fn test_allocation_is_accounted() {
        let mut heap = Heap::new();
        assert_eq!(heap.bytes_allocated(), 0);
        let r = heap.new_array(Vec::new());
        let after_alloc = heap.bytes_allocated();
        assert!(after_alloc > 0);
        for i in 0..64 {
            heap.array_push(r, Value::number(i as f64)).unwrap();
        }
        assert!(heap.bytes_allocated() > after_alloc);
        heap.free(r);
        assert_eq!(heap.bytes_allocated(), 0);
    }

    #[test]
    fn test_threshold_raises_pending_flag() {
        let mut heap = Heap::with_threshold(64, 2);
        assert!(!heap.should_collect());
        heap.new_array(vec![Value::NIL; 32]);
        assert!(heap.should_collect());
    }

    #[test]
    fn test_freed_slot_rejects_stale_handle() {
        let mut heap = Heap::new();
        let old = heap.new_dictionary();
        heap.free(old);
        let new = heap.new_dictionary();
        assert_eq!(old.index(), new.index());
        assert!(!heap.is_live(old));
        assert!(heap.is_live(new));
        assert_eq!(heap.get(old).err(), Some(VmError::DanglingReference));
    }

    #[test]
    fn test_instance_copies_class_methods() {
        let mut heap = Heap::new();
        let name = heap.intern("Point");
        let class = heap.new_class(name);
        let method = heap.intern("area");
        heap.get_mut(class).unwrap().methods.insert(method, Value::TRUE);

        let instance = heap.new_instance(class).unwrap();
        let late = heap.intern("late");
        heap.get_mut(class).unwrap().methods.insert(late, Value::FALSE);

        let methods = &heap.get(instance).unwrap().methods;
        assert!(methods.contains_key(&method));
        assert!(!methods.contains_key(&late));
    }
}
