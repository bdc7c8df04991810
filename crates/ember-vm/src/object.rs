//! Heap object model
//!
//! Every heap entity is an [`Obj`]: a mark bit, a per-object method table
//! and one of the [`ObjData`] variants. Inter-object references are plain
//! [`ObjRef`] handles; the heap alone decides lifetimes.

use crate::builtins::registry::NativeFn;
use crate::bytecode::Chunk;
use crate::error::VmError;
use crate::value::{ObjRef, Value};
use crate::vm::{CallFrame, Stack};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::mem::size_of;
use std::rc::Rc;

/// Name -> value table keyed by interned string handles
pub type Table = HashMap<ObjRef, Value>;

/// A heap object
#[derive(Debug)]
pub struct Obj {
    pub(crate) marked: bool,
    /// Callable (or plain) entries looked up by property access
    pub methods: Table,
    pub data: ObjData,
}

impl Obj {
    pub fn new(data: ObjData) -> Self {
        Self {
            marked: false,
            methods: Table::new(),
            data,
        }
    }

    pub fn kind(&self) -> ObjKind {
        self.data.kind()
    }

    /// Bytes attributed to this object by the allocator
    pub(crate) fn footprint(&self) -> usize {
        size_of::<Obj>() + table_footprint(&self.methods) + self.data.footprint()
    }
}

fn table_footprint(table: &Table) -> usize {
    table.capacity() * (size_of::<ObjRef>() + size_of::<Value>())
}

/// Object variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjKind {
    String,
    Array,
    Range,
    Dictionary,
    Function,
    Native,
    Class,
    Instance,
    BoundMethod,
    Module,
    Fiber,
    UserData,
}

impl ObjKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjKind::String => "string",
            ObjKind::Array => "array",
            ObjKind::Range => "range",
            ObjKind::Dictionary => "dictionary",
            ObjKind::Function => "function",
            ObjKind::Native => "native function",
            ObjKind::Class => "class",
            ObjKind::Instance => "instance",
            ObjKind::BoundMethod => "bound method",
            ObjKind::Module => "module",
            ObjKind::Fiber => "fiber",
            ObjKind::UserData => "userdata",
        }
    }
}

impl fmt::Display for ObjKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub enum ObjData {
    String(ObjString),
    Array(ObjArray),
    Range(ObjRange),
    Dictionary(ObjDictionary),
    Function(ObjFunction),
    Native(ObjNative),
    Class(ObjClass),
    Instance(ObjInstance),
    BoundMethod(ObjBoundMethod),
    Module(ObjModule),
    /// `None` while the fiber is the one running on the VM
    Fiber(Option<Box<ObjFiber>>),
    UserData(ObjUserData),
}

impl ObjData {
    pub fn kind(&self) -> ObjKind {
        match self {
            ObjData::String(_) => ObjKind::String,
            ObjData::Array(_) => ObjKind::Array,
            ObjData::Range(_) => ObjKind::Range,
            ObjData::Dictionary(_) => ObjKind::Dictionary,
            ObjData::Function(_) => ObjKind::Function,
            ObjData::Native(_) => ObjKind::Native,
            ObjData::Class(_) => ObjKind::Class,
            ObjData::Instance(_) => ObjKind::Instance,
            ObjData::BoundMethod(_) => ObjKind::BoundMethod,
            ObjData::Module(_) => ObjKind::Module,
            ObjData::Fiber(_) => ObjKind::Fiber,
            ObjData::UserData(_) => ObjKind::UserData,
        }
    }

    fn footprint(&self) -> usize {
        match self {
            ObjData::String(s) => s.chars.len(),
            ObjData::Array(a) => a.items.capacity() * size_of::<Value>(),
            ObjData::Dictionary(d) => d.entries.capacity() * 2 * size_of::<Value>(),
            ObjData::Function(f) => f.chunk.footprint(),
            ObjData::Native(n) => n.name.len(),
            ObjData::Instance(i) => table_footprint(&i.fields),
            ObjData::Fiber(Some(fiber)) => fiber.footprint(),
            _ => 0,
        }
    }
}

/// Immutable interned string
#[derive(Debug)]
pub struct ObjString {
    pub chars: Box<str>,
}

#[derive(Debug, Default)]
pub struct ObjArray {
    pub items: Vec<Value>,
}

/// Most elements a range may be expanded into
pub const MAX_RANGE_LEN: usize = 1 << 24;

/// Half-open numeric range `from..to` advanced by `step`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjRange {
    pub from: f64,
    pub to: f64,
    pub step: f64,
}

impl ObjRange {
    pub fn new(from: f64, to: f64) -> Self {
        Self { from, to, step: 1.0 }
    }

    /// Whether `cursor` still lies inside the range for its step direction
    pub fn contains(&self, cursor: f64) -> bool {
        if self.step > 0.0 {
            cursor < self.to
        } else {
            cursor > self.to
        }
    }

    /// Cursor after `cursor`; an error when the step is lost to rounding
    pub fn advance(&self, cursor: f64) -> Result<f64, VmError> {
        let next = cursor + self.step;
        if next == cursor {
            return Err(VmError::Runtime(format!(
                "range {}..{} cannot advance by {} past {}",
                self.from, self.to, self.step, cursor
            )));
        }
        Ok(next)
    }

    /// Number of values the range visits
    pub fn len(&self) -> Result<usize, VmError> {
        if self.step == 0.0 || !self.step.is_finite() {
            return Ok(0);
        }
        let count = ((self.to - self.from) / self.step).ceil();
        if count.is_nan() || count <= 0.0 {
            return Ok(0);
        }
        if count > MAX_RANGE_LEN as f64 {
            return Err(VmError::Runtime(format!(
                "range {}..{} step {} has more than {} elements",
                self.from, self.to, self.step, MAX_RANGE_LEN
            )));
        }
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.len(), Ok(0))
    }

    /// Every value the range visits, in order
    pub fn values(&self) -> Result<Vec<f64>, VmError> {
        let len = self.len()?;
        let mut out = Vec::with_capacity(len);
        if len == 0 {
            return Ok(out);
        }
        let mut cursor = self.from;
        while self.contains(cursor) {
            if out.len() >= MAX_RANGE_LEN {
                return Err(VmError::Runtime(format!(
                    "range {}..{} step {} has more than {} elements",
                    self.from, self.to, self.step, MAX_RANGE_LEN
                )));
            }
            out.push(cursor);
            cursor = self.advance(cursor)?;
        }
        Ok(out)
    }
}

/// Hash map keyed by value identity (strings are interned, so equal text is the same key)
#[derive(Debug, Default)]
pub struct ObjDictionary {
    pub entries: HashMap<Value, Value>,
}

#[derive(Debug)]
pub struct ObjFunction {
    pub name: ObjRef,
    pub arity: u8,
    pub is_async: bool,
    pub chunk: Rc<Chunk>,
    /// Module whose globals this function resolves against; `None` = process globals
    pub module: Option<ObjRef>,
}

pub struct ObjNative {
    pub name: String,
    /// Declared argument count, `-1` for variadic
    pub arity: i8,
    pub function: NativeFn,
}

impl fmt::Debug for ObjNative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjNative")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Methods live in the owning [`Obj::methods`] table
#[derive(Debug)]
pub struct ObjClass {
    pub name: ObjRef,
}

/// Instances start with a copy of their class's methods in [`Obj::methods`]
#[derive(Debug)]
pub struct ObjInstance {
    pub class: ObjRef,
    pub fields: Table,
}

#[derive(Debug)]
pub struct ObjBoundMethod {
    pub receiver: Value,
    /// A function or native function
    pub method: ObjRef,
}

/// Module globals live in the owning [`Obj::methods`] table
#[derive(Debug)]
pub struct ObjModule {
    pub name: ObjRef,
    /// Scope of the importer (`None` = process globals)
    pub caller: Option<ObjRef>,
}

/// What a fiber was created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberKind {
    Root,
    Async,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberState {
    /// Spawned, never run
    Ready,
    Running,
    /// Handed control to the fiber that names it as caller
    Waiting,
    /// Parked on a timer
    Suspended,
    Done,
}

/// An independently suspendable execution context
#[derive(Debug)]
pub struct ObjFiber {
    pub stack: Stack,
    pub frames: Vec<CallFrame>,
    pub caller: Option<ObjRef>,
    pub kind: FiberKind,
    pub state: FiberState,
    /// Module being constructed by this fiber
    pub module: Option<ObjRef>,
}

impl ObjFiber {
    pub fn new(kind: FiberKind, stack: Stack) -> Self {
        Self {
            stack,
            frames: Vec::new(),
            caller: None,
            kind,
            state: FiberState::Ready,
            module: None,
        }
    }

    pub(crate) fn footprint(&self) -> usize {
        self.stack.footprint() + self.frames.capacity() * size_of::<CallFrame>()
    }
}

type Destructor = Box<dyn FnOnce(Box<dyn Any>)>;

/// Opaque host state with an optional destructor, run when the object is swept
pub struct ObjUserData {
    data: Option<Box<dyn Any>>,
    destructor: Option<Destructor>,
}

impl ObjUserData {
    pub fn new(data: Box<dyn Any>, destructor: Option<Destructor>) -> Self {
        Self {
            data: Some(data),
            destructor,
        }
    }

    pub fn data(&self) -> Option<&dyn Any> {
        self.data.as_deref()
    }

    pub fn data_mut(&mut self) -> Option<&mut dyn Any> {
        self.data.as_deref_mut()
    }
}

impl Drop for ObjUserData {
    fn drop(&mut self) {
        if let (Some(data), Some(destructor)) = (self.data.take(), self.destructor.take()) {
            destructor(data);
        }
    }
}

impl fmt::Debug for ObjUserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjUserData")
            .field("has_destructor", &self.destructor.is_some())
            .finish()
    }
}
