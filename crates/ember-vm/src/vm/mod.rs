//! Virtual Machine implementation
//!
//! A [`VM`] owns the heap, the process globals and every fiber. Exactly one
//! fiber executes at a time; the others are parked inside the heap. Before
//! each instruction the run loop reaches a safe point where it fires
//! expired timers, handles host events, picks the next fiber when none is
//! running and collects garbage when the heap asks for it.

use crate::builtins::{
    self,
    registry::{BuiltinModule, BuiltinRegistry, NativeFn},
};
use crate::bytecode::{Chunk, Constant, FunctionProto};
use crate::bytecode_debug::disassemble_instruction;
use crate::compiler::{BytecodeCompiler, ScriptCompiler};
use crate::config::VmConfig;
use crate::error::{InterpretError, VmError};
use crate::events::{Clock, Event, EventQueue, SystemClock, Timers};
use crate::heap::Heap;
use crate::host::{IoHost, StdIo};
use crate::object::{
    FiberKind, ObjData, ObjFiber, ObjFunction, ObjKind, ObjNative, ObjUserData, Table,
};
use crate::opcode::OpCode;
use crate::value::{ObjRef, Value};
use std::any::Any;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace};

// Module structure
mod execution;
mod fiber;
mod frame;
mod intrinsics;
mod memory;
mod ops;
mod result;
mod stack;

// Re-export public types
pub use frame::CallFrame;
pub use ops::{display_value, values_equal};
pub use stack::Stack;

use intrinsics::Intrinsics;
use result::ExecutionResult;

/// The fiber currently executing; its body lives here instead of the heap
pub(crate) struct Running {
    pub(crate) id: ObjRef,
    pub(crate) fiber: Box<ObjFiber>,
    /// Bytes of `fiber` currently reported to the heap
    pub(crate) accounted: usize,
}

/// Virtual Machine
pub struct VM {
    pub(crate) heap: Heap,
    pub(crate) config: VmConfig,

    /// Process-wide globals
    pub(crate) globals: Table,

    /// Loaded modules by import name
    pub(crate) modules: Table,

    /// Modules whose top level is still running, innermost last
    pub(crate) module_stack: Vec<ObjRef>,

    pub(crate) running: Option<Running>,

    /// Fiber of the script passed to [`VM::interpret`] until it finishes
    pub(crate) root_fiber: Option<ObjRef>,

    /// Spawned async fibers waiting for the VM to go idle
    pub(crate) ready: VecDeque<ObjRef>,

    pub(crate) events: EventQueue,
    pub(crate) timers: Timers,
    pub(crate) io: Box<dyn IoHost>,
    pub(crate) compiler: Box<dyn ScriptCompiler>,

    /// Native modules importable by name
    pub(crate) builtins: BuiltinRegistry,

    /// Per-kind methods of arrays, ranges, dictionaries and strings
    pub(crate) intrinsics: Intrinsics,

    exported: Vec<String>,
}

impl VM {
    /// Create a VM with the default configuration
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut vm = Self {
            heap: Heap::with_threshold(config.gc_initial_threshold, config.gc_growth_factor),
            config,
            globals: Table::new(),
            modules: Table::new(),
            module_stack: Vec::new(),
            running: None,
            root_fiber: None,
            ready: VecDeque::new(),
            events: EventQueue::new(),
            timers: Timers::new(Box::new(SystemClock::new())),
            io: Box::new(StdIo),
            compiler: Box::new(BytecodeCompiler),
            builtins: builtins::create_builtin_registry(),
            intrinsics: Intrinsics::new(),
            exported: Vec::new(),
        };

        for (kind, methods) in builtins::create_intrinsics() {
            vm.intrinsics.install(&mut vm.heap, kind, &methods);
        }
        for primitive in builtins::primitives::globals().functions() {
            vm.add_native_function(&primitive.name, primitive.func, primitive.arity);
        }
        vm
    }

    /// Route file reads and printing through `io`
    pub fn with_io(mut self, io: impl IoHost + 'static) -> Self {
        self.io = Box::new(io);
        self
    }

    /// Compiler used for source text and user modules
    pub fn with_compiler(mut self, compiler: impl ScriptCompiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    /// Time source for timers
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.timers = Timers::new(Box::new(clock));
        self
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn io(&mut self) -> &mut dyn IoHost {
        self.io.as_mut()
    }

    /// Current reading of the timer clock
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    // ===== Running code =====

    /// Compile `source` with the configured compiler and run it
    pub fn interpret_source(&mut self, source: &str) -> Result<(), InterpretError> {
        let proto = self.compiler.compile(source).map_err(|err| {
            debug!(diagnostics = err.diagnostics.len(), "compilation failed");
            InterpretError::Compile(err)
        })?;
        self.interpret(&proto)
    }

    /// Run a top-level function until it and every fiber it started are done
    ///
    /// A runtime error halts the whole VM: every fiber is discarded, the
    /// globals survive and the VM can run another script.
    pub fn interpret(&mut self, proto: &FunctionProto) -> Result<(), InterpretError> {
        let function = self.load_function(proto, None);
        match self.start_root(function).and_then(|()| self.run()) {
            Ok(()) => Ok(()),
            Err(err) => {
                let backtrace = self.backtrace();
                debug!(error = %err, "runtime error");
                for line in &backtrace {
                    debug!("  {}", line);
                }
                self.reset();
                Err(InterpretError::Runtime {
                    error: err,
                    backtrace,
                })
            }
        }
    }

    /// Turn a prototype into a function object, stamping it with `module`
    pub(crate) fn load_function(&mut self, proto: &FunctionProto, module: Option<ObjRef>) -> ObjRef {
        let mut constants = Vec::with_capacity(proto.constants.len());
        for constant in &proto.constants {
            let value = match constant {
                Constant::Nil => Value::NIL,
                Constant::Bool(b) => Value::bool(*b),
                Constant::Number(n) => Value::number(*n),
                Constant::String(s) => Value::object(self.heap.intern(s)),
                Constant::Function(inner) => Value::object(self.load_function(inner, module)),
            };
            constants.push(value);
        }

        let name = self.heap.intern(&proto.name);
        let chunk = Chunk {
            code: proto.code.clone(),
            constants,
            lines: proto.lines.clone(),
        };
        self.heap.alloc(ObjData::Function(ObjFunction {
            name,
            arity: proto.arity,
            is_async: proto.is_async,
            chunk: Rc::new(chunk),
            module,
        }))
    }

    fn start_root(&mut self, function: ObjRef) -> Result<(), VmError> {
        let fiber = self.new_fiber(FiberKind::Root, function, &[], None)?;
        self.root_fiber = Some(fiber);
        self.resume_fiber(fiber)
    }

    /// Main execution loop
    fn run(&mut self) -> Result<(), VmError> {
        while self.safe_point()? {
            let byte = self.read_byte()?;
            let opcode = OpCode::from_u8(byte).ok_or(VmError::InvalidOpcode(byte))?;

            match self.execute_instruction(opcode)? {
                ExecutionResult::Continue => {}
                ExecutionResult::Suspended | ExecutionResult::Finished => {
                    trace!(?opcode, "fiber switch");
                }
            }
        }
        Ok(())
    }

    /// Work done between instructions; `false` once there is nothing left to run
    fn safe_point(&mut self) -> Result<bool, VmError> {
        loop {
            self.timers.poll(&mut self.events);
            while let Some(event) = self.events.pop() {
                self.handle_event(event)?;
            }

            if self.running.is_some() {
                break;
            }
            if self.start_next_ready()? {
                continue;
            }
            if self.timers.active() > 0 {
                self.timers.wait(&mut self.events);
                continue;
            }
            if self.root_fiber.is_none() {
                return Ok(false);
            }
            return Err(VmError::Runtime(
                "no runnable fiber and no pending timers".into(),
            ));
        }

        self.maybe_collect();
        if self.config.trace_execution {
            self.trace_instruction();
        }
        Ok(true)
    }

    /// Dispatch one decoded opcode to its family handler
    fn execute_instruction(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::Negate
            | OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Power
            | OpCode::Modulo
            | OpCode::Increment
            | OpCode::Decrement => self.execute_arithmetic(opcode),

            OpCode::Equal | OpCode::Greater | OpCode::Less | OpCode::Not => {
                self.execute_comparison(opcode)
            }

            OpCode::Constant
            | OpCode::ConstantLong
            | OpCode::Nil
            | OpCode::True
            | OpCode::False
            | OpCode::Pop
            | OpCode::DefineGlobal
            | OpCode::GetGlobal
            | OpCode::ExportGlobal
            | OpCode::SetGlobal
            | OpCode::GetLocal
            | OpCode::SetLocal => self.execute_variables(opcode),

            OpCode::JumpIfFalse | OpCode::Jump | OpCode::Loop | OpCode::Return | OpCode::Throw => {
                self.execute_control(opcode)
            }

            OpCode::Call | OpCode::Invoke => self.execute_functions(opcode),

            OpCode::CreateList
            | OpCode::SubscriptRead
            | OpCode::SubscriptWrite
            | OpCode::SliceArray
            | OpCode::CreateRange => self.execute_collections(opcode),

            OpCode::Class | OpCode::GetProperty | OpCode::SetProperty | OpCode::Method => {
                self.execute_objects(opcode)
            }

            OpCode::Iter => self.execute_iterators(opcode),
            OpCode::StringInterp => self.execute_strings(opcode),
            OpCode::ImportModule | OpCode::ImportModuleAs => self.execute_modules(opcode),
            OpCode::Await => self.execute_fibers(opcode),
        }
    }

    fn trace_instruction(&self) {
        let Some(running) = &self.running else {
            return;
        };
        let Some(frame) = running.fiber.frames.last() else {
            return;
        };
        let describe = |index: usize| {
            frame
                .chunk
                .constants
                .get(index)
                .map(|value| display_value(&self.heap, *value))
                .unwrap_or_else(|| "?".to_string())
        };
        let (text, _) = disassemble_instruction(&frame.chunk.code, frame.ip, &describe);
        trace!(
            frames = running.fiber.frames.len(),
            stack = running.fiber.stack.len(),
            "{}",
            text
        );
    }

    /// Active frames of the running fiber, innermost first
    fn backtrace(&self) -> Vec<String> {
        let Some(running) = &self.running else {
            return Vec::new();
        };
        running
            .fiber
            .frames
            .iter()
            .rev()
            .map(|frame| {
                let line = frame
                    .current_line()
                    .map_or_else(|| "?".to_string(), |line| line.to_string());
                let name = self
                    .heap
                    .function(frame.function)
                    .ok()
                    .and_then(|f| self.heap.string(f.name).ok())
                    .unwrap_or("");
                if name.is_empty() || name == "script" {
                    format!("[line {}] in script", line)
                } else {
                    format!("[line {}] in {}()", line, name)
                }
            })
            .collect()
    }

    /// Drop every fiber after a runtime error
    fn reset(&mut self) {
        if let Some(running) = self.running.take() {
            self.heap.reallocate(running.accounted, 0);
        }
        // half-loaded modules must be importable again
        for module in self.module_stack.drain(..) {
            self.modules.retain(|_, value| value.as_object() != Some(module));
        }
        self.root_fiber = None;
        self.ready.clear();
        self.events = EventQueue::new();
        self.timers.clear();
    }

    /// Queue a host event for the next safe point
    pub fn post_event(&mut self, event: Event) {
        self.events.push(event);
    }

    // ===== Fetch helpers =====

    #[inline]
    pub(crate) fn fiber(&self) -> Result<&ObjFiber, VmError> {
        self.running
            .as_ref()
            .map(|running| running.fiber.as_ref())
            .ok_or_else(no_fiber)
    }

    #[inline]
    pub(crate) fn fiber_mut(&mut self) -> Result<&mut ObjFiber, VmError> {
        self.running
            .as_mut()
            .map(|running| running.fiber.as_mut())
            .ok_or_else(no_fiber)
    }

    pub(crate) fn running_id(&self) -> Result<ObjRef, VmError> {
        self.running
            .as_ref()
            .map(|running| running.id)
            .ok_or_else(no_fiber)
    }

    #[inline]
    pub(crate) fn frame(&self) -> Result<&CallFrame, VmError> {
        self.fiber()?.frames.last().ok_or(VmError::StackUnderflow)
    }

    #[inline]
    pub(crate) fn frame_mut(&mut self) -> Result<&mut CallFrame, VmError> {
        self.fiber_mut()?
            .frames
            .last_mut()
            .ok_or(VmError::StackUnderflow)
    }

    #[inline]
    pub(crate) fn read_byte(&mut self) -> Result<u8, VmError> {
        self.frame_mut()?
            .fetch()
            .ok_or_else(|| VmError::InvalidBytecode("unexpected end of code".into()))
    }

    #[inline]
    pub(crate) fn read_u16(&mut self) -> Result<u16, VmError> {
        let hi = self.read_byte()?;
        let lo = self.read_byte()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    pub(crate) fn read_constant(&self, index: usize) -> Result<Value, VmError> {
        self.frame()?
            .chunk
            .constants
            .get(index)
            .copied()
            .ok_or(VmError::InvalidConstant(index))
    }

    /// Read a u16 operand naming a string constant
    pub(crate) fn read_name(&mut self) -> Result<ObjRef, VmError> {
        let index = self.read_u16()? as usize;
        self.read_constant(index)?
            .as_object()
            .filter(|r| matches!(self.heap.kind(*r), Ok(ObjKind::String)))
            .ok_or_else(|| VmError::InvalidBytecode(format!("constant {} is not a name", index)))
    }

    /// Move the instruction pointer by a signed distance
    pub(crate) fn jump(&mut self, forward: bool, offset: usize) -> Result<(), VmError> {
        let frame = self.frame_mut()?;
        let target = if forward {
            frame.ip.checked_add(offset)
        } else {
            frame.ip.checked_sub(offset)
        };
        match target.filter(|ip| *ip <= frame.chunk.code.len()) {
            Some(ip) => {
                frame.ip = ip;
                Ok(())
            }
            None => Err(VmError::InvalidBytecode(format!(
                "jump target out of range at offset {}",
                frame.ip
            ))),
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, value: Value) -> Result<(), VmError> {
        self.fiber_mut()?.stack.push(value)
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Result<Value, VmError> {
        self.fiber_mut()?.stack.pop()
    }

    #[inline]
    pub(crate) fn peek(&self, distance: usize) -> Result<Value, VmError> {
        self.fiber()?.stack.peek(distance)
    }

    #[inline]
    pub(crate) fn set_peek(&mut self, distance: usize, value: Value) -> Result<(), VmError> {
        self.fiber_mut()?.stack.set_peek(distance, value)
    }

    /// Text of an interned name, for messages
    pub(crate) fn name_text(&self, name: ObjRef) -> String {
        self.heap.string(name).unwrap_or("?").to_string()
    }

    // ===== Host API =====

    /// Canonical string value for `text`
    pub fn intern(&mut self, text: &str) -> Value {
        Value::object(self.heap.intern(text))
    }

    pub fn new_array(&mut self, items: Vec<Value>) -> Value {
        Value::object(self.heap.new_array(items))
    }

    pub fn new_dictionary(&mut self) -> Value {
        Value::object(self.heap.new_dictionary())
    }

    pub fn string_value(&self, value: Value) -> Option<&str> {
        self.heap.as_str(value)
    }

    pub fn array_items(&self, value: Value) -> Option<&[Value]> {
        let r = value.as_object()?;
        self.heap.array(r).ok().map(|array| array.items.as_slice())
    }

    /// Rendering used by `print` and string interpolation
    pub fn display(&self, value: Value) -> String {
        display_value(&self.heap, value)
    }

    pub fn values_equal(&self, left: Value, right: Value) -> bool {
        values_equal(&self.heap, left, right)
    }

    /// Process global by name
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let key = self.heap.find_interned(name)?;
        self.globals.get(&key).copied()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        let key = self.heap.intern(name);
        self.globals.insert(key, value);
    }

    /// Instance field, or an entry of the object's method table
    pub fn get_field(&self, target: Value, name: &str) -> Option<Value> {
        let r = target.as_object()?;
        let key = self.heap.find_interned(name)?;
        let obj = self.heap.get(r).ok()?;
        if let ObjData::Instance(instance) = &obj.data {
            if let Some(value) = instance.fields.get(&key) {
                return Some(*value);
            }
        }
        obj.methods.get(&key).copied()
    }

    /// Set an instance field
    pub fn set_field(&mut self, target: Value, name: &str, value: Value) -> Result<(), VmError> {
        let r = target
            .as_object()
            .ok_or_else(|| VmError::type_error("set field", "instance", target.kind_name()))?;
        let key = self.heap.intern(name);
        self.heap.mutate(r, |obj| match &mut obj.data {
            ObjData::Instance(instance) => {
                instance.fields.insert(key, value);
                Ok(())
            }
            other => Err(VmError::type_error(
                "set field",
                "instance",
                other.kind().name(),
            )),
        })?
    }

    /// Allocate a native function object
    pub fn new_native(&mut self, name: &str, function: NativeFn, arity: i8) -> Value {
        Value::object(self.heap.alloc(ObjData::Native(ObjNative {
            name: name.to_string(),
            arity,
            function,
        })))
    }

    /// Bind a native function in the process globals
    pub fn add_native_function(&mut self, name: &str, function: NativeFn, arity: i8) {
        let native = self.new_native(name, function, arity);
        self.set_global(name, native);
    }

    /// Bind a new class in the process globals and return a builder for its methods
    pub fn add_native_class(&mut self, name: &str) -> NativeClassBuilder<'_> {
        let key = self.heap.intern(name);
        let class = self.heap.new_class(key);
        self.globals.insert(key, Value::object(class));
        NativeClassBuilder { vm: self, class }
    }

    /// Make a native module importable as `name`
    pub fn register_builtin_module(&mut self, name: &str, module: BuiltinModule) {
        self.builtins.insert(name, module);
    }

    /// Wrap host state; `destructor` runs when the object is collected
    pub fn create_user_data(
        &mut self,
        data: Box<dyn Any>,
        destructor: Option<Box<dyn FnOnce(Box<dyn Any>)>>,
    ) -> Value {
        Value::object(
            self.heap
                .alloc(ObjData::UserData(ObjUserData::new(data, destructor))),
        )
    }

    pub fn user_data<T: 'static>(&self, value: Value) -> Option<&T> {
        let r = value.as_object()?;
        match &self.heap.get(r).ok()?.data {
            ObjData::UserData(user) => user.data()?.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn user_data_mut<T: 'static>(&mut self, value: Value) -> Option<&mut T> {
        let r = value.as_object()?;
        match &mut self.heap.get_mut(r).ok()?.data {
            ObjData::UserData(user) => user.data_mut()?.downcast_mut::<T>(),
            _ => None,
        }
    }

    /// Operand stack height of the running fiber
    pub fn stack_depth(&self) -> usize {
        self.running
            .as_ref()
            .map_or(0, |running| running.fiber.stack.len())
    }

    /// Call frames of the running fiber
    pub fn frame_depth(&self) -> usize {
        self.running
            .as_ref()
            .map_or(0, |running| running.fiber.frames.len())
    }

    /// Names recorded by EXPORT_GLOBAL, in first-export order
    pub fn exported_names(&self) -> &[String] {
        &self.exported
    }

    pub(crate) fn record_export(&mut self, name: ObjRef) {
        let text = self.name_text(name);
        if !self.exported.contains(&text) {
            self.exported.push(text);
        }
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

fn no_fiber() -> VmError {
    VmError::Runtime("no fiber is running".into())
}

/// Builder returned by [`VM::add_native_class`]
pub struct NativeClassBuilder<'vm> {
    vm: &'vm mut VM,
    class: ObjRef,
}

impl NativeClassBuilder<'_> {
    /// Native `construct`; it receives the new instance as `args[0]`
    pub fn constructor(self, function: NativeFn, arity: i8) -> Self {
        self.method("construct", function, arity)
    }

    pub fn method(self, name: &str, function: NativeFn, arity: i8) -> Self {
        let native = self.vm.new_native(name, function, arity);
        let key = self.vm.heap.intern(name);
        let installed = self.vm.heap.mutate(self.class, |obj| {
            obj.methods.insert(key, native);
        });
        if installed.is_err() {
            debug!(method = name, "native class vanished before method install");
        }
        self
    }

    pub fn build(self) -> Value {
        Value::object(self.class)
    }
}
