//! Call dispatch by callable kind
//!
//! A call region is `[callee, args...]` on the running fiber's stack. Slot 0
//! of the region becomes slot 0 of the callee's frame: the function itself
//! for plain calls, the receiver for method and class calls.

use crate::error::VmError;
use crate::object::{ObjData, ObjKind};
use crate::opcode::OpCode;
use crate::value::{ObjRef, Value};
use crate::vm::frame::CallFrame;
use crate::vm::result::ExecutionResult;
use crate::vm::VM;

impl VM {
    /// Execute function call instructions
    pub(crate) fn execute_functions(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::Call => {
                let argc = self.read_byte()? as usize;
                let callee = self.peek(argc)?;
                self.call_value(callee, argc)
            }

            OpCode::Invoke => {
                let name = self.read_name()?;
                let argc = self.read_byte()? as usize;
                self.invoke(name, argc)
            }

            _ => unreachable!("Non-function opcode in function handler"),
        }
    }

    /// Call whatever `callee` is with the `argc` values above it
    pub(crate) fn call_value(&mut self, callee: Value, argc: usize) -> Result<ExecutionResult, VmError> {
        let Some(r) = callee.as_object() else {
            return Err(VmError::NotCallable(callee.kind_name().to_string()));
        };

        match self.heap.kind(r)? {
            ObjKind::Function => self.call_function(r, argc, false),
            ObjKind::Native => self.call_native(r, argc, None),
            ObjKind::Class => self.call_class(r, argc),
            ObjKind::BoundMethod => {
                let (receiver, method) = match &self.heap.get(r)?.data {
                    ObjData::BoundMethod(bound) => (bound.receiver, bound.method),
                    _ => return Err(VmError::NotCallable("bound method".into())),
                };
                self.set_peek(argc, receiver)?;
                self.call_method(receiver, Value::object(method), argc)
            }
            other => Err(VmError::NotCallable(other.name().to_string())),
        }
    }

    /// Push a frame for a bytecode function, or spawn it when it is async
    pub(crate) fn call_function(
        &mut self,
        function: ObjRef,
        argc: usize,
        initializer: bool,
    ) -> Result<ExecutionResult, VmError> {
        let (arity, is_async, chunk, scope, name) = {
            let f = self.heap.function(function)?;
            (f.arity as usize, f.is_async, f.chunk.clone(), f.module, f.name)
        };

        if argc != arity {
            return Err(VmError::Arity {
                callee: self.name_text(name),
                expected: arity,
                got: argc,
            });
        }

        if is_async {
            self.spawn_async(function, argc)?;
            return Ok(ExecutionResult::Continue);
        }

        let max_frames = self.config.max_frames;
        let fiber = self.fiber_mut()?;
        if fiber.frames.len() >= max_frames {
            return Err(VmError::StackOverflow(max_frames));
        }

        let base = fiber.stack.len() - argc - 1;
        let mut frame = CallFrame::new(function, chunk, base, scope);
        frame.initializer = initializer;
        fiber.frames.push(frame);
        Ok(ExecutionResult::Continue)
    }

    /// Run a native synchronously and collapse its call region to the result
    ///
    /// `receiver`, when given, is passed as `args[0]` ahead of the call's
    /// own arguments and is not counted against the declared arity.
    pub(crate) fn call_native(
        &mut self,
        native: ObjRef,
        argc: usize,
        receiver: Option<Value>,
    ) -> Result<ExecutionResult, VmError> {
        let (function, arity, name) = match &self.heap.get(native)?.data {
            ObjData::Native(n) => (n.function, n.arity, n.name.clone()),
            other => return Err(VmError::NotCallable(other.kind().name().to_string())),
        };

        if arity >= 0 && arity as usize != argc {
            return Err(VmError::Arity {
                callee: name,
                expected: arity as usize,
                got: argc,
            });
        }

        let mut args = Vec::with_capacity(argc + 1);
        args.extend(receiver);
        args.extend(self.fiber()?.stack.top_slice(argc)?);

        let result = function(self, &args)?;

        let stack = &mut self.fiber_mut()?.stack;
        let base = stack.len() - argc - 1;
        stack.truncate(base);
        stack.push(result)?;
        Ok(ExecutionResult::Continue)
    }

    /// Instantiate a class, running `construct` when it has one
    fn call_class(&mut self, class: ObjRef, argc: usize) -> Result<ExecutionResult, VmError> {
        let instance = Value::object(self.heap.new_instance(class)?);
        self.set_peek(argc, instance)?;

        let construct = self.heap.intern("construct");
        let initializer = self.heap.get(class)?.methods.get(&construct).copied();

        match initializer.and_then(Value::as_object) {
            Some(method) => match self.heap.kind(method)? {
                ObjKind::Function => self.call_function(method, argc, true),
                ObjKind::Native => {
                    self.call_native(method, argc, Some(instance))?;
                    self.set_peek(0, instance)?;
                    Ok(ExecutionResult::Continue)
                }
                other => Err(VmError::NotCallable(other.name().to_string())),
            },
            None if argc != 0 => {
                let name = match &self.heap.get(class)?.data {
                    ObjData::Class(c) => self.name_text(c.name),
                    _ => String::new(),
                };
                Err(VmError::Arity {
                    callee: name,
                    expected: 0,
                    got: argc,
                })
            }
            None => Ok(ExecutionResult::Continue),
        }
    }

    /// Call `method` with `receiver` already in slot 0 of the call region
    fn call_method(
        &mut self,
        receiver: Value,
        method: Value,
        argc: usize,
    ) -> Result<ExecutionResult, VmError> {
        let Some(r) = method.as_object() else {
            return Err(VmError::NotCallable(method.kind_name().to_string()));
        };
        match self.heap.kind(r)? {
            ObjKind::Function => self.call_function(r, argc, false),
            ObjKind::Native => {
                // module members are plain functions
                let bound = match self.heap.kind_of(receiver) {
                    Some(ObjKind::Module) => None,
                    _ => Some(receiver),
                };
                self.call_native(r, argc, bound)
            }
            _ => {
                self.set_peek(argc, method)?;
                self.call_value(method, argc)
            }
        }
    }

    /// Fused property lookup and call, without allocating a bound method
    fn invoke(&mut self, name: ObjRef, argc: usize) -> Result<ExecutionResult, VmError> {
        let receiver = self.peek(argc)?;
        let Some(r) = receiver.as_object() else {
            return Err(VmError::type_error(
                "method call",
                "object",
                receiver.kind_name(),
            ));
        };

        let receiver_kind = self.heap.kind(r)?;
        if let Some(method) = self.lookup_method(r, name)? {
            let unbound = matches!(receiver_kind, ObjKind::Module | ObjKind::Class)
                || self.heap.kind_of(method) == Some(ObjKind::Class);
            if unbound {
                self.set_peek(argc, method)?;
                return self.call_value(method, argc);
            }
            return self.call_method(receiver, method, argc);
        }

        if let ObjData::Instance(instance) = &self.heap.get(r)?.data {
            if let Some(field) = instance.fields.get(&name).copied() {
                self.set_peek(argc, field)?;
                return self.call_value(field, argc);
            }
        }

        Err(VmError::UndefinedProperty(self.name_text(name)))
    }

    /// The object's own method table, then the intrinsics of its kind
    pub(crate) fn lookup_method(&self, r: ObjRef, name: ObjRef) -> Result<Option<Value>, VmError> {
        let obj = self.heap.get(r)?;
        if let Some(method) = obj.methods.get(&name) {
            return Ok(Some(*method));
        }
        Ok(self.intrinsics.lookup(obj.kind(), name))
    }
}
