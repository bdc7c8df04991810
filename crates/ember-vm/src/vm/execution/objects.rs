//! Class, property and method instruction execution

use crate::error::VmError;
use crate::object::{ObjBoundMethod, ObjData, ObjKind};
use crate::opcode::OpCode;
use crate::value::{ObjRef, Value};
use crate::vm::result::ExecutionResult;
use crate::vm::VM;

impl VM {
    /// Execute class and property instructions
    pub(crate) fn execute_objects(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::Class => {
                let name = self.read_name()?;
                let class = self.heap.new_class(name);
                self.push(Value::object(class))?;
            }

            OpCode::GetProperty => {
                let name = self.read_name()?;
                let receiver = self.peek(0)?;
                let value = self.get_property(receiver, name)?;
                self.set_peek(0, value)?;
            }

            OpCode::SetProperty => {
                let name = self.read_name()?;
                let value = self.pop()?;
                let target = self.pop()?;
                self.set_property(target, name, value)?;
                self.push(value)?;
            }

            OpCode::Method => {
                let name = self.read_name()?;
                let method = self.peek(0)?;
                let class = self.peek(1)?;
                let Some(class) = class
                    .as_object()
                    .filter(|r| matches!(self.heap.kind(*r), Ok(ObjKind::Class)))
                else {
                    return Err(VmError::type_error(
                        "method definition",
                        "class",
                        self.heap.type_name(class),
                    ));
                };
                self.heap.mutate(class, |obj| {
                    obj.methods.insert(name, method);
                })?;
                self.pop()?;
            }

            _ => unreachable!("Non-object opcode in object handler"),
        }
        Ok(ExecutionResult::Continue)
    }

    /// Method table first (bound unless the receiver is a class or module),
    /// then instance fields
    fn get_property(&mut self, receiver: Value, name: ObjRef) -> Result<Value, VmError> {
        let Some(r) = receiver.as_object() else {
            return Err(VmError::type_error(
                "property access",
                "object",
                receiver.kind_name(),
            ));
        };

        if let Some(method) = self.lookup_method(r, name)? {
            let receiver_kind = self.heap.kind(r)?;
            let callable = matches!(
                self.heap.kind_of(method),
                Some(ObjKind::Function | ObjKind::Native)
            );
            if !callable || matches!(receiver_kind, ObjKind::Module | ObjKind::Class) {
                return Ok(method);
            }
            let Some(method) = method.as_object() else {
                return Ok(method);
            };
            let bound = self
                .heap
                .alloc(ObjData::BoundMethod(ObjBoundMethod { receiver, method }));
            return Ok(Value::object(bound));
        }

        match &self.heap.get(r)?.data {
            ObjData::Instance(instance) => instance
                .fields
                .get(&name)
                .copied()
                .ok_or_else(|| VmError::UndefinedProperty(self.name_text(name))),
            _ => Err(VmError::UndefinedProperty(self.name_text(name))),
        }
    }

    fn set_property(&mut self, target: Value, name: ObjRef, value: Value) -> Result<(), VmError> {
        let r = target.as_object().ok_or_else(|| {
            VmError::type_error("property assignment", "instance", target.kind_name())
        })?;
        self.heap.mutate(r, |obj| match &mut obj.data {
            ObjData::Instance(instance) => {
                instance.fields.insert(name, value);
                Ok(())
            }
            other => Err(VmError::type_error(
                "property assignment",
                "instance",
                other.kind().name(),
            )),
        })?
    }
}
