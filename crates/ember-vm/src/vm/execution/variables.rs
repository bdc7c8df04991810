//! Variable and constant instruction execution
//!
//! Globals resolve in the executing function's module scope first, then in
//! the process-wide table.

use crate::error::VmError;
use crate::opcode::OpCode;
use crate::value::{ObjRef, Value};
use crate::vm::result::ExecutionResult;
use crate::vm::VM;

impl VM {
    /// Execute variable and constant loading instructions
    pub(crate) fn execute_variables(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::Constant => {
                let index = self.read_byte()? as usize;
                let value = self.read_constant(index)?;
                self.push(value)?;
            }

            OpCode::ConstantLong => {
                let index = self.read_u16()? as usize;
                let value = self.read_constant(index)?;
                self.push(value)?;
            }

            OpCode::Nil => self.push(Value::NIL)?,
            OpCode::True => self.push(Value::TRUE)?,
            OpCode::False => self.push(Value::FALSE)?,

            OpCode::Pop => {
                self.pop()?;
            }

            OpCode::DefineGlobal | OpCode::ExportGlobal => {
                let name = self.read_name()?;
                let value = self.pop()?;
                let scope = self.current_scope()?;
                self.define_in_scope(scope, name, value)?;
                if opcode == OpCode::ExportGlobal {
                    self.record_export(name);
                }
            }

            OpCode::GetGlobal => {
                let name = self.read_name()?;
                let value = self
                    .lookup_global(name)?
                    .ok_or_else(|| VmError::UndefinedVariable(self.name_text(name)))?;
                self.push(value)?;
            }

            OpCode::SetGlobal => {
                let name = self.read_name()?;
                let value = self.peek(0)?;
                self.assign_global(name, value)?;
            }

            OpCode::GetLocal => {
                let index = self.local_index()?;
                let value = self
                    .fiber()?
                    .stack
                    .get(index)
                    .ok_or_else(|| bad_slot(index))?;
                self.push(value)?;
            }

            OpCode::SetLocal => {
                let index = self.local_index()?;
                let value = self.peek(0)?;
                let slot = self
                    .fiber_mut()?
                    .stack
                    .get_mut(index)
                    .ok_or_else(|| bad_slot(index))?;
                *slot = value;
            }

            _ => unreachable!("Non-variable opcode in variable handler"),
        }
        Ok(ExecutionResult::Continue)
    }

    /// Module scope of the executing function (`None` = process globals)
    pub(crate) fn current_scope(&self) -> Result<Option<ObjRef>, VmError> {
        Ok(self.frame()?.scope)
    }

    pub(crate) fn define_in_scope(
        &mut self,
        scope: Option<ObjRef>,
        name: ObjRef,
        value: Value,
    ) -> Result<(), VmError> {
        match scope {
            Some(module) => self.heap.mutate(module, |obj| {
                obj.methods.insert(name, value);
            }),
            None => {
                self.globals.insert(name, value);
                Ok(())
            }
        }
    }

    fn lookup_global(&self, name: ObjRef) -> Result<Option<Value>, VmError> {
        if let Some(module) = self.current_scope()? {
            if let Some(value) = self.heap.get(module)?.methods.get(&name) {
                return Ok(Some(*value));
            }
        }
        Ok(self.globals.get(&name).copied())
    }

    fn assign_global(&mut self, name: ObjRef, value: Value) -> Result<(), VmError> {
        if let Some(module) = self.current_scope()? {
            let assigned = self.heap.mutate(module, |obj| match obj.methods.get_mut(&name) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            })?;
            if assigned {
                return Ok(());
            }
        }
        match self.globals.get_mut(&name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(VmError::UndefinedVariable(self.name_text(name))),
        }
    }

    /// Absolute stack index of the u16 local slot operand
    fn local_index(&mut self) -> Result<usize, VmError> {
        let slot = self.read_u16()? as usize;
        Ok(self.frame()?.base + slot)
    }
}

fn bad_slot(index: usize) -> VmError {
    VmError::InvalidBytecode(format!("local slot {} is past the stack top", index))
}
