//! Comparison instruction execution
//!
//! Operands are pushed left first, so `a < b` compiles to `a`, `b`, LESS.

use crate::error::VmError;
use crate::opcode::OpCode;
use crate::value::Value;
use crate::vm::ops::{values_equal, ValueOperations};
use crate::vm::result::ExecutionResult;
use crate::vm::VM;

impl VM {
    /// Execute comparison instructions
    pub(crate) fn execute_comparison(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::Not => {
                let value = self.peek(0)?;
                self.set_peek(0, Value::bool(value.is_falsey()))?;
            }

            OpCode::Equal => {
                let right = self.pop()?;
                let left = self.pop()?;
                let equal = values_equal(&self.heap, left, right);
                self.push(Value::bool(equal))?;
            }

            OpCode::Less => {
                let right = self.pop()?;
                let left = self.pop()?;
                self.push(ValueOperations::lt_values(left, right)?)?;
            }

            OpCode::Greater => {
                let right = self.pop()?;
                let left = self.pop()?;
                self.push(ValueOperations::gt_values(left, right)?)?;
            }

            _ => unreachable!("Non-comparison opcode in comparison handler"),
        }
        Ok(ExecutionResult::Continue)
    }
}
